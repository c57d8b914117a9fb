//! Error types for the ec-app service layer.

use std::path::PathBuf;

use ec_core::{BatchId, CaseId};

/// Application error type that wraps errors from the backend crates and
/// gives CLI and embedding front-ends one error interface.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Core error: {0}")]
    Core(String),

    #[error("Chart error: {0}")]
    Chart(String),

    #[error("Failed to read module catalog: {path}")]
    CatalogRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Module catalog error: {0}")]
    Catalog(String),

    #[error("Saved case not found: {0}")]
    CaseNotFound(CaseId),

    #[error("Saved batch not found: {0}")]
    BatchNotFound(BatchId),

    #[error("Column {index} has no saved case; save it before adding it to a batch")]
    UnsavedCase { index: usize },

    #[error("Batch would hold {count} cases, module allows {max}")]
    TooManyCases { count: usize, max: usize },

    #[error("Case duplication is disabled for module '{0}'")]
    DuplicationDisabled(String),

    #[error("Demo items are read-only")]
    ReadOnlyDemo,

    #[error("No column at index {index} (have {len})")]
    NoSuchColumn { index: usize, len: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ec-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<ec_store::StoreError> for AppError {
    fn from(err: ec_store::StoreError) -> Self {
        AppError::Store(err.to_string())
    }
}

impl From<ec_core::CoreError> for AppError {
    fn from(err: ec_core::CoreError) -> Self {
        AppError::Core(err.to_string())
    }
}

impl From<ec_charts::ChartError> for AppError {
    fn from(err: ec_charts::ChartError) -> Self {
        AppError::Chart(err.to_string())
    }
}
