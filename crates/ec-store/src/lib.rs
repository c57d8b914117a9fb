//! ec-store: durable, collection-oriented storage for saved cases,
//! saved batches and user settings.

pub mod demo;
pub mod live;
pub mod records;
pub mod store;

pub use demo::DemoLibrary;
pub use live::LiveQuery;
pub use records::*;
pub use store::LocalStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Record not found in {collection}: {id}")]
    NotFound { collection: Collection, id: u32 },

    #[error("Corrupt key {key} in {collection}")]
    CorruptKey { collection: Collection, key: u32 },

    #[error("Store lock poisoned")]
    Poisoned,
}
