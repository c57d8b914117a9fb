//! Application service layer for the energy comparison screens.
//!
//! This crate holds the per-screen comparison state and its reducer, runs
//! analyses off the caller's thread, and synchronizes cases and batches
//! with the local store. CLI and embedding front-ends go through it.

pub mod error;
pub mod fetcher;
pub mod fingerprint;
pub mod hydrate;
pub mod metadata;
pub mod session;
pub mod state;
pub mod sync;

// Re-export key types for convenience
pub use error::{AppError, AppResult};
pub use fetcher::{AnalysisError, AnalysisRequest, AnalysisService, CaseResultFetcher, FetchOutcome};
pub use fingerprint::input_fingerprint;
pub use hydrate::{LoadInstructions, LoadSource};
pub use metadata::{ModuleCatalog, ModuleSummary};
pub use session::ModuleSession;
pub use state::{
    Action, BatchPatch, CaseIdAssignment, ComparisonStore, LoadedCase, ModuleState, RunTicket,
};
pub use sync::{
    DanglingReport, DeleteReport, copy_name, dangling_cases_for_batch, delete_batch,
    delete_saved_case_ids, duplicate_batch, duplicate_cases, load_batch, load_cases,
    load_demo_batch, load_demo_cases, reorder_batches, reorder_cases, save_batch, save_case_at,
};
