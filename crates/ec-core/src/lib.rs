//! ec-core: stable foundation for enercompare.
//!
//! Contains:
//! - ids (compact session and persisted identifiers)
//! - error (shared error types)
//! - module (module metadata: limits, inputs, sub-modules)
//! - case (comparison case and saved case payloads)

pub mod case;
pub mod error;
pub mod ids;
pub mod module;

pub use case::*;
pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use module::*;
