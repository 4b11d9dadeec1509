//! Storage abstraction for gatekeep.
//!
//! Backend crates (e.g., gatekeep-store-sqlite) implement [`Store`] so
//! `gatekeep-core` doesn't depend on any specific database engine or schema
//! details. Tenant, unit and account administration live outside this
//! workspace; the trait only exposes what the checkpoint core needs.

use thiserror::Error;

mod store;
pub mod types;

pub use store::Store;
#[cfg(feature = "test-support")]
pub use store::MockStore;
pub use types::*;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    /// A compare-and-swap lost against a concurrent writer.
    #[error("conflict")]
    Conflict,
    #[error("backend error: {0}")]
    Backend(String),
}
