//! # atr-storage
//!
//! Document store abstraction for the ATR bulk data server.
//!
//! This crate defines the [`DocumentStore`] trait, the row types it moves
//! and the [`StoreQuery`] IR the search layer produces. Implementations live
//! in separate crates.

mod error;
pub mod query;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use query::{
    CompareOp, JsonPath, Predicate, SortDirection, SortField, SortKey, SortKind, StoreQuery,
};
pub use traits::{DocumentStore, VersionPolicy};
pub use types::{Document, NewRecord, QueryOutput, ResourceRecord, UpdateRecord};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared store trait object.
pub type DynStore = std::sync::Arc<dyn DocumentStore>;
