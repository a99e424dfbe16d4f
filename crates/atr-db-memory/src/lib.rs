//! In-memory document store backend for the ATR bulk data server.
//!
//! Provides an implementation of the `DocumentStore` trait from
//! `atr-storage`, using papaya lock-free HashMaps for concurrent row access.
//!
//! # Example
//!
//! ```ignore
//! use atr_db_memory::InMemoryDocumentStore;
//! use atr_storage::{Document, DocumentStore, NewRecord};
//!
//! let store = InMemoryDocumentStore::new();
//! let record = store
//!     .insert(ResourceType::Coverage, NewRecord { document, version_id: "1".into(), last_updated })
//!     .await?;
//! assert_eq!(record.id, 1);
//! ```

mod query;
pub mod storage;

pub use atr_storage::{DocumentStore, StorageError};
pub use storage::InMemoryDocumentStore;

/// Creates a new in-memory store with a table for every known resource type.
pub fn create_document_store() -> atr_storage::DynStore {
    std::sync::Arc::new(InMemoryDocumentStore::new())
}
