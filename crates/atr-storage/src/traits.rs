//! The document store contract.

use async_trait::async_trait;

use atr_core::ResourceType;

use crate::error::StorageError;
use crate::query::StoreQuery;
use crate::types::{NewRecord, QueryOutput, ResourceRecord, UpdateRecord};

/// Produces version tags for written rows.
pub trait VersionPolicy: Send + Sync {
    /// Tag for a freshly inserted row.
    fn initial(&self) -> String;

    /// Tag for a row replacing one tagged `current`.
    fn next(&self, current: &str) -> String;
}

/// Persistence boundary for FHIR resource rows.
///
/// One table per resource type with an integer identity column, a JSON
/// `data` column and a `last_updated_ts` column. Implementations must be
/// thread-safe; a reader sees either the old or the new row, never a mix.
///
/// # Example
///
/// ```ignore
/// use atr_storage::{DocumentStore, StorageError, ResourceRecord};
///
/// async fn get_coverage(store: &dyn DocumentStore, id: i64) -> Result<ResourceRecord, StorageError> {
///     store
///         .read(ResourceType::Coverage, id)
///         .await?
///         .ok_or_else(|| StorageError::not_found("Coverage", id.to_string()))
/// }
/// ```
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Runs a query: filter, sort, then offset and limit.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::UnknownTable` if no table exists for the type.
    async fn execute(&self, query: &StoreQuery) -> Result<QueryOutput, StorageError>;

    /// Inserts a row; the store generates its id.
    ///
    /// The row is also recorded in history under its version tag.
    async fn insert(
        &self,
        resource_type: ResourceType,
        record: NewRecord,
    ) -> Result<ResourceRecord, StorageError>;

    /// Atomically replaces the row `id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row does not exist. Never inserts.
    async fn update(
        &self,
        resource_type: ResourceType,
        id: i64,
        record: UpdateRecord,
        versions: &dyn VersionPolicy,
    ) -> Result<ResourceRecord, StorageError>;

    /// Reads the current row, `None` if absent.
    async fn read(
        &self,
        resource_type: ResourceType,
        id: i64,
    ) -> Result<Option<ResourceRecord>, StorageError>;

    /// Reads a historical row by version tag, `None` if absent.
    async fn read_version(
        &self,
        resource_type: ResourceType,
        id: i64,
        version_id: &str,
    ) -> Result<Option<ResourceRecord>, StorageError>;

    async fn exists(&self, resource_type: ResourceType, id: i64) -> Result<bool, StorageError> {
        Ok(self.read(resource_type, id).await?.is_some())
    }

    /// Returns the name of this backend for logging.
    fn backend_name(&self) -> &'static str;
}
