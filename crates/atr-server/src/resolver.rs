//! Current and versioned reads.
//!
//! Every way a read can miss (malformed id, absent row, absent version)
//! surfaces as the same `NotFound`; the distinction is only logged.

use atr_core::{ResourceType, parse_resource_id};
use atr_storage::{DynStore, ResourceRecord};

use crate::error::ServiceError;

#[derive(Clone)]
pub struct VersionResolver {
    store: DynStore,
}

impl VersionResolver {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self), fields(backend = self.store.backend_name()))]
    pub async fn resolve(
        &self,
        resource_type: ResourceType,
        id: &str,
        version: Option<&str>,
    ) -> Result<ResourceRecord, ServiceError> {
        let missing = || match version {
            Some(v) => ServiceError::version_not_found(resource_type, id, v),
            None => ServiceError::not_found(resource_type, id),
        };

        let row_id = match parse_resource_id(id) {
            Ok(row_id) => row_id,
            Err(e) => {
                tracing::debug!(error = %e, "malformed id can never exist");
                return Err(missing());
            }
        };

        match version {
            None => self
                .store
                .read(resource_type, row_id)
                .await?
                .ok_or_else(missing),
            Some(version_id) => {
                if let Some(record) = self
                    .store
                    .read_version(resource_type, row_id, version_id)
                    .await?
                {
                    return Ok(record);
                }
                let id_exists = self.store.exists(resource_type, row_id).await?;
                tracing::debug!(id_exists, "requested version not found");
                Err(missing())
            }
        }
    }
}
