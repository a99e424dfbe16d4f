//! Create and update.
//!
//! Each write runs the same explicit steps: validate the payload, strip the
//! caller's `id` and `meta`, stamp the time from the injected [`Clock`], then
//! persist. Identity and version tags come from the store and the
//! [`VersionPolicy`], never from the payload.

use std::sync::Arc;

use serde_json::Value;
use time::OffsetDateTime;

use atr_core::{ResourceType, ValidationError, parse_resource_id};
use atr_storage::{Document, DynStore, NewRecord, UpdateRecord, VersionPolicy};

use crate::error::ServiceError;

/// Source of write timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        atr_core::time::now_utc()
    }
}

/// What a caller learns about a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub id: String,
    pub version_id: String,
    pub last_updated: OffsetDateTime,
}

#[derive(Clone)]
pub struct MutationPipeline {
    store: DynStore,
    versions: Arc<dyn VersionPolicy>,
    clock: Arc<dyn Clock>,
}

impl MutationPipeline {
    pub fn new(store: DynStore, versions: Arc<dyn VersionPolicy>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            versions,
            clock,
        }
    }

    /// Persists a new resource under a store-generated id.
    ///
    /// An `id` in the payload is discarded.
    pub async fn create(
        &self,
        resource_type: ResourceType,
        payload: Value,
    ) -> Result<MutationOutcome, ServiceError> {
        let document = prepare(resource_type, payload, None)?;
        let record = NewRecord {
            document,
            version_id: self.versions.initial(),
            last_updated: self.clock.now(),
        };

        let stored = self.store.insert(resource_type, record).await?;
        tracing::info!(
            resource_type = %resource_type,
            id = stored.id,
            version_id = %stored.version_id,
            "resource created"
        );
        Ok(MutationOutcome {
            id: stored.id.to_string(),
            version_id: stored.version_id,
            last_updated: stored.last_updated,
        })
    }

    /// Replaces an existing resource. Never creates one.
    pub async fn update(
        &self,
        resource_type: ResourceType,
        id: &str,
        payload: Value,
    ) -> Result<MutationOutcome, ServiceError> {
        let row_id = parse_resource_id(id).map_err(|e| {
            tracing::debug!(error = %e, id, "update target id is malformed");
            ServiceError::not_found(resource_type, id)
        })?;
        let document = prepare(resource_type, payload, Some(id))?;
        let record = UpdateRecord {
            document,
            last_updated: self.clock.now(),
        };

        let stored = self
            .store
            .update(resource_type, row_id, record, self.versions.as_ref())
            .await?;
        tracing::info!(
            resource_type = %resource_type,
            id = stored.id,
            version_id = %stored.version_id,
            "resource updated"
        );
        Ok(MutationOutcome {
            id: stored.id.to_string(),
            version_id: stored.version_id,
            last_updated: stored.last_updated,
        })
    }
}

/// Validates a payload and reduces it to the stored document.
fn prepare(
    resource_type: ResourceType,
    payload: Value,
    target_id: Option<&str>,
) -> Result<Document, ValidationError> {
    let mut document =
        Document::from_value(payload).map_err(|e| ValidationError::invalid_document(e.to_string()))?;

    if let Some(declared) = document.resource_type()
        && declared != resource_type.as_str()
    {
        return Err(ValidationError::invalid_document(format!(
            "resourceType {declared} does not match {resource_type}"
        )));
    }

    let supplied_id = document.remove("id");
    if let Some(expected) = target_id
        && let Some(actual) = supplied_id
    {
        let actual = match actual {
            Value::String(s) => s,
            other => other.to_string(),
        };
        if actual != expected {
            return Err(ValidationError::IdMismatch {
                expected: expected.to_string(),
                actual,
            });
        }
    }

    document.remove("meta");
    document.remove("resourceType");
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{ConstantVersion, SequentialVersion};
    use atr_db_memory::InMemoryDocumentStore;
    use serde_json::json;
    use time::macros::datetime;

    struct FixedClock(OffsetDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> OffsetDateTime {
            self.0
        }
    }

    fn pipeline(versions: Arc<dyn VersionPolicy>) -> (MutationPipeline, DynStore) {
        let store: DynStore = Arc::new(InMemoryDocumentStore::new());
        let clock = Arc::new(FixedClock(datetime!(2024-03-01 12:00 UTC)));
        (
            MutationPipeline::new(Arc::clone(&store), versions, clock),
            store,
        )
    }

    #[test]
    fn test_prepare_strips_identity() {
        let doc = prepare(
            ResourceType::Coverage,
            json!({"resourceType": "Coverage", "id": "99", "meta": {"versionId": "7"}, "status": "active"}),
            None,
        )
        .unwrap();
        assert_eq!(doc.as_object().len(), 1);
        assert_eq!(doc.get("status"), Some(&json!("active")));
    }

    #[test]
    fn test_prepare_rejects_bad_payloads() {
        assert!(matches!(
            prepare(ResourceType::Coverage, json!([1, 2]), None),
            Err(ValidationError::InvalidDocument(_))
        ));
        assert!(matches!(
            prepare(ResourceType::Coverage, json!({"resourceType": "Patient"}), None),
            Err(ValidationError::InvalidDocument(_))
        ));
        assert!(matches!(
            prepare(ResourceType::Coverage, json!({"id": "3"}), Some("4")),
            Err(ValidationError::IdMismatch { .. })
        ));
        assert!(prepare(ResourceType::Coverage, json!({"id": "4"}), Some("4")).is_ok());
    }

    #[tokio::test]
    async fn test_create_ignores_client_id() {
        let (pipeline, store) = pipeline(Arc::new(ConstantVersion));
        let outcome = pipeline
            .create(ResourceType::Coverage, json!({"id": "500", "status": "active"}))
            .await
            .unwrap();

        assert_eq!(outcome.id, "1");
        assert_eq!(outcome.version_id, "1");
        assert_eq!(outcome.last_updated, datetime!(2024-03-01 12:00 UTC));
        assert!(store.read(ResourceType::Coverage, 500).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (pipeline, store) = pipeline(Arc::new(ConstantVersion));
        let err = pipeline
            .update(ResourceType::Coverage, "42", json!({"status": "active"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = pipeline
            .update(ResourceType::Coverage, "abc", json!({"status": "active"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(store.read(ResourceType::Coverage, 42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_with_sequential_versions() {
        let (pipeline, _store) = pipeline(Arc::new(SequentialVersion));
        let created = pipeline
            .create(ResourceType::Coverage, json!({"status": "draft"}))
            .await
            .unwrap();
        let updated = pipeline
            .update(ResourceType::Coverage, &created.id, json!({"status": "active"}))
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.version_id, "2");
    }
}
