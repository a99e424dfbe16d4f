use std::sync::Arc;

use serde_json::json;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::task::JoinSet;

use atr_db_memory::InMemoryDocumentStore;
use atr_search::SearchParameterRegistry;
use atr_server::config::VersioningMode;
use atr_server::{AppConfig, Clock, ErrorKind, ResourceService, SearchRequest, ServiceError};

struct FixedClock(OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

fn service(versioning: VersioningMode) -> ResourceService {
    let mut config = AppConfig::default();
    config.storage.versioning = versioning;
    ResourceService::with_clock(
        Arc::new(InMemoryDocumentStore::new()),
        Arc::new(SearchParameterRegistry::r4()),
        &config,
        Arc::new(FixedClock(datetime!(2024-05-01 8:00 UTC))),
    )
}

#[tokio::test]
async fn read_and_vread_misses_are_not_found() {
    let service = service(VersioningMode::Constant);
    for i in 1..=5 {
        service
            .create("Coverage", json!({"status": "active", "order": i}))
            .await
            .unwrap();
    }

    let current = service.read("Coverage", "5", None).await.unwrap();
    assert_eq!(current.id, 5);
    assert_eq!(current.document.get("order"), Some(&json!(5)));
    assert_eq!(current.last_updated, datetime!(2024-05-01 8:00 UTC));

    let resource = current.to_resource();
    assert_eq!(resource["id"], "5");
    assert_eq!(resource["meta"]["versionId"], "1");
    assert_eq!(resource["resourceType"], "Coverage");

    for (id, version) in [
        ("5", Some("2")),
        ("999", None),
        ("999", Some("1")),
        ("abc", None),
        ("-5", None),
        ("99999999999999999999", None),
    ] {
        let err = service.read("Coverage", id, version).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound, "id {id} version {version:?}");
    }

    let versioned = service.read("Coverage", "5", Some("1")).await.unwrap();
    assert_eq!(versioned, current);
}

#[tokio::test]
async fn constant_versions_keep_the_first_write() {
    let service = service(VersioningMode::Constant);
    let created = service
        .create("Coverage", json!({"status": "draft"}))
        .await
        .unwrap();
    let updated = service
        .update("Coverage", &created.id, json!({"status": "active"}))
        .await
        .unwrap();
    assert_eq!(updated.version_id, "1");

    let current = service.read("Coverage", &created.id, None).await.unwrap();
    assert_eq!(current.document.get("status"), Some(&json!("active")));

    let first = service
        .read("Coverage", &created.id, Some("1"))
        .await
        .unwrap();
    assert_eq!(first.document.get("status"), Some(&json!("draft")));
}

#[tokio::test]
async fn sequential_versions_are_readable() {
    let service = service(VersioningMode::Sequential);
    let created = service
        .create("MedicationStatement", json!({"status": "active"}))
        .await
        .unwrap();
    for status in ["on-hold", "completed"] {
        service
            .update("MedicationStatement", &created.id, json!({"status": status}))
            .await
            .unwrap();
    }

    let current = service
        .read("MedicationStatement", &created.id, None)
        .await
        .unwrap();
    assert_eq!(current.version_id, "3");

    for (version, status) in [("1", "active"), ("2", "on-hold"), ("3", "completed")] {
        let record = service
            .read("MedicationStatement", &created.id, Some(version))
            .await
            .unwrap();
        assert_eq!(record.document.get("status"), Some(&json!(status)));
    }
    assert!(
        service
            .read("MedicationStatement", &created.id, Some("4"))
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn update_never_creates() {
    let service = service(VersioningMode::Constant);
    let err = service
        .update("Coverage", "7", json!({"status": "active"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let outcome = service.search("Coverage", SearchRequest::new()).await.unwrap();
    assert_eq!(outcome.total, 0);
}

#[tokio::test]
async fn payload_problems_are_validation_errors() {
    let service = service(VersioningMode::Constant);
    let created = service
        .create("Coverage", json!({"id": "77", "status": "active"}))
        .await
        .unwrap();
    assert_eq!(created.id, "1");

    let err = service
        .create("Coverage", json!({"resourceType": "MedicationStatement"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = service
        .update("Coverage", "1", json!({"id": "2", "status": "active"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = service
        .create("Coverage", json!("not an object"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn concurrent_update_and_read_see_whole_documents() {
    let service = service(VersioningMode::Sequential);
    let created = service
        .create("Coverage", json!({"status": "draft", "marker": "draft"}))
        .await
        .unwrap();

    let mut set = JoinSet::new();
    for status in ["active", "cancelled", "entered-in-error", "draft"] {
        let service = service.clone();
        let id = created.id.clone();
        set.spawn(async move {
            service
                .update("Coverage", &id, json!({"status": status, "marker": status}))
                .await
                .map(|_| ())
        });
    }
    for _ in 0..8 {
        let service = service.clone();
        let id = created.id.clone();
        set.spawn(async move {
            let record = service.read("Coverage", &id, None).await?;
            assert_eq!(record.document.get("status"), record.document.get("marker"));
            Ok::<(), ServiceError>(())
        });
    }
    while let Some(res) = set.join_next().await {
        res.unwrap().unwrap();
    }

    let current = service.read("Coverage", &created.id, None).await.unwrap();
    assert_eq!(current.version_id, "5");
}
