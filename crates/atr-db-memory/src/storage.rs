use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use papaya::HashMap as PapayaHashMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use atr_core::ResourceType;
use atr_storage::{
    Document, DocumentStore, NewRecord, QueryOutput, ResourceRecord, StorageError, StoreQuery,
    UpdateRecord, VersionPolicy,
};

use crate::query::{compare_rows, matches};

/// A stored row, minus its id which is the map key.
#[derive(Debug, Clone)]
pub(crate) struct Row {
    pub(crate) version_id: String,
    pub(crate) document: Document,
    pub(crate) last_updated: OffsetDateTime,
}

impl Row {
    fn to_record(&self, resource_type: ResourceType, id: i64) -> ResourceRecord {
        ResourceRecord {
            resource_type,
            id,
            version_id: self.version_id.clone(),
            document: self.document.clone(),
            last_updated: self.last_updated,
        }
    }
}

/// One resource table.
#[derive(Debug)]
struct Table {
    /// Current rows, lock-free for concurrent readers
    rows: PapayaHashMap<i64, Arc<Row>>,
    /// Identity column generator
    next_id: AtomicI64,
    /// Append-only history keyed by (id, versionId)
    history: RwLock<HashMap<(i64, String), Arc<Row>>>,
}

impl Table {
    fn new() -> Self {
        Self {
            rows: PapayaHashMap::new(),
            next_id: AtomicI64::new(1),
            history: RwLock::new(HashMap::new()),
        }
    }

    /// Records a version unless that (id, versionId) key is already present.
    async fn record_history(&self, id: i64, row: Arc<Row>) {
        let mut history = self.history.write().await;
        history
            .entry((id, row.version_id.clone()))
            .or_insert(row);
    }
}

/// In-memory document store using papaya lock-free HashMaps.
///
/// Tables are provisioned at construction; queries against any other
/// resource type fail with `StorageError::UnknownTable`.
#[derive(Debug)]
pub struct InMemoryDocumentStore {
    tables: HashMap<ResourceType, Table>,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    /// Creates a store with a table for every known resource type.
    pub fn new() -> Self {
        Self::with_tables(ResourceType::ALL)
    }

    /// Creates a store with tables for the given resource types only.
    pub fn with_tables(resource_types: impl IntoIterator<Item = ResourceType>) -> Self {
        let tables = resource_types
            .into_iter()
            .map(|rt| (rt, Table::new()))
            .collect();
        Self { tables }
    }

    fn table(&self, resource_type: ResourceType) -> Result<&Table, StorageError> {
        self.tables
            .get(&resource_type)
            .ok_or_else(|| StorageError::unknown_table(resource_type.as_str()))
    }

    /// Number of current rows in a table.
    pub fn count(&self, resource_type: ResourceType) -> usize {
        self.tables
            .get(&resource_type)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn execute(&self, query: &StoreQuery) -> Result<QueryOutput, StorageError> {
        let table = self.table(query.resource_type)?;

        let mut matched: Vec<(i64, Arc<Row>)> = {
            let guard = table.rows.pin();
            guard
                .iter()
                .filter(|(id, row)| matches(&query.predicate, **id, row))
                .map(|(id, row)| (*id, Arc::clone(row)))
                .collect()
        };

        matched.sort_by(|a, b| compare_rows(&query.order, (a.0, &*a.1), (b.0, &*b.1)));

        let total = matched.len();
        let records = matched
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|(id, row)| row.to_record(query.resource_type, id))
            .collect();

        tracing::trace!(
            resource_type = %query.resource_type,
            total,
            "in-memory query executed"
        );

        Ok(QueryOutput { records, total })
    }

    async fn insert(
        &self,
        resource_type: ResourceType,
        record: NewRecord,
    ) -> Result<ResourceRecord, StorageError> {
        let table = self.table(resource_type)?;
        let id = table.next_id.fetch_add(1, Ordering::SeqCst);
        let row = Arc::new(Row {
            version_id: record.version_id,
            document: record.document,
            last_updated: record.last_updated,
        });

        // Scope the guard so it is dropped before the history await
        {
            let guard = table.rows.pin();
            guard.insert(id, Arc::clone(&row));
        }
        table.record_history(id, Arc::clone(&row)).await;

        Ok(row.to_record(resource_type, id))
    }

    async fn update(
        &self,
        resource_type: ResourceType,
        id: i64,
        record: UpdateRecord,
        versions: &dyn VersionPolicy,
    ) -> Result<ResourceRecord, StorageError> {
        let table = self.table(resource_type)?;

        let updated = {
            let guard = table.rows.pin();
            guard
                .update(id, |current| {
                    Arc::new(Row {
                        version_id: versions.next(&current.version_id),
                        document: record.document.clone(),
                        last_updated: record.last_updated,
                    })
                })
                .map(Arc::clone)
        };

        let row = updated
            .ok_or_else(|| StorageError::not_found(resource_type.as_str(), id.to_string()))?;
        table.record_history(id, Arc::clone(&row)).await;

        Ok(row.to_record(resource_type, id))
    }

    async fn read(
        &self,
        resource_type: ResourceType,
        id: i64,
    ) -> Result<Option<ResourceRecord>, StorageError> {
        let table = self.table(resource_type)?;
        let guard = table.rows.pin();
        Ok(guard.get(&id).map(|row| row.to_record(resource_type, id)))
    }

    async fn read_version(
        &self,
        resource_type: ResourceType,
        id: i64,
        version_id: &str,
    ) -> Result<Option<ResourceRecord>, StorageError> {
        let table = self.table(resource_type)?;
        let history = table.history.read().await;
        Ok(history
            .get(&(id, version_id.to_string()))
            .map(|row| row.to_record(resource_type, id)))
    }

    fn backend_name(&self) -> &'static str {
        "in-memory"
    }
}
