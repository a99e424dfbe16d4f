//! The entry points a transport layer calls.
//!
//! The transport parses its wire format into a [`SearchRequest`] (or a raw
//! JSON payload for writes) and gets typed outcomes back. Nothing here knows
//! about HTTP.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use atr_core::{ResourceType, ValidationError};
use atr_search::{QueryTranslator, SearchParameterModel, SearchParameterRegistry, SortSpec};
use atr_storage::{DynStore, ResourceRecord};

use crate::bulk::{BulkExportEngine, BulkExportOutcome, BulkExportRequest};
use crate::config::{AppConfig, SearchSettings};
use crate::error::ServiceError;
use crate::mutation::{Clock, MutationOutcome, MutationPipeline, SystemClock};
use crate::resolver::VersionResolver;
use crate::version::policy_for;

/// A typed search request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRequest {
    /// `(name, raw value)` pairs in arrival order; names may carry a modifier
    pub params: Vec<(String, String)>,
    pub sort: Vec<SortSpec>,
    pub count: Option<usize>,
    /// Rows to skip, as handed out in [`SearchOutcome::next_cursor`]
    pub offset: usize,
    pub includes: Vec<String>,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Sort in `_sort` syntax, e.g. `-effective,_id`.
    #[must_use]
    pub fn sort(mut self, raw: &str) -> Self {
        self.sort = SortSpec::parse(raw);
        self
    }

    #[must_use]
    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn include(mut self, include: impl Into<String>) -> Self {
        self.includes.push(include.into());
        self
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub resources: Vec<ResourceRecord>,
    /// Matches before paging
    pub total: usize,
    /// Offset of the next page when more matches remain
    pub next_cursor: Option<usize>,
    /// Include hints passed through for the transport to expand
    pub includes: Vec<String>,
    /// Identifies the result set of the translated query
    pub tag: String,
}

#[derive(Clone)]
pub struct ResourceService {
    registry: Arc<SearchParameterRegistry>,
    translator: QueryTranslator,
    store: DynStore,
    mutations: MutationPipeline,
    resolver: VersionResolver,
    exports: BulkExportEngine,
    search: SearchSettings,
}

impl ResourceService {
    pub fn new(store: DynStore, registry: Arc<SearchParameterRegistry>, config: &AppConfig) -> Self {
        Self::with_clock(store, registry, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: DynStore,
        registry: Arc<SearchParameterRegistry>,
        config: &AppConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let versions = policy_for(config.storage.versioning);
        tracing::info!(
            backend = store.backend_name(),
            versioning = ?config.storage.versioning,
            resource_types = registry.resource_types().len(),
            "resource service initialized"
        );
        Self {
            translator: QueryTranslator::new(),
            mutations: MutationPipeline::new(Arc::clone(&store), versions, clock),
            resolver: VersionResolver::new(Arc::clone(&store)),
            exports: BulkExportEngine::new(
                Arc::clone(&registry),
                Arc::clone(&store),
                config.export.clone(),
            ),
            search: config.search.clone(),
            registry,
            store,
        }
    }

    pub fn registry(&self) -> &SearchParameterRegistry {
        &self.registry
    }

    fn model(
        &self,
        resource_type: &str,
        request: SearchRequest,
    ) -> Result<SearchParameterModel, ValidationError> {
        let mut model = SearchParameterModel::for_resource(&self.registry, resource_type)?;
        for (name, value) in &request.params {
            model.add_constraint(name, value)?;
        }

        let count = request.count.or(self.search.default_count);
        if let Some(count) = count
            && count > self.search.max_count
        {
            return Err(ValidationError::InvalidCount {
                count,
                max: self.search.max_count,
            });
        }

        model
            .set_sort(request.sort)
            .set_count(count)
            .set_offset(request.offset)
            .set_includes(request.includes);
        Ok(model)
    }

    /// Translates and runs a search.
    pub async fn search(
        &self,
        resource_type: &str,
        request: SearchRequest,
    ) -> Result<SearchOutcome, ServiceError> {
        let model = self.model(resource_type, request)?;
        let translated = self.translator.translate(&model)?;

        let output = self.store.execute(&translated.query).await?;
        let returned = model.offset() + output.records.len();
        let next_cursor = (returned < output.total && !output.records.is_empty()).then_some(returned);

        tracing::debug!(
            resource_type = %model.resource_type(),
            tag = %translated.tag,
            total = output.total,
            returned = output.records.len(),
            "search executed"
        );

        Ok(SearchOutcome {
            resources: output.records,
            total: output.total,
            next_cursor,
            includes: model.includes().to_vec(),
            tag: translated.tag,
        })
    }

    /// Reads the current resource, or the given version.
    pub async fn read(
        &self,
        resource_type: &str,
        id: &str,
        version: Option<&str>,
    ) -> Result<ResourceRecord, ServiceError> {
        let rt = self.resource_type(resource_type)?;
        self.resolver.resolve(rt, id, version).await
    }

    pub async fn create(
        &self,
        resource_type: &str,
        payload: Value,
    ) -> Result<MutationOutcome, ServiceError> {
        let rt = self.resource_type(resource_type)?;
        self.mutations.create(rt, payload).await
    }

    pub async fn update(
        &self,
        resource_type: &str,
        id: &str,
        payload: Value,
    ) -> Result<MutationOutcome, ServiceError> {
        let rt = self.resource_type(resource_type)?;
        self.mutations.update(rt, id, payload).await
    }

    /// Runs a bulk export. See [`BulkExportEngine::export`].
    pub async fn export(
        &self,
        request: &BulkExportRequest,
        cancel: &CancellationToken,
    ) -> Result<BulkExportOutcome, ServiceError> {
        self.exports.export(request, cancel).await
    }

    fn resource_type(&self, name: &str) -> Result<ResourceType, ValidationError> {
        self.registry.resource_type(name)
    }
}
