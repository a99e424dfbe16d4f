use std::sync::Arc;

use futures_util::{StreamExt, stream};
use tokio_util::sync::CancellationToken;

use atr_core::{ResourceType, ValidationError};
use atr_search::{QueryTranslator, SearchParameterModel, SearchParameterRegistry};
use atr_storage::{DynStore, Predicate, ResourceRecord, StorageError, StoreQuery};

use super::{BulkExportOutcome, BulkExportRequest, ExportWindow, TypeExport, TypeExportFailure};
use crate::config::ExportSettings;
use crate::error::ServiceError;

enum TypeResult {
    Done(Vec<ResourceRecord>),
    Failed(StorageError),
    Cancelled,
}

/// Runs patient-scoped exports.
///
/// Every requested type is planned, translated and validated before the
/// first store query is issued. Types are then fetched concurrently, each
/// in `batch_size` pages of the translator's order.
#[derive(Clone)]
pub struct BulkExportEngine {
    registry: Arc<SearchParameterRegistry>,
    translator: QueryTranslator,
    store: DynStore,
    settings: ExportSettings,
}

impl BulkExportEngine {
    pub fn new(
        registry: Arc<SearchParameterRegistry>,
        store: DynStore,
        settings: ExportSettings,
    ) -> Self {
        Self {
            registry,
            translator: QueryTranslator::new(),
            store,
            settings,
        }
    }

    /// Types this deployment exports, in registry order.
    pub fn exportable_types(&self) -> Vec<ResourceType> {
        self.registry
            .resource_types()
            .into_iter()
            .filter(|rt| self.is_exportable(*rt))
            .collect()
    }

    fn is_exportable(&self, resource_type: ResourceType) -> bool {
        self.registry.export_profile(resource_type).is_some() && self.settings.allows(resource_type)
    }

    /// Requested types that can be exported, first occurrence wins.
    fn select_types(&self, request: &BulkExportRequest) -> Vec<ResourceType> {
        if request.resource_types.is_empty() {
            return self.exportable_types();
        }

        let mut selected = Vec::with_capacity(request.resource_types.len());
        for name in &request.resource_types {
            match name.parse::<ResourceType>() {
                Ok(rt) if self.is_exportable(rt) => {
                    if !selected.contains(&rt) {
                        selected.push(rt);
                    }
                }
                _ => tracing::debug!(resource_type = %name, "skipping type not exported here"),
            }
        }
        selected
    }

    fn plan_type(
        &self,
        resource_type: ResourceType,
        patients: &str,
        window: &ExportWindow,
    ) -> Result<StoreQuery, ValidationError> {
        let profile = self
            .registry
            .export_profile(resource_type)
            .ok_or_else(|| ValidationError::UnsupportedResourceType(resource_type.to_string()))?;

        let mut model = SearchParameterModel::for_type(&self.registry, resource_type);
        model.add_constraint(&profile.patient_param, patients)?;
        model.add_constraint(&profile.date_param, &format!("ge{}", window.start))?;
        model.add_constraint(&profile.date_param, &format!("le{}", window.end))?;

        Ok(self.translator.translate(&model)?.query)
    }

    /// Exports every selected type.
    ///
    /// Store failures are reported per type in the outcome; only request
    /// validation fails the call as a whole. After `cancel` fires no further
    /// query is issued and unfinished types are listed as cancelled.
    pub async fn export(
        &self,
        request: &BulkExportRequest,
        cancel: &CancellationToken,
    ) -> Result<BulkExportOutcome, ServiceError> {
        let window = request.validate()?;
        let patients: Vec<&str> = request.patients.iter().map(|p| p.trim()).collect();
        let patients = patients.join(",");

        let mut plan = Vec::new();
        for rt in self.select_types(request) {
            plan.push((rt, self.plan_type(rt, &patients, &window)?));
        }

        tracing::info!(
            patients = request.patients.len(),
            start = %window.start_instant,
            end = %window.end_instant,
            types = ?plan.iter().map(|(rt, _)| rt.as_str()).collect::<Vec<_>>(),
            "starting bulk export"
        );

        let results: Vec<(ResourceType, TypeResult)> = stream::iter(plan)
            .map(|(rt, query)| async move { (rt, self.export_type(query, cancel).await) })
            .buffered(self.settings.max_parallel_types.max(1))
            .collect()
            .await;

        let mut outcome = BulkExportOutcome::default();
        for (resource_type, result) in results {
            match result {
                TypeResult::Done(resources) => {
                    tracing::debug!(
                        resource_type = %resource_type,
                        count = resources.len(),
                        "exported resource type"
                    );
                    outcome.exports.push(TypeExport {
                        resource_type,
                        resources,
                    });
                }
                TypeResult::Failed(error) => {
                    tracing::warn!(
                        resource_type = %resource_type,
                        error = %error,
                        "failed to export resource type"
                    );
                    outcome.failures.push(TypeExportFailure {
                        resource_type,
                        error,
                    });
                }
                TypeResult::Cancelled => outcome.cancelled.push(resource_type),
            }
        }

        tracing::info!(
            exported = outcome.exports.len(),
            failed = outcome.failures.len(),
            cancelled = outcome.cancelled.len(),
            "bulk export finished"
        );
        Ok(outcome)
    }

    /// Pages through one type by id. Export plans are ordered by id
    /// ascending, so each page resumes after the last id already read and
    /// rows changed between pages cannot shift later rows out of reach.
    async fn export_type(&self, query: StoreQuery, cancel: &CancellationToken) -> TypeResult {
        let batch_size = self.settings.batch_size.max(1);
        let mut resources: Vec<ResourceRecord> = Vec::new();

        loop {
            if cancel.is_cancelled() {
                return TypeResult::Cancelled;
            }

            let mut page = query.clone().with_limit(Some(batch_size));
            if let Some(last) = resources.last() {
                page = page.with_predicate(Predicate::and(vec![
                    query.predicate.clone(),
                    Predicate::IdAfter(last.id),
                ]));
            }

            let output = tokio::select! {
                biased;
                _ = cancel.cancelled() => return TypeResult::Cancelled,
                output = self.store.execute(&page) => output,
            };

            match output {
                Ok(output) => {
                    let count = output.records.len();
                    resources.extend(output.records);
                    if count < batch_size || count >= output.total {
                        return TypeResult::Done(resources);
                    }
                }
                Err(error) => return TypeResult::Failed(error),
            }
        }
    }
}
