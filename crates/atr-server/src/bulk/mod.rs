//! Patient-scoped bulk export across resource types.

mod export;

pub use export::BulkExportEngine;

use time::OffsetDateTime;

use atr_core::{DateRange, ResourceType, ValidationError, parse_date_range};
use atr_storage::{ResourceRecord, StorageError};

use crate::error::{PartialExportError, ServiceError};

/// One export call: patients, an inclusive date window and the wanted types.
///
/// An empty type list asks for every type the deployment exports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkExportRequest {
    pub patients: Vec<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub resource_types: Vec<String>,
}

impl BulkExportRequest {
    pub fn new(
        patients: impl IntoIterator<Item = impl Into<String>>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self {
            patients: patients.into_iter().map(Into::into).collect(),
            start: Some(start.into()),
            end: Some(end.into()),
            resource_types: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_types(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.resource_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Checks the request shape before any store access.
    pub(crate) fn validate(&self) -> Result<ExportWindow, ValidationError> {
        if self.patients.is_empty() {
            return Err(ValidationError::EmptyPatientSet);
        }
        for patient in &self.patients {
            let id = patient.trim();
            if id.is_empty() || id.contains(',') {
                return Err(ValidationError::invalid_value(
                    "patient",
                    format!("'{patient}' is not a patient id"),
                ));
            }
        }

        let bound = |name: &str, raw: &Option<String>| -> Result<(String, DateRange), ValidationError> {
            let raw = raw
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ValidationError::MissingParameter(name.to_string()))?;
            let range =
                parse_date_range(raw).map_err(|e| ValidationError::invalid_value(name, e.to_string()))?;
            Ok((raw.to_string(), range))
        };
        let (start, start_range) = bound("start", &self.start)?;
        let (end, end_range) = bound("end", &self.end)?;

        // Each bound covers its whole precision range; the window is empty
        // only when the start begins at or after the end's range is over.
        if start_range.start >= end_range.end {
            return Err(ValidationError::InvertedDateRange {
                parameter: "window".to_string(),
                lower: start,
                upper: end,
            });
        }

        Ok(ExportWindow {
            start,
            end,
            start_instant: start_range.start,
            end_instant: end_range.end,
        })
    }
}

/// Validated date window, kept in the caller's precision.
#[derive(Debug, Clone)]
pub(crate) struct ExportWindow {
    pub start: String,
    pub end: String,
    pub start_instant: OffsetDateTime,
    pub end_instant: OffsetDateTime,
}

/// The ordered resources of one type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeExport {
    pub resource_type: ResourceType,
    pub resources: Vec<ResourceRecord>,
}

#[derive(Debug)]
pub struct TypeExportFailure {
    pub resource_type: ResourceType,
    pub error: StorageError,
}

/// Per-type results in request order.
#[derive(Debug, Default)]
pub struct BulkExportOutcome {
    pub exports: Vec<TypeExport>,
    pub failures: Vec<TypeExportFailure>,
    /// Types not finished when the export was cancelled
    pub cancelled: Vec<ResourceType>,
}

impl BulkExportOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.cancelled.is_empty()
    }

    pub fn export(&self, resource_type: ResourceType) -> Option<&TypeExport> {
        self.exports.iter().find(|e| e.resource_type == resource_type)
    }

    /// Turns per-type failures into a [`ServiceError::PartialExport`].
    pub fn into_result(self) -> Result<Self, ServiceError> {
        if self.failures.is_empty() {
            return Ok(self);
        }
        Err(ServiceError::PartialExport(PartialExportError {
            exports: self.exports,
            failures: self.failures,
            cancelled: self.cancelled,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_validate_window() {
        let window = BulkExportRequest::new(["7"], "2023-01-01", "2023-01-31")
            .validate()
            .unwrap();
        assert_eq!(window.start_instant, datetime!(2023-01-01 0:00 UTC));
        assert_eq!(window.end_instant, datetime!(2023-02-01 0:00 UTC));

        // Same day on both ends
        assert!(
            BulkExportRequest::new(["7"], "2023-01-15", "2023-01-15")
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_start_inside_end_day() {
        let window = BulkExportRequest::new(["7"], "2023-01-15T10:00:00Z", "2023-01-15")
            .validate()
            .unwrap();
        assert_eq!(window.start_instant, datetime!(2023-01-15 10:00 UTC));
        assert_eq!(window.end_instant, datetime!(2023-01-16 0:00 UTC));

        assert!(matches!(
            BulkExportRequest::new(["7"], "2023-02-01", "2023-01-31").validate(),
            Err(ValidationError::InvertedDateRange { .. })
        ));
        assert!(matches!(
            BulkExportRequest::new(["7"], "2023-01-16", "2023-01-15").validate(),
            Err(ValidationError::InvertedDateRange { .. })
        ));
    }

    #[test]
    fn test_validate_rejects() {
        let empty: [&str; 0] = [];
        assert_eq!(
            BulkExportRequest::new(empty, "2023", "2024").validate().unwrap_err(),
            ValidationError::EmptyPatientSet
        );
        assert!(matches!(
            BulkExportRequest::new(["7"], "2023-02-01", "2023-01-01").validate(),
            Err(ValidationError::InvertedDateRange { .. })
        ));
        assert!(matches!(
            BulkExportRequest::new(["7"], "yesterday", "2023-01-01").validate(),
            Err(ValidationError::InvalidValue { .. })
        ));
        assert!(matches!(
            BulkExportRequest::new(["7,8"], "2023", "2023").validate(),
            Err(ValidationError::InvalidValue { .. })
        ));

        let mut request = BulkExportRequest::new(["7"], "2023", "2024");
        request.end = None;
        assert_eq!(
            request.validate().unwrap_err(),
            ValidationError::MissingParameter("end".to_string())
        );
    }

    #[test]
    fn test_into_result() {
        let outcome = BulkExportOutcome {
            exports: vec![TypeExport {
                resource_type: ResourceType::Coverage,
                resources: Vec::new(),
            }],
            failures: vec![TypeExportFailure {
                resource_type: ResourceType::MedicationStatement,
                error: StorageError::unavailable("down"),
            }],
            cancelled: Vec::new(),
        };
        let Err(ServiceError::PartialExport(partial)) = outcome.into_result() else {
            panic!("expected partial export");
        };
        assert_eq!(partial.exports.len(), 1);
        assert_eq!(
            partial.to_string(),
            "Bulk export failed for 1 resource type(s): MedicationStatement"
        );
    }
}
