//! Caller-visible errors of the resource services.

use std::fmt;

use thiserror::Error;

use atr_core::{ResourceType, ValidationError};
use atr_storage::StorageError;

use crate::bulk::{TypeExport, TypeExportFailure};

/// The four error kinds a caller can tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Store,
    PartialExport,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::NotFound => write!(f, "not_found"),
            Self::Store => write!(f, "store"),
            Self::PartialExport => write!(f, "partial_export"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Resource not found: {resource_type}/{id}{}", version.as_ref().map(|v| format!("/_history/{v}")).unwrap_or_default())]
    NotFound {
        resource_type: String,
        id: String,
        version: Option<String>,
    },

    #[error("Store error: {0}")]
    Store(StorageError),

    #[error(transparent)]
    PartialExport(#[from] PartialExportError),
}

impl ServiceError {
    pub fn not_found(resource_type: ResourceType, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.to_string(),
            id: id.into(),
            version: None,
        }
    }

    pub fn version_not_found(
        resource_type: ResourceType,
        id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            resource_type: resource_type.to_string(),
            id: id.into(),
            version: Some(version.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Store(_) => ErrorKind::Store,
            Self::PartialExport(_) => ErrorKind::PartialExport,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// FHIR `OperationOutcome.issue.code` for this error.
    pub fn issue_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid",
            Self::NotFound { .. } => "not-found",
            Self::Store(e) if e.is_unavailable() => "transient",
            Self::Store(_) => "exception",
            Self::PartialExport(_) => "incomplete",
        }
    }
}

/// A missing row reported by the store is a caller-visible `NotFound`.
impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { resource_type, id } => Self::NotFound {
                resource_type,
                id,
                version: None,
            },
            other => Self::Store(other),
        }
    }
}

/// Some resource types of a bulk export failed while others completed.
#[derive(Debug)]
pub struct PartialExportError {
    pub exports: Vec<TypeExport>,
    pub failures: Vec<TypeExportFailure>,
    pub cancelled: Vec<ResourceType>,
}

impl fmt::Display for PartialExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed: Vec<&str> = self
            .failures
            .iter()
            .map(|failure| failure.resource_type.as_str())
            .collect();
        write!(
            f,
            "Bulk export failed for {} resource type(s): {}",
            failed.len(),
            failed.join(", ")
        )
    }
}

impl std::error::Error for PartialExportError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_not_found_maps_to_not_found() {
        let err = ServiceError::from(StorageError::not_found("Coverage", "4"));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Resource not found: Coverage/4");

        let err = ServiceError::from(StorageError::unavailable("connection refused"));
        assert_eq!(err.kind(), ErrorKind::Store);
        assert_eq!(err.issue_code(), "transient");
    }

    #[test]
    fn test_version_in_message() {
        let err = ServiceError::version_not_found(ResourceType::MedicationStatement, "5", "2");
        assert_eq!(
            err.to_string(),
            "Resource not found: MedicationStatement/5/_history/2"
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn test_validation_is_transparent() {
        let err = ServiceError::from(ValidationError::EmptyPatientSet);
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), ValidationError::EmptyPatientSet.to_string());
        assert_eq!(err.issue_code(), "invalid");
    }
}
