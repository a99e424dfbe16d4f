use thiserror::Error;

/// Malformed or out-of-contract input.
///
/// Raised before any store access and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Unsupported resource type: {0}")]
    UnsupportedResourceType(String),

    #[error("Unknown search parameter '{name}' for {resource_type}")]
    UnknownParameter { resource_type: String, name: String },

    #[error("Unsupported modifier ':{modifier}' for parameter '{parameter}'")]
    UnsupportedModifier { parameter: String, modifier: String },

    #[error("Invalid value for '{parameter}': {message}")]
    InvalidValue { parameter: String, message: String },

    #[error("Inverted date range for '{parameter}': {lower} is after {upper}")]
    InvertedDateRange {
        parameter: String,
        lower: String,
        upper: String,
    },

    #[error("Parameter '{parameter}' already has a {side} bound")]
    DuplicateBound { parameter: String, side: String },

    #[error("Cannot resolve reference '{reference}' for '{parameter}': {reason}")]
    UnresolvableReference {
        parameter: String,
        reference: String,
        reason: String,
    },

    #[error("Parameter '{parameter}' has no searchable field")]
    UnknownField { parameter: String },

    #[error("Unknown sort field: {0}")]
    UnknownSortField(String),

    #[error("Invalid _count {count}: must be <= {max}")]
    InvalidCount { count: usize, max: usize },

    #[error("Bulk export requires at least one patient")]
    EmptyPatientSet,

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Resource id mismatch: target is {expected}, payload carries {actual}")]
    IdMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Create a new InvalidValue error
    pub fn invalid_value(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a new UnknownParameter error
    pub fn unknown_parameter(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnknownParameter {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Create a new UnsupportedModifier error
    pub fn unsupported_modifier(parameter: impl Into<String>, modifier: impl Into<String>) -> Self {
        Self::UnsupportedModifier {
            parameter: parameter.into(),
            modifier: modifier.into(),
        }
    }

    /// Create a new UnresolvableReference error
    pub fn unresolvable_reference(
        parameter: impl Into<String>,
        reference: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnresolvableReference {
            parameter: parameter.into(),
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Create a new InvalidDocument error
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument(message.into())
    }

    /// Name of the search parameter this error refers to, if any.
    pub fn parameter(&self) -> Option<&str> {
        match self {
            Self::UnknownParameter { name, .. } => Some(name),
            Self::UnsupportedModifier { parameter, .. }
            | Self::InvalidValue { parameter, .. }
            | Self::InvertedDateRange { parameter, .. }
            | Self::DuplicateBound { parameter, .. }
            | Self::UnresolvableReference { parameter, .. }
            | Self::UnknownField { parameter } => Some(parameter),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ValidationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ValidationError::unknown_parameter("Coverage", "foo");
        assert_eq!(
            err.to_string(),
            "Unknown search parameter 'foo' for Coverage"
        );

        let err = ValidationError::InvalidCount { count: 500, max: 100 };
        assert_eq!(err.to_string(), "Invalid _count 500: must be <= 100");
    }

    #[test]
    fn test_parameter_accessor() {
        let err = ValidationError::unresolvable_reference("patient", "Foo/1", "unknown type");
        assert_eq!(err.parameter(), Some("patient"));
        assert_eq!(ValidationError::EmptyPatientSet.parameter(), None);
    }
}
