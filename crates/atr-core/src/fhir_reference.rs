//! Reduction of `Reference.reference` strings to `Type/id`.
//!
//! Relative, versioned (`.../_history/n`) and absolute forms of the same
//! target all reduce to one [`ResourceRef`]. Absolute URLs are not checked
//! against a server base: the trailing `Type/id` pair is what identifies the
//! target here.
//!
//! ```
//! use atr_core::ResourceRef;
//!
//! let r: ResourceRef = "https://ehr.example.org/fhir/Coverage/9/_history/2".parse().unwrap();
//! assert_eq!(r.relative(), "Coverage/9");
//! assert_eq!(r.version.as_deref(), Some("2"));
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::fhir::ResourceType;

const HISTORY: &str = "_history";

/// A resolvable reference target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub resource_type: ResourceType,
    pub id: String,
    pub version: Option<String>,
}

/// Why a reference string names nothing in this store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("'{0}' points into the containing resource")]
    Contained(String),

    #[error("'{0}' is a URN, not a resource address")]
    Urn(String),

    #[error("unknown resource type {0}")]
    UnknownType(String),

    #[error("'{0}' has no Type/id pair")]
    Malformed(String),
}

impl ResourceRef {
    pub fn new(resource_type: ResourceType, id: impl Into<String>) -> Self {
        Self {
            resource_type,
            id: id.into(),
            version: None,
        }
    }

    /// `Type/id`, without any version.
    pub fn relative(&self) -> String {
        format!("{}/{}", self.resource_type, self.id)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.relative())?;
        if let Some(version) = &self.version {
            write!(f, "/{HISTORY}/{version}")?;
        }
        Ok(())
    }
}

impl FromStr for ResourceRef {
    type Err = ReferenceError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.starts_with('#') {
            return Err(ReferenceError::Contained(raw.to_string()));
        }
        if raw.starts_with("urn:") {
            return Err(ReferenceError::Urn(raw.to_string()));
        }

        let path = raw.split_once("://").map_or(raw, |(_, rest)| rest);
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        // Peel `_history/<v>` off the end before taking the last two segments
        let version = match segments.as_slice() {
            [.., marker, v] if *marker == HISTORY => Some(v.to_string()),
            _ => None,
        };
        if version.is_some() {
            segments.truncate(segments.len() - 2);
        }

        let (type_name, id) = match segments.as_slice() {
            [.., t, id] if *t != HISTORY && *id != HISTORY => (*t, *id),
            _ => return Err(ReferenceError::Malformed(raw.to_string())),
        };

        let resource_type = type_name
            .parse::<ResourceType>()
            .map_err(|_| ReferenceError::UnknownType(type_name.to_string()))?;

        Ok(Self {
            resource_type,
            id: id.to_string(),
            version,
        })
    }
}

/// `Type/id` for a stored reference value, `None` when it names nothing here.
pub fn canonical_reference(reference: &str) -> Option<String> {
    reference.parse::<ResourceRef>().ok().map(|r| r.relative())
}
