use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use atr_core::ResourceType;

/// Search parameter types this server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchParameterType {
    Token,
    Reference,
    Date,
}

impl fmt::Display for SearchParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Token => "token",
            Self::Reference => "reference",
            Self::Date => "date",
        };
        f.write_str(s)
    }
}

/// Supported search modifiers, applied as suffix to the parameter name: `name:modifier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchModifier {
    Not,
    /// Reference type restriction, e.g. `subject:Patient`
    Type(ResourceType),
}

impl SearchModifier {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not" => Some(Self::Not),
            other => other.parse::<ResourceType>().ok().map(Self::Type),
        }
    }

    pub fn applicable_to(&self, param_type: SearchParameterType) -> bool {
        match self {
            Self::Not => param_type == SearchParameterType::Token,
            Self::Type(_) => param_type == SearchParameterType::Reference,
        }
    }
}

/// Prefixes for date search values, e.g. `ge2020-01-01`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPrefix {
    Eq,
    Gt,
    Lt,
    Ge,
    Le,
    Sa, // starts after
    Eb, // ends before
}

impl fmt::Display for SearchPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchPrefix::Eq => "eq",
            SearchPrefix::Gt => "gt",
            SearchPrefix::Lt => "lt",
            SearchPrefix::Ge => "ge",
            SearchPrefix::Le => "le",
            SearchPrefix::Sa => "sa",
            SearchPrefix::Eb => "eb",
        };
        f.write_str(s)
    }
}

impl SearchPrefix {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(Self::Eq),
            "gt" => Some(Self::Gt),
            "lt" => Some(Self::Lt),
            "ge" => Some(Self::Ge),
            "le" => Some(Self::Le),
            "sa" => Some(Self::Sa),
            "eb" => Some(Self::Eb),
            _ => None,
        }
    }

    /// Splits a leading two-letter prefix off a raw value.
    pub fn split(value: &str) -> (Option<Self>, &str) {
        if let Some(head) = value.get(..2)
            && let Some(prefix) = Self::parse(head)
        {
            return (Some(prefix), &value[2..]);
        }
        (None, value)
    }
}

/// Where a parameter's values live in a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterSource {
    /// The identity column (`_id`)
    RowId,
    /// The `last_updated_ts` column (`_lastUpdated`)
    LastUpdated,
    /// Element paths inside the document, tried as alternatives
    Elements(Vec<String>),
}

/// A search parameter definition.
#[derive(Debug, Clone)]
pub struct SearchParameter {
    /// The code used in search queries (e.g., "patient", "effective")
    pub code: String,
    pub param_type: SearchParameterType,
    pub source: ParameterSource,
    /// Target resource types for reference parameters
    pub targets: Vec<ResourceType>,
    pub sortable: bool,
}

impl SearchParameter {
    pub fn new(code: impl Into<String>, param_type: SearchParameterType, source: ParameterSource) -> Self {
        Self {
            code: code.into(),
            param_type,
            source,
            targets: Vec::new(),
            sortable: false,
        }
    }

    pub fn token(code: impl Into<String>, paths: &[&str]) -> Self {
        Self::new(code, SearchParameterType::Token, ParameterSource::elements(paths))
    }

    pub fn reference(code: impl Into<String>, paths: &[&str], targets: &[ResourceType]) -> Self {
        Self::new(code, SearchParameterType::Reference, ParameterSource::elements(paths))
            .with_targets(targets.to_vec())
    }

    pub fn date(code: impl Into<String>, paths: &[&str]) -> Self {
        Self::new(code, SearchParameterType::Date, ParameterSource::elements(paths))
    }

    #[must_use]
    pub fn with_targets(mut self, targets: Vec<ResourceType>) -> Self {
        self.targets = targets;
        self
    }

    #[must_use]
    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    /// Element paths, empty for column-backed parameters.
    pub fn paths(&self) -> &[String] {
        match &self.source {
            ParameterSource::Elements(paths) => paths,
            _ => &[],
        }
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl ParameterSource {
    fn elements(paths: &[&str]) -> Self {
        Self::Elements(paths.iter().map(|p| p.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_split() {
        assert_eq!(SearchPrefix::split("ge2023-01-01"), (Some(SearchPrefix::Ge), "2023-01-01"));
        assert_eq!(SearchPrefix::split("2023-01-01"), (None, "2023-01-01"));
        assert_eq!(SearchPrefix::split("e"), (None, "e"));
    }

    #[test]
    fn test_modifier_parse_and_applicability() {
        assert_eq!(SearchModifier::parse("not"), Some(SearchModifier::Not));
        assert_eq!(
            SearchModifier::parse("Patient"),
            Some(SearchModifier::Type(ResourceType::Patient))
        );
        assert_eq!(SearchModifier::parse("exact"), None);

        assert!(SearchModifier::Not.applicable_to(SearchParameterType::Token));
        assert!(!SearchModifier::Not.applicable_to(SearchParameterType::Date));
        assert!(
            SearchModifier::Type(ResourceType::Group).applicable_to(SearchParameterType::Reference)
        );
    }

    #[test]
    fn test_parameter_builders() {
        let p = SearchParameter::reference("subject", &["subject"], &[ResourceType::Patient]);
        assert_eq!(p.param_type, SearchParameterType::Reference);
        assert_eq!(p.paths(), ["subject"]);
        assert_eq!(p.targets, vec![ResourceType::Patient]);
        assert!(!p.sortable);
    }
}
