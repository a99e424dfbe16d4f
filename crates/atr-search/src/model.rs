//! Typed representation of one search request.
//!
//! The boundary layer feeds raw `name=value` pairs into
//! [`SearchParameterModel::add_constraint`]; values are validated and stored
//! typed as they arrive, so a model that exists is always well formed.
//!
//! ```
//! use atr_search::{SearchParameterModel, SearchParameterRegistry};
//!
//! let registry = SearchParameterRegistry::r4();
//! let mut model = SearchParameterModel::for_resource(&registry, "MedicationStatement").unwrap();
//! model.add_constraint("status", "active,completed").unwrap();
//! model.add_constraint("effective", "ge2023-01-01").unwrap();
//! assert_eq!(model.iter().count(), 2);
//! ```

use std::sync::Arc;

use indexmap::IndexMap;

use atr_core::{ResourceType, ValidationError};
use atr_storage::SortDirection;

use crate::parameters::{SearchModifier, SearchParameter, SearchParameterType};
use crate::registry::SearchParameterRegistry;
use crate::types::{
    DateRangeConstraint, ReferenceConstraint, ReferenceValue, TokenConstraint, TokenValue,
};

/// Typed values of one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Token(TokenConstraint),
    Reference(ReferenceConstraint),
    Date(DateRangeConstraint),
}

#[derive(Debug, Clone)]
pub struct ParameterConstraint {
    pub parameter: Arc<SearchParameter>,
    pub constraint: Constraint,
}

impl ParameterConstraint {
    fn empty(parameter: Arc<SearchParameter>) -> Self {
        let constraint = match parameter.param_type {
            SearchParameterType::Token => Constraint::Token(TokenConstraint::default()),
            SearchParameterType::Reference => Constraint::Reference(ReferenceConstraint::default()),
            SearchParameterType::Date => Constraint::Date(DateRangeConstraint::default()),
        };
        Self {
            parameter,
            constraint,
        }
    }
}

/// One sort field with its direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Parses `_sort` syntax: comma separated fields, `-` prefix for descending.
    pub fn parse(raw: &str) -> Vec<Self> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|field| match field.strip_prefix('-') {
                Some(name) => Self::descending(name),
                None => Self::ascending(field),
            })
            .collect()
    }

    /// `field` or `-field`.
    pub fn canonical(&self) -> String {
        match self.direction {
            SortDirection::Ascending => self.field.clone(),
            SortDirection::Descending => format!("-{}", self.field),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchParameterModel {
    resource_type: ResourceType,
    /// Parameters known for this resource type, by code
    parameters: IndexMap<String, Arc<SearchParameter>>,
    /// Constraints keyed by parameter code, in insertion order
    constraints: IndexMap<String, ParameterConstraint>,
    sort: Vec<SortSpec>,
    count: Option<usize>,
    offset: usize,
    includes: Vec<String>,
}

impl SearchParameterModel {
    /// Creates an empty model for a registered resource type.
    pub fn for_resource(
        registry: &SearchParameterRegistry,
        resource_type: &str,
    ) -> Result<Self, ValidationError> {
        let rt = registry.resource_type(resource_type)?;
        Ok(Self::for_type(registry, rt))
    }

    pub fn for_type(registry: &SearchParameterRegistry, resource_type: ResourceType) -> Self {
        let parameters = registry
            .params_for(resource_type)
            .into_iter()
            .map(|p| (p.code.clone(), p))
            .collect();
        Self {
            resource_type,
            parameters,
            constraints: IndexMap::new(),
            sort: Vec::new(),
            count: None,
            offset: 0,
            includes: Vec::new(),
        }
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Parses and stores one raw boundary value.
    ///
    /// `name` may carry a modifier (`status:not`, `subject:Patient`); commas in
    /// `raw` separate OR alternatives. Repeating a token or reference name adds
    /// a group that is AND-ed with the earlier ones; repeating a date name fills
    /// the other bound. On error the model is left unchanged.
    pub fn add_constraint(&mut self, name: &str, raw: &str) -> Result<(), ValidationError> {
        let (code, modifier) = match name.split_once(':') {
            Some((code, modifier)) => (code, Some(modifier)),
            None => (name, None),
        };

        let parameter = self
            .parameters
            .get(code)
            .cloned()
            .ok_or_else(|| ValidationError::unknown_parameter(self.resource_type.as_str(), code))?;

        let modifier = match modifier {
            None => None,
            Some(m) => match SearchModifier::parse(m) {
                Some(parsed) if parsed.applicable_to(parameter.param_type) => Some(parsed),
                _ => return Err(ValidationError::unsupported_modifier(code, m)),
            },
        };

        let values: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect();
        if values.is_empty() {
            return Err(ValidationError::invalid_value(code, "empty value"));
        }

        let mut entry = self
            .constraints
            .get(code)
            .cloned()
            .unwrap_or_else(|| ParameterConstraint::empty(Arc::clone(&parameter)));

        match &mut entry.constraint {
            Constraint::Token(token) => {
                let negated = modifier == Some(SearchModifier::Not);
                let group = values
                    .into_iter()
                    .map(|value| TokenValue::parse(code, value, negated))
                    .collect::<Result<Vec<_>, _>>()?;
                token.push_group(group);
            }
            Constraint::Reference(reference) => {
                let type_hint = match modifier {
                    Some(SearchModifier::Type(rt)) => Some(rt),
                    _ => None,
                };
                reference.push_group(
                    values
                        .into_iter()
                        .map(|v| ReferenceValue {
                            raw: v.to_string(),
                            type_hint,
                        })
                        .collect(),
                );
            }
            Constraint::Date(date) => {
                for value in values {
                    date.add(code, value)?;
                }
            }
        }

        self.constraints.insert(code.to_string(), entry);
        Ok(())
    }

    pub fn set_sort(&mut self, sort: Vec<SortSpec>) -> &mut Self {
        self.sort = sort;
        self
    }

    pub fn set_count(&mut self, count: Option<usize>) -> &mut Self {
        self.count = count;
        self
    }

    pub fn set_offset(&mut self, offset: usize) -> &mut Self {
        self.offset = offset;
        self
    }

    /// Include set is a hint forwarded to the caller, never materialized.
    pub fn set_includes(&mut self, includes: Vec<String>) -> &mut Self {
        self.includes = includes;
        self
    }

    pub fn sort(&self) -> &[SortSpec] {
        &self.sort
    }

    pub fn count(&self) -> Option<usize> {
        self.count
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    pub fn parameter(&self, code: &str) -> Option<&Arc<SearchParameter>> {
        self.parameters.get(code)
    }

    pub fn constraint(&self, code: &str) -> Option<&ParameterConstraint> {
        self.constraints.get(code)
    }

    /// True when no filter constraint has been added.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Constraints in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterConstraint)> {
        self.constraints.iter().map(|(k, v)| (k.as_str(), v))
    }
}
