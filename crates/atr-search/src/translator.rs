//! Compiles a [`SearchParameterModel`] into a [`StoreQuery`].
//!
//! - Values of one occurrence are OR-combined; repeated occurrences of a
//!   name and distinct parameters are AND-combined.
//! - `:not` values are AND-ed exclusions next to the positive alternatives.
//! - References are normalized to `Type/id` before comparison.
//! - Ordering always ends with `id` ascending so paging is stable.
//!
//! The result carries a tag: a SHA-256 over a canonical rendering of the
//! query in which constraints are sorted by name, so two models that differ
//! only in insertion order share a tag.

use sha2::{Digest, Sha256};

use atr_core::{ValidationError, parse_resource_id};
use atr_storage::{
    CompareOp, JsonPath, Predicate, SortField, SortKey, SortKind, StoreQuery,
};

use crate::model::{Constraint, ParameterConstraint, SearchParameterModel};
use crate::parameters::{ParameterSource, SearchParameter, SearchParameterType};
use crate::types::{
    DateRangeConstraint, ReferenceConstraint, TokenConstraint, TokenValue, resolve_reference,
};

/// An executable query plus the tag identifying its result set.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedQuery {
    pub query: StoreQuery,
    pub tag: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryTranslator;

impl QueryTranslator {
    pub fn new() -> Self {
        Self
    }

    pub fn translate(&self, model: &SearchParameterModel) -> Result<TranslatedQuery, ValidationError> {
        let mut predicates = Vec::new();
        let mut canonical = Vec::new();

        for (code, constraint) in model.iter() {
            let (predicate, rendered) = self.constraint_predicate(code, constraint)?;
            predicates.push(predicate);
            canonical.push((code.to_string(), rendered));
        }

        let order = self.order(model)?;
        let query = StoreQuery::new(model.resource_type())
            .with_predicate(Predicate::and(predicates))
            .with_order(order)
            .with_limit(model.count())
            .with_offset(model.offset());

        canonical.sort();
        let tag = result_set_tag(model, &canonical);

        tracing::debug!(
            resource_type = %model.resource_type(),
            constraints = canonical.len(),
            limit = ?model.count(),
            offset = model.offset(),
            tag = %tag,
            "search translated"
        );

        Ok(TranslatedQuery { query, tag })
    }

    fn constraint_predicate(
        &self,
        code: &str,
        constraint: &ParameterConstraint,
    ) -> Result<(Predicate, String), ValidationError> {
        let param = &constraint.parameter;
        match &constraint.constraint {
            Constraint::Token(token) => token_predicate(param, token),
            Constraint::Reference(reference) => reference_predicate(param, reference),
            Constraint::Date(date) => {
                date.check_order(code)?;
                date_predicate(param, date)
            }
        }
    }

    fn order(&self, model: &SearchParameterModel) -> Result<Vec<SortKey>, ValidationError> {
        let mut keys = Vec::with_capacity(model.sort().len() + 1);

        for spec in model.sort() {
            let unknown = || ValidationError::UnknownSortField(spec.field.clone());
            let param = model
                .parameter(&spec.field)
                .filter(|p| p.sortable)
                .ok_or_else(unknown)?;

            let field = match &param.source {
                ParameterSource::RowId => SortField::Id,
                ParameterSource::LastUpdated => SortField::LastUpdated,
                ParameterSource::Elements(paths) => SortField::Path {
                    paths: paths.iter().map(|p| JsonPath::parse(p)).collect(),
                    kind: match param.param_type {
                        SearchParameterType::Date => SortKind::Date,
                        _ => SortKind::Text,
                    },
                },
            };
            keys.push(SortKey {
                field,
                direction: spec.direction,
            });
        }

        if !keys.iter().any(|k| k.field == SortField::Id) {
            keys.push(SortKey::id_ascending());
        }
        Ok(keys)
    }
}

fn element_paths(param: &SearchParameter) -> Result<Vec<JsonPath>, ValidationError> {
    match &param.source {
        ParameterSource::Elements(paths) if !paths.is_empty() => {
            Ok(paths.iter().map(|p| JsonPath::parse(p)).collect())
        }
        _ => Err(ValidationError::UnknownField {
            parameter: param.code.clone(),
        }),
    }
}

fn token_alternatives(paths: &[JsonPath], values: &[&TokenValue]) -> Predicate {
    Predicate::or(
        values
            .iter()
            .flat_map(|value| {
                paths.iter().map(move |path| Predicate::Token {
                    path: path.clone(),
                    system: value.system.clone(),
                    code: value.code.clone(),
                })
            })
            .collect(),
    )
}

fn token_predicate(
    param: &SearchParameter,
    token: &TokenConstraint,
) -> Result<(Predicate, String), ValidationError> {
    let mut parts = Vec::new();

    if param.source == ParameterSource::RowId {
        // Ids that cannot parse can never exist, so they simply match nothing
        let ids = |values: &[&TokenValue]| -> Vec<i64> {
            values
                .iter()
                .filter_map(|v| parse_resource_id(&v.code).ok())
                .collect()
        };
        for group in &token.groups {
            let (negatives, positives): (Vec<&TokenValue>, Vec<&TokenValue>) =
                group.iter().partition(|v| v.negated);
            if !positives.is_empty() {
                parts.push(Predicate::IdIn(ids(&positives)));
            }
            let excluded = ids(&negatives);
            if !excluded.is_empty() {
                parts.push(Predicate::negate(Predicate::IdIn(excluded)));
            }
        }
    } else {
        let paths = element_paths(param)?;
        for group in &token.groups {
            let (negatives, positives): (Vec<&TokenValue>, Vec<&TokenValue>) =
                group.iter().partition(|v| v.negated);
            if !positives.is_empty() {
                parts.push(token_alternatives(&paths, &positives));
            }
            for negative in &negatives {
                parts.push(Predicate::negate(token_alternatives(&paths, &[*negative])));
            }
        }
    }

    Ok((Predicate::and(parts), token.canonical()))
}

fn reference_predicate(
    param: &SearchParameter,
    reference: &ReferenceConstraint,
) -> Result<(Predicate, String), ValidationError> {
    let paths = element_paths(param)?;
    let mut parts = Vec::with_capacity(reference.groups.len());
    let mut rendered = Vec::with_capacity(reference.groups.len());

    for group in &reference.groups {
        let mut targets: Vec<String> = Vec::new();
        for value in group {
            for resolved in resolve_reference(param, value)? {
                if !targets.contains(&resolved) {
                    targets.push(resolved);
                }
            }
        }

        parts.push(Predicate::or(
            targets
                .iter()
                .flat_map(|target| {
                    paths.iter().map(move |path| Predicate::Reference {
                        path: path.clone(),
                        reference: target.clone(),
                    })
                })
                .collect(),
        ));

        targets.sort();
        rendered.push(targets.join(","));
    }

    rendered.sort();
    rendered.dedup();
    Ok((Predicate::and(parts), rendered.join("&")))
}

fn date_predicate(
    param: &SearchParameter,
    date: &DateRangeConstraint,
) -> Result<(Predicate, String), ValidationError> {
    let bounds: Vec<(CompareOp, time::OffsetDateTime)> = [
        date.lower_instant().map(|i| (CompareOp::Ge, i)),
        date.upper_instant().map(|i| (CompareOp::Lt, i)),
    ]
    .into_iter()
    .flatten()
    .collect();

    let parts = match &param.source {
        ParameterSource::LastUpdated => bounds
            .into_iter()
            .map(|(op, value)| Predicate::LastUpdated { op, value })
            .collect(),
        _ => {
            let paths = element_paths(param)?;
            bounds
                .into_iter()
                .map(|(op, value)| {
                    Predicate::or(
                        paths
                            .iter()
                            .map(|path| Predicate::Date {
                                path: path.clone(),
                                op,
                                value,
                            })
                            .collect(),
                    )
                })
                .collect()
        }
    };

    Ok((Predicate::and(parts), date.canonical()))
}

fn result_set_tag(model: &SearchParameterModel, constraints: &[(String, String)]) -> String {
    let mut canonical = format!("type={}\n", model.resource_type());
    for (code, rendered) in constraints {
        canonical.push_str(&format!("{code}={rendered}\n"));
    }
    let sort: Vec<String> = model.sort().iter().map(|s| s.canonical()).collect();
    canonical.push_str(&format!(
        "_sort={}\n_count={}\n_offset={}\n",
        sort.join(","),
        model.count().map(|c| c.to_string()).unwrap_or_default(),
        model.offset()
    ));

    hex::encode(Sha256::digest(canonical.as_bytes()))
}
