//! Evaluation of the store query IR against in-memory rows.

use std::cmp::Ordering;

use serde_json::Value;
use time::OffsetDateTime;

use atr_core::canonical_reference;
use atr_core::time::start_instant;
use atr_storage::{JsonPath, Predicate, SortDirection, SortField, SortKey, SortKind};

use crate::storage::Row;

/// Collects every node reachable along `path`, flattening arrays.
fn collect<'a>(value: &'a Value, segments: &[String], out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect(item, segments, out);
            }
        }
        _ => match segments.split_first() {
            None => out.push(value),
            Some((head, rest)) => {
                if let Some(next) = value.get(head.as_str()) {
                    collect(next, rest, out);
                }
            }
        },
    }
}

fn nodes<'a>(row: &'a Row, path: &JsonPath) -> Vec<&'a Value> {
    let mut out = Vec::new();
    if let Some((head, rest)) = path.segments().split_first()
        && let Some(value) = row.document.get(head)
    {
        collect(value, rest, &mut out);
    }
    out
}

pub(crate) fn matches(predicate: &Predicate, id: i64, row: &Row) -> bool {
    match predicate {
        Predicate::All(items) => items.iter().all(|p| matches(p, id, row)),
        Predicate::Any(items) => items.iter().any(|p| matches(p, id, row)),
        Predicate::Not(inner) => !matches(inner, id, row),
        Predicate::IdIn(ids) => ids.contains(&id),
        Predicate::IdAfter(after) => id > *after,
        Predicate::Token { path, system, code } => nodes(row, path)
            .into_iter()
            .any(|node| token_matches(node, system.as_deref(), code)),
        Predicate::Reference { path, reference } => nodes(row, path)
            .into_iter()
            .any(|node| reference_matches(node, reference)),
        Predicate::Date { path, op, value } => nodes(row, path)
            .into_iter()
            .filter_map(Value::as_str)
            .filter_map(start_instant)
            .any(|instant| op.compare(&instant, value)),
        Predicate::LastUpdated { op, value } => op.compare(&row.last_updated, value),
    }
}

fn system_matches(stored: Option<&str>, wanted: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some("") => stored.is_none_or(str::is_empty),
        Some(system) => stored == Some(system),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Token match against a code, Coding, CodeableConcept or Identifier node.
fn token_matches(node: &Value, system: Option<&str>, code: &str) -> bool {
    match node {
        Value::Object(obj) => {
            if let Some(Value::Array(codings)) = obj.get("coding") {
                return codings.iter().any(|c| token_matches(c, system, code));
            }
            let stored_system = obj.get("system").and_then(Value::as_str);
            let stored_code = obj
                .get("code")
                .or_else(|| obj.get("value"))
                .and_then(scalar_text);
            stored_code.as_deref() == Some(code) && system_matches(stored_system, system)
        }
        other => {
            system_matches(None, system) && scalar_text(other).as_deref() == Some(code)
        }
    }
}

fn reference_matches(node: &Value, reference: &str) -> bool {
    let stored = match node {
        Value::Object(obj) => obj.get("reference").and_then(Value::as_str),
        Value::String(s) => Some(s.as_str()),
        _ => None,
    };
    stored
        .and_then(canonical_reference)
        .is_some_and(|canonical| canonical == reference)
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortValue {
    Int(i64),
    Instant(OffsetDateTime),
    Text(String),
}

fn sort_value(field: &SortField, id: i64, row: &Row) -> Option<SortValue> {
    match field {
        SortField::Id => Some(SortValue::Int(id)),
        SortField::LastUpdated => Some(SortValue::Instant(row.last_updated)),
        SortField::Path { paths, kind } => paths.iter().find_map(|path| {
            nodes(row, path).into_iter().find_map(|node| match kind {
                SortKind::Text => sort_text(node).map(SortValue::Text),
                SortKind::Date => node.as_str().and_then(start_instant).map(SortValue::Instant),
            })
        }),
    }
}

fn sort_text(node: &Value) -> Option<String> {
    match node {
        Value::Object(obj) => {
            if let Some(Value::Array(codings)) = obj.get("coding") {
                return codings.iter().find_map(sort_text);
            }
            obj.get("code")
                .or_else(|| obj.get("value"))
                .or_else(|| obj.get("reference"))
                .and_then(scalar_text)
        }
        other => scalar_text(other),
    }
}

/// Orders two rows by the full key list. Missing values sort last.
pub(crate) fn compare_rows(order: &[SortKey], a: (i64, &Row), b: (i64, &Row)) -> Ordering {
    for key in order {
        let left = sort_value(&key.field, a.0, a.1);
        let right = sort_value(&key.field, b.0, b.1);
        let ordering = match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(l), Some(r)) => match key.direction {
                SortDirection::Ascending => l.cmp(&r),
                SortDirection::Descending => r.cmp(&l),
            },
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
