//! PostgreSQL rendering of the store query IR.
//!
//! Tables are `<resource type lowercased>(id bigint, data jsonb, last_updated_ts timestamptz)`.
//! Every value reaches the database as a bind parameter; JSON paths are
//! built only from validated element names and bound as `jsonpath` text.
//!
//! Stored date elements must be castable to `timestamptz`.

use std::fmt;

use thiserror::Error;

use atr_core::time::format_instant;
use atr_storage::{
    JsonPath, Predicate, SortDirection, SortField, SortKind, SortKey, StoreQuery,
};

/// Errors that can occur during SQL building.
#[derive(Debug, Error)]
pub enum SqlBuilderError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid JSON path: {0}")]
    InvalidPath(String),
}

/// A SQL parameter value with its type information.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Json(String),
    Timestamp(String),
    BigIntArray(Vec<i64>),
    BigInt(i64),
}

impl SqlParam {
    /// Get the value as a string for logging.
    pub fn as_str(&self) -> String {
        match self {
            Self::Text(s) | Self::Json(s) | Self::Timestamp(s) => s.clone(),
            Self::BigInt(id) => id.to_string(),
            Self::BigIntArray(ids) => {
                let ids: Vec<String> = ids.iter().map(i64::to_string).collect();
                format!("{{{}}}", ids.join(","))
            }
        }
    }
}

/// A built SQL query with parameters.
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl fmt::Display for BuiltQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

/// Accumulates bind parameters and hands out their `$N` numbers.
#[derive(Debug, Default)]
pub struct SqlBuilder {
    params: Vec<SqlParam>,
}

impl SqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text parameter and return its placeholder number.
    pub fn add_text_param(&mut self, value: impl Into<String>) -> usize {
        self.push(SqlParam::Text(value.into()))
    }

    /// Add a JSON parameter and return its placeholder number.
    pub fn add_json_param(&mut self, value: impl Into<String>) -> usize {
        self.push(SqlParam::Json(value.into()))
    }

    /// Add a timestamp parameter and return its placeholder number.
    pub fn add_timestamp_param(&mut self, value: impl Into<String>) -> usize {
        self.push(SqlParam::Timestamp(value.into()))
    }

    pub fn add_id_array_param(&mut self, ids: Vec<i64>) -> usize {
        self.push(SqlParam::BigIntArray(ids))
    }

    pub fn add_id_param(&mut self, id: i64) -> usize {
        self.push(SqlParam::BigInt(id))
    }

    fn push(&mut self, param: SqlParam) -> usize {
        self.params.push(param);
        self.params.len()
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn into_params(self) -> Vec<SqlParam> {
        self.params
    }

    /// OR-join a group; an empty group is `FALSE`.
    pub fn build_or_clause(conditions: &[String]) -> String {
        match conditions {
            [] => "FALSE".to_string(),
            [single] => single.clone(),
            _ => format!("({})", conditions.join(" OR ")),
        }
    }

    /// AND-join a group; an empty group is `TRUE`.
    pub fn build_and_clause(conditions: &[String]) -> String {
        match conditions {
            [] => "TRUE".to_string(),
            [single] => single.clone(),
            _ => format!("({})", conditions.join(" AND ")),
        }
    }
}

/// Only allows alphanumeric characters and underscores.
fn validate_identifier(name: &str) -> Result<(), SqlBuilderError> {
    if name.is_empty() {
        return Err(SqlBuilderError::InvalidIdentifier(
            "Empty identifier".to_string(),
        ));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SqlBuilderError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

/// Escape a PostgreSQL identifier (table name, column name).
pub fn escape_identifier(name: &str) -> Result<String, SqlBuilderError> {
    validate_identifier(name)?;
    Ok(format!("\"{name}\""))
}

/// Build a lax-mode SQL/JSON path (`$."a"."b"`); arrays along the way are unwrapped.
pub fn build_jsonpath(path: &JsonPath) -> Result<String, SqlBuilderError> {
    if path.segments().is_empty() {
        return Err(SqlBuilderError::InvalidPath(path.to_string()));
    }
    let mut out = String::from("$");
    for segment in path.segments() {
        validate_identifier(segment).map_err(|_| SqlBuilderError::InvalidPath(path.to_string()))?;
        out.push_str(&format!(".\"{segment}\""));
    }
    Ok(out)
}

const TOKEN_ANY_SYSTEM: &str = "@ == $code || @.code == $code || @.value == $code \
     || exists(@.coding ? (@.code == $code))";
const TOKEN_NO_SYSTEM: &str = "((@ == $code || @.code == $code || @.value == $code) && !exists(@.system)) \
     || exists(@.coding ? (@.code == $code && !exists(@.system)))";
const TOKEN_WITH_SYSTEM: &str = "((@.code == $code || @.value == $code) && @.system == $system) \
     || exists(@.coding ? (@.code == $code && @.system == $system))";

fn render_predicate(
    predicate: &Predicate,
    builder: &mut SqlBuilder,
) -> Result<String, SqlBuilderError> {
    let sql = match predicate {
        Predicate::All(items) => {
            let parts = items
                .iter()
                .map(|p| render_predicate(p, builder))
                .collect::<Result<Vec<_>, _>>()?;
            SqlBuilder::build_and_clause(&parts)
        }
        Predicate::Any(items) => {
            let parts = items
                .iter()
                .map(|p| render_predicate(p, builder))
                .collect::<Result<Vec<_>, _>>()?;
            SqlBuilder::build_or_clause(&parts)
        }
        Predicate::Not(inner) => format!("NOT ({})", render_predicate(inner, builder)?),
        Predicate::IdIn(ids) if ids.is_empty() => "FALSE".to_string(),
        Predicate::IdIn(ids) => {
            let n = builder.add_id_array_param(ids.clone());
            format!("id = ANY(${n}::bigint[])")
        }
        Predicate::IdAfter(after) => {
            let n = builder.add_id_param(*after);
            format!("id > ${n}::bigint")
        }
        Predicate::Token { path, system, code } => {
            let filter = match system.as_deref() {
                None => TOKEN_ANY_SYSTEM,
                Some("") => TOKEN_NO_SYSTEM,
                Some(_) => TOKEN_WITH_SYSTEM,
            };
            let jsonpath = format!("{} ? ({filter})", build_jsonpath(path)?);
            let vars = serde_json::json!({ "code": code, "system": system });
            let p = builder.add_text_param(jsonpath);
            let v = builder.add_json_param(vars.to_string());
            format!("jsonb_path_exists(data, ${p}::jsonpath, ${v}::jsonb)")
        }
        Predicate::Reference { path, reference } => {
            let jsonpath = format!("{}.\"reference\"", build_jsonpath(path)?);
            let p = builder.add_text_param(jsonpath);
            let r = builder.add_text_param(reference.clone());
            format!(
                "EXISTS (SELECT 1 FROM jsonb_path_query(data, ${p}::jsonpath) AS ref(v) \
                 WHERE v #>> '{{}}' = ${r} OR v #>> '{{}}' LIKE '%/' || ${r} \
                 OR v #>> '{{}}' LIKE '%/' || ${r} || '/_history/%')"
            )
        }
        Predicate::Date { path, op, value } => {
            let p = builder.add_text_param(build_jsonpath(path)?);
            let t = builder.add_timestamp_param(format_instant(value));
            format!(
                "EXISTS (SELECT 1 FROM jsonb_path_query(data, ${p}::jsonpath) AS d(v) \
                 WHERE (v #>> '{{}}')::timestamptz {} ${t}::timestamptz)",
                op.as_str()
            )
        }
        Predicate::LastUpdated { op, value } => {
            let t = builder.add_timestamp_param(format_instant(value));
            format!("last_updated_ts {} ${t}::timestamptz", op.as_str())
        }
    };
    Ok(sql)
}

fn render_sort_key(key: &SortKey, builder: &mut SqlBuilder) -> Result<String, SqlBuilderError> {
    let expr = match &key.field {
        SortField::Id => "id".to_string(),
        SortField::LastUpdated => "last_updated_ts".to_string(),
        SortField::Path { paths, kind } => {
            let cast = match kind {
                SortKind::Date => "::timestamptz",
                SortKind::Text => "",
            };
            let mut values = Vec::with_capacity(paths.len());
            for path in paths {
                let p = builder.add_text_param(build_jsonpath(path)?);
                values.push(format!(
                    "(jsonb_path_query_first(data, ${p}::jsonpath) #>> '{{}}'){cast}"
                ));
            }
            match values.len() {
                1 => values.remove(0),
                _ => format!("COALESCE({})", values.join(", ")),
            }
        }
    };
    let direction = match key.direction {
        SortDirection::Ascending => "ASC",
        SortDirection::Descending => "DESC",
    };
    Ok(format!("{expr} {direction} NULLS LAST"))
}

/// Render a query as one parameterized PostgreSQL statement.
pub fn render_postgres(query: &StoreQuery) -> Result<BuiltQuery, SqlBuilderError> {
    let mut builder = SqlBuilder::new();
    let table = escape_identifier(&query.resource_type.table_name())?;

    let mut sql = format!("SELECT id, data, last_updated_ts FROM {table}");

    if !query.predicate.is_always() {
        let where_sql = render_predicate(&query.predicate, &mut builder)?;
        sql.push_str(" WHERE ");
        sql.push_str(&where_sql);
    }

    if !query.order.is_empty() {
        let keys = query
            .order
            .iter()
            .map(|key| render_sort_key(key, &mut builder))
            .collect::<Result<Vec<_>, _>>()?;
        sql.push_str(" ORDER BY ");
        sql.push_str(&keys.join(", "));
    }

    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    if query.offset > 0 {
        sql.push_str(&format!(" OFFSET {}", query.offset));
    }

    tracing::trace!(sql = %sql, params = builder.param_count(), "rendered store query");

    Ok(BuiltQuery {
        sql,
        params: builder.into_params(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use atr_core::ResourceType;
    use atr_storage::CompareOp;
    use time::macros::datetime;

    #[test]
    fn test_default_query() {
        let built = render_postgres(&StoreQuery::new(ResourceType::Coverage)).unwrap();
        assert_eq!(
            built.sql,
            "SELECT id, data, last_updated_ts FROM \"coverage\" ORDER BY id ASC NULLS LAST"
        );
        assert!(built.params.is_empty());
    }

    #[test]
    fn test_token_and_date_binds() {
        let query = StoreQuery::new(ResourceType::MedicationStatement)
            .with_predicate(Predicate::and(vec![
                Predicate::Token {
                    path: JsonPath::parse("status"),
                    system: None,
                    code: "active".to_string(),
                },
                Predicate::Date {
                    path: JsonPath::parse("effectivePeriod.start"),
                    op: CompareOp::Ge,
                    value: datetime!(2023-01-01 0:00 UTC),
                },
            ]))
            .with_limit(Some(10))
            .with_offset(20);

        let built = render_postgres(&query).unwrap();
        assert!(built.sql.starts_with(
            "SELECT id, data, last_updated_ts FROM \"medicationstatement\" WHERE (jsonb_path_exists(data, $1::jsonpath, $2::jsonb) AND EXISTS"
        ));
        assert!(built.sql.contains("::timestamptz >= $4::timestamptz"));
        assert!(built.sql.ends_with("ORDER BY id ASC NULLS LAST LIMIT 10 OFFSET 20"));

        assert_eq!(built.params.len(), 4);
        assert!(matches!(&built.params[0], SqlParam::Text(p) if p.starts_with("$.\"status\" ? (")));
        assert_eq!(
            built.params[2],
            SqlParam::Text("$.\"effectivePeriod\".\"start\"".to_string())
        );
        assert_eq!(
            built.params[3],
            SqlParam::Timestamp("2023-01-01T00:00:00Z".to_string())
        );
    }

    #[test]
    fn test_id_lists_and_negation() {
        let query = StoreQuery::new(ResourceType::Coverage).with_predicate(Predicate::and(vec![
            Predicate::IdIn(vec![1, 2]),
            Predicate::negate(Predicate::IdIn(vec![2])),
        ]));
        let built = render_postgres(&query).unwrap();
        assert!(built.sql.contains(
            "WHERE (id = ANY($1::bigint[]) AND NOT (id = ANY($2::bigint[])))"
        ));
        assert_eq!(built.params[0].as_str(), "{1,2}");

        let nothing = StoreQuery::new(ResourceType::Coverage).with_predicate(Predicate::IdIn(vec![]));
        let built = render_postgres(&nothing).unwrap();
        assert!(built.sql.contains("WHERE FALSE"));
        assert!(built.params.is_empty());
    }

    #[test]
    fn test_id_after_is_bound() {
        let query = StoreQuery::new(ResourceType::MedicationStatement).with_predicate(
            Predicate::and(vec![Predicate::IdIn(vec![4, 9]), Predicate::IdAfter(4)]),
        );
        let built = render_postgres(&query).unwrap();
        assert!(built.sql.contains("WHERE (id = ANY($1::bigint[]) AND id > $2::bigint)"));
        assert_eq!(built.params[1], SqlParam::BigInt(4));
        assert_eq!(built.params[1].as_str(), "4");
    }

    #[test]
    fn test_reference_binds_target_once() {
        let query = StoreQuery::new(ResourceType::Coverage).with_predicate(Predicate::Reference {
            path: JsonPath::parse("beneficiary"),
            reference: "Patient/7".to_string(),
        });
        let built = render_postgres(&query).unwrap();
        assert_eq!(built.params.len(), 2);
        assert_eq!(
            built.params[0],
            SqlParam::Text("$.\"beneficiary\".\"reference\"".to_string())
        );
        assert_eq!(built.params[1], SqlParam::Text("Patient/7".to_string()));
        assert!(built.sql.contains("LIKE '%/' || $2 || '/_history/%'"));
    }

    #[test]
    fn test_sort_by_paths_coalesces() {
        let query = StoreQuery::new(ResourceType::MedicationStatement).with_order(vec![
            SortKey {
                field: SortField::Path {
                    paths: vec![
                        JsonPath::parse("effectiveDateTime"),
                        JsonPath::parse("effectivePeriod.start"),
                    ],
                    kind: SortKind::Date,
                },
                direction: SortDirection::Descending,
            },
            SortKey::id_ascending(),
        ]);
        let built = render_postgres(&query).unwrap();
        assert!(built.sql.contains(
            "ORDER BY COALESCE((jsonb_path_query_first(data, $1::jsonpath) #>> '{}')::timestamptz, \
             (jsonb_path_query_first(data, $2::jsonpath) #>> '{}')::timestamptz) DESC NULLS LAST, id ASC NULLS LAST"
        ));
    }

    #[test]
    fn test_rejects_unsafe_path() {
        let query = StoreQuery::new(ResourceType::Coverage).with_predicate(Predicate::Token {
            path: JsonPath::parse("status'--"),
            system: None,
            code: "x".to_string(),
        });
        assert!(matches!(
            render_postgres(&query),
            Err(SqlBuilderError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_last_updated_column() {
        let query = StoreQuery::new(ResourceType::Coverage).with_predicate(Predicate::LastUpdated {
            op: CompareOp::Lt,
            value: datetime!(2024-01-01 0:00 UTC),
        });
        let built = render_postgres(&query).unwrap();
        assert!(built.sql.contains("WHERE last_updated_ts < $1::timestamptz"));
    }
}
