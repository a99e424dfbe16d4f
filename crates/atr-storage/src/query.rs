//! Backend-neutral query representation.
//!
//! The search layer translates parameters into a [`StoreQuery`]; each store
//! backend either evaluates it directly or renders it into its own dialect.

use std::fmt;

use time::OffsetDateTime;

use atr_core::ResourceType;

/// Dot-separated element path inside a document, e.g. `effectivePeriod.start`.
///
/// Arrays met along the way are flattened, so `identifier.system` reaches
/// the system of every identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JsonPath(Vec<String>);

impl JsonPath {
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }

    pub fn compare<T: Ord>(&self, left: &T, right: &T) -> bool {
        match self {
            Self::Gt => left > right,
            Self::Ge => left >= right,
            Self::Lt => left < right,
            Self::Le => left <= right,
        }
    }
}

/// Row filter.
///
/// `All(vec![])` matches every row and `Any(vec![])` matches none.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Not(Box<Predicate>),
    /// Row id is one of the listed ids.
    IdIn(Vec<i64>),
    /// Row id is strictly greater than the given id.
    IdAfter(i64),
    /// A coded element matches. `system: Some("")` means the coding has no system.
    Token {
        path: JsonPath,
        system: Option<String>,
        code: String,
    },
    /// A Reference element points at `reference` (canonical `Type/id`).
    Reference { path: JsonPath, reference: String },
    /// The start instant of a date element compares against `value`.
    Date {
        path: JsonPath,
        op: CompareOp,
        value: OffsetDateTime,
    },
    /// The `last_updated_ts` column compares against `value`.
    LastUpdated { op: CompareOp, value: OffsetDateTime },
}

impl Predicate {
    pub fn always() -> Self {
        Self::All(Vec::new())
    }

    pub fn never() -> Self {
        Self::Any(Vec::new())
    }

    /// AND-combine, flattening nested conjunctions and dropping tautologies.
    pub fn and(predicates: Vec<Predicate>) -> Self {
        let mut flat = Vec::with_capacity(predicates.len());
        for p in predicates {
            match p {
                Self::All(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Self::All(flat)
        }
    }

    /// OR-combine; a single alternative is returned unwrapped.
    pub fn or(mut predicates: Vec<Predicate>) -> Self {
        if predicates.len() == 1 {
            predicates.remove(0)
        } else {
            Self::Any(predicates)
        }
    }

    pub fn negate(predicate: Predicate) -> Self {
        Self::Not(Box::new(predicate))
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Self::All(v) if v.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// How values reached by a sort path compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKind {
    Text,
    Date,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SortField {
    Id,
    LastUpdated,
    /// First value found along `paths`, tried in order.
    Path { paths: Vec<JsonPath>, kind: SortKind },
}

/// One sort key. Rows missing a value sort after rows that have one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortKey {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn id_ascending() -> Self {
        Self {
            field: SortField::Id,
            direction: SortDirection::Ascending,
        }
    }
}

/// A complete query against one resource table.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    pub resource_type: ResourceType,
    pub predicate: Predicate,
    /// Full ordering; executors apply every key.
    pub order: Vec<SortKey>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl StoreQuery {
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            predicate: Predicate::always(),
            order: vec![SortKey::id_ascending()],
            limit: None,
            offset: 0,
        }
    }

    #[must_use]
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    #[must_use]
    pub fn with_order(mut self, order: Vec<SortKey>) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}
