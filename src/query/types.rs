use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use crate::types::{SortDirection, TrashedStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$ne")] Ne,
    #[serde(rename = "$gt")] Gt,
    #[serde(rename = "$gte")] Gte,
    #[serde(rename = "$lt")] Lt,
    #[serde(rename = "$lte")] Lte,

    #[serde(rename = "$like")] Like,
    #[serde(rename = "$ilike")] ILike,

    #[serde(rename = "$in")] In,
    #[serde(rename = "$nin")] NIn,

    #[serde(rename = "$between")] Between,
}

impl FilterOp {
    pub fn from_key(op_key: &str) -> Option<Self> {
        Some(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$between" => FilterOp::Between,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Logic {
    And,
    Or,
}

/// A where-condition tree.
///
/// Columns are either bare (`title`, resolved against the query's table) or
/// qualified (`role_user.notes`).
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Where { column: String, op: FilterOp, value: Value },
    Group { logic: Logic, conditions: Vec<Condition> },
    Not(Box<Condition>),
}

impl Condition {
    pub fn new(column: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Condition::Where { column: column.into(), op, value: value.into() }
    }

    /// Equality; a null value means IS NULL
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq, value)
    }

    /// Inequality; a null value means IS NOT NULL
    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Ne, value)
    }

    pub fn ilike(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(column, FilterOp::ILike, Value::String(pattern.into()))
    }

    /// Case-insensitive substring match; LIKE wildcards in `term` match
    /// literally.
    pub fn contains(column: impl Into<String>, term: &str) -> Self {
        Self::ilike(column, format!("%{}%", escape_like(term)))
    }

    pub fn in_list(column: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(column, FilterOp::In, Value::Array(values))
    }

    pub fn any(conditions: Vec<Condition>) -> Self {
        Condition::Group { logic: Logic::Or, conditions }
    }

    pub fn all(conditions: Vec<Condition>) -> Self {
        Condition::Group { logic: Logic::And, conditions }
    }

    pub fn negate(self) -> Self {
        Condition::Not(Box::new(self))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

impl OrderInfo {
    pub fn asc(column: impl Into<String>) -> Self {
        Self { column: column.into(), sort: SortDirection::Asc }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self { column: column.into(), sort: SortDirection::Desc }
    }
}

/// Soft-delete column plus the requested visibility of trashed rows
#[derive(Debug, Clone, PartialEq)]
pub struct TrashedScope {
    pub column: String,
    pub status: TrashedStatus,
}

/// Join through a many-to-many pivot table, constrained to one parent
#[derive(Debug, Clone, PartialEq)]
pub struct PivotJoin {
    pub table: String,
    /// Pivot column referencing the queried table's primary key
    pub related_key: String,
    /// Pivot column referencing the parent record
    pub parent_key: String,
    pub parent_value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}

/// Escape `%`, `_` and backslashes for use inside a LIKE pattern
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
