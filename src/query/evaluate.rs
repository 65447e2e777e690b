// In-process evaluation of condition trees against JSON rows
use regex::RegexBuilder;
use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::types::{Condition, FilterOp, Logic, OrderInfo, SortDirection};

/// Row under evaluation: the queried table's columns plus, when joined, the
/// pivot row.
pub struct RowView<'a> {
    pub table: &'a str,
    pub row: &'a Map<String, Value>,
    pub pivot: Option<(&'a str, &'a Map<String, Value>)>,
}

impl<'a> RowView<'a> {
    pub fn new(table: &'a str, row: &'a Map<String, Value>) -> Self {
        Self { table, row, pivot: None }
    }

    pub fn with_pivot(mut self, table: &'a str, pivot: &'a Map<String, Value>) -> Self {
        self.pivot = Some((table, pivot));
        self
    }

    pub fn column(&self, column: &str) -> &Value {
        static NULL: Value = Value::Null;
        let (source, name) = match column.split_once('.') {
            Some((t, c)) if t == self.table => (Some(self.row), c),
            Some((t, c)) => (self.pivot.filter(|(pt, _)| *pt == t).map(|(_, p)| p), c),
            None => (Some(self.row), column),
        };
        source.and_then(|m| m.get(name)).unwrap_or(&NULL)
    }
}

pub fn matches_all(conditions: &[Condition], row: &RowView<'_>) -> bool {
    conditions.iter().all(|c| matches(c, row))
}

pub fn matches(condition: &Condition, row: &RowView<'_>) -> bool {
    match condition {
        Condition::Where { column, op, value } => matches_where(row.column(column), *op, value),
        Condition::Group { logic: Logic::And, conditions } => conditions.iter().all(|c| matches(c, row)),
        Condition::Group { logic: Logic::Or, conditions } => conditions.iter().any(|c| matches(c, row)),
        Condition::Not(inner) => !matches(inner, row),
    }
}

fn matches_where(actual: &Value, op: FilterOp, expected: &Value) -> bool {
    match op {
        FilterOp::Eq if expected.is_null() => actual.is_null(),
        FilterOp::Ne if expected.is_null() => !actual.is_null(),
        // SQL comparisons against NULL are never true
        _ if actual.is_null() => false,
        FilterOp::Eq => loose_eq(actual, expected),
        FilterOp::Ne => !loose_eq(actual, expected),
        FilterOp::Gt => compare(actual, expected) == Some(Ordering::Greater),
        FilterOp::Gte => matches!(compare(actual, expected), Some(Ordering::Greater | Ordering::Equal)),
        FilterOp::Lt => compare(actual, expected) == Some(Ordering::Less),
        FilterOp::Lte => matches!(compare(actual, expected), Some(Ordering::Less | Ordering::Equal)),
        FilterOp::Like => like(actual, expected, false),
        FilterOp::ILike => like(actual, expected, true),
        FilterOp::In => as_list(expected).iter().any(|v| loose_eq(actual, v)),
        FilterOp::NIn => !as_list(expected).iter().any(|v| loose_eq(actual, v)),
        FilterOp::Between => match expected {
            Value::Array(bounds) if bounds.len() == 2 => {
                matches!(compare(actual, &bounds[0]), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(compare(actual, &bounds[1]), Some(Ordering::Less | Ordering::Equal))
            }
            _ => false,
        },
    }
}

fn as_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(values) => values.clone(),
        other => vec![other.clone()],
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    compare(a, b) == Some(Ordering::Equal)
}

/// Compare two scalar values. Numbers and numeric strings compare
/// numerically; everything else compares only within its own type.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            let x = as_f64(a)?;
            let y = as_f64(b)?;
            x.partial_cmp(&y)
        }
        (x, y) if x == y => Some(Ordering::Equal),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn like(actual: &Value, pattern: &Value, case_insensitive: bool) -> bool {
    let Some(pattern) = pattern.as_str() else { return false };
    let haystack = match actual {
        Value::String(s) => s.clone(),
        Value::Null => return false,
        other => other.to_string(),
    };

    RegexBuilder::new(&like_to_regex(pattern))
        .case_insensitive(case_insensitive)
        .build()
        .map(|re| re.is_match(&haystack))
        .unwrap_or(false)
}

/// Translate a SQL LIKE pattern (`%`, `_`, backslash escapes) to an
/// anchored regex.
fn like_to_regex(pattern: &str) -> String {
    let mut out = String::from("(?s)^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push_str(&regex::escape(&escaped.to_string()));
                }
            }
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

/// Row ordering for `ORDER BY`. Nulls sort last ascending and first
/// descending, as PostgreSQL does.
pub fn compare_rows(a: &RowView<'_>, b: &RowView<'_>, order: &[OrderInfo]) -> Ordering {
    for info in order {
        let left = a.column(&info.column);
        let right = b.column(&info.column);
        let ordering = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => compare(left, right).unwrap_or_else(|| left.to_string().cmp(&right.to_string())),
        };
        let ordering = match info.sort {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
