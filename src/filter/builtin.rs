use serde_json::Value;
use std::sync::Arc;

use super::Filter;
use crate::error::EngineError;
use crate::field::{Field, FieldKind, RelationKind, RequestPredicate, SelectOption};
use crate::query::{Condition, FilterOp, Query};
use crate::request::AdminRequest;

/// Equality (or membership, for an array value) on one column
#[derive(Clone)]
pub struct SelectFilter {
    key: String,
    name: String,
    column: String,
    options: Vec<SelectOption>,
    default: Value,
    see: Option<RequestPredicate>,
}

impl SelectFilter {
    pub fn new(key: impl Into<String>, name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            column: column.into(),
            options: vec![],
            default: Value::Null,
            see: None,
        }
    }

    pub fn option(mut self, value: impl Into<Value>, label: impl Into<String>) -> Self {
        self.options.push(SelectOption::new(value, label));
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    pub fn can_see<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AdminRequest) -> bool + Send + Sync + 'static,
    {
        self.see = Some(Arc::new(predicate));
        self
    }
}

impl Filter for SelectFilter {
    fn key(&self) -> &str {
        &self.key
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, _req: &AdminRequest, query: Query, value: &Value) -> Result<Query, EngineError> {
        Ok(match value {
            Value::Array(values) => query.and_where(Condition::in_list(self.column.clone(), values.clone())),
            other => query.where_eq(self.column.clone(), other.clone()),
        })
    }

    fn options(&self, _req: &AdminRequest) -> Vec<SelectOption> {
        self.options.clone()
    }

    fn default_value(&self) -> Value {
        self.default.clone()
    }

    fn authorized_to_see(&self, req: &AdminRequest) -> bool {
        self.see.as_ref().map_or(true, |see| see(req))
    }
}

/// Checkbox filter over boolean columns. Each option value names a column;
/// checked options require `column = true`.
#[derive(Clone)]
pub struct BooleanFilter {
    key: String,
    name: String,
    options: Vec<SelectOption>,
    see: Option<RequestPredicate>,
}

impl BooleanFilter {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            options: vec![],
            see: None,
        }
    }

    pub fn option(mut self, column: impl Into<String>, label: impl Into<String>) -> Self {
        self.options.push(SelectOption::new(column.into(), label));
        self
    }

    pub fn can_see<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AdminRequest) -> bool + Send + Sync + 'static,
    {
        self.see = Some(Arc::new(predicate));
        self
    }
}

impl Filter for BooleanFilter {
    fn key(&self) -> &str {
        &self.key
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn component(&self) -> &str {
        "boolean-filter"
    }

    fn apply(&self, _req: &AdminRequest, query: Query, value: &Value) -> Result<Query, EngineError> {
        let Value::Object(checked) = value else {
            return Err(EngineError::configuration(format!(
                "Filter {} expects an object of checked options",
                self.key
            )));
        };
        let mut query = query;
        for option in &self.options {
            let Some(column) = option.value.as_str() else {
                continue;
            };
            if checked.get(column).and_then(Value::as_bool) == Some(true) {
                query = query.where_eq(column, true);
            }
        }
        Ok(query)
    }

    fn options(&self, _req: &AdminRequest) -> Vec<SelectOption> {
        self.options.clone()
    }

    fn default_value(&self) -> Value {
        Value::Object(
            self.options
                .iter()
                .filter_map(|o| o.value.as_str().map(|c| (c.to_string(), Value::Bool(false))))
                .collect(),
        )
    }

    fn authorized_to_see(&self, req: &AdminRequest) -> bool {
        self.see.as_ref().map_or(true, |see| see(req))
    }
}

/// Implicit filter of a `filterable()` field, keyed `field:{attribute}`.
///
/// Text matches by substring, booleans by equality, numbers and dates by
/// `{min, max}` or `[min, max]` range, selects and belongs-to by equality
/// or membership.
#[derive(Clone)]
pub struct FieldFilter {
    key: String,
    column: String,
    component: String,
    field: Field,
}

impl FieldFilter {
    /// None for fields that store nothing
    pub fn new(field: &Field) -> Option<Self> {
        let column = field.column()?;
        Some(Self {
            key: format!("field:{}", field.attribute),
            column,
            component: format!("{}-filter", field.kind.component().trim_end_matches("-field")),
            field: field.clone(),
        })
    }

    fn range(&self, query: Query, min: Option<&Value>, max: Option<&Value>) -> Query {
        let bound = |v: Option<&Value>| v.filter(|v| !super::is_empty_value(v)).cloned();
        let mut query = query;
        if let Some(min) = bound(min) {
            query = query.and_where(Condition::new(self.column.clone(), FilterOp::Gte, min));
        }
        if let Some(max) = bound(max) {
            query = query.and_where(Condition::new(self.column.clone(), FilterOp::Lte, max));
        }
        query
    }
}

impl Filter for FieldFilter {
    fn key(&self) -> &str {
        &self.key
    }

    fn name(&self) -> &str {
        &self.field.name
    }

    fn component(&self) -> &str {
        &self.component
    }

    fn apply(&self, _req: &AdminRequest, query: Query, value: &Value) -> Result<Query, EngineError> {
        let column = self.column.clone();
        match &self.field.kind {
            FieldKind::Text | FieldKind::Textarea => match value {
                Value::String(term) => Ok(query.and_where(Condition::contains(column, term))),
                other => Ok(query.where_eq(column, other.clone())),
            },
            FieldKind::Boolean => Ok(query.where_eq(column, value.as_bool().unwrap_or(value == "true"))),
            FieldKind::Number | FieldKind::DateTime | FieldKind::Id => match value {
                Value::Object(range) => Ok(self.range(query, range.get("min"), range.get("max"))),
                Value::Array(bounds) if bounds.len() == 2 => Ok(self.range(query, bounds.first(), bounds.get(1))),
                other => Ok(query.where_eq(column, other.clone())),
            },
            FieldKind::Select(_) => Ok(match value {
                Value::Array(values) => query.and_where(Condition::in_list(column, values.clone())),
                other => query.where_eq(column, other.clone()),
            }),
            FieldKind::Relation(relation) if relation.kind == RelationKind::BelongsTo => Ok(match value {
                Value::Array(values) => query.and_where(Condition::in_list(column, values.clone())),
                other => query.where_eq(column, other.clone()),
            }),
            _ => Err(EngineError::configuration(format!(
                "Field {} cannot be filtered",
                self.field.attribute
            ))),
        }
    }

    fn options(&self, _req: &AdminRequest) -> Vec<SelectOption> {
        match &self.field.kind {
            FieldKind::Select(options) => options.clone(),
            _ => vec![],
        }
    }

    fn authorized_to_see(&self, req: &AdminRequest) -> bool {
        self.field.authorized_to_see(req)
    }
}
