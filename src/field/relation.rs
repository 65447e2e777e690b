use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::Field;
use crate::error::EngineError;
use crate::query::{PivotJoin, Query};
use crate::record::Record;
use crate::request::AdminRequest;

/// Builds the fields shown for a many-to-many join row
pub type PivotFieldsCallback = Arc<dyn Fn(&AdminRequest) -> Vec<Field> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    BelongsTo,
    HasOne,
    HasMany,
    BelongsToMany,
}

impl RelationKind {
    pub fn component(self) -> &'static str {
        match self {
            RelationKind::BelongsTo => "belongs-to-field",
            RelationKind::HasOne => "has-one-field",
            RelationKind::HasMany => "has-many-field",
            RelationKind::BelongsToMany => "belongs-to-many-field",
        }
    }

    /// Relationships rendered as their own listing rather than a value
    pub fn is_listable(self) -> bool {
        !matches!(self, RelationKind::BelongsTo)
    }
}

#[derive(Clone, Default)]
pub struct PivotSpec {
    pub table: Option<String>,
    /// Pivot column pointing at the owning (parent) record
    pub foreign_pivot_key: Option<String>,
    /// Pivot column pointing at the related record
    pub related_pivot_key: Option<String>,
    pub fields: Option<PivotFieldsCallback>,
}

impl fmt::Debug for PivotSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PivotSpec")
            .field("table", &self.table)
            .field("foreign_pivot_key", &self.foreign_pivot_key)
            .field("related_pivot_key", &self.related_pivot_key)
            .field("fields", &self.fields.is_some())
            .finish()
    }
}

/// A relationship declared by a field. Key names left unset follow the
/// usual conventions: `{singular}_id` foreign keys and an alphabetical
/// `{a}_{b}` pivot table.
#[derive(Debug, Clone)]
pub struct Relation {
    pub kind: RelationKind,
    /// Related resource key
    pub resource: String,
    pub foreign_key: Option<String>,
    pub owner_key: Option<String>,
    pub pivot: Option<PivotSpec>,
}

impl Relation {
    pub fn new(kind: RelationKind, resource: impl Into<String>) -> Self {
        Self {
            kind,
            resource: resource.into(),
            foreign_key: None,
            owner_key: None,
            pivot: match kind {
                RelationKind::BelongsToMany => Some(PivotSpec::default()),
                _ => None,
            },
        }
    }

    /// Column holding the relationship key.
    ///
    /// BelongsTo: on the declaring table, named after the attribute.
    /// HasOne / HasMany: on the related table, named after the parent.
    pub fn foreign_key(&self, attribute: &str, parent_resource: &str) -> String {
        if let Some(key) = &self.foreign_key {
            return key.clone();
        }
        match self.kind {
            RelationKind::BelongsTo => format!("{}_id", attribute),
            _ => format!("{}_id", singular(parent_resource)),
        }
    }

    pub fn owner_key<'a>(&'a self, default: &'a str) -> &'a str {
        self.owner_key.as_deref().unwrap_or(default)
    }

    pub fn pivot_table(&self, parent_resource: &str) -> String {
        if let Some(table) = self.pivot.as_ref().and_then(|p| p.table.clone()) {
            return table;
        }
        let mut names = [singular(parent_resource), singular(&self.resource)];
        names.sort();
        names.join("_")
    }

    pub fn foreign_pivot_key(&self, parent_resource: &str) -> String {
        self.pivot
            .as_ref()
            .and_then(|p| p.foreign_pivot_key.clone())
            .unwrap_or_else(|| format!("{}_id", singular(parent_resource)))
    }

    pub fn related_pivot_key(&self) -> String {
        self.pivot
            .as_ref()
            .and_then(|p| p.related_pivot_key.clone())
            .unwrap_or_else(|| format!("{}_id", singular(&self.resource)))
    }

    pub fn pivot_fields(&self) -> Option<&PivotFieldsCallback> {
        self.pivot.as_ref().and_then(|p| p.fields.as_ref())
    }

    /// Narrow a query over the related table to the records related to
    /// `parent`.
    pub fn scope_query(
        &self,
        query: Query,
        attribute: &str,
        parent_resource: &str,
        parent_primary_key: &str,
        parent: &Record,
    ) -> Result<Query, EngineError> {
        let parent_key = |column: &str| -> Result<Value, EngineError> {
            parent
                .key(column)
                .cloned()
                .ok_or_else(|| EngineError::not_found(format!("Parent {} has no {} value", parent_resource, column)))
        };

        Ok(match self.kind {
            RelationKind::BelongsTo => {
                let owner_key = self.owner_key(query.primary_key()).to_string();
                let value = parent.value(&self.foreign_key(attribute, parent_resource)).clone();
                query.where_eq(owner_key, value)
            }
            RelationKind::HasOne | RelationKind::HasMany => {
                let value = parent_key(self.owner_key(parent_primary_key))?;
                query.where_eq(self.foreign_key(attribute, parent_resource), value)
            }
            RelationKind::BelongsToMany => {
                let value = parent_key(self.owner_key(parent_primary_key))?;
                query.join_pivot(PivotJoin {
                    table: self.pivot_table(parent_resource),
                    related_key: self.related_pivot_key(),
                    parent_key: self.foreign_pivot_key(parent_resource),
                    parent_value: value,
                })
            }
        })
    }
}

/// `users` -> `user`, `categories` -> `category`, `statuses` -> `status`
pub fn singular(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        format!("{}y", stem)
    } else if let Some(stem) = word.strip_suffix("sses").or_else(|| word.strip_suffix("uses")) {
        format!("{}{}", stem, &word[stem.len()..word.len() - 2])
    } else if let Some(stem) = word.strip_suffix('s') {
        stem.to_string()
    } else {
        word.to_string()
    }
}
