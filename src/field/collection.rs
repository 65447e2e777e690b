use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;

use super::Field;
use crate::auth::Ability;
use crate::record::Record;
use crate::registry::Registry;
use crate::request::AdminRequest;

/// Ordered set of fields. Every operator is pure: it consumes the collection
/// and returns a new one, preserving relative order.
#[derive(Debug, Clone, Default)]
pub struct FieldCollection {
    fields: Vec<Field>,
}

impl FieldCollection {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    pub fn into_vec(self) -> Vec<Field> {
        self.fields
    }

    pub fn attributes(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.attribute.as_str()).collect()
    }

    pub fn filter<P>(self, predicate: P) -> Self
    where
        P: FnMut(&Field) -> bool,
    {
        let mut predicate = predicate;
        Self {
            fields: self.fields.into_iter().filter(|f| predicate(f)).collect(),
        }
    }

    pub fn map<F>(self, f: F) -> Self
    where
        F: FnMut(Field) -> Field,
    {
        Self {
            fields: self.fields.into_iter().map(f).collect(),
        }
    }

    // ========================================
    // Authorization and context
    // ========================================

    /// Fields the actor may see. Relationship fields additionally need
    /// `viewAny` on the related resource.
    pub fn authorized(self, req: &AdminRequest, registry: &Registry) -> Self {
        let before = self.len();
        let authorized = self.filter(|field| {
            field.authorized_to_see(req)
                && field.relation().map_or(true, |relation| {
                    registry
                        .gate()
                        .allows(&req.actor, &relation.resource, &Ability::ViewAny, None)
                })
        });
        if authorized.len() != before {
            debug!("Dropped {} unauthorized field(s)", before - authorized.len());
        }
        authorized
    }

    pub fn filter_for_index(self, req: &AdminRequest, record: &Record) -> Self {
        self.filter(|f| f.is_shown_on_index(req, record))
    }

    pub fn filter_for_detail(self, req: &AdminRequest, record: &Record) -> Self {
        self.filter(|f| f.is_shown_on_detail(req, record))
    }

    pub fn filter_for_creation(self, req: &AdminRequest) -> Self {
        self.filter(|f| f.is_shown_on_creation(req))
    }

    pub fn filter_for_update(self, req: &AdminRequest, record: &Record) -> Self {
        self.filter(|f| f.is_shown_on_update(req, record))
    }

    // ========================================
    // Capabilities
    // ========================================

    pub fn without_listable(self) -> Self {
        self.filter(|f| !f.listable)
    }

    pub fn without_readonly(self, req: &AdminRequest) -> Self {
        self.filter(|f| !f.is_readonly(req))
    }

    pub fn without_unfillable(self) -> Self {
        self.filter(|f| f.fillable)
    }

    pub fn without_hidden(self) -> Self {
        self.filter(|f| !f.hidden)
    }

    /// Relationship fields that can be attached or associated
    pub fn only_relatable(self) -> Self {
        self.filter(|f| f.relation().is_some())
    }

    pub fn deletable(self) -> Self {
        self.filter(Field::is_deletable)
    }

    pub fn filterable(self) -> Self {
        self.filter(|f| f.filterable)
    }

    /// Keep the first field per attribute
    pub fn unique(self) -> Self {
        let mut seen = HashSet::new();
        self.filter(|f| seen.insert(f.attribute.clone()))
    }

    pub fn find_by_attribute(&self, attribute: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.attribute == attribute)
    }

    pub fn position<P>(&self, predicate: P) -> Option<usize>
    where
        P: FnMut(&Field) -> bool,
    {
        self.fields.iter().position(predicate)
    }

    /// Insert `other` right after `index`, or append when there is none
    pub fn insert_after(self, index: Option<usize>, other: FieldCollection) -> Self {
        let mut fields = self.fields;
        match index {
            Some(i) if i < fields.len() => {
                let tail = fields.split_off(i + 1);
                fields.extend(other.fields);
                fields.extend(tail);
            }
            _ => fields.extend(other.fields),
        }
        Self { fields }
    }

    pub fn merge(self, other: FieldCollection) -> Self {
        self.insert_after(None, other)
    }

    // ========================================
    // Resolution
    // ========================================

    /// Run depends-on callbacks against the submitted values, then drop the
    /// fields they hid.
    pub fn apply_depends_on(self, input: &Map<String, Value>) -> Self {
        self.map(|mut field| {
            field.apply_depends_on(input);
            field
        })
        .without_hidden()
    }

    pub fn resolve(self, record: &Record) -> Self {
        self.map(|mut field| {
            field.resolve(record);
            field
        })
    }

    /// Resolve pivot fields against the join row of `record` (an empty row
    /// when the record was not reached through a pivot)
    pub fn resolve_pivot(self, record: &Record) -> Self {
        let empty = Record::new();
        let pivot = record.pivot().unwrap_or(&empty);
        self.map(|mut field| {
            if field.pivot {
                field.resolve(pivot);
            }
            field
        })
    }

    pub fn to_json(&self, req: &AdminRequest) -> Value {
        Value::Array(self.fields.iter().map(|f| f.to_json(req)).collect())
    }
}

impl IntoIterator for FieldCollection {
    type Item = Field;
    type IntoIter = std::vec::IntoIter<Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a FieldCollection {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl FromIterator<Field> for FieldCollection {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl From<Vec<Field>> for FieldCollection {
    fn from(fields: Vec<Field>) -> Self {
        Self::new(fields)
    }
}
