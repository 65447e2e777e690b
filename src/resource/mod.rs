//! Resource definitions and the per-request `Resource` wrapper.

pub mod fields;
pub mod pivot;

use serde_json::Value;
use std::sync::Arc;

use crate::action::Action;
use crate::auth::Ability;
use crate::config;
use crate::error::EngineError;
use crate::field::FieldItem;
use crate::filter::Filter;
use crate::lens::Lens;
use crate::query::{Condition, OrderInfo, Query, QueryError};
use crate::record::Record;
use crate::registry::Registry;
use crate::request::AdminRequest;
use crate::validation::ValidationErrors;

/// Storage type of the primary key; decides how search terms are compared
/// against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyType {
    #[default]
    Integer,
    BigInteger,
    String,
    Uuid,
}

/// Declaration of one kind of record.
///
/// The `fields_for_*` overrides model optional context-specific field lists:
/// `None` means "not provided" and resolution falls through to the next
/// candidate, ending at `fields`.
pub trait ResourceDefinition: Send + Sync {
    /// URI key, e.g. `posts`
    fn key(&self) -> &str;

    fn fields(&self, req: &AdminRequest) -> Vec<FieldItem>;

    fn table(&self) -> &str {
        self.key()
    }

    fn label(&self) -> String {
        title_case(self.key())
    }

    fn singular_label(&self) -> String {
        title_case(&crate::field::singular(self.key()))
    }

    fn primary_key(&self) -> &str {
        "id"
    }

    fn primary_key_type(&self) -> KeyType {
        KeyType::Integer
    }

    /// Attribute used as the display title of a record
    fn title_attribute(&self) -> &str {
        self.primary_key()
    }

    fn fields_for_inline_create(&self, _req: &AdminRequest) -> Option<Vec<FieldItem>> {
        None
    }

    fn fields_for_index(&self, _req: &AdminRequest) -> Option<Vec<FieldItem>> {
        None
    }

    fn fields_for_detail(&self, _req: &AdminRequest) -> Option<Vec<FieldItem>> {
        None
    }

    fn fields_for_create(&self, _req: &AdminRequest) -> Option<Vec<FieldItem>> {
        None
    }

    fn fields_for_update(&self, _req: &AdminRequest) -> Option<Vec<FieldItem>> {
        None
    }

    fn filters(&self, _req: &AdminRequest) -> Vec<Arc<dyn Filter>> {
        vec![]
    }

    fn lenses(&self, _req: &AdminRequest) -> Vec<Arc<dyn Lens>> {
        vec![]
    }

    fn actions(&self, _req: &AdminRequest) -> Vec<Arc<dyn Action>> {
        vec![]
    }

    /// Columns matched by free-text search
    fn search_columns(&self) -> Vec<String> {
        vec![self.primary_key().to_string()]
    }

    /// Search through the external index instead of column predicates
    fn uses_search_index(&self) -> bool {
        false
    }

    fn per_page_options(&self) -> Vec<u64> {
        config::config().pagination.per_page_options.clone()
    }

    fn per_page_via_relationship(&self) -> Vec<u64> {
        config::config().pagination.per_page_via_relationship.clone()
    }

    /// Ordering applied when the request does not sort
    fn default_order(&self) -> Vec<OrderInfo> {
        vec![OrderInfo::desc(self.primary_key())]
    }

    fn soft_deletes(&self) -> bool {
        false
    }

    fn soft_delete_column(&self) -> &str {
        "deleted_at"
    }

    /// Named default constraints, bypassed when listing through a
    /// relationship
    fn global_scopes(&self) -> Vec<(String, Condition)> {
        vec![]
    }

    /// Customize the index query before search, filters and ordering
    fn index_query(&self, _req: &AdminRequest, query: Query) -> Query {
        query
    }

    /// Cross-field checks run after the declarative rules
    fn after_validation(&self, _req: &AdminRequest, _errors: &mut ValidationErrors) {}

    /// Fresh query over the table: primary key, soft deletes and global
    /// scopes applied.
    fn base_query(&self) -> Result<Query, QueryError> {
        let mut query = Query::new(self.table())?.with_primary_key(self.primary_key())?;
        if self.soft_deletes() {
            query = query.soft_deletes(self.soft_delete_column());
        }
        for (name, condition) in self.global_scopes() {
            query = query.with_global_scope(name, condition);
        }
        Ok(query)
    }
}

/// A definition bound to zero or one record for the span of one request
#[derive(Clone)]
pub struct Resource {
    definition: Arc<dyn ResourceDefinition>,
    record: Record,
}

impl Resource {
    pub fn new(definition: Arc<dyn ResourceDefinition>) -> Self {
        Self {
            definition,
            record: Record::new(),
        }
    }

    pub fn for_record(definition: Arc<dyn ResourceDefinition>, record: Record) -> Self {
        Self { definition, record }
    }

    pub fn definition(&self) -> &Arc<dyn ResourceDefinition> {
        &self.definition
    }

    pub fn key(&self) -> &str {
        self.definition.key()
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    pub fn into_record(self) -> Record {
        self.record
    }

    pub fn id(&self) -> Option<&Value> {
        self.record.key(self.definition.primary_key())
    }

    pub fn title(&self) -> Value {
        self.record.value(self.definition.title_attribute()).clone()
    }

    pub fn is_trashed(&self) -> bool {
        self.definition.soft_deletes() && self.record.is_trashed(self.definition.soft_delete_column())
    }

    pub fn authorized_to(&self, req: &AdminRequest, registry: &Registry, ability: &Ability) -> bool {
        let record = self.record.exists().then_some(&self.record);
        registry.gate().allows(&req.actor, self.key(), ability, record)
    }

    pub fn authorize_to(&self, req: &AdminRequest, registry: &Registry, ability: &Ability) -> Result<(), EngineError> {
        let record = self.record.exists().then_some(&self.record);
        registry.gate().authorize(&req.actor, self.key(), ability, record)
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("key", &self.key())
            .field("record", &self.record)
            .finish()
    }
}

pub(crate) fn title_case(key: &str) -> String {
    key.split(['_', '-'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_from_keys() {
        assert_eq!(title_case("blog_posts"), "Blog Posts");
        assert_eq!(title_case("users"), "Users");
    }
}
