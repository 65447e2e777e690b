use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use super::{FieldSchema, FilterSchema, LensSchema, ResourceSchema, SchemaError};
use crate::error::EngineError;
use crate::field::{Field, FieldItem, PanelMeta, SelectOption};
use crate::filter::{BooleanFilter, Filter, SelectFilter};
use crate::lens::{Lens, LensOutput};
use crate::query::{parse_where, Condition, OrderInfo, Query, QueryOrder};
use crate::request::AdminRequest;
use crate::resource::{title_case, KeyType, ResourceDefinition};
use crate::validation::Rule;

fn role_check(roles: &[String]) -> Option<impl Fn(&AdminRequest) -> bool + Send + Sync + 'static> {
    if roles.is_empty() {
        return None;
    }
    let roles = roles.to_vec();
    Some(move |req: &AdminRequest| roles.iter().any(|r| req.actor.has_role(r)))
}

// ========================================
// Fields
// ========================================

fn build_field(resource: &str, schema: &FieldSchema) -> Result<Field, SchemaError> {
    let attribute = schema.attribute();
    let related = || {
        schema
            .resource
            .clone()
            .ok_or_else(|| SchemaError::invalid(resource, format!("relationship {} names no resource", attribute)))
    };

    let mut field = match schema.kind.as_str() {
        "id" => {
            let mut field = Field::id();
            field.name = schema.name.clone();
            field.attribute = attribute.clone();
            field
        }
        "text" => Field::text(&schema.name, &attribute),
        "textarea" => Field::textarea(&schema.name, &attribute),
        "number" => Field::number(&schema.name, &attribute),
        "boolean" => Field::boolean(&schema.name, &attribute),
        "datetime" => Field::datetime(&schema.name, &attribute),
        "heading" => Field::heading(&schema.name),
        "select" => Field::select(
            &schema.name,
            &attribute,
            schema
                .options
                .iter()
                .map(|o| SelectOption::new(o.value.clone(), o.label.clone()))
                .collect(),
        ),
        "belongs_to" => Field::belongs_to(&schema.name, &attribute, related()?),
        "has_one" => Field::has_one(&schema.name, &attribute, related()?),
        "has_many" => Field::has_many(&schema.name, &attribute, related()?),
        "belongs_to_many" => Field::belongs_to_many(&schema.name, &attribute, related()?),
        other => {
            return Err(SchemaError::UnknownFieldType {
                resource: resource.to_string(),
                field: attribute,
                kind: other.to_string(),
            })
        }
    };

    if let Some(key) = &schema.foreign_key {
        field = field.with_relation(|relation| relation.foreign_key = Some(key.clone()));
    }
    if let Some(table) = &schema.pivot_table {
        field = field.with_relation(|relation| {
            if let Some(pivot) = relation.pivot.as_mut() {
                pivot.table = Some(table.clone());
            }
        });
    }
    if !schema.pivot.is_empty() {
        if !field.is_belongs_to_many() {
            return Err(SchemaError::invalid(
                resource,
                format!("{} declares pivot fields but is not belongs_to_many", attribute),
            ));
        }
        let pivot = schema
            .pivot
            .iter()
            .map(|p| build_field(resource, p))
            .collect::<Result<Vec<_>, _>>()?;
        field = field.pivot_fields(move |_| pivot.clone());
    }

    if let Some(rules) = &schema.rules {
        field = field.rules(Rule::parse_list(rules));
    }
    if let Some(rules) = &schema.creation_rules {
        field = field.creation_rules(Rule::parse_list(rules));
    }
    if let Some(rules) = &schema.update_rules {
        field = field.update_rules(Rule::parse_list(rules));
    }
    if schema.sortable {
        field = field.sortable();
    }
    if schema.filterable {
        field = field.filterable();
    }
    if schema.nullable {
        field = field.nullable();
    }
    if schema.readonly {
        field = field.readonly();
    }
    if schema.as_panel {
        field = field.as_panel();
    }
    if let Some(help) = &schema.help {
        field = field.help(help.clone());
    }
    if let Some(default) = &schema.default {
        field = field.default_value(default.clone());
    }
    if schema.hide_from_index {
        field = field.hide_from_index();
    }
    if schema.hide_from_detail {
        field = field.hide_from_detail();
    }
    if schema.hide_when_creating {
        field = field.hide_when_creating();
    }
    if schema.hide_when_updating {
        field = field.hide_when_updating();
    }
    if let Some(check) = role_check(&schema.roles) {
        field = field.can_see(check);
    }
    Ok(field)
}

/// Unassigned fields in declared order, then panels, then tab groups
fn build_layout(schema: &ResourceSchema, fields: &BTreeMap<String, Field>) -> Result<Vec<FieldItem>, SchemaError> {
    let mut assigned = BTreeSet::new();
    let mut take = |attribute: &String| -> Result<FieldItem, SchemaError> {
        let field = fields
            .get(attribute)
            .ok_or_else(|| SchemaError::invalid(&schema.key, format!("layout names unknown field {}", attribute)))?;
        if !assigned.insert(attribute.clone()) {
            return Err(SchemaError::invalid(
                &schema.key,
                format!("field {} is placed more than once", attribute),
            ));
        }
        Ok(FieldItem::Field(field.clone()))
    };

    let mut placed = Vec::new();
    for panel in &schema.panels {
        let items = panel.fields.iter().map(&mut take).collect::<Result<Vec<_>, _>>()?;
        let meta = PanelMeta {
            collapsible: panel.collapsible,
            collapsed_by_default: panel.collapsed_by_default,
            limit: panel.limit,
            help_text: panel.help.clone(),
        };
        placed.push(FieldItem::panel_with(panel.name.clone(), meta, items));
    }
    for group in &schema.tabs {
        let mut tabs = Vec::with_capacity(group.tabs.len());
        for tab in &group.tabs {
            let items = tab.fields.iter().map(&mut take).collect::<Result<Vec<_>, _>>()?;
            tabs.push((tab.name.clone(), items));
        }
        placed.push(FieldItem::tabs(group.group.clone(), tabs));
    }

    let mut items: Vec<FieldItem> = schema
        .fields
        .iter()
        .map(FieldSchema::attribute)
        .filter(|attribute| !assigned.contains(attribute))
        .filter_map(|attribute| fields.get(&attribute).cloned().map(FieldItem::Field))
        .collect();
    items.extend(placed);
    Ok(items)
}

// ========================================
// Filters and lenses
// ========================================

fn build_filter(resource: &str, schema: &FilterSchema) -> Result<Arc<dyn Filter>, SchemaError> {
    match schema.kind.as_str() {
        "select" => {
            let column = schema
                .column
                .clone()
                .ok_or_else(|| SchemaError::invalid(resource, format!("filter {} names no column", schema.key)))?;
            let mut filter = SelectFilter::new(&schema.key, &schema.name, column);
            for option in &schema.options {
                filter = filter.option(option.value.clone(), option.label.clone());
            }
            if let Some(default) = &schema.default {
                filter = filter.with_default(default.clone());
            }
            if let Some(check) = role_check(&schema.roles) {
                filter = filter.can_see(check);
            }
            Ok(Arc::new(filter))
        }
        "boolean" => {
            let mut filter = BooleanFilter::new(&schema.key, &schema.name);
            for option in &schema.options {
                let column = option.value.as_str().ok_or_else(|| {
                    SchemaError::invalid(resource, format!("boolean filter {} options must name columns", schema.key))
                })?;
                filter = filter.option(column, option.label.clone());
            }
            if let Some(check) = role_check(&schema.roles) {
                filter = filter.can_see(check);
            }
            Ok(Arc::new(filter))
        }
        other => Err(SchemaError::invalid(
            resource,
            format!("filter {} has unknown type {}", schema.key, other),
        )),
    }
}

/// A lens declared as a where clause plus an ordering
pub struct SchemaLens {
    key: String,
    name: String,
    conditions: Vec<Condition>,
    order: Vec<OrderInfo>,
    items: Vec<FieldItem>,
    roles: Vec<String>,
}

impl SchemaLens {
    fn build(
        resource: &ResourceSchema,
        schema: &LensSchema,
        fields: &BTreeMap<String, Field>,
        layout: &[FieldItem],
    ) -> Result<Self, SchemaError> {
        let conditions = match &schema.where_clause {
            Some(clause) => parse_where(clause)?,
            None => vec![],
        };
        let items = match &schema.fields {
            Some(attributes) => attributes
                .iter()
                .map(|attribute| {
                    fields.get(attribute).cloned().map(FieldItem::Field).ok_or_else(|| {
                        SchemaError::invalid(&resource.key, format!("lens {} names unknown field {}", schema.key, attribute))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => layout.to_vec(),
        };
        Ok(Self {
            key: schema.key.clone(),
            name: schema.name.clone(),
            conditions,
            order: schema.order.as_ref().map(QueryOrder::parse).unwrap_or_default(),
            items,
            roles: schema.roles.clone(),
        })
    }
}

impl Lens for SchemaLens {
    fn key(&self) -> &str {
        &self.key
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self, _req: &AdminRequest) -> Vec<FieldItem> {
        self.items.clone()
    }

    fn query(&self, _req: &AdminRequest, query: Query) -> Result<LensOutput, EngineError> {
        let mut query = self
            .conditions
            .iter()
            .cloned()
            .fold(query, |query, condition| query.and_where(condition));
        if !self.order.is_empty() {
            query = query.clear_order();
            for info in &self.order {
                query = query.order_by(info.column.clone(), info.sort);
            }
        }
        Ok(LensOutput::Query(query))
    }

    fn authorized_to_see(&self, req: &AdminRequest) -> bool {
        self.roles.is_empty() || self.roles.iter().any(|r| req.actor.has_role(r))
    }
}

// ========================================
// Resource
// ========================================

/// A resource built from its schema declaration
pub struct SchemaResource {
    schema: ResourceSchema,
    key_type: KeyType,
    items: Vec<FieldItem>,
    filters: Vec<Arc<dyn Filter>>,
    lenses: Vec<Arc<dyn Lens>>,
    scopes: Vec<(String, Condition)>,
    order: Vec<OrderInfo>,
}

impl SchemaResource {
    pub fn build(schema: ResourceSchema) -> Result<Self, SchemaError> {
        let key_type = match schema.key_type.as_deref() {
            None | Some("integer") => KeyType::Integer,
            Some("big_integer") => KeyType::BigInteger,
            Some("string") => KeyType::String,
            Some("uuid") => KeyType::Uuid,
            Some(other) => return Err(SchemaError::invalid(&schema.key, format!("unknown key type {}", other))),
        };

        let mut fields = BTreeMap::new();
        for field in &schema.fields {
            let built = build_field(&schema.key, field)?;
            if fields.insert(built.attribute.clone(), built).is_some() {
                return Err(SchemaError::invalid(
                    &schema.key,
                    format!("field {} is declared twice", field.attribute()),
                ));
            }
        }
        let items = build_layout(&schema, &fields)?;

        let filters = schema
            .filters
            .iter()
            .map(|f| build_filter(&schema.key, f))
            .collect::<Result<Vec<_>, _>>()?;
        let lenses = schema
            .lenses
            .iter()
            .map(|l| SchemaLens::build(&schema, l, &fields, &items).map(|lens| Arc::new(lens) as Arc<dyn Lens>))
            .collect::<Result<Vec<_>, _>>()?;
        let scopes = schema
            .scopes
            .iter()
            .map(|(name, clause)| Ok((name.clone(), Condition::all(parse_where(clause)?))))
            .collect::<Result<Vec<_>, SchemaError>>()?;
        let order = schema.order.as_ref().map(QueryOrder::parse).unwrap_or_default();

        debug!(
            "Built schema resource {}: {} field(s), {} filter(s), {} lens(es)",
            schema.key,
            fields.len(),
            filters.len(),
            lenses.len()
        );
        Ok(Self {
            schema,
            key_type,
            items,
            filters,
            lenses,
            scopes,
            order,
        })
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }
}

impl ResourceDefinition for SchemaResource {
    fn key(&self) -> &str {
        &self.schema.key
    }

    fn fields(&self, _req: &AdminRequest) -> Vec<FieldItem> {
        self.items.clone()
    }

    fn table(&self) -> &str {
        self.schema.table.as_deref().unwrap_or(&self.schema.key)
    }

    fn label(&self) -> String {
        self.schema.label.clone().unwrap_or_else(|| title_case(&self.schema.key))
    }

    fn singular_label(&self) -> String {
        self.schema
            .singular_label
            .clone()
            .unwrap_or_else(|| title_case(&crate::field::singular(&self.schema.key)))
    }

    fn primary_key(&self) -> &str {
        &self.schema.primary_key
    }

    fn primary_key_type(&self) -> KeyType {
        self.key_type
    }

    fn title_attribute(&self) -> &str {
        self.schema.title.as_deref().unwrap_or(&self.schema.primary_key)
    }

    fn filters(&self, _req: &AdminRequest) -> Vec<Arc<dyn Filter>> {
        self.filters.clone()
    }

    fn lenses(&self, _req: &AdminRequest) -> Vec<Arc<dyn Lens>> {
        self.lenses.clone()
    }

    fn search_columns(&self) -> Vec<String> {
        if self.schema.search.is_empty() {
            vec![self.schema.primary_key.clone()]
        } else {
            self.schema.search.clone()
        }
    }

    fn uses_search_index(&self) -> bool {
        self.schema.search_index
    }

    fn per_page_options(&self) -> Vec<u64> {
        match &self.schema.per_page {
            Some(options) if !options.is_empty() => options.clone(),
            _ => crate::config::config().pagination.per_page_options.clone(),
        }
    }

    fn per_page_via_relationship(&self) -> Vec<u64> {
        match &self.schema.per_page_via_relationship {
            Some(options) if !options.is_empty() => options.clone(),
            _ => crate::config::config().pagination.per_page_via_relationship.clone(),
        }
    }

    fn default_order(&self) -> Vec<OrderInfo> {
        if self.order.is_empty() {
            vec![OrderInfo::desc(self.primary_key())]
        } else {
            self.order.clone()
        }
    }

    fn soft_deletes(&self) -> bool {
        self.schema.soft_deletes
    }

    fn global_scopes(&self) -> Vec<(String, Condition)> {
        self.scopes.clone()
    }
}
