//! Request entry points.
//!
//! `AdminEngine` owns the registry and the stores and exposes one method
//! per request shape. Every method authorizes before it resolves anything
//! and aborts on the first Forbidden, NotFound, Conflict or Configuration
//! error; validation failures are collected and returned together.

use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::action::{available_actions, find_action, ActionResponse, Bulk, BulkOutcome};
use crate::auth::Ability;
use crate::config;
use crate::error::EngineError;
use crate::field::{Field, FieldCollection, Relation};
use crate::lens::find_lens;
use crate::panel::{Panel, PanelAssembler};
use crate::pipeline::{Paginated, QueryPipeline};
use crate::query::{Condition, Query};
use crate::record::Record;
use crate::registry::Registry;
use crate::request::AdminRequest;
use crate::resource::{Resource, ResourceDefinition};
use crate::store::{RecordStore, SearchIndex};
use crate::types::{RequestContext, TrashedStatus};
use crate::validation::{RuleAssembler, RuleSet, ValidationErrors, Validator};

// ========================================
// Views
// ========================================

#[derive(Debug, Clone)]
pub struct IndexRow {
    pub id: Value,
    pub title: Value,
    pub fields: FieldCollection,
    pub authorized_to_view: bool,
    pub authorized_to_update: bool,
    pub authorized_to_delete: bool,
    pub authorized_to_restore: bool,
    pub authorized_to_force_delete: bool,
    pub soft_deleted: bool,
}

impl IndexRow {
    pub fn to_json(&self, req: &AdminRequest) -> Value {
        json!({
            "id": self.id,
            "title": self.title,
            "fields": self.fields.to_json(req),
            "authorizedToView": self.authorized_to_view,
            "authorizedToUpdate": self.authorized_to_update,
            "authorizedToDelete": self.authorized_to_delete,
            "authorizedToRestore": self.authorized_to_restore,
            "authorizedToForceDelete": self.authorized_to_force_delete,
            "softDeleted": self.soft_deleted,
        })
    }
}

#[derive(Debug, Clone)]
pub struct IndexPage {
    pub label: String,
    pub rows: Vec<IndexRow>,
    pub total: u64,
    pub per_page: u64,
    pub page: u64,
    pub per_page_options: Vec<u64>,
    pub soft_deletes: bool,
    /// The search index narrowed the listing and owns its order
    pub indexed_search: bool,
}

impl IndexPage {
    pub fn ids(&self) -> Vec<Value> {
        self.rows.iter().map(|r| r.id.clone()).collect()
    }

    pub fn to_json(&self, req: &AdminRequest) -> Value {
        json!({
            "label": self.label,
            "resources": self.rows.iter().map(|r| r.to_json(req)).collect::<Vec<_>>(),
            "total": self.total,
            "perPage": self.per_page,
            "page": self.page,
            "perPageOptions": self.per_page_options,
            "softDeletes": self.soft_deletes,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DetailView {
    pub id: Value,
    pub title: Value,
    pub fields: FieldCollection,
    pub panels: Vec<Panel>,
    pub authorized_to_update: bool,
    pub authorized_to_delete: bool,
    pub soft_deleted: bool,
}

impl DetailView {
    pub fn to_json(&self, req: &AdminRequest) -> Value {
        json!({
            "id": self.id,
            "title": self.title,
            "panels": self.panels.iter().map(|p| p.to_json(req)).collect::<Vec<_>>(),
            "authorizedToUpdate": self.authorized_to_update,
            "authorizedToDelete": self.authorized_to_delete,
            "softDeleted": self.soft_deleted,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FormView {
    pub fields: FieldCollection,
    pub panels: Vec<Panel>,
}

impl FormView {
    fn new(fields: FieldCollection, label: &str) -> Self {
        let panels = PanelAssembler::assemble(&fields, label);
        Self { fields, panels }
    }

    pub fn to_json(&self, req: &AdminRequest) -> Value {
        json!({
            "fields": self.fields.to_json(req),
            "panels": self.panels.iter().map(|p| p.to_json(req)).collect::<Vec<_>>(),
        })
    }
}

// ========================================
// Engine
// ========================================

pub struct AdminEngine {
    registry: Registry,
    store: Arc<dyn RecordStore>,
    search: Option<Arc<dyn SearchIndex>>,
    chunk_size: usize,
}

impl AdminEngine {
    pub fn new(registry: Registry, store: Arc<dyn RecordStore>) -> Self {
        Self {
            registry,
            store,
            search: None,
            chunk_size: config::config().batch.chunk_size,
        }
    }

    pub fn with_search_index(mut self, index: Arc<dyn SearchIndex>) -> Self {
        self.search = Some(index);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub fn pipeline(&self) -> QueryPipeline<'_> {
        QueryPipeline::new(&self.registry, self.store.as_ref()).with_search(self.search.as_deref())
    }

    fn bulk(&self) -> Bulk<'_> {
        Bulk::new(&self.registry, self.store.as_ref(), self.chunk_size)
    }

    fn resource(&self, req: &AdminRequest) -> Result<Resource, EngineError> {
        Ok(Resource::new(self.registry.resolve(&req.resource)?))
    }

    fn find(&self, definition: &Arc<dyn ResourceDefinition>, id: &Value) -> Result<Resource, EngineError> {
        let query = definition.base_query()?.with_trashed(TrashedStatus::With);
        let record = self
            .store
            .find(&query, id)?
            .ok_or_else(|| EngineError::not_found(format!("{} {} not found", definition.key(), id)))?;
        Ok(Resource::for_record(definition.clone(), record))
    }

    /// The record named by `req.resource_id`
    fn requested(&self, req: &AdminRequest) -> Result<Resource, EngineError> {
        let definition = self.registry.resolve(&req.resource)?;
        let id = req
            .resource_id
            .as_ref()
            .ok_or_else(|| EngineError::not_found(format!("No {} record requested", req.resource)))?;
        self.find(&definition, id)
    }

    fn details_label(resource: &Resource) -> String {
        format!("{} Details", resource.definition().singular_label())
    }

    // ========================================
    // Listing
    // ========================================

    pub fn index(&self, req: &AdminRequest) -> Result<IndexPage, EngineError> {
        let resource = self.resource(req)?;
        resource.authorize_to(req, &self.registry, &Ability::ViewAny)?;
        let pipeline = self.pipeline();
        let (query, indexed) = pipeline.index_query(&resource, req)?;
        let page = pipeline.paginate(&resource, req, &query)?;
        self.index_page(&resource, req, page, indexed, |row| row.index_fields(req, &self.registry))
    }

    pub fn lens_index(&self, req: &AdminRequest) -> Result<IndexPage, EngineError> {
        let resource = self.resource(req)?;
        resource.authorize_to(req, &self.registry, &Ability::ViewAny)?;
        let key = req
            .lens
            .as_deref()
            .ok_or_else(|| EngineError::not_found("No lens requested"))?;
        let lens = find_lens(resource.definition().as_ref(), req, key)?;

        let pipeline = self.pipeline();
        let (query, indexed) = pipeline.index_query(&resource, req)?;
        let page = pipeline.paginate(&resource, req, &query)?;
        self.index_page(&resource, req, page, indexed, |row| {
            row.lens_fields(req, &self.registry, lens.as_ref())
        })
    }

    fn index_page<F>(
        &self,
        resource: &Resource,
        req: &AdminRequest,
        page: Paginated,
        indexed_search: bool,
        fields: F,
    ) -> Result<IndexPage, EngineError>
    where
        F: Fn(&Resource) -> Result<FieldCollection, EngineError>,
    {
        let definition = resource.definition();
        let mut rows = Vec::with_capacity(page.records.len());
        for record in page.records {
            let row = Resource::for_record(definition.clone(), record);
            let allowed = |ability: Ability| row.authorized_to(req, &self.registry, &ability);
            rows.push(IndexRow {
                id: row.id().cloned().unwrap_or(Value::Null),
                title: row.title(),
                fields: fields(&row)?,
                authorized_to_view: allowed(Ability::View),
                authorized_to_update: allowed(Ability::Update),
                authorized_to_delete: allowed(Ability::Delete),
                authorized_to_restore: definition.soft_deletes() && allowed(Ability::Restore),
                authorized_to_force_delete: allowed(Ability::ForceDelete),
                soft_deleted: row.is_trashed(),
            });
        }

        Ok(IndexPage {
            label: definition.label(),
            rows,
            total: page.total,
            per_page: page.per_page,
            page: page.page,
            per_page_options: page.per_page_options,
            soft_deletes: definition.soft_deletes(),
            indexed_search,
        })
    }

    pub fn detail(&self, req: &AdminRequest) -> Result<DetailView, EngineError> {
        let resource = self.requested(req)?;
        resource.authorize_to(req, &self.registry, &Ability::View)?;
        let fields = resource.detail_fields(req, &self.registry)?;
        let panels = PanelAssembler::assemble(&fields, &Self::details_label(&resource));
        Ok(DetailView {
            id: resource.id().cloned().unwrap_or(Value::Null),
            title: resource.title(),
            fields,
            panels,
            authorized_to_update: resource.authorized_to(req, &self.registry, &Ability::Update),
            authorized_to_delete: resource.authorized_to(req, &self.registry, &Ability::Delete),
            soft_deleted: resource.is_trashed(),
        })
    }

    // ========================================
    // Forms
    // ========================================

    pub fn creation_form(&self, req: &AdminRequest) -> Result<FormView, EngineError> {
        let resource = self.resource(req)?;
        self.authorize_creation(&resource, req)?;
        let fields = resource.creation_fields(req, &self.registry);
        Ok(FormView::new(fields, &Self::details_label(&resource)))
    }

    pub fn update_form(&self, req: &AdminRequest) -> Result<FormView, EngineError> {
        let resource = self.requested(req)?;
        resource.authorize_to(req, &self.registry, &Ability::Update)?;
        let fields = resource.update_fields(req, &self.registry);
        Ok(FormView::new(fields, &Self::details_label(&resource)))
    }

    pub fn attach_form(&self, req: &AdminRequest) -> Result<FormView, EngineError> {
        let (parent, related, relationship) = self.attachment_target(req)?;
        parent.authorize_to(req, &self.registry, &Ability::AttachAny(related.clone()))?;
        let field = Self::selector(parent.relatable_field(req, &relationship)?);
        let pivot = parent.creation_pivot_fields(req, &self.registry, &related)?;
        let fields = FieldCollection::new(vec![field]).merge(pivot);
        Ok(FormView::new(fields, &Self::details_label(&parent)))
    }

    pub fn update_attached_form(&self, req: &AdminRequest) -> Result<FormView, EngineError> {
        let (parent, related, relationship) = self.attachment_target(req)?;
        let attached = self.attached_record(&parent, req, &relationship)?;
        parent.authorize_to(req, &self.registry, &Ability::Attach(related.clone()))?;

        let mut field = Self::selector(parent.relatable_field(req, &relationship)?);
        field.value = req
            .related
            .as_ref()
            .and_then(|r| r.resource_id.clone())
            .unwrap_or(Value::Null);
        let pivot = parent.update_pivot_fields(req, &self.registry, &related, &attached)?;
        let fields = FieldCollection::new(vec![field.readonly()]).merge(pivot);
        Ok(FormView::new(fields, &Self::details_label(&parent)))
    }

    /// Attachment forms pick the related record; they never embed a listing
    fn selector(mut field: Field) -> Field {
        field.listable = false;
        field
    }

    /// Validation rules of the request's form context
    pub fn rules(&self, req: &AdminRequest) -> Result<RuleSet, EngineError> {
        match req.context {
            RequestContext::Create | RequestContext::CreateInline => {
                let resource = self.resource(req)?;
                Ok(RuleAssembler::new(&resource, &self.registry).rules_for_creation(req))
            }
            RequestContext::Update => {
                let resource = match &req.resource_id {
                    Some(_) => self.requested(req)?,
                    None => self.resource(req)?,
                };
                Ok(RuleAssembler::new(&resource, &self.registry).rules_for_update(req))
            }
            RequestContext::Attach => {
                let (parent, related, relationship) = self.attachment_target(req)?;
                RuleAssembler::new(&parent, &self.registry).rules_for_attachment(req, &related, &relationship)
            }
            RequestContext::UpdateAttached => {
                let (parent, related, relationship) = self.attachment_target(req)?;
                let attached = self.attached_record(&parent, req, &relationship)?;
                RuleAssembler::new(&parent, &self.registry).rules_for_attachment_update(
                    req,
                    &related,
                    &relationship,
                    &attached,
                )
            }
            other => Err(EngineError::conflict(format!("{} requests carry no form rules", other))),
        }
    }

    // ========================================
    // Writes
    // ========================================

    fn validate(&self, resource: &Resource, req: &AdminRequest, rules: &RuleSet) -> Result<(), EngineError> {
        let mut errors = Validator::with_store(self.store.as_ref()).validate(rules, &req.input)?;
        resource.definition().after_validation(req, &mut errors);
        errors.into_result()
    }

    fn fill(fields: &FieldCollection, req: &AdminRequest, record: &mut Record) {
        for field in fields {
            field.fill(req, record);
        }
    }

    fn authorize_creation(&self, resource: &Resource, req: &AdminRequest) -> Result<(), EngineError> {
        resource.authorize_to(req, &self.registry, &Ability::Create)?;
        if let Some(via) = &req.via {
            let parent_definition = self.registry.resolve(&via.resource)?;
            let parent = self.find(&parent_definition, &via.resource_id)?;
            parent.authorize_to(req, &self.registry, &Ability::Add(resource.key().to_string()))?;
        }
        Ok(())
    }

    pub fn create(&self, req: &AdminRequest) -> Result<Record, EngineError> {
        let resource = self.resource(req)?;
        self.authorize_creation(&resource, req)?;

        let rules = RuleAssembler::new(&resource, &self.registry).rules_for_creation(req);
        self.validate(&resource, req, &rules)?;

        let fields = resource
            .creation_fields(req, &self.registry)
            .without_readonly(req)
            .without_unfillable();
        let mut record = Record::new();
        Self::fill(&fields, req, &mut record);

        let definition = resource.definition();
        self.store.insert(definition.table(), definition.primary_key(), &mut record)?;
        let id = record.key(definition.primary_key()).cloned().unwrap_or(Value::Null);
        info!("Created {} {}", definition.key(), id);
        Ok(record)
    }

    pub fn update(&self, req: &AdminRequest) -> Result<Record, EngineError> {
        let resource = self.requested(req)?;
        resource.authorize_to(req, &self.registry, &Ability::Update)?;

        let rules = RuleAssembler::new(&resource, &self.registry).rules_for_update(req);
        self.validate(&resource, req, &rules)?;

        let fields = resource
            .update_fields(req, &self.registry)
            .without_readonly(req)
            .without_unfillable();
        let definition = resource.definition().clone();
        let mut record = resource.into_record();
        Self::fill(&fields, req, &mut record);

        let changes = record.changes();
        if changes.is_empty() {
            debug!("Update of {} changed nothing", definition.key());
            return Ok(record);
        }
        let id = record.key(definition.primary_key()).cloned().unwrap_or(Value::Null);
        self.store.update(
            definition.table(),
            &[Condition::eq(definition.primary_key(), id.clone())],
            &changes,
        )?;
        record.sync_original();
        info!("Updated {} {} ({} attribute(s))", definition.key(), id, changes.len());
        Ok(record)
    }

    /// Parent record, related resource key and relationship of an attach
    /// or update-attached request
    fn attachment_target(&self, req: &AdminRequest) -> Result<(Resource, String, String), EngineError> {
        let related = req
            .related
            .as_ref()
            .ok_or_else(|| EngineError::conflict("Attachment requests need a related resource"))?;
        let parent = self.requested(req)?;
        self.registry.resolve(&related.resource)?;
        Ok((parent, related.resource.clone(), related.relationship.clone()))
    }

    fn many_to_many(parent: &Resource, req: &AdminRequest, relationship: &str) -> Result<(Field, Relation), EngineError> {
        let field = parent.relatable_field(req, relationship)?;
        match field.relation() {
            Some(relation) if field.is_belongs_to_many() => {
                let relation = relation.clone();
                Ok((field, relation))
            }
            _ => Err(EngineError::conflict(format!(
                "{} on {} is not a many-to-many relationship",
                relationship,
                parent.key()
            ))),
        }
    }

    /// The related record of an update-attached request, with its join row
    fn attached_record(&self, parent: &Resource, req: &AdminRequest, relationship: &str) -> Result<Record, EngineError> {
        let (field, relation) = Self::many_to_many(parent, req, relationship)?;
        let related_id = req
            .related
            .as_ref()
            .and_then(|r| r.resource_id.clone())
            .ok_or_else(|| EngineError::not_found("No attached record requested"))?;
        let related = self.registry.resolve(&relation.resource)?;
        let query = relation.scope_query(
            related.base_query()?.with_trashed(TrashedStatus::With),
            &field.attribute,
            parent.key(),
            parent.definition().primary_key(),
            parent.record(),
        )?;
        self.store
            .find(&query, &related_id)?
            .ok_or_else(|| EngineError::not_found(format!("{} {} is not attached", relation.resource, related_id)))
    }

    fn pivot_keys(parent: &Resource, relation: &Relation) -> (String, String, String, Value) {
        let parent_value = parent
            .record()
            .key(relation.owner_key(parent.definition().primary_key()))
            .cloned()
            .unwrap_or(Value::Null);
        (
            relation.pivot_table(parent.key()),
            relation.foreign_pivot_key(parent.key()),
            relation.related_pivot_key(),
            parent_value,
        )
    }

    pub fn attach(&self, req: &AdminRequest) -> Result<Record, EngineError> {
        let (parent, related, relationship) = self.attachment_target(req)?;
        parent.authorize_to(req, &self.registry, &Ability::AttachAny(related.clone()))?;
        parent.authorize_to(req, &self.registry, &Ability::Attach(related.clone()))?;

        let rules = RuleAssembler::new(&parent, &self.registry).rules_for_attachment(req, &related, &relationship)?;
        self.validate(&parent, req, &rules)?;

        let (field, relation) = Self::many_to_many(&parent, req, &relationship)?;
        let related_id = req.input.get(&field.attribute).cloned().unwrap_or(Value::Null);
        let (table, parent_column, related_column, parent_value) = Self::pivot_keys(&parent, &relation);

        let existing = Query::new(table.as_str())?
            .where_eq(parent_column.clone(), parent_value.clone())
            .where_eq(related_column.clone(), related_id.clone());
        if self.store.count(&existing)? > 0 {
            let mut errors = ValidationErrors::new();
            errors.add(
                field.attribute.clone(),
                format!("This {} is already attached.", crate::field::singular(&related)),
            );
            return Err(EngineError::Validation(errors));
        }

        let mut pivot = Record::new();
        pivot.set(parent_column, parent_value);
        pivot.set(related_column.clone(), related_id.clone());
        let fields = parent
            .creation_pivot_fields(req, &self.registry, &related)?
            .without_readonly(req)
            .without_unfillable();
        Self::fill(&fields, req, &mut pivot);

        self.store.insert(&table, &related_column, &mut pivot)?;
        info!("Attached {} {} to {} via {}", related, related_id, parent.key(), table);
        Ok(pivot)
    }

    pub fn update_attached(&self, req: &AdminRequest) -> Result<Record, EngineError> {
        let (parent, related, relationship) = self.attachment_target(req)?;
        let attached = self.attached_record(&parent, req, &relationship)?;
        parent.authorize_to(req, &self.registry, &Ability::Attach(related.clone()))?;

        let rules = RuleAssembler::new(&parent, &self.registry).rules_for_attachment_update(
            req,
            &related,
            &relationship,
            &attached,
        )?;
        let mut input_req = req.clone();
        if let Some(id) = req.related.as_ref().and_then(|r| r.resource_id.clone()) {
            input_req.input.entry(relationship.clone()).or_insert(id);
        }
        self.validate(&parent, &input_req, &rules)?;

        let (_, relation) = Self::many_to_many(&parent, req, &relationship)?;
        let (table, parent_column, related_column, parent_value) = Self::pivot_keys(&parent, &relation);
        let related_id = attached
            .pivot()
            .and_then(|p| p.key(&related_column))
            .cloned()
            .unwrap_or(Value::Null);

        let mut pivot = attached.pivot().cloned().unwrap_or_default();
        let fields = parent
            .update_pivot_fields(req, &self.registry, &related, &attached)?
            .without_readonly(req)
            .without_unfillable();
        Self::fill(&fields, req, &mut pivot);

        let changes: Map<String, Value> = pivot.changes();
        if !changes.is_empty() {
            self.store.update(
                &table,
                &[
                    Condition::eq(parent_column, parent_value),
                    Condition::eq(related_column, related_id),
                ],
                &changes,
            )?;
            pivot.sync_original();
        }
        Ok(pivot)
    }

    // ========================================
    // Bulk
    // ========================================

    pub fn run_action(&self, req: &AdminRequest) -> Result<(BulkOutcome, ActionResponse), EngineError> {
        let resource = self.resource(req)?;
        let key = req
            .action
            .as_deref()
            .ok_or_else(|| EngineError::not_found("No action requested"))?;
        let action = find_action(resource.definition().as_ref(), req, key)?;
        if action.is_pivot() && !req.is_via_relationship() {
            return Err(EngineError::conflict(format!(
                "Pivot action {} needs a parent relationship",
                key
            )));
        }

        let fields = resource.action_fields(req, &self.registry, action.as_ref())?;
        let rules: RuleSet = fields
            .iter()
            .map(|f| (f.attribute.clone(), f.rules_for(RequestContext::Action)))
            .filter(|(_, rules)| !rules.is_empty())
            .collect();
        let errors = Validator::with_store(self.store.as_ref()).validate(&rules, &req.input)?;
        errors.into_result()?;

        let mut values = Record::new();
        Self::fill(&fields.without_readonly(req).without_unfillable(), req, &mut values);

        let query = if action.is_standalone() {
            resource.definition().base_query()?
        } else {
            self.pipeline().selection_query(&resource, req)?
        };
        self.bulk()
            .run_action(&resource, req, action.as_ref(), query, values.fields().clone())
    }

    pub fn delete(&self, req: &AdminRequest) -> Result<BulkOutcome, EngineError> {
        let resource = self.resource(req)?;
        let query = self.pipeline().selection_query(&resource, req)?;
        self.bulk().delete(&resource, req, query)
    }

    pub fn restore(&self, req: &AdminRequest) -> Result<BulkOutcome, EngineError> {
        let resource = self.resource(req)?;
        let query = self.pipeline().selection_query(&resource, req)?;
        self.bulk().restore(&resource, req, query)
    }

    pub fn force_delete(&self, req: &AdminRequest) -> Result<BulkOutcome, EngineError> {
        let resource = self.resource(req)?;
        let query = self.pipeline().selection_query(&resource, req)?;
        self.bulk().force_delete(&resource, req, query)
    }

    pub fn detach(&self, req: &AdminRequest) -> Result<BulkOutcome, EngineError> {
        let resource = self.resource(req)?;
        let query = self.pipeline().selection_query(&resource, req)?;
        self.bulk().detach(&resource, req, query)
    }

    // ========================================
    // Catalogues
    // ========================================

    pub fn filters(&self, req: &AdminRequest) -> Result<Value, EngineError> {
        let resource = self.resource(req)?;
        resource.authorize_to(req, &self.registry, &Ability::ViewAny)?;
        Ok(self.pipeline().filters(&resource, req)?.to_json(req))
    }

    pub fn actions(&self, req: &AdminRequest) -> Result<Value, EngineError> {
        let resource = self.resource(req)?;
        resource.authorize_to(req, &self.registry, &Ability::ViewAny)?;
        let actions = available_actions(resource.definition().as_ref(), req)?;
        Ok(Value::Array(actions.iter().map(|a| a.to_json(req)).collect()))
    }

    pub fn lenses(&self, req: &AdminRequest) -> Result<Value, EngineError> {
        let resource = self.resource(req)?;
        resource.authorize_to(req, &self.registry, &Ability::ViewAny)?;
        Ok(Value::Array(
            resource
                .definition()
                .lenses(req)
                .iter()
                .filter(|l| l.authorized_to_see(req))
                .map(|l| l.to_json(req))
                .collect(),
        ))
    }
}

impl std::fmt::Debug for AdminEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminEngine")
            .field("registry", &self.registry)
            .field("search", &self.search.is_some())
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}
