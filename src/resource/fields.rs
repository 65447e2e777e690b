//! Field resolution per request context.

use tracing::debug;

use super::Resource;
use crate::action::Action;
use crate::auth::Ability;
use crate::error::EngineError;
use crate::field::{flatten, Field, FieldCollection, FieldItem};
use crate::lens::Lens;
use crate::record::Record;
use crate::registry::Registry;
use crate::request::AdminRequest;
use crate::types::RequestContext;

impl Resource {
    /// The declared field list for the request context: inline-create,
    /// index, detail, create, then update overrides, falling back to
    /// `fields`.
    pub fn declared_fields(&self, req: &AdminRequest) -> Vec<FieldItem> {
        let definition = self.definition();
        let context = req.context;

        let chosen = None
            .or_else(|| context.is_inline_create().then(|| definition.fields_for_inline_create(req)).flatten().map(|f| ("fields_for_inline_create", f)))
            .or_else(|| (context == RequestContext::Index).then(|| definition.fields_for_index(req)).flatten().map(|f| ("fields_for_index", f)))
            .or_else(|| (context == RequestContext::Detail).then(|| definition.fields_for_detail(req)).flatten().map(|f| ("fields_for_detail", f)))
            .or_else(|| context.is_create_or_attach().then(|| definition.fields_for_create(req)).flatten().map(|f| ("fields_for_create", f)))
            .or_else(|| context.is_update_or_update_attached().then(|| definition.fields_for_update(req)).flatten().map(|f| ("fields_for_update", f)));

        match chosen {
            Some((method, items)) => {
                debug!("Resolving {} fields for {} via {}", self.key(), context, method);
                items
            }
            None => {
                debug!("Resolving {} fields for {} via fields", self.key(), context);
                definition.fields(req)
            }
        }
    }

    /// Flattened declared fields, before any filtering
    pub fn available_fields(&self, req: &AdminRequest) -> FieldCollection {
        FieldCollection::new(flatten(self.declared_fields(req)))
    }

    pub fn index_fields(&self, req: &AdminRequest, registry: &Registry) -> Result<FieldCollection, EngineError> {
        let fields = self.available_fields(req);
        let fields = self.splice_pivot_fields(req, registry, fields)?;
        Ok(fields
            .filter_for_index(req, self.record())
            .without_listable()
            .authorized(req, registry)
            .resolve(self.record())
            .resolve_pivot(self.record()))
    }

    /// Detail fields keep listable relationships; they become relationship
    /// panels.
    pub fn detail_fields(&self, req: &AdminRequest, registry: &Registry) -> Result<FieldCollection, EngineError> {
        let fields = self.available_fields(req);
        let fields = self.splice_pivot_fields(req, registry, fields)?;
        Ok(fields
            .filter_for_detail(req, self.record())
            .authorized(req, registry)
            .resolve(self.record())
            .resolve_pivot(self.record()))
    }

    pub fn creation_fields(&self, req: &AdminRequest, registry: &Registry) -> FieldCollection {
        self.available_fields(req)
            .filter_for_creation(req)
            .without_listable()
            .authorized(req, registry)
            .apply_depends_on(&req.input)
            .map(|mut field| {
                field.resolve(&Record::new());
                if field.value.is_null() {
                    if let Some(default) = &field.default_value {
                        field.value = default.clone();
                    }
                }
                field
            })
    }

    pub fn update_fields(&self, req: &AdminRequest, registry: &Registry) -> FieldCollection {
        self.available_fields(req)
            .filter_for_update(req, self.record())
            .without_listable()
            .authorized(req, registry)
            .apply_depends_on(&req.input)
            .resolve(self.record())
    }

    /// Pivot fields shown when attaching `related_resource`
    pub fn creation_pivot_fields(
        &self,
        req: &AdminRequest,
        registry: &Registry,
        related_resource: &str,
    ) -> Result<FieldCollection, EngineError> {
        Ok(self
            .pivot_fields_for(req, registry, related_resource)?
            .filter_for_creation(req)
            .authorized(req, registry)
            .apply_depends_on(&req.input))
    }

    /// Pivot fields shown when editing an existing attachment; `related`
    /// carries the join row as its pivot record.
    pub fn update_pivot_fields(
        &self,
        req: &AdminRequest,
        registry: &Registry,
        related_resource: &str,
        related: &Record,
    ) -> Result<FieldCollection, EngineError> {
        let empty = Record::new();
        let pivot = related.pivot().unwrap_or(&empty);
        Ok(self
            .pivot_fields_for(req, registry, related_resource)?
            .filter_for_update(req, pivot)
            .authorized(req, registry)
            .apply_depends_on(&req.input)
            .resolve_pivot(related))
    }

    /// The relationship field named `relationship`. A missing or
    /// non-relationship field means the request was built against a stale
    /// relationship path.
    pub fn relatable_field(&self, req: &AdminRequest, relationship: &str) -> Result<Field, EngineError> {
        self.available_fields(req)
            .into_iter()
            .find(|f| f.attribute == relationship && f.relation().is_some())
            .ok_or_else(|| {
                EngineError::conflict(format!(
                    "Resource {} has no relationship named {}",
                    self.key(),
                    relationship
                ))
            })
    }

    /// Fields that must release storage before a hard delete
    pub fn deletable_fields(&self, req: &AdminRequest) -> FieldCollection {
        self.available_fields(req).deletable()
    }

    /// Columns the index may be sorted by
    pub fn sortable_columns(&self, req: &AdminRequest, registry: &Registry) -> Result<Vec<String>, EngineError> {
        Ok(self
            .index_fields(req, registry)?
            .iter()
            .filter_map(Field::sortable_column)
            .collect())
    }

    /// Fields of `action`. The resource must be viewable first.
    pub fn action_fields(
        &self,
        req: &AdminRequest,
        registry: &Registry,
        action: &dyn Action,
    ) -> Result<FieldCollection, EngineError> {
        self.authorize_to(req, registry, &Ability::ViewAny)?;
        Ok(FieldCollection::new(flatten(action.fields(req)))
            .authorized(req, registry)
            .map(|mut field| {
                field.resolve(&Record::new());
                if let (true, Some(default)) = (field.value.is_null(), &field.default_value) {
                    field.value = default.clone();
                }
                field
            }))
    }

    /// Index fields of `lens` resolved for `self.record()`. Both the
    /// resource and the lens must be viewable first.
    pub fn lens_fields(
        &self,
        req: &AdminRequest,
        registry: &Registry,
        lens: &dyn Lens,
    ) -> Result<FieldCollection, EngineError> {
        self.authorize_to(req, registry, &Ability::ViewAny)?;
        if !lens.authorized_to_see(req) {
            return Err(EngineError::forbidden(format!(
                "Lens {} is not available on {}",
                lens.key(),
                self.key()
            )));
        }
        Ok(FieldCollection::new(flatten(lens.fields(req)))
            .filter_for_index(req, self.record())
            .without_listable()
            .authorized(req, registry)
            .resolve(self.record()))
    }
}
