//! Index query pipeline.
//!
//! base (table or parent relationship) -> index hook or lens -> soft-delete
//! state -> search -> filters -> ordering, then pagination.

pub mod order;
pub mod paginate;
pub mod search;

use std::sync::Arc;
use tracing::debug;

use crate::error::EngineError;
use crate::filter::{Filter, FilterDecoder};
use crate::lens::{find_lens, lens_query, Lens};
use crate::query::Query;
use crate::registry::Registry;
use crate::request::AdminRequest;
use crate::resource::Resource;
use crate::store::{RecordStore, SearchIndex};
use crate::types::Selection;

pub use paginate::{resolve_per_page, Paginated};
pub use search::key_condition;

pub struct QueryPipeline<'a> {
    registry: &'a Registry,
    store: &'a dyn RecordStore,
    search: Option<&'a dyn SearchIndex>,
}

impl<'a> QueryPipeline<'a> {
    pub fn new(registry: &'a Registry, store: &'a dyn RecordStore) -> Self {
        Self {
            registry,
            store,
            search: None,
        }
    }

    pub fn with_search(mut self, index: Option<&'a dyn SearchIndex>) -> Self {
        self.search = index;
        self
    }

    /// Starting query: a fresh table query, or the parent relationship's
    /// query when listing through one. Global scopes are bypassed for the
    /// latter.
    pub fn base_query(&self, resource: &Resource, req: &AdminRequest) -> Result<Query, EngineError> {
        let definition = resource.definition();
        let Some(via) = &req.via else {
            return Ok(definition.base_query()?);
        };

        let parent_definition = self.registry.resolve(&via.resource)?;
        let parent = req
            .parent_record(self.registry, self.store)?
            .ok_or_else(|| EngineError::not_found(format!("{} {} not found", via.resource, via.resource_id)))?;
        let field = Resource::for_record(parent_definition.clone(), parent.clone())
            .relatable_field(req, &via.relationship)?;

        let Some(relation) = field.relation() else {
            return Err(EngineError::conflict(format!("{} is not a relationship", via.relationship)));
        };
        if relation.resource != resource.key() {
            return Err(EngineError::conflict(format!(
                "Relationship {} of {} targets {}, not {}",
                via.relationship,
                via.resource,
                relation.resource,
                resource.key()
            )));
        }

        debug!("Scoping {} through {}.{}", resource.key(), via.resource, via.relationship);
        relation.scope_query(
            definition.base_query()?.without_global_scopes(),
            &field.attribute,
            &via.resource,
            parent_definition.primary_key(),
            parent,
        )
    }

    /// The lens named by the request, if any
    pub fn active_lens(&self, resource: &Resource, req: &AdminRequest) -> Result<Option<Arc<dyn Lens>>, EngineError> {
        match &req.lens {
            Some(key) => find_lens(resource.definition().as_ref(), req, key).map(Some),
            None => Ok(None),
        }
    }

    /// Filters available to the request: the lens's own when a lens is
    /// active, otherwise the resource's
    pub fn filters(&self, resource: &Resource, req: &AdminRequest) -> Result<FilterDecoder, EngineError> {
        Ok(match self.active_lens(resource, req)? {
            Some(lens) => FilterDecoder::new(
                lens.filters(req)
                    .into_iter()
                    .filter(|f| f.authorized_to_see(req))
                    .collect::<Vec<Arc<dyn Filter>>>(),
            ),
            None => FilterDecoder::for_resource(resource, req, self.registry),
        })
    }

    /// Fully scoped listing query, without pagination. Returns whether an
    /// indexed search narrowed it.
    pub fn index_query(&self, resource: &Resource, req: &AdminRequest) -> Result<(Query, bool), EngineError> {
        let base = self.base_query(resource, req)?;
        let lens = self.active_lens(resource, req)?;
        let query = match &lens {
            Some(lens) => lens_query(lens.as_ref(), req, base)?,
            None => resource.definition().index_query(req, base),
        };

        let query = query.with_trashed(req.params.trashed);
        let (query, indexed) = self.apply_search(resource, req, query)?;
        let query = self
            .filters(resource, req)?
            .apply(req, query, req.params.filters.as_deref())?;
        let query = self.apply_ordering(resource, req, query, lens.as_deref(), indexed)?;
        Ok((query, indexed))
    }

    /// Records targeted by a bulk request: the whole listing, or the
    /// selected keys within it
    pub fn selection_query(&self, resource: &Resource, req: &AdminRequest) -> Result<Query, EngineError> {
        let (query, _) = self.index_query(resource, req)?;
        Ok(match &req.selection {
            Selection::All => query,
            Selection::Keys(keys) => query.where_keys(keys.clone()),
        })
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store
    }
}
