use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::auth::Actor;
use crate::error::EngineError;
use crate::record::Record;
use crate::registry::Registry;
use crate::store::RecordStore;
use crate::types::{RequestContext, Selection, SortDirection, TrashedStatus};

/// The parent side of a "via relationship" request: listing `roles` of
/// `users/3` through the `roles` relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViaRelationship {
    pub resource: String,
    pub resource_id: Value,
    pub relationship: String,
}

/// Target of an attach / update-attached request, seen from the owning
/// resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedTarget {
    pub resource: String,
    pub resource_id: Option<Value>,
    pub relationship: String,
}

/// Listing parameters, scoped by resource or relationship name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexParams {
    pub search: Option<String>,
    /// Encoded filter parameter
    pub filters: Option<String>,
    pub order_by: Option<String>,
    pub direction: Option<SortDirection>,
    pub trashed: TrashedStatus,
    pub per_page: Option<u64>,
    pub page: u64,
}

impl IndexParams {
    /// Read `{scope}_search`, `{scope}_filter`, `{scope}_order`,
    /// `{scope}_direction`, `{scope}_trashed`, `{scope}_per_page` and
    /// `{scope}_page` from a flat parameter map.
    pub fn from_query(scope: &str, params: &Map<String, Value>) -> Self {
        let get = |name: &str| -> Option<String> {
            match params.get(&format!("{}_{}", scope, name))? {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            }
        };
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        Self {
            search: non_empty(get("search")),
            filters: non_empty(get("filter")),
            order_by: non_empty(get("order")),
            direction: get("direction").map(|d| SortDirection::parse(&d)),
            trashed: get("trashed").map(|t| TrashedStatus::parse(&t)).unwrap_or_default(),
            per_page: get("per_page").and_then(|p| p.trim().parse().ok()),
            page: get("page").and_then(|p| p.trim().parse().ok()).filter(|p| *p > 0).unwrap_or(1),
        }
    }

    /// Non-blank search term
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn page(&self) -> u64 {
        self.page.max(1)
    }
}

/// One incoming admin request. Lives for the duration of the request; the
/// parent record of a via-relationship request is looked up at most once.
#[derive(Debug, Clone)]
pub struct AdminRequest {
    pub actor: Actor,
    pub resource: String,
    pub context: RequestContext,
    pub resource_id: Option<Value>,
    pub via: Option<ViaRelationship>,
    pub related: Option<RelatedTarget>,
    pub params: IndexParams,
    pub input: Map<String, Value>,
    pub selection: Selection,
    pub lens: Option<String>,
    pub action: Option<String>,
    parent: OnceCell<Record>,
}

impl AdminRequest {
    pub fn new(actor: Actor, resource: impl Into<String>, context: RequestContext) -> Self {
        Self {
            actor,
            resource: resource.into(),
            context,
            resource_id: None,
            via: None,
            related: None,
            params: IndexParams { page: 1, ..IndexParams::default() },
            input: Map::new(),
            selection: Selection::All,
            lens: None,
            action: None,
            parent: OnceCell::new(),
        }
    }

    pub fn with_resource_id(mut self, id: impl Into<Value>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn via(mut self, resource: impl Into<String>, resource_id: impl Into<Value>, relationship: impl Into<String>) -> Self {
        self.via = Some(ViaRelationship {
            resource: resource.into(),
            resource_id: resource_id.into(),
            relationship: relationship.into(),
        });
        self.parent = OnceCell::new();
        self
    }

    pub fn related(mut self, resource: impl Into<String>, resource_id: Option<Value>, relationship: impl Into<String>) -> Self {
        self.related = Some(RelatedTarget {
            resource: resource.into(),
            resource_id,
            relationship: relationship.into(),
        });
        self
    }

    pub fn with_params(mut self, params: IndexParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_input(mut self, input: Map<String, Value>) -> Self {
        self.input = input;
        self
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_lens(mut self, lens: impl Into<String>) -> Self {
        self.lens = Some(lens.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    pub fn is_via_relationship(&self) -> bool {
        self.via.is_some()
    }

    /// Scope name for listing parameters: the relationship when listing
    /// through one, otherwise the resource key
    pub fn param_scope(&self) -> &str {
        match &self.via {
            Some(via) => &via.relationship,
            None => &self.resource,
        }
    }

    /// Parent record of a via-relationship request, loaded on first use and
    /// reused for the rest of the request.
    pub fn parent_record(&self, registry: &Registry, store: &dyn RecordStore) -> Result<Option<&Record>, EngineError> {
        let Some(via) = &self.via else {
            return Ok(None);
        };
        self.parent
            .get_or_try_init(|| {
                debug!("Loading parent {}/{}", via.resource, via.resource_id);
                let parent = registry.resolve(&via.resource)?;
                let query = parent.base_query()?.with_trashed(TrashedStatus::With);
                store.find(&query, &via.resource_id)?.ok_or_else(|| {
                    EngineError::not_found(format!("{} {} not found", via.resource, via.resource_id))
                })
            })
            .map(Some)
    }
}
