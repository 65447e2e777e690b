//! Bulk actions run against selected records.

pub mod bulk;

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::config;
use crate::error::EngineError;
use crate::field::FieldItem;
use crate::lens::find_lens;
use crate::record::Record;
use crate::request::AdminRequest;
use crate::resource::ResourceDefinition;
use crate::store::RecordStore;

pub use bulk::{chunk_by_key, Bulk, BulkOutcome};

/// Result shown to the user once an action completes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionResponse {
    Message { text: String },
    Danger { text: String },
    Redirect { url: String },
    Download { url: String, name: String },
    None,
}

impl ActionResponse {
    pub fn message(text: impl Into<String>) -> Self {
        ActionResponse::Message { text: text.into() }
    }

    pub fn danger(text: impl Into<String>) -> Self {
        ActionResponse::Danger { text: text.into() }
    }
}

/// Everything an action handler sees besides the records
pub struct ActionContext<'a> {
    pub req: &'a AdminRequest,
    pub resource: &'a dyn ResourceDefinition,
    /// Validated values of the action's own fields
    pub fields: Map<String, Value>,
    pub store: &'a dyn RecordStore,
}

pub trait Action: Send + Sync {
    fn key(&self) -> &str;

    fn name(&self) -> &str;

    fn fields(&self, _req: &AdminRequest) -> Vec<FieldItem> {
        vec![]
    }

    fn authorized_to_see(&self, _req: &AdminRequest) -> bool {
        true
    }

    fn authorized_to_run(&self, _req: &AdminRequest, _record: &Record) -> bool {
        true
    }

    /// Destructive actions also need `delete` on every record they touch
    fn is_destructive(&self) -> bool {
        false
    }

    /// Runs once without a record selection
    fn is_standalone(&self) -> bool {
        false
    }

    /// Runs against join rows of a many-to-many listing
    fn is_pivot(&self) -> bool {
        false
    }

    fn chunk_size(&self) -> usize {
        config::config().batch.chunk_size
    }

    /// Handle one chunk of authorized records
    fn handle(&self, ctx: &ActionContext<'_>, records: Vec<Record>) -> Result<ActionResponse, EngineError>;

    fn to_json(&self, _req: &AdminRequest) -> Value {
        json!({
            "uriKey": self.key(),
            "name": self.name(),
            "destructive": self.is_destructive(),
            "standalone": self.is_standalone(),
            "pivot": self.is_pivot(),
        })
    }
}

/// Actions offered by `definition` for the request, including those of the
/// active lens
pub fn available_actions(definition: &dyn ResourceDefinition, req: &AdminRequest) -> Result<Vec<Arc<dyn Action>>, EngineError> {
    let mut actions = definition.actions(req);
    if let Some(lens) = &req.lens {
        actions.extend(find_lens(definition, req, lens)?.actions(req));
    }
    Ok(actions.into_iter().filter(|a| a.authorized_to_see(req)).collect())
}

/// The declared action `key`; hidden actions are forbidden
pub fn find_action(definition: &dyn ResourceDefinition, req: &AdminRequest, key: &str) -> Result<Arc<dyn Action>, EngineError> {
    let mut actions = definition.actions(req);
    if let Some(lens) = &req.lens {
        actions.extend(find_lens(definition, req, lens)?.actions(req));
    }
    let action = actions
        .into_iter()
        .find(|a| a.key() == key)
        .ok_or_else(|| EngineError::not_found(format!("Action {} is not declared on {}", key, definition.key())))?;
    if !action.authorized_to_see(req) {
        return Err(EngineError::forbidden(format!("Action {} is not available", key)));
    }
    Ok(action)
}
