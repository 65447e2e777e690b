//! List filters: user-facing, authorization-gated query predicates.

pub mod builtin;
pub mod decoder;

use serde_json::{json, Value};

use crate::error::EngineError;
use crate::field::SelectOption;
use crate::query::Query;
use crate::request::AdminRequest;

pub use builtin::{BooleanFilter, FieldFilter, SelectFilter};
pub use decoder::{decode_filters, encode_filters, FilterDecoder, FilterEntry, ResolvedFilter};

pub trait Filter: Send + Sync {
    /// Identifier carried in the encoded filter parameter
    fn key(&self) -> &str;

    fn name(&self) -> &str;

    fn component(&self) -> &str {
        "select-filter"
    }

    /// Narrow `query` by the submitted value
    fn apply(&self, req: &AdminRequest, query: Query, value: &Value) -> Result<Query, EngineError>;

    fn options(&self, _req: &AdminRequest) -> Vec<SelectOption> {
        vec![]
    }

    fn default_value(&self) -> Value {
        Value::Null
    }

    fn authorized_to_see(&self, _req: &AdminRequest) -> bool {
        true
    }

    fn to_json(&self, req: &AdminRequest) -> Value {
        json!({
            "class": self.key(),
            "name": self.name(),
            "component": self.component(),
            "options": self.options(req),
            "currentValue": self.default_value(),
        })
    }
}

/// Null, blank strings and empty arrays or objects carry no filter
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
