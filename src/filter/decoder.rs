//! Encoded filter parameter.
//!
//! The parameter is base64 over a JSON array of `{"class": key, "value": v}`
//! entries. Entries are applied in array order.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{is_empty_value, FieldFilter, Filter};
use crate::error::EngineError;
use crate::query::Query;
use crate::registry::Registry;
use crate::request::AdminRequest;
use crate::resource::Resource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterEntry {
    #[serde(rename = "class")]
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

impl FilterEntry {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

pub fn encode_filters(entries: &[FilterEntry]) -> Result<String, serde_json::Error> {
    Ok(STANDARD.encode(serde_json::to_vec(entries)?))
}

/// Decode the filter parameter. Undecodable input yields no entries;
/// malformed array elements are skipped.
pub fn decode_filters(encoded: &str) -> Vec<FilterEntry> {
    let bytes = match STANDARD.decode(encoded.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Ignoring undecodable filter parameter: {}", e);
            return vec![];
        }
    };
    let items: Vec<Value> = match serde_json::from_slice(&bytes) {
        Ok(items) => items,
        Err(e) => {
            warn!("Ignoring filter parameter that is not a JSON array: {}", e);
            return vec![];
        }
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<FilterEntry>(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping malformed filter entry: {}", e);
                None
            }
        })
        .collect()
}

/// A decoded entry matched to an authorized filter
#[derive(Clone)]
pub struct ResolvedFilter {
    pub filter: Arc<dyn Filter>,
    pub value: Value,
}

impl fmt::Debug for ResolvedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedFilter")
            .field("key", &self.filter.key())
            .field("value", &self.value)
            .finish()
    }
}

/// The authorized filter catalogue of one resource for one request
#[derive(Clone, Default)]
pub struct FilterDecoder {
    available: Vec<Arc<dyn Filter>>,
}

impl FilterDecoder {
    pub fn new(available: Vec<Arc<dyn Filter>>) -> Self {
        Self { available }
    }

    /// Declared filters plus the implicit filters of filterable fields,
    /// keeping only those the actor may see.
    pub fn for_resource(resource: &Resource, req: &AdminRequest, registry: &Registry) -> Self {
        let mut candidates = resource.definition().filters(req);
        candidates.extend(
            resource
                .available_fields(req)
                .filterable()
                .authorized(req, registry)
                .unique()
                .iter()
                .filter_map(FieldFilter::new)
                .map(|f| Arc::new(f) as Arc<dyn Filter>),
        );

        let mut seen = HashSet::new();
        let total = candidates.len();
        let available: Vec<Arc<dyn Filter>> = candidates
            .into_iter()
            .filter(|f| f.authorized_to_see(req))
            .filter(|f| seen.insert(f.key().to_string()))
            .collect();
        if available.len() != total {
            debug!(
                "{} of {} filter(s) on {} hidden from actor",
                total - available.len(),
                total,
                resource.key()
            );
        }
        Self { available }
    }

    pub fn available(&self) -> &[Arc<dyn Filter>] {
        &self.available
    }

    pub fn find(&self, key: &str) -> Option<&Arc<dyn Filter>> {
        self.available.iter().find(|f| f.key() == key)
    }

    /// Match decoded entries to filters, in entry order. Unknown or
    /// unauthorized keys and empty values are dropped.
    pub fn resolve(&self, entries: Vec<FilterEntry>) -> Vec<ResolvedFilter> {
        entries
            .into_iter()
            .filter_map(|entry| {
                let Some(filter) = self.find(&entry.key) else {
                    debug!("Dropping filter {}: not available", entry.key);
                    return None;
                };
                if is_empty_value(&entry.value) {
                    return None;
                }
                Some(ResolvedFilter {
                    filter: filter.clone(),
                    value: entry.value,
                })
            })
            .collect()
    }

    pub fn decode(&self, encoded: Option<&str>) -> Vec<ResolvedFilter> {
        match encoded {
            Some(encoded) if !encoded.trim().is_empty() => self.resolve(decode_filters(encoded)),
            _ => vec![],
        }
    }

    /// Apply every resolved filter of `encoded` to `query`, in order
    pub fn apply(&self, req: &AdminRequest, query: Query, encoded: Option<&str>) -> Result<Query, EngineError> {
        let mut query = query;
        for resolved in self.decode(encoded) {
            debug!("Applying filter {}", resolved.filter.key());
            query = resolved.filter.apply(req, query, &resolved.value)?;
        }
        Ok(query)
    }

    pub fn to_json(&self, req: &AdminRequest) -> Value {
        Value::Array(self.available.iter().map(|f| f.to_json(req)).collect())
    }
}

impl fmt::Debug for FilterDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.available.iter().map(|filter| filter.key()))
            .finish()
    }
}
