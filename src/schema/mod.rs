//! Declarative resources.
//!
//! A schema file (YAML, or JSON by extension) lists resources with their
//! fields, panels, tabs, filters, lenses, scopes and role policies. Loading
//! builds every field up front, so a bad schema fails at load time rather
//! than on the first request.

pub mod resource;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::auth::RolePolicy;
use crate::error::EngineError;
use crate::query::QueryError;
use crate::registry::Registry;

pub use resource::{SchemaLens, SchemaResource};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read schema file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML schema: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid JSON schema: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown field type '{kind}' for {resource}.{field}")]
    UnknownFieldType {
        resource: String,
        field: String,
        kind: String,
    },

    #[error("Invalid schema for {resource}: {message}")]
    Invalid { resource: String, message: String },

    #[error("Invalid where clause: {0}")]
    Query(#[from] QueryError),

    #[error(transparent)]
    Registry(#[from] EngineError),
}

impl SchemaError {
    pub(crate) fn invalid(resource: &str, message: impl Into<String>) -> Self {
        SchemaError::Invalid {
            resource: resource.to_string(),
            message: message.into(),
        }
    }
}

// ========================================
// Schema documents
// ========================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub resources: Vec<ResourceSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSchema {
    pub key: String,
    pub table: Option<String>,
    pub label: Option<String>,
    pub singular_label: Option<String>,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// integer | big_integer | string | uuid
    #[serde(default)]
    pub key_type: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub soft_deletes: bool,
    #[serde(default)]
    pub search: Vec<String>,
    #[serde(default)]
    pub search_index: bool,
    pub per_page: Option<Vec<u64>>,
    pub per_page_via_relationship: Option<Vec<u64>>,
    /// Default order, e.g. `{"title": "asc"}`
    pub order: Option<Value>,
    /// Named global scopes in the where-DSL
    #[serde(default)]
    pub scopes: BTreeMap<String, Value>,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
    #[serde(default)]
    pub panels: Vec<PanelSchema>,
    #[serde(default)]
    pub tabs: Vec<TabGroupSchema>,
    #[serde(default)]
    pub filters: Vec<FilterSchema>,
    #[serde(default)]
    pub lenses: Vec<LensSchema>,
    /// Ability name to allowed roles
    pub policy: Option<BTreeMap<String, Vec<String>>>,
}

fn default_primary_key() -> String {
    "id".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub attribute: Option<String>,
    #[serde(rename = "type", default = "default_field_type")]
    pub kind: String,
    /// Related resource key of a relationship field
    pub resource: Option<String>,
    pub foreign_key: Option<String>,
    pub pivot_table: Option<String>,
    #[serde(default)]
    pub pivot: Vec<FieldSchema>,
    #[serde(default)]
    pub options: Vec<OptionSchema>,
    pub rules: Option<String>,
    pub creation_rules: Option<String>,
    pub update_rules: Option<String>,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub readonly: bool,
    pub help: Option<String>,
    pub default: Option<Value>,
    #[serde(default)]
    pub as_panel: bool,
    #[serde(default)]
    pub hide_from_index: bool,
    #[serde(default)]
    pub hide_from_detail: bool,
    #[serde(default)]
    pub hide_when_creating: bool,
    #[serde(default)]
    pub hide_when_updating: bool,
    /// Roles allowed to see the field; empty means everyone
    #[serde(default)]
    pub roles: Vec<String>,
}

fn default_field_type() -> String {
    "text".to_string()
}

impl FieldSchema {
    pub fn attribute(&self) -> String {
        self.attribute
            .clone()
            .unwrap_or_else(|| self.name.to_lowercase().replace(' ', "_"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionSchema {
    pub value: Value,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelSchema {
    pub name: String,
    /// Attributes placed in the panel
    pub fields: Vec<String>,
    #[serde(default)]
    pub collapsible: bool,
    #[serde(default)]
    pub collapsed_by_default: bool,
    pub limit: Option<usize>,
    pub help: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabGroupSchema {
    pub group: String,
    pub tabs: Vec<TabSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabSchema {
    pub name: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSchema {
    pub key: String,
    pub name: String,
    /// select | boolean
    #[serde(rename = "type", default = "default_filter_type")]
    pub kind: String,
    pub column: Option<String>,
    #[serde(default)]
    pub options: Vec<OptionSchema>,
    pub default: Option<Value>,
    #[serde(default)]
    pub roles: Vec<String>,
}

fn default_filter_type() -> String {
    "select".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LensSchema {
    pub key: String,
    pub name: String,
    #[serde(rename = "where", default)]
    pub where_clause: Option<Value>,
    pub order: Option<Value>,
    /// Attributes listed by the lens; all index fields when absent
    pub fields: Option<Vec<String>>,
    #[serde(default)]
    pub roles: Vec<String>,
}

// ========================================
// Loading
// ========================================

impl SchemaFile {
    pub fn from_yaml_str(source: &str) -> Result<Self, SchemaError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_json_str(source: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Read a schema file; `.json` files are parsed as JSON, anything else
    /// as YAML
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!("Loading resource schema from {}", path.display());
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&source),
            _ => Self::from_yaml_str(&source),
        }
    }

    /// Build and register every declared resource with its policy
    pub fn into_registry(self) -> Result<Registry, SchemaError> {
        let mut registry = Registry::new();
        let count = self.resources.len();
        for schema in self.resources {
            let policy = schema.policy.clone();
            let key = schema.key.clone();
            registry = registry.register(Arc::new(SchemaResource::build(schema)?))?;
            if let Some(abilities) = policy {
                let policy = abilities
                    .into_iter()
                    .fold(RolePolicy::new(), |policy, (ability, roles)| policy.allow(ability, roles));
                registry = registry.with_policy(key, Arc::new(policy));
            }
        }
        info!("Registered {} schema resource(s)", count);
        Ok(registry)
    }
}
