use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::auth::{Gate, Policy};
use crate::error::EngineError;
use crate::query::query_where::is_identifier;
use crate::resource::ResourceDefinition;

/// Resource key to definition, plus the authorization gate.
///
/// Built once at startup and passed by reference into request handling;
/// request code only reads it.
#[derive(Clone, Default)]
pub struct Registry {
    resources: BTreeMap<String, Arc<dyn ResourceDefinition>>,
    gate: Gate,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource definition, checking its static configuration
    pub fn register(mut self, definition: Arc<dyn ResourceDefinition>) -> Result<Self, EngineError> {
        let key = definition.key().to_string();
        if !is_identifier(&key) {
            return Err(EngineError::configuration(format!("Invalid resource key: {}", key)));
        }
        if self.resources.contains_key(&key) {
            return Err(EngineError::configuration(format!("Resource {} is already registered", key)));
        }
        if !is_identifier(definition.table()) {
            return Err(EngineError::configuration(format!(
                "Resource {} has an invalid table name: {}",
                key,
                definition.table()
            )));
        }
        if !is_identifier(definition.primary_key()) {
            return Err(EngineError::configuration(format!(
                "Resource {} has an invalid primary key: {}",
                key,
                definition.primary_key()
            )));
        }
        if definition.per_page_options().is_empty() || definition.per_page_via_relationship().is_empty() {
            return Err(EngineError::configuration(format!(
                "Resource {} declares no page sizes",
                key
            )));
        }

        info!("Registered resource {} (table {})", key, definition.table());
        self.resources.insert(key, definition);
        Ok(self)
    }

    pub fn with_policy(mut self, resource: impl Into<String>, policy: Arc<dyn Policy>) -> Self {
        self.gate.register(resource, policy);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn ResourceDefinition>> {
        self.resources.get(key)
    }

    pub fn resolve(&self, key: &str) -> Result<Arc<dyn ResourceDefinition>, EngineError> {
        self.get(key)
            .cloned()
            .ok_or_else(|| EngineError::not_found(format!("Resource {} is not registered", key)))
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("gate", &self.gate)
            .finish()
    }
}
