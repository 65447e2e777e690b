use anyhow::{anyhow, Context};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::SourceArgs;
use crate::auth::Actor;
use crate::engine::AdminEngine;
use crate::request::AdminRequest;
use crate::schema::SchemaFile;
use crate::store::memory::MemoryStore;
use crate::types::RequestContext;

/// A loaded schema and fixture data, plus the acting user
pub struct Session {
    pub engine: AdminEngine,
    pub actor: Actor,
}

impl Session {
    pub fn open(args: &SourceArgs) -> anyhow::Result<Self> {
        let schema_path = args
            .schema
            .clone()
            .or_else(|| std::env::var("RESOURCE_SCHEMA").ok().map(PathBuf::from))
            .ok_or_else(|| anyhow!("No schema given: pass --schema or set RESOURCE_SCHEMA"))?;

        let registry = SchemaFile::load(&schema_path)
            .with_context(|| format!("Loading schema {}", schema_path.display()))?
            .into_registry()?;

        let store = MemoryStore::new();
        for key in registry.keys() {
            if let Some(definition) = registry.get(key) {
                store.seed(definition.table(), vec![])?;
            }
        }
        if let Some(path) = &args.data {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("Reading fixture data {}", path.display()))?;
            let data: Value = serde_json::from_str(&source)
                .with_context(|| format!("Parsing fixture data {}", path.display()))?;
            store.seed_json(&data)?;
        }
        debug!("Session ready with {} resource(s)", registry.len());

        let actor = args
            .roles
            .iter()
            .fold(Actor::new(args.actor.clone()), |actor, role| actor.with_role(role.clone()));

        Ok(Self {
            engine: AdminEngine::new(registry, Arc::new(store)),
            actor,
        })
    }

    pub fn request(&self, resource: &str, context: RequestContext) -> AdminRequest {
        AdminRequest::new(self.actor.clone(), resource, context)
    }
}

/// `42` stays numeric, anything else is a string key
pub fn parse_id(raw: &str) -> Value {
    raw.parse::<i64>().map(Value::from).unwrap_or_else(|_| Value::from(raw))
}

/// `users:3:roles` into its parts
pub fn parse_via(raw: &str) -> anyhow::Result<(String, Value, String)> {
    let parts: Vec<&str> = raw.split(':').collect();
    match parts.as_slice() {
        [resource, id, relationship] => Ok((resource.to_string(), parse_id(id), relationship.to_string())),
        _ => Err(anyhow!("Expected resource:id:relationship, got '{}'", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_relationship_paths() {
        let (resource, id, relationship) = parse_via("users:3:roles").unwrap();
        assert_eq!(resource, "users");
        assert_eq!(id, Value::from(3));
        assert_eq!(relationship, "roles");
        assert_eq!(parse_id("abc"), Value::from("abc"));
        assert!(parse_via("users:3").is_err());
    }
}
