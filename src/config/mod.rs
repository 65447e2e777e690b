use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Engine tunables. Resources are never configured here; they live in a
/// `Registry` value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub pagination: PaginationConfig,
    pub search: SearchConfig,
    pub batch: BatchConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    fn from_env() -> Self {
        match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Page sizes offered when a resource declares none of its own
    pub per_page_options: Vec<u64>,
    /// Page sizes offered when listing through a relationship
    pub per_page_via_relationship: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Largest numeric search term compared against an integer primary key
    pub max_integer_key: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_audit_logging: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut config = Self::preset(Environment::from_env());

        if let Some(options) = env_list("PAGINATION_PER_PAGE_OPTIONS") {
            config.pagination.per_page_options = options;
        }
        if let Some(options) = env_list("PAGINATION_PER_PAGE_VIA_RELATIONSHIP") {
            config.pagination.per_page_via_relationship = options;
        }
        override_from_env("SEARCH_MAX_INTEGER_KEY", &mut config.search.max_integer_key);
        if let Some(size) = env_parse::<usize>("BATCH_CHUNK_SIZE").filter(|size| *size > 0) {
            config.batch.chunk_size = size;
        }
        if let Ok(url) = env::var("DATABASE_URL") {
            config.database.url = Some(url);
        }
        override_from_env("DATABASE_MAX_CONNECTIONS", &mut config.database.max_connections);
        override_from_env("SECURITY_ENABLE_AUDIT_LOGGING", &mut config.security.enable_audit_logging);

        config
    }

    /// Defaults per environment, before env overrides
    pub fn preset(environment: Environment) -> Self {
        let production_like = environment != Environment::Development;
        Self {
            environment,
            pagination: PaginationConfig {
                per_page_options: vec![25, 50, 100],
                per_page_via_relationship: vec![5],
            },
            search: SearchConfig {
                max_integer_key: i32::MAX as i64,
            },
            batch: BatchConfig {
                chunk_size: if environment == Environment::Production { 500 } else { 200 },
            },
            database: DatabaseConfig {
                url: None,
                max_connections: match environment {
                    Environment::Development => 5,
                    Environment::Staging => 20,
                    Environment::Production => 50,
                },
            },
            security: SecurityConfig {
                enable_audit_logging: production_like,
            },
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Unparseable values leave the preset in place
fn override_from_env<T: FromStr>(name: &str, target: &mut T) {
    if let Some(value) = env_parse(name) {
        *target = value;
    }
}

fn env_list(name: &str) -> Option<Vec<u64>> {
    env::var(name).ok().and_then(|v| parse_u64_list(&v))
}

fn parse_u64_list(value: &str) -> Option<Vec<u64>> {
    let parsed: Vec<u64> = value
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .filter(|n| *n > 0)
        .collect();
    if parsed.is_empty() {
        None
    } else {
        Some(parsed)
    }
}

pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_preset_keeps_audit_logging_off() {
        let config = AppConfig::preset(Environment::Development);
        assert_eq!(config.pagination.per_page_options, vec![25, 50, 100]);
        assert_eq!(config.pagination.per_page_via_relationship, vec![5]);
        assert_eq!(config.search.max_integer_key, 2147483647);
        assert_eq!(config.batch.chunk_size, 200);
        assert!(!config.security.enable_audit_logging);
    }

    #[test]
    fn production_preset_uses_larger_chunks() {
        let config = AppConfig::preset(Environment::Production);
        assert_eq!(config.batch.chunk_size, 500);
        assert_eq!(config.database.max_connections, 50);
        assert!(config.security.enable_audit_logging);
    }

    #[test]
    fn page_size_lists_skip_garbage_and_zero() {
        assert_eq!(parse_u64_list("10, 20,x,0"), Some(vec![10, 20]));
        assert_eq!(parse_u64_list("nope"), None);
    }
}
