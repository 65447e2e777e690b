//! Lenses: alternate, query-customized listings of a resource.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::action::Action;
use crate::error::EngineError;
use crate::field::FieldItem;
use crate::filter::Filter;
use crate::query::Query;
use crate::record::Record;
use crate::request::AdminRequest;
use crate::resource::ResourceDefinition;

/// What a lens hands back for its listing. Only `Query` is valid; a
/// materialized record list cannot be searched, filtered or paged.
#[derive(Debug, Clone)]
pub enum LensOutput {
    Query(Query),
    Records(Vec<Record>),
}

pub trait Lens: Send + Sync {
    fn key(&self) -> &str;

    fn name(&self) -> &str;

    fn fields(&self, req: &AdminRequest) -> Vec<FieldItem>;

    /// Customize the base query of the resource
    fn query(&self, req: &AdminRequest, query: Query) -> Result<LensOutput, EngineError>;

    fn filters(&self, _req: &AdminRequest) -> Vec<Arc<dyn Filter>> {
        vec![]
    }

    fn actions(&self, _req: &AdminRequest) -> Vec<Arc<dyn Action>> {
        vec![]
    }

    fn authorized_to_see(&self, _req: &AdminRequest) -> bool {
        true
    }

    fn to_json(&self, _req: &AdminRequest) -> Value {
        json!({"uriKey": self.key(), "name": self.name()})
    }
}

/// The declared lens `key` of `definition`
pub fn find_lens(definition: &dyn ResourceDefinition, req: &AdminRequest, key: &str) -> Result<Arc<dyn Lens>, EngineError> {
    let lens = definition
        .lenses(req)
        .into_iter()
        .find(|l| l.key() == key)
        .ok_or_else(|| EngineError::not_found(format!("Lens {} is not declared on {}", key, definition.key())))?;
    if !lens.authorized_to_see(req) {
        return Err(EngineError::forbidden(format!(
            "Lens {} is not available on {}",
            key,
            definition.key()
        )));
    }
    Ok(lens)
}

/// Run the lens against `base`, insisting on a query over the same table
pub fn lens_query(lens: &dyn Lens, req: &AdminRequest, base: Query) -> Result<Query, EngineError> {
    let table = base.table().to_string();
    match lens.query(req, base)? {
        LensOutput::Query(query) if query.table() == table => Ok(query),
        LensOutput::Query(query) => Err(EngineError::configuration(format!(
            "Lens {} returned a query over {} instead of {}",
            lens.key(),
            query.table(),
            table
        ))),
        LensOutput::Records(records) => Err(EngineError::configuration(format!(
            "Lens {} returned {} materialized record(s) instead of a query",
            lens.key(),
            records.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Actor;
    use crate::types::RequestContext;

    struct Materialized;

    impl Lens for Materialized {
        fn key(&self) -> &str {
            "materialized"
        }

        fn name(&self) -> &str {
            "Materialized"
        }

        fn fields(&self, _req: &AdminRequest) -> Vec<FieldItem> {
            vec![]
        }

        fn query(&self, _req: &AdminRequest, _query: Query) -> Result<LensOutput, EngineError> {
            Ok(LensOutput::Records(vec![Record::new()]))
        }
    }

    #[test]
    fn materialized_output_is_a_configuration_error() {
        let req = AdminRequest::new(Actor::guest(), "posts", RequestContext::Lens);
        let result = lens_query(&Materialized, &req, Query::new("posts").unwrap());
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }
}
