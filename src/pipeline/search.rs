use tracing::debug;

use super::QueryPipeline;
use crate::config;
use crate::error::EngineError;
use crate::query::{Condition, Query};
use crate::request::AdminRequest;
use crate::resource::{KeyType, Resource};

/// Exact primary-key match for a search term, when the term fits the key's
/// storage type
pub fn key_condition(key_type: KeyType, column: &str, term: &str) -> Option<Condition> {
    let digits = !term.is_empty() && term.chars().all(|c| c.is_ascii_digit());
    match key_type {
        KeyType::Integer => {
            let value: i64 = term.parse().ok().filter(|_| digits)?;
            (value <= config::config().search.max_integer_key).then(|| Condition::eq(column, value))
        }
        KeyType::BigInteger => {
            let value: i64 = term.parse().ok().filter(|_| digits)?;
            Some(Condition::eq(column, value))
        }
        KeyType::Uuid => uuid::Uuid::parse_str(term)
            .ok()
            .map(|id| Condition::eq(column, id.to_string())),
        KeyType::String => Some(Condition::eq(column, term)),
    }
}

impl QueryPipeline<'_> {
    /// Narrow by the search term. Uses the search index when the resource
    /// asks for one and one is configured; otherwise ORs a predicate per
    /// searchable column. Returns whether the index was used.
    pub fn apply_search(&self, resource: &Resource, req: &AdminRequest, query: Query) -> Result<(Query, bool), EngineError> {
        let Some(term) = req.params.search_term() else {
            return Ok((query, false));
        };
        let definition = resource.definition();

        if definition.uses_search_index() {
            match self.search {
                Some(index) => {
                    let keys = index.search(definition.key(), term)?;
                    debug!("Search index returned {} key(s) for {}", keys.len(), definition.key());
                    return Ok((query.where_keys(keys), true));
                }
                None => debug!("No search index configured; searching {} by column", definition.key()),
            }
        }

        let primary_key = definition.primary_key();
        let conditions: Vec<Condition> = definition
            .search_columns()
            .into_iter()
            .filter_map(|column| {
                if column == primary_key {
                    key_condition(definition.primary_key_type(), &column, term)
                } else {
                    Some(Condition::contains(column, term))
                }
            })
            .collect();

        debug!("Searching {} across {} column predicate(s)", definition.key(), conditions.len());
        Ok((query.and_where(Condition::any(conditions)), false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_keys_only_match_digit_terms_in_range() {
        assert_eq!(key_condition(KeyType::Integer, "id", "42"), Some(Condition::eq("id", 42)));
        assert_eq!(key_condition(KeyType::Integer, "id", "-1"), None);
        assert_eq!(key_condition(KeyType::Integer, "id", "4e2"), None);
        assert_eq!(key_condition(KeyType::Integer, "id", "99999999999"), None);
        assert_eq!(
            key_condition(KeyType::BigInteger, "id", "99999999999"),
            Some(Condition::eq("id", 99_999_999_999_i64))
        );
    }

    #[test]
    fn uuid_and_string_keys() {
        let id = "0b7e1a8e-6f57-4c2f-9d1c-7a8a0f3b9e21";
        assert_eq!(key_condition(KeyType::Uuid, "id", id), Some(Condition::eq("id", id)));
        assert_eq!(key_condition(KeyType::Uuid, "id", "rust"), None);
        assert_eq!(key_condition(KeyType::String, "slug", "rust"), Some(Condition::eq("slug", "rust")));
    }
}
