//! Record store contract.
//!
//! The engine talks to its backing data through these blocking traits. One
//! logical step issues one call: a count for pagination, a page fetch, a
//! keyed lookup, a write.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::query::{Condition, Query, QueryError};
use crate::record::Record;

pub use memory::{MemorySearchIndex, MemoryStore};
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Store backend error: {0}")]
    Backend(String),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub trait RecordStore: Send + Sync {
    /// Rows matching the query, in query order. Rows reached through a pivot
    /// join carry the join row as their pivot record.
    fn fetch(&self, query: &Query) -> Result<Vec<Record>, StoreError>;

    /// Number of matching rows, ignoring limit and offset
    fn count(&self, query: &Query) -> Result<u64, StoreError>;

    /// Single row by primary key within the query's scope
    fn find(&self, query: &Query, key: &Value) -> Result<Option<Record>, StoreError> {
        let query = query
            .clone()
            .where_eq(query.primary_key().to_string(), key.clone())
            .clear_order()
            .limit(1, None);
        Ok(self.fetch(&query)?.into_iter().next())
    }

    /// Insert `record`, assigning its primary key when absent; the record is
    /// marked as stored afterwards.
    fn insert(&self, table: &str, primary_key: &str, record: &mut Record) -> Result<(), StoreError>;

    /// Apply `changes` to every row matching `conditions`; returns the
    /// number of rows touched.
    fn update(&self, table: &str, conditions: &[Condition], changes: &Map<String, Value>) -> Result<u64, StoreError>;

    fn delete(&self, table: &str, conditions: &[Condition]) -> Result<u64, StoreError>;
}

/// External indexed-search service
pub trait SearchIndex: Send + Sync {
    /// Primary keys of `resource` records matching `term`, in relevance order
    fn search(&self, resource: &str, term: &str) -> Result<Vec<Value>, StoreError>;
}
