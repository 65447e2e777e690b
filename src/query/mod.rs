pub mod error;
pub mod evaluate;
pub mod query;
pub mod query_order;
pub mod query_where;
pub mod types;

pub use error::QueryError;
pub use query::{Query, PIVOT_COLUMN};
pub use query_order::QueryOrder;
pub use query_where::{parse_where, QueryWhere};
pub use types::*;
