use tracing::{debug, warn};

use super::QueryPipeline;
use crate::error::EngineError;
use crate::field::Field;
use crate::lens::Lens;
use crate::query::{Query, SortDirection};
use crate::request::AdminRequest;
use crate::resource::Resource;

impl QueryPipeline<'_> {
    /// Columns the current listing may be sorted by
    pub fn sortable_columns(
        &self,
        resource: &Resource,
        req: &AdminRequest,
        lens: Option<&dyn Lens>,
    ) -> Result<Vec<String>, EngineError> {
        match lens {
            Some(lens) => Ok(resource
                .lens_fields(req, self.registry, lens)?
                .iter()
                .filter_map(Field::sortable_column)
                .collect()),
            None => resource.sortable_columns(req, self.registry),
        }
    }

    /// Apply the requested sort when it names a sortable column. Otherwise
    /// keep any ordering already on the query, or fall back to the
    /// resource's default order unless an indexed search owns the order.
    pub fn apply_ordering(
        &self,
        resource: &Resource,
        req: &AdminRequest,
        query: Query,
        lens: Option<&dyn Lens>,
        indexed: bool,
    ) -> Result<Query, EngineError> {
        if let Some(column) = &req.params.order_by {
            if self.sortable_columns(resource, req, lens)?.contains(column) {
                let direction = req.params.direction.unwrap_or(SortDirection::Asc);
                debug!("Ordering {} by {} {}", resource.key(), column, direction.to_sql());
                return Ok(query.clear_order().order_by(column.clone(), direction));
            }
            warn!("Ignoring order on {}: {} is not sortable", resource.key(), column);
        }

        if !query.orders().is_empty() || indexed {
            return Ok(query);
        }

        let mut query = query;
        for info in resource.definition().default_order() {
            query = query.order_by(info.column, info.sort);
        }
        Ok(query)
    }
}
