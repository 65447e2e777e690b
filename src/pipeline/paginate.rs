use serde_json::{json, Value};
use tracing::{debug, warn};

use super::QueryPipeline;
use crate::config;
use crate::error::EngineError;
use crate::query::Query;
use crate::record::Record;
use crate::request::AdminRequest;
use crate::resource::Resource;

/// One page of a listing
#[derive(Debug, Clone)]
pub struct Paginated {
    pub records: Vec<Record>,
    pub total: u64,
    pub per_page: u64,
    pub page: u64,
    pub per_page_options: Vec<u64>,
}

impl Paginated {
    pub fn last_page(&self) -> u64 {
        if self.total == 0 {
            1
        } else {
            (self.total + self.per_page - 1) / self.per_page
        }
    }

    pub fn meta_json(&self) -> Value {
        json!({
            "total": self.total,
            "perPage": self.per_page,
            "page": self.page,
            "lastPage": self.last_page(),
            "perPageOptions": self.per_page_options,
        })
    }
}

/// `requested` when it is an allowed size, else the first allowed size
pub fn resolve_per_page(options: &[u64], requested: Option<u64>) -> u64 {
    let fallback = options
        .first()
        .copied()
        .or_else(|| config::config().pagination.per_page_options.first().copied())
        .unwrap_or(25);
    match requested {
        Some(size) if options.contains(&size) => size,
        Some(size) => {
            warn!("Per-page size {} is not allowed; using {}", size, fallback);
            fallback
        }
        None => fallback,
    }
}

impl QueryPipeline<'_> {
    /// Allowed page sizes: the relationship set when listing through a
    /// parent
    pub fn per_page_options(&self, resource: &Resource, req: &AdminRequest) -> Vec<u64> {
        if req.is_via_relationship() {
            resource.definition().per_page_via_relationship()
        } else {
            resource.definition().per_page_options()
        }
    }

    /// Count, then fetch the requested page
    pub fn paginate(&self, resource: &Resource, req: &AdminRequest, query: &Query) -> Result<Paginated, EngineError> {
        let options = self.per_page_options(resource, req);
        let per_page = resolve_per_page(&options, req.params.per_page).max(1);
        let page = req.params.page();

        let total = self.store.count(query)?;
        // Offsets beyond what a store can address are past the end
        let offset = (page - 1).checked_mul(per_page).filter(|o| *o <= i64::MAX as u64);
        let records = match offset {
            Some(offset) => self.store.fetch(&query.clone().limit(per_page, Some(offset)))?,
            None => vec![],
        };
        debug!(
            "Fetched page {} of {} ({} of {} record(s))",
            page,
            resource.key(),
            records.len(),
            total
        );

        Ok(Paginated {
            records,
            total,
            per_page,
            page,
            per_page_options: options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_sizes_fall_back_to_first_option() {
        assert_eq!(resolve_per_page(&[25, 50, 100], Some(50)), 50);
        assert_eq!(resolve_per_page(&[25, 50, 100], Some(30)), 25);
        assert_eq!(resolve_per_page(&[5], None), 5);
    }
}
