mod common;

use std::sync::Arc;

use anyhow::Result;

use common::{admin, editor, ids, request};
use resource_admin::field::{Field, FieldItem};
use resource_admin::query::Condition;
use resource_admin::request::IndexParams;
use resource_admin::resource::Resource;
use resource_admin::store::MemorySearchIndex;
use resource_admin::types::{RequestContext, SortDirection, TrashedStatus};
use resource_admin::{AdminEngine, AdminRequest, Registry, ResourceDefinition};

fn listing(params: IndexParams) -> AdminRequest {
    request(editor(), "posts", RequestContext::Index).with_params(params)
}

#[test]
fn default_listing_excludes_trashed_and_orders_by_key_descending() -> Result<()> {
    let engine = common::engine();
    let page = engine.index(&listing(IndexParams::default()))?;

    assert_eq!(ids(&page.ids()), vec![5, 4, 3, 2, 1]);
    assert_eq!(page.total, 5);
    assert_eq!(page.per_page, 25);
    assert!(page.soft_deletes);
    Ok(())
}

#[test]
fn trashed_status_widens_or_narrows_the_listing() -> Result<()> {
    let engine = common::engine();

    let with = engine.index(&listing(IndexParams {
        trashed: TrashedStatus::With,
        ..Default::default()
    }))?;
    assert_eq!(with.total, 6);

    let only = engine.index(&listing(IndexParams {
        trashed: TrashedStatus::Only,
        ..Default::default()
    }))?;
    assert_eq!(ids(&only.ids()), vec![6]);
    assert!(only.rows[0].soft_deleted);
    Ok(())
}

#[test]
fn explicit_sort_on_sortable_column_wins() -> Result<()> {
    let engine = common::engine();
    let page = engine.index(&listing(IndexParams {
        order_by: Some("title".into()),
        direction: Some(SortDirection::Asc),
        ..Default::default()
    }))?;

    let titles: Vec<String> = page.rows.iter().map(|r| r.title.as_str().unwrap_or_default().to_string()).collect();
    assert_eq!(
        titles,
        vec!["Async in practice", "Draft notes", "Lifetimes explained", "Rust ownership", "Trait objects"]
    );
    Ok(())
}

#[test]
fn sorting_by_unsortable_column_falls_back_to_default_order() -> Result<()> {
    let engine = common::engine();
    let page = engine.index(&listing(IndexParams {
        order_by: Some("body".into()),
        direction: Some(SortDirection::Asc),
        ..Default::default()
    }))?;
    assert_eq!(ids(&page.ids()), vec![5, 4, 3, 2, 1]);
    Ok(())
}

#[test]
fn search_spans_columns_and_matches_keys_exactly() -> Result<()> {
    let engine = common::engine();

    let page = engine.index(&listing(IndexParams {
        search: Some("OWN".into()),
        ..Default::default()
    }))?;
    assert_eq!(ids(&page.ids()), vec![1]);

    let page = engine.index(&listing(IndexParams {
        search: Some("3".into()),
        ..Default::default()
    }))?;
    assert_eq!(ids(&page.ids()), vec![3]);

    // Blank terms do not narrow
    let page = engine.index(&listing(IndexParams {
        search: Some("   ".into()),
        ..Default::default()
    }))?;
    assert_eq!(page.total, 5);
    Ok(())
}

#[test]
fn out_of_range_integer_search_only_matches_text_columns() -> Result<()> {
    let engine = common::engine();
    let page = engine.index(&listing(IndexParams {
        search: Some("99999999999".into()),
        ..Default::default()
    }))?;
    assert_eq!(page.total, 0);
    Ok(())
}

#[test]
fn pagination_uses_allowed_sizes_only() -> Result<()> {
    let engine = common::engine();
    let page = engine.index(&listing(IndexParams {
        per_page: Some(7),
        ..Default::default()
    }))?;
    assert_eq!(page.per_page, 25);
    assert_eq!(page.per_page_options, vec![25, 50, 100]);

    let req = request(admin(), "roles", RequestContext::Index).via("users", 1, "roles");
    let page = engine.index(&req)?;
    assert_eq!(page.per_page, 5);
    Ok(())
}

#[test]
fn pages_past_the_end_are_empty_but_keep_the_total() -> Result<()> {
    let engine = common::engine();
    let page = engine.index(&listing(IndexParams {
        page: 3,
        ..Default::default()
    }))?;
    assert!(page.rows.is_empty());
    assert_eq!(page.total, 5);
    assert_eq!(page.page, 3);
    Ok(())
}

#[test]
fn absurd_page_numbers_are_past_the_end() -> Result<()> {
    let engine = common::engine();
    let params = serde_json::json!({"posts_page": u64::MAX.to_string(), "posts_per_page": "100"});
    let params = params.as_object().cloned().unwrap_or_default();
    let req = listing(IndexParams::from_query("posts", &params));
    let page = engine.index(&req)?;

    assert!(page.rows.is_empty());
    assert_eq!(page.total, 5);
    assert_eq!(page.page, u64::MAX);

    // Large but representable offsets are simply empty too
    let page = engine.index(&listing(IndexParams {
        page: u64::MAX / 200,
        ..Default::default()
    }))?;
    assert!(page.rows.is_empty());
    assert_eq!(page.total, 5);
    Ok(())
}

#[test]
fn relationship_listings_honour_explicit_sort() -> Result<()> {
    let engine = common::engine();
    let req = request(admin(), "roles", RequestContext::Index)
        .via("users", 1, "roles")
        .with_params(IndexParams {
            order_by: Some("name".into()),
            direction: Some(SortDirection::Asc),
            ..Default::default()
        });
    let page = engine.index(&req)?;
    assert_eq!(ids(&page.ids()), vec![1, 2]);
    Ok(())
}

// ========================================
// Global scopes and indexed search
// ========================================

/// Posts restricted to published ones, searched through an index
struct Articles;

impl ResourceDefinition for Articles {
    fn key(&self) -> &str {
        "articles"
    }

    fn table(&self) -> &str {
        "posts"
    }

    fn title_attribute(&self) -> &str {
        "title"
    }

    fn uses_search_index(&self) -> bool {
        true
    }

    fn global_scopes(&self) -> Vec<(String, Condition)> {
        vec![("published".into(), Condition::eq("status", "published"))]
    }

    fn fields(&self, _req: &AdminRequest) -> Vec<FieldItem> {
        vec![Field::id().into(), Field::text("Title", "title").into()]
    }
}

/// Users, with their articles listable
struct Writers;

impl ResourceDefinition for Writers {
    fn key(&self) -> &str {
        "writers"
    }

    fn table(&self) -> &str {
        "users"
    }

    fn fields(&self, _req: &AdminRequest) -> Vec<FieldItem> {
        vec![
            Field::id().into(),
            Field::has_many("Articles", "articles", "articles")
                .with_relation(|relation| relation.foreign_key = Some("author_id".into()))
                .into(),
        ]
    }
}

fn scoped_engine() -> Result<AdminEngine> {
    let registry = Registry::new().register(Arc::new(Articles))?.register(Arc::new(Writers))?;
    let index = MemorySearchIndex::new()
        .index("articles", 1, "Rust ownership and borrowing")
        .index("articles", 2, "Async in practice with rust")
        .index("articles", 5, "Trait objects");
    Ok(AdminEngine::new(registry, Arc::new(common::store())).with_search_index(Arc::new(index)))
}

#[test]
fn global_scopes_apply_to_top_level_listings() -> Result<()> {
    let engine = scoped_engine()?;
    let page = engine.index(&request(admin(), "articles", RequestContext::Index))?;
    assert_eq!(ids(&page.ids()), vec![5, 3, 1]);
    Ok(())
}

#[test]
fn relationship_listings_bypass_global_scopes() -> Result<()> {
    let engine = scoped_engine()?;
    let req = request(admin(), "articles", RequestContext::Index).via("writers", 1, "articles");
    let page = engine.index(&req)?;
    assert_eq!(ids(&page.ids()), vec![2, 1]);
    Ok(())
}

#[test]
fn indexed_search_narrows_to_index_hits() -> Result<()> {
    let engine = scoped_engine()?;
    let req = request(admin(), "articles", RequestContext::Index).with_params(IndexParams {
        search: Some("rust".into()),
        ..Default::default()
    });
    let page = engine.index(&req)?;

    // Post 2 is a hit but a draft; the global scope still applies
    let mut found = ids(&page.ids());
    found.sort();
    assert_eq!(found, vec![1]);
    assert!(page.indexed_search);
    Ok(())
}

#[test]
fn listing_query_renders_to_sql() -> Result<()> {
    let engine = common::engine();
    let req = listing(IndexParams {
        search: Some("rust".into()),
        ..Default::default()
    });
    let definition = engine.registry().resolve("posts")?;
    let (query, indexed) = engine.pipeline().index_query(&Resource::new(definition), &req)?;
    assert!(!indexed);

    let sql = query.to_sql()?;
    assert!(sql.query.starts_with("SELECT \"posts\".* FROM \"posts\" WHERE"));
    assert!(sql.query.contains("ILIKE"));
    assert!(sql.query.contains("\"deleted_at\" IS NULL"));
    assert!(sql.query.ends_with("ORDER BY \"posts\".\"id\" DESC"));
    assert!(sql.params.iter().any(|p| p == "%rust%"));
    Ok(())
}
