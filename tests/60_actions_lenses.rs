mod common;

use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};

use common::{admin, editor, ids, input, request, viewer};
use resource_admin::action::{ActionResponse, BulkOutcome};
use resource_admin::auth::Actor;
use resource_admin::filter::{encode_filters, FilterEntry};
use resource_admin::request::IndexParams;
use resource_admin::store::MemoryStore;
use resource_admin::types::{RequestContext, Selection, SortDirection, TrashedStatus};
use resource_admin::{AdminEngine, AdminRequest, EngineError};

fn engine_with_store() -> (AdminEngine, Arc<MemoryStore>) {
    common::init_tracing();
    let store = Arc::new(common::store());
    (AdminEngine::new(common::registry(), store.clone()), store)
}

fn action(actor: Actor, key: &str, body: Value) -> AdminRequest {
    request(actor, "posts", RequestContext::Action)
        .with_action(key)
        .with_input(input(body))
}

fn selected(actor: Actor, resource: &str, keys: &[i64]) -> AdminRequest {
    request(actor, resource, RequestContext::Index)
        .with_selection(Selection::Keys(keys.iter().map(|k| json!(k)).collect()))
}

fn statuses(store: &MemoryStore) -> Result<Vec<(i64, String)>> {
    Ok(store
        .rows("posts")?
        .iter()
        .map(|row| {
            (
                row["id"].as_i64().unwrap_or_default(),
                row["status"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect())
}

fn lens(actor: Actor, key: &str) -> AdminRequest {
    request(actor, "posts", RequestContext::Lens).with_lens(key)
}

// ========================================
// Actions
// ========================================

#[test]
fn action_runs_in_key_ordered_chunks_skipping_unauthorized_records() -> Result<()> {
    let (engine, store) = engine_with_store();
    let (outcome, response) = engine.run_action(&action(editor(), "publish-posts", json!({"note": "launch"})))?;

    // Chunks of two: [1, 2], [3, 4], then [5] whose only record is refused
    assert_eq!(
        outcome,
        BulkOutcome {
            chunks: 3,
            skipped: 1,
            processed: 4,
            unauthorized: 1,
        }
    );
    assert_eq!(response, ActionResponse::message("Published 2 post(s): launch"));

    let published: Vec<i64> = statuses(&store)?
        .into_iter()
        .filter(|(_, status)| status == "published")
        .map(|(id, _)| id)
        .collect();
    assert_eq!(published, vec![1, 2, 3, 4, 5]);
    Ok(())
}

#[test]
fn action_selection_follows_the_listing_filters() -> Result<()> {
    let (engine, store) = engine_with_store();
    let req = action(editor(), "publish-posts", json!({"note": "drafts"})).with_params(IndexParams {
        filters: Some(encode_filters(&[FilterEntry::new("status", "draft")])?),
        ..Default::default()
    });
    let (outcome, response) = engine.run_action(&req)?;

    assert_eq!(outcome.processed, 2);
    assert_eq!(outcome.chunks, 1);
    assert_eq!(response, ActionResponse::message("Published 2 post(s): drafts"));
    // The trashed draft is outside the selection
    assert!(statuses(&store)?.contains(&(6, "draft".to_string())));
    Ok(())
}

#[test]
fn action_fields_are_validated_before_any_record_is_touched() -> Result<()> {
    let (engine, store) = engine_with_store();
    let err = engine.run_action(&action(editor(), "publish-posts", json!({}))).unwrap_err();

    let errors = err.validation_errors().and_then(|e| e.get("note")).map(|m| m.to_vec());
    assert_eq!(errors, Some(vec!["The note field is required.".to_string()]));
    assert_eq!(statuses(&store)?, statuses(&common::store())?);
    Ok(())
}

#[test]
fn actors_without_run_ability_process_nothing() -> Result<()> {
    let engine = common::engine();
    let (outcome, response) = engine.run_action(&action(viewer(), "publish-posts", json!({"note": "x"})))?;

    assert_eq!(outcome.processed, 0);
    assert_eq!(outcome.unauthorized, 5);
    assert_eq!(outcome.skipped, outcome.chunks);
    assert_eq!(response, ActionResponse::None);
    Ok(())
}

#[test]
fn destructive_actions_need_the_destructive_ability() -> Result<()> {
    let (engine, store) = engine_with_store();

    let req = action(editor(), "purge-posts", json!({})).with_selection(Selection::Keys(vec![json!(1), json!(2)]));
    let (outcome, _) = engine.run_action(&req)?;
    assert_eq!(outcome.processed, 0);
    assert_eq!(store.rows("posts")?.len(), 6);

    let req = action(admin(), "purge-posts", json!({})).with_selection(Selection::Keys(vec![json!(1), json!(2)]));
    let (outcome, response) = engine.run_action(&req)?;
    assert_eq!(outcome.processed, 2);
    assert_eq!(response, ActionResponse::danger("Purged"));
    assert_eq!(store.rows("posts")?.len(), 4);
    Ok(())
}

#[test]
fn standalone_actions_run_once_without_records() -> Result<()> {
    let engine = common::engine();
    let (outcome, response) = engine.run_action(&action(editor(), "announce", json!({})))?;
    assert_eq!(outcome, BulkOutcome::default());
    assert_eq!(response, ActionResponse::message("Announced with 0 record(s)"));
    Ok(())
}

#[test]
fn undeclared_actions_are_not_found() {
    let engine = common::engine();
    let result = engine.run_action(&action(admin(), "archive-posts", json!({})));
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

#[test]
fn action_catalogue_describes_each_action() -> Result<()> {
    let engine = common::engine();
    let catalogue = engine.actions(&request(editor(), "posts", RequestContext::Index))?;

    let keys: Vec<&str> = catalogue
        .as_array()
        .map(|a| a.iter().filter_map(|x| x["uriKey"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(keys, vec!["publish-posts", "purge-posts", "announce"]);
    assert_eq!(catalogue[1]["destructive"], true);
    assert_eq!(catalogue[2]["standalone"], true);
    Ok(())
}

// ========================================
// Lenses
// ========================================

#[test]
fn lens_listing_uses_lens_query_and_fields() -> Result<()> {
    let engine = common::engine();
    let page = engine.lens_index(&lens(editor(), "drafts"))?;

    assert_eq!(ids(&page.ids()), vec![2, 4]);
    assert_eq!(common::attributes(&page.rows[0].fields), vec!["id", "title"]);
    Ok(())
}

#[test]
fn lens_sorting_is_limited_to_lens_fields() -> Result<()> {
    let engine = common::engine();
    let sorted = |column: &str| -> Result<Vec<i64>> {
        let req = lens(editor(), "drafts").with_params(IndexParams {
            order_by: Some(column.into()),
            direction: Some(SortDirection::Desc),
            ..Default::default()
        });
        Ok(ids(&engine.lens_index(&req)?.ids()))
    };

    assert_eq!(sorted("title")?, vec![4, 2]);
    // Views is sortable on the resource but not offered by the lens
    assert_eq!(sorted("views")?, vec![2, 4]);
    Ok(())
}

#[test]
fn lens_returning_records_is_a_configuration_error() {
    let engine = common::engine();
    let result = engine.lens_index(&lens(editor(), "broken"));
    assert!(matches!(result, Err(EngineError::Configuration(_))));
}

#[test]
fn hidden_lenses_are_forbidden_and_left_out_of_the_catalogue() -> Result<()> {
    let engine = common::engine();
    assert!(matches!(
        engine.lens_index(&lens(editor(), "admin")),
        Err(EngineError::Forbidden(_))
    ));
    assert!(matches!(
        engine.lens_index(&lens(editor(), "missing")),
        Err(EngineError::NotFound(_))
    ));

    let keys = |catalogue: Value| -> Vec<String> {
        catalogue
            .as_array()
            .map(|a| a.iter().filter_map(|l| l["uriKey"].as_str().map(String::from)).collect())
            .unwrap_or_default()
    };
    assert_eq!(keys(engine.lenses(&request(editor(), "posts", RequestContext::Index))?), vec!["drafts", "broken"]);
    assert_eq!(
        keys(engine.lenses(&request(admin(), "posts", RequestContext::Index))?),
        vec!["drafts", "broken", "admin"]
    );
    Ok(())
}

// ========================================
// Delete, restore, force delete and detach
// ========================================

#[test]
fn delete_soft_deletes_selected_records() -> Result<()> {
    let engine = common::engine();
    let outcome = engine.delete(&selected(admin(), "posts", &[1, 2]))?;
    assert_eq!(outcome.processed, 2);

    let remaining = engine.index(&request(admin(), "posts", RequestContext::Index))?;
    assert_eq!(ids(&remaining.ids()), vec![5, 4, 3]);

    let trashed = engine.index(&request(admin(), "posts", RequestContext::Index).with_params(IndexParams {
        trashed: TrashedStatus::Only,
        ..Default::default()
    }))?;
    assert_eq!(ids(&trashed.ids()), vec![6, 2, 1]);
    Ok(())
}

#[test]
fn delete_without_ability_touches_nothing() -> Result<()> {
    let engine = common::engine();
    let outcome = engine.delete(&selected(editor(), "posts", &[1, 2]))?;
    assert_eq!(outcome.processed, 0);
    assert_eq!(outcome.unauthorized, 2);
    assert_eq!(engine.index(&request(editor(), "posts", RequestContext::Index))?.total, 5);
    Ok(())
}

#[test]
fn delete_walks_everything_in_bounded_chunks() -> Result<()> {
    let engine = common::engine().with_chunk_size(2);
    let outcome = engine.delete(&request(admin(), "posts", RequestContext::Index))?;
    assert_eq!(outcome.chunks, 3);
    assert_eq!(outcome.processed, 5);
    assert_eq!(engine.index(&request(admin(), "posts", RequestContext::Index))?.total, 0);
    Ok(())
}

#[test]
fn restore_brings_trashed_records_back() -> Result<()> {
    let engine = common::engine();
    let outcome = engine.restore(&request(admin(), "posts", RequestContext::Index))?;
    assert_eq!(outcome.processed, 1);
    assert_eq!(engine.index(&request(admin(), "posts", RequestContext::Index))?.total, 6);

    let result = engine.restore(&selected(admin(), "users", &[1]));
    assert!(matches!(result, Err(EngineError::Conflict(_))));
    Ok(())
}

#[test]
fn force_delete_removes_rows_including_trashed() -> Result<()> {
    let (engine, store) = engine_with_store();
    let outcome = engine.force_delete(&selected(admin(), "posts", &[5, 6]))?;
    assert_eq!(outcome.processed, 2);
    let remaining: Vec<i64> = statuses(&store)?.into_iter().map(|(id, _)| id).collect();
    assert_eq!(remaining, vec![1, 2, 3, 4]);
    Ok(())
}

#[test]
fn detach_removes_only_join_rows_of_the_parent() -> Result<()> {
    let (engine, store) = engine_with_store();
    let req = selected(admin(), "roles", &[2]).via("users", 1, "roles");
    let outcome = engine.detach(&req)?;
    assert_eq!(outcome.processed, 1);

    let rows = store.rows("role_user")?;
    let pairs: Vec<(i64, i64)> = rows
        .iter()
        .map(|r| (r["user_id"].as_i64().unwrap_or_default(), r["role_id"].as_i64().unwrap_or_default()))
        .collect();
    assert_eq!(pairs, vec![(1, 1), (2, 2)]);
    assert_eq!(store.rows("roles")?.len(), 3);

    // Editors may not detach roles
    let req = selected(editor(), "roles", &[1]).via("users", 1, "roles");
    assert_eq!(engine.detach(&req)?.processed, 0);
    assert_eq!(store.rows("role_user")?.len(), 2);
    Ok(())
}

#[test]
fn detach_outside_a_many_to_many_listing_is_a_conflict() {
    let engine = common::engine();
    let result = engine.detach(&selected(admin(), "roles", &[1]));
    assert!(matches!(result, Err(EngineError::Conflict(_))));

    let result = engine.detach(&selected(admin(), "posts", &[1]).via("users", 1, "posts"));
    assert!(matches!(result, Err(EngineError::Conflict(_))));
}
