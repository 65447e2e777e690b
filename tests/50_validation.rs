mod common;

use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};

use common::{admin, editor, input, request, viewer};
use resource_admin::store::MemoryStore;
use resource_admin::types::RequestContext;
use resource_admin::validation::Rule;
use resource_admin::{AdminEngine, AdminRequest, EngineError};

fn engine_with_store() -> (AdminEngine, Arc<MemoryStore>) {
    common::init_tracing();
    let store = Arc::new(common::store());
    (AdminEngine::new(common::registry(), store.clone()), store)
}

fn messages(err: &EngineError, attribute: &str) -> Vec<String> {
    err.validation_errors()
        .and_then(|errors| errors.get(attribute))
        .map(|m| m.to_vec())
        .unwrap_or_default()
}

fn rule_names(rules: &[Rule]) -> Vec<&str> {
    rules.iter().map(Rule::as_str).collect()
}

fn attaching(actor: resource_admin::auth::Actor, user: i64, body: Value) -> AdminRequest {
    request(actor, "users", RequestContext::Attach)
        .with_resource_id(user)
        .related("roles", None, "roles")
        .with_input(input(body))
}

// ========================================
// Rule assembly
// ========================================

#[test]
fn creation_rules_come_from_creation_fields() -> Result<()> {
    let engine = common::engine();
    let rules = engine.rules(&request(admin(), "users", RequestContext::Create))?;

    assert_eq!(rules.keys().collect::<Vec<_>>(), vec!["email", "name"]);
    assert_eq!(rule_names(&rules["email"]), vec!["required", "email", "unique:users,email"]);
    Ok(())
}

#[test]
fn update_rules_substitute_the_record_key() -> Result<()> {
    let engine = common::engine();
    let req = request(admin(), "users", RequestContext::Update).with_resource_id(2);
    let rules = engine.rules(&req)?;
    assert_eq!(rule_names(&rules["email"]), vec!["required", "email", "unique:users,email,2"]);

    // Without a record the placeholder becomes NULL
    let rules = engine.rules(&request(admin(), "users", RequestContext::Update))?;
    assert_eq!(rule_names(&rules["email"]), vec!["required", "email", "unique:users,email,NULL"]);
    Ok(())
}

#[test]
fn readonly_fields_contribute_no_rules() -> Result<()> {
    let engine = common::engine();
    let rules = engine.rules(&request(editor(), "posts", RequestContext::Create))?;
    assert!(!rules.contains_key("views"));
    assert!(rules.contains_key("title"));
    assert!(rules.contains_key("status"));
    Ok(())
}

#[test]
fn attachment_rules_require_an_existing_related_key() -> Result<()> {
    let engine = common::engine();
    let req = request(admin(), "users", RequestContext::Attach)
        .with_resource_id(1)
        .related("roles", None, "roles");
    let rules = engine.rules(&req)?;

    assert_eq!(rule_names(&rules["roles"]), vec!["required", "exists:roles,id"]);
    assert_eq!(rule_names(&rules["notes"]), vec!["nullable", "max:50"]);
    Ok(())
}

#[test]
fn listing_contexts_have_no_rules() {
    let engine = common::engine();
    let result = engine.rules(&request(admin(), "users", RequestContext::Index));
    assert!(matches!(result, Err(EngineError::Conflict(_))));
}

// ========================================
// Create and update
// ========================================

#[test]
fn create_validates_fills_and_stores() -> Result<()> {
    let (engine, store) = engine_with_store();
    let req = request(editor(), "posts", RequestContext::Create).with_input(input(json!({
        "title": "Pattern matching",
        "status": "draft",
        "author": 2,
        "views": 999,
        "id": 77
    })));
    let record = engine.create(&req)?;

    assert_eq!(record.value("id"), &json!(7));
    assert_eq!(record.value("author_id"), &json!(2));
    // Readonly and hidden fields are never filled
    assert_eq!(record.value("views"), &Value::Null);
    assert_eq!(store.rows("posts")?.len(), 7);
    Ok(())
}

#[test]
fn create_collects_every_violation() {
    let engine = common::engine();
    let req = request(editor(), "posts", RequestContext::Create).with_input(input(json!({
        "title": "x".repeat(121),
        "status": "archived"
    })));
    let err = engine.create(&req).unwrap_err();

    assert_eq!(err.status_code(), 422);
    assert_eq!(messages(&err, "title"), vec!["The title must be no more than 120 characters."]);
    assert_eq!(messages(&err, "status"), vec!["The selected status is invalid."]);
}

#[test]
fn after_validation_hook_adds_its_own_errors() {
    let engine = common::engine();
    let req = request(editor(), "posts", RequestContext::Create)
        .with_input(input(json!({"title": "Untitled", "status": "draft"})));
    let err = engine.create(&req).unwrap_err();
    assert_eq!(messages(&err, "title"), vec!["Pick a real title."]);
}

#[test]
fn create_is_forbidden_before_validation() {
    let engine = common::engine();
    let req = request(viewer(), "posts", RequestContext::Create).with_input(input(json!({})));
    assert!(matches!(engine.create(&req), Err(EngineError::Forbidden(_))));
}

#[test]
fn create_through_a_parent_needs_add_on_the_parent() -> Result<()> {
    let engine = common::engine();
    // Undeclared add abilities are allowed
    let req = request(editor(), "posts", RequestContext::Create)
        .via("users", 1, "posts")
        .with_input(input(json!({"title": "Via parent", "status": "draft"})));
    engine.create(&req)?;

    let req = request(editor(), "posts", RequestContext::Create)
        .via("users", 42, "posts")
        .with_input(input(json!({"title": "Orphan", "status": "draft"})));
    assert!(matches!(engine.create(&req), Err(EngineError::NotFound(_))));
    Ok(())
}

#[test]
fn unique_rule_ignores_the_record_being_updated() -> Result<()> {
    let (engine, store) = engine_with_store();

    let req = request(viewer(), "users", RequestContext::Update)
        .with_resource_id(1)
        .with_input(input(json!({"name": "Ada L.", "email": "ada@example.com"})));
    let record = engine.update(&req)?;
    assert_eq!(record.value("name"), &json!("Ada L."));
    assert_eq!(store.rows("users")?[0]["name"], json!("Ada L."));

    let req = request(viewer(), "users", RequestContext::Update)
        .with_resource_id(1)
        .with_input(input(json!({"name": "Ada", "email": "brian@example.com"})));
    let err = engine.update(&req).unwrap_err();
    assert_eq!(messages(&err, "email"), vec!["The email has already been taken."]);
    Ok(())
}

#[test]
fn update_of_missing_record_is_not_found() {
    let engine = common::engine();
    let req = request(editor(), "posts", RequestContext::Update)
        .with_resource_id(404)
        .with_input(input(json!({"title": "Nope", "status": "draft"})));
    assert!(matches!(engine.update(&req), Err(EngineError::NotFound(_))));
}

// ========================================
// Attach and update-attached
// ========================================

#[test]
fn attach_inserts_the_join_row_with_pivot_values() -> Result<()> {
    let (engine, store) = engine_with_store();
    let pivot = engine.attach(&attaching(admin(), 2, json!({"roles": 3, "notes": "trial"})))?;

    assert_eq!(pivot.value("user_id"), &json!(2));
    assert_eq!(pivot.value("role_id"), &json!(3));
    let rows = store.rows("role_user")?;
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[3]["notes"], json!("trial"));
    assert!(rows[3].get("id").is_none());
    Ok(())
}

#[test]
fn attach_rejects_duplicates_and_missing_targets() {
    let engine = common::engine();

    let err = engine.attach(&attaching(admin(), 2, json!({"roles": 2}))).unwrap_err();
    assert_eq!(messages(&err, "roles"), vec!["This role is already attached."]);

    let err = engine.attach(&attaching(admin(), 2, json!({"roles": 99}))).unwrap_err();
    assert_eq!(messages(&err, "roles"), vec!["The selected roles is invalid."]);

    let err = engine
        .attach(&attaching(admin(), 2, json!({"roles": 3, "notes": "n".repeat(51)})))
        .unwrap_err();
    assert_eq!(messages(&err, "notes"), vec!["The notes must be no more than 50 characters."]);
}

#[test]
fn attach_needs_attach_abilities() {
    let engine = common::engine();
    let result = engine.attach(&attaching(editor(), 2, json!({"roles": 3})));
    assert!(matches!(result, Err(EngineError::Forbidden(_))));
}

#[test]
fn attach_through_a_non_pivot_relationship_is_a_conflict() {
    let engine = common::engine();
    let req = request(admin(), "users", RequestContext::Attach)
        .with_resource_id(1)
        .related("posts", None, "posts")
        .with_input(input(json!({"posts": 2})));
    assert!(matches!(engine.attach(&req), Err(EngineError::Conflict(_))));
}

#[test]
fn update_attached_rewrites_only_the_join_row() -> Result<()> {
    let (engine, store) = engine_with_store();
    let req = request(admin(), "users", RequestContext::UpdateAttached)
        .with_resource_id(1)
        .related("roles", Some(json!(2)), "roles")
        .with_input(input(json!({"notes": "promoted"})));
    let pivot = engine.update_attached(&req)?;
    assert_eq!(pivot.value("notes"), &json!("promoted"));

    let rows = store.rows("role_user")?;
    assert_eq!(rows[1]["notes"], json!("promoted"));
    assert_eq!(rows[0]["notes"], json!("founder"));
    assert_eq!(rows[2]["notes"], json!("night shift"));
    Ok(())
}

#[test]
fn update_attached_form_shows_the_readonly_selector_and_stored_pivot_values() -> Result<()> {
    let engine = common::engine();
    let req = request(admin(), "users", RequestContext::UpdateAttached)
        .with_resource_id(1)
        .related("roles", Some(json!(1)), "roles");
    let form = engine.update_attached_form(&req)?;

    assert_eq!(common::attributes(&form.fields), vec!["roles", "notes"]);
    let values: Vec<Value> = form.fields.iter().map(|f| f.value.clone()).collect();
    assert_eq!(values, vec![json!(1), json!("founder")]);
    Ok(())
}

#[test]
fn update_attached_of_unattached_record_is_not_found() {
    let engine = common::engine();
    let req = request(admin(), "users", RequestContext::UpdateAttached)
        .with_resource_id(2)
        .related("roles", Some(json!(1)), "roles")
        .with_input(input(json!({"notes": "x"})));
    assert!(matches!(engine.update_attached(&req), Err(EngineError::NotFound(_))));
}
