#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use serde_json::{json, Map, Value};

use resource_admin::action::{Action, ActionContext, ActionResponse};
use resource_admin::auth::{Actor, RolePolicy};
use resource_admin::error::EngineError;
use resource_admin::field::{Field, FieldItem, PanelMeta, SelectOption};
use resource_admin::filter::{BooleanFilter, Filter, SelectFilter};
use resource_admin::lens::{Lens, LensOutput};
use resource_admin::query::{Condition, OrderInfo, Query, SortDirection};
use resource_admin::record::Record;
use resource_admin::store::{MemoryStore, RecordStore, StoreError};
use resource_admin::types::RequestContext;
use resource_admin::validation::ValidationErrors;
use resource_admin::{AdminEngine, AdminRequest, Registry, ResourceDefinition};

static TRACING: OnceLock<()> = OnceLock::new();

/// Route engine logs to the test writer once per binary
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ========================================
// Resources
// ========================================

pub struct Users;

impl ResourceDefinition for Users {
    fn key(&self) -> &str {
        "users"
    }

    fn title_attribute(&self) -> &str {
        "name"
    }

    fn search_columns(&self) -> Vec<String> {
        vec!["id".into(), "name".into(), "email".into()]
    }

    fn fields(&self, _req: &AdminRequest) -> Vec<FieldItem> {
        vec![
            Field::id().into(),
            Field::text("Name", "name").sortable().rules(["required"]).into(),
            Field::text("Email", "email")
                .rules(["required", "email"])
                .creation_rules(["unique:users,email"])
                .update_rules(["unique:users,email,{{resourceId}}"])
                .into(),
            Field::belongs_to_many("Roles", "roles", "roles")
                .pivot_fields(|_| vec![Field::text("Notes", "notes").rules(["nullable", "max:50"])])
                .into(),
            Field::has_many("Posts", "posts", "posts")
                .with_relation(|relation| relation.foreign_key = Some("author_id".into()))
                .into(),
        ]
    }
}

pub struct Roles;

impl ResourceDefinition for Roles {
    fn key(&self) -> &str {
        "roles"
    }

    fn title_attribute(&self) -> &str {
        "name"
    }

    fn fields(&self, _req: &AdminRequest) -> Vec<FieldItem> {
        vec![
            Field::id().into(),
            Field::text("Name", "name").sortable().into(),
            Field::belongs_to_many("Users", "users", "users")
                .pivot_fields(|_| vec![Field::text("Notes", "notes")])
                .into(),
        ]
    }
}

pub struct Posts;

impl ResourceDefinition for Posts {
    fn key(&self) -> &str {
        "posts"
    }

    fn title_attribute(&self) -> &str {
        "title"
    }

    fn soft_deletes(&self) -> bool {
        true
    }

    fn search_columns(&self) -> Vec<String> {
        vec!["id".into(), "title".into()]
    }

    fn fields(&self, _req: &AdminRequest) -> Vec<FieldItem> {
        vec![
            Field::id().into(),
            Field::text("Title", "title")
                .sortable()
                .filterable()
                .rules(["required", "max:120"])
                .into(),
            Field::select(
                "Status",
                "status",
                vec![SelectOption::new("draft", "Draft"), SelectOption::new("published", "Published")],
            )
            .default_value("draft")
            .rules(["required", "in:draft,published"])
            .into(),
            Field::belongs_to("Author", "author", "users").nullable().into(),
            Field::textarea("Body", "body").into(),
            Field::text("Secret", "secret")
                .can_see(|req| req.actor.has_role("admin"))
                .into(),
            FieldItem::panel_with(
                "Meta",
                PanelMeta {
                    collapsible: true,
                    ..PanelMeta::default()
                },
                vec![
                    Field::number("Views", "views").sortable().readonly().into(),
                    Field::boolean("Featured", "featured").into(),
                ],
            ),
            Field::has_many("Comments", "comments", "comments").into(),
        ]
    }

    fn filters(&self, _req: &AdminRequest) -> Vec<Arc<dyn Filter>> {
        vec![
            Arc::new(
                SelectFilter::new("status", "Status", "status")
                    .option("draft", "Draft")
                    .option("published", "Published"),
            ),
            Arc::new(
                BooleanFilter::new("admin-only", "Admin only")
                    .option("featured", "Featured")
                    .can_see(|req| req.actor.has_role("admin")),
            ),
        ]
    }

    fn lenses(&self, _req: &AdminRequest) -> Vec<Arc<dyn Lens>> {
        vec![Arc::new(DraftsLens), Arc::new(BrokenLens), Arc::new(AdminLens)]
    }

    fn actions(&self, _req: &AdminRequest) -> Vec<Arc<dyn Action>> {
        vec![Arc::new(PublishPosts), Arc::new(PurgePosts), Arc::new(Announce)]
    }

    fn after_validation(&self, req: &AdminRequest, errors: &mut ValidationErrors) {
        let title = req.input.get("title").and_then(Value::as_str).unwrap_or_default();
        if title.eq_ignore_ascii_case("untitled") {
            errors.add("title", "Pick a real title.");
        }
    }
}

pub struct Comments;

impl ResourceDefinition for Comments {
    fn key(&self) -> &str {
        "comments"
    }

    fn fields(&self, _req: &AdminRequest) -> Vec<FieldItem> {
        vec![
            Field::id().into(),
            Field::textarea("Body", "body").show_on_index().rules(["required"]).into(),
            Field::belongs_to("Post", "post", "posts").into(),
        ]
    }
}

// ========================================
// Lenses
// ========================================

pub struct DraftsLens;

impl Lens for DraftsLens {
    fn key(&self) -> &str {
        "drafts"
    }

    fn name(&self) -> &str {
        "Drafts"
    }

    fn fields(&self, _req: &AdminRequest) -> Vec<FieldItem> {
        vec![Field::id().into(), Field::text("Title", "title").sortable().into()]
    }

    fn query(&self, _req: &AdminRequest, query: Query) -> Result<LensOutput, EngineError> {
        Ok(LensOutput::Query(
            query.where_eq("status", "draft").order_by("id", SortDirection::Asc),
        ))
    }

    fn filters(&self, _req: &AdminRequest) -> Vec<Arc<dyn Filter>> {
        vec![Arc::new(SelectFilter::new("author", "Author", "author_id"))]
    }
}

pub struct BrokenLens;

impl Lens for BrokenLens {
    fn key(&self) -> &str {
        "broken"
    }

    fn name(&self) -> &str {
        "Broken"
    }

    fn fields(&self, _req: &AdminRequest) -> Vec<FieldItem> {
        vec![Field::id().into()]
    }

    fn query(&self, _req: &AdminRequest, _query: Query) -> Result<LensOutput, EngineError> {
        Ok(LensOutput::Records(vec![Record::new()]))
    }
}

pub struct AdminLens;

impl Lens for AdminLens {
    fn key(&self) -> &str {
        "admin"
    }

    fn name(&self) -> &str {
        "Admin"
    }

    fn fields(&self, _req: &AdminRequest) -> Vec<FieldItem> {
        vec![Field::id().into()]
    }

    fn query(&self, _req: &AdminRequest, query: Query) -> Result<LensOutput, EngineError> {
        Ok(LensOutput::Query(query))
    }

    fn authorized_to_see(&self, req: &AdminRequest) -> bool {
        req.actor.has_role("admin")
    }
}

// ========================================
// Actions
// ========================================

/// Marks posts published; posts by user 3 are never touched
pub struct PublishPosts;

impl Action for PublishPosts {
    fn key(&self) -> &str {
        "publish-posts"
    }

    fn name(&self) -> &str {
        "Publish Posts"
    }

    fn fields(&self, _req: &AdminRequest) -> Vec<FieldItem> {
        vec![Field::text("Note", "note").rules(["required"]).into()]
    }

    fn authorized_to_run(&self, _req: &AdminRequest, record: &Record) -> bool {
        record.value("author_id") != &json!(3)
    }

    fn chunk_size(&self) -> usize {
        2
    }

    fn handle(&self, ctx: &ActionContext<'_>, records: Vec<Record>) -> Result<ActionResponse, EngineError> {
        let ids: Vec<Value> = records.iter().filter_map(|r| r.key("id").cloned()).collect();
        let mut changes = Map::new();
        changes.insert("status".into(), json!("published"));
        ctx.store.update("posts", &[Condition::in_list("id", ids.clone())], &changes)?;
        let note = ctx.fields.get("note").and_then(Value::as_str).unwrap_or_default();
        Ok(ActionResponse::message(format!("Published {} post(s): {}", ids.len(), note)))
    }
}

pub struct PurgePosts;

impl Action for PurgePosts {
    fn key(&self) -> &str {
        "purge-posts"
    }

    fn name(&self) -> &str {
        "Purge Posts"
    }

    fn is_destructive(&self) -> bool {
        true
    }

    fn handle(&self, ctx: &ActionContext<'_>, records: Vec<Record>) -> Result<ActionResponse, EngineError> {
        let ids: Vec<Value> = records.iter().filter_map(|r| r.key("id").cloned()).collect();
        ctx.store.delete("posts", &[Condition::in_list("id", ids)])?;
        Ok(ActionResponse::danger("Purged"))
    }
}

pub struct Announce;

impl Action for Announce {
    fn key(&self) -> &str {
        "announce"
    }

    fn name(&self) -> &str {
        "Announce"
    }

    fn is_standalone(&self) -> bool {
        true
    }

    fn handle(&self, _ctx: &ActionContext<'_>, records: Vec<Record>) -> Result<ActionResponse, EngineError> {
        Ok(ActionResponse::message(format!("Announced with {} record(s)", records.len())))
    }
}

// ========================================
// Store, registry and engine
// ========================================

pub fn fixture_data() -> Value {
    json!({
        "users": [
            {"id": 1, "name": "Ada", "email": "ada@example.com"},
            {"id": 2, "name": "Brian", "email": "brian@example.com"},
            {"id": 3, "name": "Cleo", "email": "cleo@example.com"}
        ],
        "roles": [
            {"id": 1, "name": "Admin"},
            {"id": 2, "name": "Editor"},
            {"id": 3, "name": "Viewer"}
        ],
        "role_user": [
            {"user_id": 1, "role_id": 1, "notes": "founder"},
            {"user_id": 1, "role_id": 2, "notes": null},
            {"user_id": 2, "role_id": 2, "notes": "night shift"}
        ],
        "posts": [
            {"id": 1, "title": "Rust ownership", "status": "published", "author_id": 1, "views": 120, "featured": true, "deleted_at": null},
            {"id": 2, "title": "Async in practice", "status": "draft", "author_id": 1, "views": 0, "featured": false, "deleted_at": null},
            {"id": 3, "title": "Lifetimes explained", "status": "published", "author_id": 2, "views": 80, "featured": false, "deleted_at": null},
            {"id": 4, "title": "Draft notes", "status": "draft", "author_id": 2, "views": 5, "featured": true, "deleted_at": null},
            {"id": 5, "title": "Trait objects", "status": "published", "author_id": 3, "views": 42, "featured": false, "deleted_at": null},
            {"id": 6, "title": "Old post", "status": "draft", "author_id": 3, "views": 1, "featured": false, "deleted_at": "2024-01-01T00:00:00Z"}
        ],
        "comments": [
            {"id": 1, "body": "Great read", "post_id": 1},
            {"id": 2, "body": "Thanks", "post_id": 1},
            {"id": 3, "body": "Helpful", "post_id": 3}
        ]
    })
}

pub fn store() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .seed_json(&fixture_data())
        .expect("fixture data should load");
    store
}

pub fn registry() -> Registry {
    let posts_policy = RolePolicy::new()
        .allow("viewAny", ["*"])
        .allow("view", ["*"])
        .allow("create", ["editor", "admin"])
        .allow("update", ["editor", "admin"])
        .allow("delete", ["admin"])
        .allow("restore", ["admin"])
        .allow("forceDelete", ["admin"])
        .allow("runAction", ["editor", "admin"])
        .allow("runDestructiveAction", ["admin"]);

    let users_policy = RolePolicy::new()
        .allow("viewAny", ["*"])
        .allow("view", ["*"])
        .allow("create", ["admin"])
        .allow("update", ["*"])
        .allow("delete", ["admin"])
        .allow("attachAny:roles", ["admin"])
        .allow("attach:roles", ["admin"])
        .allow("detach:roles", ["admin"]);

    let comments_policy = RolePolicy::new()
        .allow("viewAny", ["admin"])
        .allow("view", ["admin"]);

    Registry::new()
        .register(Arc::new(Users))
        .and_then(|r| r.register(Arc::new(Roles)))
        .and_then(|r| r.register(Arc::new(Posts)))
        .and_then(|r| r.register(Arc::new(Comments)))
        .expect("fixture resources should register")
        .with_policy("posts", Arc::new(posts_policy))
        .with_policy("users", Arc::new(users_policy))
        .with_policy("comments", Arc::new(comments_policy))
}

pub fn engine() -> AdminEngine {
    init_tracing();
    AdminEngine::new(registry(), Arc::new(store()))
}

/// Engine over a store that counts fetches
pub fn counting_engine() -> (AdminEngine, Arc<CountingStore>) {
    init_tracing();
    let store = Arc::new(CountingStore::new(store()));
    (AdminEngine::new(registry(), store.clone()), store)
}

pub fn admin() -> Actor {
    Actor::new("1").with_role("admin")
}

pub fn editor() -> Actor {
    Actor::new("2").with_role("editor")
}

pub fn viewer() -> Actor {
    Actor::new("3")
}

pub fn request(actor: Actor, resource: &str, context: RequestContext) -> AdminRequest {
    AdminRequest::new(actor, resource, context)
}

pub fn input(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

pub fn ids(values: &[Value]) -> Vec<i64> {
    values.iter().filter_map(Value::as_i64).collect()
}

pub fn attributes(fields: &resource_admin::field::FieldCollection) -> Vec<String> {
    fields.iter().map(|f| f.attribute.clone()).collect()
}

/// Memory store wrapper counting `fetch` calls
pub struct CountingStore {
    inner: MemoryStore,
    fetches: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.fetches.store(0, Ordering::SeqCst);
    }
}

impl RecordStore for CountingStore {
    fn fetch(&self, query: &Query) -> Result<Vec<Record>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(query)
    }

    fn count(&self, query: &Query) -> Result<u64, StoreError> {
        self.inner.count(query)
    }

    fn insert(&self, table: &str, primary_key: &str, record: &mut Record) -> Result<(), StoreError> {
        self.inner.insert(table, primary_key, record)
    }

    fn update(&self, table: &str, conditions: &[Condition], changes: &Map<String, Value>) -> Result<u64, StoreError> {
        self.inner.update(table, conditions, changes)
    }

    fn delete(&self, table: &str, conditions: &[Condition]) -> Result<u64, StoreError> {
        self.inner.delete(table, conditions)
    }
}

pub fn asc(column: &str) -> OrderInfo {
    OrderInfo::asc(column)
}
