//! Attribute descriptors.
//!
//! A `Field` is an immutable declaration (visibility, fill/resolve
//! behavior, rules) plus one runtime slot, `value`, populated when the field
//! is resolved against a record.

pub mod collection;
pub mod item;
pub mod relation;

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::record::Record;
use crate::request::AdminRequest;
use crate::types::RequestContext;
use crate::validation::Rule;

pub use collection::FieldCollection;
pub use item::{flatten, FieldItem, PanelMeta, PanelRef, TabRef};
pub use relation::{singular, PivotSpec, Relation, RelationKind};

pub type RequestPredicate = Arc<dyn Fn(&AdminRequest) -> bool + Send + Sync>;
pub type RecordPredicate = Arc<dyn Fn(&AdminRequest, &Record) -> bool + Send + Sync>;
/// `(stored value, record) -> display value`
pub type ResolveCallback = Arc<dyn Fn(&Value, &Record) -> Value + Send + Sync>;
/// `(request, record, attribute, submitted value)`
pub type FillCallback = Arc<dyn Fn(&AdminRequest, &mut Record, &str, Option<&Value>) + Send + Sync>;
/// Adjust a field from sibling values submitted with the form
pub type DependsOnCallback = Arc<dyn Fn(&mut Field, &Map<String, Value>) + Send + Sync>;
/// Release whatever the field owns before its record is hard-deleted
pub type DeleteCallback = Arc<dyn Fn(&Record) -> Result<(), String> + Send + Sync>;

#[derive(Clone)]
pub enum Visibility {
    Always,
    Never,
    When(RecordPredicate),
}

impl Visibility {
    pub fn check(&self, req: &AdminRequest, record: &Record) -> bool {
        match self {
            Visibility::Always => true,
            Visibility::Never => false,
            Visibility::When(predicate) => predicate(req, record),
        }
    }

    fn from_bool(shown: bool) -> Self {
        if shown {
            Visibility::Always
        } else {
            Visibility::Never
        }
    }
}

impl fmt::Debug for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Always => f.write_str("Always"),
            Visibility::Never => f.write_str("Never"),
            Visibility::When(_) => f.write_str("When(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    pub value: Value,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    Id,
    Text,
    Textarea,
    Number,
    Boolean,
    Select(Vec<SelectOption>),
    DateTime,
    Relation(Relation),
    /// Display-only heading inside a form
    Heading,
    /// Value produced by a resolve callback, never stored
    Computed,
}

impl FieldKind {
    pub fn component(&self) -> &'static str {
        match self {
            FieldKind::Id => "id-field",
            FieldKind::Text => "text-field",
            FieldKind::Textarea => "textarea-field",
            FieldKind::Number => "number-field",
            FieldKind::Boolean => "boolean-field",
            FieldKind::Select(_) => "select-field",
            FieldKind::DateTime => "date-time-field",
            FieldKind::Relation(relation) => relation.kind.component(),
            FieldKind::Heading => "heading-field",
            FieldKind::Computed => "text-field",
        }
    }
}

#[derive(Clone)]
pub struct Field {
    pub name: String,
    /// Input, rule and display key
    pub attribute: String,
    pub kind: FieldKind,
    pub panel: Option<PanelRef>,
    pub tab: Option<TabRef>,
    /// Rendered as its own one-field panel
    pub as_panel: bool,
    /// Declared on a many-to-many join row
    pub pivot: bool,
    /// Shown as a related listing rather than a value
    pub listable: bool,
    pub sortable: bool,
    pub filterable: bool,
    pub nullable: bool,
    pub fillable: bool,
    pub help_text: Option<String>,
    pub default_value: Option<Value>,
    /// Hidden by a depends-on callback for the current form state
    pub hidden: bool,
    /// Resolved value slot
    pub value: Value,
    pub rules: Vec<Rule>,
    pub creation_rules: Vec<Rule>,
    pub update_rules: Vec<Rule>,
    pub depends_on: Vec<String>,

    pub(crate) show_on_index: Visibility,
    pub(crate) show_on_detail: Visibility,
    pub(crate) show_on_creation: Visibility,
    pub(crate) show_on_update: Visibility,
    pub(crate) see_callback: Option<RequestPredicate>,
    pub(crate) readonly_callback: Option<RequestPredicate>,
    pub(crate) resolve_callback: Option<ResolveCallback>,
    pub(crate) fill_callback: Option<FillCallback>,
    pub(crate) depends_on_callback: Option<DependsOnCallback>,
    pub(crate) delete_callback: Option<DeleteCallback>,
}

impl Field {
    pub fn new(name: impl Into<String>, attribute: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            attribute: attribute.into(),
            kind,
            panel: None,
            tab: None,
            as_panel: false,
            pivot: false,
            listable: false,
            sortable: false,
            filterable: false,
            nullable: false,
            fillable: true,
            help_text: None,
            default_value: None,
            hidden: false,
            value: Value::Null,
            rules: vec![],
            creation_rules: vec![],
            update_rules: vec![],
            depends_on: vec![],
            show_on_index: Visibility::Always,
            show_on_detail: Visibility::Always,
            show_on_creation: Visibility::Always,
            show_on_update: Visibility::Always,
            see_callback: None,
            readonly_callback: None,
            resolve_callback: None,
            fill_callback: None,
            depends_on_callback: None,
            delete_callback: None,
        }
    }

    // ========================================
    // Constructors
    // ========================================

    pub fn id() -> Self {
        let mut field = Self::new("ID", "id", FieldKind::Id);
        field.sortable = true;
        field.show_on_creation = Visibility::Never;
        field.show_on_update = Visibility::Never;
        field
    }

    pub fn text(name: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::new(name, attribute, FieldKind::Text)
    }

    pub fn textarea(name: impl Into<String>, attribute: impl Into<String>) -> Self {
        let mut field = Self::new(name, attribute, FieldKind::Textarea);
        field.show_on_index = Visibility::Never;
        field
    }

    pub fn number(name: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::new(name, attribute, FieldKind::Number)
    }

    pub fn boolean(name: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::new(name, attribute, FieldKind::Boolean)
    }

    pub fn select(name: impl Into<String>, attribute: impl Into<String>, options: Vec<SelectOption>) -> Self {
        Self::new(name, attribute, FieldKind::Select(options))
    }

    pub fn datetime(name: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::new(name, attribute, FieldKind::DateTime)
    }

    pub fn heading(text: impl Into<String>) -> Self {
        let text = text.into();
        let attribute = format!("heading_{}", text.to_lowercase().replace(' ', "_"));
        let mut field = Self::new(text, attribute, FieldKind::Heading);
        field.fillable = false;
        field.show_on_index = Visibility::Never;
        field
    }

    pub fn computed<F>(name: impl Into<String>, attribute: impl Into<String>, resolve: F) -> Self
    where
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        let mut field = Self::new(name, attribute, FieldKind::Computed);
        field.fillable = false;
        field.show_on_creation = Visibility::Never;
        field.show_on_update = Visibility::Never;
        field.resolve_callback = Some(Arc::new(move |_, record| resolve(record)));
        field
    }

    pub fn belongs_to(name: impl Into<String>, attribute: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::new(name, attribute, FieldKind::Relation(Relation::new(RelationKind::BelongsTo, resource)))
    }

    pub fn has_one(name: impl Into<String>, attribute: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::listable_relation(name, attribute, Relation::new(RelationKind::HasOne, resource))
    }

    pub fn has_many(name: impl Into<String>, attribute: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::listable_relation(name, attribute, Relation::new(RelationKind::HasMany, resource))
    }

    pub fn belongs_to_many(name: impl Into<String>, attribute: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::listable_relation(name, attribute, Relation::new(RelationKind::BelongsToMany, resource))
    }

    fn listable_relation(name: impl Into<String>, attribute: impl Into<String>, relation: Relation) -> Self {
        let mut field = Self::new(name, attribute, FieldKind::Relation(relation));
        field.listable = true;
        field.fillable = false;
        field.show_on_index = Visibility::Never;
        field.show_on_creation = Visibility::Never;
        field.show_on_update = Visibility::Never;
        field
    }

    // ========================================
    // Builders
    // ========================================

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help_text = Some(text.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn as_panel(mut self) -> Self {
        self.as_panel = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly_callback = Some(Arc::new(|_| true));
        self
    }

    pub fn readonly_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AdminRequest) -> bool + Send + Sync + 'static,
    {
        self.readonly_callback = Some(Arc::new(predicate));
        self
    }

    /// Excluded from fill operations and rule sets, still displayed
    pub fn unfillable(mut self) -> Self {
        self.fillable = false;
        self
    }

    pub fn can_see<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AdminRequest) -> bool + Send + Sync + 'static,
    {
        self.see_callback = Some(Arc::new(predicate));
        self
    }

    pub fn rules<I, R>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Rule>,
    {
        self.rules.extend(rules.into_iter().map(Into::into));
        self
    }

    pub fn creation_rules<I, R>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Rule>,
    {
        self.creation_rules.extend(rules.into_iter().map(Into::into));
        self
    }

    pub fn update_rules<I, R>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Rule>,
    {
        self.update_rules.extend(rules.into_iter().map(Into::into));
        self
    }

    pub fn resolve_using<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&Value, &Record) -> Value + Send + Sync + 'static,
    {
        self.resolve_callback = Some(Arc::new(resolve));
        self
    }

    pub fn fill_using<F>(mut self, fill: F) -> Self
    where
        F: Fn(&AdminRequest, &mut Record, &str, Option<&Value>) + Send + Sync + 'static,
    {
        self.fill_callback = Some(Arc::new(fill));
        self
    }

    pub fn depends_on<I, S, F>(mut self, attributes: I, callback: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&mut Field, &Map<String, Value>) + Send + Sync + 'static,
    {
        self.depends_on = attributes.into_iter().map(Into::into).collect();
        self.depends_on_callback = Some(Arc::new(callback));
        self
    }

    pub fn deletable<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Record) -> Result<(), String> + Send + Sync + 'static,
    {
        self.delete_callback = Some(Arc::new(callback));
        self
    }

    pub fn with_relation<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(&mut Relation),
    {
        if let FieldKind::Relation(relation) = &mut self.kind {
            configure(relation);
        }
        self
    }

    /// Fields shown for the join row of a many-to-many relationship
    pub fn pivot_fields<F>(self, fields: F) -> Self
    where
        F: Fn(&AdminRequest) -> Vec<Field> + Send + Sync + 'static,
    {
        self.with_relation(|relation| {
            relation.pivot.get_or_insert_with(PivotSpec::default).fields = Some(Arc::new(fields));
        })
    }

    // Visibility builders

    pub fn hide_from_index(mut self) -> Self {
        self.show_on_index = Visibility::Never;
        self
    }

    pub fn hide_from_detail(mut self) -> Self {
        self.show_on_detail = Visibility::Never;
        self
    }

    pub fn hide_when_creating(mut self) -> Self {
        self.show_on_creation = Visibility::Never;
        self
    }

    pub fn hide_when_updating(mut self) -> Self {
        self.show_on_update = Visibility::Never;
        self
    }

    pub fn show_on_index(mut self) -> Self {
        self.show_on_index = Visibility::Always;
        self
    }

    pub fn show_on_index_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AdminRequest, &Record) -> bool + Send + Sync + 'static,
    {
        self.show_on_index = Visibility::When(Arc::new(predicate));
        self
    }

    pub fn show_on_detail_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AdminRequest, &Record) -> bool + Send + Sync + 'static,
    {
        self.show_on_detail = Visibility::When(Arc::new(predicate));
        self
    }

    pub fn only_on_index(self) -> Self {
        self.set_visibility(true, false, false, false)
    }

    pub fn only_on_detail(self) -> Self {
        self.set_visibility(false, true, false, false)
    }

    pub fn only_on_forms(self) -> Self {
        self.set_visibility(false, false, true, true)
    }

    pub fn except_on_forms(self) -> Self {
        self.set_visibility(true, true, false, false)
    }

    fn set_visibility(mut self, index: bool, detail: bool, creation: bool, update: bool) -> Self {
        self.show_on_index = Visibility::from_bool(index);
        self.show_on_detail = Visibility::from_bool(detail);
        self.show_on_creation = Visibility::from_bool(creation);
        self.show_on_update = Visibility::from_bool(update);
        self
    }

    // ========================================
    // Evaluation
    // ========================================

    pub fn is_shown_on_index(&self, req: &AdminRequest, record: &Record) -> bool {
        self.show_on_index.check(req, record)
    }

    pub fn is_shown_on_detail(&self, req: &AdminRequest, record: &Record) -> bool {
        self.show_on_detail.check(req, record)
    }

    pub fn is_shown_on_creation(&self, req: &AdminRequest) -> bool {
        self.show_on_creation.check(req, &Record::new())
    }

    pub fn is_shown_on_update(&self, req: &AdminRequest, record: &Record) -> bool {
        self.show_on_update.check(req, record)
    }

    pub fn authorized_to_see(&self, req: &AdminRequest) -> bool {
        self.see_callback.as_ref().map_or(true, |see| see(req))
    }

    pub fn is_readonly(&self, req: &AdminRequest) -> bool {
        self.readonly_callback.as_ref().map_or(false, |readonly| readonly(req))
    }

    pub fn is_deletable(&self) -> bool {
        self.delete_callback.is_some()
    }

    pub fn relation(&self) -> Option<&Relation> {
        match &self.kind {
            FieldKind::Relation(relation) => Some(relation),
            _ => None,
        }
    }

    /// Whether this is a relationship field targeting `resource`
    pub fn references_resource(&self, resource: &str) -> bool {
        self.relation().map_or(false, |r| r.resource == resource)
    }

    pub fn is_belongs_to_many(&self) -> bool {
        self.relation().map_or(false, |r| r.kind == RelationKind::BelongsToMany)
    }

    /// Storage column, or None for fields that store nothing
    pub fn column(&self) -> Option<String> {
        match &self.kind {
            FieldKind::Heading | FieldKind::Computed => None,
            FieldKind::Relation(relation) => match relation.kind {
                RelationKind::BelongsTo => Some(relation.foreign_key(&self.attribute, "")),
                _ => None,
            },
            _ => Some(self.attribute.clone()),
        }
    }

    pub fn sortable_column(&self) -> Option<String> {
        if self.sortable && !self.pivot {
            self.column()
        } else {
            None
        }
    }

    /// Declared rules for the given form context
    pub fn rules_for(&self, context: RequestContext) -> Vec<Rule> {
        let mut rules = self.rules.clone();
        if context.is_create_or_attach() {
            rules.extend(self.creation_rules.iter().cloned());
        } else if context.is_update_or_update_attached() {
            rules.extend(self.update_rules.iter().cloned());
        }
        rules
    }

    /// Populate the value slot from `record`
    pub fn resolve(&mut self, record: &Record) {
        let stored = match self.column() {
            Some(column) => record.value(&column).clone(),
            None => Value::Null,
        };
        self.value = match &self.resolve_callback {
            Some(resolve) => resolve(&stored, record),
            None => stored,
        };
    }

    /// Copy the submitted value onto `record`. Readonly and unfillable
    /// fields never write.
    pub fn fill(&self, req: &AdminRequest, record: &mut Record) {
        if !self.fillable || self.is_readonly(req) {
            return;
        }
        let submitted = req.input.get(&self.attribute);
        if let Some(fill) = &self.fill_callback {
            fill(req, record, &self.attribute, submitted);
            return;
        }
        if let (Some(column), Some(value)) = (self.column(), submitted) {
            record.set(column, value.clone());
        }
    }

    pub fn apply_depends_on(&mut self, input: &Map<String, Value>) {
        if let Some(callback) = self.depends_on_callback.clone() {
            callback(self, input);
        }
    }

    pub fn delete_stored(&self, record: &Record) -> Result<(), String> {
        match &self.delete_callback {
            Some(delete) => delete(record),
            None => Ok(()),
        }
    }

    pub fn to_json(&self, req: &AdminRequest) -> Value {
        let mut body = json!({
            "attribute": self.attribute,
            "name": self.name,
            "component": self.kind.component(),
            "value": self.value,
            "sortable": self.sortable,
            "nullable": self.nullable,
            "readonly": self.is_readonly(req),
            "panel": self.panel.as_ref().map(|p| p.name.clone()),
            "helpText": self.help_text,
            "pivot": self.pivot,
        });
        if let Value::Object(map) = &mut body {
            if let Some(tab) = &self.tab {
                map.insert("tab".into(), json!({"group": tab.group, "name": tab.tab}));
            }
            if let FieldKind::Select(options) = &self.kind {
                map.insert("options".into(), json!(options));
            }
            if let Some(relation) = self.relation() {
                map.insert("resourceName".into(), json!(relation.resource));
                map.insert("listable".into(), json!(self.listable));
            }
            if let Some(default) = &self.default_value {
                map.insert("default".into(), default.clone());
            }
            if !self.depends_on.is_empty() {
                map.insert("dependsOn".into(), json!(self.depends_on));
            }
        }
        body
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("attribute", &self.attribute)
            .field("kind", &self.kind)
            .field("panel", &self.panel.as_ref().map(|p| &p.name))
            .field("tab", &self.tab)
            .field("pivot", &self.pivot)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}
