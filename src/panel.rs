//! Panel assembly: partition a resolved field collection into display
//! panels.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::field::{Field, FieldCollection, PanelMeta};
use crate::request::AdminRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelComponent {
    Panel,
    /// A listable relationship rendered as an embedded listing
    Relationship,
    Tabs,
}

#[derive(Debug, Clone)]
pub struct Tab {
    pub name: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone)]
pub struct Panel {
    pub name: String,
    pub component: PanelComponent,
    pub show_toolbar: bool,
    pub meta: PanelMeta,
    pub fields: Vec<Field>,
    /// Populated for `PanelComponent::Tabs` only
    pub tabs: Vec<Tab>,
}

impl Panel {
    fn new(name: impl Into<String>, component: PanelComponent) -> Self {
        Self {
            name: name.into(),
            component,
            show_toolbar: false,
            meta: PanelMeta::default(),
            fields: vec![],
            tabs: vec![],
        }
    }

    fn toolbar(name: impl Into<String>, fields: Vec<Field>) -> Self {
        let mut panel = Panel::new(name, PanelComponent::Panel);
        panel.show_toolbar = true;
        panel.fields = fields;
        panel
    }

    /// Fields of the panel, tab contents included, in display order
    pub fn all_fields(&self) -> Vec<&Field> {
        match self.component {
            PanelComponent::Tabs => self.tabs.iter().flat_map(|t| t.fields.iter()).collect(),
            _ => self.fields.iter().collect(),
        }
    }

    pub fn attributes(&self) -> Vec<&str> {
        self.all_fields().into_iter().map(|f| f.attribute.as_str()).collect()
    }

    pub fn to_json(&self, req: &AdminRequest) -> Value {
        let fields = |fields: &[Field]| Value::Array(fields.iter().map(|f| f.to_json(req)).collect());
        let mut body = json!({
            "name": self.name,
            "component": self.component,
            "showToolbar": self.show_toolbar,
            "collapsible": self.meta.collapsible,
            "collapsedByDefault": self.meta.collapsed_by_default,
            "limit": self.meta.limit,
            "helpText": self.meta.help_text,
            "fields": fields(&self.fields),
        });
        if self.component == PanelComponent::Tabs {
            if let Value::Object(map) = &mut body {
                map.insert(
                    "tabs".into(),
                    Value::Array(
                        self.tabs
                            .iter()
                            .map(|t| json!({"name": t.name, "fields": fields(&t.fields)}))
                            .collect(),
                    ),
                );
            }
        }
        body
    }
}

/// Where a field lands before the default bucket is placed
enum Bucket {
    Named(Panel),
    Promoted(Panel),
    Tabs(Panel),
}

impl Bucket {
    fn panel(&self) -> &Panel {
        match self {
            Bucket::Named(p) | Bucket::Promoted(p) | Bucket::Tabs(p) => p,
        }
    }

    fn into_panel(self) -> Panel {
        match self {
            Bucket::Named(p) | Bucket::Promoted(p) | Bucket::Tabs(p) => p,
        }
    }
}

pub struct PanelAssembler;

impl PanelAssembler {
    /// Assemble panels in display order. The result is a pure function of
    /// `fields` and `default_label`; the first panel of a non-empty result
    /// is the only toolbar panel.
    pub fn assemble(fields: &FieldCollection, default_label: &str) -> Vec<Panel> {
        let mut default_bucket: Vec<Field> = vec![];
        let mut buckets: Vec<Bucket> = vec![];

        for field in fields {
            if let Some(tab) = &field.tab {
                let index = match buckets
                    .iter()
                    .position(|b| matches!(b, Bucket::Tabs(p) if p.name == tab.group))
                {
                    Some(index) => index,
                    None => {
                        buckets.push(Bucket::Tabs(Panel::new(&tab.group, PanelComponent::Tabs)));
                        buckets.len() - 1
                    }
                };
                let Bucket::Tabs(panel) = &mut buckets[index] else {
                    continue;
                };
                match panel.tabs.iter_mut().find(|t| t.name == tab.tab) {
                    Some(existing) => existing.fields.push(field.clone()),
                    None => panel.tabs.push(Tab {
                        name: tab.tab.clone(),
                        fields: vec![field.clone()],
                    }),
                }
                continue;
            }

            if field.as_panel || field.listable {
                let component = if field.listable {
                    PanelComponent::Relationship
                } else {
                    PanelComponent::Panel
                };
                let mut panel = Panel::new(&field.name, component);
                if let Some(declared) = &field.panel {
                    panel.meta = (*declared.meta).clone();
                }
                panel.fields.push(field.clone());
                buckets.push(Bucket::Promoted(panel));
                continue;
            }

            match &field.panel {
                Some(declared) => {
                    let existing = buckets
                        .iter()
                        .position(|b| matches!(b, Bucket::Named(p) if p.name == declared.name));
                    match existing {
                        Some(index) => {
                            if let Bucket::Named(panel) = &mut buckets[index] {
                                panel.fields.push(field.clone());
                            }
                        }
                        None => {
                            let mut panel = Panel::new(&declared.name, PanelComponent::Panel);
                            panel.meta = (*declared.meta).clone();
                            panel.fields.push(field.clone());
                            buckets.push(Bucket::Named(panel));
                        }
                    }
                }
                None => default_bucket.push(field.clone()),
            }
        }

        if default_bucket.is_empty() && buckets.is_empty() {
            return vec![];
        }

        let labelled = buckets
            .iter()
            .position(|b| matches!(b, Bucket::Named(p) if p.name == default_label));

        let mut panels: Vec<Panel> = match labelled {
            Some(index) => {
                debug!("Panel {} absorbs {} unassigned field(s)", default_label, default_bucket.len());
                let mut main = buckets.remove(index).into_panel();
                default_bucket.extend(main.fields);
                main.fields = default_bucket;
                main.show_toolbar = true;
                std::iter::once(main)
                    .chain(buckets.into_iter().map(Bucket::into_panel))
                    .collect()
            }
            None if !default_bucket.is_empty() => std::iter::once(Panel::toolbar(default_label, default_bucket))
                .chain(buckets.into_iter().map(Bucket::into_panel))
                .collect(),
            None => {
                let needs_anchor = buckets
                    .first()
                    .map_or(false, |b| b.panel().component != PanelComponent::Panel)
                    || buckets.iter().any(|b| matches!(b, Bucket::Tabs(_)));
                let mut panels: Vec<Panel> = buckets.into_iter().map(Bucket::into_panel).collect();
                if needs_anchor {
                    panels.insert(0, Panel::toolbar(default_label, vec![]));
                } else if let Some(first) = panels.first_mut() {
                    first.show_toolbar = true;
                }
                panels
            }
        };

        for panel in panels.iter_mut().skip(1) {
            panel.show_toolbar = false;
        }
        debug!("Assembled {} panel(s)", panels.len());
        panels
    }
}
