use serde::Serialize;
use std::sync::Arc;

use super::Field;

/// Display metadata declared on a panel
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelMeta {
    pub collapsible: bool,
    pub collapsed_by_default: bool,
    /// Number of fields shown before "show more"
    pub limit: Option<usize>,
    pub help_text: Option<String>,
}

/// Panel membership carried by each field of a declared panel
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRef {
    pub name: String,
    pub meta: Arc<PanelMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabRef {
    /// Name of the tab group
    pub group: String,
    pub tab: String,
}

/// One entry of a declared field list
#[derive(Debug, Clone)]
pub enum FieldItem {
    Field(Field),
    /// Reusable group, flattened in place
    Group(Vec<FieldItem>),
    Panel {
        name: String,
        meta: PanelMeta,
        items: Vec<FieldItem>,
    },
    Tabs {
        group: String,
        tabs: Vec<(String, Vec<FieldItem>)>,
    },
}

impl FieldItem {
    pub fn group(items: Vec<FieldItem>) -> Self {
        FieldItem::Group(items)
    }

    pub fn panel(name: impl Into<String>, items: Vec<FieldItem>) -> Self {
        FieldItem::Panel {
            name: name.into(),
            meta: PanelMeta::default(),
            items,
        }
    }

    pub fn panel_with(name: impl Into<String>, meta: PanelMeta, items: Vec<FieldItem>) -> Self {
        FieldItem::Panel {
            name: name.into(),
            meta,
            items,
        }
    }

    pub fn tabs(group: impl Into<String>, tabs: Vec<(String, Vec<FieldItem>)>) -> Self {
        FieldItem::Tabs {
            group: group.into(),
            tabs,
        }
    }
}

impl From<Field> for FieldItem {
    fn from(field: Field) -> Self {
        FieldItem::Field(field)
    }
}

/// Flatten declared items into fields, stamping panel and tab membership.
/// Inner declarations win over outer ones.
pub fn flatten(items: Vec<FieldItem>) -> Vec<Field> {
    let mut out = Vec::new();
    flatten_into(items, None, None, &mut out);
    out
}

fn flatten_into(items: Vec<FieldItem>, panel: Option<&PanelRef>, tab: Option<&TabRef>, out: &mut Vec<Field>) {
    for item in items {
        match item {
            FieldItem::Field(mut field) => {
                if field.panel.is_none() {
                    field.panel = panel.cloned();
                }
                if field.tab.is_none() {
                    field.tab = tab.cloned();
                }
                out.push(field);
            }
            FieldItem::Group(items) => flatten_into(items, panel, tab, out),
            FieldItem::Panel { name, meta, items } => {
                let panel = PanelRef {
                    name,
                    meta: Arc::new(meta),
                };
                flatten_into(items, Some(&panel), tab, out);
            }
            FieldItem::Tabs { group, tabs } => {
                for (tab_name, items) in tabs {
                    let tab = TabRef {
                        group: group.clone(),
                        tab: tab_name,
                    };
                    flatten_into(items, panel, Some(&tab), out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_groups_panels_and_tabs_in_order() {
        let items = vec![
            Field::id().into(),
            FieldItem::group(vec![Field::text("Title", "title").into()]),
            FieldItem::panel("Meta", vec![Field::text("Slug", "slug").into()]),
            FieldItem::tabs(
                "Details",
                vec![
                    ("Body".to_string(), vec![Field::textarea("Body", "body").into()]),
                    ("Stats".to_string(), vec![Field::number("Views", "views").into()]),
                ],
            ),
        ];

        let fields = flatten(items);
        let attributes: Vec<_> = fields.iter().map(|f| f.attribute.as_str()).collect();
        assert_eq!(attributes, vec!["id", "title", "slug", "body", "views"]);
        assert_eq!(fields[2].panel.as_ref().map(|p| p.name.as_str()), Some("Meta"));
        assert_eq!(fields[4].tab.as_ref().map(|t| t.tab.as_str()), Some("Stats"));
        assert!(fields[1].panel.is_none());
    }
}
