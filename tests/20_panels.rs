mod common;

use anyhow::Result;

use common::{admin, editor, request};
use resource_admin::panel::{Panel, PanelComponent};
use resource_admin::types::RequestContext;

fn names(panels: &[Panel]) -> Vec<&str> {
    panels.iter().map(|p| p.name.as_str()).collect()
}

#[test]
fn detail_panels_follow_declaration_order() -> Result<()> {
    let engine = common::engine();
    let req = request(admin(), "posts", RequestContext::Detail).with_resource_id(1);
    let detail = engine.detail(&req)?;

    assert_eq!(names(&detail.panels), vec!["Post Details", "Meta", "Comments"]);
    assert_eq!(
        detail.panels[0].attributes(),
        vec!["id", "title", "status", "author", "body", "secret"]
    );
    assert!(detail.panels[0].show_toolbar);
    assert_eq!(detail.panels.iter().filter(|p| p.show_toolbar).count(), 1);

    let meta = &detail.panels[1];
    assert!(meta.meta.collapsible);
    assert_eq!(meta.attributes(), vec!["views", "featured"]);

    assert_eq!(detail.panels[2].component, PanelComponent::Relationship);
    Ok(())
}

#[test]
fn hidden_relationships_leave_no_panel() -> Result<()> {
    let engine = common::engine();
    let req = request(editor(), "posts", RequestContext::Detail).with_resource_id(1);
    let detail = engine.detail(&req)?;

    assert_eq!(names(&detail.panels), vec!["Post Details", "Meta"]);
    Ok(())
}

#[test]
fn every_detail_field_lands_in_exactly_one_panel() -> Result<()> {
    let engine = common::engine();
    let req = request(admin(), "posts", RequestContext::Detail).with_resource_id(2);
    let detail = engine.detail(&req)?;

    let mut placed: Vec<String> = detail
        .panels
        .iter()
        .flat_map(|p| p.attributes().into_iter().map(String::from))
        .collect();
    let mut declared = common::attributes(&detail.fields);
    placed.sort();
    declared.sort();
    assert_eq!(placed, declared);
    Ok(())
}

#[test]
fn forms_are_panelled_like_detail() -> Result<()> {
    let engine = common::engine();
    let form = engine.creation_form(&request(editor(), "posts", RequestContext::Create))?;

    assert_eq!(names(&form.panels), vec!["Post Details", "Meta"]);
    assert_eq!(form.panels[0].attributes(), vec!["title", "status", "author", "body"]);
    Ok(())
}

#[test]
fn attach_form_pairs_the_relatable_field_with_pivot_fields() -> Result<()> {
    let engine = common::engine();
    let req = request(admin(), "users", RequestContext::Attach)
        .with_resource_id(2)
        .related("roles", None, "roles");
    let form = engine.attach_form(&req)?;

    assert_eq!(common::attributes(&form.fields), vec!["roles", "notes"]);
    assert_eq!(names(&form.panels), vec!["User Details"]);
    Ok(())
}

#[test]
fn panel_json_carries_component_and_toolbar() -> Result<()> {
    let engine = common::engine();
    let req = request(admin(), "posts", RequestContext::Detail).with_resource_id(1);
    let detail = engine.detail(&req)?;

    let body = detail.to_json(&req);
    let panels = body["panels"].as_array().cloned().unwrap_or_default();
    assert_eq!(panels.len(), 3);
    assert_eq!(panels[0]["showToolbar"], true);
    assert_eq!(panels[2]["component"], "relationship");
    assert_eq!(panels[1]["collapsible"], true);
    Ok(())
}
