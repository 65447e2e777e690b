use clap::Args;
use serde_json::{json, Value};

use super::engine_result;
use crate::cli::session::{parse_id, Session};
use crate::cli::utils::{display_value, output_document, print_table};
use crate::cli::OutputFormat;
use crate::error::EngineError;
use crate::field::FieldCollection;
use crate::panel::{Panel, PanelAssembler};
use crate::resource::Resource;
use crate::types::RequestContext;

#[derive(Args, Debug, Clone)]
pub struct DescribeArgs {
    #[arg(help = "Resource key")]
    pub resource: String,

    #[arg(long, default_value = "detail", help = "index | detail | create | update")]
    pub context: String,

    #[arg(long, help = "Record id (required for detail and update)")]
    pub id: Option<String>,
}

fn parse_context(raw: &str) -> anyhow::Result<RequestContext> {
    Ok(match raw {
        "index" => RequestContext::Index,
        "detail" => RequestContext::Detail,
        "create" => RequestContext::Create,
        "update" => RequestContext::Update,
        other => anyhow::bail!("Unknown context '{}': expected index, detail, create or update", other),
    })
}

pub fn handle(session: &Session, args: DescribeArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let context = parse_context(&args.context)?;
    let mut req = session.request(&args.resource, context);
    if let Some(id) = &args.id {
        req = req.with_resource_id(parse_id(id));
    }
    let engine = &session.engine;

    let result: Result<(FieldCollection, Vec<Panel>), EngineError> = match context {
        RequestContext::Index => engine.registry().resolve(&args.resource).and_then(|definition| {
            let label = definition.label();
            let fields = Resource::new(definition).index_fields(&req, engine.registry())?;
            let panels = PanelAssembler::assemble(&fields, &label);
            Ok((fields, panels))
        }),
        RequestContext::Detail => engine.detail(&req).map(|view| (view.fields, view.panels)),
        RequestContext::Create => engine.creation_form(&req).map(|view| (view.fields, view.panels)),
        _ => engine.update_form(&req).map(|view| (view.fields, view.panels)),
    };
    let (fields, panels) = engine_result(&output_format, result)?;

    let document = json!({
        "resource": args.resource,
        "context": context.as_str(),
        "fields": fields.to_json(&req),
        "panels": panels.iter().map(|p| p.to_json(&req)).collect::<Vec<Value>>(),
    });
    output_document(&output_format, &document, |_| {
        for panel in &panels {
            let toolbar = if panel.show_toolbar { " (toolbar)" } else { "" };
            println!("== {} [{:?}]{}", panel.name, panel.component, toolbar);
            let rows: Vec<Vec<String>> = panel
                .all_fields()
                .into_iter()
                .map(|field| {
                    vec![
                        field.attribute.clone(),
                        field.kind.component().to_string(),
                        field.name.clone(),
                        display_value(&field.value),
                    ]
                })
                .collect();
            print_table(&["ATTRIBUTE", "COMPONENT", "NAME", "VALUE"], &rows);
            println!();
        }
    })
}
