use anyhow::anyhow;
use clap::Args;

use super::engine_result;
use crate::cli::session::{parse_id, Session};
use crate::cli::utils::{output_document, print_table};
use crate::cli::OutputFormat;
use crate::types::RequestContext;
use crate::validation::rules_to_json;

#[derive(Args, Debug, Clone)]
pub struct RulesArgs {
    #[arg(help = "Resource key")]
    pub resource: String,

    #[arg(long, default_value = "create", help = "create | update | attach | update-attached")]
    pub context: String,

    #[arg(long, help = "Record id")]
    pub id: Option<String>,

    #[arg(long, help = "Related target as resource:relationship[:id]")]
    pub related: Option<String>,
}

pub fn handle(session: &Session, args: RulesArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let context = match args.context.as_str() {
        "create" => RequestContext::Create,
        "update" => RequestContext::Update,
        "attach" => RequestContext::Attach,
        "update-attached" => RequestContext::UpdateAttached,
        other => return Err(anyhow!("Unknown form context '{}'", other)),
    };

    let mut req = session.request(&args.resource, context);
    if let Some(id) = &args.id {
        req = req.with_resource_id(parse_id(id));
    }
    if let Some(related) = &args.related {
        let parts: Vec<&str> = related.split(':').collect();
        req = match parts.as_slice() {
            [resource, relationship] => req.related(*resource, None, *relationship),
            [resource, relationship, id] => req.related(*resource, Some(parse_id(id)), *relationship),
            _ => return Err(anyhow!("Expected resource:relationship[:id], got '{}'", related)),
        };
    }

    let rules = engine_result(&output_format, session.engine.rules(&req))?;
    output_document(&output_format, &rules_to_json(&rules), |_| {
        let rows: Vec<Vec<String>> = rules
            .iter()
            .map(|(attribute, list)| {
                vec![
                    attribute.clone(),
                    list.iter().map(|r| r.as_str()).collect::<Vec<_>>().join("|"),
                ]
            })
            .collect();
        print_table(&["ATTRIBUTE", "RULES"], &rows);
    })
}
