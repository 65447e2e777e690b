use super::engine_result;
use crate::cli::session::Session;
use crate::cli::utils::{display_value, output_document, output_empty_collection, print_table};
use crate::cli::OutputFormat;
use crate::types::RequestContext;

pub fn handle(session: &Session, resource: String, lens: Option<String>, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut req = session.request(&resource, RequestContext::Index);
    if let Some(lens) = lens {
        req = req.with_lens(lens).with_context(RequestContext::Lens);
    }

    let catalogue = engine_result(&output_format, session.engine.filters(&req))?;
    let filters = catalogue.as_array().cloned().unwrap_or_default();
    if filters.is_empty() {
        return output_empty_collection(&output_format, "filters", &format!("No filters available on {}", resource));
    }

    output_document(&output_format, &catalogue, |_| {
        let rows: Vec<Vec<String>> = filters
            .iter()
            .map(|filter| {
                vec![
                    display_value(&filter["class"]),
                    display_value(&filter["name"]),
                    display_value(&filter["component"]),
                    display_value(&filter["currentValue"]),
                ]
            })
            .collect();
        print_table(&["KEY", "NAME", "COMPONENT", "DEFAULT"], &rows);
    })
}
