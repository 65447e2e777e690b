use anyhow::Context;
use serde_json::{json, Value};

use super::engine_result;
use crate::cli::session::{parse_via, Session};
use crate::cli::utils::{display_value, output_document, output_empty_collection, print_table};
use crate::cli::{ListingArgs, OutputFormat};
use crate::filter::{encode_filters, FilterEntry};
use crate::pipeline::resolve_per_page;
use crate::request::AdminRequest;
use crate::resource::Resource;
use crate::types::RequestContext;

/// `key=value` entries, where the value is JSON when it parses as JSON
fn filter_entries(raw: &[String]) -> anyhow::Result<Vec<FilterEntry>> {
    raw.iter()
        .map(|entry| {
            let (key, value) = entry
                .split_once('=')
                .with_context(|| format!("Filter entry '{}' is not key=value", entry))?;
            let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
            Ok(FilterEntry::new(key, value))
        })
        .collect()
}

fn listing_request(session: &Session, args: &ListingArgs) -> anyhow::Result<AdminRequest> {
    let filters = if args.filter_entries.is_empty() {
        args.filter.clone()
    } else {
        Some(encode_filters(&filter_entries(&args.filter_entries)?)?)
    };

    let context = if args.lens.is_some() {
        RequestContext::Lens
    } else {
        RequestContext::Index
    };
    let mut req = session.request(&args.resource, context).with_params(args.params(filters));
    if let Some(lens) = &args.lens {
        req = req.with_lens(lens.clone());
    }
    if let Some(via) = &args.via {
        let (resource, id, relationship) = parse_via(via)?;
        req = req.via(resource, id, relationship);
    }
    Ok(req)
}

pub fn handle_index(session: &Session, args: ListingArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let req = listing_request(session, &args)?;
    let result = if req.lens.is_some() {
        session.engine.lens_index(&req)
    } else {
        session.engine.index(&req)
    };
    let page = engine_result(&output_format, result)?;

    if page.rows.is_empty() {
        return output_empty_collection(&output_format, "resources", &format!("No {} found", page.label));
    }

    output_document(&output_format, &page.to_json(&req), |_| {
        let attributes: Vec<String> = page.rows[0].fields.iter().map(|f| f.attribute.clone()).collect();
        let mut headers = vec!["TITLE"];
        headers.extend(attributes.iter().map(String::as_str));

        let rows: Vec<Vec<String>> = page
            .rows
            .iter()
            .map(|row| {
                let mut cells = vec![display_value(&row.title)];
                cells.extend(row.fields.iter().map(|f| display_value(&f.value)));
                cells
            })
            .collect();
        print_table(&headers, &rows);
        println!();
        println!("{} ({} total, page {} of {})", page.label, page.total, page.page, last_page(page.total, page.per_page));
    })
}

fn last_page(total: u64, per_page: u64) -> u64 {
    if total == 0 || per_page == 0 {
        1
    } else {
        (total + per_page - 1) / per_page
    }
}

pub fn handle_sql(session: &Session, args: ListingArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let req = listing_request(session, &args)?;
    let engine = &session.engine;
    let pipeline = engine.pipeline();

    let (resource, query) = engine_result(
        &output_format,
        engine.registry().resolve(&req.resource).and_then(|definition| {
            let resource = Resource::new(definition);
            let (query, _) = pipeline.index_query(&resource, &req)?;
            Ok((resource, query))
        }),
    )?;

    let per_page = resolve_per_page(&pipeline.per_page_options(&resource, &req), req.params.per_page);
    let paged = query.clone().limit(per_page, Some((req.params.page() - 1) * per_page));
    let select = paged.to_sql()?;
    let count = query.to_count_sql()?;

    let document = json!({
        "sql": select.query,
        "params": select.params,
        "count_sql": count.query,
    });
    output_document(&output_format, &document, |_| {
        println!("{}", select.query);
        for (i, param) in select.params.iter().enumerate() {
            println!("  ${} = {}", i + 1, param);
        }
    })
}
