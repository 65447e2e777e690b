use serde_json::{json, Value};
use crate::cli::OutputFormat;
use crate::error::EngineError;

/// Output a JSON document in the appropriate format. Text output falls
/// back to the pretty-printed document when no text renderer is given.
pub fn output_document<F>(output_format: &OutputFormat, document: &Value, text: F) -> anyhow::Result<()>
where
    F: FnOnce(&Value),
{
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(document)?),
        OutputFormat::Text => text(document),
    }
    Ok(())
}

/// Output the body of an engine error. The message itself is reported by
/// the binary.
pub fn output_engine_error(output_format: &OutputFormat, error: &EngineError) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&error.to_json())?);
        }
        OutputFormat::Text => {
            if let Some(errors) = error.validation_errors() {
                for (attribute, messages) in errors.iter() {
                    for message in messages {
                        eprintln!("  {}: {}", attribute, message);
                    }
                }
            }
        }
    }
    Ok(())
}

/// Output an empty collection in the appropriate format
pub fn output_empty_collection(
    output_format: &OutputFormat,
    collection_name: &str,
    message: &str,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({
                collection_name: []
            }))?);
        }
        OutputFormat::Text => {
            println!("{}", message);
        }
    }
    Ok(())
}

/// Compact single-line rendering of a field value
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Left-aligned text table
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<String>| {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:width$}", cell, width = widths.get(i).copied().unwrap_or(0)))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", line(headers.iter().map(|h| h.to_string()).collect()));
    for row in rows {
        println!("{}", line(row.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_render_compactly() {
        assert_eq!(display_value(&Value::Null), "-");
        assert_eq!(display_value(&json!("draft")), "draft");
        assert_eq!(display_value(&json!(3)), "3");
        assert_eq!(display_value(&json!([1, 2])), "[1,2]");
    }
}
