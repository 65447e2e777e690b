use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use super::{Rule, RuleSet, ValidationErrors};
use crate::error::EngineError;
use crate::query::{Condition, Query};
use crate::store::RecordStore;

static EMAIL_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Evaluates a rule set against submitted input, collecting every violation.
///
/// Unknown rule names and store-backed rules without a store are
/// configuration errors, not validation failures.
pub struct Validator<'a> {
    store: Option<&'a dyn RecordStore>,
}

impl<'a> Validator<'a> {
    pub fn new() -> Self {
        Self { store: None }
    }

    pub fn with_store(store: &'a dyn RecordStore) -> Self {
        Self { store: Some(store) }
    }

    pub fn validate(&self, rules: &RuleSet, input: &Map<String, Value>) -> Result<ValidationErrors, EngineError> {
        let mut errors = ValidationErrors::new();
        for (attribute, attribute_rules) in rules {
            self.validate_attribute(attribute, attribute_rules, input, &mut errors)?;
        }
        if !errors.is_empty() {
            debug!("Validation collected {} error(s)", errors.len());
        }
        Ok(errors)
    }

    fn validate_attribute(
        &self,
        attribute: &str,
        rules: &[Rule],
        input: &Map<String, Value>,
        errors: &mut ValidationErrors,
    ) -> Result<(), EngineError> {
        let has = |name: &str| rules.iter().any(|r| r.name() == name);
        let value = input.get(attribute);

        if value.is_none() && has("sometimes") {
            return Ok(());
        }
        if has("required") && !is_filled(value) {
            errors.add(attribute, format!("The {} field is required.", label(attribute)));
            return Ok(());
        }

        // Remaining rules only inspect present, non-null values
        let value = match value {
            Some(v) if !v.is_null() => v,
            _ => return Ok(()),
        };
        let numeric = has("numeric") || has("integer");

        for rule in rules {
            let outcome = match rule {
                Rule::Custom { check, .. } => check(attribute, value, input),
                Rule::Named(text) => {
                    let (name, params) = split_rule(text);
                    self.check_named(attribute, name, &params, value, input, numeric)?
                }
            };
            if let Err(message) = outcome {
                errors.add(attribute, message);
            }
        }
        Ok(())
    }

    fn check_named(
        &self,
        attribute: &str,
        name: &str,
        params: &[&str],
        value: &Value,
        input: &Map<String, Value>,
        numeric: bool,
    ) -> Result<Result<(), String>, EngineError> {
        let attr = label(attribute);
        let pass = |ok: bool, message: String| if ok { Ok(()) } else { Err(message) };

        Ok(match name {
            "required" | "sometimes" | "nullable" => Ok(()),
            "string" => pass(value.is_string(), format!("The {} must be a string.", attr)),
            "integer" => pass(as_integer(value).is_some(), format!("The {} must be an integer.", attr)),
            "numeric" => pass(as_number(value).is_some(), format!("The {} must be a number.", attr)),
            "boolean" => pass(is_boolean(value), format!("The {} field must be true or false.", attr)),
            "array" => pass(value.is_array(), format!("The {} must be an array.", attr)),
            "email" => pass(
                value.as_str().map(is_email).unwrap_or(false),
                format!("The {} must be a valid email address.", attr),
            ),
            "uuid" => pass(
                value.as_str().map(|s| uuid::Uuid::parse_str(s).is_ok()).unwrap_or(false),
                format!("The {} must be a valid UUID.", attr),
            ),
            "date" => pass(
                value.as_str().map(is_date).unwrap_or(false),
                format!("The {} is not a valid date.", attr),
            ),
            "min" => {
                let limit = numeric_param(name, params, 0)?;
                pass(size_of(value, numeric).map(|s| s >= limit).unwrap_or(false), size_message(&attr, "at least", limit, value, numeric))
            }
            "max" => {
                let limit = numeric_param(name, params, 0)?;
                pass(size_of(value, numeric).map(|s| s <= limit).unwrap_or(false), size_message(&attr, "no more than", limit, value, numeric))
            }
            "between" => {
                let low = numeric_param(name, params, 0)?;
                let high = numeric_param(name, params, 1)?;
                pass(
                    size_of(value, numeric).map(|s| s >= low && s <= high).unwrap_or(false),
                    format!("The {} must be between {} and {}.", attr, low, high),
                )
            }
            "in" => pass(params.contains(&scalar_text(value).as_str()), format!("The selected {} is invalid.", attr)),
            "not_in" => pass(!params.contains(&scalar_text(value).as_str()), format!("The selected {} is invalid.", attr)),
            "regex" => {
                let pattern = params.join(",");
                let re = Regex::new(strip_delimiters(&pattern))
                    .map_err(|e| EngineError::configuration(format!("Invalid regex rule for {}: {}", attribute, e)))?;
                pass(value.as_str().map(|s| re.is_match(s)).unwrap_or(false), format!("The {} format is invalid.", attr))
            }
            "confirmed" => pass(
                input.get(&format!("{}_confirmation", attribute)) == Some(value),
                format!("The {} confirmation does not match.", attr),
            ),
            "unique" => {
                let count = self.count_matches(attribute, params, value, true)?;
                pass(count == 0, format!("The {} has already been taken.", attr))
            }
            "exists" => {
                let values = match value {
                    Value::Array(values) => values.clone(),
                    other => vec![other.clone()],
                };
                let mut ok = true;
                for v in &values {
                    if self.count_matches(attribute, params, v, false)? == 0 {
                        ok = false;
                        break;
                    }
                }
                pass(ok, format!("The selected {} is invalid.", attr))
            }
            other => {
                return Err(EngineError::configuration(format!(
                    "Unknown validation rule '{}' on {}",
                    other, attribute
                )))
            }
        })
    }

    /// `unique:table,column,except,idColumn` / `exists:table,column`
    fn count_matches(&self, attribute: &str, params: &[&str], value: &Value, unique: bool) -> Result<u64, EngineError> {
        let store = self.store.ok_or_else(|| {
            EngineError::configuration(format!("Rule on {} needs a record store", attribute))
        })?;
        let table = params
            .first()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| EngineError::configuration(format!("Rule on {} is missing its table", attribute)))?;
        let column = params.get(1).copied().filter(|c| !c.is_empty()).unwrap_or(attribute);

        let mut query = Query::new(*table)?.where_eq(column, value.clone());
        if unique {
            if let Some(except) = params.get(2).filter(|e| !e.is_empty() && !e.eq_ignore_ascii_case("NULL")) {
                let id_column = params.get(3).copied().unwrap_or("id");
                // Integer keys arrive as text after placeholder substitution
                let except_value = except
                    .parse::<i64>()
                    .map(Value::from)
                    .unwrap_or_else(|_| Value::String(except.to_string()));
                query = query.and_where(Condition::ne(id_column, except_value));
            }
        }
        Ok(store.count(&query)?)
    }
}

impl Default for Validator<'_> {
    fn default() -> Self {
        Self::new()
    }
}

fn split_rule(rule: &str) -> (&str, Vec<&str>) {
    match rule.split_once(':') {
        Some((name, params)) if name == "regex" => (name, vec![params]),
        Some((name, params)) => (name, params.split(',').map(str::trim).collect()),
        None => (rule, vec![]),
    }
}

fn numeric_param(rule: &str, params: &[&str], index: usize) -> Result<f64, EngineError> {
    params
        .get(index)
        .and_then(|p| p.parse::<f64>().ok())
        .ok_or_else(|| EngineError::configuration(format!("Rule {} requires a numeric parameter", rule)))
}

fn label(attribute: &str) -> String {
    attribute.replace('_', " ")
}

fn is_filled(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(_) => true,
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn is_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Number(n) => matches!(n.as_i64(), Some(0) | Some(1)),
        Value::String(s) => matches!(s.as_str(), "0" | "1" | "true" | "false"),
        _ => false,
    }
}

fn is_email(s: &str) -> bool {
    EMAIL_PATTERN.as_ref().map(|re| re.is_match(s)).unwrap_or(false)
}

fn is_date(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok() || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// Numeric value for numeric attributes, otherwise length
fn size_of(value: &Value, numeric: bool) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if numeric => s.trim().parse().ok(),
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Array(a) => Some(a.len() as f64),
        _ => None,
    }
}

fn size_message(attr: &str, bound: &str, limit: f64, value: &Value, numeric: bool) -> String {
    match value {
        Value::String(_) if !numeric => format!("The {} must be {} {} characters.", attr, bound, limit),
        Value::Array(_) => format!("The {} must have {} {} items.", attr, bound, limit),
        _ => format!("The {} must be {} {}.", attr, bound, limit),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn strip_delimiters(pattern: &str) -> &str {
    pattern
        .strip_prefix('/')
        .and_then(|p| p.rfind('/').map(|end| &p[..end]))
        .unwrap_or(pattern)
}
