pub mod assembler;
pub mod validator;

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::EngineError;

pub use assembler::RuleAssembler;
pub use validator::Validator;

/// Replaced with the key of the record being edited (or `NULL` on create)
pub const RESOURCE_ID_PLACEHOLDER: &str = "{{resourceId}}";

/// Custom rule check: `(attribute, value, input) -> Err(message)` on failure
pub type RuleCheck = Arc<dyn Fn(&str, &Value, &Map<String, Value>) -> Result<(), String> + Send + Sync>;

#[derive(Clone)]
pub enum Rule {
    /// String-form rule such as `required`, `max:255` or `unique:posts,slug`
    Named(String),
    Custom { name: String, check: RuleCheck },
}

impl Rule {
    pub fn named(rule: impl Into<String>) -> Self {
        Rule::Named(rule.into())
    }

    pub fn custom<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&str, &Value, &Map<String, Value>) -> Result<(), String> + Send + Sync + 'static,
    {
        Rule::Custom { name: name.into(), check: Arc::new(check) }
    }

    /// Split a pipe-delimited rule string (`required|string|max:255`)
    pub fn parse_list(rules: &str) -> Vec<Rule> {
        rules
            .split('|')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(Rule::named)
            .collect()
    }

    pub fn name(&self) -> &str {
        match self {
            Rule::Named(rule) => rule.split(':').next().unwrap_or(rule),
            Rule::Custom { name, .. } => name,
        }
    }

    /// Rule text as declared
    pub fn as_str(&self) -> &str {
        match self {
            Rule::Named(rule) => rule,
            Rule::Custom { name, .. } => name,
        }
    }

    pub fn substitute(&self, placeholder: &str, replacement: &str) -> Rule {
        match self {
            Rule::Named(rule) if rule.contains(placeholder) => Rule::Named(rule.replace(placeholder, replacement)),
            other => other.clone(),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Named(rule) => write!(f, "{:?}", rule),
            Rule::Custom { name, .. } => write!(f, "custom({:?})", name),
        }
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Rule::Named(a), Rule::Named(b)) => a == b,
            (Rule::Custom { name: a, check: ca }, Rule::Custom { name: b, check: cb }) => {
                a == b && Arc::ptr_eq(ca, cb)
            }
            _ => false,
        }
    }
}

impl From<&str> for Rule {
    fn from(rule: &str) -> Self {
        Rule::named(rule)
    }
}

/// Attribute key to rule list
pub type RuleSet = BTreeMap<String, Vec<Rule>>;

/// Render a rule set as `{attribute: ["required", "max:255"]}`
pub fn rules_to_json(rules: &RuleSet) -> Value {
    Value::Object(
        rules
            .iter()
            .map(|(attr, list)| {
                (attr.clone(), Value::Array(list.iter().map(|r| Value::String(r.as_str().to_string())).collect()))
            })
            .collect(),
    )
}

/// Every violation found, keyed by attribute
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.0.entry(attribute.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn has(&self, attribute: &str) -> bool {
        self.0.contains_key(attribute)
    }

    pub fn get(&self, attribute: &str) -> Option<&[String]> {
        self.0.get(attribute).map(Vec::as_slice)
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (attribute, messages) in other.0 {
            self.0.entry(attribute).or_default().extend(messages);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// Ok when empty, otherwise a validation error carrying every message
    pub fn into_result(self) -> Result<(), EngineError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.values().flatten().map(String::as_str).collect();
        f.write_str(&messages.join(" "))
    }
}
