use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

static NULL: Value = Value::Null;

/// Errors that can occur during Record operations
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Invalid JSON format: {0}")]
    InvalidJson(String),
}

/// A dynamic record backing one resource instance, with change tracking.
///
/// Records fetched through a many-to-many relationship carry the join row
/// as their pivot record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// Stored state (None until the record has been persisted)
    original: Option<Map<String, Value>>,
    fields: Map<String, Value>,
    modified_fields: BTreeSet<String>,
    pivot: Option<Box<Record>>,
}

impl Record {
    /// Create a new, not yet persisted, record
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new record from a JSON object
    pub fn from_json(json: Value) -> Result<Self, RecordError> {
        match json {
            Value::Object(map) => Ok(Self {
                fields: map,
                ..Self::default()
            }),
            _ => Err(RecordError::InvalidJson("Expected JSON object".to_string())),
        }
    }

    /// Create a record from stored data
    pub fn from_stored(data: Map<String, Value>) -> Self {
        Self {
            original: Some(data.clone()),
            fields: data,
            modified_fields: BTreeSet::new(),
            pivot: None,
        }
    }

    /// Whether the record came from (or has been written to) the store
    pub fn exists(&self) -> bool {
        self.original.is_some()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Field value, or null when absent
    pub fn value(&self, key: &str) -> &Value {
        self.fields.get(key).unwrap_or(&NULL)
    }

    /// Set field value with automatic change tracking
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let key = key.into();
        if self.original.is_some() {
            self.modified_fields.insert(key.clone());
        }
        self.fields.insert(key, value.into());
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if self.original.is_some() {
            self.modified_fields.insert(key.to_string());
        }
        self.fields.remove(key)
    }

    /// Non-null primary key value
    pub fn key(&self, primary_key: &str) -> Option<&Value> {
        self.get(primary_key).filter(|v| !v.is_null())
    }

    /// Soft-delete timestamp stored in `column`
    pub fn trashed_at(&self, column: &str) -> Option<DateTime<Utc>> {
        self.get(column)
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn is_trashed(&self, column: &str) -> bool {
        matches!(self.get(column), Some(v) if !v.is_null())
    }

    // ========================================
    // Change tracking
    // ========================================

    pub fn changed(&self, key: &str) -> bool {
        match (&self.original, self.fields.get(key)) {
            (Some(original), Some(current)) => original.get(key) != Some(current),
            (Some(original), None) => original.contains_key(key),
            (None, Some(_)) => true,
            (None, None) => false,
        }
    }

    pub fn has_changes(&self) -> bool {
        self.original.is_none() || self.modified_fields.iter().any(|f| self.changed(f))
    }

    pub fn original(&self) -> Option<&Map<String, Value>> {
        self.original.as_ref()
    }

    /// Attributes to write: every field for a new record, only the changed
    /// ones for a stored record.
    pub fn changes(&self) -> Map<String, Value> {
        match &self.original {
            None => self.fields.clone(),
            Some(_) => self
                .modified_fields
                .iter()
                .filter(|f| self.changed(f))
                .map(|f| (f.clone(), self.value(f).clone()))
                .collect(),
        }
    }

    /// Mark the current state as stored
    pub fn sync_original(&mut self) -> &mut Self {
        self.original = Some(self.fields.clone());
        self.modified_fields.clear();
        self
    }

    // ========================================
    // Pivot
    // ========================================

    pub fn pivot(&self) -> Option<&Record> {
        self.pivot.as_deref()
    }

    pub fn pivot_mut(&mut self) -> Option<&mut Record> {
        self.pivot.as_deref_mut()
    }

    pub fn set_pivot(&mut self, pivot: Record) -> &mut Self {
        self.pivot = Some(Box::new(pivot));
        self
    }

    pub fn with_pivot(mut self, pivot: Record) -> Self {
        self.set_pivot(pivot);
        self
    }

    // ========================================
    // Serialization
    // ========================================

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_stored(map)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.to_json()
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Record(id: {}, fields: {}, changed: {})",
            self.value("id"),
            self.fields.len(),
            self.has_changes()
        )
    }
}
