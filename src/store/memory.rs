use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tracing::debug;

use super::{RecordStore, SearchIndex, StoreError};
use crate::query::evaluate::{compare_rows, matches_all, RowView};
use crate::query::{Condition, Query};
use crate::record::Record;

type Row = Map<String, Value>;

/// In-process store evaluating queries against JSON rows
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<BTreeMap<String, Vec<Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `table` (if needed) and append `rows` as-is
    pub fn seed(&self, table: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        tables.entry(table.to_string()).or_default().extend(rows);
        Ok(())
    }

    /// Load `{"table": [{...}, ...], ...}` fixture data
    pub fn seed_json(&self, data: &Value) -> Result<(), StoreError> {
        let tables = data
            .as_object()
            .ok_or_else(|| StoreError::Backend("fixture data must be an object of tables".to_string()))?;
        for (table, rows) in tables {
            let rows = rows
                .as_array()
                .ok_or_else(|| StoreError::Backend(format!("fixture table {} must be an array", table)))?
                .iter()
                .filter_map(|row| row.as_object().cloned())
                .collect();
            self.seed(table, rows)?;
        }
        Ok(())
    }

    pub fn tables(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.read()?.keys().cloned().collect())
    }

    /// Raw rows of `table`, unfiltered
    pub fn rows(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        self.read()?
            .get(table)
            .cloned()
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<String, Vec<Row>>>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<String, Vec<Row>>>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    /// Matching rows (with their pivot rows) before ordering and paging
    fn select(&self, query: &Query) -> Result<Vec<(Row, Option<Row>)>, StoreError> {
        query.validate()?;
        let tables = self.read()?;
        let rows = tables
            .get(query.table())
            .ok_or_else(|| StoreError::UnknownTable(query.table().to_string()))?;
        let conditions = query.effective_conditions();

        let mut selected = Vec::new();
        match query.pivot() {
            None => {
                for row in rows {
                    if matches_all(&conditions, &RowView::new(query.table(), row)) {
                        selected.push((row.clone(), None));
                    }
                }
            }
            Some(join) => {
                let pivot_rows = tables
                    .get(&join.table)
                    .ok_or_else(|| StoreError::UnknownTable(join.table.clone()))?;
                let parent = Condition::eq(join.parent_key.clone(), join.parent_value.clone());
                for pivot in pivot_rows {
                    if !matches_all(std::slice::from_ref(&parent), &RowView::new(&join.table, pivot)) {
                        continue;
                    }
                    let related = Condition::eq(query.primary_key().to_string(), pivot.get(&join.related_key).cloned().unwrap_or(Value::Null));
                    for row in rows {
                        let view = RowView::new(query.table(), row).with_pivot(&join.table, pivot);
                        if matches_all(std::slice::from_ref(&related), &view) && matches_all(&conditions, &view) {
                            selected.push((row.clone(), Some(pivot.clone())));
                        }
                    }
                }
            }
        }
        Ok(selected)
    }

    fn next_key(rows: &[Row], primary_key: &str) -> Value {
        let max = rows
            .iter()
            .filter_map(|r| r.get(primary_key).and_then(Value::as_i64))
            .max()
            .unwrap_or(0);
        Value::from(max + 1)
    }
}

impl RecordStore for MemoryStore {
    fn fetch(&self, query: &Query) -> Result<Vec<Record>, StoreError> {
        let mut selected = self.select(query)?;
        if !query.orders().is_empty() {
            let pivot_table = query.pivot().map(|j| j.table.as_str()).unwrap_or("");
            selected.sort_by(|(a, pa), (b, pb)| {
                let mut va = RowView::new(query.table(), a);
                let mut vb = RowView::new(query.table(), b);
                if let Some(p) = pa {
                    va = va.with_pivot(pivot_table, p);
                }
                if let Some(p) = pb {
                    vb = vb.with_pivot(pivot_table, p);
                }
                compare_rows(&va, &vb, query.orders())
            });
        }

        let offset = query.offset_value().unwrap_or(0) as usize;
        let limit = query.limit_value().map(|l| l as usize).unwrap_or(usize::MAX);
        debug!(
            "Memory fetch from {}: {} matching rows (offset {}, limit {:?})",
            query.table(),
            selected.len(),
            offset,
            query.limit_value()
        );

        Ok(selected
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(row, pivot)| {
                let record = Record::from_stored(row);
                match pivot {
                    Some(pivot) => record.with_pivot(Record::from_stored(pivot)),
                    None => record,
                }
            })
            .collect())
    }

    fn count(&self, query: &Query) -> Result<u64, StoreError> {
        Ok(self.select(query)?.len() as u64)
    }

    fn insert(&self, table: &str, primary_key: &str, record: &mut Record) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let rows = tables.entry(table.to_string()).or_default();
        if record.key(primary_key).is_none() {
            record.set(primary_key, Self::next_key(rows, primary_key));
        }
        rows.push(record.fields().clone());
        record.sync_original();
        Ok(())
    }

    fn update(&self, table: &str, conditions: &[Condition], changes: &Map<String, Value>) -> Result<u64, StoreError> {
        let mut tables = self.write()?;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        let mut touched = 0;
        for row in rows.iter_mut() {
            if matches_all(conditions, &RowView::new(table, row)) {
                for (key, value) in changes {
                    row.insert(key.clone(), value.clone());
                }
                touched += 1;
            }
        }
        Ok(touched)
    }

    fn delete(&self, table: &str, conditions: &[Condition]) -> Result<u64, StoreError> {
        let mut tables = self.write()?;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        let before = rows.len();
        rows.retain(|row| !matches_all(conditions, &RowView::new(table, row)));
        Ok((before - rows.len()) as u64)
    }
}

/// Substring index over per-resource documents
#[derive(Debug, Default)]
pub struct MemorySearchIndex {
    documents: HashMap<String, Vec<(Value, String)>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(mut self, resource: &str, key: impl Into<Value>, text: impl Into<String>) -> Self {
        self.documents
            .entry(resource.to_string())
            .or_default()
            .push((key.into(), text.into().to_lowercase()));
        self
    }
}

impl SearchIndex for MemorySearchIndex {
    fn search(&self, resource: &str, term: &str) -> Result<Vec<Value>, StoreError> {
        let term = term.to_lowercase();
        Ok(self
            .documents
            .get(resource)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, text)| text.contains(&term))
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{PivotJoin, SortDirection};
    use serde_json::json;

    fn rows(value: Value) -> Vec<Row> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .seed_json(&json!({
                "roles": [{"id": 1, "name": "admin"}, {"id": 2, "name": "editor"}, {"id": 3, "name": "viewer"}],
                "role_user": [
                    {"user_id": 7, "role_id": 3, "notes": "b"},
                    {"user_id": 7, "role_id": 1, "notes": "a"},
                    {"user_id": 8, "role_id": 2, "notes": "c"}
                ]
            }))
            .unwrap();
        store
    }

    #[test]
    fn fetch_orders_and_pages() {
        let store = store();
        let query = Query::new("roles").unwrap().order_by("id", SortDirection::Desc).limit(2, Some(1));
        let records = store.fetch(&query).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.value("id").clone()).collect();
        assert_eq!(ids, vec![json!(2), json!(1)]);
        assert_eq!(store.count(&query).unwrap(), 3);
    }

    #[test]
    fn fetch_through_pivot_attaches_join_row() {
        let store = store();
        let query = Query::new("roles").unwrap().join_pivot(PivotJoin {
            table: "role_user".into(),
            related_key: "role_id".into(),
            parent_key: "user_id".into(),
            parent_value: json!(7),
        });
        let records = store.fetch(&query.order_by("role_user.notes", SortDirection::Asc)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].value("name"), &json!("admin"));
        assert_eq!(records[0].pivot().unwrap().value("notes"), &json!("a"));
    }

    #[test]
    fn insert_assigns_next_key_and_marks_stored() {
        let store = store();
        let mut record = Record::from_json(json!({"name": "auditor"})).unwrap();
        store.insert("roles", "id", &mut record).unwrap();
        assert_eq!(record.value("id"), &json!(4));
        assert!(record.exists());
        assert_eq!(store.rows("roles").unwrap().len(), 4);
    }

    #[test]
    fn update_and_delete_match_conditions() {
        let store = store();
        let mut changes = Map::new();
        changes.insert("notes".into(), json!("z"));
        let touched = store
            .update("role_user", &[Condition::eq("user_id", 7)], &changes)
            .unwrap();
        assert_eq!(touched, 2);
        assert_eq!(store.delete("role_user", &[Condition::eq("notes", "z")]).unwrap(), 2);
        assert_eq!(store.rows("role_user").unwrap(), rows(json!([{"user_id": 8, "role_id": 2, "notes": "c"}])));
    }

    #[test]
    fn unknown_table_is_an_error() {
        let store = MemoryStore::new();
        let query = Query::new("ghosts").unwrap();
        assert!(matches!(store.fetch(&query), Err(StoreError::UnknownTable(_))));
    }

    #[test]
    fn search_index_matches_substrings() {
        let index = MemorySearchIndex::new()
            .index("posts", 1, "Hello Rust")
            .index("posts", 2, "Goodbye");
        assert_eq!(index.search("posts", "rust").unwrap(), vec![json!(1)]);
        assert!(index.search("users", "rust").unwrap().is_empty());
    }
}
