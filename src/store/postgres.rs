//! PostgreSQL-backed store.
//! Executes the SQL rendered by `Query` on an owned runtime so the engine
//! keeps its blocking contract. Must not be called from inside another
//! tokio runtime.

use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use super::{RecordStore, StoreError};
use crate::query::query_where::{is_identifier, QueryWhere};
use crate::query::{Condition, Query, QueryError, PIVOT_COLUMN};
use crate::record::Record;

pub struct PgStore {
    pool: PgPool,
    runtime: Runtime,
}

impl PgStore {
    pub fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let pool = runtime.block_on(
            PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(database_url),
        )?;
        info!("Connected PostgreSQL store (max {} connections)", max_connections);
        Ok(Self { pool, runtime })
    }

    /// Connect using `DATABASE_URL` / `DATABASE_MAX_CONNECTIONS`
    pub fn from_config() -> Result<Self, StoreError> {
        let database = &crate::config::CONFIG.database;
        let url = database
            .url
            .as_deref()
            .ok_or_else(|| StoreError::Backend("DATABASE_URL is not set".to_string()))?;
        Self::connect(url, database.max_connections)
    }

    fn fetch_rows(&self, query: &str, params: &[Value]) -> Result<Vec<PgRow>, StoreError> {
        debug!("SQL: {} {:?}", query, params);
        let mut q = sqlx::query(query);
        for p in params {
            q = bind_param(q, p);
        }
        Ok(self.runtime.block_on(q.fetch_all(&self.pool))?)
    }

    fn execute(&self, query: &str, params: &[Value]) -> Result<u64, StoreError> {
        debug!("SQL: {} {:?}", query, params);
        let mut q = sqlx::query(query);
        for p in params {
            q = bind_param(q, p);
        }
        Ok(self.runtime.block_on(q.execute(&self.pool))?.rows_affected())
    }
}

impl RecordStore for PgStore {
    fn fetch(&self, query: &Query) -> Result<Vec<Record>, StoreError> {
        let sql = query.to_sql()?;
        let rows = self.fetch_rows(&sql.query, &sql.params)?;
        Ok(rows
            .iter()
            .map(|row| {
                let mut map = row_to_map(row);
                let pivot = map.remove(PIVOT_COLUMN);
                let record = Record::from_stored(map);
                match pivot {
                    Some(Value::Object(pivot)) => record.with_pivot(Record::from_stored(pivot)),
                    _ => record,
                }
            })
            .collect())
    }

    fn count(&self, query: &Query) -> Result<u64, StoreError> {
        let sql = query.to_count_sql()?;
        let rows = self.fetch_rows(&sql.query, &sql.params)?;
        let count: i64 = rows.first().map(|r| r.try_get("count")).transpose()?.unwrap_or(0);
        Ok(count.max(0) as u64)
    }

    fn insert(&self, table: &str, primary_key: &str, record: &mut Record) -> Result<(), StoreError> {
        validate_table(table)?;
        let mut fields = record.fields().clone();
        if record.key(primary_key).is_none() {
            fields.remove(primary_key);
        }
        let columns: Vec<&String> = fields.keys().collect();
        for column in &columns {
            if !is_identifier(column) {
                return Err(QueryError::InvalidColumn(column.to_string()).into());
            }
        }

        let query = if columns.is_empty() {
            format!("INSERT INTO \"{}\" DEFAULT VALUES RETURNING *", table)
        } else {
            format!(
                "INSERT INTO \"{}\" ({}) VALUES ({}) RETURNING *",
                table,
                columns.iter().map(|c| format!("\"{}\"", c)).collect::<Vec<_>>().join(", "),
                (1..=columns.len()).map(|i| format!("${}", i)).collect::<Vec<_>>().join(", "),
            )
        };
        let params: Vec<Value> = fields.values().cloned().collect();
        let rows = self.fetch_rows(&query, &params)?;

        if let Some(row) = rows.first() {
            for (key, value) in row_to_map(row) {
                record.set(key, value);
            }
        }
        record.sync_original();
        Ok(())
    }

    fn update(&self, table: &str, conditions: &[Condition], changes: &Map<String, Value>) -> Result<u64, StoreError> {
        validate_table(table)?;
        if changes.is_empty() {
            return Ok(0);
        }
        let mut params = Vec::new();
        let mut assignments = Vec::new();
        for (column, value) in changes {
            if !is_identifier(column) {
                return Err(QueryError::InvalidColumn(column.clone()).into());
            }
            params.push(value.clone());
            assignments.push(format!("\"{}\" = ${}", column, params.len()));
        }
        let (where_sql, where_params) = QueryWhere::generate(conditions, table, params.len())?;
        params.extend(where_params);

        let mut query = format!("UPDATE \"{}\" SET {}", table, assignments.join(", "));
        if !where_sql.is_empty() {
            query.push_str(&format!(" WHERE {}", where_sql));
        }
        self.execute(&query, &params)
    }

    fn delete(&self, table: &str, conditions: &[Condition]) -> Result<u64, StoreError> {
        validate_table(table)?;
        let (where_sql, params) = QueryWhere::generate(conditions, table, 0)?;
        let mut query = format!("DELETE FROM \"{}\"", table);
        if !where_sql.is_empty() {
            query.push_str(&format!(" WHERE {}", where_sql));
        }
        self.execute(&query, &params)
    }
}

fn validate_table(table: &str) -> Result<(), StoreError> {
    if is_identifier(table) {
        Ok(())
    } else {
        Err(QueryError::InvalidTable(table.to_string()).into())
    }
}

fn row_to_map(row: &PgRow) -> Map<String, Value> {
    let mut map = Map::new();
    for i in 0..row.len() {
        let column_name = row.column(i).name();
        let value: Result<Option<Value>, _> = row.try_get(i);

        let json_value = match value {
            Ok(Some(v)) => v,
            Ok(None) => Value::Null,
            Err(_) => {
                // Fall back through the scalar types resources usually store
                if let Ok(Some(s)) = row.try_get::<Option<String>, _>(i) {
                    Value::String(s)
                } else if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(i) {
                    Value::Number(v.into())
                } else if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(i) {
                    Value::Number(v.into())
                } else if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(i) {
                    serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
                } else if let Ok(Some(v)) = row.try_get::<Option<bool>, _>(i) {
                    Value::Bool(v)
                } else if let Ok(Some(v)) = row.try_get::<Option<uuid::Uuid>, _>(i) {
                    Value::String(v.to_string())
                } else if let Ok(Some(v)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i) {
                    Value::String(v.to_rfc3339())
                } else {
                    Value::Null
                }
            }
        };

        map.insert(column_name.to_string(), json_value);
    }
    map
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                // Postgres doesn't have u64
                q.bind(u as i64)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        // IN lists are expanded before binding; remaining arrays are JSON values
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}
