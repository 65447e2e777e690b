use serde_json::Value;

use super::error::QueryError;
use super::query_order::QueryOrder;
use super::query_where::{is_identifier, quote_column, validate_column, QueryWhere};
use super::types::{Condition, OrderInfo, PivotJoin, SortDirection, SqlResult, TrashedScope, TrashedStatus};

/// Column the joined pivot row is projected into
pub const PIVOT_COLUMN: &str = "__pivot";

/// The store-native query object: one table, optional pivot join, where
/// conditions, bypassable global scopes, soft-delete state, ordering and
/// paging. Rendered to PostgreSQL by `to_sql` or evaluated in process by
/// the memory store.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    primary_key: String,
    conditions: Vec<Condition>,
    scopes: Vec<(String, Condition)>,
    apply_scopes: bool,
    trashed: Option<TrashedScope>,
    pivot: Option<PivotJoin>,
    order: Vec<OrderInfo>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Query {
    pub fn new(table: impl Into<String>) -> Result<Self, QueryError> {
        let table = table.into();
        if !is_identifier(&table) {
            return Err(QueryError::InvalidTable(table.to_string()));
        }
        Ok(Self {
            table,
            primary_key: "id".to_string(),
            conditions: vec![],
            scopes: vec![],
            apply_scopes: true,
            trashed: None,
            pivot: None,
            order: vec![],
            limit: None,
            offset: None,
        })
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Result<Self, QueryError> {
        let primary_key = primary_key.into();
        if !is_identifier(&primary_key) {
            return Err(QueryError::InvalidColumn(primary_key.to_string()));
        }
        self.primary_key = primary_key;
        Ok(self)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    // ========================================
    // Conditions
    // ========================================

    pub fn and_where(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn where_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and_where(Condition::eq(column, value))
    }

    /// Restrict to the given primary keys
    pub fn where_keys(self, keys: Vec<Value>) -> Self {
        let column = self.primary_key.clone();
        self.and_where(Condition::in_list(column, keys))
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Register a named default scope, applied unless scopes are bypassed
    pub fn with_global_scope(mut self, name: impl Into<String>, condition: Condition) -> Self {
        self.scopes.push((name.into(), condition));
        self
    }

    pub fn without_global_scopes(mut self) -> Self {
        self.apply_scopes = false;
        self
    }

    pub fn applies_global_scopes(&self) -> bool {
        self.apply_scopes
    }

    pub fn global_scopes(&self) -> impl Iterator<Item = &str> {
        self.scopes.iter().map(|(name, _)| name.as_str())
    }

    // ========================================
    // Soft deletes
    // ========================================

    /// Mark the table as soft-deleting through `column`; trashed rows are
    /// excluded until `with_trashed` says otherwise.
    pub fn soft_deletes(mut self, column: impl Into<String>) -> Self {
        self.trashed = Some(TrashedScope {
            column: column.into(),
            status: TrashedStatus::Default,
        });
        self
    }

    /// No-op on tables without soft deletes
    pub fn with_trashed(mut self, status: TrashedStatus) -> Self {
        if let Some(scope) = self.trashed.as_mut() {
            scope.status = status;
        }
        self
    }

    pub fn trashed(&self) -> Option<&TrashedScope> {
        self.trashed.as_ref()
    }

    // ========================================
    // Pivot join
    // ========================================

    pub fn join_pivot(mut self, join: PivotJoin) -> Self {
        self.pivot = Some(join);
        self
    }

    pub fn pivot(&self) -> Option<&PivotJoin> {
        self.pivot.as_ref()
    }

    // ========================================
    // Ordering and paging
    // ========================================

    pub fn order_by(mut self, column: impl Into<String>, sort: SortDirection) -> Self {
        self.order.push(OrderInfo { column: column.into(), sort });
        self
    }

    pub fn clear_order(mut self) -> Self {
        self.order.clear();
        self
    }

    pub fn orders(&self) -> &[OrderInfo] {
        &self.order
    }

    pub fn limit(mut self, limit: u64, offset: Option<u64>) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    pub fn without_limit(mut self) -> Self {
        self.limit = None;
        self.offset = None;
        self
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    // ========================================
    // Evaluation
    // ========================================

    /// Explicit conditions, then active global scopes, then the soft-delete
    /// predicate. The pivot parent constraint is not included.
    pub fn effective_conditions(&self) -> Vec<Condition> {
        let mut conditions = self.conditions.clone();
        if self.apply_scopes {
            conditions.extend(self.scopes.iter().map(|(_, c)| c.clone()));
        }
        if let Some(scope) = &self.trashed {
            match scope.status {
                TrashedStatus::Default => conditions.push(Condition::eq(scope.column.clone(), Value::Null)),
                TrashedStatus::Only => conditions.push(Condition::ne(scope.column.clone(), Value::Null)),
                TrashedStatus::With => {}
            }
        }
        conditions
    }

    /// Check every identifier the query will render
    pub fn validate(&self) -> Result<(), QueryError> {
        if let Some(scope) = &self.trashed {
            validate_column(&scope.column)?;
        }
        if let Some(join) = &self.pivot {
            if !is_identifier(&join.table) {
                return Err(QueryError::InvalidTable(join.table.clone()));
            }
            validate_column(&join.related_key)?;
            validate_column(&join.parent_key)?;
        }
        for info in &self.order {
            validate_column(&info.column)?;
        }
        QueryWhere::generate(&self.effective_conditions(), &self.table, 0).map(|_| ())
    }

    pub fn to_sql(&self) -> Result<SqlResult, QueryError> {
        let (from_clause, where_clause, params) = self.build_from_where()?;
        let order_clause = QueryOrder::generate(&self.order, &self.table)?;
        let limit_clause = match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            _ => String::new(),
        };

        let select_clause = match &self.pivot {
            Some(join) => format!("\"{}\".*, to_jsonb(\"{}\".*) AS \"{}\"", self.table, join.table, PIVOT_COLUMN),
            None => format!("\"{}\".*", self.table),
        };

        let query = [
            format!("SELECT {}", select_clause),
            from_clause,
            where_clause,
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, QueryError> {
        let (from_clause, where_clause, params) = self.build_from_where()?;
        let query = ["SELECT COUNT(*) as count".to_string(), from_clause, where_clause]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(SqlResult { query, params })
    }

    fn build_from_where(&self) -> Result<(String, String, Vec<Value>), QueryError> {
        let mut from_clause = format!("FROM \"{}\"", self.table);
        let mut conditions = self.effective_conditions();

        if let Some(join) = &self.pivot {
            if !is_identifier(&join.table) {
                return Err(QueryError::InvalidTable(join.table.clone()));
            }
            from_clause.push_str(&format!(
                " INNER JOIN \"{}\" ON {} = {}",
                join.table,
                quote_column(&join.table, &join.related_key)?,
                quote_column(&self.table, &self.primary_key)?,
            ));
            conditions.insert(
                0,
                Condition::eq(format!("{}.{}", join.table, join.parent_key), join.parent_value.clone()),
            );
        }

        let (where_sql, params) = QueryWhere::generate(&conditions, &self.table, 0)?;
        let where_clause = if where_sql.is_empty() { String::new() } else { format!("WHERE {}", where_sql) };
        Ok((from_clause, where_clause, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_invalid_table_names() {
        assert!(Query::new("posts").is_ok());
        assert!(Query::new("posts; drop table").is_err());
        assert!(Query::new("").is_err());
    }

    #[test]
    fn renders_soft_deletes_scopes_and_order() {
        let query = Query::new("posts")
            .unwrap()
            .soft_deletes("deleted_at")
            .with_global_scope("published", Condition::eq("status", "published"))
            .order_by("id", SortDirection::Desc)
            .limit(25, Some(50));

        let sql = query.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT \"posts\".* FROM \"posts\" WHERE \"posts\".\"status\" = $1 AND \"posts\".\"deleted_at\" IS NULL ORDER BY \"posts\".\"id\" DESC LIMIT 25 OFFSET 50"
        );
        assert_eq!(sql.params, vec![json!("published")]);
    }

    #[test]
    fn bypassing_scopes_keeps_explicit_conditions() {
        let query = Query::new("posts")
            .unwrap()
            .with_global_scope("published", Condition::eq("status", "published"))
            .where_eq("author_id", 7)
            .without_global_scopes();
        assert_eq!(query.effective_conditions(), vec![Condition::eq("author_id", 7)]);
    }

    #[test]
    fn trashed_status_switches_predicate() {
        let base = Query::new("posts").unwrap().soft_deletes("deleted_at");
        assert_eq!(
            base.clone().with_trashed(TrashedStatus::Only).effective_conditions(),
            vec![Condition::ne("deleted_at", Value::Null)]
        );
        assert!(base.with_trashed(TrashedStatus::With).effective_conditions().is_empty());
    }

    #[test]
    fn renders_pivot_join() {
        let query = Query::new("roles").unwrap().join_pivot(PivotJoin {
            table: "role_user".into(),
            related_key: "role_id".into(),
            parent_key: "user_id".into(),
            parent_value: json!(3),
        });
        let sql = query.to_count_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT COUNT(*) as count FROM \"roles\" INNER JOIN \"role_user\" ON \"role_user\".\"role_id\" = \"roles\".\"id\" WHERE \"role_user\".\"user_id\" = $1"
        );
        assert_eq!(sql.params, vec![json!(3)]);
    }
}
