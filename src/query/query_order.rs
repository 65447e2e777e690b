use serde_json::Value;

use super::error::QueryError;
use super::query_where::quote_column;
use super::types::{OrderInfo, SortDirection};

pub struct QueryOrder;

impl QueryOrder {
    /// Accepts `"created_at desc, title"`, `["created_at desc"]` or
    /// `{"created_at": "desc"}`.
    pub fn parse(order: &Value) -> Vec<OrderInfo> {
        match order {
            Value::String(s) => Self::parse_order_string(s),
            Value::Array(arr) => arr
                .iter()
                .filter_map(|v| v.as_str())
                .flat_map(Self::parse_order_string)
                .collect(),
            Value::Object(obj) => obj
                .iter()
                .map(|(k, v)| OrderInfo {
                    column: k.clone(),
                    sort: SortDirection::parse(v.as_str().unwrap_or("asc")),
                })
                .collect(),
            _ => vec![],
        }
    }

    fn parse_order_string(s: &str) -> Vec<OrderInfo> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let mut it = part.split_whitespace();
            if let Some(col) = it.next() {
                let sort = SortDirection::parse(it.next().unwrap_or("asc"));
                out.push(OrderInfo { column: col.to_string(), sort });
            }
        }
        out
    }

    pub fn generate(infos: &[OrderInfo], table: &str) -> Result<String, QueryError> {
        if infos.is_empty() {
            return Ok(String::new());
        }
        let parts = infos
            .iter()
            .map(|i| Ok(format!("{} {}", quote_column(table, &i.column)?, i.sort.to_sql())))
            .collect::<Result<Vec<String>, QueryError>>()?;
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_all_order_shapes() {
        let expected = vec![OrderInfo::desc("created_at"), OrderInfo::asc("title")];
        assert_eq!(QueryOrder::parse(&json!("created_at desc, title")), expected);
        assert_eq!(QueryOrder::parse(&json!(["created_at DESC", "title asc"])), expected);
        assert_eq!(QueryOrder::parse(&json!({"created_at": "desc"})), vec![OrderInfo::desc("created_at")]);
    }

    #[test]
    fn generates_qualified_order_clause() {
        let sql = QueryOrder::generate(&[OrderInfo::desc("id")], "posts").unwrap();
        assert_eq!(sql, "ORDER BY \"posts\".\"id\" DESC");
        assert!(QueryOrder::generate(&[OrderInfo::asc("id desc")], "posts").is_err());
    }
}
