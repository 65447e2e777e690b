use serde_json::{Map, Value};

use super::error::QueryError;
use super::types::{Condition, FilterOp, Logic};

/// Renders condition trees to parameterized SQL and parses the JSON
/// where-DSL (`{"views": {"$gte": 10}, "$or": [...]}`) into conditions.
pub struct QueryWhere<'a> {
    table: &'a str,
    param_values: Vec<Value>,
    param_index: usize,
}

impl<'a> QueryWhere<'a> {
    pub fn new(table: &'a str, starting_param_index: usize) -> Self {
        Self {
            table,
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Render `conditions` joined by AND. An empty list renders as an empty
    /// string so callers can omit the WHERE keyword.
    pub fn generate(
        conditions: &[Condition],
        table: &str,
        starting_param_index: usize,
    ) -> Result<(String, Vec<Value>), QueryError> {
        let mut query_where = QueryWhere::new(table, starting_param_index);
        let parts = conditions
            .iter()
            .map(|c| query_where.build(c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((parts.join(" AND "), query_where.param_values))
    }

    fn build(&mut self, condition: &Condition) -> Result<String, QueryError> {
        match condition {
            Condition::Where { column, op, value } => self.build_where(column, *op, value),
            Condition::Group { logic, conditions } => {
                if conditions.is_empty() {
                    // Empty AND is vacuously true, empty OR matches nothing
                    return Ok(match logic {
                        Logic::And => "1=1".to_string(),
                        Logic::Or => "1=0".to_string(),
                    });
                }
                let parts = conditions
                    .iter()
                    .map(|c| self.build(c))
                    .collect::<Result<Vec<_>, _>>()?;
                let joiner = match logic {
                    Logic::And => " AND ",
                    Logic::Or => " OR ",
                };
                Ok(format!("({})", parts.join(joiner)))
            }
            Condition::Not(inner) => Ok(format!("NOT ({})", self.build(inner)?)),
        }
    }

    fn build_where(&mut self, column: &str, op: FilterOp, value: &Value) -> Result<String, QueryError> {
        let quoted_column = quote_column(self.table, column)?;
        match op {
            FilterOp::Eq => {
                if value.is_null() { Ok(format!("{} IS NULL", quoted_column)) }
                else { Ok(format!("{} = {}", quoted_column, self.param(value.clone()))) }
            }
            FilterOp::Ne => {
                if value.is_null() { Ok(format!("{} IS NOT NULL", quoted_column)) }
                else { Ok(format!("{} <> {}", quoted_column, self.param(value.clone()))) }
            }
            FilterOp::Gt => Ok(format!("{} > {}", quoted_column, self.param(value.clone()))),
            FilterOp::Gte => Ok(format!("{} >= {}", quoted_column, self.param(value.clone()))),
            FilterOp::Lt => Ok(format!("{} < {}", quoted_column, self.param(value.clone()))),
            FilterOp::Lte => Ok(format!("{} <= {}", quoted_column, self.param(value.clone()))),
            FilterOp::Like => Ok(format!("{} LIKE {}", quoted_column, self.param(value.clone()))),
            FilterOp::ILike => Ok(format!("{}::text ILIKE {}", quoted_column, self.param(value.clone()))),
            FilterOp::In | FilterOp::NIn => {
                let negated = op == FilterOp::NIn;
                let values = match value {
                    Value::Array(values) => values.clone(),
                    other => vec![other.clone()],
                };
                if values.is_empty() {
                    return Ok(if negated { "1=1" } else { "1=0" }.to_string());
                }
                let params: Vec<String> = values.into_iter().map(|v| self.param(v)).collect();
                let keyword = if negated { "NOT IN" } else { "IN" };
                Ok(format!("{} {} ({})", quoted_column, keyword, params.join(", ")))
            }
            FilterOp::Between => match value {
                Value::Array(values) if values.len() == 2 => Ok(format!(
                    "{} BETWEEN {} AND {}",
                    quoted_column,
                    self.param(values[0].clone()),
                    self.param(values[1].clone())
                )),
                _ => Err(QueryError::InvalidOperand(
                    "$between requires array with 2 values".to_string(),
                )),
            },
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

/// Parse the JSON where-DSL into a list of conditions (implicitly AND-ed).
pub fn parse_where(where_data: &Value) -> Result<Vec<Condition>, QueryError> {
    match where_data {
        Value::Null => Ok(vec![]),
        Value::Object(obj) => parse_object(obj),
        _ => Err(QueryError::MalformedWhere("expected an object".to_string())),
    }
}

fn parse_object(obj: &Map<String, Value>) -> Result<Vec<Condition>, QueryError> {
    let mut conditions = Vec::new();
    for (key, value) in obj {
        if key.starts_with('$') {
            conditions.push(parse_logical_operator(key, value)?);
        } else {
            conditions.extend(parse_field_condition(key, value)?);
        }
    }
    Ok(conditions)
}

fn parse_logical_operator(op: &str, value: &Value) -> Result<Condition, QueryError> {
    match op {
        "$and" | "$or" => {
            let arr = value
                .as_array()
                .ok_or_else(|| QueryError::InvalidOperand(format!("{} requires array", op)))?;
            let mut conditions = Vec::new();
            for v in arr {
                conditions.push(Condition::all(parse_where(v)?));
            }
            let logic = if op == "$and" { Logic::And } else { Logic::Or };
            Ok(Condition::Group { logic, conditions })
        }
        "$not" => Ok(Condition::all(parse_where(value)?).negate()),
        _ => Err(QueryError::UnsupportedOperator(op.to_string())),
    }
}

fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<Condition>, QueryError> {
    validate_column(field)?;
    match value {
        Value::Object(obj) => obj
            .iter()
            .map(|(op_key, op_val)| {
                let op = FilterOp::from_key(op_key)
                    .ok_or_else(|| QueryError::UnsupportedOperator(op_key.clone()))?;
                Ok(Condition::new(field, op, op_val.clone()))
            })
            .collect(),
        // Implicit equality: { field: value }
        other => Ok(vec![Condition::eq(field, other.clone())]),
    }
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Accepts `column` or `table.column`
pub fn validate_column(column: &str) -> Result<(), QueryError> {
    let valid = match column.split_once('.') {
        Some((table, col)) => is_identifier(table) && is_identifier(col),
        None => is_identifier(column),
    };
    if valid {
        Ok(())
    } else {
        Err(QueryError::InvalidColumn(column.to_string()))
    }
}

pub fn quote_column(table: &str, column: &str) -> Result<String, QueryError> {
    validate_column(column)?;
    Ok(match column.split_once('.') {
        Some((t, c)) => format!("\"{}\".\"{}\"", t, c),
        None => format!("\"{}\".\"{}\"", table, column),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_null_equality_as_is_null() {
        let (sql, params) =
            QueryWhere::generate(&[Condition::eq("deleted_at", Value::Null)], "posts", 0).unwrap();
        assert_eq!(sql, "\"posts\".\"deleted_at\" IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn numbers_params_from_offset() {
        let conditions = vec![
            Condition::eq("status", "draft"),
            Condition::any(vec![
                Condition::ilike("title", "%rust%"),
                Condition::new("views", FilterOp::Gte, 10),
            ]),
        ];
        let (sql, params) = QueryWhere::generate(&conditions, "posts", 2).unwrap();
        assert_eq!(
            sql,
            "\"posts\".\"status\" = $3 AND (\"posts\".\"title\"::text ILIKE $4 OR \"posts\".\"views\" >= $5)"
        );
        assert_eq!(params, vec![json!("draft"), json!("%rust%"), json!(10)]);
    }

    #[test]
    fn empty_in_matches_nothing() {
        let (sql, _) = QueryWhere::generate(&[Condition::in_list("id", vec![])], "posts", 0).unwrap();
        assert_eq!(sql, "1=0");
    }

    #[test]
    fn parses_where_dsl() {
        let conditions = parse_where(&json!({
            "status": "published",
            "views": {"$gte": 3},
            "$or": [{"author_id": 1}, {"author_id": 2}]
        }))
        .unwrap();
        assert_eq!(conditions.len(), 3);
        assert!(conditions.contains(&Condition::eq("status", "published")));
        assert!(conditions.contains(&Condition::new("views", FilterOp::Gte, 3)));
    }

    #[test]
    fn rejects_unknown_operators_and_bad_columns() {
        assert!(matches!(
            parse_where(&json!({"views": {"$near": 3}})),
            Err(QueryError::UnsupportedOperator(_))
        ));
        assert!(matches!(
            parse_where(&json!({"views; drop": 1})),
            Err(QueryError::InvalidColumn(_))
        ));
    }
}
