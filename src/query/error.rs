use thiserror::Error;

/// Failures building or rendering a `Query`
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("'{0}' is not a valid table identifier")]
    InvalidTable(String),

    #[error("'{0}' is not a valid column identifier")]
    InvalidColumn(String),

    #[error("Malformed where clause: {0}")]
    MalformedWhere(String),

    #[error("Operator {0} is not supported")]
    UnsupportedOperator(String),

    #[error("Bad operand: {0}")]
    InvalidOperand(String),
}
