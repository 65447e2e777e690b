// Engine error taxonomy
use serde_json::{json, Value};
use thiserror::Error;

use crate::query::QueryError;
use crate::store::StoreError;
use crate::validation::ValidationErrors;

/// Errors raised while resolving a request.
///
/// Forbidden, NotFound, Conflict and Configuration abort the request at the
/// point of detection. Validation carries every collected violation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("The given data was invalid.")]
    Validation(ValidationErrors),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        EngineError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        EngineError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        EngineError::Conflict(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        EngineError::Configuration(message.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::Forbidden(_) => 403,
            EngineError::NotFound(_) => 404,
            EngineError::Conflict(_) => 409,
            EngineError::Validation(_) => 422,
            EngineError::Configuration(_) | EngineError::Query(_) | EngineError::Store(_) => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::Forbidden(_) => "FORBIDDEN",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::Conflict(_) => "CONFLICT",
            EngineError::Configuration(_) => "CONFIGURATION_ERROR",
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::Query(_) => "QUERY_ERROR",
            EngineError::Store(_) => "STORE_ERROR",
        }
    }

    /// Validation failures are recovered into a payload; everything else aborts.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::Validation(_))
    }

    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            EngineError::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            EngineError::Validation(errors) => json!({
                "error": true,
                "message": self.to_string(),
                "code": self.error_code(),
                "field_errors": errors,
            }),
            EngineError::Query(_) | EngineError::Store(_) => {
                // Don't expose backend details to clients
                tracing::error!("Engine backend error: {}", self);
                json!({
                    "error": true,
                    "message": "An error occurred while processing your request",
                    "code": self.error_code(),
                })
            }
            _ => json!({
                "error": true,
                "message": self.to_string(),
                "code": self.error_code(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(EngineError::forbidden("nope").status_code(), 403);
        assert_eq!(EngineError::not_found("gone").status_code(), 404);
        assert_eq!(EngineError::conflict("stale").status_code(), 409);
        assert_eq!(EngineError::configuration("bug").status_code(), 500);
    }

    #[test]
    fn validation_payload_lists_field_errors() {
        let mut errors = ValidationErrors::default();
        errors.add("title", "The title field is required.");
        let err = EngineError::Validation(errors);

        assert!(err.is_recoverable());
        let body = err.to_json();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["field_errors"]["title"][0], "The title field is required.");
    }
}
