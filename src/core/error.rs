//! Typed error handling for the CRUD engine
//!
//! Every compiler and repository operation returns [`CrudError`]. The
//! variants map one-to-one onto the failure modes a caller can act on:
//!
//! - malformed queries (`InvalidFilter`, `InvalidFilterValueType`,
//!   `InvalidFilterValueSize`, `UnsupportedOperator`, `InvalidOrder`,
//!   `InvalidField`)
//! - lookups that matched nothing (`NotFound`)
//! - identity contract violations (`NotNewRecord`, `IdentityMismatch`,
//!   `MissingIdentity`, `StoreFailed`)
//! - passthrough of the store's own failures (`Store`)
//!
//! Cache failures never appear here: the repository swallows them.
//!
//! # Example
//!
//! ```rust,ignore
//! match repository.get(42).await {
//!     Ok(user) => println!("found {:?}", user),
//!     Err(CrudError::NotFound { .. }) => println!("no such user"),
//!     Err(e) => eprintln!("{} ({})", e, e.error_code()),
//! }
//! ```

use crate::core::entity::Id;
use crate::core::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

/// The error type returned by the query compiler and the repository
#[derive(Debug)]
pub enum CrudError {
    /// Filter is missing its field or operator, has a null value, or names
    /// something that is not a plain column identifier
    InvalidFilter { field: String, message: String },

    /// Filter value has the wrong JSON shape for its operator
    InvalidFilterValueType {
        field: String,
        operator: String,
        expected: &'static str,
    },

    /// Filter value list has the wrong number of elements
    InvalidFilterValueSize {
        field: String,
        operator: String,
        expected: usize,
        actual: usize,
    },

    /// Operator is not one of the supported set
    UnsupportedOperator { operator: String },

    /// Sort clause could not be parsed or names a column that is not sortable
    InvalidOrder { order: String, message: String },

    /// Partial update names a field that cannot be written
    InvalidField { field: String, message: String },

    /// No row matched
    NotFound { entity_type: String, id: Option<Id> },

    /// Create was attempted on an entity that already carries an identity
    NotNewRecord { entity_type: String, id: Id },

    /// Update payload identity differs from the addressed identity
    IdentityMismatch {
        entity_type: String,
        expected: Id,
        actual: Id,
    },

    /// Operation requires a persisted entity but got identity zero
    MissingIdentity {
        entity_type: String,
        operation: &'static str,
    },

    /// Store accepted a write but its post-condition did not hold
    StoreFailed {
        entity_type: String,
        operation: &'static str,
        message: String,
    },

    /// Error raised by the underlying store, unchanged
    Store(StoreError),
}

impl fmt::Display for CrudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrudError::InvalidFilter { field, message } => {
                write!(f, "Invalid filter on '{}': {}", field, message)
            }
            CrudError::InvalidFilterValueType {
                field,
                operator,
                expected,
            } => {
                write!(
                    f,
                    "Invalid value type for '{}' {}: expected {}",
                    field, operator, expected
                )
            }
            CrudError::InvalidFilterValueSize {
                field,
                operator,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Invalid value size for '{}' {}: expected {} elements, got {}",
                    field, operator, expected, actual
                )
            }
            CrudError::UnsupportedOperator { operator } => {
                write!(f, "Unsupported filter operator: '{}'", operator)
            }
            CrudError::InvalidOrder { order, message } => {
                write!(f, "Invalid order clause '{}': {}", order, message)
            }
            CrudError::InvalidField { field, message } => {
                write!(f, "Invalid field '{}': {}", field, message)
            }
            CrudError::NotFound {
                entity_type,
                id: Some(id),
            } => {
                write!(f, "{} with id '{}' not found", entity_type, id)
            }
            CrudError::NotFound {
                entity_type,
                id: None,
            } => {
                write!(f, "No {} matched the filter", entity_type)
            }
            CrudError::NotNewRecord { entity_type, id } => {
                write!(
                    f,
                    "Cannot create {}: record already has id '{}'",
                    entity_type, id
                )
            }
            CrudError::IdentityMismatch {
                entity_type,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Cannot update {} '{}': payload carries id '{}'",
                    entity_type, expected, actual
                )
            }
            CrudError::MissingIdentity {
                entity_type,
                operation,
            } => {
                write!(f, "Cannot {} {}: identity is not set", operation, entity_type)
            }
            CrudError::StoreFailed {
                entity_type,
                operation,
                message,
            } => {
                write!(f, "Failed to {} {}: {}", operation, entity_type, message)
            }
            CrudError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CrudError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CrudError::Store(e) => Some(e),
            _ => None,
        }
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CrudError {
    /// HTTP status the transport layer should answer with
    pub fn status_code(&self) -> StatusCode {
        match self {
            CrudError::InvalidFilter { .. }
            | CrudError::InvalidFilterValueType { .. }
            | CrudError::InvalidFilterValueSize { .. }
            | CrudError::UnsupportedOperator { .. }
            | CrudError::InvalidOrder { .. }
            | CrudError::InvalidField { .. }
            | CrudError::IdentityMismatch { .. }
            | CrudError::MissingIdentity { .. } => StatusCode::BAD_REQUEST,
            CrudError::NotFound { .. } => StatusCode::NOT_FOUND,
            CrudError::NotNewRecord { .. } => StatusCode::CONFLICT,
            CrudError::StoreFailed { .. } | CrudError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            CrudError::InvalidFilter { .. } => "INVALID_FILTER",
            CrudError::InvalidFilterValueType { .. } => "INVALID_FILTER_VALUE_TYPE",
            CrudError::InvalidFilterValueSize { .. } => "INVALID_FILTER_VALUE_SIZE",
            CrudError::UnsupportedOperator { .. } => "UNSUPPORTED_OPERATOR",
            CrudError::InvalidOrder { .. } => "INVALID_ORDER",
            CrudError::InvalidField { .. } => "INVALID_FIELD",
            CrudError::NotFound { .. } => "NOT_FOUND",
            CrudError::NotNewRecord { .. } => "NOT_NEW_RECORD",
            CrudError::IdentityMismatch { .. } => "IDENTITY_MISMATCH",
            CrudError::MissingIdentity { .. } => "MISSING_IDENTITY",
            CrudError::StoreFailed { .. } => "STORE_FAILED",
            CrudError::Store(_) => "STORE_ERROR",
        }
    }

    /// Whether the caller sent a malformed query or payload
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CrudError::NotFound { .. })
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            CrudError::NotFound {
                entity_type,
                id: Some(id),
            } => Some(serde_json::json!({
                "entity_type": entity_type,
                "id": id,
            })),
            CrudError::IdentityMismatch {
                expected, actual, ..
            } => Some(serde_json::json!({
                "expected": expected,
                "actual": actual,
            })),
            CrudError::InvalidFilter { field, .. }
            | CrudError::InvalidFilterValueType { field, .. }
            | CrudError::InvalidFilterValueSize { field, .. }
            | CrudError::InvalidField { field, .. } => {
                Some(serde_json::json!({ "field": field }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for CrudError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

impl From<StoreError> for CrudError {
    fn from(err: StoreError) -> Self {
        CrudError::Store(err)
    }
}

/// A specialized Result type for engine operations
pub type CrudResult<T> = Result<T, CrudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = CrudError::NotFound {
            entity_type: "user".to_string(),
            id: Some(7),
        };
        assert!(err.to_string().contains("user"));
        assert!(err.to_string().contains("not found"));

        let err = CrudError::NotFound {
            entity_type: "user".to_string(),
            id: None,
        };
        assert!(err.to_string().contains("No user matched"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            CrudError::NotFound {
                entity_type: "user".to_string(),
                id: None,
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            CrudError::UnsupportedOperator {
                operator: "~".to_string()
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            CrudError::NotNewRecord {
                entity_type: "user".to_string(),
                id: 3,
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            CrudError::Store(StoreError::Unavailable {
                backend: "memory".to_string(),
            })
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_error_is_source() {
        use std::error::Error;

        let err: CrudError = StoreError::Query {
            backend: "postgres".to_string(),
            message: "deadlock detected".to_string(),
        }
        .into();
        assert_eq!(err.error_code(), "STORE_ERROR");
        assert!(err.source().is_some());
        assert!(err.to_string().contains("deadlock detected"));
    }

    #[test]
    fn test_error_response_details() {
        let err = CrudError::IdentityMismatch {
            entity_type: "user".to_string(),
            expected: 8,
            actual: 7,
        };
        let response = err.to_response();
        assert_eq!(response.code, "IDENTITY_MISMATCH");
        assert_eq!(
            response.details,
            Some(serde_json::json!({"expected": 8, "actual": 7}))
        );
        assert!(err.is_client_error());
    }
}
