//! Response envelope
//!
//! Transports wrap engine results in a [`Response`]: a status, a numeric
//! error code (`0` on success, `-1` on failure) and a `data` map whose keys
//! come from the entity's [`response_keys`](crate::core::entity::Entity::response_keys).

use crate::core::entity::Entity;
use crate::core::error::CrudError;
use crate::core::query::Page;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use serde_json::{Map, Value};

pub const RESPONSE_SUCCESS_CODE: i32 = 0;
pub const RESPONSE_FAIL_CODE: i32 = -1;

/// Key under which [`Response::with_page`] stores pagination
pub const PAGINATION_KEY: &str = "pagination";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status_code: u16,
    pub error_code: i32,
    pub error_message: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl Response {
    pub fn new(status: StatusCode, error_code: i32, error_message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            error_code,
            error_message: error_message.into(),
            data: Map::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK, RESPONSE_SUCCESS_CODE, "")
    }

    /// Failure response carrying the error's status and message
    pub fn from_error(err: &CrudError) -> Self {
        Self::new(err.status_code(), RESPONSE_FAIL_CODE, err.to_string())
            .add_data("code", err.error_code())
    }

    pub fn add_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Add one record under its singular key
    pub fn with_record<T: Entity>(self, record: &T) -> Result<Self, serde_json::Error> {
        let (singular, _) = T::response_keys();
        Ok(self.add_data(singular, serde_json::to_value(record)?))
    }

    /// Add records under their plural key
    pub fn with_records<T: Entity>(self, records: &[T]) -> Result<Self, serde_json::Error> {
        let (_, plural) = T::response_keys();
        Ok(self.add_data(plural, serde_json::to_value(records)?))
    }

    /// Add a page's records under their plural key, plus its pagination
    pub fn with_page<T: Entity>(self, page: &Page<T>) -> Result<Self, serde_json::Error> {
        let pagination = serde_json::to_value(page.pagination)?;
        Ok(self
            .with_records(&page.records)?
            .add_data(PAGINATION_KEY, pagination))
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<&CrudError> for Response {
    fn from(err: &CrudError) -> Self {
        Response::from_error(err)
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        (self.status(), Json(self)).into_response()
    }
}
