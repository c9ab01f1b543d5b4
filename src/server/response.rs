use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::engine::mock_test::ScoreError;
use crate::error::{Error, Result as StoreResult};

/// `{ "data": ..., "error": null }` envelope shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    /// 201 with the created resource in the envelope.
    #[must_use]
    pub fn created(data: T) -> (StatusCode, Json<Self>) {
        (StatusCode::CREATED, Json(Self::success(data)))
    }
}

/// Envelope for cursor-paged lists. `next_cursor` is the last id of the page.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    pub data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl<T: Serialize> PaginatedResponse<T> {
    #[must_use]
    pub fn new(data: Vec<T>, next_cursor: Option<String>, has_more: bool) -> Self {
        Self {
            data,
            next_cursor,
            has_more,
        }
    }
}

/// Count of rows touched by a batch operation.
#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: usize,
}

/// Handler error, rendered as the envelope with `data: null`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "data": null, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<ScoreError> for ApiError {
    fn from(e: ScoreError) -> Self {
        ApiError::bad_request(e.to_string())
    }
}

/// Trims a `limit + 1` fetch to `limit` rows and reports whether more exist.
pub fn paginate<T, F>(items: Vec<T>, limit: usize, get_cursor: F) -> (Vec<T>, Option<String>, bool)
where
    F: Fn(&T) -> String,
{
    let has_more = items.len() > limit;
    let items: Vec<T> = items.into_iter().take(limit).collect();
    let next_cursor = if has_more {
        items.last().map(&get_cursor)
    } else {
        None
    };
    (items, next_cursor, has_more)
}

pub const DEFAULT_PAGE_SIZE: i32 = 50;

/// Maps store errors onto HTTP statuses.
///
/// `NotFound`, `Validation`, `AlreadyExists` and `Conflict` keep their
/// meaning; anything else is logged and reported as a 500 carrying `message`.
pub trait StoreResultExt<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError> {
        self.map_err(|e| match e {
            Error::NotFound => ApiError::not_found("Not found"),
            Error::Validation(msg) => ApiError::bad_request(msg),
            Error::AlreadyExists => ApiError::conflict("Already exists"),
            Error::Conflict(msg) => ApiError::conflict(msg),
            e => {
                tracing::error!("{message}: {e}");
                ApiError::internal(message)
            }
        })
    }
}

pub trait StoreOptionExt<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreOptionExt<T> for Option<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, ApiError> {
        self.ok_or_else(|| ApiError::not_found(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginate_sets_cursor_when_more() {
        let (items, cursor, has_more) = paginate(vec![1, 2, 3], 2, |i| i.to_string());
        assert_eq!(items, vec![1, 2]);
        assert_eq!(cursor.as_deref(), Some("2"));
        assert!(has_more);

        let (items, cursor, has_more) = paginate(vec![1, 2], 2, |i| i.to_string());
        assert_eq!(items.len(), 2);
        assert!(cursor.is_none());
        assert!(!has_more);
    }

    #[test]
    fn test_store_errors_keep_their_status() {
        let not_found: StoreResult<()> = Err(Error::NotFound);
        assert_eq!(
            not_found.api_err("x").unwrap_err().status,
            StatusCode::NOT_FOUND
        );

        let invalid: StoreResult<()> = Err(Error::Validation("bad".into()));
        let err = invalid.api_err("x").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "bad");

        let in_use: StoreResult<()> = Err(Error::Conflict("in use".into()));
        let err = in_use.api_err("x").unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.message, "in use");

        let io: StoreResult<()> = Err(Error::Io(std::io::Error::other("disk")));
        let err = io.api_err("Failed to save").unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Failed to save");
    }

    #[test]
    fn test_score_error_is_bad_request() {
        let err = ApiError::from(ScoreError::MaxSumMismatch { sum: 90, max: 100 });
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Invalid max scores");
    }
}
