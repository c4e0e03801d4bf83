//! HTTP error payloads

use axum::{http::StatusCode, Json};
use collabdesk_common::Error;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human readable message
    pub error: String,
    /// Stable machine readable code
    pub code: String,
}

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a domain error to its HTTP status and payload
pub fn error_response(err: Error) -> ApiError {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    // Internal details stay in the log
    let message = if status.is_server_error() && !matches!(err, Error::Mail(_)) {
        error!("Request failed: {}", err);
        "Internal server error".to_string()
    } else {
        err.to_string()
    };

    (
        status,
        Json(ErrorResponse {
            error: message,
            code: err.code().to_string(),
        }),
    )
}

/// Map a repository failure, logging what was being attempted
pub fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> ApiError {
    move |e| {
        error!("{}: {}", context, e);
        error_response(Error::Database(e.to_string()))
    }
}

pub fn not_found(what: &str) -> ApiError {
    error_response(Error::NotFound(what.to_string()))
}

pub fn validation(message: impl Into<String>) -> ApiError {
    error_response(Error::Validation(message.into()))
}

pub fn invalid_state(message: impl Into<String>) -> ApiError {
    error_response(Error::InvalidState(message.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_client_errors_keep_message() {
        let (status, Json(body)) = error_response(Error::InvalidState("Campaign already sent".into()));
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error, "Invalid state: Campaign already sent");
        assert_eq!(body.code, "INVALID_STATE");
    }

    #[test]
    fn test_server_errors_are_masked() {
        let (status, Json(body)) = error_response(Error::Database("password authentication failed".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
        assert_eq!(body.code, "DATABASE_ERROR");
    }

    #[test]
    fn test_bad_request() {
        let (status, Json(body)) = error_response(Error::BadRequest("Mail credential is required".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "BAD_REQUEST");
    }
}
