//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use notekeep_core::NotekeepError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::jwt::JwtError;
use crate::auth::password::PasswordError;
use crate::auth::refresh::RefreshError;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new("NOT_FOUND", format!("{resource} not found"))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn unauthorized() -> Self {
        Self::new("UNAUTHORIZED", "Authentication required")
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
///
/// `Unauthorized` carries no detail so responses never reveal which part of
/// a credential was wrong. `Internal` and `Database` details are logged and
/// withheld from the client.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Unauthorized,
    Internal(String),
    Database(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::not_found(&msg)),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ApiError::bad_request("Invalid request").with_details(msg),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, ApiError::conflict(msg)),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, ApiError::unauthorized()),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, ApiError::internal_error())
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::new("DATABASE_ERROR", "Database operation failed"),
                )
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<NotekeepError> for AppError {
    fn from(err: NotekeepError) -> Self {
        match err {
            NotekeepError::NotFound(msg) => AppError::NotFound(msg),
            NotekeepError::Conflict(msg) => AppError::Conflict(msg),
            NotekeepError::ValidationError(msg) => AppError::BadRequest(msg),
            NotekeepError::DatabaseError(msg) => AppError::Database(msg),
            NotekeepError::ConfigError(msg) => {
                AppError::Internal(format!("Configuration error: {msg}"))
            }
            NotekeepError::Other(err) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooLong => AppError::BadRequest(err.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<JwtError> for AppError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::InvalidToken => AppError::Unauthorized,
            JwtError::EncodingError(e) => AppError::Internal(format!("Failed to sign token: {e}")),
            other @ JwtError::ExpiryOutOfRange => AppError::Internal(other.to_string()),
        }
    }
}

impl From<RefreshError> for AppError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::NotFound | RefreshError::ExpiredOrRevoked => AppError::Unauthorized,
            RefreshError::Store(e) => e.into(),
            other @ RefreshError::ExpiryOutOfRange => AppError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_status_codes() {
        let cases = vec![
            (AppError::NotFound("Note".into()), StatusCode::NOT_FOUND),
            (AppError::BadRequest("bad".into()), StatusCode::BAD_REQUEST),
            (AppError::Conflict("dup".into()), StatusCode::CONFLICT),
            (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Database("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_internal_details_withheld() {
        let response = AppError::Database("connection refused at 10.0.0.5".into()).into_response();
        let body = body_json(response).await;

        assert_eq!(body["code"], "DATABASE_ERROR");
        assert!(body.get("details").is_none());
        assert!(!body.to_string().contains("10.0.0.5"));
    }

    #[tokio::test]
    async fn test_bad_request_carries_detail() {
        let response = AppError::BadRequest("email: invalid".into()).into_response();
        let body = body_json(response).await;

        assert_eq!(body["code"], "BAD_REQUEST");
        assert_eq!(body["details"], "email: invalid");
    }

    #[test]
    fn test_refresh_errors_are_unauthorized() {
        assert!(matches!(
            AppError::from(RefreshError::NotFound),
            AppError::Unauthorized
        ));
        assert!(matches!(
            AppError::from(RefreshError::ExpiredOrRevoked),
            AppError::Unauthorized
        ));
        assert!(matches!(
            AppError::from(RefreshError::Store(NotekeepError::DatabaseError("x".into()))),
            AppError::Database(_)
        ));
        assert!(matches!(
            AppError::from(RefreshError::ExpiryOutOfRange),
            AppError::Internal(_)
        ));
    }

    #[test]
    fn test_core_conflict_maps_to_conflict() {
        let err = AppError::from(NotekeepError::Conflict("Email already registered".into()));
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
