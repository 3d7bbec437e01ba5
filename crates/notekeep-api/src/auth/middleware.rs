/// Authentication middleware for protecting routes
///
/// Reads the `Authorization` header, strips an optional `Bearer ` prefix and
/// verifies the access token. On success the caller's identity is added to
/// the request extensions; on failure the request is rejected with 401
/// before the handler runs.
use super::jwt::{Claims, JwtError};
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Identity of the caller, available to handlers as
/// `Extension<AuthenticatedUser>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub email: String,
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
        }
    }
}

/// Authentication middleware errors
///
/// All variants produce the same generic 401 body.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] JwtError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(ApiError::unauthorized())).into_response()
    }
}

/// Extract the token from an `Authorization` header value
///
/// The `Bearer ` prefix is optional. Returns `None` for an empty token.
pub fn extract_bearer_token(header_value: &str) -> Option<&str> {
    let token = header_value
        .strip_prefix("Bearer ")
        .unwrap_or(header_value)
        .trim();

    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Authentication middleware that requires a valid access token
///
/// # Usage
///
/// ```ignore
/// let protected = Router::new()
///     .route("/api/notes", get(list_notes))
///     .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let result = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)
        .and_then(|value| value.to_str().map_err(|_| AuthError::InvalidAuthHeader))
        .and_then(|value| extract_bearer_token(value).ok_or(AuthError::InvalidAuthHeader))
        .and_then(|token| state.auth.authenticate(token).map_err(AuthError::from));

    let user = match result {
        Ok(user) => user,
        Err(AuthError::MissingAuthHeader) => return Err(AuthError::MissingAuthHeader),
        Err(e) => {
            audit_log(&AuditEvent::InvalidToken {
                ip_address: extract_ip_address(request.headers()),
                user_agent: extract_user_agent(request.headers()),
                reason: e.to_string(),
            });
            return Err(e);
        }
    };

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
