//! Authentication API handlers
//!
//! Register and login set the refresh token cookie and also return the token
//! in the body for clients without cookie support. Refresh and logout read
//! the cookie first and fall back to a `refresh_token` field in the body.

use crate::audit::ClientInfo;
use crate::auth::{
    AuthResponse, AuthenticatedUser, LoginRequest, MessageResponse, RefreshRequest,
    RefreshResponse, RegisterRequest, UserResponse,
};
use crate::error::AppError;
use crate::extract::ValidatedJson;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Refresh token from the cookie, else from a JSON body
///
/// An empty or unparsable body is treated as "no token".
fn presented_refresh_token(state: &AppState, jar: &CookieJar, body: &Bytes) -> Option<String> {
    state.refresh_cookie().read(jar).or_else(|| {
        serde_json::from_slice::<RefreshRequest>(body)
            .ok()
            .and_then(|request| request.refresh_token)
            .filter(|token| !token.is_empty())
    })
}

/// Register a new user account
///
/// Creates the user and signs them in.
///
/// # Responses
///
/// * `201 Created` - User registered, tokens issued
/// * `400 Bad Request` - Invalid email or password
/// * `409 Conflict` - Email already registered
#[utoipa::path(
    post,
    path = "/api/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 409, description = "Email already registered", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let client = ClientInfo::from_headers(&headers);
    let response = state.auth.register(request, &client).await?;

    let jar = jar.add(state.refresh_cookie().build(&response.refresh_token));
    Ok((StatusCode::CREATED, jar, Json(response)))
}

/// Login with email and password
///
/// # Responses
///
/// * `200 OK` - Authentication successful, returns tokens
/// * `400 Bad Request` - Malformed request
/// * `401 Unauthorized` - Invalid credentials
#[utoipa::path(
    post,
    path = "/api/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let client = ClientInfo::from_headers(&headers);
    let response = state.auth.login(request, &client).await?;

    let jar = jar.add(state.refresh_cookie().build(&response.refresh_token));
    Ok((jar, Json(response)))
}

/// Refresh access token
///
/// Exchanges a refresh token for a new access token. The presented refresh
/// token is revoked and a new one is issued; presenting it again fails.
///
/// # Responses
///
/// * `200 OK` - New tokens issued
/// * `401 Unauthorized` - Missing, invalid, expired or already used refresh token
#[utoipa::path(
    post,
    path = "/api/refresh",
    tag = "auth",
    request_body(content = RefreshRequest, description = "Only needed without the refresh cookie"),
    responses(
        (status = 200, description = "Token refreshed successfully", body = RefreshResponse),
        (status = 401, description = "Invalid refresh token", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let client = ClientInfo::from_headers(&headers);
    let token = presented_refresh_token(&state, &jar, &body);
    let response = state.auth.refresh(token.as_deref(), &client).await?;

    let jar = jar.add(state.refresh_cookie().build(&response.refresh_token));
    Ok((jar, Json(response)))
}

/// Logout current session
///
/// Revokes the presented refresh token if there is one and clears the
/// cookie. Always succeeds.
#[utoipa::path(
    post,
    path = "/api/logout",
    tag = "auth",
    request_body(content = RefreshRequest, description = "Only needed without the refresh cookie"),
    responses(
        (status = 200, description = "Logout successful", body = MessageResponse),
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    body: Bytes,
) -> impl IntoResponse {
    let client = ClientInfo::from_headers(&headers);
    let token = presented_refresh_token(&state, &jar, &body);
    state.auth.logout(token.as_deref(), &client).await;

    let jar = jar.add(state.refresh_cookie().removal());
    (jar, Json(MessageResponse::new("Logged out successfully")))
}

/// Get current user profile
///
/// # Responses
///
/// * `200 OK` - User profile
/// * `401 Unauthorized` - Invalid or missing authentication
/// * `404 Not Found` - The account no longer exists
#[utoipa::path(
    get,
    path = "/api/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user profile", body = UserResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.auth.get_user(user.user_id).await?;
    Ok(Json(profile))
}
