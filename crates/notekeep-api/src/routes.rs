//! API route definitions

use crate::auth::middleware::auth_middleware;
use crate::error::ApiError;
use crate::handlers::{auth, health, notes};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// OpenAPI document served under `/api-docs/openapi.json`
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::ping,
        auth::register_handler,
        auth::login_handler,
        auth::refresh_handler,
        auth::logout_handler,
        auth::me_handler,
        notes::create_note,
        notes::list_notes,
        notes::get_note,
        notes::update_note,
        notes::delete_note,
    ),
    components(schemas(
        ApiError,
        health::HealthResponse,
        crate::auth::RegisterRequest,
        crate::auth::LoginRequest,
        crate::auth::RefreshRequest,
        crate::auth::AuthResponse,
        crate::auth::RefreshResponse,
        crate::auth::MessageResponse,
        crate::auth::UserResponse,
        notes::NoteResponse,
        notes::CreateNoteRequest,
        notes::UpdateNoteRequest,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness"),
        (name = "auth", description = "Registration, login and token handling"),
        (name = "notes", description = "Notes of the authenticated user"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create API routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/register", post(auth::register_handler))
        .route("/login", post(auth::login_handler))
        .route("/refresh", post(auth::refresh_handler))
        .route("/logout", post(auth::logout_handler));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/me", get(auth::me_handler))
        .route("/notes", get(notes::list_notes).post(notes::create_note))
        .route(
            "/notes/:id",
            get(notes::get_note)
                .put(notes::update_note)
                .delete(notes::delete_note),
        )
        .layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}

/// Routes outside `/api`
pub fn system_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ping", get(health::ping))
}
