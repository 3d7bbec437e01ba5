//! notekeep API - HTTP server
//!
//! Registration, login and rotating refresh tokens in front of per-user
//! note storage.

pub mod audit;
pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use state::AppState;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// CORS for the configured origins, with credentials so the refresh cookie
/// can be sent cross-origin
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .merge(routes::system_routes())
        .nest("/api", routes::api_routes(state.clone()))
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", routes::ApiDoc::openapi()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// In-memory state with cheap password hashing and a fixed signing secret
#[cfg(any(test, feature = "test-utils"))]
pub fn create_state_for_testing() -> Arc<AppState> {
    use auth::PasswordConfig;
    use notekeep_core::{AppConfig, MemoryStore};

    let mut config = AppConfig::default();
    config.auth.jwt_secret = "test-secret".to_string();
    config.server.cors_origins = vec!["http://localhost:3000".to_string()];

    let store = Arc::new(MemoryStore::new());
    Arc::new(
        AppState::new(config, store.clone(), store).with_password_config(PasswordConfig::light()),
    )
}

/// Router over [`create_state_for_testing`]
#[cfg(any(test, feature = "test-utils"))]
pub fn create_router_for_testing() -> Router {
    create_router(create_state_for_testing())
}
