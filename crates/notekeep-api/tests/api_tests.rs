//! API Integration Tests
//!
//! Every test drives the full router over the in-memory store.

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use notekeep_api::create_router_for_testing;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Authenticated request with an optional JSON body
fn authed_request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .header("Content-Type", "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// The refresh cookie header set by a response, if any
fn refresh_set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("refresh_token="))
        .map(|value| value.to_string())
}

async fn register(app: &Router, email: &str, password: &str) -> Value {
    let response = send(
        app,
        create_json_request(
            "POST",
            "/api/register",
            Some(json!({ "email": email, "password": password })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

async fn refresh_with_body(app: &Router, refresh_token: &str) -> Response<Body> {
    send(
        app,
        create_json_request(
            "POST",
            "/api/refresh",
            Some(json!({ "refresh_token": refresh_token })),
        ),
    )
    .await
}

async fn create_note(app: &Router, token: &str, title: &str) -> Value {
    let response = send(
        app,
        authed_request(
            "POST",
            "/api/notes",
            token,
            Some(json!({ "title": title, "content": format!("{title} body") })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = create_router_for_testing();

    let response = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ping() {
    let app = create_router_for_testing();

    let response = send(
        &app,
        Request::builder().uri("/ping").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "pong");
}

// =============================================================================
// Registration Tests
// =============================================================================

#[tokio::test]
async fn test_register_then_list_notes() {
    let app = create_router_for_testing();

    let response = send(
        &app,
        create_json_request(
            "POST",
            "/api/register",
            Some(json!({ "email": "a@b.com", "password": "secret1" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let cookie = refresh_set_cookie(&response).expect("refresh cookie should be set");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=604800"));
    assert!(!cookie.contains("Secure"));

    let json = body_json(response).await;
    let token = json["token"].as_str().unwrap();
    let refresh_token = json["refresh_token"].as_str().unwrap();
    assert!(!token.is_empty());
    assert!(!refresh_token.is_empty());
    assert!(cookie.starts_with(&format!("refresh_token={refresh_token}")));
    assert_eq!(json["user"]["email"], "a@b.com");
    assert!(json["user"]["id"].is_i64());
    assert!(json["user"].get("password_hash").is_none());

    // No Authorization header
    let response = send(&app, create_json_request("GET", "/api/notes", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app, authed_request("GET", "/api/notes", token, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let app = create_router_for_testing();
    register(&app, "dup@example.com", "secret1").await;

    let response = send(
        &app,
        create_json_request(
            "POST",
            "/api/register",
            Some(json!({ "email": "dup@example.com", "password": "another1" })),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");
}

#[tokio::test]
async fn test_register_invalid_input() {
    let app = create_router_for_testing();

    let cases = vec![
        json!({ "email": "not-an-email", "password": "secret1" }),
        json!({ "email": "a@b.com", "password": "12345" }),
        json!({ "email": "a@b.com" }),
        json!({ "email": "a@b.com", "password": "x".repeat(73) }),
    ];

    for body in cases {
        let response = send(
            &app,
            create_json_request("POST", "/api/register", Some(body.clone())),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
    }

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/register")
            .header("Content-Type", "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Login Tests
// =============================================================================

#[tokio::test]
async fn test_login_success() {
    let app = create_router_for_testing();
    let registered = register(&app, "login@example.com", "secret1").await;

    let response = send(
        &app,
        create_json_request(
            "POST",
            "/api/login",
            Some(json!({ "email": "login@example.com", "password": "secret1" })),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(refresh_set_cookie(&response).is_some());

    let json = body_json(response).await;
    assert!(json["token"].is_string());
    assert_ne!(json["refresh_token"], registered["refresh_token"]);
    assert_eq!(json["user"]["id"], registered["user"]["id"]);
}

#[tokio::test]
async fn test_login_failures_are_generic() {
    let app = create_router_for_testing();
    register(&app, "user@example.com", "secret1").await;

    let wrong_password = send(
        &app,
        create_json_request(
            "POST",
            "/api/login",
            Some(json!({ "email": "user@example.com", "password": "wrong-password" })),
        ),
    )
    .await;
    let unknown_user = send(
        &app,
        create_json_request(
            "POST",
            "/api/login",
            Some(json!({ "email": "nobody@example.com", "password": "secret1" })),
        ),
    )
    .await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(wrong_password).await, body_json(unknown_user).await);
}

#[tokio::test]
async fn test_login_email_is_case_sensitive() {
    let app = create_router_for_testing();
    register(&app, "Case@Example.com", "secret1").await;

    let response = send(
        &app,
        create_json_request(
            "POST",
            "/api/login",
            Some(json!({ "email": "case@example.com", "password": "secret1" })),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Refresh Tests
// =============================================================================

#[tokio::test]
async fn test_refresh_rotation_rejects_reuse() {
    let app = create_router_for_testing();
    let session = register(&app, "rotate@example.com", "secret1").await;
    let original = session["refresh_token"].as_str().unwrap();

    let response = refresh_with_body(&app, original).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(refresh_set_cookie(&response).is_some());
    let first = body_json(response).await;
    let rotated = first["refresh_token"].as_str().unwrap();
    assert_ne!(rotated, original);

    // The new access token works
    let token = first["token"].as_str().unwrap();
    let response = send(&app, authed_request("GET", "/api/me", token, None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Replaying the consumed token fails
    let response = refresh_with_body(&app, original).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The rotated token still works
    let response = refresh_with_body(&app, rotated).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_via_cookie() {
    let app = create_router_for_testing();
    let session = register(&app, "cookie@example.com", "secret1").await;
    let refresh_token = session["refresh_token"].as_str().unwrap();

    // Cookie wins over a bogus body token
    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/refresh")
            .header(header::COOKIE, format!("refresh_token={refresh_token}"))
            .header("Content-Type", "application/json")
            .body(Body::from(r#"{"refresh_token":"bogus"}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = refresh_set_cookie(&response).unwrap();
    let json = body_json(response).await;
    let rotated = json["refresh_token"].as_str().unwrap();
    assert!(cookie.starts_with(&format!("refresh_token={rotated}")));

    // Same cookie again, no body
    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/refresh")
            .header(header::COOKIE, format!("refresh_token={refresh_token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_invalid_or_missing_token() {
    let app = create_router_for_testing();

    let response = refresh_with_body(&app, "not-a-real-token").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");

    let response = send(&app, create_json_request("POST", "/api/refresh", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Logout Tests
// =============================================================================

#[tokio::test]
async fn test_logout_without_cookie_succeeds() {
    let app = create_router_for_testing();

    let response = send(&app, create_json_request("POST", "/api/logout", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = refresh_set_cookie(&response).expect("cookie should be cleared");
    assert!(cookie.contains("Max-Age=0"));
    assert!(body_json(response).await["message"].is_string());
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let app = create_router_for_testing();
    let session = register(&app, "logout@example.com", "secret1").await;
    let refresh_token = session["refresh_token"].as_str().unwrap();

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/logout")
            .header(header::COOKIE, format!("refresh_token={refresh_token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = refresh_with_body(&app, refresh_token).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Logging out again with the dead token still succeeds
    let response = send(
        &app,
        create_json_request(
            "POST",
            "/api/logout",
            Some(json!({ "refresh_token": refresh_token })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Auth Gate Tests
// =============================================================================

#[tokio::test]
async fn test_me_endpoint_returns_user_info() {
    let app = create_router_for_testing();
    let session = register(&app, "me@example.com", "secret1").await;
    let token = session["token"].as_str().unwrap();

    let response = send(&app, authed_request("GET", "/api/me", token, None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["email"], "me@example.com");
    assert_eq!(json["id"], session["user"]["id"]);
}

#[tokio::test]
async fn test_bearer_prefix_is_optional() {
    let app = create_router_for_testing();
    let session = register(&app, "raw@example.com", "secret1").await;
    let token = session["token"].as_str().unwrap();

    let response = send(
        &app,
        Request::builder()
            .uri("/api/me")
            .header("Authorization", token)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_bearer_tokens_rejected() {
    let app = create_router_for_testing();
    let session = register(&app, "gate@example.com", "secret1").await;
    let refresh_token = session["refresh_token"].as_str().unwrap();

    for token in ["invalid.jwt.token", refresh_token, ""] {
        let response = send(&app, authed_request("GET", "/api/me", token, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
    }
}

// =============================================================================
// Notes Tests
// =============================================================================

#[tokio::test]
async fn test_notes_crud() {
    let app = create_router_for_testing();
    let session = register(&app, "notes@example.com", "secret1").await;
    let token = session["token"].as_str().unwrap();

    let first = create_note(&app, token, "first").await;
    let second = create_note(&app, token, "second").await;
    assert_eq!(first["user_id"], session["user"]["id"]);
    assert_eq!(first["content"], "first body");

    // Newest first
    let response = send(&app, authed_request("GET", "/api/notes", token, None)).await;
    let list = body_json(response).await;
    assert_eq!(list.as_array().unwrap().len(), 2);
    assert_eq!(list[0]["id"], second["id"]);
    assert_eq!(list[1]["id"], first["id"]);

    let uri = format!("/api/notes/{}", first["id"]);

    let response = send(&app, authed_request("GET", &uri, token, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["title"], "first");

    // Partial update keeps the title
    let response = send(
        &app,
        authed_request("PUT", &uri, token, Some(json!({ "content": "edited" }))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["title"], "first");
    assert_eq!(updated["content"], "edited");

    // Nothing to update
    let response = send(&app, authed_request("PUT", &uri, token, Some(json!({})))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, authed_request("DELETE", &uri, token, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["message"].is_string());

    let response = send(&app, authed_request("GET", &uri, token, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, authed_request("DELETE", &uri, token, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_notes_are_private() {
    let app = create_router_for_testing();
    let owner = register(&app, "owner@example.com", "secret1").await;
    let other = register(&app, "other@example.com", "secret1").await;
    let owner_token = owner["token"].as_str().unwrap();
    let other_token = other["token"].as_str().unwrap();

    let note = create_note(&app, owner_token, "private").await;
    let uri = format!("/api/notes/{}", note["id"]);

    let response = send(&app, authed_request("GET", &uri, other_token, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        authed_request("PUT", &uri, other_token, Some(json!({ "title": "mine" }))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, authed_request("DELETE", &uri, other_token, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, authed_request("GET", "/api/notes", other_token, None)).await;
    assert_eq!(body_json(response).await, json!([]));

    // Untouched for the owner
    let response = send(&app, authed_request("GET", &uri, owner_token, None)).await;
    assert_eq!(body_json(response).await["title"], "private");
}

#[tokio::test]
async fn test_notes_invalid_input() {
    let app = create_router_for_testing();
    let session = register(&app, "invalid@example.com", "secret1").await;
    let token = session["token"].as_str().unwrap();

    let response = send(
        &app,
        authed_request("POST", "/api/notes", token, Some(json!({ "title": "" }))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, authed_request("GET", "/api/notes/abc", token, None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// HTTP Plumbing Tests
// =============================================================================

#[tokio::test]
async fn test_cors_preflight_allows_credentials() {
    let app = create_router_for_testing();

    let response = send(
        &app,
        Request::builder()
            .method("OPTIONS")
            .uri("/api/login")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
}

#[tokio::test]
async fn test_swagger_ui_available() {
    let app = create_router_for_testing();

    let response = send(
        &app,
        Request::builder()
            .uri("/swagger-ui/")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert!(response.status().is_success() || response.status().is_redirection());
}

#[tokio::test]
async fn test_openapi_spec_available() {
    let app = create_router_for_testing();

    let response = send(
        &app,
        Request::builder()
            .uri("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["paths"]["/api/register"].is_object());
    assert!(json["paths"]["/api/notes/{id}"].is_object());
    assert!(json["components"]["securitySchemes"]["bearer_auth"].is_object());
}
