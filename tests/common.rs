// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides in-memory server resources, router construction, PKCE pairs and HTTP helpers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `intervals_mcp_server`

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use intervals_mcp_server::{
    config::environment::ServerConfig,
    oauth2_server::crypto::pkce_challenge,
    resources::ServerResources,
    routes::build_router,
    store::Store,
};
use serde_json::{json, Value};
use std::sync::{Arc, Once};
use tower::ServiceExt;

/// Public origin used by every test server
pub const TEST_BASE_URL: &str = "http://localhost:9000";
/// Redirect target accepted through the loopback rule
pub const TEST_REDIRECT_URI: &str = "http://localhost:3000/callback";
/// RFC 7636 appendix B verifier
pub const TEST_VERIFIER: &str = "dBjftJeZ4CQP-0ycWsMo0tBlRrIeeFu3Z4VE2-Eg-Pw";

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        let _ = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init();
    });
}

/// Test configuration on the in-memory backend
pub fn test_config() -> ServerConfig {
    ServerConfig::for_tests(TEST_BASE_URL)
}

/// Resources on a fresh in-memory store
pub async fn create_test_resources() -> Result<Arc<ServerResources>> {
    create_test_resources_with(test_config()).await
}

/// Resources for a custom configuration on a fresh in-memory store
pub async fn create_test_resources_with(config: ServerConfig) -> Result<Arc<ServerResources>> {
    init_test_logging();
    let store = Store::memory().await?;
    Ok(Arc::new(ServerResources::with_store(config, store).await?))
}

/// Full router plus the resources behind it
pub async fn create_test_app() -> Result<(Router, Arc<ServerResources>)> {
    let resources = create_test_resources().await?;
    Ok((build_router(Arc::clone(&resources)), resources))
}

/// S256 challenge for [`TEST_VERIFIER`]
pub fn test_challenge() -> String {
    pkce_challenge(TEST_VERIFIER)
}

/// Send one request through the router
pub async fn send(app: &Router, request: Request<Body>) -> Result<Response> {
    Ok(app.clone().oneshot(request).await?)
}

/// Response body parsed as JSON
pub async fn body_json(response: Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// `POST` a JSON body
pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// `POST` a form body
pub fn form_request(uri: &str, pairs: &[(&str, &str)]) -> Request<Body> {
    let body = serde_urlencoded::to_string(pairs).unwrap();
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

/// `GET` with no body
pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Register a public client for [`TEST_REDIRECT_URI`]; returns its id
pub async fn register_public_client(app: &Router) -> Result<String> {
    let response = send(
        app,
        json_request(
            Method::POST,
            "/oauth/register",
            &json!({
                "redirect_uris": [TEST_REDIRECT_URI],
                "client_name": "Test Public Client",
                "token_endpoint_auth_method": "none",
                "grant_types": ["authorization_code", "refresh_token"]
            }),
        ),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await?;
    Ok(body["client_id"].as_str().unwrap().to_owned())
}

/// Register a confidential client; returns `(client_id, client_secret)`
pub async fn register_confidential_client(app: &Router) -> Result<(String, String)> {
    let response = send(
        app,
        json_request(
            Method::POST,
            "/oauth/register",
            &json!({
                "redirect_uris": [TEST_REDIRECT_URI],
                "client_name": "Test Confidential Client",
                "token_endpoint_auth_method": "client_secret_post"
            }),
        ),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await?;
    Ok((
        body["client_id"].as_str().unwrap().to_owned(),
        body["client_secret"].as_str().unwrap().to_owned(),
    ))
}

/// Authorize URL for `client_id` with the test PKCE pair
pub fn authorize_uri(client_id: &str, state: Option<&str>) -> String {
    let mut pairs = vec![
        ("response_type", "code".to_owned()),
        ("client_id", client_id.to_owned()),
        ("redirect_uri", TEST_REDIRECT_URI.to_owned()),
        ("code_challenge", test_challenge()),
        ("code_challenge_method", "S256".to_owned()),
    ];
    if let Some(state) = state {
        pairs.push(("state", state.to_owned()));
    }
    format!(
        "/oauth/authorize?{}",
        serde_urlencoded::to_string(&pairs).unwrap()
    )
}

/// Query parameter from a `Location` header
pub fn location_param(response: &Response, name: &str) -> Option<String> {
    let location = response.headers().get(header::LOCATION)?.to_str().ok()?;
    let url = url::Url::parse(location).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Run the authorize step and return the issued code
pub async fn obtain_code(app: &Router, client_id: &str) -> Result<String> {
    let response = send(app, get_request(&authorize_uri(client_id, None))).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    Ok(location_param(&response, "code").expect("code in redirect"))
}

/// Exchange a code for tokens as a public client
pub async fn exchange_code(app: &Router, client_id: &str, code: &str) -> Result<Response> {
    send(
        app,
        form_request(
            "/oauth/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", TEST_REDIRECT_URI),
                ("client_id", client_id),
                ("code_verifier", TEST_VERIFIER),
            ],
        ),
    )
    .await
}

/// Full public-client flow; returns the token response JSON
pub async fn obtain_tokens(app: &Router) -> Result<(String, Value)> {
    let client_id = register_public_client(app).await?;
    let code = obtain_code(app, &client_id).await?;
    let response = exchange_code(app, &client_id, &code).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok((client_id, body_json(response).await?))
}
