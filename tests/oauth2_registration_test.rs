// ABOUTME: Integration tests for dynamic client registration over HTTP
// ABOUTME: Covers public and confidential clients, allow-list filtering and malformed metadata
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::{body_json, create_test_app, json_request, send, TEST_REDIRECT_URI};
use intervals_mcp_server::oauth2_server::crypto::sha256_hex;
use intervals_mcp_server::resources::ServerResources;
use intervals_mcp_server::routes::build_router;
use intervals_mcp_server::store::{Store, StoreConfig};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_register_public_client() -> Result<()> {
    let (app, resources) = create_test_app().await?;

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/oauth/register",
            &json!({
                "redirect_uris": [TEST_REDIRECT_URI],
                "token_endpoint_auth_method": "none"
            }),
        ),
    )
    .await?;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    let body = body_json(response).await?;
    let client_id = body["client_id"].as_str().unwrap();
    assert!(client_id.starts_with("intervals_mcp_"));
    assert!(body.get("client_secret").is_none());
    assert!(body.get("client_secret_expires_at").is_none());
    assert_eq!(body["client_name"], "MCP Client");
    assert_eq!(body["grant_types"], json!(["authorization_code"]));
    assert_eq!(body["response_types"], json!(["code"]));
    assert_eq!(body["scope"], "intervals:read intervals:write");
    assert!(body["client_id_issued_at"].as_i64().unwrap() > 0);

    let stored = resources.oauth_server.clients().get(client_id).await?.unwrap();
    assert!(stored.is_public);
    assert!(stored.client_secret_hash.is_none());
    Ok(())
}

#[tokio::test]
async fn test_register_confidential_client_stores_secret_hash() -> Result<()> {
    let (app, resources) = create_test_app().await?;

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/oauth/register",
            &json!({
                "redirect_uris": [TEST_REDIRECT_URI],
                "client_name": "Desktop",
                "scope": "intervals:read"
            }),
        ),
    )
    .await?;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await?;
    let client_id = body["client_id"].as_str().unwrap();
    let secret = body["client_secret"].as_str().unwrap();
    assert_eq!(body["client_secret_expires_at"], 0);
    assert_eq!(body["token_endpoint_auth_method"], "client_secret_post");
    assert_eq!(body["scope"], "intervals:read");

    let stored = resources.oauth_server.clients().get(client_id).await?.unwrap();
    assert!(!stored.is_public);
    assert_eq!(stored.client_secret_hash.as_deref(), Some(sha256_hex(secret).as_str()));
    Ok(())
}

#[tokio::test]
async fn test_register_filters_disallowed_redirects() -> Result<()> {
    let (app, _) = create_test_app().await?;

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/oauth/register",
            &json!({
                "redirect_uris": [
                    "https://evil.example.com/cb",
                    "https://claude.ai/api/mcp/auth_callback",
                    "http://localhost:3000/cb#frag"
                ],
                "token_endpoint_auth_method": "none"
            }),
        ),
    )
    .await?;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await?;
    assert_eq!(
        body["redirect_uris"],
        json!(["https://claude.ai/api/mcp/auth_callback"])
    );
    Ok(())
}

#[tokio::test]
async fn test_register_rejects_when_no_redirect_survives() -> Result<()> {
    let (app, _) = create_test_app().await?;

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/oauth/register",
            &json!({ "redirect_uris": ["https://*.example.com/cb", "not a uri"] }),
        ),
    )
    .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["error"], "invalid_redirect_uri");
    Ok(())
}

#[tokio::test]
async fn test_register_requires_redirect_uris() -> Result<()> {
    let (app, _) = create_test_app().await?;

    let response = send(
        &app,
        json_request(Method::POST, "/oauth/register", &json!({ "client_name": "x" })),
    )
    .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await?["error"], "invalid_request");
    Ok(())
}

#[tokio::test]
async fn test_register_rejects_unsupported_grant_type() -> Result<()> {
    let (app, _) = create_test_app().await?;

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/oauth/register",
            &json!({
                "redirect_uris": [TEST_REDIRECT_URI],
                "grant_types": ["client_credentials"]
            }),
        ),
    )
    .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await?["error"], "invalid_request");
    Ok(())
}

#[tokio::test]
async fn test_register_malformed_json_is_oauth_error() -> Result<()> {
    let (app, _) = create_test_app().await?;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/oauth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"redirect_uris\": ["))?;
    let response = send(&app, request).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await?["error"], "invalid_request");
    Ok(())
}

#[tokio::test]
async fn test_registered_ids_are_unique() -> Result<()> {
    let (app, _) = create_test_app().await?;

    let first = common::register_public_client(&app).await?;
    let second = common::register_public_client(&app).await?;
    assert_ne!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_full_store_keeps_registered_clients() -> Result<()> {
    common::init_test_logging();
    let store = Store::new(StoreConfig {
        max_entries: 4,
        ..StoreConfig::memory_for_tests()
    })
    .await?;
    let resources = Arc::new(ServerResources::with_store(common::test_config(), store).await?);
    let app = build_router(Arc::clone(&resources));

    let first = common::register_public_client(&app).await?;
    for _ in 0..3 {
        common::register_public_client(&app).await?;
    }

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/oauth/register",
            &json!({
                "redirect_uris": [TEST_REDIRECT_URI],
                "token_endpoint_auth_method": "none"
            }),
        ),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await?["error"], "server_error");

    assert!(resources.oauth_server.clients().get(&first).await?.is_some());
    Ok(())
}
