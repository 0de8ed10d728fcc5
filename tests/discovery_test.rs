// ABOUTME: Integration tests for discovery documents, health endpoints and cross-cutting HTTP behavior
// ABOUTME: Covers well-known metadata, CORS preflight, request ids and readiness
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::{body_json, create_test_app, create_test_resources_with, get_request, send, test_config};
use intervals_mcp_server::routes::build_router;
use serde_json::json;

#[tokio::test]
async fn test_authorization_server_metadata() -> Result<()> {
    let (app, _) = create_test_app().await?;

    for path in [
        "/.well-known/oauth-authorization-server",
        "/.well-known/oauth-authorization-server/mcp",
    ] {
        let response = send(&app, get_request(path)).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await?;
        assert_eq!(body["issuer"], "http://localhost:9000");
        assert_eq!(
            body["authorization_endpoint"],
            "http://localhost:9000/oauth/authorize"
        );
        assert_eq!(body["token_endpoint"], "http://localhost:9000/oauth/token");
        assert_eq!(
            body["registration_endpoint"],
            "http://localhost:9000/oauth/register"
        );
        assert_eq!(body["response_types_supported"], json!(["code"]));
        assert_eq!(
            body["grant_types_supported"],
            json!(["authorization_code", "refresh_token"])
        );
        assert_eq!(body["code_challenge_methods_supported"], json!(["S256"]));
        assert_eq!(
            body["token_endpoint_auth_methods_supported"],
            json!(["none", "client_secret_post"])
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_protected_resource_metadata() -> Result<()> {
    let (app, _) = create_test_app().await?;

    for path in [
        "/.well-known/oauth-protected-resource",
        "/.well-known/oauth-protected-resource/mcp",
    ] {
        let response = send(&app, get_request(path)).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await?;
        assert_eq!(body["resource"], "http://localhost:9000/mcp");
        assert_eq!(body["authorization_servers"], json!(["http://localhost:9000"]));
        assert_eq!(body["bearer_methods_supported"], json!(["header"]));
    }
    Ok(())
}

#[tokio::test]
async fn test_mcp_configuration_document() -> Result<()> {
    let (app, _) = create_test_app().await?;

    let response = send(&app, get_request("/.well-known/mcp-configuration")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert!(body.is_object());
    assert!(body.to_string().contains("http://localhost:9000/oauth/token"));
    Ok(())
}

#[tokio::test]
async fn test_cors_preflight() -> Result<()> {
    let (app, _) = create_test_app().await?;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/oauth/token")
        .header(header::ORIGIN, "https://claude.ai")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type,authorization")
        .body(Body::empty())?;
    let response = send(&app, request).await?;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    let methods = response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS].to_str()?;
    assert!(methods.contains("POST"));
    Ok(())
}

#[tokio::test]
async fn test_cors_restricted_origins() -> Result<()> {
    let mut config = test_config();
    config.cors.allowed_origins = vec!["https://claude.ai".to_owned()];
    let app = build_router(create_test_resources_with(config).await?);

    let allowed = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://claude.ai")
        .body(Body::empty())?;
    let response = send(&app, allowed).await?;
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://claude.ai"
    );

    let denied = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://evil.example.com")
        .body(Body::empty())?;
    let response = send(&app, denied).await?;
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
    Ok(())
}

#[tokio::test]
async fn test_bare_options_returns_no_content() -> Result<()> {
    let (app, _) = create_test_app().await?;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/oauth/register")
        .body(Body::empty())?;
    let response = send(&app, request).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    Ok(())
}

#[tokio::test]
async fn test_request_id_propagation() -> Result<()> {
    let (app, _) = create_test_app().await?;

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "abc-123")
        .body(Body::empty())?;
    let response = send(&app, request).await?;
    assert_eq!(response.headers()["x-request-id"], "abc-123");

    let response = send(&app, get_request("/health")).await?;
    let generated = response.headers()["x-request-id"].to_str()?;
    assert!(uuid::Uuid::parse_str(generated).is_ok());
    Ok(())
}

#[tokio::test]
async fn test_health_and_ready() -> Result<()> {
    let (app, _) = create_test_app().await?;

    let response = send(&app, get_request("/health")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "intervals-mcp-server");
    assert!(body["timestamp"].is_string());

    let response = send(&app, get_request("/ready")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["store"], "memory");
    Ok(())
}

#[tokio::test]
async fn test_unknown_route_is_json_404() -> Result<()> {
    let (app, _) = create_test_app().await?;

    let response = send(&app, get_request("/nope")).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await?;
    assert_eq!(body["error"]["code"], "RESOURCE_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn test_debug_client_seeded_once() -> Result<()> {
    let mut config = test_config();
    config.oauth.seed_debug_client = true;
    let resources = create_test_resources_with(config).await?;

    let client = resources
        .oauth_server
        .clients()
        .get("claude_desktop_debug")
        .await?
        .unwrap();
    assert!(client.is_public);
    assert_eq!(
        client.redirect_uris,
        vec!["https://claude.ai/api/mcp/auth_callback".to_owned()]
    );

    // A second seed against the same store tolerates the existing record
    let again = resources
        .oauth_server
        .registration()
        .seed_debug_client()
        .await?;
    assert!(!again);
    Ok(())
}
