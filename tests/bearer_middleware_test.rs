// ABOUTME: Integration tests for bearer authentication on the protected MCP endpoint
// ABOUTME: Verifies WWW-Authenticate challenges, token expiry and refresh invalidation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::{body_json, create_test_app, form_request, obtain_tokens, send};
use intervals_mcp_server::oauth2_server::crypto::now_millis;

fn mcp_request(method: Method, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri("/mcp");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_missing_token_gets_challenge() -> Result<()> {
    let (app, _) = create_test_app().await?;

    let response = send(&app, mcp_request(Method::GET, None)).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response.headers()[header::WWW_AUTHENTICATE].to_str()?.to_owned();
    assert!(challenge.starts_with("Bearer realm=\"intervals-mcp-server\""));
    assert!(!challenge.contains("error="));
    assert!(challenge.contains(
        "resource_metadata=\"http://localhost:9000/.well-known/oauth-protected-resource\""
    ));
    Ok(())
}

#[tokio::test]
async fn test_invalid_token_gets_invalid_token_challenge() -> Result<()> {
    let (app, _) = create_test_app().await?;

    let response = send(&app, mcp_request(Method::POST, Some("bogus"))).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response.headers()[header::WWW_AUTHENTICATE].to_str()?.to_owned();
    assert!(challenge.contains("error=\"invalid_token\""));
    assert_eq!(body_json(response).await?["error"], "invalid_token");
    Ok(())
}

#[tokio::test]
async fn test_valid_token_reaches_handler() -> Result<()> {
    let (app, _) = create_test_app().await?;
    let (client_id, tokens) = obtain_tokens(&app).await?;
    let access = tokens["access_token"].as_str().unwrap();

    for method in [Method::GET, Method::POST] {
        let response = send(&app, mcp_request(method, Some(access))).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await?;
        assert_eq!(body["client_id"], client_id.as_str());
        assert_eq!(body["scope"], "intervals:read intervals:write");
    }
    Ok(())
}

#[tokio::test]
async fn test_lowercase_scheme_accepted() -> Result<()> {
    let (app, _) = create_test_app().await?;
    let (_, tokens) = obtain_tokens(&app).await?;

    let request = Request::builder()
        .uri("/mcp")
        .header(
            header::AUTHORIZATION,
            format!("bearer {}", tokens["access_token"].as_str().unwrap()),
        )
        .body(Body::empty())?;
    let response = send(&app, request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_expired_token_rejected() -> Result<()> {
    let (app, resources) = create_test_app().await?;
    let (_, tokens) = obtain_tokens(&app).await?;
    let access = tokens["access_token"].as_str().unwrap();

    let token_store = resources.oauth_server.tokens();
    let mut record = token_store.get_access(access).await?.unwrap();
    record.expires_at = now_millis() - 1;
    token_store.put_access(&record).await?;

    let response = send(&app, mcp_request(Method::GET, Some(access))).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(token_store.get_access(access).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_superseded_token_rejected_after_refresh() -> Result<()> {
    let (app, _) = create_test_app().await?;
    let (client_id, tokens) = obtain_tokens(&app).await?;
    let old_access = tokens["access_token"].as_str().unwrap();

    let refreshed = send(
        &app,
        form_request(
            "/oauth/token",
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", tokens["refresh_token"].as_str().unwrap()),
                ("client_id", &client_id),
            ],
        ),
    )
    .await?;
    let new_access = body_json(refreshed).await?["access_token"]
        .as_str()
        .unwrap()
        .to_owned();

    let old = send(&app, mcp_request(Method::GET, Some(old_access))).await?;
    assert_eq!(old.status(), StatusCode::UNAUTHORIZED);
    let new = send(&app, mcp_request(Method::GET, Some(&new_access))).await?;
    assert_eq!(new.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_options_bypasses_authentication() -> Result<()> {
    let (app, _) = create_test_app().await?;

    let response = send(&app, mcp_request(Method::OPTIONS, None)).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    Ok(())
}
