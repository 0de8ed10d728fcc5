// ABOUTME: Integration tests for the authorization endpoint
// ABOUTME: Covers code issuance, the redirect-versus-JSON error split and PKCE enforcement
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use anyhow::Result;
use axum::http::{header, StatusCode};
use common::{
    authorize_uri, body_json, create_test_app, get_request, location_param,
    register_public_client, send, test_challenge, TEST_REDIRECT_URI,
};

fn query(pairs: &[(&str, &str)]) -> String {
    format!(
        "/oauth/authorize?{}",
        serde_urlencoded::to_string(pairs).unwrap()
    )
}

#[tokio::test]
async fn test_authorize_issues_code_and_echoes_state() -> Result<()> {
    let (app, resources) = create_test_app().await?;
    let client_id = register_public_client(&app).await?;

    let response = send(&app, get_request(&authorize_uri(&client_id, Some("xyz")))).await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str()?.to_owned();
    assert!(location.starts_with(TEST_REDIRECT_URI));
    assert_eq!(location_param(&response, "state").as_deref(), Some("xyz"));

    let code = location_param(&response, "code").unwrap();
    let stored = resources.oauth_server.codes().get(&code).await?.unwrap();
    assert_eq!(stored.client_id, client_id);
    assert_eq!(stored.redirect_uri, TEST_REDIRECT_URI);
    assert_eq!(stored.code_challenge, test_challenge());
    assert_eq!(stored.code_challenge_method, "S256");
    assert_eq!(stored.scope, "intervals:read intervals:write");
    assert!(!stored.used);
    Ok(())
}

#[tokio::test]
async fn test_authorize_uses_requested_scope() -> Result<()> {
    let (app, resources) = create_test_app().await?;
    let client_id = register_public_client(&app).await?;
    let challenge = test_challenge();

    let response = send(
        &app,
        get_request(&query(&[
            ("response_type", "code"),
            ("client_id", &client_id),
            ("redirect_uri", TEST_REDIRECT_URI),
            ("code_challenge", &challenge),
            ("code_challenge_method", "S256"),
            ("scope", "intervals:read"),
        ])),
    )
    .await?;

    let code = location_param(&response, "code").unwrap();
    let stored = resources.oauth_server.codes().get(&code).await?.unwrap();
    assert_eq!(stored.scope, "intervals:read");
    Ok(())
}

#[tokio::test]
async fn test_unsupported_response_type_redirects() -> Result<()> {
    let (app, _) = create_test_app().await?;
    let client_id = register_public_client(&app).await?;

    let response = send(
        &app,
        get_request(&query(&[
            ("response_type", "token"),
            ("client_id", &client_id),
            ("redirect_uri", TEST_REDIRECT_URI),
            ("state", "s1"),
        ])),
    )
    .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location_param(&response, "error").as_deref(),
        Some("unsupported_response_type")
    );
    assert_eq!(location_param(&response, "state").as_deref(), Some("s1"));
    Ok(())
}

#[tokio::test]
async fn test_unsupported_response_type_without_redirect_is_json() -> Result<()> {
    let (app, _) = create_test_app().await?;

    let response = send(&app, get_request(&query(&[("response_type", "token")]))).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await?["error"], "unsupported_response_type");
    Ok(())
}

#[tokio::test]
async fn test_unknown_client_without_redirect_is_json_400() -> Result<()> {
    let (app, _) = create_test_app().await?;

    let response = send(
        &app,
        get_request(&query(&[("response_type", "code"), ("client_id", "nope")])),
    )
    .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await?["error"], "invalid_client");
    Ok(())
}

#[tokio::test]
async fn test_missing_redirect_uri_is_json() -> Result<()> {
    let (app, _) = create_test_app().await?;
    let client_id = register_public_client(&app).await?;

    let response = send(
        &app,
        get_request(&query(&[("response_type", "code"), ("client_id", &client_id)])),
    )
    .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(header::LOCATION).is_none());
    assert_eq!(body_json(response).await?["error"], "invalid_redirect_uri");
    Ok(())
}

async fn assert_redirect_rejected(redirect_uri: &str) -> Result<()> {
    let (app, _) = create_test_app().await?;
    let client_id = register_public_client(&app).await?;
    let challenge = test_challenge();

    let response = send(
        &app,
        get_request(&query(&[
            ("response_type", "code"),
            ("client_id", &client_id),
            ("redirect_uri", redirect_uri),
            ("code_challenge", &challenge),
            ("code_challenge_method", "S256"),
        ])),
    )
    .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{redirect_uri}");
    assert!(response.headers().get(header::LOCATION).is_none());
    assert_eq!(body_json(response).await?["error"], "invalid_redirect_uri");
    Ok(())
}

#[tokio::test]
async fn test_unregistered_redirect_never_redirects() -> Result<()> {
    assert_redirect_rejected("http://localhost:3000/other").await
}

#[tokio::test]
async fn test_redirect_with_trailing_slash_rejected() -> Result<()> {
    assert_redirect_rejected(&format!("{TEST_REDIRECT_URI}/")).await
}

#[tokio::test]
async fn test_redirect_with_extra_query_rejected() -> Result<()> {
    assert_redirect_rejected(&format!("{TEST_REDIRECT_URI}?x=1")).await
}

#[tokio::test]
async fn test_missing_pkce_redirects_invalid_request() -> Result<()> {
    let (app, _) = create_test_app().await?;
    let client_id = register_public_client(&app).await?;

    let response = send(
        &app,
        get_request(&query(&[
            ("response_type", "code"),
            ("client_id", &client_id),
            ("redirect_uri", TEST_REDIRECT_URI),
            ("state", "abc"),
        ])),
    )
    .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location_param(&response, "error").as_deref(), Some("invalid_request"));
    assert_eq!(location_param(&response, "state").as_deref(), Some("abc"));
    assert!(location_param(&response, "code").is_none());
    Ok(())
}

#[tokio::test]
async fn test_plain_pkce_method_rejected() -> Result<()> {
    let (app, _) = create_test_app().await?;
    let client_id = register_public_client(&app).await?;

    let response = send(
        &app,
        get_request(&query(&[
            ("response_type", "code"),
            ("client_id", &client_id),
            ("redirect_uri", TEST_REDIRECT_URI),
            ("code_challenge", "verifier-as-challenge"),
            ("code_challenge_method", "plain"),
        ])),
    )
    .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location_param(&response, "error").as_deref(), Some("invalid_request"));
    Ok(())
}
