// ABOUTME: OAuth 2.1 authorization server route handlers for registration, authorization and token exchange
// ABOUTME: Parses wire formats and delegates every decision to OAuth2AuthorizationServer
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! OAuth 2.1 server routes
//!
//! Every failure leaves these handlers as OAuth error JSON (or an error redirect from
//! `/oauth/authorize`); malformed bodies never fall through to axum's plain-text rejections.

use crate::oauth2_server::endpoints::found;
use crate::oauth2_server::models::{
    AuthorizeRequest, ClientRegistrationRequest, OAuth2Error, TokenRequest,
};
use crate::resources::ServerResources;
use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

/// OAuth 2.1 server routes
pub struct OAuth2Routes;

impl OAuth2Routes {
    /// Create `/oauth/register`, `/oauth/authorize` and `/oauth/token`
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/oauth/register", post(Self::handle_register))
            .route("/oauth/authorize", get(Self::handle_authorize))
            .route("/oauth/token", post(Self::handle_token))
            .with_state(resources)
    }

    /// Handle RFC 7591 dynamic client registration
    async fn handle_register(
        State(resources): State<Arc<ServerResources>>,
        body: Bytes,
    ) -> Response {
        let request: ClientRegistrationRequest = match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(error = %e, "Malformed registration body");
                return OAuth2Error::invalid_request("Request body must be a JSON object")
                    .into_response();
            }
        };

        match resources
            .oauth_server
            .registration()
            .register_client(request)
            .await
        {
            Ok(registered) => no_store((StatusCode::CREATED, Json(registered)).into_response()),
            Err(error) => error.into_response(),
        }
    }

    /// Handle the authorization endpoint; consent is implicit
    async fn handle_authorize(
        State(resources): State<Arc<ServerResources>>,
        RawQuery(query): RawQuery,
    ) -> Response {
        let request: AuthorizeRequest =
            match serde_urlencoded::from_str(query.as_deref().unwrap_or_default()) {
                Ok(request) => request,
                Err(e) => {
                    tracing::debug!(error = %e, "Malformed authorization query");
                    return OAuth2Error::invalid_request("Malformed query string").into_response();
                }
            };

        match resources.oauth_server.authorize(request).await {
            Ok(location) => found(&location),
            Err(error) => {
                tracing::info!(error = error.error_code(), "Authorization request rejected");
                error.into_response()
            }
        }
    }

    /// Handle the token endpoint for JSON or form-encoded bodies
    async fn handle_token(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        let request = match parse_token_request(&headers, &body) {
            Ok(request) => request,
            Err(error) => return error.into_response(),
        };

        match resources.oauth_server.token(request).await {
            Ok(tokens) => no_store(Json(tokens).into_response()),
            Err(error) => error.into_response(),
        }
    }
}

/// Decode a token request by `Content-Type`; anything other than JSON is read as a form
fn parse_token_request(headers: &HeaderMap, body: &[u8]) -> Result<TokenRequest, OAuth2Error> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim_start().starts_with("application/json"));

    if is_json {
        serde_json::from_slice(body).map_err(|e| {
            tracing::debug!(error = %e, "Malformed JSON token request");
            OAuth2Error::invalid_request("Request body must be a JSON object")
        })
    } else {
        serde_urlencoded::from_bytes(body).map_err(|e| {
            tracing::debug!(error = %e, "Malformed form token request");
            OAuth2Error::invalid_request("Request body must be application/x-www-form-urlencoded")
        })
    }
}

/// Credentials in the body must never be cached
fn no_store(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}
