// ABOUTME: Bearer token middleware guarding protected routes
// ABOUTME: Resolves opaque access tokens through the token store and injects AuthContext into extensions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Bearer authentication
//!
//! Protected handlers read the authenticated session with
//! `Extension(auth): Extension<AuthContext>`. `OPTIONS` requests pass through untouched so
//! CORS preflights never need credentials.

use crate::logging::redact_token;
use crate::oauth2_server::models::OAuth2Error;
use crate::resources::ServerResources;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{field::Empty, Span};

/// Authenticated session attached to protected requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Client the token was issued to
    pub client_id: String,
    /// Presented access token
    pub token: String,
    /// Space-separated granted scope
    pub scope: String,
}

impl AuthContext {
    /// Whether the granted scope contains `tag`
    #[must_use]
    pub fn has_scope(&self, tag: &str) -> bool {
        self.scope.split_whitespace().any(|granted| granted == tag)
    }
}

/// Token from an `Authorization: Bearer <token>` header; the scheme is case-insensitive
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Require a live access token
#[tracing::instrument(
    name = "bearer_auth",
    skip(resources, req, next),
    fields(client_id = Empty, success = Empty)
)]
pub async fn require_bearer(
    State(resources): State<Arc<ServerResources>>,
    mut req: Request,
    next: Next,
) -> Response {
    if req.method() == Method::OPTIONS {
        return next.run(req).await;
    }

    let Some(token) = bearer_token(req.headers()).map(str::to_owned) else {
        Span::current().record("success", false);
        tracing::debug!("Protected request without bearer token");
        return unauthorized(&resources, None, "Missing bearer token");
    };

    match resources.oauth_server.validate_access_token(&token).await {
        Ok(Some(record)) => {
            Span::current()
                .record("client_id", record.client_id.as_str())
                .record("success", true);
            req.extensions_mut().insert(AuthContext {
                client_id: record.client_id,
                token,
                scope: record.scope,
            });
            next.run(req).await
        }
        Ok(None) => {
            Span::current().record("success", false);
            tracing::info!(token = %redact_token(&token), "Rejected unknown or expired access token");
            unauthorized(
                &resources,
                Some("invalid_token"),
                "Invalid or expired access token",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Token store lookup failed");
            OAuth2Error::server_error().into_response()
        }
    }
}

/// 401 with a JSON body and a `WWW-Authenticate` challenge
fn unauthorized(
    resources: &ServerResources,
    error: Option<&str>,
    description: &str,
) -> Response {
    let mut challenge = format!(
        "Bearer realm=\"{}\"",
        resources.config.oauth.realm.replace('"', "")
    );
    if let Some(error) = error {
        challenge.push_str(&format!(
            ", error=\"{error}\", error_description=\"{description}\""
        ));
    }
    challenge.push_str(&format!(
        ", resource_metadata=\"{}\"",
        resources.discovery.protected_resource_metadata_url()
    ));

    let mut response = OAuth2Error::invalid_token(description).into_response();
    match HeaderValue::from_str(&challenge) {
        Ok(value) => {
            response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
        }
        Err(e) => {
            tracing::error!(error = %e, "Could not encode WWW-Authenticate challenge");
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
    }
    response
}
