// ABOUTME: OAuth 2.1 entities, wire request/response types and the protocol error type
// ABOUTME: Implements RFC 7591 registration, RFC 6749 token structures and RFC 7636 PKCE fields
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::constants::oauth::{AUTH_METHOD_NONE, PKCE_METHOD_S256};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const RFC6749_AUTHZ_ERRORS: &str = "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1";
const RFC6749_TOKEN_ERRORS: &str = "https://datatracker.ietf.org/doc/html/rfc6749#section-5.2";
const RFC7591_ERRORS: &str = "https://datatracker.ietf.org/doc/html/rfc7591#section-3.2.2";

// ============================================================================
// Stored entities
// ============================================================================

/// Registered OAuth client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuth2Client {
    /// Client identifier
    pub client_id: String,
    /// Hex SHA-256 of the client secret; `None` for public clients
    pub client_secret_hash: Option<String>,
    /// Display name
    pub client_name: String,
    /// Exact redirect targets
    pub redirect_uris: Vec<String>,
    /// Grants the client registered for
    pub grant_types: Vec<String>,
    /// Response types the client registered for
    pub response_types: Vec<String>,
    /// `none` or `client_secret_post`
    pub token_endpoint_auth_method: String,
    /// Whether the client authenticates with PKCE alone
    pub is_public: bool,
    /// Scope granted when a request names none
    pub scope: String,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

impl OAuth2Client {
    /// Whether `redirect_uri` is byte-for-byte one of the registered URIs
    #[must_use]
    pub fn has_redirect_uri(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }

    /// Public clients use auth method `none` and carry no secret
    #[must_use]
    pub fn authenticates_with_secret(&self) -> bool {
        !(self.is_public && self.token_endpoint_auth_method == AUTH_METHOD_NONE)
    }
}

/// Single-use authorization code bound to a PKCE challenge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuth2AuthCode {
    /// Code value
    pub code: String,
    /// Client the code was issued to
    pub client_id: String,
    /// Redirect URI used at authorization time
    pub redirect_uri: String,
    /// PKCE challenge
    pub code_challenge: String,
    /// PKCE method; always `S256` for issued codes
    pub code_challenge_method: String,
    /// Client state echoed on redirect
    pub state: Option<String>,
    /// Granted scope
    pub scope: String,
    /// Expiry in epoch milliseconds
    pub expires_at: i64,
    /// Set once, when the code is redeemed
    pub used: bool,
}

/// Opaque bearer access token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuth2AccessToken {
    /// Token value
    pub token: String,
    /// Owning client
    pub client_id: String,
    /// Granted scope
    pub scope: String,
    /// Expiry in epoch milliseconds
    pub expires_at: i64,
}

/// Refresh token and the access token it is currently paired with
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuth2RefreshToken {
    /// Token value; stable across refreshes
    pub token: String,
    /// Owning client
    pub client_id: String,
    /// Currently paired access token
    pub access_token: String,
    /// Granted scope
    pub scope: String,
    /// Expiry in epoch milliseconds
    pub expires_at: i64,
}

// ============================================================================
// Wire types
// ============================================================================

/// Client registration request (RFC 7591 subset)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClientRegistrationRequest {
    /// Requested redirect URIs
    pub redirect_uris: Option<Vec<String>>,
    /// Display name
    pub client_name: Option<String>,
    /// Requested grants
    pub grant_types: Option<Vec<String>>,
    /// Requested response types
    pub response_types: Option<Vec<String>>,
    /// `none` for public clients
    pub token_endpoint_auth_method: Option<String>,
    /// Requested default scope
    pub scope: Option<String>,
}

/// Client registration response
#[derive(Debug, Serialize, Deserialize)]
pub struct ClientRegistrationResponse {
    /// Issued client id
    pub client_id: String,
    /// Plaintext secret, returned only here and only for confidential clients
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Issue time in epoch seconds
    pub client_id_issued_at: i64,
    /// `0` (never) for confidential clients; omitted for public ones
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret_expires_at: Option<i64>,
    /// Display name
    pub client_name: String,
    /// Accepted redirect URIs after allow-list filtering
    pub redirect_uris: Vec<String>,
    /// Registered grants
    pub grant_types: Vec<String>,
    /// Registered response types
    pub response_types: Vec<String>,
    /// Token endpoint auth method
    pub token_endpoint_auth_method: String,
    /// Default scope
    pub scope: String,
}

/// Authorization request query parameters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthorizeRequest {
    /// Must be `code`
    pub response_type: Option<String>,
    /// Client identifier
    pub client_id: Option<String>,
    /// Redirect target; must exactly match a registered URI
    pub redirect_uri: Option<String>,
    /// Requested scope
    pub scope: Option<String>,
    /// Opaque client state
    pub state: Option<String>,
    /// PKCE challenge
    pub code_challenge: Option<String>,
    /// PKCE method; must be `S256`
    pub code_challenge_method: Option<String>,
}

impl AuthorizeRequest {
    /// Whether the PKCE parameters are present and use `S256`
    #[must_use]
    pub fn has_valid_pkce(&self) -> bool {
        self.code_challenge.as_deref().is_some_and(|c| !c.is_empty())
            && self.code_challenge_method.as_deref() == Some(PKCE_METHOD_S256)
    }
}

/// Token request (JSON or form body)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenRequest {
    /// `authorization_code` or `refresh_token`
    pub grant_type: Option<String>,
    /// Authorization code
    pub code: Option<String>,
    /// Redirect URI used at authorization time
    pub redirect_uri: Option<String>,
    /// Client identifier
    pub client_id: Option<String>,
    /// Client secret (confidential clients)
    pub client_secret: Option<String>,
    /// PKCE verifier
    pub code_verifier: Option<String>,
    /// Refresh token
    pub refresh_token: Option<String>,
}

/// Successful token response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// New access token
    pub access_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    /// Refresh token; unchanged across refresh grants
    pub refresh_token: String,
    /// Granted scope
    pub scope: String,
}

// ============================================================================
// Protocol errors
// ============================================================================

/// OAuth error response body with its HTTP status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuth2Error {
    /// Error code from the OAuth vocabulary
    pub error: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// Link to the defining RFC section
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
    /// HTTP status for direct responses
    #[serde(skip, default = "default_error_status")]
    pub status: u16,
}

const fn default_error_status() -> u16 {
    400
}

impl OAuth2Error {
    fn new(error: &str, description: &str, error_uri: &str, status: StatusCode) -> Self {
        Self {
            error: error.to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some(error_uri.to_owned()),
            status: status.as_u16(),
        }
    }

    /// `invalid_request` (400)
    #[must_use]
    pub fn invalid_request(description: &str) -> Self {
        Self::new(
            "invalid_request",
            description,
            RFC6749_AUTHZ_ERRORS,
            StatusCode::BAD_REQUEST,
        )
    }

    /// `invalid_client` (401)
    #[must_use]
    pub fn invalid_client(description: &str) -> Self {
        Self::new(
            "invalid_client",
            description,
            RFC6749_TOKEN_ERRORS,
            StatusCode::UNAUTHORIZED,
        )
    }

    /// `invalid_grant` (400)
    #[must_use]
    pub fn invalid_grant(description: &str) -> Self {
        Self::new(
            "invalid_grant",
            description,
            RFC6749_TOKEN_ERRORS,
            StatusCode::BAD_REQUEST,
        )
    }

    /// `unsupported_grant_type` (400)
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self::new(
            "unsupported_grant_type",
            "Grant type not supported",
            RFC6749_TOKEN_ERRORS,
            StatusCode::BAD_REQUEST,
        )
    }

    /// `unsupported_response_type` (400)
    #[must_use]
    pub fn unsupported_response_type() -> Self {
        Self::new(
            "unsupported_response_type",
            "Only the 'code' response_type is supported",
            RFC6749_AUTHZ_ERRORS,
            StatusCode::BAD_REQUEST,
        )
    }

    /// `invalid_redirect_uri` (400)
    #[must_use]
    pub fn invalid_redirect_uri(description: &str) -> Self {
        Self::new(
            "invalid_redirect_uri",
            description,
            RFC7591_ERRORS,
            StatusCode::BAD_REQUEST,
        )
    }

    /// `invalid_token` (401), used by the bearer middleware
    #[must_use]
    pub fn invalid_token(description: &str) -> Self {
        Self::new(
            "invalid_token",
            description,
            "https://datatracker.ietf.org/doc/html/rfc6750#section-3.1",
            StatusCode::UNAUTHORIZED,
        )
    }

    /// `server_error` (500); never carries internal detail
    #[must_use]
    pub fn server_error() -> Self {
        Self {
            error: "server_error".to_owned(),
            error_description: Some("The server encountered an unexpected condition".to_owned()),
            error_uri: None,
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        }
    }

    /// Override the HTTP status of a direct response
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status.as_u16();
        self
    }

    /// HTTP status for a direct response
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_REQUEST)
    }
}

impl std::fmt::Display for OAuth2Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {description}", self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for OAuth2Error {}

impl IntoResponse for OAuth2Error {
    fn into_response(self) -> Response {
        let mut response = (self.status_code(), Json(&self)).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        response
    }
}
