// ABOUTME: OAuth 2.0 dynamic client registration (RFC 7591) with a redirect URI allow-list
// ABOUTME: Issues public or confidential clients and seeds well-known clients idempotently
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::crypto::{random_token, sha256_hex};
use super::models::{
    ClientRegistrationRequest, ClientRegistrationResponse, OAuth2Client, OAuth2Error,
};
use super::stores::ClientStore;
use crate::config::environment::OAuthServerConfig;
use crate::constants::oauth::{
    debug_client, AUTH_METHOD_CLIENT_SECRET_POST, AUTH_METHOD_NONE, CLIENT_ID_BYTES,
    CLIENT_ID_PREFIX, DEFAULT_CLIENT_NAME, GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN,
    RESPONSE_TYPE_CODE, TOKEN_BYTES,
};
use crate::errors::AppResult;
use crate::logging::AppLogger;
use chrono::Utc;
use std::sync::Arc;

/// Attempts at finding an unused client id before giving up
const MAX_CLIENT_ID_ATTEMPTS: usize = 3;

/// OAuth 2.0 client registration manager
#[derive(Clone)]
pub struct ClientRegistrationManager {
    clients: ClientStore,
    policy: Arc<OAuthServerConfig>,
}

impl ClientRegistrationManager {
    /// Creates a new client registration manager
    #[must_use]
    pub const fn new(clients: ClientStore, policy: Arc<OAuthServerConfig>) -> Self {
        Self { clients, policy }
    }

    /// Register a new client
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for malformed metadata, `invalid_redirect_uri` when no
    /// requested redirect URI survives the allow-list, and `server_error` on storage failure
    pub async fn register_client(
        &self,
        request: ClientRegistrationRequest,
    ) -> Result<ClientRegistrationResponse, OAuth2Error> {
        let requested_uris = request.redirect_uris.unwrap_or_default();
        if requested_uris.is_empty() {
            return Err(OAuth2Error::invalid_request(
                "At least one redirect_uri is required",
            ));
        }

        let grant_types = validate_values(
            request.grant_types,
            GRANT_AUTHORIZATION_CODE,
            is_supported_grant_type,
            "grant_type",
        )?;
        let response_types = validate_values(
            request.response_types,
            RESPONSE_TYPE_CODE,
            is_supported_response_type,
            "response_type",
        )?;

        let redirect_uris: Vec<String> = requested_uris
            .into_iter()
            .filter(|uri| self.is_allowed_redirect_uri(uri))
            .collect();
        if redirect_uris.is_empty() {
            AppLogger::log_security_event(
                "registration_redirect_rejected",
                "medium",
                None,
                "no requested redirect_uri is on the allow-list",
            );
            return Err(OAuth2Error::invalid_redirect_uri(
                "None of the requested redirect_uris are allowed",
            ));
        }

        let is_public = request.token_endpoint_auth_method.as_deref() == Some(AUTH_METHOD_NONE);
        let client_secret = if is_public {
            None
        } else {
            Some(random_token(TOKEN_BYTES).map_err(|_| OAuth2Error::server_error())?)
        };

        let mut client = OAuth2Client {
            client_id: String::new(),
            client_secret_hash: client_secret.as_deref().map(sha256_hex),
            client_name: request
                .client_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CLIENT_NAME.to_owned()),
            redirect_uris,
            grant_types,
            response_types,
            token_endpoint_auth_method: if is_public {
                AUTH_METHOD_NONE.to_owned()
            } else {
                AUTH_METHOD_CLIENT_SECRET_POST.to_owned()
            },
            is_public,
            scope: request
                .scope
                .filter(|scope| !scope.trim().is_empty())
                .unwrap_or_else(|| self.policy.default_scope.clone()), // Safe: policy outlives request
            created_at: Utc::now(),
        };

        self.store_with_fresh_id(&mut client).await?;

        AppLogger::log_oauth_event(
            &client.client_id,
            "client_registered",
            true,
            Some(if is_public { "public" } else { "confidential" }),
        );

        Ok(ClientRegistrationResponse {
            client_id_issued_at: client.created_at.timestamp(),
            client_secret_expires_at: client_secret.as_ref().map(|_| 0),
            client_secret,
            client_id: client.client_id,
            client_name: client.client_name,
            redirect_uris: client.redirect_uris,
            grant_types: client.grant_types,
            response_types: client.response_types,
            token_endpoint_auth_method: client.token_endpoint_auth_method,
            scope: client.scope,
        })
    }

    async fn store_with_fresh_id(&self, client: &mut OAuth2Client) -> Result<(), OAuth2Error> {
        for _ in 0..MAX_CLIENT_ID_ATTEMPTS {
            client.client_id = generate_client_id().map_err(|_| OAuth2Error::server_error())?;
            match self.clients.insert_if_absent(client).await {
                Ok(true) => return Ok(()),
                Ok(false) => {
                    tracing::warn!(client_id = %client.client_id, "Generated client id collided, retrying");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to store OAuth client registration");
                    return Err(OAuth2Error::server_error());
                }
            }
        }
        tracing::error!("Could not allocate an unused client id");
        Err(OAuth2Error::server_error())
    }

    /// Insert `client` unless a client with the same id exists; returns whether it was inserted
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure
    pub async fn ensure_client(&self, client: &OAuth2Client) -> AppResult<bool> {
        let inserted = self.clients.insert_if_absent(client).await?;
        if inserted {
            tracing::info!(client_id = %client.client_id, "Seeded OAuth client");
        } else {
            tracing::debug!(client_id = %client.client_id, "OAuth client already present, seed skipped");
        }
        Ok(inserted)
    }

    /// Seed the well-known public debug client
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure
    pub async fn seed_debug_client(&self) -> AppResult<bool> {
        let client = OAuth2Client {
            client_id: debug_client::CLIENT_ID.to_owned(),
            client_secret_hash: None,
            client_name: debug_client::CLIENT_NAME.to_owned(),
            redirect_uris: vec![debug_client::REDIRECT_URI.to_owned()],
            grant_types: vec![
                GRANT_AUTHORIZATION_CODE.to_owned(),
                GRANT_REFRESH_TOKEN.to_owned(),
            ],
            response_types: vec![RESPONSE_TYPE_CODE.to_owned()],
            token_endpoint_auth_method: AUTH_METHOD_NONE.to_owned(),
            is_public: true,
            scope: self.policy.default_scope.clone(), // Safe: policy outlives seed
            created_at: Utc::now(),
        };
        self.ensure_client(&client).await
    }

    /// Whether a redirect URI may be registered
    #[must_use]
    pub fn is_allowed_redirect_uri(&self, uri: &str) -> bool {
        if !validate_uri_format(uri) {
            return false;
        }
        let Ok(parsed) = url::Url::parse(uri) else {
            tracing::warn!(redirect_uri = %uri, "Rejected malformed redirect_uri");
            return false;
        };

        if self.policy.allowed_redirect_uris.iter().any(|allowed| allowed == uri) {
            return true;
        }
        if self.policy.allow_loopback_redirects && is_loopback(&parsed) {
            return true;
        }

        tracing::warn!(redirect_uri = %uri, "Rejected redirect_uri not on the allow-list");
        false
    }
}

/// Reject empty, fragment-bearing and wildcard URIs before any matching
fn validate_uri_format(uri: &str) -> bool {
    if uri.trim().is_empty() {
        return false;
    }
    if uri.contains('#') {
        tracing::warn!(redirect_uri = %uri, "Rejected redirect_uri with fragment");
        return false;
    }
    if uri.contains('*') {
        tracing::warn!(redirect_uri = %uri, "Rejected redirect_uri with wildcard");
        return false;
    }
    true
}

fn is_loopback(parsed: &url::Url) -> bool {
    parsed.scheme() == "http"
        && matches!(
            parsed.host_str(),
            Some("localhost" | "127.0.0.1" | "[::1]")
        )
}

fn is_supported_grant_type(grant_type: &str) -> bool {
    matches!(grant_type, GRANT_AUTHORIZATION_CODE | GRANT_REFRESH_TOKEN)
}

fn is_supported_response_type(response_type: &str) -> bool {
    response_type == RESPONSE_TYPE_CODE
}

/// Default to `[default]` when absent; reject empty lists and unsupported members
fn validate_values(
    values: Option<Vec<String>>,
    default: &str,
    supported: fn(&str) -> bool,
    field: &str,
) -> Result<Vec<String>, OAuth2Error> {
    let Some(values) = values else {
        return Ok(vec![default.to_owned()]);
    };
    if values.is_empty() {
        return Err(OAuth2Error::invalid_request(&format!(
            "{field}s must not be empty"
        )));
    }
    if let Some(unsupported) = values.iter().find(|value| !supported(value)) {
        return Err(OAuth2Error::invalid_request(&format!(
            "Unsupported {field}: {unsupported}"
        )));
    }
    Ok(values)
}

fn generate_client_id() -> AppResult<String> {
    Ok(format!("{CLIENT_ID_PREFIX}{}", random_token(CLIENT_ID_BYTES)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_format_rejections() {
        assert!(!validate_uri_format(""));
        assert!(!validate_uri_format("https://claude.ai/cb#frag"));
        assert!(!validate_uri_format("https://*.claude.ai/cb"));
        assert!(validate_uri_format("https://claude.ai/api/mcp/auth_callback"));
    }

    #[test]
    fn test_loopback_detection() {
        assert!(is_loopback(&url::Url::parse("http://localhost:3000/cb").unwrap()));
        assert!(is_loopback(&url::Url::parse("http://127.0.0.1/cb").unwrap()));
        assert!(!is_loopback(&url::Url::parse("https://localhost/cb").unwrap()));
        assert!(!is_loopback(&url::Url::parse("http://localhost.evil.com/cb").unwrap()));
    }

    #[test]
    fn test_validate_values() {
        assert_eq!(
            validate_values(None, "code", is_supported_response_type, "response_type").unwrap(),
            vec!["code"]
        );
        let err = validate_values(
            Some(vec!["client_credentials".to_owned()]),
            "authorization_code",
            is_supported_grant_type,
            "grant_type",
        )
        .unwrap_err();
        assert_eq!(err.error, "invalid_request");
    }

    #[test]
    fn test_generated_client_id_prefix() {
        let id = generate_client_id().unwrap();
        assert!(id.starts_with("intervals_mcp_"));
        assert!(id.len() > "intervals_mcp_".len());
    }
}
