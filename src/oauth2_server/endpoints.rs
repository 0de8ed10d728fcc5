// ABOUTME: OAuth 2.1 authorization and token endpoint state machines
// ABOUTME: Issues PKCE-bound single-use codes and opaque access/refresh tokens with refresh re-pairing
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

// NOTE: `.clone()` calls in this file move strings into newly minted records

use super::client_registration::ClientRegistrationManager;
use super::crypto::{constant_time_eq, expires_at_from_now, random_token, sha256_hex, verify_pkce};
use super::models::{
    AuthorizeRequest, OAuth2AccessToken, OAuth2AuthCode, OAuth2Client, OAuth2Error,
    OAuth2RefreshToken, TokenRequest, TokenResponse,
};
use super::stores::{ClientStore, CodeStore, TokenStore};
use crate::config::environment::OAuthServerConfig;
use crate::constants::oauth::{
    GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN, PKCE_METHOD_S256, RESPONSE_TYPE_CODE,
    TOKEN_BYTES, TOKEN_TYPE_BEARER,
};
use crate::errors::{AppError, AppResult};
use crate::logging::{redact_token, AppLogger};
use crate::store::Store;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::Duration;

/// Authorization endpoint failure, split by delivery channel
#[derive(Debug)]
pub enum AuthorizeError {
    /// Deliver to the client's redirect URI as query parameters
    Redirect {
        /// Target URI
        redirect_uri: String,
        /// Error to deliver
        error: OAuth2Error,
        /// Client state to echo
        state: Option<String>,
    },
    /// Respond directly with JSON; no safe redirect target exists
    Direct(OAuth2Error),
}

impl AuthorizeError {
    /// OAuth error code carried by either variant
    #[must_use]
    pub fn error_code(&self) -> &str {
        match self {
            Self::Redirect { error, .. } | Self::Direct(error) => &error.error,
        }
    }
}

impl IntoResponse for AuthorizeError {
    fn into_response(self) -> Response {
        match self {
            Self::Redirect {
                redirect_uri,
                error,
                state,
            } => {
                let mut params = vec![("error", error.error)];
                if let Some(description) = error.error_description {
                    params.push(("error_description", description));
                }
                if let Some(state) = state {
                    params.push(("state", state));
                }
                append_query(&redirect_uri, &params).map_or_else(
                    || OAuth2Error::invalid_request("Malformed redirect_uri").into_response(),
                    |location| found(&location),
                )
            }
            Self::Direct(error) => error.into_response(),
        }
    }
}

/// 302 with `Location`
#[must_use]
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// Append query parameters, keeping any already present; `None` if `base` is not an absolute URL
fn append_query(base: &str, params: &[(&str, String)]) -> Option<String> {
    let mut url = url::Url::parse(base).ok()?;
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    Some(url.into())
}

/// OAuth 2.1 authorization server
#[derive(Clone)]
pub struct OAuth2AuthorizationServer {
    clients: ClientStore,
    codes: CodeStore,
    tokens: TokenStore,
    registration: ClientRegistrationManager,
    policy: Arc<OAuthServerConfig>,
}

impl OAuth2AuthorizationServer {
    /// Build the server over one backend
    #[must_use]
    pub fn new(store: Store, policy: Arc<OAuthServerConfig>) -> Self {
        let clients = ClientStore::new(store.clone()); // Safe: Store is a cheap handle
        Self {
            registration: ClientRegistrationManager::new(clients.clone(), Arc::clone(&policy)),
            clients,
            codes: CodeStore::new(store.clone()),
            tokens: TokenStore::new(store),
            policy,
        }
    }

    /// Registration manager sharing this server's client store
    #[must_use]
    pub const fn registration(&self) -> &ClientRegistrationManager {
        &self.registration
    }

    /// Client store
    #[must_use]
    pub const fn clients(&self) -> &ClientStore {
        &self.clients
    }

    /// Authorization code store
    #[must_use]
    pub const fn codes(&self) -> &CodeStore {
        &self.codes
    }

    /// Token store
    #[must_use]
    pub const fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Server policy
    #[must_use]
    pub fn policy(&self) -> &OAuthServerConfig {
        &self.policy
    }

    // ========================================================================
    // Authorization endpoint
    // ========================================================================

    /// Handle `GET /oauth/authorize`; returns the success redirect URL
    ///
    /// Consent is implicit: every check passing grants the request.
    ///
    /// # Errors
    ///
    /// Returns a redirect-borne error once a redirect target exists, a direct error otherwise
    pub async fn authorize(&self, request: AuthorizeRequest) -> Result<String, AuthorizeError> {
        let redirect_target = request
            .redirect_uri
            .as_deref()
            .filter(|uri| url::Url::parse(uri).is_ok());
        let redirect_or_direct = |error: OAuth2Error| match redirect_target {
            Some(uri) => AuthorizeError::Redirect {
                redirect_uri: uri.to_owned(),
                error,
                state: request.state.clone(), // Safe: echoed to the client
            },
            None => AuthorizeError::Direct(error),
        };

        if request.response_type.as_deref() != Some(RESPONSE_TYPE_CODE) {
            return Err(redirect_or_direct(OAuth2Error::unsupported_response_type()));
        }

        let client = match self.lookup_client(request.client_id.as_deref()).await {
            Ok(Some(client)) => client,
            Ok(None) => {
                return Err(redirect_or_direct(
                    OAuth2Error::invalid_client("Unknown client")
                        .with_status(StatusCode::BAD_REQUEST),
                ))
            }
            Err(e) => {
                tracing::error!(error = %e, "Client lookup failed during authorization");
                return Err(AuthorizeError::Direct(OAuth2Error::server_error()));
            }
        };

        let Some(redirect_uri) = request.redirect_uri.as_deref() else {
            return Err(AuthorizeError::Direct(OAuth2Error::invalid_redirect_uri(
                "Missing redirect_uri",
            )));
        };
        if !client.has_redirect_uri(redirect_uri) {
            AppLogger::log_security_event(
                "authorize_redirect_mismatch",
                "medium",
                Some(&client.client_id),
                "redirect_uri is not registered for this client",
            );
            return Err(AuthorizeError::Direct(OAuth2Error::invalid_redirect_uri(
                "redirect_uri does not match a registered redirect URI",
            )));
        }

        let redirect_error = |error: OAuth2Error| AuthorizeError::Redirect {
            redirect_uri: redirect_uri.to_owned(),
            error,
            state: request.state.clone(), // Safe: echoed to the client
        };

        if !request.has_valid_pkce() {
            return Err(redirect_error(OAuth2Error::invalid_request(
                "PKCE with code_challenge_method=S256 is required",
            )));
        }

        let scope = request
            .scope
            .as_deref()
            .filter(|scope| !scope.trim().is_empty())
            .unwrap_or(client.scope.as_str())
            .to_owned();

        let code = self
            .issue_code(&client, redirect_uri, &request, scope)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, client_id = %client.client_id, "Failed to issue authorization code");
                redirect_error(OAuth2Error::server_error())
            })?;

        AppLogger::log_oauth_event(&client.client_id, "authorization_code_issued", true, None);

        let mut params = vec![("code", code)];
        if let Some(state) = &request.state {
            params.push(("state", state.clone())); // Safe: echoed to the client
        }
        append_query(redirect_uri, &params)
            .ok_or_else(|| AuthorizeError::Direct(OAuth2Error::invalid_request("Malformed redirect_uri")))
    }

    async fn lookup_client(&self, client_id: Option<&str>) -> AppResult<Option<OAuth2Client>> {
        match client_id.filter(|id| !id.is_empty()) {
            Some(id) => self.clients.get(id).await,
            None => Ok(None),
        }
    }

    async fn issue_code(
        &self,
        client: &OAuth2Client,
        redirect_uri: &str,
        request: &AuthorizeRequest,
        scope: String,
    ) -> AppResult<String> {
        let code = random_token(TOKEN_BYTES)?;
        let record = OAuth2AuthCode {
            code: code.clone(), // Safe: returned to the caller and stored
            client_id: client.client_id.clone(),
            redirect_uri: redirect_uri.to_owned(),
            code_challenge: request.code_challenge.clone().unwrap_or_default(),
            code_challenge_method: PKCE_METHOD_S256.to_owned(),
            state: request.state.clone(),
            scope,
            expires_at: expires_at_from_now(Duration::from_secs(self.policy.code_ttl_secs)),
            used: false,
        };
        self.codes.put(&record).await?;
        Ok(code)
    }

    // ========================================================================
    // Token endpoint
    // ========================================================================

    /// Handle `POST /oauth/token`
    ///
    /// # Errors
    ///
    /// Returns the OAuth error for the first failed check
    pub async fn token(&self, request: TokenRequest) -> Result<TokenResponse, OAuth2Error> {
        match request.grant_type.as_deref() {
            Some(GRANT_AUTHORIZATION_CODE) => self.handle_authorization_code_grant(request).await,
            Some(GRANT_REFRESH_TOKEN) => self.handle_refresh_token_grant(request).await,
            Some(_) => Err(OAuth2Error::unsupported_grant_type()),
            None => Err(OAuth2Error::invalid_request("Missing grant_type")),
        }
    }

    /// Authenticate the requesting client
    ///
    /// Public clients registered with method `none` are accepted on `client_id` alone; any
    /// secret they send is ignored. Confidential clients must present their secret.
    async fn authenticate_client(
        &self,
        client_id: Option<&str>,
        client_secret: Option<&str>,
    ) -> Result<OAuth2Client, OAuth2Error> {
        let client = self
            .lookup_client(client_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Client lookup failed during token request");
                OAuth2Error::server_error()
            })?
            .ok_or_else(|| {
                AppLogger::log_security_event("token_client_unknown", "low", client_id, "unknown client_id");
                OAuth2Error::invalid_client("Client authentication failed")
            })?;

        if !client.authenticates_with_secret() {
            return Ok(client);
        }

        let presented = client_secret.filter(|secret| !secret.is_empty());
        let valid = match (presented, client.client_secret_hash.as_deref()) {
            (Some(secret), Some(stored)) => constant_time_eq(&sha256_hex(secret), stored),
            _ => false,
        };
        if !valid {
            AppLogger::log_security_event(
                "token_client_secret_rejected",
                "medium",
                Some(&client.client_id),
                "missing or invalid client_secret",
            );
            return Err(OAuth2Error::invalid_client("Client authentication failed"));
        }
        Ok(client)
    }

    async fn handle_authorization_code_grant(
        &self,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let code = required(request.code.as_deref(), "code")?;
        let redirect_uri = required(request.redirect_uri.as_deref(), "redirect_uri")?;
        required(request.client_id.as_deref(), "client_id")?;
        let code_verifier = required(request.code_verifier.as_deref(), "code_verifier")?;

        let client = self
            .authenticate_client(request.client_id.as_deref(), request.client_secret.as_deref())
            .await?;

        let record = self
            .codes
            .get(code)
            .await
            .map_err(server_error("Authorization code lookup failed"))?
            .ok_or_else(|| OAuth2Error::invalid_grant("Invalid or expired authorization code"))?;

        if record.used {
            AppLogger::log_security_event(
                "authorization_code_replay",
                "high",
                Some(&client.client_id),
                "authorization code already redeemed",
            );
            return Err(OAuth2Error::invalid_grant(
                "Authorization code has already been used",
            ));
        }
        if record.client_id != client.client_id {
            return Err(OAuth2Error::invalid_grant(
                "Authorization code was issued to another client",
            ));
        }
        if record.redirect_uri != redirect_uri {
            return Err(OAuth2Error::invalid_grant("redirect_uri mismatch"));
        }
        if !verify_pkce(
            code_verifier,
            &record.code_challenge,
            &record.code_challenge_method,
        ) {
            AppLogger::log_security_event(
                "pkce_verification_failed",
                "high",
                Some(&client.client_id),
                "code_verifier does not match code_challenge",
            );
            return Err(OAuth2Error::invalid_grant("Invalid code_verifier"));
        }

        let redeemed = self
            .codes
            .mark_used(code)
            .await
            .map_err(server_error("Failed to redeem authorization code"))?
            .ok_or_else(|| {
                AppLogger::log_security_event(
                    "authorization_code_race",
                    "high",
                    Some(&client.client_id),
                    "concurrent redemption lost",
                );
                OAuth2Error::invalid_grant("Authorization code has already been used")
            })?;

        let response = self
            .issue_token_pair(&client.client_id, &redeemed.scope)
            .await
            .map_err(server_error("Failed to issue tokens"))?;

        AppLogger::log_oauth_event(&client.client_id, "authorization_code_exchanged", true, None);
        Ok(response)
    }

    async fn issue_token_pair(&self, client_id: &str, scope: &str) -> AppResult<TokenResponse> {
        let access = self.mint_access_token(client_id, scope)?;
        let refresh = OAuth2RefreshToken {
            token: random_token(TOKEN_BYTES)?,
            client_id: client_id.to_owned(),
            access_token: access.token.clone(),
            scope: scope.to_owned(),
            expires_at: expires_at_from_now(Duration::from_secs(
                self.policy.refresh_token_ttl_secs,
            )),
        };

        self.tokens.put_access(&access).await?;
        self.tokens.put_refresh(&refresh).await?;

        Ok(self.token_response(access, refresh.token))
    }

    fn mint_access_token(&self, client_id: &str, scope: &str) -> AppResult<OAuth2AccessToken> {
        Ok(OAuth2AccessToken {
            token: random_token(TOKEN_BYTES)?,
            client_id: client_id.to_owned(),
            scope: scope.to_owned(),
            expires_at: expires_at_from_now(Duration::from_secs(
                self.policy.access_token_ttl_secs,
            )),
        })
    }

    fn token_response(&self, access: OAuth2AccessToken, refresh_token: String) -> TokenResponse {
        TokenResponse {
            access_token: access.token,
            token_type: TOKEN_TYPE_BEARER.to_owned(),
            expires_in: self.policy.access_token_ttl_secs,
            refresh_token,
            scope: access.scope,
        }
    }

    async fn handle_refresh_token_grant(
        &self,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let refresh_token = required(request.refresh_token.as_deref(), "refresh_token")?;
        let client = self
            .authenticate_client(request.client_id.as_deref(), request.client_secret.as_deref())
            .await?;

        let record = self
            .tokens
            .get_refresh(refresh_token)
            .await
            .map_err(server_error("Refresh token lookup failed"))?
            .ok_or_else(|| OAuth2Error::invalid_grant("Invalid or expired refresh token"))?;
        if record.client_id != client.client_id {
            AppLogger::log_security_event(
                "refresh_token_client_mismatch",
                "high",
                Some(&client.client_id),
                "refresh token belongs to another client",
            );
            return Err(OAuth2Error::invalid_grant("Invalid refresh token"));
        }

        let access = self
            .mint_access_token(&client.client_id, &record.scope)
            .map_err(server_error("Failed to mint access token"))?;
        self.tokens
            .put_access(&access)
            .await
            .map_err(server_error("Failed to store access token"))?;

        let repaired = self
            .tokens
            .repair_refresh(refresh_token, &record.access_token, &access.token)
            .await
            .map_err(server_error("Failed to update refresh token"))?;
        if repaired.is_none() {
            if let Err(e) = self.tokens.delete_access(&access.token).await {
                tracing::warn!(error = %e, "Failed to discard access token from a lost refresh race");
            }
            return Err(OAuth2Error::invalid_grant("Refresh token was concurrently used"));
        }

        if let Err(e) = self.tokens.delete_access(&record.access_token).await {
            tracing::warn!(
                error = %e,
                token = %redact_token(&record.access_token),
                "Failed to delete superseded access token"
            );
        }

        AppLogger::log_oauth_event(&client.client_id, "access_token_refreshed", true, None);
        Ok(self.token_response(access, record.token))
    }

    // ========================================================================
    // Bearer validation
    // ========================================================================

    /// Resolve a presented bearer token to its live record
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure
    pub async fn validate_access_token(&self, token: &str) -> AppResult<Option<OAuth2AccessToken>> {
        if token.is_empty() {
            return Ok(None);
        }
        self.tokens.get_access(token).await
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, OAuth2Error> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| OAuth2Error::invalid_request(&format!("Missing {name}")))
}

/// Log an internal failure and hide it behind `server_error`
fn server_error(context: &'static str) -> impl Fn(AppError) -> OAuth2Error {
    move |e| {
        tracing::error!(error = %e, "{context}");
        OAuth2Error::server_error()
    }
}
