// ABOUTME: Environment-driven server configuration for the authorization server
// ABOUTME: Loads bind address, public base URL, CORS, store and OAuth policy settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Server configuration loaded from environment variables
//!
//! Every setting has a default, so an empty environment yields a working
//! single-instance server on `0.0.0.0:9000` with the in-memory store.

use super::store::StoreConfig;
use crate::constants::{env_config, oauth};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if this is a development environment
    #[must_use]
    pub const fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; `["*"]` allows any origin
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_owned()],
        }
    }
}

/// Authorization server policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthServerConfig {
    /// Redirect URIs a client may register
    pub allowed_redirect_uris: Vec<String>,
    /// Also accept `http://localhost` / `http://127.0.0.1` callbacks on any port
    pub allow_loopback_redirects: bool,
    /// Scope granted when neither the client nor the request names one
    pub default_scope: String,
    /// Authorization code lifetime in seconds
    pub code_ttl_secs: u64,
    /// Access token lifetime in seconds
    pub access_token_ttl_secs: u64,
    /// Refresh token lifetime in seconds
    pub refresh_token_ttl_secs: u64,
    /// Realm advertised in `WWW-Authenticate`
    pub realm: String,
    /// Seed the well-known public debug client at startup
    pub seed_debug_client: bool,
}

impl Default for OAuthServerConfig {
    fn default() -> Self {
        Self {
            allowed_redirect_uris: oauth::DEFAULT_ALLOWED_REDIRECT_URIS
                .iter()
                .map(|uri| (*uri).to_owned())
                .collect(),
            allow_loopback_redirects: false,
            default_scope: oauth::DEFAULT_SCOPE.to_owned(),
            code_ttl_secs: oauth::AUTHORIZATION_CODE_TTL_SECS,
            access_token_ttl_secs: oauth::ACCESS_TOKEN_TTL_SECS,
            refresh_token_ttl_secs: oauth::REFRESH_TOKEN_TTL_SECS,
            realm: oauth::DEFAULT_REALM.to_owned(),
            seed_debug_client: false,
        }
    }
}

impl OAuthServerConfig {
    /// Load OAuth policy from environment
    ///
    /// # Errors
    ///
    /// Returns an error if a lifetime variable is set but not a positive integer
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let allowed_redirect_uris = match env::var("OAUTH_ALLOWED_REDIRECT_URIS") {
            Ok(value) if !value.trim().is_empty() => parse_list(&value),
            _ => defaults.allowed_redirect_uris,
        };

        Ok(Self {
            allowed_redirect_uris,
            allow_loopback_redirects: env_bool("OAUTH_ALLOW_LOOPBACK_REDIRECTS"),
            default_scope: env_var_or("OAUTH_SCOPE", oauth::DEFAULT_SCOPE),
            code_ttl_secs: env_ttl("OAUTH_CODE_TTL_SECS", oauth::AUTHORIZATION_CODE_TTL_SECS)?,
            access_token_ttl_secs: env_ttl(
                "OAUTH_ACCESS_TOKEN_TTL_SECS",
                oauth::ACCESS_TOKEN_TTL_SECS,
            )?,
            refresh_token_ttl_secs: env_ttl(
                "OAUTH_REFRESH_TOKEN_TTL_SECS",
                oauth::REFRESH_TOKEN_TTL_SECS,
            )?,
            realm: env_var_or("OAUTH_REALM", oauth::DEFAULT_REALM),
            seed_debug_client: env_bool("DEBUG_OAUTH_CLIENT"),
        })
    }
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// HTTP listen port
    pub http_port: u16,
    /// Public base URL used as issuer and in discovery documents; never ends with `/`
    pub base_url: String,
    /// Deployment environment
    pub environment: Environment,
    /// CORS settings
    pub cors: CorsConfig,
    /// Store backend settings
    pub store: StoreConfig,
    /// Authorization server policy
    pub oauth: OAuthServerConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is present but invalid
    pub fn from_env() -> Result<Self> {
        let http_port = match env::var("PORT") {
            Ok(value) => value
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT value: {value}"))?,
            Err(_) => env_config::DEFAULT_HTTP_PORT,
        };
        let base_url = normalize_base_url(&env::var("BASE_URL").unwrap_or_default(), http_port);

        let config = Self {
            host: env_var_or("HOST", env_config::DEFAULT_HOST),
            http_port,
            base_url,
            environment: Environment::from_str_or_default(&env_var_or(
                "ENVIRONMENT",
                "development",
            )),
            cors: CorsConfig {
                allowed_origins: parse_origins(&env_var_or("ALLOWED_ORIGINS", "*")),
            },
            store: StoreConfig::from_env().context("Invalid store configuration")?,
            oauth: OAuthServerConfig::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Configuration for tests: in-memory store without sweep, loopback redirects allowed
    #[must_use]
    pub fn for_tests(base_url: &str) -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            http_port: 0,
            base_url: base_url.trim_end_matches('/').to_owned(),
            environment: Environment::Testing,
            cors: CorsConfig::default(),
            store: StoreConfig::memory_for_tests(),
            oauth: OAuthServerConfig {
                allow_loopback_redirects: true,
                ..OAuthServerConfig::default()
            },
        }
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an absolute http(s) URL
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.base_url)
            .with_context(|| format!("BASE_URL is not a valid URL: {}", self.base_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("BASE_URL must use http or https: {}", self.base_url);
        }
        if self.environment.is_production() && parsed.scheme() == "http" {
            tracing::warn!(base_url = %self.base_url, "Production environment with a plain-http BASE_URL");
        }
        Ok(())
    }

    /// Human-readable configuration summary for startup logs
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Intervals MCP Server Configuration:\n\
             - Bind: {}:{}\n\
             - Base URL: {}\n\
             - Environment: {}\n\
             - Store: {}\n\
             - CORS Origins: {}\n\
             - Allowed Redirects: {}\n\
             - Loopback Redirects: {}\n\
             - Default Scope: {}\n\
             - Token Lifetimes: code {}s, access {}s, refresh {}s\n\
             - Debug Client: {}",
            self.host,
            self.http_port,
            self.base_url,
            self.environment,
            self.store.backend,
            self.cors.allowed_origins.join(", "),
            self.oauth.allowed_redirect_uris.len(),
            if self.oauth.allow_loopback_redirects {
                "Enabled"
            } else {
                "Disabled"
            },
            self.oauth.default_scope,
            self.oauth.code_ttl_secs,
            self.oauth.access_token_ttl_secs,
            self.oauth.refresh_token_ttl_secs,
            if self.oauth.seed_debug_client {
                "Seeded"
            } else {
                "Disabled"
            },
        )
    }
}

/// Strip trailing slashes, deriving `http://localhost:{port}` when unset
fn normalize_base_url(raw: &str, port: u16) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        format!("http://localhost:{port}")
    } else {
        trimmed.to_owned()
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_owned())
}

fn env_bool(key: &str) -> bool {
    env::var(key).is_ok_and(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
}

fn env_ttl(key: &str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => {
            let secs: u64 = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid {key} value: {value}"))?;
            if secs == 0 {
                anyhow::bail!("{key} must be greater than zero");
            }
            Ok(secs)
        }
        _ => Ok(default),
    }
}

/// Parse a comma-separated list, dropping empty entries
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse comma-separated CORS origins
fn parse_origins(origins_str: &str) -> Vec<String> {
    if origins_str.trim() == "*" {
        vec!["*".to_owned()]
    } else {
        parse_list(origins_str)
    }
}
