// ABOUTME: Authorization server, protected resource and MCP configuration metadata documents
// ABOUTME: Pure functions of the public base URL and advertised scopes; no storage access
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use crate::constants::oauth::{
    AUTH_METHOD_CLIENT_SECRET_POST, AUTH_METHOD_NONE, GRANT_AUTHORIZATION_CODE,
    GRANT_REFRESH_TOKEN, PKCE_METHOD_S256, RESPONSE_TYPE_CODE,
};
use crate::constants::service_names::MCP_SERVER_DISPLAY_NAME;
use serde_json::{json, Value};

/// MCP protocol revision advertised in the configuration document
const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Builds discovery documents for one public origin
#[derive(Debug, Clone)]
pub struct DiscoveryProvider {
    base_url: String,
    scopes: Vec<String>,
}

impl DiscoveryProvider {
    /// `base_url` has no trailing slash; `scope` is space-separated
    #[must_use]
    pub fn new(base_url: &str, scope: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            scopes: scope.split_whitespace().map(str::to_owned).collect(),
        }
    }

    /// Issuer identifier
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.base_url
    }

    /// URL of the protected MCP resource
    #[must_use]
    pub fn resource_url(&self) -> String {
        format!("{}/mcp", self.base_url)
    }

    /// URL of the protected resource metadata document
    #[must_use]
    pub fn protected_resource_metadata_url(&self) -> String {
        format!("{}/.well-known/oauth-protected-resource", self.base_url)
    }

    /// RFC 8414 authorization server metadata
    #[must_use]
    pub fn authorization_server_metadata(&self) -> Value {
        json!({
            "issuer": self.base_url,
            "authorization_endpoint": format!("{}/oauth/authorize", self.base_url),
            "token_endpoint": format!("{}/oauth/token", self.base_url),
            "registration_endpoint": format!("{}/oauth/register", self.base_url),
            "scopes_supported": self.scopes,
            "response_types_supported": [RESPONSE_TYPE_CODE],
            "response_modes_supported": ["query"],
            "grant_types_supported": [GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN],
            "token_endpoint_auth_methods_supported": [AUTH_METHOD_NONE, AUTH_METHOD_CLIENT_SECRET_POST],
            "code_challenge_methods_supported": [PKCE_METHOD_S256],
        })
    }

    /// RFC 9728 protected resource metadata
    #[must_use]
    pub fn protected_resource_metadata(&self) -> Value {
        json!({
            "resource": self.resource_url(),
            "authorization_servers": [self.base_url],
            "scopes_supported": self.scopes,
            "bearer_methods_supported": ["header"],
            "resource_documentation": format!("{}/docs", self.base_url),
        })
    }

    /// MCP client configuration hints
    #[must_use]
    pub fn mcp_configuration(&self) -> Value {
        let scopes: serde_json::Map<String, Value> = self
            .scopes
            .iter()
            .map(|scope| (scope.clone(), Value::String(describe_scope(scope)))) // Safe: map key ownership
            .collect();

        json!({
            "mcpVersion": MCP_PROTOCOL_VERSION,
            "serverInfo": {
                "name": MCP_SERVER_DISPLAY_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
            "endpoint": self.resource_url(),
            "authentication": {
                "type": "oauth2",
                "oauth2": {
                    "authorizationUrl": format!("{}/oauth/authorize", self.base_url),
                    "tokenUrl": format!("{}/oauth/token", self.base_url),
                    "clientRegistrationUrl": format!("{}/oauth/register", self.base_url),
                    "scopes": scopes,
                },
            },
        })
    }
}

fn describe_scope(scope: &str) -> String {
    match scope.split_once(':') {
        Some(("intervals", "read")) => "Read access to Intervals.icu data".to_owned(),
        Some(("intervals", "write")) => "Write access to Intervals.icu data".to_owned(),
        _ => format!("Access scope '{scope}'"),
    }
}
