// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Default lifetimes, key namespaces, well-known clients and environment defaults

//! Constants module
//!
//! Constants are grouped by domain. Runtime overrides live in
//! [`ServerConfig`](crate::config::environment::ServerConfig); these are the fallbacks.

/// Service identity used in logs, health checks and discovery documents
pub mod service_names {
    /// Service name reported by logging and `/health`
    pub const INTERVALS_MCP_SERVER: &str = "intervals-mcp-server";
    /// Human-readable server name for the MCP configuration document
    pub const MCP_SERVER_DISPLAY_NAME: &str = "intervals-icu-mcp-server";
}

/// Environment-based configuration defaults
pub mod env_config {
    /// Default HTTP port
    pub const DEFAULT_HTTP_PORT: u16 = 9000;

    /// Default bind address
    pub const DEFAULT_HOST: &str = "0.0.0.0";
}

/// HTTP surface limits
pub mod http {
    /// Per-request timeout in seconds
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
    /// Largest accepted request body; registration and token bodies are small
    pub const MAX_BODY_BYTES: usize = 64 * 1024;
}

/// OAuth 2.1 authorization server constants
pub mod oauth {
    /// Authorization code lifetime in seconds (10 minutes)
    pub const AUTHORIZATION_CODE_TTL_SECS: u64 = 600;
    /// Access token lifetime in seconds (1 hour)
    pub const ACCESS_TOKEN_TTL_SECS: u64 = 3600;
    /// Refresh token lifetime in seconds (30 days)
    pub const REFRESH_TOKEN_TTL_SECS: u64 = 2_592_000;

    /// Random bytes behind codes, access tokens, refresh tokens and client secrets
    pub const TOKEN_BYTES: usize = 32;
    /// Random bytes behind the suffix of a generated client id
    pub const CLIENT_ID_BYTES: usize = 16;
    /// Prefix of every dynamically registered client id
    pub const CLIENT_ID_PREFIX: &str = "intervals_mcp_";

    /// Scope granted when neither the client nor the request names one
    pub const DEFAULT_SCOPE: &str = "intervals:read intervals:write";
    /// Client name recorded when registration omits one
    pub const DEFAULT_CLIENT_NAME: &str = "MCP Client";
    /// Realm advertised in `WWW-Authenticate`
    pub const DEFAULT_REALM: &str = "intervals-mcp-server";

    /// Only PKCE method accepted anywhere
    pub const PKCE_METHOD_S256: &str = "S256";
    /// Token type returned by the token endpoint
    pub const TOKEN_TYPE_BEARER: &str = "Bearer";

    /// Public-client auth method
    pub const AUTH_METHOD_NONE: &str = "none";
    /// Confidential-client auth method
    pub const AUTH_METHOD_CLIENT_SECRET_POST: &str = "client_secret_post";

    /// `authorization_code` grant
    pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";
    /// `refresh_token` grant
    pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";
    /// `code` response type
    pub const RESPONSE_TYPE_CODE: &str = "code";

    /// Redirect targets accepted at registration unless overridden
    pub const DEFAULT_ALLOWED_REDIRECT_URIS: &[&str] = &[
        "https://claude.ai/api/mcp/auth_callback",
        "https://claude.com/api/mcp/auth_callback",
    ];

    /// Well-known public client seeded when `DEBUG_OAUTH_CLIENT=true`
    pub mod debug_client {
        /// Client id
        pub const CLIENT_ID: &str = "claude_desktop_debug";
        /// Display name
        pub const CLIENT_NAME: &str = "Claude Desktop Debug";
        /// Single registered callback
        pub const REDIRECT_URI: &str = "https://claude.ai/api/mcp/auth_callback";
    }
}

/// Key-space namespaces shared by every backend
pub mod key_prefixes {
    /// Registered clients
    pub const CLIENTS: &str = "oauth_clients:";
    /// Authorization codes
    pub const CODES: &str = "oauth_codes:";
    /// Access tokens
    pub const ACCESS_TOKENS: &str = "oauth_tokens:access:";
    /// Refresh tokens
    pub const REFRESH_TOKENS: &str = "oauth_tokens:refresh:";
    /// Every namespace, used by administrative sweeps
    pub const ALL: &[&str] = &[CLIENTS, CODES, ACCESS_TOKENS, REFRESH_TOKENS];
}

/// Store backend defaults
pub mod store {
    /// Default in-memory entry limit
    pub const DEFAULT_MAX_ENTRIES: usize = 100_000;
    /// Default best-effort sweep interval for the in-memory backend
    pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;
    /// Keys fetched per SCAN round trip
    pub const SCAN_BATCH_SIZE: usize = 100;
}

/// Redis connection defaults
pub mod redis {
    /// Connection timeout in seconds
    pub const CONNECTION_TIMEOUT_SECS: u64 = 5;
    /// Command response timeout in seconds
    pub const RESPONSE_TIMEOUT_SECS: u64 = 3;
    /// Reconnection attempts after a dropped connection
    pub const RECONNECTION_RETRIES: usize = 6;
    /// Exponential backoff base
    pub const RETRY_EXPONENT_BASE: u64 = 2;
    /// Backoff cap in milliseconds
    pub const MAX_RETRY_DELAY_MS: u64 = 5_000;
    /// Attempts at startup before giving up
    pub const INITIAL_CONNECTION_RETRIES: u32 = 5;
    /// First startup retry delay in milliseconds
    pub const INITIAL_RETRY_DELAY_MS: u64 = 500;
}
