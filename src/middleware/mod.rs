// ABOUTME: HTTP middleware for request tracing, bearer authentication and CORS
// ABOUTME: Provides request ID propagation, access-token validation and preflight handling

pub mod auth;
pub mod cors;
pub mod tracing;

// Bearer authentication
pub use auth::{bearer_token, require_bearer, AuthContext};

// CORS configuration
pub use cors::{options_no_content, setup_cors};

// Request tracing and correlation
pub use self::tracing::{request_tracing_middleware, RequestId, REQUEST_ID_HEADER};
