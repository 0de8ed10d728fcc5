// ABOUTME: Request tracing middleware for correlation and structured logging
// ABOUTME: Assigns or propagates x-request-id and wraps each request in an http_request span

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{field::Empty, Instrument};
use uuid::Uuid;

/// Header carrying the correlation id
pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Longest inbound request id accepted verbatim
const MAX_REQUEST_ID_LEN: usize = 128;

/// Correlation id available to handlers through request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// Fresh UUID v4 id
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn inbound_request_id(req: &Request) -> Option<RequestId> {
    let value = req.headers().get(&REQUEST_ID_HEADER)?.to_str().ok()?.trim();
    let acceptable = !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    acceptable.then(|| RequestId(value.to_owned()))
}

/// Attach a request id, trace the request and echo the id on the response
pub async fn request_tracing_middleware(mut req: Request, next: Next) -> Response {
    let request_id = inbound_request_id(&req).unwrap_or_else(RequestId::generate);
    let span = tracing::info_span!(
        "http_request",
        method = %req.method(),
        path = %req.uri().path(),
        request_id = %request_id.as_str(),
        status = Empty,
        duration_ms = Empty,
    );
    req.extensions_mut().insert(request_id.clone()); // Safe: handler copy and header copy

    let started = Instant::now();
    let mut response = next.run(req).instrument(span.clone()).await; // Safe: span handle
    let duration_ms = started.elapsed().as_millis() as u64;

    span.record("status", response.status().as_u16())
        .record("duration_ms", duration_ms);
    span.in_scope(|| {
        if response.status().is_server_error() {
            tracing::error!("Request failed");
        } else {
            tracing::info!("Request completed");
        }
    });

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}
