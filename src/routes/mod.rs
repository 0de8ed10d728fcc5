// ABOUTME: Route module organization and router assembly for the intervals MCP server
// ABOUTME: Merges OAuth, discovery, health and MCP routes under the shared middleware stack
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Route module
//!
//! Each domain module holds route definitions and thin handlers that delegate to
//! [`OAuth2AuthorizationServer`](crate::oauth2_server::OAuth2AuthorizationServer).
//! [`build_router`] layers them, outermost first: request tracing, `OPTIONS` normalization,
//! CORS, timeout, body limit.

/// Health check and readiness routes
pub mod health;
/// Protected MCP mount point
pub mod mcp;
/// OAuth 2.1 server routes
pub mod oauth2;
/// Discovery documents
pub mod well_known;

pub use health::HealthRoutes;
pub use mcp::McpRoutes;
pub use oauth2::OAuth2Routes;
pub use well_known::WellKnownRoutes;

use crate::constants::http::{MAX_BODY_BYTES, REQUEST_TIMEOUT_SECS};
use crate::errors::AppError;
use crate::middleware::{options_no_content, request_tracing_middleware, setup_cors};
use crate::resources::ServerResources;
use axum::{http::Uri, middleware, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

/// Build the complete HTTP application
pub fn build_router(resources: Arc<ServerResources>) -> Router {
    let cors = setup_cors(&resources.config.cors);

    Router::new()
        .merge(OAuth2Routes::routes(Arc::clone(&resources)))
        .merge(WellKnownRoutes::routes(Arc::clone(&resources)))
        .merge(HealthRoutes::routes(Arc::clone(&resources)))
        .merge(McpRoutes::routes(resources))
        .fallback(handle_not_found)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .layer(cors)
        .layer(middleware::from_fn(options_no_content))
        .layer(middleware::from_fn(request_tracing_middleware))
}

async fn handle_not_found(uri: Uri) -> AppError {
    AppError::not_found(format!("Route {}", uri.path()))
}
