// ABOUTME: Discovery route handlers serving OAuth and MCP metadata under /.well-known
// ABOUTME: Authorization server metadata, protected resource metadata and MCP configuration
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use crate::resources::ServerResources;
use axum::{extract::State, routing::get, Json, Router};
use serde_json::Value;
use std::sync::Arc;

/// Discovery routes
pub struct WellKnownRoutes;

impl WellKnownRoutes {
    /// Create discovery routes; the `/mcp` suffixed paths serve the same documents
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/.well-known/oauth-authorization-server",
                get(Self::handle_authorization_server),
            )
            .route(
                "/.well-known/oauth-authorization-server/mcp",
                get(Self::handle_authorization_server),
            )
            .route(
                "/.well-known/oauth-protected-resource",
                get(Self::handle_protected_resource),
            )
            .route(
                "/.well-known/oauth-protected-resource/mcp",
                get(Self::handle_protected_resource),
            )
            .route(
                "/.well-known/mcp-configuration",
                get(Self::handle_mcp_configuration),
            )
            .with_state(resources)
    }

    async fn handle_authorization_server(
        State(resources): State<Arc<ServerResources>>,
    ) -> Json<Value> {
        Json(resources.discovery.authorization_server_metadata())
    }

    async fn handle_protected_resource(State(resources): State<Arc<ServerResources>>) -> Json<Value> {
        Json(resources.discovery.protected_resource_metadata())
    }

    async fn handle_mcp_configuration(State(resources): State<Arc<ServerResources>>) -> Json<Value> {
        Json(resources.discovery.mcp_configuration())
    }
}
