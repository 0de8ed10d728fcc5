// ABOUTME: Protected MCP mount point guarded by bearer authentication
// ABOUTME: Reports the authenticated session; the MCP transport attaches here
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! MCP routes

use crate::middleware::auth::{require_bearer, AuthContext};
use crate::resources::ServerResources;
use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

/// MCP routes implementation
pub struct McpRoutes;

impl McpRoutes {
    /// Create `GET|POST /mcp` behind the bearer guard
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/mcp", get(Self::handle_session).post(Self::handle_session))
            .route_layer(middleware::from_fn_with_state(
                Arc::clone(&resources),
                require_bearer,
            ))
            .with_state(resources)
    }

    async fn handle_session(Extension(auth): Extension<AuthContext>) -> Json<Value> {
        Json(json!({
            "client_id": auth.client_id,
            "scope": auth.scope,
        }))
    }
}
