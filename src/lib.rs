// ABOUTME: Main library entry point for the intervals.icu MCP OAuth 2.1 authorization server
// ABOUTME: Provides client registration, PKCE authorization codes, opaque tokens and bearer protection
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Intervals MCP Server
//!
//! OAuth 2.1 authorization server protecting an intervals.icu MCP endpoint. MCP clients
//! discover the server through `/.well-known` metadata, register themselves dynamically,
//! run a PKCE authorization-code flow and call `/mcp` with an opaque bearer token.
//!
//! ## Architecture
//!
//! - **Store**: key/value backend with TTLs, atomic insert and compare-and-swap
//!   (in-memory map or Redis)
//! - **`OAuth2` server**: registration, authorization and token state machines over typed stores
//! - **Middleware**: bearer authentication, CORS and request tracing
//! - **Routes**: thin axum handlers for the wire formats
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use intervals_mcp_server::config::environment::ServerConfig;
//! use intervals_mcp_server::resources::ServerResources;
//! use intervals_mcp_server::routes::build_router;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     let resources = Arc::new(ServerResources::new(config).await?);
//!     let app = build_router(resources);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:9000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

// ── Public API ──────────────────────────────────────────────────────────
// Used by the server binary and integration tests.

/// Environment-driven configuration
pub mod config;

/// Application constants and defaults
pub mod constants;

/// Unified error handling
pub mod errors;

/// Structured logging setup and OAuth audit events
pub mod logging;

/// HTTP middleware for authentication, CORS and tracing
pub mod middleware;

/// OAuth 2.1 authorization server
pub mod oauth2_server;

/// Shared server state
pub mod resources;

/// HTTP routes and router assembly
pub mod routes;

/// Key/value store backends
pub mod store;
