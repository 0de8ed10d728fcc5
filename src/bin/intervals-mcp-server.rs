// ABOUTME: Server binary for the intervals.icu MCP OAuth 2.1 authorization server
// ABOUTME: Loads configuration, connects the store backend and serves HTTP until shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Intervals MCP Server Binary
//!
//! Environment variables configure everything; the flags below override the common ones.

use anyhow::{Context, Result};
use clap::Parser;
use intervals_mcp_server::{
    config::environment::ServerConfig,
    logging,
    resources::ServerResources,
    routes::build_router,
    store::StoreBackendKind,
};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "intervals-mcp-server")]
#[command(about = "OAuth 2.1 authorization server for the intervals.icu MCP integration")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    port: Option<u16>,

    /// Override bind address
    #[arg(long)]
    host: Option<String>,

    /// Override store backend (memory or redis)
    #[arg(long)]
    store: Option<StoreBackendKind>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(port) = args.port {
        config.http_port = port;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(store) = args.store {
        config.store.backend = store;
    }
    config.validate()?;

    info!("Starting Intervals MCP Server");
    info!("{}", config.summary());

    let bind_addr = format!("{}:{}", config.host, config.http_port);
    let base_url = config.base_url.clone(); // Safe: config moves into resources

    let resources = Arc::new(
        ServerResources::new(config)
            .await
            .context("Failed to initialize server resources")?,
    );
    info!(store = %resources.store.backend(), "Store backend ready");

    let app = build_router(resources);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;

    display_available_endpoints(&base_url);
    info!(addr = %bind_addr, "Server listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {e}");
        return Err(e.into());
    }

    info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received, draining connections");
}

#[allow(clippy::cognitive_complexity)]
fn display_available_endpoints(base_url: &str) {
    info!("=== Available Endpoints ===");
    info!("Discovery:");
    info!("   Authorization Server: GET  {base_url}/.well-known/oauth-authorization-server");
    info!("   Protected Resource:   GET  {base_url}/.well-known/oauth-protected-resource");
    info!("   MCP Configuration:    GET  {base_url}/.well-known/mcp-configuration");
    info!("OAuth 2.1 Server:");
    info!("   Client Registration:  POST {base_url}/oauth/register");
    info!("   Authorization:        GET  {base_url}/oauth/authorize");
    info!("   Token Exchange:       POST {base_url}/oauth/token");
    info!("MCP:");
    info!("   Protected Resource:   GET|POST {base_url}/mcp");
    info!("Monitoring:");
    info!("   Health Check:         GET  {base_url}/health");
    info!("   Readiness:            GET  {base_url}/ready");
    info!("=== End of Endpoint List ===");
}
