// ABOUTME: Centralized resource container shared by every HTTP handler
// ABOUTME: Owns the configuration, the store backend, the authorization server and discovery documents
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Server Resources
//!
//! Built once at startup and shared as `State<Arc<ServerResources>>`. The store handle inside
//! is cheap to clone; every typed store and the authorization server share the same backend.

use crate::config::environment::ServerConfig;
use crate::errors::AppResult;
use crate::oauth2_server::{DiscoveryProvider, OAuth2AuthorizationServer};
use crate::store::Store;
use std::sync::Arc;

/// Shared server state
#[derive(Clone)]
pub struct ServerResources {
    /// Loaded configuration
    pub config: Arc<ServerConfig>,
    /// Backend handle, also used by readiness checks
    pub store: Store,
    /// Registration, authorization and token logic
    pub oauth_server: OAuth2AuthorizationServer,
    /// Metadata documents for this origin
    pub discovery: DiscoveryProvider,
}

impl ServerResources {
    /// Connect the configured store backend and assemble resources
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or the debug client cannot be seeded
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        let store = Store::new(config.store.clone()).await?; // Safe: store config is small
        Self::with_store(config, store).await
    }

    /// Assemble resources over an existing store handle
    ///
    /// # Errors
    ///
    /// Returns an error if seeding the debug client fails
    pub async fn with_store(config: ServerConfig, store: Store) -> AppResult<Self> {
        let policy = Arc::new(config.oauth.clone()); // Safe: policy shared with the server
        let oauth_server = OAuth2AuthorizationServer::new(store.clone(), policy); // Safe: Store handle
        let discovery = DiscoveryProvider::new(&config.base_url, &config.oauth.default_scope);

        if config.oauth.seed_debug_client {
            let created = oauth_server.registration().seed_debug_client().await?;
            tracing::info!(created, "Debug OAuth client available");
        }

        Ok(Self {
            config: Arc::new(config),
            store,
            oauth_server,
            discovery,
        })
    }
}
