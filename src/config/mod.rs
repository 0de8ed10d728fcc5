// ABOUTME: Configuration management module for centralized server settings
// ABOUTME: Re-exports environment-driven server, OAuth policy and store backend configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
//! Configuration module
//!
//! - **Environment**: bind address, base URL, CORS and OAuth policy
//! - **Store**: backend selection and Redis connection tuning

/// Environment and server configuration
pub mod environment;
/// Store backend configuration
pub mod store;

pub use environment::{CorsConfig, Environment, OAuthServerConfig, ServerConfig};
pub use store::{RedisConnectionConfig, StoreBackendKind, StoreConfig};
