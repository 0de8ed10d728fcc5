// ABOUTME: Store backend configuration types for the in-memory and Redis backends
// ABOUTME: Handles backend selection, capacity, sweep interval and Redis connection tuning
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::constants::{redis, store};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which backend holds OAuth state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    /// Process-local map; single-instance deployments
    #[default]
    Memory,
    /// Redis; multi-instance deployments
    Redis,
}

impl FromStr for StoreBackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "in-memory" | "inmemory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(AppError::config(format!(
                "Unknown STORE_BACKEND '{other}' (expected 'memory' or 'redis')"
            ))),
        }
    }
}

impl fmt::Display for StoreBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Redis => write!(f, "redis"),
        }
    }
}

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Selected backend
    pub backend: StoreBackendKind,
    /// Hard entry limit (in-memory backend); live entries are never evicted
    pub max_entries: usize,
    /// Redis connection URL (Redis backend)
    pub redis_url: Option<String>,
    /// Sweep interval for expired in-memory entries
    pub cleanup_interval: Duration,
    /// Enable background sweep (should be false in tests to avoid runtime conflicts)
    pub enable_background_cleanup: bool,
    /// Redis connection and retry configuration
    pub redis_connection: RedisConnectionConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackendKind::Memory,
            max_entries: store::DEFAULT_MAX_ENTRIES,
            redis_url: None,
            cleanup_interval: Duration::from_secs(store::DEFAULT_CLEANUP_INTERVAL_SECS),
            enable_background_cleanup: true,
            redis_connection: RedisConnectionConfig::default(),
        }
    }
}

impl StoreConfig {
    /// In-memory configuration without the background sweep
    #[must_use]
    pub fn memory_for_tests() -> Self {
        Self {
            enable_background_cleanup: false,
            ..Self::default()
        }
    }

    /// Load store configuration from environment
    ///
    /// `STORE_BACKEND` wins when set; otherwise the presence of `REDIS_URL` selects Redis.
    ///
    /// # Errors
    ///
    /// Returns an error if `STORE_BACKEND` names an unknown backend, or Redis is selected
    /// without a `REDIS_URL`
    pub fn from_env() -> AppResult<Self> {
        let redis_url = env::var("REDIS_URL").ok().filter(|s| !s.trim().is_empty());
        let backend = match env::var("STORE_BACKEND") {
            Ok(value) if !value.trim().is_empty() => value.parse()?,
            _ if redis_url.is_some() => StoreBackendKind::Redis,
            _ => StoreBackendKind::Memory,
        };

        if backend == StoreBackendKind::Redis && redis_url.is_none() {
            return Err(AppError::config(
                "STORE_BACKEND=redis requires REDIS_URL to be set",
            ));
        }

        Ok(Self {
            backend,
            max_entries: env_parse("STORE_MAX_ENTRIES", store::DEFAULT_MAX_ENTRIES),
            redis_url,
            cleanup_interval: Duration::from_secs(env_parse(
                "STORE_CLEANUP_INTERVAL_SECS",
                store::DEFAULT_CLEANUP_INTERVAL_SECS,
            )),
            enable_background_cleanup: true,
            redis_connection: RedisConnectionConfig::from_env(),
        })
    }
}

/// Redis connection and retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConnectionConfig {
    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,
    /// Response/command timeout in seconds
    pub response_timeout_secs: u64,
    /// Number of reconnection retries after connection drop
    pub reconnection_retries: usize,
    /// Exponential backoff base for retry delays
    pub retry_exponent_base: u64,
    /// Maximum retry delay in milliseconds
    pub max_retry_delay_ms: u64,
    /// Number of retries for initial connection at startup
    pub initial_connection_retries: u32,
    /// Initial retry delay in milliseconds (doubles with exponential backoff)
    pub initial_retry_delay_ms: u64,
}

impl Default for RedisConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout_secs: redis::CONNECTION_TIMEOUT_SECS,
            response_timeout_secs: redis::RESPONSE_TIMEOUT_SECS,
            reconnection_retries: redis::RECONNECTION_RETRIES,
            retry_exponent_base: redis::RETRY_EXPONENT_BASE,
            max_retry_delay_ms: redis::MAX_RETRY_DELAY_MS,
            initial_connection_retries: redis::INITIAL_CONNECTION_RETRIES,
            initial_retry_delay_ms: redis::INITIAL_RETRY_DELAY_MS,
        }
    }
}

impl RedisConnectionConfig {
    /// Load Redis connection configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            connection_timeout_secs: env_parse(
                "REDIS_CONNECTION_TIMEOUT_SECS",
                redis::CONNECTION_TIMEOUT_SECS,
            ),
            response_timeout_secs: env_parse(
                "REDIS_RESPONSE_TIMEOUT_SECS",
                redis::RESPONSE_TIMEOUT_SECS,
            ),
            reconnection_retries: env_parse(
                "REDIS_RECONNECTION_RETRIES",
                redis::RECONNECTION_RETRIES,
            ),
            retry_exponent_base: env_parse("REDIS_RETRY_EXPONENT_BASE", redis::RETRY_EXPONENT_BASE),
            max_retry_delay_ms: env_parse("REDIS_MAX_RETRY_DELAY_MS", redis::MAX_RETRY_DELAY_MS),
            initial_connection_retries: env_parse(
                "REDIS_INITIAL_CONNECTION_RETRIES",
                redis::INITIAL_CONNECTION_RETRIES,
            ),
            initial_retry_delay_ms: env_parse(
                "REDIS_INITIAL_RETRY_DELAY_MS",
                redis::INITIAL_RETRY_DELAY_MS,
            ),
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset or malformed
fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
