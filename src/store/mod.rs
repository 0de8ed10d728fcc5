// ABOUTME: Key/value store abstraction backing every OAuth entity store
// ABOUTME: Pluggable backends (in-memory, Redis) behind one provider trait with atomic conditional writes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Backend selection and the unified [`Store`](factory::Store) handle
pub mod factory;
/// In-memory backend
pub mod memory;
/// Redis backend
pub mod redis;

pub use crate::config::store::{RedisConnectionConfig, StoreBackendKind, StoreConfig};
pub use factory::Store;

use crate::errors::AppResult;
use std::time::Duration;

/// Raw key/value backend contract
///
/// Values are opaque strings; typed entity stores serialize on top of this. A `ttl` of `None`
/// stores the value without expiry. Native expiry is best-effort cleanup only: callers that
/// care about logical expiry re-check it on every read.
///
/// # Examples
///
/// ```rust,no_run
/// use intervals_mcp_server::store::{memory::InMemoryStore, StoreConfig, StoreProvider};
/// use std::time::Duration;
/// # async fn example() -> Result<(), intervals_mcp_server::errors::AppError> {
/// let store = InMemoryStore::new(StoreConfig::memory_for_tests()).await?;
///
/// store.put("oauth_codes:abc", "{}", Some(Duration::from_secs(600))).await?;
/// assert!(store.compare_and_swap("oauth_codes:abc", "{}", "{\"used\":true}", None).await?);
/// assert!(!store.compare_and_swap("oauth_codes:abc", "{}", "{\"used\":true}", None).await?);
/// # Ok(())
/// # }
/// ```
#[async_trait::async_trait]
pub trait StoreProvider: Send + Sync + Clone {
    /// Create new backend instance with configuration
    ///
    /// # Errors
    ///
    /// Returns an error if backend initialization fails
    async fn new(config: StoreConfig) -> AppResult<Self>
    where
        Self: Sized;

    /// Unconditionally store a value
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()>;

    /// Store a value only if the key is absent; returns whether it was written
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails
    async fn put_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>)
        -> AppResult<bool>;

    /// Fetch a value
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Remove a value; returns whether a key was removed
    ///
    /// # Errors
    ///
    /// Returns an error if the backend delete fails
    async fn delete(&self, key: &str) -> AppResult<bool>;

    /// Replace `expected` with `new` atomically; returns `false` if the stored value differs
    ///
    /// Two concurrent swaps from the same `expected` value never both succeed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: &str,
        ttl: Option<Duration>,
    ) -> AppResult<bool>;

    /// Verify the backend is reachable
    ///
    /// # Errors
    ///
    /// Returns an error if the backend does not answer
    async fn health_check(&self) -> AppResult<()>;

    /// Remove every OAuth key (for testing/admin)
    ///
    /// # Errors
    ///
    /// Returns an error if the clear operation fails
    async fn clear_all(&self) -> AppResult<()>;
}
