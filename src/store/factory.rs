// ABOUTME: Store factory selecting the backend from configuration
// ABOUTME: Callers hold one Store handle and never branch on the backend type
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::memory::InMemoryStore;
use super::redis::RedisStore;
use super::{StoreBackendKind, StoreConfig, StoreProvider};
use crate::errors::AppResult;
use std::time::Duration;

/// Unified store handle
#[derive(Clone)]
pub enum Store {
    /// Process-local backend
    Memory(InMemoryStore),
    /// Redis backend
    Redis(RedisStore),
}

impl Store {
    /// Create the backend named by `config.backend`
    ///
    /// # Errors
    ///
    /// Returns an error if backend initialization fails
    pub async fn new(config: StoreConfig) -> AppResult<Self> {
        match config.backend {
            StoreBackendKind::Memory => {
                tracing::info!(
                    max_entries = config.max_entries,
                    "Initializing in-memory store"
                );
                Ok(Self::Memory(InMemoryStore::new(config).await?))
            }
            StoreBackendKind::Redis => Ok(Self::Redis(RedisStore::new(config).await?)),
        }
    }

    /// In-memory store with the sweep disabled
    ///
    /// # Errors
    ///
    /// Never fails for the in-memory backend; the signature matches [`Store::new`]
    pub async fn memory() -> AppResult<Self> {
        Self::new(StoreConfig::memory_for_tests()).await
    }

    /// Backend kind, for health reporting
    #[must_use]
    pub const fn backend(&self) -> StoreBackendKind {
        match self {
            Self::Memory(_) => StoreBackendKind::Memory,
            Self::Redis(_) => StoreBackendKind::Redis,
        }
    }

    /// Unconditionally store a value
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails
    pub async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        match self {
            Self::Memory(store) => store.put(key, value, ttl).await,
            Self::Redis(store) => store.put(key, value, ttl).await,
        }
    }

    /// Store a value only if the key is absent
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails
    pub async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> AppResult<bool> {
        match self {
            Self::Memory(store) => store.put_if_absent(key, value, ttl).await,
            Self::Redis(store) => store.put_if_absent(key, value, ttl).await,
        }
    }

    /// Fetch a value
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails
    pub async fn get(&self, key: &str) -> AppResult<Option<String>> {
        match self {
            Self::Memory(store) => store.get(key).await,
            Self::Redis(store) => store.get(key).await,
        }
    }

    /// Remove a value
    ///
    /// # Errors
    ///
    /// Returns an error if the backend delete fails
    pub async fn delete(&self, key: &str) -> AppResult<bool> {
        match self {
            Self::Memory(store) => store.delete(key).await,
            Self::Redis(store) => store.delete(key).await,
        }
    }

    /// Atomic conditional replace
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails
    pub async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: &str,
        ttl: Option<Duration>,
    ) -> AppResult<bool> {
        match self {
            Self::Memory(store) => store.compare_and_swap(key, expected, new, ttl).await,
            Self::Redis(store) => store.compare_and_swap(key, expected, new, ttl).await,
        }
    }

    /// Verify the backend is reachable
    ///
    /// # Errors
    ///
    /// Returns an error if the backend does not answer
    pub async fn health_check(&self) -> AppResult<()> {
        match self {
            Self::Memory(store) => store.health_check().await,
            Self::Redis(store) => store.health_check().await,
        }
    }

    /// Remove every OAuth key
    ///
    /// # Errors
    ///
    /// Returns an error if the clear operation fails
    pub async fn clear_all(&self) -> AppResult<()> {
        match self {
            Self::Memory(store) => store.clear_all().await,
            Self::Redis(store) => store.clear_all().await,
        }
    }
}
