// ABOUTME: In-memory store backend with a hard entry limit and best-effort expiry sweep
// ABOUTME: Conditional writes run under a single write lock so they are atomic within the process
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::{StoreConfig, StoreProvider};
use crate::errors::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Clone)]
struct StoreEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StoreEntry {
    fn new(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_owned(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

type SharedMap = Arc<RwLock<HashMap<String, StoreEntry>>>;

/// Process-local store for single-instance deployments
///
/// The map is shared with an optional sweep task that drops entries past their native TTL.
/// The sweep only reclaims memory; reads treat expired entries as absent whether or not the
/// sweep has run.
///
/// Live entries are never evicted. Once `max_entries` keys are held, a write of a new key first
/// reclaims expired entries and fails with a storage error if the map is still full.
#[derive(Clone)]
pub struct InMemoryStore {
    entries: SharedMap,
    max_entries: usize,
    shutdown_tx: Option<Arc<mpsc::Sender<()>>>,
}

impl InMemoryStore {
    const FALLBACK_MAX_ENTRIES: usize = 1000;

    fn new_with_config(config: &StoreConfig) -> Self {
        let max_entries = if config.max_entries == 0 {
            Self::FALLBACK_MAX_ENTRIES
        } else {
            config.max_entries
        };
        let entries: SharedMap = Arc::new(RwLock::new(HashMap::new()));

        let shutdown_tx = config.enable_background_cleanup.then(|| {
            let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
            let sweep_entries = Arc::clone(&entries);
            let sweep_interval = config.cleanup_interval;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(sweep_interval);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            Self::sweep_expired(&sweep_entries).await;
                        }
                        _ = shutdown_rx.recv() => {
                            tracing::debug!("Store sweep task received shutdown signal");
                            break;
                        }
                    }
                }
            });

            Arc::new(shutdown_tx)
        });

        Self {
            entries,
            max_entries,
            shutdown_tx,
        }
    }

    async fn sweep_expired(entries: &SharedMap) {
        let removed = remove_expired(&mut *entries.write().await);
        if removed > 0 {
            tracing::debug!(removed, "Swept expired store entries");
        }
    }

    /// Make room for `key`, or fail if every held entry is still live
    fn ensure_room(&self, map: &mut HashMap<String, StoreEntry>, key: &str) -> AppResult<()> {
        if map.len() < self.max_entries || map.contains_key(key) {
            return Ok(());
        }
        let removed = remove_expired(map);
        if map.len() < self.max_entries {
            tracing::debug!(removed, "Reclaimed expired entries for a new key");
            return Ok(());
        }
        tracing::warn!(
            max_entries = self.max_entries,
            "In-memory store is full of live entries, rejecting write"
        );
        Err(AppError::storage(format!(
            "In-memory store is full ({} live entries)",
            self.max_entries
        )))
    }

    /// Number of live and not-yet-swept entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no entries
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl StoreProvider for InMemoryStore {
    async fn new(config: StoreConfig) -> AppResult<Self> {
        Ok(Self::new_with_config(&config))
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        let mut guard = self.entries.write().await;
        self.ensure_room(&mut guard, key)?;
        guard.insert(key.to_owned(), StoreEntry::new(value, ttl));
        drop(guard);
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> AppResult<bool> {
        let mut guard = self.entries.write().await;
        if guard.get(key).is_some_and(|entry| !entry.is_expired()) {
            return Ok(false);
        }
        self.ensure_room(&mut guard, key)?;
        guard.insert(key.to_owned(), StoreEntry::new(value, ttl));
        drop(guard);
        Ok(true)
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let guard = self.entries.read().await;
        match guard.get(key) {
            // Safe: caller owns its copy
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
            None => return Ok(None),
            Some(_) => {}
        }
        drop(guard);

        // Expired: recheck under the write lock, a concurrent put may have replaced it
        let mut guard = self.entries.write().await;
        if guard.get(key).is_some_and(StoreEntry::is_expired) {
            guard.remove(key);
        }
        drop(guard);
        Ok(None)
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: &str,
        ttl: Option<Duration>,
    ) -> AppResult<bool> {
        let mut guard = self.entries.write().await;
        let matches = guard
            .get(key)
            .is_some_and(|entry| !entry.is_expired() && entry.value == expected);
        if matches {
            guard.insert(key.to_owned(), StoreEntry::new(new, ttl));
        }
        drop(guard);
        Ok(matches)
    }

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }

    async fn clear_all(&self) -> AppResult<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

/// Drop every expired entry; returns how many were removed
fn remove_expired(map: &mut HashMap<String, StoreEntry>) -> usize {
    let before = map.len();
    map.retain(|_, entry| !entry.is_expired());
    before - map.len()
}

impl Drop for InMemoryStore {
    fn drop(&mut self) {
        // Only the last clone holds the sole Arc; earlier clones must not stop the sweep
        if let Some(tx) = &self.shutdown_tx {
            if Arc::strong_count(tx) == 1 {
                if let Err(e) = tx.try_send(()) {
                    tracing::debug!(error = ?e, "Store sweep shutdown signal not delivered");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_without_ttl_never_expires() {
        let entry = StoreEntry::new("v", None);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_with_zero_ttl_is_expired() {
        let entry = StoreEntry::new("v", Some(Duration::ZERO));
        assert!(entry.is_expired());
    }

    #[test]
    fn test_remove_expired_keeps_live_entries() {
        let mut map = HashMap::new();
        map.insert("live".to_owned(), StoreEntry::new("v", None));
        map.insert("dead".to_owned(), StoreEntry::new("v", Some(Duration::ZERO)));

        assert_eq!(remove_expired(&mut map), 1);
        assert!(map.contains_key("live"));
    }
}
