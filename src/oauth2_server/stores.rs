// ABOUTME: Typed client, authorization code and token stores over the pluggable key/value backend
// ABOUTME: Every read re-checks logical expiry and deletes stale records, whatever the backend TTL did
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Entity stores
//!
//! Records are JSON under namespaced keys (`oauth_clients:<id>`, `oauth_codes:<code>`,
//! `oauth_tokens:access:<token>`, `oauth_tokens:refresh:<token>`). Native backend TTL is set
//! to the time left on the record (at least one second) and serves only as cleanup. The
//! `expires_at` field decides validity on every read.
//!
//! State transitions that must not race (`mark_used`, refresh re-pairing) are conditional
//! writes against the exact serialized record that was read.

use super::crypto::{is_expired, remaining};
use super::models::{OAuth2AccessToken, OAuth2AuthCode, OAuth2Client, OAuth2RefreshToken};
use crate::constants::key_prefixes;
use crate::errors::AppResult;
use crate::store::Store;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

const MIN_NATIVE_TTL: Duration = Duration::from_secs(1);

/// Records with a logical deadline
trait Expiring {
    fn expires_at(&self) -> i64;
}

impl Expiring for OAuth2AuthCode {
    fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

impl Expiring for OAuth2AccessToken {
    fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

impl Expiring for OAuth2RefreshToken {
    fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

/// Native TTL for a record expiring at `expires_at`
fn native_ttl(expires_at: i64) -> Duration {
    remaining(expires_at).map_or(MIN_NATIVE_TTL, |left| left.max(MIN_NATIVE_TTL))
}

async fn put_expiring<T: Serialize + Expiring>(store: &Store, key: &str, record: &T) -> AppResult<()> {
    let raw = serde_json::to_string(record)?;
    store
        .put(key, &raw, Some(native_ttl(record.expires_at())))
        .await
}

/// Read a live record with the exact stored bytes, deleting it if logically expired
async fn read_live<T: DeserializeOwned + Expiring>(
    store: &Store,
    key: &str,
) -> AppResult<Option<(T, String)>> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    let record: T = serde_json::from_str(&raw)?;
    if is_expired(record.expires_at()) {
        debug!(key_prefix = key.split(':').next().unwrap_or(""), "Deleting expired record on read");
        store.delete(key).await?;
        return Ok(None);
    }
    Ok(Some((record, raw)))
}

// ============================================================================
// Clients
// ============================================================================

/// Registered clients; never expire
#[derive(Clone)]
pub struct ClientStore {
    store: Store,
}

impl ClientStore {
    /// Wrap a backend
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    fn key(client_id: &str) -> String {
        format!("{}{client_id}", key_prefixes::CLIENTS)
    }

    /// Store or overwrite a client
    ///
    /// # Errors
    ///
    /// Returns an error on backend or serialization failure
    pub async fn put(&self, client: &OAuth2Client) -> AppResult<()> {
        let raw = serde_json::to_string(client)?;
        self.store.put(&Self::key(&client.client_id), &raw, None).await
    }

    /// Store a client unless its id is taken; returns whether it was stored
    ///
    /// # Errors
    ///
    /// Returns an error on backend or serialization failure
    pub async fn insert_if_absent(&self, client: &OAuth2Client) -> AppResult<bool> {
        let raw = serde_json::to_string(client)?;
        self.store
            .put_if_absent(&Self::key(&client.client_id), &raw, None)
            .await
    }

    /// Look up a client
    ///
    /// # Errors
    ///
    /// Returns an error on backend or deserialization failure
    pub async fn get(&self, client_id: &str) -> AppResult<Option<OAuth2Client>> {
        match self.store.get(&Self::key(client_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Remove a client
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure
    pub async fn delete(&self, client_id: &str) -> AppResult<bool> {
        self.store.delete(&Self::key(client_id)).await
    }
}

// ============================================================================
// Authorization codes
// ============================================================================

/// Authorization codes with atomic single-use redemption
#[derive(Clone)]
pub struct CodeStore {
    store: Store,
}

impl CodeStore {
    /// Wrap a backend
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    fn key(code: &str) -> String {
        format!("{}{code}", key_prefixes::CODES)
    }

    /// Store a code
    ///
    /// # Errors
    ///
    /// Returns an error on backend or serialization failure
    pub async fn put(&self, code: &OAuth2AuthCode) -> AppResult<()> {
        put_expiring(&self.store, &Self::key(&code.code), code).await
    }

    /// Look up a live code (used or not)
    ///
    /// # Errors
    ///
    /// Returns an error on backend or deserialization failure
    pub async fn get(&self, code: &str) -> AppResult<Option<OAuth2AuthCode>> {
        Ok(read_live(&self.store, &Self::key(code))
            .await?
            .map(|(record, _)| record))
    }

    /// Remove a code
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure
    pub async fn delete(&self, code: &str) -> AppResult<bool> {
        self.store.delete(&Self::key(code)).await
    }

    /// Flip `used` from false to true
    ///
    /// Returns the redeemed record only for the one caller whose conditional write won.
    /// Absent, expired or already-used codes, and callers that lose a race, get `None`.
    /// The used record stays until its original expiry so replays keep failing.
    ///
    /// # Errors
    ///
    /// Returns an error on backend or serialization failure
    pub async fn mark_used(&self, code: &str) -> AppResult<Option<OAuth2AuthCode>> {
        let key = Self::key(code);
        let Some((record, raw)) = read_live::<OAuth2AuthCode>(&self.store, &key).await? else {
            return Ok(None);
        };
        if record.used {
            return Ok(None);
        }

        let redeemed = OAuth2AuthCode {
            used: true,
            ..record
        };
        let new_raw = serde_json::to_string(&redeemed)?;
        let swapped = self
            .store
            .compare_and_swap(&key, &raw, &new_raw, Some(native_ttl(redeemed.expires_at)))
            .await?;
        Ok(swapped.then_some(redeemed))
    }
}

// ============================================================================
// Tokens
// ============================================================================

/// Access and refresh tokens
#[derive(Clone)]
pub struct TokenStore {
    store: Store,
}

impl TokenStore {
    /// Wrap a backend
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    fn access_key(token: &str) -> String {
        format!("{}{token}", key_prefixes::ACCESS_TOKENS)
    }

    fn refresh_key(token: &str) -> String {
        format!("{}{token}", key_prefixes::REFRESH_TOKENS)
    }

    /// Store an access token
    ///
    /// # Errors
    ///
    /// Returns an error on backend or serialization failure
    pub async fn put_access(&self, token: &OAuth2AccessToken) -> AppResult<()> {
        put_expiring(&self.store, &Self::access_key(&token.token), token).await
    }

    /// Look up a live access token
    ///
    /// # Errors
    ///
    /// Returns an error on backend or deserialization failure
    pub async fn get_access(&self, token: &str) -> AppResult<Option<OAuth2AccessToken>> {
        Ok(read_live(&self.store, &Self::access_key(token))
            .await?
            .map(|(record, _)| record))
    }

    /// Remove an access token
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure
    pub async fn delete_access(&self, token: &str) -> AppResult<bool> {
        self.store.delete(&Self::access_key(token)).await
    }

    /// Store a refresh token
    ///
    /// # Errors
    ///
    /// Returns an error on backend or serialization failure
    pub async fn put_refresh(&self, token: &OAuth2RefreshToken) -> AppResult<()> {
        put_expiring(&self.store, &Self::refresh_key(&token.token), token).await
    }

    /// Look up a live refresh token
    ///
    /// # Errors
    ///
    /// Returns an error on backend or deserialization failure
    pub async fn get_refresh(&self, token: &str) -> AppResult<Option<OAuth2RefreshToken>> {
        Ok(read_live(&self.store, &Self::refresh_key(token))
            .await?
            .map(|(record, _)| record))
    }

    /// Remove a refresh token
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure
    pub async fn delete_refresh(&self, token: &str) -> AppResult<bool> {
        self.store.delete(&Self::refresh_key(token)).await
    }

    /// Re-pair a refresh token with `new_access_token`
    ///
    /// Succeeds only if the stored record is still paired with `expected_access_token`, so of
    /// two concurrent refreshes at most one wins. The refresh token keeps its original expiry.
    ///
    /// # Errors
    ///
    /// Returns an error on backend or serialization failure
    pub async fn repair_refresh(
        &self,
        refresh_token: &str,
        expected_access_token: &str,
        new_access_token: &str,
    ) -> AppResult<Option<OAuth2RefreshToken>> {
        let key = Self::refresh_key(refresh_token);
        let Some((record, raw)) = read_live::<OAuth2RefreshToken>(&self.store, &key).await? else {
            return Ok(None);
        };
        if record.access_token != expected_access_token {
            return Ok(None);
        }

        let updated = OAuth2RefreshToken {
            access_token: new_access_token.to_owned(),
            ..record
        };
        let new_raw = serde_json::to_string(&updated)?;
        let swapped = self
            .store
            .compare_and_swap(&key, &raw, &new_raw, Some(native_ttl(updated.expires_at)))
            .await?;
        Ok(swapped.then_some(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth2_server::crypto::now_millis;

    #[test]
    fn test_native_ttl_has_floor() {
        assert_eq!(native_ttl(now_millis() - 10_000), MIN_NATIVE_TTL);
        assert!(native_ttl(now_millis() + 600_000) > Duration::from_secs(590));
    }
}
