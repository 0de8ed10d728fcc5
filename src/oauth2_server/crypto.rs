// ABOUTME: Random credential generation, PKCE S256 verification and expiry arithmetic
// ABOUTME: Every expiry decision in the server goes through is_expired
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use crate::constants::oauth::PKCE_METHOD_S256;
use crate::errors::{AppError, AppResult};
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use std::time::Duration;
use subtle::ConstantTimeEq;

/// URL-safe random token built from `bytes` bytes of system randomness
///
/// # Errors
///
/// Returns an error if the system RNG fails; no credential is issued in that case
pub fn random_token(bytes: usize) -> AppResult<String> {
    let mut buf = vec![0u8; bytes];
    SystemRandom::new().fill(&mut buf).map_err(|e| {
        tracing::error!(error = ?e, "System RNG failure while generating credential");
        AppError::internal("System RNG failure")
    })?;
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(&buf))
}

/// `BASE64URL(SHA256(verifier))` without padding
#[must_use]
pub fn pkce_challenge(verifier: &str) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Check a PKCE verifier against its stored challenge
///
/// Only `S256` is accepted; any other method, including `plain`, returns `false`.
#[must_use]
pub fn verify_pkce(verifier: &str, challenge: &str, method: &str) -> bool {
    if method != PKCE_METHOD_S256 {
        return false;
    }
    pkce_challenge(verifier)
        .as_bytes()
        .ct_eq(challenge.as_bytes())
        .into()
}

/// Hex SHA-256 digest, used to store client secrets
#[must_use]
pub fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Constant-time string comparison
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Current time in epoch milliseconds
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Epoch milliseconds `ttl` from now
#[must_use]
pub fn expires_at_from_now(ttl: Duration) -> i64 {
    now_millis().saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
}

/// Whether an epoch-millisecond deadline has passed
#[must_use]
pub fn is_expired(expires_at_ms: i64) -> bool {
    now_millis() >= expires_at_ms
}

/// Time left before `expires_at_ms`, or `None` once expired
#[must_use]
pub fn remaining(expires_at_ms: i64) -> Option<Duration> {
    let left = expires_at_ms.saturating_sub(now_millis());
    u64::try_from(left)
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}
