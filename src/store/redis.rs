// ABOUTME: Redis store backend with connection manager, SET NX inserts and Lua compare-and-swap
// ABOUTME: Provides shared OAuth state for multi-instance deployments
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{RedisConnectionConfig, StoreConfig, StoreProvider};
use crate::constants::{key_prefixes, store::SCAN_BATCH_SIZE};
use crate::errors::{AppError, AppResult};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Script};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{error, info, warn};

/// Replace KEYS[1] with ARGV[2] only if it currently equals ARGV[1]; ARGV[3] is a PX ttl or 0
static COMPARE_AND_SWAP: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        if redis.call('GET', KEYS[1]) ~= ARGV[1] then
            return 0
        end
        local ttl = tonumber(ARGV[3])
        if ttl > 0 then
            redis.call('SET', KEYS[1], ARGV[2], 'PX', ttl)
        else
            redis.call('SET', KEYS[1], ARGV[2])
        end
        return 1
        ",
    )
});

/// Redis-backed store
///
/// Keys carry their entity namespace (`oauth_codes:...`) so the store can share a Redis
/// instance with other applications. Native expiry is set with `PX` on every write.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    url: Arc<str>,
}

impl RedisStore {
    async fn new_with_config(config: &StoreConfig) -> AppResult<Self> {
        let redis_url = config
            .redis_url
            .as_deref()
            .ok_or_else(|| AppError::config("REDIS_URL is required for the Redis store backend"))?;
        let conn_config = &config.redis_connection;

        info!(
            url = %redact_url(redis_url),
            connect_timeout_secs = conn_config.connection_timeout_secs,
            response_timeout_secs = conn_config.response_timeout_secs,
            retries = conn_config.initial_connection_retries,
            "Connecting to Redis store"
        );

        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::config(format!("Invalid Redis URL: {e}")))?;
        let manager = Self::connect_with_retry(&client, conn_config).await?;

        info!("Redis store connected");
        Ok(Self {
            manager,
            url: Arc::from(redis_url),
        })
    }

    /// Connect with exponential backoff; the manager itself handles later reconnects
    async fn connect_with_retry(
        client: &redis::Client,
        conn_config: &RedisConnectionConfig,
    ) -> AppResult<ConnectionManager> {
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(Duration::from_secs(conn_config.connection_timeout_secs))
            .set_response_timeout(Duration::from_secs(conn_config.response_timeout_secs))
            .set_number_of_retries(conn_config.reconnection_retries)
            .set_exponent_base(conn_config.retry_exponent_base)
            .set_max_delay(conn_config.max_retry_delay_ms);

        let max_retries = conn_config.initial_connection_retries;
        let mut delay_ms = conn_config.initial_retry_delay_ms;
        let mut attempt = 0;

        loop {
            match ConnectionManager::new_with_config(client.clone(), manager_config.clone()).await
            {
                Ok(manager) => {
                    if attempt > 0 {
                        info!(attempt, "Redis connection established after retry");
                    }
                    return Ok(manager);
                }
                Err(e) if attempt < max_retries => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = max_retries + 1,
                        delay_ms,
                        error = %e,
                        "Redis connection attempt failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = (delay_ms * 2).min(conn_config.max_retry_delay_ms);
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempts = max_retries + 1, error = %e, "Redis connection failed");
                    return Err(AppError::unavailable(format!(
                        "Failed to connect to Redis after {} attempts",
                        max_retries + 1
                    ))
                    .with_source(e));
                }
            }
        }
    }

    /// URL this store was opened with, credentials masked
    #[must_use]
    pub fn display_url(&self) -> String {
        redact_url(&self.url)
    }
}

/// Milliseconds for `PX`; zero means "no expiry" to the script and is never sent to `SET`
fn ttl_millis(ttl: Option<Duration>) -> u64 {
    ttl.map_or(0, |ttl| (ttl.as_millis() as u64).max(1))
}

/// Mask the password component of a Redis URL for logging
fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("****")).is_err() {
                return "redis://****".to_owned();
            }
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<invalid redis url>".to_owned(),
    }
}

#[async_trait::async_trait]
impl StoreProvider for RedisStore {
    async fn new(config: StoreConfig) -> AppResult<Self>
    where
        Self: Sized,
    {
        Self::new_with_config(&config).await
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        let mut conn = self.manager.clone();
        match ttl_millis(ttl) {
            0 => conn.set::<_, _, ()>(key, value).await?,
            ms => conn.pset_ex::<_, _, ()>(key, value, ms).await?,
        }
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> AppResult<bool> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        let ms = ttl_millis(ttl);
        if ms > 0 {
            cmd.arg("PX").arg(ms);
        }
        // SET NX replies OK on write and nil when the key already exists
        let reply: Option<String> = cmd.query_async(&mut conn).await?;
        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.manager.clone();
        Ok(conn.get(key).await?)
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.manager.clone();
        let removed: u64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: &str,
        ttl: Option<Duration>,
    ) -> AppResult<bool> {
        let mut conn = self.manager.clone();
        let swapped: i64 = COMPARE_AND_SWAP
            .key(key)
            .arg(expected)
            .arg(new)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await?;
        Ok(swapped == 1)
    }

    async fn health_check(&self) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let response: String = redis::cmd("PING").query_async(&mut conn).await?;
        if response == "PONG" {
            Ok(())
        } else {
            Err(AppError::unavailable(format!(
                "Unexpected PING response '{response}'"
            )))
        }
    }

    async fn clear_all(&self) -> AppResult<()> {
        let mut conn = self.manager.clone();
        for prefix in key_prefixes::ALL {
            let pattern = format!("{prefix}*");
            let mut cursor = 0u64;
            loop {
                let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_BATCH_SIZE)
                    .query_async(&mut conn)
                    .await?;
                if !keys.is_empty() {
                    let _: u64 = conn.del(&keys).await?;
                }
                cursor = next;
                if cursor == 0 {
                    break;
                }
            }
        }
        Ok(())
    }
}
