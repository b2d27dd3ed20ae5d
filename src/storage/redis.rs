// ABOUTME: Redis-backed authorization code store with native key expiry
// ABOUTME: Single-use redemption is a GETDEL so concurrent redeemers cannot both succeed
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::time::Duration;

use async_trait::async_trait;
use oauth_labs_core::errors::StorageError;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use tracing::{error, info, warn};

use super::{EphemeralStore, StorageResult};

/// Namespace prefix of every key this store writes
pub const KEY_PREFIX: &str = "oauth_labs:authorization_code:";

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(3);
const INITIAL_CONNECTION_RETRIES: u32 = 3;
const INITIAL_RETRY_DELAY_MS: u64 = 100;
const MAX_RETRY_DELAY_MS: u64 = 5_000;

/// Authorization codes in Redis
///
/// Uses Redis `ConnectionManager` for automatic reconnection. Keys expire
/// through `SET EX`, so no sweeper is needed.
#[derive(Clone)]
pub struct RedisCodeStore {
    manager: ConnectionManager,
}

impl RedisCodeStore {
    /// Connect to Redis, retrying with exponential backoff
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or every attempt fails
    pub async fn connect(redis_url: &str) -> StorageResult<Self> {
        info!(redis_url = %redis_url, "Connecting to Redis code store");

        let client =
            redis::Client::open(redis_url).map_err(|e| StorageError::backend("redis client", e))?;
        let manager = Self::connect_with_retry(&client).await?;

        info!("Successfully connected to Redis");
        Ok(Self { manager })
    }

    async fn connect_with_retry(client: &redis::Client) -> StorageResult<ConnectionManager> {
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(CONNECTION_TIMEOUT)
            .set_response_timeout(RESPONSE_TIMEOUT)
            .set_max_delay(MAX_RETRY_DELAY_MS);

        let mut delay_ms = INITIAL_RETRY_DELAY_MS;
        let mut last_error = None;

        for attempt in 0..=INITIAL_CONNECTION_RETRIES {
            match ConnectionManager::new_with_config(client.clone(), manager_config.clone()).await
            {
                Ok(manager) => {
                    if attempt > 0 {
                        info!(retries = attempt, "Redis connection established");
                    }
                    return Ok(manager);
                }
                Err(e) => {
                    if attempt < INITIAL_CONNECTION_RETRIES {
                        warn!(
                            "Redis connection attempt {}/{} failed, retrying in {}ms: {}",
                            attempt + 1,
                            INITIAL_CONNECTION_RETRIES + 1,
                            delay_ms,
                            e
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        delay_ms = (delay_ms * 2).min(MAX_RETRY_DELAY_MS);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(StorageError::backend(
            "redis connect",
            last_error.map_or_else(|| "unknown error".to_owned(), |e| e.to_string()),
        ))
    }

    fn build_key(key: &str) -> String {
        format!("{KEY_PREFIX}{key}")
    }
}

fn command_failed(context: &'static str, e: &redis::RedisError) -> StorageError {
    error!(command = context, error = %e, "Redis command failed");
    StorageError::backend(context, e)
}

#[async_trait]
impl EphemeralStore for RedisCodeStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()> {
        let mut conn = self.manager.clone();
        // SET EX rejects a zero expiry
        let ttl_secs = ttl.as_secs().max(1);

        conn.set_ex::<_, _, ()>(Self::build_key(key), value, ttl_secs)
            .await
            .map_err(|e| command_failed("SET", &e))
    }

    async fn take(&self, key: &str) -> StorageResult<Option<String>> {
        let mut conn = self.manager.clone();

        redis::cmd("GETDEL")
            .arg(Self::build_key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| command_failed("GETDEL", &e))
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let mut conn = self.manager.clone();

        conn.get(Self::build_key(key))
            .await
            .map_err(|e| command_failed("GET", &e))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let mut conn = self.manager.clone();

        conn.del::<_, ()>(Self::build_key(key))
            .await
            .map_err(|e| command_failed("DEL", &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_namespaced() {
        assert_eq!(
            RedisCodeStore::build_key("abc"),
            "oauth_labs:authorization_code:abc"
        );
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let result = RedisCodeStore::connect("not-a-redis-url").await;
        assert!(matches!(result, Err(StorageError::Backend { .. })));
    }
}
