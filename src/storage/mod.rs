// ABOUTME: Repository contracts for clients, consents, users, tokens, and ephemeral authorization codes
// ABOUTME: Pluggable backends (in-memory, SQLite, Redis) selected from configuration at startup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Storage
//!
//! The engine owns protocol logic only. Persistence sits behind the traits
//! in this module so the backing store can be swapped without touching
//! the engine:
//!
//! - [`memory::MemoryStore`] keeps everything in `DashMap`s
//! - [`sqlite::SqliteStore`] persists clients, consents, users and token records
//! - [`redis::RedisCodeStore`] holds authorization codes with native TTLs

/// In-memory backend
pub mod memory;
/// Redis authorization code backend
pub mod redis;
/// `SQLite` backend
pub mod sqlite;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oauth_labs_core::errors::StorageError;
use oauth_labs_core::models::{AccessTokenRecord, Client, Consent, RefreshTokenRecord};
use tracing::info;

use crate::config::{DatabaseUrl, ServerConfig};

/// Result alias for repository operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Registered OAuth clients
#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// Look up a client by id
    async fn get(&self, id: &str) -> StorageResult<Option<Client>>;

    /// Whether a client with this id exists
    async fn exists(&self, id: &str) -> StorageResult<bool>;

    /// Replace any existing client with the same id; delete and insert are one transaction
    async fn upsert(&self, client: &Client) -> StorageResult<()>;

    /// Every registered client
    async fn list(&self) -> StorageResult<Vec<Client>>;
}

/// User consent grants
#[async_trait]
pub trait ConsentRepository: Send + Sync {
    /// Record a consent; recording an existing consent is not an error
    async fn create(&self, consent: &Consent) -> StorageResult<()>;

    /// Remove a consent
    async fn delete(&self, consent: &Consent) -> StorageResult<()>;

    /// Whether the consent exists
    async fn exists(&self, consent: &Consent) -> StorageResult<bool>;

    /// Ids of every client the user consented to
    async fn list_for_user(&self, user_id: &str) -> StorageResult<Vec<String>>;
}

/// Issued access token records keyed by `jti`
#[async_trait]
pub trait AccessTokenRepository: Send + Sync {
    /// Persist a freshly issued token
    async fn create(&self, record: &AccessTokenRecord) -> StorageResult<()>;

    /// Whether the `jti` was issued by this server
    async fn exists(&self, id: &str) -> StorageResult<bool>;

    /// Revocation flag; unknown ids and backend failures count as revoked
    async fn is_revoked(&self, id: &str) -> bool;

    /// Revoke every token of the (client, user) pair
    async fn revoke_all(&self, client_id: &str, user_id: &str) -> StorageResult<()>;

    /// Delete every token of the (client, user) pair
    async fn delete_all(&self, client_id: &str, user_id: &str) -> StorageResult<()>;
}

/// Issued refresh token records keyed by payload id
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Persist a freshly issued token
    async fn create(&self, record: &RefreshTokenRecord) -> StorageResult<()>;

    /// Look up a token by id
    async fn get(&self, id: &str) -> StorageResult<Option<RefreshTokenRecord>>;

    /// Revoke a single token
    async fn revoke(&self, id: &str) -> StorageResult<()>;

    /// Revoke every token of the (client, user) pair
    async fn revoke_all(&self, client_id: &str, user_id: &str) -> StorageResult<()>;
}

/// User identity lookup supplied by the host application
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Whether the user id is known
    async fn exists(&self, user_id: &str) -> StorageResult<bool>;

    /// Provision a user id
    async fn add(&self, user_id: &str) -> StorageResult<()>;
}

/// TTL-bound key/value store for one-time artifacts
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    /// Store `value` under `key` for `ttl`
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()>;

    /// Atomically read and delete `key`; concurrent callers see at most one value
    async fn take(&self, key: &str) -> StorageResult<Option<String>>;

    /// Read `key` without consuming it
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete `key`
    async fn delete(&self, key: &str) -> StorageResult<()>;
}

/// Every durable repository, implemented by one backend
pub trait Repositories:
    ClientRepository
    + ConsentRepository
    + AccessTokenRepository
    + RefreshTokenRepository
    + UserDirectory
    + 'static
{
}

impl<T> Repositories for T where
    T: ClientRepository
        + ConsentRepository
        + AccessTokenRepository
        + RefreshTokenRepository
        + UserDirectory
        + 'static
{
}

/// Handles to every store the engine uses
#[derive(Clone)]
pub struct Storage {
    /// Client registry storage
    pub clients: Arc<dyn ClientRepository>,
    /// Consent storage
    pub consents: Arc<dyn ConsentRepository>,
    /// Access token records
    pub access_tokens: Arc<dyn AccessTokenRepository>,
    /// Refresh token records
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
    /// User identity lookup
    pub users: Arc<dyn UserDirectory>,
    /// Authorization codes
    pub codes: Arc<dyn EphemeralStore>,
}

impl Storage {
    /// Bundle a durable backend with an ephemeral code store
    #[must_use]
    pub fn new<R: Repositories>(primary: Arc<R>, codes: Arc<dyn EphemeralStore>) -> Self {
        Self {
            clients: primary.clone(),
            consents: primary.clone(),
            access_tokens: primary.clone(),
            refresh_tokens: primary.clone(),
            users: primary,
            codes,
        }
    }

    /// Everything in process memory, without a background sweeper
    #[must_use]
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::new());
        Self::new(store.clone(), store)
    }

    /// Build the configured backends
    ///
    /// # Errors
    ///
    /// Returns an error if the database or Redis cannot be reached
    pub async fn from_config(config: &ServerConfig) -> StorageResult<Self> {
        let codes: Arc<dyn EphemeralStore> = match &config.redis_url {
            Some(url) => Arc::new(redis::RedisCodeStore::connect(url).await?),
            None => Arc::new(memory::MemoryStore::with_sweeper(
                memory::DEFAULT_SWEEP_INTERVAL,
            )),
        };

        match &config.storage {
            DatabaseUrl::Memory => {
                info!("Using in-memory storage");
                Ok(Self::new(Arc::new(memory::MemoryStore::new()), codes))
            }
            DatabaseUrl::SQLite { .. } => {
                let url = config.storage.to_connection_string();
                info!(database = %url, "Using SQLite storage");
                Ok(Self::new(
                    Arc::new(sqlite::SqliteStore::connect(&url).await?),
                    codes,
                ))
            }
        }
    }
}
