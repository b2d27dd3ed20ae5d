// ABOUTME: In-memory storage backend built on DashMap for every repository contract
// ABOUTME: Authorization codes carry an expiry and are swept by an optional background task
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use oauth_labs_core::models::{AccessTokenRecord, Client, Consent, RefreshTokenRecord};

use super::{
    AccessTokenRepository, ClientRepository, ConsentRepository, EphemeralStore,
    RefreshTokenRepository, StorageResult, UserDirectory,
};

/// How often the sweeper drops expired codes
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct EphemeralEntry {
    value: String,
    expires_at: Instant,
}

impl EphemeralEntry {
    fn new(value: String, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Process-local store implementing every repository
///
/// Codes live behind an `Arc` so the sweeper task can hold a weak handle
/// and stop once the store is dropped.
#[derive(Default)]
pub struct MemoryStore {
    clients: DashMap<String, Client>,
    consents: DashSet<Consent>,
    users: DashSet<String>,
    access_tokens: DashMap<String, AccessTokenRecord>,
    refresh_tokens: DashMap<String, RefreshTokenRecord>,
    codes: Arc<DashMap<String, EphemeralEntry>>,
}

impl MemoryStore {
    /// Empty store; expired codes are only dropped when read
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store with a background task purging expired codes every `interval`
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn with_sweeper(interval: Duration) -> Self {
        let store = Self::new();
        spawn_sweeper(Arc::downgrade(&store.codes), interval);
        store
    }

    /// Number of codes currently held, expired or not
    #[must_use]
    pub fn pending_codes(&self) -> usize {
        self.codes.len()
    }

    /// Stored access token record by `jti`
    #[must_use]
    pub fn access_token(&self, id: &str) -> Option<AccessTokenRecord> {
        self.access_tokens.get(id).map(|r| r.value().clone())
    }

    /// Stored refresh token record by id
    #[must_use]
    pub fn refresh_token(&self, id: &str) -> Option<RefreshTokenRecord> {
        self.refresh_tokens.get(id).map(|r| r.value().clone())
    }
}

fn spawn_sweeper(codes: Weak<DashMap<String, EphemeralEntry>>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let Some(codes) = codes.upgrade() else {
                tracing::debug!("Code store dropped, sweeper exiting");
                break;
            };
            let before = codes.len();
            codes.retain(|_, entry| !entry.is_expired());
            let removed = before.saturating_sub(codes.len());
            if removed > 0 {
                tracing::debug!(removed, "Swept expired authorization codes");
            }
        }
    });
}

#[async_trait]
impl ClientRepository for MemoryStore {
    async fn get(&self, id: &str) -> StorageResult<Option<Client>> {
        Ok(self.clients.get(id).map(|c| c.value().clone()))
    }

    async fn exists(&self, id: &str) -> StorageResult<bool> {
        Ok(self.clients.contains_key(id))
    }

    async fn upsert(&self, client: &Client) -> StorageResult<()> {
        self.clients.insert(client.id.clone(), client.clone());
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<Client>> {
        let mut clients: Vec<Client> = self.clients.iter().map(|c| c.value().clone()).collect();
        clients.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(clients)
    }
}

#[async_trait]
impl ConsentRepository for MemoryStore {
    async fn create(&self, consent: &Consent) -> StorageResult<()> {
        self.consents.insert(consent.clone());
        Ok(())
    }

    async fn delete(&self, consent: &Consent) -> StorageResult<()> {
        self.consents.remove(consent);
        Ok(())
    }

    async fn exists(&self, consent: &Consent) -> StorageResult<bool> {
        Ok(self.consents.contains(consent))
    }

    async fn list_for_user(&self, user_id: &str) -> StorageResult<Vec<String>> {
        let mut clients: Vec<String> = self
            .consents
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.client_id.clone())
            .collect();
        clients.sort();
        Ok(clients)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn exists(&self, user_id: &str) -> StorageResult<bool> {
        Ok(self.users.contains(user_id))
    }

    async fn add(&self, user_id: &str) -> StorageResult<()> {
        self.users.insert(user_id.to_owned());
        Ok(())
    }
}

#[async_trait]
impl AccessTokenRepository for MemoryStore {
    async fn create(&self, record: &AccessTokenRecord) -> StorageResult<()> {
        self.access_tokens.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn exists(&self, id: &str) -> StorageResult<bool> {
        Ok(self.access_tokens.contains_key(id))
    }

    async fn is_revoked(&self, id: &str) -> bool {
        self.access_tokens.get(id).is_none_or(|r| r.revoked)
    }

    async fn revoke_all(&self, client_id: &str, user_id: &str) -> StorageResult<()> {
        self.access_tokens
            .iter_mut()
            .filter(|r| r.client_id == client_id && r.user_id == user_id)
            .for_each(|mut r| r.revoked = true);
        Ok(())
    }

    async fn delete_all(&self, client_id: &str, user_id: &str) -> StorageResult<()> {
        self.access_tokens
            .retain(|_, r| !(r.client_id == client_id && r.user_id == user_id));
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenRepository for MemoryStore {
    async fn create(&self, record: &RefreshTokenRecord) -> StorageResult<()> {
        self.refresh_tokens.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> StorageResult<Option<RefreshTokenRecord>> {
        Ok(self.refresh_tokens.get(id).map(|r| r.value().clone()))
    }

    async fn revoke(&self, id: &str) -> StorageResult<()> {
        if let Some(mut record) = self.refresh_tokens.get_mut(id) {
            record.revoked = true;
        }
        Ok(())
    }

    async fn revoke_all(&self, client_id: &str, user_id: &str) -> StorageResult<()> {
        self.refresh_tokens
            .iter_mut()
            .filter(|r| r.client_id == client_id && r.user_id == user_id)
            .for_each(|mut r| r.revoked = true);
        Ok(())
    }
}

#[async_trait]
impl EphemeralStore for MemoryStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()> {
        self.codes
            .insert(key.to_owned(), EphemeralEntry::new(value.to_owned(), ttl));
        Ok(())
    }

    async fn take(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self
            .codes
            .remove(key)
            .and_then(|(_, entry)| (!entry.is_expired()).then_some(entry.value)))
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let value = self
            .codes
            .get(key)
            .and_then(|entry| (!entry.is_expired()).then(|| entry.value.clone()));
        if value.is_none() {
            self.codes.remove_if(key, |_, entry| entry.is_expired());
        }
        Ok(value)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.codes.remove(key);
        Ok(())
    }
}
