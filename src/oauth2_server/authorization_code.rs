// ABOUTME: One-time authorization codes backed by a TTL-bound ephemeral store
// ABOUTME: Codes are 256-bit random values, base64url on the wire and hex as the storage key
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use oauth_labs_core::constants::defaults::AUTHORIZATION_CODE_BYTES;
use oauth_labs_core::errors::StorageError;
use ring::rand::{SecureRandom, SystemRandom};

use super::models::{AuthorizationCode, NewAuthorizationCode};
use crate::storage::EphemeralStore;

/// Authorization code failures
#[derive(Debug, thiserror::Error)]
pub enum CodeError {
    /// Unknown, expired, or already redeemed
    #[error("authorization code not found")]
    NotFound,
    /// Not a base64url encoding of the expected length
    #[error("malformed authorization code")]
    Malformed,
    /// The RNG failed
    #[error("failed to generate authorization code")]
    Generation,
    /// The backend failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Ephemeral one-time authorization codes
#[derive(Clone)]
pub struct AuthorizationCodeStore {
    store: Arc<dyn EphemeralStore>,
    ttl: Duration,
    rng: SystemRandom,
}

impl AuthorizationCodeStore {
    /// Creates a store whose codes live for `ttl`
    #[must_use]
    pub fn new(store: Arc<dyn EphemeralStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            rng: SystemRandom::new(),
        }
    }

    /// Lifetime of newly issued codes
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a new code bound to the request parameters
    ///
    /// # Errors
    ///
    /// Returns an error if the RNG or the backend fails
    pub async fn create(
        &self,
        params: NewAuthorizationCode<'_>,
    ) -> Result<AuthorizationCode, CodeError> {
        let mut raw = [0u8; AUTHORIZATION_CODE_BYTES];
        self.rng.fill(&mut raw).map_err(|_| {
            tracing::error!("System RNG failure while generating authorization code");
            CodeError::Generation
        })?;

        let record = AuthorizationCode {
            code: URL_SAFE_NO_PAD.encode(raw),
            client_id: params.client_id.to_owned(),
            user_id: params.user_id.to_owned(),
            redirect_uri: params.redirect_uri.map(ToOwned::to_owned),
            scope: params.scope.to_owned(),
            pkce: params.pkce,
            created_at: chrono::Utc::now().timestamp(),
        };

        let key = hex::encode(raw);
        let value = serde_json::to_string(&record).map_err(|source| {
            StorageError::Serialization {
                entity: "authorization code",
                source,
            }
        })?;
        self.store.put(&key, &value, self.ttl).await?;

        tracing::debug!(
            code_key = %key_prefix(&key),
            client_id = %record.client_id,
            "Issued authorization code"
        );
        Ok(record)
    }

    /// Look up a code without consuming it
    ///
    /// # Errors
    ///
    /// Returns [`CodeError::NotFound`] if the code is unknown or expired
    pub async fn get(&self, code: &str) -> Result<AuthorizationCode, CodeError> {
        let key = Self::lookup_key(code)?;
        let value = self.store.get(&key).await?.ok_or(CodeError::NotFound)?;
        Self::decode_record(code, &value)
    }

    /// Atomically look up and consume a code.
    ///
    /// Of several concurrent callers presenting the same code, at most one
    /// receives the record.
    ///
    /// # Errors
    ///
    /// Returns [`CodeError::NotFound`] if the code is unknown, expired, or already taken
    pub async fn take(&self, code: &str) -> Result<AuthorizationCode, CodeError> {
        let key = Self::lookup_key(code)?;
        let value = self.store.take(&key).await?.ok_or(CodeError::NotFound)?;
        tracing::debug!(code_key = %key_prefix(&key), "Consumed authorization code");
        Self::decode_record(code, &value)
    }

    /// Delete a code; failures are logged, the TTL bounds any leftover
    pub async fn delete(&self, code: &str) {
        let Ok(key) = Self::lookup_key(code) else {
            return;
        };
        if let Err(e) = self.store.delete(&key).await {
            tracing::warn!(
                code_key = %key_prefix(&key),
                error = %e,
                "Failed to delete authorization code"
            );
        }
    }

    fn lookup_key(code: &str) -> Result<String, CodeError> {
        let raw = URL_SAFE_NO_PAD
            .decode(code)
            .map_err(|_| CodeError::Malformed)?;
        if raw.len() != AUTHORIZATION_CODE_BYTES {
            return Err(CodeError::Malformed);
        }
        Ok(hex::encode(raw))
    }

    fn decode_record(code: &str, value: &str) -> Result<AuthorizationCode, CodeError> {
        let mut record: AuthorizationCode =
            serde_json::from_str(value).map_err(|source| StorageError::Serialization {
                entity: "authorization code",
                source,
            })?;
        code.clone_into(&mut record.code);
        Ok(record)
    }
}

fn key_prefix(key: &str) -> &str {
    key.get(..8).unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkce::{CodeChallengeMethod, PkceChallenge};
    use crate::storage::memory::MemoryStore;

    fn store() -> AuthorizationCodeStore {
        AuthorizationCodeStore::new(Arc::new(MemoryStore::new()), Duration::from_secs(600))
    }

    fn params<'a>() -> NewAuthorizationCode<'a> {
        NewAuthorizationCode {
            client_id: "client-1",
            user_id: "alice",
            redirect_uri: Some("https://client.example/cb"),
            scope: "read:profile",
            pkce: Some(PkceChallenge {
                challenge: "challenge".to_owned(),
                method: CodeChallengeMethod::Plain,
            }),
        }
    }

    #[tokio::test]
    async fn test_create_then_get_round_trips_fields() {
        let codes = store();
        let issued = codes.create(params()).await.unwrap();

        assert_eq!(URL_SAFE_NO_PAD.decode(&issued.code).unwrap().len(), 32);
        let loaded = codes.get(&issued.code).await.unwrap();
        assert_eq!(loaded, issued);
    }

    #[tokio::test]
    async fn test_take_is_single_use() {
        let codes = store();
        let issued = codes.create(params()).await.unwrap();

        assert!(codes.take(&issued.code).await.is_ok());
        assert!(matches!(
            codes.take(&issued.code).await,
            Err(CodeError::NotFound)
        ));
        assert!(matches!(
            codes.get(&issued.code).await,
            Err(CodeError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_is_best_effort() {
        let codes = store();
        let issued = codes.create(params()).await.unwrap();

        codes.delete(&issued.code).await;
        assert!(matches!(
            codes.get(&issued.code).await,
            Err(CodeError::NotFound)
        ));

        // unknown and malformed codes are ignored
        codes.delete(&issued.code).await;
        codes.delete("not base64!").await;
    }

    #[tokio::test]
    async fn test_malformed_codes_are_rejected() {
        let codes = store();
        assert!(matches!(codes.get("not base64!").await, Err(CodeError::Malformed)));
        assert!(matches!(codes.get("c2hvcnQ").await, Err(CodeError::Malformed)));
    }

    #[tokio::test]
    async fn test_expired_code_is_not_found() {
        let codes =
            AuthorizationCodeStore::new(Arc::new(MemoryStore::new()), Duration::from_millis(10));
        let issued = codes.create(params()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(matches!(
            codes.get(&issued.code).await,
            Err(CodeError::NotFound)
        ));
    }
}
