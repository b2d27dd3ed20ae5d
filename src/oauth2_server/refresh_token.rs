// ABOUTME: Refresh tokens as signed payloads sealed in a compact JWE addressed to the server key
// ABOUTME: Validity is storage-primary: the envelope proves origin, the stored flag decides liveness
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use jsonwebtoken::{Algorithm, Validation};
use oauth_labs_core::constants::jose::REFRESH_TOKEN_TYP;
use oauth_labs_core::errors::StorageError;
use oauth_labs_core::models::{RefreshTokenPayload, RefreshTokenRecord};
use tracing::debug;
use uuid::Uuid;

use super::access_token::TokenError;
use crate::crypto::jwe;
use crate::keys::KeyManager;
use crate::storage::RefreshTokenRepository;

/// Issues, redeems and revokes refresh tokens
#[derive(Clone)]
pub struct RefreshTokenManager {
    keys: Arc<KeyManager>,
    tokens: Arc<dyn RefreshTokenRepository>,
}

impl RefreshTokenManager {
    /// Creates a manager over the given repository
    #[must_use]
    pub fn new(keys: Arc<KeyManager>, tokens: Arc<dyn RefreshTokenRepository>) -> Self {
        Self { keys, tokens }
    }

    /// Sign, encrypt and persist a new refresh token; returns the client-visible form
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if signing or encryption fails, or
    /// [`TokenError::Storage`] if the record cannot be written
    pub async fn issue(
        &self,
        user_id: &str,
        client_id: &str,
        scope: &str,
    ) -> Result<String, TokenError> {
        let payload = RefreshTokenPayload {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_owned(),
            client_id: client_id.to_owned(),
            scope: scope.to_owned(),
            created_at: Utc::now().timestamp(),
        };

        let signed = self.keys.sign(REFRESH_TOKEN_TYP, &payload)?;
        let compact = jwe::encrypt(
            signed.as_bytes(),
            self.keys.encryption_public_key(),
            Some(self.keys.kid()),
        )?;

        self.tokens
            .create(&RefreshTokenRecord {
                id: payload.id.clone(),
                client_id: payload.client_id,
                user_id: payload.user_id,
                data: hex::encode(compact.as_bytes()),
                revoked: false,
            })
            .await?;

        debug!(refresh_token_id = %payload.id, client_id = %client_id, "Issued refresh token");
        Ok(URL_SAFE_NO_PAD.encode(compact.as_bytes()))
    }

    /// Open a refresh token and check it against storage
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Revoked`] if the stored record is revoked,
    /// [`TokenError::Invalid`] if decoding, decryption, signature checks or
    /// the lookup fail, or [`TokenError::Storage`] if the backend fails
    pub async fn redeem(&self, token: &str) -> Result<RefreshTokenPayload, TokenError> {
        let payload = self.open(token)?;

        let Some(record) = self.tokens.get(&payload.id).await? else {
            debug!(refresh_token_id = %payload.id, "Refresh token not found in storage");
            return Err(TokenError::Invalid);
        };
        if record.client_id != payload.client_id || record.user_id != payload.user_id {
            debug!(refresh_token_id = %payload.id, "Refresh token record does not match payload");
            return Err(TokenError::Invalid);
        }
        if record.revoked {
            debug!(refresh_token_id = %payload.id, "Refresh token is revoked");
            return Err(TokenError::Revoked);
        }

        Ok(payload)
    }

    /// Revoke a single refresh token by id
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    pub async fn revoke(&self, id: &str) -> Result<(), StorageError> {
        self.tokens.revoke(id).await
    }

    /// Revoke every refresh token of the pair
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    pub async fn revoke_all(&self, client_id: &str, user_id: &str) -> Result<(), StorageError> {
        self.tokens.revoke_all(client_id, user_id).await
    }

    fn open(&self, token: &str) -> Result<RefreshTokenPayload, TokenError> {
        let compact = URL_SAFE_NO_PAD
            .decode(token.trim())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or(TokenError::Invalid)?;

        let signed = jwe::decrypt(&compact, self.keys.encryption_private_key()).map_err(|e| {
            debug!(error = %e, "Refresh token envelope rejected");
            TokenError::Invalid
        })?;
        let signed = String::from_utf8(signed).map_err(|_| TokenError::Invalid)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims::<&str>(&[]);
        validation.validate_exp = false;
        validation.validate_aud = false;

        self.keys
            .verify::<RefreshTokenPayload>(&signed, REFRESH_TOKEN_TYP, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "Refresh token signature rejected");
                TokenError::Invalid
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use crate::test_utils::test_keys;

    fn manager() -> (RefreshTokenManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (RefreshTokenManager::new(test_keys(), store.clone()), store)
    }

    #[tokio::test]
    async fn test_issue_then_redeem() {
        let (refresh, store) = manager();
        let token = refresh
            .issue("alice", "client-a", "read:profile")
            .await
            .unwrap();

        let payload = refresh.redeem(&token).await.unwrap();
        assert_eq!(payload.user_id, "alice");
        assert_eq!(payload.client_id, "client-a");
        assert_eq!(payload.scope, "read:profile");

        let record = store.refresh_token(&payload.id).unwrap();
        let compact = String::from_utf8(hex::decode(&record.data).unwrap()).unwrap();
        assert_eq!(compact.split('.').count(), 5);
        assert_eq!(URL_SAFE_NO_PAD.encode(compact.as_bytes()), token);
    }

    #[tokio::test]
    async fn test_revoked_token_reports_revoked() {
        let (refresh, _store) = manager();
        let token = refresh
            .issue("alice", "client-a", "read:profile")
            .await
            .unwrap();
        let other = refresh
            .issue("alice", "client-b", "read:profile")
            .await
            .unwrap();

        refresh.revoke_all("client-a", "alice").await.unwrap();
        assert!(matches!(
            refresh.redeem(&token).await,
            Err(TokenError::Revoked)
        ));
        assert!(refresh.redeem(&other).await.is_ok());
    }

    #[tokio::test]
    async fn test_single_revoke() {
        let (refresh, _store) = manager();
        let token = refresh
            .issue("alice", "client-a", "read:profile")
            .await
            .unwrap();
        let id = refresh.redeem(&token).await.unwrap().id;

        refresh.revoke(&id).await.unwrap();
        assert!(matches!(
            refresh.redeem(&token).await,
            Err(TokenError::Revoked)
        ));
    }

    #[tokio::test]
    async fn test_garbage_and_foreign_tokens_are_invalid() {
        let (refresh, _store) = manager();
        assert!(matches!(
            refresh.redeem("not-a-token").await,
            Err(TokenError::Invalid)
        ));

        // valid envelope from an unrelated store: no record
        let (other, _other_store) = manager();
        let token = other.issue("alice", "client-a", "").await.unwrap();
        assert!(matches!(
            refresh.redeem(&token).await,
            Err(TokenError::Invalid)
        ));
    }

    #[tokio::test]
    async fn test_access_token_is_not_a_refresh_token() {
        let (refresh, _store) = manager();
        let keys = test_keys();
        let jws = keys
            .sign(
                oauth_labs_core::constants::jose::ACCESS_TOKEN_TYP,
                &serde_json::json!({"id": "x", "user_id": "a", "client_id": "b", "scope": "", "created_at": 0}),
            )
            .unwrap();
        assert!(matches!(
            refresh.redeem(&jws).await,
            Err(TokenError::Invalid)
        ));
    }
}
