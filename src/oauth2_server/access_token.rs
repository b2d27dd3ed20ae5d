// ABOUTME: Access token issuance and validation: RS256 JWTs persisted as AES-GCM ciphertext
// ABOUTME: Validation re-resolves client, user and jti against storage and checks the revocation flag
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Access Tokens
//!
//! Access tokens are RFC 9068 style JWTs (`typ: at+jwt`). The signed token
//! goes to the client; the server keeps its own copy encrypted under the
//! token encryption key, keyed by `jti`, together with a revocation flag.
//!
//! Validation is deliberately all-or-nothing. Every failed sub-check
//! collapses into [`TokenError::Invalid`] (or [`TokenError::Revoked`]); the
//! precise cause is logged at debug level and never returned to the caller.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, Validation};
use oauth_labs_core::constants::jose::ACCESS_TOKEN_TYP;
use oauth_labs_core::errors::StorageError;
use oauth_labs_core::models::{AccessTokenClaims, AccessTokenRecord};
use tracing::debug;
use uuid::Uuid;

use super::models::IssuedAccessToken;
use crate::crypto::{CryptoCodec, CryptoError};
use crate::keys::{KeyError, KeyManager};
use crate::storage::{AccessTokenRepository, ClientRepository, Storage, UserDirectory};

/// Token manager failures
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Signature, claims, or a storage cross-check failed
    #[error("invalid token")]
    Invalid,
    /// The token was revoked
    #[error("token revoked")]
    Revoked,
    /// The backend failed
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Signing or sealing a new token failed
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<KeyError> for TokenError {
    fn from(error: KeyError) -> Self {
        Self::Signing(error.to_string())
    }
}

impl From<CryptoError> for TokenError {
    fn from(error: CryptoError) -> Self {
        Self::Signing(error.to_string())
    }
}

/// Issues, validates and revokes access tokens
#[derive(Clone)]
pub struct AccessTokenManager {
    keys: Arc<KeyManager>,
    codec: CryptoCodec,
    tokens: Arc<dyn AccessTokenRepository>,
    clients: Arc<dyn ClientRepository>,
    users: Arc<dyn UserDirectory>,
    issuer: String,
    enforce_audience: bool,
}

impl AccessTokenManager {
    /// Creates a manager over the storage's token, client and user repositories
    #[must_use]
    pub fn new(
        keys: Arc<KeyManager>,
        codec: CryptoCodec,
        storage: &Storage,
        issuer: &str,
        enforce_audience: bool,
    ) -> Self {
        Self {
            keys,
            codec,
            tokens: Arc::clone(&storage.access_tokens),
            clients: Arc::clone(&storage.clients),
            users: Arc::clone(&storage.users),
            issuer: issuer.to_owned(),
            enforce_audience,
        }
    }

    /// Sign a token for `user_id` and `client_id` and persist the encrypted copy
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if signing or sealing fails, or
    /// [`TokenError::Storage`] if the record cannot be written
    pub async fn issue(
        &self,
        user_id: &str,
        client_id: &str,
        scope: &str,
        ttl: Duration,
    ) -> Result<IssuedAccessToken, TokenError> {
        let now = Utc::now().timestamp();
        let claims = AccessTokenClaims {
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
            sub: user_id.to_owned(),
            aud: vec![client_id.to_owned()],
            iat: now,
            nbf: now,
            exp: now + ttl.as_secs() as i64,
            scope: scope.to_owned(),
            client_id: client_id.to_owned(),
        };

        let token = self.keys.sign(ACCESS_TOKEN_TYP, &claims)?;
        let sealed = self.codec.encrypt(token.as_bytes())?;

        self.tokens
            .create(&AccessTokenRecord {
                id: claims.jti.clone(),
                user_id: claims.sub.clone(),
                client_id: claims.client_id.clone(),
                data: hex::encode(sealed),
                revoked: false,
            })
            .await?;

        debug!(jti = %claims.jti, client_id = %client_id, user_id = %user_id, "Issued access token");
        Ok(IssuedAccessToken {
            token,
            jti: claims.jti,
            expires_in: ttl.as_secs(),
        })
    }

    /// Verify a token and return its claims
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Revoked`] for revoked tokens, [`TokenError::Invalid`]
    /// for any other rejection, or [`TokenError::Storage`] if a lookup fails
    pub async fn validate(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub", "aud"]);
        validation.validate_nbf = true;
        // audience is compared against the client_id claim below
        validation.validate_aud = false;

        let claims = self
            .keys
            .verify::<AccessTokenClaims>(token, ACCESS_TOKEN_TYP, &validation)
            .map_err(|e| reject("signature or claims", &e))?
            .claims;

        if claims.jti.is_empty() || claims.sub.is_empty() || claims.client_id.is_empty() {
            return Err(reject("claims", &"empty jti, sub or client_id"));
        }
        if !self.clients.exists(&claims.client_id).await? {
            return Err(reject("client_id", &claims.client_id));
        }
        if !self.users.exists(&claims.sub).await? {
            return Err(reject("sub", &claims.sub));
        }
        if !self.tokens.exists(&claims.jti).await? {
            return Err(reject("jti", &claims.jti));
        }
        if self.enforce_audience && claims.aud != [claims.client_id.as_str()] {
            return Err(reject("aud", &claims.aud.join(" ")));
        }
        if self.tokens.is_revoked(&claims.jti).await {
            debug!(jti = %claims.jti, "Access token is revoked");
            return Err(TokenError::Revoked);
        }

        Ok(claims)
    }

    /// Mark every access token of the pair revoked
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    pub async fn revoke_all(&self, client_id: &str, user_id: &str) -> Result<(), StorageError> {
        self.tokens.revoke_all(client_id, user_id).await
    }

    /// Delete every access token record of the pair
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    pub async fn delete_all(&self, client_id: &str, user_id: &str) -> Result<(), StorageError> {
        self.tokens.delete_all(client_id, user_id).await
    }
}

fn reject(check: &str, detail: &dyn std::fmt::Display) -> TokenError {
    debug!(check, detail = %detail, "Access token rejected");
    TokenError::Invalid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_client, test_codec, test_keys, TEST_ISSUER};
    use crate::storage::memory::MemoryStore;
    use jsonwebtoken::{EncodingKey, Header};
    use oauth_labs_core::constants::jose::REFRESH_TOKEN_TYP;

    const TTL: Duration = Duration::from_secs(300);

    async fn setup(enforce_audience: bool) -> (AccessTokenManager, Storage) {
        let storage = Storage::in_memory();
        storage.clients.upsert(&test_client("client-a")).await.unwrap();
        storage.clients.upsert(&test_client("client-b")).await.unwrap();
        storage.users.add("alice").await.unwrap();
        let manager = AccessTokenManager::new(
            test_keys(),
            test_codec(),
            &storage,
            TEST_ISSUER,
            enforce_audience,
        );
        (manager, storage)
    }

    #[tokio::test]
    async fn test_issue_then_validate() {
        let (manager, _storage) = setup(true).await;
        let issued = manager
            .issue("alice", "client-a", "read:profile", TTL)
            .await
            .unwrap();

        let claims = manager.validate(&issued.token).await.unwrap();
        assert_eq!(claims.jti, issued.jti);
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.aud, vec!["client-a".to_owned()]);
        assert_eq!(claims.scope, "read:profile");
        assert_eq!(claims.exp - claims.iat, 300);
        assert_eq!(issued.expires_in, 300);
    }

    #[tokio::test]
    async fn test_stored_copy_is_encrypted() {
        let store = Arc::new(MemoryStore::new());
        let storage = Storage::new(Arc::clone(&store), Arc::clone(&store) as _);
        storage.users.add("alice").await.unwrap();
        let codec = test_codec();
        let manager =
            AccessTokenManager::new(test_keys(), codec.clone(), &storage, TEST_ISSUER, true);

        let issued = manager
            .issue("alice", "client-a", "read:profile", TTL)
            .await
            .unwrap();
        let record = store.access_token(&issued.jti).unwrap();

        assert!(!record.data.contains(&issued.token));
        let opened = codec.decrypt(&hex::decode(&record.data).unwrap()).unwrap();
        assert_eq!(opened, issued.token.as_bytes());
    }

    #[tokio::test]
    async fn test_revoked_token_is_rejected() {
        let (manager, _storage) = setup(true).await;
        let issued = manager
            .issue("alice", "client-a", "read:profile", TTL)
            .await
            .unwrap();

        manager.revoke_all("client-a", "alice").await.unwrap();
        assert!(matches!(
            manager.validate(&issued.token).await,
            Err(TokenError::Revoked)
        ));
    }

    #[tokio::test]
    async fn test_deleted_token_is_invalid() {
        let (manager, _storage) = setup(true).await;
        let issued = manager
            .issue("alice", "client-a", "read:profile", TTL)
            .await
            .unwrap();

        manager.delete_all("client-a", "alice").await.unwrap();
        assert!(matches!(
            manager.validate(&issued.token).await,
            Err(TokenError::Invalid)
        ));
    }

    #[tokio::test]
    async fn test_unknown_user_or_client_is_invalid() {
        let (manager, _storage) = setup(true).await;
        let ghost_user = manager
            .issue("mallory", "client-a", "read:profile", TTL)
            .await
            .unwrap();
        assert!(matches!(
            manager.validate(&ghost_user.token).await,
            Err(TokenError::Invalid)
        ));

        let ghost_client = manager
            .issue("alice", "client-z", "read:profile", TTL)
            .await
            .unwrap();
        assert!(matches!(
            manager.validate(&ghost_client.token).await,
            Err(TokenError::Invalid)
        ));
    }

    fn forge(manager: &AccessTokenManager, claims: &AccessTokenClaims, typ: &str) -> String {
        manager.keys.sign(typ, claims).unwrap()
    }

    async fn stored_claims(manager: &AccessTokenManager) -> AccessTokenClaims {
        let issued = manager
            .issue("alice", "client-a", "read:profile", TTL)
            .await
            .unwrap();
        manager.validate(&issued.token).await.unwrap()
    }

    #[tokio::test]
    async fn test_audience_must_match_client() {
        let (manager, _storage) = setup(true).await;
        let mut claims = stored_claims(&manager).await;
        claims.aud = vec!["client-b".to_owned()];
        let token = forge(&manager, &claims, ACCESS_TOKEN_TYP);
        assert!(matches!(
            manager.validate(&token).await,
            Err(TokenError::Invalid)
        ));

        let (lenient, _storage) = setup(false).await;
        let mut claims = stored_claims(&lenient).await;
        claims.aud = vec!["client-b".to_owned()];
        let token = forge(&lenient, &claims, ACCESS_TOKEN_TYP);
        assert!(lenient.validate(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_typ_or_issuer_is_invalid() {
        let (manager, _storage) = setup(true).await;
        let mut claims = stored_claims(&manager).await;

        let refresh_typed = forge(&manager, &claims, REFRESH_TOKEN_TYP);
        assert!(matches!(
            manager.validate(&refresh_typed).await,
            Err(TokenError::Invalid)
        ));

        claims.iss = "https://evil.example".to_owned();
        let foreign_issuer = forge(&manager, &claims, ACCESS_TOKEN_TYP);
        assert!(matches!(
            manager.validate(&foreign_issuer).await,
            Err(TokenError::Invalid)
        ));
    }

    #[tokio::test]
    async fn test_tampered_or_foreign_signature_is_invalid() {
        let (manager, _storage) = setup(true).await;
        let issued = manager
            .issue("alice", "client-a", "read:profile", TTL)
            .await
            .unwrap();

        let mut parts: Vec<&str> = issued.token.split('.').collect();
        let mut claims = manager.validate(&issued.token).await.unwrap();
        claims.scope = "admin".to_owned();
        let forged_payload = base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            serde_json::to_vec(&claims).unwrap(),
        );
        parts[1] = &forged_payload;
        assert!(matches!(
            manager.validate(&parts.join(".")).await,
            Err(TokenError::Invalid)
        ));

        let foreign = KeyManager::generate("test-kid", 2048).unwrap();
        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some(ACCESS_TOKEN_TYP.to_owned());
        let foreign_token =
            jsonwebtoken::encode(&header, &claims, foreign.signing_key()).unwrap();
        assert!(matches!(
            manager.validate(&foreign_token).await,
            Err(TokenError::Invalid)
        ));

        let hs256 = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(matches!(
            manager.validate(&hs256).await,
            Err(TokenError::Invalid)
        ));
    }

    #[tokio::test]
    async fn test_expired_token_is_invalid() {
        let (manager, _storage) = setup(true).await;
        let mut claims = stored_claims(&manager).await;
        claims.exp = claims.iat - 3600;
        let token = forge(&manager, &claims, ACCESS_TOKEN_TYP);
        assert!(matches!(
            manager.validate(&token).await,
            Err(TokenError::Invalid)
        ));
    }
}
