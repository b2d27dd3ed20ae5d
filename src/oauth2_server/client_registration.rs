// ABOUTME: Client registry with Argon2 secret hashing and token endpoint client authentication
// ABOUTME: Parses credentials from exactly one of HTTP Basic or the form body and verifies them
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose, Engine as _};
use oauth_labs_core::errors::{AppError, AppResult, OAuthError, StorageError};
use oauth_labs_core::models::Client;

use crate::storage::ClientRepository;

/// Client id and secret presented at the token or revocation endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    /// Client identifier
    pub id: String,
    /// Client secret in plaintext
    pub secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("id", &self.id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl ClientCredentials {
    /// Decode an `Authorization: Basic ...` header value into `(id, secret)`.
    ///
    /// Returns `None` for anything that is not well-formed Basic auth.
    #[must_use]
    pub fn parse_basic(header: &str) -> Option<(String, String)> {
        let (scheme, encoded) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (id, secret) = decoded.split_once(':')?;
        Some((id.to_owned(), secret.to_owned()))
    }

    /// Pick the client's credentials from Basic auth or the form body.
    ///
    /// The body counts as an authentication method only when it carries a
    /// non-empty `client_secret`. A `client_id` in the body alongside Basic
    /// auth must match the Basic id.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` when no method, both methods, or an
    /// incomplete method was used
    pub fn from_parts(
        basic: Option<(String, String)>,
        body_client_id: Option<&str>,
        body_client_secret: Option<&str>,
    ) -> Result<Self, OAuthError> {
        let body_client_id = body_client_id.unwrap_or_default();
        let body_client_secret = body_client_secret.unwrap_or_default();
        let has_post_auth = !body_client_secret.is_empty();

        match basic {
            None if !has_post_auth => Err(OAuthError::invalid_client(
                "client included no supported authentication parameters.",
            )),
            Some(_) if has_post_auth => Err(OAuthError::invalid_client(
                "client included multiple forms of authentication.",
            )),
            Some((id, secret)) => {
                if id.is_empty() || secret.is_empty() {
                    return Err(OAuthError::invalid_client(
                        "client misses client_id or client_secret in basic-auth request.",
                    ));
                }
                if !body_client_id.is_empty() && body_client_id != id {
                    return Err(OAuthError::invalid_client(
                        "client included mismatched client_id in body and basic-auth.",
                    ));
                }
                Ok(Self { id, secret })
            }
            None => {
                if body_client_id.is_empty() {
                    return Err(OAuthError::invalid_client(
                        "client misses client_id or client_secret in post request.",
                    ));
                }
                Ok(Self {
                    id: body_client_id.to_owned(),
                    secret: body_client_secret.to_owned(),
                })
            }
        }
    }
}

/// Registered OAuth clients
#[derive(Clone)]
pub struct ClientRegistry {
    clients: Arc<dyn ClientRepository>,
}

impl ClientRegistry {
    /// Creates a registry over the given repository
    #[must_use]
    pub fn new(clients: Arc<dyn ClientRepository>) -> Self {
        Self { clients }
    }

    /// Look up a client by id; an empty id is never found
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    pub async fn get(&self, client_id: &str) -> Result<Option<Client>, StorageError> {
        if client_id.is_empty() {
            tracing::debug!("Client lookup with empty client_id");
            return Ok(None);
        }
        self.clients.get(client_id).await
    }

    /// Whether a client with this id exists
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    pub async fn exists(&self, client_id: &str) -> Result<bool, StorageError> {
        self.clients.exists(client_id).await
    }

    /// All registered clients
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    pub async fn list(&self) -> Result<Vec<Client>, StorageError> {
        self.clients.list().await
    }

    /// Authenticate a client by id and secret
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` if the client is unknown or the secret is wrong
    pub async fn authenticate(&self, credentials: &ClientCredentials) -> Result<Client, OAuthError> {
        let client = match self.get(&credentials.id).await {
            Ok(Some(client)) => client,
            Ok(None) => {
                tracing::warn!(client_id = %credentials.id, "OAuth client not found");
                return Err(OAuthError::invalid_client("client not found"));
            }
            Err(e) => {
                tracing::error!(client_id = %credentials.id, error = %e, "Client lookup failed");
                return Err(OAuthError::invalid_client("client not found"));
            }
        };

        Self::verify_client_secret(&client.id, &credentials.secret, &client.secret_hash)?;
        tracing::debug!(client_id = %client.id, "OAuth client authenticated");
        Ok(client)
    }

    /// Hash the secret and store the client, replacing any previous record
    ///
    /// # Errors
    ///
    /// Returns an error if hashing or storage fails
    pub async fn register(&self, mut client: Client, secret: &str) -> AppResult<Client> {
        client.secret_hash = Self::hash_client_secret(secret)?;
        self.clients.upsert(&client).await?;
        tracing::info!(client_id = %client.id, "OAuth client registered");
        Ok(client)
    }

    /// Hash client secret for storage using Argon2id with a random salt
    ///
    /// # Errors
    ///
    /// Returns an error if Argon2 password hashing fails
    pub fn hash_client_secret(secret: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::crypto(format!("Argon2 password hashing failed: {e}")))
    }

    fn verify_client_secret(
        client_id: &str,
        client_secret: &str,
        client_secret_hash: &str,
    ) -> Result<(), OAuthError> {
        let parsed_hash = PasswordHash::new(client_secret_hash).map_err(|e| {
            tracing::error!(client_id = %client_id, error = %e, "Failed to parse stored secret hash");
            OAuthError::invalid_client("invalid client_secret")
        })?;

        if Argon2::default()
            .verify_password(client_secret.as_bytes(), &parsed_hash)
            .is_err()
        {
            tracing::warn!(client_id = %client_id, "OAuth client secret validation failed");
            return Err(OAuthError::invalid_client("invalid client_secret"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use oauth_labs_core::errors::OAuthErrorCode;

    fn basic(id: &str, secret: &str) -> Option<(String, String)> {
        Some((id.to_owned(), secret.to_owned()))
    }

    #[test]
    fn test_parse_basic_header() {
        let header = format!("Basic {}", general_purpose::STANDARD.encode("client-1:s3cret:x"));
        assert_eq!(
            ClientCredentials::parse_basic(&header),
            basic("client-1", "s3cret:x")
        );
        assert_eq!(ClientCredentials::parse_basic("Bearer abc"), None);
        assert_eq!(ClientCredentials::parse_basic("Basic !!!"), None);
    }

    #[test]
    fn test_exactly_one_method_is_required() {
        let none = ClientCredentials::from_parts(None, Some("client-1"), None).unwrap_err();
        assert_eq!(
            none.description(),
            "client included no supported authentication parameters."
        );

        let both = ClientCredentials::from_parts(basic("a", "b"), None, Some("b")).unwrap_err();
        assert_eq!(
            both.description(),
            "client included multiple forms of authentication."
        );

        let mismatch =
            ClientCredentials::from_parts(basic("a", "b"), Some("other"), None).unwrap_err();
        assert_eq!(
            mismatch.description(),
            "client included mismatched client_id in body and basic-auth."
        );
        assert_eq!(mismatch.code(), OAuthErrorCode::InvalidClient);
    }

    #[test]
    fn test_incomplete_credentials() {
        let basic_err = ClientCredentials::from_parts(basic("a", ""), None, None).unwrap_err();
        assert_eq!(
            basic_err.description(),
            "client misses client_id or client_secret in basic-auth request."
        );

        let post_err = ClientCredentials::from_parts(None, None, Some("secret")).unwrap_err();
        assert_eq!(
            post_err.description(),
            "client misses client_id or client_secret in post request."
        );

        let post = ClientCredentials::from_parts(None, Some("a"), Some("b")).unwrap();
        assert_eq!(post.id, "a");
        assert_eq!(post.secret, "b");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let credentials = ClientCredentials {
            id: "a".to_owned(),
            secret: "hunter2".to_owned(),
        };
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let registry = ClientRegistry::new(Arc::new(MemoryStore::new()));
        let client = Client {
            id: "client-1".to_owned(),
            secret_hash: String::new(),
            name: "Client".to_owned(),
            client_uri: None,
            logo_uri: None,
            contacts: vec![],
            scope: vec!["read:profile".to_owned()],
            redirect_uris: vec!["https://client.example/cb".to_owned()],
            token_endpoint_auth_method: "client_secret_basic".to_owned(),
            grant_types: vec!["authorization_code".to_owned()],
            response_types: vec!["code".to_owned()],
            created_at: 0,
        };
        let stored = registry.register(client, "s3cret").await.unwrap();
        assert!(stored.secret_hash.starts_with("$argon2"));

        let good = ClientCredentials {
            id: "client-1".to_owned(),
            secret: "s3cret".to_owned(),
        };
        assert_eq!(registry.authenticate(&good).await.unwrap().id, "client-1");

        let bad = ClientCredentials {
            secret: "wrong".to_owned(),
            ..good
        };
        let err = registry.authenticate(&bad).await.unwrap_err();
        assert_eq!(err.description(), "invalid client_secret");
    }
}
