// ABOUTME: Token service pairing access and refresh token issuance and bulk revocation
// ABOUTME: Revocation of both kinds runs concurrently; a failing branch never cancels the other
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::time::Duration;

use tracing::{info, warn};

use super::access_token::{AccessTokenManager, TokenError};
use super::models::IssuedTokens;
use super::refresh_token::RefreshTokenManager;

/// Access plus refresh token operations
#[derive(Clone)]
pub struct TokenService {
    access: AccessTokenManager,
    refresh: RefreshTokenManager,
    access_token_ttl: Duration,
}

impl TokenService {
    /// Creates a service issuing access tokens valid for `access_token_ttl`
    #[must_use]
    pub const fn new(
        access: AccessTokenManager,
        refresh: RefreshTokenManager,
        access_token_ttl: Duration,
    ) -> Self {
        Self {
            access,
            refresh,
            access_token_ttl,
        }
    }

    /// Access token manager
    #[must_use]
    pub const fn access(&self) -> &AccessTokenManager {
        &self.access
    }

    /// Refresh token manager
    #[must_use]
    pub const fn refresh(&self) -> &RefreshTokenManager {
        &self.refresh
    }

    /// Configured access token lifetime
    #[must_use]
    pub const fn access_token_ttl(&self) -> Duration {
        self.access_token_ttl
    }

    /// Issue an access token and a refresh token for the same grant
    ///
    /// # Errors
    ///
    /// Returns an error if either token cannot be signed or stored
    pub async fn create_tokens(
        &self,
        user_id: &str,
        client_id: &str,
        scope: &str,
    ) -> Result<IssuedTokens, TokenError> {
        let access = self
            .access
            .issue(user_id, client_id, scope, self.access_token_ttl)
            .await?;
        let refresh_token = self.refresh.issue(user_id, client_id, scope).await?;

        Ok(IssuedTokens {
            access_token: access.token,
            refresh_token,
            scope: scope.to_owned(),
            expires_in: access.expires_in,
        })
    }

    /// Revoke every access and refresh token of the pair.
    ///
    /// Both branches run to completion; failures are logged, not returned.
    pub async fn revoke_all(&self, client_id: &str, user_id: &str) {
        let (access, refresh) = tokio::join!(
            self.access.revoke_all(client_id, user_id),
            self.refresh.revoke_all(client_id, user_id),
        );

        if let Err(e) = &access {
            warn!(client_id = %client_id, user_id = %user_id, error = %e, "Failed to revoke access tokens");
        }
        if let Err(e) = &refresh {
            warn!(client_id = %client_id, user_id = %user_id, error = %e, "Failed to revoke refresh tokens");
        }
        if access.is_ok() && refresh.is_ok() {
            info!(client_id = %client_id, user_id = %user_id, "Revoked all tokens");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use crate::test_utils::{test_client, test_codec, test_keys, TEST_ISSUER};
    use std::sync::Arc;

    async fn service() -> TokenService {
        let storage = Storage::in_memory();
        storage.clients.upsert(&test_client("client-a")).await.unwrap();
        storage.users.add("alice").await.unwrap();
        let keys = test_keys();
        TokenService::new(
            AccessTokenManager::new(Arc::clone(&keys), test_codec(), &storage, TEST_ISSUER, true),
            RefreshTokenManager::new(keys, Arc::clone(&storage.refresh_tokens)),
            Duration::from_secs(3600),
        )
    }

    #[tokio::test]
    async fn test_create_tokens_issues_both_kinds() {
        let tokens = service().await;
        let issued = tokens
            .create_tokens("alice", "client-a", "read:profile")
            .await
            .unwrap();

        assert_eq!(issued.expires_in, 3600);
        assert_eq!(issued.scope, "read:profile");
        assert!(tokens.access().validate(&issued.access_token).await.is_ok());
        assert!(tokens.refresh().redeem(&issued.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_revoke_all_covers_both_kinds() {
        let tokens = service().await;
        let issued = tokens
            .create_tokens("alice", "client-a", "read:profile")
            .await
            .unwrap();

        tokens.revoke_all("client-a", "alice").await;
        assert!(matches!(
            tokens.access().validate(&issued.access_token).await,
            Err(TokenError::Revoked)
        ));
        assert!(matches!(
            tokens.refresh().redeem(&issued.refresh_token).await,
            Err(TokenError::Revoked)
        ));
    }
}
