// ABOUTME: OAuth 2.0 engine implementing the authorize, token, register and revoke flows
// ABOUTME: Composes the client registry, consent store, code store and token managers under one policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # OAuth Engine
//!
//! [`OAuthEngine`] owns protocol logic only. Every collaborator it talks to
//! (clients, consents, users, codes, token records) sits behind a storage
//! trait, and every weakened lab variant is a [`SecurityPolicy`] flag rather
//! than a separate code path.
//!
//! Authorize distinguishes errors that may be delivered to the client by
//! redirect from errors that must be rendered locally. Until the redirect
//! URI has been validated against the registry, nothing is redirected.

use std::sync::Arc;

use chrono::Utc;
use oauth_labs_core::constants::{
    auth_methods, endpoints, grant_types, pkce as pkce_methods, response_types, token_types,
};
use oauth_labs_core::errors::{AppError, AppResult, AuthorizeError, OAuthError};
use oauth_labs_core::models::{
    AccessTokenClaims, AuthorizeRequest, Client, ClientInformationResponse, ClientMetadata,
    Consent, RevocationRequest, TokenRequest, TokenResponse,
};
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};
use url::Url;

use super::access_token::{AccessTokenManager, TokenError};
use super::authorization_code::AuthorizationCodeStore;
use super::client_registration::{ClientCredentials, ClientRegistry};
use super::consent::ConsentStore;
use super::models::{AuthorizationCode, NewAuthorizationCode, RegistrationRequest};
use super::refresh_token::RefreshTokenManager;
use super::tokens::TokenService;
use crate::config::{SecurityPolicy, ServerConfig};
use crate::crypto::CryptoCodec;
use crate::keys::{JsonWebKeySet, KeyManager};
use crate::logging::AppLogger;
use crate::metadata::{Endpoints, ServerMetadata};
use crate::pkce::{CodeChallengeMethod, PkceChallenge};
use crate::redirect_uri::RedirectUri;
use crate::scope::ScopeSet;
use crate::storage::{Storage, UserDirectory};

const RESPONSE_TYPE_MUST_BE_CODE: &str = "response_type must be set to \"code\".";

/// The authorization server engine
#[derive(Clone)]
pub struct OAuthEngine {
    config: Arc<ServerConfig>,
    metadata: ServerMetadata,
    keys: Arc<KeyManager>,
    clients: ClientRegistry,
    consents: ConsentStore,
    codes: AuthorizationCodeStore,
    tokens: TokenService,
    users: Arc<dyn UserDirectory>,
}

impl OAuthEngine {
    /// Wire the engine to its key material and storage
    ///
    /// # Errors
    ///
    /// Returns an error if the configured capabilities cannot be expressed as metadata
    pub fn new(config: Arc<ServerConfig>, keys: Arc<KeyManager>, storage: &Storage) -> AppResult<Self> {
        let metadata = Self::build_metadata(&config)?;
        let codec = CryptoCodec::new(config.encryption_key.clone());

        let access = AccessTokenManager::new(
            Arc::clone(&keys),
            codec,
            storage,
            &config.issuer,
            config.security.enforce_audience,
        );
        let refresh = RefreshTokenManager::new(Arc::clone(&keys), Arc::clone(&storage.refresh_tokens));

        info!(
            issuer = %config.issuer,
            kid = %keys.kid(),
            registration_enabled = config.registration_key.is_some(),
            "OAuth engine initialized"
        );

        Ok(Self {
            metadata,
            keys,
            clients: ClientRegistry::new(Arc::clone(&storage.clients)),
            consents: ConsentStore::new(Arc::clone(&storage.consents)),
            codes: AuthorizationCodeStore::new(
                Arc::clone(&storage.codes),
                config.authorization_code_ttl,
            ),
            tokens: TokenService::new(access, refresh, config.access_token_ttl),
            users: Arc::clone(&storage.users),
            config,
        })
    }

    fn build_metadata(config: &ServerConfig) -> AppResult<ServerMetadata> {
        let mut pkce = vec![pkce_methods::S256];
        if config.security.allow_plain_pkce {
            pkce.push(pkce_methods::PLAIN);
        }

        Ok(ServerMetadata::new(&config.issuer)
            .with_endpoints(Endpoints {
                authorization: Some(endpoints::AUTHORIZE.to_owned()),
                token: Some(endpoints::TOKEN.to_owned()),
                jwks: Some(endpoints::JWKS.to_owned()),
                registration: config
                    .registration_key
                    .as_ref()
                    .map(|_| endpoints::REGISTER.to_owned()),
                revocation: Some(endpoints::REVOKE.to_owned()),
            })
            .with_grant_types(&[grant_types::AUTHORIZATION_CODE, grant_types::REFRESH_TOKEN])?
            .with_code_challenge_methods(&pkce)?
            .with_token_endpoint_auth_methods(auth_methods::ALL)?
            .with_revocation_endpoint_auth_methods(auth_methods::ALL)?
            .with_scopes(&config.scopes_supported))
    }

    /// Server metadata document (RFC 8414)
    #[must_use]
    pub const fn metadata(&self) -> &ServerMetadata {
        &self.metadata
    }

    /// Public signing keys
    #[must_use]
    pub fn jwks(&self) -> JsonWebKeySet {
        self.keys.public_jwk_set()
    }

    /// Active security policy
    #[must_use]
    pub fn policy(&self) -> &SecurityPolicy {
        &self.config.security
    }

    /// Client registry
    #[must_use]
    pub const fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Provision a user in the user directory
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    pub async fn add_user(&self, user_id: &str) -> AppResult<()> {
        self.users.add(user_id).await?;
        Ok(())
    }

    // ================================================================================================
    // Authorize
    // ================================================================================================

    /// Handle an authorization request for the authenticated `user_id`.
    ///
    /// Returns the success redirect (`code` and `state`). Every other outcome
    /// is an [`AuthorizeError`]; only [`AuthorizeError::Redirect`] may be sent
    /// to the client application.
    ///
    /// # Errors
    ///
    /// See [`AuthorizeError`]
    pub async fn authorize(
        &self,
        user_id: Option<&str>,
        request: &AuthorizeRequest,
    ) -> Result<Url, AuthorizeError> {
        let user_id = self.resolve_user(user_id).await?;
        let client = self.resolve_client(request.client_id.as_deref()).await?;
        let redirect = Self::resolve_redirect(&client, request.redirect_uri.as_deref(), self.policy())?
            .with_state(request.state.as_deref().unwrap_or_default());

        if !self
            .consents
            .has_consent(&Consent::new(user_id.as_str(), client.id.as_str()))
            .await
        {
            debug!(client_id = %client.id, user_id = %user_id, "Consent required");
            return Err(AuthorizeError::ConsentRequired {
                client_id: client.id,
                user_id,
            });
        }

        let (scope, pkce) = self
            .validate_authorize_params(&client, request)
            .map_err(|e| deliver(&redirect, &e))?;

        let scope = scope.to_string();
        let code = self
            .codes
            .create(NewAuthorizationCode {
                client_id: &client.id,
                user_id: &user_id,
                redirect_uri: request.redirect_uri.as_deref().filter(|u| !u.is_empty()),
                scope: &scope,
                pkce,
            })
            .await
            .map_err(|e| {
                error!(client_id = %client.id, error = %e, "Failed to store authorization code");
                deliver(&redirect, &OAuthError::server_error())
            })?;

        info!(client_id = %client.id, user_id = %user_id, scope = %scope, "Authorization code issued");
        Ok(redirect.with_code(&code.code).into_url())
    }

    async fn resolve_user(&self, user_id: Option<&str>) -> Result<String, AuthorizeError> {
        let Some(user_id) = user_id.filter(|u| !u.is_empty()) else {
            return Err(AuthorizeError::AuthenticationRequired);
        };
        match self.users.exists(user_id).await {
            Ok(true) => Ok(user_id.to_owned()),
            Ok(false) => {
                warn!(user_id = %user_id, "Authorize request for unknown user");
                Err(AuthorizeError::AuthenticationRequired)
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "User lookup failed");
                Err(AuthorizeError::Abort(OAuthError::server_error()))
            }
        }
    }

    async fn resolve_client(&self, client_id: Option<&str>) -> Result<Client, AuthorizeError> {
        let client_id = client_id.unwrap_or_default();
        if client_id.is_empty() {
            return Err(AuthorizeError::Abort(OAuthError::invalid_request(
                "missing client_id.",
            )));
        }
        match self.clients.get(client_id).await {
            Ok(Some(client)) => Ok(client),
            Ok(None) => {
                warn!(client_id = %client_id, "Authorize request for unknown client");
                Err(AuthorizeError::Abort(OAuthError::invalid_client(
                    "client not found",
                )))
            }
            Err(e) => {
                error!(client_id = %client_id, error = %e, "Client lookup failed");
                Err(AuthorizeError::Abort(OAuthError::server_error()))
            }
        }
    }

    /// Establish the redirect target. Errors here are never redirected.
    fn resolve_redirect(
        client: &Client,
        requested: Option<&str>,
        policy: &SecurityPolicy,
    ) -> Result<RedirectUri, AuthorizeError> {
        let abort = |description: &str| {
            warn!(client_id = %client.id, reason = description, "Rejected redirect_uri");
            AuthorizeError::Abort(OAuthError::invalid_redirect_uri(description))
        };

        let raw = match (requested.filter(|u| !u.is_empty()), client.redirect_uris.as_slice()) {
            (Some(uri), _) => uri,
            (None, [only]) => only.as_str(),
            (None, _) => return Err(abort("redirect_uri is required.")),
        };

        let redirect = RedirectUri::parse(raw).map_err(|_| abort("invalid redirect_uri."))?;
        if redirect.has_fragment() {
            return Err(abort("redirect_uri must not contain a fragment."));
        }
        if policy.enforce_redirect_uri_registration
            && !client.redirect_uris.iter().any(|r| redirect.matches(r))
        {
            return Err(abort("redirect_uri is not registered for this client."));
        }
        Ok(redirect)
    }

    fn validate_authorize_params(
        &self,
        client: &Client,
        request: &AuthorizeRequest,
    ) -> Result<(ScopeSet, Option<PkceChallenge>), OAuthError> {
        let policy = self.policy();
        if policy.require_state && request.state.as_deref().unwrap_or_default().is_empty() {
            return Err(OAuthError::invalid_request("missing state."));
        }

        let response_type = request.response_type.as_deref().unwrap_or_default();
        if !client.has_response_type(response_type) {
            return Err(OAuthError::unauthorized_client(RESPONSE_TYPE_MUST_BE_CODE));
        }
        if !self.metadata.supports_response_type(response_type) {
            return Err(OAuthError::unsupported_response_type(
                RESPONSE_TYPE_MUST_BE_CODE,
            ));
        }

        let scope = resolve_authorize_scope(client, request.scope.as_deref().unwrap_or_default())?;
        let pkce = self.resolve_pkce(request)?;
        Ok((scope, pkce))
    }

    fn resolve_pkce(&self, request: &AuthorizeRequest) -> Result<Option<PkceChallenge>, OAuthError> {
        if request.code_challenge.is_none() && request.code_challenge_method.is_none() {
            if self.policy().require_pkce {
                return Err(OAuthError::invalid_request("missing code_challenge."));
            }
            return Ok(None);
        }

        let method = request
            .code_challenge_method
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(pkce_methods::PLAIN);
        let method = method
            .parse::<CodeChallengeMethod>()
            .ok()
            .filter(|m| self.metadata.supports_code_challenge_method(m.as_str()))
            .ok_or_else(|| OAuthError::invalid_request("unsupported code_challenge_method."))?;

        let challenge = request.code_challenge.as_deref().unwrap_or_default();
        if challenge.is_empty() {
            return Err(OAuthError::invalid_request("invalid code_challenge."));
        }

        Ok(Some(PkceChallenge {
            challenge: challenge.to_owned(),
            method,
        }))
    }

    // ================================================================================================
    // Token
    // ================================================================================================

    /// Handle a token request authenticated by Basic auth or the form body
    ///
    /// # Errors
    ///
    /// Returns the protocol error to send back as a 400 JSON body
    pub async fn token(
        &self,
        basic: Option<(String, String)>,
        request: &TokenRequest,
    ) -> Result<TokenResponse, OAuthError> {
        let credentials = ClientCredentials::from_parts(
            basic,
            request.client_id.as_deref(),
            request.client_secret.as_deref(),
        )?;
        let client = self.clients.authenticate(&credentials).await?;

        let grant_type = request.grant_type.as_deref().unwrap_or_default();
        if grant_type.is_empty() {
            return Err(OAuthError::invalid_request("missing grant_type."));
        }
        if !client.has_grant_type(grant_type) {
            return Err(OAuthError::unauthorized_client(format!(
                "client has unsupported grant_type: {grant_type:?}"
            )));
        }
        if !self.metadata.supports_grant_type(grant_type) {
            return Err(OAuthError::invalid_grant(format!(
                "server does not support grant_type: {grant_type:?}"
            )));
        }

        let response = match grant_type {
            grant_types::AUTHORIZATION_CODE => self.exchange_code(&client, request).await,
            grant_types::REFRESH_TOKEN => self.refresh(&client, request).await,
            _ => Err(OAuthError::unsupported_grant_type()),
        };

        if let Err(e) = &response {
            AppLogger::log_token_event(&client.id, "-", grant_type, false);
            debug!(client_id = %client.id, grant_type, error = %e, "Token request rejected");
        }
        response
    }

    async fn exchange_code(
        &self,
        client: &Client,
        request: &TokenRequest,
    ) -> Result<TokenResponse, OAuthError> {
        let code = request.code.as_deref().unwrap_or_default();
        if code.is_empty() {
            return Err(OAuthError::invalid_request("missing code."));
        }

        let record = self.codes.get(code).await.map_err(|e| {
            debug!(client_id = %client.id, error = %e, "Authorization code lookup failed");
            OAuthError::invalid_grant("invalid authorization code.")
        })?;
        let scope = self.check_code(client, &record, request).await?;

        // consumption is the linearization point for concurrent redeemers;
        // without single_use_codes the code stays live until its TTL runs out
        if self.policy().single_use_codes && self.codes.take(code).await.is_err() {
            warn!(client_id = %client.id, "Authorization code redeemed concurrently");
            return Err(OAuthError::invalid_grant("invalid authorization code."));
        }

        let scope = scope.to_string();
        let issued = self
            .tokens
            .create_tokens(&record.user_id, &client.id, &scope)
            .await
            .map_err(|e| token_failure(&client.id, &e))?;

        AppLogger::log_token_event(&client.id, &record.user_id, grant_types::AUTHORIZATION_CODE, true);
        Ok(TokenResponse {
            access_token: issued.access_token,
            token_type: token_types::BEARER.to_owned(),
            expires_in: issued.expires_in,
            refresh_token: Some(issued.refresh_token),
            scope: Some(issued.scope),
        })
    }

    /// Checks a looked-up code against the redeeming request; returns the granted scope
    async fn check_code(
        &self,
        client: &Client,
        record: &AuthorizationCode,
        request: &TokenRequest,
    ) -> Result<ScopeSet, OAuthError> {
        if record.client_id != client.id {
            AppLogger::log_security_event(
                "code_client_mismatch",
                "authorization code presented by a different client",
                Some(client.id.as_str()),
            );
            return Err(OAuthError::invalid_grant(
                "client requested a code not issued to them.",
            ));
        }

        if self.policy().recheck_consent
            && !self
                .consents
                .has_consent(&Consent::new(record.user_id.as_str(), client.id.as_str()))
                .await
        {
            return Err(OAuthError::invalid_grant("consent has been revoked."));
        }

        if self.policy().verify_redirect_uri_on_exchange {
            if let Some(bound) = &record.redirect_uri {
                if request.redirect_uri.as_deref() != Some(bound.as_str()) {
                    return Err(OAuthError::invalid_grant(
                        "redirect_uri does not match the authorization request.",
                    ));
                }
            }
        }

        if let Some(pkce) = &record.pkce {
            let verifier = request.code_verifier.as_deref().unwrap_or_default();
            if verifier.is_empty() {
                return Err(OAuthError::invalid_grant("missing code_verifier."));
            }
            if !pkce.verify(verifier) {
                AppLogger::log_security_event(
                    "pkce_verification_failed",
                    pkce.method.as_str(),
                    Some(client.id.as_str()),
                );
                return Err(OAuthError::invalid_grant("invalid code_verifier."));
            }
        }

        narrow_scope(
            &ScopeSet::parse(&record.scope),
            request.scope.as_deref().unwrap_or_default(),
        )
    }

    async fn refresh(
        &self,
        client: &Client,
        request: &TokenRequest,
    ) -> Result<TokenResponse, OAuthError> {
        let token = request.refresh_token.as_deref().unwrap_or_default();
        if token.is_empty() {
            return Err(OAuthError::invalid_request("missing refresh_token."));
        }

        let payload = self
            .tokens
            .refresh()
            .redeem(token)
            .await
            .map_err(|e| {
                debug!(client_id = %client.id, error = %e, "Refresh token rejected");
                match e {
                    TokenError::Revoked => OAuthError::invalid_grant("refresh_token has been revoked."),
                    _ => OAuthError::invalid_grant("invalid refresh_token."),
                }
            })?;
        if payload.client_id != client.id {
            AppLogger::log_security_event(
                "refresh_client_mismatch",
                "refresh token presented by a different client",
                Some(client.id.as_str()),
            );
            return Err(OAuthError::invalid_grant(
                "client requested a refresh_token not issued to them.",
            ));
        }

        if self.policy().revoke_access_tokens_on_refresh {
            if let Err(e) = self
                .tokens
                .access()
                .delete_all(&client.id, &payload.user_id)
                .await
            {
                warn!(client_id = %client.id, user_id = %payload.user_id, error = %e, "Failed to delete previous access tokens");
            }
        }

        if self.policy().recheck_consent
            && !self
                .consents
                .has_consent(&Consent::new(payload.user_id.as_str(), client.id.as_str()))
                .await
        {
            return Err(OAuthError::invalid_grant("consent revoked"));
        }

        let access = self
            .tokens
            .access()
            .issue(
                &payload.user_id,
                &client.id,
                &payload.scope,
                self.tokens.access_token_ttl(),
            )
            .await
            .map_err(|e| token_failure(&client.id, &e))?;

        let refresh_token = if self.policy().rotate_refresh_tokens {
            let rotated = self
                .tokens
                .refresh()
                .issue(&payload.user_id, &client.id, &payload.scope)
                .await
                .map_err(|e| token_failure(&client.id, &e))?;
            if let Err(e) = self.tokens.refresh().revoke(&payload.id).await {
                warn!(client_id = %client.id, refresh_token_id = %payload.id, error = %e, "Failed to revoke rotated refresh token");
            }
            rotated
        } else {
            token.to_owned()
        };

        AppLogger::log_token_event(&client.id, &payload.user_id, grant_types::REFRESH_TOKEN, true);
        Ok(TokenResponse {
            access_token: access.token,
            token_type: token_types::BEARER.to_owned(),
            expires_in: access.expires_in,
            refresh_token: Some(refresh_token),
            scope: Some(payload.scope),
        })
    }

    // ================================================================================================
    // Register
    // ================================================================================================

    /// Pre-provision a client (RFC 7591 flavoured)
    ///
    /// # Errors
    ///
    /// Returns `invalid_client_metadata` for a bad register key, a client id
    /// outside the allow-list, or invalid metadata
    pub async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<ClientInformationResponse, OAuthError> {
        if !self.register_key_matches(request.register_key.as_deref()) {
            AppLogger::log_security_event(
                "registration_key_rejected",
                "x-register-key missing or wrong",
                Some(request.client_id.as_str()),
            );
            return Err(OAuthError::invalid_client_metadata("invalid x-register-key"));
        }
        if request.client_id.is_empty() || !self.config.allowed_clients.contains(&request.client_id) {
            return Err(OAuthError::invalid_client_metadata("invalid client_id"));
        }
        self.provision_client(request.client_id, request.client_secret, request.metadata)
            .await
    }

    /// Register a client without the register key and allow-list checks.
    ///
    /// Used for operator seeding at startup; metadata is validated as for
    /// [`Self::register`].
    ///
    /// # Errors
    ///
    /// Returns `invalid_client_metadata` for an empty secret or invalid metadata
    pub async fn provision_client(
        &self,
        client_id: String,
        client_secret: String,
        metadata: ClientMetadata,
    ) -> Result<ClientInformationResponse, OAuthError> {
        if client_secret.is_empty() {
            return Err(OAuthError::invalid_client_metadata("invalid client_secret"));
        }

        let metadata = self.validate_client_metadata(metadata)?;
        let scope = ScopeSet::parse(metadata.scope.as_deref().unwrap_or_default());
        let now = Utc::now().timestamp();

        let client = Client {
            id: client_id.clone(),
            secret_hash: String::new(),
            name: metadata
                .client_name
                .clone()
                .unwrap_or_else(|| client_id.clone()),
            client_uri: metadata.client_uri.clone(),
            logo_uri: metadata.logo_uri.clone(),
            contacts: metadata.contacts.clone(),
            scope: scope.to_vec(),
            redirect_uris: metadata.redirect_uris.clone(),
            token_endpoint_auth_method: metadata
                .token_endpoint_auth_method
                .clone()
                .unwrap_or_default(),
            grant_types: metadata.grant_types.clone(),
            response_types: metadata.response_types.clone(),
            created_at: now,
        };

        self.clients
            .register(client, &client_secret)
            .await
            .map_err(|e| {
                error!(client_id = %client_id, error = %e, "Client registration failed");
                OAuthError::invalid_client_metadata("failed to register client.")
            })?;

        Ok(ClientInformationResponse {
            client_id,
            client_secret,
            client_id_issued_at: now,
            client_secret_expires_at: 0,
            metadata,
        })
    }

    fn register_key_matches(&self, presented: Option<&str>) -> bool {
        match (self.config.registration_key.as_deref(), presented) {
            (Some(expected), Some(presented)) => {
                expected.as_bytes().ct_eq(presented.as_bytes()).into()
            }
            _ => false,
        }
    }

    /// Validate metadata and fill in RFC 7591 defaults
    fn validate_client_metadata(&self, mut metadata: ClientMetadata) -> Result<ClientMetadata, OAuthError> {
        if metadata.redirect_uris.is_empty()
            || !metadata.redirect_uris.iter().all(|uri| {
                RedirectUri::parse(uri).is_ok_and(|parsed| !parsed.has_fragment())
            })
        {
            return Err(OAuthError::invalid_client_metadata("invalid redirect_uris"));
        }

        if metadata.grant_types.is_empty() {
            metadata.grant_types = vec![grant_types::AUTHORIZATION_CODE.to_owned()];
        }
        if metadata.response_types.is_empty() {
            metadata.response_types = vec![response_types::CODE.to_owned()];
        }
        if !metadata
            .grant_types
            .iter()
            .all(|g| self.metadata.supports_grant_type(g))
        {
            return Err(OAuthError::invalid_client_metadata("invalid grant_type"));
        }
        if !metadata
            .response_types
            .iter()
            .all(|r| self.metadata.supports_response_type(r))
        {
            return Err(OAuthError::invalid_client_metadata("invalid response_type"));
        }

        let has_grant = |g: &str| metadata.grant_types.iter().any(|v| v == g);
        let has_response = |r: &str| metadata.response_types.iter().any(|v| v == r);
        if has_grant(grant_types::AUTHORIZATION_CODE) != has_response(response_types::CODE)
            || has_grant(grant_types::IMPLICIT) != has_response(response_types::TOKEN)
        {
            return Err(OAuthError::invalid_client_metadata(
                "invalid grant_types and response_types combination.",
            ));
        }

        let auth_method = metadata
            .token_endpoint_auth_method
            .get_or_insert_with(|| auth_methods::CLIENT_SECRET_BASIC.to_owned());
        if !self.metadata.supports_token_endpoint_auth_method(auth_method) {
            return Err(OAuthError::invalid_client_metadata(
                "invalid token_endpoint_auth_method",
            ));
        }

        let scope = match metadata.scope.as_deref() {
            Some(raw) if !raw.trim().is_empty() => ScopeSet::parse(raw),
            _ => self.metadata.supported_scope(),
        };
        if scope.has_duplicates() || !self.metadata.supports_scopes(&scope) {
            return Err(OAuthError::invalid_client_metadata("invalid scopes"));
        }
        metadata.scope = Some(scope.to_string());

        Ok(metadata)
    }

    // ================================================================================================
    // Revoke
    // ================================================================================================

    /// Revoke a token (RFC 7009).
    ///
    /// Unknown, malformed and already revoked tokens succeed silently. A valid
    /// token revokes every access and refresh token of its (client, user) pair.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` if authentication fails or the token belongs
    /// to another client
    pub async fn revoke(
        &self,
        basic: Option<(String, String)>,
        request: &RevocationRequest,
    ) -> Result<(), OAuthError> {
        let credentials = ClientCredentials::from_parts(
            basic,
            request.client_id.as_deref(),
            request.client_secret.as_deref(),
        )?;
        let client = self.clients.authenticate(&credentials).await?;

        let token = request.token.as_deref().unwrap_or_default();
        if token.is_empty() {
            return Ok(());
        }

        let access_first =
            request.token_type_hint.as_deref() == Some(token_types::ACCESS_TOKEN);
        let handled = if access_first {
            self.revoke_as_access(&client, token).await?
                || self.revoke_as_refresh(&client, token).await?
        } else {
            self.revoke_as_refresh(&client, token).await?
                || self.revoke_as_access(&client, token).await?
        };

        if !handled {
            debug!(client_id = %client.id, "Revocation of unrecognized token ignored");
        }
        Ok(())
    }

    /// `Ok(true)` when the token was a refresh token (revoked now or earlier)
    async fn revoke_as_refresh(&self, client: &Client, token: &str) -> Result<bool, OAuthError> {
        match self.tokens.refresh().redeem(token).await {
            Ok(payload) if payload.client_id != client.id => Err(OAuthError::invalid_client(
                "client asked to revoke a refresh_token not issued to them",
            )),
            Ok(payload) => {
                self.tokens.revoke_all(&client.id, &payload.user_id).await;
                Ok(true)
            }
            Err(TokenError::Revoked) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    /// `Ok(true)` when the token was an access token (revoked now or earlier)
    async fn revoke_as_access(&self, client: &Client, token: &str) -> Result<bool, OAuthError> {
        match self.tokens.access().validate(token).await {
            Ok(claims) if claims.client_id != client.id => Err(OAuthError::invalid_client(
                "client asked to revoke an access_token not issued to them",
            )),
            Ok(claims) => {
                self.tokens.revoke_all(&client.id, &claims.sub).await;
                Ok(true)
            }
            Err(TokenError::Revoked) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    // ================================================================================================
    // Consent, logout, and resource server support
    // ================================================================================================

    /// Record the user's consent to a registered client
    ///
    /// # Errors
    ///
    /// Returns not-found for unknown clients or a storage error
    pub async fn grant_consent(&self, user_id: &str, client_id: &str) -> AppResult<()> {
        if !self.clients.exists(client_id).await? {
            return Err(AppError::not_found(format!("client {client_id}")));
        }
        self.consents.grant(&Consent::new(user_id, client_id)).await?;
        info!(client_id = %client_id, user_id = %user_id, "Consent granted");
        Ok(())
    }

    /// Withdraw consent and revoke every token of the pair
    ///
    /// # Errors
    ///
    /// Returns an error if the consent cannot be deleted
    pub async fn revoke_consent(&self, user_id: &str, client_id: &str) -> AppResult<()> {
        self.consents.revoke(&Consent::new(user_id, client_id)).await?;
        self.tokens.revoke_all(client_id, user_id).await;
        info!(client_id = %client_id, user_id = %user_id, "Consent revoked");
        Ok(())
    }

    /// Revoke the user's tokens for each client; every consented client when `client_ids` is empty
    ///
    /// # Errors
    ///
    /// Returns an error if the consented clients cannot be listed
    pub async fn logout(&self, user_id: &str, client_ids: &[String]) -> AppResult<()> {
        let client_ids = if client_ids.is_empty() {
            self.consents.clients_for_user(user_id).await?
        } else {
            client_ids.to_vec()
        };
        for client_id in &client_ids {
            self.tokens.revoke_all(client_id, user_id).await;
        }
        info!(user_id = %user_id, clients = client_ids.len(), "User logged out");
        Ok(())
    }

    /// Validate an access token for a resource server
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] when the token must not be accepted
    pub async fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        self.tokens.access().validate(token).await
    }

    /// Whether the token grants every `required` scope and nothing the server does not offer
    #[must_use]
    pub fn has_required_scopes(&self, claims: &AccessTokenClaims, required: &ScopeSet) -> bool {
        let granted = ScopeSet::parse(&claims.scope);
        required.is_subset_of(&granted) && self.metadata.supports_scopes(&granted)
    }
}

/// Wrap a protocol error into a redirect to the validated callback
fn deliver(redirect: &RedirectUri, error: &OAuthError) -> AuthorizeError {
    debug!(error = %error, "Authorize error delivered by redirect");
    AuthorizeError::Redirect(
        redirect
            .clone()
            .with_error(error.code().as_str(), error.error_description.as_deref())
            .into_url(),
    )
}

fn token_failure(client_id: &str, e: &TokenError) -> OAuthError {
    error!(client_id = %client_id, error = %e, "Token issuance failed");
    OAuthError::server_error()
}

/// Final authorize scope: the request, or the client's full scope when none was requested
fn resolve_authorize_scope(client: &Client, raw: &str) -> Result<ScopeSet, OAuthError> {
    let requested = ScopeSet::parse(raw);
    let registered: ScopeSet = client.scope.iter().collect();

    if requested.has_duplicates() {
        return Err(OAuthError::invalid_scope(
            "scope contains one or more duplicate values.",
        ));
    }
    if requested.len() > registered.len() {
        return Err(OAuthError::invalid_scope(
            "requested scopes exceed scopes known to client.",
        ));
    }
    if !registered.is_superset_of(&requested) {
        return Err(OAuthError::invalid_scope(
            "requested scope is unknown to client.",
        ));
    }
    Ok(if requested.is_empty() {
        registered
    } else {
        requested
    })
}

/// Optional narrowing of a code's scope at the token endpoint
fn narrow_scope(granted: &ScopeSet, raw: &str) -> Result<ScopeSet, OAuthError> {
    let requested = ScopeSet::parse(raw);
    if requested.is_empty() {
        return Ok(granted.clone());
    }
    if requested.has_duplicates() {
        return Err(OAuthError::invalid_scope(
            "requested scope included one or more invalid scopes",
        ));
    }
    if requested.len() > granted.len() {
        return Err(OAuthError::invalid_scope("requested scope exceeds code scope"));
    }
    if !requested.is_subset_of(granted) {
        return Err(OAuthError::invalid_scope(
            "requested scope includes invalid or exceeding scopes",
        ));
    }
    Ok(requested)
}
