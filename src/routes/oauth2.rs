// ABOUTME: OAuth 2.0 route handlers for the authorize, token, register, revoke and discovery endpoints
// ABOUTME: Translates HTTP requests into engine calls and engine outcomes into redirects or JSON bodies
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! OAuth 2.0 authorization server routes
//!
//! ## Endpoints
//!
//! - `GET /.well-known/oauth-authorization-server` - server metadata (RFC 8414)
//! - `GET /.well-known/jwks.json` - public signing keys
//! - `GET /oauth/authorize` - authorization endpoint
//! - `POST /oauth/token` - token endpoint
//! - `POST /oauth/register` - client pre-provisioning (RFC 7591 flavoured)
//! - `POST /oauth/revoke` - token revocation (RFC 7009)

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        Query, State,
    },
    http::{header, HeaderMap, HeaderName, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use oauth_labs_core::constants::{endpoints, headers as oauth_headers};
use oauth_labs_core::errors::{AppError, AppResult, AuthorizeError, OAuthError};
use oauth_labs_core::models::{
    AuthorizeRequest, ClientMetadata, RevocationRequest, RevocationResponse, TokenRequest,
};
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::oauth2_server::client_registration::ClientCredentials;
use crate::oauth2_server::endpoints::OAuthEngine;
use crate::oauth2_server::models::RegistrationRequest;

/// Source of the authenticated end user for authorize requests
pub trait IdentityProvider: Send + Sync {
    /// User id of the request's authenticated user, if any
    fn current_user(&self, headers: &HeaderMap) -> Option<String>;
}

/// Reads the user id from a header set by a trusted front proxy
#[derive(Debug, Clone)]
pub struct HeaderIdentity {
    header: HeaderName,
}

impl HeaderIdentity {
    /// Trust the header called `name`
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a valid header name
    pub fn new(name: &str) -> AppResult<Self> {
        let header = HeaderName::try_from(name.to_ascii_lowercase())
            .map_err(|e| AppError::config_invalid(format!("invalid user header {name:?}: {e}")))?;
        Ok(Self { header })
    }
}

impl IdentityProvider for HeaderIdentity {
    fn current_user(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToOwned::to_owned)
    }
}

/// Shared state of the OAuth routes
pub struct OAuthServerState {
    /// Protocol engine
    pub engine: Arc<OAuthEngine>,
    /// Authenticated user accessor
    pub identity: Arc<dyn IdentityProvider>,
    /// Where unauthenticated authorize requests are sent
    pub login_url: String,
    /// Where authorize requests lacking consent are sent
    pub consent_url: String,
}

impl OAuthServerState {
    /// State reading the user from the configured trusted header
    ///
    /// # Errors
    ///
    /// Returns an error if the configured user header name is invalid
    pub fn new(engine: Arc<OAuthEngine>, config: &ServerConfig) -> AppResult<Self> {
        Ok(Self {
            engine,
            identity: Arc::new(HeaderIdentity::new(&config.user_header)?),
            login_url: config.login_url.clone(),
            consent_url: config.consent_url.clone(),
        })
    }
}

/// OAuth 2.0 routes implementation
pub struct OAuth2Routes;

impl OAuth2Routes {
    /// Create all OAuth 2.0 routes
    pub fn routes(state: Arc<OAuthServerState>) -> Router {
        Router::new()
            .route(endpoints::METADATA, get(Self::handle_metadata))
            .route(endpoints::JWKS, get(Self::handle_jwks))
            .route(endpoints::AUTHORIZE, get(Self::handle_authorize))
            .route(endpoints::TOKEN, post(Self::handle_token))
            .route(endpoints::REGISTER, post(Self::handle_register))
            .route(endpoints::REVOKE, post(Self::handle_revoke))
            .with_state(state)
    }

    async fn handle_metadata(State(state): State<Arc<OAuthServerState>>) -> Response {
        Json(state.engine.metadata().clone()).into_response()
    }

    async fn handle_jwks(State(state): State<Arc<OAuthServerState>>) -> Response {
        (
            [(header::CACHE_CONTROL, "public, max-age=3600")],
            Json(state.engine.jwks()),
        )
            .into_response()
    }

    /// Handle the authorization endpoint
    async fn handle_authorize(
        State(state): State<Arc<OAuthServerState>>,
        headers: HeaderMap,
        uri: Uri,
        Query(request): Query<AuthorizeRequest>,
    ) -> Response {
        let user = state.identity.current_user(&headers);
        let return_to = uri
            .path_and_query()
            .map_or_else(|| uri.path(), |pq| pq.as_str());

        match state.engine.authorize(user.as_deref(), &request).await {
            Ok(url) | Err(AuthorizeError::Redirect(url)) => found(url.as_str()),
            Err(AuthorizeError::AuthenticationRequired) => {
                debug!("Authorize request without authenticated user; redirecting to login");
                found(&append_query(
                    &state.login_url,
                    &[("return_to", return_to)],
                ))
            }
            Err(AuthorizeError::ConsentRequired { client_id, .. }) => found(&append_query(
                &state.consent_url,
                &[("client_id", &client_id), ("return_to", return_to)],
            )),
            Err(AuthorizeError::Abort(error)) => {
                warn!(error = %error, "Authorize request aborted");
                error.into_response()
            }
        }
    }

    /// Handle the token endpoint
    async fn handle_token(
        State(state): State<Arc<OAuthServerState>>,
        headers: HeaderMap,
        request: Result<Form<TokenRequest>, FormRejection>,
    ) -> Result<Response, OAuthError> {
        let Form(request) = request.map_err(|rejection| {
            debug!(error = %rejection, "Unreadable token request body");
            OAuthError::invalid_request("request body must be application/x-www-form-urlencoded.")
        })?;
        let response = state
            .engine
            .token(basic_credentials(&headers), &request)
            .await?;

        Ok((
            [
                (header::CACHE_CONTROL, "no-store"),
                (header::PRAGMA, "no-cache"),
            ],
            Json(response),
        )
            .into_response())
    }

    /// Handle client registration
    async fn handle_register(
        State(state): State<Arc<OAuthServerState>>,
        headers: HeaderMap,
        metadata: Result<Json<ClientMetadata>, JsonRejection>,
    ) -> Result<Response, OAuthError> {
        let Json(metadata) = metadata.map_err(|rejection| {
            debug!(error = %rejection, "Unreadable registration body");
            OAuthError::invalid_client_metadata("request body must be a JSON client metadata object")
        })?;
        let Some((client_id, client_secret)) = basic_credentials(&headers) else {
            return Err(OAuthError::invalid_client_metadata("basic auth missing"));
        };
        let register_key = headers
            .get(oauth_headers::REGISTER_KEY)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);

        let receipt = state
            .engine
            .register(RegistrationRequest {
                register_key,
                client_id,
                client_secret,
                metadata,
            })
            .await?;

        Ok((StatusCode::CREATED, Json(receipt)).into_response())
    }

    /// Handle token revocation; the response never reveals the outcome
    async fn handle_revoke(
        State(state): State<Arc<OAuthServerState>>,
        headers: HeaderMap,
        request: Result<Form<RevocationRequest>, FormRejection>,
    ) -> Json<RevocationResponse> {
        let request = match request {
            Ok(Form(request)) => request,
            Err(rejection) => {
                warn!(error = %rejection, "Unreadable revocation request body");
                return Json(RevocationResponse::ok());
            }
        };
        if let Err(e) = state
            .engine
            .revoke(basic_credentials(&headers), &request)
            .await
        {
            warn!(error = %e, "Revocation request rejected");
        }
        Json(RevocationResponse::ok())
    }
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(ClientCredentials::parse_basic)
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_owned())]).into_response()
}

fn append_query(base: &str, pairs: &[(&str, &str)]) -> String {
    let query = pairs
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query}")
}
