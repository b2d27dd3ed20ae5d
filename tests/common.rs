// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides engine, storage, client, and PKCE helpers for the OAuth flows
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `oauth_labs_server`

use std::sync::{Arc, Once};

use oauth_labs_core::constants::grant_types;
use oauth_labs_core::models::{AuthorizeRequest, ClientMetadata, TokenRequest, TokenResponse};
use oauth_labs_server::{
    config::{SecurityPolicy, ServerConfig},
    crypto::EncryptionKey,
    keys::KeyManager,
    oauth2_server::OAuthEngine,
    pkce::{self, CodeChallengeMethod},
    storage::Storage,
};

static INIT_LOGGER: Once = Once::new();

/// Fixed signing key; avoids RSA generation per test
pub const SIGNING_KEY_PEM: &str = include_str!("fixtures/test_signing_key.pem");
pub const ISSUER: &str = "https://auth.example";
pub const REGISTER_KEY: &str = "register-me";
pub const SCOPES: &str = "read:profile write:profile";

pub const CLIENT_A: &str = "client-a";
pub const SECRET_A: &str = "secret-a";
pub const REDIRECT_A: &str = "https://client-a.example/cb";
pub const CLIENT_B: &str = "client-b";
pub const SECRET_B: &str = "secret-b";
pub const REDIRECT_B: &str = "https://client-b.example/cb";

pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";

/// RFC 7636 appendix B verifier
pub const VERIFIER: &str = "dBjftJeZ4CVP-mJ0jzaHqXSpV2g3Q2Kb3hYQ8sqqnP3";

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        let _ = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init();
    });
}

pub fn test_config(policy: SecurityPolicy) -> ServerConfig {
    let mut config = ServerConfig::new(ISSUER, EncryptionKey::generate());
    config.security = policy;
    config.registration_key = Some(REGISTER_KEY.to_owned());
    config.allowed_clients = vec![
        CLIENT_A.to_owned(),
        CLIENT_B.to_owned(),
        "new-client".to_owned(),
    ];
    config.scopes_supported = SCOPES.split(' ').map(ToOwned::to_owned).collect();
    config
}

pub fn test_keys() -> Arc<KeyManager> {
    Arc::new(KeyManager::from_pem("test-kid", SIGNING_KEY_PEM).unwrap())
}

pub fn client_metadata(redirect_uri: &str) -> ClientMetadata {
    ClientMetadata {
        redirect_uris: vec![redirect_uri.to_owned()],
        grant_types: vec![
            grant_types::AUTHORIZATION_CODE.to_owned(),
            grant_types::REFRESH_TOKEN.to_owned(),
        ],
        scope: Some(SCOPES.to_owned()),
        ..ClientMetadata::default()
    }
}

/// Engine plus the storage behind it
pub struct TestServer {
    pub engine: OAuthEngine,
    pub storage: Storage,
    pub config: Arc<ServerConfig>,
}

/// Engine over in-memory storage with the default policy
pub async fn setup() -> TestServer {
    setup_with_policy(SecurityPolicy::default()).await
}

/// Engine over in-memory storage with two clients, two users, and alice's
/// consent to client-a
pub async fn setup_with_policy(policy: SecurityPolicy) -> TestServer {
    setup_with_storage(policy, Storage::in_memory()).await
}

pub async fn setup_with_storage(policy: SecurityPolicy, storage: Storage) -> TestServer {
    init_test_logging();
    let config = Arc::new(test_config(policy));
    let engine = OAuthEngine::new(Arc::clone(&config), test_keys(), &storage).unwrap();

    for user in [ALICE, BOB] {
        engine.add_user(user).await.unwrap();
    }
    engine
        .provision_client(CLIENT_A.to_owned(), SECRET_A.to_owned(), client_metadata(REDIRECT_A))
        .await
        .unwrap();
    engine
        .provision_client(CLIENT_B.to_owned(), SECRET_B.to_owned(), client_metadata(REDIRECT_B))
        .await
        .unwrap();
    engine.grant_consent(ALICE, CLIENT_A).await.unwrap();

    TestServer {
        engine,
        storage,
        config,
    }
}

pub fn basic(client_id: &str, secret: &str) -> Option<(String, String)> {
    Some((client_id.to_owned(), secret.to_owned()))
}

pub fn s256_challenge(verifier: &str) -> String {
    pkce::challenge_for(CodeChallengeMethod::S256, verifier)
}

/// Authorize request for client-a with an S256 challenge over [`VERIFIER`]
pub fn pkce_authorize_request() -> AuthorizeRequest {
    AuthorizeRequest {
        response_type: Some("code".to_owned()),
        client_id: Some(CLIENT_A.to_owned()),
        scope: Some("read:profile".to_owned()),
        state: Some("xyz".to_owned()),
        code_challenge: Some(s256_challenge(VERIFIER)),
        code_challenge_method: Some("S256".to_owned()),
        ..AuthorizeRequest::default()
    }
}

/// Value of `name` in the redirect's query
pub fn query_param(url: &url::Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Run authorize for alice and return the code
pub async fn authorize_code(engine: &OAuthEngine, request: &AuthorizeRequest) -> String {
    let url = engine.authorize(Some(ALICE), request).await.unwrap();
    query_param(&url, "code").expect("redirect carries a code")
}

pub fn code_exchange(code: &str, verifier: Option<&str>) -> TokenRequest {
    TokenRequest {
        grant_type: Some(grant_types::AUTHORIZATION_CODE.to_owned()),
        code: Some(code.to_owned()),
        code_verifier: verifier.map(ToOwned::to_owned),
        ..TokenRequest::default()
    }
}

pub fn refresh_request(refresh_token: &str) -> TokenRequest {
    TokenRequest {
        grant_type: Some(grant_types::REFRESH_TOKEN.to_owned()),
        refresh_token: Some(refresh_token.to_owned()),
        ..TokenRequest::default()
    }
}

/// Full PKCE flow for alice and client-a
pub async fn issue_tokens(engine: &OAuthEngine) -> TokenResponse {
    let code = authorize_code(engine, &pkce_authorize_request()).await;
    engine
        .token(basic(CLIENT_A, SECRET_A), &code_exchange(&code, Some(VERIFIER)))
        .await
        .unwrap()
}
