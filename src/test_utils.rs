// ABOUTME: Test utilities for building keys, codecs, and client records in a consistent way
// ABOUTME: Centralizes fixture creation so unit tests across modules share one signing key
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use oauth_labs_core::constants::{auth_methods, grant_types, response_types};
use oauth_labs_core::models::Client;

use crate::crypto::{CryptoCodec, EncryptionKey};
use crate::keys::KeyManager;

/// Fixed 2048-bit PKCS#8 key so tests skip RSA generation
pub const TEST_SIGNING_KEY_PEM: &str = include_str!("../tests/fixtures/test_signing_key.pem");

/// Issuer used by unit tests
pub const TEST_ISSUER: &str = "https://auth.example";

/// Key manager over the fixture key
#[must_use]
pub fn test_keys() -> Arc<KeyManager> {
    Arc::new(KeyManager::from_pem("test-kid", TEST_SIGNING_KEY_PEM).unwrap())
}

/// Codec with a fresh random key
#[must_use]
pub fn test_codec() -> CryptoCodec {
    CryptoCodec::new(EncryptionKey::generate())
}

/// Confidential client with one redirect URI and the `read:profile` scope
#[must_use]
pub fn test_client(id: &str) -> Client {
    Client {
        id: id.to_owned(),
        secret_hash: String::new(),
        name: format!("Test client {id}"),
        client_uri: None,
        logo_uri: None,
        contacts: vec![],
        scope: vec!["read:profile".to_owned()],
        redirect_uris: vec![format!("https://{id}.example/cb")],
        token_endpoint_auth_method: auth_methods::CLIENT_SECRET_BASIC.to_owned(),
        grant_types: vec![
            grant_types::AUTHORIZATION_CODE.to_owned(),
            grant_types::REFRESH_TOKEN.to_owned(),
        ],
        response_types: vec![response_types::CODE.to_owned()],
        created_at: 0,
    }
}
