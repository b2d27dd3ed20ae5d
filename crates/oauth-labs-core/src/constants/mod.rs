// ABOUTME: OAuth protocol constants and server defaults
// ABOUTME: Grant types, response types, auth methods, PKCE methods, JOSE headers, and TTLs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Protocol constants organized by concern

/// `grant_type` values
pub mod grant_types {
    /// Authorization code grant (RFC 6749 section 4.1)
    pub const AUTHORIZATION_CODE: &str = "authorization_code";
    /// Refresh token grant (RFC 6749 section 6)
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// Implicit grant; only used for registration pairing checks
    pub const IMPLICIT: &str = "implicit";
}

/// `response_type` values
pub mod response_types {
    /// Authorization code response
    pub const CODE: &str = "code";
    /// Implicit token response
    pub const TOKEN: &str = "token";
}

/// Client authentication methods at the token and revocation endpoints
pub mod auth_methods {
    /// HTTP Basic authentication
    pub const CLIENT_SECRET_BASIC: &str = "client_secret_basic";
    /// Credentials in the form body
    pub const CLIENT_SECRET_POST: &str = "client_secret_post";
    /// Every method this server can verify
    pub const ALL: &[&str] = &[CLIENT_SECRET_BASIC, CLIENT_SECRET_POST];
}

/// PKCE `code_challenge_method` values (RFC 7636)
pub mod pkce {
    /// Challenge equals the verifier
    pub const PLAIN: &str = "plain";
    /// Challenge is base64url(SHA-256(verifier))
    pub const S256: &str = "S256";
}

/// Token type names and revocation hints
pub mod token_types {
    /// `token_type` in token responses
    pub const BEARER: &str = "Bearer";
    /// `token_type_hint` for access tokens
    pub const ACCESS_TOKEN: &str = "access_token";
    /// `token_type_hint` for refresh tokens
    pub const REFRESH_TOKEN: &str = "refresh_token";
}

/// JOSE header values
pub mod jose {
    /// `typ` header of access tokens (RFC 9068)
    pub const ACCESS_TOKEN_TYP: &str = "at+jwt";
    /// `typ` header of the signed refresh token payload
    pub const REFRESH_TOKEN_TYP: &str = "rt+jwt";
    /// Key id used when none is configured
    pub const DEFAULT_KEY_ID: &str = "01924316-6800-4804-8332-a0730422e016";
    /// Key management algorithm of refresh token envelopes
    pub const JWE_ALG: &str = "RSA-OAEP-256";
    /// Content encryption algorithm of refresh token envelopes
    pub const JWE_ENC: &str = "A256GCM";
}

/// HTTP header names
pub mod headers {
    /// Pre-shared registration key header
    pub const REGISTER_KEY: &str = "x-register-key";
}

/// Endpoint paths relative to the issuer
pub mod endpoints {
    /// Authorization endpoint
    pub const AUTHORIZE: &str = "/oauth/authorize";
    /// Token endpoint
    pub const TOKEN: &str = "/oauth/token";
    /// Dynamic client registration endpoint
    pub const REGISTER: &str = "/oauth/register";
    /// Token revocation endpoint
    pub const REVOKE: &str = "/oauth/revoke";
    /// Public key set
    pub const JWKS: &str = "/.well-known/jwks.json";
    /// Authorization server metadata (RFC 8414)
    pub const METADATA: &str = "/.well-known/oauth-authorization-server";
}

/// Server defaults
pub mod defaults {
    /// Access token lifetime in seconds
    pub const ACCESS_TOKEN_TTL_SECS: u64 = 3600;
    /// Authorization code lifetime in seconds
    pub const AUTHORIZATION_CODE_TTL_SECS: u64 = 600;
    /// Random bytes in an authorization code
    pub const AUTHORIZATION_CODE_BYTES: usize = 32;
    /// AES-256-GCM key length in bytes
    pub const ENCRYPTION_KEY_BYTES: usize = 32;
    /// AES-GCM nonce length in bytes
    pub const NONCE_BYTES: usize = 12;
    /// RSA modulus size for generated keys
    pub const RSA_KEY_BITS: usize = 2048;
    /// Scope offered when none is configured
    pub const SCOPES_SUPPORTED: &[&str] = &["read:profile"];
}
