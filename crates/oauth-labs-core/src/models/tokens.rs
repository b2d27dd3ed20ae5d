// ABOUTME: Token models: access token claims, refresh token payloads, and stored records
// ABOUTME: Also defines the token endpoint success response (RFC 6749 section 5.1)
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};

/// Claims of a signed access token.
///
/// Every field is required: a token missing one, or carrying one with the
/// wrong JSON type, fails to deserialize and is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Token id, the revocation lookup key
    pub jti: String,
    /// Issuer
    pub iss: String,
    /// User id
    pub sub: String,
    /// Audience; exactly the client id
    pub aud: Vec<String>,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Not before (unix seconds)
    pub nbf: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Granted scope, space-delimited
    pub scope: String,
    /// Client the token was issued to
    pub client_id: String,
}

/// Signed payload carried inside a refresh token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenPayload {
    /// Refresh token id, the storage lookup key
    pub id: String,
    /// User id
    pub user_id: String,
    /// Client the token was issued to
    pub client_id: String,
    /// Granted scope, space-delimited
    pub scope: String,
    /// Unix timestamp of issuance
    pub created_at: i64,
}

/// Stored access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTokenRecord {
    /// `jti` of the token
    pub id: String,
    /// User id
    pub user_id: String,
    /// Client id
    pub client_id: String,
    /// Hex-encoded AES-GCM ciphertext of the signed token
    pub data: String,
    /// Revocation flag
    pub revoked: bool,
}

/// Stored refresh token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    /// Refresh token id
    pub id: String,
    /// Client id
    pub client_id: String,
    /// User id
    pub user_id: String,
    /// Hex-encoded JWE of the signed payload
    pub data: String,
    /// Revocation flag
    pub revoked: bool,
}

/// Token endpoint success response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Signed access token
    pub access_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    /// Refresh token, when one was issued or reused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Granted scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}
