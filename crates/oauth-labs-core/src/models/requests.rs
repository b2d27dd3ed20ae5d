// ABOUTME: Request and response bodies of the authorize, token, and revocation endpoints
// ABOUTME: Every parameter is optional on the wire so the engine owns presence validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};

/// Authorization request parameters (RFC 6749 section 4.1.1, RFC 7636)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    /// Must be `code`
    #[serde(default)]
    pub response_type: Option<String>,
    /// Client identifier
    #[serde(default)]
    pub client_id: Option<String>,
    /// Redirect URI; optional when the client registered exactly one
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Requested scope; empty means the client's full scope
    #[serde(default)]
    pub scope: Option<String>,
    /// Opaque value echoed back on every redirect
    #[serde(default)]
    pub state: Option<String>,
    /// PKCE challenge
    #[serde(default)]
    pub code_challenge: Option<String>,
    /// PKCE method, `plain` when omitted
    #[serde(default)]
    pub code_challenge_method: Option<String>,
}

/// Token request parameters (RFC 6749 sections 4.1.3 and 6)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    /// `authorization_code` or `refresh_token`
    #[serde(default)]
    pub grant_type: Option<String>,
    /// Authorization code to redeem
    #[serde(default)]
    pub code: Option<String>,
    /// Redirect URI repeated from the authorize request
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Refresh token to redeem
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Optional narrower scope
    #[serde(default)]
    pub scope: Option<String>,
    /// PKCE verifier
    #[serde(default)]
    pub code_verifier: Option<String>,
    /// Client identifier for `client_secret_post`
    #[serde(default)]
    pub client_id: Option<String>,
    /// Client secret for `client_secret_post`
    #[serde(default)]
    pub client_secret: Option<String>,
}

/// Revocation request (RFC 7009 section 2.1)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRequest {
    /// Token to revoke
    #[serde(default)]
    pub token: Option<String>,
    /// `access_token` or `refresh_token`
    #[serde(default)]
    pub token_type_hint: Option<String>,
    /// Client identifier for `client_secret_post`
    #[serde(default)]
    pub client_id: Option<String>,
    /// Client secret for `client_secret_post`
    #[serde(default)]
    pub client_secret: Option<String>,
}

/// Revocation response; always `{"status":"ok"}` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationResponse {
    /// Constant `ok`
    pub status: String,
}

impl RevocationResponse {
    /// The only revocation response ever sent
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: "ok".to_owned(),
        }
    }
}
