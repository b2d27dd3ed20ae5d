// ABOUTME: Engine-side data models for authorization codes, issued tokens, and registration input
// ABOUTME: Wire bodies live in the core crate; these types only cross internal component seams
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use oauth_labs_core::models::ClientMetadata;
use serde::{Deserialize, Serialize};

use crate::pkce::PkceChallenge;

/// Authorization code as stored in the ephemeral store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// Client-visible code (base64url); never persisted
    #[serde(skip)]
    pub code: String,
    /// Client the code was issued to
    pub client_id: String,
    /// User who authorized the client
    pub user_id: String,
    /// Redirect URI passed explicitly at authorize time, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    /// Granted scope, sorted and space-delimited
    pub scope: String,
    /// PKCE binding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkce: Option<PkceChallenge>,
    /// Unix timestamp of issuance
    pub created_at: i64,
}

/// Parameters for authorization code generation
#[derive(Debug, Clone)]
pub struct NewAuthorizationCode<'a> {
    /// Client the code is issued to
    pub client_id: &'a str,
    /// Authorizing user
    pub user_id: &'a str,
    /// Explicit redirect URI to bind, if the request carried one
    pub redirect_uri: Option<&'a str>,
    /// Final granted scope
    pub scope: &'a str,
    /// PKCE binding
    pub pkce: Option<PkceChallenge>,
}

/// Signed access token plus the metadata the token endpoint reports
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    /// Signed JWT handed to the client
    pub token: String,
    /// Token id
    pub jti: String,
    /// Lifetime in seconds
    pub expires_in: u64,
}

/// Tokens produced by a grant
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    /// Signed access token
    pub access_token: String,
    /// Refresh token (JWE, base64url)
    pub refresh_token: String,
    /// Granted scope
    pub scope: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

/// Registration request as seen by the engine
#[derive(Debug, Clone, Default)]
pub struct RegistrationRequest {
    /// Value of the `x-register-key` header
    pub register_key: Option<String>,
    /// Client id from Basic auth
    pub client_id: String,
    /// Client secret from Basic auth
    pub client_secret: String,
    /// JSON body
    pub metadata: ClientMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkce::CodeChallengeMethod;

    #[test]
    fn test_code_value_is_not_serialized() {
        let record = AuthorizationCode {
            code: "secret-code".to_owned(),
            client_id: "client-1".to_owned(),
            user_id: "alice".to_owned(),
            redirect_uri: None,
            scope: "read:profile".to_owned(),
            pkce: Some(PkceChallenge {
                challenge: "abc".to_owned(),
                method: CodeChallengeMethod::S256,
            }),
            created_at: 1_700_000_000,
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("secret-code"));
        assert!(!json.contains("redirect_uri"));
        assert!(json.contains(r#""method":"S256""#));

        let decoded: AuthorizationCode = serde_json::from_str(&json).unwrap();
        assert!(decoded.code.is_empty());
        assert_eq!(decoded.pkce, record.pkce);
    }
}
