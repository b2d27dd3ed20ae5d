// ABOUTME: OAuth 2.0 protocol error vocabulary shared by every endpoint
// ABOUTME: Defines OAuthErrorCode, the OAuthError wire body, and authorize control-flow outcomes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

const RFC6749_AUTHORIZE_ERRORS: &str =
    "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1";
const RFC6749_TOKEN_ERRORS: &str = "https://datatracker.ietf.org/doc/html/rfc6749#section-5.2";
const RFC7591_REGISTRATION_ERRORS: &str =
    "https://datatracker.ietf.org/doc/html/rfc7591#section-3.2.2";

/// Standard OAuth 2.0 error codes (RFC 6749 and RFC 7591)
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthErrorCode {
    /// The request is missing a parameter or is otherwise malformed
    InvalidRequest,
    /// Client authentication failed
    InvalidClient,
    /// The grant (code or refresh token) is invalid, expired, revoked, or mismatched
    InvalidGrant,
    /// The requested scope is invalid, unknown, or exceeds what was granted
    InvalidScope,
    /// The client is not allowed to use this grant or response type
    UnauthorizedClient,
    /// The grant type is not supported by the server
    UnsupportedGrantType,
    /// The response type is not supported by the server
    UnsupportedResponseType,
    /// Registration metadata is invalid
    InvalidClientMetadata,
    /// A redirect URI is malformed or not registered
    InvalidRedirectUri,
    /// The server hit an unexpected condition
    ServerError,
}

impl OAuthErrorCode {
    /// Wire representation of the code
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::InvalidScope => "invalid_scope",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::InvalidClientMetadata => "invalid_client_metadata",
            Self::InvalidRedirectUri => "invalid_redirect_uri",
            Self::ServerError => "server_error",
        }
    }
}

impl fmt::Display for OAuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OAuth 2.0 error response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthError {
    /// Error code
    pub error: OAuthErrorCode,
    /// Human-readable error description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// URI for error information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl OAuthError {
    /// Build an error with an explicit code, description, and reference URI
    #[must_use]
    pub fn new(error: OAuthErrorCode, description: impl Into<String>, uri: &str) -> Self {
        Self {
            error,
            error_description: Some(description.into()),
            error_uri: Some(uri.to_owned()),
        }
    }

    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(
            OAuthErrorCode::InvalidRequest,
            description,
            RFC6749_AUTHORIZE_ERRORS,
        )
    }

    /// Create an `invalid_client` error
    #[must_use]
    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidClient, description, RFC6749_TOKEN_ERRORS)
    }

    /// Create an `invalid_grant` error
    #[must_use]
    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidGrant, description, RFC6749_TOKEN_ERRORS)
    }

    /// Create an `invalid_scope` error
    #[must_use]
    pub fn invalid_scope(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidScope, description, RFC6749_TOKEN_ERRORS)
    }

    /// Create an `unauthorized_client` error
    #[must_use]
    pub fn unauthorized_client(description: impl Into<String>) -> Self {
        Self::new(
            OAuthErrorCode::UnauthorizedClient,
            description,
            RFC6749_TOKEN_ERRORS,
        )
    }

    /// Create an `unsupported_grant_type` error
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self::new(
            OAuthErrorCode::UnsupportedGrantType,
            "the grant_type is not supported by this server.",
            RFC6749_TOKEN_ERRORS,
        )
    }

    /// Create an `unsupported_response_type` error
    #[must_use]
    pub fn unsupported_response_type(description: impl Into<String>) -> Self {
        Self::new(
            OAuthErrorCode::UnsupportedResponseType,
            description,
            RFC6749_AUTHORIZE_ERRORS,
        )
    }

    /// Create an `invalid_client_metadata` error
    #[must_use]
    pub fn invalid_client_metadata(description: impl Into<String>) -> Self {
        Self::new(
            OAuthErrorCode::InvalidClientMetadata,
            description,
            RFC7591_REGISTRATION_ERRORS,
        )
    }

    /// Create an `invalid_redirect_uri` error
    #[must_use]
    pub fn invalid_redirect_uri(description: impl Into<String>) -> Self {
        Self::new(
            OAuthErrorCode::InvalidRedirectUri,
            description,
            RFC7591_REGISTRATION_ERRORS,
        )
    }

    /// Create a `server_error` with a generic description
    #[must_use]
    pub fn server_error() -> Self {
        Self::new(
            OAuthErrorCode::ServerError,
            "the server encountered an unexpected condition.",
            RFC6749_AUTHORIZE_ERRORS,
        )
    }

    /// Error code accessor
    #[must_use]
    pub const fn code(&self) -> OAuthErrorCode {
        self.error
    }

    /// Description, or an empty string when none was set
    #[must_use]
    pub fn description(&self) -> &str {
        self.error_description.as_deref().unwrap_or_default()
    }
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {description}", self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for OAuthError {}

/// Outcome of an authorize request that did not produce a success redirect.
///
/// `AuthenticationRequired`, `ConsentRequired`, and `Abort` never reach the
/// client application: the calling layer renders them locally. Only
/// `Redirect` is delivered to the client, and only once its redirect URI
/// was validated against the registry.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizeError {
    /// No authenticated user; prompt login and return to the original request
    #[error("authentication required")]
    AuthenticationRequired,

    /// The user has not granted consent to this client yet
    #[error("consent required for client {client_id}")]
    ConsentRequired {
        /// Client asking for consent
        client_id: String,
        /// User who must consent
        user_id: String,
    },

    /// No safe redirect target exists; render the error locally
    #[error("authorization aborted: {0}")]
    Abort(OAuthError),

    /// Error delivered to the client through its validated redirect URI
    #[error("authorization error delivered via redirect to {}", .0.as_str())]
    Redirect(Url),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization_skips_missing_fields() {
        let error = OAuthError {
            error: OAuthErrorCode::InvalidGrant,
            error_description: None,
            error_uri: None,
        };
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, r#"{"error":"invalid_grant"}"#);
    }

    #[test]
    fn test_constructors_use_wire_codes() {
        let error = OAuthError::invalid_client_metadata("invalid x-register-key");
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["error"], "invalid_client_metadata");
        assert_eq!(json["error_description"], "invalid x-register-key");
        assert_eq!(
            OAuthError::unsupported_grant_type().code().as_str(),
            "unsupported_grant_type"
        );
    }

    #[test]
    fn test_display_includes_description() {
        let error = OAuthError::invalid_scope("scope contains one or more duplicate values.");
        assert_eq!(
            error.to_string(),
            "invalid_scope: scope contains one or more duplicate values."
        );
    }
}
