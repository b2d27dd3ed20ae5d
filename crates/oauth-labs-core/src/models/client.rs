// ABOUTME: OAuth client and consent models for storage and registration
// ABOUTME: Client records, RFC 7591 registration metadata, and the registration receipt
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};

/// Stored OAuth 2.0 client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// OAuth 2.0 client identifier
    pub id: String,
    /// Argon2 PHC hash of the client secret
    pub secret_hash: String,
    /// Human-readable client name
    pub name: String,
    /// Client's home page URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_uri: Option<String>,
    /// Logo shown on the consent screen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    /// Contact addresses of the client owner
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<String>,
    /// Allowed scopes, sorted and unique
    pub scope: Vec<String>,
    /// Registered redirect URIs (at least one, absolute, no fragment)
    pub redirect_uris: Vec<String>,
    /// Token endpoint authentication method
    pub token_endpoint_auth_method: String,
    /// Allowed grant types
    pub grant_types: Vec<String>,
    /// Allowed response types
    pub response_types: Vec<String>,
    /// Unix timestamp of registration
    pub created_at: i64,
}

impl Client {
    /// Whether the client registered this grant type
    #[must_use]
    pub fn has_grant_type(&self, grant_type: &str) -> bool {
        self.grant_types.iter().any(|g| g == grant_type)
    }

    /// Whether the client registered this response type
    #[must_use]
    pub fn has_response_type(&self, response_type: &str) -> bool {
        self.response_types.iter().any(|r| r == response_type)
    }

    /// Whether `uri` is one of the registered redirect URIs (exact match)
    #[must_use]
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|r| r == uri)
    }

    /// Registered scope as a space-delimited string
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scope.join(" ")
    }
}

/// User consent granted to a client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Consent {
    /// User who consented
    pub user_id: String,
    /// Client the consent was granted to
    pub client_id: String,
}

impl Consent {
    /// Build a consent for the (user, client) pair
    #[must_use]
    pub fn new(user_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            client_id: client_id.into(),
        }
    }
}

/// Client metadata submitted at registration (RFC 7591 section 2)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
    /// Redirect URIs
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Requested token endpoint authentication method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_method: Option<String>,
    /// Requested grant types
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grant_types: Vec<String>,
    /// Requested response types
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_types: Vec<String>,
    /// Human-readable client name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// Client's home page URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_uri: Option<String>,
    /// Logo URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    /// Space-delimited scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Contact addresses
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<String>,
}

/// Registration receipt (RFC 7591 section 3.2.1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInformationResponse {
    /// Registered client identifier
    pub client_id: String,
    /// Client secret in plaintext; only ever returned here
    pub client_secret: String,
    /// Unix timestamp of issuance
    pub client_id_issued_at: i64,
    /// Secret expiry; 0 means it never expires
    pub client_secret_expires_at: i64,
    /// Metadata as registered, after defaults were applied
    #[serde(flatten)]
    pub metadata: ClientMetadata,
}
