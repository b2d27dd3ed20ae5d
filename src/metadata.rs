// ABOUTME: OAuth 2.0 Authorization Server Metadata (RFC 8414) document and capability queries
// ABOUTME: Builder keeps grant types and response types paired; relative endpoints are issuer-prefixed
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Server metadata
//!
//! The metadata document doubles as the engine's capability table: the
//! Authorize, Token and Register flows consult it to decide which grant
//! types, response types, PKCE methods and scopes are supported.

use std::collections::BTreeSet;

use oauth_labs_core::constants::{auth_methods, grant_types, pkce, response_types};
use oauth_labs_core::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::scope::ScopeSet;

/// Endpoint locations; relative paths are resolved against the issuer
#[derive(Debug, Clone, Default)]
pub struct Endpoints {
    /// `authorization_endpoint`
    pub authorization: Option<String>,
    /// `token_endpoint`
    pub token: Option<String>,
    /// `jwks_uri`
    pub jwks: Option<String>,
    /// `registration_endpoint`
    pub registration: Option<String>,
    /// `revocation_endpoint`
    pub revocation: Option<String>,
}

/// RFC 8414 metadata document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMetadata {
    /// Issuer identifier without trailing slash
    pub issuer: String,
    /// Authorization endpoint URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,
    /// Token endpoint URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,
    /// JWKS URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,
    /// Client registration endpoint URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,
    /// Scopes clients may register and request
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub scopes_supported: BTreeSet<String>,
    /// Supported `response_type` values (required by RFC 8414)
    #[serde(default)]
    pub response_types_supported: BTreeSet<String>,
    /// Supported `grant_type` values
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub grant_types_supported: BTreeSet<String>,
    /// Token endpoint client authentication methods
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub token_endpoint_auth_methods_supported: BTreeSet<String>,
    /// Revocation endpoint URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<String>,
    /// Revocation endpoint client authentication methods
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub revocation_endpoint_auth_methods_supported: BTreeSet<String>,
    /// PKCE methods; empty means PKCE is unsupported
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub code_challenge_methods_supported: BTreeSet<String>,
}

impl ServerMetadata {
    /// Start a document for `issuer`; a trailing `/` is trimmed
    #[must_use]
    pub fn new(issuer: &str) -> Self {
        Self {
            issuer: issuer.trim_end_matches('/').to_owned(),
            authorization_endpoint: None,
            token_endpoint: None,
            jwks_uri: None,
            registration_endpoint: None,
            scopes_supported: BTreeSet::new(),
            response_types_supported: BTreeSet::new(),
            grant_types_supported: BTreeSet::new(),
            token_endpoint_auth_methods_supported: BTreeSet::new(),
            revocation_endpoint: None,
            revocation_endpoint_auth_methods_supported: BTreeSet::new(),
            code_challenge_methods_supported: BTreeSet::new(),
        }
    }

    /// Set endpoint URLs; paths starting with `/` are prefixed with the issuer
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        let resolve = |endpoint: Option<String>| {
            endpoint
                .filter(|e| !e.is_empty())
                .map(|e| {
                    if e.starts_with('/') {
                        format!("{}{e}", self.issuer)
                    } else {
                        e
                    }
                })
        };
        let authorization = resolve(endpoints.authorization);
        let token = resolve(endpoints.token);
        let jwks = resolve(endpoints.jwks);
        let registration = resolve(endpoints.registration);
        let revocation = resolve(endpoints.revocation);

        self.authorization_endpoint = authorization.or(self.authorization_endpoint);
        self.token_endpoint = token.or(self.token_endpoint);
        self.jwks_uri = jwks.or(self.jwks_uri);
        self.registration_endpoint = registration.or(self.registration_endpoint);
        self.revocation_endpoint = revocation.or(self.revocation_endpoint);
        self
    }

    /// Add grant types, pulling in the paired response type
    ///
    /// # Errors
    ///
    /// Returns an error for grant types the engine does not implement
    pub fn with_grant_types(mut self, values: &[&str]) -> AppResult<Self> {
        for &grant_type in values {
            match grant_type {
                grant_types::AUTHORIZATION_CODE => {
                    self.response_types_supported
                        .insert(response_types::CODE.to_owned());
                }
                grant_types::IMPLICIT => {
                    self.response_types_supported
                        .insert(response_types::TOKEN.to_owned());
                }
                grant_types::REFRESH_TOKEN => {}
                other => return Err(unknown_value("grant_types_supported", other)),
            }
            self.grant_types_supported.insert(grant_type.to_owned());
        }
        Ok(self)
    }

    /// Add response types, pulling in the paired grant type
    ///
    /// # Errors
    ///
    /// Returns an error for response types other than `code` and `token`
    pub fn with_response_types(mut self, values: &[&str]) -> AppResult<Self> {
        for &response_type in values {
            let paired = match response_type {
                response_types::CODE => grant_types::AUTHORIZATION_CODE,
                response_types::TOKEN => grant_types::IMPLICIT,
                other => return Err(unknown_value("response_types_supported", other)),
            };
            self.response_types_supported
                .insert(response_type.to_owned());
            self.grant_types_supported.insert(paired.to_owned());
        }
        Ok(self)
    }

    /// Add PKCE methods
    ///
    /// # Errors
    ///
    /// Returns an error for methods other than `plain` and `S256`
    pub fn with_code_challenge_methods(mut self, values: &[&str]) -> AppResult<Self> {
        for &method in values {
            if method != pkce::PLAIN && method != pkce::S256 {
                return Err(unknown_value("code_challenge_methods_supported", method));
            }
            self.code_challenge_methods_supported
                .insert(method.to_owned());
        }
        Ok(self)
    }

    /// Add token endpoint authentication methods
    ///
    /// # Errors
    ///
    /// Returns an error for methods other than `client_secret_basic` and `client_secret_post`
    pub fn with_token_endpoint_auth_methods(mut self, values: &[&str]) -> AppResult<Self> {
        for &method in values {
            if !auth_methods::ALL.contains(&method) {
                return Err(unknown_value("token_endpoint_auth_methods_supported", method));
            }
            self.token_endpoint_auth_methods_supported
                .insert(method.to_owned());
        }
        Ok(self)
    }

    /// Add revocation endpoint authentication methods
    ///
    /// # Errors
    ///
    /// Returns an error for methods other than `client_secret_basic` and `client_secret_post`
    pub fn with_revocation_endpoint_auth_methods(mut self, values: &[&str]) -> AppResult<Self> {
        for &method in values {
            if !auth_methods::ALL.contains(&method) {
                return Err(unknown_value(
                    "revocation_endpoint_auth_methods_supported",
                    method,
                ));
            }
            self.revocation_endpoint_auth_methods_supported
                .insert(method.to_owned());
        }
        Ok(self)
    }

    /// Replace the supported scopes
    #[must_use]
    pub fn with_scopes<S: AsRef<str>>(mut self, scopes: &[S]) -> Self {
        self.scopes_supported = scopes
            .iter()
            .map(|s| s.as_ref().trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    /// Whether any PKCE method is advertised
    #[must_use]
    pub fn supports_pkce(&self) -> bool {
        !self.code_challenge_methods_supported.is_empty()
    }

    /// Whether `method` is an advertised PKCE method
    #[must_use]
    pub fn supports_code_challenge_method(&self, method: &str) -> bool {
        self.code_challenge_methods_supported.contains(method)
    }

    /// Whether `grant_type` is supported
    #[must_use]
    pub fn supports_grant_type(&self, grant_type: &str) -> bool {
        self.grant_types_supported.contains(grant_type)
    }

    /// Whether `response_type` is supported
    #[must_use]
    pub fn supports_response_type(&self, response_type: &str) -> bool {
        self.response_types_supported.contains(response_type)
    }

    /// Whether every value of `scope` is supported
    #[must_use]
    pub fn supports_scopes(&self, scope: &ScopeSet) -> bool {
        scope.iter().all(|s| self.scopes_supported.contains(s))
    }

    /// Whether `method` is an accepted token endpoint authentication method
    #[must_use]
    pub fn supports_token_endpoint_auth_method(&self, method: &str) -> bool {
        self.token_endpoint_auth_methods_supported.contains(method)
    }

    /// Supported scopes as a [`ScopeSet`]
    #[must_use]
    pub fn supported_scope(&self) -> ScopeSet {
        self.scopes_supported.iter().collect()
    }
}

fn unknown_value(field: &str, value: &str) -> AppError {
    AppError::config_invalid(format!("unknown {field} value {value:?}"))
}
