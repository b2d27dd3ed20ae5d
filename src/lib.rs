// ABOUTME: Main library entry point for the OAuth Labs authorization server
// ABOUTME: Exposes the protocol engine, its storage backends, and the HTTP surface
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # OAuth Labs Server
//!
//! An OAuth 2.0 authorization server implementing the authorization code
//! grant with PKCE, refresh tokens, token revocation, pre-provisioned
//! client registration, and discovery metadata.
//!
//! Each protocol check the engine performs can be toggled through
//! [`config::SecurityPolicy`], so one binary serves both the hardened
//! server and its deliberately weakened lab variants.
//!
//! ## Architecture
//!
//! - **Keys / crypto**: RSA signing keys, the JWKS document, AES-GCM at rest,
//!   and the JWE envelope around refresh tokens
//! - **Storage**: repository traits with in-memory, `SQLite`, and Redis backends
//! - **`oauth2_server`**: codes, tokens, consents, clients, and the engine
//! - **Routes**: thin axum handlers in front of the engine
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use oauth_labs_server::config::ServerConfig;
//! use oauth_labs_server::oauth2_server::OAuthEngine;
//! use oauth_labs_server::storage::Storage;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Arc::new(ServerConfig::from_env()?);
//! let keys = Arc::new(config.key_manager()?);
//! let storage = Storage::from_config(&config).await?;
//! let engine = OAuthEngine::new(config, keys, &storage)?;
//! println!("issuer: {}", engine.metadata().issuer);
//! # Ok(())
//! # }
//! ```

/// Environment-driven configuration and security policy
pub mod config;

/// Token encryption at rest and the refresh token envelope
pub mod crypto;

/// RSA signing keys and the public JWKS document
pub mod keys;

/// Structured logging setup and audit events
pub mod logging;

/// Authorization server metadata (RFC 8414)
pub mod metadata;

/// OAuth 2.0 authorization server
pub mod oauth2_server;

/// Proof Key for Code Exchange (RFC 7636)
pub mod pkce;

/// Redirect URI parsing and matching
pub mod redirect_uri;

/// `HTTP` routes
pub mod routes;

/// Scope sets
pub mod scope;

/// Repository contracts and storage backends
pub mod storage;

#[cfg(test)]
mod test_utils;
