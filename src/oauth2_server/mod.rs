// ABOUTME: OAuth 2.0 authorization server with JWT access tokens and JWE-sealed refresh tokens
// ABOUTME: Client registry, consent, authorization codes, token managers, and the protocol engine
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Signed access tokens
pub mod access_token;
/// Single-use authorization codes
pub mod authorization_code;
/// Client registry and client authentication
pub mod client_registration;
/// User consent records
pub mod consent;
/// OAuth 2.0 authorization server endpoints
pub mod endpoints;
/// Engine-side data models
pub mod models;
/// Encrypted refresh tokens
pub mod refresh_token;
/// Access plus refresh token service
pub mod tokens;

pub use access_token::{AccessTokenManager, TokenError};
pub use authorization_code::{AuthorizationCodeStore, CodeError};
pub use client_registration::{ClientCredentials, ClientRegistry};
pub use consent::ConsentStore;

/// OAuth 2.0 protocol engine
pub use endpoints::OAuthEngine;

pub use models::{AuthorizationCode, IssuedTokens, RegistrationRequest};
pub use refresh_token::RefreshTokenManager;
pub use tokens::TokenService;
