// ABOUTME: Persistence records and wire models of the authorization server
// ABOUTME: Re-exports client, consent, token, and request/response types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Data model shared by the engine, the storage backends, and the routes

/// Registered clients and registration bodies (RFC 7591)
pub mod client;

/// Request and response bodies of the protocol endpoints
pub mod requests;

/// Token claims, payloads, and stored token records
pub mod tokens;

pub use client::{Client, ClientInformationResponse, ClientMetadata, Consent};
pub use requests::{AuthorizeRequest, RevocationRequest, RevocationResponse, TokenRequest};
pub use tokens::{
    AccessTokenClaims, AccessTokenRecord, RefreshTokenPayload, RefreshTokenRecord, TokenResponse,
};
