// ABOUTME: Core types and constants for the OAuth labs authorization server
// ABOUTME: Foundation crate with error taxonomy, protocol constants, and wire models
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # OAuth Labs Core
//!
//! Foundation crate providing the shared vocabulary of the authorization
//! server. It is designed to change infrequently so the engine crate can be
//! rebuilt incrementally on top of it.
//!
//! ## Modules
//!
//! - **errors**: `AppError` for infrastructure failures, `OAuthError` for the
//!   RFC 6749 wire vocabulary, and `AuthorizeError` for authorize control flow
//! - **constants**: grant types, response types, auth methods, defaults
//! - **models**: clients, consents, token records, and request/response bodies

/// Unified error handling with the OAuth error taxonomy
pub mod errors;

/// Protocol constants and defaults
pub mod constants;

/// Persistence records and wire models
pub mod models;
