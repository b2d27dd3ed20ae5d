// ABOUTME: Configuration module for the authorization server
// ABOUTME: Environment-driven server settings and the security policy toggles
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration is built once at startup and handed to constructors by
//! `Arc`; nothing reads the environment after boot.

/// Environment and server configuration
pub mod environment;
/// Protocol check toggles
pub mod security;

pub use environment::{
    DatabaseUrl, Environment, HttpConfig, LogLevel, ServerConfig, SigningKeySource,
};
pub use security::SecurityPolicy;
