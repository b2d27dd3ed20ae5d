// ABOUTME: Cryptography module for token protection at rest and in transit
// ABOUTME: AES-256-GCM codec for stored tokens and the RSA-OAEP JWE envelope for refresh tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Cryptographic primitives used by the token managers

/// Symmetric AEAD codec with a server-wide key
pub mod codec;

/// Compact JWE envelope (RSA-OAEP-256 + A256GCM)
pub mod jwe;

pub use codec::{CryptoCodec, EncryptionKey};

/// Errors raised by the cryptographic layer
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Ciphertext was tampered with, truncated, or sealed under another key
    #[error("decryption failed")]
    Decryption,

    /// Key material has the wrong length
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Required length in bytes
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Key material could not be decoded
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// Sealing failed
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// A JWE envelope is structurally invalid
    #[error("malformed JWE: {0}")]
    MalformedJwe(&'static str),
}
