// ABOUTME: PKCE (RFC 7636) challenge methods and constant-time verifier checks
// ABOUTME: Supports plain and S256; the stored challenge is compared without early exit
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use oauth_labs_core::constants::pkce::{PLAIN, S256};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// `code_challenge_method` values understood by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
    /// Challenge equals the verifier
    #[serde(rename = "plain")]
    Plain,
    /// Challenge is `BASE64URL(SHA256(verifier))`
    #[serde(rename = "S256")]
    S256,
}

impl CodeChallengeMethod {
    /// Wire name of the method
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => PLAIN,
            Self::S256 => S256,
        }
    }
}

impl fmt::Display for CodeChallengeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for unknown challenge methods
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported code_challenge_method")]
pub struct UnsupportedMethod;

impl FromStr for CodeChallengeMethod {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            PLAIN => Ok(Self::Plain),
            S256 => Ok(Self::S256),
            _ => Err(UnsupportedMethod),
        }
    }
}

/// PKCE parameters bound to an authorization code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkceChallenge {
    /// The `code_challenge` sent at authorization time
    pub challenge: String,
    /// How the challenge was derived
    pub method: CodeChallengeMethod,
}

impl PkceChallenge {
    /// Check a `code_verifier` presented at the token endpoint
    #[must_use]
    pub fn verify(&self, verifier: &str) -> bool {
        verify(self.method, &self.challenge, verifier)
    }
}

/// Derive the challenge for `verifier` under `method`
#[must_use]
pub fn challenge_for(method: CodeChallengeMethod, verifier: &str) -> String {
    match method {
        CodeChallengeMethod::Plain => verifier.to_owned(),
        CodeChallengeMethod::S256 => URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes())),
    }
}

/// Whether `verifier` satisfies `challenge`
#[must_use]
pub fn verify(method: CodeChallengeMethod, challenge: &str, verifier: &str) -> bool {
    let computed = challenge_for(method, verifier);
    computed.as_bytes().ct_eq(challenge.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s256_rfc7636_appendix_b() {
        let verifier = "dBjftJeZ4CVP-mJ92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

        assert_eq!(challenge_for(CodeChallengeMethod::S256, verifier), challenge);
        assert!(verify(CodeChallengeMethod::S256, challenge, verifier));
        assert!(!verify(CodeChallengeMethod::S256, challenge, "wrong"));
    }

    #[test]
    fn test_plain_compares_verbatim() {
        assert!(verify(CodeChallengeMethod::Plain, "abc", "abc"));
        assert!(!verify(CodeChallengeMethod::Plain, "abc", "abcd"));
        assert!(!verify(CodeChallengeMethod::Plain, "abc", ""));
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("plain".parse(), Ok(CodeChallengeMethod::Plain));
        assert_eq!("S256".parse(), Ok(CodeChallengeMethod::S256));
        let err = "s256".parse::<CodeChallengeMethod>().unwrap_err();
        assert_eq!(err.to_string(), "unsupported code_challenge_method");
    }

    #[test]
    fn test_challenge_serializes_with_wire_names() {
        let pkce = PkceChallenge {
            challenge: "c".to_owned(),
            method: CodeChallengeMethod::S256,
        };
        let json = serde_json::to_value(&pkce).unwrap();
        assert_eq!(json["method"], "S256");
    }
}
