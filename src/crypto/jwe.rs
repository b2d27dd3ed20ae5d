// ABOUTME: Compact JWE envelope (RFC 7516) used to encrypt signed refresh tokens
// ABOUTME: RSA-OAEP-256 wraps a per-message AES-256-GCM content key; header bytes are the AAD
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use oauth_labs_core::constants::{
    defaults::{ENCRYPTION_KEY_BYTES, NONCE_BYTES},
    jose::{JWE_ALG, JWE_ENC},
};
use rand::{rngs::OsRng, RngCore};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::CryptoError;

const TAG_BYTES: usize = 16;

#[derive(Debug, Serialize, Deserialize)]
struct JweHeader {
    alg: String,
    enc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
}

/// Encrypt `plaintext` to `recipient`, returning the compact serialization
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if key wrapping or sealing fails
pub fn encrypt(
    plaintext: &[u8],
    recipient: &RsaPublicKey,
    kid: Option<&str>,
) -> Result<String, CryptoError> {
    let header = JweHeader {
        alg: JWE_ALG.to_owned(),
        enc: JWE_ENC.to_owned(),
        kid: kid.map(ToOwned::to_owned),
    };
    let header_json =
        serde_json::to_vec(&header).map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let protected = URL_SAFE_NO_PAD.encode(header_json);

    let mut cek = Zeroizing::new([0u8; ENCRYPTION_KEY_BYTES]);
    OsRng.fill_bytes(cek.as_mut_slice());
    let encrypted_key = recipient
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), cek.as_slice())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut iv = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new_from_slice(cek.as_slice())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: plaintext,
                aad: protected.as_bytes(),
            },
        )
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_BYTES);

    Ok(format!(
        "{protected}.{}.{}.{}.{}",
        URL_SAFE_NO_PAD.encode(encrypted_key),
        URL_SAFE_NO_PAD.encode(iv),
        URL_SAFE_NO_PAD.encode(ciphertext),
        URL_SAFE_NO_PAD.encode(tag),
    ))
}

/// Decrypt a compact JWE produced by [`encrypt`]
///
/// # Errors
///
/// Returns [`CryptoError::MalformedJwe`] for structural problems and
/// [`CryptoError::Decryption`] when unwrapping or authentication fails
pub fn decrypt(compact: &str, recipient: &RsaPrivateKey) -> Result<Vec<u8>, CryptoError> {
    let parts: Vec<&str> = compact.split('.').collect();
    let [protected, encrypted_key, iv, ciphertext, tag] = parts.as_slice() else {
        return Err(CryptoError::MalformedJwe("expected five segments"));
    };

    let header_json = decode_segment(protected)?;
    let header: JweHeader = serde_json::from_slice(&header_json)
        .map_err(|_| CryptoError::MalformedJwe("invalid protected header"))?;
    if header.alg != JWE_ALG || header.enc != JWE_ENC {
        return Err(CryptoError::MalformedJwe("unsupported algorithm"));
    }

    let iv = decode_segment(iv)?;
    let tag = decode_segment(tag)?;
    if iv.len() != NONCE_BYTES || tag.len() != TAG_BYTES {
        return Err(CryptoError::MalformedJwe("invalid iv or tag length"));
    }

    let cek = Zeroizing::new(
        recipient
            .decrypt(Oaep::new::<Sha256>(), &decode_segment(encrypted_key)?)
            .map_err(|_| CryptoError::Decryption)?,
    );
    let cipher = Aes256Gcm::new_from_slice(&cek).map_err(|_| CryptoError::Decryption)?;

    let mut sealed = decode_segment(ciphertext)?;
    sealed.extend_from_slice(&tag);
    cipher
        .decrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: &sealed,
                aad: protected.as_bytes(),
            },
        )
        .map_err(|_| CryptoError::Decryption)
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, CryptoError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| CryptoError::MalformedJwe("invalid base64url segment"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::DecodePrivateKey;

    fn test_key() -> RsaPrivateKey {
        RsaPrivateKey::from_pkcs8_pem(include_str!("../../tests/fixtures/test_signing_key.pem"))
            .unwrap()
    }

    #[test]
    fn test_envelope_opens_with_matching_key() {
        let key = test_key();
        let compact = encrypt(b"header.payload.signature", &key.to_public_key(), Some("k1")).unwrap();

        assert_eq!(compact.split('.').count(), 5);
        assert_eq!(decrypt(&compact, &key).unwrap(), b"header.payload.signature");
    }

    #[test]
    fn test_opens_envelope_from_independent_implementation() {
        // sealed for the fixture key with an independent RSA-OAEP-256 and AES-GCM stack
        let compact = include_str!("../../tests/fixtures/reference_refresh_envelope.jwe").trim();
        assert_eq!(
            decrypt(compact, &test_key()).unwrap(),
            b"The true sign of intelligence is not knowledge but imagination."
        );
    }

    #[test]
    fn test_modified_header_breaks_authentication() {
        let key = test_key();
        let compact = encrypt(b"payload", &key.to_public_key(), None).unwrap();
        let forged_header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RSA-OAEP-256","enc":"A256GCM","kid":"x"}"#);
        let rest = compact.split_once('.').unwrap().1;

        assert!(matches!(
            decrypt(&format!("{forged_header}.{rest}"), &key),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn test_structural_errors_are_reported() {
        let key = test_key();
        assert!(matches!(
            decrypt("a.b.c", &key),
            Err(CryptoError::MalformedJwe(_))
        ));
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"dir","enc":"A256GCM"}"#);
        assert!(matches!(
            decrypt(&format!("{header}.AA.AA.AA.AA"), &key),
            Err(CryptoError::MalformedJwe("unsupported algorithm"))
        ));
    }
}
