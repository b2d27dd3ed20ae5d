// ABOUTME: AES-256-GCM codec protecting the issuer's stored copy of signed tokens
// ABOUTME: Prepends a random 96-bit nonce to every ciphertext; keys are exactly 32 bytes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use oauth_labs_core::constants::defaults::{ENCRYPTION_KEY_BYTES, NONCE_BYTES};
use rand::RngCore;
use zeroize::Zeroizing;

use super::CryptoError;

/// Server-wide token encryption key
#[derive(Clone)]
pub struct EncryptionKey(Zeroizing<[u8; ENCRYPTION_KEY_BYTES]>);

impl EncryptionKey {
    /// Build a key from raw bytes
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] unless `bytes` is exactly 32 bytes long
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; ENCRYPTION_KEY_BYTES] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: ENCRYPTION_KEY_BYTES,
                    actual: bytes.len(),
                })?;
        Ok(Self(Zeroizing::new(key)))
    }

    /// Parse a hex-encoded key, as found in configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not hex or does not decode to 32 bytes
    pub fn from_hex(value: &str) -> Result<Self, CryptoError> {
        let bytes = Zeroizing::new(
            hex::decode(value.trim())
                .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Generate a fresh random key
    #[must_use]
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; ENCRYPTION_KEY_BYTES]);
        rand::thread_rng().fill_bytes(key.as_mut_slice());
        Self(key)
    }

    /// Raw key bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

/// AEAD codec bound to the server-wide encryption key
#[derive(Debug, Clone)]
pub struct CryptoCodec {
    key: EncryptionKey,
}

impl CryptoCodec {
    /// Create a codec for the given key
    #[must_use]
    pub const fn new(key: EncryptionKey) -> Self {
        Self { key }
    }

    /// Encrypt under the codec's key
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encryption`] if the cipher rejects the input
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Self::encrypt_with_key(plaintext, self.key.as_bytes())
    }

    /// Decrypt under the codec's key
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Decryption`] on tampered or truncated input
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Self::decrypt_with_key(ciphertext, self.key.as_bytes())
    }

    /// Encrypt `plaintext` under `key`, returning `nonce || ciphertext || tag`
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] unless the key is 32 bytes, or
    /// [`CryptoError::Encryption`] if sealing fails
    pub fn encrypt_with_key(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
            expected: ENCRYPTION_KEY_BYTES,
            actual: key.len(),
        })?;

        let mut nonce_bytes = [0u8; NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_BYTES + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Decrypt data produced by [`Self::encrypt_with_key`].
    ///
    /// Every failure (wrong key length, truncated nonce, bad tag) collapses
    /// into [`CryptoError::Decryption`].
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Decryption`] on any failure
    pub fn decrypt_with_key(sealed: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if sealed.len() < NONCE_BYTES {
            return Err(CryptoError::Decryption);
        }
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::Decryption)?;
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_BYTES);
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CryptoError::Decryption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_prepends_fresh_nonce() {
        let codec = CryptoCodec::new(EncryptionKey::generate());
        let first = codec.encrypt(b"signed.jwt.value").unwrap();
        let second = codec.encrypt(b"signed.jwt.value").unwrap();

        assert_ne!(first[..NONCE_BYTES], second[..NONCE_BYTES]);
        assert_eq!(codec.decrypt(&first).unwrap(), b"signed.jwt.value");
        assert_eq!(codec.decrypt(&second).unwrap(), b"signed.jwt.value");
    }

    #[test]
    fn test_tampered_ciphertext_is_rejected() {
        let codec = CryptoCodec::new(EncryptionKey::generate());
        let mut sealed = codec.encrypt(b"payload").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;

        assert!(matches!(codec.decrypt(&sealed), Err(CryptoError::Decryption)));
    }

    #[test]
    fn test_truncated_input_is_rejected() {
        let codec = CryptoCodec::new(EncryptionKey::generate());
        assert!(matches!(
            codec.decrypt(&[0u8; NONCE_BYTES - 1]),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let sealed = CryptoCodec::encrypt_with_key(b"payload", &[7u8; 32]).unwrap();
        assert!(matches!(
            CryptoCodec::decrypt_with_key(&sealed, &[8u8; 32]),
            Err(CryptoError::Decryption)
        ));
        assert!(matches!(
            CryptoCodec::decrypt_with_key(&sealed, &[7u8; 16]),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn test_key_length_is_enforced() {
        assert!(matches!(
            CryptoCodec::encrypt_with_key(b"payload", &[1u8; 31]),
            Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 31
            })
        ));
        assert!(EncryptionKey::from_hex(&"ab".repeat(16)).is_err());
        assert!(EncryptionKey::from_hex(&"ab".repeat(32)).is_ok());
        assert!(EncryptionKey::from_hex("not-hex").is_err());
    }
}
