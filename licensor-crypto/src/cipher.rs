//! Certificate payload encryption using AES-128-GCM.
//!
//! The encoded form is `base64(ciphertext || tag) "." base64(iv)`. The GCM
//! tag travels at the end of the first segment and is verified on decrypt.

use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;

/// Size of the GCM IV in bytes (96 bits).
pub const IV_SIZE: usize = 12;

/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Separator between the ciphertext and IV segments.
pub const SEGMENT_SEPARATOR: char = '.';

/// Encrypted payload with the IV needed to decrypt it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedData {
    /// The IV used for encryption (fresh per call).
    pub iv: [u8; IV_SIZE],
    /// The ciphertext with the authentication tag appended.
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Encodes as `base64(ciphertext).base64(iv)`.
    pub fn to_segments(&self) -> String {
        format!(
            "{}{SEGMENT_SEPARATOR}{}",
            STANDARD.encode(&self.ciphertext),
            STANDARD.encode(self.iv)
        )
    }

    /// Decodes from `base64(ciphertext).base64(iv)`.
    pub fn from_segments(encoded: &str) -> CryptoResult<Self> {
        let (ciphertext_b64, iv_b64) = encoded
            .split_once(SEGMENT_SEPARATOR)
            .ok_or_else(|| CryptoError::Encoding("missing iv segment".to_string()))?;

        if iv_b64.contains(SEGMENT_SEPARATOR) {
            return Err(CryptoError::Encoding("too many segments".to_string()));
        }

        let ciphertext = STANDARD
            .decode(ciphertext_b64)
            .map_err(|e| CryptoError::Encoding(format!("invalid ciphertext base64: {e}")))?;
        let iv_bytes = STANDARD
            .decode(iv_b64)
            .map_err(|e| CryptoError::Encoding(format!("invalid iv base64: {e}")))?;

        if ciphertext.len() < TAG_SIZE {
            return Err(CryptoError::Decryption("data too short".to_string()));
        }

        let iv: [u8; IV_SIZE] = iv_bytes.as_slice().try_into().map_err(|_| {
            CryptoError::Decryption(format!(
                "invalid iv length: expected {IV_SIZE}, got {}",
                iv_bytes.len()
            ))
        })?;

        Ok(Self { iv, ciphertext })
    }
}

/// Encrypts plaintext using AES-128-GCM with a random IV.
pub fn encrypt(key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<EncryptedData> {
    let cipher = Aes128Gcm::new(key.as_bytes().into());

    let mut iv = [0u8; IV_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(EncryptedData { iv, ciphertext })
}

/// Decrypts and authenticates ciphertext using AES-128-GCM.
pub fn decrypt(key: &DerivedKey, encrypted: &EncryptedData) -> CryptoResult<Vec<u8>> {
    let cipher = Aes128Gcm::new(key.as_bytes().into());

    cipher
        .decrypt(Nonce::from_slice(&encrypted.iv), encrypted.ciphertext.as_ref())
        .map_err(|_| {
            CryptoError::Decryption("decryption failed (wrong key or tampered data)".to_string())
        })
}

/// Encrypts bytes and returns the two-segment encoding.
pub fn encrypt_segments(key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<String> {
    Ok(encrypt(key, plaintext)?.to_segments())
}

/// Decrypts a two-segment encoding.
pub fn decrypt_segments(key: &DerivedKey, encoded: &str) -> CryptoResult<Vec<u8>> {
    let encrypted = EncryptedData::from_segments(encoded)?;
    decrypt(key, &encrypted)
}
