//! Detached certificate signatures.
//!
//! Supported schemes:
//! - `rsa-pss-sha256`: RSA-PSS over SHA-256, MGF1-SHA-256, maximum salt length
//! - `rsa-sha256`: RSA PKCS#1 v1.5 over SHA-256
//! - `ed25519`: Ed25519 with hex-encoded raw keys
//!
//! Signatures are strict base64 (no line wrapping).

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::{Signer as _, Verifier as _};
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, Pss, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};
use crate::key::KeyMaterial;

/// SHA-256 output length in bytes.
const SHA256_LEN: usize = 32;

/// A supported signature scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    RsaPssSha256,
    RsaSha256,
    Ed25519,
}

impl SigningAlgorithm {
    /// Every supported scheme.
    pub const ALL: [SigningAlgorithm; 3] = [Self::RsaPssSha256, Self::RsaSha256, Self::Ed25519];

    /// Returns the wire identifier.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RsaPssSha256 => "rsa-pss-sha256",
            Self::RsaSha256 => "rsa-sha256",
            Self::Ed25519 => "ed25519",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rsa-pss-sha256" => Ok(Self::RsaPssSha256),
            "rsa-sha256" => Ok(Self::RsaSha256),
            "ed25519" => Ok(Self::Ed25519),
            other => Err(CryptoError::InvalidAlgorithm(other.to_string())),
        }
    }
}

/// Builds the signed byte string: `<prefix>/<encoded payload>`.
#[must_use]
pub fn signing_input(prefix: &str, encoded: &str) -> String {
    format!("{prefix}/{encoded}")
}

/// A private key bound to the scheme it signs with.
pub enum SigningKey {
    RsaPss(RsaPrivateKey),
    RsaPkcs1(RsaPrivateKey),
    Ed25519(ed25519_dalek::SigningKey),
}

impl SigningKey {
    /// Selects and parses the account's private key for `algorithm`.
    pub fn from_material(keys: &KeyMaterial, algorithm: SigningAlgorithm) -> CryptoResult<Self> {
        match algorithm {
            SigningAlgorithm::RsaPssSha256 => Ok(Self::RsaPss(rsa_private_key(keys)?)),
            SigningAlgorithm::RsaSha256 => Ok(Self::RsaPkcs1(rsa_private_key(keys)?)),
            SigningAlgorithm::Ed25519 => {
                let hex_key = keys
                    .ed25519_private_key()
                    .ok_or(CryptoError::MissingKey("ed25519 private"))?;
                let bytes = decode_hex_32(hex_key, "ed25519 private")?;
                Ok(Self::Ed25519(ed25519_dalek::SigningKey::from_bytes(&bytes)))
            }
        }
    }

    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        match self {
            Self::RsaPss(_) => SigningAlgorithm::RsaPssSha256,
            Self::RsaPkcs1(_) => SigningAlgorithm::RsaSha256,
            Self::Ed25519(_) => SigningAlgorithm::Ed25519,
        }
    }

    /// Signs `data` and returns the base64 signature.
    pub fn sign(&self, data: &[u8]) -> CryptoResult<String> {
        let signature = match self {
            Self::RsaPss(key) => {
                let salt_len = pss_max_salt_len(key);
                key.sign_with_rng(
                    &mut OsRng,
                    Pss::new_with_salt::<Sha256>(salt_len),
                    &Sha256::digest(data),
                )
                .map_err(|e| CryptoError::Signing(e.to_string()))?
            }
            Self::RsaPkcs1(key) => key
                .sign(Pkcs1v15Sign::new::<Sha256>(), &Sha256::digest(data))
                .map_err(|e| CryptoError::Signing(e.to_string()))?,
            Self::Ed25519(key) => key.sign(data).to_bytes().to_vec(),
        };

        Ok(STANDARD.encode(signature))
    }

    /// Returns the matching public key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        match self {
            Self::RsaPss(key) => VerifyingKey::RsaPss(key.to_public_key()),
            Self::RsaPkcs1(key) => VerifyingKey::RsaPkcs1(key.to_public_key()),
            Self::Ed25519(key) => VerifyingKey::Ed25519(key.verifying_key()),
        }
    }
}

/// A public key bound to the scheme it verifies.
pub enum VerifyingKey {
    RsaPss(RsaPublicKey),
    RsaPkcs1(RsaPublicKey),
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl VerifyingKey {
    /// Selects and parses the account's public key for `algorithm`.
    ///
    /// Falls back to deriving it from the private key when only that half
    /// is present.
    pub fn from_material(keys: &KeyMaterial, algorithm: SigningAlgorithm) -> CryptoResult<Self> {
        match algorithm {
            SigningAlgorithm::RsaPssSha256 => Ok(Self::RsaPss(rsa_public_key(keys)?)),
            SigningAlgorithm::RsaSha256 => Ok(Self::RsaPkcs1(rsa_public_key(keys)?)),
            SigningAlgorithm::Ed25519 => match keys.ed25519_public_key() {
                Some(hex_key) => {
                    let bytes = decode_hex_32(hex_key, "ed25519 public")?;
                    ed25519_dalek::VerifyingKey::from_bytes(&bytes)
                        .map(Self::Ed25519)
                        .map_err(|e| CryptoError::InvalidKey {
                            kind: "ed25519 public",
                            reason: e.to_string(),
                        })
                }
                None => Ok(SigningKey::from_material(keys, algorithm)
                    .map_err(|_| CryptoError::MissingKey("ed25519 public"))?
                    .verifying_key()),
            },
        }
    }

    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        match self {
            Self::RsaPss(_) => SigningAlgorithm::RsaPssSha256,
            Self::RsaPkcs1(_) => SigningAlgorithm::RsaSha256,
            Self::Ed25519(_) => SigningAlgorithm::Ed25519,
        }
    }

    /// Verifies a base64 signature over `data`.
    pub fn verify(&self, data: &[u8], signature: &str) -> CryptoResult<()> {
        let sig_bytes = STANDARD
            .decode(signature)
            .map_err(|_| CryptoError::InvalidSignature)?;

        match self {
            Self::RsaPss(key) => key
                .verify(
                    Pss::new_with_salt::<Sha256>(pss_max_salt_len(key)),
                    &Sha256::digest(data),
                    &sig_bytes,
                )
                .map_err(|_| CryptoError::InvalidSignature),
            Self::RsaPkcs1(key) => key
                .verify(Pkcs1v15Sign::new::<Sha256>(), &Sha256::digest(data), &sig_bytes)
                .map_err(|_| CryptoError::InvalidSignature),
            Self::Ed25519(key) => {
                let sig = ed25519_dalek::Signature::from_slice(&sig_bytes)
                    .map_err(|_| CryptoError::InvalidSignature)?;
                key.verify(data, &sig)
                    .map_err(|_| CryptoError::InvalidSignature)
            }
        }
    }
}

/// Signs `data` with the account's key for the named scheme.
///
/// # Errors
///
/// `InvalidAlgorithm` for an unknown scheme name, `MissingKey`/`InvalidKey`
/// when the account cannot sign with it.
pub fn sign(data: &[u8], keys: &KeyMaterial, algorithm: &str) -> CryptoResult<String> {
    let algorithm: SigningAlgorithm = algorithm.parse()?;
    SigningKey::from_material(keys, algorithm)?.sign(data)
}

/// Checks a detached signature. Returns `Ok(false)` on mismatch.
///
/// # Errors
///
/// `InvalidAlgorithm` for an unknown scheme name, `MissingKey`/`InvalidKey`
/// when the account has no usable key for it.
pub fn verify(
    data: &[u8],
    signature: &str,
    keys: &KeyMaterial,
    algorithm: &str,
) -> CryptoResult<bool> {
    let algorithm: SigningAlgorithm = algorithm.parse()?;
    match VerifyingKey::from_material(keys, algorithm)?.verify(data, signature) {
        Ok(()) => Ok(true),
        Err(CryptoError::InvalidSignature) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Largest PSS salt the key's encoded message can hold: emLen - hLen - 2.
fn pss_max_salt_len(key: &impl PublicKeyParts) -> usize {
    let em_bits = key.n().bits() - 1;
    em_bits.div_ceil(8).saturating_sub(SHA256_LEN + 2)
}

fn rsa_private_key(keys: &KeyMaterial) -> CryptoResult<RsaPrivateKey> {
    let pem = keys.rsa_private_key().ok_or(CryptoError::MissingKey("rsa private"))?;
    RsaPrivateKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
        .map_err(|e| CryptoError::InvalidKey {
            kind: "rsa private",
            reason: e.to_string(),
        })
}

fn rsa_public_key(keys: &KeyMaterial) -> CryptoResult<RsaPublicKey> {
    match keys.rsa_public_key() {
        Some(pem) => RsaPublicKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPublicKey::from_public_key_pem(pem))
            .map_err(|e| CryptoError::InvalidKey {
                kind: "rsa public",
                reason: e.to_string(),
            }),
        None => rsa_private_key(keys)
            .map(|key| key.to_public_key())
            .map_err(|_| CryptoError::MissingKey("rsa public")),
    }
}

fn decode_hex_32(value: &str, kind: &'static str) -> CryptoResult<[u8; 32]> {
    let bytes = hex::decode(value.trim()).map_err(|e| CryptoError::InvalidKey {
        kind,
        reason: e.to_string(),
    })?;
    bytes.as_slice().try_into().map_err(|_| CryptoError::InvalidKey {
        kind,
        reason: format!("expected 32 bytes, got {}", bytes.len()),
    })
}
