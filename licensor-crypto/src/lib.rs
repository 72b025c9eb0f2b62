//! Cryptographic primitives for Licensor certificates.
//!
//! - [`KeyMaterial`]: an account's signing keys plus the shared secret
//! - [`cipher`]: AES-128-GCM payload encryption with an MD5-derived key
//! - [`signing`]: detached RSA-PSS, RSA PKCS#1 v1.5 and Ed25519 signatures

pub mod cipher;
mod error;
mod key;
pub mod signing;

pub use cipher::{
    decrypt, decrypt_segments, encrypt, encrypt_segments, EncryptedData, IV_SIZE, TAG_SIZE,
};
pub use error::{CryptoError, CryptoResult};
pub use key::{derive_key, generate_random_key, DerivedKey, KeyMaterial, KEY_SIZE};
pub use signing::{sign, signing_input, verify, SigningAlgorithm, SigningKey, VerifyingKey};
