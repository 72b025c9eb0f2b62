//! Error types for the certificate crypto layer.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The named signature scheme is not supported.
    #[error("signing algorithm is invalid: {0}")]
    InvalidAlgorithm(String),

    /// The account has no key for the requested scheme.
    #[error("missing {0} key")]
    MissingKey(&'static str),

    /// Key material could not be parsed.
    #[error("invalid {kind} key: {reason}")]
    InvalidKey { kind: &'static str, reason: String },

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed (wrong key or tampered data).
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Producing a signature failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Signature does not match the data.
    #[error("signature invalid")]
    InvalidSignature,

    /// Malformed base64 or segment layout.
    #[error("invalid encoding: {0}")]
    Encoding(String),
}
