//! Error types for certificate issuance and verification.

use licensor_crypto::CryptoError;
use thiserror::Error;

/// Certificate-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Unsupported or missing signing scheme.
    #[error("signing algorithm is invalid: {0}")]
    InvalidAlgorithm(String),

    /// Requested TTL is below the one-hour floor, or the expiry it yields
    /// is not a representable date.
    #[error("ttl must be at least 3600 (1 hour) and yield a representable expiry, got {0}")]
    InvalidTtl(i64),

    /// Requested include is not allowed for the resource kind.
    #[error("invalid include: {0}")]
    InvalidInclude(String),

    /// No certificate artifact could be located.
    #[error("license file not found")]
    NotFound,

    /// The certificate text or envelope is structurally malformed.
    #[error("malformed certificate: {0}")]
    Malformed(String),

    /// The certificate could not be decoded, decrypted or verified.
    #[error("license file is invalid")]
    InvalidLicenseFile,

    /// Certificate expired.
    #[error("license file expired on {0}")]
    Expired(String),

    /// The local clock moved backward.
    #[error("system clock is tampered")]
    Tampered,

    /// Crypto failure during issuance.
    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    /// Watermark storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CryptoError> for LicenseError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidAlgorithm(name) => Self::InvalidAlgorithm(name),
            CryptoError::MissingKey(kind) => Self::InvalidAlgorithm(format!("missing {kind} key")),
            other => Self::Crypto(other),
        }
    }
}

impl From<std::io::Error> for LicenseError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result type for certificate operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
