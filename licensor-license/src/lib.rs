//! Offline license certificates.
//!
//! This crate handles:
//! - Issuing signed, optionally encrypted certificates for licenses,
//!   machines and enterprise deployments
//! - Locating a certificate from inline config, a configured path or the
//!   default path
//! - Verifying certificates without network access
//! - Detecting system clock rollback with a persisted watermark
//!
//! # Certificate Format
//!
//! ```text
//! -----BEGIN LICENSE FILE-----
//! base64({"enc": ..., "sig": ..., "alg": "aes-128-gcm+ed25519"})
//! -----END LICENSE FILE-----
//! ```
//!
//! The signature covers `<kind>/<enc>`, where `enc` is the base64 payload
//! JSON or its AES-128-GCM `ciphertext.iv` encoding.

mod certificate;
mod clock;
mod codec;
mod config;
mod device;
mod error;
mod issuer;
mod source;
mod validator;

pub use certificate::{
    Certificate, CertificateMeta, CertificatePayload, Resource, ResourceIdentifier, ResourceKind,
    ResourceObject, ACCOUNT_RELATIONSHIP,
};
pub use clock::{
    Clock, ClockIntegrityChecker, FileWatermark, ManualClock, MemoryWatermark, SystemClock,
    WatermarkStore,
};
pub use codec::{
    decode_payload, encode_payload, encryption_secret, AlgorithmTag, EncryptionScheme, Envelope,
    LINE_WIDTH,
};
pub use config::{
    LicenseSection, LicensorConfig, CONFIG_FILE_NAME, ENV_LICENSE_FILE, ENV_LICENSE_FILE_PATH,
    ENV_LICENSE_KEY, ENV_PUBLIC_KEY, ENV_ROOT, ENV_RSA_PUBLIC_KEY, ENV_WATERMARK_PATH,
};
pub use device::DeviceFingerprint;
pub use error::{LicenseError, LicenseResult};
pub use issuer::{Account, CertificateIssuer, CheckoutOptions, DEFAULT_TTL_SECS, MIN_TTL_SECS};
pub use source::{CertificateSource, LocatedCertificate, SourceOrigin, DEFAULT_LICENSE_PATH};
pub use validator::{verify_certificate, CertificateStatus, CertificateValidator, VerifiedCertificate};

pub use licensor_crypto::{KeyMaterial, SigningAlgorithm};
