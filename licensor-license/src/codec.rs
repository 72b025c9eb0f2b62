//! Certificate envelope encoding.
//!
//! ```text
//! -----BEGIN LICENSE FILE-----
//! base64({"enc": "...", "sig": "...", "alg": "aes-128-gcm+ed25519"})
//! -----END LICENSE FILE-----
//! ```
//!
//! `enc` is either strict base64 of the payload JSON or the
//! `ciphertext.iv` encoding from [`licensor_crypto::cipher`]. `sig` covers
//! `<prefix>/<enc>`, so it is checked before anything inside `enc` is parsed.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine};
use licensor_crypto::{derive_key, signing_input, SigningAlgorithm};
use serde::{Deserialize, Serialize};

use crate::certificate::{CertificatePayload, ResourceKind};
use crate::error::{LicenseError, LicenseResult};

/// Column width of the armored base64 body.
pub const LINE_WIDTH: usize = 60;

/// How the payload inside `enc` is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncryptionScheme {
    /// AES-128-GCM with an MD5-derived key.
    Aes128Gcm,
    /// Plain base64, integrity only.
    Base64,
}

impl EncryptionScheme {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aes128Gcm => "aes-128-gcm",
            Self::Base64 => "base64",
        }
    }

    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Aes128Gcm)
    }
}

/// The `alg` field: `<encryption>+<signing>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlgorithmTag {
    pub encryption: EncryptionScheme,
    pub signing: SigningAlgorithm,
}

impl AlgorithmTag {
    pub fn new(encrypted: bool, signing: SigningAlgorithm) -> Self {
        let encryption = if encrypted {
            EncryptionScheme::Aes128Gcm
        } else {
            EncryptionScheme::Base64
        };
        Self { encryption, signing }
    }
}

impl fmt::Display for AlgorithmTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.encryption.as_str(), self.signing)
    }
}

impl FromStr for AlgorithmTag {
    type Err = LicenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (encryption, signing) = s
            .split_once('+')
            .ok_or_else(|| LicenseError::InvalidAlgorithm(s.to_string()))?;

        let encryption = match encryption {
            "aes-128-gcm" => EncryptionScheme::Aes128Gcm,
            "base64" => EncryptionScheme::Base64,
            _ => return Err(LicenseError::InvalidAlgorithm(s.to_string())),
        };
        let signing = signing
            .parse()
            .map_err(|_| LicenseError::InvalidAlgorithm(s.to_string()))?;

        Ok(Self { encryption, signing })
    }
}

/// The signed outer document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub enc: String,
    pub sig: String,
    pub alg: String,
}

impl Envelope {
    /// Parses the `alg` field.
    pub fn algorithm(&self) -> LicenseResult<AlgorithmTag> {
        self.alg.parse()
    }

    /// The exact bytes the signature covers for a certificate of `kind`.
    #[must_use]
    pub fn signing_input(&self, kind: ResourceKind) -> String {
        signing_input(kind.prefix(), &self.enc)
    }

    /// Wraps the envelope in BEGIN/END armor lines.
    pub fn armor(&self, kind: ResourceKind) -> LicenseResult<String> {
        let json = serde_json::to_vec(self)?;
        let body = STANDARD.encode(json);
        let label = kind.armor_label();

        let mut out = format!("-----BEGIN {label}-----\n");
        // Base64 output is ASCII, so byte chunks are valid UTF-8.
        for line in body.as_bytes().chunks(LINE_WIDTH) {
            out.push_str(&String::from_utf8_lossy(line));
            out.push('\n');
        }
        out.push_str(&format!("-----END {label}-----\n"));
        Ok(out)
    }

    /// Strips the armor for `kind` and parses the envelope.
    pub fn dearmor(kind: ResourceKind, text: &str) -> LicenseResult<Self> {
        let label = kind.armor_label();
        let header = format!("-----BEGIN {label}-----");
        let footer = format!("-----END {label}-----");

        let body = text
            .trim()
            .strip_prefix(header.as_str())
            .and_then(|rest| rest.strip_suffix(footer.as_str()))
            .ok_or_else(|| LicenseError::Malformed(format!("missing {label} armor")))?;

        let body: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let json = STANDARD
            .decode(body)
            .map_err(|e| LicenseError::Malformed(format!("invalid envelope base64: {e}")))?;

        serde_json::from_slice(&json)
            .map_err(|e| LicenseError::Malformed(format!("invalid envelope json: {e}")))
    }
}

/// The secret a certificate's payload key is derived from.
///
/// Machine certificates are additionally bound to the machine fingerprint.
#[must_use]
pub fn encryption_secret(kind: ResourceKind, secret: &str, fingerprint: Option<&str>) -> String {
    match (kind, fingerprint) {
        (ResourceKind::Machine, Some(fingerprint)) => format!("{secret}{fingerprint}"),
        _ => secret.to_string(),
    }
}

/// Encodes a payload for the `enc` field.
pub fn encode_payload(
    payload: &CertificatePayload,
    scheme: EncryptionScheme,
    secret: &str,
) -> LicenseResult<String> {
    let json = payload.to_canonical_json()?;
    match scheme {
        EncryptionScheme::Base64 => Ok(STANDARD.encode(json)),
        EncryptionScheme::Aes128Gcm => {
            Ok(licensor_crypto::encrypt_segments(&derive_key(secret), &json)?)
        }
    }
}

/// Decodes the `enc` field back into a payload.
///
/// `secret` is required for encrypted payloads.
pub fn decode_payload(
    enc: &str,
    scheme: EncryptionScheme,
    secret: Option<&str>,
) -> LicenseResult<CertificatePayload> {
    let json = match scheme {
        EncryptionScheme::Base64 => STANDARD
            .decode(enc)
            .map_err(|e| LicenseError::Malformed(format!("invalid payload base64: {e}")))?,
        EncryptionScheme::Aes128Gcm => {
            let secret = secret
                .ok_or_else(|| LicenseError::Malformed("no decryption secret".to_string()))?;
            licensor_crypto::decrypt_segments(&derive_key(secret), enc)?
        }
    };

    serde_json::from_slice(&json)
        .map_err(|e| LicenseError::Malformed(format!("invalid payload json: {e}")))
}
