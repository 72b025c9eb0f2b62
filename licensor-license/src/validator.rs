//! Offline certificate verification.
//!
//! A validator loads its certificate once, on first use, and caches the
//! verified payload. The time-dependent checks are recomputed on every call
//! against the injected clock, so a certificate that was valid can later
//! report expired.
//!
//! Every load failure (missing file, bad armor, wrong key, bad signature,
//! failed decryption, bad JSON) surfaces as the same
//! [`LicenseError::InvalidLicenseFile`]. The specific reason is only logged.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use licensor_crypto::{KeyMaterial, VerifyingKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::certificate::{CertificatePayload, ResourceKind};
use crate::clock::{Clock, ClockIntegrityChecker, MemoryWatermark, SystemClock, WatermarkStore};
use crate::codec::{decode_payload, encryption_secret, AlgorithmTag, Envelope};
use crate::device::DeviceFingerprint;
use crate::error::{LicenseError, LicenseResult};
use crate::source::{CertificateSource, SourceOrigin};

/// Outcome of evaluating a certificate at the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    /// Signature verified, not expired, clock not tampered.
    Valid,
    /// Signature verified but the expiry has passed.
    Expired,
    /// The clock is behind the issuance time or a prior observation.
    Tampered,
    /// The certificate could not be located, decoded or verified.
    Invalid,
}

impl CertificateStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Expired => "expired",
            Self::Tampered => "tampered",
            Self::Invalid => "invalid",
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl std::fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A certificate whose signature has been verified.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedCertificate {
    origin: Option<SourceOrigin>,
    algorithm: AlgorithmTag,
    payload: CertificatePayload,
}

impl VerifiedCertificate {
    /// Where the certificate was loaded from, if it came from a source.
    #[must_use]
    pub fn origin(&self) -> Option<&SourceOrigin> {
        self.origin.as_ref()
    }

    #[must_use]
    pub fn algorithm(&self) -> AlgorithmTag {
        self.algorithm
    }

    #[must_use]
    pub fn encrypted(&self) -> bool {
        self.algorithm.encryption.is_encrypted()
    }

    #[must_use]
    pub fn payload(&self) -> &CertificatePayload {
        &self.payload
    }

    #[must_use]
    pub fn issued(&self) -> DateTime<Utc> {
        self.payload.issued()
    }

    #[must_use]
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.payload.expiry()
    }

    /// True iff the certificate has an expiry strictly before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry().is_some_and(|expiry| expiry < now)
    }
}

/// Decodes, verifies and decrypts armored certificate text.
///
/// `fingerprint` is only used for machine certificates.
///
/// # Errors
///
/// Returns `InvalidLicenseFile` for any failure.
pub fn verify_certificate(
    kind: ResourceKind,
    text: &str,
    keys: &KeyMaterial,
    fingerprint: Option<&str>,
) -> LicenseResult<VerifiedCertificate> {
    decode_and_verify(kind, text, keys, fingerprint).map_err(|e| {
        debug!(kind = kind.prefix(), error = %e, "license file rejected");
        LicenseError::InvalidLicenseFile
    })
}

fn decode_and_verify(
    kind: ResourceKind,
    text: &str,
    keys: &KeyMaterial,
    fingerprint: Option<&str>,
) -> LicenseResult<VerifiedCertificate> {
    let envelope = Envelope::dearmor(kind, text)?;
    let algorithm = envelope.algorithm()?;

    // Nothing inside `enc` is trusted until the signature checks out.
    VerifyingKey::from_material(keys, algorithm.signing)?
        .verify(envelope.signing_input(kind).as_bytes(), &envelope.sig)?;

    let secret = (!keys.secret().is_empty())
        .then(|| encryption_secret(kind, keys.secret(), fingerprint));
    let payload = decode_payload(&envelope.enc, algorithm.encryption, secret.as_deref())?;

    if payload
        .expiry()
        .is_some_and(|expiry| expiry < payload.issued())
    {
        return Err(LicenseError::Malformed("expiry precedes issuance".to_string()));
    }

    Ok(VerifiedCertificate {
        origin: None,
        algorithm,
        payload,
    })
}

enum LoadState {
    Loaded(Arc<VerifiedCertificate>),
    Failed,
}

/// Loads a certificate and answers whether it currently entitles the host.
pub struct CertificateValidator {
    kind: ResourceKind,
    source: CertificateSource,
    keys: KeyMaterial,
    fingerprint: Option<String>,
    clock: Arc<dyn Clock>,
    integrity: ClockIntegrityChecker,
    state: RwLock<Option<LoadState>>,
}

impl CertificateValidator {
    /// Creates a validator for license certificates using the system clock
    /// and an in-memory watermark.
    ///
    /// `keys` needs the public key for the certificate's scheme and, for
    /// encrypted certificates, the shared secret.
    pub fn new(source: CertificateSource, keys: KeyMaterial) -> Self {
        Self {
            kind: ResourceKind::License,
            source,
            keys,
            fingerprint: None,
            clock: Arc::new(SystemClock),
            integrity: ClockIntegrityChecker::new(Arc::new(MemoryWatermark::new())),
            state: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ResourceKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_watermark(mut self, store: Arc<dyn WatermarkStore>) -> Self {
        self.integrity = ClockIntegrityChecker::new(store);
        self
    }

    /// Overrides the machine fingerprint used for machine certificates.
    /// Defaults to this host's [`DeviceFingerprint`].
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Returns the verified certificate, loading it on first use.
    ///
    /// # Errors
    ///
    /// `InvalidLicenseFile` if the certificate cannot be located or verified.
    pub fn current(&self) -> LicenseResult<Arc<VerifiedCertificate>> {
        {
            let state = self.state.read().unwrap_or_else(|e| e.into_inner());
            match state.as_ref() {
                Some(LoadState::Loaded(cert)) => return Ok(Arc::clone(cert)),
                Some(LoadState::Failed) => return Err(LicenseError::InvalidLicenseFile),
                None => {}
            }
        }

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.is_none() {
            *state = Some(match self.load() {
                Ok(cert) => LoadState::Loaded(Arc::new(cert)),
                Err(e) => {
                    warn!(kind = self.kind.prefix(), "failed to load license file");
                    debug!(error = %e, "license file load failure");
                    LoadState::Failed
                }
            });
        }

        match state.as_ref() {
            Some(LoadState::Loaded(cert)) => Ok(Arc::clone(cert)),
            _ => Err(LicenseError::InvalidLicenseFile),
        }
    }

    /// Drops the cached certificate so the next call reloads it.
    pub fn reset(&self) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// True iff the certificate's expiry is strictly before now.
    pub fn expired(&self) -> LicenseResult<bool> {
        let cert = self.current()?;
        Ok(cert.is_expired_at(self.clock.now()))
    }

    /// True iff the clock is behind the certificate's issuance or behind
    /// the latest time seen by an earlier verification. Records now.
    ///
    /// # Errors
    ///
    /// `InvalidLicenseFile` if the certificate cannot be loaded, `Storage`
    /// if the watermark cannot be read or written.
    pub fn tampered(&self) -> LicenseResult<bool> {
        let cert = self.current()?;
        self.integrity.check(cert.issued(), self.clock.now())
    }

    /// True iff the certificate is verified, unexpired and untampered.
    ///
    /// # Errors
    ///
    /// `InvalidLicenseFile` when the certificate cannot be loaded, `Storage`
    /// when the watermark cannot be read or written.
    pub fn valid(&self) -> LicenseResult<bool> {
        let cert = self.current()?;
        let now = self.clock.now();
        let tampered = self.integrity.check(cert.issued(), now)?;
        Ok(!tampered && !cert.is_expired_at(now))
    }

    /// Returns the certificate if valid, or the reason it is not.
    ///
    /// # Errors
    ///
    /// `InvalidLicenseFile`, `Tampered` or `Expired`; `Storage` when the
    /// watermark cannot be read or written.
    pub fn assert_valid(&self) -> LicenseResult<Arc<VerifiedCertificate>> {
        let cert = self.current()?;
        let now = self.clock.now();

        if self.integrity.check(cert.issued(), now)? {
            return Err(LicenseError::Tampered);
        }
        if let Some(expiry) = cert.expiry().filter(|expiry| *expiry < now) {
            return Err(LicenseError::Expired(expiry.to_rfc3339()));
        }
        Ok(cert)
    }

    /// Evaluates the certificate without raising.
    #[must_use]
    pub fn status(&self) -> CertificateStatus {
        match self.assert_valid() {
            Ok(_) => CertificateStatus::Valid,
            Err(LicenseError::Tampered) => CertificateStatus::Tampered,
            Err(LicenseError::Expired(_)) => CertificateStatus::Expired,
            Err(_) => CertificateStatus::Invalid,
        }
    }

    fn load(&self) -> LicenseResult<VerifiedCertificate> {
        let located = self.source.locate()?;

        let fingerprint = match (&self.fingerprint, self.kind) {
            (Some(fingerprint), _) => Some(fingerprint.clone()),
            (None, ResourceKind::Machine) => Some(DeviceFingerprint::generate().id().to_string()),
            (None, _) => None,
        };

        let mut cert =
            decode_and_verify(self.kind, &located.contents, &self.keys, fingerprint.as_deref())?;
        cert.origin = Some(located.origin);

        debug!(
            kind = self.kind.prefix(),
            alg = %cert.algorithm,
            resource = cert.payload.resource_id(),
            "verified license file"
        );
        Ok(cert)
    }
}

impl std::fmt::Debug for CertificateValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateValidator")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
