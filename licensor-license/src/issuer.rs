//! Certificate issuance.
//!
//! Issuance is a pure request-to-artifact transformation: it reads the
//! account's key material and the resource snapshot, and returns an
//! armored certificate. Nothing is persisted.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, SubsecRound};
use licensor_crypto::{KeyMaterial, SigningAlgorithm, SigningKey};
use tracing::debug;

use crate::certificate::{
    Certificate, CertificateMeta, CertificatePayload, Resource, ResourceIdentifier, ResourceObject,
    ACCOUNT_RELATIONSHIP,
};
use crate::clock::{Clock, SystemClock};
use crate::codec::{encode_payload, encryption_secret, AlgorithmTag, Envelope};
use crate::error::{LicenseError, LicenseResult};

/// Shortest allowed certificate lifetime (1 hour).
pub const MIN_TTL_SECS: i64 = 60 * 60;

/// Default certificate lifetime (one average month).
pub const DEFAULT_TTL_SECS: i64 = 2_629_746;

/// The account a certificate is issued under.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub keys: KeyMaterial,
}

impl Account {
    pub fn new(id: impl Into<String>, keys: KeyMaterial) -> Self {
        Self { id: id.into(), keys }
    }
}

/// Per-request issuance options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutOptions {
    /// Encrypt the payload with the account secret.
    pub encrypt: bool,
    /// Certificate lifetime; None issues a non-expiring certificate.
    pub ttl: Option<Duration>,
    /// Relation paths to embed.
    pub includes: Vec<String>,
}

impl Default for CheckoutOptions {
    fn default() -> Self {
        Self {
            encrypt: true,
            ttl: Some(Duration::seconds(DEFAULT_TTL_SECS)),
            includes: Vec::new(),
        }
    }
}

/// Builds, encrypts and signs certificates for one account.
pub struct CertificateIssuer<'a> {
    account: &'a Account,
    algorithm: String,
    options: CheckoutOptions,
    clock: Arc<dyn Clock>,
}

impl<'a> CertificateIssuer<'a> {
    /// Creates an issuer.
    ///
    /// The algorithm name is not checked here; an unsupported name fails
    /// in [`issue`](Self::issue) once the payload is built.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTtl` if the TTL is shorter than one hour.
    pub fn new(
        account: &'a Account,
        algorithm: impl Into<String>,
        options: CheckoutOptions,
    ) -> LicenseResult<Self> {
        if let Some(ttl) = options.ttl {
            if ttl.num_seconds() < MIN_TTL_SECS {
                return Err(LicenseError::InvalidTtl(ttl.num_seconds()));
            }
        }

        Ok(Self {
            account,
            algorithm: algorithm.into(),
            options,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replaces the clock used for the issued timestamp.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Issues a certificate for `resource`.
    ///
    /// # Errors
    ///
    /// `InvalidInclude` for an include path the resource kind does not
    /// allow, `InvalidTtl` when the expiry falls outside the representable
    /// date range, `InvalidAlgorithm` for an unsupported scheme or one the
    /// account has no key for.
    pub fn issue(&self, resource: &Resource) -> LicenseResult<Certificate> {
        let allowed = resource.kind.allowed_includes();
        if let Some(bad) = self
            .options
            .includes
            .iter()
            .find(|path| !allowed.contains(&path.as_str()))
        {
            return Err(LicenseError::InvalidInclude(bad.clone()));
        }

        let issued = self.clock.now().trunc_subsecs(3);
        let expiry = self
            .options
            .ttl
            .map(|ttl| {
                issued
                    .checked_add_signed(ttl)
                    .ok_or(LicenseError::InvalidTtl(ttl.num_seconds()))
            })
            .transpose()?;

        let mut data = resource.data.clone();
        data.relationships.insert(
            ACCOUNT_RELATIONSHIP.to_string(),
            ResourceIdentifier::new("accounts", self.account.id.clone()),
        );

        let payload = CertificatePayload {
            meta: CertificateMeta {
                issued,
                expiry,
                ttl: self.options.ttl.map(|ttl| ttl.num_seconds()),
            },
            data,
            included: self.collect_included(resource),
        };

        let signing: SigningAlgorithm = self.algorithm.parse()?;
        let signing_key = SigningKey::from_material(&self.account.keys, signing)?;
        let tag = AlgorithmTag::new(self.options.encrypt, signing);

        let secret = encryption_secret(
            resource.kind,
            self.account.keys.secret(),
            resource.fingerprint(),
        );
        let enc = encode_payload(&payload, tag.encryption, &secret)?;

        let mut envelope = Envelope {
            enc,
            sig: String::new(),
            alg: tag.to_string(),
        };
        envelope.sig = signing_key.sign(envelope.signing_input(resource.kind).as_bytes())?;
        let certificate = envelope.armor(resource.kind)?;

        debug!(
            account = %self.account.id,
            resource = %resource.data.id,
            kind = resource.kind.prefix(),
            alg = %tag,
            expiry = ?expiry,
            "issued certificate"
        );

        Ok(Certificate::new(
            self.account.id.clone(),
            resource.data.id.clone(),
            resource.data.kind.clone(),
            certificate,
            issued,
            expiry,
            payload.meta.ttl,
            self.options.includes.clone(),
        ))
    }

    /// Snapshots for every requested include path, without duplicates.
    fn collect_included(&self, resource: &Resource) -> Vec<ResourceObject> {
        let mut seen = HashSet::new();
        self.options
            .includes
            .iter()
            .filter_map(|path| resource.relations.get(path))
            .flatten()
            .filter(|obj| seen.insert((obj.kind.clone(), obj.id.clone())))
            .cloned()
            .collect()
    }
}
