//! Shared helpers for certificate tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use licensor_license::{
    Account, Certificate, CertificateIssuer, CertificateSource, CertificateValidator,
    CheckoutOptions, KeyMaterial, ManualClock, Resource, ResourceKind, ResourceObject,
};

pub const SECRET: &str = "TEST-116A58-3F79F9-9F1982-9D63B1-V3";

pub const RSA_PRIVATE: &str = include_str!("../fixtures/rsa_private.pem");
pub const RSA_PUBLIC: &str = include_str!("../fixtures/rsa_public.pem");
pub const RSA_OTHER: &str = include_str!("../fixtures/rsa_other.pem");

pub const ED25519_SEED: &str = "1f5a6d0ac8e1b03fcd2f3ef8f1c9a1e0b4b7e2a9c6f0d3e5a7b9c1d2e3f40516";
pub const ED25519_PUBLIC: &str = "982361e5f6c19668ce69e20d66c28edc59b6a47bd5a229367250e0807a0e6051";
/// Public key of the all-nines seed; verifies nothing signed by `ED25519_SEED`.
pub const ED25519_OTHER_PUBLIC: &str =
    "fd1724385aa0c75b64fb78cd602fa1d991fdebf76b13c58ed702eac835e9f618";

/// Certificates produced by an independent encoder, issued
/// 2026-01-01T00:00:00Z, ed25519 signed and AES-128-GCM encrypted with `SECRET`.
pub const FIXTURE_VALID: &str = include_str!("../fixtures/valid.lic");
pub const FIXTURE_EXPIRED: &str = include_str!("../fixtures/expired.lic");
pub const FIXTURE_TAMPERED: &str = include_str!("../fixtures/tampered.lic");

pub const ACCOUNT_ID: &str = "acct-7f3e";
pub const LICENSE_ID: &str = "lic-0c5a";

/// A fixed issuance instant.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Account holding every private key and the shared secret.
pub fn account() -> Account {
    Account::new(
        ACCOUNT_ID,
        KeyMaterial::new(SECRET)
            .with_rsa_private_key(RSA_PRIVATE)
            .with_ed25519_private_key(ED25519_SEED),
    )
}

/// What a verifying host holds: public keys and the shared secret.
pub fn public_keys() -> KeyMaterial {
    KeyMaterial::new(SECRET)
        .with_rsa_public_key(RSA_PUBLIC)
        .with_ed25519_public_key(ED25519_PUBLIC)
}

pub fn license_resource() -> Resource {
    Resource::new(
        ResourceKind::License,
        ResourceObject::new("licenses", LICENSE_ID)
            .with_attribute("name", "Enterprise")
            .with_attribute("key", SECRET)
            .with_attribute("maxMachines", 5),
    )
    .with_relation(
        "entitlements",
        vec![
            ResourceObject::new("entitlements", "ent-sso").with_attribute("code", "SSO"),
            ResourceObject::new("entitlements", "ent-audit").with_attribute("code", "AUDIT"),
        ],
    )
    .with_relation(
        "product",
        vec![ResourceObject::new("products", "prod-1").with_attribute("name", "Licensor EE")],
    )
}

pub fn machine_resource(fingerprint: &str) -> Resource {
    Resource::new(
        ResourceKind::Machine,
        ResourceObject::new("machines", "mach-1").with_attribute("fingerprint", fingerprint),
    )
    .with_relation("license", vec![ResourceObject::new("licenses", LICENSE_ID)])
}

/// Issues at `t0()` with the given algorithm and options.
pub fn issue_with(resource: &Resource, algorithm: &str, options: CheckoutOptions) -> Certificate {
    let acct = account();
    CertificateIssuer::new(&acct, algorithm, options)
        .unwrap()
        .with_clock(Arc::new(ManualClock::new(t0())))
        .issue(resource)
        .unwrap()
}

pub fn issue(algorithm: &str) -> Certificate {
    issue_with(&license_resource(), algorithm, CheckoutOptions::default())
}

/// A validator reading `text` inline, with no fallback file on disk.
pub fn validator(text: &str, keys: KeyMaterial, clock: Arc<ManualClock>) -> CertificateValidator {
    CertificateValidator::new(
        CertificateSource::new()
            .with_inline(text)
            .with_default_path(Path::new("/nonexistent/licensor/license.lic")),
        keys,
    )
    .with_clock(clock)
}
