//! Key derivation and account key material.
//!
//! The symmetric key is MD5(secret). MD5 here only stretches an arbitrary
//! secret string to the 128 bits AES-128 needs; it is not used as a
//! security digest anywhere.

use md5::{Digest, Md5};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of derived encryption keys in bytes (128 bits for AES-128).
pub const KEY_SIZE: usize = 16;

/// A derived encryption key with automatic zeroization on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    /// Creates a derived key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derives the certificate encryption key from a shared secret.
pub fn derive_key(secret: &str) -> DerivedKey {
    let digest = Md5::digest(secret.as_bytes());
    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&digest);
    DerivedKey::from_bytes(bytes)
}

/// Generates a random key (tests and one-off encryption).
pub fn generate_random_key() -> DerivedKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    DerivedKey::from_bytes(bytes)
}

/// An account's signing keys and shared secret.
///
/// Supplied by the account store. RSA keys are PEM (PKCS#1 or PKCS#8),
/// Ed25519 keys are hex-encoded raw 32-byte values. Either half of a pair
/// may be absent: issuers need the private halves, verifiers only the
/// public ones.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    secret: String,
    rsa_private_key: Option<String>,
    rsa_public_key: Option<String>,
    ed25519_private_key: Option<String>,
    ed25519_public_key: Option<String>,
}

impl KeyMaterial {
    /// Creates key material holding only the shared secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            rsa_private_key: None,
            rsa_public_key: None,
            ed25519_private_key: None,
            ed25519_public_key: None,
        }
    }

    #[must_use]
    pub fn with_rsa_private_key(mut self, pem: impl Into<String>) -> Self {
        self.rsa_private_key = Some(pem.into());
        self
    }

    #[must_use]
    pub fn with_rsa_public_key(mut self, pem: impl Into<String>) -> Self {
        self.rsa_public_key = Some(pem.into());
        self
    }

    #[must_use]
    pub fn with_ed25519_private_key(mut self, hex: impl Into<String>) -> Self {
        self.ed25519_private_key = Some(hex.into());
        self
    }

    #[must_use]
    pub fn with_ed25519_public_key(mut self, hex: impl Into<String>) -> Self {
        self.ed25519_public_key = Some(hex.into());
        self
    }

    /// Returns the shared secret used for symmetric key derivation.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn rsa_private_key(&self) -> Option<&str> {
        self.rsa_private_key.as_deref()
    }

    pub fn rsa_public_key(&self) -> Option<&str> {
        self.rsa_public_key.as_deref()
    }

    pub fn ed25519_private_key(&self) -> Option<&str> {
        self.ed25519_private_key.as_deref()
    }

    pub fn ed25519_public_key(&self) -> Option<&str> {
        self.ed25519_public_key.as_deref()
    }

    /// Returns true if the material holds any private key.
    pub fn has_private_keys(&self) -> bool {
        self.rsa_private_key.is_some() || self.ed25519_private_key.is_some()
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("secret", &"[REDACTED]")
            .field("rsa_private_key", &self.rsa_private_key.as_ref().map(|_| "[REDACTED]"))
            .field("rsa_public_key", &self.rsa_public_key.is_some())
            .field("ed25519_private_key", &self.ed25519_private_key.as_ref().map(|_| "[REDACTED]"))
            .field("ed25519_public_key", &self.ed25519_public_key.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_key_is_md5_of_secret() {
        // MD5("") = d41d8cd98f00b204e9800998ecf8427e
        let key = derive_key("");
        assert_eq!(hex::encode(key.as_bytes()), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn derive_key_deterministic() {
        let a = derive_key("TEST-116A58-3F79F9-9F1982-9D63B1-V3");
        let b = derive_key("TEST-116A58-3F79F9-9F1982-9D63B1-V3");
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_secrets_different_keys() {
        assert_ne!(derive_key("a").as_bytes(), derive_key("b").as_bytes());
    }

    #[test]
    fn debug_redacts_secrets() {
        let keys = KeyMaterial::new("hunter2").with_ed25519_private_key("00ff");
        let dbg = format!("{keys:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(!dbg.contains("00ff"));
        assert!(dbg.contains("REDACTED"));
    }

    #[test]
    fn new_holds_only_the_secret() {
        let keys = KeyMaterial::new("LICENSE-KEY");
        assert_eq!(keys.secret(), "LICENSE-KEY");
        assert!(keys.rsa_private_key().is_none());
        assert!(keys.rsa_public_key().is_none());
        assert!(keys.ed25519_private_key().is_none());
        assert!(keys.ed25519_public_key().is_none());
        assert!(!keys.has_private_keys());
    }

    #[test]
    fn builders_set_each_key() {
        let keys = KeyMaterial::new("s")
            .with_rsa_public_key("rsa-pub")
            .with_ed25519_private_key("ed-priv");
        assert_eq!(keys.rsa_public_key(), Some("rsa-pub"));
        assert_eq!(keys.ed25519_private_key(), Some("ed-priv"));
        assert!(keys.has_private_keys());
        assert_eq!(keys.clone().secret(), "s");
    }
}
