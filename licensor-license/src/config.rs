//! Verification configuration: `~/.licensor/licensor.toml` plus environment
//! overrides.
//!
//! ```toml
//! [license]
//! kind = "license"
//! path = "config/license.lic"
//! root = "/opt/app"
//! key = "LICENSE-KEY"
//! public_key = "e8601e48b69383ba520245fd07971e983d06d22c4257cfd82304601479cee788"
//! watermark_path = "/var/lib/app/watermark.json"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use licensor_crypto::KeyMaterial;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::certificate::ResourceKind;
use crate::clock::FileWatermark;
use crate::error::{LicenseError, LicenseResult};
use crate::source::{CertificateSource, DEFAULT_LICENSE_PATH};
use crate::validator::CertificateValidator;

/// Config file name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "licensor.toml";

pub const ENV_LICENSE_FILE: &str = "LICENSOR_LICENSE_FILE";
pub const ENV_LICENSE_FILE_PATH: &str = "LICENSOR_LICENSE_FILE_PATH";
pub const ENV_LICENSE_KEY: &str = "LICENSOR_LICENSE_KEY";
pub const ENV_ROOT: &str = "LICENSOR_ROOT";
pub const ENV_PUBLIC_KEY: &str = "LICENSOR_PUBLIC_KEY";
pub const ENV_RSA_PUBLIC_KEY: &str = "LICENSOR_RSA_PUBLIC_KEY";
pub const ENV_WATERMARK_PATH: &str = "LICENSOR_WATERMARK_PATH";

/// Top-level config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LicensorConfig {
    #[serde(default)]
    pub license: LicenseSection,
}

/// The `[license]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseSection {
    /// Kind of certificate expected.
    #[serde(default)]
    pub kind: ResourceKind,
    /// Inline certificate text (or base64 of it).
    #[serde(default)]
    pub file: Option<String>,
    /// Certificate path; relative paths resolve against `root`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Installation root.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_license_path")]
    pub default_path: PathBuf,
    /// Shared secret for encrypted certificates.
    #[serde(default)]
    pub key: Option<String>,
    /// Ed25519 public key, hex.
    #[serde(default)]
    pub public_key: Option<String>,
    /// RSA public key, PEM.
    #[serde(default)]
    pub rsa_public_key: Option<String>,
    /// Machine fingerprint override for machine certificates.
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub watermark_path: Option<PathBuf>,
}

fn default_license_path() -> PathBuf {
    PathBuf::from(DEFAULT_LICENSE_PATH)
}

impl Default for LicenseSection {
    fn default() -> Self {
        Self {
            kind: ResourceKind::default(),
            file: None,
            path: None,
            root: None,
            default_path: default_license_path(),
            key: None,
            public_key: None,
            rsa_public_key: None,
            fingerprint: None,
            watermark_path: None,
        }
    }
}

impl LicensorConfig {
    /// Loads `~/.licensor/licensor.toml` (if present) and applies
    /// environment overrides.
    pub fn load() -> LicenseResult<Self> {
        Ok(Self::load_from(&config_dir().join(CONFIG_FILE_NAME))?.with_env())
    }

    /// Loads a config file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> LicenseResult<Self> {
        if !path.exists() {
            info!("No config file found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| LicenseError::Config(format!("failed to read {}: {e}", path.display())))?;
        let config = Self::from_toml_str(&contents)?;
        info!("Loaded licensor config from {:?}", path);
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> LicenseResult<Self> {
        toml::from_str(contents).map_err(|e| LicenseError::Config(e.to_string()))
    }

    /// Applies overrides from the process environment.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_env_from(|name| std::env::var(name).ok())
    }

    /// Applies overrides from `lookup`; set variables replace file values.
    #[must_use]
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let license = &mut self.license;
        if let Some(value) = lookup(ENV_LICENSE_FILE) {
            license.file = Some(value);
        }
        if let Some(value) = lookup(ENV_LICENSE_FILE_PATH) {
            license.path = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup(ENV_LICENSE_KEY) {
            license.key = Some(value);
        }
        if let Some(value) = lookup(ENV_ROOT) {
            license.root = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup(ENV_PUBLIC_KEY) {
            license.public_key = Some(value);
        }
        if let Some(value) = lookup(ENV_RSA_PUBLIC_KEY) {
            license.rsa_public_key = Some(value);
        }
        if let Some(value) = lookup(ENV_WATERMARK_PATH) {
            license.watermark_path = Some(PathBuf::from(value));
        }
        self
    }

    /// Builds the certificate source chain.
    #[must_use]
    pub fn source(&self) -> CertificateSource {
        let license = &self.license;
        let mut source = CertificateSource::new().with_default_path(&license.default_path);
        if let Some(file) = &license.file {
            source = source.with_inline(file.clone());
        }
        if let Some(path) = &license.path {
            source = source.with_path(path);
        }
        if let Some(root) = &license.root {
            source = source.with_root(root);
        }
        source
    }

    /// Builds verification key material.
    #[must_use]
    pub fn key_material(&self) -> KeyMaterial {
        let license = &self.license;
        let mut keys = KeyMaterial::new(license.key.clone().unwrap_or_default());
        if let Some(public_key) = &license.public_key {
            keys = keys.with_ed25519_public_key(public_key.clone());
        }
        if let Some(pem) = &license.rsa_public_key {
            keys = keys.with_rsa_public_key(pem.clone());
        }
        keys
    }

    /// Watermark file location.
    #[must_use]
    pub fn watermark_path(&self) -> PathBuf {
        self.license.watermark_path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("licensor")
                .join("watermark.json")
        })
    }

    /// Builds a validator with a file-backed watermark.
    #[must_use]
    pub fn validator(&self) -> CertificateValidator {
        let mut validator = CertificateValidator::new(self.source(), self.key_material())
            .with_kind(self.license.kind)
            .with_watermark(Arc::new(FileWatermark::new(self.watermark_path())));
        if let Some(fingerprint) = &self.license.fingerprint {
            validator = validator.with_fingerprint(fingerprint.clone());
        }
        validator
    }
}

/// Resolves the licensor config directory.
fn config_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".licensor"))
        .unwrap_or_else(|| PathBuf::from(".licensor"))
}
