//! Locating the certificate to verify.
//!
//! Attempts run in order and the first one that yields non-empty text wins:
//! 1. an inline value (armored text, or base64 of armored text)
//! 2. a configured path, relative paths resolved against the install root
//! 3. the default path

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::{debug, info};

use crate::error::{LicenseError, LicenseResult};

/// Default certificate location.
pub const DEFAULT_LICENSE_PATH: &str = "/etc/licensor/license.lic";

/// Where a located certificate came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOrigin {
    Inline,
    Path(PathBuf),
    Default(PathBuf),
}

/// A certificate's raw text and its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedCertificate {
    pub origin: SourceOrigin,
    pub contents: String,
}

/// The ordered chain of places a certificate may come from.
#[derive(Debug, Clone)]
pub struct CertificateSource {
    inline: Option<String>,
    path: Option<PathBuf>,
    root: Option<PathBuf>,
    default_path: PathBuf,
}

impl Default for CertificateSource {
    fn default() -> Self {
        Self {
            inline: None,
            path: None,
            root: None,
            default_path: PathBuf::from(DEFAULT_LICENSE_PATH),
        }
    }
}

impl CertificateSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_inline(mut self, value: impl Into<String>) -> Self {
        self.inline = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the installation root relative paths resolve against.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    #[must_use]
    pub fn with_default_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_path = path.into();
        self
    }

    /// Returns the configured path resolved against the install root.
    #[must_use]
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.as_ref().map(|path| match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.clone(),
        })
    }

    /// Returns the first certificate text the chain yields.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no attempt produced any text.
    pub fn locate(&self) -> LicenseResult<LocatedCertificate> {
        let attempts: [&dyn Fn() -> Option<LocatedCertificate>; 3] = [
            &|| self.inline.as_deref().and_then(decode_inline).map(|contents| LocatedCertificate {
                origin: SourceOrigin::Inline,
                contents,
            }),
            &|| {
                let path = self.resolved_path()?;
                read_nonempty(&path).map(|contents| LocatedCertificate {
                    origin: SourceOrigin::Path(path),
                    contents,
                })
            },
            &|| {
                read_nonempty(&self.default_path).map(|contents| LocatedCertificate {
                    origin: SourceOrigin::Default(self.default_path.clone()),
                    contents,
                })
            },
        ];

        let located = attempts
            .iter()
            .find_map(|attempt| attempt())
            .ok_or(LicenseError::NotFound)?;

        info!(origin = ?located.origin, "located license file");
        Ok(located)
    }
}

/// Accepts armored text as-is, or base64 that decodes to armored text.
fn decode_inline(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if value.starts_with("-----BEGIN") {
        return Some(value.to_string());
    }

    let compact: String = value.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    match STANDARD
        .decode(compact)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
    {
        Some(decoded) if decoded.trim_start().starts_with("-----BEGIN") => Some(decoded),
        _ => Some(value.to_string()),
    }
}

fn read_nonempty(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(contents) if !contents.trim().is_empty() => Some(contents),
        Ok(_) => {
            debug!(path = %path.display(), "license file is empty");
            None
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "license file unreadable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_armored_used_as_is() {
        let text = "-----BEGIN LICENSE FILE-----\nAAAA\n-----END LICENSE FILE-----";
        assert_eq!(decode_inline(text).as_deref(), Some(text));
    }

    #[test]
    fn inline_base64_is_unwrapped() {
        let text = "-----BEGIN LICENSE FILE-----\nAAAA\n-----END LICENSE FILE-----\n";
        let encoded = STANDARD.encode(text);
        assert_eq!(decode_inline(&encoded).as_deref(), Some(text));
    }

    #[test]
    fn inline_blank_skipped() {
        assert_eq!(decode_inline("   "), None);
    }

    #[test]
    fn relative_path_resolves_against_root() {
        let source = CertificateSource::new().with_path("ee.lic").with_root("/opt/app");
        assert_eq!(source.resolved_path(), Some(PathBuf::from("/opt/app/ee.lic")));
    }

    #[test]
    fn absolute_path_ignores_root() {
        let source = CertificateSource::new()
            .with_path("/etc/licenses/ee.lic")
            .with_root("/opt/app");
        assert_eq!(source.resolved_path(), Some(PathBuf::from("/etc/licenses/ee.lic")));
    }
}
