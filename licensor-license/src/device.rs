//! Host fingerprinting for machine certificates.
//!
//! A machine certificate's payload key is derived from the license secret
//! concatenated with the machine fingerprint, so it only decrypts on the
//! host it was issued for.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;

/// A stable identifier for this host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFingerprint {
    id: String,
}

impl DeviceFingerprint {
    /// Fingerprints the current host: SHA-256 over OS, arch, hostname,
    /// machine id and user; the first 16 bytes, base64.
    #[must_use]
    pub fn generate() -> Self {
        let mut hasher = Sha256::new();
        hasher.update(host_components().join("|").as_bytes());
        let hash = hasher.finalize();
        Self {
            id: STANDARD.encode(&hash[..16]),
        }
    }

    /// Wraps a fingerprint reported by the account store.
    pub fn from_id(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

fn host_components() -> Vec<String> {
    let mut ids = vec![
        env::consts::OS.to_string(),
        env::consts::ARCH.to_string(),
        hostname(),
    ];

    if let Some(machine_id) = machine_id() {
        ids.push(machine_id);
    }
    if let Ok(user) = env::var("USER").or_else(|_| env::var("USERNAME")) {
        ids.push(user);
    }

    ids
}

fn hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn machine_id() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/machine-id")
            .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
            .ok()
            .map(|s| s.trim().to_string())
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .find(|l| l.contains("IOPlatformUUID"))
                    .and_then(|l| l.split('"').nth(3))
                    .map(String::from)
            })
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        None
    }
}
