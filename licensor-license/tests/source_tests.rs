use std::fs;
use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine};
use licensor_license::{CertificateSource, LicenseError, SourceOrigin};
use tempfile::TempDir;

const ARMORED: &str = "-----BEGIN LICENSE FILE-----\nZm9v\n-----END LICENSE FILE-----\n";

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn missing_default(dir: &TempDir) -> PathBuf {
    dir.path().join("missing-default.lic")
}

#[test]
fn inline_wins_over_paths() {
    let dir = TempDir::new().unwrap();
    let configured = write(&dir, "configured.lic", "configured");
    let default = write(&dir, "default.lic", "default");

    let located = CertificateSource::new()
        .with_inline(ARMORED)
        .with_path(&configured)
        .with_default_path(&default)
        .locate()
        .unwrap();
    assert_eq!(located.origin, SourceOrigin::Inline);
    assert_eq!(located.contents, ARMORED.trim());
}

#[test]
fn configured_path_wins_over_default() {
    let dir = TempDir::new().unwrap();
    let configured = write(&dir, "configured.lic", "configured");
    let default = write(&dir, "default.lic", "default");

    let located = CertificateSource::new()
        .with_path(&configured)
        .with_default_path(&default)
        .locate()
        .unwrap();
    assert_eq!(located.origin, SourceOrigin::Path(configured));
    assert_eq!(located.contents, "configured");
}

#[test]
fn default_path_is_last_resort() {
    let dir = TempDir::new().unwrap();
    let default = write(&dir, "default.lic", "default");

    let located = CertificateSource::new()
        .with_path(dir.path().join("absent.lic"))
        .with_default_path(&default)
        .locate()
        .unwrap();
    assert_eq!(located.origin, SourceOrigin::Default(default));
}

#[test]
fn relative_path_read_from_root() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("config")).unwrap();
    write(&dir, "config/license.lic", ARMORED);

    let located = CertificateSource::new()
        .with_path("config/license.lic")
        .with_root(dir.path())
        .with_default_path(missing_default(&dir))
        .locate()
        .unwrap();
    assert_eq!(located.origin, SourceOrigin::Path(dir.path().join("config/license.lic")));
    assert_eq!(located.contents, ARMORED);
}

#[test]
fn absolute_path_ignores_root() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "abs.lic", ARMORED);

    let located = CertificateSource::new()
        .with_path(&path)
        .with_root("/somewhere/else")
        .with_default_path(missing_default(&dir))
        .locate()
        .unwrap();
    assert_eq!(located.origin, SourceOrigin::Path(path));
}

#[test]
fn empty_file_falls_through() {
    let dir = TempDir::new().unwrap();
    let empty = write(&dir, "empty.lic", "  \n");
    let default = write(&dir, "default.lic", ARMORED);

    let located = CertificateSource::new()
        .with_path(&empty)
        .with_default_path(&default)
        .locate()
        .unwrap();
    assert_eq!(located.origin, SourceOrigin::Default(default));
}

#[cfg(unix)]
#[test]
fn dev_null_is_not_found() {
    let result = CertificateSource::new()
        .with_path("/dev/null")
        .with_default_path("/dev/null")
        .locate();
    assert!(matches!(result, Err(LicenseError::NotFound)));
}

#[test]
fn nothing_configured_is_not_found() {
    let dir = TempDir::new().unwrap();
    let result = CertificateSource::new()
        .with_default_path(missing_default(&dir))
        .locate();
    assert!(matches!(result, Err(LicenseError::NotFound)));
}

#[test]
fn blank_inline_falls_through() {
    let dir = TempDir::new().unwrap();
    let default = write(&dir, "default.lic", ARMORED);

    let located = CertificateSource::new()
        .with_inline("")
        .with_default_path(&default)
        .locate()
        .unwrap();
    assert_eq!(located.origin, SourceOrigin::Default(default));
}

#[test]
fn base64_inline_is_decoded() {
    let dir = TempDir::new().unwrap();
    let located = CertificateSource::new()
        .with_inline(STANDARD.encode(ARMORED))
        .with_default_path(missing_default(&dir))
        .locate()
        .unwrap();
    assert_eq!(located.origin, SourceOrigin::Inline);
    assert_eq!(located.contents, ARMORED);
}

#[test]
fn unrecognized_inline_passed_through() {
    let dir = TempDir::new().unwrap();
    let located = CertificateSource::new()
        .with_inline("definitely not base64!")
        .with_default_path(missing_default(&dir))
        .locate()
        .unwrap();
    assert_eq!(located.contents, "definitely not base64!");
}
