//! Clock access and rollback detection.
//!
//! The watermark is the latest wall-clock time any verification on this
//! host has observed. It only moves forward. Observing a time earlier than
//! the watermark means the clock was rolled back.
//!
//! [`FileWatermark`] serializes read-compare-write with an in-process mutex
//! and an exclusive `flock` on the watermark file, so concurrent verifiers
//! in this process or in other processes never interleave.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{LicenseError, LicenseResult};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    /// Moves the clock by `delta` (negative values move it backward).
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Persistent storage for the observed-time watermark.
pub trait WatermarkStore: Send + Sync {
    /// Atomically raises the watermark to `now` if `now` is later, and
    /// returns the watermark as it was before this call.
    fn observe(&self, now: DateTime<Utc>) -> LicenseResult<Option<DateTime<Utc>>>;

    /// Returns the current watermark without changing it.
    fn current(&self) -> LicenseResult<Option<DateTime<Utc>>>;
}

/// Watermark held in memory; lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryWatermark {
    observed: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryWatermark {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WatermarkStore for MemoryWatermark {
    fn observe(&self, now: DateTime<Utc>) -> LicenseResult<Option<DateTime<Utc>>> {
        let mut observed = self
            .observed
            .lock()
            .map_err(|_| LicenseError::Storage("watermark lock poisoned".to_string()))?;
        let previous = *observed;
        if previous.is_none_or(|watermark| now > watermark) {
            *observed = Some(now);
        }
        Ok(previous)
    }

    fn current(&self) -> LicenseResult<Option<DateTime<Utc>>> {
        self.observed
            .lock()
            .map(|observed| *observed)
            .map_err(|_| LicenseError::Storage("watermark lock poisoned".to_string()))
    }
}

/// On-disk watermark record.
#[derive(Debug, Serialize, Deserialize)]
struct WatermarkRecord {
    observed_at: DateTime<Utc>,
}

/// Watermark persisted as a small JSON file.
#[derive(Debug)]
pub struct FileWatermark {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileWatermark {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_locked(&self) -> LicenseResult<File> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.path)?;
        file.lock_exclusive().map_err(|e| {
            LicenseError::Storage(format!(
                "failed to lock watermark {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(file)
    }

    fn read_record(&self, file: &mut File) -> LicenseResult<Option<DateTime<Utc>>> {
        let mut contents = String::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_string(&mut contents)?;

        if contents.trim().is_empty() {
            return Ok(None);
        }

        let record: WatermarkRecord = serde_json::from_str(&contents).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "corrupt clock watermark");
            LicenseError::Storage(format!("corrupt watermark {}: {e}", self.path.display()))
        })?;
        Ok(Some(record.observed_at))
    }
}

impl WatermarkStore for FileWatermark {
    fn observe(&self, now: DateTime<Utc>) -> LicenseResult<Option<DateTime<Utc>>> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| LicenseError::Storage("watermark lock poisoned".to_string()))?;
        let mut file = self.open_locked()?;
        let previous = self.read_record(&mut file)?;

        if previous.is_none_or(|watermark| now > watermark) {
            let json = serde_json::to_vec(&WatermarkRecord { observed_at: now })?;
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&json)?;
            file.sync_all()?;
        }

        // Dropping the handle releases the flock.
        Ok(previous)
    }

    fn current(&self) -> LicenseResult<Option<DateTime<Utc>>> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| LicenseError::Storage("watermark lock poisoned".to_string()))?;
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        file.lock_shared().map_err(|e| {
            LicenseError::Storage(format!(
                "failed to lock watermark {}: {e}",
                self.path.display()
            ))
        })?;
        self.read_record(&mut file)
    }
}

/// Detects a clock that has moved backward.
#[derive(Clone)]
pub struct ClockIntegrityChecker {
    store: Arc<dyn WatermarkStore>,
}

impl ClockIntegrityChecker {
    pub fn new(store: Arc<dyn WatermarkStore>) -> Self {
        Self { store }
    }

    /// Returns true if `now` is before the certificate's issuance or
    /// before the latest time previously observed on this host.
    ///
    /// Records `now` as the new watermark when it is the latest seen.
    pub fn check(&self, issued: DateTime<Utc>, now: DateTime<Utc>) -> LicenseResult<bool> {
        let previous = self.store.observe(now)?;

        if issued > now {
            warn!(%issued, %now, "certificate issued in the future");
            return Ok(true);
        }
        if let Some(watermark) = previous {
            if now < watermark {
                warn!(%watermark, %now, "clock moved backward");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Returns the watermark without recording a new observation.
    pub fn watermark(&self) -> LicenseResult<Option<DateTime<Utc>>> {
        self.store.current()
    }
}

impl std::fmt::Debug for ClockIntegrityChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockIntegrityChecker").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn memory_watermark_only_moves_forward() {
        let store = MemoryWatermark::new();
        assert_eq!(store.observe(at(100)).unwrap(), None);
        assert_eq!(store.observe(at(50)).unwrap(), Some(at(100)));
        assert_eq!(store.current().unwrap(), Some(at(100)));
        assert_eq!(store.observe(at(200)).unwrap(), Some(at(100)));
        assert_eq!(store.current().unwrap(), Some(at(200)));
    }

    #[test]
    fn checker_flags_rollback() {
        let checker = ClockIntegrityChecker::new(Arc::new(MemoryWatermark::new()));
        assert!(!checker.check(at(0), at(1000)).unwrap());
        assert!(checker.check(at(0), at(999)).unwrap());
        assert!(!checker.check(at(0), at(1000)).unwrap());
    }

    #[test]
    fn checker_flags_future_issuance() {
        let checker = ClockIntegrityChecker::new(Arc::new(MemoryWatermark::new()));
        assert!(checker.check(at(500), at(499)).unwrap());
        assert!(!checker.check(at(500), at(500)).unwrap());
    }

    #[test]
    fn manual_clock_moves() {
        let clock = ManualClock::new(at(10));
        clock.advance(Duration::seconds(5));
        assert_eq!(clock.now(), at(15));
        clock.advance(Duration::seconds(-20));
        assert_eq!(clock.now(), at(-5));
        clock.set(at(1));
        assert_eq!(clock.now(), at(1));
    }
}
