//! Exclusive lock guarding statistics rebuilds.
//!
//! Only one builder may write a statistics directory at a time. Readers do
//! not take the lock; they see either the old or the new directory because
//! the build swaps it in with a rename.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, ShardselError};

/// Advisory file lock held for the duration of a rebuild.
#[derive(Debug)]
pub struct RebuildLock {
    lock_file: File,
    lock_path: PathBuf,
}

/// Information about the current lock holder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockHolder {
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
    pub hostname: String,
}

impl RebuildLock {
    const LOCK_FILENAME: &'static str = "rebuild.lock";

    /// Try to acquire the lock without blocking.
    pub fn try_acquire(dir: &Path) -> Result<Option<Self>> {
        fs::create_dir_all(dir)?;
        let lock_path = dir.join(Self::LOCK_FILENAME);

        let mut lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| ShardselError::LockFailed(format!("open lock file: {e}")))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                debug!("rebuild lock held by another process");
                return Ok(None);
            }
            Err(e) => {
                return Err(ShardselError::LockFailed(format!("try acquire lock: {e}")));
            }
        }

        let holder = LockHolder {
            pid: std::process::id(),
            acquired_at: Utc::now(),
            hostname: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string()),
        };
        let holder_json = serde_json::to_string(&holder)?;
        lock_file.set_len(0)?;
        lock_file.write_all(holder_json.as_bytes())?;

        debug!(path = %lock_path.display(), "acquired rebuild lock");
        Ok(Some(Self {
            lock_file,
            lock_path,
        }))
    }

    /// Acquire with timeout (polling).
    pub fn acquire_timeout(dir: &Path, timeout: Duration) -> Result<Self> {
        let start = Instant::now();
        let poll_interval = Duration::from_millis(50);

        loop {
            if let Some(lock) = Self::try_acquire(dir)? {
                return Ok(lock);
            }
            if start.elapsed() >= timeout {
                break;
            }
            std::thread::sleep(poll_interval);
        }

        warn!(waited = ?start.elapsed(), "timeout waiting for rebuild lock");
        let holder = Self::holder(dir).ok().flatten();
        Err(ShardselError::LockTimeout(match holder {
            Some(h) => format!("rebuild lock held by pid {} on {} since {}", h.pid, h.hostname, h.acquired_at),
            None => format!("rebuild lock at {} is busy", dir.display()),
        }))
    }

    /// Read the holder record without acquiring.
    pub fn holder(dir: &Path) -> Result<Option<LockHolder>> {
        let lock_path = dir.join(Self::LOCK_FILENAME);
        if !lock_path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&lock_path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(serde_json::from_str(&content).ok())
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for RebuildLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.lock_file) {
            debug!("failed to release rebuild lock: {e}");
        }
        debug!("released rebuild lock");
    }
}
