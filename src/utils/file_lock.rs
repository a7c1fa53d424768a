use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::utils::error::{AppError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Advisory lock backed by a sibling `<file>.lock` created with `create_new`.
///
/// Only cooperating processes that go through `FileLock` are excluded. The lock
/// file is removed when the guard is dropped.
#[derive(Debug)]
pub struct FileLock {
    lock_path: PathBuf,
}

impl FileLock {
    pub fn lock_path_for(target: &Path) -> PathBuf {
        let mut name = target.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Single attempt. Returns `Ok(None)` when another holder owns the lock.
    pub fn try_acquire(target: &Path) -> Result<Option<Self>> {
        let lock_path = Self::lock_path_for(target);
        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
            Ok(mut file) => {
                // pid is informational, for whoever finds a stale lock
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Some(Self { lock_path }))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Poll until the lock is free or `timeout` elapses.
    pub async fn acquire(target: &Path, timeout: Duration) -> Result<Self> {
        let started = Instant::now();
        loop {
            if let Some(lock) = Self::try_acquire(target)? {
                tracing::debug!("Acquired lock {}", lock.lock_path.display());
                return Ok(lock);
            }
            if started.elapsed() >= timeout {
                return Err(AppError::Lock {
                    path: target.display().to_string(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_path) {
            tracing::warn!("Failed to release lock {}: {}", self.lock_path.display(), e);
        }
    }
}
