// src/lock.rs

//! Advisory lock on a destination directory
//!
//! The fetch and index stages write into the destination without any
//! coordination of their own, so two runs against the same directory would
//! race. The CLI holds this lock (`flock(LOCK_EX)` on `<dest>/.isoseed.lock`)
//! for the whole run; the library leaves locking to its caller.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lock file name inside the destination (hidden, so never indexed)
pub const LOCK_FILE: &str = ".isoseed.lock";

/// Exclusive lock held until dropped
pub struct DestinationLock {
    /// Kept open to maintain the lock
    file: File,
    path: PathBuf,
}

impl DestinationLock {
    /// Take the lock without blocking
    ///
    /// Creates `destination` if needed. Returns [`Error::Locked`] when another
    /// process holds it.
    pub fn acquire(destination: &Path) -> Result<Self> {
        fs::create_dir_all(destination).map_err(|e| {
            Error::IoError(format!("Failed to create {}: {}", destination.display(), e))
        })?;

        let path = destination.join(LOCK_FILE);
        let file = File::create(&path).map_err(|e| {
            Error::IoError(format!("Failed to create lock file {}: {}", path.display(), e))
        })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired destination lock at {}", path.display());
                Ok(Self { file, path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(Error::Locked(destination.to_path_buf()))
            }
            Err(e) => Err(Error::IoError(format!(
                "Failed to lock {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DestinationLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
