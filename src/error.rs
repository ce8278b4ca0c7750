// src/error.rs

//! Crate-wide error type
//!
//! Per-package problems (unresolvable virtual names, failed closure queries,
//! failed downloads) are not errors at the pipeline level: they are logged and
//! recorded as outcomes. The variants here cover everything that can still
//! bubble up through `?`, and the two conditions that abort a run:
//! [`Error::IndexError`] and [`Error::EmptyRepository`].

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Initialization error: {0}")]
    InitError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Download error: {0}")]
    DownloadError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Not found: {0}")]
    NotFoundError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Required tool not found: {0}")]
    ToolNotFound(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("'{command}' timed out after {secs} seconds")]
    Timeout { command: String, secs: u64 },

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Repository index generation failed: {0}")]
    IndexError(String),

    #[error("No packages were fetched into {}", .0.display())]
    EmptyRepository(PathBuf),

    #[error("Destination {} is locked by another run", .0.display())]
    Locked(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error must abort the whole pipeline
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::IndexError(_) | Self::EmptyRepository(_) | Self::Locked(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::IndexError("disk full".to_string()).is_fatal());
        assert!(Error::EmptyRepository(PathBuf::from("/tmp/repo")).is_fatal());
        assert!(!Error::DownloadError("HTTP 404".to_string()).is_fatal());
        assert!(!Error::Timeout {
            command: "apt-cache".to_string(),
            secs: 5
        }
        .is_fatal());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::Timeout {
            command: "apt-cache depends curl".to_string(),
            secs: 30,
        };
        assert_eq!(err.to_string(), "'apt-cache depends curl' timed out after 30 seconds");

        let err = Error::EmptyRepository(PathBuf::from("/srv/repo"));
        assert_eq!(err.to_string(), "No packages were fetched into /srv/repo");
    }
}
