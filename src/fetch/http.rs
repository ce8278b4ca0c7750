// src/fetch/http.rs

//! Direct HTTP package source
//!
//! Uses the upstream index to find each package's URL and checksum, so it
//! only works with backends that implement [`PackageIndex::locate`].

use super::PackageSource;
use crate::client::HttpClient;
use crate::error::{Error, Result};
use crate::hash::verify_file_sha256;
use crate::index::{PackageIndex, PackageLocation};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Downloads `.deb` files straight from the archive
pub struct HttpSource<'a> {
    index: &'a dyn PackageIndex,
    client: HttpClient,
}

impl<'a> HttpSource<'a> {
    pub fn new(index: &'a dyn PackageIndex, client: HttpClient) -> Self {
        Self { index, client }
    }
}

impl PackageSource for HttpSource<'_> {
    fn name(&self) -> &str {
        "http"
    }

    fn fetch(&self, package: &str, dest: &Path) -> Result<PathBuf> {
        let location = self.index.locate(package).ok_or_else(|| {
            Error::NotFoundError(format!("No download location known for '{}'", package))
        })?;

        let final_path = dest.join(&location.filename);
        // Not a .deb name, so the indexer never sees a half-verified file
        let staging = dest.join(format!(".{}.download", location.filename));

        let written = self.client.download_file(&location.url, &staging)?;
        finish_download(&staging, &final_path, &location, written)
    }
}

/// Verify a staged download and move it into place
///
/// On any failure the staging path is cleared, so nothing is left behind
/// for the next attempt to trip over.
fn finish_download(
    staging: &Path,
    final_path: &Path,
    location: &PackageLocation,
    written: u64,
) -> Result<PathBuf> {
    let result = verify_staged(staging, location, written).and_then(|()| {
        fs::rename(staging, final_path).map_err(|e| {
            Error::IoError(format!(
                "Failed to move {} to {}: {}",
                staging.display(),
                final_path.display(),
                e
            ))
        })
    });

    match result {
        Ok(()) => Ok(final_path.to_path_buf()),
        Err(e) => {
            discard(staging);
            Err(e)
        }
    }
}

fn verify_staged(staging: &Path, location: &PackageLocation, written: u64) -> Result<()> {
    if let Some(expected) = location.size {
        if expected != written {
            return Err(Error::DownloadError(format!(
                "{}: expected {} bytes, got {}",
                location.url, expected, written
            )));
        }
    }

    if let Some(expected) = &location.sha256 {
        let verdict = verify_file_sha256(staging, expected).map_err(|e| {
            Error::IoError(format!("Failed to hash {}: {}", staging.display(), e))
        })?;
        if let Err(actual) = verdict {
            return Err(Error::ChecksumMismatch {
                expected: expected.clone(),
                actual,
            });
        }
        debug!("Checksum verified for {}", location.filename);
    }
    Ok(())
}

fn discard(staging: &Path) {
    let removed = if staging.is_dir() {
        fs::remove_dir_all(staging)
    } else {
        fs::remove_file(staging)
    };
    if let Err(e) = removed {
        debug!("Could not remove {}: {}", staging.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::PackagesIndex;

    #[test]
    fn test_unknown_location_fails_without_network() {
        let index = PackagesIndex::parse("Package: curl\n");
        let source = HttpSource::new(&index, HttpClient::new().unwrap());
        let dest = tempfile::tempdir().unwrap();

        assert!(matches!(
            source.fetch("curl", dest.path()),
            Err(Error::NotFoundError(_))
        ));
        assert!(matches!(
            source.fetch("ghost", dest.path()),
            Err(Error::NotFoundError(_))
        ));
    }

    fn location(data: &[u8]) -> PackageLocation {
        PackageLocation {
            url: "http://deb.example.org/pool/curl_1_all.deb".to_string(),
            filename: "curl_1_all.deb".to_string(),
            sha256: Some(crate::hash::sha256(data)),
            size: Some(data.len() as u64),
        }
    }

    #[test]
    fn test_finish_download_moves_verified_file() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join(".curl_1_all.deb.download");
        let final_path = dir.path().join("curl_1_all.deb");
        fs::write(&staging, b"payload").unwrap();

        let path = finish_download(&staging, &final_path, &location(b"payload"), 7).unwrap();
        assert_eq!(path, final_path);
        assert!(final_path.exists());
        assert!(!staging.exists());
    }

    #[test]
    fn test_checksum_mismatch_removes_staging() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join(".curl_1_all.deb.download");
        let final_path = dir.path().join("curl_1_all.deb");
        fs::write(&staging, b"tampered").unwrap();

        let mut loc = location(b"payload");
        loc.size = None;
        let err = finish_download(&staging, &final_path, &loc, 8).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
        assert!(!staging.exists());
        assert!(!final_path.exists());
    }

    #[test]
    fn test_unreadable_staging_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join(".curl_1_all.deb.download");
        let final_path = dir.path().join("curl_1_all.deb");
        // Hashing a directory fails with an I/O error
        fs::create_dir(&staging).unwrap();

        let mut loc = location(b"payload");
        loc.size = None;
        let err = finish_download(&staging, &final_path, &loc, 0).unwrap_err();
        assert!(matches!(err, Error::IoError(_)));
        assert!(!staging.exists());
    }
}
