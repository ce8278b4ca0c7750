// src/hash.rs

//! File digests for repository index entries and download verification
//!
//! A `Packages` stanza carries `Size`, `MD5sum`, and `SHA256` for every
//! artifact. All three are computed in a single streaming pass.

use md5::Md5;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Buffer size for streaming reads (64 KB)
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Size and checksums of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigests {
    pub size: u64,
    pub md5: String,
    pub sha256: String,
}

/// Compute size, MD5, and SHA-256 of a reader in one pass
pub fn digest_reader<R: Read>(reader: &mut R) -> io::Result<FileDigests> {
    let mut md5 = Md5::new();
    let mut sha256 = Sha256::new();
    let mut size = 0u64;
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        md5.update(&buffer[..n]);
        sha256.update(&buffer[..n]);
        size += n as u64;
    }

    Ok(FileDigests {
        size,
        md5: format!("{:x}", md5.finalize()),
        sha256: format!("{:x}", sha256.finalize()),
    })
}

/// Compute size, MD5, and SHA-256 of a file
pub fn digest_file(path: &Path) -> io::Result<FileDigests> {
    let mut file = File::open(path)?;
    digest_reader(&mut file)
}

/// Compute the SHA-256 of a byte slice
pub fn sha256(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Compare a file's SHA-256 against an expected hex digest
///
/// Returns the actual digest on mismatch so callers can report both values.
pub fn verify_file_sha256(path: &Path, expected: &str) -> io::Result<Result<(), String>> {
    let actual = digest_file(path)?.sha256;
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(Ok(()))
    } else {
        Ok(Err(actual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_digest_reader_known_values() {
        let mut data: &[u8] = b"hello world";
        let digests = digest_reader(&mut data).unwrap();

        assert_eq!(digests.size, 11);
        assert_eq!(digests.md5, "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(
            digests.sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_digest_empty() {
        let mut data: &[u8] = b"";
        let digests = digest_reader(&mut data).unwrap();
        assert_eq!(digests.size, 0);
        assert_eq!(
            digests.sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_verify_file_sha256() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();

        let good = "B94D27B9934D3E08A52E52D7DA7DABFAC484EFE37A5380EE9088F7ACE2EFCDE9";
        assert!(verify_file_sha256(file.path(), good).unwrap().is_ok());

        let mismatch = verify_file_sha256(file.path(), "00").unwrap();
        assert_eq!(mismatch.unwrap_err(), sha256(b"hello world"));
    }
}
