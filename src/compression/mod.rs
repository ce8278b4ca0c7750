// src/compression/mod.rs
//! Compression utilities for repository indexes and package members
//!
//! Upstream `Packages` files arrive plain, gzip, xz, or zstd compressed, and
//! the `control.tar` member of a `.deb` uses the same set. The offline
//! repository writes its own `Packages.gz` with a fixed header so repeated
//! runs over the same directory produce identical bytes.

use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use std::io::{self, Read, Write};
use thiserror::Error;

/// Compression-related errors
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Failed to create {format} decoder: {source}")]
    DecoderCreation {
        format: &'static str,
        source: io::Error,
    },

    #[error("Failed to decompress {format} data: {source}")]
    Decompression {
        format: &'static str,
        source: io::Error,
    },

    #[error("Failed to compress {format} data: {source}")]
    Compression {
        format: &'static str,
        source: io::Error,
    },
}

/// Supported compression formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// No compression (raw data)
    None,
    /// Gzip compression (.gz)
    Gzip,
    /// XZ/LZMA compression (.xz)
    Xz,
    /// Zstandard compression (.zst)
    Zstd,
}

impl CompressionFormat {
    /// Detect compression format from a file name or URL suffix
    ///
    /// # Examples
    /// ```
    /// use isoseed::compression::CompressionFormat;
    ///
    /// assert_eq!(CompressionFormat::from_extension("Packages.gz"), CompressionFormat::Gzip);
    /// assert_eq!(CompressionFormat::from_extension("control.tar.xz"), CompressionFormat::Xz);
    /// assert_eq!(CompressionFormat::from_extension("control.tar.zst"), CompressionFormat::Zstd);
    /// assert_eq!(CompressionFormat::from_extension("control.tar"), CompressionFormat::None);
    /// ```
    pub fn from_extension(path: &str) -> Self {
        if path.ends_with(".gz") || path.ends_with(".tgz") {
            Self::Gzip
        } else if path.ends_with(".xz") {
            Self::Xz
        } else if path.ends_with(".zst") || path.ends_with(".zstd") {
            Self::Zstd
        } else {
            Self::None
        }
    }

    /// Detect compression format from magic bytes
    ///
    /// - Gzip: `1f 8b`
    /// - XZ: `fd 37 7a 58 5a 00`
    /// - Zstd: `28 b5 2f fd`
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.starts_with(&[0x1f, 0x8b]) {
            Self::Gzip
        } else if data.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
            Self::Xz
        } else if data.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Self::Zstd
        } else {
            Self::None
        }
    }

    /// Get a human-readable name for this format
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }
}

impl std::fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Create a decompressing reader for the given format
///
/// For `CompressionFormat::None`, returns the reader unchanged.
pub fn create_decoder<'a, R: Read + 'a>(
    reader: R,
    format: CompressionFormat,
) -> Result<Box<dyn Read + 'a>, CompressionError> {
    match format {
        CompressionFormat::None => Ok(Box::new(reader)),
        CompressionFormat::Gzip => Ok(Box::new(flate2::read::GzDecoder::new(reader))),
        CompressionFormat::Xz => Ok(Box::new(xz2::read::XzDecoder::new(reader))),
        CompressionFormat::Zstd => {
            let decoder =
                zstd::Decoder::new(reader).map_err(|e| CompressionError::DecoderCreation {
                    format: "zstd",
                    source: e,
                })?;
            Ok(Box::new(decoder))
        }
    }
}

/// Decompress a byte slice using the specified format
pub fn decompress(data: &[u8], format: CompressionFormat) -> Result<Vec<u8>, CompressionError> {
    let mut decoder = create_decoder(data, format)?;
    let mut output = Vec::new();
    decoder
        .read_to_end(&mut output)
        .map_err(|e| CompressionError::Decompression {
            format: format.name(),
            source: e,
        })?;
    Ok(output)
}

/// Decompress a byte slice, detecting the format from magic bytes
pub fn decompress_auto(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    decompress(data, CompressionFormat::from_magic_bytes(data))
}

/// Gzip-compress data with a zeroed header timestamp and no file name
///
/// The output depends only on the input bytes, which keeps `Packages.gz`
/// reproducible across runs.
pub fn gzip_deterministic(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let to_err = |e| CompressionError::Compression {
        format: "gzip",
        source: e,
    };

    let mut encoder: GzEncoder<Vec<u8>> =
        GzBuilder::new().mtime(0).write(Vec::new(), Compression::best());
    encoder.write_all(data).map_err(to_err)?;
    encoder.finish().map_err(to_err)
}
