// src/client.rs

//! HTTP client for upstream index and package downloads
//!
//! Thin wrapper around a blocking reqwest client with a request timeout.
//! Retries are the caller's concern: the Fetcher owns the retry budget so one
//! slow mirror cannot multiply the wall-clock cost of a whole batch.

use crate::compression::decompress_auto;
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default timeout for HTTP requests (5 minutes; .deb files can be large)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// Blocking HTTP client with a bounded request time
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a client with the default timeout
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a client whose requests fail after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("isoseed/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Download a URL to bytes
    pub fn download_to_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::DownloadError(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::DownloadError(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| Error::DownloadError(format!("Failed to read response: {}", e)))?;

        Ok(bytes.to_vec())
    }

    /// Fetch a URL and decompress it, detecting gzip/xz/zstd from magic bytes
    pub fn fetch_and_decompress(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Fetching and decompressing: {}", url);
        let bytes = self.download_to_bytes(url)?;

        let decompressed = decompress_auto(&bytes).map_err(|e| {
            Error::ParseError(format!("Failed to decompress data from {}: {}", url, e))
        })?;

        debug!(
            "Decompressed {} bytes -> {} bytes",
            bytes.len(),
            decompressed.len()
        );
        Ok(decompressed)
    }

    /// Download `url` to `dest_path`
    ///
    /// The body is streamed into a temporary file in the destination directory
    /// and renamed into place only once complete, so an interrupted download
    /// never leaves a file that looks finished. Returns the number of bytes
    /// written.
    pub fn download_file(&self, url: &str, dest_path: &Path) -> Result<u64> {
        debug!("Downloading {} to {}", url, dest_path.display());

        let parent = dest_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(parent).map_err(|e| {
            Error::IoError(format!("Failed to create directory {}: {e}", parent.display()))
        })?;

        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::DownloadError(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::DownloadError(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let mut temp = tempfile::Builder::new()
            .prefix(".isoseed-")
            .suffix(".partial")
            .tempfile_in(parent)
            .map_err(|e| {
                Error::IoError(format!("Failed to create temp file in {}: {e}", parent.display()))
            })?;

        let mut downloaded: u64 = 0;
        let mut buffer = [0u8; STREAM_BUFFER_SIZE];
        loop {
            let bytes_read = response
                .read(&mut buffer)
                .map_err(|e| Error::DownloadError(format!("Failed to read response: {e}")))?;
            if bytes_read == 0 {
                break;
            }
            temp.write_all(&buffer[..bytes_read])
                .map_err(|e| Error::IoError(format!("Failed to write data: {e}")))?;
            downloaded += bytes_read as u64;
        }

        temp.persist(dest_path).map_err(|e| {
            Error::IoError(format!("Failed to move download to {}: {}", dest_path.display(), e))
        })?;

        debug!("Downloaded {} bytes to {}", downloaded, dest_path.display());
        Ok(downloaded)
    }
}

/// Join a repository base URL and a relative `Filename` path
pub fn join_url(base: &str, relative: &str) -> Result<String> {
    let base = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    };
    let base = url::Url::parse(&base)
        .map_err(|e| Error::ConfigError(format!("Invalid base URL '{}': {}", base, e)))?;
    let joined = base
        .join(relative.trim_start_matches("./"))
        .map_err(|e| Error::ParseError(format!("Invalid package path '{}': {}", relative, e)))?;
    Ok(joined.to_string())
}
