// src/config.rs
//! isoseed configuration
//!
//! Loaded from a TOML file (default `/etc/isoseed/isoseed.toml`); every field
//! is optional. Command-line flags are applied on top through the `with_*`
//! setters.
//!
//! ```toml
//! seeds = ["openssh-server", "sudo", "curl"]
//! extra_packages = ["grub-efi-amd64-signed"]
//! destination = "/srv/isoseed/repo"
//! parallel_downloads = 8
//! existing = "skip"
//!
//! [index]
//! backend = "packages"
//! sources = ["http://deb.debian.org/debian/dists/bookworm/main/binary-amd64/Packages.xz"]
//! base_url = "http://deb.debian.org/debian"
//!
//! [fetch]
//! backend = "http"
//! ```

use crate::closure::default_jobs;
use crate::error::{Error, Result};
use crate::fetch::{DEFAULT_PARALLEL_DOWNLOADS, ExistingPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/isoseed/isoseed.toml";

/// Top-level packages an unattended server install is expected to carry
pub const DEFAULT_SEEDS: &[&str] = &[
    "openssh-server",
    "sudo",
    "curl",
    "ca-certificates",
    "vim",
];

/// Upstream index backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexBackend {
    /// Query the host's `apt-cache`
    #[default]
    AptCache,
    /// Parse Debian `Packages` files
    Packages,
}

/// Package download backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchBackend {
    /// `apt-get download`
    #[default]
    AptGet,
    /// Direct HTTP from the index's `Filename` URLs
    Http,
}

/// `[index]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub backend: IndexBackend,

    /// Root of a base image whose package database apt should use
    pub root: Option<PathBuf>,

    /// Extra `-o Key=Value` overrides for apt-cache / apt-get
    pub apt_options: Vec<String>,

    /// `Packages` files (paths or URLs) for the packages backend
    pub sources: Vec<String>,

    /// Archive root that `Filename` paths are relative to
    pub base_url: Option<String>,
}

/// `[fetch]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub backend: FetchBackend,
}

/// Complete run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Packages whose full dependency closure is included
    pub seeds: Vec<String>,

    /// Individually requested packages (no closure expansion)
    pub extra_packages: Vec<String>,

    /// Output repository directory
    pub destination: PathBuf,

    /// Concurrent closure collections (0 = number of CPUs)
    pub jobs: usize,

    /// Concurrent downloads
    pub parallel_downloads: usize,

    /// Timeout for one index query
    pub query_timeout_secs: u64,

    /// Timeout for one package download
    pub download_timeout_secs: u64,

    /// Extra attempts after a failed download
    pub retries: u32,

    /// What to do with packages already in the destination
    pub existing: ExistingPolicy,

    pub index: IndexConfig,

    pub fetch: FetchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seeds: DEFAULT_SEEDS.iter().map(|s| s.to_string()).collect(),
            extra_packages: Vec::new(),
            destination: PathBuf::from("repo"),
            jobs: 0,
            parallel_downloads: DEFAULT_PARALLEL_DOWNLOADS,
            query_timeout_secs: 120,
            download_timeout_secs: 600,
            retries: 0,
            existing: ExistingPolicy::Skip,
            index: IndexConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    ///
    /// Only syntax and field types are checked here. Call [`validate`](Self::validate)
    /// once command-line overrides have been applied.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            Error::ConfigError(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Parse TOML text without validating it
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Load `path` if given, else the default file if it exists, else defaults
    ///
    /// An explicitly given path must exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.seeds.is_empty() && self.extra_packages.is_empty() {
            return Err(Error::ConfigError(
                "Nothing to do: no seeds and no extra packages".to_string(),
            ));
        }
        if let Some(bad) = self
            .seeds
            .iter()
            .chain(&self.extra_packages)
            .find(|n| n.trim().is_empty() || n.contains(char::is_whitespace))
        {
            return Err(Error::ConfigError(format!("Invalid package name '{}'", bad)));
        }
        if self.parallel_downloads == 0 {
            return Err(Error::ConfigError("parallel_downloads must be at least 1".to_string()));
        }
        if self.query_timeout_secs == 0 || self.download_timeout_secs == 0 {
            return Err(Error::ConfigError("timeouts must be at least 1 second".to_string()));
        }
        if self.destination.as_os_str().is_empty() {
            return Err(Error::ConfigError("destination must not be empty".to_string()));
        }

        if self.index.backend == IndexBackend::Packages && self.index.sources.is_empty() {
            return Err(Error::ConfigError(
                "index.backend = \"packages\" requires index.sources".to_string(),
            ));
        }
        if self.fetch.backend == FetchBackend::Http {
            if self.index.backend != IndexBackend::Packages {
                return Err(Error::ConfigError(
                    "fetch.backend = \"http\" requires index.backend = \"packages\"".to_string(),
                ));
            }
            if let Some(base) = &self.index.base_url {
                url::Url::parse(base).map_err(|e| {
                    Error::ConfigError(format!("Invalid index.base_url '{}': {}", base, e))
                })?;
            } else {
                return Err(Error::ConfigError(
                    "fetch.backend = \"http\" requires index.base_url".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Replace the seed list
    pub fn with_seeds(mut self, seeds: Vec<String>) -> Self {
        self.seeds = seeds;
        self
    }

    /// Add individually requested packages
    pub fn with_extra_packages(mut self, extras: Vec<String>) -> Self {
        self.extra_packages.extend(extras);
        self
    }

    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_parallel_downloads(mut self, parallel: usize) -> Self {
        self.parallel_downloads = parallel;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_existing(mut self, existing: ExistingPolicy) -> Self {
        self.existing = existing;
        self
    }

    pub fn with_index_backend(mut self, backend: IndexBackend) -> Self {
        self.index.backend = backend;
        self
    }

    pub fn with_fetch_backend(mut self, backend: FetchBackend) -> Self {
        self.fetch.backend = backend;
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.index.root = Some(root.into());
        self
    }

    /// Effective collection worker count
    pub fn effective_jobs(&self) -> usize {
        if self.jobs == 0 {
            default_jobs()
        } else {
            self.jobs
        }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}
