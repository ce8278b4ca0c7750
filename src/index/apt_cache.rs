// src/index/apt_cache.rs

//! `apt-cache` backed package index
//!
//! Each query runs `apt-cache` as a subprocess under a timeout. Pointing it
//! at a base image's package database is done with apt configuration
//! overrides, e.g. `-o Dir=/mnt/image` or `-o Dir::State::Lists=...`.

use super::{DependencyListing, PackageIndex, parse_apt_cache};
use crate::error::{Error, Result};
use crate::process::run_with_timeout;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-query timeout
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(120);

/// Relation kinds `apt-cache depends` is told to leave out
const EXCLUDED_KINDS: &[&str] = &[
    "--no-recommends",
    "--no-suggests",
    "--no-conflicts",
    "--no-breaks",
    "--no-replaces",
    "--no-enhances",
];

/// Package index answered by the host's `apt-cache`
#[derive(Debug, Clone)]
pub struct AptCacheIndex {
    program: String,
    options: Vec<String>,
    timeout: Duration,
}

impl Default for AptCacheIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl AptCacheIndex {
    pub fn new() -> Self {
        Self {
            program: "apt-cache".to_string(),
            options: Vec::new(),
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Query the package database rooted at `root` instead of the host's
    pub fn with_root(self, root: &Path) -> Self {
        self.with_option(format!("Dir={}", root.display()))
    }

    /// Add an apt configuration override (`Key=Value`)
    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.push("-o".to_string());
        self.options.push(option.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a different executable (tests, wrappers)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn query(&self, subcommand: &[&str], name: &str) -> Result<String> {
        let mut args = self.options.clone();
        args.extend(subcommand.iter().map(|s| s.to_string()));
        args.push(name.to_string());

        let output = run_with_timeout(&self.program, &args, None, self.timeout)?;
        if !output.success {
            return Err(Error::CommandFailed(format!(
                "{} {} {} exited with {}: {}",
                self.program,
                subcommand.join(" "),
                name,
                output.status_code.unwrap_or(-1),
                output.stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

/// Provider names from `apt-cache showpkg` output
///
/// Reads the lines after `Reverse Provides:` up to the next blank line; the
/// first token of each is the providing package.
pub fn parse_reverse_provides(text: &str) -> Vec<String> {
    let mut providers = BTreeSet::new();
    let mut in_section = false;

    for line in text.lines() {
        if in_section {
            if line.trim().is_empty() {
                break;
            }
            if let Some(name) = line.split_whitespace().next() {
                providers.insert(name.to_string());
            }
        } else if line.starts_with("Reverse Provides:") {
            in_section = true;
        }
    }

    providers.into_iter().collect()
}

impl PackageIndex for AptCacheIndex {
    fn is_concrete(&self, name: &str) -> bool {
        match self.query(&["show", "--no-all-versions"], name) {
            Ok(stdout) => stdout.lines().any(|l| l.starts_with("Package:")),
            Err(e) => {
                debug!("apt-cache show {} failed: {}", name, e);
                false
            }
        }
    }

    fn reverse_provides(&self, name: &str) -> Vec<String> {
        match self.query(&["showpkg"], name) {
            Ok(stdout) => parse_reverse_provides(&stdout),
            Err(e) => {
                warn!("Reverse-provides lookup for {} failed: {}", name, e);
                Vec::new()
            }
        }
    }

    fn dependency_listing(&self, name: &str) -> Result<DependencyListing> {
        let mut subcommand = vec!["depends", "--recurse"];
        subcommand.extend_from_slice(EXCLUDED_KINDS);

        let stdout = self.query(&subcommand, name)?;
        let listing = parse_apt_cache(&stdout);
        if listing.is_empty() {
            return Err(Error::NotFoundError(format!(
                "apt-cache returned no dependency information for '{}'",
                name
            )));
        }
        Ok(listing)
    }
}
