// src/fetch/mod.rs

//! Best-effort batch package fetching
//!
//! Every resolved name gets its own download attempt (plus an optional,
//! bounded number of retries). A failure is recorded in the [`FetchReport`]
//! and the batch carries on; only setup problems such as an unwritable
//! destination abort the whole call.
//!
//! Where the bytes come from is a [`PackageSource`]:
//! - [`AptGetSource`]: `apt-get download` on the host
//! - [`HttpSource`]: direct HTTP using the index's `Filename` and `SHA256`

mod apt_get;
mod http;

pub use apt_get::AptGetSource;
pub use http::HttpSource;

use crate::PackageName;
use crate::error::{Error, Result};
use crate::progress::{self, ProgressTracker, SilentProgress};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default number of concurrent downloads
pub const DEFAULT_PARALLEL_DOWNLOADS: usize = 4;

/// Retry delay in milliseconds, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 1000;

/// What happened to one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum FetchOutcome {
    /// Fetched during this run
    Downloaded(PathBuf),
    /// Already present and kept
    Skipped(PathBuf),
    /// Every attempt failed
    Failed(String),
}

impl FetchOutcome {
    /// Downloaded or skipped: an artifact for this name is in place
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Downloaded(p) | Self::Skipped(p) => Some(p),
            Self::Failed(_) => None,
        }
    }
}

/// Per-package outcomes of one `fetch_all` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FetchReport {
    outcomes: BTreeMap<PackageName, FetchOutcome>,
}

impl FetchReport {
    pub fn insert(&mut self, name: PackageName, outcome: FetchOutcome) {
        self.outcomes.insert(name, outcome);
    }

    pub fn get(&self, name: &str) -> Option<&FetchOutcome> {
        self.outcomes.get(name)
    }

    pub fn outcomes(&self) -> &BTreeMap<PackageName, FetchOutcome> {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, FetchOutcome::Downloaded(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FetchOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FetchOutcome::Failed(_)))
    }

    /// Downloaded plus skipped
    pub fn succeeded(&self) -> usize {
        self.count(FetchOutcome::is_success)
    }

    /// Names whose fetch failed, in lexicographic order
    pub fn failed_names(&self) -> Vec<PackageName> {
        self.outcomes
            .iter()
            .filter(|(_, o)| !o.is_success())
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn count(&self, pred: impl Fn(&FetchOutcome) -> bool) -> usize {
        self.outcomes.values().filter(|o| pred(o)).count()
    }
}

/// Handling of artifacts already in the destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingPolicy {
    /// Keep the existing file and report `Skipped`
    #[default]
    Skip,
    /// Fetch again and replace it
    Overwrite,
}

impl FromStr for ExistingPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "overwrite" => Ok(Self::Overwrite),
            other => Err(Error::ConfigError(format!(
                "Unknown existing-file policy '{}' (expected 'skip' or 'overwrite')",
                other
            ))),
        }
    }
}

impl fmt::Display for ExistingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => f.write_str("skip"),
            Self::Overwrite => f.write_str("overwrite"),
        }
    }
}

/// Something that can place a package's `.deb` into a directory
pub trait PackageSource: Send + Sync {
    /// Short label for logs
    fn name(&self) -> &str;

    /// Fetch `package` into `dest`, returning the final file path
    ///
    /// Implementations must not leave a partially written `.deb` behind.
    fn fetch(&self, package: &str, dest: &Path) -> Result<PathBuf>;
}

/// Artifacts in `dest` belonging to `package` (`{package}_*.deb`), sorted
pub fn existing_artifacts(dest: &Path, package: &str) -> Vec<PathBuf> {
    let prefix = format!("{}_", package);
    let Ok(entries) = fs::read_dir(dest) else {
        return Vec::new();
    };

    let mut found: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".deb"))
        })
        .collect();
    found.sort();
    found
}

/// First existing artifact for `package`, if any
pub fn find_existing(dest: &Path, package: &str) -> Option<PathBuf> {
    existing_artifacts(dest, package).into_iter().next()
}

/// Downloads a set of packages through one source
pub struct Fetcher<'a> {
    source: &'a dyn PackageSource,
    parallel: usize,
    retries: u32,
    existing: ExistingPolicy,
    show_progress: bool,
}

impl<'a> Fetcher<'a> {
    pub fn new(source: &'a dyn PackageSource) -> Self {
        Self {
            source,
            parallel: DEFAULT_PARALLEL_DOWNLOADS,
            retries: 0,
            existing: ExistingPolicy::default(),
            show_progress: false,
        }
    }

    /// Maximum concurrent downloads (minimum 1)
    pub fn with_parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel.max(1);
        self
    }

    /// Extra attempts after a failed one
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_existing(mut self, existing: ExistingPolicy) -> Self {
        self.existing = existing;
        self
    }

    /// Show a progress bar (or log lines when not on a terminal)
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Fetch every name into `dest`
    ///
    /// Returns one outcome per distinct name. Per-package failures are
    /// recorded, not returned.
    pub fn fetch_all<'n, I>(&self, names: I, dest: &Path) -> Result<FetchReport>
    where
        I: IntoIterator<Item = &'n PackageName>,
    {
        fs::create_dir_all(dest).map_err(|e| {
            Error::IoError(format!("Failed to create destination {}: {}", dest.display(), e))
        })?;

        let mut names: Vec<&PackageName> = names.into_iter().collect();
        names.sort();
        names.dedup();

        info!(
            "Fetching {} package(s) into {} via {} ({} parallel)",
            names.len(),
            dest.display(),
            self.source.name(),
            self.parallel
        );

        let tracker: Box<dyn ProgressTracker> = if self.show_progress {
            progress::for_terminal("Fetching", names.len() as u64)
        } else {
            Box::new(SilentProgress::new())
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallel)
            .thread_name(|i| format!("isoseed-fetch-{i}"))
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create download pool: {e}")))?;

        let results: Vec<(PackageName, FetchOutcome)> = pool.install(|| {
            names
                .par_iter()
                .map(|name| {
                    tracker.set_message(name);
                    let outcome = self.fetch_one(name, dest);
                    tracker.increment(1);
                    ((*name).clone(), outcome)
                })
                .collect()
        });

        let mut report = FetchReport::default();
        for (name, outcome) in results {
            report.insert(name, outcome);
        }

        let summary = format!(
            "{} downloaded, {} skipped, {} failed",
            report.downloaded(),
            report.skipped(),
            report.failed()
        );
        if report.failed() > 0 {
            tracker.finish_with_error(&summary);
        } else {
            tracker.finish_with_message(&summary);
        }

        Ok(report)
    }

    fn fetch_one(&self, name: &str, dest: &Path) -> FetchOutcome {
        let previous = existing_artifacts(dest, name);
        if self.existing == ExistingPolicy::Skip {
            if let Some(path) = previous.first() {
                info!("Skipping {}: already present as {}", name, path.display());
                return FetchOutcome::Skipped(path.clone());
            }
        }

        let attempts = self.retries + 1;
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.source.fetch(name, dest) {
                Ok(path) => {
                    // Drop other versions an overwrite left behind
                    for stale in previous.iter().filter(|p| **p != path) {
                        if let Err(e) = fs::remove_file(stale) {
                            debug!("Could not remove stale {}: {}", stale.display(), e);
                        }
                    }
                    info!("Downloaded {} -> {}", name, path.display());
                    return FetchOutcome::Downloaded(path);
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < attempts {
                        warn!(
                            "Fetch attempt {}/{} for {} failed: {}, retrying...",
                            attempt, attempts, name, e
                        );
                        std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                    }
                }
            }
        }

        warn!("Failed to fetch {}: {}", name, last_error);
        FetchOutcome::Failed(last_error)
    }
}
