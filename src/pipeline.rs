// src/pipeline.rs

//! End-to-end repository assembly
//!
//! seeds -> closure aggregation -> virtual resolution -> fetch -> index
//!
//! Each stage only consumes the previous stage's output. Per-package problems
//! are logged and carried in the report; the run as a whole fails only when
//! nothing could be fetched or the index cannot be written.

use crate::PackageName;
use crate::client::HttpClient;
use crate::closure::ClosureAggregator;
use crate::config::{Config, FetchBackend, IndexBackend};
use crate::error::{Error, Result};
use crate::fetch::{AptGetSource, ExistingPolicy, FetchReport, Fetcher, HttpSource, PackageSource};
use crate::index::{AptCacheIndex, PackageIndex, PackagesIndex};
use crate::repo_index::{PACKAGES_FILE, build_index};
use crate::resolver::ResolvedSet;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Construct the configured upstream index backend
pub fn open_index(config: &Config, client: &HttpClient) -> Result<Box<dyn PackageIndex>> {
    match config.index.backend {
        IndexBackend::AptCache => {
            let mut index = AptCacheIndex::new().with_timeout(config.query_timeout());
            if let Some(root) = &config.index.root {
                index = index.with_root(root);
            }
            for option in &config.index.apt_options {
                index = index.with_option(option.clone());
            }
            Ok(Box::new(index))
        }
        IndexBackend::Packages => {
            let index = PackagesIndex::load(
                &config.index.sources,
                config.index.base_url.as_deref(),
                client,
            )?;
            info!("Package index holds {} records", index.len());
            Ok(Box::new(index))
        }
    }
}

/// Construct the configured package source
pub fn open_source<'a>(
    config: &Config,
    index: &'a dyn PackageIndex,
    client: &HttpClient,
) -> Box<dyn PackageSource + 'a> {
    match config.fetch.backend {
        FetchBackend::AptGet => {
            let mut source = AptGetSource::new().with_timeout(config.download_timeout());
            if let Some(root) = &config.index.root {
                source = source.with_root(root);
            }
            for option in &config.index.apt_options {
                source = source.with_option(option.clone());
            }
            Box::new(source)
        }
        FetchBackend::Http => Box::new(HttpSource::new(index, client.clone())),
    }
}

/// End-of-run counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Distinct seeds plus extra packages asked for
    pub requested: usize,
    /// Concrete packages after closure and virtual resolution
    pub resolved: usize,
    /// Downloaded plus skipped
    pub fetched: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failed_packages: Vec<PackageName>,
    pub index_entries: usize,
    pub index_path: PathBuf,
    pub generated_at: String,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Requested: {}", self.requested)?;
        writeln!(f, "Resolved:  {}", self.resolved)?;
        writeln!(
            f,
            "Fetched:   {} ({} downloaded, {} already present)",
            self.fetched, self.downloaded, self.skipped
        )?;
        writeln!(f, "Failed:    {}", self.failed)?;
        for name in &self.failed_packages {
            writeln!(f, "  - {}", name)?;
        }
        write!(
            f,
            "Index:     {} ({} entries)",
            self.index_path.display(),
            self.index_entries
        )
    }
}

/// Summary plus every per-package outcome
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub summary: RunSummary,
    pub outcomes: FetchReport,
}

impl RunReport {
    /// No package ended up in the index
    pub fn is_empty(&self) -> bool {
        self.summary.index_entries == 0
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::IoError(format!("Failed to serialize report: {}", e)))?;
        fs::write(path, json).map_err(|e| {
            Error::IoError(format!("Failed to write report {}: {}", path.display(), e))
        })
    }
}

/// The assembled stages for one run
pub struct Pipeline<'a> {
    index: &'a dyn PackageIndex,
    source: &'a dyn PackageSource,
    jobs: usize,
    parallel_downloads: usize,
    retries: u32,
    existing: ExistingPolicy,
    progress: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(index: &'a dyn PackageIndex, source: &'a dyn PackageSource) -> Self {
        let defaults = Config::default();
        Self {
            index,
            source,
            jobs: defaults.effective_jobs(),
            parallel_downloads: defaults.parallel_downloads,
            retries: defaults.retries,
            existing: defaults.existing,
            progress: false,
        }
    }

    /// Take worker counts, retries and the existing-file policy from `config`
    pub fn with_config(mut self, config: &Config) -> Self {
        self.jobs = config.effective_jobs();
        self.parallel_downloads = config.parallel_downloads;
        self.retries = config.retries;
        self.existing = config.existing;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_parallel_downloads(mut self, parallel: usize) -> Self {
        self.parallel_downloads = parallel.max(1);
        self
    }

    pub fn with_existing(mut self, existing: ExistingPolicy) -> Self {
        self.existing = existing;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Closure plus virtual resolution, without touching the filesystem
    pub fn resolve(&self, seeds: &[PackageName], extras: &[PackageName]) -> Result<ResolvedSet> {
        ClosureAggregator::new(self.index)
            .with_jobs(self.jobs)
            .aggregate_with_extras(seeds, extras)
    }

    /// Resolve and download into `destination`
    pub fn fetch(
        &self,
        seeds: &[PackageName],
        extras: &[PackageName],
        destination: &Path,
    ) -> Result<(ResolvedSet, FetchReport)> {
        let resolved = self.resolve(seeds, extras)?;
        let report = Fetcher::new(self.source)
            .with_parallel(self.parallel_downloads)
            .with_retries(self.retries)
            .with_existing(self.existing)
            .with_progress(self.progress)
            .fetch_all(&resolved, destination)?;
        Ok((resolved, report))
    }

    /// Run every stage and return the report, even for an empty repository
    ///
    /// Nothing is indexed when no package could be fetched; the report then
    /// says so through [`RunReport::is_empty`]. Failing to write the index is
    /// still an [`Error::IndexError`].
    pub fn execute(
        &self,
        seeds: &[PackageName],
        extras: &[PackageName],
        destination: &Path,
    ) -> Result<RunReport> {
        let (resolved, outcomes) = self.fetch(seeds, extras, destination)?;

        let (index_entries, index_path) = if outcomes.succeeded() == 0 {
            warn!("Nothing was fetched into {}, not indexing", destination.display());
            (0, destination.join(PACKAGES_FILE))
        } else {
            let index = build_index(destination)?;
            (index.len(), index.packages_path)
        };

        let requested: BTreeSet<&PackageName> = seeds.iter().chain(extras).collect();
        let summary = RunSummary {
            requested: requested.len(),
            resolved: resolved.len(),
            fetched: outcomes.succeeded(),
            downloaded: outcomes.downloaded(),
            skipped: outcomes.skipped(),
            failed: outcomes.failed(),
            failed_packages: outcomes.failed_names(),
            index_entries,
            index_path,
            generated_at: Utc::now().to_rfc3339(),
        };
        info!(
            "Run finished: {} fetched, {} failed, {} indexed",
            summary.fetched, summary.failed, summary.index_entries
        );

        Ok(RunReport { summary, outcomes })
    }

    /// Run every stage and index the result
    ///
    /// Fails with [`Error::EmptyRepository`] when no package could be
    /// fetched or indexed, and with [`Error::IndexError`] when the index
    /// cannot be written. Use [`execute`](Self::execute) to get the report
    /// on the empty path as well.
    pub fn run(
        &self,
        seeds: &[PackageName],
        extras: &[PackageName],
        destination: &Path,
    ) -> Result<RunReport> {
        let report = self.execute(seeds, extras, destination)?;
        if report.is_empty() {
            return Err(Error::EmptyRepository(destination.to_path_buf()));
        }
        Ok(report)
    }
}
