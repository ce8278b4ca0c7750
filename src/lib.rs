// src/lib.rs

//! isoseed: offline repository builder for unattended installer images
//!
//! Given a set of seed package names and an upstream package index, isoseed
//! computes the complete set of concrete packages needed to install them,
//! downloads those packages into a directory, and indexes that directory so
//! an installer can use it without network access.
//!
//! # Architecture
//!
//! ```text
//! seeds ──► Collector (parallel, one worker per seed)
//!              │
//!              ▼
//!           Aggregator (merge + dedup, barrier join)
//!              │
//!              ▼
//!           Resolver (virtual → concrete)
//!              │
//!              ▼
//!           Fetcher (best-effort, parallel downloads)
//!              │
//!              ▼
//!           Indexer (Packages + Packages.gz)
//! ```
//!
//! - Per-package failures are logged and recorded, never fatal
//! - Only index generation failure, or a run that fetched nothing, aborts
//! - Two index backends: `apt-cache` and parsed Debian `Packages` files
//! - Two package sources: `apt-get download` and direct HTTP

pub mod client;
pub mod closure;
pub mod compression;
pub mod config;
mod error;
pub mod fetch;
pub mod hash;
pub mod index;
pub mod lock;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod repo_index;
pub mod resolver;

pub use closure::{ClosureAggregator, DependencyRecord, collect_closure};
pub use config::{Config, FetchBackend, IndexBackend};
pub use error::{Error, Result};
pub use fetch::{ExistingPolicy, FetchOutcome, FetchReport, Fetcher, PackageSource};
pub use index::{PackageIndex, PackageLocation};
pub use pipeline::{Pipeline, RunReport, RunSummary};
pub use repo_index::{RepositoryIndex, build_index};
pub use resolver::{ResolvedSet, VirtualResolver};

/// An opaque package identifier, concrete or virtual
pub type PackageName = String;
