// src/closure/mod.rs

//! Closure aggregation across seeds
//!
//! One collection per seed runs on a bounded rayon pool. All records are
//! joined before anything is merged, so the merged set does not depend on
//! which worker finished first. The merged names (plus the seeds themselves)
//! are then passed through the virtual resolver.

mod collector;

pub use collector::{DependencyRecord, collect_closure, flatten_listing};

use crate::PackageName;
use crate::error::{Error, Result};
use crate::index::PackageIndex;
use crate::resolver::{ResolvedSet, VirtualResolver};
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::info;

/// Merge seeds and per-seed records into one deduplicated set of names
pub fn merge(seeds: &[PackageName], records: &[DependencyRecord]) -> BTreeSet<PackageName> {
    seeds
        .iter()
        .cloned()
        .chain(records.iter().flat_map(|r| r.names().iter().cloned()))
        .collect()
}

/// Runs the collector over many seeds and resolves the result
pub struct ClosureAggregator<'a> {
    index: &'a dyn PackageIndex,
    jobs: usize,
}

impl<'a> ClosureAggregator<'a> {
    pub fn new(index: &'a dyn PackageIndex) -> Self {
        Self {
            index,
            jobs: default_jobs(),
        }
    }

    /// Number of concurrent collection workers (minimum 1)
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Collect every seed's closure concurrently; returns after all finish
    pub fn collect(&self, seeds: &[PackageName]) -> Result<Vec<DependencyRecord>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .thread_name(|i| format!("isoseed-collect-{i}"))
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create worker pool: {e}")))?;

        let index = self.index;
        let records = pool.install(|| {
            seeds
                .par_iter()
                .map(|seed| collect_closure(index, seed))
                .collect::<Vec<_>>()
        });
        Ok(records)
    }

    /// Compute the resolved closure of `seeds`
    pub fn aggregate(&self, seeds: &[PackageName]) -> Result<ResolvedSet> {
        self.aggregate_with_extras(seeds, &[])
    }

    /// Like [`aggregate`](Self::aggregate), plus individually requested
    /// packages that are resolved but not expanded
    pub fn aggregate_with_extras(
        &self,
        seeds: &[PackageName],
        extras: &[PackageName],
    ) -> Result<ResolvedSet> {
        let records = self.collect(seeds)?;
        let empty = records.iter().filter(|r| r.is_empty()).count();

        let mut merged = merge(seeds, &records);
        merged.extend(extras.iter().cloned());

        let resolver = VirtualResolver::new(self.index);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create worker pool: {e}")))?;
        let resolved = pool.install(|| resolver.resolve_all(&merged));

        info!(
            "Resolved {} seed(s) and {} extra(s) to {} package(s) ({} empty closure(s))",
            seeds.len(),
            extras.len(),
            resolved.len(),
            empty
        );
        Ok(resolved)
    }
}

/// Worker count default: available CPUs, at least 1
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::PackagesIndex;

    const INDEX: &str = "\
Package: curl
Depends: libcurl4, ca-certificates

Package: libcurl4
Depends: libc6

Package: libc6

Package: ca-certificates

Package: bsd-mailx
Depends: mail-transport-agent

Package: postfix
Provides: mail-transport-agent
";

    fn names(list: &[&str]) -> Vec<PackageName> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merge_dedups_and_includes_seeds() {
        let records = vec![
            DependencyRecord::new("a", names(&["a", "b"])),
            DependencyRecord::new("c", names(&["b", "d"])),
        ];
        let merged = merge(&names(&["a", "c", "z"]), &records);
        assert_eq!(merged.into_iter().collect::<Vec<_>>(), ["a", "b", "c", "d", "z"]);
    }

    #[test]
    fn test_aggregate_resolves_virtuals() {
        let index = PackagesIndex::parse(INDEX);
        let aggregator = ClosureAggregator::new(&index).with_jobs(2);
        let resolved = aggregator.aggregate(&names(&["curl", "bsd-mailx"])).unwrap();
        assert_eq!(
            resolved.into_iter().collect::<Vec<_>>(),
            ["bsd-mailx", "ca-certificates", "curl", "libc6", "libcurl4", "postfix"]
        );
    }

    #[test]
    fn test_extras_are_not_expanded() {
        let index = PackagesIndex::parse(INDEX);
        let aggregator = ClosureAggregator::new(&index);
        let resolved = aggregator
            .aggregate_with_extras(&[], &names(&["libcurl4"]))
            .unwrap();
        assert_eq!(resolved.into_iter().collect::<Vec<_>>(), ["libcurl4"]);
    }

    #[test]
    fn test_zero_jobs_is_clamped() {
        let index = PackagesIndex::parse(INDEX);
        let aggregator = ClosureAggregator::new(&index).with_jobs(0);
        assert!(aggregator.aggregate(&names(&["libc6"])).is_ok());
    }
}
