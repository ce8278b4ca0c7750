// src/closure/collector.rs

//! Per-seed dependency closure collection

use crate::PackageName;
use crate::index::{DependencyListing, ListingBlock, PackageIndex, choose_alternative};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

/// Everything one seed mandatorily depends on, transitively
///
/// Names are deduplicated and kept in first-occurrence order. May contain
/// virtual names; resolution happens after the merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyRecord {
    seed: PackageName,
    names: Vec<PackageName>,
}

impl DependencyRecord {
    pub fn new(seed: impl Into<PackageName>, names: Vec<PackageName>) -> Self {
        Self {
            seed: seed.into(),
            names,
        }
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    pub fn names(&self) -> &[PackageName] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn into_names(self) -> Vec<PackageName> {
        self.names
    }
}

/// Flatten a listing into the names the root mandatorily needs
///
/// Walks from the first block over hard relations and virtual providers. Of
/// each OR group only the chosen alternative is followed, so blocks the
/// listing holds for the other alternatives are not collected.
pub fn flatten_listing(listing: &DependencyListing) -> Vec<PackageName> {
    let Some(root) = listing.blocks.first() else {
        return Vec::new();
    };

    let mut blocks: HashMap<&str, &ListingBlock> = HashMap::new();
    for block in &listing.blocks {
        blocks.entry(block.name.as_str()).or_insert(block);
    }
    let satisfiable = |name: &str| blocks.get(name).is_some_and(|b| b.is_satisfiable());

    let mut seen = HashSet::new();
    let mut names = Vec::new();
    let mut queue = VecDeque::from([root.name.as_str()]);
    while let Some(name) = queue.pop_front() {
        if name.is_empty() || !seen.insert(name) {
            continue;
        }
        names.push(name.to_string());

        let Some(&block) = blocks.get(name) else {
            continue;
        };
        queue.extend(block.providers.iter().map(String::as_str));
        for group in block.hard_groups() {
            if let Some(chosen) = choose_alternative(&group, satisfiable) {
                queue.push_back(chosen);
            }
        }
    }
    names
}

/// Collect the transitive closure of `seed`
///
/// A failing query (tool missing, timeout, unknown seed) yields an empty
/// record and a warning; sibling collections are unaffected.
pub fn collect_closure(index: &dyn PackageIndex, seed: &str) -> DependencyRecord {
    match index.dependency_listing(seed) {
        Ok(listing) => {
            let names = flatten_listing(&listing);
            debug!("Closure of {} has {} names", seed, names.len());
            DependencyRecord::new(seed, names)
        }
        Err(e) => {
            warn!("Dependency collection for '{}' failed: {}", seed, e);
            DependencyRecord::new(seed, Vec::new())
        }
    }
}
