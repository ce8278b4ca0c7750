// src/index/mod.rs

//! Upstream package index query interface
//!
//! Everything downstream (virtual resolution, closure collection, HTTP
//! fetching) talks to the upstream index through [`PackageIndex`]. Two
//! backends implement it:
//!
//! - [`AptCacheIndex`]: shells out to `apt-cache`, optionally pointed at a
//!   base image's package database
//! - [`PackagesIndex`]: parsed Debian `Packages` files held in memory

mod apt_cache;
mod listing;
mod packages;

pub use apt_cache::{AptCacheIndex, DEFAULT_QUERY_TIMEOUT, parse_reverse_provides};
pub use listing::{
    DependencyListing, ListingBlock, Relation, RelationKind, choose_alternative, parse_apt_cache,
};
pub use packages::{PackageRecord, PackagesIndex};

use crate::error::Result;

/// Where a concrete package can be downloaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageLocation {
    /// Absolute URL of the `.deb`
    pub url: String,
    /// Bare file name to store it under
    pub filename: String,
    /// Expected SHA-256, when the index carries one
    pub sha256: Option<String>,
    /// Expected size in bytes, when the index carries one
    pub size: Option<u64>,
}

/// Read-only query interface over an upstream package index
///
/// Implementations must be safe to query from many worker threads at once.
pub trait PackageIndex: Send + Sync {
    /// Whether `name` has a real package record
    fn is_concrete(&self, name: &str) -> bool;

    /// Concrete packages that declare they provide `name`, deduplicated
    fn reverse_provides(&self, name: &str) -> Vec<String>;

    /// Transitive dependency listing rooted at `name`
    fn dependency_listing(&self, name: &str) -> Result<DependencyListing>;

    /// Download location for a concrete package, if this backend knows it
    fn locate(&self, _name: &str) -> Option<PackageLocation> {
        None
    }
}

impl<T: PackageIndex + ?Sized> PackageIndex for &T {
    fn is_concrete(&self, name: &str) -> bool {
        (**self).is_concrete(name)
    }

    fn reverse_provides(&self, name: &str) -> Vec<String> {
        (**self).reverse_provides(name)
    }

    fn dependency_listing(&self, name: &str) -> Result<DependencyListing> {
        (**self).dependency_listing(name)
    }

    fn locate(&self, name: &str) -> Option<PackageLocation> {
        (**self).locate(name)
    }
}

impl<T: PackageIndex + ?Sized> PackageIndex for Box<T> {
    fn is_concrete(&self, name: &str) -> bool {
        (**self).is_concrete(name)
    }

    fn reverse_provides(&self, name: &str) -> Vec<String> {
        (**self).reverse_provides(name)
    }

    fn dependency_listing(&self, name: &str) -> Result<DependencyListing> {
        (**self).dependency_listing(name)
    }

    fn locate(&self, name: &str) -> Option<PackageLocation> {
        (**self).locate(name)
    }
}
