// src/resolver/mod.rs

//! Virtual package resolution
//!
//! Maps a name that may be virtual to the concrete packages that can satisfy
//! it. Resolution is best-effort: a virtual name nobody provides is passed
//! through unchanged with a warning, and the fetch stage records the eventual
//! failure.

use crate::PackageName;
use crate::index::PackageIndex;
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Deduplicated set of concrete package names, ordered lexicographically
pub type ResolvedSet = BTreeSet<PackageName>;

/// Resolves virtual names against a package index
#[derive(Clone, Copy)]
pub struct VirtualResolver<'a> {
    index: &'a dyn PackageIndex,
}

impl<'a> VirtualResolver<'a> {
    pub fn new(index: &'a dyn PackageIndex) -> Self {
        Self { index }
    }

    /// Resolve one name
    ///
    /// - concrete: `{name}`
    /// - virtual with providers: every provider
    /// - otherwise: `{name}` unchanged
    ///
    /// The result is never empty.
    pub fn resolve(&self, name: &str) -> ResolvedSet {
        if self.index.is_concrete(name) {
            return BTreeSet::from([name.to_string()]);
        }

        let providers: ResolvedSet = self.index.reverse_provides(name).into_iter().collect();
        if providers.is_empty() {
            warn!("No concrete package provides '{}', keeping it as-is", name);
            return BTreeSet::from([name.to_string()]);
        }

        debug!("Resolved virtual '{}' to {:?}", name, providers);
        providers
    }

    /// Resolve every name and union the results
    pub fn resolve_all<'n, I>(&self, names: I) -> ResolvedSet
    where
        I: IntoIterator<Item = &'n PackageName>,
    {
        let names: Vec<&PackageName> = names.into_iter().collect();
        names
            .par_iter()
            .map(|name| self.resolve(name))
            .reduce(BTreeSet::new, |mut acc, set| {
                acc.extend(set);
                acc
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::PackagesIndex;

    fn index() -> PackagesIndex {
        PackagesIndex::parse(
            "\
Package: postfix
Provides: mail-transport-agent

Package: exim4-daemon-light
Provides: mail-transport-agent

Package: curl
",
        )
    }

    #[test]
    fn test_concrete_resolves_to_itself() {
        let index = index();
        let resolver = VirtualResolver::new(&index);
        assert_eq!(resolver.resolve("curl"), BTreeSet::from(["curl".to_string()]));
    }

    #[test]
    fn test_virtual_resolves_to_providers() {
        let index = index();
        let resolver = VirtualResolver::new(&index);
        let resolved = resolver.resolve("mail-transport-agent");
        assert_eq!(
            resolved.into_iter().collect::<Vec<_>>(),
            ["exim4-daemon-light", "postfix"]
        );
    }

    #[test]
    fn test_unknown_passes_through() {
        let index = index();
        let resolver = VirtualResolver::new(&index);
        assert_eq!(
            resolver.resolve("no-such-thing"),
            BTreeSet::from(["no-such-thing".to_string()])
        );
    }

    #[test]
    fn test_resolve_all_collapses_duplicates() {
        let index = index();
        let resolver = VirtualResolver::new(&index);
        let names = vec![
            "mail-transport-agent".to_string(),
            "postfix".to_string(),
            "curl".to_string(),
        ];
        let resolved = resolver.resolve_all(&names);
        assert_eq!(
            resolved.into_iter().collect::<Vec<_>>(),
            ["curl", "exim4-daemon-light", "postfix"]
        );
    }

    #[test]
    fn test_never_empty() {
        let index = PackagesIndex::new();
        let resolver = VirtualResolver::new(&index);
        for name in ["a", "b", ""] {
            assert!(!resolver.resolve(name).is_empty());
        }
    }
}
