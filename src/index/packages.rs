// src/index/packages.rs

//! In-memory index built from Debian `Packages` files
//!
//! Each stanza becomes a [`PackageRecord`]. Alongside the records, a reverse
//! map from every provided name to the packages providing it answers virtual
//! lookups without any host tooling, which makes this backend usable on
//! non-Debian build hosts and in tests.

use super::{
    DependencyListing, ListingBlock, PackageIndex, PackageLocation, Relation, RelationKind,
    choose_alternative,
};
use crate::client::{HttpClient, join_url};
use crate::compression::decompress_auto;
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// OR-groups of package names; `a | b, c` is `[[a, b], [c]]`
pub type RelationGroups = Vec<Vec<String>>;

/// One package stanza
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    pub architecture: String,
    /// Path relative to the archive root (`pool/main/c/curl/...`)
    pub filename: Option<String>,
    pub size: Option<u64>,
    pub sha256: Option<String>,
    pub depends: RelationGroups,
    pub pre_depends: RelationGroups,
    pub recommends: RelationGroups,
    pub suggests: RelationGroups,
    pub conflicts: RelationGroups,
    pub breaks: RelationGroups,
    pub enhances: RelationGroups,
    pub replaces: RelationGroups,
    pub provides: Vec<String>,
}

impl PackageRecord {
    /// All relation groups tagged with their kind, hard kinds first
    fn relation_groups(&self) -> impl Iterator<Item = (RelationKind, &RelationGroups)> {
        [
            (RelationKind::PreDepends, &self.pre_depends),
            (RelationKind::Depends, &self.depends),
            (RelationKind::Recommends, &self.recommends),
            (RelationKind::Suggests, &self.suggests),
            (RelationKind::Conflicts, &self.conflicts),
            (RelationKind::Breaks, &self.breaks),
            (RelationKind::Enhances, &self.enhances),
            (RelationKind::Replaces, &self.replaces),
        ]
        .into_iter()
    }
}

/// Package name from one relation atom: `libc6:any (>= 2.34) [amd64]` -> `libc6`
fn atom_name(atom: &str) -> Option<String> {
    let name = atom.split_whitespace().next()?;
    let name = name.split('(').next().unwrap_or(name);
    let name = name.split(':').next().unwrap_or(name);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Parse a relation field into OR-groups
fn parse_relation_field(value: &str) -> RelationGroups {
    value
        .split(',')
        .map(|group| group.split('|').filter_map(atom_name).collect::<Vec<_>>())
        .filter(|group| !group.is_empty())
        .collect()
}

/// Split text into `(field, value)` lists, one per stanza
///
/// Continuation lines (leading space or tab) are appended to the previous
/// field's value.
fn split_stanzas(text: &str) -> Vec<Vec<(String, String)>> {
    let mut stanzas = Vec::new();
    let mut fields: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !fields.is_empty() {
                stanzas.push(std::mem::take(&mut fields));
            }
            continue;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = fields.last_mut() {
                value.push('\n');
                value.push_str(line.trim());
            }
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            fields.push((key.trim().to_string(), value.trim().to_string()));
        }
    }

    if !fields.is_empty() {
        stanzas.push(fields);
    }
    stanzas
}

fn record_from_fields(fields: &[(String, String)]) -> Option<PackageRecord> {
    let mut record = PackageRecord::default();

    for (key, value) in fields {
        match key.as_str() {
            "Package" => record.name = value.clone(),
            "Version" => record.version = value.clone(),
            "Architecture" => record.architecture = value.clone(),
            "Filename" => record.filename = Some(value.clone()),
            "Size" => record.size = value.parse().ok(),
            "SHA256" => record.sha256 = Some(value.clone()),
            "Depends" => record.depends = parse_relation_field(value),
            "Pre-Depends" => record.pre_depends = parse_relation_field(value),
            "Recommends" => record.recommends = parse_relation_field(value),
            "Suggests" => record.suggests = parse_relation_field(value),
            "Conflicts" => record.conflicts = parse_relation_field(value),
            "Breaks" => record.breaks = parse_relation_field(value),
            "Enhances" => record.enhances = parse_relation_field(value),
            "Replaces" => record.replaces = parse_relation_field(value),
            "Provides" => {
                record.provides = parse_relation_field(value).into_iter().flatten().collect()
            }
            _ => {}
        }
    }

    if record.name.is_empty() {
        None
    } else {
        Some(record)
    }
}

/// Package index parsed from one or more `Packages` files
#[derive(Debug, Clone, Default)]
pub struct PackagesIndex {
    records: BTreeMap<String, PackageRecord>,
    providers: BTreeMap<String, BTreeSet<String>>,
    base_url: Option<String>,
}

impl PackagesIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a single `Packages` text
    pub fn parse(text: &str) -> Self {
        let mut index = Self::new();
        index.add_packages_text(text);
        index
    }

    /// Base URL that `Filename` paths are relative to
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Merge another `Packages` text into this index
    ///
    /// When a name appears more than once, the first record seen is kept, so
    /// sources listed earlier take precedence. Returns the number of records
    /// added.
    pub fn add_packages_text(&mut self, text: &str) -> usize {
        let mut added = 0;
        for fields in split_stanzas(text) {
            match record_from_fields(&fields) {
                Some(record) => {
                    if self.insert(record) {
                        added += 1;
                    }
                }
                None => debug!("Skipping stanza without a Package field"),
            }
        }
        added
    }

    /// Insert one record; returns false if the name was already present
    pub fn insert(&mut self, record: PackageRecord) -> bool {
        if self.records.contains_key(&record.name) {
            return false;
        }
        for provided in &record.provides {
            self.providers
                .entry(provided.clone())
                .or_default()
                .insert(record.name.clone());
        }
        self.records.insert(record.name.clone(), record);
        true
    }

    /// Load and merge `Packages` files from local paths or URLs
    ///
    /// Compressed sources are detected by magic bytes. A source that fails to
    /// load is logged and skipped; an index that ends up empty is an error.
    pub fn load(sources: &[String], base_url: Option<&str>, client: &HttpClient) -> Result<Self> {
        let mut index = Self::new();
        if let Some(base) = base_url {
            index.base_url = Some(base.to_string());
        }

        for source in sources {
            match read_source(source, client) {
                Ok(text) => {
                    let added = index.add_packages_text(&text);
                    info!("Loaded {} package records from {}", added, source);
                }
                Err(e) => warn!("Skipping package index source {}: {}", source, e),
            }
        }

        if index.is_empty() {
            return Err(Error::InitError(format!(
                "No package records could be loaded from {} source(s)",
                sources.len()
            )));
        }
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.records.get(name)
    }

    /// A concrete package, or a virtual name with at least one provider
    fn is_satisfiable(&self, name: &str) -> bool {
        self.is_concrete(name) || self.providers.get(name).is_some_and(|p| !p.is_empty())
    }

    /// Build the listing block for one name and queue its onward targets
    ///
    /// Virtual names queue every provider. Of each hard OR group only the
    /// first satisfiable alternative is queued (the first one if none is).
    fn block_for(&self, name: &str, queue: &mut VecDeque<String>) -> ListingBlock {
        let Some(record) = self.records.get(name) else {
            let mut block = ListingBlock::new(name, true);
            block.providers = self.reverse_provides(name);
            queue.extend(block.providers.iter().cloned());
            return block;
        };

        let mut block = ListingBlock::new(name, false);
        for (kind, groups) in record.relation_groups() {
            for group in groups {
                for (i, target) in group.iter().enumerate() {
                    block.relations.push(if i == 0 {
                        Relation::new(kind, target.clone())
                    } else {
                        Relation::alternative(kind, target.clone())
                    });
                }
                if kind.is_hard() {
                    let members: Vec<&str> = group.iter().map(String::as_str).collect();
                    if let Some(chosen) = choose_alternative(&members, |n| self.is_satisfiable(n)) {
                        queue.push_back(chosen.to_string());
                    }
                }
            }
        }
        block
    }
}

fn read_source(source: &str, client: &HttpClient) -> Result<String> {
    let bytes = if source.starts_with("http://") || source.starts_with("https://") {
        client.fetch_and_decompress(source)?
    } else {
        let raw = fs::read(Path::new(source))
            .map_err(|e| Error::IoError(format!("Failed to read {}: {}", source, e)))?;
        decompress_auto(&raw)
            .map_err(|e| Error::ParseError(format!("Failed to decompress {}: {}", source, e)))?
    };
    String::from_utf8(bytes)
        .map_err(|e| Error::ParseError(format!("Invalid UTF-8 in {}: {}", source, e)))
}

impl PackageIndex for PackagesIndex {
    fn is_concrete(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    fn reverse_provides(&self, name: &str) -> Vec<String> {
        self.providers
            .get(name)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn dependency_listing(&self, name: &str) -> Result<DependencyListing> {
        if !self.is_concrete(name) && !self.providers.contains_key(name) {
            return Err(Error::NotFoundError(format!(
                "Package '{}' is not in the package index",
                name
            )));
        }

        let mut listing = DependencyListing::default();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([name.to_string()]);

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let block = self.block_for(&current, &mut queue);
            listing.blocks.push(block);
        }

        debug!("Listing for {} has {} blocks", name, listing.blocks.len());
        Ok(listing)
    }

    fn locate(&self, name: &str) -> Option<PackageLocation> {
        let record = self.records.get(name)?;
        let relative = record.filename.as_ref()?;
        let url = match &self.base_url {
            Some(base) => join_url(base, relative).ok()?,
            None if relative.contains("://") => relative.clone(),
            None => return None,
        };
        let filename = relative.rsplit('/').next().unwrap_or(relative).to_string();

        Some(PackageLocation {
            url,
            filename,
            sha256: record.sha256.clone(),
            size: record.size,
        })
    }
}
