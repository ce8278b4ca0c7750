// src/index/listing.rs

//! Structured transitive-dependency listings
//!
//! The shape mirrors what `apt-cache depends --recurse` prints: one block per
//! package reached, each with its relation lines. A block for a virtual name
//! has its name wrapped in angle brackets. Within a block, `|` in front of a
//! relation means the *following* relation is an alternative for it:
//!
//! ```text
//! curl
//!   Depends: libcurl4
//!  |Depends: ca-certificates
//!   Depends: openssl
//!   Depends: <mail-transport-agent>
//!     postfix
//!     exim4-daemon-light
//!   Recommends: publicsuffix
//! <mail-transport-agent>
//! ```
//!
//! Here `openssl` is an alternative to `ca-certificates`. The deeper indented
//! lines under a relation on a virtual name list that name's providers; they
//! are attached to the virtual name's block.
//!
//! Of each hard OR group only one member is followed: the first that some
//! package can satisfy (see [`choose_alternative`]).

use std::collections::BTreeMap;
use std::fmt;

/// Relationship kind of one listing line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    Depends,
    PreDepends,
    Recommends,
    Suggests,
    Conflicts,
    Breaks,
    Enhances,
    Replaces,
    /// Any label this parser does not recognise
    Other,
}

impl RelationKind {
    /// Parse an apt-cache or control-file label
    pub fn parse(label: &str) -> Self {
        match label.trim() {
            "Depends" => Self::Depends,
            "PreDepends" | "Pre-Depends" => Self::PreDepends,
            "Recommends" => Self::Recommends,
            "Suggests" => Self::Suggests,
            "Conflicts" => Self::Conflicts,
            "Breaks" => Self::Breaks,
            "Enhances" => Self::Enhances,
            "Replaces" => Self::Replaces,
            _ => Self::Other,
        }
    }

    /// Whether installation requires this relation to be satisfied
    pub fn is_hard(&self) -> bool {
        matches!(self, Self::Depends | Self::PreDepends)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Depends => "Depends",
            Self::PreDepends => "PreDepends",
            Self::Recommends => "Recommends",
            Self::Suggests => "Suggests",
            Self::Conflicts => "Conflicts",
            Self::Breaks => "Breaks",
            Self::Enhances => "Enhances",
            Self::Replaces => "Replaces",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One relation line inside a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub kind: RelationKind,
    pub target: String,
    /// Second or later member of an `a | b` group
    pub alternative: bool,
}

impl Relation {
    pub fn new(kind: RelationKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            alternative: false,
        }
    }

    pub fn alternative(kind: RelationKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            alternative: true,
        }
    }

}

/// All relations of one package reached by the traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingBlock {
    pub name: String,
    pub is_virtual: bool,
    pub relations: Vec<Relation>,
    /// Concrete packages providing a virtual name
    pub providers: Vec<String>,
}

impl ListingBlock {
    pub fn new(name: impl Into<String>, is_virtual: bool) -> Self {
        Self {
            name: name.into(),
            is_virtual,
            relations: Vec::new(),
            providers: Vec::new(),
        }
    }

    /// A real package, or a virtual one somebody provides
    pub fn is_satisfiable(&self) -> bool {
        !self.is_virtual || !self.providers.is_empty()
    }

    /// Targets of the hard relations, grouped by OR group
    pub fn hard_groups(&self) -> Vec<Vec<&str>> {
        let mut groups: Vec<(RelationKind, Vec<&str>)> = Vec::new();
        for relation in &self.relations {
            match groups.last_mut() {
                Some((_, group)) if relation.alternative => group.push(&relation.target),
                _ => groups.push((relation.kind, vec![relation.target.as_str()])),
            }
        }
        groups
            .into_iter()
            .filter(|(kind, _)| kind.is_hard())
            .map(|(_, group)| group)
            .collect()
    }
}

/// Pick the member of an OR group to follow
///
/// The first alternative for which `satisfiable` holds wins; when none does,
/// the first alternative is kept so the miss surfaces at fetch time.
pub fn choose_alternative<'a>(
    group: &[&'a str],
    satisfiable: impl Fn(&str) -> bool,
) -> Option<&'a str> {
    group
        .iter()
        .copied()
        .find(|name| satisfiable(name))
        .or_else(|| group.first().copied())
}

/// Transitive dependency listing for one root name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyListing {
    pub blocks: Vec<ListingBlock>,
}

impl DependencyListing {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Strip `<...>` virtual markers, `:arch` qualifiers and a trailing
/// ` (>= 1.0)` version clause
fn clean_target(raw: &str) -> String {
    let name = raw.split_whitespace().next().unwrap_or("");
    let name = name.split('(').next().unwrap_or(name);
    let name = name.trim_start_matches('<').trim_end_matches('>');
    name.split(':').next().unwrap_or(name).to_string()
}

/// Deepest indentation a relation line may have
const RELATION_INDENT: usize = 2;

/// Parse the text output of `apt-cache depends --recurse`
pub fn parse_apt_cache(text: &str) -> DependencyListing {
    let mut listing = DependencyListing::default();
    let mut current: Option<ListingBlock> = None;
    let mut pending_alt = false;
    // Providers printed under relations, keyed by the virtual target
    let mut listed_providers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut last_target: Option<String> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if !line.starts_with(' ') && !line.starts_with('|') && !line.starts_with('\t') {
            if let Some(block) = current.take() {
                listing.blocks.push(block);
            }
            let head = line.trim();
            let is_virtual = head.starts_with('<') && head.ends_with('>');
            current = Some(ListingBlock::new(clean_target(head), is_virtual));
            pending_alt = false;
            last_target = None;
            continue;
        }

        let Some(block) = current.as_mut() else {
            continue;
        };

        // Relation lines have a single column of indentation or a `|` marker
        // in the first column; provider lines are indented further and carry
        // no label.
        let trimmed = line.trim_start();
        let marker = trimmed.starts_with('|');
        if !marker && line.len() - trimmed.len() > RELATION_INDENT {
            let provider = clean_target(trimmed);
            if provider.is_empty() || (trimmed.contains(':') && trimmed.contains(' ')) {
                continue;
            }
            match &last_target {
                Some(target) => listed_providers
                    .entry(target.clone())
                    .or_default()
                    .push(provider),
                None => block.providers.push(provider),
            }
            continue;
        }
        let body = trimmed.trim_start_matches('|');
        let Some((label, target)) = body.split_once(':') else {
            continue;
        };
        if label.contains(' ') {
            continue;
        }

        let target = clean_target(target);
        if target.is_empty() {
            continue;
        }

        last_target = Some(target.clone());
        block.relations.push(Relation {
            kind: RelationKind::parse(label),
            target,
            alternative: pending_alt,
        });
        pending_alt = marker;
    }

    if let Some(block) = current.take() {
        listing.blocks.push(block);
    }

    for (target, providers) in listed_providers {
        match listing.blocks.iter_mut().find(|b| b.name == target) {
            Some(block) if block.is_virtual => {
                for provider in providers {
                    if !block.providers.contains(&provider) {
                        block.providers.push(provider);
                    }
                }
            }
            Some(_) => {}
            None => {
                let mut block = ListingBlock::new(target, true);
                block.providers = providers;
                block.providers.dedup();
                listing.blocks.push(block);
            }
        }
    }
    listing
}
