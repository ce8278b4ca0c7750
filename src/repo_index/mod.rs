// src/repo_index/mod.rs

//! Local repository index generation
//!
//! Scans a directory of `.deb` files and writes the `Packages` and
//! `Packages.gz` files an apt-based installer reads from a flat repository
//! (`deb [trusted=yes] file:/path ./`). Each stanza is the package's own
//! control file plus `Filename`, `Size`, `MD5sum` and `SHA256`.
//!
//! Output is deterministic: entries are sorted by file name and the gzip
//! header carries no timestamp, so indexing the same files twice produces
//! byte-identical results.

mod control;

pub use control::read_control;

use crate::compression::gzip_deterministic;
use crate::error::{Error, Result};
use crate::hash::digest_file;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Plain index file name
pub const PACKAGES_FILE: &str = "Packages";

/// Compressed index file name
pub const PACKAGES_GZ_FILE: &str = "Packages.gz";

/// Fields this module computes itself; any copies in a control file are dropped
const COMPUTED_FIELDS: &[&str] = &["Filename", "Size", "MD5sum", "SHA1", "SHA256"];

/// One package in the generated index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// File name relative to the repository directory
    pub filename: String,
    pub package: String,
    pub version: String,
    pub architecture: String,
    pub size: u64,
    pub md5: String,
    pub sha256: String,
    /// Control stanza as shipped in the package
    pub control: String,
}

impl IndexEntry {
    /// Build the entry for one `.deb`
    pub fn from_deb(path: &Path) -> Result<Self> {
        let control = read_control(path)?;
        let field = |name: &str| control_field(&control, name).unwrap_or_default();

        let package = field("Package");
        if package.is_empty() {
            return Err(Error::ParseError(format!(
                "{} has no Package field",
                path.display()
            )));
        }

        let digests = digest_file(path)
            .map_err(|e| Error::IoError(format!("Failed to hash {}: {}", path.display(), e)))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            filename,
            version: field("Version"),
            architecture: field("Architecture"),
            package,
            size: digests.size,
            md5: digests.md5,
            sha256: digests.sha256,
            control,
        })
    }

    /// Render this entry as a `Packages` stanza (without trailing blank line)
    pub fn to_stanza(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        let mut skipping = false;
        for line in self.control.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                if !skipping {
                    lines.push(line.to_string());
                }
                continue;
            }
            let key = line.split(':').next().unwrap_or("").trim();
            skipping = COMPUTED_FIELDS.contains(&key);
            if !skipping {
                lines.push(line.to_string());
            }
        }

        let computed = [
            format!("Filename: ./{}", self.filename),
            format!("Size: {}", self.size),
            format!("MD5sum: {}", self.md5),
            format!("SHA256: {}", self.sha256),
        ];
        let at = lines
            .iter()
            .position(|l| l.starts_with("Description:"))
            .unwrap_or(lines.len());
        lines.splice(at..at, computed);

        let mut stanza = lines.join("\n");
        stanza.push('\n');
        stanza
    }
}

/// Value of a single-line control field
fn control_field(control: &str, name: &str) -> Option<String> {
    control.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (!line.starts_with(' ') && key.trim() == name).then(|| value.trim().to_string())
    })
}

/// Generated index for one directory
#[derive(Debug, Clone)]
pub struct RepositoryIndex {
    pub directory: PathBuf,
    pub entries: Vec<IndexEntry>,
    pub packages_path: PathBuf,
    pub compressed_path: PathBuf,
    /// Files that were skipped because their metadata could not be read
    pub skipped: Vec<PathBuf>,
}

impl RepositoryIndex {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Package names in index order
    pub fn package_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.package.as_str()).collect()
    }
}

/// Fail with [`Error::IndexError`] unless `directory` is an existing directory
pub fn check_directory(directory: &Path) -> Result<()> {
    if directory.is_dir() {
        Ok(())
    } else {
        Err(Error::IndexError(format!(
            "{} is not an existing directory",
            directory.display()
        )))
    }
}

/// `.deb` files directly inside `directory`, sorted by file name
///
/// Hidden files (in-flight downloads) are ignored.
pub fn scan_artifacts(directory: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(directory).map_err(|e| {
        Error::IndexError(format!("Cannot read {}: {}", directory.display(), e))
    })?;

    let mut debs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".deb") && !n.starts_with('.'))
        })
        .collect();
    debs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(debs)
}

/// Render the full `Packages` text for `entries`
pub fn render_packages(entries: &[IndexEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&entry.to_stanza());
        out.push('\n');
    }
    out
}

/// Write `data` to `path` through a temp file in the same directory
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".isoseed-index-")
        .tempfile_in(dir)
        .map_err(|e| Error::IndexError(format!("Cannot create temp file in {}: {}", dir.display(), e)))?;
    temp.write_all(data)
        .map_err(|e| Error::IndexError(format!("Cannot write {}: {}", path.display(), e)))?;
    temp.persist(path)
        .map_err(|e| Error::IndexError(format!("Cannot write {}: {}", path.display(), e)))?;
    Ok(())
}

/// Scan `directory` and (re)write its `Packages` and `Packages.gz`
///
/// Unreadable or corrupt `.deb` files are skipped with a warning. Failing to
/// list the directory or write either index file is an [`Error::IndexError`].
pub fn build_index(directory: &Path) -> Result<RepositoryIndex> {
    let artifacts = scan_artifacts(directory)?;
    debug!("Indexing {} artifact(s) in {}", artifacts.len(), directory.display());

    let mut entries = Vec::with_capacity(artifacts.len());
    let mut skipped = Vec::new();
    for path in artifacts {
        match IndexEntry::from_deb(&path) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!("Skipping {} in index: {}", path.display(), e);
                skipped.push(path);
            }
        }
    }

    let text = render_packages(&entries);
    let compressed = gzip_deterministic(text.as_bytes())
        .map_err(|e| Error::IndexError(format!("Cannot compress index: {}", e)))?;

    let packages_path = directory.join(PACKAGES_FILE);
    let compressed_path = directory.join(PACKAGES_GZ_FILE);
    write_atomic(&packages_path, text.as_bytes())?;
    write_atomic(&compressed_path, &compressed)?;

    info!(
        "Wrote {} with {} package(s) ({} skipped)",
        packages_path.display(),
        entries.len(),
        skipped.len()
    );

    Ok(RepositoryIndex {
        directory: directory.to_path_buf(),
        entries,
        packages_path,
        compressed_path,
        skipped,
    })
}
