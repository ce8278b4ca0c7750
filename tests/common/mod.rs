// tests/common/mod.rs

//! Shared test utilities and fixtures for integration tests.

#![allow(dead_code)]

use isoseed::index::{DependencyListing, PackageIndex, PackageLocation, PackagesIndex};
use isoseed::{PackageSource, Result};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// Upstream index used by most scenarios:
///
/// - `curl -> {libcurl4, ca-certificates}`
/// - `libcurl4 -> libc6`, with a soft `Recommends` that must be ignored
/// - `mail-transport-agent` is virtual, provided by `postfix` and `exim4`
/// - `default-mta` is virtual, provided only by `postfix`
pub const UPSTREAM: &str = "\
Package: curl
Version: 8.5.0-2
Architecture: amd64
Depends: libcurl4 (= 8.5.0-2), ca-certificates
Suggests: curl-doc
Filename: pool/main/c/curl/curl_8.5.0-2_amd64.deb

Package: libcurl4
Version: 8.5.0-2
Architecture: amd64
Depends: libc6 (>= 2.34)
Recommends: publicsuffix

Package: libc6
Version: 2.37-12
Architecture: amd64

Package: ca-certificates
Version: 20230311
Architecture: all

Package: publicsuffix
Version: 20231001
Architecture: all

Package: bsd-mailx
Version: 8.1.2
Architecture: amd64
Depends: default-mta | mail-transport-agent

Package: postfix
Version: 3.8.4-1
Architecture: amd64
Provides: mail-transport-agent, default-mta

Package: exim4
Version: 4.97-4
Architecture: all
Provides: mail-transport-agent
";

pub fn upstream() -> PackagesIndex {
    PackagesIndex::parse(UPSTREAM)
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Compression used for the control member of a generated `.deb`
#[derive(Debug, Clone, Copy)]
pub enum ControlCompression {
    Gzip,
    Xz,
}

fn control_tar(control: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(control.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();
    builder
        .append_data(&mut header, "./control", control.as_bytes())
        .unwrap();
    builder.into_inner().unwrap()
}

/// Write a minimal but well-formed `.deb` at `path`
pub fn build_deb(path: &Path, control: &str, compression: ControlCompression) {
    let tar = control_tar(control);
    let (member, data): (&str, Vec<u8>) = match compression {
        ControlCompression::Gzip => {
            let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            gz.write_all(&tar).unwrap();
            ("control.tar.gz", gz.finish().unwrap())
        }
        ControlCompression::Xz => {
            let mut xz = xz2::write::XzEncoder::new(Vec::new(), 6);
            xz.write_all(&tar).unwrap();
            ("control.tar.xz", xz.finish().unwrap())
        }
    };

    let mut ar = ar::Builder::new(File::create(path).unwrap());
    let binary = b"2.0\n";
    ar.append(
        &ar::Header::new(b"debian-binary".to_vec(), binary.len() as u64),
        &binary[..],
    )
    .unwrap();
    ar.append(
        &ar::Header::new(member.as_bytes().to_vec(), data.len() as u64),
        data.as_slice(),
    )
    .unwrap();
    // Empty data member keeps the layout realistic
    let data_tar = tar::Builder::new(Vec::new()).into_inner().unwrap();
    ar.append(
        &ar::Header::new(b"data.tar".to_vec(), data_tar.len() as u64),
        data_tar.as_slice(),
    )
    .unwrap();
}

/// Control text for a generated package
pub fn control_for(name: &str, version: &str) -> String {
    format!(
        "Package: {name}\nVersion: {version}\nArchitecture: all\nMaintainer: Test <test@example.org>\n\
         Description: fixture package {name}\n generated for integration tests\n"
    )
}

/// Package source that fabricates `.deb` files locally
///
/// Fails for names in `broken`, and for any name the index does not know as
/// concrete (mirroring a real mirror returning 404).
pub struct FixtureSource<'a> {
    index: &'a PackagesIndex,
    broken: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
}

impl<'a> FixtureSource<'a> {
    pub fn new(index: &'a PackagesIndex) -> Self {
        Self {
            index,
            broken: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_broken(mut self, names: &[&str]) -> Self {
        self.broken.extend(names.iter().map(|s| s.to_string()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl PackageSource for FixtureSource<'_> {
    fn name(&self) -> &str {
        "fixture"
    }

    fn fetch(&self, package: &str, dest: &Path) -> Result<PathBuf> {
        self.calls.lock().unwrap().push(package.to_string());
        if self.broken.contains(package) {
            return Err(isoseed::Error::DownloadError(format!("HTTP 404 for {package}")));
        }
        let Some(record) = self.index.get(package) else {
            return Err(isoseed::Error::NotFoundError(package.to_string()));
        };

        let version = if record.version.is_empty() { "1.0" } else { &record.version };
        let filename = format!("{}_{}_all.deb", package, version);
        let staging = dest.join(format!(".{filename}.partial"));
        build_deb(&staging, &control_for(package, version), ControlCompression::Gzip);
        let path = dest.join(filename);
        fs::rename(&staging, &path)?;
        Ok(path)
    }
}

/// Index wrapper that delays dependency queries per name
///
/// Used to force different worker completion orders.
pub struct DelayedIndex<I> {
    inner: I,
    delays: HashMap<String, Duration>,
    pub completed: Mutex<Vec<String>>,
}

impl<I: PackageIndex> DelayedIndex<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            delays: HashMap::new(),
            completed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, name: &str, millis: u64) -> Self {
        self.delays.insert(name.to_string(), Duration::from_millis(millis));
        self
    }

    pub fn completion_order(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }
}

impl<I: PackageIndex> PackageIndex for DelayedIndex<I> {
    fn is_concrete(&self, name: &str) -> bool {
        self.inner.is_concrete(name)
    }

    fn reverse_provides(&self, name: &str) -> Vec<String> {
        self.inner.reverse_provides(name)
    }

    fn dependency_listing(&self, name: &str) -> Result<DependencyListing> {
        if let Some(delay) = self.delays.get(name) {
            thread::sleep(*delay);
        }
        let result = self.inner.dependency_listing(name);
        self.completed.lock().unwrap().push(name.to_string());
        result
    }

    fn locate(&self, name: &str) -> Option<PackageLocation> {
        self.inner.locate(name)
    }
}
