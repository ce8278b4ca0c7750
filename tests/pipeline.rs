// tests/pipeline.rs

//! End-to-end pipeline tests: resolve, fetch, index.

mod common;

use common::{FixtureSource, names, upstream};
use isoseed::compression::decompress_auto;
use isoseed::index::PackagesIndex;
use isoseed::{Error, ExistingPolicy, FetchOutcome, Pipeline};
use std::fs;
use tempfile::TempDir;

const CURL_ONLY: &str = "\
Package: curl
Version: 8.5.0-2
Architecture: amd64
Depends: libcurl4 (= 8.5.0-2), ca-certificates

Package: libcurl4
Version: 8.5.0-2
Architecture: amd64

Package: ca-certificates
Version: 20230311
Architecture: all
";

#[test]
fn test_curl_repository_end_to_end() {
    let index = PackagesIndex::parse(CURL_ONLY);
    let source = FixtureSource::new(&index);
    let dest = TempDir::new().unwrap();

    let report = Pipeline::new(&index, &source)
        .with_jobs(2)
        .run(&names(&["curl"]), &[], dest.path())
        .unwrap();

    assert_eq!(report.summary.requested, 1);
    assert_eq!(report.summary.resolved, 3);
    assert_eq!(report.summary.downloaded, 3);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(report.summary.index_entries, 3);

    let packages = fs::read_to_string(dest.path().join("Packages")).unwrap();
    let order: Vec<&str> = packages
        .lines()
        .filter_map(|l| l.strip_prefix("Package: "))
        .collect();
    assert_eq!(order, ["ca-certificates", "curl", "libcurl4"]);
    assert!(packages.contains("Filename: ./curl_8.5.0-2_all.deb\n"));

    let gz = fs::read(dest.path().join("Packages.gz")).unwrap();
    assert_eq!(decompress_auto(&gz).unwrap(), packages.as_bytes());
}

#[test]
fn test_partial_failure_still_builds_repository() {
    let index = upstream();
    let source = FixtureSource::new(&index).with_broken(&["libcurl4"]);
    let dest = TempDir::new().unwrap();

    let report = Pipeline::new(&index, &source)
        .run(&names(&["curl", "no-such-package"]), &[], dest.path())
        .unwrap();

    assert_eq!(report.summary.failed, 2);
    assert_eq!(report.summary.failed_packages, ["libcurl4", "no-such-package"]);
    assert_eq!(report.summary.fetched, 3);
    assert_eq!(report.summary.index_entries, 3);
    assert!(matches!(
        report.outcomes.get("libcurl4"),
        Some(FetchOutcome::Failed(_))
    ));
    assert!(matches!(
        report.outcomes.get("curl"),
        Some(FetchOutcome::Downloaded(_))
    ));

    let packages = fs::read_to_string(dest.path().join("Packages")).unwrap();
    assert!(!packages.contains("Package: libcurl4"));
    assert!(packages.contains("Package: libc6"));
}

#[test]
fn test_nothing_fetched_is_an_error() {
    let index = PackagesIndex::parse(CURL_ONLY);
    let source = FixtureSource::new(&index).with_broken(&["curl", "libcurl4", "ca-certificates"]);
    let dest = TempDir::new().unwrap();

    let err = Pipeline::new(&index, &source)
        .run(&names(&["curl"]), &[], dest.path())
        .unwrap_err();
    assert!(matches!(err, Error::EmptyRepository(_)));
    assert!(!dest.path().join("Packages").exists());
}

#[test]
fn test_empty_run_still_reports_counts() {
    let index = PackagesIndex::parse(CURL_ONLY);
    let source = FixtureSource::new(&index).with_broken(&["curl", "libcurl4", "ca-certificates"]);
    let dest = TempDir::new().unwrap();

    let report = Pipeline::new(&index, &source)
        .execute(&names(&["curl"]), &[], dest.path())
        .unwrap();

    assert!(report.is_empty());
    assert_eq!(report.summary.requested, 1);
    assert_eq!(report.summary.resolved, 3);
    assert_eq!(report.summary.fetched, 0);
    assert_eq!(report.summary.failed, 3);
    assert_eq!(
        report.summary.failed_packages,
        ["ca-certificates", "curl", "libcurl4"]
    );
    assert_eq!(report.outcomes.failed(), 3);
    assert!(report.summary.to_string().contains("Failed:    3"));
    assert!(!dest.path().join("Packages").exists());
}

#[test]
fn test_rerun_skips_present_packages() {
    let index = PackagesIndex::parse(CURL_ONLY);
    let source = FixtureSource::new(&index);
    let dest = TempDir::new().unwrap();
    let pipeline = Pipeline::new(&index, &source);

    pipeline.run(&names(&["curl"]), &[], dest.path()).unwrap();
    let first_gz = fs::read(dest.path().join("Packages.gz")).unwrap();
    assert_eq!(source.call_count(), 3);

    let report = pipeline.run(&names(&["curl"]), &[], dest.path()).unwrap();
    assert_eq!(report.summary.skipped, 3);
    assert_eq!(report.summary.downloaded, 0);
    assert_eq!(source.call_count(), 3);

    let second_gz = fs::read(dest.path().join("Packages.gz")).unwrap();
    assert_eq!(first_gz, second_gz);
}

#[test]
fn test_overwrite_downloads_again() {
    let index = PackagesIndex::parse(CURL_ONLY);
    let source = FixtureSource::new(&index);
    let dest = TempDir::new().unwrap();

    Pipeline::new(&index, &source)
        .run(&names(&["curl"]), &[], dest.path())
        .unwrap();
    let report = Pipeline::new(&index, &source)
        .with_existing(ExistingPolicy::Overwrite)
        .run(&names(&["curl"]), &[], dest.path())
        .unwrap();

    assert_eq!(report.summary.downloaded, 3);
    assert_eq!(source.call_count(), 6);
    assert_eq!(report.summary.index_entries, 3);
}

#[test]
fn test_index_write_failure_is_fatal() {
    let index = PackagesIndex::parse(CURL_ONLY);
    let source = FixtureSource::new(&index);
    let dest = TempDir::new().unwrap();
    // A directory where the Packages file should go cannot be replaced
    fs::create_dir(dest.path().join("Packages")).unwrap();

    let err = Pipeline::new(&index, &source)
        .run(&names(&["curl"]), &[], dest.path())
        .unwrap_err();
    assert!(matches!(err, Error::IndexError(_)));
}

#[test]
fn test_resolve_does_not_touch_destination() {
    let index = upstream();
    let source = FixtureSource::new(&index);

    let resolved = Pipeline::new(&index, &source)
        .resolve(&names(&["bsd-mailx"]), &names(&["ca-certificates"]))
        .unwrap();
    assert_eq!(
        resolved.iter().map(String::as_str).collect::<Vec<_>>(),
        ["bsd-mailx", "ca-certificates", "postfix"]
    );
    assert_eq!(source.call_count(), 0);
}

#[test]
fn test_json_report() {
    let index = upstream();
    let source = FixtureSource::new(&index).with_broken(&["libc6"]);
    let dest = TempDir::new().unwrap();

    let report = Pipeline::new(&index, &source)
        .run(&names(&["libcurl4"]), &[], dest.path())
        .unwrap();
    let path = dest.path().join("report.json");
    report.write_json(&path).unwrap();

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["summary"]["resolved"], 2);
    assert_eq!(json["summary"]["failed_packages"][0], "libc6");
    assert_eq!(json["outcomes"]["libc6"]["status"], "failed");
    assert_eq!(json["outcomes"]["libcurl4"]["status"], "downloaded");
}
