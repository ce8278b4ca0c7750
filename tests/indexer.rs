// tests/indexer.rs

//! Repository indexer tests against generated `.deb` files.

mod common;

use common::{ControlCompression, build_deb, control_for};
use isoseed::compression::decompress_auto;
use isoseed::hash::digest_file;
use isoseed::repo_index::{PACKAGES_FILE, PACKAGES_GZ_FILE, read_control};
use isoseed::{Error, build_index};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_control_from_gzip_and_xz_members() {
    let dir = TempDir::new().unwrap();
    let gz = dir.path().join("a_1.0_all.deb");
    let xz = dir.path().join("b_2.0_all.deb");
    build_deb(&gz, &control_for("a", "1.0"), ControlCompression::Gzip);
    build_deb(&xz, &control_for("b", "2.0"), ControlCompression::Xz);

    assert!(read_control(&gz).unwrap().starts_with("Package: a\nVersion: 1.0\n"));
    assert!(read_control(&xz).unwrap().starts_with("Package: b\nVersion: 2.0\n"));
}

#[test]
fn test_index_fields_match_artifacts() {
    let dir = TempDir::new().unwrap();
    let deb = dir.path().join("curl_8.5.0-2_all.deb");
    build_deb(&deb, &control_for("curl", "8.5.0-2"), ControlCompression::Xz);

    let index = build_index(dir.path()).unwrap();
    assert_eq!(index.package_names(), ["curl"]);

    let digests = digest_file(&deb).unwrap();
    let packages = fs::read_to_string(dir.path().join(PACKAGES_FILE)).unwrap();
    assert!(packages.contains("Filename: ./curl_8.5.0-2_all.deb\n"));
    assert!(packages.contains(&format!("Size: {}\n", digests.size)));
    assert!(packages.contains(&format!("MD5sum: {}\n", digests.md5)));
    assert!(packages.contains(&format!("SHA256: {}\n", digests.sha256)));
    // Multi-line description survives intact, after the inserted fields
    let sha_at = packages.find("SHA256:").unwrap();
    let desc_at = packages.find("Description: fixture package curl\n generated").unwrap();
    assert!(sha_at < desc_at);
}

#[test]
fn test_corrupt_artifacts_are_skipped() {
    let dir = TempDir::new().unwrap();
    build_deb(
        &dir.path().join("good_1.0_all.deb"),
        &control_for("good", "1.0"),
        ControlCompression::Gzip,
    );
    fs::write(dir.path().join("bad_1.0_all.deb"), b"not an archive").unwrap();
    // In-flight download and unrelated files are not artifacts
    fs::write(dir.path().join(".partial_1.0_all.deb.download"), b"").unwrap();
    fs::write(dir.path().join(".hidden_1.0_all.deb"), b"").unwrap();
    fs::write(dir.path().join("README"), b"hello").unwrap();

    let index = build_index(dir.path()).unwrap();
    assert_eq!(index.package_names(), ["good"]);
    assert_eq!(index.skipped.len(), 1);
    assert!(index.skipped[0].ends_with("bad_1.0_all.deb"));
}

#[test]
fn test_index_is_deterministic_and_sorted() {
    let dir = TempDir::new().unwrap();
    for name in ["zlib1g", "apt", "libc6"] {
        build_deb(
            &dir.path().join(format!("{name}_1.0_all.deb")),
            &control_for(name, "1.0"),
            ControlCompression::Gzip,
        );
    }

    let first = build_index(dir.path()).unwrap();
    assert_eq!(first.package_names(), ["apt", "libc6", "zlib1g"]);
    let first_gz = fs::read(dir.path().join(PACKAGES_GZ_FILE)).unwrap();

    std::thread::sleep(std::time::Duration::from_millis(1100));
    build_index(dir.path()).unwrap();
    let second_gz = fs::read(dir.path().join(PACKAGES_GZ_FILE)).unwrap();
    assert_eq!(first_gz, second_gz);

    let packages = fs::read(dir.path().join(PACKAGES_FILE)).unwrap();
    assert_eq!(decompress_auto(&second_gz).unwrap(), packages);
}

#[test]
fn test_empty_directory_writes_empty_index() {
    let dir = TempDir::new().unwrap();
    let index = build_index(dir.path()).unwrap();
    assert!(index.is_empty());
    assert_eq!(fs::read_to_string(&index.packages_path).unwrap(), "");
    assert!(index.compressed_path.exists());
}

#[test]
fn test_missing_directory_is_index_error() {
    let dir = TempDir::new().unwrap();
    let err = build_index(&dir.path().join("missing")).unwrap_err();
    assert!(matches!(err, Error::IndexError(_)));
}
