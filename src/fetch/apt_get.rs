// src/fetch/apt_get.rs

//! `apt-get download` package source

use super::{PackageSource, existing_artifacts};
use crate::error::{Error, Result};
use crate::process::run_checked;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default timeout for one `apt-get download`
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Downloads packages with the host's `apt-get`
///
/// apt-get writes into its working directory, so each download runs in a
/// private staging directory under the destination and the resulting `.deb`
/// is renamed into place afterwards.
#[derive(Debug, Clone)]
pub struct AptGetSource {
    program: String,
    options: Vec<String>,
    timeout: Duration,
}

impl Default for AptGetSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AptGetSource {
    pub fn new() -> Self {
        Self {
            program: "apt-get".to_string(),
            options: Vec::new(),
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }

    /// Add an apt configuration override (`Key=Value`)
    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.push("-o".to_string());
        self.options.push(option.into());
        self
    }

    pub fn with_root(self, root: &Path) -> Self {
        self.with_option(format!("Dir={}", root.display()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl PackageSource for AptGetSource {
    fn name(&self) -> &str {
        "apt-get"
    }

    fn fetch(&self, package: &str, dest: &Path) -> Result<PathBuf> {
        let staging = tempfile::Builder::new()
            .prefix(".isoseed-apt-")
            .tempdir_in(dest)
            .map_err(|e| {
                Error::IoError(format!("Failed to create staging dir in {}: {}", dest.display(), e))
            })?;

        let mut args = self.options.clone();
        args.push("download".to_string());
        args.push(package.to_string());
        run_checked(&self.program, &args, Some(staging.path()), self.timeout)?;

        let Some(staged) = existing_artifacts(staging.path(), package).into_iter().next() else {
            return Err(Error::DownloadError(format!(
                "apt-get download {} succeeded but produced no {}_*.deb",
                package, package
            )));
        };

        let file_name = staged
            .file_name()
            .ok_or_else(|| Error::IoError(format!("Bad staged path {}", staged.display())))?;
        let final_path = dest.join(file_name);
        fs::rename(&staged, &final_path).map_err(|e| {
            Error::IoError(format!(
                "Failed to move {} to {}: {}",
                staged.display(),
                final_path.display(),
                e
            ))
        })?;

        debug!("apt-get placed {}", final_path.display());
        Ok(final_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn fake_apt_get(dir: &Path, body: &str) -> String {
        let script = dir.join("apt-get");
        fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script.display().to_string()
    }

    #[test]
    fn test_download_moves_file_into_dest() {
        let bin = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let program = fake_apt_get(bin.path(), r#"echo deb > "${2}_1.0_amd64.deb""#);

        let source = AptGetSource::new().with_program(program);
        let path = source.fetch("curl", dest.path()).unwrap();

        assert_eq!(path, dest.path().join("curl_1.0_amd64.deb"));
        assert!(path.exists());
        // staging directory is cleaned up
        let leftovers: Vec<_> = fs::read_dir(dest.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_failure_leaves_nothing_behind() {
        let bin = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let program = fake_apt_get(
            bin.path(),
            r#"echo partial > "${2}_1.0_amd64.deb"; echo "E: Unable to locate package" >&2; exit 100"#,
        );

        let source = AptGetSource::new().with_program(program);
        let err = source.fetch("ghost", dest.path()).unwrap_err();
        assert!(matches!(err, Error::CommandFailed(_)));
        assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_success_without_file() {
        let bin = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let program = fake_apt_get(bin.path(), "exit 0");

        let source = AptGetSource::new().with_program(program);
        assert!(matches!(
            source.fetch("curl", dest.path()),
            Err(Error::DownloadError(_))
        ));
    }
}
