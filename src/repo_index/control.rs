// src/repo_index/control.rs

//! Control file extraction from `.deb` archives
//!
//! A `.deb` is an `ar` archive holding `debian-binary`, `control.tar[.ext]`
//! and `data.tar[.ext]`. The control tarball's `./control` member is the
//! package's metadata stanza.

use crate::compression::{CompressionFormat, create_decoder};
use crate::error::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read the control stanza of a `.deb`
pub fn read_control(path: &Path) -> Result<String> {
    let file = File::open(path)
        .map_err(|e| Error::IoError(format!("Failed to open {}: {}", path.display(), e)))?;
    let mut archive = ar::Archive::new(file);

    while let Some(entry) = archive.next_entry() {
        let entry = entry.map_err(|e| {
            Error::ParseError(format!("Bad ar archive {}: {}", path.display(), e))
        })?;
        // GNU ar terminates member names with '/'
        let name = String::from_utf8_lossy(entry.header().identifier())
            .trim_end_matches('/')
            .to_string();

        if !name.starts_with("control.tar") {
            continue;
        }

        let format = CompressionFormat::from_extension(&name);
        let decoder = create_decoder(entry, format).map_err(|e| {
            Error::ParseError(format!("{} in {}: {}", name, path.display(), e))
        })?;
        return control_from_tar(decoder, path);
    }

    Err(Error::ParseError(format!(
        "{} has no control.tar member",
        path.display()
    )))
}

fn control_from_tar<R: Read>(reader: R, path: &Path) -> Result<String> {
    let mut tar = tar::Archive::new(reader);
    let entries = tar
        .entries()
        .map_err(|e| Error::ParseError(format!("Bad control.tar in {}: {}", path.display(), e)))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| {
            Error::ParseError(format!("Bad control.tar in {}: {}", path.display(), e))
        })?;
        let is_control = entry
            .path()
            .map(|p| p.to_string_lossy().trim_start_matches("./") == "control")
            .unwrap_or(false);
        if !is_control {
            continue;
        }

        let mut content = String::new();
        entry.read_to_string(&mut content).map_err(|e| {
            Error::ParseError(format!("Unreadable control file in {}: {}", path.display(), e))
        })?;
        return Ok(content);
    }

    Err(Error::ParseError(format!(
        "{} has no control file",
        path.display()
    )))
}
