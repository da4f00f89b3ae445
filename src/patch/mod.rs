// ABOUTME: Patch set I/O: enumeration and normalization of the *.patch files
// that make up a patch queue

use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

lazy_static! {
    static ref VERSION_TRAILER: Regex = Regex::new(r"^\d+\.\d+").unwrap();
}

/// Header lines dropped during normalization. They vary between otherwise
/// identical format-patch runs and would make every refresh churn the files.
const TRANSIENT_HEADERS: [&str; 5] = [
    "index ",
    "From ",
    "Message-Id: ",
    "In-Reply-To: ",
    "References: ",
];

const PATCH_EXTENSION: &str = "patch";

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("patch contains a line without a trailing newline")]
    MissingTerminator,
}

/// The ordered patch set in `dir`: every `*.patch` file, sorted
/// lexicographically by path. An absent directory yields an empty set.
pub fn enumerate_patches(dir: &Path) -> Result<Vec<PathBuf>, PatchError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut patches = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some(PATCH_EXTENSION) {
            patches.push(path);
        }
    }
    patches.sort();
    Ok(patches)
}

/// Delete every patch file in `dir`. Used by refresh, which regenerates the
/// whole set; the directory is owned by the tool once managed.
pub fn clear_patches(dir: &Path) -> Result<(), PatchError> {
    for patch in enumerate_patches(dir)? {
        debug!("removing stale patch {}", patch.display());
        fs::remove_file(&patch)?;
    }
    Ok(())
}

/// Rewrite a patch's text into its canonical form:
/// - trailing blank lines stripped
/// - the two-line `--` / git-version signature trailer dropped
/// - transient header lines (index, mbox From, message-id threading) dropped
///
/// Every input line must carry its `\n` terminator; a line without one means
/// the patch generator produced truncated output and nothing is rewritten.
pub fn normalize_patch(text: &str) -> Result<String, PatchError> {
    let mut lines: Vec<&str> = text.split_inclusive('\n').collect();
    for line in &lines {
        if !line.ends_with('\n') {
            return Err(PatchError::MissingTerminator);
        }
    }

    while lines.last().is_some_and(|line| line.trim_end().is_empty()) {
        lines.pop();
    }
    if lines.len() >= 2
        && lines[lines.len() - 2].trim_end() == "--"
        && VERSION_TRAILER.is_match(lines[lines.len() - 1])
    {
        lines.pop();
        lines.pop();
    }

    Ok(lines
        .into_iter()
        .filter(|line| !TRANSIENT_HEADERS.iter().any(|header| line.starts_with(header)))
        .collect())
}

/// Normalize one patch file in place.
pub fn normalize_patch_file(path: &Path) -> Result<(), PatchError> {
    let text = fs::read_to_string(path)?;
    let normalized = normalize_patch(&text)?;
    if normalized != text {
        fs::write(path, normalized)?;
    }
    Ok(())
}
