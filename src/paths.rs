// ABOUTME: Path helpers for the patch-queue engine: dots-free relative paths
// and device+inode file identity

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{} is not inside {}", .path.display(), .base.display())]
    Escapes { path: PathBuf, base: PathBuf },
    #[error("{} contains dot segments", .0.display())]
    DotSegments(PathBuf),
}

/// Lexically normalize a path: make it absolute against the current
/// directory, drop `.` segments, and resolve `..` by popping.
fn absolute(path: &Path) -> Result<PathBuf, PathError> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(PathError::DotSegments(path.to_path_buf()));
                }
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}

/// Relative path from `base` to `path`, guaranteed free of `.`/`..`
/// segments. Fails if `path` does not sit below `base`, since expressing
/// that relation would require `..` components.
pub fn relpath_nodots(path: &Path, base: &Path) -> Result<PathBuf, PathError> {
    let path_abs = absolute(path)?;
    let base_abs = absolute(base)?;
    let rel = path_abs
        .strip_prefix(&base_abs)
        .map_err(|_| PathError::Escapes {
            path: path_abs.clone(),
            base: base_abs.clone(),
        })?;
    if rel.as_os_str().is_empty() {
        return Err(PathError::Escapes {
            path: path_abs,
            base: base_abs,
        });
    }
    Ok(rel.to_path_buf())
}

/// Whether two paths name the same filesystem entity, compared by
/// device+inode so symlinked and relative spellings still match.
pub fn same_file(a: &Path, b: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        match (std::fs::metadata(a), std::fs::metadata(b)) {
            (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
            _ => false,
        }
    }
    #[cfg(not(unix))]
    {
        match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
            (Ok(ca), Ok(cb)) => ca == cb,
            _ => false,
        }
    }
}
