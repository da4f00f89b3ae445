// ABOUTME: Validated record types for patch-queue subtrees and git worktrees

use crate::config::SubtreeEntry;
use crate::paths::same_file;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("subtree path {0} must be relative to the repository root")]
    AbsolutePath(String),
    #[error("subtree path {0} contains dot segments")]
    DotSegments(String),
    #[error("subtree path {0} has no name component")]
    NoName(String),
    #[error("worktree stanza is missing its path line")]
    MissingWorktreePath,
}

/// One record from `git worktree list --porcelain`. Recomputed on every
/// query, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worktree {
    pub worktree: PathBuf,
    pub head: String,
    /// Full ref name, or `None` for a detached HEAD.
    pub branch: Option<String>,
}

impl Worktree {
    /// The branch's short name for display.
    pub fn branch_short(&self) -> Option<&str> {
        self.branch
            .as_deref()
            .map(|branch| branch.strip_prefix("refs/heads/").unwrap_or(branch))
    }
}

/// Result of resolving a filesystem path against the worktree registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorktreeLookup {
    /// The path does not exist on disk.
    Absent,
    /// The path exists but is not a registered worktree.
    Unregistered,
    Found(Worktree),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtreeState {
    Clean,
    Editing,
}

/// A configured patch-queue subtree, resolved against the repository.
#[derive(Debug, Clone)]
pub struct Subtree {
    /// Working-directory-relative path, as configured.
    pub relpath: PathBuf,
    /// Absolute path inside the working tree.
    pub path: PathBuf,
    /// Absolute path of the directory holding the patch set.
    pub patches_path: PathBuf,
    /// The revision the patch set applies on top of.
    pub base: String,
    /// Last path component, used to derive scratch worktree and branch names.
    pub name: String,
    /// Present iff the subtree is currently being edited.
    pub worktree: Option<Worktree>,
}

fn validate_relative(raw: &str) -> Result<PathBuf, ModelError> {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        return Err(ModelError::AbsolutePath(raw.to_string()));
    }
    if path
        .components()
        .any(|c| matches!(c, Component::CurDir | Component::ParentDir))
    {
        return Err(ModelError::DotSegments(raw.to_string()));
    }
    Ok(path)
}

impl Subtree {
    /// Build a subtree record from its config entry, validating the stored
    /// fields up front. The worktree association is attached separately by
    /// whoever holds the registry.
    pub fn from_entry(entry: &SubtreeEntry, working_dir: &Path) -> Result<Self, ModelError> {
        let relpath = validate_relative(&entry.path)?;
        let patches_rel = validate_relative(&entry.patches_path)?;
        let name = relpath
            .file_name()
            .ok_or_else(|| ModelError::NoName(entry.path.clone()))?
            .to_string_lossy()
            .into_owned();

        Ok(Self {
            path: working_dir.join(&relpath),
            patches_path: working_dir.join(patches_rel),
            relpath,
            base: entry.base.clone(),
            name,
            worktree: None,
        })
    }

    pub fn state(&self) -> SubtreeState {
        if self.worktree.is_some() {
            SubtreeState::Editing
        } else {
            SubtreeState::Clean
        }
    }

    /// The path to show in user-facing text: the short relative form when it
    /// names the same file as the absolute one (i.e. the user is at the
    /// repository root), otherwise the absolute path.
    pub fn uipath(&self) -> PathBuf {
        if same_file(&self.path, &self.relpath) {
            self.relpath.clone()
        } else {
            self.path.clone()
        }
    }
}
