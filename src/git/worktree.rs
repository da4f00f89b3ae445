// ABOUTME: Worktree registry: parses `git worktree list --porcelain` and
// resolves filesystem paths to registered secondary checkouts

use super::{GitError, GitRepo};
use crate::models::{ModelError, Worktree, WorktreeLookup};
use crate::paths::same_file;
use std::path::{Path, PathBuf};

/// Parse one porcelain stanza into a record. The `worktree` line is
/// required; `detached` maps to an absent branch.
fn parse_stanza(stanza: &str) -> Result<Worktree, ModelError> {
    let mut worktree: Option<PathBuf> = None;
    let mut head = String::new();
    let mut branch: Option<String> = None;

    for line in stanza.lines() {
        let line = line.trim_end();
        if line == "detached" {
            branch = None;
        } else if let Some(path) = line.strip_prefix("worktree ") {
            worktree = Some(PathBuf::from(path));
        } else if let Some(rev) = line.strip_prefix("HEAD ") {
            head = rev.to_string();
        } else if let Some(name) = line.strip_prefix("branch ") {
            branch = Some(name.to_string());
        }
    }

    Ok(Worktree {
        worktree: worktree.ok_or(ModelError::MissingWorktreePath)?,
        head,
        branch,
    })
}

pub(crate) fn parse_worktree_porcelain(output: &str) -> Result<Vec<Worktree>, ModelError> {
    output
        .split("\n\n")
        .map(str::trim)
        .filter(|stanza| !stanza.is_empty())
        .map(parse_stanza)
        .collect()
}

impl GitRepo {
    /// All checkouts of this repository, main worktree first.
    pub fn list_worktrees(&self) -> Result<Vec<Worktree>, GitError> {
        let mut cmd = self.git();
        cmd.args(["worktree", "list", "--porcelain"]);
        let output = self.run(cmd, "worktree list")?;
        parse_worktree_porcelain(&output)
            .map_err(|e| GitError::CommandFailed(format!("worktree list: {e}")))
    }

    /// Resolve `path` against the registry by device+inode identity, so
    /// symlinked and relative spellings still match.
    pub fn find_worktree(&self, path: &Path) -> Result<WorktreeLookup, GitError> {
        if !path.exists() {
            return Ok(WorktreeLookup::Absent);
        }
        for worktree in self.list_worktrees()? {
            if worktree.worktree.exists() && same_file(path, &worktree.worktree) {
                return Ok(WorktreeLookup::Found(worktree));
            }
        }
        Ok(WorktreeLookup::Unregistered)
    }

    pub fn is_worktree(&self, path: &Path) -> Result<bool, GitError> {
        Ok(matches!(self.find_worktree(path)?, WorktreeLookup::Found(_)))
    }
}
