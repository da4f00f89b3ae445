// ABOUTME: Repository handle mixing git2 object-database queries with git
// shell-outs for the porcelain surface (worktree, am, format-patch)

pub mod scratch;
pub mod worktree;

pub use scratch::AppliedPatches;

use crate::patch::PatchError;
use git2::{BranchType, ObjectType, Repository};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Git repository error: {0}")]
    Git(#[from] git2::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Command execution failed: {0}")]
    CommandFailed(String),
    #[error("Patch error: {0}")]
    Patch(#[from] PatchError),
    #[error("scratch worktree path already exists: {}", .0.display())]
    StaleScratch(PathBuf),
    #[error("repository at {} has no working tree", .0.display())]
    Bare(PathBuf),
    #[error("revision {0} does not resolve to a tree")]
    NotATree(String),
}

/// Handle to the enclosing repository. Object-database and index queries go
/// through git2; operations git2 covers poorly (worktree add/remove/list,
/// am, format-patch, read-tree with prefix) shell out to the git binary.
pub struct GitRepo {
    repo: Repository,
    working_dir: PathBuf,
    git_dir: PathBuf,
}

impl GitRepo {
    /// Open the repository enclosing `start`, searching parent directories.
    pub fn discover(start: &Path) -> Result<Self, GitError> {
        Self::from_repository(Repository::discover(start)?)
    }

    /// Open the repository whose working tree is exactly `path`. Follows a
    /// `.git` redirect file, so this also opens secondary checkouts.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        Self::from_repository(Repository::open(path)?)
    }

    fn from_repository(repo: Repository) -> Result<Self, GitError> {
        let git_dir = repo.path().to_path_buf();
        let working_dir = repo
            .workdir()
            .ok_or_else(|| GitError::Bare(git_dir.clone()))?
            .to_path_buf();
        Ok(Self {
            repo,
            working_dir,
            git_dir,
        })
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Whether this is the primary checkout. Secondary worktrees carry a
    /// `commondir` file pointing back at the main git-directory.
    pub fn is_primary(&self) -> bool {
        !self.git_dir.join("commondir").exists()
    }

    /// A `git` command rooted at the working tree.
    pub(crate) fn git(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.working_dir);
        cmd
    }

    /// Run a prepared git command, capturing stdout and turning a non-zero
    /// exit into an error carrying the command's stderr.
    pub(crate) fn run(&self, mut cmd: Command, what: &str) -> Result<String, GitError> {
        debug!("running git {}", what);
        let output = cmd.output()?;
        if !output.status.success() {
            return Err(GitError::CommandFailed(format!(
                "git {}: {}",
                what,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub fn rev_parse_short(&self, rev: &str) -> Result<String, GitError> {
        let mut cmd = self.git();
        cmd.args(["rev-parse", "--short", rev]);
        Ok(self.run(cmd, "rev-parse")?.trim().to_string())
    }

    /// Force-delete a local branch; accepts either the short name or the
    /// full `refs/heads/...` form.
    pub fn delete_branch(&self, name: &str) -> Result<(), GitError> {
        let short = name.strip_prefix("refs/heads/").unwrap_or(name);
        let mut branch = self.repo.find_branch(short, BranchType::Local)?;
        branch.delete()?;
        Ok(())
    }

    /// The repository index, re-read from disk first so changes made by
    /// shelled-out git commands are visible.
    fn index(&self) -> Result<git2::Index, GitError> {
        let mut index = self.repo.index()?;
        index.read(false)?;
        Ok(index)
    }

    /// Whether the index holds an entry at `relpath` (stage 0).
    pub fn index_has(&self, relpath: &Path) -> Result<bool, GitError> {
        Ok(self.index()?.get_path(relpath, 0).is_some())
    }

    /// Stage one file, by working-directory-relative path.
    pub fn add_to_index(&self, relpath: &Path) -> Result<(), GitError> {
        let mut index = self.index()?;
        index.add_path(relpath)?;
        index.write()?;
        Ok(())
    }

    fn diff_options(pathspec: Option<&Path>) -> git2::DiffOptions {
        let mut opts = git2::DiffOptions::new();
        if let Some(path) = pathspec {
            opts.pathspec(path.to_string_lossy().into_owned());
        }
        opts
    }

    /// Working tree vs index, optionally restricted to one path. Untracked
    /// files do not count.
    pub fn has_unstaged_changes(&self, pathspec: Option<&Path>) -> Result<bool, GitError> {
        let index = self.index()?;
        let mut opts = Self::diff_options(pathspec);
        let diff = self
            .repo
            .diff_index_to_workdir(Some(&index), Some(&mut opts))?;
        Ok(diff.deltas().count() > 0)
    }

    /// Index vs the HEAD tree, optionally restricted to one path.
    pub fn has_staged_changes(&self, pathspec: Option<&Path>) -> Result<bool, GitError> {
        let index = self.index()?;
        let head_tree = self.repo.head()?.peel_to_tree()?;
        let mut opts = Self::diff_options(pathspec);
        let diff =
            self.repo
                .diff_tree_to_index(Some(&head_tree), Some(&index), Some(&mut opts))?;
        Ok(diff.deltas().count() > 0)
    }

    fn tree_of(&self, rev: &str) -> Result<git2::Tree<'_>, GitError> {
        let object = self.repo.revparse_single(rev)?;
        object
            .peel(ObjectType::Tree)?
            .into_tree()
            .map_err(|_| GitError::NotATree(rev.to_string()))
    }

    /// Whether the trees named by two revisions differ. Either side may be
    /// a commit-ish (peeled to its tree) or a tree expression like
    /// `HEAD:sub/dir`.
    pub fn trees_differ(&self, a: &str, b: &str) -> Result<bool, GitError> {
        let tree_a = self.tree_of(a)?;
        let tree_b = self.tree_of(b)?;
        let diff = self
            .repo
            .diff_tree_to_tree(Some(&tree_a), Some(&tree_b), None)?;
        Ok(diff.deltas().count() > 0)
    }
}
