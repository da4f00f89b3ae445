// ABOUTME: Scratch apply: materialize a patch set on top of a base revision
// in an ephemeral secondary checkout, with rollback on failure

use super::{GitError, GitRepo};
use crate::patch::enumerate_patches;
use git2::Repository;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Namespace under the git-directory for scratch checkouts.
const SCRATCH_DIR: &str = "pq";

/// Handle to a scratch checkout: either consumed and discarded, or promoted
/// into a long-lived editing worktree.
#[derive(Debug, Clone)]
pub struct AppliedPatches {
    pub worktree: PathBuf,
    pub branch: String,
    pub git_dir: PathBuf,
}

impl GitRepo {
    pub fn scratch_worktree_path(&self, name: &str) -> PathBuf {
        self.git_dir().join(SCRATCH_DIR).join(format!("temp-{name}"))
    }

    pub fn scratch_branch_name(name: &str) -> String {
        format!("pq-{name}")
    }

    /// Create a worktree at the deterministic scratch path for `name`, on a
    /// fresh `pq-<name>` branch starting at `base`, and apply the patch set
    /// from `patches_dir` onto it as sequential commits. An empty patch set
    /// leaves the branch at `base`.
    ///
    /// A pre-existing scratch path is a stale-state error and is never
    /// removed automatically: it may belong to a crashed or concurrent
    /// invocation. Any failure after the worktree is created tears down the
    /// worktree and branch before the error propagates.
    pub fn apply_patches_keep_tree(
        &self,
        patches_dir: &Path,
        base: &str,
        name: &str,
    ) -> Result<AppliedPatches, GitError> {
        let temp = self.scratch_worktree_path(name);
        let branch = Self::scratch_branch_name(name);
        if temp.exists() {
            return Err(GitError::StaleScratch(temp));
        }

        info!(
            "applying patches from {} onto {} at {}",
            patches_dir.display(),
            base,
            temp.display()
        );
        let result = self.build_scratch(&temp, &branch, patches_dir, base);
        if result.is_err() && temp.exists() {
            self.discard_scratch(&temp, &branch);
        }
        result
    }

    fn build_scratch(
        &self,
        temp: &Path,
        branch: &str,
        patches_dir: &Path,
        base: &str,
    ) -> Result<AppliedPatches, GitError> {
        let mut cmd = self.git();
        cmd.args(["worktree", "add", "-b", branch])
            .arg(temp)
            .arg(base);
        self.run(cmd, "worktree add")?;

        let patches = enumerate_patches(patches_dir)?;
        if !patches.is_empty() {
            debug!("applying {} patches", patches.len());
            let mut cmd = self.git();
            cmd.current_dir(temp)
                .args(["am", "--whitespace=nowarn", "--quiet"])
                .args(&patches);
            self.run(cmd, "am")?;
        }

        let scratch_repo = Repository::open(temp)?;
        Ok(AppliedPatches {
            worktree: temp.to_path_buf(),
            branch: branch.to_string(),
            git_dir: scratch_repo.path().to_path_buf(),
        })
    }

    /// Best-effort teardown of a scratch worktree and its branch. Failures
    /// are logged, not propagated, so an original error is never masked.
    pub fn discard_scratch(&self, worktree: &Path, branch: &str) {
        let mut cmd = self.git();
        cmd.args(["worktree", "remove", "--force"]).arg(worktree);
        if let Err(e) = self.run(cmd, "worktree remove") {
            warn!("failed to remove scratch worktree {}: {e}", worktree.display());
        }
        let mut cmd = self.git();
        cmd.args(["branch", "-D", branch]);
        if let Err(e) = self.run(cmd, "branch -D") {
            warn!("failed to delete scratch branch {branch}: {e}");
        }
    }

    /// Apply the patch set purely for comparison: build a scratch checkout
    /// under the fixed `temp` name, capture the resulting short revision,
    /// and tear everything down whether or not the capture succeeded.
    pub fn test_apply(&self, patches_dir: &Path, base: &str) -> Result<String, GitError> {
        let applied = self.apply_patches_keep_tree(patches_dir, base, "temp")?;
        let rev = self.rev_parse_short(&applied.branch);
        self.discard_scratch(&applied.worktree, &applied.branch);
        rev
    }
}
