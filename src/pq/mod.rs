// ABOUTME: Patch-queue lifecycle state machine: init, edit, refresh, finish,
// plus subtree resolution against config and the worktree registry

pub mod status;
pub mod verify;

pub use verify::{Verdict, VerifyReport};

use crate::config::{PqConfig, SubtreeEntry, CONFIG_BASENAME};
use crate::git::{AppliedPatches, GitRepo};
use crate::models::{Subtree, WorktreeLookup};
use crate::patch::{clear_patches, enumerate_patches, normalize_patch_file};
use crate::paths::{relpath_nodots, same_file};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// How a lifecycle operation concluded when it did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// The operation made no sense in the subtree's current state; carries
    /// the explanation to show the user.
    Skipped(String),
}

/// Compensating teardown actions, armed as resources are acquired and run
/// in reverse order on any exit that does not reach `commit`.
struct Rollback<'a> {
    actions: Vec<Box<dyn FnOnce() + 'a>>,
    committed: bool,
}

impl<'a> Rollback<'a> {
    fn new() -> Self {
        Self {
            actions: Vec::new(),
            committed: false,
        }
    }

    fn arm(&mut self, action: impl FnOnce() + 'a) {
        self.actions.push(Box::new(action));
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        while let Some(action) = self.actions.pop() {
            action();
        }
    }
}

/// Drives subtrees between the frozen and editing states. One invocation
/// works on one subtree at a time; nothing here adds locking beyond git's
/// own ref and worktree locks.
pub struct PatchQueueManager {
    repo: GitRepo,
}

impl PatchQueueManager {
    pub fn new(repo: GitRepo) -> Self {
        Self { repo }
    }

    /// Open the repository enclosing the current directory.
    pub fn discover() -> Result<Self> {
        Ok(Self::new(GitRepo::discover(&std::env::current_dir()?)?))
    }

    /// Open the repository enclosing `path`.
    pub fn discover_from(path: &Path) -> Result<Self> {
        Ok(Self::new(GitRepo::discover(path)?))
    }

    pub fn repo(&self) -> &GitRepo {
        &self.repo
    }

    fn resolve(&self, entry: &SubtreeEntry) -> Result<Subtree> {
        let mut subtree = Subtree::from_entry(entry, self.repo.working_dir())?;
        if let WorktreeLookup::Found(worktree) = self.repo.find_worktree(&subtree.path)? {
            subtree.worktree = Some(worktree);
        }
        Ok(subtree)
    }

    /// All configured subtrees, config order, with their current worktree
    /// association. Loaded fresh on every call.
    pub fn subtrees(&self) -> Result<Vec<Subtree>> {
        let config = PqConfig::load(self.repo.working_dir())?;
        config.subtrees.iter().map(|e| self.resolve(e)).collect()
    }

    /// Resolve a user-supplied filesystem path to its configured subtree by
    /// device+inode identity.
    pub fn subtree_by_path(&self, path: &Path) -> Result<Subtree> {
        if !path.exists() {
            bail!("{} does not exist", path.display());
        }
        for subtree in self.subtrees()? {
            if subtree.path.exists() && same_file(path, &subtree.path) {
                return Ok(subtree);
            }
        }
        bail!("{} is not a git-pq subtree", path.display());
    }

    /// Materialize a new subtree at `path` from `base` and persist it into
    /// the config. Re-running against an existing path reports the conflict
    /// instead of touching anything.
    pub fn init(&self, path: &Path, patches: &Path, base: &str) -> Result<Outcome> {
        if path.exists() {
            return Ok(Outcome::Skipped(format!("{} already exists", path.display())));
        }
        let working_dir = self.repo.working_dir();
        let rel = relpath_nodots(path, working_dir)?;
        let patches_rel = relpath_nodots(patches, working_dir)?;

        let mut cmd = self.repo.git();
        cmd.arg("read-tree")
            .arg(format!("--prefix={}/", rel.display()))
            .arg(base);
        self.repo.run(cmd, "read-tree")?;

        let mut cmd = self.repo.git();
        cmd.args(["checkout", "--"]).arg(working_dir.join(&rel));
        self.repo.run(cmd, "checkout")?;

        let mut config = PqConfig::load(working_dir)?;
        config.subtrees.push(SubtreeEntry {
            path: rel.to_string_lossy().into_owned(),
            patches_path: patches_rel.to_string_lossy().into_owned(),
            base: base.to_string(),
        });
        config.store(working_dir)?;
        if !self.repo.index_has(Path::new(CONFIG_BASENAME))? {
            self.repo.add_to_index(Path::new(CONFIG_BASENAME))?;
        }

        info!("initialized subtree {} from {}", rel.display(), base);
        Ok(Outcome::Done)
    }

    /// Turn a frozen subtree into a live secondary checkout of its patch
    /// queue: build the scratch worktree, repoint its git-directory at the
    /// subtree, and drop a `.git` redirect file into the subtree itself.
    pub fn edit(&self, subtree: &Subtree) -> Result<Outcome> {
        if subtree.worktree.is_some() {
            return Ok(Outcome::Skipped(format!(
                "{} is already being edited",
                subtree.uipath().display()
            )));
        }
        // The finish-time teardown relies on the editing git-dir nesting
        // under this repository's worktrees/ namespace, which does not hold
        // when running from a secondary checkout.
        if !self.repo.is_primary() {
            bail!(
                "{} is not the primary git directory; run edit from the main checkout",
                self.repo.git_dir().display()
            );
        }

        let applied =
            self.repo
                .apply_patches_keep_tree(&subtree.patches_path, &subtree.base, &subtree.name)?;
        let relinked = self.relink_editing_worktree(subtree, &applied);

        // The scratch checkout's files duplicate what the frozen subtree
        // already holds; only its git-directory is kept. Removed on success
        // and failure alike.
        if let Err(e) = fs::remove_dir_all(&applied.worktree) {
            warn!(
                "failed to remove scratch checkout {}: {e}",
                applied.worktree.display()
            );
        }
        relinked?;

        info!(
            "now editing {} on branch {}",
            subtree.relpath.display(),
            applied.branch
        );
        Ok(Outcome::Done)
    }

    fn relink_editing_worktree(&self, subtree: &Subtree, applied: &AppliedPatches) -> Result<()> {
        let dot_git = subtree.path.join(".git");
        let mut rollback = Rollback::new();
        rollback.arm(|| {
            if let Err(e) = self.repo.delete_branch(&applied.branch) {
                warn!("rollback: failed to delete branch {}: {e}", applied.branch);
            }
        });
        rollback.arm(|| {
            if let Err(e) = fs::remove_dir_all(&applied.git_dir) {
                warn!(
                    "rollback: failed to remove git dir {}: {e}",
                    applied.git_dir.display()
                );
            }
        });

        fs::write(
            applied.git_dir.join("gitdir"),
            format!("{}\n", dot_git.display()),
        )
        .with_context(|| format!("repointing {}", applied.git_dir.display()))?;

        rollback.arm(|| {
            if dot_git.exists() {
                if let Err(e) = fs::remove_file(&dot_git) {
                    warn!("rollback: failed to remove {}: {e}", dot_git.display());
                }
            }
        });
        fs::write(&dot_git, format!("gitdir: {}\n", applied.git_dir.display()))
            .with_context(|| format!("writing {}", dot_git.display()))?;

        rollback.commit();
        Ok(())
    }

    /// Regenerate the patch set from the editing branch's commits: clear
    /// the directory, one patch per commit in `base..branch`, normalized.
    pub fn refresh(&self, subtree: &Subtree) -> Result<Outcome> {
        let Some(worktree) = &subtree.worktree else {
            return Ok(Outcome::Skipped(format!(
                "subtree {} is not being edited",
                subtree.relpath.display()
            )));
        };
        let Some(branch) = worktree.branch.as_deref() else {
            bail!(
                "editing worktree at {} has a detached HEAD",
                subtree.path.display()
            );
        };

        clear_patches(&subtree.patches_path)?;
        let mut cmd = self.repo.git();
        cmd.args(["format-patch", "--no-numbered", "-o"])
            .arg(&subtree.patches_path)
            .arg(format!("^{}", subtree.base))
            .arg(branch);
        self.repo.run(cmd, "format-patch")?;

        for patch in enumerate_patches(&subtree.patches_path)? {
            normalize_patch_file(&patch)
                .with_context(|| format!("normalizing {}", patch.display()))?;
        }
        Ok(Outcome::Done)
    }

    /// Turn an editing subtree back into a plain frozen directory: remove
    /// the `.git` redirect, the nested git-directory, and the branch. The
    /// checked-out files stay in place.
    pub fn finish(&self, subtree: &Subtree) -> Result<Outcome> {
        let Some(worktree) = &subtree.worktree else {
            return Ok(Outcome::Skipped(format!(
                "{} is not being edited",
                subtree.uipath().display()
            )));
        };
        let Some(branch) = worktree.branch.as_deref() else {
            bail!(
                "editing worktree at {} has a detached HEAD",
                subtree.path.display()
            );
        };

        let editing = GitRepo::open(&subtree.path)?;
        let editing_git_dir = fs::canonicalize(editing.git_dir())?;
        let main_git_dir = fs::canonicalize(self.repo.git_dir())?;

        // Refuse to delete unless the editing git-dir provably nests under
        // this repository's worktrees/ namespace.
        let nested = relpath_nodots(&editing_git_dir, &main_git_dir)
            .ok()
            .is_some_and(|rel| {
                let mut components = rel.components();
                components.next().is_some_and(|c| c.as_os_str() == "worktrees")
                    && components.next().is_some()
            });
        if !nested {
            bail!(
                "the git directory for {} is unexpectedly at {}, cannot proceed",
                subtree.uipath().display(),
                editing_git_dir.display()
            );
        }

        fs::remove_file(subtree.path.join(".git"))?;
        fs::remove_dir_all(&editing_git_dir)?;
        self.repo.delete_branch(branch)?;

        info!("finished editing {}", subtree.relpath.display());
        Ok(Outcome::Done)
    }
}
