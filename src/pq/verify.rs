// ABOUTME: Consistency verification: proves a subtree's tree content, index
// state, and patch files agree, without mutating anything persistent

use super::PatchQueueManager;
use crate::git::GitRepo;
use crate::models::Subtree;
use crate::patch::enumerate_patches;
use crate::paths::relpath_nodots;
use anyhow::Result;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Patches reproduce HEAD's subtree and nothing is dirty.
    Pass,
    /// Patches reproduce HEAD's subtree, but the worktree or index carries
    /// uncommitted noise.
    SoftPass,
    /// Applying the patch set does not reproduce HEAD's subtree.
    Fail,
}

impl Verdict {
    pub fn is_pass(self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

#[derive(Debug)]
pub struct VerifyReport {
    pub verdict: Verdict,
    pub messages: Vec<String>,
}

impl PatchQueueManager {
    /// Run every check and report all findings; nothing short-circuits.
    /// Only the core equivalence check (patches applied to base vs the tree
    /// at HEAD) decides pass-vs-fail; the other checks downgrade a pass to
    /// a soft pass. Internally performs an ephemeral scratch apply that is
    /// always torn down.
    pub fn verify(&self, subtree: &Subtree, out: &mut dyn Write) -> Result<VerifyReport> {
        let mut messages = Vec::new();
        let uipath = subtree.uipath();

        if self.repo().has_unstaged_changes(Some(&subtree.relpath))? {
            messages.push(format!("There are unstaged changes at {}", uipath.display()));
        }
        if self.repo().has_staged_changes(Some(&subtree.relpath))? {
            messages.push(format!(
                "There are changes staged for commit at {}",
                uipath.display()
            ));
        }

        if subtree.worktree.is_some() {
            let editing = GitRepo::open(&subtree.path)?;
            if editing.has_unstaged_changes(None)? {
                messages.push(format!(
                    "There are unstaged changes (in the worktree) at {}",
                    uipath.display()
                ));
            }
            if editing.has_staged_changes(None)? {
                messages.push(format!(
                    "There are changes staged (in the worktree) at {}",
                    uipath.display()
                ));
            }
        }

        for patch in enumerate_patches(&subtree.patches_path)? {
            let rel = relpath_nodots(&patch, self.repo().working_dir())?;
            if !self.repo().index_has(&rel)? {
                messages.push(format!("patch not added to index: {}", rel.display()));
            }
        }

        let dirty = !messages.is_empty();

        let applied = self
            .repo()
            .test_apply(&subtree.patches_path, &subtree.base)?;
        let head_subtree = format!("HEAD:{}", subtree.relpath.display());
        let verdict = if self.repo().trees_differ(&applied, &head_subtree)? {
            messages.push(format!(
                "❌ Subtree at {} does not match patches",
                uipath.display()
            ));
            messages.push(format!("to see: git diff {applied} {head_subtree}"));
            Verdict::Fail
        } else if dirty {
            messages.push(format!(
                "✓ Patches match {head_subtree}, but worktree or index is dirty."
            ));
            Verdict::SoftPass
        } else {
            messages.push(format!("✅ Subtree at {} looks good", uipath.display()));
            Verdict::Pass
        };

        for line in &messages {
            writeln!(out, "{line}")?;
        }
        Ok(VerifyReport { verdict, messages })
    }
}
