// ABOUTME: End-to-end tests for the patch-queue lifecycle: init, edit,
// refresh, finish against real git repositories

use git_pq::config::PqConfig;
use git_pq::models::SubtreeState;
use git_pq::pq::{Outcome, PatchQueueManager};
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// A repository with one commit on its default branch and a `libbase`
/// branch whose root tree holds lib.c.
fn setup_repo() -> (TempDir, PatchQueueManager) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path();

    git(root, &["init"]);
    git(root, &["config", "user.name", "Test User"]);
    git(root, &["config", "user.email", "test@example.com"]);
    std::fs::write(root.join("README.md"), "top-level project\n").unwrap();
    git(root, &["add", "README.md"]);
    git(root, &["commit", "-m", "initial"]);

    seed_branch(root, "libbase", &[("lib.c", "int answer = 42;\n")]);

    let manager = PatchQueueManager::discover_from(root).expect("discover repo");
    (temp_dir, manager)
}

/// Create `branch` at a fresh root commit holding the given files, without
/// touching the checked-out tree.
fn seed_branch(root: &Path, branch: &str, files: &[(&str, &str)]) {
    let repo = git2::Repository::open(root).unwrap();
    let signature = git2::Signature::now("Test User", "test@example.com").unwrap();
    let mut builder = repo.treebuilder(None).unwrap();
    for (name, contents) in files {
        let blob = repo.blob(contents.as_bytes()).unwrap();
        builder.insert(name, blob, 0o100_644).unwrap();
    }
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();
    repo.commit(
        Some(&format!("refs/heads/{branch}")),
        &signature,
        &signature,
        &format!("seed {branch}"),
        &tree,
        &[],
    )
    .unwrap();
}

#[test]
fn test_init_materializes_subtree_and_config() {
    let (temp_dir, manager) = setup_repo();
    let root = temp_dir.path();

    let outcome = manager
        .init(&root.join("vendor"), &root.join("patches"), "libbase")
        .expect("init");
    assert_eq!(outcome, Outcome::Done);

    // Base tree checked out at the prefix, entry persisted, config staged.
    assert_eq!(
        std::fs::read_to_string(root.join("vendor/lib.c")).unwrap(),
        "int answer = 42;\n"
    );
    let config = PqConfig::load(root).unwrap();
    assert_eq!(config.subtrees.len(), 1);
    assert_eq!(config.subtrees[0].path, "vendor");
    assert_eq!(config.subtrees[0].base, "libbase");
    assert!(manager
        .repo()
        .index_has(Path::new(".git-pq"))
        .unwrap());
}

#[test]
fn test_init_existing_path_is_reported_not_destroyed() {
    let (temp_dir, manager) = setup_repo();
    let root = temp_dir.path();

    manager
        .init(&root.join("vendor"), &root.join("patches"), "libbase")
        .unwrap();
    let outcome = manager
        .init(&root.join("vendor"), &root.join("patches"), "libbase")
        .expect("second init");
    assert!(matches!(outcome, Outcome::Skipped(_)));

    assert!(root.join("vendor/lib.c").exists());
    assert_eq!(PqConfig::load(root).unwrap().subtrees.len(), 1);
}

#[test]
fn test_edit_turns_subtree_into_worktree() {
    let (temp_dir, manager) = setup_repo();
    let root = temp_dir.path();
    manager
        .init(&root.join("vendor"), &root.join("patches"), "libbase")
        .unwrap();
    git(root, &["commit", "-m", "add vendor subtree"]);

    let subtree = manager.subtree_by_path(&root.join("vendor")).unwrap();
    assert_eq!(subtree.state(), SubtreeState::Clean);

    let outcome = manager.edit(&subtree).expect("edit");
    assert_eq!(outcome, Outcome::Done);
    assert!(root.join("vendor/.git").is_file());
    assert!(manager.repo().is_worktree(&root.join("vendor")).unwrap());

    let subtree = manager.subtree_by_path(&root.join("vendor")).unwrap();
    assert_eq!(subtree.state(), SubtreeState::Editing);
    let worktree = subtree.worktree.as_ref().unwrap();
    assert_eq!(worktree.branch_short(), Some("pq-vendor"));

    // The scratch checkout is consumed during the relink.
    assert!(!manager.repo().scratch_worktree_path("vendor").exists());
}

#[test]
fn test_edit_while_editing_is_skipped_and_harmless() {
    let (temp_dir, manager) = setup_repo();
    let root = temp_dir.path();
    manager
        .init(&root.join("vendor"), &root.join("patches"), "libbase")
        .unwrap();
    git(root, &["commit", "-m", "add vendor subtree"]);

    let subtree = manager.subtree_by_path(&root.join("vendor")).unwrap();
    manager.edit(&subtree).unwrap();

    let subtree = manager.subtree_by_path(&root.join("vendor")).unwrap();
    let outcome = manager.edit(&subtree).expect("second edit");
    assert!(matches!(outcome, Outcome::Skipped(_)));

    // The existing editing state is untouched.
    assert!(root.join("vendor/.git").is_file());
    assert!(manager.repo().is_worktree(&root.join("vendor")).unwrap());
}

#[test]
fn test_refresh_without_commits_leaves_empty_patch_set() {
    let (temp_dir, manager) = setup_repo();
    let root = temp_dir.path();
    manager
        .init(&root.join("vendor"), &root.join("patches"), "libbase")
        .unwrap();
    git(root, &["commit", "-m", "add vendor subtree"]);

    let subtree = manager.subtree_by_path(&root.join("vendor")).unwrap();
    manager.edit(&subtree).unwrap();

    let subtree = manager.subtree_by_path(&root.join("vendor")).unwrap();
    assert_eq!(manager.refresh(&subtree).unwrap(), Outcome::Done);
    let patches = git_pq::patch::enumerate_patches(&root.join("patches")).unwrap();
    assert!(patches.is_empty());

    assert_eq!(manager.finish(&subtree).unwrap(), Outcome::Done);
    assert!(!root.join("vendor/.git").exists());
    assert!(root.join("vendor/lib.c").exists());
}

#[test]
fn test_full_cycle_with_one_change() {
    let (temp_dir, manager) = setup_repo();
    let root = temp_dir.path();
    manager
        .init(&root.join("vendor"), &root.join("patches"), "libbase")
        .unwrap();
    git(root, &["commit", "-m", "add vendor subtree"]);

    let subtree = manager.subtree_by_path(&root.join("vendor")).unwrap();
    manager.edit(&subtree).unwrap();

    // One commit in the editing checkout.
    std::fs::write(root.join("vendor/extra.c"), "int extra = 1;\n").unwrap();
    git(&root.join("vendor"), &["add", "extra.c"]);
    git(&root.join("vendor"), &["commit", "-m", "add extra.c"]);

    let subtree = manager.subtree_by_path(&root.join("vendor")).unwrap();
    manager.refresh(&subtree).unwrap();

    let patches = git_pq::patch::enumerate_patches(&root.join("patches")).unwrap();
    assert_eq!(patches.len(), 1, "one commit makes one patch");
    let text = std::fs::read_to_string(&patches[0]).unwrap();
    assert!(text.contains("Subject: [PATCH] add extra.c"));
    assert!(text.contains("+int extra = 1;"));
    assert!(!text.contains("\nindex "), "index lines are normalized away");
    assert!(!text.starts_with("From "), "mbox From line is normalized away");

    manager.finish(&subtree).unwrap();
    assert!(!root.join("vendor/.git").exists());
    // Residual files stay after finish.
    assert!(root.join("vendor/extra.c").exists());

    let subtree = manager.subtree_by_path(&root.join("vendor")).unwrap();
    assert_eq!(subtree.state(), SubtreeState::Clean);
}

#[test]
fn test_edit_refused_from_secondary_checkout() {
    let (temp_dir, manager) = setup_repo();
    let root = temp_dir.path();
    manager
        .init(&root.join("vendor"), &root.join("patches"), "libbase")
        .unwrap();
    git(root, &["commit", "-m", "add vendor subtree"]);

    git(root, &["worktree", "add", "second"]);
    let second = root.join("second");
    let from_second = PatchQueueManager::discover_from(&second).unwrap();
    let subtree = from_second.subtree_by_path(&second.join("vendor")).unwrap();

    let err = from_second.edit(&subtree);
    assert!(err.is_err(), "edit must be refused outside the primary checkout");

    // Neither copy of the subtree was touched and no branch was created.
    assert!(!second.join("vendor/.git").exists());
    assert!(!root.join("vendor/.git").exists());
    let repo = git2::Repository::open(root).unwrap();
    assert!(repo
        .find_branch("pq-vendor", git2::BranchType::Local)
        .is_err());
}

#[test]
fn test_edit_rolls_back_when_relink_fails() {
    let (temp_dir, manager) = setup_repo();
    let root = temp_dir.path();
    manager
        .init(&root.join("vendor"), &root.join("patches"), "libbase")
        .unwrap();
    git(root, &["commit", "-m", "add vendor subtree"]);

    // A directory squatting at vendor/.git makes the redirect file
    // unwritable, failing the relink after the scratch apply succeeded.
    std::fs::create_dir(root.join("vendor/.git")).unwrap();

    let subtree = manager.subtree_by_path(&root.join("vendor")).unwrap();
    assert!(manager.edit(&subtree).is_err());

    // The scratch checkout, its registration, and the branch are all gone.
    assert!(!manager.repo().scratch_worktree_path("vendor").exists());
    assert!(!manager
        .repo()
        .git_dir()
        .join("worktrees/temp-vendor")
        .exists());
    let repo = git2::Repository::open(root).unwrap();
    assert!(repo
        .find_branch("pq-vendor", git2::BranchType::Local)
        .is_err());

    let subtree = manager.subtree_by_path(&root.join("vendor")).unwrap();
    assert_eq!(subtree.state(), SubtreeState::Clean);
}

#[test]
fn test_finish_when_not_editing_is_skipped() {
    let (temp_dir, manager) = setup_repo();
    let root = temp_dir.path();
    manager
        .init(&root.join("vendor"), &root.join("patches"), "libbase")
        .unwrap();
    git(root, &["commit", "-m", "add vendor subtree"]);

    let subtree = manager.subtree_by_path(&root.join("vendor")).unwrap();
    assert!(matches!(
        manager.finish(&subtree).unwrap(),
        Outcome::Skipped(_)
    ));
    assert!(matches!(
        manager.refresh(&subtree).unwrap(),
        Outcome::Skipped(_)
    ));
}

#[test]
fn test_finish_refuses_foreign_git_directory() {
    let (temp_dir, manager) = setup_repo();
    let root = temp_dir.path();
    manager
        .init(&root.join("vendor"), &root.join("patches"), "libbase")
        .unwrap();
    git(root, &["commit", "-m", "add vendor subtree"]);

    let subtree = manager.subtree_by_path(&root.join("vendor")).unwrap();
    manager.edit(&subtree).unwrap();

    // Point the subtree's .git redirect at an unrelated repository.
    let other = root.join("other");
    std::fs::create_dir(&other).unwrap();
    git(&other, &["init"]);
    std::fs::write(
        root.join("vendor/.git"),
        format!("gitdir: {}\n", other.join(".git").display()),
    )
    .unwrap();

    let subtree = manager.subtree_by_path(&root.join("vendor")).unwrap();
    assert_eq!(subtree.state(), SubtreeState::Editing);
    let err = manager.finish(&subtree);
    assert!(err.is_err(), "finish must refuse a non-nested git dir");

    // Nothing was deleted.
    assert!(root.join("vendor/.git").exists());
    assert!(other.join(".git").exists());
}

#[test]
fn test_status_reports_lifecycle_state() {
    let (temp_dir, manager) = setup_repo();
    let root = temp_dir.path();
    manager
        .init(&root.join("vendor"), &root.join("patches"), "libbase")
        .unwrap();
    git(root, &["commit", "-m", "add vendor subtree"]);

    let mut out = Vec::new();
    manager.status(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("vendor"));
    assert!(text.contains("[not editing]"));

    let subtree = manager.subtree_by_path(&root.join("vendor")).unwrap();
    manager.edit(&subtree).unwrap();

    let mut out = Vec::new();
    manager.status(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("[editing: pq-vendor]"));
}
