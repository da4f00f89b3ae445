// ABOUTME: Main entry point for the git-pq command-line tool

use anyhow::Result;
use clap::{Parser, Subcommand};
use git_pq::pq::{Outcome, PatchQueueManager, Verdict};
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "git-pq", about = "Manage patch-queue subtrees with git worktrees")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show current status of git-pq enabled subtrees
    Status,
    /// Make a subtree editable using git-worktree
    Edit { subtree: PathBuf },
    /// Undo 'git pq edit' by turning a subtree back into a normal directory
    Finish { subtree: PathBuf },
    /// Refresh the patches of a subtree from its git branch
    Refresh { subtree: PathBuf },
    /// Verify that a subtree matches its patch directory
    Verify { subtree: PathBuf },
    /// Add a new subtree
    Init {
        /// Revision the patch queue is anchored to
        #[arg(long, short)]
        base: String,
        /// Directory holding the ordered patch files
        #[arg(long, short)]
        patches: PathBuf,
        subtree: PathBuf,
    },
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "git_pq=warn".into()),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn report_outcome(outcome: Outcome, out: &mut dyn Write) -> Result<()> {
    if let Outcome::Skipped(reason) = outcome {
        writeln!(out, "{reason}")?;
    }
    Ok(())
}

fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();
    let manager = PatchQueueManager::discover()?;
    let mut out = io::stdout();

    match cli.command {
        Command::Status => manager.status(&mut out)?,
        Command::Init {
            base,
            patches,
            subtree,
        } => {
            let outcome = manager.init(&subtree, &patches, &base)?;
            report_outcome(outcome, &mut out)?;
        }
        Command::Edit { subtree } => {
            let subtree = manager.subtree_by_path(&subtree)?;
            report_outcome(manager.edit(&subtree)?, &mut out)?;
        }
        Command::Finish { subtree } => {
            let subtree = manager.subtree_by_path(&subtree)?;
            report_outcome(manager.finish(&subtree)?, &mut out)?;
        }
        Command::Refresh { subtree } => {
            let subtree = manager.subtree_by_path(&subtree)?;
            report_outcome(manager.refresh(&subtree)?, &mut out)?;
        }
        Command::Verify { subtree } => {
            let subtree = manager.subtree_by_path(&subtree)?;
            let report = manager.verify(&subtree, &mut out)?;
            if report.verdict == Verdict::Fail {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
