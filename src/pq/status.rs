// ABOUTME: Status projection: renders lifecycle state for every configured
// subtree as an aligned table

use super::PatchQueueManager;
use anyhow::Result;
use std::io::{self, Write};

pub(crate) fn render_table<const N: usize>(
    rows: &[[String; N]],
    out: &mut dyn Write,
) -> io::Result<()> {
    let mut widths = [0usize; N];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            write!(out, "{:<width$}", cell, width = widths[i] + 2)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

impl PatchQueueManager {
    /// One row per configured subtree: its relative path and whether it is
    /// being edited (and on which branch).
    pub fn status(&self, out: &mut dyn Write) -> Result<()> {
        let mut rows = Vec::new();
        for subtree in self.subtrees()? {
            let state = match &subtree.worktree {
                Some(worktree) => format!(
                    "[editing: {}]",
                    worktree.branch_short().unwrap_or("(detached)")
                ),
                None => "[not editing]".to_string(),
            };
            rows.push([subtree.relpath.display().to_string(), state]);
        }
        render_table(&rows, out)?;
        writeln!(out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_table_aligns_columns() {
        let rows = vec![
            ["vendor/widget".to_string(), "[not editing]".to_string()],
            ["lib".to_string(), "[editing: pq-lib]".to_string()],
        ];
        let mut out = Vec::new();
        render_table(&rows, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "vendor/widget  [not editing]      \nlib            [editing: pq-lib]  \n"
        );
    }

    #[test]
    fn test_render_table_empty() {
        let rows: Vec<[String; 2]> = Vec::new();
        let mut out = Vec::new();
        render_table(&rows, &mut out).unwrap();
        assert!(out.is_empty());
    }
}
