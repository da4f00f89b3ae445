// ABOUTME: Load/store of the .git-pq configuration document that lists the
// managed patch-queue subtrees

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Basename of the config document, at the root of the working tree.
pub const CONFIG_BASENAME: &str = ".git-pq";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: io::Error,
    },
    #[error("malformed config {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// One configured subtree, exactly as persisted. Paths are stored relative
/// to the working-tree root; validation happens when a `Subtree` record is
/// built from the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtreeEntry {
    pub path: String,
    pub patches_path: String,
    pub base: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PqConfig {
    #[serde(default)]
    pub subtrees: Vec<SubtreeEntry>,
}

impl PqConfig {
    pub fn config_path(working_dir: &Path) -> PathBuf {
        working_dir.join(CONFIG_BASENAME)
    }

    /// Load the config from the working-tree root; an absent file is an
    /// empty config. Always reads fresh, never cached.
    pub fn load(working_dir: &Path) -> Result<Self, ConfigError> {
        let path = Self::config_path(working_dir);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no config at {}, starting empty", path.display());
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Malformed { path, source })
    }

    pub fn store(&self, working_dir: &Path) -> Result<(), ConfigError> {
        let path = Self::config_path(working_dir);
        let text = serde_yaml::to_string(self).map_err(|source| ConfigError::Malformed {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, text).map_err(|source| ConfigError::Io { path, source })
    }
}
