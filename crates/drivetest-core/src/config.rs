//! Trainer configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::selection::{DEFAULT_HARD_MIN_ATTEMPTED, DEFAULT_TOP500_TARGET, EXAM_BATCH_SIZE};

/// Top-level drivetest configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Directory holding the question banks and mnemonic table.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory holding per-partition progress files.
    #[serde(default = "default_progress_dir")]
    pub progress_dir: PathBuf,
    /// How long to wait for a partition lock before giving up.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,
    /// Attempted questions required before hard mode opens.
    #[serde(default = "default_hard_min_attempted")]
    pub hard_min_attempted: usize,
    /// Size of the curated top-500 subset.
    #[serde(default = "default_top500_target")]
    pub top500_target: usize,
    /// Questions per exam batch.
    #[serde(default = "default_exam_batch_size")]
    pub exam_batch_size: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_progress_dir() -> PathBuf {
    PathBuf::from("./progress")
}
fn default_lock_timeout() -> u64 {
    5000
}
fn default_hard_min_attempted() -> usize {
    DEFAULT_HARD_MIN_ATTEMPTED
}
fn default_top500_target() -> usize {
    DEFAULT_TOP500_TARGET
}
fn default_exam_batch_size() -> usize {
    EXAM_BATCH_SIZE
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            progress_dir: default_progress_dir(),
            lock_timeout_ms: default_lock_timeout(),
            hard_min_attempted: default_hard_min_attempted(),
            top500_target: default_top500_target(),
            exam_batch_size: default_exam_batch_size(),
        }
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `drivetest.toml` in the current directory
/// 2. `~/.config/drivetest/config.toml`
///
/// Environment variable overrides: `DRIVETEST_DATA_DIR`, `DRIVETEST_PROGRESS_DIR`.
pub fn load_config() -> Result<TrainerConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<TrainerConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("drivetest.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = toml::from_str::<TrainerConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!("loaded config from {}", path.display());
            config
        }
        None => TrainerConfig::default(),
    };

    // Apply env var overrides
    if let Ok(dir) = std::env::var("DRIVETEST_DATA_DIR") {
        config.data_dir = PathBuf::from(dir);
    }
    if let Ok(dir) = std::env::var("DRIVETEST_PROGRESS_DIR") {
        config.progress_dir = PathBuf::from(dir);
    }

    if config.exam_batch_size == 0 {
        anyhow::bail!("exam_batch_size must be at least 1");
    }

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("drivetest"))
}
