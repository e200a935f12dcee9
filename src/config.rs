//! Configuration management
//!
//! Paths and tunables for the brain: where the log lives, how long a
//! writer waits for the lock, decay thresholds, and the default prompt
//! budget. Stored as TOML next to the other agent configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrainConfig {
    /// Path to the NDJSON log file
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    /// Milliseconds to wait for the write lock before giving up
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Days a learning may go unused before decay considers it
    #[serde(default = "default_decay_after_days")]
    pub decay_after_days: f64,
    /// Score below which an unused learning decays
    #[serde(default = "default_decay_min_score")]
    pub decay_min_score: f64,
    /// Default token budget for the learnings section of the prompt
    #[serde(default = "default_prompt_budget_tokens")]
    pub prompt_budget_tokens: usize,
}

fn default_log_path() -> PathBuf {
    data_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("brain.ndjson")
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_decay_after_days() -> f64 {
    crate::decay::DEFAULT_AFTER_DAYS
}

fn default_decay_min_score() -> f64 {
    crate::decay::DEFAULT_MIN_SCORE
}

fn default_prompt_budget_tokens() -> usize {
    800
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            lock_timeout_ms: default_lock_timeout_ms(),
            decay_after_days: default_decay_after_days(),
            decay_min_score: default_decay_min_score(),
            prompt_budget_tokens: default_prompt_budget_tokens(),
        }
    }
}

impl BrainConfig {
    /// Load configuration from file, writing defaults on first run
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            let config: BrainConfig =
                toml::from_str(&contents).context("Failed to parse config file")?;
            Ok(config)
        } else {
            let config = BrainConfig::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = config_path()?;
        let parent = config_path.parent().context("Config path has no parent")?;

        std::fs::create_dir_all(parent).context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Configuration rooted at a custom log path (tests, embedders)
    pub fn with_log_path(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            ..Self::default()
        }
    }

    /// Lock timeout as a duration
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "agent-brain", "agent-brain")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "agent-brain", "agent-brain")
        .context("Failed to get project directories")?;
    Ok(base.data_dir().to_path_buf())
}
