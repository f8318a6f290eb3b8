use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RankError, RankResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub scoring: ScoringConfig,
    pub search: SearchConfig,
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the usage database. `~` and environment variables are expanded.
    pub database: String,
}

/// Weights and decay constants of the usage model.
///
/// A choice adds `all_time_weight` to the all-time bucket and
/// `week_weight - spillover_step * |offset|` to every time-of-week bucket
/// within `spillover_slots` five-minute slots of the choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub all_time_weight: i64,
    pub week_weight: i64,
    pub spillover_slots: i64,
    pub spillover_step: i64,
    pub decay_factor: f64,
    pub prune_below: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub most_used_limit: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Initial state of the raw choice log for a fresh database.
    pub collect_raw_choices: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let database = dirs::data_dir()
            .map(|d| d.join("launchrank").join("usage.sqlite"))
            .unwrap_or_else(|| PathBuf::from("~/.launchrank/usage.sqlite"));
        Self {
            database: database.to_string_lossy().into_owned(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            all_time_weight: 10,
            week_weight: 300,
            spillover_slots: 5,
            spillover_step: 5,
            decay_factor: 0.9,
            prune_below: 6,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { most_used_limit: 8 }
    }
}

impl StorageConfig {
    /// The database path with `~` and `$VARS` expanded.
    pub fn database_path(&self) -> PathBuf {
        let expanded = shellexpand::full(&self.database)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| shellexpand::tilde(&self.database).into_owned());
        PathBuf::from(expanded)
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .map(|h| h.join(".config"))
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
            })
            .join("launchrank")
            .join("config.toml")
    }

    /// Load config from the default location, or return defaults if not found
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`. A missing or unreadable file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        let mut config = if path.exists() {
            match Self::parse_file(path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        config.validate();
        config
    }

    fn parse_file(path: &Path) -> RankResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate and clamp config values to acceptable ranges
    fn validate(&mut self) {
        let scoring = &mut self.scoring;

        // A factor outside (0, 1) would grow scores or wipe them in one sweep
        if !(scoring.decay_factor > 0.0 && scoring.decay_factor < 1.0) {
            scoring.decay_factor = ScoringConfig::default().decay_factor;
        }

        scoring.all_time_weight = scoring.all_time_weight.max(0);
        scoring.spillover_slots = scoring.spillover_slots.clamp(0, 24);
        scoring.spillover_step = scoring.spillover_step.max(0);
        // Every spilled bucket must still receive a positive score
        let max_step = scoring.week_weight.max(1) / (scoring.spillover_slots + 1);
        scoring.spillover_step = scoring.spillover_step.min(max_step);
        scoring.week_weight = scoring.week_weight.max(1);
        scoring.prune_below = scoring.prune_below.max(1);

        self.search.most_used_limit = self.search.most_used_limit.clamp(1, 50);
    }

    /// Save config to the default location
    pub fn save(&self) -> RankResult<()> {
        self.save_to(&Self::config_path())
    }

    /// Save config to `path`, creating the parent directory if needed
    pub fn save_to(&self, path: &Path) -> RankResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| RankError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)?;
        Ok(())
    }
}
