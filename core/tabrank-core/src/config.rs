//! Configuration loading.
//!
//! Reads `~/.tabrank/config.toml`. A missing file means defaults; every field
//! inside the file is optional.
//!
//! ```toml
//! [scoring]
//! idle_time = 0.5
//!
//! [recommendation]
//! grace_period_secs = 5.0
//! keep_min = 20.0
//!
//! [display]
//! outbox_capacity = 256
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::display::DisplayConfig;
use crate::error::{Result, TabRankError};
use crate::recommend::RecommendationThresholds;
use crate::scoring::ScoringWeights;

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabRankConfig {
    #[serde(default)]
    pub scoring: ScoringWeights,
    #[serde(default)]
    pub recommendation: RecommendationThresholds,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Returns the tabrank data directory (`~/.tabrank`).
pub fn tabrank_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".tabrank"))
}

pub fn default_config_path() -> Option<PathBuf> {
    tabrank_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Loads the config at `path` (or the default location).
///
/// A missing file yields defaults. An unreadable or malformed file is an error
/// so callers can decide whether to fall back.
pub fn load_config(path: Option<&Path>) -> Result<TabRankConfig> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) => path,
            None => return Ok(TabRankConfig::default()),
        },
    };

    if !config_path.exists() {
        return Ok(TabRankConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|source| TabRankError::Io {
        context: format!("reading {}", config_path.display()),
        source,
    })?;

    toml::from_str::<TabRankConfig>(&content).map_err(|err| TabRankError::ConfigMalformed {
        path: config_path,
        details: err.to_string(),
    })
}
