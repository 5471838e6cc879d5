use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

const CONFIG_FILENAME: &str = "config.json";
const DEFAULT_EXCERPT_RADIUS: usize = 30;

/// Configuration for reqlog, stored as config.json.
///
/// Passed explicitly into the store and the CLI context; there is no
/// ambient global configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReqlogConfig {
    /// Base directory that a leading `~` in document paths expands to,
    /// and the default directory for listing and searching. Empty means
    /// "unset"; the CLI substitutes its platform data directory.
    #[serde(default)]
    pub base_dir: PathBuf,

    /// Characters of context kept on each side of a search excerpt.
    #[serde(default = "default_excerpt_radius")]
    pub excerpt_radius: usize,
}

fn default_excerpt_radius() -> usize {
    DEFAULT_EXCERPT_RADIUS
}

impl Default for ReqlogConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::new(),
            excerpt_radius: DEFAULT_EXCERPT_RADIUS,
        }
    }
}

impl ReqlogConfig {
    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)?;
        let config: ReqlogConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to the given directory
    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();
        if !config_dir.exists() {
            fs::create_dir_all(config_dir)?;
        }

        let config_path = config_dir.join(CONFIG_FILENAME);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, content)?;
        Ok(())
    }
}
