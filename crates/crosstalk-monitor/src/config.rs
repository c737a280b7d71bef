//! Monitor configuration.

use anyhow::{Context, Result};
use crosstalk_core::EngineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// What the monitor prints to stdout.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Emit one JSON object per line instead of text.
    #[serde(default)]
    pub json: bool,
    /// Also print plain message events, not just tool use.
    #[serde(default)]
    pub show_messages: bool,
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Load config from config/crosstalk.toml or fall back to defaults.
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from("config/crosstalk.toml");
        if config_path.exists() {
            return Self::load_from(&config_path);
        }

        Ok(Config::default())
    }
}
