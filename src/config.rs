//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.pricewatch.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Analysis engine settings.
    #[serde(default)]
    pub engine: EngineConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Exit with code 2 when any target fails.
    #[serde(default)]
    pub fail_on_error: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            fail_on_error: false,
        }
    }
}

/// Upstream analysis engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Endpoint URL; one streaming request is opened here per target.
    #[serde(default = "default_engine_url")]
    pub url: String,

    /// Connect timeout in seconds. Bounds only the connection phase;
    /// a running analysis stream has no imposed duration limit.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: default_engine_url(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

fn default_engine_url() -> String {
    "http://localhost:8787/analyze".to_string()
}

fn default_connect_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".pricewatch.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        // Engine URL always overrides since it has a default in the CLI
        self.engine.url = args.engine_url.clone();

        // Timeout - only override if explicitly provided via CLI
        if let Some(timeout) = args.connect_timeout {
            self.engine.connect_timeout_seconds = timeout;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
        if args.fail_on_error {
            self.general.fail_on_error = true;
        }
    }
}
