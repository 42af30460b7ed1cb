//! Configuration file support.

use serde::Deserialize;
use std::path::PathBuf;
use stepsheet::MergePolicy;

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default CLI options.
    pub defaults: Defaults,
}

/// Default CLI options.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Enable verbose output by default.
    pub verbose: bool,
    /// Enable quiet output by default.
    pub quiet: bool,
    /// Whether consecutive code chunks are merged ("eager" or "disabled").
    pub merge: Option<MergePolicy>,
    /// Format for saved analyses when the path has no known extension.
    pub analysis_format: Option<String>,
}

impl Config {
    /// Load config from the default location (~/.config/stepsheet/config.toml).
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// Load config from a specific path.
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        // Logging is not set up yet, so problems go straight to stderr.
        match std::fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse config file: {}", e);
                Self::default()
            }),
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Get the default config file path.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("stepsheet").join("config.toml"))
    }

    /// Merge policy, unless the command line turned merging off.
    pub fn merge_policy(&self, no_merge: bool) -> MergePolicy {
        if no_merge {
            MergePolicy::Disabled
        } else {
            self.defaults.merge.unwrap_or_default()
        }
    }
}
