use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// How a confirmed reference is written into the input text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceEncoding {
    /// `[@name](scheme://path)`
    #[default]
    Markdown,
    /// `@scheme://path`
    Bare,
}

fn default_debounce_ms() -> u64 {
    200
}
fn default_max_results() -> usize {
    50
}
fn default_recent_limit() -> usize {
    20
}
fn default_true() -> bool {
    true
}

/// Stored settings, `~/.atlink/config.json`. Every field has a default so a
/// partial file is fine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AtlinkConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
    #[serde(default)]
    pub reference_encoding: ReferenceEncoding,
    #[serde(default = "default_true")]
    pub index_ignore_hidden: bool,
    /// Glob patterns, relative to the index root, left out of the index.
    #[serde(default)]
    pub index_exclude: Vec<String>,
}

impl Default for AtlinkConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            max_results: default_max_results(),
            recent_limit: default_recent_limit(),
            reference_encoding: ReferenceEncoding::default(),
            index_ignore_hidden: true,
            index_exclude: Vec::new(),
        }
    }
}

impl AtlinkConfig {
    /// `~/.atlink`
    pub fn data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".atlink")
    }

    pub fn config_path() -> PathBuf {
        Self::data_dir().join("config.json")
    }

    /// Load from ~/.atlink/config.json, falling back to defaults when absent.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = match std::fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&data).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save to ~/.atlink/config.json
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
