//! Loader and validator configuration.
//!
//! Read from `cctree.toml`; every field has a serde default, so a missing
//! file, a missing section and a missing key all fall back to the behaviour of
//! `LoadOptions::default()` / `ValidateOptions::default()`.

use cctree_core::{LoadOptions, ValidateOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Canonical config file name.
pub const CONFIG_FILE_NAME: &str = "cctree.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ParserConfig {
    #[serde(default)]
    pub loader: LoaderSettings,
    #[serde(default)]
    pub validation: ValidationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoaderSettings {
    #[serde(default = "default_true")]
    pub skip_blank_lines: bool,
    /// `0` disables the limit.
    #[serde(default)]
    pub max_line_bytes: usize,
    /// Entry types to drop silently, e.g. `file-history-snapshot`.
    #[serde(default)]
    pub ignored_entry_types: Vec<String>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            skip_blank_lines: true,
            max_line_bytes: 0,
            ignored_entry_types: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationSettings {
    #[serde(default = "default_true")]
    pub check_timestamps: bool,
    #[serde(default = "default_true")]
    pub check_tool_use_ids: bool,
    #[serde(default = "default_true")]
    pub check_cycles: bool,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            check_timestamps: true,
            check_tool_use_ids: true,
            check_cycles: true,
        }
    }
}

impl From<&LoaderSettings> for LoadOptions {
    fn from(settings: &LoaderSettings) -> Self {
        Self {
            skip_blank_lines: settings.skip_blank_lines,
            max_line_bytes: (settings.max_line_bytes > 0).then_some(settings.max_line_bytes),
            ignored_entry_types: settings.ignored_entry_types.clone(),
        }
    }
}

impl From<&ValidationSettings> for ValidateOptions {
    fn from(settings: &ValidationSettings) -> Self {
        Self {
            check_timestamps: settings.check_timestamps,
            check_tool_use_ids: settings.check_tool_use_ids,
            check_cycles: settings.check_cycles,
        }
    }
}

impl ParserConfig {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions::from(&self.loader)
    }

    pub fn validate_options(&self) -> ValidateOptions {
        ValidateOptions::from(&self.validation)
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

pub fn load_config(path: &Path) -> Result<ParserConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_config_or_default(path: &Path) -> Result<ParserConfig, ConfigError> {
    if !path.exists() {
        return Ok(ParserConfig::default());
    }
    load_config(path)
}

// ── Serde default functions ─────────────────────────────────────────────

fn default_true() -> bool {
    true
}
