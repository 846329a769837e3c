//! Optional TOML config file.
//!
//! The file supplies the lowest-priority [`ConfigLayer`]; anything given on
//! the command line or through the environment overrides it.  All sections
//! and keys are optional, unknown keys are rejected so typos do not silently
//! fall back to defaults.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::ConfigLayer;

/// Error type for config file operations.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Reads and parses the config file at `path`.
///
/// # Errors
///
/// [`ConfigFileError::Io`] if the file cannot be read,
/// [`ConfigFileError::Parse`] if it is not valid for [`ConfigLayer`].
pub fn load_config_file(path: &Path) -> Result<ConfigLayer, ConfigFileError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text)
}

/// Parses TOML text into a [`ConfigLayer`].
pub fn parse_config(text: &str) -> Result<ConfigLayer, ConfigFileError> {
    Ok(toml::from_str(text)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
