//! Host configuration.
//!
//! Loaded from a TOML file; every field has a default except the library
//! path, which must come from the file or the command line.
//!
//! ```toml
//! library = "target/release/libarrow_exporter.so"
//! symbol = "export_int32_data"
//! preview_rows = 10
//! log_level = "info"
//! ```

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "handoff.toml";

/// Errors raised while loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The config file is not valid TOML for [`HostConfig`].
    #[error("Invalid config file {}: {source}", .path.display())]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Neither the file nor the command line named an exporter library.
    #[error("No exporter library configured; set `library` in the config file or pass --library")]
    MissingLibrary,
}

/// Host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Shared library exporting the array.
    #[serde(default)]
    pub library: Option<PathBuf>,

    /// Exported symbol with signature `void (*)(struct ArrowArray*)`.
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Number of rows to print.
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,

    /// Log level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_symbol() -> String {
    "export_int32_data".to_string()
}

fn default_preview_rows() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            library: None,
            symbol: default_symbol(),
            preview_rows: default_preview_rows(),
            log_level: default_log_level(),
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--library`
    pub library: Option<PathBuf>,
    /// `--symbol`
    pub symbol: Option<String>,
    /// `--preview`
    pub preview_rows: Option<usize>,
    /// `--log-level`
    pub log_level: Option<String>,
}

impl HostConfig {
    /// Parse a config from TOML text; `path` is only used in errors.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid TOML or unknown keys.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a config file that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if it is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    /// Load `path`, falling back to defaults when it does not exist and was
    /// not explicitly requested.
    ///
    /// # Errors
    ///
    /// As [`HostConfig::load`], except that a missing implicit file is not
    /// an error.
    pub fn load_or_default(path: &Path, explicit: bool) -> Result<Self, ConfigError> {
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Apply command-line overrides.
    #[must_use]
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(library) = overrides.library {
            self.library = Some(library);
        }
        if let Some(symbol) = overrides.symbol {
            self.symbol = symbol;
        }
        if let Some(rows) = overrides.preview_rows {
            self.preview_rows = rows;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
        self
    }

    /// The configured library path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingLibrary`] if none is set.
    pub fn library(&self) -> Result<&Path, ConfigError> {
        self.library.as_deref().ok_or(ConfigError::MissingLibrary)
    }
}
