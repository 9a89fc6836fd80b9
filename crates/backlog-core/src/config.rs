//! TOML configuration for codec limits and plugin message types.
//!
//! ```toml
//! [codec]
//! max_payload_size = 1048576
//!
//! [plugins]
//! Weather = 90
//! GPS = 60
//! ```
//!
//! Every field is optional.  Missing values fall back to the defaults below,
//! so an empty file (or no file at all) yields [`BacklogConfig::default`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::message::MAX_PAYLOAD_SIZE;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but is outside its allowed range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BacklogConfig {
    #[serde(default)]
    pub codec: CodecConfig,
    /// Plugin name → message type code, registered on top of the shipped plugins.
    #[serde(default)]
    pub plugins: BTreeMap<String, u8>,
}

/// Codec limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodecConfig {
    /// Largest payload accepted, in bytes.  Cannot exceed [`MAX_PAYLOAD_SIZE`].
    #[serde(default = "default_max_payload_size")]
    pub max_payload_size: u64,
}

fn default_max_payload_size() -> u64 {
    MAX_PAYLOAD_SIZE
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_payload_size: default_max_payload_size(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl BacklogConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML, [`ConfigError::Invalid`] for
    /// out-of-range values.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BacklogConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration at `path`, returning the default configuration
    /// if the file does not exist.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] for file-system errors other than "not found", plus
    /// the errors of [`BacklogConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.codec.max_payload_size > MAX_PAYLOAD_SIZE {
            return Err(ConfigError::Invalid {
                field: "codec.max_payload_size",
                reason: format!(
                    "{} exceeds the protocol maximum of {MAX_PAYLOAD_SIZE}",
                    self.codec.max_payload_size
                ),
            });
        }
        Ok(())
    }
}
