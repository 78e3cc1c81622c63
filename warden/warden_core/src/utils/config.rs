//! Configuration utilities.
//!
//! Registry configuration is read from TOML. Every field has a default, so
//! an empty document is a valid configuration.
//!
//! ```
//! use warden_core::utils::config::{RegistryConfig, TieBreak};
//!
//! let config = RegistryConfig::from_toml_str(r#"
//!     location = "/etc/warden/services"
//!     tie_break = "name"
//!
//!     [logging]
//!     level = "debug"
//! "#).unwrap();
//!
//! assert_eq!(config.tie_break, TieBreak::Name);
//! assert!(config.pretty);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::logging::LoggingConfig;
use crate::error::{Error, Result};

/// How to order services whose evaluation order is equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The service with the smaller id wins.
    #[default]
    LowestId,

    /// The service with the larger id wins.
    HighestId,

    /// Lexicographic by name, then by id.
    Name,
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowestId => write!(f, "lowest_id"),
            Self::HighestId => write!(f, "highest_id"),
            Self::Name => write!(f, "name"),
        }
    }
}

/// Configuration of a service registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directory holding one document per registered service
    pub location: PathBuf,

    /// Ordering of services that share an evaluation order
    pub tie_break: TieBreak,

    /// Whether documents are pretty-printed
    pub pretty: bool,

    /// Key of anonymous username pseudonyms; never written to service documents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pseudonym_salt: Option<String>,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            location: PathBuf::from("services"),
            tie_break: TieBreak::default(),
            pretty: true,
            pseudonym_salt: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl RegistryConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read and parse a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Use a different service directory.
    pub fn with_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = location.into();
        self
    }
}
