// src/config.rs
//! Configuration file parsing for the conversion engine
//!
//! Supports TOML configuration files with the following sections:
//! - [database] - SQLite path and busy timeout
//! - [matching] - Multiset or set comparison of prestation ids
//! - [conversion] - Handling of superseded dependency items, total policy
//! - [logging] - Default tracing filter

use crate::conversion::{MatchSemantics, SupersededDependencies};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub matching: MatchingSection,

    #[serde(default)]
    pub conversion: ConversionSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration pointing at a specific database file, defaults elsewhere
    pub fn for_database(path: impl Into<PathBuf>) -> Self {
        Self {
            database: DatabaseSection {
                path: path.into(),
                ..DatabaseSection::default()
            },
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(Error::ConfigError("database.path must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Database configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSection {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// How long a writer waits for a competing writer before giving up
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl DatabaseSection {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/fiche/fiche.db")
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// Matching configuration section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchingSection {
    #[serde(default)]
    pub semantics: MatchSemantics,
}

/// Conversion configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct ConversionSection {
    #[serde(default)]
    pub superseded_dependencies: SupersededDependencies,

    /// Count dependency items in the ticket total
    #[serde(default)]
    pub include_dependencies_in_total: bool,
}

impl Default for ConversionSection {
    fn default() -> Self {
        Self {
            superseded_dependencies: SupersededDependencies::default(),
            include_dependencies_in_total: false,
        }
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Filter used when RUST_LOG is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}
