//! Configuration schema for Stencil
//!
//! Configuration is stored at `~/.config/stencil/config.toml`

use crate::cache::DEFAULT_EXCLUDES;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Database server settings
    pub database: DatabaseConfig,

    /// Template cache settings
    pub cache: CacheConfig,

    /// External template builder
    pub builder: BuilderConfig,

    /// Module source locations hashed into the digest
    pub addons: AddonsConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Database server settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Maintenance database URL, e.g. postgres://odoo@localhost/postgres
    pub url: Option<String>,
}

/// Template cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Namespace of templates (at most 8 letters, digits or hyphens)
    pub prefix: String,

    /// Drop templates unused for N days (-1 = disabled)
    pub max_age_days: i64,

    /// Keep at most N templates (-1 = disabled, 0 = empty the cache)
    pub max_size: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: "cache".to_string(),
            max_age_days: 30,
            max_size: 5,
        }
    }
}

/// External command that initializes a fresh database
///
/// Invoked with the environment variables `STENCIL_DATABASE`,
/// `STENCIL_MODULES` and `STENCIL_WITH_DEMO`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Program to run
    pub command: Option<String>,

    /// Arguments to the program
    pub args: Vec<String>,

    /// Extra environment variables
    pub env: HashMap<String, String>,
}

/// Module source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AddonsConfig {
    /// Directories containing one sub-directory per module
    pub paths: Vec<PathBuf>,

    /// File name globs left out of the digest
    pub exclude: Vec<String>,
}

impl Default for AddonsConfig {
    fn default() -> Self {
        Self {
            paths: vec![],
            exclude: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
        }
    }
}
