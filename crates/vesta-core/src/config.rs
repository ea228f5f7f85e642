//! Configuration types for Vesta components.
//!
//! Everything here is built once at process start and never mutated afterwards.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::AppError;
use crate::models::IndexConfig;

/// HTTP client configuration for external API calls.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

/// When the orchestrator makes sure the index exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnsureIndexPolicy {
    /// Before every write, removals included.
    #[default]
    Always,
    /// Only before upserts.
    PublishOnly,
}

impl EnsureIndexPolicy {
    pub fn applies_to_removal(self) -> bool {
        self == EnsureIndexPolicy::Always
    }
}

impl FromStr for EnsureIndexPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "publish-only" | "publish_only" => Ok(Self::PublishOnly),
            other => Err(format!(
                "unknown ensure-index policy '{other}' (expected 'always' or 'publish-only')"
            )),
        }
    }
}

impl fmt::Display for EnsureIndexPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("always"),
            Self::PublishOnly => f.write_str("publish-only"),
        }
    }
}

/// How to classify notifications that carry neither a `type` nor a `published` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UntypedEventPolicy {
    /// Treat them as unknown and acknowledge without doing anything.
    #[default]
    Ignore,
    /// Treat them as publishes.
    Publish,
}

impl FromStr for UntypedEventPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "publish" => Ok(Self::Publish),
            other => Err(format!(
                "unknown untyped-event policy '{other}' (expected 'ignore' or 'publish')"
            )),
        }
    }
}

impl fmt::Display for UntypedEventPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ignore => f.write_str("ignore"),
            Self::Publish => f.write_str("publish"),
        }
    }
}

/// Settings of the sync orchestrator.
#[derive(Debug, Clone, Default)]
pub struct SyncSettings {
    /// Index used when a notification does not name one.
    pub index: IndexConfig,
    pub ensure_index: EnsureIndexPolicy,
    pub untyped_events: UntypedEventPolicy,
}

/// Returns the default location of the index settings file: `<config_dir>/vesta/index.toml`.
pub fn default_index_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("vesta").join("index.toml"))
}

/// Loads index settings from a TOML file.
///
/// With an explicit `path` the file must exist. Without one, the default path is tried and a
/// missing file yields `Ok(None)`.
///
/// # Errors
///
/// Returns `AppError::ConfigError` if the file cannot be read or is not valid TOML.
pub fn load_index_settings(path: Option<&Path>) -> Result<Option<Map<String, Value>>, AppError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match default_index_config_path() {
            Some(p) if p.exists() => p,
            _ => {
                debug!("No index settings file at the default location");
                return Ok(None);
            }
        },
    };

    let content = std::fs::read_to_string(&path).map_err(|e| {
        AppError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
    })?;

    let settings: Map<String, Value> = toml::from_str(&content).map_err(|e| {
        AppError::ConfigError(format!("Invalid TOML in {}: {}", path.display(), e))
    })?;

    info!(
        path = %path.display(),
        keys = settings.len(),
        "Loaded index settings file"
    );

    Ok(Some(settings))
}
