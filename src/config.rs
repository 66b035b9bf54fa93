//! Tool configuration module.
//!
//! Handles loading, validating, and merging `unsplash.toml`. Stock defaults
//! are overridden by a user config file in the target directory.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! access_keys = []              # Key pool (lowest priority source), list or "k1,k2"
//! # access_key = "..."          # Single key; multi-value strings also accepted
//!
//! [client]
//! base_url = "https://api.unsplash.com"
//! request_delay_ms = 200        # Minimum spacing between API requests
//! max_retries = 3               # Backoff rounds before giving up (at most 10)
//! orientation = "landscape"     # landscape | portrait | squarish
//!
//! [scan]
//! extensions = ["html", "jsx", "tsx"]
//! ignore_dirs = ["node_modules", "dist", "build", ".git", "public"]
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [client]
//! request_delay_ms = 1000
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::client::{ClientOptions, DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Name of the config file looked up in the target directory.
pub const CONFIG_FILENAME: &str = "unsplash.toml";

const ORIENTATIONS: &[&str] = &["landscape", "portrait", "squarish"];
const MAX_REQUEST_DELAY_MS: u64 = 60_000;
const MAX_RETRIES: u32 = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `unsplash.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FillConfig {
    /// Access keys; each entry may itself hold several separated by `,`/`;`/newline.
    /// A plain string is accepted as a single entry.
    #[serde(deserialize_with = "string_or_list")]
    pub access_keys: Vec<String>,
    /// Single access key, merged after `access_keys`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    /// API client tuning.
    pub client: ClientConfig,
    /// Which files to visit.
    pub scan: ScanConfig,
}

impl FillConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "client.base_url must not be empty".into(),
            ));
        }
        if self.client.request_delay_ms > MAX_REQUEST_DELAY_MS {
            return Err(ConfigError::Validation(format!(
                "client.request_delay_ms must be at most {MAX_REQUEST_DELAY_MS}"
            )));
        }
        if self.client.max_retries > MAX_RETRIES {
            return Err(ConfigError::Validation(format!(
                "client.max_retries must be at most {MAX_RETRIES}"
            )));
        }
        if !ORIENTATIONS.contains(&self.client.orientation.as_str()) {
            return Err(ConfigError::Validation(format!(
                "client.orientation must be one of {}",
                ORIENTATIONS.join(", ")
            )));
        }
        if self.scan.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "scan.extensions must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Raw key strings from the config file, in declaration order.
    pub fn key_values(&self) -> impl Iterator<Item = Option<&str>> {
        self.access_keys
            .iter()
            .map(|k| Some(k.as_str()))
            .chain(std::iter::once(self.access_key.as_deref()))
    }
}

/// `"k1,k2"` or `["k1", "k2"]`. Splitting happens later, with the other key sources.
fn string_or_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }

    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::One(value) => vec![value],
        StringOrList::Many(values) => values,
    })
}

/// API client tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// API root, without trailing slash.
    pub base_url: String,
    /// Minimum spacing between consecutive requests, in milliseconds.
    pub request_delay_ms: u64,
    /// Backoff rounds per request before an error is surfaced.
    pub max_retries: u32,
    /// Orientation filter for searches.
    pub orientation: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_delay_ms: 200,
            max_retries: DEFAULT_MAX_RETRIES,
            orientation: "landscape".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn to_options(&self) -> ClientOptions {
        ClientOptions {
            base_url: self.base_url.clone(),
            request_delay: Duration::from_millis(self.request_delay_ms),
            max_retries: self.max_retries,
            orientation: self.orientation.clone(),
        }
    }
}

/// File discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// File extensions (without dot) to process.
    pub extensions: Vec<String>,
    /// Directory names pruned from the walk, at any depth.
    pub ignore_dirs: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["html".into(), "jsx".into(), "tsx".into()],
            ignore_dirs: vec![
                "node_modules".into(),
                "dist".into(),
                "build".into(),
                ".git".into(),
                "public".into(),
            ],
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(FillConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `unsplash.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no config file.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    log::info!("Loaded config from {}", config_path.display());
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<FillConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: FillConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `unsplash.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<FillConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `unsplash.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# unsplash-fill configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Access keys used as a pool; the tool rotates to the next key when one
# runs out of quota. Keys given on the command line (--keys/--key) or in
# UNSPLASH_ACCESS_KEYS/UNSPLASH_ACCESS_KEY take precedence over these.
# Entries may hold several keys separated by commas or semicolons, and a
# single string works too: access_keys = "key1,key2"
access_keys = []

# Single key, added after access_keys.
# access_key = ""

# ---------------------------------------------------------------------------
# API client
# ---------------------------------------------------------------------------
[client]
base_url = "https://api.unsplash.com"

# Minimum delay between two API requests, in milliseconds.
request_delay_ms = 200

# Backoff rounds (2s, 4s, 8s, ...) before a failing request gives up.
# At most 10.
max_retries = 3

# Photo orientation filter: landscape, portrait or squarish.
orientation = "landscape"

# ---------------------------------------------------------------------------
# File discovery
# ---------------------------------------------------------------------------
[scan]
# Extensions (without dot) of files to process.
extensions = ["html", "jsx", "tsx"]

# Directory names skipped at any depth.
ignore_dirs = ["node_modules", "dist", "build", ".git", "public"]
"##
}
