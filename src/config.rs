//! Site configuration module.
//!
//! Handles loading, validating, and merging `site.toml`. Stock defaults are
//! serialized to a TOML table and the user's file is deep-merged on top, so
//! the file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [listing]
//! page_size = 10            # Posts per listing page
//! order = "newest"          # "newest" (publish time) or "id"
//! latest_count = 3          # Posts on the `latest` sub-route
//!
//! [limits.authors]
//! min = 1                   # Authors a post needs to publish
//! max = 8
//!
//! [limits.carousel_images]
//! min = 1                   # Carousel images the home page needs
//! max = 5
//!
//! [media]
//! base_url = "/media"       # Prefix for rendition URLs
//!
//! [logging]
//! level = "info"            # Used when RUST_LOG is unset
//! format = "text"           # "text" or "json"
//! color = true
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::ordering::Cardinality;
use crate::routing::ListingOrder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

/// File name looked up in the config directory.
pub const CONFIG_FILE: &str = "site.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `site.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Blog listing pagination and ordering.
    pub listing: ListingConfig,
    /// Size bounds of ordered collections, checked at publish.
    pub limits: LimitsConfig,
    /// Rendition URL settings.
    pub media: MediaConfig,
    /// Log level and output format.
    pub logging: LoggingConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listing.page_size == 0 {
            return Err(ConfigError::Validation(
                "listing.page_size must be at least 1".into(),
            ));
        }
        if self.listing.latest_count == 0 {
            return Err(ConfigError::Validation(
                "listing.latest_count must be at least 1".into(),
            ));
        }
        for (name, bounds) in [
            ("authors", self.limits.authors),
            ("carousel_images", self.limits.carousel_images),
        ] {
            if bounds.min > bounds.max {
                return Err(ConfigError::Validation(format!(
                    "limits.{name}.min ({}) must not exceed max ({})",
                    bounds.min, bounds.max
                )));
            }
        }
        if self.media.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "media.base_url must not be empty".into(),
            ));
        }
        if self.logging.level.parse::<LevelFilter>().is_err() {
            return Err(ConfigError::Validation(format!(
                "logging.level `{}` is not one of off, error, warn, info, debug, trace",
                self.logging.level
            )));
        }
        Ok(())
    }
}

/// Blog listing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListingConfig {
    /// Posts per page.
    pub page_size: usize,
    /// Sort key for listings.
    pub order: ListingOrder,
    /// How many posts the `latest` sub-route returns.
    pub latest_count: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            order: ListingOrder::Newest,
            latest_count: 3,
        }
    }
}

/// Publish-time collection bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub authors: Cardinality,
    pub carousel_images: Cardinality,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            authors: Cardinality::new(1, 8),
            carousel_images: Cardinality::new(1, 5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MediaConfig {
    /// Prefix of every image rendition URL.
    pub base_url: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            base_url: "/media".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set.
    pub level: String,
    pub format: LogFormat,
    /// ANSI colors in text output.
    pub color: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            color: true,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(SiteConfig::default())?)
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

/// Load `site.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no `site.toml`, and `Err` if the
/// file exists but is not valid TOML.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `site.toml` in the given directory, on top of the
/// stock defaults.
pub fn load_config(dir: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `site.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pagetree site configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Blog listings
# ---------------------------------------------------------------------------
[listing]
# Posts per listing page. Out-of-range ?page= values are clamped.
page_size = 10

# "newest" sorts by last publish time, newest first.
# "id" sorts by creation order.
order = "newest"

# Number of posts served by the `latest` sub-route.
latest_count = 3

# ---------------------------------------------------------------------------
# Collection limits, checked when a page is published
# ---------------------------------------------------------------------------
[limits.authors]
min = 1
max = 8

[limits.carousel_images]
min = 1
max = 5

# ---------------------------------------------------------------------------
# Media
# ---------------------------------------------------------------------------
[media]
# Rendition URLs look like {base_url}/{image id}/{spec}/
base_url = "/media"

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# Filter used when RUST_LOG is not set: off, error, warn, info, debug, trace.
level = "info"

# "text" for humans, "json" for log collectors.
format = "text"

# ANSI colors in text output.
color = true
"##
}
