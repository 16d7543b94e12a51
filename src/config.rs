//! Runtime configuration, read from the environment.
//!
//! A missing API key is not an error here: the cleanup service reports it on
//! every call so each item fails on its own.

use std::path::Path;
use std::time::Duration;

use crate::brush::{DEFAULT_BRUSH_DIAMETER, DEFAULT_PADDING, SWITCH_BACK_DELAY};
use crate::error::{Error, Result};
use crate::region::Region;

/// Default Gemini model used for cleanup.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

/// Default Gemini REST endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default number of items processed concurrently per batch round.
pub const DEFAULT_GROUP_SIZE: usize = 3;

/// External cleanup service settings.
#[derive(Clone)]
pub struct ServiceConfig {
    /// API key; `None` makes every cleanup call fail.
    pub api_key: Option<String>,
    /// Model name.
    pub model: String,
    /// Base URL, without a trailing slash.
    pub endpoint: String,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: None,
        }
    }
}

/// Batch pipeline settings.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Items processed concurrently per round.
    pub group_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            group_size: DEFAULT_GROUP_SIZE,
        }
    }
}

/// Brush-to-region settings.
#[derive(Debug, Clone)]
pub struct BrushConfig {
    /// Margin around the painted bounding box, in raster units.
    pub padding: u32,
    /// Brush diameter, in raster units.
    pub diameter: f64,
    /// Delay before returning to box mode after a brush stroke.
    pub switch_back_delay: Duration,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            padding: DEFAULT_PADDING,
            diameter: DEFAULT_BRUSH_DIAMETER,
            switch_back_delay: SWITCH_BACK_DELAY,
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Cleanup service.
    pub service: ServiceConfig,
    /// Batch pipeline.
    pub batch: BatchConfig,
    /// Brush tool.
    pub brush: BrushConfig,
    /// Zone copied into newly ingested items.
    pub default_region: Region,
}

impl Config {
    /// Load configuration from process environment variables, after loading
    /// a `.env` file from the working directory if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a numeric variable does not parse or
    /// the group size is zero.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Config::from_env`], but with an explicit env file.
    ///
    /// Variables already set in the process environment take precedence over
    /// the file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the file cannot be read or parsed,
    /// or for the same reasons as [`Config::from_env`].
    pub fn from_env_file(path: &Path) -> Result<Self> {
        dotenvy::from_path(path)
            .map_err(|e| Error::Configuration(format!("{}: {e}", path.display())))?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        config.service.api_key = var("GEMINI_API_KEY").or_else(|| var("API_KEY"));
        if let Some(model) = var("GEMINI_MODEL") {
            config.service.model = model;
        }
        if let Some(endpoint) = var("GEMINI_ENDPOINT") {
            config.service.endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(secs) = var("CLEANUP_TIMEOUT_SECONDS") {
            let secs: u64 = secs.parse().map_err(|e| {
                Error::Configuration(format!("CLEANUP_TIMEOUT_SECONDS={secs:?}: {e}"))
            })?;
            config.service.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(size) = var("BATCH_GROUP_SIZE") {
            config.batch.group_size = size
                .parse()
                .map_err(|e| Error::Configuration(format!("BATCH_GROUP_SIZE={size:?}: {e}")))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a zero group size.
    pub fn validate(&self) -> Result<()> {
        if self.batch.group_size == 0 {
            return Err(Error::Configuration(
                "batch group size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
