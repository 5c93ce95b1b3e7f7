//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\zvuk-dl\config.toml
//! - macOS: ~/Library/Application Support/zvuk-dl/config.toml
//! - Linux: ~/.config/zvuk-dl/config.toml
//!
//! The file is read once at startup, command-line overrides are applied, and
//! the result is frozen behind an `Arc` that every component shares read-only.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cover::CoverSize;
use crate::quality::Tier;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote service location and credentials
    pub service: ServiceConfig,

    /// Acquisition preferences
    pub download: DownloadConfig,

    /// Request scheduling and retry behaviour
    pub network: NetworkConfig,
}

/// Remote service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// API root, e.g. `https://zvuk.com`
    pub base_url: String,

    /// Session token (sent as `x-auth-token` and `auth` cookie)
    pub token: String,

    /// User-Agent header value
    pub user_agent: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://zvuk.com".to_string(),
            token: String::new(),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
                .to_string(),
        }
    }
}

/// What to download and how to store it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Preferred quality tier
    pub quality: Tier,

    /// Accept a different tier when the preferred one is unavailable
    pub fallback_to_lower_quality: bool,

    /// Probe the service for tier availability before requesting a stream.
    /// When off, the preferred tier is requested as-is.
    pub verify_quality: bool,

    /// Root directory for downloaded files
    pub output_dir: PathBuf,

    /// Requested cover resolution
    pub cover_size: CoverSize,

    /// Longest cover edge in pixels; larger covers are downscaled
    pub cover_max_edge: u32,

    /// Write tags into downloaded files
    pub embed_metadata: bool,

    /// Embed cover art (requires `embed_metadata`)
    pub embed_cover: bool,

    /// Fetch lyrics and embed them (requires `embed_metadata`)
    pub embed_lyrics: bool,

    /// Write `.lrc` / `.txt` next to the audio file
    pub save_lyrics: bool,

    /// Write `.srt` next to the audio file when lyrics are time-coded
    pub save_subtitles: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            quality: Tier::Lossless,
            fallback_to_lower_quality: true,
            verify_quality: true,
            output_dir: PathBuf::from("./downloads"),
            cover_size: CoverSize::Large,
            cover_max_edge: 1400,
            embed_metadata: true,
            embed_cover: true,
            embed_lyrics: true,
            save_lyrics: false,
            save_subtitles: false,
        }
    }
}

/// Admission gate, politeness delay and retry parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Maximum requests in flight at once
    pub concurrent_requests: usize,

    /// Attempts per request before giving up
    pub max_retries: u32,

    /// Base delay between ordinary retries (grows linearly per attempt)
    pub retry_delay_ms: u64,

    /// Extra factor applied to the retry delay after a throttling (418) reply
    pub throttle_multiplier: u32,

    /// Lower bound of the random delay inserted before each request
    pub politeness_min_ms: u64,

    /// Upper bound of the random delay inserted before each request
    pub politeness_max_ms: u64,

    /// Total timeout for API calls
    pub timeout_secs: u64,

    /// Total timeout for a single audio stream download
    pub stream_timeout_secs: u64,

    /// Pause between artist release pages
    pub page_delay_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            concurrent_requests: 2,
            max_retries: 5,
            retry_delay_ms: 3_000,
            throttle_multiplier: 2,
            politeness_min_ms: 1_000,
            politeness_max_ms: 3_000,
            timeout_secs: 60,
            stream_timeout_secs: 600,
            page_delay_ms: 300,
        }
    }
}

impl NetworkConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

impl Config {
    /// Check preconditions that make a run pointless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if self.network.concurrent_requests == 0 {
            return Err(ConfigError::Invalid(
                "network.concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.network.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "network.max_retries must be at least 1".to_string(),
            ));
        }
        if reqwest::Url::parse(&self.service.base_url).is_err() {
            return Err(ConfigError::Invalid(format!(
                "service.base_url is not a valid URL: {}",
                self.service.base_url
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("zvuk-dl"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk.
///
/// With an explicit path the file must exist and parse. Without one, the
/// default location is tried and a missing file yields defaults.
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = explicit {
        return read_file(path);
    }

    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Ok(Config::default());
    };

    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Ok(Config::default());
    }

    read_file(&path)
}

fn read_file(path: &Path) -> Result<Config, ConfigError> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    let config = toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
    tracing::info!("Loaded config from {:?}", path);
    Ok(config)
}

/// Save configuration to `path`, creating parent directories.
pub fn save(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No service token configured (set service.token, --token or ZVUK_TOKEN)")]
    MissingToken,

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
