//! # Player Configuration
//!
//! Configuration management for the player core.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MARQUEE_API_URL=https://display.example.com                        │
//! │     MARQUEE_SCREEN_PATH=/v1/screens/01HXYZ                             │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/player/player.toml (Linux)                               │
//! │     ~/Library/Application Support/com.marquee.player/player.toml       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     90s sync interval, 15s default slide duration                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # player.toml
//! [api]
//! base_url = "https://display.example.com"
//! screen_path = "/v1/screens/01HXYZ"
//! tenant_key = "ABC"
//!
//! [sync]
//! interval_secs = 90
//! request_timeout_secs = 30
//!
//! [credentials]
//! refresh_path = "/v1/authentication/token/refresh"
//! check_interval_secs = 60
//! token_file = "/var/lib/marquee/tokens.json"
//!
//! [scheduler]
//! default_slide_duration_ms = 15000
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// API Settings
// =============================================================================

/// Where the content API lives and which screen this player shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Scheme and host of the content API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of this player's screen resource (the sync entry point).
    #[serde(default)]
    pub screen_path: String,

    /// Tenant key sent as `Authorization-Tenant-Key`.
    #[serde(default)]
    pub tenant_key: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_base_url(),
            screen_path: String::new(),
            tenant_key: None,
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync loop cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Pause between the end of one cycle and the start of the next (seconds).
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Transport timeout applied to every request (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_interval() -> u64 {
    90
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            interval_secs: default_interval(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Credential Settings
// =============================================================================

/// Token refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSettings {
    /// Path of the token refresh endpoint.
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// How often the background task checks token freshness (seconds).
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// JSON file for persistent token state. In-memory when unset.
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

fn default_refresh_path() -> String {
    "/v1/authentication/token/refresh".to_string()
}

fn default_check_interval() -> u64 {
    60
}

impl Default for CredentialSettings {
    fn default() -> Self {
        CredentialSettings {
            refresh_path: default_refresh_path(),
            check_interval_secs: default_check_interval(),
            token_file: None,
        }
    }
}

// =============================================================================
// Scheduler Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Duration for slides that do not set one (milliseconds).
    #[serde(default = "default_slide_duration")]
    pub default_slide_duration_ms: u64,
}

fn default_slide_duration() -> u64 {
    marquee_core::DEFAULT_SLIDE_DURATION_MS
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        SchedulerSettings {
            default_slide_duration_ms: default_slide_duration(),
        }
    }
}

// =============================================================================
// Main Player Configuration
// =============================================================================

/// Complete player configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub credentials: CredentialSettings,

    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

impl PlayerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (player.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading player config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load player config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Player config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        let url = Url::parse(&self.api.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "API URL must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if !self.api.screen_path.starts_with('/') {
            return Err(SyncError::InvalidConfig(format!(
                "screen_path must be an absolute resource path, got: '{}'",
                self.api.screen_path
            )));
        }

        if self.sync.interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "sync.interval_secs must be greater than 0".into(),
            ));
        }

        if self.sync.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "sync.request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.credentials.check_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "credentials.check_interval_secs must be greater than 0".into(),
            ));
        }

        if self.scheduler.default_slide_duration_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "scheduler.default_slide_duration_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("MARQUEE_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Ok(path) = std::env::var("MARQUEE_SCREEN_PATH") {
            debug!(screen_path = %path, "Overriding screen path from environment");
            self.api.screen_path = path;
        }

        if let Ok(key) = std::env::var("MARQUEE_TENANT_KEY") {
            self.api.tenant_key = Some(key);
        }

        if let Ok(interval) = std::env::var("MARQUEE_SYNC_INTERVAL") {
            match interval.parse::<u64>() {
                Ok(secs) => self.sync.interval_secs = secs,
                Err(_) => warn!(value = %interval, "Ignoring invalid MARQUEE_SYNC_INTERVAL"),
            }
        }

        if let Ok(interval) = std::env::var("MARQUEE_REFRESH_INTERVAL") {
            match interval.parse::<u64>() {
                Ok(secs) => self.credentials.check_interval_secs = secs,
                Err(_) => warn!(value = %interval, "Ignoring invalid MARQUEE_REFRESH_INTERVAL"),
            }
        }

        if let Ok(file) = std::env::var("MARQUEE_TOKEN_FILE") {
            self.credentials.token_file = Some(PathBuf::from(file));
        }

        if let Ok(ms) = std::env::var("MARQUEE_DEFAULT_SLIDE_DURATION_MS") {
            match ms.parse::<u64>() {
                Ok(ms) => self.scheduler.default_slide_duration_ms = ms,
                Err(_) => warn!(value = %ms, "Ignoring invalid MARQUEE_DEFAULT_SLIDE_DURATION_MS"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "marquee", "player")
            .map(|dirs| dirs.config_dir().join("player.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.request_timeout_secs)
    }

    pub fn refresh_check_interval(&self) -> Duration {
        Duration::from_secs(self.credentials.check_interval_secs)
    }

    pub fn screen_path(&self) -> &str {
        &self.api.screen_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> PlayerConfig {
        let mut config = PlayerConfig::default();
        config.api.screen_path = "/v1/screens/1".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = PlayerConfig::default();
        assert_eq!(config.sync.interval_secs, 90);
        assert_eq!(config.credentials.check_interval_secs, 60);
        assert_eq!(config.scheduler.default_slide_duration_ms, 15_000);
        assert!(config.credentials.token_file.is_none());
    }

    #[test]
    fn test_config_validation() {
        let mut config = valid();
        assert!(config.validate().is_ok());

        config.api.screen_path = "v1/screens/1".to_string();
        assert!(config.validate().is_err());

        config = valid();
        config.api.base_url = "ftp://example.com".to_string();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config = valid();
        config.api.base_url = "not a url".to_string();
        assert!(config.validate().unwrap_err().is_config_error());

        config = valid();
        config.sync.interval_secs = 0;
        assert!(config.validate().is_err());

        config = valid();
        config.scheduler.default_slide_duration_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: PlayerConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://display.example.com"
            screen_path = "/v1/screens/01HXYZ"

            [sync]
            interval_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.sync.interval_secs, 30);
        assert_eq!(config.sync.request_timeout_secs, 30);
        assert_eq!(config.credentials.refresh_path, "/v1/authentication/token/refresh");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&valid()).unwrap();
        assert!(toml_str.contains("[api]"));
        assert!(toml_str.contains("[sync]"));
        assert!(toml_str.contains("[scheduler]"));
    }
}
