//! Configuration management for the navigation relay.
//!
//! Loads configuration from TOML files and provides runtime defaults.

use crate::engine::SyncSettings;
use nav_extractor::{Format, Locale};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub locale: LocaleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the WebSocket listener to
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Candidate ports, tried in order until one binds
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,

    /// The only path accepting WebSocket upgrades
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            ports: default_ports(),
            path: default_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Delay before acting on a navigation update
    #[serde(default = "default_debounce_threshold")]
    pub debounce_threshold_ms: u64,

    /// Time after connecting before reporting that no navigation is running
    #[serde(default = "default_navigation_wait")]
    pub navigation_wait_ms: u64,

    /// Initial wire format for new subscribers
    #[serde(default)]
    pub use_binary_format: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_threshold_ms: default_debounce_threshold(),
            navigation_wait_ms: default_navigation_wait(),
            use_binary_format: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocaleConfig {
    /// Language tag of the navigation app's UI, e.g. "de-DE"
    #[serde(default = "default_locale_tag")]
    pub tag: String,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            tag: default_locale_tag(),
        }
    }
}

// Default value functions for serde
fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_ports() -> Vec<u16> {
    vec![35456, 12315, 57535]
}

fn default_path() -> String {
    "/navigationSocket".to_string()
}

fn default_debounce_threshold() -> u64 {
    500
}

fn default_navigation_wait() -> u64 {
    2500
}

fn default_locale_tag() -> String {
    "en-US".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_config_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nav-relay")
            .join("config.toml")
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: PathBuf) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        std::fs::write(&path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Engine settings derived from the `[sync]` section
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            debounce_threshold: Duration::from_millis(self.sync.debounce_threshold_ms),
            navigation_wait: Duration::from_millis(self.sync.navigation_wait_ms),
            format: Format::from_binary_flag(self.sync.use_binary_format),
            ..SyncSettings::default()
        }
    }

    pub fn locale(&self) -> Locale {
        Locale::from_tag(&self.locale.tag)
    }
}
