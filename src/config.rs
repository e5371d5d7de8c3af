//! Configuration management for the declutterer.
//!
//! Loads configuration from TOML files and provides runtime defaults.

use crate::classifier::{ML_MIN_SCORE, RULES_MIN_SCORE};
use crate::settings::Settings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Environment variable that overrides `proxy.secret`
pub const PROXY_SECRET_ENV: &str = "DECLUTTER_PROXY_SECRET";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    /// Settings snapshot used until the popup pushes one
    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub summary: SummaryConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub watcher: WatcherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether the engine runs at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: default_log_level(),
        }
    }
}

/// Score cutoffs. Rules and model scores are not comparable, so each
/// keeps its own threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_rules_min_score")]
    pub rules_min_score: f64,

    #[serde(default = "default_ml_min_score")]
    pub ml_min_score: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rules_min_score: RULES_MIN_SCORE,
            ml_min_score: ML_MIN_SCORE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Outbound text is truncated to this many characters
    #[serde(default = "default_summary_max_chars")]
    pub max_chars: usize,

    /// Item rows included after title and description
    #[serde(default = "default_summary_max_rows")]
    pub max_rows: usize,

    #[serde(default = "default_summary_separator")]
    pub separator: String,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_chars: default_summary_max_chars(),
            max_rows: default_summary_max_rows(),
            separator: default_summary_separator(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Classification/summary proxy URL; without it only rules are available
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Shared secret sent as `x-proxy-secret`
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,

    #[serde(default = "default_proxy_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            secret: None,
            timeout_secs: default_proxy_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Passes run back-to-back for one mutation batch before giving up
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rules_min_score() -> f64 {
    RULES_MIN_SCORE
}

fn default_ml_min_score() -> f64 {
    ML_MIN_SCORE
}

fn default_summary_max_chars() -> usize {
    2000
}

fn default_summary_max_rows() -> usize {
    50
}

fn default_summary_separator() -> String {
    "\n".to_string()
}

fn default_proxy_timeout() -> u64 {
    30
}

fn default_max_rounds() -> usize {
    16
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    Loaded(PathBuf),
    Missing(PathBuf),
    /// The file exists but did not parse; defaults are in use
    Invalid { path: PathBuf, error: String },
}

impl ConfigOrigin {
    pub fn log(&self) {
        match self {
            ConfigOrigin::Loaded(path) => info!("Loaded configuration from {:?}", path),
            ConfigOrigin::Missing(path) => {
                info!("No config file found at {:?}, using defaults", path)
            }
            ConfigOrigin::Invalid { path, error } => {
                warn!("Failed to parse config file {:?}: {}, using defaults", path, error)
            }
        }
    }
}

impl Config {
    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        let (config, origin) = Self::read_from_path(path);
        origin.log();
        config
    }

    /// Read configuration without logging, for callers that set up logging
    /// from the result
    pub fn read_from_path(path: PathBuf) -> (Self, ConfigOrigin) {
        let (mut config, origin) = match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => (config, ConfigOrigin::Loaded(path)),
                Err(e) => (
                    Self::default(),
                    ConfigOrigin::Invalid {
                        path,
                        error: e.to_string(),
                    },
                ),
            },
            Err(_) => (Self::default(), ConfigOrigin::Missing(path)),
        };

        if let Ok(secret) = std::env::var(PROXY_SECRET_ENV) {
            if !secret.is_empty() {
                config.proxy.secret = Some(secret);
            }
        }
        config.settings = config.settings.normalized();
        (config, origin)
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("declutterer")
            .join("config.toml")
    }

    /// Save configuration to a specific path. The proxy secret is never written.
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
}
