//! Configuration management for Ferry.
//!
//! This module handles loading, saving, and validating Ferry configuration.
//!
//! ## Configuration File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/ferry/config.toml` |
//! | macOS | `~/Library/Application Support/com.ferry.Ferry/config.toml` |
//! | Windows | `%APPDATA%\ferry\Ferry\config\config.toml` |
//!
//! ## Example
//!
//! ```rust,ignore
//! use ferry_core::config::Config;
//!
//! let config = Config::load()?;
//! println!("Replay interval: {:?}", config.session.replay_interval);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coalesce::CoalescePolicy;
use crate::error::{Error, Result};
use crate::session::Role;

/// Main configuration struct for Ferry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Session controller timings
    pub session: SessionConfig,
}

/// General configuration options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default output directory for received files
    pub default_output: Option<PathBuf>,
}

/// Timings and policies of the session controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Period of the interval-replay coalescer
    #[serde(with = "humantime_serde")]
    pub replay_interval: Duration,
    /// Delay of the trailing-debounce coalescer
    #[serde(with = "humantime_serde")]
    pub debounce_delay: Duration,
    /// How often directory throughput is recomputed while transporting
    #[serde(with = "humantime_serde")]
    pub throughput_refresh: Duration,
    /// Number of speed samples in the moving average used for ETAs
    pub speed_window: usize,
    /// Coalescing strategy for senders
    pub sender_coalesce: CoalescePolicy,
    /// Coalescing strategy for receivers
    pub receiver_coalesce: CoalescePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            replay_interval: Duration::from_millis(50),
            debounce_delay: Duration::from_millis(100),
            throughput_refresh: Duration::from_millis(500),
            speed_window: 8,
            sender_coalesce: CoalescePolicy::Interval,
            receiver_coalesce: CoalescePolicy::Debounce,
        }
    }
}

impl SessionConfig {
    /// Coalescing strategy for `role`.
    #[must_use]
    pub const fn coalesce_policy(&self, role: Role) -> CoalescePolicy {
        match role {
            Role::Sender => self.sender_coalesce,
            Role::Receiver => self.receiver_coalesce,
        }
    }

    /// Reject values the controller cannot run with.
    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("session.replay_interval", self.replay_interval),
            ("session.debounce_delay", self.debounce_delay),
            ("session.throughput_refresh", self.throughput_refresh),
        ];
        for (key, value) in periods {
            if value.is_zero() {
                return Err(Error::InvalidConfig {
                    key: key.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.speed_window == 0 {
            return Err(Error::InvalidConfig {
                key: "session.speed_window".to_string(),
                reason: "must hold at least one sample".to_string(),
            });
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// If the configuration file doesn't exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read,
    /// parsed, or validated.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it is absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))?;
        config.session.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    ///
    /// Creates the configuration directory if it doesn't exist.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigError(format!("Failed to create config directory: {e}"))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| Error::ConfigError(format!("Failed to write config: {e}")))
    }

    /// Get the default configuration directory path.
    #[must_use]
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "ferry", "Ferry")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the full path to the configuration file.
    #[must_use]
    pub fn config_path() -> PathBuf {
        Self::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis();
        if millis % 1000 == 0 {
            serializer.serialize_str(&format!("{}s", millis / 1000))
        } else {
            serializer.serialize_str(&format!("{millis}ms"))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.trim();
        s.strip_suffix("ms")
            .map(|ms| {
                ms.parse()
                    .map(Duration::from_millis)
                    .map_err(serde::de::Error::custom)
            })
            .or_else(|| {
                s.strip_suffix('s').map(|secs| {
                    secs.parse()
                        .map(Duration::from_secs)
                        .map_err(serde::de::Error::custom)
                })
            })
            .or_else(|| {
                s.strip_suffix('m').map(|mins| {
                    mins.parse::<u64>()
                        .map(|m| Duration::from_secs(m * 60))
                        .map_err(serde::de::Error::custom)
                })
            })
            .unwrap_or_else(|| Err(serde::de::Error::custom("invalid duration format")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.session.replay_interval, Duration::from_millis(50));
        assert_eq!(config.session.debounce_delay, Duration::from_millis(100));
        assert_eq!(
            config.session.coalesce_policy(Role::Sender),
            CoalescePolicy::Interval
        );
        assert_eq!(
            config.session.coalesce_policy(Role::Receiver),
            CoalescePolicy::Debounce
        );
        assert!(config.session.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original = Config::default();
        original.general.default_output = Some(PathBuf::from("/tmp/downloads"));
        original.session.throughput_refresh = Duration::from_secs(1);
        original.session.receiver_coalesce = CoalescePolicy::Interval;

        original.save_to(&config_path).expect("save");
        let loaded = Config::load_from(&config_path).expect("load");

        assert_eq!(
            loaded.general.default_output,
            Some(PathBuf::from("/tmp/downloads"))
        );
        assert_eq!(loaded.session, original.session);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.session, SessionConfig::default());
    }

    #[test]
    fn test_config_deserialization_partial() {
        let partial_toml = r#"
[session]
replay_interval = "16ms"
sender_coalesce = "debounce"
"#;

        let config: Config = toml::from_str(partial_toml).expect("parse partial config");

        assert_eq!(config.session.replay_interval, Duration::from_millis(16));
        assert_eq!(config.session.sender_coalesce, CoalescePolicy::Debounce);
        assert_eq!(config.session.debounce_delay, Duration::from_millis(100));
        assert!(config.general.default_output.is_none());
    }

    #[test]
    fn test_duration_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");

        assert!(toml_str.contains("replay_interval = \"50ms\""));
        assert!(toml_str.contains("sender_coalesce = \"interval\""));

        let minutes: Config =
            toml::from_str("[session]\nthroughput_refresh = \"1m\"").expect("parse minutes");
        assert_eq!(minutes.session.throughput_refresh, Duration::from_secs(60));

        assert!(toml::from_str::<Config>("[session]\nreplay_interval = \"soon\"").is_err());
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[session]\nreplay_interval = \"0ms\"\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { ref key, .. } if key == "session.replay_interval"));

        let session = SessionConfig {
            speed_window: 0,
            ..SessionConfig::default()
        };
        assert!(session.validate().is_err());
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(
            path.ends_with("config.toml"),
            "Config path should end with config.toml"
        );
    }
}
