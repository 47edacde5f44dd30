//! Application settings loaded from a JSON file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VisionError};

/// Settings file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "vision-overlay.json";

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the vision API; `session`, `vision` and `externalVision` hang off it.
    pub api_base_url: String,
    /// Image submitted by "Use default image".
    pub default_image: PathBuf,
    pub request_timeout_secs: u64,
    pub log_level: LogLevel,
    /// Fill the whole panel instead of keeping the image's aspect ratio.
    pub stretch_to_panel: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/".to_owned(),
            default_image: PathBuf::from("assets/omnafield.png"),
            request_timeout_secs: 30,
            log_level: LogLevel::Info,
            stretch_to_panel: false,
        }
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads the settings file, falling back to defaults when it is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            info!("No settings at {}, using defaults", path.display());
            return Self::default();
        }
        match std::fs::read_to_string(path)
            .map_err(VisionError::from)
            .and_then(|text| Self::from_json(&text))
        {
            Ok(config) => {
                info!("Loaded settings from {}", path.display());
                config
            }
            Err(err) => {
                warn!("Ignoring settings at {}: {err}", path.display());
                Self::default()
            }
        }
    }
}

/// Settings path from the first CLI argument, or the default file name.
pub fn config_path_from_args(args: &[String]) -> PathBuf {
    args.get(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:3000/");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = AppConfig::from_json(r#"{"api_base_url":"http://vision:8080/","log_level":"debug"}"#).unwrap();
        assert_eq!(config.api_base_url, "http://vision:8080/");
        assert_eq!(config.log_level.to_level_filter(), log::LevelFilter::Debug);
        assert_eq!(config.default_image, PathBuf::from("assets/omnafield.png"));
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let config = AppConfig {
            request_timeout_secs: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/vision-overlay.json"));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_unparsable_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!("vision-overlay-bad-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(AppConfig::load(&path), AppConfig::default());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_config_path_from_args() {
        assert_eq!(config_path_from_args(&["bin".into()]), PathBuf::from(DEFAULT_CONFIG_FILE));
        assert_eq!(
            config_path_from_args(&["bin".into(), "custom.json".into()]),
            PathBuf::from("custom.json")
        );
    }
}
