//! Layered application configuration
//!
//! Defaults, then an optional TOML file, then `DOOR_WATCH_*` environment
//! variables (nested keys separated by `__`, e.g. `DOOR_WATCH_SERVER__ADDR`).

use std::path::Path;

use camera_capture::CameraConfig;
use config::{Config, ConfigError, Environment, File};
use door_detector::DetectorConfig;
use serde::{Deserialize, Serialize};
use window_manager::WindowManagerConfig;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "door-watch";

const ENV_PREFIX: &str = "DOOR_WATCH";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
    pub monitor: MonitorConfig,
    pub windows: WindowManagerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:5000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum level: trace, debug, info, warn or error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Polling loop pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Delay between processed frames (milliseconds)
    pub frame_interval_ms: u64,
    /// Delay after a failed camera read (milliseconds)
    pub camera_retry_ms: u64,
    /// Delay between calibration frames (milliseconds)
    pub calibration_interval_ms: u64,
    /// JPEG quality of the live feed
    pub jpeg_quality: u8,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 100,
            camera_retry_ms: 1000,
            calibration_interval_ms: 100,
            jpeg_quality: camera_capture::frame::DEFAULT_JPEG_QUALITY,
        }
    }
}

impl AppConfig {
    /// Load configuration. An explicit `path` must exist; otherwise
    /// `door-watch.{toml,json,yaml}` is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.server.addr, "0.0.0.0:5000");
        assert_eq!(config.detector.threshold, 30);
        assert_eq!(config.monitor.jpeg_quality, 70);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("door-watch-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[detector]\nthreshold = 45\nstate_change_cooldown_ms = 250\n\n[windows]\nbackend = \"memory\"\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.detector.threshold, 45);
        assert_eq!(config.detector.min_area_percent, 5.0);
        assert_eq!(config.detector.state_change_cooldown_ms, 250);
        assert_eq!(config.windows.backend, window_manager::BackendKind::Memory);
        assert_eq!(config.windows.step_delay_ms, 100);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = std::env::temp_dir().join("door-watch-does-not-exist.toml");
        assert!(AppConfig::load(Some(&path)).is_err());
    }
}
