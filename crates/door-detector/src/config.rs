//! Detector configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunable detection settings, changeable at runtime
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorSettings {
    /// Per-pixel intensity difference above which a pixel counts as changed.
    /// Nominally 0..=255; values outside that range are accepted as-is.
    pub threshold: i32,

    /// Changed area (percent of the frame) above which the door is open
    pub min_area_percent: f64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            threshold: 30,
            min_area_percent: 5.0,
        }
    }
}

impl DetectorSettings {
    /// Overwrite the fields present in `update`
    pub fn apply(&mut self, update: &SettingsUpdate) {
        if let Some(threshold) = update.threshold {
            self.threshold = threshold;
        }
        if let Some(min_area_percent) = update.min_area_percent {
            self.min_area_percent = min_area_percent;
        }
    }
}

/// Partial settings update; omitted fields are left unchanged
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub threshold: Option<i32>,
    #[serde(default)]
    pub min_area_percent: Option<f64>,
}

/// Detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Initial binarization threshold
    pub threshold: i32,

    /// Initial open/closed area threshold (percent)
    pub min_area_percent: f64,

    /// Minimum time between committed state changes (milliseconds)
    pub state_change_cooldown_ms: u64,

    /// Frames averaged per calibration
    pub calibration_frames: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let settings = DetectorSettings::default();
        Self {
            threshold: settings.threshold,
            min_area_percent: settings.min_area_percent,
            state_change_cooldown_ms: 1000,
            calibration_frames: 10,
        }
    }
}

impl DetectorConfig {
    /// Initial runtime settings
    pub fn settings(&self) -> DetectorSettings {
        DetectorSettings {
            threshold: self.threshold,
            min_area_percent: self.min_area_percent,
        }
    }

    /// State change cooldown
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.state_change_cooldown_ms)
    }
}
