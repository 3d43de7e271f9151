//! Door State Detector
//!
//! Classifies a monitored door as open or closed from camera frames:
//! - Calibration: averages blurred frames into a reference image
//! - Change analysis: difference, threshold, dilation, contour areas
//! - Debounced state machine with a transition cooldown
//! - Debug annotation of the analysed frame

pub mod annotate;
pub mod calibration;
pub mod change;
pub mod config;
pub mod detector;
pub mod state;

pub use change::{ChangeAnalysis, ChangedRegion};
pub use config::{DetectorConfig, DetectorSettings, SettingsUpdate};
pub use detector::{Detection, DoorDetector};
pub use state::{DoorState, DoorStateMachine, Transition};

use thiserror::Error;

/// Detector error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DetectorError {
    #[error("Calibration requires at least one frame")]
    EmptyCalibration,

    #[error("Frame size mismatch: expected {expected_width}x{expected_height}, got {width}x{height}")]
    FrameSizeMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),
}
