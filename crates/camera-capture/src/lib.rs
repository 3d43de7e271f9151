//! Camera Capture Library for the Door Watcher
//!
//! Provides frame acquisition for the detector:
//! - RGB24 video frames with grayscale and JPEG helpers
//! - A synthetic test-pattern camera with a controllable "door"
//! - Image-directory playback for recorded footage

pub mod frame;
pub mod source;

pub use frame::VideoFrame;
pub use source::{collect_frames, DoorHandle, FrameSource, ImageSequenceSource, TestPatternSource};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("No frame available: {0}")]
    NoFrame(String),

    #[error("Camera not initialized")]
    NotInitialized,

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Kind of frame source to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Synthetic scene with a toggleable door
    #[default]
    TestPattern,
    /// Loop over the images of a directory
    Directory,
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Source kind
    pub source: SourceKind,
    /// Directory of frames (directory source only)
    pub path: Option<String>,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::TestPattern,
            path: None,
            width: 640,
            height: 480,
        }
    }
}

impl CameraConfig {
    /// Open the configured frame source
    pub fn open(&self) -> Result<Box<dyn FrameSource>, CameraError> {
        match self.source {
            SourceKind::TestPattern => Ok(Box::new(TestPatternSource::new(self.width, self.height))),
            SourceKind::Directory => {
                let path = self
                    .path
                    .as_deref()
                    .ok_or_else(|| CameraError::Open("directory source requires a path".into()))?;
                Ok(Box::new(ImageSequenceSource::open(path, self.width, self.height)?))
            }
        }
    }
}
