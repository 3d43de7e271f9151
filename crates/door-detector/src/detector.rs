//! Door detector: calibration, detection and settings behind one lock

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use camera_capture::VideoFrame;
use image::GrayImage;
use tracing::{debug, info};

use crate::annotate::annotate;
use crate::calibration::{build_reference, preprocess};
use crate::change::{analyze, ChangedRegion};
use crate::{DetectorConfig, DetectorError, DetectorSettings, DoorState, DoorStateMachine, SettingsUpdate, Transition};

/// Result of one detection call
#[derive(Debug, Clone)]
pub struct Detection {
    /// Committed door state after this frame
    pub state: DoorState,
    /// What the debounce did with this frame's candidate
    pub transition: Transition,
    /// Changed area as a percentage of the frame
    pub change_percent: f64,
    /// External change regions
    pub regions: Vec<ChangedRegion>,
    /// Input frame with the debug overlay
    pub annotated: VideoFrame,
}

struct Inner {
    settings: DetectorSettings,
    reference: Option<GrayImage>,
    machine: DoorStateMachine,
}

/// Thread-safe door detector.
///
/// Every public method holds the same lock for its whole duration, so a
/// detection never sees a half-built reference or settings mid-update.
pub struct DoorDetector {
    inner: Mutex<Inner>,
    calibration_frames: usize,
}

impl DoorDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        info!("Creating door detector with config: {:?}", config);
        Self {
            inner: Mutex::new(Inner {
                settings: config.settings(),
                reference: None,
                machine: DoorStateMachine::new(config.cooldown()),
            }),
            calibration_frames: config.calibration_frames,
        }
    }

    // Every mutation under the lock is a whole-value assignment, so the
    // data is consistent even if a holder panicked.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of frames callers should gather for a calibration
    pub fn calibration_frames(&self) -> usize {
        self.calibration_frames
    }

    /// Build a new reference from `frames` and mark the door closed
    pub fn calibrate(&self, frames: &[VideoFrame]) -> Result<(), DetectorError> {
        self.calibrate_at(frames, Instant::now())
    }

    /// [`calibrate`](Self::calibrate) with an explicit clock reading
    pub fn calibrate_at(&self, frames: &[VideoFrame], now: Instant) -> Result<(), DetectorError> {
        if frames.is_empty() {
            return Err(DetectorError::EmptyCalibration);
        }

        let mut inner = self.lock();
        let reference = build_reference(frames)?;
        info!(
            "Calibrated on {} frames ({}x{})",
            frames.len(),
            reference.width(),
            reference.height()
        );
        inner.reference = Some(reference);
        inner.machine.reset_closed(now);
        Ok(())
    }

    /// Classify `frame` and return the committed state with a debug frame
    pub fn detect(&self, frame: &VideoFrame) -> Result<Detection, DetectorError> {
        self.detect_at(frame, Instant::now())
    }

    /// [`detect`](Self::detect) with an explicit clock reading
    pub fn detect_at(&self, frame: &VideoFrame, now: Instant) -> Result<Detection, DetectorError> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let Some(reference) = inner.reference.as_ref() else {
            return Ok(Detection {
                state: DoorState::Unknown,
                transition: Transition::Unchanged,
                change_percent: 0.0,
                regions: Vec::new(),
                annotated: frame.clone(),
            });
        };

        if (frame.width, frame.height) != reference.dimensions() {
            return Err(DetectorError::FrameSizeMismatch {
                expected_width: reference.width(),
                expected_height: reference.height(),
                width: frame.width,
                height: frame.height,
            });
        }

        let current = preprocess(frame)?;
        let analysis = analyze(reference, &current, inner.settings.threshold);

        let candidate = if analysis.change_percent > inner.settings.min_area_percent {
            DoorState::Open
        } else {
            DoorState::Closed
        };

        let transition = inner.machine.propose(candidate, now);
        match transition {
            Transition::Committed { from, to } => {
                info!("Door state {} -> {} (change {:.2}%)", from, to, analysis.change_percent);
            }
            Transition::Suppressed { candidate } => {
                debug!("Door state {} held during cooldown", candidate);
            }
            Transition::Unchanged => {}
        }

        let state = inner.machine.state();
        debug!(
            "Frame {}: change {:.2}%, {} regions, state {}",
            frame.sequence,
            analysis.change_percent,
            analysis.regions.len(),
            state
        );

        let annotated = annotate(frame, state, analysis.change_percent, &analysis.regions)?;
        Ok(Detection {
            state,
            transition,
            change_percent: analysis.change_percent,
            regions: analysis.regions,
            annotated,
        })
    }

    /// Apply a partial settings update; never fails
    pub fn update_settings(&self, update: SettingsUpdate) -> DetectorSettings {
        let mut inner = self.lock();
        inner.settings.apply(&update);
        info!("Detector settings updated: {:?}", inner.settings);
        inner.settings
    }

    /// Snapshot of the current settings
    pub fn settings(&self) -> DetectorSettings {
        self.lock().settings
    }

    /// Committed door state
    pub fn state(&self) -> DoorState {
        self.lock().machine.state()
    }

    pub fn is_calibrated(&self) -> bool {
        self.lock().reference.is_some()
    }

    /// Copy of the reference image, if calibrated
    pub fn reference_image(&self) -> Option<GrayImage> {
        self.lock().reference.clone()
    }

    pub fn cooldown(&self) -> Duration {
        self.lock().machine.cooldown()
    }
}

impl Default for DoorDetector {
    fn default() -> Self {
        Self::new(&DetectorConfig::default())
    }
}
