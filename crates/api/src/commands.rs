//! Operations shared by the WebSocket and REST surfaces

use std::sync::Arc;
use std::time::Duration;

use door_detector::{DetectorSettings, DoorState, SettingsUpdate};
use tracing::{info, warn};

use crate::events::{ClientCommand, ServerEvent};
use crate::{ApiError, AppState};

/// Capture a batch from the camera and calibrate the detector
pub async fn calibrate(state: &Arc<AppState>) -> Result<DoorState, ApiError> {
    let count = state.detector.calibration_frames();
    let interval = Duration::from_millis(state.config.monitor.calibration_interval_ms);

    let camera_state = Arc::clone(state);
    let frames =
        tokio::task::spawn_blocking(move || camera_state.camera.collect(count, interval)).await??;
    if frames.is_empty() {
        return Err(ApiError::Camera("no frames captured for calibration".into()));
    }

    let detector_state = Arc::clone(state);
    tokio::task::spawn_blocking(move || detector_state.detector.calibrate(&frames)).await??;

    let door = state.detector.state();
    info!("Calibration complete, door {}", door);
    metrics::counter!("door_calibrations_total").increment(1);
    Ok(door)
}

/// Apply a settings update and tell every client about it
pub fn update_settings(state: &AppState, update: SettingsUpdate) -> DetectorSettings {
    let settings = state.detector.update_settings(update);
    state.emit(ServerEvent::Settings(settings));
    settings
}

/// Run a client command and produce the replies for that client
pub async fn execute(state: &Arc<AppState>, command: ClientCommand) -> Vec<ServerEvent> {
    match command {
        ClientCommand::Calibrate => match calibrate(state).await {
            Ok(door) => vec![
                ServerEvent::CalibrationComplete { success: true },
                ServerEvent::DoorStatus { status: door },
            ],
            Err(e) => {
                warn!("Calibration request failed: {}", e);
                vec![ServerEvent::error(e.kind(), e.to_string())]
            }
        },
        ClientCommand::UpdateSettings(update) => {
            update_settings(state, update);
            vec![ServerEvent::SettingsUpdated { success: true }]
        }
    }
}
