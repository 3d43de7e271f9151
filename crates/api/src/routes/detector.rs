//! Detector Routes

use std::sync::Arc;

use axum::{extract::State, Json};
use door_detector::{DetectorSettings, DoorState, SettingsUpdate};
use serde::{Deserialize, Serialize};

use crate::commands;
use crate::events::ServerEvent;
use crate::{ApiError, AppState};

/// Response for the state endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct StateResponse {
    pub status: DoorState,
    pub calibrated: bool,
    pub monitoring: bool,
    pub clients: usize,
}

/// Response for settings updates
#[derive(Debug, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub success: bool,
    pub settings: DetectorSettings,
}

/// Response for calibration
#[derive(Debug, Serialize, Deserialize)]
pub struct CalibrationResponse {
    pub success: bool,
    pub status: DoorState,
}

/// Get the committed door state
pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<StateResponse> {
    Json(StateResponse {
        status: state.detector.state(),
        calibrated: state.detector.is_calibrated(),
        monitoring: state.monitor.is_running(),
        clients: state.client_count(),
    })
}

/// Get the current detection settings
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<DetectorSettings> {
    Json(state.detector.settings())
}

/// Apply a partial settings update
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SettingsUpdate>,
) -> Json<SettingsResponse> {
    let settings = commands::update_settings(&state, update);
    Json(SettingsResponse {
        success: true,
        settings,
    })
}

/// Calibrate from the live camera; connected clients are notified
pub async fn calibrate(State(state): State<Arc<AppState>>) -> Result<Json<CalibrationResponse>, ApiError> {
    let status = commands::calibrate(&state).await?;
    state.emit(ServerEvent::CalibrationComplete { success: true });
    state.emit(ServerEvent::DoorStatus { status });
    Ok(Json(CalibrationResponse { success: true, status }))
}
