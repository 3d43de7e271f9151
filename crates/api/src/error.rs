//! API error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use camera_capture::CameraError;
use door_detector::DetectorError;
use serde_json::json;
use thiserror::Error;
use window_manager::WindowError;

use crate::events::ErrorKind;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Camera unavailable: {0}")]
    Camera(String),

    #[error("Calibration failed: {0}")]
    Calibration(#[from] DetectorError),

    #[error("Window manager error: {0}")]
    Windows(#[from] WindowError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<CameraError> for ApiError {
    fn from(e: CameraError) -> Self {
        ApiError::Camera(e.to_string())
    }
}

impl ApiError {
    /// Category used in `error_message` events
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Camera(_) => ErrorKind::CameraError,
            ApiError::Calibration(_) | ApiError::Task(_) => ErrorKind::CalibrationError,
            ApiError::Windows(_) => ErrorKind::WindowError,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Camera(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Calibration(DetectorError::EmptyCalibration) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Calibration(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Windows(_) | ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string(),
            "type": self.kind(),
        }));
        (self.status(), body).into_response()
    }
}
