//! WebSocket messages
//!
//! Every message is a JSON object `{"event": <name>, "data": <payload>}`.

use door_detector::{DetectorSettings, DoorState, SettingsUpdate};
use serde::{Deserialize, Serialize};

/// Category reported with `error_message`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CameraError,
    CalibrationError,
    SettingsError,
    DetectionError,
    WindowError,
}

/// Server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    DoorStatus {
        status: DoorState,
    },
    VideoFeed {
        /// Base64 JPEG
        image: String,
    },
    Settings(DetectorSettings),
    CalibrationComplete {
        success: bool,
    },
    SettingsUpdated {
        success: bool,
    },
    ErrorMessage {
        message: String,
        #[serde(rename = "type")]
        kind: ErrorKind,
    },
}

impl ServerEvent {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        ServerEvent::ErrorMessage {
            message: message.into(),
            kind,
        }
    }
}

/// Client to server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    Calibrate,
    UpdateSettings(SettingsUpdate),
}
