//! Window Routes

use std::sync::Arc;

use axum::{extract::State, Json};
use window_manager::WindowStatus;

use crate::{ApiError, AppState};

/// Visible, minimized and saved window counts
pub async fn get_status(State(state): State<Arc<AppState>>) -> Result<Json<WindowStatus>, ApiError> {
    let worker = Arc::clone(&state);
    let status = tokio::task::spawn_blocking(move || worker.windows.window_status()).await??;
    Ok(Json(status))
}
