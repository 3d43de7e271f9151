//! Door Watch API Server
//!
//! HTTP and WebSocket server around the door detector:
//! - Live video feed and door status over `/ws`
//! - Calibration and settings over WebSocket and REST
//! - Minimizes desktop windows while the door is open

use axum::{
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod camera;
pub mod commands;
pub mod config;
mod error;
pub mod events;
pub mod monitor;
mod routes;

pub use camera::Camera;
pub use config::AppConfig;
pub use error::ApiError;

use config::LoggingConfig;
use door_detector::DoorDetector;
use events::ServerEvent;
use monitor::Monitor;
use window_manager::WindowManager;

/// Events buffered per subscriber before it starts lagging
const EVENT_CAPACITY: usize = 256;

/// Application state shared across handlers
pub struct AppState {
    pub config: AppConfig,
    pub detector: Arc<DoorDetector>,
    pub camera: Arc<Camera>,
    pub windows: Arc<WindowManager>,
    /// Broadcast to every connected WebSocket client
    pub events: broadcast::Sender<ServerEvent>,
    pub monitor: Monitor,
    metrics: PrometheusHandle,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Build the detector, camera and window manager from `config`
    pub fn new(config: AppConfig) -> Arc<Self> {
        let camera = Camera::from_config(config.camera.clone());
        let windows = WindowManager::from_config(&config.windows);
        Self::with_parts(config, camera, windows)
    }

    /// Assemble state around an existing camera and window manager
    pub fn with_parts(config: AppConfig, camera: Camera, windows: WindowManager) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            detector: Arc::new(DoorDetector::new(&config.detector)),
            camera: Arc::new(camera),
            windows: Arc::new(windows),
            events,
            monitor: Monitor::default(),
            metrics: metrics_handle(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
            config,
        })
    }

    /// Send an event to every client; dropped when nobody listens
    pub fn emit(&self, event: ServerEvent) {
        let _ = self.events.send(event);
    }

    /// Register a WebSocket client; the first one starts the monitor
    pub fn client_connected(self: &Arc<Self>) {
        let clients = self.monitor.acquire(Arc::clone(self));
        info!("Client connected ({} connected)", clients);
        metrics::gauge!("websocket_clients").set(clients as f64);
    }

    /// Unregister a WebSocket client; the last one stops the monitor
    pub async fn client_disconnected(&self) {
        let clients = self.monitor.release().await;
        info!("Client disconnected ({} connected)", clients);
        metrics::gauge!("websocket_clients").set(clients as f64);
    }

    pub fn client_count(&self) -> usize {
        self.monitor.clients()
    }
}

/// Process-wide Prometheus recorder, installed on first use
fn metrics_handle() -> PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if metrics::set_global_recorder(recorder).is_err() {
                warn!("A metrics recorder is already installed");
            }
            handle
        })
        .clone()
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
}

/// Component status
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub camera: ComponentHealth,
    pub detector: ComponentHealth,
    pub monitor: ComponentHealth,
}

/// Individual component health
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
}

impl ComponentHealth {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
        }
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/ws", get(routes::ws::ws_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/state", get(routes::detector::get_state))
        .route(
            "/api/v1/settings",
            get(routes::detector::get_settings).post(routes::detector::update_settings),
        )
        .route("/api/v1/calibrate", axum::routing::post(routes::detector::calibrate))
        .route("/api/v1/windows", get(routes::windows::get_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index_handler() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics.render()
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus {
            camera: ComponentHealth::new(if state.camera.is_open() { "open" } else { "idle" }),
            detector: ComponentHealth::new(if state.detector.is_calibrated() {
                "calibrated"
            } else {
                "uncalibrated"
            }),
            monitor: ComponentHealth::new(if state.monitor.is_running() { "running" } else { "stopped" }),
        },
    };

    Json(response)
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let level: Level = config.level.parse()?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Run the server until Ctrl-C
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.server.addr.clone();
    let state = AppState::new(config);
    let app = create_router(Arc::clone(&state));

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.monitor.stop().await;
    state.camera.release();
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use camera_capture::{CameraError, DoorHandle, FrameSource, TestPatternSource};
    use window_manager::{MemoryBackend, WindowInfo, WindowManagerConfig};

    fn fast_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.detector.state_change_cooldown_ms = 0;
        config.monitor.frame_interval_ms = 5;
        config.monitor.camera_retry_ms = 5;
        config.monitor.calibration_interval_ms = 0;
        config.windows.step_delay_ms = 0;
        config
    }

    fn desktop() -> MemoryBackend {
        MemoryBackend::new(vec![
            WindowInfo {
                id: 1,
                title: "Editor".into(),
                visible: true,
                minimized: false,
            },
            WindowInfo {
                id: 2,
                title: "Terminal".into(),
                visible: true,
                minimized: false,
            },
        ])
    }

    /// State over a 64x48 test pattern whose door the caller controls
    pub fn test_state() -> (Arc<AppState>, DoorHandle, MemoryBackend) {
        let config = fast_config();
        let door = DoorHandle::default();
        let source_door = door.clone();
        let camera = Camera::new(Box::new(move || {
            Ok(Box::new(TestPatternSource::with_door(64, 48, source_door.clone())) as Box<dyn FrameSource>)
        }));
        let backend = desktop();
        let windows = WindowManager::new(Box::new(backend.clone()), &config.windows);
        (AppState::with_parts(config, camera, windows), door, backend)
    }

    /// State whose camera never opens
    pub fn failing_state() -> Arc<AppState> {
        let config = fast_config();
        let camera = Camera::new(Box::new(|| Err(CameraError::Open("no device".into()))));
        let windows = WindowManager::new(Box::new(desktop()), &config.windows);
        AppState::with_parts(config, camera, windows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use door_detector::{DetectorSettings, DoorState};
    use test_support::{failing_state, test_state};
    use tower::ServiceExt;

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _door, _desktop) = test_state();
        let response = create_router(state)
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let health: HealthResponse = body_json(response).await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.components.detector.status, "uncalibrated");
        assert_eq!(health.components.monitor.status, "stopped");
    }

    #[tokio::test]
    async fn test_settings_roundtrip() {
        let (state, _door, _desktop) = test_state();
        let app = create_router(Arc::clone(&state));

        let response = app
            .clone()
            .oneshot(Request::get("/api/v1/settings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let settings: DetectorSettings = body_json(response).await;
        assert_eq!(settings, DetectorSettings::default());

        let response = app
            .oneshot(
                Request::post("/api/v1/settings")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"min_area_percent": 50.0}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated: routes::detector::SettingsResponse = body_json(response).await;
        assert!(updated.success);
        assert_eq!(updated.settings.threshold, 30);
        assert_eq!(updated.settings.min_area_percent, 50.0);
        assert_eq!(state.detector.settings(), updated.settings);
    }

    #[tokio::test]
    async fn test_calibrate_then_state() {
        let (state, _door, _desktop) = test_state();
        let app = create_router(Arc::clone(&state));

        let response = app
            .clone()
            .oneshot(Request::post("/api/v1/calibrate").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let calibration: routes::detector::CalibrationResponse = body_json(response).await;
        assert_eq!(calibration.status, DoorState::Closed);

        let response = app
            .oneshot(Request::get("/api/v1/state").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let current: routes::detector::StateResponse = body_json(response).await;
        assert_eq!(current.status, DoorState::Closed);
        assert!(current.calibrated);
        assert!(!current.monitoring);
    }

    #[tokio::test]
    async fn test_calibrate_without_camera_is_unavailable() {
        let state = failing_state();
        let response = create_router(Arc::clone(&state))
            .oneshot(Request::post("/api/v1/calibrate").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body: serde_json::Value = body_json(response).await;
        assert_eq!(body["type"], "camera_error");
        assert!(!state.detector.is_calibrated());
    }

    #[tokio::test]
    async fn test_window_status() {
        let (state, _door, _desktop) = test_state();
        let response = create_router(state)
            .oneshot(Request::get("/api/v1/windows").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status: window_manager::WindowStatus = body_json(response).await;
        assert_eq!(status.visible_windows, 2);
        assert_eq!(status.minimized_windows, 0);
        assert_eq!(status.saved_minimized_windows, 0);
    }

    #[tokio::test]
    async fn test_index_and_metrics() {
        let (state, _door, _desktop) = test_state();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_client_count_drives_monitor() {
        let (state, _door, _desktop) = test_state();
        state.client_connected();
        state.client_connected();
        assert!(state.monitor.is_running());

        state.client_disconnected().await;
        assert!(state.monitor.is_running());
        state.client_disconnected().await;
        assert!(!state.monitor.is_running());
        assert_eq!(state.client_count(), 0);
    }
}
