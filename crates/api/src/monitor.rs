//! Frame polling loop
//!
//! Runs while at least one WebSocket client is connected:
//! - Reads a frame, runs detection and broadcasts the (annotated) feed
//! - Reports door state changes and drives the window reaction
//! - Backs off after camera failures

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use door_detector::{DoorState, Transition};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::events::{ErrorKind, ServerEvent};
use crate::AppState;

/// What to do with the desktop after a door change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAction {
    MinimizeAll,
    RestoreAll,
}

/// A reported door change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reaction {
    pub status: DoorState,
    pub action: Option<WindowAction>,
}

/// Door to desktop policy.
///
/// Windows are minimized when the door goes from closed to open, and
/// restored on the way back only if that minimize happened.
#[derive(Debug, Default)]
pub struct WindowReaction {
    previous: DoorState,
    door_was_opened: bool,
}

impl WindowReaction {
    /// Feed the latest state; returns a reaction when it differs from the
    /// previously observed one
    pub fn observe(&mut self, state: DoorState) -> Option<Reaction> {
        if state == self.previous {
            return None;
        }

        let action = match (self.previous, state) {
            (DoorState::Closed, DoorState::Open) => {
                self.door_was_opened = true;
                Some(WindowAction::MinimizeAll)
            }
            (DoorState::Open, DoorState::Closed) if self.door_was_opened => {
                self.door_was_opened = false;
                Some(WindowAction::RestoreAll)
            }
            _ => None,
        };
        self.previous = state;

        Some(Reaction { status: state, action })
    }

    pub fn door_was_opened(&self) -> bool {
        self.door_was_opened
    }
}

struct Running {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Running {
    fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            error!("Monitor task failed: {}", e);
        }
        info!("Monitor stopped");
    }
}

#[derive(Default)]
struct Slot {
    clients: usize,
    running: Option<Running>,
}

impl Slot {
    fn spawn_if_idle(&mut self, state: Arc<AppState>) -> bool {
        if self.running.as_ref().is_some_and(Running::is_active) {
            return false;
        }

        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run(state, stop_rx));
        self.running = Some(Running { stop, task });
        info!("Monitor started");
        true
    }
}

/// Handle to the background polling task.
///
/// The client count and the running task share one lock, so a connect
/// racing the last disconnect always ends with a running loop.
#[derive(Default)]
pub struct Monitor {
    slot: Mutex<Slot>,
}

impl Monitor {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the loop unless it is already running. Returns whether a new
    /// loop was started.
    pub fn start(&self, state: Arc<AppState>) -> bool {
        self.slot().spawn_if_idle(state)
    }

    /// Register a client and make sure the loop runs. Returns the number
    /// of connected clients.
    pub fn acquire(&self, state: Arc<AppState>) -> usize {
        let mut slot = self.slot();
        slot.clients += 1;
        slot.spawn_if_idle(state);
        slot.clients
    }

    /// Unregister a client; the last one stops the loop. Returns the number
    /// of clients still connected.
    pub async fn release(&self) -> usize {
        let (clients, running) = {
            let mut slot = self.slot();
            slot.clients = slot.clients.saturating_sub(1);
            let running = if slot.clients == 0 { slot.running.take() } else { None };
            (slot.clients, running)
        };
        if let Some(running) = running {
            running.shutdown().await;
        }
        clients
    }

    /// Signal the loop and wait for it to exit
    pub async fn stop(&self) {
        let running = self.slot().running.take();
        if let Some(running) = running {
            running.shutdown().await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.slot().running.as_ref().is_some_and(Running::is_active)
    }

    pub fn clients(&self) -> usize {
        self.slot().clients
    }
}

/// Outcome of one processed frame
enum Tick {
    Frame {
        door: DoorState,
        image: Option<String>,
    },
    CameraError(String),
    DetectionError(String),
}

fn process_frame(state: &AppState) -> Tick {
    let frame = match state.camera.read_frame() {
        Ok(frame) => frame,
        Err(e) => return Tick::CameraError(e.to_string()),
    };
    metrics::counter!("frames_processed_total").increment(1);

    let detection = match state.detector.detect(&frame) {
        Ok(detection) => detection,
        Err(e) => return Tick::DetectionError(e.to_string()),
    };
    metrics::gauge!("door_change_percent").set(detection.change_percent);
    if let Transition::Committed { to, .. } = detection.transition {
        metrics::counter!("door_state_transitions_total", "to" => to.as_str()).increment(1);
    }

    let image = match detection.annotated.to_jpeg_base64(state.config.monitor.jpeg_quality) {
        Ok(image) => Some(image),
        Err(e) => {
            warn!("Failed to encode frame {}: {}", frame.sequence, e);
            None
        }
    };

    Tick::Frame {
        door: detection.state,
        image,
    }
}

async fn apply_action(state: &Arc<AppState>, action: WindowAction) {
    let worker = Arc::clone(state);
    let result = tokio::task::spawn_blocking(move || match action {
        WindowAction::MinimizeAll => worker.windows.minimize_all_windows(),
        WindowAction::RestoreAll => worker.windows.restore_all_windows(),
    })
    .await;

    match result {
        Ok(Ok(count)) => info!("{:?} applied to {} windows", action, count),
        Ok(Err(e)) => {
            warn!("{:?} failed: {}", action, e);
            state.emit(ServerEvent::error(ErrorKind::WindowError, e.to_string()));
        }
        Err(e) => error!("Window task failed: {}", e),
    }
}

async fn run(state: Arc<AppState>, mut stop: watch::Receiver<bool>) {
    let frame_interval = Duration::from_millis(state.config.monitor.frame_interval_ms);
    let camera_retry = Duration::from_millis(state.config.monitor.camera_retry_ms);
    let mut reaction = WindowReaction::default();

    loop {
        let worker = Arc::clone(&state);
        let delay = match tokio::task::spawn_blocking(move || process_frame(&worker)).await {
            Ok(Tick::Frame { door, image }) => {
                debug!("Frame processed, door {}", door);
                if let Some(Reaction { status, action }) = reaction.observe(door) {
                    state.emit(ServerEvent::DoorStatus { status });
                    if let Some(action) = action {
                        apply_action(&state, action).await;
                    }
                }
                if let Some(image) = image {
                    state.emit(ServerEvent::VideoFeed { image });
                }
                frame_interval
            }
            Ok(Tick::CameraError(message)) => {
                warn!("Camera read failed: {}", message);
                state.camera.release();
                state.emit(ServerEvent::error(ErrorKind::CameraError, message));
                camera_retry
            }
            Ok(Tick::DetectionError(message)) => {
                warn!("Detection failed: {}", message);
                state.emit(ServerEvent::error(ErrorKind::DetectionError, message));
                frame_interval
            }
            Err(e) => {
                error!("Frame task failed: {}", e);
                frame_interval
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop.changed() => break,
        }
        if *stop.borrow() {
            break;
        }
    }

    state.camera.release();
}
