//! Window Manager
//!
//! Hides the desktop when the door opens and brings it back when it closes:
//! - Backend trait over the platform's window listing and minimize/restore
//! - X11 backend driven through `wmctrl`, `xprop` and `xdotool`
//! - In-memory backend for headless runs

mod manager;
mod memory;
mod wmctrl;

pub use manager::{WindowManager, WindowManagerConfig, WindowStatus};
pub use memory::{MemoryBackend, WindowOp};
pub use wmctrl::WmctrlBackend;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Window manager error types
#[derive(Error, Debug)]
pub enum WindowError {
    #[error("Window command failed: {0}")]
    Command(String),

    #[error("Window {0:#x} not found")]
    NotFound(u64),

    #[error("Unexpected window listing: {0}")]
    Parse(String),
}

/// Platform window identifier
pub type WindowId = u64;

/// Snapshot of one top-level window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: WindowId,
    pub title: String,
    pub visible: bool,
    pub minimized: bool,
}

/// Platform window operations
pub trait WindowBackend: Send + Sync {
    /// All top-level windows
    fn list_windows(&self) -> Result<Vec<WindowInfo>, WindowError>;

    fn minimize(&self, id: WindowId) -> Result<(), WindowError>;

    fn restore(&self, id: WindowId) -> Result<(), WindowError>;
}

/// Which backend to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Wmctrl,
    Memory,
}

impl BackendKind {
    pub fn create(&self) -> Box<dyn WindowBackend> {
        match self {
            BackendKind::Wmctrl => Box::new(WmctrlBackend::new()),
            BackendKind::Memory => Box::new(MemoryBackend::default()),
        }
    }
}
