//! In-memory desktop

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{WindowBackend, WindowError, WindowId, WindowInfo};

/// Operation recorded by [`MemoryBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOp {
    Minimize(WindowId),
    Restore(WindowId),
}

#[derive(Debug, Default)]
struct Desktop {
    windows: Vec<WindowInfo>,
    operations: Vec<WindowOp>,
    failing: HashSet<WindowId>,
}

/// Simulated desktop; clones share the same windows
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    desktop: Arc<Mutex<Desktop>>,
}

impl MemoryBackend {
    pub fn new(windows: Vec<WindowInfo>) -> Self {
        Self {
            desktop: Arc::new(Mutex::new(Desktop {
                windows,
                ..Default::default()
            })),
        }
    }

    fn desktop(&self) -> MutexGuard<'_, Desktop> {
        self.desktop.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn close_window(&self, id: WindowId) {
        self.desktop().windows.retain(|w| w.id != id);
    }

    /// Make minimize/restore of `id` fail
    pub fn fail_on(&self, id: WindowId) {
        self.desktop().failing.insert(id);
    }

    /// Operations applied so far, oldest first
    pub fn operations(&self) -> Vec<WindowOp> {
        self.desktop().operations.clone()
    }

    fn set_minimized(&self, id: WindowId, minimized: bool) -> Result<(), WindowError> {
        let mut desktop = self.desktop();
        if desktop.failing.contains(&id) {
            return Err(WindowError::Command(format!("window {:#x} refused", id)));
        }
        let window = desktop
            .windows
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or(WindowError::NotFound(id))?;
        window.minimized = minimized;
        desktop.operations.push(if minimized {
            WindowOp::Minimize(id)
        } else {
            WindowOp::Restore(id)
        });
        Ok(())
    }
}

impl WindowBackend for MemoryBackend {
    fn list_windows(&self) -> Result<Vec<WindowInfo>, WindowError> {
        Ok(self.desktop().windows.clone())
    }

    fn minimize(&self, id: WindowId) -> Result<(), WindowError> {
        self.set_minimized(id, true)
    }

    fn restore(&self, id: WindowId) -> Result<(), WindowError> {
        self.set_minimized(id, false)
    }
}
