//! Window Manager Implementation

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{BackendKind, WindowBackend, WindowError, WindowId};

/// Window manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowManagerConfig {
    /// Backend driving the desktop
    pub backend: BackendKind,
    /// Pause after each minimize/restore so the desktop can settle (milliseconds)
    pub step_delay_ms: u64,
}

impl Default for WindowManagerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Wmctrl,
            step_delay_ms: 100,
        }
    }
}

/// Window counts for the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowStatus {
    pub visible_windows: usize,
    pub minimized_windows: usize,
    pub saved_minimized_windows: usize,
}

#[derive(Debug, Clone)]
struct SavedWindow {
    id: WindowId,
    title: String,
}

/// Minimizes every visible window and later restores exactly those
pub struct WindowManager {
    backend: Box<dyn WindowBackend>,
    saved: Mutex<Vec<SavedWindow>>,
    step_delay: Duration,
}

impl WindowManager {
    pub fn new(backend: Box<dyn WindowBackend>, config: &WindowManagerConfig) -> Self {
        info!("Creating window manager with config: {:?}", config);
        Self {
            backend,
            saved: Mutex::new(Vec::new()),
            step_delay: Duration::from_millis(config.step_delay_ms),
        }
    }

    /// Build the configured backend
    pub fn from_config(config: &WindowManagerConfig) -> Self {
        Self::new(config.backend.create(), config)
    }

    fn saved(&self) -> MutexGuard<'_, Vec<SavedWindow>> {
        self.saved.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self) {
        if !self.step_delay.is_zero() {
            std::thread::sleep(self.step_delay);
        }
    }

    /// Minimize all visible, non-minimized windows and remember them.
    /// Returns how many were minimized.
    pub fn minimize_all_windows(&self) -> Result<usize, WindowError> {
        let mut saved = self.saved();
        saved.clear();

        for window in self.backend.list_windows()? {
            if !window.visible || window.minimized {
                continue;
            }
            match self.backend.minimize(window.id) {
                Ok(()) => {
                    debug!("Minimized window {:#x} '{}'", window.id, window.title);
                    saved.push(SavedWindow {
                        id: window.id,
                        title: window.title,
                    });
                    self.settle();
                }
                Err(e) => warn!("Failed to minimize window '{}': {}", window.title, e),
            }
        }

        info!("Minimized {} windows", saved.len());
        Ok(saved.len())
    }

    /// Restore the remembered windows in reverse order, skipping any that
    /// have been closed since. Returns how many were restored.
    pub fn restore_all_windows(&self) -> Result<usize, WindowError> {
        let mut saved = self.saved();
        let existing: Option<HashSet<WindowId>> = match self.backend.list_windows() {
            Ok(windows) => Some(windows.into_iter().map(|w| w.id).collect()),
            Err(e) => {
                warn!("Could not list windows before restoring: {}", e);
                None
            }
        };

        let mut restored = 0;
        for window in saved.iter().rev() {
            if existing.as_ref().is_some_and(|ids| !ids.contains(&window.id)) {
                debug!("Window '{}' is gone, not restoring", window.title);
                continue;
            }
            match self.backend.restore(window.id) {
                Ok(()) => {
                    restored += 1;
                    self.settle();
                }
                Err(e) => warn!("Failed to restore window '{}': {}", window.title, e),
            }
        }

        saved.clear();
        info!("Restored {} windows", restored);
        Ok(restored)
    }

    /// Number of windows waiting to be restored
    pub fn minimized_count(&self) -> usize {
        self.saved().len()
    }

    pub fn window_status(&self) -> Result<WindowStatus, WindowError> {
        let saved = self.saved().len();
        let windows = self.backend.list_windows()?;
        let visible: Vec<_> = windows.iter().filter(|w| w.visible).collect();
        let minimized = visible.iter().filter(|w| w.minimized).count();

        Ok(WindowStatus {
            visible_windows: visible.len() - minimized,
            minimized_windows: minimized,
            saved_minimized_windows: saved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryBackend, WindowInfo, WindowOp};

    fn window(id: WindowId, title: &str, visible: bool, minimized: bool) -> WindowInfo {
        WindowInfo {
            id,
            title: title.to_string(),
            visible,
            minimized,
        }
    }

    fn manager(backend: &MemoryBackend) -> WindowManager {
        let config = WindowManagerConfig {
            backend: BackendKind::Memory,
            step_delay_ms: 0,
        };
        WindowManager::new(Box::new(backend.clone()), &config)
    }

    fn desktop() -> MemoryBackend {
        MemoryBackend::new(vec![
            window(1, "editor", true, false),
            window(2, "browser", true, false),
            window(3, "already hidden", true, true),
            window(4, "panel", false, false),
        ])
    }

    #[test]
    fn test_minimize_only_visible_windows() {
        let backend = desktop();
        let manager = manager(&backend);

        assert_eq!(manager.minimize_all_windows().unwrap(), 2);
        assert_eq!(manager.minimized_count(), 2);
        assert_eq!(backend.operations(), vec![WindowOp::Minimize(1), WindowOp::Minimize(2)]);
    }

    #[test]
    fn test_restore_in_reverse_order() {
        let backend = desktop();
        let manager = manager(&backend);
        manager.minimize_all_windows().unwrap();

        assert_eq!(manager.restore_all_windows().unwrap(), 2);
        assert_eq!(
            backend.operations()[2..],
            [WindowOp::Restore(2), WindowOp::Restore(1)]
        );
        assert_eq!(manager.minimized_count(), 0);
    }

    #[test]
    fn test_closed_windows_are_skipped() {
        let backend = desktop();
        let manager = manager(&backend);
        manager.minimize_all_windows().unwrap();
        backend.close_window(2);

        assert_eq!(manager.restore_all_windows().unwrap(), 1);
        assert_eq!(backend.operations().last(), Some(&WindowOp::Restore(1)));
    }

    #[test]
    fn test_failed_minimize_is_not_saved() {
        let backend = desktop();
        backend.fail_on(1);
        let manager = manager(&backend);

        assert_eq!(manager.minimize_all_windows().unwrap(), 1);
        manager.restore_all_windows().unwrap();
        assert_eq!(backend.operations().last(), Some(&WindowOp::Restore(2)));
    }

    #[test]
    fn test_second_minimize_replaces_saved_list() {
        let backend = desktop();
        let manager = manager(&backend);
        manager.minimize_all_windows().unwrap();
        // everything is minimized now, so nothing new is saved
        assert_eq!(manager.minimize_all_windows().unwrap(), 0);
        assert_eq!(manager.restore_all_windows().unwrap(), 0);
    }

    #[test]
    fn test_window_status() {
        let backend = desktop();
        let manager = manager(&backend);
        let before = manager.window_status().unwrap();
        assert_eq!(
            before,
            WindowStatus {
                visible_windows: 2,
                minimized_windows: 1,
                saved_minimized_windows: 0
            }
        );

        manager.minimize_all_windows().unwrap();
        let after = manager.window_status().unwrap();
        assert_eq!(after.visible_windows, 0);
        assert_eq!(after.minimized_windows, 3);
        assert_eq!(after.saved_minimized_windows, 2);
    }
}
