//! X11 backend using the `wmctrl`, `xprop` and `xdotool` command-line tools

use std::process::Command;

use tracing::debug;

use crate::{WindowBackend, WindowError, WindowId, WindowInfo};

const HIDDEN_ATOM: &str = "_NET_WM_STATE_HIDDEN";

/// Drives an EWMH-compliant X11 window manager
#[derive(Debug, Clone, Default)]
pub struct WmctrlBackend;

impl WmctrlBackend {
    pub fn new() -> Self {
        Self
    }

    fn run(program: &str, args: &[&str]) -> Result<String, WindowError> {
        debug!("Running {} {:?}", program, args);
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| WindowError::Command(format!("{}: {}", program, e)))?;

        if !output.status.success() {
            return Err(WindowError::Command(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn is_hidden(id: WindowId) -> bool {
        Self::run("xprop", &["-id", &format!("{:#x}", id), "_NET_WM_STATE"])
            .map(|state| state.contains(HIDDEN_ATOM))
            .unwrap_or(false)
    }
}

/// Split off the next whitespace-delimited field
fn next_field(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    Some((&s[..end], &s[end..]))
}

/// Parse one `wmctrl -l` line: `<id> <desktop> <host> <title...>`.
/// Sticky windows (desktop -1: panels, docks) are reported as not visible.
fn parse_wmctrl_line(line: &str) -> Result<WindowInfo, WindowError> {
    let malformed = || WindowError::Parse(line.to_string());

    let (id, rest) = next_field(line).ok_or_else(malformed)?;
    let (desktop, rest) = next_field(rest).ok_or_else(malformed)?;
    let title = next_field(rest).map(|(_, title)| title.trim()).unwrap_or("");

    let id = WindowId::from_str_radix(id.trim_start_matches("0x"), 16).map_err(|_| malformed())?;
    let desktop: i64 = desktop.parse().map_err(|_| malformed())?;

    Ok(WindowInfo {
        id,
        title: title.to_string(),
        visible: desktop >= 0,
        minimized: false,
    })
}

impl WindowBackend for WmctrlBackend {
    fn list_windows(&self) -> Result<Vec<WindowInfo>, WindowError> {
        Self::run("wmctrl", &["-l"])?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let mut window = parse_wmctrl_line(line)?;
                window.minimized = Self::is_hidden(window.id);
                Ok(window)
            })
            .collect()
    }

    fn minimize(&self, id: WindowId) -> Result<(), WindowError> {
        Self::run("xdotool", &["windowminimize", &id.to_string()]).map(|_| ())
    }

    fn restore(&self, id: WindowId) -> Result<(), WindowError> {
        Self::run("wmctrl", &["-i", "-a", &format!("{:#x}", id)]).map(|_| ())
    }
}
