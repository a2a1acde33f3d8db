use crate::config::RegistryLookup;
use crate::{AutomationError, KeyAction, TitlePattern};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opaque native window handle. May go stale at any time; every consumer
/// must tolerate the OS reporting it as gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(pub isize);

/// Snapshot of one top-level window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub handle: WindowHandle,
    pub title: String,
    pub pid: u32,
    pub visible: bool,
}

/// OS window query and window-state control
pub trait WindowSystem: Send + Sync {
    /// All top-level windows, visible or not, in z-order.
    fn top_level_windows(&self) -> Result<Vec<WindowInfo>, AutomationError>;

    /// Fresh snapshot of a single window; `WindowNotFound` if it is gone.
    fn window_info(&self, handle: WindowHandle) -> Result<WindowInfo, AutomationError>;

    /// Focus request through the accessibility/window-manager focus API.
    fn focus_window(&self, handle: WindowHandle) -> Result<(), AutomationError>;

    /// Restore from minimized/hidden state.
    fn restore_window(&self, handle: WindowHandle) -> Result<(), AutomationError>;

    /// Low-level bring-to-front.
    fn set_foreground(&self, handle: WindowHandle) -> Result<(), AutomationError>;

    fn foreground_window(&self) -> Result<Option<WindowHandle>, AutomationError>;

    fn is_window(&self, handle: WindowHandle) -> bool {
        self.window_info(handle).is_ok()
    }

    /// Visible top-level windows accepted by `filter`.
    fn find_windows(
        &self,
        filter: &dyn Fn(&WindowInfo) -> bool,
    ) -> Result<Vec<WindowInfo>, AutomationError> {
        Ok(self
            .top_level_windows()?
            .into_iter()
            .filter(|w| w.visible && filter(w))
            .collect())
    }

    /// First visible top-level window whose title matches `pattern`.
    fn find_window(&self, pattern: &TitlePattern) -> Result<Option<WindowInfo>, AutomationError> {
        Ok(self
            .find_windows(&|w| pattern.matches(&w.title))?
            .into_iter()
            .next())
    }
}

/// Keystroke injection into whatever window holds focus.
pub trait InputInjector: Send + Sync {
    fn send_keys(&self, keys: &KeyAction) -> Result<(), AutomationError>;
}

/// Spawn, query and kill processes.
pub trait ProcessControl: Send + Sync {
    /// Starts `program` with `args` and returns its pid.
    fn spawn(&self, program: &Path, args: &[String]) -> Result<u32, AutomationError>;

    fn is_running(&self, pid: u32) -> bool;

    fn kill(&self, pid: u32) -> Result<(), AutomationError>;
}

/// Install-location discovery through the OS registry of installed apps.
pub trait InstallRegistry: Send + Sync {
    /// Paths named by `lookups`, in lookup order. Unreadable entries are skipped.
    fn registered_paths(&self, lookups: &[RegistryLookup]) -> Vec<PathBuf>;
}

/// The OS capabilities the driver consumes, bundled.
#[derive(Clone)]
pub struct Platform {
    pub windows: Arc<dyn WindowSystem>,
    pub input: Arc<dyn InputInjector>,
    pub processes: Arc<dyn ProcessControl>,
    pub registry: Arc<dyn InstallRegistry>,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}

#[cfg(target_os = "windows")]
pub mod windows;

/// Create the platform bundle for the current OS
pub fn create_platform() -> Result<Platform, AutomationError> {
    #[cfg(target_os = "windows")]
    {
        windows::create()
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(AutomationError::UnsupportedPlatform(
            "keyboard-driven spreadsheet automation requires Windows".to_string(),
        ))
    }
}
