//! Windows platform implementation
//!
//! Window enumeration and state changes go through Win32, focus requests and
//! keystroke injection through the UI Automation API (uiautomation crate).

pub mod input;
pub mod process;
pub mod registry;
pub mod utils;
pub mod window;

pub use input::UiaKeyboard;
pub use process::NativeProcesses;
pub use registry::Win32Registry;
pub use window::Win32Windows;

use super::Platform;
use crate::AutomationError;
use std::sync::Arc;

pub fn create() -> Result<Platform, AutomationError> {
    Ok(Platform {
        windows: Arc::new(Win32Windows::new()),
        input: Arc::new(UiaKeyboard::new()),
        processes: Arc::new(NativeProcesses::new()),
        registry: Arc::new(Win32Registry),
    })
}
