//! Top-level window enumeration and activation through Win32

use super::utils::{create_ui_automation_with_com_init, from_hwnd, to_hwnd};
use crate::platforms::{WindowHandle, WindowInfo, WindowSystem};
use crate::AutomationError;
use tracing::debug;
use uiautomation::types::Handle;
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, TRUE};
use windows::Win32::UI::WindowsAndMessaging::{
    BringWindowToTop, EnumWindows, GetForegroundWindow, GetWindowTextLengthW, GetWindowTextW,
    GetWindowThreadProcessId, IsIconic, IsWindow, IsWindowVisible, SetForegroundWindow,
    ShowWindow, SW_RESTORE,
};

#[derive(Debug, Default)]
pub struct Win32Windows;

impl Win32Windows {
    pub fn new() -> Self {
        Self
    }
}

unsafe extern "system" fn collect_hwnd(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let handles = &mut *(lparam.0 as *mut Vec<isize>);
    handles.push(hwnd.0 as isize);
    TRUE
}

fn snapshot(hwnd: HWND) -> Option<WindowInfo> {
    unsafe {
        if !IsWindow(hwnd).as_bool() {
            return None;
        }
        let len = GetWindowTextLengthW(hwnd).max(0) as usize;
        let mut buf = vec![0u16; len + 1];
        let copied = GetWindowTextW(hwnd, &mut buf).max(0) as usize;
        let title = String::from_utf16_lossy(&buf[..copied.min(buf.len())]);
        let mut pid: u32 = 0;
        GetWindowThreadProcessId(hwnd, Some(&mut pid as *mut u32));
        Some(WindowInfo {
            handle: from_hwnd(hwnd),
            title,
            pid,
            visible: IsWindowVisible(hwnd).as_bool(),
        })
    }
}

fn stale(handle: WindowHandle) -> AutomationError {
    AutomationError::WindowNotFound(format!("window {:#x} no longer exists", handle.0))
}

impl WindowSystem for Win32Windows {
    fn top_level_windows(&self) -> Result<Vec<WindowInfo>, AutomationError> {
        let mut handles: Vec<isize> = Vec::new();
        unsafe {
            EnumWindows(
                Some(collect_hwnd),
                LPARAM(&mut handles as *mut Vec<isize> as isize),
            )
            .map_err(|e| AutomationError::PlatformError(format!("EnumWindows failed: {e}")))?;
        }
        // Windows can vanish between enumeration and inspection
        Ok(handles
            .into_iter()
            .filter_map(|raw| snapshot(to_hwnd(WindowHandle(raw))))
            .collect())
    }

    fn window_info(&self, handle: WindowHandle) -> Result<WindowInfo, AutomationError> {
        snapshot(to_hwnd(handle)).ok_or_else(|| stale(handle))
    }

    fn focus_window(&self, handle: WindowHandle) -> Result<(), AutomationError> {
        let automation = create_ui_automation_with_com_init()?;
        let element = automation
            .element_from_handle(Handle::from(handle.0))
            .map_err(|e| {
                AutomationError::PlatformError(format!(
                    "Failed to get UI element for window {:#x}: {e}",
                    handle.0
                ))
            })?;
        element
            .set_focus()
            .map_err(|e| AutomationError::PlatformError(format!("set_focus failed: {e}")))
    }

    fn restore_window(&self, handle: WindowHandle) -> Result<(), AutomationError> {
        let hwnd = to_hwnd(handle);
        unsafe {
            if !IsWindow(hwnd).as_bool() {
                return Err(stale(handle));
            }
            if IsIconic(hwnd).as_bool() {
                debug!("Window is minimized, restoring it");
            }
            // Return value is the previous visibility, not success
            let _ = ShowWindow(hwnd, SW_RESTORE);
        }
        Ok(())
    }

    fn set_foreground(&self, handle: WindowHandle) -> Result<(), AutomationError> {
        let hwnd = to_hwnd(handle);
        unsafe {
            if !IsWindow(hwnd).as_bool() {
                return Err(stale(handle));
            }
            let _ = BringWindowToTop(hwnd);
            if !SetForegroundWindow(hwnd).as_bool() {
                return Err(AutomationError::PlatformError(format!(
                    "SetForegroundWindow refused for window {:#x}",
                    handle.0
                )));
            }
        }
        Ok(())
    }

    fn foreground_window(&self) -> Result<Option<WindowHandle>, AutomationError> {
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.0.is_null() {
            Ok(None)
        } else {
            Ok(Some(from_hwnd(hwnd)))
        }
    }

    fn is_window(&self, handle: WindowHandle) -> bool {
        unsafe { IsWindow(to_hwnd(handle)).as_bool() }
    }
}
