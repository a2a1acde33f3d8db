//! Scripted stand-in for the desktop, shared by the integration tests.
#![allow(dead_code)]

use sheetdriver::config::RegistryLookup;
use sheetdriver::platforms::{
    InputInjector, InstallRegistry, Platform, ProcessControl, WindowHandle, WindowInfo,
    WindowSystem,
};
use sheetdriver::{AutomationConfig, AutomationError, KeyAction, TimingPolicy};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::Level;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::Subscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

struct ScriptedWindow {
    info: WindowInfo,
    appears_after: Duration,
    closed: bool,
}

/// Window list whose entries can appear after a delay or vanish on demand.
pub struct FakeDesktop {
    start: Instant,
    windows: Mutex<Vec<ScriptedWindow>>,
    foreground: Mutex<Option<WindowHandle>>,
    next_handle: AtomicIsize,
    vanish_on_focus: Mutex<HashSet<WindowHandle>>,
    calls: Mutex<Vec<String>>,
    pub fail_focus: AtomicBool,
    pub fail_restore: AtomicBool,
    pub fail_foreground: AtomicBool,
    /// Focus and foreground calls succeed without changing the foreground.
    pub ignore_foreground: AtomicBool,
    pub fail_queries: AtomicBool,
}

impl Default for FakeDesktop {
    fn default() -> Self {
        Self {
            start: Instant::now(),
            windows: Mutex::new(Vec::new()),
            foreground: Mutex::new(None),
            next_handle: AtomicIsize::new(0x100),
            vanish_on_focus: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            fail_focus: AtomicBool::new(false),
            fail_restore: AtomicBool::new(false),
            fail_foreground: AtomicBool::new(false),
            ignore_foreground: AtomicBool::new(false),
            fail_queries: AtomicBool::new(false),
        }
    }
}

impl FakeDesktop {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_window(&self, title: &str, pid: u32) -> WindowHandle {
        self.add_window_after(title, pid, Duration::ZERO)
    }

    /// Adds a window that only shows up once `delay` has passed since the
    /// desktop was created.
    pub fn add_window_after(&self, title: &str, pid: u32, delay: Duration) -> WindowHandle {
        let handle = WindowHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.windows.lock().unwrap().push(ScriptedWindow {
            info: WindowInfo {
                handle,
                title: title.to_string(),
                pid,
                visible: true,
            },
            appears_after: self.start.elapsed() + delay,
            closed: false,
        });
        handle
    }

    pub fn add_hidden_window(&self, title: &str, pid: u32) -> WindowHandle {
        let handle = self.add_window(title, pid);
        for w in self.windows.lock().unwrap().iter_mut() {
            if w.info.handle == handle {
                w.info.visible = false;
            }
        }
        handle
    }

    pub fn close_window(&self, handle: WindowHandle) {
        for w in self.windows.lock().unwrap().iter_mut() {
            if w.info.handle == handle {
                w.closed = true;
            }
        }
    }

    /// The window closes as soon as something tries to focus it.
    pub fn vanish_when_focused(&self, handle: WindowHandle) {
        self.vanish_on_focus.lock().unwrap().insert(handle);
    }

    pub fn set_foreground_window(&self, handle: Option<WindowHandle>) {
        *self.foreground.lock().unwrap() = handle;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn live(&self) -> Vec<WindowInfo> {
        let now = self.start.elapsed();
        self.windows
            .lock()
            .unwrap()
            .iter()
            .filter(|w| !w.closed && w.appears_after <= now)
            .map(|w| w.info.clone())
            .collect()
    }

    fn bring_forward(&self, handle: WindowHandle) {
        if !self.ignore_foreground.load(Ordering::SeqCst) {
            self.set_foreground_window(Some(handle));
        }
    }
}

fn gone(handle: WindowHandle) -> AutomationError {
    AutomationError::WindowNotFound(format!("{:#x}", handle.0))
}

impl WindowSystem for FakeDesktop {
    fn top_level_windows(&self) -> Result<Vec<WindowInfo>, AutomationError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(AutomationError::PlatformError("query failed".to_string()));
        }
        Ok(self.live())
    }

    fn window_info(&self, handle: WindowHandle) -> Result<WindowInfo, AutomationError> {
        self.live()
            .into_iter()
            .find(|w| w.handle == handle)
            .ok_or_else(|| gone(handle))
    }

    fn focus_window(&self, handle: WindowHandle) -> Result<(), AutomationError> {
        self.record(format!("focus {:#x}", handle.0));
        if self.fail_focus.load(Ordering::SeqCst) {
            return Err(AutomationError::PlatformError("focus refused".to_string()));
        }
        if self.vanish_on_focus.lock().unwrap().contains(&handle) {
            self.close_window(handle);
            return Err(gone(handle));
        }
        self.window_info(handle)?;
        self.bring_forward(handle);
        Ok(())
    }

    fn restore_window(&self, handle: WindowHandle) -> Result<(), AutomationError> {
        self.record(format!("restore {:#x}", handle.0));
        if self.fail_restore.load(Ordering::SeqCst) {
            return Err(AutomationError::PlatformError("restore refused".to_string()));
        }
        self.window_info(handle).map(|_| ())
    }

    fn set_foreground(&self, handle: WindowHandle) -> Result<(), AutomationError> {
        self.record(format!("foreground {:#x}", handle.0));
        if self.fail_foreground.load(Ordering::SeqCst) {
            return Err(AutomationError::PlatformError(
                "foreground refused".to_string(),
            ));
        }
        self.window_info(handle)?;
        self.bring_forward(handle);
        Ok(())
    }

    fn foreground_window(&self) -> Result<Option<WindowHandle>, AutomationError> {
        Ok(*self.foreground.lock().unwrap())
    }
}

type KeyHook = Box<dyn Fn(&KeyAction) + Send + Sync>;

/// Records every key sequence; can be told to fail or to react to input.
#[derive(Default)]
pub struct RecordingKeyboard {
    sent: Mutex<Vec<String>>,
    pub fail: AtomicBool,
    hook: Mutex<Option<KeyHook>>,
}

impl RecordingKeyboard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn on_send(&self, hook: impl Fn(&KeyAction) + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }
}

impl InputInjector for RecordingKeyboard {
    fn send_keys(&self, keys: &KeyAction) -> Result<(), AutomationError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AutomationError::PlatformError("input blocked".to_string()));
        }
        self.sent.lock().unwrap().push(keys.as_str().to_string());
        if let Some(hook) = self.hook.lock().unwrap().as_ref() {
            hook(keys);
        }
        Ok(())
    }
}

/// Window the fake process table opens when something is spawned.
pub struct SpawnWindow {
    pub desktop: Arc<FakeDesktop>,
    pub title: String,
    /// Owner pid to report instead of the spawned one.
    pub owner: Option<u32>,
}

#[derive(Default)]
pub struct FakeProcesses {
    next_pid: AtomicU32,
    running: Mutex<HashMap<u32, bool>>,
    spawned: Mutex<Vec<(PathBuf, Vec<String>)>>,
    killed: Mutex<Vec<u32>>,
    spawn_window: Mutex<Option<SpawnWindow>>,
    pub fail_spawn: AtomicBool,
}

impl FakeProcesses {
    pub fn new() -> Arc<Self> {
        let processes = Self::default();
        processes.next_pid.store(4100, Ordering::SeqCst);
        Arc::new(processes)
    }

    pub fn open_window_on_spawn(&self, window: SpawnWindow) {
        *self.spawn_window.lock().unwrap() = Some(window);
    }

    pub fn spawned(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.spawned.lock().unwrap().clone()
    }

    pub fn killed(&self) -> Vec<u32> {
        self.killed.lock().unwrap().clone()
    }

    /// Simulates the process exiting on its own.
    pub fn exit(&self, pid: u32) {
        self.running.lock().unwrap().insert(pid, false);
    }
}

impl ProcessControl for FakeProcesses {
    fn spawn(&self, program: &Path, args: &[String]) -> Result<u32, AutomationError> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(AutomationError::PlatformError("access denied".to_string()));
        }
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.spawned
            .lock()
            .unwrap()
            .push((program.to_path_buf(), args.to_vec()));
        self.running.lock().unwrap().insert(pid, true);
        if let Some(window) = self.spawn_window.lock().unwrap().as_ref() {
            window
                .desktop
                .add_window(&window.title, window.owner.unwrap_or(pid));
        }
        Ok(pid)
    }

    fn is_running(&self, pid: u32) -> bool {
        self.running
            .lock()
            .unwrap()
            .get(&pid)
            .copied()
            .unwrap_or(false)
    }

    fn kill(&self, pid: u32) -> Result<(), AutomationError> {
        self.killed.lock().unwrap().push(pid);
        self.running.lock().unwrap().insert(pid, false);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeRegistry {
    pub paths: Vec<PathBuf>,
}

impl InstallRegistry for FakeRegistry {
    fn registered_paths(&self, _lookups: &[RegistryLookup]) -> Vec<PathBuf> {
        self.paths.clone()
    }
}

pub struct Rig {
    pub platform: Platform,
    pub desktop: Arc<FakeDesktop>,
    pub keyboard: Arc<RecordingKeyboard>,
    pub processes: Arc<FakeProcesses>,
}

pub fn rig(registered: Vec<PathBuf>) -> Rig {
    let desktop = FakeDesktop::new();
    let keyboard = RecordingKeyboard::new();
    let processes = FakeProcesses::new();
    let platform = Platform {
        windows: desktop.clone(),
        input: keyboard.clone(),
        processes: processes.clone(),
        registry: Arc::new(FakeRegistry { paths: registered }),
    };
    Rig {
        platform,
        desktop,
        keyboard,
        processes,
    }
}

/// Fast timings, no real install paths, and everything on disk under `root`.
pub fn test_config(root: &Path) -> AutomationConfig {
    let mut config = AutomationConfig {
        timing: TimingPolicy::immediate(),
        recovery: Vec::new(),
        ..AutomationConfig::default()
    };
    config.app.well_known_paths = Vec::new();
    config.app.trusted_dir = Some(root.join("trusted"));
    config
}

/// Creates an empty file, and its parent directories.
pub fn touch(path: &Path) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"").unwrap();
    path.to_path_buf()
}
