//! Modal-dialog detection and keyboard handling.
//!
//! The target application raises dialogs without any notification, so
//! detection is a bounded polling loop over the top-level window list.

use crate::platforms::{InputInjector, WindowHandle, WindowInfo, WindowSystem};
use crate::{AutomationError, BestEffort, KeyAction, PatternSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of one detection attempt. Fresh on every poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DialogMatch {
    pub found: bool,
    pub handle: Option<WindowHandle>,
    pub title: Option<String>,
    pub matched_pattern: Option<String>,
}

impl DialogMatch {
    pub fn none() -> Self {
        Self::default()
    }

    fn hit(window: &WindowInfo, pattern: &str) -> Self {
        Self {
            found: true,
            handle: Some(window.handle),
            title: Some(window.title.clone()),
            matched_pattern: Some(pattern.to_string()),
        }
    }
}

/// One step of a dialog cascade: which dialog to look for and what to press.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogSpec {
    pub patterns: PatternSet,
    pub action: KeyAction,
}

impl DialogSpec {
    pub fn new(patterns: impl Into<PatternSet>, action: impl Into<KeyAction>) -> Self {
        Self {
            patterns: patterns.into(),
            action: action.into(),
        }
    }
}

#[derive(Clone)]
pub struct DialogWatcher {
    windows: Arc<dyn WindowSystem>,
    scan_name: String,
    main_window: Option<WindowHandle>,
}

impl DialogWatcher {
    /// `scan_name` limits the broad scan to titles containing the
    /// application's generic name.
    pub fn new(windows: Arc<dyn WindowSystem>, scan_name: impl Into<String>) -> Self {
        Self {
            windows,
            scan_name: scan_name.into(),
            main_window: None,
        }
    }

    /// Excludes the session's main window from [`poll`](Self::poll).
    pub fn with_main_window(mut self, main_window: Option<WindowHandle>) -> Self {
        self.main_window = main_window;
        self
    }

    /// Blocks until a window matching `patterns` appears or `timeout`
    /// elapses. Returns no later than one `interval` after the deadline.
    pub fn wait(
        &self,
        patterns: &PatternSet,
        timeout: Duration,
        interval: Duration,
    ) -> DialogMatch {
        if patterns.is_empty() {
            return DialogMatch::none();
        }
        // An unrepresentable deadline means no cap.
        let deadline = Instant::now().checked_add(timeout);
        debug!("Waiting up to {:?} for dialog {}", timeout, patterns);
        loop {
            let found = self.scan_once(patterns, None);
            if found.found {
                info!(
                    "Dialog detected: {:?} (pattern {:?})",
                    found.title, found.matched_pattern
                );
                return found;
            }
            let now = Instant::now();
            let remaining = match deadline {
                Some(deadline) if now >= deadline => break,
                Some(deadline) => deadline - now,
                None => interval,
            };
            thread::sleep(interval.min(remaining));
        }
        debug!("No dialog matching {} within {:?}", patterns, timeout);
        DialogMatch::none()
    }

    /// Single scan with no sleeping. The main window never counts as a dialog,
    /// in the direct pattern pass as well as the broad scan, so a pattern
    /// that happens to match the main window's title does not report it.
    pub fn poll(&self, patterns: &PatternSet) -> DialogMatch {
        if patterns.is_empty() {
            return DialogMatch::none();
        }
        self.scan_once(patterns, self.main_window)
    }

    fn scan_once(&self, patterns: &PatternSet, exclude: Option<WindowHandle>) -> DialogMatch {
        let windows = match self.windows.find_windows(&|w| Some(w.handle) != exclude) {
            Ok(windows) => windows,
            Err(e) => {
                debug!("Window query failed during dialog scan: {}", e);
                return DialogMatch::none();
            }
        };

        // Pattern order is the tie-break when several windows match.
        for pattern in patterns.iter() {
            if let Some(window) = windows.iter().find(|w| pattern.matches(&w.title)) {
                return DialogMatch::hit(window, pattern.as_str());
            }
        }

        let scan_name = self.scan_name.to_lowercase();
        if scan_name.is_empty() {
            return DialogMatch::none();
        }
        windows
            .iter()
            .filter(|w| w.title.to_lowercase().contains(&scan_name))
            .find_map(|w| {
                patterns
                    .first_substring_match(&w.title)
                    .map(|p| DialogMatch::hit(w, p.as_str()))
            })
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for DialogWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogWatcher")
            .field("scan_name", &self.scan_name)
            .field("main_window", &self.main_window)
            .finish_non_exhaustive()
    }
}

/// Waits for one dialog and answers it with a key sequence.
#[derive(Clone)]
pub struct DialogHandler {
    watcher: DialogWatcher,
    windows: Arc<dyn WindowSystem>,
    input: Arc<dyn InputInjector>,
    interval: Duration,
    settle: Duration,
}

impl DialogHandler {
    pub fn new(
        watcher: DialogWatcher,
        input: Arc<dyn InputInjector>,
        interval: Duration,
        settle: Duration,
    ) -> Self {
        Self {
            windows: Arc::clone(&watcher.windows),
            watcher,
            input,
            interval,
            settle,
        }
    }

    pub fn watcher(&self) -> &DialogWatcher {
        &self.watcher
    }

    /// True when no dialog appeared or when the action was delivered. False
    /// only when a detected dialog could not be answered.
    pub fn handle(&self, patterns: &PatternSet, action: &KeyAction, timeout: Duration) -> bool {
        let found = self.watcher.wait(patterns, timeout, self.interval);
        let Some(handle) = found.handle.filter(|_| found.found) else {
            debug!("No dialog for {}; nothing to do", patterns);
            return true;
        };
        match self.answer(handle, action) {
            Ok(()) => {
                info!("Sent {:?} to dialog {:?}", action.as_str(), found.title);
                true
            }
            Err(e) => {
                warn!("Failed to answer dialog {:?}: {}", found.title, e);
                false
            }
        }
    }

    fn answer(&self, handle: WindowHandle, action: &KeyAction) -> Result<(), AutomationError> {
        BestEffort::attempt("focus dialog", || self.windows.focus_window(handle)).ok();
        thread::sleep(self.settle);
        if !self.windows.is_window(handle) {
            return Err(AutomationError::WindowNotFound(format!(
                "dialog {:#x} closed before input could be sent",
                handle.0
            )));
        }
        self.input.send_keys(action)?;
        thread::sleep(self.settle);
        Ok(())
    }
}

impl std::fmt::Debug for DialogHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogHandler")
            .field("watcher", &self.watcher)
            .field("interval", &self.interval)
            .field("settle", &self.settle)
            .finish_non_exhaustive()
    }
}

/// Runs a handler over a dialog cascade without short-circuiting.
#[derive(Debug, Clone)]
pub struct DialogSequencePlayer {
    handler: DialogHandler,
}

impl DialogSequencePlayer {
    pub fn new(handler: DialogHandler) -> Self {
        Self { handler }
    }

    /// Every step gets its chance even after an earlier failure; the result
    /// is the AND of all individual outcomes.
    pub fn run(&self, specs: &[DialogSpec], per_dialog_timeout: Duration) -> bool {
        let mut all_ok = true;
        for (index, spec) in specs.iter().enumerate() {
            let ok = self
                .handler
                .handle(&spec.patterns, &spec.action, per_dialog_timeout);
            if !ok {
                warn!("Dialog step {} ({}) failed", index + 1, spec.patterns);
            }
            all_ok &= ok;
        }
        all_ok
    }
}
