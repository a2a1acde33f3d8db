//! Keyboard-only automation of a desktop spreadsheet application
//!
//! The target gives no event callbacks, so everything here is a bounded
//! attempt protocol: launch and wait for the main window, activate it through
//! a chain of fallback strategies, poll for modal dialogs and answer them
//! with key sequences, and clean up recovery artifacts afterwards.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

pub mod activator;
pub mod config;
pub mod dialog;
pub mod errors;
pub mod janitor;
pub mod keys;
pub mod launcher;
pub mod logging;
pub mod patterns;
pub mod platforms;
pub mod resolver;
pub mod session;

pub use activator::{ActivationCheck, WindowActivator};
pub use config::{AppProfile, AutomationConfig, LoggingConfig, RecoveryLocation, TimingPolicy};
pub use dialog::{DialogHandler, DialogMatch, DialogSequencePlayer, DialogSpec, DialogWatcher};
pub use errors::{AutomationError, BestEffort, LaunchError};
pub use janitor::{CleanupReport, RecoveryFileJanitor};
pub use keys::KeyAction;
pub use launcher::ProcessLauncher;
pub use logging::init_logging;
pub use patterns::{PatternSet, TitlePattern};
pub use platforms::{Platform, WindowHandle, WindowInfo};
pub use resolver::PathResolver;
pub use session::{CopiedFileRegistry, MainWindow, Session, TargetProcess};

/// How a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownMode {
    /// The run finished; the document copy holds the saved work and is kept.
    Normal,
    /// The run failed; the document copies are deleted as well.
    AfterError,
}

/// The main entry point: one driven application session at a time.
pub struct Driver {
    platform: Platform,
    config: Arc<AutomationConfig>,
    janitor: RecoveryFileJanitor,
    copies: CopiedFileRegistry,
    session: Option<Session>,
    /// Process left running by a launch that failed after spawning.
    orphan_pid: Option<u32>,
}

impl Driver {
    pub fn new(platform: Platform, config: AutomationConfig) -> Result<Self, AutomationError> {
        config.validate()?;
        let janitor = RecoveryFileJanitor::new(&config.recovery)?;
        Ok(Self {
            platform,
            config: Arc::new(config),
            janitor,
            copies: CopiedFileRegistry::new(),
            session: None,
            orphan_pid: None,
        })
    }

    /// Native platform with the configuration named by `SHEETDRIVER_CONFIG`
    /// (or defaults).
    pub fn new_default() -> Result<Self, AutomationError> {
        let config = AutomationConfig::from_env()?;
        Self::new(platforms::create_platform()?, config)
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn copies(&self) -> &CopiedFileRegistry {
        &self.copies
    }

    /// Resolves the installed executable and launches it.
    #[instrument(skip(self, document))]
    pub fn launch(&mut self, document: Option<&Path>) -> Result<&Session, AutomationError> {
        let resolver = PathResolver::new(self.platform.registry.as_ref(), &self.config.app);
        let executable = resolver.resolve().ok_or(LaunchError::ExecutableNotFound {
            checked: resolver.candidates().len(),
        })?;
        self.launch_executable(&executable, document)
    }

    /// Launches a known executable, bypassing install discovery.
    #[instrument(skip(self, executable, document))]
    pub fn launch_executable(
        &mut self,
        executable: &Path,
        document: Option<&Path>,
    ) -> Result<&Session, AutomationError> {
        if let Some(existing) = &self.session {
            return Err(AutomationError::InvalidArgument(format!(
                "session {} is still active; terminate it first",
                existing.id
            )));
        }
        let launcher = ProcessLauncher::new(
            Arc::clone(&self.platform.windows),
            Arc::clone(&self.platform.processes),
            self.config.app.clone(),
            self.config.timing.clone(),
        )
        .with_janitor(self.janitor.clone());

        match launcher.launch(executable, document, &mut self.copies) {
            Ok(session) => {
                info!(session = %session.id, pid = session.pid(), "Session started");
                let session = self.session.insert(session);
                Ok(&*session)
            }
            Err(e) => {
                if let Some(pid) = e.orphan_pid() {
                    self.orphan_pid = Some(pid);
                }
                Err(e.into())
            }
        }
    }

    fn activator(&self) -> WindowActivator {
        WindowActivator::new(
            Arc::clone(&self.platform.windows),
            Arc::clone(&self.platform.input),
            self.config.app.activation_title_hint.clone(),
            self.config.timing.activation_pause,
        )
    }

    fn watcher(&self) -> DialogWatcher {
        DialogWatcher::new(
            Arc::clone(&self.platform.windows),
            self.config.app.dialog_scan_name.clone(),
        )
        .with_main_window(self.session.as_ref().map(Session::window))
    }

    fn handler(&self) -> DialogHandler {
        DialogHandler::new(
            self.watcher(),
            Arc::clone(&self.platform.input),
            self.config.timing.dialog_poll_interval,
            self.config.timing.dialog_settle,
        )
    }

    /// Precondition for every user-level operation. A failure is reported,
    /// not raised, so the caller may still proceed.
    #[instrument(skip(self), fields(session = ?self.session.as_ref().map(|s| s.id)))]
    pub fn ensure_active(&self, operation: &str) -> bool {
        let Some(session) = &self.session else {
            warn!("No session to activate for '{}'", operation);
            return false;
        };
        debug!("Activating main window before '{}'", operation);
        let active = self.activator().activate(
            session,
            self.config.timing.max_activation_attempts,
            self.config.timing.retry_delay,
        );
        if !active {
            warn!("Proceeding with '{}' without confirmed activation", operation);
        }
        active
    }

    /// `timeout` defaults to the configured dialog timeout.
    #[instrument(skip(self, patterns), fields(patterns = %patterns))]
    pub fn wait_for_dialog(&self, patterns: &PatternSet, timeout: Option<Duration>) -> DialogMatch {
        self.watcher().wait(
            patterns,
            timeout.unwrap_or(self.config.timing.dialog_timeout),
            self.config.timing.dialog_poll_interval,
        )
    }

    #[instrument(skip(self, patterns), fields(patterns = %patterns))]
    pub fn is_dialog_present(&self, patterns: &PatternSet) -> bool {
        self.watcher().poll(patterns).found
    }

    #[instrument(skip(self, patterns, action), fields(patterns = %patterns, action = %action))]
    pub fn handle_dialog(
        &self,
        patterns: &PatternSet,
        action: &KeyAction,
        timeout: Option<Duration>,
    ) -> bool {
        self.handler().handle(
            patterns,
            action,
            timeout.unwrap_or(self.config.timing.dialog_timeout),
        )
    }

    #[instrument(skip(self, specs), fields(steps = specs.len()))]
    pub fn run_dialog_sequence(
        &self,
        specs: &[DialogSpec],
        per_dialog_timeout: Option<Duration>,
    ) -> bool {
        DialogSequencePlayer::new(self.handler()).run(
            specs,
            per_dialog_timeout.unwrap_or(self.config.timing.dialog_timeout),
        )
    }

    /// Presses Escape in the active window to dismiss whatever is open.
    #[instrument(skip(self))]
    pub fn dismiss_dialog(&self) -> bool {
        self.ensure_active("dismiss dialog");
        let sent = BestEffort::attempt("send escape", || {
            self.platform.input.send_keys(&KeyAction::escape())
        });
        if !sent.succeeded() {
            sent.ok();
            return false;
        }
        thread::sleep(self.config.timing.dialog_settle);
        true
    }

    /// Runs the janitor now, keeping this session's copies.
    #[instrument(skip(self))]
    pub fn cleanup_artifacts(&self) -> CleanupReport {
        self.janitor.clean(&self.copies)
    }

    /// Graceful close: activate, send `close_keys`, answer the configured
    /// close-dialog cascade, then wait for the process to exit. Returns
    /// whether it exited in time; a lingering process is left for
    /// [`terminate`](Self::terminate).
    #[instrument(skip(self, close_keys), fields(session = ?self.session.as_ref().map(|s| s.id)))]
    pub fn close(&mut self, close_keys: &KeyAction) -> Result<bool, AutomationError> {
        let pid = self.session.as_ref().ok_or(AutomationError::NoSession)?.pid();
        self.ensure_active("close");
        self.platform.input.send_keys(close_keys)?;
        info!("Sent close sequence {:?}", close_keys.as_str());

        if !self.run_dialog_sequence(&self.config.close_dialogs, None) {
            warn!("Close dialog cascade reported a failure");
        }

        let interval = self.config.timing.window_poll_interval;
        let deadline = Instant::now().checked_add(self.config.timing.graceful_close_timeout);
        while self.platform.processes.is_running(pid) {
            let now = Instant::now();
            let remaining = match deadline {
                Some(deadline) if now >= deadline => {
                    warn!("Process {} still running after graceful close", pid);
                    return Ok(false);
                }
                Some(deadline) => deadline - now,
                None => interval,
            };
            thread::sleep(interval.min(remaining));
        }
        info!("Process {} exited", pid);
        Ok(true)
    }

    /// Kills anything still running, runs the janitor, and forgets the
    /// session. Safe to call repeatedly and after a failed launch.
    #[instrument(skip(self), fields(session = ?self.session.as_ref().map(|s| s.id)))]
    pub fn terminate(&mut self, mode: TeardownMode) -> CleanupReport {
        let pids = self
            .session
            .as_ref()
            .map(Session::pid)
            .into_iter()
            .chain(self.orphan_pid);
        for pid in pids {
            if self.platform.processes.is_running(pid) {
                let killed = BestEffort::attempt("kill target process", || {
                    self.platform.processes.kill(pid)
                });
                if killed.succeeded() {
                    info!("Killed process {}", pid);
                }
                killed.ok();
            }
        }

        let report = self.janitor.clean(&self.copies);
        if mode == TeardownMode::AfterError {
            let removed = self.copies.remove_files();
            debug!("Removed {} session cop(ies) after error", removed);
        }
        self.copies.clear();
        self.session = None;
        self.orphan_pid = None;
        report
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("session", &self.session)
            .field("copies", &self.copies)
            .field("orphan_pid", &self.orphan_pid)
            .finish_non_exhaustive()
    }
}
