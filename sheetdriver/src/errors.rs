use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Window not found: {0}")]
    WindowNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid title pattern: {0}")]
    InvalidPattern(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No active session")]
    NoSession,

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal failures of a single launch attempt. The caller may retry with a
/// fresh launch; nothing inside the launcher retries on its own.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Target executable not found ({checked} candidate locations checked)")]
    ExecutableNotFound { checked: usize },

    #[error("Input document unavailable '{path}': {reason}")]
    DocumentUnavailable { path: PathBuf, reason: String },

    #[error("Failed to spawn '{path}': {reason}")]
    ProcessSpawnFailed { path: PathBuf, reason: String },

    /// The process was started but its main window never became visible.
    /// `pid` is still running; terminating it is the caller's job.
    #[error("Main window matching '{pattern}' not visible within {timeout:?} (pid {pid})")]
    WindowTimeout {
        pattern: String,
        timeout: Duration,
        pid: u32,
    },
}

impl LaunchError {
    /// Stable reason code for reporting.
    pub fn code(&self) -> &'static str {
        match self {
            LaunchError::ExecutableNotFound { .. } => "executable_not_found",
            LaunchError::DocumentUnavailable { .. } => "document_unavailable",
            LaunchError::ProcessSpawnFailed { .. } => "process_spawn_failed",
            LaunchError::WindowTimeout { .. } => "window_timeout",
        }
    }

    /// Pid of a process this failed attempt left behind, if any.
    pub fn orphan_pid(&self) -> Option<u32> {
        match self {
            LaunchError::WindowTimeout { pid, .. } => Some(*pid),
            _ => None,
        }
    }
}

/// Outcome of an operation whose failure is expected and ignorable.
///
/// Required operations return `Result<T, AutomationError>` and propagate with
/// `?`. Operations that race the window manager or the filesystem return a
/// `BestEffort` instead, so the caller has to decide explicitly whether to
/// look at the failure or drop it (which logs it at debug level).
#[must_use = "inspect the outcome or call `.ok()` to log and drop the failure"]
pub struct BestEffort<T = ()> {
    operation: &'static str,
    result: Result<T, AutomationError>,
}

impl<T> BestEffort<T> {
    /// Runs `op`, capturing its failure instead of propagating it.
    pub fn attempt<F>(operation: &'static str, op: F) -> Self
    where
        F: FnOnce() -> Result<T, AutomationError>,
    {
        Self {
            operation,
            result: op(),
        }
    }

    pub fn from_result(operation: &'static str, result: Result<T, AutomationError>) -> Self {
        Self { operation, result }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&AutomationError> {
        self.result.as_ref().err()
    }

    /// Returns the value, logging a failure at debug level.
    pub fn ok(self) -> Option<T> {
        match self.result {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("{} failed (ignored): {}", self.operation, e);
                None
            }
        }
    }
}

impl<T> fmt::Debug for BestEffort<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BestEffort")
            .field("operation", &self.operation)
            .field("succeeded", &self.result.is_ok())
            .field("error", &self.result.as_ref().err())
            .finish()
    }
}
