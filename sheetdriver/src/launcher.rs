use crate::config::{AppProfile, TimingPolicy};
use crate::janitor::RecoveryFileJanitor;
use crate::platforms::{ProcessControl, WindowInfo, WindowSystem};
use crate::session::{CopiedFileRegistry, MainWindow, Session, TargetProcess};
use crate::{LaunchError, TitlePattern};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Starts the target application and resolves its main window.
pub struct ProcessLauncher {
    windows: Arc<dyn WindowSystem>,
    processes: Arc<dyn ProcessControl>,
    profile: AppProfile,
    timing: TimingPolicy,
    janitor: Option<RecoveryFileJanitor>,
}

impl ProcessLauncher {
    pub fn new(
        windows: Arc<dyn WindowSystem>,
        processes: Arc<dyn ProcessControl>,
        profile: AppProfile,
        timing: TimingPolicy,
    ) -> Self {
        Self {
            windows,
            processes,
            profile,
            timing,
            janitor: None,
        }
    }

    /// Janitor run before the document is copied, to clear stale artifacts
    /// from a crashed earlier run.
    pub fn with_janitor(mut self, janitor: RecoveryFileJanitor) -> Self {
        self.janitor = Some(janitor);
        self
    }

    /// Starts `executable`, optionally opening a trusted-location copy of
    /// `document`. The copy is recorded in `copies` before the spawn, so it
    /// is known even when a later step fails. `document` itself is protected
    /// before the janitor runs.
    ///
    /// On `WindowTimeout` the process keeps running; its pid is in the error.
    pub fn launch(
        &self,
        executable: &Path,
        document: Option<&Path>,
        copies: &mut CopiedFileRegistry,
    ) -> Result<Session, LaunchError> {
        if !executable.is_file() {
            error!("Executable missing: {}", executable.display());
            return Err(LaunchError::ExecutableNotFound { checked: 1 });
        }

        if let Some(document) = document {
            copies.protect(document);
        }
        if let Some(janitor) = &self.janitor {
            janitor.clean(copies);
        }

        let opened = match document {
            Some(document) => {
                let (path, copied) = self.copy_to_trusted(document)?;
                if copied {
                    copies.record(&path);
                }
                Some(path)
            }
            None => None,
        };

        // The flags suppress the blank workbook, so a bare launch gets none.
        let args = match &opened {
            Some(doc) => {
                let mut args = self.profile.document_flags.clone();
                args.push(doc.to_string_lossy().into_owned());
                args
            }
            None => Vec::new(),
        };
        let pid = self.processes.spawn(executable, &args).map_err(|e| {
            error!("Failed to spawn {}: {}", executable.display(), e);
            LaunchError::ProcessSpawnFailed {
                path: executable.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        info!("Started {} (pid {})", self.profile.display_name, pid);

        thread::sleep(self.timing.startup_wait);

        let window = self.wait_for_main_window(pid)?;
        info!("Main window ready: {:?}", window.title);
        Ok(Session::new(
            TargetProcess {
                pid,
                executable: executable.to_path_buf(),
            },
            MainWindow {
                handle: window.handle,
                title: window.title,
            },
            opened,
        ))
    }

    /// Returns the path to open and whether a new copy was written. A
    /// document already in the trusted directory is opened in place; it stays
    /// protected and is not the session's to delete.
    fn copy_to_trusted(&self, document: &Path) -> Result<(PathBuf, bool), LaunchError> {
        let unavailable = |reason: String| LaunchError::DocumentUnavailable {
            path: document.to_path_buf(),
            reason,
        };
        if !document.is_file() {
            return Err(unavailable("file does not exist".to_string()));
        }
        let dir = self
            .profile
            .trusted_dir()
            .ok_or_else(|| unavailable("no trusted directory available".to_string()))?;
        let name = document
            .file_name()
            .ok_or_else(|| unavailable("path has no file name".to_string()))?;
        let target = dir.join(name);

        let same_file = match (document.canonicalize(), target.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if same_file {
            debug!("{} already in trusted location", document.display());
            return Ok((target, false));
        }
        std::fs::create_dir_all(&dir).map_err(|e| unavailable(e.to_string()))?;
        std::fs::copy(document, &target).map_err(|e| unavailable(e.to_string()))?;
        info!(
            "Copied {} to trusted location {}",
            document.display(),
            target.display()
        );
        Ok((target, true))
    }

    /// Polls for a window of `pid` until the deadline. A title match owned by
    /// another process is only taken once the deadline has passed, since the
    /// document may have been handed to an instance that was already running.
    fn wait_for_main_window(&self, pid: u32) -> Result<WindowInfo, LaunchError> {
        let pattern = TitlePattern::new(self.profile.main_window_pattern.as_str());
        let timeout = self.timing.window_visible_timeout;
        let deadline = Instant::now().checked_add(timeout);
        let mut fallback = None;
        loop {
            match self.windows.find_windows(&|w| pattern.matches(&w.title)) {
                Ok(candidates) => {
                    let owned = candidates.iter().position(|w| w.pid == pid);
                    if let Some(index) = owned {
                        return Ok(candidates[index].clone());
                    }
                    fallback = candidates.into_iter().next();
                }
                Err(e) => debug!("Window query failed while waiting for main window: {}", e),
            }
            let now = Instant::now();
            let remaining = match deadline {
                Some(deadline) if now >= deadline => break,
                Some(deadline) => deadline - now,
                None => self.timing.window_poll_interval,
            };
            thread::sleep(self.timing.window_poll_interval.min(remaining));
        }
        if let Some(other) = fallback {
            warn!(
                "Main window {:?} belongs to pid {}, not {}",
                other.title, other.pid, pid
            );
            return Ok(other);
        }
        error!("Main window '{}' not visible within {:?}", pattern, timeout);
        Err(LaunchError::WindowTimeout {
            pattern: pattern.to_string(),
            timeout,
            pid,
        })
    }
}

impl std::fmt::Debug for ProcessLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessLauncher")
            .field("profile", &self.profile.display_name)
            .field("janitor", &self.janitor.is_some())
            .finish_non_exhaustive()
    }
}
