//! Per-launch state: the process, its main window, and the files the run
//! created on disk.

use crate::platforms::WindowHandle;
use crate::BestEffort;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// The launched application process. At most one per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetProcess {
    pub pid: u32,
    pub executable: PathBuf,
}

/// Lookup-only reference to the application's primary window. The OS owns
/// its lifetime; the handle can go stale whenever the process exits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MainWindow {
    pub handle: WindowHandle,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub process: TargetProcess,
    pub main_window: MainWindow,
    /// The copy the application actually opened, when a document was given.
    pub document: Option<PathBuf>,
}

impl Session {
    pub fn new(process: TargetProcess, main_window: MainWindow, document: Option<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            process,
            main_window,
            document,
        }
    }

    pub fn pid(&self) -> u32 {
        self.process.pid
    }

    pub fn window(&self) -> WindowHandle {
        self.main_window.handle
    }
}

/// Files this run created, plus the caller's documents it must not lose.
/// The janitor never deletes anything listed here; only the created copies
/// are removed after an error.
#[derive(Debug, Clone, Default)]
pub struct CopiedFileRegistry {
    paths: BTreeSet<PathBuf>,
    protected: BTreeSet<PathBuf>,
}

fn insert_spellings(set: &mut BTreeSet<PathBuf>, path: PathBuf) {
    if let Ok(canonical) = path.canonicalize() {
        if canonical != path {
            set.insert(canonical);
        }
    }
    set.insert(path);
}

fn contains_spelling(set: &BTreeSet<PathBuf>, path: &Path) -> bool {
    set.contains(path)
        || path
            .canonicalize()
            .map(|canonical| set.contains(&canonical))
            .unwrap_or(false)
}

impl CopiedFileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `path`, and its canonical form when it differs, so lookups
    /// succeed whichever spelling the janitor encounters.
    pub fn record(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        debug!("Recorded session copy {}", path.display());
        insert_spellings(&mut self.paths, path);
    }

    /// Shields a file the run did not create from the janitor. Protected
    /// files are never removed by [`remove_files`](Self::remove_files).
    pub fn protect(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        debug!("Protecting {}", path.display());
        insert_spellings(&mut self.protected, path);
    }

    /// Whether the janitor must keep `path`.
    pub fn contains(&self, path: &Path) -> bool {
        contains_spelling(&self.paths, path) || contains_spelling(&self.protected, path)
    }

    pub fn is_protected(&self, path: &Path) -> bool {
        contains_spelling(&self.protected, path)
    }

    /// Recorded copies; protected files are not listed.
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn clear(&mut self) {
        self.paths.clear();
        self.protected.clear();
    }

    /// Deletes every recorded file that still exists. Returns how many were
    /// removed; failures are logged and skipped.
    pub fn remove_files(&self) -> usize {
        let mut removed = 0;
        let deletable = self
            .paths
            .iter()
            .filter(|p| p.is_file() && !contains_spelling(&self.protected, p));
        for path in deletable {
            let outcome = BestEffort::attempt("remove session copy", || {
                std::fs::remove_file(path).map_err(Into::into)
            });
            if outcome.ok().is_some() {
                info!("Removed session copy {}", path.display());
                removed += 1;
            }
        }
        removed
    }
}

impl<P: Into<PathBuf>> Extend<P> for CopiedFileRegistry {
    fn extend<I: IntoIterator<Item = P>>(&mut self, iter: I) {
        for path in iter {
            self.record(path);
        }
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for CopiedFileRegistry {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        let mut registry = Self::new();
        registry.extend(iter);
        registry
    }
}
