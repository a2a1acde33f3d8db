//! Best-effort removal of autosave, lock and recovered-copy files the target
//! application leaves behind.

use crate::config::RecoveryLocation;
use crate::session::CopiedFileRegistry;
use crate::AutomationError;
use glob::{MatchOptions, Pattern};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    /// Matched a pattern but belongs to this session.
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone)]
struct CompiledLocation {
    dir: PathBuf,
    patterns: Vec<Pattern>,
}

#[derive(Debug, Clone)]
pub struct RecoveryFileJanitor {
    locations: Vec<CompiledLocation>,
}

impl RecoveryFileJanitor {
    pub fn new(locations: &[RecoveryLocation]) -> Result<Self, AutomationError> {
        let locations = locations
            .iter()
            .map(|location| {
                let patterns = location
                    .patterns
                    .iter()
                    .map(|p| {
                        Pattern::new(p).map_err(|e| {
                            AutomationError::Config(format!("recovery pattern '{p}': {e}"))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledLocation {
                    dir: location.dir.clone(),
                    patterns,
                })
            })
            .collect::<Result<Vec<_>, AutomationError>>()?;
        Ok(Self { locations })
    }

    pub fn directories(&self) -> impl Iterator<Item = &Path> {
        self.locations.iter().map(|l| l.dir.as_path())
    }

    /// Deletes every matching file outside `exclude`. Never fails: missing
    /// directories are skipped and deletion errors land in `failed`.
    pub fn clean(&self, exclude: &CopiedFileRegistry) -> CleanupReport {
        let mut report = CleanupReport::default();
        for location in &self.locations {
            let entries = match std::fs::read_dir(&location.dir) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!("Skipping {}: {}", location.dir.display(), e);
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if !location
                    .patterns
                    .iter()
                    .any(|p| p.matches_with(&name, MATCH_OPTIONS))
                {
                    continue;
                }
                if exclude.contains(&path) {
                    debug!("Keeping session file {}", path.display());
                    report.skipped.push(path);
                    continue;
                }
                match std::fs::remove_file(&path) {
                    Ok(()) => {
                        debug!("Removed recovery artifact {}", path.display());
                        report.removed.push(path);
                    }
                    Err(e) => {
                        debug!("Could not remove {}: {}", path.display(), e);
                        report.failed.push(path);
                    }
                }
            }
        }
        if !report.removed.is_empty() || !report.failed.is_empty() {
            info!(
                "Recovery cleanup: {} removed, {} kept, {} failed",
                report.removed.len(),
                report.skipped.len(),
                report.failed.len()
            );
        }
        report
    }
}
