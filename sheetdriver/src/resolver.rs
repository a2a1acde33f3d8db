use crate::config::AppProfile;
use crate::platforms::InstallRegistry;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Locates the target executable from an ordered candidate list: registered
/// install locations first, then well-known install paths.
#[derive(Debug, Clone)]
pub struct PathResolver {
    candidates: Vec<PathBuf>,
}

impl PathResolver {
    pub fn new(registry: &dyn InstallRegistry, profile: &AppProfile) -> Self {
        let mut candidates = registry.registered_paths(&profile.registry_lookups);
        debug!(
            "{} registered install location(s) for {}",
            candidates.len(),
            profile.display_name
        );
        candidates.extend(profile.well_known_paths.iter().cloned());
        Self { candidates }
    }

    pub fn from_candidates(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// First candidate that exists on disk, in candidate order.
    pub fn resolve(&self) -> Option<PathBuf> {
        for candidate in &self.candidates {
            if candidate.is_file() {
                info!("Resolved executable: {}", candidate.display());
                return Some(candidate.clone());
            }
            debug!("Candidate not present: {}", candidate.display());
        }
        warn!(
            "No executable found among {} candidate(s)",
            self.candidates.len()
        );
        None
    }
}
