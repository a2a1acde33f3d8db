//! Immutable configuration consumed by every component.
//!
//! Nothing here is global: an [`AutomationConfig`] is built once (defaults, or
//! loaded from a JSON file) and handed to the components at construction.

use crate::{AutomationError, DialogSpec, KeyAction};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV_VAR: &str = "SHEETDRIVER_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub app: AppProfile,
    pub timing: TimingPolicy,
    pub recovery: Vec<RecoveryLocation>,
    pub logging: LoggingConfig,
    /// Dialog cascade handled after a graceful close.
    pub close_dialogs: Vec<DialogSpec>,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            app: AppProfile::default(),
            timing: TimingPolicy::default(),
            recovery: RecoveryLocation::defaults(),
            logging: LoggingConfig::default(),
            close_dialogs: vec![
                DialogSpec::new(["保存の確認", "Save As", "Microsoft Excel"], "s"),
                DialogSpec::new(["エラー", "Error"], KeyAction::enter()),
            ],
        }
    }
}

impl AutomationConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AutomationError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AutomationError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: AutomationConfig = serde_json::from_str(&raw).map_err(|e| {
            AutomationError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Loads the file named by `SHEETDRIVER_CONFIG`, or falls back to defaults.
    pub fn from_env() -> Result<Self, AutomationError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(PathBuf::from(path)),
            None => {
                debug!("{} not set, using default configuration", CONFIG_ENV_VAR);
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), AutomationError> {
        regex::Regex::new(&self.app.main_window_pattern).map_err(|e| {
            AutomationError::Config(format!(
                "main_window_pattern '{}' is not a valid regex: {e}",
                self.app.main_window_pattern
            ))
        })?;
        if self.timing.max_activation_attempts == 0 {
            return Err(AutomationError::Config(
                "max_activation_attempts must be at least 1".to_string(),
            ));
        }
        if self.timing.dialog_poll_interval.is_zero() || self.timing.window_poll_interval.is_zero()
        {
            return Err(AutomationError::Config(
                "poll intervals must be non-zero".to_string(),
            ));
        }
        for location in &self.recovery {
            for pattern in &location.patterns {
                glob::Pattern::new(pattern).map_err(|e| {
                    AutomationError::Config(format!("recovery pattern '{pattern}': {e}"))
                })?;
            }
        }
        Ok(())
    }
}

/// Named durations shared by all components. Never mutated during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingPolicy {
    /// Fixed wait after spawning, before looking for the main window.
    #[serde(with = "human_duration")]
    pub startup_wait: Duration,
    #[serde(with = "human_duration")]
    pub window_visible_timeout: Duration,
    #[serde(with = "human_duration")]
    pub window_poll_interval: Duration,
    /// Settle pause after each activation step.
    #[serde(with = "human_duration")]
    pub activation_pause: Duration,
    pub max_activation_attempts: u32,
    #[serde(with = "human_duration")]
    pub retry_delay: Duration,
    #[serde(with = "human_duration")]
    pub dialog_poll_interval: Duration,
    #[serde(with = "human_duration")]
    pub dialog_timeout: Duration,
    /// Settle pause around dialog focus and key injection.
    #[serde(with = "human_duration")]
    pub dialog_settle: Duration,
    #[serde(with = "human_duration")]
    pub graceful_close_timeout: Duration,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self {
            startup_wait: Duration::from_secs(3),
            window_visible_timeout: Duration::from_secs(10),
            window_poll_interval: Duration::from_millis(250),
            activation_pause: Duration::from_millis(500),
            max_activation_attempts: 3,
            retry_delay: Duration::from_secs(1),
            dialog_poll_interval: Duration::from_millis(500),
            dialog_timeout: Duration::from_secs(10),
            dialog_settle: Duration::from_secs(1),
            graceful_close_timeout: Duration::from_secs(5),
        }
    }
}

impl TimingPolicy {
    /// Every duration multiplied by `factor`; attempt counts are unchanged.
    pub fn scaled(&self, factor: f64) -> Self {
        if !(factor.is_finite() && factor > 0.0) || factor == 1.0 {
            return self.clone();
        }
        // Saturates instead of overflowing for huge factors.
        let scale = |d: Duration| {
            Duration::try_from_secs_f64(d.as_secs_f64() * factor).unwrap_or(Duration::MAX)
        };
        Self {
            startup_wait: scale(self.startup_wait),
            window_visible_timeout: scale(self.window_visible_timeout),
            window_poll_interval: scale(self.window_poll_interval),
            activation_pause: scale(self.activation_pause),
            max_activation_attempts: self.max_activation_attempts,
            retry_delay: scale(self.retry_delay),
            dialog_poll_interval: scale(self.dialog_poll_interval),
            dialog_timeout: scale(self.dialog_timeout),
            dialog_settle: scale(self.dialog_settle),
            graceful_close_timeout: scale(self.graceful_close_timeout),
        }
    }

    /// Millisecond-scale policy for tests against a fake desktop.
    pub fn immediate() -> Self {
        Self {
            startup_wait: Duration::ZERO,
            window_visible_timeout: Duration::from_millis(200),
            window_poll_interval: Duration::from_millis(10),
            activation_pause: Duration::ZERO,
            max_activation_attempts: 3,
            retry_delay: Duration::from_millis(5),
            dialog_poll_interval: Duration::from_millis(10),
            dialog_timeout: Duration::from_millis(100),
            dialog_settle: Duration::ZERO,
            graceful_close_timeout: Duration::from_millis(100),
        }
    }
}

/// One OS-registry location that may name the installed executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryLookup {
    /// Key below HKEY_LOCAL_MACHINE.
    pub key: String,
    /// Value name; empty string reads the key's default value.
    #[serde(default)]
    pub value: String,
    /// Appended to the value when it names a directory rather than the file.
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Description of the target application. Pure data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppProfile {
    pub display_name: String,
    /// Regex matched against top-level window titles of the spawned process.
    pub main_window_pattern: String,
    /// Generic name limiting the dialog watcher's broad scan.
    pub dialog_scan_name: String,
    /// Substring used by the last-resort activation strategy.
    pub activation_title_hint: String,
    pub registry_lookups: Vec<RegistryLookup>,
    /// Descending list of well-known install paths.
    pub well_known_paths: Vec<PathBuf>,
    /// Arguments placed before the document path.
    pub document_flags: Vec<String>,
    /// Where input documents are copied before opening. `None` uses the desktop.
    pub trusted_dir: Option<PathBuf>,
}

impl Default for AppProfile {
    fn default() -> Self {
        let office = |root: &str, tail: &str| PathBuf::from(format!("{root}\\{tail}\\EXCEL.EXE"));
        Self {
            display_name: "Microsoft Excel".to_string(),
            main_window_pattern: ".*Excel.*".to_string(),
            dialog_scan_name: "Microsoft Excel".to_string(),
            activation_title_hint: "Excel".to_string(),
            registry_lookups: vec![
                RegistryLookup {
                    key: r"SOFTWARE\Microsoft\Windows\CurrentVersion\App Paths\excel.exe"
                        .to_string(),
                    value: String::new(),
                    file_name: None,
                },
                RegistryLookup {
                    key: r"SOFTWARE\Microsoft\Office\16.0\Excel\InstallRoot".to_string(),
                    value: "Path".to_string(),
                    file_name: Some("EXCEL.EXE".to_string()),
                },
            ],
            well_known_paths: vec![
                office(r"C:\Program Files", r"Microsoft Office\root\Office16"),
                office(r"C:\Program Files (x86)", r"Microsoft Office\root\Office16"),
                office(r"C:\Program Files", r"Microsoft Office\Office16"),
                office(r"C:\Program Files (x86)", r"Microsoft Office\Office16"),
                office(r"C:\Program Files", r"Microsoft Office\root\Office15"),
                office(r"C:\Program Files (x86)", r"Microsoft Office\root\Office15"),
            ],
            document_flags: vec!["/e".to_string()],
            trusted_dir: None,
        }
    }
}

impl AppProfile {
    pub fn trusted_dir(&self) -> Option<PathBuf> {
        self.trusted_dir.clone().or_else(desktop_dir)
    }
}

/// A directory scanned by the janitor and the glob patterns (matched against
/// file names, case-insensitively) that mark a file there as a recovery
/// artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryLocation {
    pub dir: PathBuf,
    pub patterns: Vec<String>,
}

impl RecoveryLocation {
    /// Default locations for the configured target: the desktop (lock files
    /// and explicitly tagged recovered copies only), the Office unsaved-files
    /// store and the roaming Excel directory.
    pub fn defaults() -> Vec<RecoveryLocation> {
        let mut locations = Vec::new();
        if let Some(desktop) = desktop_dir() {
            locations.push(RecoveryLocation {
                dir: desktop,
                patterns: [
                    "*[[]オリジナル[]].xlsx",
                    "*[[]オリジナル[]].xls",
                    "*[[]Recovered[]].xlsx",
                    "*[[]Recovered[]].xls",
                    "*~$*.xlsx",
                    "*~$*.xls",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            });
        }
        let broad: Vec<String> = [
            "*.xlsx~*",
            "*.xls~*",
            "*[[]Recovered[]]*",
            "*~$*.xlsx",
            "*~$*.xls",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        if let Some(local) = dirs::data_local_dir() {
            locations.push(RecoveryLocation {
                dir: local.join("Microsoft").join("Office").join("UnsavedFiles"),
                patterns: broad.clone(),
            });
        }
        if let Some(roaming) = dirs::config_dir() {
            locations.push(RecoveryLocation {
                dir: roaming.join("Microsoft").join("Excel"),
                patterns: broad,
            });
        }
        locations
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Log file truncated at initialisation. `None` logs to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

fn desktop_dir() -> Option<PathBuf> {
    dirs::desktop_dir().or_else(|| dirs::home_dir().map(|home| home.join("Desktop")))
}

/// Parse human-readable duration strings into milliseconds.
/// Supports formats like: "1s", "500ms", "2m", "1.5s", "30", "2h"
pub fn parse_duration(input: &str) -> Result<u64, AutomationError> {
    let input = input.trim();

    // Plain number means milliseconds
    if let Ok(ms) = input.parse::<u64>() {
        return Ok(ms);
    }

    let (number_part, unit_part) = split_number_and_unit(input)?;
    let value: f64 = number_part.parse().map_err(|_| {
        AutomationError::Config(format!("invalid number in duration: {number_part}"))
    })?;
    if !value.is_finite() || value < 0.0 {
        return Err(AutomationError::Config(format!(
            "duration must be non-negative: {input}"
        )));
    }

    let multiplier = match unit_part.trim() {
        "ms" | "milliseconds" | "millisecond" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => 1000.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000.0,
        "" => 1.0,
        other => {
            return Err(AutomationError::Config(format!(
                "unknown time unit: {other}"
            )))
        }
    };

    Ok((value * multiplier) as u64)
}

fn split_number_and_unit(input: &str) -> Result<(&str, &str), AutomationError> {
    let split_pos = input
        .char_indices()
        .find(|(_, ch)| ch.is_alphabetic())
        .map(|(i, _)| i)
        .unwrap_or(input.len());

    let number_part = input[..split_pos].trim();
    if number_part.is_empty() {
        return Err(AutomationError::Config(format!(
            "no numeric value in duration: {input}"
        )));
    }

    Ok((number_part, &input[split_pos..]))
}

/// Serde adapter: durations as `"500ms"`-style strings or bare milliseconds.
pub(crate) mod human_duration {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}ms", value.as_millis()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Ok(Duration::from_millis(ms)),
            Raw::Text(text) => parse_duration(&text)
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("500").unwrap(), 500);
        assert_eq!(parse_duration("1000ms").unwrap(), 1000);
        assert_eq!(parse_duration("1.5s").unwrap(), 1500);
        assert_eq!(parse_duration("2m").unwrap(), 120_000);
        assert_eq!(parse_duration("0.5h").unwrap(), 1_800_000);
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("5 fortnights").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn default_timing_table() {
        let t = TimingPolicy::default();
        assert_eq!(t.startup_wait, Duration::from_secs(3));
        assert_eq!(t.window_visible_timeout, Duration::from_secs(10));
        assert_eq!(t.activation_pause, Duration::from_millis(500));
        assert_eq!(t.dialog_poll_interval, Duration::from_millis(500));
        assert_eq!(t.dialog_timeout, Duration::from_secs(10));
        assert_eq!(t.max_activation_attempts, 3);
        assert_eq!(t.retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: AutomationConfig = serde_json::from_str(
            r#"{
                "timing": { "dialog_timeout": "15s", "retry_delay": 250 },
                "app": { "document_flags": [] }
            }"#,
        )
        .unwrap();
        assert_eq!(config.timing.dialog_timeout, Duration::from_secs(15));
        assert_eq!(config.timing.retry_delay, Duration::from_millis(250));
        assert_eq!(config.timing.startup_wait, Duration::from_secs(3));
        assert!(config.app.document_flags.is_empty());
        assert_eq!(config.app.main_window_pattern, ".*Excel.*");
        config.validate().unwrap();
    }

    #[test]
    fn load_reads_file_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("driver.json");
        std::fs::write(
            &path,
            r#"{
                "close_dialogs": [
                    { "patterns": ["保存の確認", "Save As", "Microsoft Excel"], "action": "s" },
                    { "patterns": ["エラー", "Error"], "action": "{enter}" }
                ],
                "recovery": [ { "dir": "/tmp/unsaved", "patterns": ["*~$*.xlsx"] } ]
            }"#,
        )
        .unwrap();
        let config = AutomationConfig::load(&path).unwrap();
        assert_eq!(config.close_dialogs.len(), 2);
        assert_eq!(config.close_dialogs[1].action.as_str(), "{enter}");
        assert_eq!(config.recovery[0].dir, PathBuf::from("/tmp/unsaved"));

        std::fs::write(&path, r#"{ "app": { "main_window_pattern": "(" } }"#).unwrap();
        assert!(matches!(
            AutomationConfig::load(&path),
            Err(AutomationError::Config(_))
        ));
    }

    #[test]
    fn default_close_cascade_is_save_then_error() {
        let config = AutomationConfig::default();
        assert_eq!(config.close_dialogs.len(), 2);
        assert_eq!(config.close_dialogs[0].action.as_str(), "s");
        assert_eq!(config.close_dialogs[1].action, KeyAction::enter());
        config.validate().unwrap();
    }

    #[test]
    fn scaled_policy_multiplies_durations_only() {
        let slow = TimingPolicy::default().scaled(2.0);
        assert_eq!(slow.startup_wait, Duration::from_secs(6));
        assert_eq!(slow.max_activation_attempts, 3);
        assert_eq!(TimingPolicy::default().scaled(-1.0), TimingPolicy::default());

        let huge = TimingPolicy::default().scaled(f64::MAX);
        assert_eq!(huge.graceful_close_timeout, Duration::MAX);
        assert_eq!(huge.max_activation_attempts, 3);
    }

    #[test]
    fn timing_serializes_as_readable_strings() {
        let json = serde_json::to_value(TimingPolicy::default()).unwrap();
        assert_eq!(json["dialog_poll_interval"], "500ms");
    }
}
