use serde::{Deserialize, Serialize};
use std::fmt;

/// A key sequence sent to whichever window holds keyboard focus.
///
/// The text uses the UI Automation keyboard syntax: plain characters are typed
/// as-is and named keys go in braces (`{enter}`, `{escape}`, `{tab}`, `{alt}`,
/// `{ctrl}`, `{shift}`, `{F4}`). A modifier key is held for the key that
/// follows it, so `{ctrl}s` is Ctrl+S.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyAction(String);

impl KeyAction {
    pub fn new(keys: impl Into<String>) -> Self {
        Self(keys.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn enter() -> Self {
        Self::new("{enter}")
    }

    pub fn escape() -> Self {
        Self::new("{escape}")
    }

    /// A lone Alt press. Dismisses the menu-accelerator state the task
    /// switch chord can leave behind.
    pub fn alt() -> Self {
        Self::new("{alt}")
    }

    /// OS-level switch-window chord (Alt+Tab).
    pub fn task_switch() -> Self {
        Self::new("{alt}{tab}")
    }
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyAction {
    fn from(s: &str) -> Self {
        KeyAction::new(s)
    }
}

impl From<String> for KeyAction {
    fn from(s: String) -> Self {
        KeyAction(s)
    }
}
