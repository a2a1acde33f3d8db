use super::utils::create_ui_automation_with_com_init;
use crate::platforms::InputInjector;
use crate::{AutomationError, KeyAction};
use tracing::debug;

/// Delay between synthesized key events, in milliseconds.
const KEY_INTERVAL_MS: u64 = 10;

/// Sends key sequences to the focused element via UI Automation.
#[derive(Debug, Default)]
pub struct UiaKeyboard;

impl UiaKeyboard {
    pub fn new() -> Self {
        Self
    }
}

impl InputInjector for UiaKeyboard {
    fn send_keys(&self, keys: &KeyAction) -> Result<(), AutomationError> {
        let automation = create_ui_automation_with_com_init()?;
        let focused = automation.get_focused_element().map_err(|e| {
            AutomationError::PlatformError(format!("Failed to get focused element: {e}"))
        })?;
        debug!("sending keys {:?} to focused element", keys.as_str());
        focused
            .send_keys(keys.as_str(), KEY_INTERVAL_MS)
            .map_err(|e| AutomationError::PlatformError(format!("Failed to press key: {e:?}")))
    }
}
