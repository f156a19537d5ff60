//! UI surface driven by the scanner
//!
//! The scanner never renders anything itself. It toggles a camera view, a
//! trigger control, a result panel and a form through this trait.

use serde::{Deserialize, Serialize};

/// Visual state of the control that starts the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerState {
    /// Enabled, ready to start a scan
    Idle,
    /// Disabled while devices are enumerated and the camera opens
    Starting,
    /// Disabled while the decode loop runs
    Active,
}

impl TriggerState {
    /// Whether the control accepts input
    pub fn enabled(self) -> bool {
        matches!(self, TriggerState::Idle)
    }

    /// Caption shown on the control
    pub fn label(self) -> &'static str {
        match self {
            TriggerState::Idle => "Camera",
            TriggerState::Starting => "Starting...",
            TriggerState::Active => "Camera On",
        }
    }
}

/// Elements the scanner manipulates
pub trait ScannerUi: Send + Sync {
    /// Make the camera view visible
    fn show_camera(&self);

    /// Hide the camera view
    fn hide_camera(&self);

    /// Bring the camera view into focus once frames flow
    fn reveal_camera(&self) {}

    /// Update the trigger control
    fn set_trigger(&self, state: TriggerState);

    /// Display decoded text in the result panel
    fn show_result(&self, text: &str);

    /// Hide the result panel
    fn hide_result(&self);

    /// Write a value into the barcode input field
    fn set_input(&self, value: &str);

    /// Move keyboard focus to the barcode input field
    fn focus_input(&self);

    /// Haptic feedback; returns `false` when unsupported
    fn vibrate(&self, _pattern: &[u64]) -> bool {
        false
    }

    /// Blocking user notification
    fn alert(&self, message: &str);

    /// Submit the form containing the barcode input
    fn submit_form(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_states() {
        assert!(TriggerState::Idle.enabled());
        assert!(!TriggerState::Starting.enabled());
        assert!(!TriggerState::Active.enabled());
        assert_eq!(TriggerState::Active.label(), "Camera On");
    }
}
