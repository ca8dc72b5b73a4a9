//! Security State for the gas station applet
//!
//! Tracks whether the cardholder PIN has been verified in the current session.

/// Observable PIN state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinStatus {
    Unvalidated,
    Validated,
    /// No tries left; terminal
    Blocked,
}

/// Tracks security state for the current session
#[derive(Debug, Default)]
pub struct SecurityState {
    pin_validated: bool,
}

impl SecurityState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_validated(&mut self) {
        self.pin_validated = true;
    }

    pub fn is_validated(&self) -> bool {
        self.pin_validated
    }

    /// Clear all security conditions (deselect, reset or power cycle)
    pub fn clear_all(&mut self) {
        self.pin_validated = false;
    }
}
