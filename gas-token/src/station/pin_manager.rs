//! PIN Manager for the gas station applet
//!
//! [`PINManager`] is the comparison primitive: hashed reference, retry
//! counter, size limit. [`PinGuard`] layers the session on top of it and
//! turns outcomes into [`CardError`]s.

use log::{info, warn};
use sha2::{Digest, Sha256};

use super::security_state::{PinStatus, SecurityState};
use crate::card::PINData;
use crate::error::{CardError, Result};

/// PIN Manager handles PIN verification and management
#[derive(Debug, Default)]
pub struct PINManager;

impl PINManager {
    pub fn new() -> Self {
        Self
    }

    /// Hash a PIN using SHA-256
    pub fn hash_pin(pin: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(pin);
        hasher.finalize().to_vec()
    }

    /// Verify a PIN
    ///
    /// A candidate longer than the maximum size counts as a failed attempt.
    /// Nothing is compared once the counter is exhausted.
    pub fn verify_pin(&self, pin: &[u8], pin_data: &mut PINData) -> bool {
        if pin_data.retry_counter == 0 {
            return false;
        }

        if pin.len() > pin_data.max_length as usize {
            pin_data.retry_counter = pin_data.retry_counter.saturating_sub(1);
            return false;
        }

        if Self::hash_pin(pin) == pin_data.pin_hash {
            pin_data.retry_counter = pin_data.max_retries;
            true
        } else {
            pin_data.retry_counter = pin_data.retry_counter.saturating_sub(1);
            false
        }
    }

    /// Replace the reference PIN; the caller has already verified the old one
    pub fn change_pin(&self, new_pin: &[u8], pin_data: &mut PINData) -> bool {
        let new_len = new_pin.len();
        if new_len == 0 || new_len > pin_data.max_length as usize {
            return false;
        }

        pin_data.pin_hash = Self::hash_pin(new_pin);
        pin_data.pin_length = new_len as u8;
        pin_data.retry_counter = pin_data.max_retries;
        true
    }

    pub fn get_retry_counter(&self, pin_data: &PINData) -> u8 {
        pin_data.retry_counter
    }
}

/// Session-aware PIN state machine
///
/// Unvalidated -> Validated on a correct PIN, back to Unvalidated when the
/// session ends. Blocked once the counter reaches zero, with no way out.
#[derive(Debug, Default)]
pub struct PinGuard {
    pin_manager: PINManager,
    security_state: SecurityState,
}

impl PinGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, pin_data: &PINData) -> PinStatus {
        if self.is_blocked(pin_data) {
            PinStatus::Blocked
        } else if self.security_state.is_validated() {
            PinStatus::Validated
        } else {
            PinStatus::Unvalidated
        }
    }

    pub fn is_blocked(&self, pin_data: &PINData) -> bool {
        self.pin_manager.get_retry_counter(pin_data) == 0
    }

    pub fn tries_remaining(&self, pin_data: &PINData) -> u8 {
        self.pin_manager.get_retry_counter(pin_data)
    }

    /// Check a candidate PIN
    ///
    /// The attempt that uses up the last try reports `PinBlocked`.
    pub fn check(&mut self, candidate: &[u8], pin_data: &mut PINData) -> Result<()> {
        if self.is_blocked(pin_data) {
            return Err(CardError::PinBlocked);
        }

        if self.pin_manager.verify_pin(candidate, pin_data) {
            self.security_state.set_validated();
            return Ok(());
        }

        self.security_state.clear_all();
        match self.pin_manager.get_retry_counter(pin_data) {
            0 => {
                warn!("PIN verification failed, PIN is now blocked");
                Err(CardError::PinBlocked)
            }
            tries_remaining => {
                warn!("PIN verification failed, {} tries remaining", tries_remaining);
                Err(CardError::VerificationFailed { tries_remaining })
            }
        }
    }

    pub fn require_validated(&self, pin_data: &PINData) -> Result<()> {
        match self.status(pin_data) {
            PinStatus::Validated => Ok(()),
            PinStatus::Blocked => Err(CardError::PinBlocked),
            PinStatus::Unvalidated => Err(CardError::PinVerificationRequired),
        }
    }

    /// Change the reference PIN; requires a validated session
    pub fn update(&mut self, new_pin: &[u8], pin_data: &mut PINData) -> Result<()> {
        self.require_validated(pin_data)?;
        if !self.pin_manager.change_pin(new_pin, pin_data) {
            return Err(CardError::MalformedRequest("new PIN has invalid length"));
        }
        info!("PIN changed");
        Ok(())
    }

    /// Forget the session's validation; the retry counter is untouched
    pub fn end_session(&mut self) {
        self.security_state.clear_all();
    }
}
