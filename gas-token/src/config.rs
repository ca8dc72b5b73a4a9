//! Personalization settings
//!
//! Everything the issuer fixes when the token is personalized: the initial
//! PIN, the opening balance and the size of the ledger reservation. Stored
//! as JSON like the card state itself.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::station::balance::MAX_BALANCE;

/// Errors raised while loading or checking personalization settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Card state at {path:?} is unusable: {reason}")]
    State { path: PathBuf, reason: String },
}

/// Smallest ledger reservation that still holds one purchase record
pub const MIN_LEDGER_CAPACITY: usize = 2 + 29;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalizationConfig {
    /// Reference PIN, raw bytes
    pub pin: Vec<u8>,
    pub initial_balance: u64,
    /// Byte budget for the whole purchase histories encoding
    pub ledger_capacity: usize,
    pub max_pin_tries: u8,
    pub max_pin_size: u8,
}

impl Default for PersonalizationConfig {
    fn default() -> Self {
        Self {
            pin: vec![0x01, 0x02, 0x03],
            initial_balance: 100_000,
            ledger_capacity: 4096,
            max_pin_tries: 3,
            max_pin_size: 8,
        }
    }
}

impl PersonalizationConfig {
    /// Read settings from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pin_tries == 0 {
            return Err(ConfigError::Invalid("max_pin_tries must be at least 1".into()));
        }
        if self.max_pin_size == 0 {
            return Err(ConfigError::Invalid("max_pin_size must be at least 1".into()));
        }
        if self.pin.is_empty() || self.pin.len() > self.max_pin_size as usize {
            return Err(ConfigError::Invalid(format!(
                "pin must be 1..={} bytes, got {}",
                self.max_pin_size,
                self.pin.len()
            )));
        }
        if self.initial_balance > MAX_BALANCE {
            return Err(ConfigError::Invalid(format!(
                "initial_balance {} exceeds {}",
                self.initial_balance, MAX_BALANCE
            )));
        }
        if self.ledger_capacity < MIN_LEDGER_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "ledger_capacity must be at least {} bytes",
                MIN_LEDGER_CAPACITY
            )));
        }
        Ok(())
    }
}
