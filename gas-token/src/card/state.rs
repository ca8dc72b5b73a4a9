//! Card state data structures
//!
//! Everything that must survive a power cycle: the PIN reference and retry
//! counter, the balance and the encoded purchase histories record.

use serde::{Deserialize, Serialize};

use crate::config::PersonalizationConfig;
use crate::station::pin_manager::PINManager;
use crate::tlv::{tags, TLVEncoder};

/// Custom serde module for base64 encoding of byte vectors
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if bytes.is_empty() {
            serializer.serialize_str("")
        } else {
            serializer.serialize_str(&STANDARD.encode(bytes))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        if s.is_empty() {
            return Ok(Vec::new());
        }
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// PIN-related data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PINData {
    #[serde(with = "base64_bytes")]
    pub pin_hash: Vec<u8>,
    pub pin_length: u8,
    pub max_length: u8,
    pub retry_counter: u8,
    pub max_retries: u8,
}

impl PINData {
    /// Fresh PIN data for `pin`, all tries available
    pub fn new(pin: &[u8], max_retries: u8, max_length: u8) -> Self {
        Self {
            pin_hash: PINManager::hash_pin(pin),
            pin_length: pin.len() as u8,
            max_length,
            retry_counter: max_retries,
            max_retries,
        }
    }
}

impl Default for PINData {
    fn default() -> Self {
        let defaults = PersonalizationConfig::default();
        Self::new(&defaults.pin, defaults.max_pin_tries, defaults.max_pin_size)
    }
}

/// Complete card state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardState {
    pub serial_number: u32,
    pub pin_data: PINData,
    pub balance: u64,
    /// Full encoding of the purchase histories record
    #[serde(with = "base64_bytes")]
    pub purchase_histories: Vec<u8>,
    pub ledger_capacity: usize,
}

impl Default for CardState {
    fn default() -> Self {
        Self::personalized(&PersonalizationConfig::default())
    }
}

impl CardState {
    /// State of a freshly personalized token: full balance, empty ledger
    pub fn personalized(config: &PersonalizationConfig) -> Self {
        Self {
            serial_number: 0x00000001,
            pin_data: PINData::new(&config.pin, config.max_pin_tries, config.max_pin_size),
            balance: config.initial_balance,
            purchase_histories: TLVEncoder::encode(&tags::PURCHASE_HISTORIES, &[]),
            ledger_capacity: config.ledger_capacity,
        }
    }

    /// Get the historical bytes for the ATR
    pub fn get_historical_bytes(&self) -> Vec<u8> {
        let lifecycle_status = if self.pin_data.retry_counter == 0 {
            0x07
        } else {
            0x05
        };
        vec![
            0x00, // Category indicator
            0x73, // Card service data
            0x00, // Card capabilities byte 1
            0x00, // Card capabilities byte 2
            0xE0, // Status indicator
            lifecycle_status,
            0x90,
            0x00, // Status word
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personalized_state() {
        let state = CardState::default();
        assert_eq!(state.balance, 100_000);
        assert_eq!(state.purchase_histories, vec![0xE1, 0x00]);
        assert_eq!(state.pin_data.retry_counter, 3);
        assert_eq!(state.pin_data.pin_length, 3);
        assert_eq!(state.pin_data.pin_hash.len(), 32);
    }

    #[test]
    fn test_card_state_serialization() {
        let mut state = CardState::default();
        state.balance = 999_950;
        let json = serde_json::to_string(&state).unwrap();
        let parsed: CardState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_base64_serialization() {
        let state = CardState::default();
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"4QA=\"")); // base64 of E100
    }

    #[test]
    fn test_historical_bytes_report_blocked() {
        let mut state = CardState::default();
        assert_eq!(state.get_historical_bytes()[5], 0x05);
        state.pin_data.retry_counter = 0;
        assert_eq!(state.get_historical_bytes()[5], 0x07);
    }
}
