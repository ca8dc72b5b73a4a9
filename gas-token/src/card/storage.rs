//! Card state storage
//!
//! Persists the card state as pretty JSON. A store without a backing file
//! keeps everything in memory, which is what tests and throwaway shells use.

use std::fs;
use std::path::PathBuf;

use log::{debug, error, info, warn};

use super::state::CardState;
use crate::config::{ConfigError, PersonalizationConfig};

/// Handles persistent storage of card state
pub struct CardDataStore {
    storage_dir: Option<PathBuf>,
    state: CardState,
}

impl CardDataStore {
    const DEFAULT_STATE_FILE: &'static str = "card_state.json";

    /// Get the default storage directory
    fn get_default_storage_dir() -> PathBuf {
        if let Ok(path) = std::env::var("GAS_TOKEN_STORAGE_DIR") {
            return PathBuf::from(path);
        }
        if let Some(home) = dirs::home_dir() {
            return home.join(".gas-token");
        }
        PathBuf::from("/var/lib/gas-token")
    }

    /// Create a store backed by `storage_path`, or the default directory
    pub fn new(storage_path: Option<PathBuf>) -> Self {
        let storage_dir = storage_path.unwrap_or_else(Self::get_default_storage_dir);
        Self {
            storage_dir: Some(storage_dir),
            state: CardState::default(),
        }
    }

    /// Create a store that never touches the filesystem
    pub fn in_memory() -> Self {
        Self {
            storage_dir: None,
            state: CardState::default(),
        }
    }

    fn state_file(&self) -> Option<PathBuf> {
        self.storage_dir
            .as_ref()
            .map(|dir| dir.join(Self::DEFAULT_STATE_FILE))
    }

    /// Load card state from storage
    ///
    /// Returns true if state was loaded, false if there was no state file and
    /// a freshly personalized state was created from `config` instead. A state
    /// file that cannot be read or parsed is an error; the token is never
    /// silently re-personalized over it.
    pub fn load(&mut self, config: &PersonalizationConfig) -> Result<bool, ConfigError> {
        config.validate()?;

        let Some(state_file) = self.state_file() else {
            self.state = CardState::personalized(config);
            return Ok(false);
        };

        if !state_file.exists() {
            info!("No existing card state, personalizing");
            self.state = CardState::personalized(config);
            return Ok(false);
        }

        let content = fs::read_to_string(&state_file).map_err(|e| {
            error!("Failed to read card state file: {}", e);
            ConfigError::State {
                path: state_file.clone(),
                reason: e.to_string(),
            }
        })?;
        self.state = serde_json::from_str(&content).map_err(|e| {
            error!("Failed to parse card state: {}", e);
            ConfigError::State {
                path: state_file.clone(),
                reason: e.to_string(),
            }
        })?;
        info!("Loaded card state from {:?}", state_file);
        Ok(true)
    }

    /// Save card state to storage
    ///
    /// In-memory stores always succeed.
    pub fn save(&self) -> bool {
        let (Some(storage_dir), Some(state_file)) = (&self.storage_dir, self.state_file()) else {
            return true;
        };

        if let Err(e) = fs::create_dir_all(storage_dir) {
            warn!("Failed to create storage directory: {}", e);
            return false;
        }

        match serde_json::to_string_pretty(&self.state) {
            Ok(json) => match fs::write(&state_file, json) {
                Ok(()) => {
                    #[cfg(unix)]
                    {
                        use std::os::unix::fs::PermissionsExt;
                        let _ = fs::set_permissions(&state_file, fs::Permissions::from_mode(0o600));
                    }
                    debug!("Saved card state to {:?}", state_file);
                    true
                }
                Err(e) => {
                    warn!("Failed to write card state: {}", e);
                    false
                }
            },
            Err(e) => {
                warn!("Failed to serialize card state: {}", e);
                false
            }
        }
    }

    /// Replace the state with a freshly personalized one and persist it
    pub fn personalize(&mut self, config: &PersonalizationConfig) -> Result<bool, ConfigError> {
        config.validate()?;
        self.state = CardState::personalized(config);
        info!(
            "Token personalized: balance {}, ledger capacity {} bytes",
            config.initial_balance, config.ledger_capacity
        );
        Ok(self.save())
    }

    /// Get a reference to the current card state
    pub fn get_state(&self) -> &CardState {
        &self.state
    }

    /// Get a mutable reference to the current card state
    pub fn get_state_mut(&mut self) -> &mut CardState {
        &mut self.state
    }
}
