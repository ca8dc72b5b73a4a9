//! Gas station applet
//!
//! Command dispatcher for the self-service gas station token. Every handler
//! returns `Result<Response>`; failures become status words in
//! [`GasStationApplet::process_apdu`] and nowhere else.

use log::{debug, info, warn};

use super::balance::{Balance, NumberFormat};
use super::history::PurchaseHistories;
use super::pin_manager::PinGuard;
use super::purchase::{PurchaseUpdate, PURCHASE_INFO_LEN};
use super::security_state::PinStatus;
use crate::apdu::{ins, Response, APDU, SW};
use crate::card::{CardDataStore, CardState};
use crate::config::{ConfigError, PersonalizationConfig};
use crate::error::{CardError, Result};
use crate::tlv::tags::FieldKind;
use crate::tlv::ScratchBuffer;

/// Gas station Application Identifier
pub const GAS_STATION_AID: &[u8] = &[0xF0, 0x53, 0x53, 0x47, 0x53, 0x01];

/// Gas Station Applet
pub struct GasStationApplet {
    store: CardDataStore,
    pin_guard: PinGuard,
    ledger: PurchaseHistories,
    scratch: ScratchBuffer,
    selected: bool,
    response_buffer: Vec<u8>,
    response_offset: usize,
    /// Current command's Le (expected response length)
    current_le: Option<u32>,
}

impl GasStationApplet {
    /// Create the applet over a loaded store
    ///
    /// Fails if the stored ledger does not decode.
    pub fn new(store: CardDataStore) -> Result<Self> {
        let mut scratch = ScratchBuffer::new();
        let state = store.get_state();
        let ledger = PurchaseHistories::from_bytes(
            &state.purchase_histories,
            state.ledger_capacity,
            &mut scratch,
        )?;
        debug!(
            "Ledger loaded: {} records, {} of {} bytes",
            ledger.len(),
            ledger.encoded_len(),
            ledger.capacity()
        );

        Ok(Self {
            store,
            pin_guard: PinGuard::new(),
            ledger,
            scratch,
            selected: false,
            response_buffer: Vec::new(),
            response_offset: 0,
            current_le: None,
        })
    }

    /// Process an APDU command and return the response
    pub fn process_apdu(&mut self, cmd: &APDU) -> Response {
        self.current_le = cmd.le;

        if cmd.ins == ins::SELECT {
            return self.handle_select(cmd);
        }

        if !self.selected {
            return Response::error(SW::CONDITIONS_NOT_SATISFIED);
        }

        if cmd.ins == ins::GET_RESPONSE {
            return self.handle_get_response(cmd);
        }
        // Any other command abandons a pending chained response
        self.response_buffer.clear();
        self.response_offset = 0;

        if cmd.cla != ins::CLA {
            return Response::error(SW::CLA_NOT_SUPPORTED);
        }

        let result = match cmd.ins {
            ins::VERIFY => self.handle_verify(cmd),
            ins::UPDATE_PURCHASE_INFO => self.handle_update_purchase_info(cmd),
            ins::GET_BALANCE => self.handle_get_balance(cmd),
            ins::GET_PURCHASE_HISTORIES => self.handle_get_purchase_histories(),
            ins::GET_PURCHASE_HISTORIES_BY_TIME => {
                self.handle_get_purchase_histories_by(FieldKind::BuyTime, cmd)
            }
            ins::GET_PURCHASE_HISTORIES_BY_STATION => {
                self.handle_get_purchase_histories_by(FieldKind::StationId, cmd)
            }
            ins::GET_LAST_PURCHASE_HISTORY => self.handle_get_last_purchase_history(),
            ins::CHANGE_PIN => self.handle_change_pin(cmd),
            _ => return Response::error(SW::INS_NOT_SUPPORTED),
        };

        result.unwrap_or_else(|e| {
            debug!("INS {:02X} failed: {}", cmd.ins, e);
            Response::from(&e)
        })
    }

    /// Handle GET_RESPONSE for response chaining
    fn handle_get_response(&mut self, cmd: &APDU) -> Response {
        if self.response_buffer.is_empty() {
            return Response::error(SW::CONDITIONS_NOT_SATISFIED);
        }

        let le = cmd.le.unwrap_or(256) as usize;
        let remaining = self.response_buffer.len() - self.response_offset;
        let chunk_size = le.min(remaining);

        let data =
            self.response_buffer[self.response_offset..self.response_offset + chunk_size].to_vec();
        self.response_offset += chunk_size;

        let new_remaining = self.response_buffer.len() - self.response_offset;

        if new_remaining == 0 {
            self.response_buffer.clear();
            self.response_offset = 0;
            Response::success(data)
        } else if new_remaining > 255 {
            Response::more_data(data, 0)
        } else {
            Response::more_data(data, new_remaining as u8)
        }
    }

    /// Create response with chaining if needed
    fn create_response(&mut self, data: Vec<u8>) -> Response {
        let max_response = self.current_le.unwrap_or(256) as usize;

        if data.len() <= max_response {
            Response::success(data)
        } else {
            self.response_buffer = data;
            self.response_offset = max_response;

            let chunk = self.response_buffer[..max_response].to_vec();
            let remaining = self.response_buffer.len() - max_response;

            if remaining > 255 {
                Response::more_data(chunk, 0)
            } else {
                Response::more_data(chunk, remaining as u8)
            }
        }
    }

    // =========================================================================
    // Selection lifecycle
    // =========================================================================

    /// Handle SELECT command
    fn handle_select(&mut self, cmd: &APDU) -> Response {
        if cmd.p1 != 0x04 || cmd.data != GAS_STATION_AID {
            self.deselect();
            return Response::error(SW::FILE_NOT_FOUND);
        }
        self.select()
    }

    /// Make the applet current; refused once the PIN is blocked
    pub fn select(&mut self) -> Response {
        self.deselect();
        if self.pin_guard.is_blocked(&self.store.get_state().pin_data) {
            warn!("Select refused: PIN is blocked");
            return Response::error(SW::APPLET_SELECT_FAILED);
        }
        self.selected = true;
        info!("Gas station applet selected");
        Response::ok()
    }

    /// End the session; PIN validation does not carry over
    pub fn deselect(&mut self) {
        if self.selected {
            debug!("Gas station applet deselected");
        }
        self.selected = false;
        self.reset();
    }

    /// Reset security state (on card reset)
    pub fn reset(&mut self) {
        self.pin_guard.end_session();
        self.response_buffer.clear();
        self.response_offset = 0;
        self.current_le = None;
    }

    // =========================================================================
    // Command Handlers
    // =========================================================================

    /// Handle VERIFY command
    ///
    /// Empty data is compared like any other candidate and spends a try.
    fn handle_verify(&mut self, cmd: &APDU) -> Result<Response> {
        let pin_data = &mut self.store.get_state_mut().pin_data;
        let result = self.pin_guard.check(&cmd.data, pin_data);
        // The retry counter changed either way
        if let Err(e) = self.commit() {
            self.pin_guard.end_session();
            return Err(e);
        }
        result.map(|()| Response::ok())
    }

    /// Handle UPDATE_PURCHASE_INFO command
    ///
    /// All-or-nothing: the message is fully validated and the ledger checked
    /// for room before the balance moves, and a failed debit appends nothing.
    fn handle_update_purchase_info(&mut self, cmd: &APDU) -> Result<Response> {
        self.require_validated()?;

        let update = PurchaseUpdate::parse(&cmd.data, &mut self.scratch)?;
        let info = update.info;

        if !self.ledger.can_append(PURCHASE_INFO_LEN) {
            return Err(CardError::CapacityExceeded {
                needed: self.ledger.encoded_len() + PURCHASE_INFO_LEN,
                capacity: self.ledger.capacity(),
            });
        }

        let mut balance = Balance::new(self.store.get_state().balance)?;
        let cost = match balance.debit(info.amount, info.price) {
            Ok(cost) => cost,
            Err(e) => {
                if balance.value() != self.store.get_state().balance {
                    self.store.get_state_mut().balance = balance.value();
                    self.commit()?;
                }
                return Err(e);
            }
        };

        let previous_balance = self.store.get_state().balance;
        let previous_ledger = self.ledger.clone();
        self.ledger.append(&info)?;
        self.store.get_state_mut().balance = balance.value();
        if let Err(e) = self.commit() {
            // Nothing reached storage, so nothing happened
            self.ledger = previous_ledger;
            let state = self.store.get_state_mut();
            state.balance = previous_balance;
            state.purchase_histories = self.ledger.to_bytes();
            return Err(e);
        }
        info!(
            "Purchase recorded: cost {}, balance {}, {} records",
            cost,
            balance.value(),
            self.ledger.len()
        );
        Ok(Response::ok())
    }

    /// Handle GET_BALANCE command; P1 selects the encoding
    fn handle_get_balance(&mut self, cmd: &APDU) -> Result<Response> {
        let format = NumberFormat::from_p1(cmd.p1)?;
        let balance = Balance::new(self.store.get_state().balance)?;
        Ok(self.create_response(balance.read(format).to_vec()))
    }

    /// Handle GET_PURCHASE_HISTORIES command
    fn handle_get_purchase_histories(&mut self) -> Result<Response> {
        self.require_validated()?;
        if self.ledger.is_empty() {
            return Err(CardError::HistoryNotFound);
        }
        let data = self.ledger.to_bytes();
        Ok(self.create_response(data))
    }

    /// Handle the filtered history queries
    fn handle_get_purchase_histories_by(
        &mut self,
        kind: FieldKind,
        cmd: &APDU,
    ) -> Result<Response> {
        self.require_validated()?;
        let matches = self
            .ledger
            .find_all_by_field(kind, &cmd.data, &mut self.scratch)?;
        if matches.is_empty() {
            return Err(CardError::HistoryNotFound);
        }
        Ok(self.create_response(matches.to_bytes()))
    }

    /// Handle GET_LAST_PURCHASE_HISTORY command
    fn handle_get_last_purchase_history(&mut self) -> Result<Response> {
        self.require_validated()?;
        let data = self
            .ledger
            .most_recent()?
            .ok_or(CardError::HistoryNotFound)?
            .as_bytes()
            .to_vec();
        Ok(self.create_response(data))
    }

    /// Handle CHANGE_PIN command
    fn handle_change_pin(&mut self, cmd: &APDU) -> Result<Response> {
        let previous = self.store.get_state().pin_data.clone();
        let pin_data = &mut self.store.get_state_mut().pin_data;
        self.pin_guard.update(&cmd.data, pin_data)?;
        if let Err(e) = self.commit() {
            self.store.get_state_mut().pin_data = previous;
            return Err(e);
        }
        Ok(Response::ok())
    }

    fn require_validated(&self) -> Result<()> {
        self.pin_guard
            .require_validated(&self.store.get_state().pin_data)
    }

    /// Write the ledger back into the card state and persist it
    ///
    /// A command whose state change did not reach storage reports failure.
    fn commit(&mut self) -> Result<()> {
        self.store.get_state_mut().purchase_histories = self.ledger.to_bytes();
        if !self.store.save() {
            warn!("Card state could not be persisted");
            return Err(CardError::Internal("card state could not be persisted".into()));
        }
        Ok(())
    }

    /// Re-personalize the token: fresh PIN, balance and empty ledger
    pub fn personalize(
        &mut self,
        config: &PersonalizationConfig,
    ) -> std::result::Result<bool, ConfigError> {
        config.validate()?;
        let ledger = PurchaseHistories::new(config.ledger_capacity)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let saved = self.store.personalize(config)?;
        self.ledger = ledger;
        self.deselect();
        Ok(saved)
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn balance(&self) -> u64 {
        self.store.get_state().balance
    }

    pub fn ledger(&self) -> &PurchaseHistories {
        &self.ledger
    }

    pub fn pin_status(&self) -> PinStatus {
        self.pin_guard.status(&self.store.get_state().pin_data)
    }

    pub fn tries_remaining(&self) -> u8 {
        self.pin_guard
            .tries_remaining(&self.store.get_state().pin_data)
    }

    /// Get a reference to the card state
    pub fn get_state(&self) -> &CardState {
        self.store.get_state()
    }
}
