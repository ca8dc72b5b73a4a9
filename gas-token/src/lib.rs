//! Self-service gas station token
//!
//! A virtual smart card carrying one application: a prepaid fuel token that
//! authenticates its holder with a PIN, keeps a balance, and records every
//! purchase in a TLV-encoded ledger. The host feeds raw command APDUs to a
//! [`VirtualCard`] and gets raw response bytes back.
//!
//! # Example
//! ```
//! use gas_token::card::CardDataStore;
//! use gas_token::config::PersonalizationConfig;
//! use gas_token::VirtualCard;
//!
//! let mut store = CardDataStore::in_memory();
//! store.load(&PersonalizationConfig::default()).unwrap();
//! let mut card = VirtualCard::new(store).unwrap();
//! card.power_on();
//!
//! // SELECT the application, then read the balance as packed BCD
//! let resp = card.process_apdu(&[0x00, 0xA4, 0x04, 0x00, 0x06, 0xF0, 0x53, 0x53, 0x47, 0x53, 0x01]);
//! assert_eq!(resp, vec![0x90, 0x00]);
//! let resp = card.process_apdu(&[0x80, 0x03, 0x01, 0x00, 0x08]);
//! assert_eq!(resp, vec![0, 0, 0, 0, 0, 0x10, 0, 0, 0x90, 0x00]);
//! ```

pub mod apdu;
pub mod card;
pub mod config;
pub mod error;
pub mod station;
pub mod tlv;

use log::{debug, error, info};

use apdu::{ins, parse_apdu, Response, APDU, SW};
use card::{atr, CardDataStore};
use error::Result;
use station::{GasStationApplet, GAS_STATION_AID};

/// Virtual card hosting the gas station applet
pub struct VirtualCard {
    applet: GasStationApplet,
    /// Whether the card is powered
    powered: bool,
}

impl VirtualCard {
    /// Create a new virtual card over a loaded store
    pub fn new(store: CardDataStore) -> Result<Self> {
        Ok(Self {
            applet: GasStationApplet::new(store)?,
            powered: false,
        })
    }

    /// Power on the card
    pub fn power_on(&mut self) -> Vec<u8> {
        self.powered = true;
        self.applet.deselect();
        info!("Virtual card powered on");
        self.atr()
    }

    /// Power off the card
    pub fn power_off(&mut self) {
        self.powered = false;
        self.applet.deselect();
        info!("Virtual card powered off");
    }

    /// Reset the card
    pub fn reset(&mut self) -> Vec<u8> {
        self.applet.deselect();
        self.powered = true;
        info!("Virtual card reset");
        self.atr()
    }

    pub fn atr(&self) -> Vec<u8> {
        atr::create_token_atr(self.applet.get_state())
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Process an APDU command
    pub fn process_apdu(&mut self, apdu_bytes: &[u8]) -> Vec<u8> {
        if !self.powered {
            return Response::error(SW::CONDITIONS_NOT_SATISFIED).to_bytes();
        }

        let cmd = match parse_apdu(apdu_bytes) {
            Ok(apdu) => apdu,
            Err(e) => {
                error!("Failed to parse APDU: {:?}", e);
                return Response::error(SW::WRONG_LENGTH).to_bytes();
            }
        };

        debug!(
            "Processing APDU: CLA={:02X} INS={:02X} P1={:02X} P2={:02X}",
            cmd.cla, cmd.ins, cmd.p1, cmd.p2
        );

        if cmd.ins == ins::SELECT {
            if cmd.p1 == 0x04 {
                return self.handle_select(&cmd);
            }
            // Only selection by AID is supported
            return Response::error(SW::INS_NOT_SUPPORTED).to_bytes();
        }

        self.applet.process_apdu(&cmd).to_bytes()
    }

    /// Handle SELECT command for applet routing
    fn handle_select(&mut self, cmd: &APDU) -> Vec<u8> {
        if cmd.data == GAS_STATION_AID {
            return self.applet.process_apdu(cmd).to_bytes();
        }

        debug!("Unknown AID: {:02X?}", cmd.data);
        self.applet.deselect();
        Response::error(SW::FILE_NOT_FOUND).to_bytes()
    }

    pub fn applet(&self) -> &GasStationApplet {
        &self.applet
    }

    pub fn applet_mut(&mut self) -> &mut GasStationApplet {
        &mut self.applet
    }
}
