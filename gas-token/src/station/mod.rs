//! Self-service gas station application
//!
//! The PIN guard, balance and purchase ledger, and the applet that
//! dispatches commands to them.

pub mod applet;
pub mod balance;
pub mod history;
pub mod pin_manager;
pub mod purchase;
pub mod security_state;

pub use applet::{GasStationApplet, GAS_STATION_AID};
pub use balance::{Balance, NumberFormat, MAX_BALANCE};
pub use history::PurchaseHistories;
pub use pin_manager::{PINManager, PinGuard};
pub use purchase::{PurchaseInfo, PurchaseUpdate, PLACEHOLDER_SIGNATURE};
pub use security_state::{PinStatus, SecurityState};
