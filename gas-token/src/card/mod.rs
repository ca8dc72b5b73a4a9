//! Card data structures and storage
//!
//! The persistent side of the token: what is stored, where, and the ATR
//! derived from it.

pub mod atr;
pub mod state;
pub mod storage;

pub use atr::{build_atr, create_token_atr};
pub use state::{CardState, PINData};
pub use storage::CardDataStore;
