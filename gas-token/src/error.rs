//! Command failures and their status words

use thiserror::Error;

use crate::apdu::SW;
use crate::tlv::TLVError;

/// Every way a command can fail
///
/// Each variant maps to exactly one status word, see [`CardError::status_word`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CardError {
    #[error("malformed request: {0}")]
    MalformedRequest(&'static str),

    #[error("malformed TLV: {0}")]
    MalformedTlv(TLVError),

    #[error("PIN verification failed, {tries_remaining} tries remaining")]
    VerificationFailed { tries_remaining: u8 },

    #[error("PIN is blocked")]
    PinBlocked,

    #[error("PIN verification required")]
    PinVerificationRequired,

    #[error("station signature does not match")]
    InvalidSignature,

    #[error("insufficient balance: cost {cost}, balance {balance}")]
    InsufficientBalance { cost: u64, balance: u64 },

    #[error("cost of {amount} x {price} is not representable")]
    ArithmeticOverflow { amount: u32, price: u32 },

    #[error("no purchase history found")]
    HistoryNotFound,

    #[error("ledger full: need {needed} bytes, capacity is {capacity}")]
    CapacityExceeded { needed: usize, capacity: usize },

    #[error("unsupported number format {0:#04x}")]
    InvalidNumberFormat(u8),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CardError {
    /// The status word reported to the reader
    pub fn status_word(&self) -> u16 {
        match self {
            CardError::VerificationFailed { .. } => SW::VERIFICATION_FAILED,
            CardError::PinVerificationRequired => SW::PIN_VERIFICATION_REQUIRED,
            CardError::InsufficientBalance { .. } => SW::INSUFFICIENT_BALANCE,
            CardError::MalformedRequest(_) => SW::MALFORMED_REQUEST,
            CardError::InvalidSignature => SW::INVALID_SIGNATURE,
            CardError::MalformedTlv(_) => SW::MALFORMED_TLV,
            CardError::ArithmeticOverflow { .. } => SW::ARITHMETIC_OVERFLOW,
            CardError::InvalidNumberFormat(_) => SW::INVALID_NUMBER_FORMAT,
            CardError::HistoryNotFound => SW::HISTORY_NOT_FOUND,
            CardError::PinBlocked => SW::AUTH_METHOD_BLOCKED,
            CardError::CapacityExceeded { .. } => SW::NOT_ENOUGH_MEMORY,
            CardError::Internal(_) => SW::UNKNOWN_ERROR,
        }
    }

    /// A TLV failure while reading stored ledger data
    ///
    /// Stored records are only ever written by `append`, so this indicates
    /// corruption rather than a bad request.
    pub fn corrupt(e: TLVError) -> Self {
        CardError::Internal(format!("stored ledger is malformed: {}", e))
    }
}

impl From<TLVError> for CardError {
    fn from(e: TLVError) -> Self {
        match e {
            TLVError::CapacityExceeded { needed, capacity } => {
                CardError::CapacityExceeded { needed, capacity }
            }
            other => CardError::MalformedTlv(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, CardError>;
