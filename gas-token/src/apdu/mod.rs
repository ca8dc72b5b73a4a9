//! APDU (Application Protocol Data Unit) handling
//!
//! ISO 7816-4 command parsing and the gas station instruction set. The
//! transport that delivers these bytes is outside this crate.
//!
//! # Example
//! ```
//! use gas_token::apdu::{parse_apdu, ins};
//!
//! // GET BALANCE in packed BCD
//! let apdu = parse_apdu(&[0x80, 0x03, 0x01, 0x00, 0x08]).unwrap();
//! assert_eq!(apdu.ins, ins::GET_BALANCE);
//! assert_eq!(apdu.le, Some(8));
//! ```

mod response;
mod status;

pub use response::Response;
pub use status::SW;

use thiserror::Error;

/// Errors that can occur during APDU parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum APDUError {
    #[error("APDU too short: expected at least 4 bytes, got {0}")]
    TooShort(usize),

    #[error("Invalid APDU length")]
    InvalidLength,

    #[error("Invalid extended APDU format")]
    InvalidExtendedFormat,
}

/// A parsed APDU command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct APDU {
    /// Class byte (CLA)
    pub cla: u8,
    /// Instruction byte (INS)
    pub ins: u8,
    /// Parameter 1 (P1)
    pub p1: u8,
    /// Parameter 2 (P2)
    pub p2: u8,
    /// Command data (may be empty)
    pub data: Vec<u8>,
    /// Expected response length (Le), None if not specified
    pub le: Option<u32>,
}

impl APDU {
    /// Create a new APDU with just the header (CLA, INS, P1, P2)
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self::with_data(cla, ins, p1, p2, Vec::new())
    }

    /// Create a new APDU with data
    pub fn with_data(cla: u8, ins: u8, p1: u8, p2: u8, data: Vec<u8>) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data,
            le: None,
        }
    }

    /// Serialize as a short APDU (reader side)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![self.cla, self.ins, self.p1, self.p2];
        if !self.data.is_empty() {
            out.push(self.data.len() as u8);
            out.extend_from_slice(&self.data);
        }
        if let Some(le) = self.le {
            out.push(if le >= 256 { 0 } else { le as u8 });
        }
        out
    }
}

/// Parse raw bytes into an APDU
///
/// Supports both short and extended APDU formats:
/// - Short: CLA INS P1 P2 [Lc Data] [Le]
/// - Extended: CLA INS P1 P2 00 Lc1 Lc2 Data [Le1 Le2]
pub fn parse_apdu(data: &[u8]) -> Result<APDU, APDUError> {
    if data.len() < 4 {
        return Err(APDUError::TooShort(data.len()));
    }

    let (cla, ins, p1, p2) = (data[0], data[1], data[2], data[3]);
    let body = &data[4..];

    // Case 1: header only
    if body.is_empty() {
        return Ok(APDU::new(cla, ins, p1, p2));
    }

    // A leading zero followed by at least two bytes marks the extended form
    if body[0] == 0x00 && body.len() >= 3 {
        return parse_extended(cla, ins, p1, p2, &body[1..]);
    }

    parse_short(cla, ins, p1, p2, body)
}

fn parse_short(cla: u8, ins: u8, p1: u8, p2: u8, body: &[u8]) -> Result<APDU, APDUError> {
    let mut apdu = APDU::new(cla, ins, p1, p2);

    // Case 2: Le only, Le=0 means 256
    if body.len() == 1 {
        apdu.le = Some(short_le(body[0]));
        return Ok(apdu);
    }

    let lc = body[0] as usize;
    if lc == 0 {
        return Err(APDUError::InvalidLength);
    }
    match body.len() - 1 {
        // Case 3: Lc + Data
        n if n == lc => {}
        // Case 4: Lc + Data + Le
        n if n == lc + 1 => apdu.le = Some(short_le(body[1 + lc])),
        _ => return Err(APDUError::InvalidLength),
    }
    apdu.data = body[1..1 + lc].to_vec();
    Ok(apdu)
}

fn parse_extended(cla: u8, ins: u8, p1: u8, p2: u8, body: &[u8]) -> Result<APDU, APDUError> {
    let mut apdu = APDU::new(cla, ins, p1, p2);
    let first_word = ((body[0] as usize) << 8) | body[1] as usize;

    // Case 2E: extended Le only, 0 means 65536
    if body.len() == 2 {
        apdu.le = Some(extended_le(first_word));
        return Ok(apdu);
    }

    let lc = first_word;
    if lc == 0 || body.len() < 2 + lc {
        return Err(APDUError::InvalidExtendedFormat);
    }
    match body.len() - 2 - lc {
        // Case 3E
        0 => {}
        // Case 4E
        2 => {
            let le_word = ((body[2 + lc] as usize) << 8) | body[3 + lc] as usize;
            apdu.le = Some(extended_le(le_word));
        }
        _ => return Err(APDUError::InvalidExtendedFormat),
    }
    apdu.data = body[2..2 + lc].to_vec();
    Ok(apdu)
}

fn short_le(byte: u8) -> u32 {
    if byte == 0 {
        256
    } else {
        byte as u32
    }
}

fn extended_le(word: usize) -> u32 {
    if word == 0 {
        65536
    } else {
        word as u32
    }
}

/// Gas station instruction bytes
pub mod ins {
    /// Class byte for every gas station command
    pub const CLA: u8 = 0x80;

    pub const SELECT: u8 = 0xA4;
    pub const VERIFY: u8 = 0x01;
    pub const UPDATE_PURCHASE_INFO: u8 = 0x02;
    pub const GET_BALANCE: u8 = 0x03;
    pub const GET_PURCHASE_HISTORIES: u8 = 0x04;
    pub const GET_PURCHASE_HISTORIES_BY_TIME: u8 = 0x05;
    pub const GET_PURCHASE_HISTORIES_BY_STATION: u8 = 0x06;
    pub const GET_LAST_PURCHASE_HISTORY: u8 = 0x07;
    pub const CHANGE_PIN: u8 = 0x08;
    pub const GET_RESPONSE: u8 = 0xC0;
}
