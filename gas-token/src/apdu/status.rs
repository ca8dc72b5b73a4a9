//! Status Word (SW) constants for APDU responses
//!
//! ISO 7816-4 status words plus the gas station application's own `63xx`
//! range for business failures.

/// Status Word constants
pub struct SW;

impl SW {
    // Success
    pub const SUCCESS: u16 = 0x9000;

    // Application-specific failures
    pub const VERIFICATION_FAILED: u16 = 0x6300;
    pub const PIN_VERIFICATION_REQUIRED: u16 = 0x6301;
    pub const INSUFFICIENT_BALANCE: u16 = 0x6302;
    pub const MALFORMED_REQUEST: u16 = 0x6303;
    pub const INVALID_SIGNATURE: u16 = 0x6304;
    pub const MALFORMED_TLV: u16 = 0x6305;
    pub const ARITHMETIC_OVERFLOW: u16 = 0x6306;
    pub const INVALID_NUMBER_FORMAT: u16 = 0x6307;
    pub const HISTORY_NOT_FOUND: u16 = 0x6308;

    // ISO 7816-4 checking errors
    pub const WRONG_LENGTH: u16 = 0x6700;
    pub const AUTH_METHOD_BLOCKED: u16 = 0x6983;
    pub const CONDITIONS_NOT_SATISFIED: u16 = 0x6985;
    pub const APPLET_SELECT_FAILED: u16 = 0x6999;
    pub const FILE_NOT_FOUND: u16 = 0x6A82;
    pub const NOT_ENOUGH_MEMORY: u16 = 0x6A84;
    pub const INS_NOT_SUPPORTED: u16 = 0x6D00;
    pub const CLA_NOT_SUPPORTED: u16 = 0x6E00;
    pub const UNKNOWN_ERROR: u16 = 0x6F00;

    /// Create a "more data available" status word (61xx)
    /// The low byte indicates how many more bytes are available
    #[inline]
    pub fn bytes_remaining(remaining: u8) -> u16 {
        0x6100 | (remaining as u16)
    }

    /// Check if a status word indicates success (9000 or 61xx)
    #[inline]
    pub fn is_success(sw: u16) -> bool {
        sw == Self::SUCCESS || Self::is_more_data(sw)
    }

    /// Check if a status word indicates more data available (61xx)
    #[inline]
    pub fn is_more_data(sw: u16) -> bool {
        (sw & 0xFF00) == 0x6100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_remaining() {
        assert_eq!(SW::bytes_remaining(0), 0x6100);
        assert_eq!(SW::bytes_remaining(16), 0x6110);
        assert_eq!(SW::bytes_remaining(255), 0x61FF);
    }

    #[test]
    fn test_is_success() {
        assert!(SW::is_success(0x9000));
        assert!(SW::is_success(0x6110));
        assert!(!SW::is_success(SW::HISTORY_NOT_FOUND));
        assert!(!SW::is_success(SW::AUTH_METHOD_BLOCKED));
    }
}
