//! Account balance
//!
//! A bounded non-negative balance. The bound is the largest value the
//! eight-byte packed BCD rendering can hold, so every balance the token
//! stores can also be reported.

use crate::error::{CardError, Result};

/// Largest representable balance: sixteen decimal nines
pub const MAX_BALANCE: u64 = 9_999_999_999_999_999;

/// Width of the rendered balance in bytes
pub const BALANCE_LEN: usize = 8;

/// Output encodings accepted by GET BALANCE, selected by P1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormat {
    /// Packed BCD, two digits per byte, most significant first
    Bcd,
    /// Unsigned big-endian binary
    Hex,
}

impl NumberFormat {
    pub fn from_p1(p1: u8) -> Result<Self> {
        match p1 {
            0x01 => Ok(NumberFormat::Bcd),
            0x02 => Ok(NumberFormat::Hex),
            other => Err(CardError::InvalidNumberFormat(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balance {
    value: u64,
}

impl Balance {
    pub fn new(value: u64) -> Result<Self> {
        if value > MAX_BALANCE {
            return Err(CardError::Internal(format!(
                "balance {} exceeds {}",
                value, MAX_BALANCE
            )));
        }
        Ok(Self { value })
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    /// Cost of a purchase, if it is representable
    pub fn cost(amount: u32, price: u32) -> Result<u64> {
        (amount as u64)
            .checked_mul(price as u64)
            .filter(|cost| *cost <= MAX_BALANCE)
            .ok_or(CardError::ArithmeticOverflow { amount, price })
    }

    pub fn can_debit(&self, amount: u32, price: u32) -> bool {
        Self::cost(amount, price).is_ok_and(|cost| cost <= self.value)
    }

    /// Debit `amount * price`
    ///
    /// An unrepresentable cost leaves the balance alone. A cost above the
    /// balance drains it to zero and still fails.
    pub fn debit(&mut self, amount: u32, price: u32) -> Result<u64> {
        let cost = Self::cost(amount, price)?;
        if self.value < cost {
            let balance = self.value;
            self.value = 0;
            return Err(CardError::InsufficientBalance { cost, balance });
        }
        self.value -= cost;
        Ok(cost)
    }

    /// Render the balance in `format`
    pub fn read(&self, format: NumberFormat) -> [u8; BALANCE_LEN] {
        match format {
            NumberFormat::Hex => self.value.to_be_bytes(),
            NumberFormat::Bcd => {
                let mut out = [0u8; BALANCE_LEN];
                let mut rest = self.value;
                for byte in out.iter_mut().rev() {
                    let low = (rest % 10) as u8;
                    rest /= 10;
                    let high = (rest % 10) as u8;
                    rest /= 10;
                    *byte = (high << 4) | low;
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debit() {
        let mut balance = Balance::new(1_000_000).unwrap();
        assert_eq!(balance.debit(10, 5).unwrap(), 50);
        assert_eq!(balance.value(), 999_950);
    }

    #[test]
    fn test_debit_exact_balance() {
        let mut balance = Balance::new(50).unwrap();
        balance.debit(10, 5).unwrap();
        assert_eq!(balance.value(), 0);
    }

    #[test]
    fn test_insufficient_balance_zeroes() {
        let mut balance = Balance::new(49).unwrap();
        assert_eq!(
            balance.debit(10, 5),
            Err(CardError::InsufficientBalance {
                cost: 50,
                balance: 49
            })
        );
        assert_eq!(balance.value(), 0);
    }

    #[test]
    fn test_overflow_leaves_balance() {
        let mut balance = Balance::new(MAX_BALANCE).unwrap();
        assert_eq!(
            balance.debit(u32::MAX, u32::MAX),
            Err(CardError::ArithmeticOverflow {
                amount: u32::MAX,
                price: u32::MAX
            })
        );
        assert_eq!(balance.value(), MAX_BALANCE);
        assert!(!balance.can_debit(u32::MAX, u32::MAX));
        assert!(balance.can_debit(u32::MAX, 2));
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert!(Balance::new(MAX_BALANCE).is_ok());
        assert!(Balance::new(MAX_BALANCE + 1).is_err());
    }

    #[test]
    fn test_read_bcd() {
        let balance = Balance::new(999_950).unwrap();
        assert_eq!(
            hex::encode(balance.read(NumberFormat::Bcd)),
            "0000000000999950"
        );
        let balance = Balance::new(MAX_BALANCE).unwrap();
        assert_eq!(balance.read(NumberFormat::Bcd), [0x99; 8]);
    }

    #[test]
    fn test_read_hex() {
        let balance = Balance::new(100_000).unwrap();
        assert_eq!(
            hex::encode(balance.read(NumberFormat::Hex)),
            "00000000000186a0"
        );
    }

    #[test]
    fn test_number_format_from_p1() {
        assert_eq!(NumberFormat::from_p1(0x01), Ok(NumberFormat::Bcd));
        assert_eq!(NumberFormat::from_p1(0x02), Ok(NumberFormat::Hex));
        assert_eq!(
            NumberFormat::from_p1(0x03),
            Err(CardError::InvalidNumberFormat(0x03))
        );
    }
}
