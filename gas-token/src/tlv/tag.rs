//! BER tag descriptors
//!
//! A tag is a class, a constructed flag and a tag number. Encoding follows
//! ISO 7816-4 / X.690: numbers below 31 fit in the leading byte, larger
//! numbers use the `0x1F` escape followed by base-128 continuation bytes.

use super::TLVError;

/// Longest tag encoding accepted (leading byte + three number bytes)
pub const MAX_TAG_LEN: usize = 4;

/// Mask for the "tag number follows" escape in the leading byte
const TAG_NUMBER_ESCAPE: u8 = 0x1F;

/// Constructed flag in the leading byte
const CONSTRUCTED_BIT: u8 = 0x20;

/// The two class bits of a BER tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagClass {
    Universal,
    Application,
    ContextSpecific,
    Private,
}

impl TagClass {
    /// Class bits as they appear in the leading tag byte
    pub const fn bits(self) -> u8 {
        match self {
            TagClass::Universal => 0x00,
            TagClass::Application => 0x40,
            TagClass::ContextSpecific => 0x80,
            TagClass::Private => 0xC0,
        }
    }

    /// Extract the class from a leading tag byte
    pub const fn from_leading_byte(byte: u8) -> Self {
        match byte & 0xC0 {
            0x00 => TagClass::Universal,
            0x40 => TagClass::Application,
            0x80 => TagClass::ContextSpecific,
            _ => TagClass::Private,
        }
    }
}

/// A BER tag: class, constructed flag and number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    pub class: TagClass,
    pub constructed: bool,
    pub number: u16,
}

impl Tag {
    /// Create a tag from its parts
    pub const fn new(class: TagClass, constructed: bool, number: u16) -> Self {
        Self {
            class,
            constructed,
            number,
        }
    }

    /// Private-class primitive tag
    pub const fn private_primitive(number: u16) -> Self {
        Self::new(TagClass::Private, false, number)
    }

    /// Private-class constructed tag
    pub const fn private_constructed(number: u16) -> Self {
        Self::new(TagClass::Private, true, number)
    }

    /// Number of bytes the minimal encoding of this tag occupies
    pub const fn encoded_len(&self) -> usize {
        if self.number < TAG_NUMBER_ESCAPE as u16 {
            1
        } else if self.number < 0x80 {
            2
        } else if self.number < 0x4000 {
            3
        } else {
            4
        }
    }

    /// Serialize the tag into `out`, returning the number of bytes written
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, TLVError> {
        let len = self.encoded_len();
        if out.len() < len {
            return Err(TLVError::BufferTooSmall {
                needed: len,
                available: out.len(),
            });
        }

        let mut lead = self.class.bits();
        if self.constructed {
            lead |= CONSTRUCTED_BIT;
        }

        if len == 1 {
            out[0] = lead | self.number as u8;
            return Ok(1);
        }

        out[0] = lead | TAG_NUMBER_ESCAPE;
        let number = self.number as u32;
        for (i, slot) in out[1..len].iter_mut().enumerate() {
            let shift = 7 * (len - 2 - i);
            let mut byte = ((number >> shift) & 0x7F) as u8;
            if i < len - 2 {
                byte |= 0x80;
            }
            *slot = byte;
        }
        Ok(len)
    }

    /// Serialize the tag into an owned vector
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = [0u8; MAX_TAG_LEN];
        let len = self.encode(&mut out).unwrap_or(0);
        out[..len].to_vec()
    }

    /// Parse a tag from the start of `data`
    ///
    /// Returns the tag and the number of bytes it occupied.
    pub fn parse(data: &[u8]) -> Result<(Self, usize), TLVError> {
        let first = *data.first().ok_or(TLVError::UnexpectedEndTag)?;
        let class = TagClass::from_leading_byte(first);
        let constructed = first & CONSTRUCTED_BIT != 0;

        if first & TAG_NUMBER_ESCAPE != TAG_NUMBER_ESCAPE {
            let number = (first & TAG_NUMBER_ESCAPE) as u16;
            return Ok((Self::new(class, constructed, number), 1));
        }

        // Multi-byte number: bit 8 set means another byte follows
        let mut number: u32 = 0;
        for i in 1..MAX_TAG_LEN {
            let byte = *data.get(i).ok_or(TLVError::UnexpectedEndTag)?;
            number = (number << 7) | (byte & 0x7F) as u32;
            if byte & 0x80 == 0 {
                let number = u16::try_from(number).map_err(|_| TLVError::TagTooLong)?;
                return Ok((Self::new(class, constructed, number), i + 1));
            }
        }
        Err(TLVError::TagTooLong)
    }
}
