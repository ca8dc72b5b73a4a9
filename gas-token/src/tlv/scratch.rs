//! Scratch buffer shared by unrelated TLV operations
//!
//! The applet owns one small buffer and lends it out for the duration of a
//! single lookup. Whatever the previous operation left behind is garbage, so
//! every acquisition zero-fills it first.

use super::tag::Tag;
use super::TLVError;

/// Size of the scratch buffer in bytes
pub const SCRATCH_SIZE: usize = 10;

#[derive(Debug, Clone)]
pub struct ScratchBuffer {
    bytes: [u8; SCRATCH_SIZE],
}

impl ScratchBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: [0u8; SCRATCH_SIZE],
        }
    }

    /// Borrow the buffer for one operation, cleared
    pub fn acquire(&mut self) -> &mut [u8; SCRATCH_SIZE] {
        self.bytes.fill(0);
        &mut self.bytes
    }

    /// Serialize `tag` into the cleared buffer and return the encoded bytes
    pub fn write_tag(&mut self, tag: &Tag) -> Result<&[u8], TLVError> {
        let buf = self.acquire();
        let len = tag.encode(buf)?;
        Ok(&buf[..len])
    }
}

impl Default for ScratchBuffer {
    fn default() -> Self {
        Self::new()
    }
}
