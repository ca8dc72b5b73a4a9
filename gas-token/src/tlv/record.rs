//! Fixed-capacity constructed records
//!
//! A [`ConstructedRecord`] reserves its whole byte budget when it is created
//! and refuses to grow past it. The header is re-encoded on output, so an
//! append that moves the length from short to long form is accounted for in
//! the capacity check.

use super::encoder::TLVEncoder;
use super::parser::{decode_exact, Children};
use super::tag::Tag;
use super::TLVError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructedRecord {
    tag: Tag,
    content: Vec<u8>,
    capacity: usize,
}

impl ConstructedRecord {
    /// Create an empty record whose full encoding may not exceed `capacity`
    pub fn new(tag: Tag, capacity: usize) -> Result<Self, TLVError> {
        if !tag.constructed {
            return Err(TLVError::NotConstructed);
        }
        let empty_len = Self::encoded_len_for(&tag, 0);
        if capacity < empty_len {
            return Err(TLVError::CapacityExceeded {
                needed: empty_len,
                capacity,
            });
        }
        Ok(Self {
            tag,
            content: Vec::with_capacity(capacity - empty_len),
            capacity,
        })
    }

    /// Rebuild a record from its full encoding
    ///
    /// Every child must decode cleanly; the encoding must fit `capacity`.
    pub fn from_encoded(bytes: &[u8], capacity: usize) -> Result<Self, TLVError> {
        let view = decode_exact(bytes)?;
        if !view.is_constructed() {
            return Err(TLVError::NotConstructed);
        }
        for child in view.children() {
            child?;
        }
        let mut record = Self::new(view.tag, capacity)?;
        if record.would_need(view.length()) > capacity {
            return Err(TLVError::CapacityExceeded {
                needed: record.would_need(view.length()),
                capacity,
            });
        }
        record.content.extend_from_slice(view.value());
        Ok(record)
    }

    fn encoded_len_for(tag: &Tag, content_len: usize) -> usize {
        tag.encoded_len() + TLVEncoder::length_len(content_len) + content_len
    }

    fn would_need(&self, content_len: usize) -> usize {
        Self::encoded_len_for(&self.tag, content_len)
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Declared length: the byte size of all children
    pub fn length(&self) -> usize {
        self.content.len()
    }

    /// Size of the full encoding (tag + length + children)
    pub fn encoded_len(&self) -> usize {
        self.would_need(self.content.len())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// The children span, suitable for [`find_child`](super::find_child)
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn children(&self) -> Children<'_> {
        Children::new(&self.content)
    }

    /// Whether a child of `child_len` encoded bytes still fits
    pub fn fits(&self, child_len: usize) -> bool {
        self.content
            .len()
            .checked_add(child_len)
            .map(|len| self.would_need(len) <= self.capacity)
            .unwrap_or(false)
    }

    /// Append one fully encoded child record
    ///
    /// The child must be exactly one well-formed record. The declared length
    /// grows by the child's total size.
    pub fn append(&mut self, child: &[u8]) -> Result<(), TLVError> {
        decode_exact(child)?;
        if !self.fits(child.len()) {
            return Err(TLVError::CapacityExceeded {
                needed: self.would_need(self.content.len().saturating_add(child.len())),
                capacity: self.capacity,
            });
        }
        self.content.extend_from_slice(child);
        Ok(())
    }

    /// Write the full encoding to `out`
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend(self.tag.to_bytes());
        TLVEncoder::write_length(self.content.len(), out);
        out.extend_from_slice(&self.content);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut out);
        out
    }
}
