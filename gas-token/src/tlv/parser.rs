//! BER-TLV span decoder
//!
//! Decoding never copies: a [`TlvView`] borrows the buffer it was decoded
//! from and records where the tag, length and value sit inside it. Child
//! lookup is a single-level linear scan over a constructed record's value
//! span, comparing serialized tag bytes.

use thiserror::Error;

use super::scratch::ScratchBuffer;
use super::tag::Tag;

/// Errors that can occur while decoding, encoding or growing TLV records
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TLVError {
    #[error("Unexpected end of data while parsing tag")]
    UnexpectedEndTag,

    #[error("Unexpected end of data while parsing length")]
    UnexpectedEndLength,

    #[error("Declared length {declared} runs past the end of the buffer ({available} bytes left)")]
    ValueOverrun { declared: usize, available: usize },

    #[error("Indefinite length encoding is not supported")]
    InvalidLength,

    #[error("Length field too large: {0} bytes")]
    LengthTooLarge(usize),

    #[error("Tag number does not fit in three bytes")]
    TagTooLong,

    #[error("Output buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("Record capacity exceeded: need {needed} bytes, capacity is {capacity}")]
    CapacityExceeded { needed: usize, capacity: usize },

    #[error("Record is not constructed")]
    NotConstructed,

    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),
}

/// A decoded record borrowed from the buffer it lives in
///
/// `offset` is relative to the slice passed to [`decode`]. Children returned
/// by [`find_child`] are relative to their parent's value span, so a child
/// can be handed back to [`find_next_sibling`] with the same parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvView<'a> {
    pub tag: Tag,
    raw: &'a [u8],
    tag_len: usize,
    header_len: usize,
    offset: usize,
}

impl<'a> TlvView<'a> {
    /// The record's tag exactly as encoded
    pub fn tag_bytes(&self) -> &'a [u8] {
        &self.raw[..self.tag_len]
    }

    /// The value span (children, for a constructed record)
    pub fn value(&self) -> &'a [u8] {
        &self.raw[self.header_len..]
    }

    /// Declared length of the value
    pub fn length(&self) -> usize {
        self.raw.len() - self.header_len
    }

    /// Size of tag + length + value
    pub fn encoded_len(&self) -> usize {
        self.raw.len()
    }

    /// The full encoding of the record
    pub fn as_bytes(&self) -> &'a [u8] {
        self.raw
    }

    /// Offset of the first tag byte in the decoded slice
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Offset just past the record in the decoded slice
    pub fn end(&self) -> usize {
        self.offset + self.raw.len()
    }

    pub fn is_constructed(&self) -> bool {
        self.tag.constructed
    }

    /// Iterate over the direct children of a constructed record
    pub fn children(&self) -> Children<'a> {
        Children::new(self.value())
    }
}

/// Decode the record starting at `offset` in `buffer`
pub fn decode(buffer: &[u8], offset: usize) -> Result<TlvView<'_>, TLVError> {
    let data = buffer.get(offset..).ok_or(TLVError::UnexpectedEndTag)?;

    let (tag, tag_len) = Tag::parse(data)?;
    let (length, len_len) = parse_length(&data[tag_len..])?;
    let header_len = tag_len + len_len;

    let available = data.len() - header_len;
    if length > available {
        return Err(TLVError::ValueOverrun {
            declared: length,
            available,
        });
    }

    Ok(TlvView {
        tag,
        raw: &data[..header_len + length],
        tag_len,
        header_len,
        offset,
    })
}

/// Decode a buffer that must hold exactly one record
pub fn decode_exact(buffer: &[u8]) -> Result<TlvView<'_>, TLVError> {
    let view = decode(buffer, 0)?;
    if view.end() != buffer.len() {
        return Err(TLVError::TrailingBytes(buffer.len() - view.end()));
    }
    Ok(view)
}

/// Parse a BER length (1-5 bytes)
fn parse_length(data: &[u8]) -> Result<(usize, usize), TLVError> {
    let first = *data.first().ok_or(TLVError::UnexpectedEndLength)?;

    // Short form (0-127)
    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let num_bytes = (first & 0x7F) as usize;
    if num_bytes == 0 {
        return Err(TLVError::InvalidLength);
    }
    if num_bytes > 4 {
        return Err(TLVError::LengthTooLarge(num_bytes));
    }
    if data.len() < 1 + num_bytes {
        return Err(TLVError::UnexpectedEndLength);
    }

    let length = data[1..=num_bytes]
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);
    Ok((length, 1 + num_bytes))
}

/// Single-level iterator over records laid out back-to-back
///
/// A malformed record is yielded once as an error and ends the iteration.
#[derive(Debug, Clone)]
pub struct Children<'a> {
    span: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> Children<'a> {
    pub fn new(span: &'a [u8]) -> Self {
        Self {
            span,
            pos: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for Children<'a> {
    type Item = Result<TlvView<'a>, TLVError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.span.len() {
            return None;
        }
        match decode(self.span, self.pos) {
            Ok(child) => {
                self.pos = child.end();
                Some(Ok(child))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Find the first direct child of `parent` (a value span) tagged `tag`
///
/// The target tag is serialized into `scratch` and compared byte-for-byte
/// with each child's tag. Grandchildren are never visited.
pub fn find_child<'a>(
    parent: &'a [u8],
    tag: &Tag,
    scratch: &mut ScratchBuffer,
) -> Result<Option<TlvView<'a>>, TLVError> {
    scan_from(parent, tag, 0, scratch)
}

/// Resume the scan of `parent` right after `after`'s encoded span
pub fn find_next_sibling<'a>(
    parent: &'a [u8],
    tag: &Tag,
    after: &TlvView<'_>,
    scratch: &mut ScratchBuffer,
) -> Result<Option<TlvView<'a>>, TLVError> {
    scan_from(parent, tag, after.end(), scratch)
}

fn scan_from<'a>(
    parent: &'a [u8],
    tag: &Tag,
    start: usize,
    scratch: &mut ScratchBuffer,
) -> Result<Option<TlvView<'a>>, TLVError> {
    let needle = scratch.write_tag(tag)?;
    let mut pos = start;
    while pos < parent.len() {
        let child = decode(parent, pos)?;
        if child.tag_bytes() == needle {
            return Ok(Some(child));
        }
        pos = child.end();
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> ScratchBuffer {
        ScratchBuffer::new()
    }

    #[test]
    fn test_decode_primitive() {
        let data = hex::decode("C405535441544E").unwrap();
        let view = decode(&data, 0).unwrap();
        assert_eq!(view.tag, Tag::private_primitive(4));
        assert_eq!(view.tag_bytes(), &[0xC4]);
        assert_eq!(view.length(), 5);
        assert_eq!(view.value(), b"STATN");
        assert_eq!(view.encoded_len(), 7);
    }

    #[test]
    fn test_decode_at_offset() {
        let data = hex::decode("C60100C7020102").unwrap();
        let view = decode(&data, 3).unwrap();
        assert_eq!(view.offset(), 3);
        assert_eq!(view.end(), 7);
        assert_eq!(view.value(), &[0x01, 0x02]);
    }

    #[test]
    fn test_decode_rejects_overrun() {
        let data = hex::decode("C40553544154").unwrap();
        assert_eq!(
            decode(&data, 0),
            Err(TLVError::ValueOverrun {
                declared: 5,
                available: 4
            })
        );
    }

    #[test]
    fn test_long_form_length() {
        let mut data = vec![0xC8, 0x81, 0x80];
        data.extend(vec![0x88; 128]);
        let view = decode(&data, 0).unwrap();
        assert_eq!(view.length(), 128);

        assert_eq!(decode(&[0xC8, 0x80], 0), Err(TLVError::InvalidLength));
        assert_eq!(
            decode(&[0xC8, 0x85, 0, 0, 0, 0, 1], 0),
            Err(TLVError::LengthTooLarge(5))
        );
        assert_eq!(
            decode(&[0xC8, 0x82, 0x01], 0),
            Err(TLVError::UnexpectedEndLength)
        );
    }

    #[test]
    fn test_decode_exact_rejects_trailing() {
        let data = hex::decode("C6010000").unwrap();
        assert_eq!(decode_exact(&data), Err(TLVError::TrailingBytes(1)));
    }

    #[test]
    fn test_find_child_single_level() {
        // E2 { E1 { C4 01 AA } C4 01 BB }
        let data = hex::decode("E208E103C401AAC401BB").unwrap();
        let parent = decode(&data, 0).unwrap();
        let mut scratch = scratch();

        let found = find_child(parent.value(), &Tag::private_primitive(4), &mut scratch)
            .unwrap()
            .unwrap();
        // The nested C4 inside E1 must not be returned
        assert_eq!(found.value(), &[0xBB]);

        let missing = find_child(parent.value(), &Tag::private_primitive(9), &mut scratch).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_find_next_sibling_walks_duplicates() {
        let data = hex::decode("C40101C50102C40103").unwrap();
        let tag = Tag::private_primitive(4);
        let mut scratch = scratch();

        let first = find_child(&data, &tag, &mut scratch).unwrap().unwrap();
        assert_eq!(first.value(), &[0x01]);
        let second = find_next_sibling(&data, &tag, &first, &mut scratch)
            .unwrap()
            .unwrap();
        assert_eq!(second.value(), &[0x03]);
        assert!(find_next_sibling(&data, &tag, &second, &mut scratch)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_find_child_reports_malformed_sibling() {
        let data = hex::decode("C50102C409").unwrap();
        let mut scratch = scratch();
        let result = find_child(&data, &Tag::private_primitive(4), &mut scratch);
        assert!(matches!(result, Err(TLVError::ValueOverrun { .. })));
    }

    #[test]
    fn test_children_iterator() {
        let data = hex::decode("E109C40101C50102C60103").unwrap();
        let parent = decode(&data, 0).unwrap();
        let tags: Vec<u16> = parent
            .children()
            .map(|c| c.unwrap().tag.number)
            .collect();
        assert_eq!(tags, vec![4, 5, 6]);

        let broken = [0xC4, 0x01, 0x01, 0xC5, 0x07];
        let results: Vec<_> = Children::new(&broken).collect();
        assert_eq!(results.len(), 2);
        assert!(results[1].is_err());
    }
}
