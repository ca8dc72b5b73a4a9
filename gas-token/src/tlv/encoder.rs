//! BER-TLV Encoder
//!
//! Encodes tag/length/value triples for outbound responses and for building
//! purchase update messages on the reader side.

use super::tag::Tag;

/// TLV Encoder for building BER-TLV structures
pub struct TLVEncoder;

impl TLVEncoder {
    /// Encode a tag-value pair to bytes
    pub fn encode(tag: &Tag, value: &[u8]) -> Vec<u8> {
        let mut result = Vec::with_capacity(tag.encoded_len() + Self::length_len(value.len()) + value.len());
        result.extend(tag.to_bytes());
        Self::write_length(value.len(), &mut result);
        result.extend_from_slice(value);
        result
    }

    /// Number of bytes the length field for `length` occupies
    pub fn length_len(length: usize) -> usize {
        if length < 0x80 {
            1
        } else if length <= 0xFF {
            2
        } else if length <= 0xFFFF {
            3
        } else if length <= 0xFF_FFFF {
            4
        } else {
            5
        }
    }

    /// Append the length bytes to `out`
    pub fn write_length(length: usize, out: &mut Vec<u8>) {
        let len_len = Self::length_len(length);
        if len_len == 1 {
            // Short form
            out.push(length as u8);
            return;
        }
        let num_bytes = len_len - 1;
        out.push(0x80 | num_bytes as u8);
        for i in (0..num_bytes).rev() {
            out.push((length >> (8 * i)) as u8);
        }
    }
}

/// Builder for constructing nested TLV structures
pub struct TLVBuilder {
    data: Vec<u8>,
}

impl TLVBuilder {
    /// Create a new TLV builder
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Add a primitive TLV
    pub fn add(mut self, tag: &Tag, value: &[u8]) -> Self {
        self.data.extend(TLVEncoder::encode(tag, value));
        self
    }

    /// Add raw bytes (pre-encoded TLV)
    pub fn add_raw(mut self, data: &[u8]) -> Self {
        self.data.extend_from_slice(data);
        self
    }

    /// Wrap current content in a constructed tag
    pub fn wrap(self, tag: &Tag) -> Self {
        let wrapped = TLVEncoder::encode(tag, &self.data);
        Self { data: wrapped }
    }

    /// Build the final byte vector
    pub fn build(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for TLVBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::decode;

    fn length_bytes(length: usize) -> Vec<u8> {
        let mut out = Vec::new();
        TLVEncoder::write_length(length, &mut out);
        assert_eq!(out.len(), TLVEncoder::length_len(length));
        out
    }

    #[test]
    fn test_encode_simple() {
        let encoded = TLVEncoder::encode(&Tag::private_primitive(6), &[0x00, 0x00, 0x00, 0x0A]);
        assert_eq!(encoded, vec![0xC6, 0x04, 0x00, 0x00, 0x00, 0x0A]);
    }

    #[test]
    fn test_encode_short_length() {
        assert_eq!(length_bytes(0), vec![0x00]);
        assert_eq!(length_bytes(127), vec![0x7F]);
    }

    #[test]
    fn test_encode_long_length() {
        assert_eq!(length_bytes(128), vec![0x81, 0x80]);
        assert_eq!(length_bytes(255), vec![0x81, 0xFF]);
        assert_eq!(length_bytes(256), vec![0x82, 0x01, 0x00]);
        assert_eq!(length_bytes(65535), vec![0x82, 0xFF, 0xFF]);
        assert_eq!(length_bytes(65536), vec![0x83, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_builder() {
        let data = TLVBuilder::new()
            .add(&Tag::private_primitive(4), b"ST001")
            .add(&Tag::private_primitive(5), b"140403")
            .wrap(&Tag::private_constructed(3))
            .build();

        assert_eq!(data[0], 0xE3);
        let outer = decode(&data, 0).unwrap();
        assert_eq!(outer.end(), data.len());
        assert_eq!(outer.children().count(), 2);
    }

    #[test]
    fn test_decode_recovers_encoded_record() {
        let tag = Tag::private_primitive(0x40);
        let value: Vec<u8> = (0..200u8).collect();
        let encoded = TLVEncoder::encode(&tag, &value);

        let view = decode(&encoded, 0).unwrap();
        assert_eq!(view.tag, tag);
        assert_eq!(view.length(), value.len());
        assert_eq!(view.value(), value.as_slice());
        assert_eq!(view.encoded_len(), encoded.len());
    }
}
