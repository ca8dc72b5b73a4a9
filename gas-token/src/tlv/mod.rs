//! TLV (Tag-Length-Value) encoding and decoding
//!
//! BER-TLV as used by ISO 7816 cards, in a form that never materializes a
//! tree: records are decoded as borrowed views over the buffer that holds
//! them, and nested structures are navigated with a single-level linear scan.
//! The same engine parses inbound purchase messages and stores the ledger.
//!
//! # Example
//! ```
//! use gas_token::tlv::{decode, find_child, ScratchBuffer, tags};
//!
//! let data = [0xE3, 0x07, 0xC4, 0x05, b'S', b'T', b'0', b'0', b'1'];
//! let message = decode(&data, 0).unwrap();
//! let mut scratch = ScratchBuffer::new();
//! let station = find_child(message.value(), &tags::STATION_ID, &mut scratch)
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(station.value(), b"ST001");
//! ```

mod encoder;
mod parser;
mod record;
mod scratch;
mod tag;

pub use encoder::{TLVBuilder, TLVEncoder};
pub use parser::{
    decode, decode_exact, find_child, find_next_sibling, Children, TLVError, TlvView,
};
pub use record::ConstructedRecord;
pub use scratch::{ScratchBuffer, SCRATCH_SIZE};
pub use tag::{Tag, TagClass, MAX_TAG_LEN};

/// Gas station tag constants
///
/// All tags are private class. Numbers are unique across the namespace, so
/// no two sibling fields ever share a tag.
pub mod tags {
    use super::Tag;

    pub const PURCHASE_HISTORIES: Tag = Tag::private_constructed(1);
    pub const PURCHASE_INFO: Tag = Tag::private_constructed(2);
    pub const PURCHASE_UPDATE: Tag = Tag::private_constructed(3);

    pub const STATION_ID: Tag = Tag::private_primitive(4);
    pub const BUY_TIME: Tag = Tag::private_primitive(5);
    pub const AMOUNT: Tag = Tag::private_primitive(6);
    pub const PRICE: Tag = Tag::private_primitive(7);
    pub const SIGNATURE: Tag = Tag::private_primitive(8);

    /// Every field the protocol knows about
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum FieldKind {
        PurchaseHistories,
        PurchaseInfo,
        PurchaseUpdate,
        StationId,
        BuyTime,
        Amount,
        Price,
        Signature,
    }

    impl FieldKind {
        pub const ALL: [FieldKind; 8] = [
            FieldKind::PurchaseHistories,
            FieldKind::PurchaseInfo,
            FieldKind::PurchaseUpdate,
            FieldKind::StationId,
            FieldKind::BuyTime,
            FieldKind::Amount,
            FieldKind::Price,
            FieldKind::Signature,
        ];

        pub const fn tag(self) -> Tag {
            match self {
                FieldKind::PurchaseHistories => PURCHASE_HISTORIES,
                FieldKind::PurchaseInfo => PURCHASE_INFO,
                FieldKind::PurchaseUpdate => PURCHASE_UPDATE,
                FieldKind::StationId => STATION_ID,
                FieldKind::BuyTime => BUY_TIME,
                FieldKind::Amount => AMOUNT,
                FieldKind::Price => PRICE,
                FieldKind::Signature => SIGNATURE,
            }
        }

        /// Look up the field a decoded tag belongs to
        pub fn from_tag(tag: &Tag) -> Option<Self> {
            Self::ALL.into_iter().find(|kind| kind.tag() == *tag)
        }

        /// Exact value width in bytes, for fixed-width fields
        pub const fn value_width(self) -> Option<usize> {
            match self {
                FieldKind::PurchaseHistories | FieldKind::PurchaseUpdate => None,
                // Four primitive children: 7 + 8 + 6 + 6
                FieldKind::PurchaseInfo => Some(27),
                FieldKind::StationId => Some(5),
                FieldKind::BuyTime => Some(6),
                FieldKind::Amount | FieldKind::Price => Some(4),
                FieldKind::Signature => Some(8),
            }
        }
    }
}
