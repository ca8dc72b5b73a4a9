//! Purchase histories ledger
//!
//! One constructed `E1` record holding purchase info records in the order
//! they were accepted. Records are appended, never rewritten or removed.
//! Queries walk the children with the TLV codec's single-level scan.

use crate::error::{CardError, Result};
use crate::tlv::tags::{self, FieldKind};
use crate::tlv::{
    decode, find_child, find_next_sibling, ConstructedRecord, ScratchBuffer, TlvView,
};

use super::purchase::{PurchaseInfo, PURCHASE_INFO_LEN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseHistories {
    record: ConstructedRecord,
    /// Offset of the last appended record within the content span
    tail: Option<usize>,
    count: usize,
}

impl PurchaseHistories {
    /// An empty ledger whose full encoding may not exceed `capacity` bytes
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            record: ConstructedRecord::new(tags::PURCHASE_HISTORIES, capacity)?,
            tail: None,
            count: 0,
        })
    }

    /// Rebuild the ledger from its stored encoding
    ///
    /// Every child must be a complete purchase info record.
    pub fn from_bytes(
        bytes: &[u8],
        capacity: usize,
        scratch: &mut ScratchBuffer,
    ) -> Result<Self> {
        let record = ConstructedRecord::from_encoded(bytes, capacity).map_err(CardError::corrupt)?;
        if record.tag() != tags::PURCHASE_HISTORIES {
            return Err(CardError::Internal(
                "stored ledger has the wrong tag".to_string(),
            ));
        }

        let mut tail = None;
        let mut count = 0;
        for child in record.children() {
            let child = child.map_err(CardError::corrupt)?;
            if child.tag != tags::PURCHASE_INFO || child.encoded_len() != PURCHASE_INFO_LEN {
                return Err(CardError::Internal(format!(
                    "stored ledger entry at {} is not a purchase record",
                    child.offset()
                )));
            }
            PurchaseInfo::from_view(&child, scratch).map_err(|e| {
                CardError::Internal(format!("stored purchase record unreadable: {}", e))
            })?;
            tail = Some(child.offset());
            count += 1;
        }

        Ok(Self {
            record,
            tail,
            count,
        })
    }

    /// Number of purchase records
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.record.capacity()
    }

    pub fn encoded_len(&self) -> usize {
        self.record.encoded_len()
    }

    /// Whether a record of `len` encoded bytes would still fit
    pub fn can_append(&self, len: usize) -> bool {
        self.record.fits(len)
    }

    pub fn append(&mut self, info: &PurchaseInfo) -> Result<()> {
        let offset = self.record.length();
        self.record.append(&info.to_record())?;
        self.tail = Some(offset);
        self.count += 1;
        Ok(())
    }

    /// Every record whose `kind` field equals `value`, in append order
    ///
    /// Only station id and buy time are searchable, and `value` must have
    /// the field's exact width. No match yields an empty record.
    pub fn find_all_by_field(
        &self,
        kind: FieldKind,
        value: &[u8],
        scratch: &mut ScratchBuffer,
    ) -> Result<ConstructedRecord> {
        if !matches!(kind, FieldKind::StationId | FieldKind::BuyTime) {
            return Err(CardError::MalformedRequest("field is not searchable"));
        }
        if kind.value_width() != Some(value.len()) {
            return Err(CardError::MalformedRequest("query value has wrong width"));
        }

        let mut matches = ConstructedRecord::new(tags::PURCHASE_HISTORIES, self.capacity())?;
        let content = self.record.content();
        let mut current =
            find_child(content, &tags::PURCHASE_INFO, scratch).map_err(CardError::corrupt)?;

        while let Some(entry) = current {
            let field = find_child(entry.value(), &kind.tag(), scratch)
                .map_err(CardError::corrupt)?;
            if field.is_some_and(|field| field.value() == value) {
                matches.append(entry.as_bytes())?;
            }
            current = find_next_sibling(content, &tags::PURCHASE_INFO, &entry, scratch)
                .map_err(CardError::corrupt)?;
        }

        Ok(matches)
    }

    /// The last appended record, via the cached tail offset
    pub fn most_recent(&self) -> Result<Option<TlvView<'_>>> {
        self.tail
            .map(|offset| decode(self.record.content(), offset).map_err(CardError::corrupt))
            .transpose()
    }

    /// The last appended record, found by walking every child
    pub fn most_recent_by_scan(&self) -> Result<Option<TlvView<'_>>> {
        let mut last = None;
        for child in self.record.children() {
            last = Some(child.map_err(CardError::corrupt)?);
        }
        Ok(last)
    }

    /// Decode every record, oldest first
    pub fn entries(&self, scratch: &mut ScratchBuffer) -> Result<Vec<PurchaseInfo>> {
        self.record
            .children()
            .map(|child| {
                let child = child.map_err(CardError::corrupt)?;
                PurchaseInfo::from_view(&child, scratch)
            })
            .collect()
    }

    /// Full `E1` encoding
    pub fn to_bytes(&self) -> Vec<u8> {
        self.record.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::decode_exact;

    fn purchase(station: &[u8; 5], time: &[u8; 6], amount: u32) -> PurchaseInfo {
        PurchaseInfo {
            station_id: *station,
            buy_time: *time,
            amount,
            price: 5,
        }
    }

    fn ledger() -> PurchaseHistories {
        let mut ledger = PurchaseHistories::new(4096).unwrap();
        ledger.append(&purchase(b"ST001", b"140403", 10)).unwrap();
        ledger.append(&purchase(b"ST002", b"150000", 20)).unwrap();
        ledger.append(&purchase(b"ST001", b"160000", 30)).unwrap();
        ledger
    }

    #[test]
    fn test_empty_ledger() {
        let ledger = PurchaseHistories::new(4096).unwrap();
        assert!(ledger.is_empty());
        assert_eq!(ledger.to_bytes(), vec![0xE1, 0x00]);
        assert_eq!(ledger.most_recent().unwrap(), None);
        assert_eq!(ledger.most_recent_by_scan().unwrap(), None);
    }

    #[test]
    fn test_append_grows_by_record_size() {
        let ledger = ledger();
        assert_eq!(ledger.len(), 3);
        let encoded = ledger.to_bytes();
        let view = decode_exact(&encoded).unwrap();
        assert_eq!(view.length(), 3 * PURCHASE_INFO_LEN);
    }

    #[test]
    fn test_find_by_station_preserves_order() {
        let ledger = ledger();
        let mut scratch = ScratchBuffer::new();
        let found = ledger
            .find_all_by_field(FieldKind::StationId, b"ST001", &mut scratch)
            .unwrap();

        let amounts: Vec<u32> = found
            .children()
            .map(|child| {
                PurchaseInfo::from_view(&child.unwrap(), &mut scratch)
                    .unwrap()
                    .amount
            })
            .collect();
        assert_eq!(amounts, vec![10, 30]);
    }

    #[test]
    fn test_find_by_time() {
        let ledger = ledger();
        let mut scratch = ScratchBuffer::new();
        let found = ledger
            .find_all_by_field(FieldKind::BuyTime, b"150000", &mut scratch)
            .unwrap();
        assert_eq!(found.length(), PURCHASE_INFO_LEN);

        let none = ledger
            .find_all_by_field(FieldKind::BuyTime, b"235959", &mut scratch)
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_find_rejects_bad_query() {
        let ledger = ledger();
        let mut scratch = ScratchBuffer::new();
        assert!(matches!(
            ledger.find_all_by_field(FieldKind::StationId, b"ST0001", &mut scratch),
            Err(CardError::MalformedRequest(_))
        ));
        assert!(matches!(
            ledger.find_all_by_field(FieldKind::Amount, &[0, 0, 0, 10], &mut scratch),
            Err(CardError::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_station_id_matching_a_time_prefix_is_not_confused() {
        // A station id equal to the first five bytes of a buy time must not
        // match anything when searched as a station.
        let ledger = ledger();
        let mut scratch = ScratchBuffer::new();
        let found = ledger
            .find_all_by_field(FieldKind::StationId, b"14040", &mut scratch)
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_most_recent_agrees_with_scan() {
        let mut ledger = PurchaseHistories::new(4096).unwrap();
        for amount in 1..=5 {
            ledger.append(&purchase(b"ST009", b"120000", amount)).unwrap();
            assert_eq!(
                ledger.most_recent().unwrap(),
                ledger.most_recent_by_scan().unwrap()
            );
        }
        let mut scratch = ScratchBuffer::new();
        let last = ledger.most_recent().unwrap().unwrap();
        assert_eq!(PurchaseInfo::from_view(&last, &mut scratch).unwrap().amount, 5);
    }

    #[test]
    fn test_capacity_bound() {
        // Header (2) plus two records fits, a third does not
        let mut ledger = PurchaseHistories::new(2 + 2 * PURCHASE_INFO_LEN).unwrap();
        ledger.append(&purchase(b"ST001", b"140403", 1)).unwrap();
        ledger.append(&purchase(b"ST001", b"140403", 2)).unwrap();
        assert!(!ledger.can_append(PURCHASE_INFO_LEN));
        assert!(matches!(
            ledger.append(&purchase(b"ST001", b"140403", 3)),
            Err(CardError::CapacityExceeded { .. })
        ));
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.encoded_len(), 2 + 2 * PURCHASE_INFO_LEN);
    }

    #[test]
    fn test_long_form_header_counts_against_capacity() {
        // Five records need a long-form length (145 > 127), so three header bytes
        let mut ledger = PurchaseHistories::new(3 + 5 * PURCHASE_INFO_LEN).unwrap();
        for amount in 0..5 {
            ledger.append(&purchase(b"ST001", b"140403", amount)).unwrap();
        }
        assert_eq!(ledger.to_bytes()[1], 0x81);
        assert!(!ledger.can_append(PURCHASE_INFO_LEN));
    }

    #[test]
    fn test_reload_from_bytes() {
        let ledger = ledger();
        let mut scratch = ScratchBuffer::new();
        let reloaded =
            PurchaseHistories::from_bytes(&ledger.to_bytes(), 4096, &mut scratch).unwrap();
        assert_eq!(reloaded, ledger);
        assert_eq!(reloaded.entries(&mut scratch).unwrap().len(), 3);
    }

    #[test]
    fn test_reload_rejects_garbage() {
        let mut scratch = ScratchBuffer::new();
        let bad = hex::decode("E103C40100").unwrap();
        assert!(matches!(
            PurchaseHistories::from_bytes(&bad, 4096, &mut scratch),
            Err(CardError::Internal(_))
        ));
        let wrong_root = hex::decode("E200").unwrap();
        assert!(matches!(
            PurchaseHistories::from_bytes(&wrong_root, 4096, &mut scratch),
            Err(CardError::Internal(_))
        ));
    }
}
