//! Purchase records and the inbound purchase update message
//!
//! A purchase update (`E3`) carries the four purchase fields plus the
//! station's signature. Once accepted, the four fields are re-packed into a
//! purchase info record (`E2`) and appended to the ledger.

use crate::error::{CardError, Result};
use crate::tlv::tags::{self, FieldKind};
use crate::tlv::{decode_exact, find_child, ScratchBuffer, TLVBuilder, TlvView};

pub const STATION_ID_LEN: usize = 5;
pub const BUY_TIME_LEN: usize = 6;
pub const SIGNATURE_LEN: usize = 8;

/// Encoded size of every purchase info record
pub const PURCHASE_INFO_LEN: usize = 29;

/// The signature every station currently sends
pub const PLACEHOLDER_SIGNATURE: [u8; SIGNATURE_LEN] = [0x88; SIGNATURE_LEN];

/// One purchase, as stored in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseInfo {
    pub station_id: [u8; STATION_ID_LEN],
    pub buy_time: [u8; BUY_TIME_LEN],
    /// Amount of fuel
    pub amount: u32,
    /// Price per unit
    pub price: u32,
}

impl PurchaseInfo {
    /// Encode as a purchase info record, children in canonical order
    pub fn to_record(&self) -> Vec<u8> {
        TLVBuilder::new()
            .add(&tags::STATION_ID, &self.station_id)
            .add(&tags::BUY_TIME, &self.buy_time)
            .add(&tags::AMOUNT, &self.amount.to_be_bytes())
            .add(&tags::PRICE, &self.price.to_be_bytes())
            .wrap(&tags::PURCHASE_INFO)
            .build()
    }

    /// Read the four purchase fields out of a constructed record
    ///
    /// Every field must be present with its exact width.
    pub fn from_view(view: &TlvView<'_>, scratch: &mut ScratchBuffer) -> Result<Self> {
        let span = view.value();
        let station_id = fixed_field::<STATION_ID_LEN>(span, FieldKind::StationId, scratch)?;
        let buy_time = fixed_field::<BUY_TIME_LEN>(span, FieldKind::BuyTime, scratch)?;
        let amount = fixed_field::<4>(span, FieldKind::Amount, scratch)?;
        let price = fixed_field::<4>(span, FieldKind::Price, scratch)?;

        Ok(Self {
            station_id,
            buy_time,
            amount: u32::from_be_bytes(amount),
            price: u32::from_be_bytes(price),
        })
    }
}

fn fixed_field<const N: usize>(
    span: &[u8],
    kind: FieldKind,
    scratch: &mut ScratchBuffer,
) -> Result<[u8; N]> {
    let child = find_child(span, &kind.tag(), scratch)?
        .ok_or(CardError::MalformedRequest("purchase field missing"))?;
    child
        .value()
        .try_into()
        .map_err(|_| CardError::MalformedRequest("purchase field has wrong width"))
}

/// A station's request to record a purchase and charge for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseUpdate {
    pub info: PurchaseInfo,
    pub signature: [u8; SIGNATURE_LEN],
}

impl PurchaseUpdate {
    /// A message signed with the placeholder signature
    pub fn new(info: PurchaseInfo) -> Self {
        Self {
            info,
            signature: PLACEHOLDER_SIGNATURE,
        }
    }

    /// Encode as sent by a station
    pub fn encode(&self) -> Vec<u8> {
        TLVBuilder::new()
            .add(&tags::STATION_ID, &self.info.station_id)
            .add(&tags::BUY_TIME, &self.info.buy_time)
            .add(&tags::AMOUNT, &self.info.amount.to_be_bytes())
            .add(&tags::PRICE, &self.info.price.to_be_bytes())
            .add(&tags::SIGNATURE, &self.signature)
            .wrap(&tags::PURCHASE_UPDATE)
            .build()
    }

    /// Validate and decode an inbound message
    ///
    /// Checks run in a fixed order: framing, outer tag, signature, fields.
    /// Nothing here touches card state.
    pub fn parse(data: &[u8], scratch: &mut ScratchBuffer) -> Result<Self> {
        if data.is_empty() {
            return Err(CardError::MalformedRequest("empty purchase update"));
        }
        let message = decode_exact(data)?;
        if FieldKind::from_tag(&message.tag) != Some(FieldKind::PurchaseUpdate) {
            return Err(CardError::MalformedRequest("not a purchase update"));
        }

        let signature = find_child(message.value(), &tags::SIGNATURE, scratch)?
            .ok_or(CardError::MalformedRequest("signature missing"))?;
        if signature.value() != PLACEHOLDER_SIGNATURE {
            return Err(CardError::InvalidSignature);
        }

        Ok(Self {
            info: PurchaseInfo::from_view(&message, scratch)?,
            signature: PLACEHOLDER_SIGNATURE,
        })
    }
}
