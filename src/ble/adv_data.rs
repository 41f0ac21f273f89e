//! Legacy advertising data (AD structure) encoding.
//!
//! Each AD structure is `[len][type][payload...]` where `len` counts the
//! type byte plus payload.  A legacy PDU carries at most 31 bytes.

use crate::config::ADV_PAYLOAD_MAX;
use heapless::Vec;

/// AD type: Flags.
pub const AD_FLAGS: u8 = 0x01;
/// AD type: Complete list of 16-bit service UUIDs.
pub const AD_UUID16_COMPLETE: u8 = 0x03;
/// AD type: Complete local name.
pub const AD_NAME_COMPLETE: u8 = 0x09;

/// One advertising or scan response payload.
pub type AdPayload = Vec<u8, ADV_PAYLOAD_MAX>;

/// Append a single AD structure.  Fails without modifying `out` if the
/// structure does not fit.
pub fn push_structure(out: &mut AdPayload, ad_type: u8, payload: &[u8]) -> Result<(), ()> {
    if out.len() + 2 + payload.len() > out.capacity() {
        return Err(());
    }
    out.push(payload.len() as u8 + 1).map_err(|_| ())?;
    out.push(ad_type).map_err(|_| ())?;
    out.extend_from_slice(payload)
}

/// Append a list of 16-bit UUIDs (little-endian on air).
pub fn push_uuid16_list(out: &mut AdPayload, ad_type: u8, uuids: &[u16]) -> Result<(), ()> {
    let mut raw: Vec<u8, ADV_PAYLOAD_MAX> = Vec::new();
    for uuid in uuids {
        raw.extend_from_slice(&uuid.to_le_bytes())?;
    }
    push_structure(out, ad_type, &raw)
}
