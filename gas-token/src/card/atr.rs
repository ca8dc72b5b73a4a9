//! ATR (Answer To Reset) handling

use super::state::CardState;

/// Build an ATR with specific historical bytes
pub fn build_atr(historical_bytes: &[u8]) -> Vec<u8> {
    let mut atr = Vec::with_capacity(32);

    // TS - Initial character (direct convention)
    atr.push(0x3B);

    // T0 - TD1 present, K historical bytes (max 15)
    let hist_len = historical_bytes.len().min(15) as u8;
    atr.push(0x80 | hist_len);

    // TD1 - T=1 protocol, no more interface bytes
    atr.push(0x01);

    atr.extend_from_slice(&historical_bytes[..hist_len as usize]);

    // TCK - XOR of all bytes from T0 to last historical byte, required for T=1
    let tck: u8 = atr[1..].iter().fold(0u8, |acc, &b| acc ^ b);
    atr.push(tck);

    atr
}

/// ATR for the gas token, reflecting the PIN lifecycle in the status indicator
pub fn create_token_atr(state: &CardState) -> Vec<u8> {
    build_atr(&state.get_historical_bytes())
}
