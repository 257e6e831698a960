//! Bitcoin P2P message envelope.
//!
//! `magic (4, LE) | command (12, NUL-padded ASCII) | length (4, LE) |
//! checksum (4) | payload`

use relaygate_crypto::checksum;

use crate::ChainError;

pub const HEADER_LEN: usize = 24;
const COMMAND_LEN: usize = 12;

/// A parsed envelope borrowing its payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub magic: u32,
    pub command: String,
    pub payload: &'a [u8],
}

/// Wrap `payload` in an envelope for `command`.
pub fn wrap(magic: u32, command: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&magic.to_le_bytes());
    let mut name = [0u8; COMMAND_LEN];
    let len = command.len().min(COMMAND_LEN);
    name[..len].copy_from_slice(&command.as_bytes()[..len]);
    out.extend_from_slice(&name);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&checksum(payload));
    out.extend_from_slice(payload);
    out
}

/// Parse one envelope, verifying its length and checksum.
pub fn parse_envelope(data: &[u8]) -> Result<Envelope<'_>, ChainError> {
    if data.len() < HEADER_LEN {
        return Err(ChainError::Truncated {
            needed: HEADER_LEN,
            available: data.len(),
        });
    }
    let magic = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let command: String = data[4..4 + COMMAND_LEN]
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect();
    let len = u32::from_le_bytes([data[16], data[17], data[18], data[19]]) as usize;
    let payload = data
        .get(HEADER_LEN..HEADER_LEN + len)
        .ok_or(ChainError::Truncated {
            needed: HEADER_LEN + len,
            available: data.len(),
        })?;
    if data[20..24] != checksum(payload) {
        return Err(ChainError::ChecksumMismatch);
    }
    Ok(Envelope {
        magic,
        command,
        payload,
    })
}
