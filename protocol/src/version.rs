//! Protocol version management.

/// Current protocol version.
pub const PROTOCOL_VERSION: u16 = 3;

/// Minimum supported protocol version.
pub const MIN_PROTOCOL_VERSION: u16 = 2;

/// Check if a peer's protocol version is compatible.
pub fn is_compatible(peer_version: u16) -> bool {
    (MIN_PROTOCOL_VERSION..=PROTOCOL_VERSION).contains(&peer_version)
}
