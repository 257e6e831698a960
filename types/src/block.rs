//! Block hash type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Double SHA-256 of an 80-byte block header, in internal byte order.
///
/// Relay broadcasts carry this hash next to the compressed payload; the
/// gateway recomputes it from the header before forwarding anything.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockHash([u8; 32]);

impl BlockHash {
    pub const ZERO: Self = Self([0u8; 32]);

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// `None` unless `bytes` is exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 32]>::try_from(bytes).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl From<[u8; 32]> for BlockHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BlockHash(")?;
        self.0[..4].iter().try_for_each(|b| write!(f, "{b:02x}"))?;
        f.write_str("..)")
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{b:02x}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_zero() {
        assert!(BlockHash::default().is_zero());
        assert!(!BlockHash::new([1; 32]).is_zero());
    }

    #[test]
    fn formatting() {
        let hash = BlockHash::from([0x0f; 32]);
        assert_eq!(format!("{hash:?}"), "BlockHash(0f0f0f0f..)");
        assert_eq!(hash.to_string(), "0f".repeat(32));
    }

    #[test]
    fn from_slice_checks_length() {
        assert_eq!(BlockHash::from_slice(&[2; 32]), Some(BlockHash::new([2; 32])));
        assert!(BlockHash::from_slice(&[2; 80]).is_none());
    }
}
