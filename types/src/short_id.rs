//! Relay-assigned short transaction identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A compact integer the relay network substitutes for a transaction hash.
///
/// Unique among live assignments, but the relay may hand the same value out
/// again once the previous owner has been evicted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShortId(u32);

impl ShortId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for ShortId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
