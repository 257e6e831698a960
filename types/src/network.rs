//! Logical network identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one blockchain network served by the gateway.
///
/// The relay tags every message with the network it belongs to; the gateway
/// keeps an independent transaction index and recovery tracker per network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkNum(u32);

impl NetworkNum {
    /// Network number used when none is configured.
    pub const DEFAULT: Self = Self(1);

    pub const fn new(num: u32) -> Self {
        Self(num)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Default for NetworkNum {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for NetworkNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
