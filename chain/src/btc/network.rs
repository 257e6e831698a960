//! Network magic numbers.

use crate::ChainError;

pub const MAINNET_MAGIC: u32 = 0xD9B4_BEF9;
pub const TESTNET_MAGIC: u32 = 0x0709_110B;
pub const REGTEST_MAGIC: u32 = 0xDAB5_BFFA;
pub const SIGNET_MAGIC: u32 = 0x40CF_030A;

/// Wire magic for a named network (case-insensitive).
pub fn magic_for_network(name: &str) -> Result<u32, ChainError> {
    match name.to_ascii_lowercase().as_str() {
        "mainnet" | "main" => Ok(MAINNET_MAGIC),
        "testnet" | "testnet3" | "test" => Ok(TESTNET_MAGIC),
        "regtest" => Ok(REGTEST_MAGIC),
        "signet" => Ok(SIGNET_MAGIC),
        _ => Err(ChainError::UnknownNetwork(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_networks() {
        assert_eq!(magic_for_network("Mainnet").unwrap(), MAINNET_MAGIC);
        assert_eq!(magic_for_network("testnet3").unwrap(), TESTNET_MAGIC);
        assert_eq!(magic_for_network("regtest").unwrap(), REGTEST_MAGIC);
    }

    #[test]
    fn mainnet_magic_wire_bytes() {
        assert_eq!(MAINNET_MAGIC.to_le_bytes(), [0xF9, 0xBE, 0xB4, 0xD9]);
    }

    #[test]
    fn unknown_network_is_error() {
        assert!(matches!(
            magic_for_network("moonnet"),
            Err(ChainError::UnknownNetwork(_))
        ));
    }
}
