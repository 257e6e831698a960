//! Relay handshake: the hello each side sends when a connection opens.

use relaygate_messages::HelloMessage;
use relaygate_types::NetworkNum;

use crate::version::{is_compatible, PROTOCOL_VERSION};
use crate::ProtocolError;

/// Build the hello this node sends on a new relay connection.
pub fn hello(node_id: u64, network_num: NetworkNum) -> HelloMessage {
    HelloMessage {
        protocol_version: PROTOCOL_VERSION,
        network_num,
        node_id,
    }
}

/// Check a peer's hello before acknowledging it.
pub fn validate_hello(hello: &HelloMessage, expected: NetworkNum) -> Result<(), ProtocolError> {
    if !is_compatible(hello.protocol_version) {
        return Err(ProtocolError::UnsupportedVersion(hello.protocol_version));
    }
    if hello.network_num != expected {
        return Err(ProtocolError::WrongNetwork {
            expected,
            actual: hello.network_num,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_hello_validates() {
        let msg = hello(7, NetworkNum::new(5));
        assert!(validate_hello(&msg, NetworkNum::new(5)).is_ok());
    }

    #[test]
    fn foreign_network_rejected() {
        let msg = hello(7, NetworkNum::new(5));
        let err = validate_hello(&msg, NetworkNum::new(6)).unwrap_err();
        assert!(matches!(err, ProtocolError::WrongNetwork { .. }));
    }

    #[test]
    fn old_version_rejected() {
        let mut msg = hello(7, NetworkNum::DEFAULT);
        msg.protocol_version = 0;
        let err = validate_hello(&msg, NetworkNum::DEFAULT).unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedVersion(0)));
    }
}
