//! Shared fixtures for gateway integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use relaygate_chain::btc::network::REGTEST_MAGIC;
use relaygate_chain::btc::{compress, parse_envelope, CompressedTx, BLOCK_HEADER_LEN};
use relaygate_chain::{BlockCodec, BtcBlockCodec};
use relaygate_crypto::{hash_block_header, hash_transaction};
use relaygate_gateway::{
    GatewayConfig, GatewayMetrics, MessageHandler, NetworkServices, RelaySession,
};
use relaygate_messages::{
    BroadcastMessage, RelayMessage, TxAssignMessage, TxDetails, TxMessage, TxsMessage,
};
use relaygate_nullables::{NullClock, NullNodeSink, NullRelay};
use relaygate_types::{BlockHash, NetworkNum, ShortId, TxHash};

pub struct Harness {
    pub services: NetworkServices,
    pub relay: Arc<NullRelay>,
    pub node: Arc<NullNodeSink>,
    pub clock: Arc<NullClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(GatewayConfig::default())
    }

    pub fn with_config(config: GatewayConfig) -> Self {
        Self::with_codec(config, Arc::new(BtcBlockCodec::new(REGTEST_MAGIC)))
    }

    pub fn with_codec(config: GatewayConfig, codec: Arc<dyn BlockCodec>) -> Self {
        let relay = Arc::new(NullRelay::new());
        let node = Arc::new(NullNodeSink::new());
        let clock = Arc::new(NullClock::new(1_000));
        let services = NetworkServices::from_config(
            &config,
            codec,
            node.clone(),
            clock.clone(),
            Arc::new(GatewayMetrics::new().expect("metrics")),
        );
        Self {
            services,
            relay,
            node,
            clock,
        }
    }

    /// A session that has completed its handshake, with the hello cleared
    /// from the relay recording.
    pub fn established_session(&self) -> RelaySession {
        let mut session = RelaySession::new("relay-test", self.relay.clone(), self.services.clone());
        session.handle(RelayMessage::Ack).expect("ack");
        self.relay.take();
        session
    }

    /// Blocks the node received, as (hash, block payload) pairs.
    pub fn forwarded_blocks(&self) -> Vec<(BlockHash, Vec<u8>)> {
        self.node
            .sent()
            .iter()
            .filter_map(|bytes| {
                let env = parse_envelope(bytes).ok()?;
                (env.command == "block").then(|| {
                    (
                        hash_block_header(&env.payload[..BLOCK_HEADER_LEN]),
                        env.payload.to_vec(),
                    )
                })
            })
            .collect()
    }

    /// Short IDs requested so far, one vector per `gettxs`.
    pub fn requested(&self) -> Vec<Vec<ShortId>> {
        self.relay
            .requests()
            .into_iter()
            .map(|req| req.short_ids)
            .collect()
    }
}

/// A transaction as the relay knows it.
#[derive(Clone, Debug)]
pub struct TestTx {
    pub short_id: ShortId,
    pub hash: TxHash,
    pub contents: Vec<u8>,
}

pub fn test_tx(short_id: u32) -> TestTx {
    let contents = format!("transaction body #{short_id}").into_bytes();
    TestTx {
        short_id: ShortId::new(short_id),
        hash: hash_transaction(&contents),
        contents,
    }
}

pub fn header(seed: u8) -> Vec<u8> {
    let mut header = vec![seed; BLOCK_HEADER_LEN];
    header[0] = 0x01;
    header
}

pub fn block_hash(seed: u8) -> BlockHash {
    hash_block_header(&header(seed))
}

pub fn broadcast(seed: u8, entries: Vec<CompressedTx>) -> BroadcastMessage {
    let header = header(seed);
    BroadcastMessage {
        network_num: NetworkNum::DEFAULT,
        block_hash: hash_block_header(&header),
        payload: compress(&header, entries).expect("compress"),
    }
}

/// Broadcast of a block made only of short-ID references.
pub fn broadcast_of(seed: u8, txs: &[&TestTx]) -> RelayMessage {
    let entries = txs
        .iter()
        .map(|tx| CompressedTx::ShortId(tx.short_id))
        .collect();
    RelayMessage::Broadcast(broadcast(seed, entries))
}

/// Full block payload the node should receive: header, count, bodies.
pub fn expected_block(seed: u8, bodies: &[&[u8]]) -> Vec<u8> {
    let mut out = header(seed);
    out.push(bodies.len() as u8);
    for body in bodies {
        out.extend_from_slice(body);
    }
    out
}

pub fn assign(tx: &TestTx) -> RelayMessage {
    RelayMessage::TxAssign(TxAssignMessage {
        network_num: NetworkNum::DEFAULT,
        tx_hash: tx.hash,
        short_id: tx.short_id,
    })
}

pub fn tx_msg(tx: &TestTx) -> RelayMessage {
    RelayMessage::Tx(TxMessage {
        network_num: NetworkNum::DEFAULT,
        tx_hash: tx.hash,
        contents: tx.contents.clone(),
    })
}

pub fn txs_msg(txs: &[&TestTx]) -> RelayMessage {
    RelayMessage::Txs(TxsMessage {
        txs: txs
            .iter()
            .map(|tx| TxDetails {
                short_id: tx.short_id,
                tx_hash: tx.hash,
                contents: tx.contents.clone(),
            })
            .collect(),
    })
}
