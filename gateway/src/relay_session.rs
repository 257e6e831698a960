//! Relay session: the per-connection protocol handler.
//!
//! A session owns nothing but its state and the outbound half of its
//! connection. Everything it learns goes into the network's shared
//! [`NetworkServices`], and every block it completes goes to the local node.
//!
//! Block path:
//! 1. `broadcast` → decompress against the index.
//! 2. Complete → forward to the node. Incomplete → park in the tracker and
//!    ask the relay for every missing short ID in a single `gettxs`.
//! 3. `txassign` / `tx` / `txs` feed the index, then the tracker; any block
//!    that became complete is drained and sent through step 1 again.
//!
//! Writers update the index before they notify the tracker, and a block is
//! checked against the index again right after it is parked. Between the two,
//! a piece that lands while another session is parking a block is never lost.

use std::sync::Arc;

use relaygate_crypto::hash_transaction;
use relaygate_messages::{
    BroadcastMessage, GetTxsMessage, HelloMessage, RelayMessage, TxAssignMessage, TxDetails,
    TxMessage, TxsMessage,
};
use relaygate_protocol::handshake::{hello, validate_hello};
use relaygate_protocol::RelayOutbound;
use relaygate_types::{ShortId, Timestamp, TxHash};

use crate::block_recovery::{RecoveredBlock, RegisterOutcome};
use crate::error::SessionError;
use crate::services::NetworkServices;
use crate::session::{Handled, MessageHandler, SessionState};
use crate::tracing_spans::block_recovery_span;

/// Production relay session.
pub struct RelaySession {
    peer_id: String,
    state: SessionState,
    relay: Arc<dyn RelayOutbound>,
    services: NetworkServices,
}

impl RelaySession {
    /// Open a session: sends our hello and waits for the relay's ack.
    pub fn new(
        peer_id: impl Into<String>,
        relay: Arc<dyn RelayOutbound>,
        services: NetworkServices,
    ) -> Self {
        let mut session = Self {
            peer_id: peer_id.into(),
            state: SessionState::Connecting,
            relay,
            services,
        };
        let our_hello = hello(session.services.node_id, session.services.network_num);
        session.relay.send(RelayMessage::Hello(our_hello));
        session.state = SessionState::Handshaking;
        tracing::debug!(peer = %session.peer_id, "hello sent to relay");
        session
    }

    pub fn services(&self) -> &NetworkServices {
        &self.services
    }

    fn on_hello(&mut self, peer_hello: HelloMessage) -> Result<Handled, SessionError> {
        if let Err(e) = validate_hello(&peer_hello, self.services.network_num) {
            tracing::warn!(peer = %self.peer_id, error = %e, "relay hello rejected");
            self.close();
            return Err(e.into());
        }
        tracing::debug!(
            peer = %self.peer_id,
            node_id = peer_hello.node_id,
            version = peer_hello.protocol_version,
            "relay hello accepted"
        );
        self.relay.send(RelayMessage::Ack);
        Ok(Handled::Processed)
    }

    fn on_ack(&mut self) -> Handled {
        if self.state == SessionState::Handshaking {
            self.state = SessionState::Established;
            tracing::info!(peer = %self.peer_id, "relay session established");
        }
        Handled::Processed
    }

    fn on_broadcast(&mut self, msg: BroadcastMessage) -> Handled {
        let span = block_recovery_span(&msg.block_hash);
        let _enter = span.enter();
        let handled = self.process_broadcast(msg, None);
        self.retry_recovered();
        handled
    }

    /// Decompress a broadcast and forward it, or park it for recovery.
    ///
    /// `first_seen` is the tracker registration time of a recovered block,
    /// `None` for a broadcast fresh from the relay.
    fn process_broadcast(
        &mut self,
        msg: BroadcastMessage,
        first_seen: Option<Timestamp>,
    ) -> Handled {
        let block_hash = msg.block_hash;
        let recovered = first_seen.is_some();
        let metrics = &self.services.metrics;

        if self.services.recent_blocks.lock().contains(&block_hash) {
            metrics.duplicate_blocks.inc();
            tracing::debug!(peer = %self.peer_id, block = %block_hash, "block already forwarded");
            return Handled::Dropped;
        }

        let result = match self
            .services
            .codec
            .decompress(&msg.payload, self.services.transactions.as_ref())
        {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    peer = %self.peer_id,
                    block = %block_hash,
                    error = %e,
                    "malformed broadcast payload dropped"
                );
                return Handled::Dropped;
            }
        };

        if result.block_hash != block_hash {
            metrics.hash_mismatches.inc();
            tracing::warn!(
                peer = %self.peer_id,
                claimed = %block_hash,
                computed = %result.block_hash,
                "broadcast block hash mismatch, dropped"
            );
            return Handled::Dropped;
        }

        match result.block {
            Some(block) => {
                // Another session may have completed the same block meanwhile.
                if !self.services.recent_blocks.lock().insert(block_hash) {
                    metrics.duplicate_blocks.inc();
                    return Handled::Dropped;
                }
                self.services.node.send_to_node(block);
                if recovered {
                    metrics.blocks_recovered.inc();
                    tracing::info!(block = %block_hash, "recovered block forwarded to node");
                } else {
                    metrics.blocks_decompressed.inc();
                    tracing::debug!(block = %block_hash, "block forwarded to node");
                }
                Handled::Processed
            }
            None => self.register_and_request(
                msg,
                first_seen,
                &result.missing_short_ids,
                &result.missing_hashes,
            ),
        }
    }

    fn register_and_request(
        &mut self,
        msg: BroadcastMessage,
        first_seen: Option<Timestamp>,
        missing_short_ids: &[ShortId],
        missing_hashes: &[TxHash],
    ) -> Handled {
        let block_hash = msg.block_hash;
        let recovery = &self.services.recovery;
        let registered = match first_seen {
            Some(registered_at) => recovery.register_recovered(
                RecoveredBlock {
                    message: msg,
                    registered_at,
                },
                missing_short_ids,
                missing_hashes,
            ),
            None => recovery.register_incomplete(
                block_hash,
                msg,
                missing_short_ids,
                missing_hashes,
            ),
        };
        let outcome = match registered {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(block = %block_hash, error = %e, "incomplete block dropped");
                return Handled::Dropped;
            }
        };
        tracing::debug!(
            block = %block_hash,
            ?outcome,
            missing_short_ids = missing_short_ids.len(),
            missing_hashes = missing_hashes.len(),
            "block waiting for missing transactions"
        );

        // Merges and re-parked recovered blocks were counted when first seen.
        if outcome == RegisterOutcome::Registered && first_seen.is_none() {
            self.services.metrics.blocks_incomplete.inc();
        }

        self.recheck_index(missing_short_ids, missing_hashes);
        if self.services.recovery.is_pending(&block_hash) {
            self.request_missing(missing_short_ids, missing_hashes);
        } else {
            tracing::debug!(block = %block_hash, "missing transactions arrived while parking");
        }
        self.services.update_gauges();
        Handled::Processed
    }

    /// Resolve gaps the index filled after decompression looked at it.
    fn recheck_index(&self, missing_short_ids: &[ShortId], missing_hashes: &[TxHash]) {
        let transactions = &self.services.transactions;
        let recovery = &self.services.recovery;
        for short_id in missing_short_ids {
            if transactions.hash_for_short_id(*short_id).is_some() {
                recovery.check_missing_sid(*short_id);
            }
        }
        for hash in missing_hashes {
            if transactions.has_content(hash) {
                recovery.check_missing_tx_hash(*hash);
            }
        }
    }

    /// Ask the relay for unknown short IDs and for the short IDs of hashes
    /// whose bodies are missing, in one `gettxs`.
    fn request_missing(&self, missing_short_ids: &[ShortId], missing_hashes: &[TxHash]) {
        let mut short_ids = missing_short_ids.to_vec();
        for hash in missing_hashes {
            match self.services.transactions.lookup_short_id(hash) {
                Some(short_id) => {
                    if !short_ids.contains(&short_id) {
                        short_ids.push(short_id);
                    }
                }
                None => {
                    tracing::debug!(tx = %hash, "missing transaction has no short ID to request")
                }
            }
        }
        if short_ids.is_empty() {
            return;
        }

        self.services
            .metrics
            .short_ids_requested
            .inc_by(short_ids.len() as u64);
        tracing::debug!(
            peer = %self.peer_id,
            count = short_ids.len(),
            "requesting unknown transactions from relay"
        );
        self.relay
            .send(RelayMessage::GetTxs(GetTxsMessage { short_ids }));
    }

    fn on_tx_assign(&mut self, msg: TxAssignMessage) -> Handled {
        self.services
            .transactions
            .assign_short_id(msg.tx_hash, msg.short_id);
        self.services.recovery.check_missing_sid(msg.short_id);
        self.retry_recovered();
        Handled::Processed
    }

    fn on_tx(&mut self, msg: TxMessage) -> Handled {
        let computed = hash_transaction(&msg.contents);
        if computed != msg.tx_hash {
            self.services.metrics.hash_mismatches.inc();
            tracing::warn!(
                peer = %self.peer_id,
                claimed = %msg.tx_hash,
                computed = %computed,
                "transaction hash mismatch, dropped"
            );
            return Handled::Dropped;
        }

        self.services.metrics.transactions_received.inc();
        let forward = self
            .services
            .node
            .is_active()
            .then(|| self.services.codec.encode_transaction(&msg.contents));

        self.services
            .transactions
            .store_content(msg.tx_hash, msg.contents);
        self.services.recovery.check_missing_tx_hash(msg.tx_hash);
        self.retry_recovered();

        if let Some(bytes) = forward {
            self.services.node.send_to_node(bytes);
        }
        Handled::Processed
    }

    fn on_txs(&mut self, msg: TxsMessage) -> Handled {
        tracing::debug!(
            peer = %self.peer_id,
            count = msg.txs.len(),
            "bulk transactions received"
        );
        let transactions = &self.services.transactions;
        let recovery = &self.services.recovery;
        for tx in msg.txs {
            transactions.assign_if_unassigned(tx.tx_hash, tx.short_id);
            recovery.check_missing_sid(tx.short_id);
            transactions.store_content_if_absent(tx.tx_hash, tx.contents);
            recovery.check_missing_tx_hash(tx.tx_hash);
            self.services.metrics.transactions_received.inc();
        }
        self.retry_recovered();
        Handled::Processed
    }

    fn on_get_txs(&mut self, msg: GetTxsMessage) -> Handled {
        let requested = msg.short_ids.len();
        let txs: Vec<TxDetails> = msg
            .short_ids
            .into_iter()
            .filter_map(|short_id| {
                self.services
                    .transactions
                    .resolve(short_id)
                    .map(|(tx_hash, contents)| TxDetails {
                        short_id,
                        tx_hash,
                        contents,
                    })
            })
            .collect();
        tracing::debug!(
            peer = %self.peer_id,
            requested,
            found = txs.len(),
            "answering gettxs"
        );
        if !txs.is_empty() {
            self.relay.send(RelayMessage::Txs(TxsMessage { txs }));
        }
        Handled::Processed
    }

    /// Run every recovered block through the broadcast path again.
    ///
    /// A block that still has gaps (its short IDs resolved to hashes whose
    /// bodies never arrived) is parked again under its first registration
    /// time and re-requested.
    ///
    /// Loops until the queue stays empty: parking a block can resolve it
    /// again when another session filled the gap in the meantime.
    fn retry_recovered(&mut self) {
        let mut retried = false;
        loop {
            let recovered = self.services.recovery.drain_recovered();
            if recovered.is_empty() {
                break;
            }
            retried = true;
            tracing::debug!(count = recovered.len(), "retrying recovered blocks");
            for block in recovered {
                let span = block_recovery_span(&block.message.block_hash);
                let _enter = span.enter();
                self.process_broadcast(block.message, Some(block.registered_at));
            }
        }
        if retried {
            self.services.update_gauges();
        }
    }
}

impl MessageHandler for RelaySession {
    fn handle(&mut self, message: RelayMessage) -> Result<Handled, SessionError> {
        if self.state == SessionState::Closed {
            return Err(SessionError::Closed);
        }
        let is_handshake = matches!(message, RelayMessage::Hello(_) | RelayMessage::Ack);
        if !is_handshake && self.state != SessionState::Established {
            let msg_type = message.message_type();
            tracing::warn!(
                peer = %self.peer_id,
                msg_type = %msg_type,
                state = %self.state,
                "message before handshake completed"
            );
            self.close();
            return Err(SessionError::NotEstablished(msg_type));
        }

        let handled = match message {
            RelayMessage::Hello(msg) => self.on_hello(msg)?,
            RelayMessage::Ack => self.on_ack(),
            RelayMessage::Broadcast(msg) => self.on_broadcast(msg),
            RelayMessage::TxAssign(msg) => self.on_tx_assign(msg),
            RelayMessage::Tx(msg) => self.on_tx(msg),
            RelayMessage::Txs(msg) => self.on_txs(msg),
            RelayMessage::GetTxs(msg) => self.on_get_txs(msg),
        };
        Ok(handled)
    }

    fn state(&self) -> SessionState {
        self.state
    }

    fn close(&mut self) {
        if self.state != SessionState::Closed {
            self.state = SessionState::Closed;
            tracing::debug!(peer = %self.peer_id, "relay session closed");
        }
    }

    fn peer_id(&self) -> &str {
        &self.peer_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::metrics::GatewayMetrics;
    use relaygate_chain::btc::network::REGTEST_MAGIC;
    use relaygate_chain::BtcBlockCodec;
    use relaygate_nullables::{NullClock, NullNodeSink, NullRelay};
    use relaygate_protocol::ProtocolError;
    use relaygate_types::NetworkNum;

    fn session() -> (RelaySession, Arc<NullRelay>) {
        let relay = Arc::new(NullRelay::new());
        let services = NetworkServices::from_config(
            &GatewayConfig::default(),
            Arc::new(BtcBlockCodec::new(REGTEST_MAGIC)),
            Arc::new(NullNodeSink::new()),
            Arc::new(NullClock::new(1_000)),
            Arc::new(GatewayMetrics::new().unwrap()),
        );
        let session = RelaySession::new("relay-1", relay.clone(), services);
        (session, relay)
    }

    fn relay_hello(network: NetworkNum) -> RelayMessage {
        RelayMessage::Hello(hello(99, network))
    }

    #[test]
    fn construction_sends_hello_and_waits_for_ack() {
        let (mut session, relay) = session();
        assert_eq!(session.state(), SessionState::Handshaking);
        assert!(matches!(relay.sent().as_slice(), [RelayMessage::Hello(_)]));

        session.handle(RelayMessage::Ack).unwrap();
        assert_eq!(session.state(), SessionState::Established);
    }

    #[test]
    fn relay_hello_is_acked() {
        let (mut session, relay) = session();
        relay.take();
        session.handle(relay_hello(NetworkNum::DEFAULT)).unwrap();
        assert_eq!(relay.sent(), vec![RelayMessage::Ack]);
        assert_eq!(session.state(), SessionState::Handshaking);
    }

    #[test]
    fn foreign_network_hello_is_fatal() {
        let (mut session, _) = session();
        let err = session.handle(relay_hello(NetworkNum::new(42))).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Protocol(ProtocolError::WrongNetwork { .. })
        ));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn application_message_before_ack_is_fatal() {
        let (mut session, _) = session();
        let err = session
            .handle(RelayMessage::GetTxs(GetTxsMessage::default()))
            .unwrap_err();
        assert!(matches!(err, SessionError::NotEstablished(_)));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn closed_session_rejects_everything() {
        let (mut session, _) = session();
        session.close();
        assert!(matches!(
            session.handle(RelayMessage::Ack),
            Err(SessionError::Closed)
        ));
    }

    #[test]
    fn duplicate_ack_is_ignored() {
        let (mut session, _) = session();
        session.handle(RelayMessage::Ack).unwrap();
        assert_eq!(session.handle(RelayMessage::Ack).unwrap(), Handled::Processed);
        assert_eq!(session.state(), SessionState::Established);
    }

    #[test]
    fn get_txs_answered_with_known_transactions() {
        let (mut session, relay) = session();
        session.handle(RelayMessage::Ack).unwrap();
        let contents = b"known tx".to_vec();
        let tx_hash = hash_transaction(&contents);
        let services = session.services().clone();
        services
            .transactions
            .assign_short_id(tx_hash, ShortId::new(3));
        services.transactions.store_content(tx_hash, contents.clone());
        relay.take();

        session
            .handle(RelayMessage::GetTxs(GetTxsMessage {
                short_ids: vec![ShortId::new(3), ShortId::new(4)],
            }))
            .unwrap();

        assert_eq!(
            relay.sent(),
            vec![RelayMessage::Txs(TxsMessage {
                txs: vec![TxDetails {
                    short_id: ShortId::new(3),
                    tx_hash,
                    contents,
                }]
            })]
        );
    }
}
