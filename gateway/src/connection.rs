//! Socket tasks behind relay sessions and the local node connection.
//!
//! Each relay connection runs two tasks: a read loop that decodes frames and
//! feeds them to the session in arrival order, and a writer that drains the
//! session's outbound channel. The node connection runs one task that writes
//! forwarded blocks and transactions and discards whatever the node sends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use relaygate_messages::RelayMessage;
use relaygate_protocol::codec::{self, LENGTH_PREFIX_LEN};
use relaygate_protocol::{NodeSink, ProtocolError, RelayOutbound};

use crate::error::GatewayError;
use crate::lossy::{DropSchedule, LossyRelaySession};
use crate::relay_session::RelaySession;
use crate::services::NetworkServices;
use crate::session::{MessageHandler, SessionState};
use crate::shutdown::ShutdownController;
use crate::tracing_spans::relay_recv_span;

/// Timeout for the initial TCP connection attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Queue depth of each outbound channel.
pub const OUTBOUND_CHANNEL_CAPACITY: usize = 4096;

const NODE_READ_BUFFER: usize = 64 * 1024;

/// Read one frame body. Returns `Ok(None)` when the peer closed the stream.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<Vec<u8>>, ProtocolError> {
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = codec::body_len(prefix)?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Spawn the read loop of one relay connection.
///
/// Frames are decoded and handed to `handler` one at a time. A decode error
/// or a fatal session error ends the loop; either way the session is closed
/// and its final state returned.
pub fn spawn_relay_read_loop<H, R>(
    mut handler: H,
    mut reader: R,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<SessionState>
where
    H: MessageHandler + 'static,
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let result = relay_read_loop(&mut handler, &mut reader, &mut shutdown).await;
        match &result {
            Ok(()) => {
                tracing::info!(peer = %handler.peer_id(), "relay connection closed");
            }
            Err(e) => {
                tracing::warn!(peer = %handler.peer_id(), error = %e, "relay connection closed with error");
            }
        }
        handler.close();
        handler.state()
    })
}

async fn relay_read_loop<H, R>(
    handler: &mut H,
    reader: &mut R,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<(), GatewayError>
where
    H: MessageHandler,
    R: AsyncRead + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = shutdown.recv() => {
                tracing::debug!(peer = %handler.peer_id(), "relay read loop shutting down");
                return Ok(());
            }
            frame = read_frame(reader) => frame?,
        };
        let Some(body) = frame else {
            return Ok(());
        };

        let message = codec::decode(&body)?;
        let span = relay_recv_span(handler.peer_id(), message.message_type().as_str());
        span.in_scope(|| handler.handle(message))?;
    }
}

/// [`RelayOutbound`] backed by a bounded channel drained by
/// [`spawn_frame_writer`].
#[derive(Clone)]
pub struct RelayChannel {
    tx: mpsc::Sender<RelayMessage>,
}

impl RelayChannel {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<RelayMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl RelayOutbound for RelayChannel {
    fn send(&self, message: RelayMessage) {
        if let Err(e) = self.tx.try_send(message) {
            tracing::warn!(error = %e, "relay outbound queue unavailable, message dropped");
        }
    }
}

/// Write a length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &[u8],
) -> std::io::Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await
}

/// Spawn the task that encodes and writes a relay connection's outbound
/// messages. Ends when every [`RelayChannel`] clone is dropped, on a write
/// error, or on shutdown.
pub fn spawn_frame_writer<W>(
    peer_id: String,
    mut rx: mpsc::Receiver<RelayMessage>,
    mut writer: W,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                _ = shutdown.recv() => break,
                message = rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            let frame = match codec::encode(&message) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(peer = %peer_id, error = %e, "cannot encode relay message");
                    continue;
                }
            };
            if let Err(e) = write_frame(&mut writer, &frame).await {
                tracing::warn!(peer = %peer_id, error = %e, "relay write failed");
                break;
            }
        }
        let _ = writer.shutdown().await;
        tracing::debug!(peer = %peer_id, "relay writer stopped");
    })
}

/// [`NodeSink`] backed by a bounded channel drained by [`spawn_node_link`].
pub struct NodeChannel {
    tx: mpsc::Sender<Vec<u8>>,
    active: Arc<AtomicBool>,
}

impl NodeChannel {
    /// A channel with no node attached yet.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let channel = Self {
            tx,
            active: Arc::new(AtomicBool::new(false)),
        };
        (channel, rx)
    }

    /// Flag the node link task raises while its connection is up.
    pub fn active_flag(&self) -> Arc<AtomicBool> {
        self.active.clone()
    }
}

impl NodeSink for NodeChannel {
    fn send_to_node(&self, bytes: Vec<u8>) {
        if !self.is_active() {
            tracing::debug!(len = bytes.len(), "no blockchain node connection, bytes dropped");
            return;
        }
        if let Err(e) = self.tx.try_send(bytes) {
            tracing::warn!(error = %e, "node outbound queue unavailable, bytes dropped");
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Spawn the task that owns the local node connection.
pub fn spawn_node_link<S>(
    addr: String,
    stream: S,
    mut rx: mpsc::Receiver<Vec<u8>>,
    active: Arc<AtomicBool>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    tokio::spawn(async move {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let mut buf = vec![0u8; NODE_READ_BUFFER];
        active.store(true, Ordering::SeqCst);
        tracing::info!(node = %addr, "connected to blockchain node");

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                bytes = rx.recv() => match bytes {
                    Some(bytes) => {
                        if let Err(e) = write_frame(&mut writer, &bytes).await {
                            tracing::warn!(node = %addr, error = %e, "node write failed");
                            break;
                        }
                    }
                    None => break,
                },
                read = reader.read(&mut buf) => match read {
                    Ok(0) => {
                        tracing::info!(node = %addr, "blockchain node closed the connection");
                        break;
                    }
                    Ok(n) => tracing::trace!(node = %addr, bytes = n, "node traffic ignored"),
                    Err(e) => {
                        tracing::warn!(node = %addr, error = %e, "node read failed");
                        break;
                    }
                },
            }
        }

        active.store(false, Ordering::SeqCst);
        tracing::debug!(node = %addr, "node link stopped");
    })
}

async fn connect(addr: &str) -> Result<TcpStream, GatewayError> {
    let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| GatewayError::Connect {
            addr: addr.to_string(),
            reason: "timed out".to_string(),
        })?
        .map_err(|e| GatewayError::Connect {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(peer = %addr, error = %e, "cannot set TCP_NODELAY");
    }
    Ok(stream)
}

/// Tasks of one open relay connection.
pub struct RelayLink {
    pub peer_id: String,
    /// Read loop; resolves to the session's final state.
    pub session: JoinHandle<SessionState>,
    pub writer: JoinHandle<()>,
}

/// Connect to a relay, open a session on it and spawn its tasks.
///
/// With a drop schedule the session is wrapped in a [`LossyRelaySession`].
pub async fn connect_relay(
    addr: &str,
    services: NetworkServices,
    drop_schedule: Option<DropSchedule>,
    shutdown: &ShutdownController,
) -> Result<RelayLink, GatewayError> {
    let stream = connect(addr).await?;
    let (read_half, write_half) = stream.into_split();
    let peer_id = addr.to_string();

    let (channel, rx) = RelayChannel::new(OUTBOUND_CHANNEL_CAPACITY);
    let writer = spawn_frame_writer(peer_id.clone(), rx, write_half, shutdown.subscribe());

    let metrics = services.metrics.clone();
    let session = RelaySession::new(peer_id.clone(), Arc::new(channel), services);
    let read_loop = match drop_schedule {
        Some(schedule) => spawn_relay_read_loop(
            LossyRelaySession::new(session, schedule).with_metrics(metrics.clone()),
            read_half,
            shutdown.subscribe(),
        ),
        None => spawn_relay_read_loop(session, read_half, shutdown.subscribe()),
    };

    metrics.relay_connections.inc();
    let session = tokio::spawn(async move {
        let state = match read_loop.await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(error = %e, "relay read loop panicked");
                SessionState::Closed
            }
        };
        metrics.relay_connections.dec();
        state
    });

    tracing::info!(peer = %peer_id, "connected to relay");
    Ok(RelayLink {
        peer_id,
        session,
        writer,
    })
}

/// Connect to the local blockchain node and spawn the link task for `channel`.
pub async fn connect_node(
    addr: &str,
    channel: &NodeChannel,
    rx: mpsc::Receiver<Vec<u8>>,
    shutdown: &ShutdownController,
) -> Result<JoinHandle<()>, GatewayError> {
    let stream = connect(addr).await?;
    Ok(spawn_node_link(
        addr.to_string(),
        stream,
        rx,
        channel.active_flag(),
        shutdown.subscribe(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::metrics::GatewayMetrics;
    use relaygate_chain::btc::network::REGTEST_MAGIC;
    use relaygate_chain::BtcBlockCodec;
    use relaygate_crypto::hash_transaction;
    use relaygate_messages::TxMessage;
    use relaygate_nullables::{NullClock, NullNodeSink, NullRelay};
    use relaygate_types::NetworkNum;

    fn services() -> NetworkServices {
        NetworkServices::from_config(
            &GatewayConfig::default(),
            Arc::new(BtcBlockCodec::new(REGTEST_MAGIC)),
            Arc::new(NullNodeSink::new()),
            Arc::new(NullClock::new(1_000)),
            Arc::new(GatewayMetrics::new().unwrap()),
        )
    }

    #[tokio::test]
    async fn read_loop_dispatches_in_order_until_eof() {
        let services = services();
        let session = RelaySession::new("relay", Arc::new(NullRelay::new()), services.clone());
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        let shutdown = ShutdownController::new();
        let handle = spawn_relay_read_loop(session, server, shutdown.subscribe());

        let contents = b"a transaction".to_vec();
        let tx_hash = hash_transaction(&contents);
        client
            .write_all(&codec::encode(&RelayMessage::Ack).unwrap())
            .await
            .unwrap();
        let tx = RelayMessage::Tx(TxMessage {
            network_num: NetworkNum::DEFAULT,
            tx_hash,
            contents: contents.clone(),
        });
        client.write_all(&codec::encode(&tx).unwrap()).await.unwrap();
        drop(client);

        assert_eq!(handle.await.unwrap(), SessionState::Closed);
        assert_eq!(services.transactions.get_content(&tx_hash), Some(contents));
    }

    #[tokio::test]
    async fn unknown_tag_closes_the_session() {
        let session = RelaySession::new("relay", Arc::new(NullRelay::new()), services());
        let (mut client, server) = tokio::io::duplex(1024);
        let shutdown = ShutdownController::new();
        let handle = spawn_relay_read_loop(session, server, shutdown.subscribe());

        client.write_all(&[0, 0, 0, 1, 0xEE]).await.unwrap();

        assert_eq!(handle.await.unwrap(), SessionState::Closed);
        drop(client);
    }

    #[tokio::test]
    async fn read_loop_stops_on_shutdown() {
        let session = RelaySession::new("relay", Arc::new(NullRelay::new()), services());
        let (_client, server) = tokio::io::duplex(1024);
        let shutdown = ShutdownController::new();
        let handle = spawn_relay_read_loop(session, server, shutdown.subscribe());

        shutdown.shutdown();
        assert_eq!(handle.await.unwrap(), SessionState::Closed);
    }

    #[tokio::test]
    async fn frame_writer_encodes_queued_messages() {
        let (channel, rx) = RelayChannel::new(8);
        let (mut client, server) = tokio::io::duplex(1024);
        let shutdown = ShutdownController::new();
        let writer = spawn_frame_writer("relay".to_string(), rx, server, shutdown.subscribe());

        channel.send(RelayMessage::Ack);
        drop(channel);

        let body = read_frame(&mut client).await.unwrap().unwrap();
        assert_eq!(codec::decode(&body).unwrap(), RelayMessage::Ack);
        writer.await.unwrap();
        assert_eq!(read_frame(&mut client).await.unwrap(), None);
    }

    #[tokio::test]
    async fn node_link_forwards_bytes_and_tracks_activity() {
        let (channel, rx) = NodeChannel::new(8);
        assert!(!channel.is_active());

        let (mut node, gateway_side) = tokio::io::duplex(1024);
        let shutdown = ShutdownController::new();
        let link = spawn_node_link(
            "node".to_string(),
            gateway_side,
            rx,
            channel.active_flag(),
            shutdown.subscribe(),
        );

        while !channel.is_active() {
            tokio::task::yield_now().await;
        }
        channel.send_to_node(b"block bytes".to_vec());
        let mut buf = [0u8; 11];
        node.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"block bytes");

        drop(node);
        link.await.unwrap();
        assert!(!channel.is_active());
    }

    #[tokio::test]
    async fn inactive_node_channel_drops_bytes() {
        let (channel, mut rx) = NodeChannel::new(8);
        channel.send_to_node(vec![1, 2, 3]);
        assert!(rx.try_recv().is_err());
    }
}
