//! [`Connection`]: handle to one pumped duplex connection.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{DispatchError, LinkError};
use super::queue::{DropOldestQueue, QueueClosed};
use crate::protocol::codec::{read_packet, write_packet, StreamError};
use crate::protocol::registry::{Packet, PacketRegistry};
use crate::sync::lock;
use crate::trust::tls::classify_tls_error;

/// Capacity of each connection's inbound and outbound queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Upper bound on the `Handshaking` state.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Unique identifier of a connection for its whole lifetime.
pub type ConnectionId = Uuid;

/// Lifecycle of a [`Connection`].  Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Handshaking,
    Open,
    Closing,
    Closed,
}

/// Tunables for a pumped connection.
#[derive(Debug, Clone, Copy)]
pub struct PumpOptions {
    pub queue_capacity: usize,
    pub handshake_timeout: Duration,
    /// How long the final TLS `close_notify` may take once both loops exit.
    pub shutdown_grace: Duration,
    pub registry: &'static PacketRegistry,
}

impl Default for PumpOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            registry: PacketRegistry::standard(),
        }
    }
}

/// Receives every packet decoded by a connection's read loop, in wire order.
///
/// The read loop awaits each call before decoding the next frame, so a slow
/// handler slows only its own connection.
#[async_trait]
pub trait PacketHandler: Send + Sync {
    /// Handles one packet.  Returning an error logs it; the connection stays up.
    async fn on_packet(&self, connection: &Connection, packet: Packet) -> Result<(), DispatchError>;
}

/// Handler that places every packet on the connection's inbound queue for
/// [`Connection::recv`].
#[derive(Debug, Default, Clone, Copy)]
pub struct QueueInbound;

#[async_trait]
impl PacketHandler for QueueInbound {
    async fn on_packet(&self, connection: &Connection, packet: Packet) -> Result<(), DispatchError> {
        connection.deliver_inbound(packet);
        Ok(())
    }
}

struct Shared {
    id: ConnectionId,
    peer: Option<SocketAddr>,
    registry: &'static PacketRegistry,
    state: watch::Sender<ConnectionState>,
    inbound: DropOldestQueue<Packet>,
    outbound: DropOldestQueue<Packet>,
    cancel: CancellationToken,
    opened: AtomicBool,
    failure: Mutex<Option<LinkError>>,
    shutdown_grace: Duration,
}

/// Cloneable handle to a pumped connection.
///
/// All clones refer to the same connection; the pump tasks hold their own
/// clone, so dropping every external handle does not stop the connection.
/// Call [`close`](Connection::close) for that.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.shared.id)
            .field("peer", &self.shared.peer)
            .field("state", &self.state())
            .finish()
    }
}

impl Connection {
    /// Starts a connection pump on the current Tokio runtime.
    ///
    /// `handshake` yields the authenticated stream (for example a TLS accept
    /// or connect).  It is bounded by `options.handshake_timeout` and is
    /// abandoned if the connection is closed first.
    pub fn spawn<H, S>(
        peer: Option<SocketAddr>,
        handshake: H,
        handler: Arc<dyn PacketHandler>,
        options: PumpOptions,
    ) -> Self
    where
        H: Future<Output = Result<S, LinkError>> + Send + 'static,
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (state, _) = watch::channel(ConnectionState::Handshaking);
        let connection = Connection {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                peer,
                registry: options.registry,
                state,
                inbound: DropOldestQueue::new(options.queue_capacity),
                outbound: DropOldestQueue::new(options.queue_capacity),
                cancel: CancellationToken::new(),
                opened: AtomicBool::new(false),
                failure: Mutex::new(None),
                shutdown_grace: options.shutdown_grace,
            }),
        };

        debug!(connection = %connection.id(), peer = ?peer, "connection handshaking");
        let pump = connection.clone();
        tokio::spawn(async move { pump.run(handshake, handler, options.handshake_timeout).await });
        connection
    }

    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    /// Remote transport address, if known.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.shared.peer
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    /// Queues `packet` for the write loop.
    ///
    /// Never blocks: a full queue evicts its oldest packet.  Packets sent
    /// while `Handshaking` are written once the connection opens.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Closed`] once the connection is closing.
    pub fn send(&self, packet: Packet) -> Result<(), LinkError> {
        match self.shared.outbound.push(packet) {
            Ok(Some(evicted)) => {
                debug!(connection = %self.shared.id, kind = %evicted.kind(), "outbound queue full; dropped oldest packet");
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(QueueClosed(_)) => Err(LinkError::Closed),
        }
    }

    /// Waits for the next inbound packet delivered by [`QueueInbound`].
    ///
    /// Returns `None` once the connection is closing and the queue is drained.
    pub async fn recv(&self) -> Option<Packet> {
        self.shared.inbound.pop().await
    }

    /// Takes the next inbound packet without waiting.
    pub fn try_recv(&self) -> Option<Packet> {
        self.shared.inbound.try_pop()
    }

    /// Starts closing the connection and returns immediately.  Idempotent.
    ///
    /// Both loops stop promptly; packets still queued for writing are
    /// discarded.  Await [`closed`](Connection::closed) to know when the
    /// stream has been shut down.
    pub fn close(&self) {
        if !self.shared.cancel.is_cancelled() {
            info!(connection = %self.shared.id, "closing connection");
        }
        self.begin_close();
    }

    /// Resolves once the connection has reached [`ConnectionState::Closed`].
    pub async fn closed(&self) {
        let mut rx = self.shared.state.subscribe();
        let _ = rx.wait_for(|s| *s == ConnectionState::Closed).await;
    }

    /// Resolves once the handshake has finished.
    ///
    /// # Errors
    ///
    /// Returns the handshake failure (authentication, timeout, transport) if
    /// the connection never reached `Open`.  The error is handed out once;
    /// later callers see [`LinkError::Closed`].
    pub async fn opened(&self) -> Result<(), LinkError> {
        let mut rx = self.shared.state.subscribe();
        let _ = rx.wait_for(|s| *s != ConnectionState::Handshaking).await;
        if self.shared.opened.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(self.take_error().unwrap_or(LinkError::Closed))
        }
    }

    /// Takes the error that ended this connection, if one was recorded.
    pub fn take_error(&self) -> Option<LinkError> {
        lock(&self.shared.failure).take()
    }

    pub(crate) fn deliver_inbound(&self, packet: Packet) {
        if let Ok(Some(evicted)) = self.shared.inbound.push(packet) {
            debug!(connection = %self.shared.id, kind = %evicted.kind(), "inbound queue full; dropped oldest packet");
        }
    }

    // ── Pump internals ───────────────────────────────────────────────────────

    async fn run<H, S>(self, handshake: H, handler: Arc<dyn PacketHandler>, timeout: Duration)
    where
        H: Future<Output = Result<S, LinkError>> + Send,
        S: AsyncRead + AsyncWrite + Send + Unpin,
    {
        let outcome = tokio::select! {
            _ = self.shared.cancel.cancelled() => Err(LinkError::Closed),
            result = tokio::time::timeout(timeout, handshake) => {
                result.unwrap_or(Err(LinkError::HandshakeTimeout(timeout)))
            }
        };

        let stream = match outcome {
            Ok(stream) => stream,
            Err(e) => {
                warn!(connection = %self.shared.id, peer = ?self.shared.peer, "handshake failed: {e}");
                self.record_failure(e);
                self.finish();
                return;
            }
        };

        let shared = &self.shared;
        let opened = shared.state.send_if_modified(|s| {
            if *s == ConnectionState::Handshaking {
                shared.opened.store(true, Ordering::Release);
                *s = ConnectionState::Open;
                true
            } else {
                false
            }
        });
        if opened {
            info!(connection = %shared.id, peer = ?shared.peer, "connection open");
        }

        let (reader, writer) = tokio::io::split(stream);
        let (reader, writer) = tokio::join!(self.read_loop(reader, handler.as_ref()), self.write_loop(writer));

        let mut stream = reader.unsplit(writer);
        if tokio::time::timeout(shared.shutdown_grace, stream.shutdown()).await.is_err() {
            debug!(connection = %shared.id, "stream shutdown timed out");
        }
        drop(stream);
        self.finish();
    }

    async fn read_loop<R>(&self, mut reader: R, handler: &dyn PacketHandler) -> R
    where
        R: AsyncRead + Unpin + Send,
    {
        let shared = &self.shared;
        loop {
            let next = tokio::select! {
                biased;
                _ = shared.cancel.cancelled() => break,
                next = read_packet(shared.registry, &mut reader) => next,
            };

            match next {
                Ok(packet) => {
                    debug!(connection = %shared.id, kind = %packet.kind(), "packet received");
                    if let Err(e) = handler.on_packet(self, packet).await {
                        warn!(connection = %shared.id, "dispatch error: {e}");
                    }
                }
                Err(StreamError::Closed) => {
                    info!(connection = %shared.id, "peer closed the connection");
                    break;
                }
                Err(e) => {
                    let e = match e {
                        StreamError::Io(io) => classify_tls_error(io),
                        other => LinkError::from(other),
                    };
                    warn!(connection = %shared.id, "read loop stopped: {e}");
                    self.record_failure(e);
                    break;
                }
            }
        }
        self.begin_close();
        reader
    }

    async fn write_loop<W>(&self, mut writer: W) -> W
    where
        W: AsyncWrite + Unpin + Send,
    {
        let shared = &self.shared;
        loop {
            let packet = tokio::select! {
                biased;
                _ = shared.cancel.cancelled() => break,
                next = shared.outbound.pop() => match next {
                    Some(packet) => packet,
                    None => break,
                },
            };

            let written = tokio::select! {
                biased;
                _ = shared.cancel.cancelled() => break,
                written = write_packet(shared.registry, &mut writer, &packet) => written,
            };

            match written {
                Ok(()) => debug!(connection = %shared.id, kind = %packet.kind(), "packet sent"),
                Err(StreamError::Protocol(e)) => {
                    warn!(connection = %shared.id, "dropping unencodable packet: {e}");
                }
                Err(e) => {
                    let e = match e {
                        StreamError::Io(io) => classify_tls_error(io),
                        other => LinkError::from(other),
                    };
                    warn!(connection = %shared.id, "write loop stopped: {e}");
                    self.record_failure(e);
                    break;
                }
            }
        }
        self.begin_close();
        writer
    }

    /// Moves to `Closing`, stops both loops and closes both queues.
    fn begin_close(&self) {
        let shared = &self.shared;
        shared.state.send_if_modified(|s| match s {
            ConnectionState::Handshaking | ConnectionState::Open => {
                *s = ConnectionState::Closing;
                true
            }
            ConnectionState::Closing | ConnectionState::Closed => false,
        });
        shared.cancel.cancel();
        shared.outbound.close();
        shared.inbound.close();
    }

    fn finish(&self) {
        self.begin_close();
        self.shared.state.send_replace(ConnectionState::Closed);
        info!(connection = %self.shared.id, "connection closed");
    }

    fn record_failure(&self, err: LinkError) {
        let mut slot = lock(&self.shared.failure);
        if slot.is_none() {
            *slot = Some(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::LatLng;
    use crate::protocol::packets::{CallSign, PositionUpdate, Squawk};
    use tokio::io::duplex;

    fn update(n: u16) -> Packet {
        Packet::PositionUpdate(PositionUpdate {
            call_sign: CallSign::new("TEST").unwrap(),
            squawk: Squawk(n),
            frequency_khz: 121_500,
            coords: LatLng::new(0.0, 0.0),
            altitude_ft: 0.0,
            ground_speed_kt: 0.0,
            ground_track_deg: 0.0,
        })
    }

    #[tokio::test]
    async fn test_handshake_failure_goes_straight_to_closed() {
        // Arrange
        let handshake = async { Err::<tokio::io::DuplexStream, _>(LinkError::Authentication("bad cert".into())) };

        // Act
        let conn = Connection::spawn(None, handshake, Arc::new(QueueInbound), PumpOptions::default());
        let opened = conn.opened().await;
        conn.closed().await;

        // Assert
        assert!(matches!(opened, Err(LinkError::Authentication(_))));
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(matches!(conn.send(update(1)), Err(LinkError::Closed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_timeout_closes_connection() {
        let handshake = std::future::pending::<Result<tokio::io::DuplexStream, LinkError>>();
        let options = PumpOptions {
            handshake_timeout: Duration::from_millis(50),
            ..PumpOptions::default()
        };

        let conn = Connection::spawn(None, handshake, Arc::new(QueueInbound), options);

        assert!(matches!(conn.opened().await, Err(LinkError::HandshakeTimeout(_))));
        conn.closed().await;
    }

    #[tokio::test]
    async fn test_close_during_handshake_never_opens() {
        let handshake = std::future::pending::<Result<tokio::io::DuplexStream, LinkError>>();
        let conn = Connection::spawn(None, handshake, Arc::new(QueueInbound), PumpOptions::default());

        conn.close();
        conn.closed().await;

        assert!(matches!(conn.opened().await, Err(LinkError::Closed)));
    }

    #[tokio::test]
    async fn test_packets_flow_both_ways_over_duplex() {
        // Arrange
        let (a, b) = duplex(4096);
        let left = Connection::spawn(None, async move { Ok(a) }, Arc::new(QueueInbound), PumpOptions::default());
        let right = Connection::spawn(None, async move { Ok(b) }, Arc::new(QueueInbound), PumpOptions::default());
        left.opened().await.unwrap();
        right.opened().await.unwrap();

        // Act
        left.send(update(0x1200)).unwrap();
        right.send(update(0x4444)).unwrap();

        // Assert
        assert_eq!(right.recv().await, Some(update(0x1200)));
        assert_eq!(left.recv().await, Some(update(0x4444)));
    }

    #[tokio::test]
    async fn test_peer_close_reaches_closed_and_completes_inbound() {
        let (a, b) = duplex(4096);
        let left = Connection::spawn(None, async move { Ok(a) }, Arc::new(QueueInbound), PumpOptions::default());
        let right = Connection::spawn(None, async move { Ok(b) }, Arc::new(QueueInbound), PumpOptions::default());
        right.opened().await.unwrap();

        left.close();
        left.closed().await;
        right.closed().await;

        assert_eq!(right.recv().await, None);
        assert!(right.take_error().is_none());
    }

    #[tokio::test]
    async fn test_garbage_from_peer_is_framing_error() {
        use tokio::io::AsyncWriteExt;

        let (a, mut raw) = duplex(4096);
        let conn = Connection::spawn(None, async move { Ok(a) }, Arc::new(QueueInbound), PumpOptions::default());
        conn.opened().await.unwrap();

        raw.write_all(&[0xEF, 0xBE, 0x00, 0x00]).await.unwrap();
        conn.closed().await;

        assert!(matches!(
            conn.take_error(),
            Some(LinkError::Framing(crate::ProtocolError::UnknownTag { tag: 0xBEEF }))
        ));
    }
}
