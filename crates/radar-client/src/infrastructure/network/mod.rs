//! Network infrastructure for the radar client.
//!
//! [`RadarClient`] is the simulator-side driver: it owns at most one
//! pumped TLS connection to a radar server.  Telemetry goes out through its
//! outbound queue; anything the server sends lands on its inbound queue for
//! [`RadarClient::recv`].
//!
//! Architecture:
//! - `connect` resolves the host, opens TCP and runs the TLS handshake inside
//!   the connection's `Handshaking` state, so the whole dial is bounded by
//!   the handshake timeout.
//! - While a connection is handshaking or open, a second `connect` is refused.
//! - Once the connection has closed (either side), `connect` may be called
//!   again.

use std::sync::{Arc, Mutex};

use radar_core::pump::QueueInbound;
use radar_core::sync::lock;
use radar_core::trust::{client_tls_config, tls};
use radar_core::{Connection, ConnectionState, Identity, LinkError, Packet, PositionUpdate, ProtocolError, PumpOptions, TrustAnchor, TrustError};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::{client::TlsStream, TlsConnector};
use tracing::{debug, info};

use crate::application::telemetry::{OutboundPublisher, PlaneTelemetry};

/// Errors that can occur in the client driver.
#[derive(Debug, Error)]
pub enum ClientError {
    /// `connect` was called while a connection is handshaking or open.
    #[error("already connected")]
    AlreadyConnected,

    /// An operation needed a connection and there is none.
    #[error("not connected")]
    NotConnected,

    /// The name to present for TLS is not a valid DNS name or IP address.
    #[error("invalid server name {0:?}")]
    InvalidServerName(String),

    #[error("TLS setup failed: {0}")]
    Trust(#[from] TrustError),

    /// The dial, handshake or connection failed.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// A telemetry sample could not be encoded.
    #[error("invalid telemetry: {0}")]
    Telemetry(#[from] ProtocolError),
}

/// Configuration for the client driver.
#[derive(Debug, Clone, Default)]
pub struct ClientSettings {
    /// Name sent for SNI.  Defaults to the host passed to `connect`.
    pub server_name: Option<String>,
    pub pump: PumpOptions,
}

/// Single-connection client driver.
pub struct RadarClient {
    settings: ClientSettings,
    connector: TlsConnector,
    connection: Mutex<Option<Connection>>,
}

impl RadarClient {
    /// Creates a disconnected driver.
    ///
    /// # Errors
    ///
    /// [`ClientError::Trust`] if the identity cannot be used for TLS.
    pub fn new(settings: ClientSettings, identity: &Identity, anchor: Arc<TrustAnchor>) -> Result<Self, ClientError> {
        let connector = TlsConnector::from(client_tls_config(identity, anchor)?);
        Ok(Self {
            settings,
            connector,
            connection: Mutex::new(None),
        })
    }

    /// Connects to `host:port` and waits for the handshake to finish.
    ///
    /// `host` may be a DNS name or an IP literal.  Every resolved address is
    /// tried in order until one accepts the TCP connection.
    ///
    /// # Errors
    ///
    /// - [`ClientError::AlreadyConnected`] if a connection is handshaking or open.
    /// - [`ClientError::InvalidServerName`] if no usable TLS server name exists.
    /// - [`ClientError::Link`] for resolution, TCP, TLS or timeout failures;
    ///   [`LinkError::Authentication`] when the server's certificate does not
    ///   chain to the pinned anchor.
    pub async fn connect(&self, host: &str, port: u16) -> Result<Connection, ClientError> {
        let name = self.settings.server_name.clone().unwrap_or_else(|| host.to_owned());
        let server_name = ServerName::try_from(name.clone()).map_err(|_| ClientError::InvalidServerName(name))?;

        let connection = {
            let mut slot = lock(&self.connection);
            if slot.as_ref().is_some_and(|c| !c.is_closed()) {
                return Err(ClientError::AlreadyConnected);
            }
            let handshake = dial(self.connector.clone(), host.to_owned(), port, server_name);
            let connection = Connection::spawn(None, handshake, Arc::new(QueueInbound), self.settings.pump);
            *slot = Some(connection.clone());
            connection
        };

        connection.opened().await?;
        info!(connection = %connection.id(), "connected to radar server {host}:{port}");
        Ok(connection)
    }

    /// The current connection, if one is handshaking or open.
    pub fn connection(&self) -> Option<Connection> {
        lock(&self.connection).as_ref().filter(|c| !c.is_closed()).cloned()
    }

    pub fn is_connected(&self) -> bool {
        self.connection().is_some_and(|c| c.state() == ConnectionState::Open)
    }

    /// Queues a packet on the outbound queue.  Never blocks; a full queue
    /// drops its oldest packet.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotConnected`] without a connection,
    /// [`ClientError::Link`] if the connection is closing.
    pub fn send(&self, packet: Packet) -> Result<(), ClientError> {
        let connection = self.connection().ok_or(ClientError::NotConnected)?;
        connection.send(packet)?;
        Ok(())
    }

    /// Producer callback: queues the position update for `telemetry`.
    ///
    /// # Errors
    ///
    /// [`ClientError::Telemetry`] if the sample cannot be encoded, otherwise
    /// as [`RadarClient::send`].
    pub fn on_telemetry(&self, telemetry: &PlaneTelemetry) -> Result<(), ClientError> {
        let update = telemetry.to_position_update()?;
        self.send(Packet::PositionUpdate(update))
    }

    /// Waits for the next packet from the server.
    ///
    /// Returns `None` without a connection, or once the connection has closed
    /// and its inbound queue is drained.
    pub async fn recv(&self) -> Option<Packet> {
        let connection = lock(&self.connection).clone()?;
        connection.recv().await
    }

    /// Closes the connection and waits until it has shut down.  A no-op when
    /// not connected.
    pub async fn disconnect(&self) {
        let connection = lock(&self.connection).take();
        if let Some(connection) = connection {
            connection.close();
            connection.closed().await;
            info!(connection = %connection.id(), "disconnected from radar server");
        }
    }
}

impl OutboundPublisher for RadarClient {
    fn publish(&self, update: PositionUpdate) -> Result<(), LinkError> {
        match self.send(Packet::PositionUpdate(update)) {
            Ok(()) => Ok(()),
            Err(ClientError::Link(e)) => Err(e),
            Err(_) => Err(LinkError::Closed),
        }
    }
}

/// Resolves `host`, connects TCP to the first address that answers and runs
/// the client side of the TLS handshake.
async fn dial(
    connector: TlsConnector,
    host: String,
    port: u16,
    server_name: ServerName<'static>,
) -> Result<TlsStream<TcpStream>, LinkError> {
    let addrs = tokio::net::lookup_host((host.as_str(), port)).await?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                debug!("TCP connected to {addr}");
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("set_nodelay failed for {addr}: {e}");
                }
                return tls::connect(&connector, server_name, stream).await;
            }
            Err(e) => {
                debug!("TCP connect to {addr} failed: {e}");
                last_err = Some(e);
            }
        }
    }

    Err(LinkError::Transport(last_err.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, format!("{host} resolved to no addresses"))
    })))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
