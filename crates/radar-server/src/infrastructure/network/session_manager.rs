//! Wraps authenticated streams as plane sessions and tracks their lifetime.
//!
//! The manager is transport-agnostic: it takes any handshake future that
//! yields a byte stream.  [`super::server::RadarServer`] feeds it TLS accepts;
//! tests feed it in-memory duplex pipes.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use radar_core::{Connection, LinkError, PumpOptions};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::application::dispatch::RadarDispatch;
use crate::application::manage_sessions::{PlaneSession, SessionTable};
use crate::application::radar_returns::{RadarReturn, RadarReturnStore};

/// Owns the session table and installs the dispatch policy on every session.
#[derive(Debug, Clone)]
pub struct SessionManager {
    sessions: Arc<SessionTable>,
    dispatch: Arc<RadarDispatch>,
    options: PumpOptions,
}

impl SessionManager {
    pub fn new(store: Arc<RadarReturnStore>, options: PumpOptions) -> Self {
        Self {
            sessions: Arc::new(SessionTable::new()),
            dispatch: Arc::new(RadarDispatch::new(store, options.registry)),
            options,
        }
    }

    pub fn store(&self) -> &Arc<RadarReturnStore> {
        self.dispatch.store()
    }

    pub fn sessions(&self) -> &Arc<SessionTable> {
        &self.sessions
    }

    /// Starts a session on `handshake` and adds it to the table.
    ///
    /// The session is removed again when its connection reaches `Closed`,
    /// whether the peer hung up, the handshake failed or the dispatch policy
    /// forced it off.
    pub fn open_session<H, S>(&self, peer: Option<SocketAddr>, handshake: H) -> PlaneSession
    where
        H: Future<Output = Result<S, LinkError>> + Send + 'static,
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let connection = Connection::spawn(peer, handshake, self.dispatch.clone(), self.options);
        let session = PlaneSession::new(connection.clone());
        self.sessions.insert(session.clone());
        debug!(session = %session.id(), peer = ?peer, "session registered");

        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            connection.closed().await;
            if sessions.remove(connection.id()).is_some() {
                info!(session = %connection.id(), peer = ?connection.peer(), "session removed");
            }
        });

        session
    }

    /// The live session a return came from, or `None` once it has closed.
    pub fn resolve_origin(&self, radar_return: &RadarReturn) -> Option<PlaneSession> {
        self.sessions
            .get(radar_return.origin)
            .filter(|s| !s.connection().is_closed())
    }

    /// Closes every session, waits for each to reach `Closed`, then clears
    /// the table.
    pub async fn close_all(&self) {
        let sessions = self.sessions.all();
        if sessions.is_empty() {
            return;
        }
        info!(count = sessions.len(), "closing all sessions");

        for session in &sessions {
            session.connection().close();
        }
        for session in &sessions {
            session.connection().closed().await;
        }
        self.sessions.drain();
    }
}
