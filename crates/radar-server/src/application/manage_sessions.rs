//! Session table: the server's in-memory index of connected simulators.
//!
//! Each accepted connection becomes a [`PlaneSession`] keyed by its
//! connection id.  Radar returns only remember that id, so looking a session
//! up here is how a return is traced back to a live sender.  A miss is the
//! normal answer once the sender has disconnected.
//!
//! # Session lifecycle (for beginners)
//!
//! ```text
//! accepted ──► inserted ──► (handshake, packets…) ──► Closed ──► removed
//! ```
//!
//! The session manager inserts a session as soon as the TCP connection is
//! accepted, so a session that is still handshaking is already visible here.
//! Removal happens when its connection reaches `Closed`, whoever closed it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::SystemTime;

use radar_core::pump::LinkError;
use radar_core::sync::lock;
use radar_core::{Connection, ConnectionState, Packet};

use super::radar_returns::SessionId;

/// One connected simulator.
#[derive(Debug, Clone)]
pub struct PlaneSession {
    connection: Connection,
    accepted_at: SystemTime,
}

impl PlaneSession {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            accepted_at: SystemTime::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.connection.id()
    }

    /// Transport address of the simulator.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.connection.peer()
    }

    pub fn accepted_at(&self) -> SystemTime {
        self.accepted_at
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Queues a packet for this simulator.
    ///
    /// # Errors
    ///
    /// [`LinkError::Closed`] once the session is closing.
    pub fn send(&self, packet: Packet) -> Result<(), LinkError> {
        self.connection.send(packet)
    }
}

/// Live sessions keyed by id.  Every operation holds the table lock only for
/// the map access itself.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: Mutex<HashMap<SessionId, PlaneSession>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: PlaneSession) {
        lock(&self.sessions).insert(session.id(), session);
    }

    pub fn remove(&self, id: SessionId) -> Option<PlaneSession> {
        lock(&self.sessions).remove(&id)
    }

    /// Looks up a session.  `None` if it has already been torn down.
    pub fn get(&self, id: SessionId) -> Option<PlaneSession> {
        lock(&self.sessions).get(&id).cloned()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        lock(&self.sessions).contains_key(&id)
    }

    /// Snapshot of all sessions.  Order is unspecified.
    pub fn all(&self) -> Vec<PlaneSession> {
        lock(&self.sessions).values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.sessions).is_empty()
    }

    /// Removes and returns every session.
    pub fn drain(&self) -> Vec<PlaneSession> {
        lock(&self.sessions).drain().map(|(_, s)| s).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radar_core::PumpOptions;
    use radar_core::pump::QueueInbound;
    use std::sync::Arc;

    fn idle_session() -> PlaneSession {
        let handshake = std::future::pending::<Result<tokio::io::DuplexStream, LinkError>>();
        PlaneSession::new(Connection::spawn(None, handshake, Arc::new(QueueInbound), PumpOptions::default()))
    }

    #[tokio::test]
    async fn test_insert_then_get_returns_same_session() {
        // Arrange
        let table = SessionTable::new();
        let session = idle_session();
        let id = session.id();

        // Act
        table.insert(session);

        // Assert
        assert_eq!(table.get(id).map(|s| s.id()), Some(id));
        assert_eq!(table.len(), 1);
        table.get(id).unwrap().connection().close();
    }

    #[tokio::test]
    async fn test_get_after_remove_is_none() {
        let table = SessionTable::new();
        let session = idle_session();
        let id = session.id();
        table.insert(session);

        let removed = table.remove(id);

        assert!(removed.is_some());
        assert!(table.get(id).is_none());
        assert!(!table.contains(id));
        removed.unwrap().connection().close();
    }

    #[tokio::test]
    async fn test_drain_empties_table() {
        let table = SessionTable::new();
        table.insert(idle_session());
        table.insert(idle_session());

        let drained = table.drain();

        assert_eq!(drained.len(), 2);
        assert!(table.is_empty());
        for s in drained {
            s.connection().close();
        }
    }
}
