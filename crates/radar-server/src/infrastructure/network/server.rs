//! TLS listener and accept loop.
//!
//! # How the server runs (for beginners)
//!
//! [`RadarServer::bind`] opens the listening socket and starts two background
//! tasks:
//!
//! 1. the **accept loop**, which takes each incoming TCP connection and hands
//!    it to the [`SessionManager`] together with a future that performs the
//!    TLS handshake.  The loop never waits for a handshake itself, so one
//!    slow simulator cannot hold up the next;
//! 2. the **sweeper**, which expires old radar returns on a timer.
//!
//! [`RadarServer::stop`] cancels the accept loop (dropping the listener so no
//! further connections are accepted), closes every session and waits for
//! them to finish, and finally stops the sweeper.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use radar_core::sync::lock;
use radar_core::trust::{server_tls_config, tls};
use radar_core::{Identity, PumpOptions, TrustAnchor, TrustError};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::session_manager::SessionManager;
use crate::application::manage_sessions::{PlaneSession, SessionTable};
use crate::application::radar_returns::{
    spawn_sweeper, RadarReturn, RadarReturnStore, DEFAULT_RETENTION, DEFAULT_SWEEP_INTERVAL,
};

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Startup failures.  Everything after a successful bind is contained to the
/// session it happens on.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS setup failed: {0}")]
    Trust(#[from] TrustError),
}

/// Runtime settings for [`RadarServer`].
#[derive(Debug, Clone, Copy)]
pub struct ServerSettings {
    pub bind_addr: SocketAddr,
    pub retention: Duration,
    pub sweep_interval: Duration,
    pub pump: PumpOptions,
}

impl ServerSettings {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            retention: DEFAULT_RETENTION,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            pump: PumpOptions::default(),
        }
    }
}

/// A running radar server.
pub struct RadarServer {
    local_addr: SocketAddr,
    manager: SessionManager,
    cancel: CancellationToken,
    sweeper_cancel: CancellationToken,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    sweeper_task: Mutex<Option<JoinHandle<()>>>,
}

impl RadarServer {
    /// Binds the listener and starts accepting simulators.
    ///
    /// # Errors
    ///
    /// [`ServerError::Trust`] if the identity cannot be used for TLS,
    /// [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind(
        settings: ServerSettings,
        identity: &Identity,
        anchor: Arc<TrustAnchor>,
    ) -> Result<Self, ServerError> {
        let acceptor = TlsAcceptor::from(server_tls_config(identity, anchor)?);

        let listener = TcpListener::bind(settings.bind_addr).await.map_err(|source| ServerError::Bind {
            addr: settings.bind_addr,
            source,
        })?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: settings.bind_addr,
            source,
        })?;
        info!("radar server listening on {local_addr}");

        let store = Arc::new(RadarReturnStore::new(settings.retention));
        let manager = SessionManager::new(Arc::clone(&store), settings.pump);

        let cancel = CancellationToken::new();
        let sweeper_cancel = CancellationToken::new();
        let sweeper_task = spawn_sweeper(store, settings.sweep_interval, sweeper_cancel.clone());
        let accept_task = tokio::spawn(accept_loop(listener, acceptor, manager.clone(), cancel.clone()));

        Ok(Self {
            local_addr,
            manager,
            cancel,
            sweeper_cancel,
            accept_task: Mutex::new(Some(accept_task)),
            sweeper_task: Mutex::new(Some(sweeper_task)),
        })
    }

    /// The bound address; useful when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Read access to the radar return store for display.
    pub fn store(&self) -> &Arc<RadarReturnStore> {
        self.manager.store()
    }

    pub fn sessions(&self) -> &Arc<SessionTable> {
        self.manager.sessions()
    }

    /// The live session a return came from, or `None` once it has closed.
    pub fn resolve_origin(&self, radar_return: &RadarReturn) -> Option<PlaneSession> {
        self.manager.resolve_origin(radar_return)
    }

    /// Stops accepting, drains every session, then stops the sweeper.
    /// Calling it again is a no-op.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let accept_task = lock(&self.accept_task).take();
        if let Some(task) = accept_task {
            if let Err(e) = task.await {
                error!("accept loop task failed: {e}");
            }
        }

        self.manager.close_all().await;

        self.sweeper_cancel.cancel();
        let sweeper_task = lock(&self.sweeper_task).take();
        if let Some(task) = sweeper_task {
            if let Err(e) = task.await {
                error!("sweeper task failed: {e}");
            }
        }
        info!("radar server stopped");
    }
}

async fn accept_loop(listener: TcpListener, acceptor: TlsAcceptor, manager: SessionManager, cancel: CancellationToken) {
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                debug!("accepted TCP connection from {peer}");
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("set_nodelay failed for {peer}: {e}");
                }
                let acceptor = acceptor.clone();
                manager.open_session(Some(peer), async move { tls::accept(&acceptor, stream).await });
            }
            // Transient accept error (e.g. too many open file descriptors).
            Err(e) => {
                error!("accept error: {e}");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
    info!("accept loop stopped; listener closed");
}
