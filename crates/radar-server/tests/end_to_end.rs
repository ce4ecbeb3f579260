//! End-to-end tests over real TCP and mutually authenticated TLS.
//!
//! # Purpose
//!
//! A `RadarServer` is bound to an ephemeral loopback port and driven by the
//! `RadarClient` from the simulator crate.  Certificates are minted per test
//! with `rcgen`: one pinned CA issues the legitimate leaves (`serverAuth`
//! only for the radar, `clientAuth` only for simulators), and a second
//! "rogue" CA issues leaves that must be refused.
//!
//! Scenarios covered:
//!
//! - A position update crosses the wire and becomes a radar return whose
//!   origin resolves back to the live session.
//! - The unlawful-interference squawk makes the server hang up.
//! - A client whose certificate is not issued by the pinned CA is refused
//!   with an authentication error and its server session never opens.
//! - A client refuses a server whose certificate is not issued by the
//!   pinned CA.
//! - A silent peer is dropped once the handshake timeout elapses.
//! - `stop()` closes every session.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use radar_client::application::telemetry::PlaneTelemetry;
use radar_client::infrastructure::network::{ClientError, ClientSettings, RadarClient};
use radar_core::trust::tls::{self, classify_tls_error};
use radar_core::trust::client_tls_config;
use radar_core::{Connection, ConnectionState, Identity, LinkError, PumpOptions, Squawk, TrustAnchor};
use radar_server::infrastructure::network::{RadarServer, ServerSettings};
use rcgen::{BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;

// ── Certificate helpers ───────────────────────────────────────────────────────

struct Ca {
    cert: rcgen::Certificate,
    key: KeyPair,
}

impl Ca {
    fn new(name: &str) -> Self {
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        Self { cert, key }
    }

    fn anchor(&self) -> Arc<TrustAnchor> {
        Arc::new(TrustAnchor::from_pem(self.cert.pem().as_bytes()).unwrap())
    }

    fn issue(&self, name: &str, usage: ExtendedKeyUsagePurpose) -> Identity {
        let mut params = CertificateParams::new(vec![name.to_string()]).unwrap();
        params.distinguished_name.push(DnType::CommonName, name);
        params.extended_key_usages = vec![usage];
        let key = KeyPair::generate().unwrap();
        let leaf = params.signed_by(&key, &self.cert, &self.key).unwrap();
        Identity::from_pem(leaf.pem().as_bytes(), key.serialize_pem().as_bytes()).unwrap()
    }

    /// A radar display leaf, `serverAuth` only.
    fn issue_server(&self, name: &str) -> Identity {
        self.issue(name, ExtendedKeyUsagePurpose::ServerAuth)
    }

    /// A simulator leaf, `clientAuth` only.
    fn issue_client(&self, name: &str) -> Identity {
        self.issue(name, ExtendedKeyUsagePurpose::ClientAuth)
    }
}

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

async fn start_server(ca: &Ca, identity: &Identity, settings: ServerSettings) -> RadarServer {
    RadarServer::bind(settings, identity, ca.anchor()).await.unwrap()
}

fn client_for(ca: &Ca, identity: &Identity) -> RadarClient {
    let settings = ClientSettings {
        server_name: Some("radar.local".to_string()),
        pump: PumpOptions::default(),
    };
    RadarClient::new(settings, identity, ca.anchor()).unwrap()
}

fn telemetry(flight_number: &str, transponder: i32) -> PlaneTelemetry {
    PlaneTelemetry {
        flight_number: flight_number.to_string(),
        latitude: 47.4502,
        longitude: -122.3088,
        altitude_ft: 11_000.0,
        com_frequency_khz: 119_900,
        transponder,
        ground_track_deg: 160.0,
        ground_speed_kt: 280.0,
    }
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}

async fn wait_closed(connection: &Connection) {
    tokio::time::timeout(Duration::from_secs(5), connection.closed())
        .await
        .expect("connection did not close within 5s");
}

// ── Happy path ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_position_update_becomes_radar_return_with_live_origin() {
    // Arrange
    let ca = Ca::new("OpenRadar Test CA");
    let server = start_server(&ca, &ca.issue_server("radar.local"), ServerSettings::new(loopback())).await;
    let client = client_for(&ca, &ca.issue_client("sim.local"));
    let connection = client.connect("127.0.0.1", server.local_addr().port()).await.unwrap();

    // Act
    client.on_telemetry(&telemetry("DAL404", 0x3341)).unwrap();
    eventually(|| server.store().len() == 1).await;

    // Assert
    let returns = server.store().snapshot();
    let update = &returns[0].update;
    assert_eq!(update.call_sign.as_str(), "DAL404");
    assert_eq!(update.squawk, Squawk(0x3341));
    assert_eq!(update.frequency_khz, 119_900);
    assert_eq!(update.altitude_ft, 11_000.0);

    let origin = server.resolve_origin(&returns[0]).expect("origin should still be connected");
    assert!(origin.peer().is_some_and(|p| p.ip().is_loopback()));
    assert!(client.is_connected());
    assert!(!connection.is_closed());

    client.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_unlawful_interference_squawk_disconnects_client() {
    // Arrange
    let ca = Ca::new("OpenRadar Test CA");
    let server = start_server(&ca, &ca.issue_server("radar.local"), ServerSettings::new(loopback())).await;
    let client = client_for(&ca, &ca.issue_client("sim.local"));
    let connection = client.connect("127.0.0.1", server.local_addr().port()).await.unwrap();
    client.on_telemetry(&telemetry("HIJ01", 0x1200)).unwrap();
    eventually(|| server.store().len() == 1).await;

    // Act
    client.on_telemetry(&telemetry("HIJ01", 0x7500)).unwrap();

    // Assert: the server hangs up and the emergency report is not recorded
    wait_closed(&connection).await;
    eventually(|| server.sessions().is_empty()).await;
    assert!(!client.is_connected());
    let returns = server.store().snapshot();
    assert_eq!(returns.len(), 1);
    assert_eq!(returns[0].update.squawk, Squawk::VFR);
    assert!(server.resolve_origin(&returns[0]).is_none());

    server.stop().await;
}

// ── Authentication ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_client_from_rogue_ca_never_gets_a_session() {
    // Arrange: open TCP first so the server-side session can be captured
    // while it is still handshaking.
    let ca = Ca::new("OpenRadar Test CA");
    let rogue = Ca::new("Rogue CA");
    let server = start_server(&ca, &ca.issue_server("radar.local"), ServerSettings::new(loopback())).await;
    let tcp = TcpStream::connect(server.local_addr()).await.unwrap();
    eventually(|| server.sessions().len() == 1).await;
    let session = server.sessions().all().remove(0);
    assert_eq!(session.state(), ConnectionState::Handshaking);
    // Trusts the real server, presents a certificate the server cannot chain.
    let connector = TlsConnector::from(client_tls_config(&rogue.issue_client("sim.local"), ca.anchor()).unwrap());
    let name = ServerName::try_from("radar.local").unwrap();

    // Act
    let outcome = match tls::connect(&connector, name, tcp).await {
        Err(e) => e,
        // Under TLS 1.3 the refusal only shows up on the first read.
        Ok(mut stream) => {
            let mut buf = [0u8; 16];
            classify_tls_error(stream.read(&mut buf).await.expect_err("server must refuse the certificate"))
        }
    };

    // Assert
    assert!(
        matches!(outcome, LinkError::Authentication(_) | LinkError::Handshake(_)),
        "unexpected error {outcome:?}"
    );
    let server_side = session.connection().opened().await;
    assert!(
        matches!(server_side, Err(LinkError::Authentication(_))),
        "server session should fail authentication, got {server_side:?}"
    );
    wait_closed(session.connection()).await;
    eventually(|| server.sessions().is_empty()).await;
    assert!(server.store().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_client_refuses_server_from_rogue_ca() {
    // Arrange
    let ca = Ca::new("OpenRadar Test CA");
    let rogue = Ca::new("Rogue CA");
    // The impostor trusts the real CA for clients but presents a rogue leaf.
    let server = start_server(&ca, &rogue.issue_server("radar.local"), ServerSettings::new(loopback())).await;
    let client = client_for(&ca, &ca.issue_client("sim.local"));

    // Act
    let outcome = client.connect("127.0.0.1", server.local_addr().port()).await;

    // Assert
    assert!(
        matches!(outcome, Err(ClientError::Link(LinkError::Authentication(_)))),
        "got {outcome:?}"
    );
    assert!(!client.is_connected());
    eventually(|| server.sessions().is_empty()).await;

    server.stop().await;
}

#[tokio::test]
async fn test_silent_peer_is_dropped_after_handshake_timeout() {
    // Arrange
    let ca = Ca::new("OpenRadar Test CA");
    let mut settings = ServerSettings::new(loopback());
    settings.pump.handshake_timeout = Duration::from_millis(200);
    let server = start_server(&ca, &ca.issue_server("radar.local"), settings).await;

    // Act: connect TCP and never send a ClientHello
    let _silent = TcpStream::connect(server.local_addr()).await.unwrap();

    // Assert
    eventually(|| server.sessions().len() == 1).await;
    eventually(|| server.sessions().is_empty()).await;

    server.stop().await;
}

// ── Shutdown ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stop_closes_every_session() {
    // Arrange
    let ca = Ca::new("OpenRadar Test CA");
    let server = start_server(&ca, &ca.issue_server("radar.local"), ServerSettings::new(loopback())).await;
    let port = server.local_addr().port();
    let first = client_for(&ca, &ca.issue_client("sim-1.local"));
    let second = client_for(&ca, &ca.issue_client("sim-2.local"));
    let a = first.connect("127.0.0.1", port).await.unwrap();
    let b = second.connect("127.0.0.1", port).await.unwrap();
    eventually(|| server.sessions().len() == 2).await;

    // Act
    server.stop().await;

    // Assert
    assert!(server.sessions().is_empty());
    wait_closed(&a).await;
    wait_closed(&b).await;
    assert!(first.connect("127.0.0.1", port).await.is_err());
}
