//! rustls configuration for both roles and handshake helpers.
//!
//! Both configs use the `ring` provider directly (no process-wide default
//! provider is installed), negotiate only the `radar` ALPN protocol, and
//! plug in [`PinnedVerifier`] so peers are judged solely against the pinned
//! anchor.

use std::io;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{AlertDescription, ClientConfig, ServerConfig};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::{client, server, TlsAcceptor, TlsConnector};
use tracing::debug;

use super::{Identity, PinnedVerifier, TrustAnchor, TrustError};
use crate::pump::LinkError;

/// Application protocol identifier negotiated during the handshake.
pub const ALPN_RADAR: &[u8] = b"radar";

fn provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Builds the radar-side (server) TLS config: presents `identity` and
/// requires a client certificate chaining to `anchor`.
///
/// # Errors
///
/// Returns [`TrustError::Tls`] if the identity's key does not match its
/// certificate or is of an unsupported type.
pub fn server_tls_config(identity: &Identity, anchor: Arc<TrustAnchor>) -> Result<Arc<ServerConfig>, TrustError> {
    let (chain, key) = identity.cloned_parts();
    let mut config = ServerConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()?
        .with_client_cert_verifier(Arc::new(PinnedVerifier::new(anchor)))
        .with_single_cert(chain, key)?;
    config.alpn_protocols = vec![ALPN_RADAR.to_vec()];
    Ok(Arc::new(config))
}

/// Builds the simulator-side (client) TLS config: presents `identity` and
/// accepts only a server certificate chaining to `anchor`.
///
/// # Errors
///
/// Returns [`TrustError::Tls`] if the identity's key is unusable.
pub fn client_tls_config(identity: &Identity, anchor: Arc<TrustAnchor>) -> Result<Arc<ClientConfig>, TrustError> {
    let (chain, key) = identity.cloned_parts();
    let mut config = ClientConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(PinnedVerifier::new(anchor)))
        .with_client_auth_cert(chain, key)?;
    config.alpn_protocols = vec![ALPN_RADAR.to_vec()];
    Ok(Arc::new(config))
}

/// Runs the server side of the handshake on an accepted transport stream.
///
/// # Errors
///
/// [`LinkError::Authentication`] if the client's certificate is rejected or
/// missing, [`LinkError::Handshake`] if `radar` was not negotiated or TLS
/// failed otherwise, [`LinkError::Transport`] on socket errors.
pub async fn accept<IO>(acceptor: &TlsAcceptor, io: IO) -> Result<server::TlsStream<IO>, LinkError>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    let stream = acceptor.accept(io).await.map_err(classify_tls_error)?;
    require_alpn(stream.get_ref().1.alpn_protocol())?;
    Ok(stream)
}

/// Runs the client side of the handshake on a connected transport stream.
///
/// # Errors
///
/// Same classification as [`accept`].
pub async fn connect<IO>(
    connector: &TlsConnector,
    server_name: ServerName<'static>,
    io: IO,
) -> Result<client::TlsStream<IO>, LinkError>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    let stream = connector.connect(server_name, io).await.map_err(classify_tls_error)?;
    require_alpn(stream.get_ref().1.alpn_protocol())?;
    Ok(stream)
}

fn require_alpn(negotiated: Option<&[u8]>) -> Result<(), LinkError> {
    match negotiated {
        Some(p) if p == ALPN_RADAR => Ok(()),
        other => Err(LinkError::Handshake(format!(
            "peer did not negotiate ALPN \"radar\" (got {:?})",
            other.map(String::from_utf8_lossy)
        ))),
    }
}

/// Maps an I/O error raised by a TLS stream onto [`LinkError`].
///
/// tokio-rustls reports TLS failures as `io::Error`s wrapping a
/// [`rustls::Error`]; certificate problems on either side become
/// [`LinkError::Authentication`].  With TLS 1.3 a client learns that the
/// server refused its certificate only on its first read after the
/// handshake, so the pump's read loop classifies its errors here too.
pub fn classify_tls_error(err: io::Error) -> LinkError {
    let Some(tls) = err.get_ref().and_then(|inner| inner.downcast_ref::<rustls::Error>()) else {
        return LinkError::Transport(err);
    };
    debug!("TLS error: {tls:?}");

    match tls {
        rustls::Error::InvalidCertificate(_)
        | rustls::Error::NoCertificatesPresented
        | rustls::Error::AlertReceived(
            AlertDescription::BadCertificate
            | AlertDescription::UnsupportedCertificate
            | AlertDescription::CertificateRevoked
            | AlertDescription::CertificateExpired
            | AlertDescription::CertificateUnknown
            | AlertDescription::UnknownCA
            | AlertDescription::AccessDenied
            | AlertDescription::CertificateRequired,
        ) => LinkError::Authentication(tls.to_string()),
        _ => LinkError::Handshake(tls.to_string()),
    }
}
