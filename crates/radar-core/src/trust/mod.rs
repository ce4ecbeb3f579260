//! Trust layer: pinned-root certificate validation and mutual-TLS plumbing.
//!
//! # How peers authenticate (for beginners)
//!
//! OpenRadar peers do not use the public web PKI.  Each deployment has one
//! private certification authority whose certificate (the *trust anchor*) is
//! distributed out of band.  Every radar display and every simulator client
//! holds an identity certificate signed by that authority.
//!
//! During the TLS handshake both sides present their certificate and both
//! sides run the same check: does this certificate chain to the pinned
//! anchor, is it inside its validity period, and are the signatures good?
//! The host's system trust store is never consulted, host names are not
//! matched, and revocation is never checked.
//!
//! - [`anchor`] – the pinned [`TrustAnchor`] and its `verify` check.
//! - [`identity`] – a role's own certificate chain and private key.
//! - [`verifier`] – [`PinnedVerifier`], which plugs the anchor into rustls
//!   for both the client and the server direction.
//! - [`tls`] – building rustls configs and running handshakes with
//!   error classification.

pub mod anchor;
pub mod identity;
pub mod tls;
pub mod verifier;

use thiserror::Error;

pub use anchor::{PeerRole, TrustAnchor};
pub use identity::Identity;
pub use tls::{client_tls_config, server_tls_config, ALPN_RADAR};
pub use verifier::PinnedVerifier;

/// Errors raised while loading identity material or building TLS configs.
#[derive(Debug, Error)]
pub enum TrustError {
    #[error("no certificate found in {0}")]
    NoCertificate(&'static str),

    #[error("no private key found in identity material")]
    NoPrivateKey,

    #[error("failed to read PEM material: {0}")]
    Pem(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The pinned anchor could not back a client-certificate verifier.
    #[error("cannot build verifier from trust anchor: {0}")]
    Verifier(#[from] rustls::server::VerifierBuilderError),
}
