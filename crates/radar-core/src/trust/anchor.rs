//! The pinned root of trust.

use std::sync::Arc;

use rustls::client::verify_server_cert_signed_by_trust_anchor;
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::pki_types::{CertificateDer, UnixTime};
use rustls::server::danger::ClientCertVerifier;
use rustls::server::{ParsedCertificate, WebPkiClientVerifier};
use rustls::{DistinguishedName, RootCertStore};
use tracing::debug;

use super::TrustError;

/// Which side of the handshake presented the certificate being checked.
///
/// Selects the extended key usage a leaf must allow; a leaf without the
/// extension is accepted for both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    /// The radar display, checked by a simulator client (`serverAuth`).
    Server,
    /// A simulator, checked by the radar display (`clientAuth`).
    Client,
}

/// A single pinned CA certificate used as the only root when validating peers.
///
/// Loaded once per process and shared behind an `Arc` by every TLS config
/// built from it.
#[derive(Debug)]
pub struct TrustAnchor {
    certificate: CertificateDer<'static>,
    roots: Arc<RootCertStore>,
    subjects: Vec<DistinguishedName>,
    algorithms: WebPkiSupportedAlgorithms,
    // webpki client-usage check on the same one-entry root store, no CRLs.
    client_chain: Arc<dyn ClientCertVerifier>,
}

impl TrustAnchor {
    /// Pins a DER-encoded CA certificate.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Tls`] if the certificate cannot be parsed as a
    /// trust anchor, [`TrustError::Verifier`] if no client verifier can be
    /// built on it.
    pub fn from_der(der: &[u8]) -> Result<Self, TrustError> {
        let certificate = CertificateDer::from(der.to_vec());
        let mut roots = RootCertStore::empty();
        roots.add(certificate.clone())?;
        let subjects = roots.subjects();
        let roots = Arc::new(roots);
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let algorithms = provider.signature_verification_algorithms;
        let client_chain = WebPkiClientVerifier::builder_with_provider(Arc::clone(&roots), provider).build()?;

        Ok(Self {
            certificate,
            roots,
            subjects,
            algorithms,
            client_chain,
        })
    }

    /// Pins the first certificate of a PEM document.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::NoCertificate`] if the document holds no
    /// `CERTIFICATE` block.
    pub fn from_pem(pem: &[u8]) -> Result<Self, TrustError> {
        let mut reader = pem;
        let first = rustls_pemfile::certs(&mut reader)
            .next()
            .ok_or(TrustError::NoCertificate("trust anchor PEM"))??;
        Self::from_der(&first)
    }

    /// Accepts either PEM or raw DER.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TrustError> {
        if bytes.windows(10).any(|w| w == b"-----BEGIN") {
            Self::from_pem(bytes)
        } else {
            Self::from_der(bytes)
        }
    }

    /// Returns `true` if `peer` chains to the pinned anchor right now, in
    /// either handshake role.
    ///
    /// Intermediates are not supplied, so the peer certificate must be signed
    /// directly by the anchor.
    pub fn verify(&self, peer: &CertificateDer<'_>) -> bool {
        let now = UnixTime::now();
        let outcome = self
            .check(peer, &[], PeerRole::Client, now)
            .or_else(|_| self.check(peer, &[], PeerRole::Server, now));
        match outcome {
            Ok(()) => true,
            Err(e) => {
                debug!("peer certificate rejected: {e}");
                false
            }
        }
    }

    /// Builds a chain from `end_entity` through `intermediates` to the anchor
    /// and checks validity period, signatures and the key usage for `role`
    /// at `now`.
    ///
    /// Revocation is not consulted.  Host names are not matched.
    ///
    /// # Errors
    ///
    /// Returns the rustls error describing why the chain was rejected.
    pub fn check(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        role: PeerRole,
        now: UnixTime,
    ) -> Result<(), rustls::Error> {
        match role {
            PeerRole::Server => {
                let cert = ParsedCertificate::try_from(end_entity)?;
                verify_server_cert_signed_by_trust_anchor(&cert, &self.roots, intermediates, now, self.algorithms.all)
            }
            PeerRole::Client => self
                .client_chain
                .verify_client_cert(end_entity, intermediates, now)
                .map(|_| ()),
        }
    }

    /// DER bytes of the pinned certificate.
    pub fn certificate(&self) -> &CertificateDer<'static> {
        &self.certificate
    }

    /// Subject names offered to clients as acceptable issuers.
    pub fn subjects(&self) -> &[DistinguishedName] {
        &self.subjects
    }

    pub(crate) fn algorithms(&self) -> &WebPkiSupportedAlgorithms {
        &self.algorithms
    }
}
