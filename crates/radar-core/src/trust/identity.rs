//! A role's own identity: certificate chain plus private key.

use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use super::TrustError;

/// Identity material presented to the peer during the handshake.
#[derive(Debug)]
pub struct Identity {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl Identity {
    /// Loads a PEM certificate chain (leaf first) and a PEM private key
    /// (PKCS#8, PKCS#1 or SEC1).
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::NoCertificate`] or [`TrustError::NoPrivateKey`]
    /// if either document is empty, or [`TrustError::Pem`] if it is corrupt.
    pub fn from_pem(chain_pem: &[u8], key_pem: &[u8]) -> Result<Self, TrustError> {
        let mut reader = chain_pem;
        let chain = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
        if chain.is_empty() {
            return Err(TrustError::NoCertificate("identity certificate PEM"));
        }

        let mut reader = key_pem;
        let key = rustls_pemfile::private_key(&mut reader)?.ok_or(TrustError::NoPrivateKey)?;

        Ok(Self { chain, key })
    }

    /// Builds an identity from already-decoded DER parts.
    pub fn from_der(chain: Vec<CertificateDer<'static>>, key: PrivateKeyDer<'static>) -> Self {
        Self { chain, key }
    }

    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    pub(crate) fn cloned_parts(&self) -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
        (self.chain.clone(), self.key.clone_key())
    }
}

impl Clone for Identity {
    fn clone(&self) -> Self {
        let (chain, key) = self.cloned_parts();
        Self { chain, key }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pem_loads_chain_and_key() {
        // Arrange
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = rcgen::CertificateParams::new(vec!["sim.local".to_string()])
            .unwrap()
            .self_signed(&key)
            .unwrap();

        // Act
        let identity = Identity::from_pem(cert.pem().as_bytes(), key.serialize_pem().as_bytes()).unwrap();

        // Assert
        assert_eq!(identity.chain().len(), 1);
        assert_eq!(&identity.chain()[0], cert.der());
    }

    #[test]
    fn test_from_pem_missing_key_fails() {
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = rcgen::CertificateParams::new(vec!["sim.local".to_string()])
            .unwrap()
            .self_signed(&key)
            .unwrap();

        let err = Identity::from_pem(cert.pem().as_bytes(), b"").unwrap_err();

        assert!(matches!(err, TrustError::NoPrivateKey));
    }

    #[test]
    fn test_from_pem_missing_chain_fails() {
        let err = Identity::from_pem(b"", b"").unwrap_err();
        assert!(matches!(err, TrustError::NoCertificate(_)));
    }
}
