//! CA trust store
//!
//! Loads the PEM bundle both sides verify their peer against.

use super::config::{read_pem, TlsError};
use super::peer::common_name;
use openssl::ssl::SslContextBuilder;
use openssl::x509::{X509Ref, X509};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Set of trusted CA certificates (never empty)
#[derive(Clone)]
pub struct TrustStore {
    certs: Vec<X509>,
    source: PathBuf,
}

impl TrustStore {
    /// Read and parse a PEM CA bundle
    pub fn from_pem_file<P: AsRef<Path>>(path: P) -> Result<Self, TlsError> {
        let path = path.as_ref();
        let pem = read_pem("read CA bundle", path)?;
        Self::from_pem(&pem, path)
    }

    /// Parse a PEM CA bundle already in memory; `source` is only used in errors
    pub fn from_pem(pem: &[u8], source: &Path) -> Result<Self, TlsError> {
        let certs = X509::stack_from_pem(pem).map_err(|e| TlsError::Certificate {
            context: "parse CA bundle",
            path: source.to_path_buf(),
            source: e,
        })?;

        // A bundle with nothing in it would make every handshake fail later
        // with an unhelpful "unknown ca".
        if certs.is_empty() {
            return Err(TlsError::EmptyTrustStore {
                path: source.to_path_buf(),
            });
        }

        for cert in &certs {
            debug!(
                path = %source.display(),
                subject = %common_name(cert.subject_name()),
                "loaded CA certificate"
            );
        }

        Ok(TrustStore {
            certs,
            source: source.to_path_buf(),
        })
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    pub fn certificates(&self) -> &[X509] {
        &self.certs
    }

    /// File the bundle was read from
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Whether `cert` is one of the trusted CAs (DER comparison)
    pub fn contains(&self, cert: &X509Ref) -> bool {
        let Ok(needle) = cert.to_der() else {
            return false;
        };
        self.certs
            .iter()
            .any(|c| c.to_der().map(|der| der == needle).unwrap_or(false))
    }

    /// Add every CA to the context's verification store
    pub(crate) fn install_verify_store(
        &self,
        builder: &mut SslContextBuilder,
    ) -> Result<(), TlsError> {
        for cert in &self.certs {
            builder
                .cert_store_mut()
                .add_cert(cert.clone())
                .map_err(|e| TlsError::Certificate {
                    context: "add CA to verify store",
                    path: self.source.clone(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Advertise the CA names in the server's CertificateRequest
    pub(crate) fn install_client_ca_list(
        &self,
        builder: &mut SslContextBuilder,
    ) -> Result<(), TlsError> {
        for cert in &self.certs {
            builder
                .add_client_ca(cert)
                .map_err(|e| TlsError::Certificate {
                    context: "add client CA name",
                    path: self.source.clone(),
                    source: e,
                })?;
        }
        Ok(())
    }
}

impl fmt::Debug for TrustStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustStore")
            .field("source", &self.source)
            .field("certificates", &self.certs.len())
            .finish()
    }
}
