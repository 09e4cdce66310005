//! Endpoint identity (certificate + private key)

use super::config::{read_pem, TlsError};
use super::peer::common_name;
use openssl::error::ErrorStack;
use openssl::pkey::{PKey, PKeyRef, Private};
use openssl::ssl::SslContextBuilder;
use openssl::x509::{X509Ref, X509};
use std::fmt;
use std::path::{Path, PathBuf};

/// A certificate (plus optional intermediates) and its matching private key
#[derive(Clone)]
pub struct Identity {
    cert: X509,
    chain: Vec<X509>,
    key: PKey<Private>,
    cert_path: PathBuf,
}

impl Identity {
    /// Load a certificate file and a key file and check that they belong together.
    ///
    /// The certificate file may carry intermediates after the leaf; they are
    /// sent as the extra chain during the handshake.
    pub fn from_pem_files<C, K>(cert_path: C, key_path: K) -> Result<Self, TlsError>
    where
        C: AsRef<Path>,
        K: AsRef<Path>,
    {
        let cert_path = cert_path.as_ref();
        let key_path = key_path.as_ref();

        let cert_pem = read_pem("read certificate", cert_path)?;
        let key_pem = read_pem("read private key", key_path)?;

        let mut certs = X509::stack_from_pem(&cert_pem)
            .map_err(|e| TlsError::Certificate {
                context: "parse certificate",
                path: cert_path.to_path_buf(),
                source: e,
            })?
            .into_iter();
        let cert = certs.next().ok_or_else(|| TlsError::MissingCertificate {
            path: cert_path.to_path_buf(),
        })?;
        let chain = certs.collect();

        let key = PKey::private_key_from_pem(&key_pem).map_err(|e| TlsError::Certificate {
            context: "parse private key",
            path: key_path.to_path_buf(),
            source: e,
        })?;

        let public = cert.public_key().map_err(|e| TlsError::Certificate {
            context: "read certificate public key",
            path: cert_path.to_path_buf(),
            source: e,
        })?;
        if !public.public_eq(&*key) {
            return Err(TlsError::KeyMismatch {
                cert: cert_path.to_path_buf(),
                key: key_path.to_path_buf(),
            });
        }

        Ok(Identity {
            cert,
            chain,
            key,
            cert_path: cert_path.to_path_buf(),
        })
    }

    pub fn certificate(&self) -> &X509Ref {
        &self.cert
    }

    pub fn chain(&self) -> &[X509] {
        &self.chain
    }

    pub fn private_key(&self) -> &PKeyRef<Private> {
        &self.key
    }

    /// Common name of the leaf certificate
    pub fn subject(&self) -> String {
        common_name(self.cert.subject_name())
    }

    /// Install as the context's only certificate/key pair
    pub(crate) fn install(&self, builder: &mut SslContextBuilder) -> Result<(), TlsError> {
        let cert_err = |context: &'static str| {
            let path = self.cert_path.clone();
            move |source: ErrorStack| TlsError::Certificate {
                context,
                path,
                source,
            }
        };

        builder
            .set_certificate(&self.cert)
            .map_err(cert_err("install certificate"))?;
        for extra in &self.chain {
            builder
                .add_extra_chain_cert(extra.clone())
                .map_err(cert_err("install chain certificate"))?;
        }
        builder
            .set_private_key(&self.key)
            .map_err(cert_err("install private key"))?;
        builder
            .check_private_key()
            .map_err(cert_err("check private key"))?;
        Ok(())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("subject", &self.subject())
            .field("cert_path", &self.cert_path)
            .field("chain", &self.chain.len())
            .finish_non_exhaustive()
    }
}
