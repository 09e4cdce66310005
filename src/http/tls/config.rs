//! TLS policies
//!
//! This module builds the server and client OpenSSL contexts. The server
//! pins the protocol floor, curve order and cipher allow-list and refuses
//! clients without a CA-signed certificate. The client only pins trust and
//! identity and otherwise takes the library defaults.

use super::identity::Identity;
use super::session::TlsSession;
use super::trust::TrustStore;
use crate::error::ErrorKind;
use crate::http::session::DeadlineStream;
use crate::settings::{IdentityPaths, DEFAULT_TIMEOUT};
use openssl::error::ErrorStack;
use openssl::nid::Nid;
use openssl::ssl::{
    SslContext, SslContextBuilder, SslContextRef, SslMethod, SslOptions, SslVerifyMode,
    SslVersion,
};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// TLS version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl TlsVersion {
    /// Get OpenSSL protocol version constant
    pub fn to_openssl_version(&self) -> SslVersion {
        match self {
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }

    /// Get version as string, in OpenSSL's spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
        }
    }
}

/// TLS 1.2 cipher suites the server is willing to negotiate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherSuite {
    EcdheRsaAes256GcmSha384,
    EcdheRsaAes256CbcSha,
    RsaAes256GcmSha384,
    RsaAes256CbcSha,
    EcdheRsaAes128GcmSha256,
    EcdheEcdsaAes128GcmSha256,
}

impl CipherSuite {
    /// IANA (RFC) name
    pub fn iana_name(&self) -> &'static str {
        match self {
            CipherSuite::EcdheRsaAes256GcmSha384 => "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
            CipherSuite::EcdheRsaAes256CbcSha => "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
            CipherSuite::RsaAes256GcmSha384 => "TLS_RSA_WITH_AES_256_GCM_SHA384",
            CipherSuite::RsaAes256CbcSha => "TLS_RSA_WITH_AES_256_CBC_SHA",
            CipherSuite::EcdheRsaAes128GcmSha256 => "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
            CipherSuite::EcdheEcdsaAes128GcmSha256 => "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
        }
    }

    /// Name used in OpenSSL cipher lists and reported by `SslCipherRef::name`
    pub fn openssl_name(&self) -> &'static str {
        match self {
            CipherSuite::EcdheRsaAes256GcmSha384 => "ECDHE-RSA-AES256-GCM-SHA384",
            CipherSuite::EcdheRsaAes256CbcSha => "ECDHE-RSA-AES256-SHA",
            CipherSuite::RsaAes256GcmSha384 => "AES256-GCM-SHA384",
            CipherSuite::RsaAes256CbcSha => "AES256-SHA",
            CipherSuite::EcdheRsaAes128GcmSha256 => "ECDHE-RSA-AES128-GCM-SHA256",
            CipherSuite::EcdheEcdsaAes128GcmSha256 => "ECDHE-ECDSA-AES128-GCM-SHA256",
        }
    }

    /// Look a suite up by its OpenSSL name
    pub fn from_openssl_name(name: &str) -> Option<Self> {
        SERVER_CIPHER_SUITES
            .iter()
            .copied()
            .find(|suite| suite.openssl_name() == name)
    }
}

/// Elliptic curves for key exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    P521,
    P384,
    P256,
}

impl Curve {
    /// NIST name, as accepted by OpenSSL group lists
    pub fn name(&self) -> &'static str {
        match self {
            Curve::P521 => "P-521",
            Curve::P384 => "P-384",
            Curve::P256 => "P-256",
        }
    }

    pub fn nid(&self) -> Nid {
        match self {
            Curve::P521 => Nid::SECP521R1,
            Curve::P384 => Nid::SECP384R1,
            Curve::P256 => Nid::X9_62_PRIME256V1,
        }
    }
}

/// Lowest protocol version the server accepts
pub const SERVER_MIN_VERSION: TlsVersion = TlsVersion::Tls12;

/// Server curve preference, strongest first
pub const SERVER_CURVES: [Curve; 3] = [Curve::P521, Curve::P384, Curve::P256];

/// Server cipher allow-list for TLS 1.2, in preference order
pub const SERVER_CIPHER_SUITES: [CipherSuite; 6] = [
    CipherSuite::EcdheRsaAes256GcmSha384,
    CipherSuite::EcdheRsaAes256CbcSha,
    CipherSuite::RsaAes256GcmSha384,
    CipherSuite::RsaAes256CbcSha,
    CipherSuite::EcdheRsaAes128GcmSha256,
    CipherSuite::EcdheEcdsaAes128GcmSha256,
];

/// TLS errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("{context} {}: {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{context} {}: {source}", .path.display())]
    Certificate {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: ErrorStack,
    },

    #[error("no certificate found in {}", .path.display())]
    MissingCertificate { path: PathBuf },

    #[error("certificate {} does not match private key {}", .cert.display(), .key.display())]
    KeyMismatch { cert: PathBuf, key: PathBuf },

    #[error("no CA certificates found in {}", .path.display())]
    EmptyTrustStore { path: PathBuf },

    #[error("{context}: {source}")]
    Config {
        context: &'static str,
        #[source]
        source: ErrorStack,
    },

    #[error("peer certificate rejected: {0}")]
    CertificateRejected(String),

    #[error("Handshake failed: {0}")]
    Handshake(String),
}

impl TlsError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            TlsError::Io { .. } => ErrorKind::Io,
            TlsError::Certificate { .. }
            | TlsError::MissingCertificate { .. }
            | TlsError::KeyMismatch { .. }
            | TlsError::EmptyTrustStore { .. }
            | TlsError::Config { .. }
            | TlsError::CertificateRejected(_) => ErrorKind::Certificate,
            TlsError::Handshake(_) => ErrorKind::Network,
        }
    }
}

/// Read a whole PEM file into memory; the handle is closed on return
pub(crate) fn read_pem(context: &'static str, path: &Path) -> Result<Vec<u8>, TlsError> {
    let io_err = |source| TlsError::Io {
        context,
        path: path.to_path_buf(),
        source,
    };

    let mut pem = Vec::new();
    File::open(path)
        .map_err(io_err)?
        .read_to_end(&mut pem)
        .map_err(io_err)?;
    Ok(pem)
}

fn config_err(context: &'static str) -> impl FnOnce(ErrorStack) -> TlsError {
    move |source| TlsError::Config { context, source }
}

fn cipher_list() -> String {
    SERVER_CIPHER_SUITES
        .iter()
        .map(CipherSuite::openssl_name)
        .collect::<Vec<_>>()
        .join(":")
}

fn curve_list() -> String {
    SERVER_CURVES
        .iter()
        .map(Curve::name)
        .collect::<Vec<_>>()
        .join(":")
}

/// Server-side policy: client certificates are always required and verified
#[derive(Clone)]
pub struct ServerTlsPolicy {
    ctx: SslContext,
    trust: TrustStore,
    identity: Identity,
}

impl ServerTlsPolicy {
    /// Load the CA bundle and server identity, then build the policy
    pub fn from_paths(paths: &IdentityPaths) -> Result<Self, TlsError> {
        let trust = TrustStore::from_pem_file(&paths.ca_cert)?;
        let identity = Identity::from_pem_files(&paths.cert, &paths.key)?;
        Self::new(trust, identity)
    }

    pub fn new(trust: TrustStore, identity: Identity) -> Result<Self, TlsError> {
        let mut builder = SslContextBuilder::new(SslMethod::tls_server())
            .map_err(config_err("create server context"))?;

        builder
            .set_min_proto_version(Some(SERVER_MIN_VERSION.to_openssl_version()))
            .map_err(config_err("set minimum protocol version"))?;
        builder
            .set_groups_list(&curve_list())
            .map_err(config_err("set curve preferences"))?;
        builder
            .set_cipher_list(&cipher_list())
            .map_err(config_err("set cipher suites"))?;
        builder.set_options(SslOptions::CIPHER_SERVER_PREFERENCE);

        trust.install_verify_store(&mut builder)?;
        trust.install_client_ca_list(&mut builder)?;
        builder.set_verify(Self::verify_mode());
        builder
            .set_session_id_context(b"mtls-hello")
            .map_err(config_err("set session id context"))?;

        identity.install(&mut builder)?;

        debug!(
            ciphers = %cipher_list(),
            curves = %curve_list(),
            min_version = SERVER_MIN_VERSION.as_str(),
            cas = trust.len(),
            subject = %identity.subject(),
            "built server TLS policy"
        );

        Ok(ServerTlsPolicy {
            ctx: builder.build(),
            trust,
            identity,
        })
    }

    /// Client verification mode; there is no optional mode
    pub fn verify_mode() -> SslVerifyMode {
        SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT
    }

    pub fn min_version(&self) -> TlsVersion {
        SERVER_MIN_VERSION
    }

    pub fn curve_preferences(&self) -> &'static [Curve] {
        &SERVER_CURVES
    }

    pub fn cipher_suites(&self) -> &'static [CipherSuite] {
        &SERVER_CIPHER_SUITES
    }

    pub fn trust_store(&self) -> &TrustStore {
        &self.trust
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The built OpenSSL context every accepted session starts from
    pub fn context(&self) -> &SslContextRef {
        &self.ctx
    }

    /// Accept a client connection with TLS (performs the handshake)
    ///
    /// Pass a [`DeadlineStream`] to bound the handshake as a whole.
    pub fn accept(&self, stream: impl Into<DeadlineStream>) -> Result<TlsSession, TlsError> {
        TlsSession::accept(stream, &self.ctx)
    }
}

/// Client-side policy: trust the CA, present our certificate
#[derive(Clone)]
pub struct ClientTlsPolicy {
    ctx: SslContext,
    trust: TrustStore,
    identity: Identity,
    timeout: Duration,
}

impl ClientTlsPolicy {
    /// Load the CA bundle and client identity, then build the policy
    pub fn from_paths(paths: &IdentityPaths) -> Result<Self, TlsError> {
        let trust = TrustStore::from_pem_file(&paths.ca_cert)?;
        let identity = Identity::from_pem_files(&paths.cert, &paths.key)?;
        Self::new(trust, identity)
    }

    pub fn new(trust: TrustStore, identity: Identity) -> Result<Self, TlsError> {
        let mut builder = SslContextBuilder::new(SslMethod::tls_client())
            .map_err(config_err("create client context"))?;

        trust.install_verify_store(&mut builder)?;
        builder.set_verify(SslVerifyMode::PEER);
        identity.install(&mut builder)?;

        debug!(
            cas = trust.len(),
            subject = %identity.subject(),
            "built client TLS policy"
        );

        Ok(ClientTlsPolicy {
            ctx: builder.build(),
            trust,
            identity,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Override the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn trust_store(&self) -> &TrustStore {
        &self.trust
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Connect to `host` over an established TCP stream (performs the handshake)
    pub fn connect(
        &self,
        host: &str,
        stream: impl Into<DeadlineStream>,
    ) -> Result<TlsSession, TlsError> {
        TlsSession::connect(stream, &self.ctx, host)
    }
}

impl fmt::Debug for ServerTlsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerTlsPolicy")
            .field("trust", &self.trust)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for ClientTlsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientTlsPolicy")
            .field("trust", &self.trust)
            .field("identity", &self.identity)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
