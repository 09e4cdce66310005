//! Mutual TLS for HTTP connections
//!
//! Both ends of the connection present a certificate and verify the other
//! one against the same CA. Everything cryptographic is delegated to
//! OpenSSL; this module only decides what goes into the contexts.
//!
//! # Architecture
//!
//! 1. `TrustStore` loads the CA bundle, `Identity` the endpoint's cert/key pair
//! 2. `ServerTlsPolicy` / `ClientTlsPolicy` combine them into an `SslContext`
//! 3. `TlsSession` implements `SessionOps`, so the HTTP code is unchanged
//!
//! # Examples
//!
//! ## Server
//!
//! ```no_run
//! use mtls_hello::http::tls::ServerTlsPolicy;
//! use mtls_hello::http::HttpServer;
//! use mtls_hello::settings::IdentityPaths;
//! use std::net::TcpListener;
//!
//! let policy = ServerTlsPolicy::from_paths(&IdentityPaths::server_default()).unwrap();
//! let listener = TcpListener::bind("127.0.0.1:1443").unwrap();
//! let (tcp_stream, _) = listener.accept().unwrap();
//! let tls_session = policy.accept(tcp_stream).unwrap();
//! let mut server = HttpServer::new(tls_session);
//! ```
//!
//! ## Client
//!
//! ```no_run
//! use mtls_hello::http::tls::ClientTlsPolicy;
//! use mtls_hello::http::HttpClient;
//! use mtls_hello::settings::IdentityPaths;
//! use std::net::TcpStream;
//!
//! let policy = ClientTlsPolicy::from_paths(&IdentityPaths::client_default()).unwrap();
//! let tcp_stream = TcpStream::connect("localhost:1443").unwrap();
//! let tls_session = policy.connect("localhost", tcp_stream).unwrap();
//! let mut client = HttpClient::new(tls_session);
//! ```

pub mod config;
pub mod identity;
pub mod peer;
pub mod session;
pub mod trust;

pub use config::{
    ClientTlsPolicy, CipherSuite, Curve, ServerTlsPolicy, TlsError, TlsVersion,
    SERVER_CIPHER_SUITES, SERVER_CURVES, SERVER_MIN_VERSION,
};
pub use identity::Identity;
pub use peer::PeerIdentity;
pub use session::TlsSession;
pub use trust::TrustStore;

/// Result type for TLS operations
pub type Result<T> = std::result::Result<T, TlsError>;
