//! HTTP/1.1 over mutual TLS
//!
//! Just enough HTTP to prove an mTLS tunnel works end to end: one request
//! per connection, Content-Length or read-until-close bodies.
//!
//! # Architecture
//!
//! The HTTP layer is written against the `SessionOps` transport seam:
//!
//! - `SessionOps` defines poll/read/write/close
//! - `FdSessionOps` is a plain TCP transport, `tls::TlsSession` the encrypted one
//! - `HttpServer` and `HttpClient` drive a single exchange over either
//!
//! # Examples
//!
//! ```no_run
//! use mtls_hello::http::tls::ClientTlsPolicy;
//! use mtls_hello::http::HttpsClient;
//! use mtls_hello::settings::IdentityPaths;
//!
//! let paths = IdentityPaths::new("ca.crt", "client.crt", "client.key");
//! let client = HttpsClient::new(ClientTlsPolicy::from_paths(&paths).unwrap());
//! let response = client.get("localhost", 1443, "/").unwrap();
//! assert_eq!(response.status().code(), 200);
//! ```

pub mod client;
pub mod headers;
pub mod message;
pub mod parser;
pub mod router;
pub mod server;
pub mod session;
pub mod tls;

pub use client::{HttpClient, HttpsClient};
pub use headers::Headers;
pub use message::{HttpRequest, HttpResponse, Method, Status, Version};
pub use parser::{RequestParser, ResponseParser};
pub use router::Router;
pub use server::HttpServer;
pub use session::{DeadlineStream, FdSessionOps, HttpSession, SessionOps};

use crate::error::ErrorKind;

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connect {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not resolve {0}")]
    Resolve(String),

    #[error("TLS error: {0}")]
    Tls(#[from] tls::TlsError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_)
            | Error::Connect { .. }
            | Error::Resolve(_)
            | Error::Timeout
            | Error::ConnectionClosed => ErrorKind::Network,
            Error::Tls(e) => e.kind(),
            Error::Parse(_)
            | Error::InvalidVersion(_)
            | Error::InvalidMethod(_)
            | Error::InvalidStatus(_)
            | Error::InvalidHeader(_)
            | Error::Json(_)
            | Error::Protocol(_) => ErrorKind::Protocol,
        }
    }
}

/// Maximum number of headers per message
pub const MAX_HEADERS: usize = 64;

/// Largest request or response head we are willing to buffer
pub const MAX_HEAD_SIZE: usize = 16 * 1024;

/// Largest request body the server accepts
pub const MAX_REQUEST_BODY_SIZE: usize = 64 * 1024;

/// CRLF line ending
pub const CRLF: &str = "\r\n";
