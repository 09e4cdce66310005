//! Application errors
//!
//! Every layer has its own error enum; this one wraps them with a short tag
//! naming the failing step so the entry point can print a useful diagnostic.

use crate::http;
use crate::http::tls::TlsError;

/// Result type for application operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification shared by every error in the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A file could not be read
    Io,
    /// Malformed certificate or key, key mismatch, empty trust store
    Certificate,
    /// Bind, connect, handshake or transport failure
    Network,
    /// Unexpected or malformed HTTP exchange
    Protocol,
    /// Unrecognized command-line input
    Usage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Io => "io",
            ErrorKind::Certificate => "certificate",
            ErrorKind::Network => "network",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Usage => "usage",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{context}: {source}")]
    Tls {
        context: String,
        #[source]
        source: TlsError,
    },

    #[error("{context}: {source}")]
    Http {
        context: String,
        #[source]
        source: http::Error,
    },

    #[error("{context}: {source}")]
    Network {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Usage(String),
}

impl Error {
    pub fn tls(context: impl Into<String>, source: TlsError) -> Self {
        Error::Tls {
            context: context.into(),
            source,
        }
    }

    pub fn http(context: impl Into<String>, source: http::Error) -> Self {
        Error::Http {
            context: context.into(),
            source,
        }
    }

    pub fn network(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Network {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Tls { source, .. } => source.kind(),
            Error::Http { source, .. } => source.kind(),
            Error::Network { .. } => ErrorKind::Network,
            Error::Usage(_) => ErrorKind::Usage,
        }
    }
}

impl From<clap::Error> for Error {
    fn from(err: clap::Error) -> Self {
        Error::Usage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;

    #[test]
    fn test_context_is_prefixed() {
        let err = Error::tls(
            "server policy",
            TlsError::EmptyTrustStore {
                path: PathBuf::from("./ca.crt"),
            },
        );
        let msg = err.to_string();
        assert!(msg.starts_with("server policy: "));
        assert!(msg.contains("./ca.crt"));
        assert_eq!(err.kind(), ErrorKind::Certificate);
    }

    #[test]
    fn test_kinds() {
        let err = Error::network("bind 0.0.0.0:1443", io::Error::from(io::ErrorKind::AddrInUse));
        assert_eq!(err.kind(), ErrorKind::Network);

        let err = Error::http("GET /", http::Error::Protocol("status 500".into()));
        assert_eq!(err.kind(), ErrorKind::Protocol);

        assert_eq!(Error::Usage("bogus".into()).kind(), ErrorKind::Usage);
        assert_eq!(ErrorKind::Certificate.as_str(), "certificate");
    }
}
