//! TLS session operations
//!
//! This module implements the SessionOps trait for TLS connections, so the
//! HTTP client and server run unchanged over an mTLS stream.

use super::config::TlsError;
use super::peer::PeerIdentity;
use crate::http::session::{DeadlineStream, PollEvents, SessionOps};
use crate::http::{Error, Result as HttpResult};
use openssl::ssl::{HandshakeError, Ssl, SslContextRef, SslStream};
use openssl::x509::X509VerifyResult;
use std::fmt;
use std::io::{Read, Write};
use std::net::IpAddr;
use std::os::fd::AsRawFd;
use std::time::Duration;

/// An established TLS connection
///
/// Wraps an OpenSSL SslStream and provides poll/read/write/close operations.
/// A deadline carried by the underlying stream bounds the handshake as well.
pub struct TlsSession {
    stream: SslStream<DeadlineStream>,
    peer: Option<PeerIdentity>,
    failed: bool,
}

impl TlsSession {
    /// Client side: verify the server against `host` and perform the handshake
    pub fn connect(
        tcp_stream: impl Into<DeadlineStream>,
        ctx: &SslContextRef,
        host: &str,
    ) -> std::result::Result<Self, TlsError> {
        let mut ssl = Ssl::new(ctx).map_err(|e| TlsError::Config {
            context: "create client session",
            source: e,
        })?;

        let name_err = |e| TlsError::Config {
            context: "set server name",
            source: e,
        };
        match host.parse::<IpAddr>() {
            Ok(ip) => ssl.param_mut().set_ip(ip).map_err(name_err)?,
            Err(_) => {
                // SNI plus hostname verification against the certificate SAN
                ssl.set_hostname(host).map_err(name_err)?;
                ssl.param_mut().set_host(host).map_err(name_err)?;
            }
        }

        let stream = ssl.connect(tcp_stream.into()).map_err(handshake_error)?;
        Ok(Self::established(stream))
    }

    /// Server side: perform the handshake, verifying the client certificate
    pub fn accept(
        tcp_stream: impl Into<DeadlineStream>,
        ctx: &SslContextRef,
    ) -> std::result::Result<Self, TlsError> {
        let ssl = Ssl::new(ctx).map_err(|e| TlsError::Config {
            context: "create server session",
            source: e,
        })?;

        let stream = ssl.accept(tcp_stream.into()).map_err(handshake_error)?;
        Ok(Self::established(stream))
    }

    fn established(stream: SslStream<DeadlineStream>) -> Self {
        let peer = PeerIdentity::from_ssl(stream.ssl());
        TlsSession {
            stream,
            peer,
            failed: false,
        }
    }

    /// Verified peer certificate
    pub fn peer(&self) -> Option<&PeerIdentity> {
        self.peer.as_ref()
    }

    /// Negotiated protocol version (e.g. "TLSv1.3")
    pub fn version(&self) -> &'static str {
        self.stream.ssl().version_str()
    }

    /// Negotiated cipher, in OpenSSL's naming
    pub fn cipher(&self) -> Option<&'static str> {
        self.stream.ssl().current_cipher().map(|c| c.name())
    }
}

fn handshake_error(err: HandshakeError<DeadlineStream>) -> TlsError {
    match err {
        HandshakeError::SetupFailure(stack) => TlsError::Config {
            context: "handshake setup",
            source: stack,
        },
        HandshakeError::Failure(mid) => {
            let verify = mid.ssl().verify_result();
            if verify != X509VerifyResult::OK {
                TlsError::CertificateRejected(verify.error_string().to_string())
            } else {
                TlsError::Handshake(mid.error().to_string())
            }
        }
        HandshakeError::WouldBlock(mid) => TlsError::Handshake(mid.error().to_string()),
    }
}

impl fmt::Debug for TlsSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSession")
            .field("peer", &self.peer)
            .field("version", &self.version())
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

impl SessionOps for TlsSession {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> HttpResult<bool> {
        use libc::{poll, pollfd, POLLIN, POLLOUT};

        // Decrypted bytes already buffered by OpenSSL won't show up on the fd
        if matches!(events, PollEvents::Read | PollEvents::Both) && self.stream.ssl().pending() > 0
        {
            return Ok(true);
        }

        let mut pfd = pollfd {
            fd: self.stream.get_ref().as_raw_fd(),
            events: match events {
                PollEvents::Read => POLLIN,
                PollEvents::Write => POLLOUT,
                PollEvents::Both => POLLIN | POLLOUT,
            },
            revents: 0,
        };

        let timeout_ms = timeout
            .map(|d| d.as_millis().min(i32::MAX as u128) as i32)
            .unwrap_or(-1);

        let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };

        if result < 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }

        Ok(result > 0)
    }

    fn read(&mut self, buf: &mut [u8]) -> HttpResult<usize> {
        self.stream.read(buf).map_err(|e| {
            self.failed = true;
            Error::Io(e)
        })
    }

    fn write(&mut self, buf: &[u8]) -> HttpResult<usize> {
        self.stream.write(buf).map_err(|e| {
            self.failed = true;
            Error::Io(e)
        })
    }

    fn close(&mut self) -> HttpResult<()> {
        // close_notify only makes sense on a healthy connection
        if !self.failed {
            let _ = self.stream.shutdown();
        }

        use std::net::Shutdown;
        match self.stream.get_ref().get_ref().shutdown(Shutdown::Both) {
            Err(e) if e.kind() != std::io::ErrorKind::NotConnected => Err(Error::from(e)),
            _ => Ok(()),
        }
    }
}
