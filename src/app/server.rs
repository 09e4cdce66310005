//! HTTPS server
//!
//! Blocking accept loop on a socket2 listener. Every accepted connection is
//! TLS-accepted (client certificate required) and served on its own thread:
//! one request, one response, then close.

use crate::error::{Error, Result};
use crate::http::tls::{ServerTlsPolicy, TlsSession};
use crate::http::{self, DeadlineStream, HttpResponse, HttpServer, Router, Status};
use crate::settings::ServerSettings;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Listen backlog
const BACKLOG: i32 = 128;

/// Total time a connection may take, handshake included
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after a failed accept, doubled per consecutive failure
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);
const MAX_ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

pub struct Server {
    listener: TcpListener,
    policy: Arc<ServerTlsPolicy>,
    router: Arc<Router>,
    timeout: Duration,
}

impl Server {
    /// Build the TLS policy from `settings` and bind the listener
    pub fn bind(settings: &ServerSettings, router: Router) -> Result<Self> {
        let policy = ServerTlsPolicy::from_paths(&settings.identity)
            .map_err(|e| Error::tls("server policy", e))?;
        Server::with_policy(policy, settings.listen, router)
    }

    /// Bind the listener for an already built policy
    pub fn with_policy(policy: ServerTlsPolicy, listen: SocketAddr, router: Router) -> Result<Self> {
        let listener =
            bind_listener(listen).map_err(|e| Error::network(format!("bind {}", listen), e))?;

        Ok(Server {
            listener,
            policy: Arc::new(policy),
            router: Arc::new(router),
            timeout: CONNECTION_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| Error::network("listener address", e))
    }

    pub fn policy(&self) -> &ServerTlsPolicy {
        &self.policy
    }

    /// Accept and serve exactly one connection on the calling thread
    pub fn handle_next(&self) -> Result<()> {
        let (stream, peer) = self
            .listener
            .accept()
            .map_err(|e| Error::network("accept", e))?;

        let connection = Connection {
            policy: &self.policy,
            router: &self.router,
            timeout: self.timeout,
            peer,
        };
        connection
            .serve(stream)
            .map_err(|e| Error::http(format!("connection from {}", peer), e))
    }

    /// Serve forever, one thread per connection
    pub fn serve(self) -> Result<()> {
        info!(addr = %self.local_addr()?, "listening");

        let mut failures = 0u32;
        loop {
            let (stream, peer) = match self.listener.accept() {
                Ok(accepted) => {
                    failures = 0;
                    accepted
                }
                Err(e) => {
                    let pause = accept_backoff(failures);
                    failures = failures.saturating_add(1);
                    warn!(
                        error = %e,
                        retry_in_ms = pause.as_millis() as u64,
                        "accept failed"
                    );
                    thread::sleep(pause);
                    continue;
                }
            };

            let policy = Arc::clone(&self.policy);
            let router = Arc::clone(&self.router);
            let timeout = self.timeout;

            let spawned = thread::Builder::new()
                .name(format!("conn-{}", peer))
                .spawn(move || {
                    let connection = Connection {
                        policy: &policy,
                        router: &router,
                        timeout,
                        peer,
                    };
                    if let Err(e) = connection.serve(stream) {
                        warn!(%peer, kind = e.kind().as_str(), error = %e, "connection failed");
                    }
                });

            if let Err(e) = spawned {
                error!(%peer, error = %e, "failed to spawn connection thread");
            }
        }
    }
}

/// Delay before retrying after `failures` consecutive accept errors
fn accept_backoff(failures: u32) -> Duration {
    ACCEPT_BACKOFF
        .checked_mul(1u32 << failures.min(16))
        .map_or(MAX_ACCEPT_BACKOFF, |d| d.min(MAX_ACCEPT_BACKOFF))
}

fn bind_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;
    Ok(socket.into())
}

struct Connection<'a> {
    policy: &'a ServerTlsPolicy,
    router: &'a Router,
    timeout: Duration,
    peer: SocketAddr,
}

impl Connection<'_> {
    fn serve(&self, stream: TcpStream) -> http::Result<()> {
        let deadline = Instant::now() + self.timeout;
        let session = self.policy.accept(DeadlineStream::new(stream, deadline))?;
        let client_cn = session
            .peer()
            .map(|p| p.subject.clone())
            .unwrap_or_else(|| "<undef>".to_string());
        debug!(
            peer = %self.peer,
            client = %client_cn,
            version = session.version(),
            cipher = session.cipher().unwrap_or("<undef>"),
            "TLS handshake complete"
        );

        self.exchange(session, &client_cn, deadline)
    }

    fn exchange(
        &self,
        session: TlsSession,
        client_cn: &str,
        deadline: Instant,
    ) -> http::Result<()> {
        let mut server = HttpServer::new(session);
        server.set_deadline(deadline);

        let started = Instant::now();
        let request = match server.receive_request() {
            Ok(request) => request,
            Err(e) if e.kind() == crate::ErrorKind::Protocol => {
                let _ = server.send_response(HttpResponse::text(
                    Status::BAD_REQUEST,
                    "bad request\n",
                ));
                let _ = server.close();
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let router = self.router;
        let response = panic::catch_unwind(AssertUnwindSafe(|| router.dispatch(&request)))
            .unwrap_or_else(|_| {
                error!(path = request.path(), "handler panicked");
                HttpResponse::text(Status::INTERNAL_SERVER_ERROR, "internal server error\n")
            });

        let status = response.status().code();
        server.send_response(response)?;
        let _ = server.close();

        info!(
            peer = %self.peer,
            client = client_cn,
            method = %request.method(),
            path = request.path(),
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_backoff_grows_and_caps() {
        assert_eq!(accept_backoff(0), Duration::from_millis(10));
        assert_eq!(accept_backoff(1), Duration::from_millis(20));
        assert_eq!(accept_backoff(3), Duration::from_millis(80));
        assert_eq!(accept_backoff(7), MAX_ACCEPT_BACKOFF);
        assert_eq!(accept_backoff(u32::MAX), MAX_ACCEPT_BACKOFF);
    }
}
