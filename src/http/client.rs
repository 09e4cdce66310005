//! HTTP client implementation
//!
//! `HttpClient` drives one exchange over any `SessionOps` transport;
//! `HttpsClient` adds name resolution, connect and the mTLS handshake.

use super::session::{remaining, DeadlineStream};
use super::tls::{ClientTlsPolicy, TlsError};
use super::{
    Error, HttpRequest, HttpResponse, HttpSession, Method, ResponseParser, Result, SessionOps,
};
use crate::settings::{authority, ClientSettings};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// HTTP client over an established session
pub struct HttpClient<S: SessionOps> {
    session: HttpSession<S>,
    parser: ResponseParser,
}

impl<S: SessionOps> HttpClient<S> {
    pub fn new(session: S) -> Self {
        HttpClient {
            session: HttpSession::new(session),
            parser: ResponseParser::new(),
        }
    }

    /// Set the timeout for each I/O operation
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.session.set_timeout(Some(timeout));
    }

    /// Bound the whole exchange by `deadline` instead of per operation
    pub fn set_deadline(&mut self, deadline: Instant) {
        self.session.set_timeout(None);
        self.session.set_deadline(Some(deadline));
    }

    pub fn send_request(&mut self, request: &HttpRequest) -> Result<()> {
        self.session.write_all(&request.to_wire())
    }

    /// Read one full response, including a read-until-close body
    pub fn receive_response(&mut self) -> Result<HttpResponse> {
        self.parser.reset();
        let mut buf = vec![0u8; 4096];

        loop {
            let n = self.session.read(&mut buf)?;
            if n == 0 {
                return self.parser.finish();
            }
            if let Some(response) = self.parser.parse(&buf[..n])? {
                return Ok(response);
            }
        }
    }

    /// Send a GET for `uri` with the given Host header and read the response
    pub fn get(&mut self, host: &str, uri: &str) -> Result<HttpResponse> {
        let request = HttpRequest::builder()
            .method(Method::Get)
            .uri(uri)
            .header("Host", host)
            .header("Accept", "application/json")
            .header("Connection", "close")
            .build();

        self.send_request(&request)?;
        self.receive_response()
    }

    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }
}

/// HTTPS client presenting a client certificate
pub struct HttpsClient {
    policy: ClientTlsPolicy,
}

impl HttpsClient {
    pub fn new(policy: ClientTlsPolicy) -> Self {
        HttpsClient { policy }
    }

    /// Load the client policy named by `settings`, honoring its timeout
    pub fn from_settings(settings: &ClientSettings) -> std::result::Result<Self, TlsError> {
        let policy =
            ClientTlsPolicy::from_paths(&settings.identity)?.with_timeout(settings.timeout);
        Ok(HttpsClient::new(policy))
    }

    pub fn policy(&self) -> &ClientTlsPolicy {
        &self.policy
    }

    /// Perform a single GET against `https://host:port{path}`
    ///
    /// The policy timeout is one deadline for the whole request: resolve,
    /// connect, handshake and every read and write share it.
    pub fn get(&self, host: &str, port: u16, path: &str) -> Result<HttpResponse> {
        let deadline = Instant::now() + self.policy.timeout();

        let tcp = self.connect(host, port, deadline)?;
        let session = self
            .policy
            .connect(host, DeadlineStream::new(tcp, deadline))?;
        debug!(
            host,
            port,
            version = session.version(),
            cipher = session.cipher().unwrap_or("<undef>"),
            "TLS handshake complete"
        );

        let mut client = HttpClient::new(session);
        client.set_deadline(deadline);

        let response = client.get(&authority(host, port), path)?;
        let _ = client.close();

        info!(
            host,
            port,
            path,
            status = response.status().code(),
            bytes = response.body().len(),
            "response received"
        );
        Ok(response)
    }

    /// Connect to the first resolved address that accepts
    fn connect(&self, host: &str, port: u16, deadline: Instant) -> Result<TcpStream> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|_| Error::Resolve(authority(host, port)))?
            .collect();
        if addrs.is_empty() {
            return Err(Error::Resolve(authority(host, port)));
        }

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, remaining(deadline)?) {
                Ok(stream) => {
                    debug!(%addr, "connected");
                    return Ok(stream);
                }
                Err(e) => {
                    debug!(%addr, error = %e, "connect failed");
                    last_err = Some(Error::Connect {
                        addr: addr.to_string(),
                        source: e,
                    });
                }
            }
        }

        Err(last_err.unwrap_or(Error::Timeout))
    }
}

/// Plain-TCP client, used where TLS is not under test
impl HttpClient<super::FdSessionOps> {
    pub fn from_tcp(stream: TcpStream) -> Self {
        HttpClient::new(super::FdSessionOps::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_get_sends_host_and_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = vec![0u8; 1024];
            let n = stream.read(&mut buf).unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();

            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nOK")
                .unwrap();
            request
        });

        let mut client = HttpClient::from_tcp(TcpStream::connect(addr).unwrap());
        let response = client.get("localhost:1443", "/").unwrap();
        assert_eq!(response.status().code(), 200);
        assert_eq!(response.body(), b"OK");

        let request = handle.join().unwrap();
        assert!(request.starts_with("GET / HTTP/1.1\r\n"));
        assert!(request.contains("Host: localhost:1443\r\n"));
        assert!(request.contains("Connection: close\r\n"));
    }

    #[test]
    fn test_body_until_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = vec![0u8; 1024];
            stream.read(&mut buf).unwrap();
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nstreamed")
                .unwrap();
            // dropping the stream ends the body
        });

        let mut client = HttpClient::from_tcp(TcpStream::connect(addr).unwrap());
        let response = client.get("localhost", "/").unwrap();
        assert_eq!(response.body(), b"streamed");

        handle.join().unwrap();
    }

    #[test]
    fn test_closed_before_response() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = vec![0u8; 1024];
            stream.read(&mut buf).unwrap();
        });

        let mut client = HttpClient::from_tcp(TcpStream::connect(addr).unwrap());
        let err = client.get("localhost", "/").unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));

        handle.join().unwrap();
    }

    #[test]
    fn test_deadline_overrides_operation_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = vec![0u8; 1024];
            stream.read(&mut buf).unwrap();
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 8\r\n\r\n")
                .unwrap();
            for _ in 0..8 {
                if stream.write_all(b"x").is_err() {
                    break;
                }
                thread::sleep(Duration::from_millis(200));
            }
        });

        let mut client = HttpClient::from_tcp(TcpStream::connect(addr).unwrap());
        client.set_timeout(Duration::from_secs(5));
        client.set_deadline(Instant::now() + Duration::from_millis(500));

        let started = Instant::now();
        let err = client.get("localhost", "/").unwrap_err();
        assert!(matches!(err, Error::Timeout), "unexpected error: {err}");
        assert!(started.elapsed() < Duration::from_millis(1200));

        drop(client);
        handle.join().unwrap();
    }

    #[test]
    fn test_resolve_error_brackets_ipv6() {
        let err = Error::Resolve(authority("::1", 1443));
        assert_eq!(err.to_string(), "could not resolve [::1]:1443");
    }
}
