//! HTTP server side of a single connection
//!
//! Receives one request and writes one response; the connection is closed
//! afterwards, so every response carries `Connection: close`.

use super::{
    Error, HttpRequest, HttpResponse, HttpSession, RequestParser, Result, SessionOps,
};
use std::time::{Duration, Instant};

/// HTTP server over an accepted session
pub struct HttpServer<S: SessionOps> {
    session: HttpSession<S>,
    parser: RequestParser,
}

impl<S: SessionOps> HttpServer<S> {
    pub fn new(session: S) -> Self {
        HttpServer {
            session: HttpSession::new(session),
            parser: RequestParser::new(),
        }
    }

    /// Set the timeout for operations
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.session.set_timeout(Some(timeout));
    }

    /// Bound everything left on this connection by `deadline`
    pub fn set_deadline(&mut self, deadline: Instant) {
        self.session.set_timeout(None);
        self.session.set_deadline(Some(deadline));
    }

    /// Receive an HTTP request
    pub fn receive_request(&mut self) -> Result<HttpRequest> {
        self.parser = RequestParser::new();
        let mut buf = vec![0u8; 4096];

        loop {
            let n = self.session.read(&mut buf)?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }

            if let Some(request) = self.parser.parse(&buf[..n])? {
                return Ok(request);
            }
        }
    }

    /// Send an HTTP response
    pub fn send_response(&mut self, mut response: HttpResponse) -> Result<()> {
        response.headers_mut().set("Connection", "close");
        self.session.write_all(&response.to_wire())
    }

    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{FdSessionOps, Method, Status};
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    #[test]
    fn test_receive_and_respond() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream
                .write_all(b"GET /?q=1 HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .unwrap();
            let mut response = Vec::new();
            stream.read_to_end(&mut response).unwrap();
            String::from_utf8(response).unwrap()
        });

        let (stream, _) = listener.accept().unwrap();
        let mut server = HttpServer::new(FdSessionOps::new(stream));
        server.set_timeout(Duration::from_secs(5));

        let request = server.receive_request().unwrap();
        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.path(), "/");
        assert_eq!(request.headers().get("host"), Some("localhost"));

        server
            .send_response(HttpResponse::text(Status::OK, "hi"))
            .unwrap();
        server.close().unwrap();

        let response = handle.join().unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Connection: close\r\n"));
        assert!(response.contains("Content-Length: 2\r\n"));
        assert!(response.ends_with("\r\n\r\nhi"));
    }

    #[test]
    fn test_client_hangs_up() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream.write_all(b"GET / HTTP/1.1\r\n").unwrap();
        });

        let (stream, _) = listener.accept().unwrap();
        let mut server = HttpServer::new(FdSessionOps::new(stream));
        handle.join().unwrap();

        let err = server.receive_request().unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[test]
    fn test_trickled_request_hits_deadline() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            for byte in b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n" {
                if stream.write_all(&[*byte]).is_err() {
                    break;
                }
                thread::sleep(Duration::from_millis(100));
            }
        });

        let (stream, _) = listener.accept().unwrap();
        let mut server = HttpServer::new(FdSessionOps::new(stream));
        server.set_timeout(Duration::from_secs(5));
        server.set_deadline(Instant::now() + Duration::from_millis(500));

        let started = Instant::now();
        let err = server.receive_request().unwrap_err();
        assert!(matches!(err, Error::Timeout), "unexpected error: {err}");
        assert!(started.elapsed() < Duration::from_millis(1500));

        drop(server);
        handle.join().unwrap();
    }
}
