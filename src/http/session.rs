//! Session operations abstraction
//!
//! `SessionOps` is the transport seam: the HTTP client and server only ever
//! poll, read, write and close, so the same code serves plain TCP (used in
//! tests) and mutual TLS.

use super::{Error, Result};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

/// Default I/O timeout for a session
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport operations
pub trait SessionOps {
    /// Wait until the session is ready for the requested operation.
    ///
    /// Returns false when the timeout expired first.
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool>;

    /// Read data from the session
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write data to the session
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Close the session
    fn close(&mut self) -> Result<()>;
}

/// Poll events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvents {
    Read,
    Write,
    Both,
}

/// Time left until `deadline`, or `Error::Timeout` once it has passed
pub fn remaining(deadline: Instant) -> Result<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|d| !d.is_zero())
        .ok_or(Error::Timeout)
}

/// A transport with an I/O timeout applied to every operation
///
/// An optional deadline additionally bounds the session as a whole: every
/// poll waits at most for whatever is left of it.
pub struct HttpSession<S: SessionOps> {
    session: S,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
}

impl<S: SessionOps> HttpSession<S> {
    pub fn new(session: S) -> Self {
        HttpSession {
            session,
            timeout: Some(DEFAULT_SESSION_TIMEOUT),
            deadline: None,
        }
    }

    /// Set the timeout for operations (`None` waits forever)
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Fail every operation started or still waiting after `deadline`
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn poll_timeout(&self) -> Result<Option<Duration>> {
        match self.deadline {
            None => Ok(self.timeout),
            Some(deadline) => {
                let left = remaining(deadline)?;
                Ok(Some(self.timeout.map_or(left, |t| t.min(left))))
            }
        }
    }

    /// Read data with timeout
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.session.poll(PollEvents::Read, self.poll_timeout()?)? {
            return Err(Error::Timeout);
        }
        self.session.read(buf)
    }

    /// Write all of `buf`, polling before each chunk
    pub fn write_all(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            if !self.session.poll(PollEvents::Write, self.poll_timeout()?)? {
                return Err(Error::Timeout);
            }
            let n = self.session.write(buf)?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            buf = &buf[n..];
        }
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }
}

/// Plain TCP session operations
pub struct FdSessionOps {
    stream: TcpStream,
}

impl FdSessionOps {
    pub fn new(stream: TcpStream) -> Self {
        FdSessionOps { stream }
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }
}

impl SessionOps for FdSessionOps {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
        use libc::{poll, pollfd, POLLIN, POLLOUT};

        let mut pfd = pollfd {
            fd: self.stream.as_raw_fd(),
            events: match events {
                PollEvents::Read => POLLIN,
                PollEvents::Write => POLLOUT,
                PollEvents::Both => POLLIN | POLLOUT,
            },
            revents: 0,
        };

        let timeout_ms = timeout
            .map(|d| d.as_millis().min(i32::MAX as u128) as i32)
            .unwrap_or(-1); // -1 = infinite

        let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };

        if result < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }

        Ok(result > 0)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf).map_err(Error::from)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.stream.write(buf).map_err(Error::from)
    }

    fn close(&mut self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(Error::from(e)),
            _ => Ok(()),
        }
    }
}

/// TCP stream whose blocking reads and writes all share one deadline
///
/// Used beneath OpenSSL, whose blocking handshake would otherwise wait
/// per read and could be stretched forever by a peer trickling bytes.
#[derive(Debug)]
pub struct DeadlineStream {
    stream: TcpStream,
    deadline: Option<Instant>,
}

impl DeadlineStream {
    pub fn new(stream: TcpStream, deadline: Instant) -> Self {
        DeadlineStream {
            stream,
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn get_ref(&self) -> &TcpStream {
        &self.stream
    }

    /// Shrink the socket timeout to what is left of the deadline
    fn arm(&self, write: bool) -> io::Result<()> {
        let Some(deadline) = self.deadline else {
            return Ok(());
        };
        let left = remaining(deadline)
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "deadline expired"))?;
        if write {
            self.stream.set_write_timeout(Some(left))
        } else {
            self.stream.set_read_timeout(Some(left))
        }
    }
}

impl From<TcpStream> for DeadlineStream {
    fn from(stream: TcpStream) -> Self {
        DeadlineStream {
            stream,
            deadline: None,
        }
    }
}

impl Read for DeadlineStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.arm(false)?;
        self.stream.read(buf)
    }
}

impl Write for DeadlineStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.arm(true)?;
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl AsRawFd for DeadlineStream {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_fd_session_ops() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"Hello").unwrap();
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut session = FdSessionOps::new(stream);

        assert!(session.poll(PollEvents::Read, Some(Duration::from_secs(1))).unwrap());

        let mut buf = [0u8; 5];
        let n = session.read(&mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf, b"Hello");

        handle.join().unwrap();
    }

    #[test]
    fn test_http_session_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let _handle = thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_secs(2));
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut session = HttpSession::new(FdSessionOps::new(stream));
        session.set_timeout(Some(Duration::from_millis(100)));

        let mut buf = [0u8; 10];
        let result = session.read(&mut buf);
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[test]
    fn test_deadline_bounds_a_trickling_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            for _ in 0..20 {
                if stream.write_all(b"x").is_err() {
                    break;
                }
                thread::sleep(Duration::from_millis(100));
            }
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut session = HttpSession::new(FdSessionOps::new(stream));
        session.set_timeout(Some(Duration::from_secs(5)));
        session.set_deadline(Some(Instant::now() + Duration::from_millis(500)));

        let started = Instant::now();
        let mut buf = [0u8; 1];
        let err = loop {
            match session.read(&mut buf) {
                Ok(0) => panic!("peer closed before the deadline"),
                Ok(_) => continue,
                Err(e) => break e,
            }
        };
        assert!(matches!(err, Error::Timeout));
        assert!(started.elapsed() < Duration::from_millis(1500));

        drop(session);
        handle.join().unwrap();
    }

    #[test]
    fn test_deadline_stream_expired() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let tcp = TcpStream::connect(addr).unwrap();
        let _accepted = listener.accept().unwrap();

        let mut stream = DeadlineStream::new(tcp, Instant::now() - Duration::from_secs(1));
        let mut buf = [0u8; 4];
        let err = stream.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert_eq!(stream.write(b"late").unwrap_err().kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_remaining_expired() {
        let past = Instant::now() - Duration::from_secs(1);
        assert!(matches!(remaining(past), Err(Error::Timeout)));
        assert!(remaining(Instant::now() + Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn test_write_all() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).unwrap();
            received
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut session = HttpSession::new(FdSessionOps::new(stream));
        let payload = vec![b'x'; 64 * 1024];
        session.write_all(&payload).unwrap();
        session.close().unwrap();

        assert_eq!(handle.join().unwrap().len(), payload.len());
    }
}
