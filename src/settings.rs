//! Explicit configuration for both modes
//!
//! The literal paths and port the demo has always used are only defaults;
//! callers (the CLI, tests) override whatever they need.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default HTTPS port
pub const DEFAULT_PORT: u16 = 1443;

/// Default host the client connects to (must match the server certificate SAN)
pub const DEFAULT_HOST: &str = "localhost";

/// Default per-request client timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3 * 60);

pub const DEFAULT_CA_CERT: &str = "./ca.crt";
pub const DEFAULT_SERVER_CERT: &str = "./server.crt";
pub const DEFAULT_SERVER_KEY: &str = "./server.key";
pub const DEFAULT_CLIENT_CERT: &str = "./client.crt";
pub const DEFAULT_CLIENT_KEY: &str = "./client.key";

/// `host:port`, with IPv6 literals in brackets as URLs and Host headers need
pub fn authority(host: &str, port: u16) -> String {
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V6(ip)) => format!("[{}]:{}", ip, port),
        _ => format!("{}:{}", host, port),
    }
}

/// CA certificate plus the certificate/key pair of one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityPaths {
    pub ca_cert: PathBuf,
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl IdentityPaths {
    pub fn new(
        ca_cert: impl Into<PathBuf>,
        cert: impl Into<PathBuf>,
        key: impl Into<PathBuf>,
    ) -> Self {
        IdentityPaths {
            ca_cert: ca_cert.into(),
            cert: cert.into(),
            key: key.into(),
        }
    }

    /// Same three file names, resolved under `dir`
    pub fn in_dir(&self, dir: &Path) -> Self {
        IdentityPaths {
            ca_cert: dir.join(&self.ca_cert),
            cert: dir.join(&self.cert),
            key: dir.join(&self.key),
        }
    }

    pub fn server_default() -> Self {
        IdentityPaths::new(DEFAULT_CA_CERT, DEFAULT_SERVER_CERT, DEFAULT_SERVER_KEY)
    }

    pub fn client_default() -> Self {
        IdentityPaths::new(DEFAULT_CA_CERT, DEFAULT_CLIENT_CERT, DEFAULT_CLIENT_KEY)
    }
}

/// Server mode configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub identity: IdentityPaths,
    pub listen: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            identity: IdentityPaths::server_default(),
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
        }
    }
}

/// Client mode configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub identity: IdentityPaths,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub timeout: Duration,
}

impl ClientSettings {
    /// URL of the resource fetched in client mode
    pub fn url(&self) -> String {
        format!("https://{}{}", authority(&self.host, self.port), self.path)
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        ClientSettings {
            identity: IdentityPaths::client_default(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            path: "/".to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let settings = ServerSettings::default();
        assert_eq!(settings.identity.ca_cert, PathBuf::from("./ca.crt"));
        assert_eq!(settings.identity.cert, PathBuf::from("./server.crt"));
        assert_eq!(settings.identity.key, PathBuf::from("./server.key"));
        assert_eq!(settings.listen.port(), 1443);
        assert!(settings.listen.ip().is_unspecified());
    }

    #[test]
    fn test_client_defaults() {
        let settings = ClientSettings::default();
        assert_eq!(settings.identity.cert, PathBuf::from("./client.crt"));
        assert_eq!(settings.identity.key, PathBuf::from("./client.key"));
        assert_eq!(settings.timeout, Duration::from_secs(180));
        assert_eq!(settings.url(), "https://localhost:1443/");
    }

    #[test]
    fn test_authority_brackets_ipv6() {
        assert_eq!(authority("localhost", 1443), "localhost:1443");
        assert_eq!(authority("127.0.0.1", 1443), "127.0.0.1:1443");
        assert_eq!(authority("::1", 1443), "[::1]:1443");

        let settings = ClientSettings {
            host: "::1".to_string(),
            ..ClientSettings::default()
        };
        assert_eq!(settings.url(), "https://[::1]:1443/");
    }

    #[test]
    fn test_in_dir() {
        let paths = IdentityPaths::new("ca.crt", "client.crt", "client.key");
        let moved = paths.in_dir(Path::new("/tmp/pki"));
        assert_eq!(moved.ca_cert, PathBuf::from("/tmp/pki/ca.crt"));
        assert_eq!(moved.key, PathBuf::from("/tmp/pki/client.key"));
    }
}
