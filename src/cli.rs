//! Command-line interface
//!
//! No subcommand runs the server, `client` runs the client. The options
//! override the built-in defaults and can also come from the environment.

use crate::settings::{
    ClientSettings, IdentityPaths, ServerSettings, DEFAULT_CA_CERT, DEFAULT_CLIENT_CERT,
    DEFAULT_CLIENT_KEY, DEFAULT_SERVER_CERT, DEFAULT_SERVER_KEY,
};
use clap::{Parser, Subcommand};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Mutual-TLS hello world server and client
#[derive(Debug, Parser)]
#[command(name = "mtls-hello")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// CA certificate bundle (PEM) used to verify the peer
    #[arg(long, global = true, env = "MTLS_CA_CERT")]
    pub ca_cert: Option<PathBuf>,

    /// Certificate presented to the peer (PEM)
    #[arg(long, global = true, env = "MTLS_CERT")]
    pub cert: Option<PathBuf>,

    /// Private key matching --cert (PEM)
    #[arg(long, global = true, env = "MTLS_KEY")]
    pub key: Option<PathBuf>,

    /// Host the client connects to
    #[arg(long, global = true, env = "MTLS_HOST")]
    pub host: Option<String>,

    /// Port to listen on or connect to
    #[arg(long, global = true, env = "MTLS_PORT")]
    pub port: Option<u16>,

    /// Address the server binds to
    #[arg(long, global = true, env = "MTLS_BIND")]
    pub bind: Option<IpAddr>,

    /// Client request timeout in seconds
    #[arg(long, global = true, env = "MTLS_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Fetch https://<host>:<port>/ once and print the body
    Client,
}

/// What the process should do, fully configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Server(ServerSettings),
    Client(ClientSettings),
}

impl Cli {
    /// Resolve the selected mode, applying mode-specific defaults
    pub fn into_mode(self) -> Mode {
        match self.command {
            None => Mode::Server(self.server_settings()),
            Some(Command::Client) => Mode::Client(self.client_settings()),
        }
    }

    fn identity(&self, default_cert: &str, default_key: &str) -> IdentityPaths {
        IdentityPaths::new(
            self.ca_cert
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CA_CERT)),
            self.cert
                .clone()
                .unwrap_or_else(|| PathBuf::from(default_cert)),
            self.key.clone().unwrap_or_else(|| PathBuf::from(default_key)),
        )
    }

    fn server_settings(&self) -> ServerSettings {
        let defaults = ServerSettings::default();
        let ip = self.bind.unwrap_or(defaults.listen.ip());
        let port = self.port.unwrap_or(defaults.listen.port());

        ServerSettings {
            identity: self.identity(DEFAULT_SERVER_CERT, DEFAULT_SERVER_KEY),
            listen: SocketAddr::new(ip, port),
        }
    }

    fn client_settings(&self) -> ClientSettings {
        let defaults = ClientSettings::default();

        ClientSettings {
            identity: self.identity(DEFAULT_CLIENT_CERT, DEFAULT_CLIENT_KEY),
            host: self.host.clone().unwrap_or(defaults.host),
            port: self.port.unwrap_or(defaults.port),
            path: defaults.path,
            timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}
