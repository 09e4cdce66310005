//! mtls-hello - mutual TLS demonstration server and client
//!
//! A minimal HTTPS server that only talks to clients presenting a
//! certificate signed by a shared CA, and the client that talks to it.
//! Both sides are built on OpenSSL.

pub mod app;
pub mod cli;
pub mod error;
pub mod http;
pub mod settings;

pub use error::{Error, ErrorKind, Result};
