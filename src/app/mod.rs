//! Server and client modes

pub mod routes;
pub mod server;

pub use routes::Greeting;
pub use server::Server;

use crate::error::{Error, Result};
use crate::http::{self, HttpsClient};
use crate::settings::{ClientSettings, ServerSettings};
use tracing::info;

/// Serve the hello endpoint until the process is killed
pub fn run_server(settings: &ServerSettings) -> Result<()> {
    let server = Server::bind(settings, routes::router())?;
    server.serve()
}

/// Fetch the configured URL once and return the response body.
///
/// Anything other than a 2xx status is a protocol error.
pub fn run_client(settings: &ClientSettings) -> Result<Vec<u8>> {
    let client =
        HttpsClient::from_settings(settings).map_err(|e| Error::tls("client policy", e))?;

    let url = settings.url();
    info!(%url, "requesting");

    let response = client
        .get(&settings.host, settings.port, &settings.path)
        .map_err(|e| Error::http(format!("GET {}", url), e))?;

    if !response.status().is_success() {
        return Err(Error::http(
            format!("GET {}", url),
            http::Error::Protocol(format!("unexpected status {}", response.status())),
        ));
    }

    Ok(response.body().to_vec())
}
