use clap::Parser;
use mtls_hello::cli::{Cli, Mode};
use mtls_hello::{app, Error, ErrorKind};
use std::io::Write;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Logs go to stderr; stdout only carries the response body
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => return fail(Error::from(e)),
    };

    match run(cli.into_mode()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

fn run(mode: Mode) -> mtls_hello::Result<()> {
    match mode {
        Mode::Server(settings) => app::run_server(&settings),
        Mode::Client(settings) => {
            let body = app::run_client(&settings)?;
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&body)
                .and_then(|()| stdout.write_all(b"\n"))
                .and_then(|()| stdout.flush())
                .map_err(|e| Error::network("write response", e))
        }
    }
}

fn fail(err: Error) -> ExitCode {
    if err.kind() == ErrorKind::Usage {
        eprint!("{}", err);
        return ExitCode::from(2);
    }

    // The message already embeds every layer's cause
    eprintln!("error: {} ({})", err, err.kind().as_str());
    ExitCode::from(1)
}
