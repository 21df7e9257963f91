/// # osmz_httpd
///
/// A minimal concurrent HTTP/1.0 server meant to be embedded in a host
/// application. GET serves files from a root directory, POST stores
/// multipart uploads in it, and a fixed number of admission permits bounds
/// how many connections are handled at once.
///
/// Hosts build a [`Server`] from a [`ServerConfig`] and an [`EventSink`];
/// the `run` function is the entry point of the bundled binary.
pub mod admission;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod fs;
pub mod http;
pub mod mime;
pub mod request;
pub mod response;
pub mod server;
pub mod telemetry;
pub mod upload;
pub mod utils;

pub use config::ServerConfig;
pub use error::AppError;
pub use events::{ChannelSink, EventSink, LogSink, NullSink};
pub use server::{Server, ServerState};
pub use telemetry::{RandomTelemetry, TelemetrySource};

use crate::cli::Cli;
use clap::Parser;
use log::error;
use std::sync::{mpsc, Arc};

/// Initializes the logger, parses command-line arguments, and runs the server
/// until the process is terminated.
pub fn run() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        "debug"
    } else if cli.detailed_logging {
        "info"
    } else {
        "warn"
    };

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", log_level);
    }
    env_logger::init();

    log::debug!("Log level set to: {log_level}");

    if let Err(e) = serve(&cli) {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}

fn serve(cli: &Cli) -> Result<(), AppError> {
    let (tx, rx) = mpsc::channel();
    let mut server = Server::new(cli.to_config()?, Arc::new(ChannelSink::new(tx)));
    if cli.telemetry {
        server = server.with_telemetry(Arc::new(RandomTelemetry));
    }

    let addr = server.start()?;
    println!(
        "Listening on {} for directory {}",
        addr,
        cli.directory.display()
    );

    // The server keeps the sender alive, so this drains events for as long
    // as it runs.
    for event in rx {
        println!("{event}");
    }

    server.stop();
    server.wait_until_stopped();
    Ok(())
}
