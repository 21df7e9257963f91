use crate::config::{ServerConfig, DEFAULT_MAX_CONNECTIONS, DEFAULT_PAGE, DEFAULT_PORT};
use crate::error::AppError;
use crate::mime::MimeFallback;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

// Command-line interface of the standalone server binary.
#[derive(Parser, Debug)]
#[command(
    version,
    about = "A small embeddable HTTP/1.0 file server with multipart uploads.",
    long_about = "Serves files from a directory over a restricted HTTP/1.0 subset and accepts multipart uploads into it.\n A GET on a directory serves its default page. A POST to the upload path stores every named file part under the root.\n At most --max-connections requests are handled at once; extra connections are answered with 503 Server Busy.\n The server will respond with 404 Not Found if the requested file does not exist, 403 Forbidden if the path leaves the root, and 501 Not Implemented for methods other than GET and POST.\n"
)]
pub struct Cli {
    /// Directory path to serve and store uploads in, mandatory.
    #[arg(short, long, required = true)]
    pub directory: PathBuf,

    /// Host address to listen on (e.g., "127.0.0.1" for local, "0.0.0.0" for everyone on the network).
    #[arg(short, long, default_value = "0.0.0.0")]
    pub listen: String,

    /// Port number to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Maximum number of connections handled at the same time.
    #[arg(short, long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: usize,

    /// File served when a directory is requested.
    #[arg(long, default_value = DEFAULT_PAGE)]
    pub default_page: String,

    /// Path that accepts multipart uploads.
    #[arg(long, default_value = "/")]
    pub upload_path: String,

    /// Answer 500 for files with an unknown extension instead of serving them as text/html.
    #[arg(long, default_value_t = false)]
    pub strict_mime: bool,

    /// Serve simulated device telemetry as JSON on /telemetry.
    #[arg(long, default_value_t = false)]
    pub telemetry: bool,

    /// Enable verbose logging for debugging (log level: debug).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Enable more detailed logging (log level: info if verbose=false, debug if verbose=true).
    #[arg(long, default_value_t = false)]
    pub detailed_logging: bool,
}

impl Cli {
    pub fn to_config(&self) -> Result<ServerConfig, AppError> {
        let ip: IpAddr = self.listen.parse()?;
        let fallback = if self.strict_mime {
            MimeFallback::Reject
        } else {
            MimeFallback::default()
        };

        Ok(ServerConfig::new(&self.directory)
            .with_addr(SocketAddr::new(ip, self.port))
            .with_max_connections(self.max_connections)
            .with_default_page(&self.default_page)
            .with_upload_path(&self.upload_path)
            .with_mime_fallback(fallback))
    }
}
