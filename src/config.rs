//! Server configuration.

use crate::mime::MimeFallback;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 12345;
pub const DEFAULT_MAX_CONNECTIONS: usize = 5;
pub const DEFAULT_PAGE: &str = "file.html";

/// Everything the host decides about a server instance.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listening socket to.
    pub addr: SocketAddr,
    /// Directory every served and uploaded path is resolved against.
    pub root: PathBuf,
    /// Maximum number of connections handled at the same time.
    pub max_connections: usize,
    /// File served when a GET targets a directory.
    pub default_page: String,
    /// The only path that accepts multipart uploads.
    pub upload_path: String,
    /// Path answered by the telemetry source, when one is mounted.
    pub telemetry_path: String,
    pub mime_fallback: MimeFallback,
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
    /// Read/write timeout applied to every accepted connection.
    pub io_timeout: Duration,
    /// How long the idle accept loop sleeps between polls.
    pub accept_poll_interval: Duration,
}

impl ServerConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_default_page(mut self, page: impl Into<String>) -> Self {
        self.default_page = page.into();
        self
    }

    pub fn with_upload_path(mut self, path: impl Into<String>) -> Self {
        self.upload_path = path.into();
        self
    }

    pub fn with_telemetry_path(mut self, path: impl Into<String>) -> Self {
        self.telemetry_path = path.into();
        self
    }

    pub fn with_mime_fallback(mut self, fallback: MimeFallback) -> Self {
        self.mime_fallback = fallback;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn with_accept_poll_interval(mut self, interval: Duration) -> Self {
        self.accept_poll_interval = interval;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            root: PathBuf::from("."),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            default_page: DEFAULT_PAGE.to_string(),
            upload_path: "/".to_string(),
            telemetry_path: "/telemetry".to_string(),
            mime_fallback: MimeFallback::default(),
            max_header_bytes: 8 * 1024,
            max_body_bytes: 64 * 1024 * 1024,
            io_timeout: Duration::from_secs(30),
            accept_poll_interval: Duration::from_millis(50),
        }
    }
}
