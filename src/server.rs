use crate::admission::Admission;
use crate::config::ServerConfig;
use crate::error::AppError;
use crate::events::EventSink;
use crate::fs::canonical_root;
use crate::http::{handle_client, HandlerContext};
use crate::response::HttpResponse;
use crate::telemetry::TelemetrySource;
use crate::utils::generate_request_id;
use log::{debug, error, info, warn};
use std::io::{ErrorKind, Read};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use threadpool::ThreadPool;

// Total time the accept thread may spend replying to and draining a rejected connection.
const BUSY_LINGER: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Listening,
    Stopping,
    Stopped,
}

/// An embeddable file server: GET serves files from the root, POST accepts
/// multipart uploads into it.
///
/// The listening socket lives on a dedicated accept thread. Each admitted
/// connection runs on a pool thread; when every permit is taken new
/// connections are answered with 503 straight from the accept thread.
pub struct Server {
    config: ServerConfig,
    sink: Arc<dyn EventSink>,
    telemetry: Option<Arc<dyn TelemetrySource>>,
    admission: Admission,
    state: Arc<Mutex<ServerState>>,
    shutdown: Arc<AtomicBool>,
    local_addr: Option<SocketAddr>,
    accept_thread: Option<JoinHandle<()>>,
}

impl Server {
    pub fn new(config: ServerConfig, sink: Arc<dyn EventSink>) -> Self {
        let admission = Admission::new(config.max_connections);
        Self {
            config,
            sink,
            telemetry: None,
            admission,
            state: Arc::new(Mutex::new(ServerState::Created)),
            shutdown: Arc::new(AtomicBool::new(false)),
            local_addr: None,
            accept_thread: None,
        }
    }

    /// Mounts a JSON source on the configured telemetry path.
    pub fn with_telemetry(mut self, source: Arc<dyn TelemetrySource>) -> Self {
        self.telemetry = Some(source);
        self
    }

    pub fn state(&self) -> ServerState {
        *lock(&self.state)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Connections currently holding an admission permit.
    pub fn active_connections(&self) -> usize {
        self.admission.in_use()
    }

    /// Highest number of connections ever handled at once.
    pub fn peak_connections(&self) -> usize {
        self.admission.peak()
    }

    /// Binds the listening socket and starts the accept loop in the background.
    ///
    /// Bind failures and an unusable root are returned to the caller. Calling
    /// this on a server that is already listening does nothing.
    pub fn start(&mut self) -> Result<SocketAddr, AppError> {
        let mut state = lock(&self.state);
        match *state {
            ServerState::Created => {}
            ServerState::Listening => {
                info!("Server already listening on {:?}, ignoring start", self.local_addr);
                return self.local_addr.ok_or_else(|| {
                    AppError::InvalidState("listening without an address".to_string())
                });
            }
            ServerState::Stopping | ServerState::Stopped => {
                return Err(AppError::InvalidState(
                    "a stopped server cannot be restarted".to_string(),
                ));
            }
        }

        if self.config.max_connections == 0 {
            return Err(AppError::InvalidState(
                "max_connections must be at least 1".to_string(),
            ));
        }

        let root = canonical_root(&self.config.root)?;
        let listener = TcpListener::bind(self.config.addr)?;
        let local_addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        info!(
            "Server listening on {} for directory '{}' (max connections: {})",
            local_addr,
            root.display(),
            self.config.max_connections
        );

        let ctx = Arc::new(HandlerContext {
            root,
            config: self.config.clone(),
            sink: Arc::clone(&self.sink),
            telemetry: self.telemetry.clone(),
        });
        let accept_loop = AcceptLoop {
            listener,
            pool: ThreadPool::with_name("osmz-handler".to_string(), self.config.max_connections),
            ctx,
            admission: self.admission.clone(),
            shutdown: Arc::clone(&self.shutdown),
            poll_interval: self.config.accept_poll_interval,
        };
        let thread_state = Arc::clone(&self.state);

        let handle = thread::Builder::new()
            .name("osmz-accept".to_string())
            .spawn(move || {
                accept_loop.run();
                *lock(&thread_state) = ServerState::Stopped;
                info!("Server stopped.");
            })?;

        self.accept_thread = Some(handle);
        self.local_addr = Some(local_addr);
        *state = ServerState::Listening;
        Ok(local_addr)
    }

    /// Asks the accept loop to close the listening socket and exit.
    ///
    /// Connections already being handled run to completion. Safe to call
    /// more than once.
    pub fn stop(&self) {
        let mut state = lock(&self.state);
        match *state {
            ServerState::Created => *state = ServerState::Stopped,
            ServerState::Listening => {
                info!("Shutdown requested. Shutting down gracefully.");
                self.shutdown.store(true, Ordering::Release);
                *state = ServerState::Stopping;
            }
            ServerState::Stopping | ServerState::Stopped => {
                debug!("Server already stopping, ignoring stop");
            }
        }
    }

    /// Blocks until the accept loop has exited. Returns immediately when no
    /// loop was ever started; otherwise waits for a `stop` from elsewhere.
    pub fn wait_until_stopped(&mut self) {
        if let Some(handle) = self.accept_thread.take() {
            if handle.join().is_err() {
                error!("Accept loop panicked");
            }
            *lock(&self.state) = ServerState::Stopped;
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if self.accept_thread.is_some() {
            self.stop();
            self.wait_until_stopped();
        }
    }
}

fn lock(state: &Mutex<ServerState>) -> MutexGuard<'_, ServerState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

struct AcceptLoop {
    listener: TcpListener,
    pool: ThreadPool,
    ctx: Arc<HandlerContext>,
    admission: Admission,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl AcceptLoop {
    // Consumes the loop so the listener is closed exactly once, on return.
    fn run(self) {
        'server_loop: loop {
            if self.shutdown.load(Ordering::Acquire) {
                info!("Accept loop exiting, closing listener.");
                break 'server_loop;
            }

            match self.listener.accept() {
                Ok((stream, peer)) => self.dispatch(stream, peer),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(self.poll_interval);
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("Error accepting connection: {e}");
                    thread::sleep(self.poll_interval);
                }
            }
        }

        debug!(
            "{} handler(s) still running after accept loop exit",
            self.pool.active_count()
        );
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        let request_id = generate_request_id();
        let log_prefix = format!("[ReqID: {request_id}][Peer: {peer}]");

        // Accepted sockets may inherit the listener's non-blocking mode.
        if let Err(e) = stream.set_nonblocking(false) {
            warn!("{log_prefix} Failed to configure connection: {e}");
            return;
        }

        let Some(permit) = self.admission.try_acquire() else {
            warn!("{log_prefix} Connection limit reached, rejecting connection");
            reject_busy(stream, &log_prefix);
            self.ctx.sink.publish(format!("Server busy, rejected {peer}"));
            return;
        };

        self.ctx.sink.publish(format!("Client connected: {peer}"));
        let ctx = Arc::clone(&self.ctx);
        self.pool.execute(move || {
            let _permit = permit;
            debug!("{log_prefix} Handling client connection");
            handle_client(stream, &ctx, &log_prefix);
            debug!("{log_prefix} Client handled, releasing permit");
        });
    }
}

fn reject_busy(mut stream: TcpStream, log_prefix: &str) {
    let deadline = Instant::now() + BUSY_LINGER;
    if let Err(e) = stream.set_write_timeout(Some(BUSY_LINGER)) {
        warn!("{log_prefix} Failed to set write timeout: {e}");
    }
    if HttpResponse::error(503).send(&mut stream, log_prefix).is_err() {
        return;
    }
    // Drain the unread request so the close is a FIN, not a reset.
    let _ = stream.shutdown(Shutdown::Write);
    let mut discard = [0u8; 1024];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() || stream.set_read_timeout(Some(remaining)).is_err() {
            break;
        }
        if !matches!(stream.read(&mut discard), Ok(n) if n > 0) {
            break;
        }
    }
}
