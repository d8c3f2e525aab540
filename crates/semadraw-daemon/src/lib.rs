//! semadrawd: the compositor daemon.
//!
//! # Architecture
//!
//! The core is the Sans-IO [`DaemonDriver`]: sessions, surface registry,
//! compositor, and backend vtable, driven purely by events. This crate's
//! runtime wraps it with real I/O — a Unix-domain listener, an optional
//! TCP listener for remote clients (inline buffers only, no FD passing),
//! and the frame timer — on a current-thread tokio runtime: the core is
//! single-threaded cooperative, and only socket I/O and the timer ever
//! suspend.
//!
//! # Components
//!
//! - [`DaemonDriver`]: event-in/action-out orchestrator (pure logic)
//! - [`SurfaceRegistry`]: surface identity, Z-order, composition bracket
//! - [`Compositor`]: frame scheduling and backend dispatch
//! - [`Backend`]: capability vtable; [`SoftwareBackend`] is the semantic
//!   reference, [`IsolatedBackend`] hosts untrusted implementations in a
//!   child process
//! - [`Daemon`]: the production runtime binding sockets to the driver

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
mod compositor;
mod damage;
mod driver;
mod error;
pub mod isolated;
mod registry;
mod session;
mod surface;

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

pub use backend::{Backend, BackendConfig, BackendError, BackendKind, SoftwareBackend, create_backend};
use bytes::BytesMut;
pub use compositor::{Compositor, FrameOutcome};
pub use damage::{DamageRect, DamageTracker};
pub use driver::{DaemonAction, DaemonConfig, DaemonDriver, DaemonEvent};
pub use error::DaemonError;
pub use isolated::IsolatedBackend;
pub use registry::{SurfaceRegistry, UnknownSurface};
use semadraw_proto::{WireFrame, WireHeader};
pub use session::{ClientSession, SessionLimits};
pub use surface::{AttachedBuffer, NoShm, ShmMapper, Surface};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::{Mutex, mpsc},
};

/// Runtime configuration for [`Daemon::bind`].
#[derive(Debug, Clone)]
pub struct DaemonRuntimeConfig {
    /// Unix socket path; the daemon's only filesystem artifact.
    pub socket_path: PathBuf,
    /// Optional TCP bind address (e.g. `0.0.0.0:7234`) for remote
    /// clients.
    pub tcp_bind: Option<String>,
    /// Backend selector.
    pub backend: BackendKind,
    /// Driver configuration (limits, refresh, screen geometry).
    pub driver: DaemonConfig,
}

impl Default for DaemonRuntimeConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/tmp/semadrawd.sock"),
            tcp_bind: None,
            backend: BackendKind::Software,
            driver: DaemonConfig::default(),
        }
    }
}

/// Outbound frame queues, keyed by session.
struct SharedState {
    senders: Mutex<HashMap<u64, mpsc::UnboundedSender<WireFrame>>>,
}

/// The production daemon runtime.
pub struct Daemon {
    driver: Arc<Mutex<DaemonDriver>>,
    unix: tokio::net::UnixListener,
    tcp: Option<tokio::net::TcpListener>,
    socket_path: PathBuf,
    refresh_period: Duration,
}

impl Daemon {
    /// Select the backend, build the driver, and bind the listeners.
    ///
    /// # Errors
    ///
    /// [`DaemonError::Backend`] when the selected backend refuses to
    /// initialize, [`DaemonError::Bind`] when a listener cannot bind.
    /// Both are startup failures: the process exits non-zero.
    pub async fn bind(config: DaemonRuntimeConfig) -> Result<Self, DaemonError> {
        let backend = create_backend(config.backend)?;
        let driver = DaemonDriver::new(backend, config.driver)?;

        // The socket path is ours; a stale file from a dead daemon would
        // otherwise block the bind.
        let _ = std::fs::remove_file(&config.socket_path);
        let unix =
            tokio::net::UnixListener::bind(&config.socket_path).map_err(DaemonError::Bind)?;

        let tcp = match &config.tcp_bind {
            Some(addr) => {
                Some(tokio::net::TcpListener::bind(addr).await.map_err(DaemonError::Bind)?)
            },
            None => None,
        };

        tracing::info!(socket = %config.socket_path.display(), tcp = ?config.tcp_bind, "listening");

        Ok(Self {
            driver: Arc::new(Mutex::new(driver)),
            unix,
            tcp,
            socket_path: config.socket_path,
            refresh_period: Duration::from_micros(config.driver.refresh_period_us),
        })
    }

    /// The TCP listener's local address, when one is bound. Useful when
    /// binding to port 0.
    pub fn tcp_local_addr(&self) -> Option<std::net::SocketAddr> {
        self.tcp.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Run until Ctrl-C. Accepts connections, pumps the frame timer, and
    /// executes driver actions.
    pub async fn run(self) -> Result<(), DaemonError> {
        let shared = Arc::new(SharedState { senders: Mutex::new(HashMap::new()) });
        let next_session = Arc::new(AtomicU64::new(1));

        let unix_accept = {
            let driver = Arc::clone(&self.driver);
            let shared = Arc::clone(&shared);
            let next = Arc::clone(&next_session);
            let listener = self.unix;
            tokio::spawn(async move {
                loop {
                    match listener.accept().await {
                        Ok((stream, _)) => {
                            let session_id = next.fetch_add(1, Ordering::Relaxed);
                            spawn_session(stream, session_id, false, Arc::clone(&driver), Arc::clone(&shared));
                        },
                        Err(e) => tracing::error!(error = %e, "unix accept failed"),
                    }
                }
            })
        };

        let tcp_accept = self.tcp.map(|listener| {
            let driver = Arc::clone(&self.driver);
            let shared = Arc::clone(&shared);
            let next = Arc::clone(&next_session);
            tokio::spawn(async move {
                loop {
                    match listener.accept().await {
                        Ok((stream, peer)) => {
                            let session_id = next.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!(%peer, session = session_id, "remote connection");
                            spawn_session(stream, session_id, true, Arc::clone(&driver), Arc::clone(&shared));
                        },
                        Err(e) => tracing::error!(error = %e, "tcp accept failed"),
                    }
                }
            })
        });

        let timer = {
            let driver = Arc::clone(&self.driver);
            let shared = Arc::clone(&shared);
            let period = self.refresh_period;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                let start = Instant::now();
                let mut last_cost_us: u64 = 0;
                loop {
                    interval.tick().await;
                    let tick_start = Instant::now();
                    let actions = {
                        let mut driver = driver.lock().await;
                        driver.handle(DaemonEvent::Tick {
                            now_us: start.elapsed().as_micros() as u64,
                            last_tick_cost_us: last_cost_us,
                        })
                    };
                    apply_actions(actions, &shared).await;
                    last_cost_us = tick_start.elapsed().as_micros() as u64;
                }
            })
        };

        tokio::signal::ctrl_c().await?;
        tracing::info!("shutting down");
        unix_accept.abort();
        if let Some(handle) = tcp_accept {
            handle.abort();
        }
        timer.abort();
        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }
}

/// Spawn the reader and writer tasks for one accepted socket.
fn spawn_session<S>(
    stream: S,
    session_id: u64,
    remote: bool,
    driver: Arc<Mutex<DaemonDriver>>,
    shared: Arc<SharedState>,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    tokio::spawn(async move {
        let (reader, writer) = tokio::io::split(stream);

        let (tx, rx) = mpsc::unbounded_channel::<WireFrame>();
        shared.senders.lock().await.insert(session_id, tx);

        let writer_task = tokio::spawn(write_loop(writer, rx));

        {
            let mut driver = driver.lock().await;
            let actions = driver.handle(DaemonEvent::ConnectionAccepted { session_id, remote });
            drop(driver);
            apply_actions(actions, &shared).await;
        }

        if let Err(e) = read_loop(reader, session_id, &driver, &shared).await {
            tracing::debug!(session = session_id, error = %e, "session ended");
        }

        // Dropping the sender lets the writer drain queued frames (a
        // final ERROR_REPLY, say) and exit on its own.
        shared.senders.lock().await.remove(&session_id);
        let _ = writer_task.await;

        let actions = {
            let mut driver = driver.lock().await;
            driver.handle(DaemonEvent::ConnectionClosed { session_id })
        };
        apply_actions(actions, &shared).await;
    });
}

/// Read frames off one socket and feed them to the driver.
async fn read_loop<R>(
    mut reader: R,
    session_id: u64,
    driver: &Arc<Mutex<DaemonDriver>>,
    shared: &Arc<SharedState>,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(64 * 1024);
    loop {
        buf.clear();
        buf.resize(WireHeader::SIZE, 0);
        reader.read_exact(&mut buf[..WireHeader::SIZE]).await?;

        let (msg_type, payload_len) = match WireHeader::parse(&buf[..WireHeader::SIZE]) {
            Ok(header) => (header.msg_type.get(), header.length.get() as usize),
            Err(e) => {
                // Framing is unrecoverable; drop the session.
                tracing::warn!(session = session_id, error = %e, "bad frame header");
                return Ok(());
            },
        };

        buf.resize(WireHeader::SIZE + payload_len, 0);
        reader.read_exact(&mut buf[WireHeader::SIZE..]).await?;

        let frame = WireFrame::new(msg_type, buf[WireHeader::SIZE..].to_vec());
        let actions = {
            let mut driver = driver.lock().await;
            driver.handle(DaemonEvent::FrameReceived { session_id, frame })
        };
        let closing = actions
            .iter()
            .any(|a| matches!(a, DaemonAction::Close { session_id: id, .. } if *id == session_id));
        apply_actions(actions, shared).await;
        if closing {
            return Ok(());
        }
    }
}

/// Drain the outbound queue onto one socket.
async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<WireFrame>)
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(64 * 1024);
    while let Some(frame) = rx.recv().await {
        buf.clear();
        if frame.encode(&mut buf).is_err() {
            tracing::warn!("dropping oversized outbound frame");
            continue;
        }
        if let Err(e) = writer.write_all(&buf).await {
            tracing::debug!(error = %e, "write failed");
            return;
        }
    }
    let _ = writer.shutdown().await;
}

/// Execute driver actions against the session queues.
async fn apply_actions(actions: Vec<DaemonAction>, shared: &Arc<SharedState>) {
    for action in actions {
        match action {
            DaemonAction::Send { session_id, frame } => {
                let senders = shared.senders.lock().await;
                if let Some(sender) = senders.get(&session_id) {
                    if sender.send(frame).is_err() {
                        tracing::debug!(session = session_id, "send to closed session");
                    }
                } else {
                    tracing::debug!(session = session_id, "send to unknown session");
                }
            },
            DaemonAction::Close { session_id, reason } => {
                tracing::info!(session = session_id, reason, "closing session");
                // Dropping the sender ends the writer task, which shuts
                // the socket down; the reader loop exits on its own.
                shared.senders.lock().await.remove(&session_id);
            },
        }
    }
}
