//! semadrawd binary.
//!
//! # Usage
//!
//! ```bash
//! # Reference software backend on the default socket
//! semadrawd --backend software
//!
//! # Headless with a TCP listener for remote clients
//! semadrawd --backend headless --tcp-bind 0.0.0.0:7234
//! ```
//!
//! Exit codes: 0 on normal shutdown, non-zero on startup failure (socket
//! bind, backend init).

use std::process::ExitCode;

use clap::Parser;
use semadraw_daemon::{
    BackendConfig, BackendKind, Daemon, DaemonConfig, DaemonRuntimeConfig, SessionLimits,
    create_backend, isolated::run_backend_host,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Semantic draw compositor daemon
#[derive(Parser, Debug)]
#[command(name = "semadrawd")]
#[command(about = "Compositor daemon for semantic draw command streams")]
#[command(version)]
struct Args {
    /// Display backend
    #[arg(long, value_enum, default_value = "software")]
    backend: BackendKind,

    /// Unix socket path
    #[arg(long, default_value = "/tmp/semadrawd.sock")]
    socket: std::path::PathBuf,

    /// TCP bind address for remote clients (e.g. 0.0.0.0:7234)
    #[arg(long)]
    tcp_bind: Option<String>,

    /// Screen width in pixels
    #[arg(long, default_value = "1024")]
    width: u32,

    /// Screen height in pixels
    #[arg(long, default_value = "768")]
    height: u32,

    /// Target refresh rate in Hz
    #[arg(long, default_value = "60")]
    refresh: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Serve the named backend over stdio for a parent daemon
    /// (process-isolation host mode)
    #[arg(long, hide = true)]
    backend_host: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

    if args.backend_host {
        return host_mode(args.backend);
    }

    tracing::info!("semadrawd starting");

    let config = DaemonRuntimeConfig {
        socket_path: args.socket,
        tcp_bind: args.tcp_bind,
        backend: args.backend,
        driver: DaemonConfig {
            limits: SessionLimits::default(),
            refresh_period_us: 1_000_000 / u64::from(args.refresh.max(1)),
            screen: BackendConfig { width: args.width, height: args.height },
        },
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "runtime build failed");
            return ExitCode::FAILURE;
        },
    };

    runtime.block_on(async {
        let daemon = match Daemon::bind(config).await {
            Ok(daemon) => daemon,
            Err(e) => {
                tracing::error!(error = %e, "startup failed");
                return ExitCode::FAILURE;
            },
        };
        match daemon.run().await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "daemon failed");
                ExitCode::FAILURE
            },
        }
    })
}

/// Process-isolation host: serve the backend over stdio and exit.
fn host_mode(kind: BackendKind) -> ExitCode {
    let backend = match create_backend(kind) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!(error = %e, "backend host init failed");
            return ExitCode::FAILURE;
        },
    };
    match run_backend_host(backend, std::io::stdin().lock(), std::io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "backend host transport failed");
            ExitCode::FAILURE
        },
    }
}
