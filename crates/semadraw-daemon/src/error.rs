//! Daemon error types.

use thiserror::Error;

/// Fatal daemon errors: startup failures and transport-level faults that
/// take the whole process down. Per-client faults never surface here;
/// they become ERROR_REPLY frames or session closes.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Could not bind the Unix or TCP listener.
    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),

    /// Backend refused to initialize.
    #[error("backend init failed: {0}")]
    Backend(#[from] crate::backend::BackendError),

    /// Transport I/O outside any single session.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}
