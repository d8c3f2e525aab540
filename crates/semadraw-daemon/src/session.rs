//! Per-client session state and resource limits.

use std::collections::HashSet;

/// Per-client resource ceilings, reported in HELLO_REPLY and enforced on
/// every request.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    /// Maximum live surfaces per client.
    pub max_surfaces: u32,
    /// Maximum total attached-buffer bytes per client.
    pub max_buffer_bytes: u64,
    /// Maximum inline payload bytes per message.
    pub max_inline_bytes: u32,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_surfaces: 64,
            max_buffer_bytes: 64 * 1024 * 1024,
            max_inline_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Where a session is in its lifecycle. HELLO must be the first message;
/// anything else in `AwaitingHello` closes the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket accepted, no HELLO yet.
    AwaitingHello,
    /// Handshake complete; requests are accepted.
    Active,
}

/// One connected client.
#[derive(Debug)]
pub struct ClientSession {
    /// Runtime socket identity (not the protocol client ID).
    pub session_id: u64,
    /// Protocol client ID, assigned at HELLO. High bit set for remote.
    pub client_id: Option<u64>,
    /// Whether this session arrived over TCP.
    pub remote: bool,
    /// Lifecycle state.
    pub state: SessionState,
    /// Version the client declared in HELLO.
    pub declared_version: Option<(u16, u16)>,
    /// Surfaces owned by this client.
    pub surfaces: HashSet<u64>,
    /// Total attached inline-buffer bytes currently held for this client.
    pub buffer_bytes: u64,
}

impl ClientSession {
    /// A fresh pre-handshake session.
    #[must_use]
    pub fn new(session_id: u64, remote: bool) -> Self {
        Self {
            session_id,
            client_id: None,
            remote,
            state: SessionState::AwaitingHello,
            declared_version: None,
            surfaces: HashSet::new(),
            buffer_bytes: 0,
        }
    }

    /// True once the handshake completed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_sessions_await_hello() {
        let s = ClientSession::new(7, false);
        assert!(!s.is_active());
        assert_eq!(s.client_id, None);
        assert!(s.surfaces.is_empty());
    }

    #[test]
    fn default_limits_are_sane() {
        let l = SessionLimits::default();
        assert!(l.max_surfaces > 0);
        assert!(l.max_buffer_bytes >= u64::from(l.max_inline_bytes));
    }
}
