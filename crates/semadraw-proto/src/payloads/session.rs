//! Session management payloads: handshake, sync barrier, errors.

use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout,
    byteorder::little_endian::{U16, U32, U64},
};

/// Initial handshake. Must be the first message on every session; the
/// layout is byte-identical across all protocol versions so version
/// negotiation itself can never break.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct Hello {
    /// Client's protocol major version. Must match the daemon's exactly.
    pub version_major: U16,
    /// Client's protocol minor version.
    pub version_minor: U16,
    /// Client capability flags. Reserved bits ignored but preserved.
    pub flags: U32,
}

impl Hello {
    /// A handshake for the current protocol version.
    #[must_use]
    pub fn current() -> Self {
        Self {
            version_major: U16::new(crate::PROTOCOL_MAJOR),
            version_minor: U16::new(crate::PROTOCOL_MINOR),
            flags: U32::new(0),
        }
    }
}

/// Reply to [`Hello`]: assigned client ID and per-client limits.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct HelloReply {
    /// Assigned client ID. High bit set for remote (TCP) clients.
    pub client_id: U64,
    /// Daemon's protocol major version.
    pub version_major: U16,
    /// Daemon's protocol minor version.
    pub version_minor: U16,
    /// Maximum live surfaces for this client.
    pub max_surfaces: U32,
    /// Maximum total attached-buffer bytes for this client.
    pub max_buffer_bytes: U64,
    /// Maximum inline payload bytes per message.
    pub max_inline_bytes: U32,
}

/// Sync barrier request and its `SyncDone` reply share this payload; the
/// serial correlates the two.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct SyncPayload {
    /// Client-chosen serial echoed in the reply.
    pub serial: U32,
}

/// Length prefix for a variable trailer (clipboard framing).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct TrailerLen {
    /// Trailer bytes that follow this prefix.
    pub byte_len: U32,
}

/// Error reply to any request.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ErrorReply {
    /// Type tag of the request that failed.
    pub request_type: U16,
    /// Numeric error code (see associated constants).
    pub code: U16,
    /// Context for the code; SDCS validation errors carry the byte
    /// offset of the defect here, otherwise zero.
    pub offset: U64,
}

impl ErrorReply {
    /// HELLO expected but something else arrived, or version mismatch.
    pub const BAD_HANDSHAKE: u16 = 0x0001;
    /// Request names a surface this daemon does not know.
    pub const SURFACE_NOT_FOUND: u16 = 0x0002;
    /// Request names a surface owned by another client.
    pub const NOT_OWNER: u16 = 0x0003;
    /// Per-client surface limit exceeded.
    pub const SURFACE_LIMIT: u16 = 0x0004;
    /// Per-client buffer byte limit exceeded.
    pub const BUFFER_LIMIT: u16 = 0x0005;
    /// Inline payload exceeds the per-message limit.
    pub const INLINE_TOO_LARGE: u16 = 0x0006;
    /// Attached SDCS bytes failed validation; `offset` points at the
    /// defect.
    pub const INVALID_STREAM: u16 = 0x0007;
    /// Frame malformed for the session state.
    pub const PROTOCOL: u16 = 0x0008;
    /// No buffer attached at commit time.
    pub const NO_BUFFER: u16 = 0x0009;

    /// An error reply for `request_type`.
    #[must_use]
    pub fn new(request_type: u16, code: u16, offset: u64) -> Self {
        Self {
            request_type: U16::new(request_type),
            code: U16::new(code),
            offset: U64::new(offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use zerocopy::IntoBytes as _;

    use super::*;

    #[test]
    fn hello_layout_is_pinned() {
        assert_eq!(std::mem::size_of::<Hello>(), 8);
        let hello = Hello::current();
        let bytes = hello.as_bytes();
        assert_eq!(&bytes[0..2], &crate::PROTOCOL_MAJOR.to_le_bytes());
        assert_eq!(&bytes[2..4], &crate::PROTOCOL_MINOR.to_le_bytes());
    }

    #[test]
    fn hello_reply_layout_is_pinned() {
        assert_eq!(std::mem::size_of::<HelloReply>(), 28);
    }

    #[test]
    fn error_reply_round_trips() {
        let e = ErrorReply::new(0x0006, ErrorReply::INVALID_STREAM, 112);
        let parsed = ErrorReply::read_from_bytes(e.as_bytes()).unwrap();
        assert_eq!(parsed.code.get(), ErrorReply::INVALID_STREAM);
        assert_eq!(parsed.offset.get(), 112);
    }
}
