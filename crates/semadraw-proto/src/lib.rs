//! Compositor IPC wire protocol.
//!
//! Framed binary messages over a stream socket: an 8-byte little-endian
//! header (type, flags, payload length) followed by a fixed-layout
//! payload. The 16-bit type space is partitioned: `0x0xxx` are client
//! requests, `0x8xxx` are server replies whose low bits mirror their
//! request, and `0x9xxx` are unsolicited server events.
//!
//! Payloads are plain structs of little-endian scalars with no padding,
//! cast directly from untrusted bytes via `zerocopy`. Variable-length
//! content (inline SDCS bytes, clipboard data) rides as a length-prefixed
//! trailer behind its fixed header.
//!
//! Byte-identical compatibility is promised for the frame header,
//! HELLO/HELLO_REPLY, the inline-attach framing, the clipboard-data
//! framing, and the key/mouse event framing; everything else may evolve
//! within minor versions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod frame;
mod header;
pub mod payloads;
mod types;

pub use error::ProtocolError;
pub use frame::WireFrame;
pub use header::WireHeader;
pub use payloads::Message;
pub use types::{MsgClass, MsgType};

/// Protocol result alias.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Wire protocol major version. Exact match required at HELLO.
pub const PROTOCOL_MAJOR: u16 = 1;

/// Wire protocol minor version. Additive.
pub const PROTOCOL_MINOR: u16 = 0;

/// High bit of a client ID marks a remote (TCP) client.
pub const REMOTE_CLIENT_BIT: u64 = 1 << 63;

/// Default TCP port of the daemon's remote listener.
pub const DEFAULT_TCP_PORT: u16 = 7234;
