//! Client library for the semadraw compositor.
//!
//! [`Connection`] wraps a Unix-domain or TCP socket, performs the HELLO
//! handshake, and exposes one async method per request. Replies are
//! correlated by the mirrored type bits; unsolicited `0x9xxx` events
//! arriving between a request and its reply are queued and drained with
//! [`Connection::poll_event`] / [`Connection::next_event`].
//!
//! Remote (TCP) connections use the inline-buffer attach path only — no
//! FD passing — and their assigned client IDs carry the remote high bit.
//!
//! Clients build their frames with [`semadraw_sdcs::StreamEncoder`],
//! re-exported here so a drawing client needs only this crate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod connection;
mod error;

pub use connection::{Connection, NegotiatedLimits};
pub use error::ClientError;
pub use semadraw_proto::{Message, payloads};
pub use semadraw_sdcs::StreamEncoder;
