//! Protocol error type.
//!
//! Strongly typed so the daemon can map each case to an ERROR_REPLY code
//! or a session close without string matching. We avoid `std::io::Error`
//! inside protocol logic; conversion happens at the transport boundary.

use thiserror::Error;

/// Errors from frame and payload parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Buffer shorter than a complete frame header.
    #[error("frame too short: {actual} bytes, header needs {expected}")]
    FrameTooShort {
        /// Bytes required.
        expected: usize,
        /// Bytes present.
        actual: usize,
    },

    /// Payload shorter than the header's claim.
    #[error("frame truncated: header claims {expected} payload bytes, {actual} present")]
    FrameTruncated {
        /// Bytes claimed by the header.
        expected: usize,
        /// Bytes present after the header.
        actual: usize,
    },

    /// Payload exceeds the protocol maximum.
    #[error("payload too large: {size} bytes exceeds {max}")]
    PayloadTooLarge {
        /// Claimed payload size.
        size: usize,
        /// Protocol maximum.
        max: usize,
    },

    /// Message type not defined in this version.
    #[error("unknown message type {0:#06x}")]
    UnknownType(u16),

    /// Payload bytes do not match the type's fixed layout.
    #[error("bad payload for {msg_type:#06x}: {detail}")]
    BadPayload {
        /// Message type whose payload failed to parse.
        msg_type: u16,
        /// What disagreed.
        detail: &'static str,
    },
}
