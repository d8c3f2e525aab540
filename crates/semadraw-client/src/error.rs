//! Client error type.

use thiserror::Error;

/// Errors a client can observe.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Socket-level failure.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// The daemon sent bytes that do not parse as protocol frames.
    #[error("protocol error: {0}")]
    Protocol(#[from] semadraw_proto::ProtocolError),

    /// The daemon answered with an ERROR_REPLY.
    #[error("request {request_type:#06x} rejected: code {code}, offset {offset}")]
    Rejected {
        /// The request that was refused.
        request_type: u16,
        /// Daemon error code (see
        /// [`semadraw_proto::payloads::ErrorReply`]).
        code: u16,
        /// Byte offset context (SDCS validation errors).
        offset: u64,
    },

    /// The daemon replied with something other than the expected reply
    /// type.
    #[error("unexpected reply {got:#06x}, expected {expected:#06x}")]
    UnexpectedReply {
        /// Reply type received.
        got: u16,
        /// Reply type expected.
        expected: u16,
    },

    /// The daemon closed the connection.
    #[error("connection closed by daemon")]
    Closed,
}
