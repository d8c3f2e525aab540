//! Error types for stream validation and encoding.
//!
//! Validation errors carry the byte offset at which the defect was
//! detected; CLI tools and ERROR_REPLY payloads surface that offset to the
//! author of the stream.

use thiserror::Error;

/// What the validator found wrong with a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidateErrorKind {
    /// Fewer bytes than a complete stream header, or a declared header
    /// size below the minimum.
    TruncatedHeader,
    /// Magic prefix mismatch.
    BadMagic,
    /// Major version mismatch or minor version newer than supported.
    VersionUnsupported,
    /// Chunk header extends past the end of the stream.
    TruncatedChunkHeader,
    /// Chunk bounds are inconsistent or extend past the end of the stream.
    ChunkExceedsFile,
    /// Command header extends past the end of its chunk.
    TruncatedCommandHeader,
    /// Command payload (or its record padding) extends past its chunk.
    PayloadExceedsChunk,
    /// Opcode not defined in this version (and tolerance flag unset).
    UnknownOpcode,
    /// Payload size disagrees with the opcode's layout, or an embedded
    /// length field disagrees with the payload.
    BadPayloadSize,
    /// A `CMDS` chunk (or the stream) never reached an `End` opcode.
    MissingEnd,
    /// A float payload slot holds NaN or an infinity.
    NonFiniteScalar,
}

impl ValidateErrorKind {
    /// Stable numeric code for wire transport (ERROR_REPLY payloads).
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::TruncatedHeader => 1,
            Self::BadMagic => 2,
            Self::VersionUnsupported => 3,
            Self::TruncatedChunkHeader => 4,
            Self::ChunkExceedsFile => 5,
            Self::TruncatedCommandHeader => 6,
            Self::PayloadExceedsChunk => 7,
            Self::UnknownOpcode => 8,
            Self::BadPayloadSize => 9,
            Self::MissingEnd => 10,
            Self::NonFiniteScalar => 11,
        }
    }
}

impl std::fmt::Display for ValidateErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TruncatedHeader => "truncated stream header",
            Self::BadMagic => "bad magic",
            Self::VersionUnsupported => "unsupported version",
            Self::TruncatedChunkHeader => "truncated chunk header",
            Self::ChunkExceedsFile => "chunk exceeds file bounds",
            Self::TruncatedCommandHeader => "truncated command header",
            Self::PayloadExceedsChunk => "command payload exceeds chunk",
            Self::UnknownOpcode => "unknown opcode",
            Self::BadPayloadSize => "bad payload size",
            Self::MissingEnd => "missing END opcode",
            Self::NonFiniteScalar => "non-finite float scalar",
        };
        f.write_str(s)
    }
}

/// A rejected stream: what was wrong and where it was detected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at byte {offset}: {detail}")]
pub struct ValidateError {
    /// Classification of the defect.
    pub kind: ValidateErrorKind,
    /// Byte offset at which the defect was detected.
    pub offset: u64,
    /// Human-readable elaboration.
    pub detail: String,
}

impl ValidateError {
    pub(crate) fn new(kind: ValidateErrorKind, offset: u64, detail: impl Into<String>) -> Self {
        Self { kind, offset, detail: detail.into() }
    }
}

/// Rejected encoder input. The encoder refuses to serialize anything the
/// validator would bounce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// A float argument was NaN or infinite.
    #[error("non-finite {slot}")]
    NonFinite {
        /// Which argument slot held the bad value.
        slot: &'static str,
    },

    /// A count or dimension does not fit the wire encoding.
    #[error("{what} too large: {value}")]
    TooLarge {
        /// Which quantity overflowed.
        what: &'static str,
        /// The offending value.
        value: u64,
    },

    /// Inline data length disagrees with its declared dimensions.
    #[error("{what}: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Which inline buffer disagreed.
        what: &'static str,
        /// Length implied by the declared dimensions.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },
}
