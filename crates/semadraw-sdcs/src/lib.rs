//! Semantic Draw Command Stream (SDCS) container format.
//!
//! An SDCS stream is the unit of drawing intent: a 64-byte header followed
//! by 8-aligned chunks, of which only `CMDS` chunks are executable. Inside
//! a `CMDS` chunk is a sequence of command records (8-byte header, opcode
//! payload, zero padding to an 8-byte boundary) terminated by an `End`
//! opcode. All multi-byte scalars are little-endian; floats are IEEE-754
//! binary32 and must be finite.
//!
//! The crate keeps three concerns strictly apart:
//!
//! - [`validate`]: a total function over arbitrary bytes. It never reads
//!   past the buffer, never allocates proportionally to attacker-claimed
//!   lengths, and reports the byte offset of the first defect. This is the
//!   only code that ever sees unvalidated input.
//! - [`StreamEncoder`]: the writer. Its per-opcode helpers reject inputs
//!   (non-finite floats, oversized counts) that would produce a stream the
//!   validator rejects, so `validate(encode(..))` holds by construction.
//! - [`CommandReader`]: a decoder over a *previously validated* stream.
//!   Execution-side code iterates decoded [`Command`]s without re-checking
//!   bounds the validator already proved.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod encoder;
mod error;
mod headers;
mod opcode;
mod validator;

pub use command::{
    Command, CommandReader, GlyphAtlasRef, GlyphPlacement, GlyphRunRef, ImageRef, PathRef,
    RectsRef,
};
pub use encoder::StreamEncoder;
pub use error::{EncodeError, ValidateError, ValidateErrorKind};
pub use headers::{ChunkHeader, CmdHeader, StreamHeader};
pub use opcode::{
    BlendMode, CHUNK_CMDS, Opcode, STREAM_FLAG_TOLERATE_UNKNOWN_OPCODES, StrokeCap, StrokeJoin,
    pad8,
};
pub use validator::{StreamSummary, validate};
