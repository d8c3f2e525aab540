//! Fixed-layout stream, chunk, and command headers.
//!
//! All three are plain little-endian structs that `zerocopy` can cast
//! directly from untrusted bytes: every field accepts any bit pattern, so
//! parsing is a bounds check plus a reference cast, never a copy.

use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout,
    byteorder::little_endian::{U16, U32, U64},
};

/// 4-byte magic prefix, `SDCS` in ASCII.
pub const MAGIC: [u8; 4] = *b"SDCS";

/// Major version this implementation speaks. Exact match required.
pub const VERSION_MAJOR: u16 = 1;

/// Highest minor version this implementation accepts.
pub const VERSION_MINOR: u16 = 0;

/// 64-byte stream header at offset 0.
///
/// `total_size` must equal the byte length of the whole stream;
/// `chunk_count` is advisory (the chunk walk is authoritative).
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct StreamHeader {
    /// Magic prefix (`SDCS`).
    pub magic: [u8; 4],
    /// Major format version; rejected unless it matches exactly.
    pub version_major: U16,
    /// Minor format version; additive, rejected only if newer than known.
    pub version_minor: U16,
    /// Declared header size. At least [`StreamHeader::SIZE`].
    pub header_size: U32,
    /// Stream-level flags ([`crate::STREAM_FLAG_TOLERATE_UNKNOWN_OPCODES`]).
    pub flags: U32,
    /// Total stream size in bytes, header included.
    pub total_size: U64,
    /// Number of chunks that follow (advisory).
    pub chunk_count: U32,
    reserved: [u8; 36],
}

impl StreamHeader {
    /// Serialized size in bytes.
    pub const SIZE: usize = 64;

    /// A header for a stream of `total_size` bytes and `chunk_count` chunks.
    #[must_use]
    pub fn new(total_size: u64, chunk_count: u32, flags: u32) -> Self {
        Self {
            magic: MAGIC,
            version_major: U16::new(VERSION_MAJOR),
            version_minor: U16::new(VERSION_MINOR),
            header_size: U32::new(Self::SIZE as u32),
            flags: U32::new(flags),
            total_size: U64::new(total_size),
            chunk_count: U32::new(chunk_count),
            reserved: [0; 36],
        }
    }
}

/// 40-byte chunk header.
///
/// `offset` is the file offset of this header; `total_bytes` covers header,
/// payload, and padding (always a multiple of 8); `payload_bytes` is the
/// unpadded payload length.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ChunkHeader {
    /// 4-character chunk type tag. Only [`crate::CHUNK_CMDS`] executes.
    pub kind: [u8; 4],
    /// Chunk-level flags. Reserved bits are ignored but preserved.
    pub flags: U32,
    /// File offset of this chunk header.
    pub offset: U64,
    /// Header + payload + padding, in bytes. Multiple of 8.
    pub total_bytes: U64,
    /// Payload length in bytes, before padding.
    pub payload_bytes: U64,
    reserved: U64,
}

impl ChunkHeader {
    /// Serialized size in bytes.
    pub const SIZE: usize = 40;

    /// A chunk header at `offset` holding `payload_bytes` of `kind`.
    #[must_use]
    pub fn new(kind: [u8; 4], offset: u64, payload_bytes: u64) -> Self {
        let unpadded = Self::SIZE as u64 + payload_bytes;
        Self {
            kind,
            flags: U32::new(0),
            offset: U64::new(offset),
            total_bytes: U64::new(unpadded + crate::pad8(unpadded as usize) as u64),
            payload_bytes: U64::new(payload_bytes),
            reserved: U64::new(0),
        }
    }
}

/// 8-byte command record header.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct CmdHeader {
    /// 16-bit opcode tag.
    pub opcode: U16,
    /// Command flags. Reserved bits are ignored but preserved.
    pub flags: U16,
    /// Payload length in bytes, before record padding.
    pub payload_bytes: U32,
}

impl CmdHeader {
    /// Serialized size in bytes.
    pub const SIZE: usize = 8;

    /// A header for `opcode` with `payload_bytes` of payload.
    #[must_use]
    pub fn new(opcode: crate::Opcode, payload_bytes: u32) -> Self {
        Self {
            opcode: U16::new(opcode.to_u16()),
            flags: U16::new(0),
            payload_bytes: U32::new(payload_bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_sizes() {
        assert_eq!(std::mem::size_of::<StreamHeader>(), StreamHeader::SIZE);
        assert_eq!(std::mem::size_of::<ChunkHeader>(), ChunkHeader::SIZE);
        assert_eq!(std::mem::size_of::<CmdHeader>(), CmdHeader::SIZE);
    }

    #[test]
    fn chunk_total_is_padded() {
        let ch = ChunkHeader::new(crate::CHUNK_CMDS, 64, 12);
        // 40 + 12 = 52, padded to 56
        assert_eq!(ch.total_bytes.get(), 56);
        assert_eq!(ch.payload_bytes.get(), 12);
    }
}
