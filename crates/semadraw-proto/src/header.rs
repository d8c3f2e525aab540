//! Fixed 8-byte frame header.

use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout,
    byteorder::little_endian::{U16, U32},
};

use crate::{ProtocolError, Result};

/// 8-byte little-endian frame header: type, flags, payload length.
///
/// Every bit pattern is a valid header struct, so casting from untrusted
/// bytes cannot misbehave; semantic checks (known type, size limit) are
/// separate and explicit.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct WireHeader {
    /// Message type tag (see [`crate::MsgType`]).
    pub msg_type: U16,
    /// Frame flags. Reserved bits are ignored but preserved.
    pub flags: U16,
    /// Payload length in bytes.
    pub length: U32,
}

impl WireHeader {
    /// Serialized size in bytes.
    pub const SIZE: usize = 8;

    /// Maximum payload size (16 MB). Bounds daemon-side allocation per
    /// frame before any content is inspected.
    pub const MAX_PAYLOAD: u32 = 16 * 1024 * 1024;

    /// A header for `msg_type` with `length` payload bytes.
    #[must_use]
    pub fn new(msg_type: u16, length: u32) -> Self {
        Self { msg_type: U16::new(msg_type), flags: U16::new(0), length: U32::new(length) }
    }

    /// Parse a header from the front of `bytes`.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::FrameTooShort`] below 8 bytes
    /// - [`ProtocolError::PayloadTooLarge`] above [`Self::MAX_PAYLOAD`]
    pub fn parse(bytes: &[u8]) -> Result<&Self> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::FrameTooShort { expected: Self::SIZE, actual: bytes.len() })?
            .0;
        if header.length.get() > Self::MAX_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge {
                size: header.length.get() as usize,
                max: Self::MAX_PAYLOAD as usize,
            });
        }
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use zerocopy::IntoBytes as _;

    use super::*;

    #[test]
    fn header_is_eight_bytes() {
        assert_eq!(std::mem::size_of::<WireHeader>(), WireHeader::SIZE);
    }

    #[test]
    fn header_round_trips_little_endian() {
        let h = WireHeader::new(0x8001, 28);
        let bytes = h.as_bytes();
        assert_eq!(bytes, &[0x01, 0x80, 0x00, 0x00, 28, 0, 0, 0]);
        assert_eq!(WireHeader::parse(bytes).unwrap(), &h);
    }

    #[test]
    fn short_buffer_rejected() {
        let e = WireHeader::parse(&[0; 7]).unwrap_err();
        assert_eq!(e, ProtocolError::FrameTooShort { expected: 8, actual: 7 });
    }

    #[test]
    fn oversized_payload_rejected() {
        let h = WireHeader::new(0x0001, WireHeader::MAX_PAYLOAD + 1);
        assert!(matches!(
            WireHeader::parse(h.as_bytes()),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }
}
