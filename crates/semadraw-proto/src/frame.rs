//! Transport frame: header plus raw payload bytes.
//!
//! A [`WireFrame`] is the transport-layer unit. It holds raw bytes, not a
//! decoded [`crate::Message`], so the daemon's read loop can size-check
//! and route frames before paying for payload decoding.

use bytes::{BufMut, Bytes};
use zerocopy::IntoBytes;

use crate::{ProtocolError, Result, WireHeader};

/// A complete frame: 8-byte header plus payload bytes.
///
/// # Invariants
///
/// `payload.len()` always equals `header.length` — [`WireFrame::new`]
/// sets the header field from the payload, and [`WireFrame::decode`]
/// verifies the claim before copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    /// Frame header.
    pub header: WireHeader,
    /// Raw payload bytes.
    pub payload: Bytes,
}

impl WireFrame {
    /// A frame for `msg_type` carrying `payload`. The header length is
    /// derived from the payload, so the two cannot disagree.
    #[must_use]
    pub fn new(msg_type: u16, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        debug_assert!(payload.len() <= WireHeader::MAX_PAYLOAD as usize);
        Self { header: WireHeader::new(msg_type, payload.len() as u32), payload }
    }

    /// Total encoded size.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        WireHeader::SIZE + self.payload.len()
    }

    /// Serialize into `dst`.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::PayloadTooLarge`] past the 16 MB frame limit.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        if self.payload.len() > WireHeader::MAX_PAYLOAD as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: self.payload.len(),
                max: WireHeader::MAX_PAYLOAD as usize,
            });
        }
        dst.put_slice(self.header.as_bytes());
        dst.put_slice(&self.payload);
        Ok(())
    }

    /// Parse one frame from the front of `bytes`. Trailing bytes are
    /// ignored; the caller advances by [`Self::encoded_len`].
    ///
    /// # Errors
    ///
    /// Header errors from [`WireHeader::parse`], or
    /// [`ProtocolError::FrameTruncated`] when fewer payload bytes are
    /// present than the header claims.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = *WireHeader::parse(bytes)?;
        let payload_len = header.length.get() as usize;
        let total = WireHeader::SIZE + payload_len;
        if bytes.len() < total {
            return Err(ProtocolError::FrameTruncated {
                expected: payload_len,
                actual: bytes.len() - WireHeader::SIZE,
            });
        }
        Ok(Self { header, payload: Bytes::copy_from_slice(&bytes[WireHeader::SIZE..total]) })
    }
}
