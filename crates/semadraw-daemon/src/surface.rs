//! Surface records and attached buffers.

use bytes::Bytes;

/// How a surface's SDCS bytes reached the daemon.
///
/// The tag disambiguates the two transports: a shared-memory record from
/// the local FD-passing path, or an owned copy of inline bytes from
/// transports that cannot pass FDs. Shared mappings are lazy; whatever is
/// mapped is released through the [`ShmMapper`] on detach or destroy.
#[derive(Debug, Clone)]
pub enum AttachedBuffer {
    /// Shared-memory segment reference. `mapped` caches the lazily
    /// established read-only view.
    Shared {
        /// Opaque token correlating the out-of-band FD.
        token: u64,
        /// Total segment size.
        size: u64,
        /// Stream offset within the segment.
        offset: u64,
        /// Stream length within the segment.
        length: u64,
        /// Lazily mapped view of the stream bytes.
        mapped: Option<Bytes>,
    },
    /// Owned copy of inline bytes (already validated at attach).
    Inline(Bytes),
}

impl AttachedBuffer {
    /// Release any platform resources through `mapper`.
    pub fn release(&self, mapper: &dyn ShmMapper) {
        if let Self::Shared { token, .. } = self {
            mapper.unmap(*token);
        }
    }

    /// Bytes this buffer charges against the owner's buffer budget.
    #[must_use]
    pub fn byte_len(&self) -> u64 {
        match self {
            Self::Shared { length, .. } => *length,
            Self::Inline(bytes) => bytes.len() as u64,
        }
    }
}

/// Platform shared-memory plumbing, kept behind a trait: the daemon core
/// only ever sees bytes. The default [`NoShm`] refuses every mapping,
/// which is correct for transports without FD passing.
pub trait ShmMapper: Send {
    /// Map the stream window of a shared segment read-only.
    fn map(&self, token: u64, size: u64, offset: u64, length: u64) -> Option<Bytes>;

    /// Release a mapping established by [`Self::map`]. Idempotent.
    fn unmap(&self, token: u64);
}

/// Mapper for daemons without a shared-memory transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoShm;

impl ShmMapper for NoShm {
    fn map(&self, _token: u64, _size: u64, _offset: u64, _length: u64) -> Option<Bytes> {
        None
    }

    fn unmap(&self, _token: u64) {}
}

/// One daemon-side drawable.
#[derive(Debug, Clone)]
pub struct Surface {
    /// Unique ID, monotonic within daemon lifetime, never reused.
    pub id: u64,
    /// Owning client ID.
    pub owner: u64,
    /// Logical width.
    pub width: f32,
    /// Logical height.
    pub height: f32,
    /// Scale factor (logical units to pixels).
    pub scale: f32,
    /// Integer pixel position.
    pub x: i32,
    /// Integer pixel position.
    pub y: i32,
    /// Z-order; ascending is back-to-front.
    pub z_order: i32,
    /// Whether the compositor considers this surface.
    pub visible: bool,
    /// Attached stream buffer, if any.
    pub buffer: Option<AttachedBuffer>,
    /// Set by commit, cleared when the frame completes.
    pub pending_commit: bool,
    /// Monotonic frame counter, incremented by each commit.
    pub frame: u64,
}

impl Surface {
    /// Pixel width after applying the scale factor.
    #[must_use]
    pub fn pixel_width(&self) -> u32 {
        (self.width * self.scale).ceil().max(0.0) as u32
    }

    /// Pixel height after applying the scale factor.
    #[must_use]
    pub fn pixel_height(&self) -> u32 {
        (self.height * self.scale).ceil().max(0.0) as u32
    }
}
