//! Surface lifecycle and buffer payloads.

use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout,
    byteorder::little_endian::{F32, I32, U32, U64},
};

/// Request a new surface of a logical size and scale factor.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct CreateSurface {
    /// Logical width.
    pub width: F32,
    /// Logical height.
    pub height: F32,
    /// Scale factor (logical units to pixels).
    pub scale: F32,
}

impl CreateSurface {
    /// A creation request at scale 1.0.
    #[must_use]
    pub fn new(width: f32, height: f32) -> Self {
        Self { width: F32::new(width), height: F32::new(height), scale: F32::new(1.0) }
    }
}

/// Payload naming a single surface; shared by several requests and
/// replies that carry nothing else.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct SurfaceRef {
    /// The surface in question.
    pub surface_id: U64,
}

impl SurfaceRef {
    /// A reference to `surface_id`.
    #[must_use]
    pub fn new(surface_id: u64) -> Self {
        Self { surface_id: U64::new(surface_id) }
    }
}

/// Attach a shared-memory buffer (local transport; the FD travels
/// out-of-band on the control channel).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct AttachBuffer {
    /// Target surface.
    pub surface_id: U64,
    /// Opaque token correlating the out-of-band FD with this request.
    pub shm_token: U64,
    /// Total size of the shared segment.
    pub size: U64,
    /// Offset of the stream within the segment.
    pub offset: U64,
    /// Length of the stream within the segment.
    pub length: U64,
}

/// Fixed header of an inline attach; the SDCS bytes follow as a trailer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct AttachBufferInline {
    /// Target surface.
    pub surface_id: U64,
    /// Trailer bytes that follow this header.
    pub byte_len: U32,
}

/// Reply to a commit: the monotonic frame number just published.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct CommitReply {
    /// Committed surface.
    pub surface_id: U64,
    /// Frame number this commit published.
    pub frame: U64,
}

/// Show or hide a surface.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct SetVisible {
    /// Target surface.
    pub surface_id: U64,
    /// Nonzero shows, zero hides.
    pub visible: U32,
}

/// Change a surface's Z-order. Ascending is back-to-front.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct SetZOrder {
    /// Target surface.
    pub surface_id: U64,
    /// New Z-order (signed).
    pub z_order: I32,
}

/// Move a surface to an integer pixel position.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct SetPosition {
    /// Target surface.
    pub surface_id: U64,
    /// New x position.
    pub x: I32,
    /// New y position.
    pub y: I32,
}

/// A committed frame finished (or failed) compositing.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameComplete {
    /// Surface whose frame completed.
    pub surface_id: U64,
    /// Frame number from the corresponding commit.
    pub frame: U64,
    /// Zero on success; nonzero when the frame's render failed and the
    /// surface kept its prior content.
    pub status: U32,
}
