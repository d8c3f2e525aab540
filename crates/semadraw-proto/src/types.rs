//! Message type tags and their tripartition.

/// Which third of the type space a tag lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgClass {
    /// `0x0xxx`: client-to-server request.
    Request,
    /// `0x8xxx`: server reply; low bits mirror the request.
    Reply,
    /// `0x9xxx`: unsolicited server event.
    Event,
}

/// Wire message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MsgType {
    /// Version negotiation; must be the first message on a session.
    Hello = 0x0001,
    /// Allocate a surface.
    CreateSurface = 0x0002,
    /// Destroy a surface (irrevocable).
    DestroySurface = 0x0003,
    /// Attach a shared-memory buffer (local transport; FD out-of-band).
    AttachBuffer = 0x0004,
    /// Attach an inline buffer (bytes follow the fixed header).
    AttachBufferInline = 0x0005,
    /// Publish the attached buffer as the next frame.
    Commit = 0x0006,
    /// Show or hide a surface.
    SetVisible = 0x0007,
    /// Change a surface's Z-order.
    SetZOrder = 0x0008,
    /// Move a surface.
    SetPosition = 0x0009,
    /// Barrier: reply arrives after all earlier requests applied.
    Sync = 0x000A,
    /// Replace the daemon clipboard.
    ClipboardSet = 0x000B,
    /// Request the daemon clipboard (data arrives as an event).
    ClipboardRequest = 0x000C,
    /// Graceful disconnect; no reply.
    Disconnect = 0x000D,

    /// Reply to [`Self::Hello`].
    HelloReply = 0x8001,
    /// Reply to [`Self::CreateSurface`].
    SurfaceCreated = 0x8002,
    /// Reply to [`Self::DestroySurface`].
    SurfaceDestroyed = 0x8003,
    /// Reply to [`Self::AttachBuffer`].
    BufferAttached = 0x8004,
    /// Reply to [`Self::AttachBufferInline`].
    InlineBufferAttached = 0x8005,
    /// Reply to [`Self::Commit`], carrying the published frame number.
    CommitReply = 0x8006,
    /// Reply to [`Self::SetVisible`].
    VisibleSet = 0x8007,
    /// Reply to [`Self::SetZOrder`].
    ZOrderSet = 0x8008,
    /// Reply to [`Self::SetPosition`].
    PositionSet = 0x8009,
    /// Reply to [`Self::Sync`].
    SyncDone = 0x800A,
    /// Error reply to any request.
    ErrorReply = 0x8FFF,

    /// A committed frame finished compositing.
    FrameComplete = 0x9001,
    /// Keyboard input routed to the focused surface's owner.
    KeyPress = 0x9002,
    /// Pointer input routed to the focused surface's owner.
    MouseEvent = 0x9003,
    /// Clipboard contents, answering [`Self::ClipboardRequest`].
    ClipboardData = 0x9004,
    /// The daemon no longer reads an attached buffer.
    BufferReleased = 0x9005,
}

impl MsgType {
    /// Raw 16-bit tag.
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Parse a raw tag. `None` for unknown types.
    #[must_use]
    pub const fn from_u16(raw: u16) -> Option<Self> {
        Some(match raw {
            0x0001 => Self::Hello,
            0x0002 => Self::CreateSurface,
            0x0003 => Self::DestroySurface,
            0x0004 => Self::AttachBuffer,
            0x0005 => Self::AttachBufferInline,
            0x0006 => Self::Commit,
            0x0007 => Self::SetVisible,
            0x0008 => Self::SetZOrder,
            0x0009 => Self::SetPosition,
            0x000A => Self::Sync,
            0x000B => Self::ClipboardSet,
            0x000C => Self::ClipboardRequest,
            0x000D => Self::Disconnect,
            0x8001 => Self::HelloReply,
            0x8002 => Self::SurfaceCreated,
            0x8003 => Self::SurfaceDestroyed,
            0x8004 => Self::BufferAttached,
            0x8005 => Self::InlineBufferAttached,
            0x8006 => Self::CommitReply,
            0x8007 => Self::VisibleSet,
            0x8008 => Self::ZOrderSet,
            0x8009 => Self::PositionSet,
            0x800A => Self::SyncDone,
            0x8FFF => Self::ErrorReply,
            0x9001 => Self::FrameComplete,
            0x9002 => Self::KeyPress,
            0x9003 => Self::MouseEvent,
            0x9004 => Self::ClipboardData,
            0x9005 => Self::BufferReleased,
            _ => return None,
        })
    }

    /// Which third of the type space this tag occupies.
    #[must_use]
    pub const fn class(self) -> MsgClass {
        match (self as u16) & 0xF000 {
            0x8000 => MsgClass::Reply,
            0x9000 => MsgClass::Event,
            _ => MsgClass::Request,
        }
    }
}
