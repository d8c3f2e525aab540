//! Typed messages over the wire frames.
//!
//! Frame headers are raw binary for cheap routing; payloads are
//! fixed-layout little-endian structs (no serialization framework, no
//! variant tags — the frame header's type already identifies the
//! payload). Variable-length content rides as a length-prefixed trailer
//! behind its fixed header.
//!
//! # Invariants
//!
//! Each [`Message`] variant maps to exactly one [`MsgType`]; the match
//! statements here are exhaustive, so adding a variant without wiring it
//! through `msg_type`/`encode`/`decode` fails to compile. Round-trip
//! encoding produces identical frames.

pub mod input;
pub mod session;
pub mod surface;

use bytes::Bytes;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub use input::{KeyPress, MouseEvent};
pub use session::{ErrorReply, Hello, HelloReply, SyncPayload, TrailerLen};
pub use surface::{
    AttachBuffer, AttachBufferInline, CommitReply, CreateSurface, FrameComplete, SetPosition,
    SetVisible, SetZOrder, SurfaceRef,
};

use crate::{MsgType, ProtocolError, Result, WireFrame};

/// One decoded protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Handshake request.
    Hello(Hello),
    /// Handshake reply.
    HelloReply(HelloReply),
    /// Allocate a surface.
    CreateSurface(CreateSurface),
    /// Surface allocated.
    SurfaceCreated(SurfaceRef),
    /// Destroy a surface.
    DestroySurface(SurfaceRef),
    /// Surface destroyed.
    SurfaceDestroyed(SurfaceRef),
    /// Attach a shared-memory buffer.
    AttachBuffer(AttachBuffer),
    /// Attach an inline buffer.
    AttachBufferInline {
        /// Target surface.
        surface_id: u64,
        /// The SDCS stream bytes.
        stream: Bytes,
    },
    /// Shared-memory buffer attached.
    BufferAttached(SurfaceRef),
    /// Inline buffer attached.
    InlineBufferAttached(SurfaceRef),
    /// Publish the attached buffer.
    Commit(SurfaceRef),
    /// Commit applied; carries the frame number.
    CommitReply(CommitReply),
    /// Show or hide a surface.
    SetVisible(SetVisible),
    /// Visibility changed.
    VisibleSet(SurfaceRef),
    /// Change Z-order.
    SetZOrder(SetZOrder),
    /// Z-order changed.
    ZOrderSet(SurfaceRef),
    /// Move a surface.
    SetPosition(SetPosition),
    /// Position changed.
    PositionSet(SurfaceRef),
    /// Barrier request.
    Sync(SyncPayload),
    /// Barrier reply; all earlier requests from this client are applied.
    SyncDone(SyncPayload),
    /// Replace the daemon clipboard.
    ClipboardSet {
        /// New clipboard contents.
        data: Bytes,
    },
    /// Request clipboard contents (answered by [`Message::ClipboardData`]).
    ClipboardRequest,
    /// Graceful disconnect.
    Disconnect,
    /// Error reply to any request.
    ErrorReply(ErrorReply),
    /// A committed frame finished compositing.
    FrameComplete(FrameComplete),
    /// Keyboard input event.
    KeyPress(KeyPress),
    /// Pointer input event.
    MouseEvent(MouseEvent),
    /// Clipboard contents event.
    ClipboardData {
        /// Clipboard contents.
        data: Bytes,
    },
    /// The daemon released an attached buffer.
    BufferReleased(SurfaceRef),
}

impl Message {
    /// The wire type tag of this message.
    #[must_use]
    pub const fn msg_type(&self) -> MsgType {
        match self {
            Self::Hello(_) => MsgType::Hello,
            Self::HelloReply(_) => MsgType::HelloReply,
            Self::CreateSurface(_) => MsgType::CreateSurface,
            Self::SurfaceCreated(_) => MsgType::SurfaceCreated,
            Self::DestroySurface(_) => MsgType::DestroySurface,
            Self::SurfaceDestroyed(_) => MsgType::SurfaceDestroyed,
            Self::AttachBuffer(_) => MsgType::AttachBuffer,
            Self::AttachBufferInline { .. } => MsgType::AttachBufferInline,
            Self::BufferAttached(_) => MsgType::BufferAttached,
            Self::InlineBufferAttached(_) => MsgType::InlineBufferAttached,
            Self::Commit(_) => MsgType::Commit,
            Self::CommitReply(_) => MsgType::CommitReply,
            Self::SetVisible(_) => MsgType::SetVisible,
            Self::VisibleSet(_) => MsgType::VisibleSet,
            Self::SetZOrder(_) => MsgType::SetZOrder,
            Self::ZOrderSet(_) => MsgType::ZOrderSet,
            Self::SetPosition(_) => MsgType::SetPosition,
            Self::PositionSet(_) => MsgType::PositionSet,
            Self::Sync(_) => MsgType::Sync,
            Self::SyncDone(_) => MsgType::SyncDone,
            Self::ClipboardSet { .. } => MsgType::ClipboardSet,
            Self::ClipboardRequest => MsgType::ClipboardRequest,
            Self::Disconnect => MsgType::Disconnect,
            Self::ErrorReply(_) => MsgType::ErrorReply,
            Self::FrameComplete(_) => MsgType::FrameComplete,
            Self::KeyPress(_) => MsgType::KeyPress,
            Self::MouseEvent(_) => MsgType::MouseEvent,
            Self::ClipboardData { .. } => MsgType::ClipboardData,
            Self::BufferReleased(_) => MsgType::BufferReleased,
        }
    }

    /// Serialize into a transport frame.
    #[must_use]
    pub fn into_frame(self) -> WireFrame {
        let msg_type = self.msg_type().to_u16();
        let payload: Bytes = match self {
            Self::Hello(p) => Bytes::copy_from_slice(p.as_bytes()),
            Self::HelloReply(p) => Bytes::copy_from_slice(p.as_bytes()),
            Self::CreateSurface(p) => Bytes::copy_from_slice(p.as_bytes()),
            Self::SurfaceCreated(p)
            | Self::DestroySurface(p)
            | Self::SurfaceDestroyed(p)
            | Self::BufferAttached(p)
            | Self::InlineBufferAttached(p)
            | Self::Commit(p)
            | Self::VisibleSet(p)
            | Self::ZOrderSet(p)
            | Self::PositionSet(p)
            | Self::BufferReleased(p) => Bytes::copy_from_slice(p.as_bytes()),
            Self::AttachBuffer(p) => Bytes::copy_from_slice(p.as_bytes()),
            Self::AttachBufferInline { surface_id, stream } => {
                let header = AttachBufferInline {
                    surface_id: surface_id.into(),
                    byte_len: (stream.len() as u32).into(),
                };
                let mut buf = Vec::with_capacity(12 + stream.len());
                buf.extend_from_slice(header.as_bytes());
                buf.extend_from_slice(&stream);
                Bytes::from(buf)
            },
            Self::CommitReply(p) => Bytes::copy_from_slice(p.as_bytes()),
            Self::SetVisible(p) => Bytes::copy_from_slice(p.as_bytes()),
            Self::SetZOrder(p) => Bytes::copy_from_slice(p.as_bytes()),
            Self::SetPosition(p) => Bytes::copy_from_slice(p.as_bytes()),
            Self::Sync(p) | Self::SyncDone(p) => Bytes::copy_from_slice(p.as_bytes()),
            Self::ClipboardSet { data } | Self::ClipboardData { data } => {
                let prefix = TrailerLen { byte_len: (data.len() as u32).into() };
                let mut buf = Vec::with_capacity(4 + data.len());
                buf.extend_from_slice(prefix.as_bytes());
                buf.extend_from_slice(&data);
                Bytes::from(buf)
            },
            Self::ClipboardRequest | Self::Disconnect => Bytes::new(),
            Self::ErrorReply(p) => Bytes::copy_from_slice(p.as_bytes()),
            Self::FrameComplete(p) => Bytes::copy_from_slice(p.as_bytes()),
            Self::KeyPress(p) => Bytes::copy_from_slice(p.as_bytes()),
            Self::MouseEvent(p) => Bytes::copy_from_slice(p.as_bytes()),
        };
        WireFrame::new(msg_type, payload)
    }

    /// Decode a transport frame into a typed message.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::UnknownType`] for undefined type tags
    /// - [`ProtocolError::BadPayload`] when the payload does not match
    ///   the type's fixed layout or a trailer length disagrees
    pub fn from_frame(frame: &WireFrame) -> Result<Self> {
        let raw = frame.header.msg_type.get();
        let msg_type = MsgType::from_u16(raw).ok_or(ProtocolError::UnknownType(raw))?;
        let payload = &frame.payload;

        Ok(match msg_type {
            MsgType::Hello => Self::Hello(fixed(payload, raw)?),
            MsgType::HelloReply => Self::HelloReply(fixed(payload, raw)?),
            MsgType::CreateSurface => Self::CreateSurface(fixed(payload, raw)?),
            MsgType::SurfaceCreated => Self::SurfaceCreated(fixed(payload, raw)?),
            MsgType::DestroySurface => Self::DestroySurface(fixed(payload, raw)?),
            MsgType::SurfaceDestroyed => Self::SurfaceDestroyed(fixed(payload, raw)?),
            MsgType::AttachBuffer => Self::AttachBuffer(fixed(payload, raw)?),
            MsgType::AttachBufferInline => {
                let header = AttachBufferInline::ref_from_prefix(payload)
                    .map_err(|_| ProtocolError::BadPayload { msg_type: raw, detail: "header truncated" })?
                    .0;
                let len = header.byte_len.get() as usize;
                if payload.len() != 12 + len {
                    return Err(ProtocolError::BadPayload {
                        msg_type: raw,
                        detail: "trailer length disagrees with frame",
                    });
                }
                Self::AttachBufferInline {
                    surface_id: header.surface_id.get(),
                    stream: frame.payload.slice(12..),
                }
            },
            MsgType::BufferAttached => Self::BufferAttached(fixed(payload, raw)?),
            MsgType::InlineBufferAttached => Self::InlineBufferAttached(fixed(payload, raw)?),
            MsgType::Commit => Self::Commit(fixed(payload, raw)?),
            MsgType::CommitReply => Self::CommitReply(fixed(payload, raw)?),
            MsgType::SetVisible => Self::SetVisible(fixed(payload, raw)?),
            MsgType::VisibleSet => Self::VisibleSet(fixed(payload, raw)?),
            MsgType::SetZOrder => Self::SetZOrder(fixed(payload, raw)?),
            MsgType::ZOrderSet => Self::ZOrderSet(fixed(payload, raw)?),
            MsgType::SetPosition => Self::SetPosition(fixed(payload, raw)?),
            MsgType::PositionSet => Self::PositionSet(fixed(payload, raw)?),
            MsgType::Sync => Self::Sync(fixed(payload, raw)?),
            MsgType::SyncDone => Self::SyncDone(fixed(payload, raw)?),
            MsgType::ClipboardSet => Self::ClipboardSet { data: trailer(frame, raw)? },
            MsgType::ClipboardRequest => {
                require_empty(payload, raw)?;
                Self::ClipboardRequest
            },
            MsgType::Disconnect => {
                require_empty(payload, raw)?;
                Self::Disconnect
            },
            MsgType::ErrorReply => Self::ErrorReply(fixed(payload, raw)?),
            MsgType::FrameComplete => Self::FrameComplete(fixed(payload, raw)?),
            MsgType::KeyPress => Self::KeyPress(fixed(payload, raw)?),
            MsgType::MouseEvent => Self::MouseEvent(fixed(payload, raw)?),
            MsgType::ClipboardData => Self::ClipboardData { data: trailer(frame, raw)? },
            MsgType::BufferReleased => Self::BufferReleased(fixed(payload, raw)?),
        })
    }
}

/// Parse an exact-size fixed-layout payload.
fn fixed<T: FromBytes + KnownLayout + Immutable>(payload: &[u8], msg_type: u16) -> Result<T> {
    T::read_from_bytes(payload)
        .map_err(|_| ProtocolError::BadPayload { msg_type, detail: "fixed layout size mismatch" })
}

/// Parse a length-prefixed trailer payload.
fn trailer(frame: &WireFrame, msg_type: u16) -> Result<Bytes> {
    let prefix = TrailerLen::ref_from_prefix(&frame.payload)
        .map_err(|_| ProtocolError::BadPayload { msg_type, detail: "length prefix truncated" })?
        .0;
    let len = prefix.byte_len.get() as usize;
    if frame.payload.len() != 4 + len {
        return Err(ProtocolError::BadPayload {
            msg_type,
            detail: "trailer length disagrees with frame",
        });
    }
    Ok(frame.payload.slice(4..))
}

fn require_empty(payload: &[u8], msg_type: u16) -> Result<()> {
    if payload.is_empty() {
        Ok(())
    } else {
        Err(ProtocolError::BadPayload { msg_type, detail: "expected empty payload" })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn round_trip(msg: Message) {
        let frame = msg.clone().into_frame();
        assert_eq!(Message::from_frame(&frame).unwrap(), msg);
    }

    #[test]
    fn fixed_payload_messages_round_trip() {
        round_trip(Message::Hello(Hello::current()));
        round_trip(Message::CreateSurface(CreateSurface::new(640.0, 480.0)));
        round_trip(Message::SurfaceCreated(SurfaceRef::new(7)));
        round_trip(Message::Commit(SurfaceRef::new(7)));
        round_trip(Message::SetVisible(SetVisible {
            surface_id: 7u64.into(),
            visible: 1u32.into(),
        }));
        round_trip(Message::SetZOrder(SetZOrder { surface_id: 7u64.into(), z_order: (-3i32).into() }));
        round_trip(Message::Sync(SyncPayload { serial: 42u32.into() }));
        round_trip(Message::ErrorReply(ErrorReply::new(0x0006, ErrorReply::NO_BUFFER, 0)));
        round_trip(Message::KeyPress(KeyPress {
            code: 30u32.into(),
            state: 1u32.into(),
            modifiers: 0u32.into(),
        }));
        round_trip(Message::Disconnect);
        round_trip(Message::ClipboardRequest);
    }

    #[test]
    fn inline_attach_round_trips() {
        round_trip(Message::AttachBufferInline {
            surface_id: 99,
            stream: Bytes::from_static(b"not actually sdcs"),
        });
    }

    #[test]
    fn clipboard_trailers_round_trip() {
        round_trip(Message::ClipboardSet { data: Bytes::from_static(b"hello") });
        round_trip(Message::ClipboardData { data: Bytes::new() });
    }

    #[test]
    fn trailer_length_mismatch_rejected() {
        let mut frame = Message::ClipboardSet { data: Bytes::from_static(b"hello") }.into_frame();
        // Truncate the trailer without fixing the prefix.
        frame.payload = frame.payload.slice(..frame.payload.len() - 1);
        frame.header.length = ((frame.payload.len()) as u32).into();
        assert!(matches!(
            Message::from_frame(&frame),
            Err(ProtocolError::BadPayload { .. })
        ));
    }

    #[test]
    fn unknown_type_rejected() {
        let frame = WireFrame::new(0x7777, Bytes::new());
        assert_eq!(Message::from_frame(&frame), Err(ProtocolError::UnknownType(0x7777)));
    }

    #[test]
    fn wrong_size_fixed_payload_rejected() {
        let frame = WireFrame::new(MsgType::Commit.to_u16(), vec![0u8; 7]);
        assert!(matches!(Message::from_frame(&frame), Err(ProtocolError::BadPayload { .. })));
    }

    impl Arbitrary for Message {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with((): Self::Parameters) -> Self::Strategy {
            prop_oneof![
                (any::<u16>(), any::<u16>(), any::<u32>()).prop_map(|(maj, min, flags)| {
                    Self::Hello(Hello {
                        version_major: maj.into(),
                        version_minor: min.into(),
                        flags: flags.into(),
                    })
                }),
                (any::<u64>(), any::<u32>(), any::<u64>(), any::<u32>()).prop_map(
                    |(client, surfaces, buffer, inline)| {
                        Self::HelloReply(HelloReply {
                            client_id: client.into(),
                            version_major: 1u16.into(),
                            version_minor: 0u16.into(),
                            max_surfaces: surfaces.into(),
                            max_buffer_bytes: buffer.into(),
                            max_inline_bytes: inline.into(),
                        })
                    }
                ),
                any::<u64>().prop_map(|id| Self::SurfaceCreated(SurfaceRef::new(id))),
                any::<u64>().prop_map(|id| Self::Commit(SurfaceRef::new(id))),
                (any::<u64>(), any::<u64>()).prop_map(|(id, frame)| {
                    Self::CommitReply(CommitReply { surface_id: id.into(), frame: frame.into() })
                }),
                (any::<u64>(), any::<i32>()).prop_map(|(id, z)| {
                    Self::SetZOrder(SetZOrder { surface_id: id.into(), z_order: z.into() })
                }),
                (any::<u64>(), any::<i32>(), any::<i32>()).prop_map(|(id, x, y)| {
                    Self::SetPosition(SetPosition {
                        surface_id: id.into(),
                        x: x.into(),
                        y: y.into(),
                    })
                }),
                any::<u32>().prop_map(|serial| Self::Sync(SyncPayload { serial: serial.into() })),
                (any::<u16>(), any::<u16>(), any::<u64>()).prop_map(|(req, code, offset)| {
                    Self::ErrorReply(ErrorReply::new(req, code, offset))
                }),
                prop_oneof![
                    (any::<u64>(), any::<u64>(), any::<u32>()).prop_map(|(id, frame, status)| {
                        Self::FrameComplete(FrameComplete {
                            surface_id: id.into(),
                            frame: frame.into(),
                            status: status.into(),
                        })
                    }),
                    (any::<u64>(), proptest::collection::vec(any::<u8>(), 0..512)).prop_map(
                        |(id, stream)| Self::AttachBufferInline {
                            surface_id: id,
                            stream: Bytes::from(stream),
                        }
                    ),
                    proptest::collection::vec(any::<u8>(), 0..512)
                        .prop_map(|data| Self::ClipboardSet { data: Bytes::from(data) }),
                    proptest::collection::vec(any::<u8>(), 0..512)
                        .prop_map(|data| Self::ClipboardData { data: Bytes::from(data) }),
                    Just(Self::ClipboardRequest),
                    Just(Self::Disconnect),
                ],
            ]
            .boxed()
        }
    }

    proptest! {
        #[test]
        fn arbitrary_frames_never_panic(
            msg_type in any::<u16>(),
            payload in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let frame = WireFrame::new(msg_type, payload);
            let _ = Message::from_frame(&frame);
        }

        /// decode(encode(m)) == m across the message space.
        #[test]
        fn message_round_trip(message in any::<Message>()) {
            let frame = message.clone().into_frame();
            prop_assert_eq!(Message::from_frame(&frame).unwrap(), message);

            // And through the byte-level transport framing too.
            let mut wire = Vec::new();
            frame.encode(&mut wire).unwrap();
            let reframed = WireFrame::decode(&wire).unwrap();
            prop_assert_eq!(reframed, frame);
        }
    }
}
