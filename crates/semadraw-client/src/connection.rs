//! Connection management and request helpers.

use std::collections::VecDeque;

use bytes::Bytes;
use semadraw_proto::{
    Message, MsgClass, MsgType, WireFrame, WireHeader,
    payloads::{
        CreateSurface, Hello, SetPosition, SetVisible, SetZOrder, SurfaceRef, SyncPayload,
    },
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::ClientError;

/// Limits the daemon granted at handshake.
#[derive(Debug, Clone, Copy)]
pub struct NegotiatedLimits {
    /// Maximum live surfaces.
    pub max_surfaces: u32,
    /// Maximum total attached-buffer bytes.
    pub max_buffer_bytes: u64,
    /// Maximum inline payload bytes per message.
    pub max_inline_bytes: u32,
}

/// A connected, handshaken client session.
pub struct Connection {
    reader: Box<dyn AsyncRead + Unpin + Send>,
    writer: Box<dyn AsyncWrite + Unpin + Send>,
    client_id: u64,
    limits: NegotiatedLimits,
    /// Events that arrived while waiting for a reply.
    events: VecDeque<Message>,
}

impl Connection {
    /// Connect over the daemon's Unix socket and perform the handshake.
    pub async fn connect_unix(path: impl AsRef<std::path::Path>) -> Result<Self, ClientError> {
        let stream = tokio::net::UnixStream::connect(path).await?;
        let (reader, writer) = stream.into_split();
        Self::handshake(Box::new(reader), Box::new(writer)).await
    }

    /// Connect over TCP (remote; inline buffers only) and perform the
    /// handshake.
    pub async fn connect_tcp(addr: impl tokio::net::ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = tokio::net::TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        Self::handshake(Box::new(reader), Box::new(writer)).await
    }

    async fn handshake(
        reader: Box<dyn AsyncRead + Unpin + Send>,
        writer: Box<dyn AsyncWrite + Unpin + Send>,
    ) -> Result<Self, ClientError> {
        let mut conn = Self {
            reader,
            writer,
            client_id: 0,
            limits: NegotiatedLimits { max_surfaces: 0, max_buffer_bytes: 0, max_inline_bytes: 0 },
            events: VecDeque::new(),
        };

        let reply = conn.request(Message::Hello(Hello::current()), MsgType::HelloReply).await?;
        let Message::HelloReply(hello) = reply else {
            return Err(ClientError::UnexpectedReply {
                got: reply.msg_type().to_u16(),
                expected: MsgType::HelloReply.to_u16(),
            });
        };
        conn.client_id = hello.client_id.get();
        conn.limits = NegotiatedLimits {
            max_surfaces: hello.max_surfaces.get(),
            max_buffer_bytes: hello.max_buffer_bytes.get(),
            max_inline_bytes: hello.max_inline_bytes.get(),
        };
        tracing::debug!(client = conn.client_id, "handshake complete");
        Ok(conn)
    }

    /// The daemon-assigned client ID. The high bit marks remote clients.
    #[must_use]
    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    /// Limits granted at handshake.
    #[must_use]
    pub fn limits(&self) -> NegotiatedLimits {
        self.limits
    }

    /// Create a surface of a logical size; returns its ID.
    pub async fn create_surface(&mut self, width: f32, height: f32) -> Result<u64, ClientError> {
        let reply = self
            .request(Message::CreateSurface(CreateSurface::new(width, height)), MsgType::SurfaceCreated)
            .await?;
        match reply {
            Message::SurfaceCreated(created) => Ok(created.surface_id.get()),
            other => Err(unexpected(&other, MsgType::SurfaceCreated)),
        }
    }

    /// Destroy a surface. Irrevocable.
    pub async fn destroy_surface(&mut self, surface_id: u64) -> Result<(), ClientError> {
        self.request(Message::DestroySurface(SurfaceRef::new(surface_id)), MsgType::SurfaceDestroyed)
            .await
            .map(|_| ())
    }

    /// Attach SDCS bytes inline. The daemon validates them here; invalid
    /// streams come back as [`ClientError::Rejected`] with the byte
    /// offset of the defect.
    pub async fn attach_inline(
        &mut self,
        surface_id: u64,
        stream: impl Into<Bytes>,
    ) -> Result<(), ClientError> {
        self.request(
            Message::AttachBufferInline { surface_id, stream: stream.into() },
            MsgType::InlineBufferAttached,
        )
        .await
        .map(|_| ())
    }

    /// Commit the attached buffer; returns the published frame number.
    /// The matching FRAME_COMPLETE event arrives via
    /// [`Self::next_event`].
    pub async fn commit(&mut self, surface_id: u64) -> Result<u64, ClientError> {
        let reply =
            self.request(Message::Commit(SurfaceRef::new(surface_id)), MsgType::CommitReply).await?;
        match reply {
            Message::CommitReply(commit) => Ok(commit.frame.get()),
            other => Err(unexpected(&other, MsgType::CommitReply)),
        }
    }

    /// Show or hide a surface.
    pub async fn set_visible(&mut self, surface_id: u64, visible: bool) -> Result<(), ClientError> {
        self.request(
            Message::SetVisible(SetVisible {
                surface_id: surface_id.into(),
                visible: u32::from(visible).into(),
            }),
            MsgType::VisibleSet,
        )
        .await
        .map(|_| ())
    }

    /// Change a surface's Z-order (ascending is back-to-front).
    pub async fn set_z_order(&mut self, surface_id: u64, z_order: i32) -> Result<(), ClientError> {
        self.request(
            Message::SetZOrder(SetZOrder { surface_id: surface_id.into(), z_order: z_order.into() }),
            MsgType::ZOrderSet,
        )
        .await
        .map(|_| ())
    }

    /// Move a surface.
    pub async fn set_position(&mut self, surface_id: u64, x: i32, y: i32) -> Result<(), ClientError> {
        self.request(
            Message::SetPosition(SetPosition {
                surface_id: surface_id.into(),
                x: x.into(),
                y: y.into(),
            }),
            MsgType::PositionSet,
        )
        .await
        .map(|_| ())
    }

    /// Barrier: resolves once the daemon has applied every earlier
    /// request from this connection.
    pub async fn sync(&mut self, serial: u32) -> Result<(), ClientError> {
        let reply = self
            .request(Message::Sync(SyncPayload { serial: serial.into() }), MsgType::SyncDone)
            .await?;
        match reply {
            Message::SyncDone(done) if done.serial.get() == serial => Ok(()),
            other => Err(unexpected(&other, MsgType::SyncDone)),
        }
    }

    /// Replace the daemon clipboard. Fire-and-forget.
    pub async fn clipboard_set(&mut self, data: impl Into<Bytes>) -> Result<(), ClientError> {
        self.send(Message::ClipboardSet { data: data.into() }).await
    }

    /// Fetch the daemon clipboard (waits for the CLIPBOARD_DATA event).
    pub async fn clipboard_get(&mut self) -> Result<Bytes, ClientError> {
        self.send(Message::ClipboardRequest).await?;
        loop {
            let message = self.read_message().await?;
            match message {
                Message::ClipboardData { data } => return Ok(data),
                other if other.msg_type().class() == MsgClass::Event => self.events.push_back(other),
                other => return Err(unexpected(&other, MsgType::ClipboardData)),
            }
        }
    }

    /// Pop an already-received event without waiting.
    pub fn poll_event(&mut self) -> Option<Message> {
        self.events.pop_front()
    }

    /// Wait for the next unsolicited event (FRAME_COMPLETE, input,
    /// clipboard data, buffer release).
    pub async fn next_event(&mut self) -> Result<Message, ClientError> {
        if let Some(event) = self.events.pop_front() {
            return Ok(event);
        }
        loop {
            let message = self.read_message().await?;
            if message.msg_type().class() == MsgClass::Event {
                return Ok(message);
            }
            tracing::warn!(msg_type = message.msg_type().to_u16(), "dropping stray reply");
        }
    }

    /// Gracefully disconnect. The daemon sweeps this client's surfaces.
    pub async fn disconnect(mut self) -> Result<(), ClientError> {
        self.send(Message::Disconnect).await?;
        self.writer.shutdown().await?;
        Ok(())
    }

    /// Send a request and wait for its mirrored reply, queueing events
    /// that arrive in between.
    async fn request(&mut self, message: Message, expected: MsgType) -> Result<Message, ClientError> {
        self.send(message).await?;

        loop {
            let message = self.read_message().await?;
            match message.msg_type() {
                t if t == expected => return Ok(message),
                MsgType::ErrorReply => {
                    let Message::ErrorReply(e) = message else { continue };
                    return Err(ClientError::Rejected {
                        request_type: e.request_type.get(),
                        code: e.code.get(),
                        offset: e.offset.get(),
                    });
                },
                t if t.class() == MsgClass::Event => self.events.push_back(message),
                t => {
                    return Err(ClientError::UnexpectedReply {
                        got: t.to_u16(),
                        expected: expected.to_u16(),
                    });
                },
            }
        }
    }

    async fn send(&mut self, message: Message) -> Result<(), ClientError> {
        let frame = message.into_frame();
        let mut buf = Vec::with_capacity(frame.encoded_len());
        frame.encode(&mut buf)?;
        self.writer.write_all(&buf).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn read_message(&mut self) -> Result<Message, ClientError> {
        let mut header = [0u8; WireHeader::SIZE];
        match self.reader.read_exact(&mut header).await {
            Ok(_) => {},
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(ClientError::Closed);
            },
            Err(e) => return Err(e.into()),
        }
        let (msg_type, len) = {
            let parsed = WireHeader::parse(&header)?;
            (parsed.msg_type.get(), parsed.length.get() as usize)
        };
        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload).await?;
        let frame = WireFrame::new(msg_type, payload);
        Ok(Message::from_frame(&frame)?)
    }
}

fn unexpected(got: &Message, expected: MsgType) -> ClientError {
    ClientError::UnexpectedReply { got: got.msg_type().to_u16(), expected: expected.to_u16() }
}
