//! Daemon driver.
//!
//! The Sans-IO core: ties together client sessions, the surface
//! registry, and the compositor. The runtime (production sockets or a
//! test harness) feeds [`DaemonEvent`]s in and executes the returned
//! [`DaemonAction`]s; no I/O or clock lives in here, which is what makes
//! every protocol path testable by direct event injection.
//!
//! Per-client request ordering is preserved by construction: events
//! arrive in socket order and are processed synchronously. That is also
//! why SYNC is trivial — by the time it is processed, every earlier
//! request from that client has been applied.

use std::collections::HashMap;

use semadraw_proto::{
    Message, MsgClass, PROTOCOL_MAJOR, PROTOCOL_MINOR, REMOTE_CLIENT_BIT, WireFrame,
    payloads::{
        CommitReply, ErrorReply, FrameComplete, HelloReply, SurfaceRef,
    },
};

use crate::{
    backend::{Backend, BackendConfig, BackendError, InputEvent},
    compositor::Compositor,
    damage::DamageRect,
    registry::SurfaceRegistry,
    session::{ClientSession, SessionLimits, SessionState},
    surface::{AttachedBuffer, NoShm, ShmMapper},
};

/// Events the driver processes, produced by the runtime.
#[derive(Debug, Clone)]
pub enum DaemonEvent {
    /// A socket was accepted.
    ConnectionAccepted {
        /// Runtime-assigned session identity.
        session_id: u64,
        /// True for TCP connections.
        remote: bool,
    },
    /// A complete frame arrived on a session.
    FrameReceived {
        /// Originating session.
        session_id: u64,
        /// The frame.
        frame: WireFrame,
    },
    /// A session's socket closed (gracefully or not).
    ConnectionClosed {
        /// The closed session.
        session_id: u64,
    },
    /// Frame timer fired.
    Tick {
        /// Monotonic clock in microseconds.
        now_us: u64,
        /// Wall time the previous tick took, for overrun coalescing.
        last_tick_cost_us: u64,
    },
}

/// Actions the runtime executes on the driver's behalf.
#[derive(Debug, Clone)]
pub enum DaemonAction {
    /// Queue a frame on a session's socket.
    Send {
        /// Target session.
        session_id: u64,
        /// Frame to send.
        frame: WireFrame,
    },
    /// Close a session's socket.
    Close {
        /// Target session.
        session_id: u64,
        /// Reason, for the log.
        reason: String,
    },
}

/// Driver configuration.
#[derive(Debug, Clone, Copy)]
pub struct DaemonConfig {
    /// Per-client resource limits.
    pub limits: SessionLimits,
    /// Target refresh period in microseconds.
    pub refresh_period_us: u64,
    /// Screen framebuffer geometry.
    pub screen: BackendConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            limits: SessionLimits::default(),
            refresh_period_us: 16_667, // ~60 Hz
            screen: BackendConfig { width: 1024, height: 768 },
        }
    }
}

/// The daemon core state machine.
pub struct DaemonDriver {
    sessions: HashMap<u64, ClientSession>,
    /// Client ID → session ID, for event routing.
    clients: HashMap<u64, u64>,
    registry: SurfaceRegistry,
    compositor: Compositor,
    mapper: Box<dyn ShmMapper>,
    clipboard: Vec<u8>,
    limits: SessionLimits,
    /// Low bits of the next client ID; monotonic within daemon lifetime.
    next_client_seq: u64,
}

impl DaemonDriver {
    /// Build a driver around `backend` with no shared-memory transport.
    pub fn new(backend: Box<dyn Backend>, config: DaemonConfig) -> Result<Self, BackendError> {
        Self::with_mapper(backend, config, Box::new(NoShm))
    }

    /// Build a driver with a platform shared-memory mapper.
    pub fn with_mapper(
        backend: Box<dyn Backend>,
        config: DaemonConfig,
        mapper: Box<dyn ShmMapper>,
    ) -> Result<Self, BackendError> {
        let compositor = Compositor::new(backend, config.screen, config.refresh_period_us)?;
        Ok(Self {
            sessions: HashMap::new(),
            clients: HashMap::new(),
            registry: SurfaceRegistry::new(),
            compositor,
            mapper,
            clipboard: Vec::new(),
            limits: config.limits,
            next_client_seq: 0,
        })
    }

    /// The composed pixels of the most recent frame (test and tooling
    /// access to the reference output).
    #[must_use]
    pub fn screen_pixels(&self) -> &[u8] {
        self.compositor.pixels()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of live surfaces.
    #[must_use]
    pub fn surface_count(&self) -> usize {
        self.registry.len()
    }

    /// Process one event.
    pub fn handle(&mut self, event: DaemonEvent) -> Vec<DaemonAction> {
        match event {
            DaemonEvent::ConnectionAccepted { session_id, remote } => {
                tracing::debug!(session = session_id, remote, "session accepted");
                self.sessions.insert(session_id, ClientSession::new(session_id, remote));
                Vec::new()
            },
            DaemonEvent::FrameReceived { session_id, frame } => self.on_frame(session_id, frame),
            DaemonEvent::ConnectionClosed { session_id } => {
                self.sweep_session(session_id);
                Vec::new()
            },
            DaemonEvent::Tick { now_us, last_tick_cost_us } => self.on_tick(now_us, last_tick_cost_us),
        }
    }

    /// Remove a session and every surface it owns.
    fn sweep_session(&mut self, session_id: u64) {
        let Some(session) = self.sessions.remove(&session_id) else { return };
        if let Some(client_id) = session.client_id {
            self.clients.remove(&client_id);
            let removed = self.registry.remove_client_surfaces(client_id, self.mapper.as_ref());
            if !removed.is_empty() {
                self.compositor.damage_full();
            }
            tracing::info!(
                session = session_id,
                client = client_id,
                surfaces = removed.len(),
                "session swept"
            );
        }
    }

    fn on_frame(&mut self, session_id: u64, frame: WireFrame) -> Vec<DaemonAction> {
        let Some(session) = self.sessions.get(&session_id) else {
            tracing::warn!(session = session_id, "frame for unknown session");
            return Vec::new();
        };

        let message = match Message::from_frame(&frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(session = session_id, error = %e, "undecodable frame");
                return if session.is_active() {
                    vec![self.error_reply(
                        session_id,
                        frame.header.msg_type.get(),
                        ErrorReply::PROTOCOL,
                        0,
                    )]
                } else {
                    self.close(session_id, "malformed frame before handshake")
                };
            },
        };

        if !session.is_active() {
            return self.on_hello(session_id, message);
        }

        // Replies and events only flow daemon -> client.
        if message.msg_type().class() != MsgClass::Request {
            return self.close(session_id, "client sent a reply or event");
        }

        self.on_request(session_id, message)
    }

    fn on_hello(&mut self, session_id: u64, message: Message) -> Vec<DaemonAction> {
        let Message::Hello(hello) = message else {
            return self.close(session_id, "first message was not HELLO");
        };

        if hello.version_major.get() != PROTOCOL_MAJOR {
            let reply = self.error_reply(
                session_id,
                semadraw_proto::MsgType::Hello.to_u16(),
                ErrorReply::BAD_HANDSHAKE,
                0,
            );
            let mut actions = vec![reply];
            actions.extend(self.close(session_id, "protocol major version mismatch"));
            return actions;
        }

        self.next_client_seq += 1;
        let Some(session) = self.sessions.get_mut(&session_id) else { return Vec::new() };
        let client_id =
            if session.remote { self.next_client_seq | REMOTE_CLIENT_BIT } else { self.next_client_seq };
        session.client_id = Some(client_id);
        session.state = SessionState::Active;
        session.declared_version = Some((hello.version_major.get(), hello.version_minor.get()));
        self.clients.insert(client_id, session_id);

        tracing::info!(session = session_id, client = client_id, "handshake complete");

        vec![DaemonAction::Send {
            session_id,
            frame: Message::HelloReply(HelloReply {
                client_id: client_id.into(),
                version_major: PROTOCOL_MAJOR.into(),
                version_minor: PROTOCOL_MINOR.into(),
                max_surfaces: self.limits.max_surfaces.into(),
                max_buffer_bytes: self.limits.max_buffer_bytes.into(),
                max_inline_bytes: self.limits.max_inline_bytes.into(),
            })
            .into_frame(),
        }]
    }

    #[allow(clippy::too_many_lines)]
    fn on_request(&mut self, session_id: u64, message: Message) -> Vec<DaemonAction> {
        let request_type = message.msg_type().to_u16();
        // INVARIANT: on_frame only routes here for active sessions.
        let Some(client_id) = self.sessions.get(&session_id).and_then(|s| s.client_id) else {
            return Vec::new();
        };

        match message {
            Message::Hello(_) => self.close(session_id, "duplicate HELLO"),

            Message::CreateSurface(req) => {
                let Some(session) = self.sessions.get_mut(&session_id) else { return Vec::new() };
                if session.surfaces.len() as u32 >= self.limits.max_surfaces {
                    return vec![self.error_reply(session_id, request_type, ErrorReply::SURFACE_LIMIT, 0)];
                }
                let id = self.registry.create(
                    client_id,
                    req.width.get(),
                    req.height.get(),
                    req.scale.get(),
                );
                // INVARIANT: session presence re-checked above.
                if let Some(session) = self.sessions.get_mut(&session_id) {
                    session.surfaces.insert(id);
                }
                self.send(session_id, Message::SurfaceCreated(SurfaceRef::new(id)))
            },

            Message::DestroySurface(req) => {
                let id = req.surface_id.get();
                if let Err(code) = self.check_owner(client_id, id) {
                    return vec![self.error_reply(session_id, request_type, code, 0)];
                }
                let freed =
                    self.registry.get(id).and_then(|s| s.buffer.as_ref()).map_or(0, AttachedBuffer::byte_len);
                self.registry.destroy(id, self.mapper.as_ref());
                if let Some(session) = self.sessions.get_mut(&session_id) {
                    session.surfaces.remove(&id);
                    session.buffer_bytes = session.buffer_bytes.saturating_sub(freed);
                }
                self.compositor.damage_full();
                self.send(session_id, Message::SurfaceDestroyed(SurfaceRef::new(id)))
            },

            Message::AttachBuffer(req) => {
                let id = req.surface_id.get();
                if let Err(code) = self.check_owner(client_id, id) {
                    return vec![self.error_reply(session_id, request_type, code, 0)];
                }
                let buffer = AttachedBuffer::Shared {
                    token: req.shm_token.get(),
                    size: req.size.get(),
                    offset: req.offset.get(),
                    length: req.length.get(),
                    mapped: None,
                };
                self.attach(session_id, request_type, id, buffer, Message::BufferAttached(SurfaceRef::new(id)))
            },

            Message::AttachBufferInline { surface_id, stream } => {
                if let Err(code) = self.check_owner(client_id, surface_id) {
                    return vec![self.error_reply(session_id, request_type, code, 0)];
                }
                if stream.len() as u64 > u64::from(self.limits.max_inline_bytes) {
                    return vec![self.error_reply(session_id, request_type, ErrorReply::INLINE_TOO_LARGE, 0)];
                }
                // Validation happens here, at the trust boundary; the
                // renderer only ever sees accepted bytes.
                if let Err(e) = semadraw_sdcs::validate(&stream) {
                    tracing::debug!(surface = surface_id, error = %e, "rejected stream");
                    return vec![self.error_reply(
                        session_id,
                        request_type,
                        ErrorReply::INVALID_STREAM,
                        e.offset,
                    )];
                }
                let buffer = AttachedBuffer::Inline(stream);
                self.attach(
                    session_id,
                    request_type,
                    surface_id,
                    buffer,
                    Message::InlineBufferAttached(SurfaceRef::new(surface_id)),
                )
            },

            Message::Commit(req) => {
                let id = req.surface_id.get();
                if let Err(code) = self.check_owner(client_id, id) {
                    return vec![self.error_reply(session_id, request_type, code, 0)];
                }
                match self.registry.commit(id) {
                    None => vec![self.error_reply(session_id, request_type, ErrorReply::NO_BUFFER, 0)],
                    Some(frame) => {
                        if let Some(s) = self.registry.get(id) {
                            self.compositor.damage_rect(DamageRect {
                                x: s.x,
                                y: s.y,
                                width: s.pixel_width(),
                                height: s.pixel_height(),
                            });
                        }
                        self.send(
                            session_id,
                            Message::CommitReply(CommitReply { surface_id: id.into(), frame: frame.into() }),
                        )
                    },
                }
            },

            Message::SetVisible(req) => {
                let id = req.surface_id.get();
                if let Err(code) = self.check_owner(client_id, id) {
                    return vec![self.error_reply(session_id, request_type, code, 0)];
                }
                self.registry.set_visible(id, req.visible.get() != 0);
                self.compositor.damage_full();
                self.send(session_id, Message::VisibleSet(SurfaceRef::new(id)))
            },

            Message::SetZOrder(req) => {
                let id = req.surface_id.get();
                if let Err(code) = self.check_owner(client_id, id) {
                    return vec![self.error_reply(session_id, request_type, code, 0)];
                }
                self.registry.set_z_order(id, req.z_order.get());
                self.compositor.damage_full();
                self.send(session_id, Message::ZOrderSet(SurfaceRef::new(id)))
            },

            Message::SetPosition(req) => {
                let id = req.surface_id.get();
                if let Err(code) = self.check_owner(client_id, id) {
                    return vec![self.error_reply(session_id, request_type, code, 0)];
                }
                self.registry.set_position(id, req.x.get(), req.y.get());
                self.compositor.damage_full();
                self.send(session_id, Message::PositionSet(SurfaceRef::new(id)))
            },

            Message::Sync(req) => {
                // In-order single-threaded processing: every earlier
                // request from this client is already applied.
                self.send(session_id, Message::SyncDone(req))
            },

            Message::ClipboardSet { data } => {
                if data.len() as u64 > u64::from(self.limits.max_inline_bytes) {
                    return vec![self.error_reply(session_id, request_type, ErrorReply::INLINE_TOO_LARGE, 0)];
                }
                self.clipboard = data.to_vec();
                self.compositor.clipboard_set(&self.clipboard);
                Vec::new()
            },

            Message::ClipboardRequest => {
                let data = self.compositor.clipboard_get().unwrap_or_else(|| self.clipboard.clone());
                self.send(session_id, Message::ClipboardData { data: data.into() })
            },

            Message::Disconnect => self.close(session_id, "client disconnected"),

            // Exhaustiveness: every remaining variant is a reply or
            // event, already rejected by class in on_frame.
            _ => self.close(session_id, "client sent a reply or event"),
        }
    }

    /// Shared attach path: budget accounting, registry update, release
    /// notification for the replaced buffer.
    fn attach(
        &mut self,
        session_id: u64,
        request_type: u16,
        surface_id: u64,
        buffer: AttachedBuffer,
        reply: Message,
    ) -> Vec<DaemonAction> {
        let new_len = buffer.byte_len();
        let old_len = self
            .registry
            .get(surface_id)
            .and_then(|s| s.buffer.as_ref())
            .map_or(0, AttachedBuffer::byte_len);

        let Some(session) = self.sessions.get_mut(&session_id) else { return Vec::new() };
        let projected = session.buffer_bytes.saturating_sub(old_len).saturating_add(new_len);
        if projected > self.limits.max_buffer_bytes {
            return vec![self.error_reply(session_id, request_type, ErrorReply::BUFFER_LIMIT, 0)];
        }
        session.buffer_bytes = projected;

        let replaced = match self.registry.attach_buffer(surface_id, buffer, self.mapper.as_ref()) {
            Ok(replaced) => replaced,
            Err(_) => {
                return vec![self.error_reply(session_id, request_type, ErrorReply::SURFACE_NOT_FOUND, 0)];
            },
        };

        let mut actions = Vec::new();
        if replaced.is_some() {
            actions.push(DaemonAction::Send {
                session_id,
                frame: Message::BufferReleased(SurfaceRef::new(surface_id)).into_frame(),
            });
        }
        actions.push(DaemonAction::Send { session_id, frame: reply.into_frame() });
        actions
    }

    fn on_tick(&mut self, now_us: u64, last_tick_cost_us: u64) -> Vec<DaemonAction> {
        let outcomes =
            self.compositor.tick(now_us, last_tick_cost_us, &mut self.registry, self.mapper.as_ref());

        let mut actions = Vec::new();
        for outcome in outcomes {
            let Some(&session_id) = self.clients.get(&outcome.owner) else { continue };
            actions.push(DaemonAction::Send {
                session_id,
                frame: Message::FrameComplete(FrameComplete {
                    surface_id: outcome.surface_id.into(),
                    frame: outcome.frame.into(),
                    status: u32::from(!outcome.ok).into(),
                })
                .into_frame(),
            });
        }

        // Route input to the owner of the focused (topmost visible)
        // surface.
        let input = self.compositor.poll_input();
        if !input.is_empty() {
            if let Some(owner) = self.registry.top_visible().and_then(|id| {
                self.registry.get(id).map(|s| s.owner)
            }) {
                if let Some(&session_id) = self.clients.get(&owner) {
                    for event in input {
                        let message = match event {
                            InputEvent::Key(key) => Message::KeyPress(key),
                            InputEvent::Mouse(mouse) => Message::MouseEvent(mouse),
                        };
                        actions.push(DaemonAction::Send { session_id, frame: message.into_frame() });
                    }
                }
            }
        }

        actions
    }

    fn check_owner(&self, client_id: u64, surface_id: u64) -> Result<(), u16> {
        match self.registry.get(surface_id) {
            None => Err(ErrorReply::SURFACE_NOT_FOUND),
            Some(surface) if surface.owner != client_id => Err(ErrorReply::NOT_OWNER),
            Some(_) => Ok(()),
        }
    }

    fn error_reply(&self, session_id: u64, request_type: u16, code: u16, offset: u64) -> DaemonAction {
        DaemonAction::Send {
            session_id,
            frame: Message::ErrorReply(ErrorReply::new(request_type, code, offset)).into_frame(),
        }
    }

    fn send(&self, session_id: u64, message: Message) -> Vec<DaemonAction> {
        vec![DaemonAction::Send { session_id, frame: message.into_frame() }]
    }

    fn close(&mut self, session_id: u64, reason: &str) -> Vec<DaemonAction> {
        self.sweep_session(session_id);
        vec![DaemonAction::Close { session_id, reason: reason.to_string() }]
    }
}

#[cfg(test)]
mod tests {
    use semadraw_proto::payloads::{Hello, SetZOrder, SyncPayload};
    use semadraw_sdcs::StreamEncoder;
    use zerocopy::byteorder::little_endian::{I32, U16, U32, U64};

    use super::*;
    use crate::backend::SoftwareBackend;

    const SID: u64 = 100;
    const PERIOD: u64 = 16_667;

    fn driver() -> DaemonDriver {
        let config = DaemonConfig {
            limits: SessionLimits { max_surfaces: 2, max_buffer_bytes: 4096, max_inline_bytes: 1024 },
            refresh_period_us: PERIOD,
            screen: BackendConfig { width: 64, height: 64 },
        };
        DaemonDriver::new(Box::new(SoftwareBackend::headless()), config).unwrap()
    }

    fn connect(drv: &mut DaemonDriver, session_id: u64, remote: bool) -> u64 {
        drv.handle(DaemonEvent::ConnectionAccepted { session_id, remote });
        let actions = drv.handle(DaemonEvent::FrameReceived {
            session_id,
            frame: Message::Hello(Hello::current()).into_frame(),
        });
        let [DaemonAction::Send { frame, .. }] = &actions[..] else { panic!("expected HelloReply") };
        let Ok(Message::HelloReply(reply)) = Message::from_frame(frame) else {
            panic!("expected HelloReply")
        };
        reply.client_id.get()
    }

    fn request(drv: &mut DaemonDriver, session_id: u64, message: Message) -> Vec<Message> {
        drv.handle(DaemonEvent::FrameReceived { session_id, frame: message.into_frame() })
            .into_iter()
            .filter_map(|a| match a {
                DaemonAction::Send { frame, .. } => Message::from_frame(&frame).ok(),
                DaemonAction::Close { .. } => None,
            })
            .collect()
    }

    fn small_stream() -> Vec<u8> {
        let mut enc = StreamEncoder::new();
        enc.fill_rect(0.0, 0.0, 8.0, 8.0, [255, 0, 0, 255]).unwrap();
        enc.finish()
    }

    fn create_surface(drv: &mut DaemonDriver, session_id: u64) -> u64 {
        let replies = request(
            drv,
            session_id,
            Message::CreateSurface(semadraw_proto::payloads::CreateSurface::new(8.0, 8.0)),
        );
        let [Message::SurfaceCreated(created)] = &replies[..] else { panic!("expected creation") };
        created.surface_id.get()
    }

    #[test]
    fn hello_must_be_first() {
        let mut drv = driver();
        drv.handle(DaemonEvent::ConnectionAccepted { session_id: SID, remote: false });
        let actions = drv.handle(DaemonEvent::FrameReceived {
            session_id: SID,
            frame: Message::Sync(SyncPayload { serial: U32::new(1) }).into_frame(),
        });
        assert!(matches!(&actions[..], [DaemonAction::Close { .. }]));
        assert_eq!(drv.session_count(), 0);
    }

    #[test]
    fn version_mismatch_is_refused() {
        let mut drv = driver();
        drv.handle(DaemonEvent::ConnectionAccepted { session_id: SID, remote: false });
        let hello = Hello {
            version_major: U16::new(99),
            version_minor: U16::new(0),
            flags: U32::new(0),
        };
        let actions = drv.handle(DaemonEvent::FrameReceived {
            session_id: SID,
            frame: Message::Hello(hello).into_frame(),
        });
        assert!(matches!(
            &actions[..],
            [DaemonAction::Send { .. }, DaemonAction::Close { .. }]
        ));
    }

    #[test]
    fn remote_clients_get_the_high_bit() {
        let mut drv = driver();
        let local = connect(&mut drv, 1, false);
        let remote = connect(&mut drv, 2, true);
        assert_eq!(local & REMOTE_CLIENT_BIT, 0);
        assert_ne!(remote & REMOTE_CLIENT_BIT, 0);
    }

    #[test]
    fn full_commit_cycle_emits_frame_complete() {
        let mut drv = driver();
        connect(&mut drv, SID, false);
        let surface = create_surface(&mut drv, SID);

        let replies = request(
            &mut drv,
            SID,
            Message::AttachBufferInline { surface_id: surface, stream: small_stream().into() },
        );
        assert!(matches!(&replies[..], [Message::InlineBufferAttached(_)]));

        let replies = request(&mut drv, SID, Message::Commit(SurfaceRef::new(surface)));
        let [Message::CommitReply(commit)] = &replies[..] else { panic!("expected CommitReply") };
        assert_eq!(commit.frame.get(), 1);

        let actions = drv.handle(DaemonEvent::Tick { now_us: PERIOD, last_tick_cost_us: 0 });
        let [DaemonAction::Send { frame, .. }] = &actions[..] else {
            panic!("expected FrameComplete")
        };
        let Ok(Message::FrameComplete(done)) = Message::from_frame(frame) else {
            panic!("expected FrameComplete")
        };
        assert_eq!(done.surface_id.get(), surface);
        assert_eq!(done.frame.get(), 1);
        assert_eq!(done.status.get(), 0);

        // The red fill landed on the composed screen.
        assert_eq!(&drv.screen_pixels()[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn surface_limit_enforced() {
        let mut drv = driver();
        connect(&mut drv, SID, false);
        create_surface(&mut drv, SID);
        create_surface(&mut drv, SID);
        let replies = request(
            &mut drv,
            SID,
            Message::CreateSurface(semadraw_proto::payloads::CreateSurface::new(8.0, 8.0)),
        );
        let [Message::ErrorReply(e)] = &replies[..] else { panic!("expected error") };
        assert_eq!(e.code.get(), ErrorReply::SURFACE_LIMIT);
    }

    #[test]
    fn inline_limit_enforced() {
        let mut drv = driver();
        connect(&mut drv, SID, false);
        let surface = create_surface(&mut drv, SID);
        let replies = request(
            &mut drv,
            SID,
            Message::AttachBufferInline { surface_id: surface, stream: vec![0u8; 2048].into() },
        );
        let [Message::ErrorReply(e)] = &replies[..] else { panic!("expected error") };
        assert_eq!(e.code.get(), ErrorReply::INLINE_TOO_LARGE);
    }

    #[test]
    fn invalid_stream_rejected_with_offset() {
        let mut drv = driver();
        connect(&mut drv, SID, false);
        let surface = create_surface(&mut drv, SID);

        let mut stream = small_stream();
        stream[0] = b'X'; // break the magic
        let replies =
            request(&mut drv, SID, Message::AttachBufferInline { surface_id: surface, stream: stream.into() });
        let [Message::ErrorReply(e)] = &replies[..] else { panic!("expected error") };
        assert_eq!(e.code.get(), ErrorReply::INVALID_STREAM);
        assert_eq!(e.offset.get(), 0);
    }

    #[test]
    fn foreign_surfaces_are_protected() {
        let mut drv = driver();
        connect(&mut drv, 1, false);
        connect(&mut drv, 2, false);
        let surface = create_surface(&mut drv, 1);

        let replies = request(
            &mut drv,
            2,
            Message::SetZOrder(SetZOrder { surface_id: U64::new(surface), z_order: I32::new(1) }),
        );
        let [Message::ErrorReply(e)] = &replies[..] else { panic!("expected error") };
        assert_eq!(e.code.get(), ErrorReply::NOT_OWNER);
    }

    #[test]
    fn commit_without_buffer_is_an_error() {
        let mut drv = driver();
        connect(&mut drv, SID, false);
        let surface = create_surface(&mut drv, SID);
        let replies = request(&mut drv, SID, Message::Commit(SurfaceRef::new(surface)));
        let [Message::ErrorReply(e)] = &replies[..] else { panic!("expected error") };
        assert_eq!(e.code.get(), ErrorReply::NO_BUFFER);
    }

    #[test]
    fn sync_echoes_its_serial() {
        let mut drv = driver();
        connect(&mut drv, SID, false);
        let replies = request(&mut drv, SID, Message::Sync(SyncPayload { serial: U32::new(7) }));
        let [Message::SyncDone(done)] = &replies[..] else { panic!("expected SyncDone") };
        assert_eq!(done.serial.get(), 7);
    }

    #[test]
    fn clipboard_round_trips_through_the_daemon() {
        let mut drv = driver();
        connect(&mut drv, SID, false);
        request(&mut drv, SID, Message::ClipboardSet { data: bytes::Bytes::from_static(b"copy") });
        let replies = request(&mut drv, SID, Message::ClipboardRequest);
        let [Message::ClipboardData { data }] = &replies[..] else { panic!("expected data") };
        assert_eq!(data.as_ref(), b"copy");
    }

    #[test]
    fn replacing_a_buffer_emits_buffer_released() {
        let mut drv = driver();
        connect(&mut drv, SID, false);
        let surface = create_surface(&mut drv, SID);
        request(
            &mut drv,
            SID,
            Message::AttachBufferInline { surface_id: surface, stream: small_stream().into() },
        );
        let replies = request(
            &mut drv,
            SID,
            Message::AttachBufferInline { surface_id: surface, stream: small_stream().into() },
        );
        assert!(matches!(
            &replies[..],
            [Message::BufferReleased(_), Message::InlineBufferAttached(_)]
        ));
    }

    /// Test mapper: serves one pre-baked stream for any token and
    /// records map/unmap calls.
    struct RecordingMapper {
        stream: Vec<u8>,
        maps: std::sync::Mutex<Vec<u64>>,
        unmaps: std::sync::Mutex<Vec<u64>>,
    }

    impl crate::ShmMapper for std::sync::Arc<RecordingMapper> {
        fn map(&self, token: u64, _size: u64, _offset: u64, _length: u64) -> Option<bytes::Bytes> {
            self.maps.lock().unwrap().push(token);
            Some(bytes::Bytes::from(self.stream.clone()))
        }

        fn unmap(&self, token: u64) {
            self.unmaps.lock().unwrap().push(token);
        }
    }

    #[test]
    fn shared_buffers_map_lazily_and_unmap_on_destroy() {
        let mapper = std::sync::Arc::new(RecordingMapper {
            stream: small_stream(),
            maps: std::sync::Mutex::new(Vec::new()),
            unmaps: std::sync::Mutex::new(Vec::new()),
        });
        let config = DaemonConfig {
            limits: SessionLimits::default(),
            refresh_period_us: PERIOD,
            screen: BackendConfig { width: 64, height: 64 },
        };
        let mut drv = DaemonDriver::with_mapper(
            Box::new(crate::backend::SoftwareBackend::headless()),
            config,
            Box::new(std::sync::Arc::clone(&mapper)),
        )
        .unwrap();

        connect(&mut drv, SID, false);
        let surface = create_surface(&mut drv, SID);
        let replies = request(
            &mut drv,
            SID,
            Message::AttachBuffer(semadraw_proto::payloads::AttachBuffer {
                surface_id: surface.into(),
                shm_token: 77u64.into(),
                size: 4096u64.into(),
                offset: 0u64.into(),
                length: (small_stream().len() as u64).into(),
            }),
        );
        assert!(matches!(&replies[..], [Message::BufferAttached(_)]));
        // Mapping is lazy: nothing mapped until the compositor reads.
        assert!(mapper.maps.lock().unwrap().is_empty());

        request(&mut drv, SID, Message::Commit(SurfaceRef::new(surface)));
        let actions = drv.handle(DaemonEvent::Tick { now_us: PERIOD, last_tick_cost_us: 0 });
        assert_eq!(mapper.maps.lock().unwrap().as_slice(), &[77]);
        let [DaemonAction::Send { frame, .. }] = &actions[..] else {
            panic!("expected FrameComplete")
        };
        let Ok(Message::FrameComplete(done)) = Message::from_frame(frame) else {
            panic!("expected FrameComplete")
        };
        assert_eq!(done.status.get(), 0);
        // The mapped stream's pixels reached the screen.
        assert_eq!(&drv.screen_pixels()[0..4], &[255, 0, 0, 255]);

        // Destroy guarantees the unmap.
        request(&mut drv, SID, Message::DestroySurface(SurfaceRef::new(surface)));
        assert_eq!(mapper.unmaps.lock().unwrap().as_slice(), &[77]);
    }

    #[test]
    fn disconnect_sweeps_owned_surfaces() {
        let mut drv = driver();
        connect(&mut drv, 1, false);
        connect(&mut drv, 2, false);
        create_surface(&mut drv, 1);
        create_surface(&mut drv, 2);
        assert_eq!(drv.surface_count(), 2);

        drv.handle(DaemonEvent::ConnectionClosed { session_id: 1 });
        assert_eq!(drv.session_count(), 1);
        assert_eq!(drv.surface_count(), 1);
    }
}
