//! Child-process backend isolation.
//!
//! Untrusted backend implementations run in a separate process and speak
//! the same wire-frame format as client IPC over their stdio pipes. A
//! fault in the hosted backend surfaces as a [`BackendError`] on the
//! daemon side, never a daemon crash.
//!
//! The host protocol is a private slice of the request/reply type space:
//! each request `0x0Fxx` is answered by `0x8Fxx` (mirrored low bits) on
//! success or [`HOST_ERR`] with a UTF-8 message trailer on failure.

use std::{
    io::{Read, Write},
    process::{Child, Command, Stdio},
};

use semadraw_proto::{WireFrame, WireHeader};

use crate::backend::{Backend, BackendConfig, BackendError, Capabilities, InputEvent, RenderRequest};

/// Initialize the hosted backend: `[width u32][height u32]`.
pub const HOST_INIT: u16 = 0x0F01;
/// Begin a frame. Empty payload.
pub const HOST_BEGIN: u16 = 0x0F02;
/// Render one surface:
/// `[surface_id u64][x i32][y i32][w u32][h u32][scale f32][stream ..]`.
pub const HOST_RENDER: u16 = 0x0F03;
/// Present the frame. Empty payload.
pub const HOST_PRESENT: u16 = 0x0F04;
/// Fetch the composed pixels; the reply payload is the raw RGBA8 plane.
pub const HOST_PIXELS: u16 = 0x0F05;
/// Resize: `[width u32][height u32]`.
pub const HOST_RESIZE: u16 = 0x0F06;
/// Tear down and exit the host process. Empty payload.
pub const HOST_SHUTDOWN: u16 = 0x0F07;
/// Failure reply; payload is a UTF-8 message.
pub const HOST_ERR: u16 = 0x8FFE;

fn ok_reply(request: u16) -> u16 {
    request | 0x8000
}

fn read_frame(reader: &mut impl Read) -> std::io::Result<WireFrame> {
    let mut header = [0u8; WireHeader::SIZE];
    reader.read_exact(&mut header)?;
    let parsed = WireHeader::parse(&header)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
    let mut payload = vec![0u8; parsed.length.get() as usize];
    reader.read_exact(&mut payload)?;
    Ok(WireFrame::new(parsed.msg_type.get(), payload))
}

fn write_frame(writer: &mut impl Write, frame: &WireFrame) -> std::io::Result<()> {
    let mut buf = Vec::with_capacity(frame.encoded_len());
    frame
        .encode(&mut buf)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
    writer.write_all(&buf)?;
    writer.flush()
}

/// A backend hosted in a child process.
///
/// `render` and `present` are synchronous round-trips to the child, so
/// the vtable contract (no reordering of visible effects) holds
/// trivially.
pub struct IsolatedBackend {
    child: Child,
    stdin: std::process::ChildStdin,
    stdout: std::process::ChildStdout,
    /// Cached pixel plane from the last `HOST_PIXELS` round-trip.
    pixels: Vec<u8>,
}

impl IsolatedBackend {
    /// Spawn `command` (typically `semadrawd --backend-host <name>`) and
    /// wrap its stdio as the backend transport.
    pub fn spawn(mut command: Command) -> Result<Self, BackendError> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| BackendError::Init(format!("spawn failed: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BackendError::Init("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BackendError::Init("child stdout unavailable".to_string()))?;
        Ok(Self { child, stdin, stdout, pixels: Vec::new() })
    }

    /// One request/reply round-trip with the child.
    fn call(&mut self, msg_type: u16, payload: Vec<u8>) -> Result<WireFrame, BackendError> {
        let to_err = |e: std::io::Error| BackendError::Render(format!("host transport: {e}"));
        write_frame(&mut self.stdin, &WireFrame::new(msg_type, payload)).map_err(to_err)?;
        let reply = read_frame(&mut self.stdout).map_err(to_err)?;
        let reply_type = reply.header.msg_type.get();
        if reply_type == HOST_ERR {
            let message = String::from_utf8_lossy(&reply.payload).into_owned();
            return Err(BackendError::Render(message));
        }
        if reply_type != ok_reply(msg_type) {
            return Err(BackendError::Render(format!(
                "host replied {reply_type:#06x} to {msg_type:#06x}"
            )));
        }
        Ok(reply)
    }
}

impl Drop for IsolatedBackend {
    fn drop(&mut self) {
        let _ = write_frame(&mut self.stdin, &WireFrame::new(HOST_SHUTDOWN, Vec::new()));
        let _ = self.child.wait();
    }
}

impl Backend for IsolatedBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            name: "isolated",
            accelerated: false,
            input: false,
            clipboard: false,
            resizable: true,
        }
    }

    fn init(&mut self, config: BackendConfig) -> Result<(), BackendError> {
        let mut payload = Vec::with_capacity(8);
        payload.extend_from_slice(&config.width.to_le_bytes());
        payload.extend_from_slice(&config.height.to_le_bytes());
        self.call(HOST_INIT, payload).map_err(|e| BackendError::Init(e.to_string()))?;
        Ok(())
    }

    fn begin_frame(&mut self) {
        if let Err(e) = self.call(HOST_BEGIN, Vec::new()) {
            tracing::warn!(error = %e, "isolated backend begin_frame failed");
        }
    }

    fn render(&mut self, request: &RenderRequest<'_>) -> Result<(), BackendError> {
        let mut payload = Vec::with_capacity(28 + request.stream.len());
        payload.extend_from_slice(&request.surface_id.to_le_bytes());
        payload.extend_from_slice(&request.x.to_le_bytes());
        payload.extend_from_slice(&request.y.to_le_bytes());
        payload.extend_from_slice(&request.width.to_le_bytes());
        payload.extend_from_slice(&request.height.to_le_bytes());
        payload.extend_from_slice(&request.scale.to_le_bytes());
        payload.extend_from_slice(request.stream);
        self.call(HOST_RENDER, payload)?;
        Ok(())
    }

    fn present(&mut self) -> Result<(), BackendError> {
        self.call(HOST_PRESENT, Vec::new())
            .map_err(|e| BackendError::Present(e.to_string()))?;
        // Refresh the pixel cache while the frame is coherent.
        let reply = self.call(HOST_PIXELS, Vec::new())?;
        self.pixels = reply.payload.to_vec();
        Ok(())
    }

    fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), BackendError> {
        let mut payload = Vec::with_capacity(8);
        payload.extend_from_slice(&width.to_le_bytes());
        payload.extend_from_slice(&height.to_le_bytes());
        self.call(HOST_RESIZE, payload)?;
        Ok(())
    }

    fn poll_input(&mut self) -> Vec<InputEvent> {
        Vec::new()
    }

    fn clipboard_get(&mut self) -> Option<Vec<u8>> {
        None
    }

    fn clipboard_set(&mut self, _data: &[u8]) {}

    fn shutdown(&mut self) {
        let _ = write_frame(&mut self.stdin, &WireFrame::new(HOST_SHUTDOWN, Vec::new()));
    }
}

fn le_u32(bytes: &[u8], at: usize) -> Option<u32> {
    bytes.get(at..at + 4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn le_u64(bytes: &[u8], at: usize) -> Option<u64> {
    bytes.get(at..at + 8).map(|b| {
        u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
    })
}

/// Host side: serve a backend over `input`/`output` until shutdown.
///
/// Runs inside `semadrawd --backend-host <name>`; the daemon parent
/// holds the [`IsolatedBackend`] end of the pipes.
pub fn run_backend_host(
    mut backend: Box<dyn Backend>,
    mut input: impl Read,
    mut output: impl Write,
) -> std::io::Result<()> {
    loop {
        let frame = match read_frame(&mut input) {
            Ok(frame) => frame,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        };
        let msg_type = frame.header.msg_type.get();
        let payload = &frame.payload;

        let reply = match msg_type {
            HOST_INIT | HOST_RESIZE => {
                match (le_u32(payload, 0), le_u32(payload, 4)) {
                    (Some(width), Some(height)) => {
                        let result = if msg_type == HOST_INIT {
                            backend.init(BackendConfig { width, height })
                        } else {
                            backend.resize(width, height)
                        };
                        match result {
                            Ok(()) => WireFrame::new(ok_reply(msg_type), Vec::new()),
                            Err(e) => WireFrame::new(HOST_ERR, e.to_string().into_bytes()),
                        }
                    },
                    _ => WireFrame::new(HOST_ERR, b"short init payload".to_vec()),
                }
            },
            HOST_BEGIN => {
                backend.begin_frame();
                WireFrame::new(ok_reply(msg_type), Vec::new())
            },
            HOST_RENDER => match decode_render(payload) {
                Some((surface_id, x, y, width, height, scale, stream_at)) => {
                    let request = RenderRequest {
                        surface_id,
                        stream: &payload[stream_at..],
                        x,
                        y,
                        width,
                        height,
                        scale,
                    };
                    match backend.render(&request) {
                        Ok(()) => WireFrame::new(ok_reply(msg_type), Vec::new()),
                        Err(e) => WireFrame::new(HOST_ERR, e.to_string().into_bytes()),
                    }
                },
                None => WireFrame::new(HOST_ERR, b"short render payload".to_vec()),
            },
            HOST_PRESENT => match backend.present() {
                Ok(()) => WireFrame::new(ok_reply(msg_type), Vec::new()),
                Err(e) => WireFrame::new(HOST_ERR, e.to_string().into_bytes()),
            },
            HOST_PIXELS => WireFrame::new(ok_reply(msg_type), backend.pixels().to_vec()),
            HOST_SHUTDOWN => {
                backend.shutdown();
                return Ok(());
            },
            other => WireFrame::new(HOST_ERR, format!("unknown host request {other:#06x}").into_bytes()),
        };

        write_frame(&mut output, &reply)?;
    }
}

#[allow(clippy::type_complexity)]
fn decode_render(payload: &[u8]) -> Option<(u64, i32, i32, u32, u32, f32, usize)> {
    let surface_id = le_u64(payload, 0)?;
    let x = le_u32(payload, 8)? as i32;
    let y = le_u32(payload, 12)? as i32;
    let width = le_u32(payload, 16)?;
    let height = le_u32(payload, 20)?;
    let scale = f32::from_bits(le_u32(payload, 24)?);
    Some((surface_id, x, y, width, height, scale, 28))
}
