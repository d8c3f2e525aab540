//! Display backend abstraction.
//!
//! Backends sit behind a capability vtable with one hard contract: a
//! backend may optimize, never redefine semantics. The software backend
//! is the reference — it runs the semantic oracle in
//! [`semadraw_render`] — and any accelerated implementation must match
//! its pixels bit-for-bit. Untrusted implementations can be hosted in a
//! child process behind [`crate::isolated::IsolatedBackend`].

use semadraw_proto::payloads::{KeyPress, MouseEvent};
use semadraw_render::{Framebuffer, render_validated};
use thiserror::Error;

/// Backend failure modes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Backend cannot run in this build or environment.
    #[error("backend unavailable: {0}")]
    Unavailable(&'static str),

    /// Initialization failed.
    #[error("init failed: {0}")]
    Init(String),

    /// A render call failed; the frame is dropped, the daemon lives on.
    #[error("render failed: {0}")]
    Render(String),

    /// A present call failed; the frame is dropped, the daemon lives on.
    #[error("present failed: {0}")]
    Present(String),
}

/// What a backend can do, beyond the mandatory render/present contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Symbolic backend name.
    pub name: &'static str,
    /// True when rendering is hardware-accelerated.
    pub accelerated: bool,
    /// True when [`Backend::poll_input`] can ever return events.
    pub input: bool,
    /// True when the backend bridges a platform clipboard.
    pub clipboard: bool,
    /// True when [`Backend::resize`] is meaningful.
    pub resizable: bool,
}

/// Initial framebuffer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendConfig {
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
}

/// One surface's contribution to a frame.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    /// Surface being rendered.
    pub surface_id: u64,
    /// Validated SDCS bytes.
    pub stream: &'a [u8],
    /// Destination x in framebuffer pixels.
    pub x: i32,
    /// Destination y in framebuffer pixels.
    pub y: i32,
    /// Surface width in pixels.
    pub width: u32,
    /// Surface height in pixels.
    pub height: u32,
    /// Surface scale factor.
    pub scale: f32,
}

/// Input events a backend may surface to the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Keyboard event.
    Key(KeyPress),
    /// Pointer event.
    Mouse(MouseEvent),
}

/// The backend vtable.
///
/// `render` is synchronous: backends with internal threads or GPU queues
/// must not let that reorder visible effects. The compositor calls
/// `begin_frame`, then `render` once per visible surface back-to-front,
/// then `present`.
pub trait Backend: Send {
    /// Capability record.
    fn capabilities(&self) -> Capabilities;

    /// Initialize with the target framebuffer size.
    fn init(&mut self, config: BackendConfig) -> Result<(), BackendError>;

    /// Start a frame: reset the target to the background.
    fn begin_frame(&mut self);

    /// Composite one surface's stream at its destination geometry.
    fn render(&mut self, request: &RenderRequest<'_>) -> Result<(), BackendError>;

    /// Publish the composed frame.
    fn present(&mut self) -> Result<(), BackendError>;

    /// The composed RGBA8 pixels of the last frame.
    fn pixels(&self) -> &[u8];

    /// Resize the target framebuffer.
    fn resize(&mut self, width: u32, height: u32) -> Result<(), BackendError>;

    /// Drain pending input events.
    fn poll_input(&mut self) -> Vec<InputEvent>;

    /// Read the platform clipboard, if this backend bridges one.
    fn clipboard_get(&mut self) -> Option<Vec<u8>>;

    /// Write the platform clipboard, if this backend bridges one.
    fn clipboard_set(&mut self, data: &[u8]);

    /// Tear down platform resources.
    fn shutdown(&mut self);
}

/// Opaque black; surfaces composite over this each frame.
const BACKGROUND: [u8; 4] = [0, 0, 0, 255];

/// The reference backend: CPU rendering via the semantic oracle.
pub struct SoftwareBackend {
    screen: Framebuffer,
    name: &'static str,
    input_capable: bool,
}

impl SoftwareBackend {
    /// The standard software backend.
    #[must_use]
    pub fn new() -> Self {
        Self { screen: Framebuffer::new(0, 0), name: "software", input_capable: false }
    }

    /// The headless variant: identical pixels, no input, no clipboard
    /// bridging, presents discarded.
    #[must_use]
    pub fn headless() -> Self {
        Self { screen: Framebuffer::new(0, 0), name: "headless", input_capable: false }
    }
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for SoftwareBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            name: self.name,
            accelerated: false,
            input: self.input_capable,
            clipboard: false,
            resizable: true,
        }
    }

    fn init(&mut self, config: BackendConfig) -> Result<(), BackendError> {
        self.screen = Framebuffer::new(config.width, config.height);
        self.screen.fill(BACKGROUND);
        Ok(())
    }

    fn begin_frame(&mut self) {
        self.screen.fill(BACKGROUND);
    }

    fn render(&mut self, request: &RenderRequest<'_>) -> Result<(), BackendError> {
        let mut surface_fb = Framebuffer::new(request.width, request.height);
        render_validated(request.stream, &mut surface_fb);

        // SrcOver the surface onto the screen at its position.
        for sy in 0..request.height {
            for sx in 0..request.width {
                let px = surface_fb.pixel(sx, sy);
                if px[3] == 0 {
                    continue;
                }
                let dx = i64::from(request.x) + i64::from(sx);
                let dy = i64::from(request.y) + i64::from(sy);
                if dx < 0 || dy < 0 {
                    continue;
                }
                self.screen.blend_pixel(dx as u32, dy as u32, px, semadraw_sdcs::BlendMode::SrcOver);
            }
        }
        Ok(())
    }

    fn present(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn pixels(&self) -> &[u8] {
        self.screen.pixels()
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), BackendError> {
        self.screen = Framebuffer::new(width, height);
        self.screen.fill(BACKGROUND);
        Ok(())
    }

    fn poll_input(&mut self) -> Vec<InputEvent> {
        Vec::new()
    }

    fn clipboard_get(&mut self) -> Option<Vec<u8>> {
        None
    }

    fn clipboard_set(&mut self, _data: &[u8]) {}

    fn shutdown(&mut self) {}
}

/// The closed set of backend selectors the daemon CLI accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    /// CPU reference backend.
    Software,
    /// CPU backend without presentation.
    Headless,
    /// DRM/KMS display output.
    Kms,
    /// X11 window output.
    X11,
    /// Vulkan-accelerated output.
    Vulkan,
    /// Wayland window output.
    Wayland,
}

/// Instantiate the selected backend.
///
/// # Errors
///
/// [`BackendError::Unavailable`] for the platform backends this build
/// does not carry; their contract is defined here, their implementations
/// live out of tree.
pub fn create_backend(kind: BackendKind) -> Result<Box<dyn Backend>, BackendError> {
    match kind {
        BackendKind::Software => Ok(Box::new(SoftwareBackend::new())),
        BackendKind::Headless => Ok(Box::new(SoftwareBackend::headless())),
        BackendKind::Kms => Err(BackendError::Unavailable("kms requires a DRM display build")),
        BackendKind::X11 => Err(BackendError::Unavailable("x11 requires a platform display build")),
        BackendKind::Vulkan => {
            Err(BackendError::Unavailable("vulkan requires a platform display build"))
        },
        BackendKind::Wayland => {
            Err(BackendError::Unavailable("wayland requires a platform display build"))
        },
    }
}
