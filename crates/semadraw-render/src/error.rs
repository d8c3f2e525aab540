//! Renderer error type.

use thiserror::Error;

/// Why a render call was refused. Execution of a validated stream cannot
/// fail; the only error source is validation of the input bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The stream failed validation. The framebuffer was not touched.
    #[error("invalid stream: {0}")]
    InvalidStream(#[from] semadraw_sdcs::ValidateError),
}
