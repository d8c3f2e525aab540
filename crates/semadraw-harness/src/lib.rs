//! Testing harness for the semadraw stack.
//!
//! Three kinds of ammunition, shared by the integration tests and the
//! fuzz targets:
//!
//! - [`scenarios`]: builders for the concrete end-to-end golden scenes
//!   (overlap, fractional coordinates, clip, transform, blend,
//!   determinism) with their expected pixel facts.
//! - [`corpus`]: malformed-stream generators covering the boundary cases
//!   the validator must reject, each paired with the expected error
//!   kind.
//! - [`model`]: a deliberately naive reference implementation of the
//!   surface registry for model-based comparison — operations are
//!   applied to both and their observable state must agree.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod corpus;
pub mod model;
pub mod scenarios;

use semadraw_render::Framebuffer;
use sha2::{Digest, Sha256};

/// Hex SHA-256 of a framebuffer's bytes, the currency of determinism
/// checks.
#[must_use]
pub fn framebuffer_digest(fb: &Framebuffer) -> String {
    hex::encode(Sha256::digest(fb.pixels()))
}

/// Render a stream `runs` times at `width`×`height` and return the
/// digest of every run.
#[must_use]
pub fn digest_runs(stream: &[u8], width: u32, height: u32, runs: usize) -> Vec<String> {
    (0..runs)
        .map(|_| {
            let mut fb = Framebuffer::new(width, height);
            // Scenario streams are built by the encoder; validation
            // failures here are harness bugs, not test subjects.
            #[allow(clippy::expect_used)]
            semadraw_render::render(stream, &mut fb).expect("harness stream must validate");
            framebuffer_digest(&fb)
        })
        .collect()
}
