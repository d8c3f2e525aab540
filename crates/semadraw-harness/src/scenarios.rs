//! Builders for the golden end-to-end scenes.
//!
//! Each scenario returns the encoded stream plus the framebuffer size it
//! is meant for; the pixel-level expectations live in the tests that
//! consume them.

// Scenario builders feed constants into the encoder; a failed expect
// here is a harness bug, not a test subject.
#![allow(clippy::expect_used)]

use semadraw_sdcs::{BlendMode, StreamEncoder};

/// A scenario: stream bytes and target framebuffer geometry.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Encoded SDCS stream.
    pub stream: Vec<u8>,
    /// Framebuffer width the expectations assume.
    pub width: u32,
    /// Framebuffer height the expectations assume.
    pub height: u32,
}

/// Red 120×120 at (40,40), then green 120×120 at (80,80), SrcOver.
#[must_use]
pub fn overlap() -> Scenario {
    let mut enc = StreamEncoder::new();
    enc.fill_rect(40.0, 40.0, 120.0, 120.0, [255, 0, 0, 255]).expect("finite");
    enc.fill_rect(80.0, 80.0, 120.0, 120.0, [0, 255, 0, 255]).expect("finite");
    Scenario { stream: enc.finish(), width: 512, height: 512 }
}

/// Blue rect at fractional coordinates with AA off: pins the
/// pixel-center-inside rule.
#[must_use]
pub fn fractional() -> Scenario {
    let mut enc = StreamEncoder::new();
    enc.fill_rect(10.5, 10.25, 50.75, 30.5, [0, 0, 255, 255]).expect("finite");
    Scenario { stream: enc.finish(), width: 128, height: 64 }
}

/// Clip to (64,64,128,128), fill the whole 256×256 yellow.
#[must_use]
pub fn clip() -> Scenario {
    let mut enc = StreamEncoder::new();
    enc.set_clip_rects(&[[64.0, 64.0, 128.0, 128.0]]).expect("finite");
    enc.fill_rect(0.0, 0.0, 256.0, 256.0, [255, 255, 0, 255]).expect("finite");
    Scenario { stream: enc.finish(), width: 256, height: 256 }
}

/// Translate (40,30), fill magenta (10,10,80,40): pixels land in
/// (50..130, 40..80) only.
#[must_use]
pub fn transform() -> Scenario {
    let mut enc = StreamEncoder::new();
    enc.set_transform_2d([1.0, 0.0, 0.0, 1.0, 40.0, 30.0]).expect("finite");
    enc.fill_rect(10.0, 10.0, 80.0, 40.0, [255, 0, 255, 255]).expect("finite");
    Scenario { stream: enc.finish(), width: 256, height: 256 }
}

/// Opaque blue base, then half-alpha yellow over it in SrcOver.
#[must_use]
pub fn blend() -> Scenario {
    let mut enc = StreamEncoder::new();
    enc.set_blend(BlendMode::Src);
    enc.fill_rect(0.0, 0.0, 64.0, 64.0, [0, 0, 255, 255]).expect("finite");
    enc.set_blend(BlendMode::SrcOver);
    enc.fill_rect(0.0, 0.0, 64.0, 64.0, [255, 255, 0, 128]).expect("finite");
    Scenario { stream: enc.finish(), width: 64, height: 64 }
}

/// A busy scene touching every draw opcode, for determinism hashing.
#[must_use]
pub fn kitchen_sink() -> Scenario {
    let mut enc = StreamEncoder::new();
    enc.set_antialias(true);
    enc.fill_rect(3.25, 4.75, 100.5, 60.25, [200, 30, 30, 220]).expect("finite");
    enc.set_blend(BlendMode::Add);
    enc.fill_rect(20.0, 20.0, 80.0, 80.0, [0, 80, 0, 255]).expect("finite");
    enc.set_blend(BlendMode::SrcOver);
    enc.set_stroke_join(semadraw_sdcs::StrokeJoin::Round);
    enc.set_stroke_cap(semadraw_sdcs::StrokeCap::Square);
    enc.stroke_line(10.0, 110.0, 90.0, 110.0, 5.0, [30, 30, 200, 255]).expect("finite");
    enc.stroke_line(90.0, 110.0, 90.0, 40.0, 5.0, [30, 30, 200, 255]).expect("finite");
    enc.stroke_rect(5.0, 5.0, 118.0, 118.0, 3.0, [250, 250, 250, 180]).expect("finite");
    enc.stroke_quad_bezier(10.0, 60.0, 64.0, 0.0, 118.0, 60.0, 2.0, [255, 160, 0, 255])
        .expect("finite");
    enc.stroke_cubic_bezier(10.0, 80.0, 40.0, 120.0, 90.0, 40.0, 118.0, 80.0, 2.0, [0, 200, 200, 255])
        .expect("finite");
    enc.stroke_path(&[[20.0, 20.0], [40.0, 20.0], [40.0, 40.0], [20.0, 40.0]], 2.0, [120, 0, 120, 255])
        .expect("finite");
    let pixels: Vec<u8> = (0..16 * 16 * 4).map(|i| (i * 7 % 251) as u8).collect();
    enc.blit_image(70.0, 70.0, 16, 16, &pixels).expect("finite");
    let coverage: Vec<u8> = (0..32 * 16).map(|i| (i * 13 % 256) as u8).collect();
    enc.draw_glyph_run(30.0, 90.0, [255, 255, 255, 255], 32, 16, 4, 8, 16, &coverage, &[
        (0, 0.0, 0.0),
        (1, 8.0, 0.0),
        (2, 16.0, 0.0),
        (3, 24.0, 0.0),
    ])
    .expect("finite");
    Scenario { stream: enc.finish(), width: 128, height: 128 }
}
