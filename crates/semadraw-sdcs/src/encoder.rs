//! Stream construction.
//!
//! [`StreamEncoder`] writes a stream header and a single `CMDS` chunk into
//! a growable buffer, backpatching the chunk and stream sizes on
//! [`StreamEncoder::finish`]. The per-opcode helpers reject arguments the
//! validator would bounce (non-finite floats, oversized counts, mismatched
//! inline lengths), which is what makes `validate(encode(..))` a law
//! rather than a hope.
//!
//! The buffer is 8-aligned between records; padding bytes are zero.

use zerocopy::IntoBytes;

use crate::{
    BlendMode, CHUNK_CMDS, EncodeError, Opcode, StrokeCap, StrokeJoin,
    headers::{ChunkHeader, CmdHeader, StreamHeader},
    pad8,
};

/// Incremental writer for a single-`CMDS`-chunk stream.
#[derive(Debug, Clone)]
pub struct StreamEncoder {
    buf: Vec<u8>,
    flags: u32,
}

impl Default for StreamEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamEncoder {
    /// An encoder with no stream flags set.
    #[must_use]
    pub fn new() -> Self {
        Self::with_flags(0)
    }

    /// An encoder with the given stream-level flags.
    #[must_use]
    pub fn with_flags(flags: u32) -> Self {
        let mut buf = Vec::with_capacity(256);
        // Placeholder header and chunk header; both are backpatched.
        buf.extend_from_slice(StreamHeader::new(0, 0, flags).as_bytes());
        buf.extend_from_slice(ChunkHeader::new(CHUNK_CMDS, StreamHeader::SIZE as u64, 0).as_bytes());
        Self { buf, flags }
    }

    /// Append `End` and return the finished stream with all sizes
    /// backpatched.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        self.cmd(Opcode::End, &[]);
        self.finish_without_end()
    }

    /// Backpatch sizes without appending `End`.
    ///
    /// The result fails validation with `MissingEnd` unless `end` was
    /// called explicitly; tests and fuzz corpora use this to produce
    /// structurally-correct-but-incomplete streams.
    #[must_use]
    pub fn finish_without_end(mut self) -> Vec<u8> {
        let payload = (self.buf.len() - StreamHeader::SIZE - ChunkHeader::SIZE) as u64;
        let chunk = ChunkHeader::new(CHUNK_CMDS, StreamHeader::SIZE as u64, payload);
        self.buf[StreamHeader::SIZE..StreamHeader::SIZE + ChunkHeader::SIZE]
            .copy_from_slice(chunk.as_bytes());

        let header = StreamHeader::new(self.buf.len() as u64, 1, self.flags);
        self.buf[..StreamHeader::SIZE].copy_from_slice(header.as_bytes());
        self.buf
    }

    /// Append one command record: header, payload, zero padding.
    fn cmd(&mut self, op: Opcode, payload: &[u8]) {
        debug_assert!(self.buf.len() % 8 == 0, "encoder buffer lost 8-alignment");
        debug_assert!(payload.len() <= u32::MAX as usize);

        self.buf.extend_from_slice(CmdHeader::new(op, payload.len() as u32).as_bytes());
        self.buf.extend_from_slice(payload);
        let pad = pad8(CmdHeader::SIZE + payload.len());
        self.buf.extend_from_slice(&[0u8; 7][..pad]);
    }

    fn finite(value: f32, slot: &'static str) -> Result<f32, EncodeError> {
        if value.is_finite() { Ok(value) } else { Err(EncodeError::NonFinite { slot }) }
    }

    /// Restore all raster state to defaults.
    pub fn reset(&mut self) {
        self.cmd(Opcode::Reset, &[]);
    }

    /// Explicitly terminate the command sequence. [`Self::finish`] appends
    /// a final `End` regardless; duplicates are valid (the first wins).
    pub fn end(&mut self) {
        self.cmd(Opcode::End, &[]);
    }

    /// Set the affine transform `(a, b, c, d, e, f)` mapping
    /// `(x, y) -> (ax + cy + e, bx + dy + f)`.
    pub fn set_transform_2d(&mut self, m: [f32; 6]) -> Result<(), EncodeError> {
        let mut payload = [0u8; 24];
        for (i, v) in m.iter().enumerate() {
            Self::finite(*v, "transform coefficient")?;
            payload[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
        self.cmd(Opcode::SetTransform2D, &payload);
        Ok(())
    }

    /// Restore the identity transform.
    pub fn reset_transform(&mut self) {
        self.cmd(Opcode::ResetTransform, &[]);
    }

    /// Replace the clip list with `rects` (`[x, y, w, h]` each, union
    /// semantics). An empty slice is equivalent to [`Self::clear_clip`].
    pub fn set_clip_rects(&mut self, rects: &[[f32; 4]]) -> Result<(), EncodeError> {
        let count = u32::try_from(rects.len())
            .map_err(|_| EncodeError::TooLarge { what: "clip rect count", value: rects.len() as u64 })?;
        let mut payload = Vec::with_capacity(4 + rects.len() * 16);
        payload.extend_from_slice(&count.to_le_bytes());
        for rect in rects {
            for v in rect {
                payload.extend_from_slice(&Self::finite(*v, "clip rect coordinate")?.to_le_bytes());
            }
        }
        self.cmd(Opcode::SetClipRects, &payload);
        Ok(())
    }

    /// Clear the clip list (no clipping).
    pub fn clear_clip(&mut self) {
        self.cmd(Opcode::ClearClip, &[]);
    }

    /// Select the blend mode.
    pub fn set_blend(&mut self, mode: BlendMode) {
        self.cmd(Opcode::SetBlend, &(mode as u32).to_le_bytes());
    }

    /// Select the stroke join style.
    pub fn set_stroke_join(&mut self, join: StrokeJoin) {
        self.cmd(Opcode::SetStrokeJoin, &(join as u32).to_le_bytes());
    }

    /// Select the stroke cap style.
    pub fn set_stroke_cap(&mut self, cap: StrokeCap) {
        self.cmd(Opcode::SetStrokeCap, &(cap as u32).to_le_bytes());
    }

    /// Set the miter limit. Values below 1.0 are clamped at execution.
    pub fn set_miter_limit(&mut self, limit: f32) -> Result<(), EncodeError> {
        let limit = Self::finite(limit, "miter limit")?;
        self.cmd(Opcode::SetMiterLimit, &limit.to_le_bytes());
        Ok(())
    }

    /// Enable or disable antialiased coverage sampling.
    pub fn set_antialias(&mut self, enabled: bool) {
        self.cmd(Opcode::SetAntialias, &u32::from(enabled).to_le_bytes());
    }

    /// Fill an axis-aligned rect with a straight-alpha RGBA color.
    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: [u8; 4]) -> Result<(), EncodeError> {
        let mut payload = [0u8; 20];
        for (i, &(v, slot)) in [(x, "x"), (y, "y"), (w, "width"), (h, "height")].iter().enumerate() {
            payload[i * 4..i * 4 + 4].copy_from_slice(&Self::finite(v, slot)?.to_le_bytes());
        }
        payload[16..20].copy_from_slice(&color);
        self.cmd(Opcode::FillRect, &payload);
        Ok(())
    }

    /// Stroke the outline of an axis-aligned rect.
    pub fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, stroke_width: f32, color: [u8; 4]) -> Result<(), EncodeError> {
        let mut payload = [0u8; 24];
        let scalars = [(x, "x"), (y, "y"), (w, "width"), (h, "height"), (stroke_width, "stroke width")];
        for (i, &(v, slot)) in scalars.iter().enumerate() {
            payload[i * 4..i * 4 + 4].copy_from_slice(&Self::finite(v, slot)?.to_le_bytes());
        }
        payload[20..24].copy_from_slice(&color);
        self.cmd(Opcode::StrokeRect, &payload);
        Ok(())
    }

    /// Stroke a line segment.
    pub fn stroke_line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, stroke_width: f32, color: [u8; 4]) -> Result<(), EncodeError> {
        let mut payload = [0u8; 24];
        let scalars = [(x0, "x0"), (y0, "y0"), (x1, "x1"), (y1, "y1"), (stroke_width, "stroke width")];
        for (i, &(v, slot)) in scalars.iter().enumerate() {
            payload[i * 4..i * 4 + 4].copy_from_slice(&Self::finite(v, slot)?.to_le_bytes());
        }
        payload[20..24].copy_from_slice(&color);
        self.cmd(Opcode::StrokeLine, &payload);
        Ok(())
    }

    /// Stroke a quadratic Bezier from `(x0, y0)` to `(x1, y1)` with
    /// control point `(cx, cy)`.
    #[allow(clippy::too_many_arguments)]
    pub fn stroke_quad_bezier(&mut self, x0: f32, y0: f32, cx: f32, cy: f32, x1: f32, y1: f32, stroke_width: f32, color: [u8; 4]) -> Result<(), EncodeError> {
        let mut payload = [0u8; 32];
        let scalars = [
            (x0, "x0"), (y0, "y0"), (cx, "cx"), (cy, "cy"), (x1, "x1"), (y1, "y1"),
            (stroke_width, "stroke width"),
        ];
        for (i, &(v, slot)) in scalars.iter().enumerate() {
            payload[i * 4..i * 4 + 4].copy_from_slice(&Self::finite(v, slot)?.to_le_bytes());
        }
        payload[28..32].copy_from_slice(&color);
        self.cmd(Opcode::StrokeQuadBezier, &payload);
        Ok(())
    }

    /// Stroke a cubic Bezier from `(x0, y0)` to `(x1, y1)` with control
    /// points `(c1x, c1y)` and `(c2x, c2y)`.
    #[allow(clippy::too_many_arguments)]
    pub fn stroke_cubic_bezier(&mut self, x0: f32, y0: f32, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x1: f32, y1: f32, stroke_width: f32, color: [u8; 4]) -> Result<(), EncodeError> {
        let mut payload = [0u8; 40];
        let scalars = [
            (x0, "x0"), (y0, "y0"), (c1x, "c1x"), (c1y, "c1y"), (c2x, "c2x"), (c2y, "c2y"),
            (x1, "x1"), (y1, "y1"), (stroke_width, "stroke width"),
        ];
        for (i, &(v, slot)) in scalars.iter().enumerate() {
            payload[i * 4..i * 4 + 4].copy_from_slice(&Self::finite(v, slot)?.to_le_bytes());
        }
        payload[36..40].copy_from_slice(&color);
        self.cmd(Opcode::StrokeCubicBezier, &payload);
        Ok(())
    }

    /// Stroke a polyline through `points`. Fewer than two points encodes
    /// a valid no-op command.
    pub fn stroke_path(&mut self, points: &[[f32; 2]], stroke_width: f32, color: [u8; 4]) -> Result<(), EncodeError> {
        let count = u32::try_from(points.len())
            .map_err(|_| EncodeError::TooLarge { what: "path point count", value: points.len() as u64 })?;
        let mut payload = Vec::with_capacity(12 + points.len() * 8);
        payload.extend_from_slice(&count.to_le_bytes());
        payload.extend_from_slice(&Self::finite(stroke_width, "stroke width")?.to_le_bytes());
        payload.extend_from_slice(&color);
        for p in points {
            payload.extend_from_slice(&Self::finite(p[0], "path x")?.to_le_bytes());
            payload.extend_from_slice(&Self::finite(p[1], "path y")?.to_le_bytes());
        }
        self.cmd(Opcode::StrokePath, &payload);
        Ok(())
    }

    /// Blit an inline RGBA8 image of `width`×`height` pixels at `(x, y)`.
    pub fn blit_image(&mut self, x: f32, y: f32, width: u32, height: u32, pixels: &[u8]) -> Result<(), EncodeError> {
        let expected = u64::from(width) * u64::from(height) * 4;
        if expected + 16 > u64::from(u32::MAX) {
            return Err(EncodeError::TooLarge { what: "image bytes", value: expected });
        }
        if pixels.len() as u64 != expected {
            return Err(EncodeError::LengthMismatch {
                what: "image pixels",
                expected: expected as usize,
                actual: pixels.len(),
            });
        }
        let mut payload = Vec::with_capacity(16 + pixels.len());
        payload.extend_from_slice(&Self::finite(x, "blit x")?.to_le_bytes());
        payload.extend_from_slice(&Self::finite(y, "blit y")?.to_le_bytes());
        payload.extend_from_slice(&width.to_le_bytes());
        payload.extend_from_slice(&height.to_le_bytes());
        payload.extend_from_slice(pixels);
        self.cmd(Opcode::BlitImage, &payload);
        Ok(())
    }

    /// Draw a pre-shaped glyph run.
    ///
    /// `coverage` is the 8-bit coverage plane of the whole atlas
    /// (`atlas_w * atlas_h` bytes, row-major); glyph cells are
    /// `cell_w`×`cell_h` tiles addressed left-to-right, top-to-bottom in a
    /// grid of `columns` cells per row. Each glyph is
    /// `(index, x_offset, y_offset)` relative to `(x, y)`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_glyph_run(&mut self, x: f32, y: f32, color: [u8; 4], atlas_w: u32, atlas_h: u32, columns: u32, cell_w: u32, cell_h: u32, coverage: &[u8], glyphs: &[(u32, f32, f32)]) -> Result<(), EncodeError> {
        let atlas_bytes = u64::from(atlas_w) * u64::from(atlas_h);
        if coverage.len() as u64 != atlas_bytes {
            return Err(EncodeError::LengthMismatch {
                what: "atlas coverage",
                expected: atlas_bytes as usize,
                actual: coverage.len(),
            });
        }
        let glyph_count = u32::try_from(glyphs.len())
            .map_err(|_| EncodeError::TooLarge { what: "glyph count", value: glyphs.len() as u64 })?;
        if !glyphs.is_empty() && (columns == 0 || cell_w == 0 || cell_h == 0) {
            return Err(EncodeError::TooLarge { what: "degenerate atlas cell", value: 0 });
        }
        let total = 36 + atlas_bytes + u64::from(glyph_count) * 12;
        if total > u64::from(u32::MAX) {
            return Err(EncodeError::TooLarge { what: "glyph run bytes", value: total });
        }

        let mut payload = Vec::with_capacity(total as usize);
        payload.extend_from_slice(&Self::finite(x, "glyph run x")?.to_le_bytes());
        payload.extend_from_slice(&Self::finite(y, "glyph run y")?.to_le_bytes());
        payload.extend_from_slice(&color);
        for v in [atlas_w, atlas_h, columns, cell_w, cell_h, glyph_count] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        payload.extend_from_slice(coverage);
        for (index, dx, dy) in glyphs {
            payload.extend_from_slice(&index.to_le_bytes());
            payload.extend_from_slice(&Self::finite(*dx, "glyph x offset")?.to_le_bytes());
            payload.extend_from_slice(&Self::finite(*dy, "glyph y offset")?.to_le_bytes());
        }
        self.cmd(Opcode::DrawGlyphRun, &payload);
        Ok(())
    }
}
