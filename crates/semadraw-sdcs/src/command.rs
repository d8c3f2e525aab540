//! Decoded commands over a validated stream.
//!
//! [`CommandReader`] walks the `CMDS` chunks of a stream that already
//! passed [`crate::validate`] and yields decoded [`Command`]s up to the
//! first `End`. It holds no allocation; variable-length payloads are
//! borrowed slices with lazy iterators.
//!
//! The reader is written to be total anyway: if handed bytes that were
//! never validated, iteration stops early instead of panicking. Execution
//! correctness is only promised for validated input.

use crate::{
    BlendMode, CHUNK_CMDS, Opcode, StrokeCap, StrokeJoin,
    headers::{ChunkHeader, CmdHeader, StreamHeader},
    pad8,
};

fn u32_at(b: &[u8], rel: usize) -> Option<u32> {
    b.get(rel..rel + 4).map(|s| u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
}

fn u64_at(b: &[u8], rel: usize) -> Option<u64> {
    b.get(rel..rel + 8).map(|s| {
        u64::from_le_bytes([s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7]])
    })
}

fn f32_at(b: &[u8], rel: usize) -> Option<f32> {
    b.get(rel..rel + 4).map(|s| f32::from_le_bytes([s[0], s[1], s[2], s[3]]))
}

fn color_at(b: &[u8], rel: usize) -> Option<[u8; 4]> {
    b.get(rel..rel + 4).map(|s| [s[0], s[1], s[2], s[3]])
}

/// Borrowed clip rect list (`[x, y, w, h]` per rect).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectsRef<'a> {
    bytes: &'a [u8],
}

impl<'a> RectsRef<'a> {
    /// Number of rects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len() / 16
    }

    /// True when the list is empty (equivalent to a cleared clip).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Iterate the rects.
    pub fn iter(&self) -> impl Iterator<Item = [f32; 4]> + 'a {
        let bytes = self.bytes;
        (0..self.len()).filter_map(move |i| {
            Some([
                f32_at(bytes, i * 16)?,
                f32_at(bytes, i * 16 + 4)?,
                f32_at(bytes, i * 16 + 8)?,
                f32_at(bytes, i * 16 + 12)?,
            ])
        })
    }
}

/// Borrowed polyline payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathRef<'a> {
    /// Stroke width in logical units.
    pub stroke_width: f32,
    /// Straight-alpha RGBA color.
    pub color: [u8; 4],
    bytes: &'a [u8],
}

impl<'a> PathRef<'a> {
    /// Number of vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len() / 8
    }

    /// True when the polyline has no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Iterate the vertices.
    pub fn points(&self) -> impl Iterator<Item = (f32, f32)> + 'a {
        let bytes = self.bytes;
        (0..self.len()).filter_map(move |i| {
            Some((f32_at(bytes, i * 8)?, f32_at(bytes, i * 8 + 4)?))
        })
    }
}

/// Borrowed inline RGBA8 image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageRef<'a> {
    /// Destination x in logical units.
    pub x: f32,
    /// Destination y in logical units.
    pub y: f32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major RGBA8 pixels, `width * height * 4` bytes.
    pub pixels: &'a [u8],
}

/// Borrowed 8-bit coverage atlas geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphAtlasRef<'a> {
    /// Atlas plane width in pixels.
    pub width: u32,
    /// Atlas plane height in pixels.
    pub height: u32,
    /// Glyph cells per atlas row.
    pub columns: u32,
    /// Cell width in pixels.
    pub cell_width: u32,
    /// Cell height in pixels.
    pub cell_height: u32,
    /// Row-major coverage plane, `width * height` bytes.
    pub coverage: &'a [u8],
}

/// One glyph of a run: atlas cell index plus offset from the run origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphPlacement {
    /// Cell index into the atlas grid.
    pub index: u32,
    /// X offset from the run origin, logical units.
    pub dx: f32,
    /// Y offset from the run origin, logical units.
    pub dy: f32,
}

/// Borrowed glyph run payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphRunRef<'a> {
    /// Run origin x.
    pub x: f32,
    /// Run origin y.
    pub y: f32,
    /// Straight-alpha RGBA color; atlas coverage scales its alpha.
    pub color: [u8; 4],
    /// Atlas geometry and coverage plane.
    pub atlas: GlyphAtlasRef<'a>,
    glyph_bytes: &'a [u8],
}

impl<'a> GlyphRunRef<'a> {
    /// Number of glyphs in the run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.glyph_bytes.len() / 12
    }

    /// True when the run places no glyphs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.glyph_bytes.is_empty()
    }

    /// Iterate the glyph placements.
    pub fn glyphs(&self) -> impl Iterator<Item = GlyphPlacement> + 'a {
        let bytes = self.glyph_bytes;
        (0..self.len()).filter_map(move |i| {
            Some(GlyphPlacement {
                index: u32_at(bytes, i * 12)?,
                dx: f32_at(bytes, i * 12 + 4)?,
                dy: f32_at(bytes, i * 12 + 8)?,
            })
        })
    }
}

/// One decoded command. `End` is not surfaced; the reader terminates at
/// the first one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command<'a> {
    /// Restore all raster state to defaults.
    Reset,
    /// Set the affine transform (a, b, c, d, e, f).
    SetTransform2D {
        /// Row-major coefficients: `(x', y') = (ax + cy + e, bx + dy + f)`.
        matrix: [f32; 6],
    },
    /// Restore the identity transform.
    ResetTransform,
    /// Replace the clip list. Empty means no clipping.
    SetClipRects(RectsRef<'a>),
    /// Clear the clip list.
    ClearClip,
    /// Select the blend mode.
    SetBlend(BlendMode),
    /// Select the stroke join style.
    SetStrokeJoin(StrokeJoin),
    /// Select the stroke cap style.
    SetStrokeCap(StrokeCap),
    /// Set the miter limit (clamped to at least 1.0).
    SetMiterLimit(f32),
    /// Enable or disable antialiasing.
    SetAntialias(bool),
    /// Fill an axis-aligned rect.
    FillRect {
        /// Left edge, logical units.
        x: f32,
        /// Top edge, logical units.
        y: f32,
        /// Width, logical units.
        w: f32,
        /// Height, logical units.
        h: f32,
        /// Straight-alpha RGBA color.
        color: [u8; 4],
    },
    /// Stroke the outline of an axis-aligned rect.
    StrokeRect {
        /// Left edge, logical units.
        x: f32,
        /// Top edge, logical units.
        y: f32,
        /// Width, logical units.
        w: f32,
        /// Height, logical units.
        h: f32,
        /// Stroke width, logical units.
        stroke_width: f32,
        /// Straight-alpha RGBA color.
        color: [u8; 4],
    },
    /// Stroke a line segment.
    StrokeLine {
        /// Start x.
        x0: f32,
        /// Start y.
        y0: f32,
        /// End x.
        x1: f32,
        /// End y.
        y1: f32,
        /// Stroke width, logical units.
        stroke_width: f32,
        /// Straight-alpha RGBA color.
        color: [u8; 4],
    },
    /// Stroke a quadratic Bezier.
    StrokeQuadBezier {
        /// Start x.
        x0: f32,
        /// Start y.
        y0: f32,
        /// Control x.
        cx: f32,
        /// Control y.
        cy: f32,
        /// End x.
        x1: f32,
        /// End y.
        y1: f32,
        /// Stroke width, logical units.
        stroke_width: f32,
        /// Straight-alpha RGBA color.
        color: [u8; 4],
    },
    /// Stroke a cubic Bezier.
    StrokeCubicBezier {
        /// Start x.
        x0: f32,
        /// Start y.
        y0: f32,
        /// First control x.
        c1x: f32,
        /// First control y.
        c1y: f32,
        /// Second control x.
        c2x: f32,
        /// Second control y.
        c2y: f32,
        /// End x.
        x1: f32,
        /// End y.
        y1: f32,
        /// Stroke width, logical units.
        stroke_width: f32,
        /// Straight-alpha RGBA color.
        color: [u8; 4],
    },
    /// Stroke a polyline.
    StrokePath(PathRef<'a>),
    /// Blit an inline RGBA8 image.
    BlitImage(ImageRef<'a>),
    /// Draw a pre-shaped glyph run.
    DrawGlyphRun(GlyphRunRef<'a>),
}

/// Iterator over the commands of a validated stream, stopping at the
/// first `End`.
#[derive(Debug, Clone)]
pub struct CommandReader<'a> {
    bytes: &'a [u8],
    /// Absolute offset of the next unvisited chunk header.
    pos: usize,
    /// Absolute cursor over command records in the current CMDS payload.
    cmd_cursor: usize,
    /// Absolute end of the current CMDS payload (0 when between chunks).
    chunk_end: usize,
    done: bool,
}

impl<'a> CommandReader<'a> {
    /// Build a reader over `bytes`, which must have passed
    /// [`crate::validate`].
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        let header_size = bytes
            .get(8..12)
            .map(|s| u32::from_le_bytes([s[0], s[1], s[2], s[3]]) as usize)
            .unwrap_or(StreamHeader::SIZE);
        Self { bytes, pos: header_size, cmd_cursor: 0, chunk_end: 0, done: false }
    }

    /// Advance `pos` to the payload of the next CMDS chunk. Returns false
    /// when no further CMDS chunk exists.
    fn enter_next_cmds_chunk(&mut self) -> bool {
        while self.pos + ChunkHeader::SIZE <= self.bytes.len() {
            let Some(total) = u64_at(self.bytes, self.pos + 16) else { return false };
            let Some(payload) = u64_at(self.bytes, self.pos + 24) else { return false };
            if total < ChunkHeader::SIZE as u64 {
                // Only reachable on never-validated input; stop rather
                // than spin.
                return false;
            }
            let is_cmds = self.bytes[self.pos..self.pos + 4] == CHUNK_CMDS;
            let body_start = self.pos + ChunkHeader::SIZE;
            self.pos = self.pos.saturating_add(total as usize);
            if is_cmds {
                self.chunk_end =
                    body_start.saturating_add(payload as usize).min(self.bytes.len());
                // The cursor for command records; `pos` already points at
                // the next chunk for when this one is exhausted.
                self.cmd_cursor = body_start;
                return true;
            }
        }
        false
    }
}

impl<'a> CommandReader<'a> {
    /// Decode the record at absolute offset `rel`. `Ok(None)` is a
    /// tolerated-unknown opcode to skip; `Err(())` stops iteration (the
    /// first `End`, or undecodable input on a never-validated stream).
    #[allow(clippy::result_unit_err)]
    fn decode_at(&self, rel: usize) -> Result<(Option<Command<'a>>, usize), ()> {
        let bytes = self.bytes;
        let opcode =
            bytes.get(rel..rel + 2).map(|s| u16::from_le_bytes([s[0], s[1]])).ok_or(())?;
        let size = u32_at(bytes, rel + 4).ok_or(())? as usize;
        let record = CmdHeader::SIZE + size;
        let advance = record + pad8(record);
        let body = bytes.get(rel + CmdHeader::SIZE..rel + record).ok_or(())?;

        match Opcode::from_u16(opcode) {
            None => Ok((None, advance)),
            Some(Opcode::End) => Err(()),
            Some(op) => Ok((Some(decode_body(op, body).ok_or(())?), advance)),
        }
    }
}

fn decode_body<'a>(op: Opcode, body: &'a [u8]) -> Option<Command<'a>> {
    Some(match op {
        Opcode::Reset => Command::Reset,
        Opcode::ResetTransform => Command::ResetTransform,
        Opcode::ClearClip => Command::ClearClip,
        Opcode::SetTransform2D => {
            let mut matrix = [0f32; 6];
            for (i, m) in matrix.iter_mut().enumerate() {
                *m = f32_at(body, i * 4)?;
            }
            Command::SetTransform2D { matrix }
        },
        Opcode::SetClipRects => {
            let count = u32_at(body, 0)? as usize;
            Command::SetClipRects(RectsRef { bytes: body.get(4..4 + count * 16)? })
        },
        Opcode::SetBlend => Command::SetBlend(BlendMode::from_u32(u32_at(body, 0)?)?),
        Opcode::SetStrokeJoin => Command::SetStrokeJoin(StrokeJoin::from_u32(u32_at(body, 0)?)?),
        Opcode::SetStrokeCap => Command::SetStrokeCap(StrokeCap::from_u32(u32_at(body, 0)?)?),
        Opcode::SetMiterLimit => Command::SetMiterLimit(f32_at(body, 0)?),
        Opcode::SetAntialias => Command::SetAntialias(u32_at(body, 0)? != 0),
        Opcode::FillRect => Command::FillRect {
            x: f32_at(body, 0)?,
            y: f32_at(body, 4)?,
            w: f32_at(body, 8)?,
            h: f32_at(body, 12)?,
            color: color_at(body, 16)?,
        },
        Opcode::StrokeRect => Command::StrokeRect {
            x: f32_at(body, 0)?,
            y: f32_at(body, 4)?,
            w: f32_at(body, 8)?,
            h: f32_at(body, 12)?,
            stroke_width: f32_at(body, 16)?,
            color: color_at(body, 20)?,
        },
        Opcode::StrokeLine => Command::StrokeLine {
            x0: f32_at(body, 0)?,
            y0: f32_at(body, 4)?,
            x1: f32_at(body, 8)?,
            y1: f32_at(body, 12)?,
            stroke_width: f32_at(body, 16)?,
            color: color_at(body, 20)?,
        },
        Opcode::StrokeQuadBezier => Command::StrokeQuadBezier {
            x0: f32_at(body, 0)?,
            y0: f32_at(body, 4)?,
            cx: f32_at(body, 8)?,
            cy: f32_at(body, 12)?,
            x1: f32_at(body, 16)?,
            y1: f32_at(body, 20)?,
            stroke_width: f32_at(body, 24)?,
            color: color_at(body, 28)?,
        },
        Opcode::StrokeCubicBezier => Command::StrokeCubicBezier {
            x0: f32_at(body, 0)?,
            y0: f32_at(body, 4)?,
            c1x: f32_at(body, 8)?,
            c1y: f32_at(body, 12)?,
            c2x: f32_at(body, 16)?,
            c2y: f32_at(body, 20)?,
            x1: f32_at(body, 24)?,
            y1: f32_at(body, 28)?,
            stroke_width: f32_at(body, 32)?,
            color: color_at(body, 36)?,
        },
        Opcode::StrokePath => {
            let count = u32_at(body, 0)? as usize;
            Command::StrokePath(PathRef {
                stroke_width: f32_at(body, 4)?,
                color: color_at(body, 8)?,
                bytes: body.get(12..12 + count * 8)?,
            })
        },
        Opcode::BlitImage => {
            let width = u32_at(body, 8)?;
            let height = u32_at(body, 12)?;
            Command::BlitImage(ImageRef {
                x: f32_at(body, 0)?,
                y: f32_at(body, 4)?,
                width,
                height,
                pixels: body.get(16..16 + (width as usize) * (height as usize) * 4)?,
            })
        },
        Opcode::DrawGlyphRun => {
            let atlas_w = u32_at(body, 12)?;
            let atlas_h = u32_at(body, 16)?;
            let glyph_count = u32_at(body, 32)? as usize;
            let atlas_bytes = (atlas_w as usize) * (atlas_h as usize);
            Command::DrawGlyphRun(GlyphRunRef {
                x: f32_at(body, 0)?,
                y: f32_at(body, 4)?,
                color: color_at(body, 8)?,
                atlas: GlyphAtlasRef {
                    width: atlas_w,
                    height: atlas_h,
                    columns: u32_at(body, 20)?,
                    cell_width: u32_at(body, 24)?,
                    cell_height: u32_at(body, 28)?,
                    coverage: body.get(36..36 + atlas_bytes)?,
                },
                glyph_bytes: body.get(36 + atlas_bytes..36 + atlas_bytes + glyph_count * 12)?,
            })
        },
        Opcode::End => return None,
    })
}

impl<'a> Iterator for CommandReader<'a> {
    type Item = Command<'a>;

    fn next(&mut self) -> Option<Command<'a>> {
        if self.done {
            return None;
        }
        loop {
            if self.cmd_cursor >= self.chunk_end {
                if !self.enter_next_cmds_chunk() {
                    self.done = true;
                    return None;
                }
            }
            match self.decode_at(self.cmd_cursor) {
                Err(()) => {
                    self.done = true;
                    return None;
                },
                Ok((cmd, advance)) => {
                    self.cmd_cursor += advance;
                    if let Some(cmd) = cmd {
                        return Some(cmd);
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StreamEncoder, validate};

    #[test]
    fn reads_back_encoded_commands() {
        let mut enc = StreamEncoder::new();
        enc.set_blend(BlendMode::Add);
        enc.fill_rect(1.0, 2.0, 3.0, 4.0, [10, 20, 30, 40]).unwrap();
        enc.stroke_line(0.0, 0.0, 8.0, 0.0, 2.0, [1, 1, 1, 255]).unwrap();
        let bytes = enc.finish();
        validate(&bytes).unwrap();

        let cmds: Vec<Command<'_>> = CommandReader::new(&bytes).collect();
        assert_eq!(cmds.len(), 3);
        assert_eq!(cmds[0], Command::SetBlend(BlendMode::Add));
        assert_eq!(
            cmds[1],
            Command::FillRect { x: 1.0, y: 2.0, w: 3.0, h: 4.0, color: [10, 20, 30, 40] }
        );
        assert!(matches!(cmds[2], Command::StrokeLine { stroke_width, .. } if stroke_width == 2.0));
    }

    #[test]
    fn stops_at_first_end() {
        let mut enc = StreamEncoder::new();
        enc.reset();
        enc.end();
        enc.fill_rect(0.0, 0.0, 1.0, 1.0, [255; 4]).unwrap();
        let bytes = enc.finish();
        validate(&bytes).unwrap();

        let cmds: Vec<Command<'_>> = CommandReader::new(&bytes).collect();
        assert_eq!(cmds, vec![Command::Reset]);
    }

    #[test]
    fn variable_payloads_round_trip() {
        let mut enc = StreamEncoder::new();
        enc.set_clip_rects(&[[0.0, 0.0, 4.0, 4.0], [8.0, 8.0, 2.0, 2.0]]).unwrap();
        enc.stroke_path(&[[0.0, 0.0], [4.0, 0.0], [4.0, 4.0]], 1.5, [7, 7, 7, 7]).unwrap();
        enc.blit_image(1.0, 1.0, 2, 1, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let bytes = enc.finish();
        validate(&bytes).unwrap();

        let cmds: Vec<Command<'_>> = CommandReader::new(&bytes).collect();
        let Command::SetClipRects(rects) = cmds[0] else { panic!("expected clip rects") };
        assert_eq!(rects.iter().collect::<Vec<_>>(), vec![[0.0, 0.0, 4.0, 4.0], [8.0, 8.0, 2.0, 2.0]]);

        let Command::StrokePath(path) = cmds[1] else { panic!("expected path") };
        assert_eq!(path.stroke_width, 1.5);
        assert_eq!(path.points().collect::<Vec<_>>(), vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0)]);

        let Command::BlitImage(img) = cmds[2] else { panic!("expected image") };
        assert_eq!((img.width, img.height), (2, 1));
        assert_eq!(img.pixels, &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn glyph_run_round_trips() {
        let mut enc = StreamEncoder::new();
        let coverage: Vec<u8> = (0..64).map(|i| i as u8 * 4).collect();
        enc.draw_glyph_run(5.0, 6.0, [9, 8, 7, 255], 8, 8, 2, 4, 4, &coverage, &[(1, 4.0, 0.0)])
            .unwrap();
        let bytes = enc.finish();
        validate(&bytes).unwrap();

        let cmds: Vec<Command<'_>> = CommandReader::new(&bytes).collect();
        let Command::DrawGlyphRun(run) = cmds[0] else { panic!("expected glyph run") };
        assert_eq!((run.x, run.y), (5.0, 6.0));
        assert_eq!(run.atlas.columns, 2);
        assert_eq!(run.atlas.coverage.len(), 64);
        let glyphs: Vec<GlyphPlacement> = run.glyphs().collect();
        assert_eq!(glyphs.len(), 1);
        assert_eq!(glyphs[0].index, 1);
        assert_eq!((glyphs[0].dx, glyphs[0].dy), (4.0, 0.0));
    }
}
