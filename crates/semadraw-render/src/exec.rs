//! Command execution over a validated stream.
//!
//! [`render`] validates and then executes; [`render_validated`] is the
//! hot path for callers that already validated (the compositor does this
//! once at attach time). Execution cannot fail: degenerate geometry is a
//! no-op and the framebuffer bounds-check every write, so a validated
//! stream can at worst draw nothing.

use semadraw_sdcs::{BlendMode, Command, CommandReader, StrokeCap, StrokeJoin, validate};

use crate::{
    Framebuffer, RenderError,
    curve::{flatten_cubic, flatten_quad},
    geom::{Affine, Point},
    glyph::draw_glyph_run,
    raster::{Paint, clip_admits, fill_logical_rect},
    stroke::{PendingCap, emit_cap, emit_join, fill_segment, segment_dir},
};

/// Execution state. A `Reset` (or a fresh stream) restores these
/// defaults: identity transform, no clip, `SrcOver`, miter join, butt
/// cap, miter limit 4.0, antialiasing off.
struct State {
    transform: Affine,
    clip: Vec<[f32; 4]>,
    blend: BlendMode,
    join: StrokeJoin,
    cap: StrokeCap,
    miter_limit: f32,
    antialias: bool,
    pending: Option<PendingCap>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            clip: Vec::new(),
            blend: BlendMode::SrcOver,
            join: StrokeJoin::Miter,
            cap: StrokeCap::Butt,
            miter_limit: 4.0,
            antialias: false,
            pending: None,
        }
    }
}

impl State {
    fn paint(&self, color: [u8; 4]) -> Paint<'_> {
        Paint { color, blend: self.blend, antialias: self.antialias, clip: &self.clip }
    }

    /// Draw commands are no-ops while the transform is singular.
    fn drawable(&self) -> bool {
        let det = self.transform.det();
        det != 0.0 && det.is_finite()
    }
}

/// Validate `stream` and execute it against `fb`.
///
/// # Errors
///
/// [`RenderError::InvalidStream`] if validation fails; the framebuffer is
/// untouched in that case.
pub fn render(stream: &[u8], fb: &mut Framebuffer) -> Result<(), RenderError> {
    validate(stream)?;
    render_validated(stream, fb);
    Ok(())
}

/// Execute a stream that already passed [`semadraw_sdcs::validate`].
pub fn render_validated(stream: &[u8], fb: &mut Framebuffer) {
    let mut state = State::default();
    for cmd in CommandReader::new(stream) {
        exec(&mut state, fb, &cmd);
    }
    flush_pending(&mut state, fb);
}

/// Flush the deferred end cap, if any, using the current cap style.
fn flush_pending(state: &mut State, fb: &mut Framebuffer) {
    if let Some(p) = state.pending.take() {
        if state.drawable() {
            let paint = state.paint(p.color);
            emit_cap(fb, &state.transform, state.cap, p.pos, p.dir, p.width, &paint);
        }
    }
}

fn exec(state: &mut State, fb: &mut Framebuffer, cmd: &Command<'_>) {
    // Only a continuing StrokeLine may consume the pending cap as a join;
    // every other command forces a flush first.
    if !matches!(cmd, Command::StrokeLine { .. }) {
        flush_pending(state, fb);
    }

    match *cmd {
        Command::Reset => *state = State::default(),
        Command::SetTransform2D { matrix } => state.transform = Affine::from_coefficients(matrix),
        Command::ResetTransform => state.transform = Affine::IDENTITY,
        Command::SetClipRects(rects) => {
            state.clip.clear();
            state.clip.extend(rects.iter());
        },
        Command::ClearClip => state.clip.clear(),
        Command::SetBlend(mode) => state.blend = mode,
        Command::SetStrokeJoin(join) => state.join = join,
        Command::SetStrokeCap(cap) => state.cap = cap,
        Command::SetMiterLimit(limit) => state.miter_limit = limit.max(1.0),
        Command::SetAntialias(enabled) => state.antialias = enabled,

        Command::FillRect { x, y, w, h, color } => {
            if state.drawable() {
                fill_logical_rect(fb, &state.transform, x, y, w, h, &state.paint(color));
            }
        },

        Command::StrokeRect { x, y, w, h, stroke_width, color } => {
            stroke_rect(state, fb, x, y, w, h, stroke_width, color);
        },

        Command::StrokeLine { x0, y0, x1, y1, stroke_width, color } => {
            stroke_line(state, fb, Point::new(x0, y0), Point::new(x1, y1), stroke_width, color);
        },

        Command::StrokeQuadBezier { x0, y0, cx, cy, x1, y1, stroke_width, color } => {
            let pts = flatten_quad(Point::new(x0, y0), Point::new(cx, cy), Point::new(x1, y1));
            stroke_polyline_segments(state, fb, &pts, stroke_width, color);
        },

        Command::StrokeCubicBezier { x0, y0, c1x, c1y, c2x, c2y, x1, y1, stroke_width, color } => {
            let pts = flatten_cubic(
                Point::new(x0, y0),
                Point::new(c1x, c1y),
                Point::new(c2x, c2y),
                Point::new(x1, y1),
            );
            stroke_polyline_segments(state, fb, &pts, stroke_width, color);
        },

        Command::StrokePath(path) => stroke_path(state, fb, &path),

        Command::BlitImage(img) => blit_image(state, fb, &img),

        Command::DrawGlyphRun(run) => {
            if state.drawable() {
                let paint = state.paint(run.color);
                draw_glyph_run(fb, &run, &paint);
            }
        },
    }
}

/// Stroke one line segment with join/cap bookkeeping.
///
/// If the previous command left a pending cap at exactly this segment's
/// start with the same width and color, the configured join is emitted
/// there instead of any cap. Otherwise the pending cap is flushed and this
/// segment's start gets an immediate start cap (the start already knows it
/// is open; only the end must be deferred).
fn stroke_line(
    state: &mut State,
    fb: &mut Framebuffer,
    p0: Point,
    p1: Point,
    width: f32,
    color: [u8; 4],
) {
    let Some(dir) = segment_dir(p0, p1) else {
        // Zero-length stroke: a no-op that does not continue anything.
        flush_pending(state, fb);
        return;
    };
    if !(width > 0.0) {
        flush_pending(state, fb);
        return;
    }

    let continues = state
        .pending
        .is_some_and(|p| p.pos == p0 && p.width == width && p.color == color);
    let pending = state.pending.take();
    let paint = state.paint(color);

    if state.drawable() {
        if continues {
            // INVARIANT: `continues` implies pending is Some.
            if let Some(p) = pending {
                emit_join(
                    fb,
                    &state.transform,
                    state.join,
                    state.miter_limit,
                    p0,
                    p.dir,
                    dir,
                    width,
                    &paint,
                );
            }
        } else {
            if let Some(p) = pending {
                let prev_paint = state.paint(p.color);
                emit_cap(fb, &state.transform, state.cap, p.pos, p.dir, p.width, &prev_paint);
            }
            // Start cap points away from the segment body.
            emit_cap(
                fb,
                &state.transform,
                state.cap,
                p0,
                Point::new(-dir.x, -dir.y),
                width,
                &paint,
            );
        }
        fill_segment(fb, &state.transform, p0, p1, dir, width, &paint);
    }

    state.pending = Some(PendingCap { pos: p1, dir, width, color });
}

/// Stroke a rect outline as four filled bars in logical space, accounting
/// for half-width overlap so no pixel blends twice.
#[allow(clippy::too_many_arguments)]
fn stroke_rect(
    state: &mut State,
    fb: &mut Framebuffer,
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    stroke_width: f32,
    color: [u8; 4],
) {
    if !state.drawable() || !(stroke_width > 0.0) || !(w > 0.0) || !(h > 0.0) {
        return;
    }
    let half = stroke_width / 2.0;
    let paint = state.paint(color);
    let t = &state.transform;
    // Top and bottom bars span the full outline width, corners included;
    // left and right bars fill the remaining vertical extent between them.
    fill_logical_rect(fb, t, x - half, y - half, w + stroke_width, stroke_width, &paint);
    fill_logical_rect(fb, t, x - half, y + h - half, w + stroke_width, stroke_width, &paint);
    fill_logical_rect(fb, t, x - half, y + half, stroke_width, h - stroke_width, &paint);
    fill_logical_rect(fb, t, x + w - half, y + half, stroke_width, h - stroke_width, &paint);
}

/// Stroke a polyline with joins between consecutive segments, start and
/// end caps at the open ends. Used by `StrokePath`.
fn stroke_path(state: &mut State, fb: &mut Framebuffer, path: &semadraw_sdcs::PathRef<'_>) {
    if path.len() < 2 || !(path.stroke_width > 0.0) {
        return;
    }
    let pts: Vec<Point> = path.points().map(|(x, y)| Point::new(x, y)).collect();
    stroke_polyline(state, fb, &pts, path.stroke_width, path.color, true);
}

/// Stroke flattened curve segments: plain quads, no joins or caps.
/// Curves do not participate in joins by design.
fn stroke_polyline_segments(
    state: &mut State,
    fb: &mut Framebuffer,
    pts: &[Point],
    width: f32,
    color: [u8; 4],
) {
    if !state.drawable() || !(width > 0.0) {
        return;
    }
    let paint = state.paint(color);
    for pair in pts.windows(2) {
        if let Some(dir) = segment_dir(pair[0], pair[1]) {
            fill_segment(fb, &state.transform, pair[0], pair[1], dir, width, &paint);
        }
    }
}

/// Stroke a polyline. With `joins_and_caps`, consecutive segments get the
/// configured join and the two open ends get immediate caps.
fn stroke_polyline(
    state: &mut State,
    fb: &mut Framebuffer,
    pts: &[Point],
    width: f32,
    color: [u8; 4],
    joins_and_caps: bool,
) {
    if !state.drawable() {
        return;
    }
    let paint = state.paint(color);
    let mut prev_dir: Option<Point> = None;

    for (i, pair) in pts.windows(2).enumerate() {
        let Some(dir) = segment_dir(pair[0], pair[1]) else { continue };

        if joins_and_caps {
            match prev_dir {
                None => {
                    emit_cap(
                        fb,
                        &state.transform,
                        state.cap,
                        pair[0],
                        Point::new(-dir.x, -dir.y),
                        width,
                        &paint,
                    );
                },
                Some(inbound) => {
                    emit_join(
                        fb,
                        &state.transform,
                        state.join,
                        state.miter_limit,
                        pair[0],
                        inbound,
                        dir,
                        width,
                        &paint,
                    );
                },
            }
        }

        fill_segment(fb, &state.transform, pair[0], pair[1], dir, width, &paint);
        prev_dir = Some(dir);

        if joins_and_caps && i == pts.len() - 2 {
            emit_cap(fb, &state.transform, state.cap, pair[1], dir, width, &paint);
        }
    }
}

/// Per-pixel image blit: transform each source pixel center, floor to a
/// destination pixel, clip test, blend. Fully transparent pixels are
/// skipped only under `SrcOver`, where skipping cannot change output.
fn blit_image(state: &mut State, fb: &mut Framebuffer, img: &semadraw_sdcs::ImageRef<'_>) {
    if !state.drawable() {
        return;
    }
    for sy in 0..img.height {
        for sx in 0..img.width {
            let i = (sy as usize * img.width as usize + sx as usize) * 4;
            let src = [img.pixels[i], img.pixels[i + 1], img.pixels[i + 2], img.pixels[i + 3]];
            if src[3] == 0 && state.blend == BlendMode::SrcOver {
                continue;
            }
            let p = state.transform.apply(Point::new(
                img.x + sx as f32 + 0.5,
                img.y + sy as f32 + 0.5,
            ));
            if !(p.x.is_finite() && p.y.is_finite()) {
                continue;
            }
            let dx = p.x.floor();
            let dy = p.y.floor();
            if dx < 0.0 || dy < 0.0 || dx >= fb.width() as f32 || dy >= fb.height() as f32 {
                continue;
            }
            let (fx, fy) = (dx as u32, dy as u32);
            if !clip_admits(&state.clip, fx as f32 + 0.5, fy as f32 + 0.5) {
                continue;
            }
            fb.blend_pixel(fx, fy, src, state.blend);
        }
    }
}
