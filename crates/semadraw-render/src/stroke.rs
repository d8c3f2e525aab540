//! Stroked geometry: segment quads, caps, joins, and the pending-cap
//! record.
//!
//! A stroked segment is a quad at `±(w/2)` along the perpendicular of its
//! unit direction, submitted through the same fill path as rects so it
//! interacts identically with clip, blend, and transform. Caps and joins
//! are extra geometry at open and shared endpoints; which one applies is
//! decided by the pending-cap state machine in the executor, because a
//! segment cannot know whether the next command continues it.

use semadraw_sdcs::{StrokeCap, StrokeJoin};

use crate::{
    Framebuffer,
    geom::{Affine, Point},
    raster::{Paint, fill_disk, fill_logical_rect, fill_quad},
};

/// Miter ratio of a 90° join, `1 / sin(45°)`. Compared against the miter
/// limit; at or above the limit the join falls back to bevel.
pub(crate) const MITER_RATIO_RIGHT_ANGLE: f32 = std::f32::consts::SQRT_2;

/// Deferred end-cap record left behind by a stroked segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PendingCap {
    /// Segment end position, logical units.
    pub pos: Point,
    /// Unit direction of the segment at its end.
    pub dir: Point,
    /// Stroke width of the segment.
    pub width: f32,
    /// Stroke color of the segment.
    pub color: [u8; 4],
}

/// Unit direction from `p0` to `p1`, or `None` for coincident endpoints.
pub(crate) fn segment_dir(p0: Point, p1: Point) -> Option<Point> {
    let dx = p1.x - p0.x;
    let dy = p1.y - p0.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 || !len.is_finite() {
        return None;
    }
    Some(Point::new(dx / len, dy / len))
}

/// Fill the quad of one stroked segment. `dir` must be the unit direction
/// from `p0` to `p1`.
pub(crate) fn fill_segment(
    fb: &mut Framebuffer,
    transform: &Affine,
    p0: Point,
    p1: Point,
    dir: Point,
    width: f32,
    paint: &Paint<'_>,
) {
    let h = width / 2.0;
    let px = -dir.y * h;
    let py = dir.x * h;
    let quad = [
        transform.apply(Point::new(p0.x + px, p0.y + py)),
        transform.apply(Point::new(p1.x + px, p1.y + py)),
        transform.apply(Point::new(p1.x - px, p1.y - py)),
        transform.apply(Point::new(p0.x - px, p0.y - py)),
    ];
    fill_quad(fb, quad, paint);
}

/// Emit cap geometry at `pos`. `outward` is the unit direction pointing
/// away from the segment body.
pub(crate) fn emit_cap(
    fb: &mut Framebuffer,
    transform: &Affine,
    cap: StrokeCap,
    pos: Point,
    outward: Point,
    width: f32,
    paint: &Paint<'_>,
) {
    let h = width / 2.0;
    match cap {
        StrokeCap::Butt => {},
        StrokeCap::Square => {
            // A w/2 × w extension rectangle along the outward direction.
            let tip = Point::new(pos.x + outward.x * h, pos.y + outward.y * h);
            let px = -outward.y * h;
            let py = outward.x * h;
            let quad = [
                transform.apply(Point::new(pos.x + px, pos.y + py)),
                transform.apply(Point::new(tip.x + px, tip.y + py)),
                transform.apply(Point::new(tip.x - px, tip.y - py)),
                transform.apply(Point::new(pos.x - px, pos.y - py)),
            ];
            fill_quad(fb, quad, paint);
        },
        StrokeCap::Round => fill_disk(fb, transform, pos, h, paint),
    }
}

/// True when a unit direction is axis-aligned.
fn axis_aligned(dir: Point) -> bool {
    dir.x == 0.0 || dir.y == 0.0
}

/// Emit join geometry at `at` between a segment arriving along `dir_in`
/// and one leaving along `dir_out`.
///
/// Miter joins are emitted only for 90° meetings of axis-aligned
/// segments, as a `w`×`w` square centered on the join point; their ratio
/// (√2) at or above the current miter limit falls back to bevel, as does
/// any non-right-angle meeting. Bevel emits nothing: the segment quads
/// already abut. Round emits a half-width disk.
#[allow(clippy::too_many_arguments)]
pub(crate) fn emit_join(
    fb: &mut Framebuffer,
    transform: &Affine,
    join: StrokeJoin,
    miter_limit: f32,
    at: Point,
    dir_in: Point,
    dir_out: Point,
    width: f32,
    paint: &Paint<'_>,
) {
    match join {
        StrokeJoin::Bevel => {},
        StrokeJoin::Round => fill_disk(fb, transform, at, width / 2.0, paint),
        StrokeJoin::Miter => {
            let right_angle = axis_aligned(dir_in)
                && axis_aligned(dir_out)
                && dir_in.x * dir_out.x + dir_in.y * dir_out.y == 0.0;
            if right_angle && MITER_RATIO_RIGHT_ANGLE < miter_limit {
                let h = width / 2.0;
                fill_logical_rect(fb, transform, at.x - h, at.y - h, width, width, paint);
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use semadraw_sdcs::BlendMode;

    use super::*;

    fn opaque(color: [u8; 4]) -> Paint<'static> {
        Paint { color, blend: BlendMode::SrcOver, antialias: false, clip: &[] }
    }

    #[test]
    fn coincident_endpoints_have_no_direction() {
        assert!(segment_dir(Point::new(3.0, 4.0), Point::new(3.0, 4.0)).is_none());
    }

    #[test]
    fn horizontal_segment_fills_a_band() {
        let mut fb = Framebuffer::new(16, 8);
        let p0 = Point::new(2.0, 4.0);
        let p1 = Point::new(12.0, 4.0);
        let dir = segment_dir(p0, p1).unwrap();
        fill_segment(&mut fb, &Affine::IDENTITY, p0, p1, dir, 2.0, &opaque([255, 0, 0, 255]));
        // Band covers y in [3, 5): rows 3 and 4, columns 2..12.
        assert_eq!(fb.pixel(2, 3), [255, 0, 0, 255]);
        assert_eq!(fb.pixel(11, 4), [255, 0, 0, 255]);
        assert_eq!(fb.pixel(1, 3), [0; 4]);
        assert_eq!(fb.pixel(12, 4), [0; 4]);
        assert_eq!(fb.pixel(5, 2), [0; 4]);
        assert_eq!(fb.pixel(5, 5), [0; 4]);
    }

    #[test]
    fn square_cap_extends_half_width() {
        let mut fb = Framebuffer::new(16, 8);
        // Cap at (8, 4) pointing right on a width-4 stroke.
        emit_cap(
            &mut fb,
            &Affine::IDENTITY,
            StrokeCap::Square,
            Point::new(8.0, 4.0),
            Point::new(1.0, 0.0),
            4.0,
            &opaque([0, 255, 0, 255]),
        );
        // Extension covers x in [8, 10), y in [2, 6).
        assert_eq!(fb.pixel(8, 2), [0, 255, 0, 255]);
        assert_eq!(fb.pixel(9, 5), [0, 255, 0, 255]);
        assert_eq!(fb.pixel(10, 4), [0; 4]);
        assert_eq!(fb.pixel(7, 4), [0; 4]);
    }

    #[test]
    fn butt_cap_emits_nothing() {
        let mut fb = Framebuffer::new(8, 8);
        emit_cap(
            &mut fb,
            &Affine::IDENTITY,
            StrokeCap::Butt,
            Point::new(4.0, 4.0),
            Point::new(0.0, 1.0),
            4.0,
            &opaque([255; 4]),
        );
        assert!(fb.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn miter_square_emitted_for_right_angle_under_limit() {
        let mut fb = Framebuffer::new(16, 16);
        emit_join(
            &mut fb,
            &Affine::IDENTITY,
            StrokeJoin::Miter,
            4.0,
            Point::new(8.0, 8.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
            4.0,
            &opaque([255, 0, 255, 255]),
        );
        // w×w square centered on the join: [6, 10) × [6, 10).
        assert_eq!(fb.pixel(6, 6), [255, 0, 255, 255]);
        assert_eq!(fb.pixel(9, 9), [255, 0, 255, 255]);
        assert_eq!(fb.pixel(5, 8), [0; 4]);
        assert_eq!(fb.pixel(10, 8), [0; 4]);
    }

    #[test]
    fn miter_at_exact_limit_falls_back_to_bevel() {
        let mut fb = Framebuffer::new(16, 16);
        emit_join(
            &mut fb,
            &Affine::IDENTITY,
            StrokeJoin::Miter,
            MITER_RATIO_RIGHT_ANGLE,
            Point::new(8.0, 8.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
            4.0,
            &opaque([255; 4]),
        );
        assert!(fb.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn miter_skipped_for_non_right_angles() {
        let mut fb = Framebuffer::new(16, 16);
        let diag = std::f32::consts::FRAC_1_SQRT_2;
        emit_join(
            &mut fb,
            &Affine::IDENTITY,
            StrokeJoin::Miter,
            10.0,
            Point::new(8.0, 8.0),
            Point::new(1.0, 0.0),
            Point::new(diag, diag),
            4.0,
            &opaque([255; 4]),
        );
        assert!(fb.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn round_join_fills_a_disk() {
        let mut fb = Framebuffer::new(16, 16);
        emit_join(
            &mut fb,
            &Affine::IDENTITY,
            StrokeJoin::Round,
            4.0,
            Point::new(8.0, 8.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
            6.0,
            &opaque([1, 2, 3, 255]),
        );
        assert_eq!(fb.pixel(7, 7), [1, 2, 3, 255]);
        assert_eq!(fb.pixel(8, 8), [1, 2, 3, 255]);
        assert_eq!(fb.pixel(12, 12), [0; 4]);
    }
}
