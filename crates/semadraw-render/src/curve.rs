//! Fixed-count Bezier flattening.
//!
//! Curves flatten to a fixed number of segments (16 for quadratic, 24 for
//! cubic) evaluated on the Bernstein basis at uniform parameter steps.
//! Fixed counts keep the output independent of curve size and machine,
//! which is what makes curve determinism trivial to argue.

use crate::geom::Point;

/// Segments per quadratic curve.
pub(crate) const QUAD_SEGMENTS: usize = 16;

/// Segments per cubic curve.
pub(crate) const CUBIC_SEGMENTS: usize = 24;

/// Evaluate a quadratic Bezier into `QUAD_SEGMENTS + 1` points.
pub(crate) fn flatten_quad(p0: Point, c: Point, p1: Point) -> [Point; QUAD_SEGMENTS + 1] {
    let mut out = [Point::default(); QUAD_SEGMENTS + 1];
    for (i, p) in out.iter_mut().enumerate() {
        let t = i as f32 / QUAD_SEGMENTS as f32;
        let u = 1.0 - t;
        let b0 = u * u;
        let b1 = 2.0 * u * t;
        let b2 = t * t;
        *p = Point::new(
            b0 * p0.x + b1 * c.x + b2 * p1.x,
            b0 * p0.y + b1 * c.y + b2 * p1.y,
        );
    }
    out
}

/// Evaluate a cubic Bezier into `CUBIC_SEGMENTS + 1` points.
pub(crate) fn flatten_cubic(
    p0: Point,
    c1: Point,
    c2: Point,
    p1: Point,
) -> [Point; CUBIC_SEGMENTS + 1] {
    let mut out = [Point::default(); CUBIC_SEGMENTS + 1];
    for (i, p) in out.iter_mut().enumerate() {
        let t = i as f32 / CUBIC_SEGMENTS as f32;
        let u = 1.0 - t;
        let b0 = u * u * u;
        let b1 = 3.0 * u * u * t;
        let b2 = 3.0 * u * t * t;
        let b3 = t * t * t;
        *p = Point::new(
            b0 * p0.x + b1 * c1.x + b2 * c2.x + b3 * p1.x,
            b0 * p0.y + b1 * c1.y + b2 * c2.y + b3 * p1.y,
        );
    }
    out
}
