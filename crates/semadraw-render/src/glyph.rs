//! Glyph atlas application.
//!
//! A glyph run references an inline 8-bit coverage atlas: a row-major
//! plane subdivided into fixed-size cells, `columns` cells per row. Each
//! placement names a cell and an offset from the run origin; the final
//! destination rounds to integer pixels (glyph runs are not transformed,
//! which keeps text output independent of the transform stack). Coverage
//! multiplies the run color's alpha; there is no color or gamma in the
//! atlas, so glyph output is deterministic without a font rasterizer.

use semadraw_sdcs::GlyphRunRef;

use crate::{Framebuffer, raster::{Paint, clip_admits}};

/// Draw one glyph run. Out-of-range cell indices and cells that fall
/// outside the atlas plane are skipped per glyph.
pub(crate) fn draw_glyph_run(fb: &mut Framebuffer, run: &GlyphRunRef<'_>, paint: &Paint<'_>) {
    let atlas = run.atlas;
    if atlas.columns == 0 || atlas.cell_width == 0 || atlas.cell_height == 0 {
        return;
    }

    for glyph in run.glyphs() {
        let col = u64::from(glyph.index % atlas.columns);
        let row = u64::from(glyph.index / atlas.columns);
        let cell_x = col * u64::from(atlas.cell_width);
        let cell_y = row * u64::from(atlas.cell_height);
        if cell_x + u64::from(atlas.cell_width) > u64::from(atlas.width)
            || cell_y + u64::from(atlas.cell_height) > u64::from(atlas.height)
        {
            tracing::trace!(index = glyph.index, "glyph cell outside atlas, skipping");
            continue;
        }

        let dest_x = (run.x + glyph.dx).round() as i64;
        let dest_y = (run.y + glyph.dy).round() as i64;

        for py in 0..atlas.cell_height {
            for px in 0..atlas.cell_width {
                let src = (cell_y + u64::from(py)) as usize * atlas.width as usize
                    + (cell_x + u64::from(px)) as usize;
                let coverage = atlas.coverage[src];
                let fx = dest_x + i64::from(px);
                let fy = dest_y + i64::from(py);
                if fx < 0 || fy < 0 {
                    continue;
                }
                let (fx, fy) = (fx as u32, fy as u32);
                if fx >= fb.width() || fy >= fb.height() {
                    continue;
                }
                if !clip_admits(paint.clip, fx as f32 + 0.5, fy as f32 + 0.5) {
                    continue;
                }
                let alpha = (u16::from(paint.color[3]) * u16::from(coverage) / 255) as u8;
                if alpha == 0 && paint.blend == semadraw_sdcs::BlendMode::SrcOver {
                    continue;
                }
                let src_px = [paint.color[0], paint.color[1], paint.color[2], alpha];
                fb.blend_pixel(fx, fy, src_px, paint.blend);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use semadraw_sdcs::{BlendMode, Command, CommandReader, StreamEncoder};

    use super::*;

    fn run_from(bytes: &[u8]) -> Vec<Command<'_>> {
        CommandReader::new(bytes).collect()
    }

    #[test]
    fn glyph_coverage_scales_alpha() {
        // 2-column atlas of 2x2 cells; cell 1 is solid coverage 255 on
        // its top row, 128 on its bottom row.
        let mut coverage = vec![0u8; 4 * 4];
        // Cell 1 occupies columns 2..4, rows 0..2.
        coverage[2] = 255;
        coverage[3] = 255;
        coverage[4 + 2] = 128;
        coverage[4 + 3] = 128;

        let mut enc = StreamEncoder::new();
        enc.draw_glyph_run(1.0, 1.0, [255, 0, 0, 255], 4, 4, 2, 2, 2, &coverage, &[(1, 0.0, 0.0)])
            .unwrap();
        let bytes = enc.finish();
        let cmds = run_from(&bytes);
        let Command::DrawGlyphRun(run) = cmds[0] else { panic!("expected glyph run") };

        let mut fb = Framebuffer::new(8, 8);
        let paint = Paint { color: run.color, blend: BlendMode::SrcOver, antialias: false, clip: &[] };
        draw_glyph_run(&mut fb, &run, &paint);

        assert_eq!(fb.pixel(1, 1), [255, 0, 0, 255]);
        assert_eq!(fb.pixel(2, 1), [255, 0, 0, 255]);
        // Half coverage row blends at alpha 128 over transparent black.
        assert_eq!(fb.pixel(1, 2)[0], (255u16 * 128 / 255) as u8);
        // Outside the cell nothing is drawn.
        assert_eq!(fb.pixel(3, 3), [0; 4]);
    }

    #[test]
    fn out_of_range_glyph_index_is_skipped() {
        let coverage = vec![255u8; 4 * 4];
        let mut enc = StreamEncoder::new();
        enc.draw_glyph_run(0.0, 0.0, [255; 4], 4, 4, 2, 2, 2, &coverage, &[(99, 0.0, 0.0)])
            .unwrap();
        let bytes = enc.finish();
        let cmds = run_from(&bytes);
        let Command::DrawGlyphRun(run) = cmds[0] else { panic!("expected glyph run") };

        let mut fb = Framebuffer::new(8, 8);
        let paint = Paint { color: run.color, blend: BlendMode::SrcOver, antialias: false, clip: &[] };
        draw_glyph_run(&mut fb, &run, &paint);
        assert!(fb.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn offsets_round_to_integer_pixels() {
        let coverage = vec![255u8; 4];
        let mut enc = StreamEncoder::new();
        enc.draw_glyph_run(0.4, 0.6, [0, 0, 255, 255], 2, 2, 1, 2, 2, &coverage, &[(0, 2.0, 2.0)])
            .unwrap();
        let bytes = enc.finish();
        let cmds = run_from(&bytes);
        let Command::DrawGlyphRun(run) = cmds[0] else { panic!("expected glyph run") };

        let mut fb = Framebuffer::new(8, 8);
        let paint = Paint { color: run.color, blend: BlendMode::SrcOver, antialias: false, clip: &[] };
        draw_glyph_run(&mut fb, &run, &paint);
        // (0.4 + 2.0, 0.6 + 2.0) rounds to (2, 3).
        assert_eq!(fb.pixel(2, 3), [0, 0, 255, 255]);
        assert_eq!(fb.pixel(2, 2), [0; 4]);
    }
}
