//! Fuzz target for the encode-then-validate law
//!
//! # Strategy
//!
//! Build arbitrary command sequences through the encoder's typed
//! helpers. Whenever every helper accepted its inputs, the finished
//! stream must validate — the encoder's input checks are exactly the
//! validator's payload rules.
//!
//! # Invariants
//!
//! - `validate(encode(cmds))` succeeds for every accepted command
//! - Rejected helper inputs (non-finite floats, mismatched lengths)
//!   never poison the stream: the record is simply absent

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use semadraw_sdcs::{BlendMode, StreamEncoder, StrokeCap, StrokeJoin, validate};

#[derive(Debug, Arbitrary)]
enum Cmd {
    Reset,
    Transform([f32; 6]),
    ResetTransform,
    ClipRects(Vec<[f32; 4]>),
    ClearClip,
    Blend(u8),
    Join(u8),
    Cap(u8),
    MiterLimit(f32),
    Antialias(bool),
    FillRect(f32, f32, f32, f32, [u8; 4]),
    StrokeRect(f32, f32, f32, f32, f32, [u8; 4]),
    StrokeLine(f32, f32, f32, f32, f32, [u8; 4]),
    Path(Vec<[f32; 2]>, f32, [u8; 4]),
    Blit(f32, f32, u8, u8),
    End,
}

fuzz_target!(|cmds: Vec<Cmd>| {
    let mut enc = StreamEncoder::new();
    for cmd in cmds {
        match cmd {
            Cmd::Reset => enc.reset(),
            Cmd::Transform(m) => {
                let _ = enc.set_transform_2d(m);
            },
            Cmd::ResetTransform => enc.reset_transform(),
            Cmd::ClipRects(rects) => {
                let _ = enc.set_clip_rects(&rects);
            },
            Cmd::ClearClip => enc.clear_clip(),
            Cmd::Blend(raw) => {
                if let Some(mode) = BlendMode::from_u32(u32::from(raw)) {
                    enc.set_blend(mode);
                }
            },
            Cmd::Join(raw) => {
                if let Some(join) = StrokeJoin::from_u32(u32::from(raw)) {
                    enc.set_stroke_join(join);
                }
            },
            Cmd::Cap(raw) => {
                if let Some(cap) = StrokeCap::from_u32(u32::from(raw)) {
                    enc.set_stroke_cap(cap);
                }
            },
            Cmd::MiterLimit(limit) => {
                let _ = enc.set_miter_limit(limit);
            },
            Cmd::Antialias(enabled) => enc.set_antialias(enabled),
            Cmd::FillRect(x, y, w, h, color) => {
                let _ = enc.fill_rect(x, y, w, h, color);
            },
            Cmd::StrokeRect(x, y, w, h, sw, color) => {
                let _ = enc.stroke_rect(x, y, w, h, sw, color);
            },
            Cmd::StrokeLine(x0, y0, x1, y1, sw, color) => {
                let _ = enc.stroke_line(x0, y0, x1, y1, sw, color);
            },
            Cmd::Path(points, sw, color) => {
                let _ = enc.stroke_path(&points, sw, color);
            },
            Cmd::Blit(x, y, w, h) => {
                let (w, h) = (u32::from(w % 16), u32::from(h % 16));
                let pixels = vec![0xA5u8; (w * h * 4) as usize];
                let _ = enc.blit_image(x, y, w, h, &pixels);
            },
            Cmd::End => enc.end(),
        }
    }

    let bytes = enc.finish();
    if let Err(e) = validate(&bytes) {
        panic!("encoder output failed validation: {e}");
    }
});
