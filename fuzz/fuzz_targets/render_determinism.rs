//! Fuzz target for renderer determinism and memory safety
//!
//! # Strategy
//!
//! Mutate valid-ish streams; for every accepted mutant, render twice
//! into fresh framebuffers and demand byte equality.
//!
//! # Invariants
//!
//! - Rendering a validated stream never reads outside the stream or
//!   writes outside the framebuffer (ASAN-observable)
//! - Two renders of the same stream are byte-identical

#![no_main]

use libfuzzer_sys::fuzz_target;
use semadraw_render::Framebuffer;
use semadraw_sdcs::validate;

fuzz_target!(|data: &[u8]| {
    if validate(data).is_err() {
        return;
    }
    let mut a = Framebuffer::new(48, 48);
    let mut b = Framebuffer::new(48, 48);
    semadraw_render::render_validated(data, &mut a);
    semadraw_render::render_validated(data, &mut b);
    assert_eq!(a.pixels(), b.pixels(), "non-deterministic render");
});
