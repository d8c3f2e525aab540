//! Fuzz target for SDCS validation totality
//!
//! # Strategy
//!
//! Throw completely arbitrary bytes at the validator, and when a mutant
//! happens to validate, walk it with the command reader and render it
//! into a small framebuffer.
//!
//! # Invariants
//!
//! - `validate` terminates on every input and never reads past the
//!   buffer (ASAN would catch an overread)
//! - A stream the validator accepts never panics the reader or the
//!   renderer
//! - NEVER panic, whatever the verdict

#![no_main]

use libfuzzer_sys::fuzz_target;
use semadraw_render::Framebuffer;
use semadraw_sdcs::{CommandReader, validate};

fuzz_target!(|data: &[u8]| {
    if validate(data).is_ok() {
        // Accepted input must be fully walkable and renderable.
        let mut commands = 0usize;
        for _ in CommandReader::new(data) {
            commands += 1;
            if commands > 10_000 {
                break;
            }
        }
        let mut fb = Framebuffer::new(32, 32);
        semadraw_render::render_validated(data, &mut fb);
    }
});
