//! Input event payloads, routed to the owner of the focused surface.
//!
//! These framings are byte-identical compatibility surface: remote
//! clients of any minor version parse them.

use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout,
    byteorder::little_endian::{I32, U32},
};

/// Key press or release.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct KeyPress {
    /// Backend key code (evdev-style).
    pub code: U32,
    /// Nonzero pressed, zero released.
    pub state: U32,
    /// Active modifier bitmask.
    pub modifiers: U32,
}

/// Pointer motion, button, or wheel event.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct MouseEvent {
    /// Pointer x in framebuffer pixels.
    pub x: I32,
    /// Pointer y in framebuffer pixels.
    pub y: I32,
    /// Button state bitmask.
    pub buttons: U32,
    /// Event kind: 0 motion, 1 button, 2 wheel.
    pub kind: U32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_are_pinned() {
        assert_eq!(std::mem::size_of::<KeyPress>(), 12);
        assert_eq!(std::mem::size_of::<MouseEvent>(), 16);
    }
}
