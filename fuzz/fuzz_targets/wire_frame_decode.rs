//! Fuzz target for IPC frame and message decoding
//!
//! # Strategy
//!
//! Arbitrary bytes through `WireFrame::decode`, then any successfully
//! framed payload through `Message::from_frame`, then a round-trip
//! check on anything that fully decoded.
//!
//! # Invariants
//!
//! - Frame and message decoding terminate without panicking on any input
//! - `decode(encode(m))` reproduces `m` for every decodable message

#![no_main]

use libfuzzer_sys::fuzz_target;
use semadraw_proto::{Message, WireFrame};

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = WireFrame::decode(data) else { return };
    let Ok(message) = Message::from_frame(&frame) else { return };

    let reencoded = message.clone().into_frame();
    let Ok(again) = Message::from_frame(&reencoded) else {
        panic!("re-encoded message failed to decode");
    };
    assert_eq!(message, again, "message round-trip changed value");
});
