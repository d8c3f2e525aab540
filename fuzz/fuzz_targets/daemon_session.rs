//! Fuzz target for the daemon driver's protocol surface
//!
//! # Strategy
//!
//! Structured sessions: a mix of raw frames (type confusion, garbage
//! payloads) and well-formed requests across several simulated sockets,
//! with ticks interleaved.
//!
//! # Invariants
//!
//! - The driver never panics, whatever arrives in whatever order
//! - Every returned action names a session the runtime could act on
//! - Surface/session counts never underflow (observable via accessors)

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use semadraw_daemon::{
    BackendConfig, DaemonConfig, DaemonDriver, DaemonEvent, SessionLimits, SoftwareBackend,
};
use semadraw_proto::{Message, WireFrame, payloads::Hello};

#[derive(Debug, Arbitrary)]
enum Step {
    Accept { session: u8, remote: bool },
    Hello { session: u8 },
    RawFrame { session: u8, msg_type: u16, payload: Vec<u8> },
    Close { session: u8 },
    Tick { advance_us: u16, cost_us: u16 },
}

fuzz_target!(|steps: Vec<Step>| {
    let config = DaemonConfig {
        limits: SessionLimits { max_surfaces: 4, max_buffer_bytes: 4096, max_inline_bytes: 1024 },
        refresh_period_us: 1_000,
        screen: BackendConfig { width: 32, height: 32 },
    };
    let Ok(mut driver) = DaemonDriver::new(Box::new(SoftwareBackend::headless()), config) else {
        return;
    };

    let mut now_us: u64 = 0;
    for step in steps {
        match step {
            Step::Accept { session, remote } => {
                driver.handle(DaemonEvent::ConnectionAccepted {
                    session_id: u64::from(session),
                    remote,
                });
            },
            Step::Hello { session } => {
                driver.handle(DaemonEvent::FrameReceived {
                    session_id: u64::from(session),
                    frame: Message::Hello(Hello::current()).into_frame(),
                });
            },
            Step::RawFrame { session, msg_type, payload } => {
                driver.handle(DaemonEvent::FrameReceived {
                    session_id: u64::from(session),
                    frame: WireFrame::new(msg_type, payload),
                });
            },
            Step::Close { session } => {
                driver.handle(DaemonEvent::ConnectionClosed { session_id: u64::from(session) });
            },
            Step::Tick { advance_us, cost_us } => {
                now_us += u64::from(advance_us);
                driver.handle(DaemonEvent::Tick {
                    now_us,
                    last_tick_cost_us: u64::from(cost_us),
                });
            },
        }
    }
});
