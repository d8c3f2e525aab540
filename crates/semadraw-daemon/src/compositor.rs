//! Frame composition and scheduling.
//!
//! Each tick brackets the registry, walks the back-to-front list, hands
//! every visible surface's stream to the backend, presents, and reports
//! which pending commits completed. No suspension happens inside the
//! bracket — the tick is one synchronous call on the event loop.
//!
//! Scheduling aims at the refresh period with an adaptive fallback: when
//! the previous tick's cost exceeded the period, the next tick is
//! skipped so a slow backend coalesces frames instead of falling ever
//! further behind.

use crate::{
    backend::{Backend, BackendConfig, BackendError, InputEvent, RenderRequest},
    damage::{DamageRect, DamageTracker},
    registry::SurfaceRegistry,
    surface::ShmMapper,
};

/// Outcome of one surface's pending commit in a composited frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutcome {
    /// The committed surface.
    pub surface_id: u64,
    /// The surface's owner, for FRAME_COMPLETE routing.
    pub owner: u64,
    /// The frame number the commit published.
    pub frame: u64,
    /// False when this surface's render failed; it contributed nothing
    /// to the frame and keeps its prior on-screen state.
    pub ok: bool,
}

/// The compositor: active backend, refresh target, damage accumulator.
pub struct Compositor {
    backend: Box<dyn Backend>,
    refresh_period_us: u64,
    last_tick_us: u64,
    damage: DamageTracker,
}

impl Compositor {
    /// Wrap `backend` (already selected, not yet initialized).
    pub fn new(mut backend: Box<dyn Backend>, config: BackendConfig, refresh_period_us: u64) -> Result<Self, BackendError> {
        backend.init(config)?;
        Ok(Self { backend, refresh_period_us, last_tick_us: 0, damage: DamageTracker::new() })
    }

    /// Accumulate damage for one surface's area (commits, moves).
    pub fn damage_rect(&mut self, rect: DamageRect) {
        self.damage.mark_rect(rect);
    }

    /// Mark the whole frame damaged (visibility, Z-order, or surface
    /// lifetime changes).
    pub fn damage_full(&mut self) {
        self.damage.mark_full();
    }

    /// The composed pixels of the most recent frame.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        self.backend.pixels()
    }

    /// Drain backend input events.
    pub fn poll_input(&mut self) -> Vec<InputEvent> {
        self.backend.poll_input()
    }

    /// Backend clipboard bridge, if any.
    pub fn clipboard_get(&mut self) -> Option<Vec<u8>> {
        self.backend.clipboard_get()
    }

    /// Push clipboard contents to the backend bridge.
    pub fn clipboard_set(&mut self, data: &[u8]) {
        self.backend.clipboard_set(data);
    }

    /// Compose one frame if due. `now_us` is the event loop's monotonic
    /// clock; `last_tick_cost_us` is how long the previous tick took
    /// (measured by the runtime), driving the overrun fallback.
    pub fn tick(
        &mut self,
        now_us: u64,
        last_tick_cost_us: u64,
        registry: &mut SurfaceRegistry,
        mapper: &dyn ShmMapper,
    ) -> Vec<FrameOutcome> {
        if now_us.saturating_sub(self.last_tick_us) < self.refresh_period_us {
            return Vec::new();
        }
        if last_tick_cost_us > self.refresh_period_us {
            tracing::debug!(
                cost_us = last_tick_cost_us,
                period_us = self.refresh_period_us,
                "previous frame overran, coalescing"
            );
            self.last_tick_us = now_us;
            return Vec::new();
        }
        let Some(damaged) = self.damage.take() else {
            return Vec::new();
        };
        self.last_tick_us = now_us;
        if damaged.is_empty() {
            tracing::trace!("compositing full frame");
        } else {
            tracing::trace!(regions = damaged.len(), "compositing damaged frame");
        }

        registry.begin_composition();
        let order: Vec<u64> = registry.composition_order().to_vec();

        self.backend.begin_frame();
        let mut outcomes = Vec::new();
        for id in order {
            let Some((owner, x, y, width, height, scale)) = registry
                .get(id)
                .map(|s| (s.owner, s.x, s.y, s.pixel_width(), s.pixel_height(), s.scale))
            else {
                continue;
            };
            let Some(stream) = registry.buffer_bytes(id, mapper) else {
                // Nothing attached (or the shared mapping failed); the
                // surface simply contributes nothing.
                if let Some(frame) = registry.take_pending(id) {
                    outcomes.push(FrameOutcome { surface_id: id, owner, frame, ok: false });
                }
                continue;
            };

            let rendered = self
                .backend
                .render(&RenderRequest { surface_id: id, stream: &stream, x, y, width, height, scale });
            if let Err(e) = &rendered {
                tracing::warn!(surface = id, error = %e, "surface render failed, dropping its frame");
            }
            if let Some(frame) = registry.take_pending(id) {
                outcomes.push(FrameOutcome { surface_id: id, owner, frame, ok: rendered.is_ok() });
            }
        }

        if let Err(e) = self.backend.present() {
            // Compositor errors drop the frame but keep the daemon alive.
            tracing::warn!(error = %e, "present failed, dropping frame");
            for outcome in &mut outcomes {
                outcome.ok = false;
            }
        }
        registry.end_composition(mapper);

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use semadraw_sdcs::StreamEncoder;

    use super::*;
    use crate::{
        backend::{BackendConfig, SoftwareBackend},
        surface::{AttachedBuffer, NoShm},
    };

    const PERIOD: u64 = 16_667;

    fn compositor() -> Compositor {
        Compositor::new(
            Box::new(SoftwareBackend::headless()),
            BackendConfig { width: 32, height: 32 },
            PERIOD,
        )
        .unwrap()
    }

    fn attach_solid(reg: &mut SurfaceRegistry, id: u64, color: [u8; 4]) {
        let mut enc = StreamEncoder::new();
        enc.fill_rect(0.0, 0.0, 8.0, 8.0, color).unwrap();
        reg.attach_buffer(id, AttachedBuffer::Inline(Bytes::from(enc.finish())), &NoShm).unwrap();
    }

    #[test]
    fn tick_without_damage_is_idle() {
        let mut comp = compositor();
        let mut reg = SurfaceRegistry::new();
        assert!(comp.tick(PERIOD, 0, &mut reg, &NoShm).is_empty());
    }

    #[test]
    fn commit_then_tick_reports_frame_complete() {
        let mut comp = compositor();
        let mut reg = SurfaceRegistry::new();
        let id = reg.create(1, 8.0, 8.0, 1.0);
        attach_solid(&mut reg, id, [255, 0, 0, 255]);
        let frame = reg.commit(id).unwrap();
        comp.damage_full();

        let outcomes = comp.tick(PERIOD, 0, &mut reg, &NoShm);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].surface_id, id);
        assert_eq!(outcomes[0].owner, 1);
        assert_eq!(outcomes[0].frame, frame);
        assert!(outcomes[0].ok);

        // The surface's pixels landed on the screen.
        assert_eq!(&comp.pixels()[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn overrun_coalesces_the_next_tick() {
        let mut comp = compositor();
        let mut reg = SurfaceRegistry::new();
        let id = reg.create(1, 8.0, 8.0, 1.0);
        attach_solid(&mut reg, id, [255, 0, 0, 255]);
        reg.commit(id).unwrap();
        comp.damage_full();

        // Previous tick overran: this one is skipped entirely.
        assert!(comp.tick(PERIOD, PERIOD * 2, &mut reg, &NoShm).is_empty());
        // The following tick (normal cost) composes.
        assert_eq!(comp.tick(PERIOD * 2, 0, &mut reg, &NoShm).len(), 1);
    }

    #[test]
    fn ticks_are_rate_limited_to_the_period() {
        let mut comp = compositor();
        let mut reg = SurfaceRegistry::new();
        let id = reg.create(1, 8.0, 8.0, 1.0);
        attach_solid(&mut reg, id, [0, 255, 0, 255]);
        reg.commit(id).unwrap();
        comp.damage_full();

        assert_eq!(comp.tick(PERIOD, 0, &mut reg, &NoShm).len(), 1);
        reg.commit(id).unwrap();
        comp.damage_full();
        // Too soon after the last composed frame.
        assert!(comp.tick(PERIOD + 10, 0, &mut reg, &NoShm).is_empty());
        assert_eq!(comp.tick(PERIOD * 2, 0, &mut reg, &NoShm).len(), 1);
    }

    #[test]
    fn surfaces_compose_back_to_front() {
        let mut comp = compositor();
        let mut reg = SurfaceRegistry::new();
        let back = reg.create(1, 8.0, 8.0, 1.0);
        let front = reg.create(1, 8.0, 8.0, 1.0);
        reg.set_z_order(front, 5);
        attach_solid(&mut reg, back, [255, 0, 0, 255]);
        attach_solid(&mut reg, front, [0, 255, 0, 255]);
        reg.commit(back).unwrap();
        reg.commit(front).unwrap();
        comp.damage_full();

        comp.tick(PERIOD, 0, &mut reg, &NoShm);
        // Both cover (0,0); the higher z wins.
        assert_eq!(&comp.pixels()[0..4], &[0, 255, 0, 255]);
    }

    #[test]
    fn commit_without_mapping_reports_error_outcome() {
        let mut comp = compositor();
        let mut reg = SurfaceRegistry::new();
        let id = reg.create(1, 8.0, 8.0, 1.0);
        reg.attach_buffer(
            id,
            AttachedBuffer::Shared { token: 9, size: 64, offset: 0, length: 64, mapped: None },
            &NoShm,
        )
        .unwrap();
        reg.commit(id).unwrap();
        comp.damage_full();

        let outcomes = comp.tick(PERIOD, 0, &mut reg, &NoShm);
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].ok);
    }
}
