//! Surface registry: identity, geometry, Z-order, and the composition
//! bracket.
//!
//! The registry owns every surface record; sessions hold only IDs (the
//! ownership cycle between sessions and surfaces is broken by keying two
//! tables on IDs and sweeping by ID list on disconnect).
//!
//! # Composition discipline
//!
//! `begin_composition`/`end_composition` bracket the compositor's read of
//! surface state. Inside the bracket, destructive operations are
//! deferred: destroy queues the ID and hides the surface, and inline
//! buffer replacement lands in a staging slot. `end_composition` applies
//! the staged changes. The event loop is single-threaded, so this simple
//! epoch makes buffer use-after-free impossible by construction without
//! any lock on the read path.

use std::collections::HashMap;

use bytes::Bytes;

use crate::surface::{AttachedBuffer, ShmMapper, Surface};

/// Error for operations naming a surface this registry does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownSurface;

/// Registry of all live surfaces.
pub struct SurfaceRegistry {
    surfaces: HashMap<u64, Surface>,
    /// Next surface ID. Monotonic; destroyed IDs are never reused.
    next_id: u64,
    /// Cached back-to-front list of visible surface IDs.
    order: Vec<u64>,
    order_dirty: bool,
    composing: bool,
    deferred_destroy: Vec<u64>,
    staged_buffers: Vec<(u64, AttachedBuffer)>,
}

impl Default for SurfaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            surfaces: HashMap::new(),
            next_id: 1,
            order: Vec::new(),
            order_dirty: false,
            composing: false,
            deferred_destroy: Vec::new(),
            staged_buffers: Vec::new(),
        }
    }

    /// Allocate a surface for `owner`. Surfaces are created ready and
    /// visible, with no buffer attached.
    pub fn create(&mut self, owner: u64, width: f32, height: f32, scale: f32) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.surfaces.insert(id, Surface {
            id,
            owner,
            width,
            height,
            scale,
            x: 0,
            y: 0,
            z_order: 0,
            visible: true,
            buffer: None,
            pending_commit: false,
            frame: 0,
        });
        self.order_dirty = true;
        id
    }

    /// Destroy a surface. Irrevocable; the ID is never reused. Inside a
    /// composition bracket the destroy is deferred to `end_composition`
    /// and the surface becomes invisible immediately.
    ///
    /// Returns `false` if the surface does not exist.
    pub fn destroy(&mut self, id: u64, mapper: &dyn ShmMapper) -> bool {
        if self.composing {
            let Some(surface) = self.surfaces.get_mut(&id) else { return false };
            surface.visible = false;
            self.deferred_destroy.push(id);
            self.order_dirty = true;
            return true;
        }
        match self.surfaces.remove(&id) {
            Some(surface) => {
                if let Some(buffer) = &surface.buffer {
                    buffer.release(mapper);
                }
                self.order_dirty = true;
                true
            },
            None => false,
        }
    }

    /// Shared access to a surface record.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&Surface> {
        self.surfaces.get(&id)
    }

    /// Number of live surfaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    /// True when no surfaces exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Set visibility. Returns `false` for unknown surfaces.
    pub fn set_visible(&mut self, id: u64, visible: bool) -> bool {
        let Some(surface) = self.surfaces.get_mut(&id) else { return false };
        if surface.visible != visible {
            surface.visible = visible;
            self.order_dirty = true;
        }
        true
    }

    /// Set Z-order. Returns `false` for unknown surfaces.
    pub fn set_z_order(&mut self, id: u64, z_order: i32) -> bool {
        let Some(surface) = self.surfaces.get_mut(&id) else { return false };
        if surface.z_order != z_order {
            surface.z_order = z_order;
            self.order_dirty = true;
        }
        true
    }

    /// Set position. Position does not affect composition order.
    pub fn set_position(&mut self, id: u64, x: i32, y: i32) -> bool {
        let Some(surface) = self.surfaces.get_mut(&id) else { return false };
        surface.x = x;
        surface.y = y;
        true
    }

    /// Attach a buffer, replacing any previous one. Inside a composition
    /// bracket the replacement is staged and applied at
    /// `end_composition`, so the compositor never loses the bytes it is
    /// reading mid-frame.
    ///
    /// Returns the previous buffer (already released through `mapper`)
    /// when one was replaced immediately; staged replacements report
    /// `None` here and release at the bracket end.
    pub fn attach_buffer(
        &mut self,
        id: u64,
        buffer: AttachedBuffer,
        mapper: &dyn ShmMapper,
    ) -> Result<Option<AttachedBuffer>, UnknownSurface> {
        if !self.surfaces.contains_key(&id) {
            return Err(UnknownSurface);
        }
        if self.composing {
            self.staged_buffers.push((id, buffer));
            return Ok(None);
        }
        // INVARIANT: presence checked above.
        #[allow(clippy::expect_used)]
        let surface = self.surfaces.get_mut(&id).expect("invariant: surface exists");
        let old = surface.buffer.replace(buffer);
        if let Some(old_buffer) = &old {
            old_buffer.release(mapper);
        }
        Ok(old)
    }

    /// Publish the attached buffer as the next frame. Returns the new
    /// monotonic frame number, or `None` when the surface is unknown or
    /// has no buffer.
    pub fn commit(&mut self, id: u64) -> Option<u64> {
        let surface = self.surfaces.get_mut(&id)?;
        surface.buffer.as_ref()?;
        surface.frame += 1;
        surface.pending_commit = true;
        Some(surface.frame)
    }

    /// Clear a surface's pending-commit flag, returning the frame number
    /// it published.
    pub fn take_pending(&mut self, id: u64) -> Option<u64> {
        let surface = self.surfaces.get_mut(&id)?;
        if !surface.pending_commit {
            return None;
        }
        surface.pending_commit = false;
        Some(surface.frame)
    }

    /// The stream bytes of a surface's attached buffer, mapping shared
    /// segments lazily through `mapper` and caching the view.
    ///
    /// Inline buffers were validated at attach; shared segments bypass
    /// that, so their trust boundary sits here at first map. A mapping
    /// that fails validation is released and the surface contributes
    /// nothing.
    pub fn buffer_bytes(&mut self, id: u64, mapper: &dyn ShmMapper) -> Option<Bytes> {
        let surface = self.surfaces.get_mut(&id)?;
        match surface.buffer.as_mut()? {
            AttachedBuffer::Inline(bytes) => Some(bytes.clone()),
            AttachedBuffer::Shared { token, size, offset, length, mapped } => {
                if mapped.is_none() {
                    let view = mapper.map(*token, *size, *offset, *length)?;
                    match semadraw_sdcs::validate(&view) {
                        Ok(_) => *mapped = Some(view),
                        Err(e) => {
                            tracing::warn!(surface = id, error = %e, "shared stream rejected");
                            mapper.unmap(*token);
                            return None;
                        },
                    }
                }
                mapped.clone()
            },
        }
    }

    /// Back-to-front list of visible surfaces: a stable sort by Z-order,
    /// recomputed only when something that affects it changed.
    pub fn composition_order(&mut self) -> &[u64] {
        if self.order_dirty {
            let mut visible: Vec<&Surface> =
                self.surfaces.values().filter(|s| s.visible).collect();
            visible.sort_by_key(|s| (s.z_order, s.id));
            self.order = visible.into_iter().map(|s| s.id).collect();
            self.order_dirty = false;
        }
        &self.order
    }

    /// The frontmost visible surface, for input focus.
    pub fn top_visible(&mut self) -> Option<u64> {
        self.composition_order().last().copied()
    }

    /// Enter the composition bracket. Destructive operations are deferred
    /// until [`Self::end_composition`].
    pub fn begin_composition(&mut self) {
        debug_assert!(!self.composing, "composition brackets do not nest");
        self.composing = true;
    }

    /// Leave the composition bracket and apply deferred destroys and
    /// staged buffer replacements.
    pub fn end_composition(&mut self, mapper: &dyn ShmMapper) {
        debug_assert!(self.composing, "end_composition without begin_composition");
        self.composing = false;

        for (id, buffer) in std::mem::take(&mut self.staged_buffers) {
            if let Some(surface) = self.surfaces.get_mut(&id) {
                if let Some(old) = surface.buffer.replace(buffer) {
                    old.release(mapper);
                }
            }
        }

        for id in std::mem::take(&mut self.deferred_destroy) {
            if let Some(surface) = self.surfaces.remove(&id) {
                if let Some(buffer) = &surface.buffer {
                    buffer.release(mapper);
                }
            }
        }
        self.order_dirty = true;
    }

    /// Remove every surface owned by `client` (the disconnect sweep).
    /// Returns the removed IDs.
    pub fn remove_client_surfaces(&mut self, client: u64, mapper: &dyn ShmMapper) -> Vec<u64> {
        let ids: Vec<u64> =
            self.surfaces.values().filter(|s| s.owner == client).map(|s| s.id).collect();
        for &id in &ids {
            self.destroy(id, mapper);
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::NoShm;

    fn inline(bytes: &[u8]) -> AttachedBuffer {
        AttachedBuffer::Inline(Bytes::copy_from_slice(bytes))
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut reg = SurfaceRegistry::new();
        let a = reg.create(1, 64.0, 64.0, 1.0);
        let b = reg.create(1, 64.0, 64.0, 1.0);
        assert!(b > a);
        assert!(reg.destroy(a, &NoShm));
        let c = reg.create(1, 64.0, 64.0, 1.0);
        assert!(c > b);
        assert_ne!(c, a);
    }

    #[test]
    fn destroy_unknown_surface_fails() {
        let mut reg = SurfaceRegistry::new();
        assert!(!reg.destroy(99, &NoShm));
    }

    #[test]
    fn composition_order_is_stable_sort_by_z() {
        let mut reg = SurfaceRegistry::new();
        let a = reg.create(1, 8.0, 8.0, 1.0); // z 0
        let b = reg.create(1, 8.0, 8.0, 1.0); // z 0, created later
        let c = reg.create(1, 8.0, 8.0, 1.0);
        reg.set_z_order(c, -1);
        // Equal z preserves creation order; lower z sorts first.
        assert_eq!(reg.composition_order(), &[c, a, b]);
        assert_eq!(reg.top_visible(), Some(b));
    }

    #[test]
    fn invisible_surfaces_drop_out_of_order() {
        let mut reg = SurfaceRegistry::new();
        let a = reg.create(1, 8.0, 8.0, 1.0);
        let b = reg.create(1, 8.0, 8.0, 1.0);
        reg.set_visible(a, false);
        assert_eq!(reg.composition_order(), &[b]);
        reg.set_visible(a, true);
        assert_eq!(reg.composition_order(), &[a, b]);
    }

    #[test]
    fn commit_requires_a_buffer_and_counts_frames() {
        let mut reg = SurfaceRegistry::new();
        let id = reg.create(1, 8.0, 8.0, 1.0);
        assert_eq!(reg.commit(id), None);
        reg.attach_buffer(id, inline(b"x"), &NoShm).unwrap();
        assert_eq!(reg.commit(id), Some(1));
        assert_eq!(reg.commit(id), Some(2));
        assert_eq!(reg.take_pending(id), Some(2));
        assert_eq!(reg.take_pending(id), None);
    }

    #[test]
    fn destroy_inside_bracket_is_deferred() {
        let mut reg = SurfaceRegistry::new();
        let id = reg.create(1, 8.0, 8.0, 1.0);
        reg.begin_composition();
        assert!(reg.destroy(id, &NoShm));
        // Still present (readable by the compositor), but invisible.
        assert!(reg.get(id).is_some());
        assert!(!reg.get(id).map(|s| s.visible).unwrap_or(true));
        reg.end_composition(&NoShm);
        assert!(reg.get(id).is_none());
    }

    #[test]
    fn buffer_replacement_inside_bracket_is_staged() {
        let mut reg = SurfaceRegistry::new();
        let id = reg.create(1, 8.0, 8.0, 1.0);
        reg.attach_buffer(id, inline(b"old"), &NoShm).unwrap();

        reg.begin_composition();
        reg.attach_buffer(id, inline(b"new"), &NoShm).unwrap();
        // The compositor still reads the old bytes inside the bracket.
        assert_eq!(reg.buffer_bytes(id, &NoShm).unwrap(), Bytes::from_static(b"old"));
        reg.end_composition(&NoShm);
        assert_eq!(reg.buffer_bytes(id, &NoShm).unwrap(), Bytes::from_static(b"new"));
    }

    #[test]
    fn client_sweep_removes_only_that_clients_surfaces() {
        let mut reg = SurfaceRegistry::new();
        let a = reg.create(1, 8.0, 8.0, 1.0);
        let b = reg.create(2, 8.0, 8.0, 1.0);
        let c = reg.create(1, 8.0, 8.0, 1.0);
        let mut removed = reg.remove_client_surfaces(1, &NoShm);
        removed.sort_unstable();
        assert_eq!(removed, vec![a, c]);
        assert!(reg.get(b).is_some());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn attach_to_unknown_surface_fails() {
        let mut reg = SurfaceRegistry::new();
        assert!(reg.attach_buffer(42, inline(b"x"), &NoShm).is_err());
    }
}
