//! Reference model of the surface registry.
//!
//! A deliberately naive implementation of the registry's observable
//! semantics: plain vectors, no caching, recomputed ordering on every
//! query. Model-based tests apply the same operation sequence to this
//! and to the real [`semadraw_daemon::SurfaceRegistry`] and compare the
//! observable state after every step; any divergence is a bug in the
//! real registry's caching or deferral logic.

use std::collections::BTreeMap;

/// One registry operation, as generated by the model-based tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    /// Create a surface for a client.
    Create {
        /// Owning client.
        owner: u64,
    },
    /// Destroy the `nth` live surface (modulo the live count).
    Destroy {
        /// Index selector into the live set.
        nth: usize,
    },
    /// Toggle visibility of the `nth` live surface.
    ToggleVisible {
        /// Index selector into the live set.
        nth: usize,
    },
    /// Set the Z-order of the `nth` live surface.
    SetZ {
        /// Index selector into the live set.
        nth: usize,
        /// New Z-order.
        z: i32,
    },
    /// Sweep every surface of a client.
    Sweep {
        /// Client to sweep.
        owner: u64,
    },
}

/// Observable surface state the model tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSurface {
    /// Surface ID.
    pub id: u64,
    /// Owning client.
    pub owner: u64,
    /// Z-order.
    pub z_order: i32,
    /// Visibility.
    pub visible: bool,
}

/// The naive registry model.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    surfaces: BTreeMap<u64, ModelSurface>,
    next_id: u64,
    ever_issued: Vec<u64>,
}

impl ModelRegistry {
    /// An empty model.
    #[must_use]
    pub fn new() -> Self {
        Self { surfaces: BTreeMap::new(), next_id: 1, ever_issued: Vec::new() }
    }

    /// Live surface IDs in creation order.
    #[must_use]
    pub fn live_ids(&self) -> Vec<u64> {
        self.surfaces.keys().copied().collect()
    }

    /// Every ID ever issued, for the never-reused invariant.
    #[must_use]
    pub fn issued_ids(&self) -> &[u64] {
        &self.ever_issued
    }

    /// Apply one operation; returns the created ID for `Create`.
    pub fn apply(&mut self, op: Operation) -> Option<u64> {
        match op {
            Operation::Create { owner } => {
                let id = self.next_id;
                self.next_id += 1;
                self.surfaces.insert(id, ModelSurface { id, owner, z_order: 0, visible: true });
                self.ever_issued.push(id);
                Some(id)
            },
            Operation::Destroy { nth } => {
                let id = self.select(nth)?;
                self.surfaces.remove(&id);
                None
            },
            Operation::ToggleVisible { nth } => {
                let id = self.select(nth)?;
                if let Some(s) = self.surfaces.get_mut(&id) {
                    s.visible = !s.visible;
                }
                None
            },
            Operation::SetZ { nth, z } => {
                let id = self.select(nth)?;
                if let Some(s) = self.surfaces.get_mut(&id) {
                    s.z_order = z;
                }
                None
            },
            Operation::Sweep { owner } => {
                self.surfaces.retain(|_, s| s.owner != owner);
                None
            },
        }
    }

    /// Select the `nth` live surface, wrapping by the live count.
    #[must_use]
    pub fn select(&self, nth: usize) -> Option<u64> {
        let ids = self.live_ids();
        if ids.is_empty() { None } else { Some(ids[nth % ids.len()]) }
    }

    /// Back-to-front order: stable sort of visible surfaces by Z-order,
    /// recomputed from scratch (no cache to go stale).
    #[must_use]
    pub fn composition_order(&self) -> Vec<u64> {
        let mut visible: Vec<&ModelSurface> =
            self.surfaces.values().filter(|s| s.visible).collect();
        visible.sort_by_key(|s| (s.z_order, s.id));
        visible.into_iter().map(|s| s.id).collect()
    }
}
