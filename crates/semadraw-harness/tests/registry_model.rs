//! Model-based testing of the surface registry.
//!
//! Random operation sequences run against the naive model and the real
//! registry; observable state (live set, composition order, ID
//! monotonicity) must agree after every step. The bracketed variant
//! interleaves composition brackets to exercise the deferral paths.

use proptest::prelude::*;
use semadraw_daemon::{NoShm, SurfaceRegistry};
use semadraw_harness::model::{ModelRegistry, Operation};

fn arbitrary_op() -> impl Strategy<Value = Operation> {
    prop_oneof![
        (1u64..4).prop_map(|owner| Operation::Create { owner }),
        (0usize..8).prop_map(|nth| Operation::Destroy { nth }),
        (0usize..8).prop_map(|nth| Operation::ToggleVisible { nth }),
        ((0usize..8), (-4i32..4)).prop_map(|(nth, z)| Operation::SetZ { nth, z }),
        (1u64..4).prop_map(|owner| Operation::Sweep { owner }),
    ]
}

/// Apply one model op to the real registry, using the model's selector
/// so both sides pick the same surface.
fn apply_real(reg: &mut SurfaceRegistry, model: &ModelRegistry, op: Operation) {
    match op {
        Operation::Create { owner } => {
            reg.create(owner, 16.0, 16.0, 1.0);
        },
        Operation::Destroy { nth } => {
            if let Some(id) = model.select(nth) {
                reg.destroy(id, &NoShm);
            }
        },
        Operation::ToggleVisible { nth } => {
            if let Some(id) = model.select(nth) {
                let visible = reg.get(id).map(|s| s.visible).unwrap_or(false);
                reg.set_visible(id, !visible);
            }
        },
        Operation::SetZ { nth, z } => {
            if let Some(id) = model.select(nth) {
                reg.set_z_order(id, z);
            }
        },
        Operation::Sweep { owner } => {
            reg.remove_client_surfaces(owner, &NoShm);
        },
    }
}

proptest! {
    /// The registry's cached composition order always matches the
    /// model's from-scratch recomputation.
    #[test]
    fn registry_matches_model(ops in proptest::collection::vec(arbitrary_op(), 0..64)) {
        let mut reg = SurfaceRegistry::new();
        let mut model = ModelRegistry::new();

        for op in ops {
            apply_real(&mut reg, &model, op);
            model.apply(op);

            prop_assert_eq!(reg.len(), model.live_ids().len());
            prop_assert_eq!(reg.composition_order(), &model.composition_order()[..]);
        }

        // IDs are unique and strictly increasing across the whole run.
        let issued = model.issued_ids();
        for pair in issued.windows(2) {
            prop_assert!(pair[1] > pair[0]);
        }
    }

    /// Destroys issued inside a composition bracket take effect exactly
    /// at the bracket end, and the surface is hidden meanwhile.
    #[test]
    fn bracketed_destroys_defer(victims in proptest::collection::vec(0usize..4, 1..4)) {
        let mut reg = SurfaceRegistry::new();
        let ids: Vec<u64> = (0..4).map(|_| reg.create(1, 8.0, 8.0, 1.0)).collect();

        reg.begin_composition();
        let mut destroyed: Vec<u64> = Vec::new();
        for v in victims {
            let id = ids[v % ids.len()];
            reg.destroy(id, &NoShm);
            if !destroyed.contains(&id) {
                destroyed.push(id);
            }
            // Still readable inside the bracket, but invisible.
            prop_assert!(reg.get(id).is_some());
            prop_assert!(!reg.get(id).map(|s| s.visible).unwrap_or(true));
        }
        reg.end_composition(&NoShm);

        for id in &destroyed {
            prop_assert!(reg.get(*id).is_none());
        }
        prop_assert_eq!(reg.len(), 4 - destroyed.len());
    }
}
