//! Property tests for the collision queries.
//!
//! 1. Plane pairs are exact negations
//! 2. Point classification has no side effects
//! 3. Impact distance doesn't depend on how far past the obstruction a trace ends
//! 4. Zero length traces agree with brush containment
//! 5. Recentering the box is invisible in the result
//! 6. Box hulls used one after another don't interfere

use std::sync::LazyLock;

use proptest::prelude::*;
use quetoo_collision::cm_plane::PlaneTable;
use quetoo_collision::{BoxHull, BspBuilder, CmConfig, CollisionModel};
use quetoo_common::q_shared::{vector_length, vector_subtract, Contents, Vec3, MASK_SOLID};

static MAP: LazyLock<CollisionModel> = LazyLock::new(|| {
    let mut b = BspBuilder::new();
    b.add_box(&[0.0; 3], &[64.0; 3], Contents::SOLID).unwrap();
    b.add_box(&[128.0, -64.0, 0.0], &[192.0, 64.0, 32.0], Contents::SOLID).unwrap();
    b.add_box(&[-128.0, -128.0, -32.0], &[256.0, 128.0, 0.0], Contents::SOLID).unwrap();
    b.add_box(&[-96.0, 32.0, 0.0], &[-32.0, 96.0, 48.0], Contents::WATER).unwrap();
    CollisionModel::load(&b.build().unwrap(), &CmConfig::default()).unwrap()
});

// ── Strategies ──────────────────────────────────────────────────────────

fn point_strategy() -> impl Strategy<Value = Vec3> {
    (-160.0f32..300.0, -160.0f32..160.0, -64.0f32..128.0).prop_map(|(x, y, z)| [x, y, z])
}

fn whole_point_strategy() -> impl Strategy<Value = Vec3> {
    (-160i32..300, -160i32..160, -64i32..128).prop_map(|(x, y, z)| [x as f32, y as f32, z as f32])
}

/// Integral, possibly lopsided, box bounds.
fn bounds_strategy() -> impl Strategy<Value = (Vec3, Vec3)> {
    (
        (-24i32..=0, -24i32..=0, -32i32..=0),
        (0i32..=24, 0i32..=24, 0i32..=48),
    )
        .prop_map(|((a, b, c), (d, e, f))| {
            ([a as f32, b as f32, c as f32], [d as f32, e as f32, f as f32])
        })
}

fn near(a: f32, b: f32) -> bool {
    (a - b).abs() < 0.01
}

/// True when the box at `p` is within a hair of touching some brush face.
fn grazes_brush(cm: &CollisionModel, p: &Vec3, mins: &Vec3, maxs: &Vec3) -> bool {
    cm.brushes().iter().any(|b| {
        (0..3).any(|i| near(p[i] + mins[i], b.maxs[i]) || near(p[i] + maxs[i], b.mins[i]))
    })
}

fn box_in_solid(cm: &CollisionModel, p: &Vec3, mins: &Vec3, maxs: &Vec3) -> bool {
    cm.brushes().iter().any(|b| {
        b.contents.intersects(MASK_SOLID)
            && (0..3).all(|i| p[i] + mins[i] < b.maxs[i] && p[i] + maxs[i] > b.mins[i])
    })
}

// ═══════════════════════════════════════════════════════════════════════
// 1. Plane pairing
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn plane_pairs_are_exact_negations(
        planes in proptest::collection::vec(
            ((-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0), -4096.0f32..4096.0),
            1..64,
        )
    ) {
        let mut table = PlaneTable::new();
        for ((x, y, z), dist) in planes {
            let len = vector_length(&[x, y, z]);
            prop_assume!(len > 0.1);
            let normal = [x / len, y / len, z / len];
            let num = table.find_or_create(normal, dist).unwrap();
            prop_assert!(num < table.len());
        }

        let planes = table.planes();
        prop_assert_eq!(planes.len() % 2, 0);
        for i in 0..planes.len() {
            let (a, b) = (&planes[i], &planes[i ^ 1]);
            prop_assert_eq!(b.dist, -a.dist);
            for k in 0..3 {
                prop_assert_eq!(b.normal[k], -a.normal[k]);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 2. Point classification has no side effects
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn point_contents_is_idempotent(p in point_strategy(), q in point_strategy()) {
        let cm = &*MAP;
        let head = cm.world_model().head_node;

        let first = cm.point_contents(&p, head);
        let leaf = cm.point_leafnum(&p, head);

        // other queries in between must not disturb the tree
        cm.box_trace(&q, &p, &[-16.0; 3], &[16.0; 3], head, MASK_SOLID);
        cm.box_leafnums(&p, &q, head, 64);

        prop_assert_eq!(cm.point_contents(&p, head), first);
        prop_assert_eq!(cm.point_leafnum(&p, head), leaf);
        prop_assert_eq!(cm.leaf_contents(leaf), first);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 3. Impact distance is independent of the trace length
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn impact_distance_converges(
        x in 8.0f32..56.0,
        y in 8.0f32..56.0,
        z in 80.0f32..200.0,
        short in 8.0f32..24.0,
        long in 100.0f32..4000.0,
    ) {
        let cm = &*MAP;
        let head = cm.world_model().head_node;
        let start = [x, y, z];

        // both ends lie below the top of the box at z = 64
        let a = cm.box_trace(&start, &[x, y, 64.0 - short], &[0.0; 3], &[0.0; 3], head, MASK_SOLID);
        let b = cm.box_trace(&start, &[x, y, 64.0 - long], &[0.0; 3], &[0.0; 3], head, MASK_SOLID);

        prop_assert!(a.fraction < 1.0 && b.fraction < 1.0);
        let dist_a = a.fraction * (z - 64.0 + short);
        let dist_b = b.fraction * (z - 64.0 + long);
        prop_assert!((dist_a - dist_b).abs() < 0.01, "{} vs {}", dist_a, dist_b);
        prop_assert!((a.end[2] - b.end[2]).abs() < 0.01);
        prop_assert!(a.end[2] >= 64.0);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 4. Zero length traces
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn position_test_matches_containment(p in point_strategy(), (mins, maxs) in bounds_strategy()) {
        let cm = &*MAP;
        prop_assume!(!grazes_brush(cm, &p, &mins, &maxs));

        let head = cm.world_model().head_node;
        let trace = cm.box_trace(&p, &p, &mins, &maxs, head, MASK_SOLID);

        prop_assert_eq!(trace.all_solid, box_in_solid(cm, &p, &mins, &maxs));
        prop_assert_eq!(trace.start_solid, trace.all_solid);
        prop_assert_eq!(trace.end, p);
        prop_assert_eq!(trace.fraction, if trace.all_solid { 0.0 } else { 1.0 });
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 5. Recentering
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn recentering_is_invisible(
        start in whole_point_strategy(),
        end in whole_point_strategy(),
        (mins, maxs) in bounds_strategy(),
    ) {
        let cm = &*MAP;
        let head = cm.world_model().head_node;

        let center: Vec3 = std::array::from_fn(|i| (mins[i] + maxs[i]) * 0.5);
        let start2: Vec3 = std::array::from_fn(|i| start[i] + center[i]);
        let end2: Vec3 = std::array::from_fn(|i| end[i] + center[i]);
        let mins2 = vector_subtract(&mins, &center);
        let maxs2 = vector_subtract(&maxs, &center);

        let a = cm.box_trace(&start, &end, &mins, &maxs, head, MASK_SOLID);
        let b = cm.box_trace(&start2, &end2, &mins2, &maxs2, head, MASK_SOLID);

        prop_assert_eq!(a.fraction, b.fraction);
        prop_assert_eq!(a.start_solid, b.start_solid);
        prop_assert_eq!(a.all_solid, b.all_solid);
        if a.fraction < 1.0 && !a.all_solid {
            prop_assert_eq!(a.plane.normal, b.plane.normal);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 6. Box hulls
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn box_hulls_are_independent(
        (mins_a, maxs_a) in bounds_strategy(),
        offset in whole_point_strategy(),
        p in point_strategy(),
    ) {
        let mins_b: Vec3 = std::array::from_fn(|i| mins_a[i] + offset[i]);
        let maxs_b: Vec3 = std::array::from_fn(|i| maxs_a[i] + offset[i]);
        prop_assume!((0..3).all(|i| mins_a[i] < maxs_a[i]));

        let inside = |p: &Vec3, mins: &Vec3, maxs: &Vec3| (0..3).all(|i| p[i] > mins[i] && p[i] < maxs[i]);
        let on_face = |p: &Vec3, mins: &Vec3, maxs: &Vec3| (0..3).any(|i| near(p[i], mins[i]) || near(p[i], maxs[i]));
        prop_assume!(!on_face(&p, &mins_a, &maxs_a) && !on_face(&p, &mins_b, &maxs_b));

        let mut first = BoxHull::new(&mins_a, &maxs_a, Contents::MONSTER);
        let first_contents = first.point_contents(&p);
        let first_trace = first.box_trace(&p, &[p[0], p[1], p[2] - 512.0], &[0.0; 3], &[0.0; 3], Contents::MONSTER);

        let second = BoxHull::new(&mins_b, &maxs_b, Contents::SOLID);
        prop_assert_eq!(
            second.point_contents(&p),
            if inside(&p, &mins_b, &maxs_b) { Contents::SOLID } else { Contents::empty() }
        );

        // the first hull is unchanged by the second
        prop_assert_eq!(first.point_contents(&p), first_contents);
        let again = first.box_trace(&p, &[p[0], p[1], p[2] - 512.0], &[0.0; 3], &[0.0; 3], Contents::MONSTER);
        prop_assert_eq!(again, first_trace);

        // and re-targeting it behaves like a fresh hull
        first.set(&mins_b, &maxs_b, Contents::SOLID);
        prop_assert_eq!(first.point_contents(&p), second.point_contents(&p));
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Scenarios
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn scenario_point_trace_onto_box() {
    let cm = &*MAP;
    let head = cm.world_model().head_node;
    let trace = cm.box_trace(&[32.0, 32.0, 100.0], &[32.0, 32.0, -100.0], &[0.0; 3], &[0.0; 3], head, MASK_SOLID);
    assert!((trace.fraction - 0.18).abs() < 0.001, "fraction {}", trace.fraction);
    assert_eq!(trace.plane.normal, [0.0, 0.0, 1.0]);
}

#[test]
fn scenario_trace_inside_box() {
    let cm = &*MAP;
    let head = cm.world_model().head_node;
    let trace = cm.box_trace(&[10.0; 3], &[20.0; 3], &[0.0; 3], &[0.0; 3], head, MASK_SOLID);
    assert!(trace.all_solid);
    assert_eq!(trace.fraction, 0.0);
}

#[test]
fn scenario_trace_above_map() {
    let cm = &*MAP;
    let head = cm.world_model().head_node;
    let end = [900.0, -300.0, 1000.0];
    let trace = cm.box_trace(&[-900.0, 300.0, 1000.0], &end, &[-16.0; 3], &[16.0; 3], head, MASK_SOLID);
    assert_eq!(trace.fraction, 1.0);
    assert_eq!(trace.end, end);
}
