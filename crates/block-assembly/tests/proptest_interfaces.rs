//! Property-based tests for interface detection and merging.
//!
//! Run with: cargo test -p block-assembly --test proptest_interfaces

use block_assembly::polygon::{max_plane_deviation, polygon_area};
use block_assembly::{block_block_interfaces, Assembly, Block, InterfaceParams, MergeParams};
use nalgebra::{Point3, Rotation3, Vector3};
use proptest::prelude::*;

const TMAX: f64 = 1e-6;
const AMIN: f64 = 1e-2;

// =============================================================================
// Strategies
// =============================================================================

/// Horizontal offset of a brick resting on another, keeping some overlap.
fn arb_offset() -> impl Strategy<Value = (f64, f64)> {
    (-0.95..0.95f64, -0.95..0.95f64)
}

/// Brick dimensions.
fn arb_size() -> impl Strategy<Value = (f64, f64, f64)> {
    (0.5..2.0f64, 0.5..2.0f64, 0.2..1.0f64)
}

fn brick(origin: Point3<f64>, (sx, sy, sz): (f64, f64, f64)) -> Block {
    Block::cuboid(origin, origin + Vector3::new(sx, sy, sz))
}

/// Overlap area of two axis-aligned rectangles given as (x0, y0, x1, y1).
fn rect_overlap(a: [f64; 4], b: [f64; 4]) -> f64 {
    let w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    w * h
}

/// A `splits` x 1 x 1 box whose top is divided into unit squares. The long
/// side faces carry the split vertices so the block stays closed.
fn split_top_bar(splits: u32) -> Block {
    let n = splits;
    let front = |k: u32| 4 + k;
    let back = |k: u32| 5 + n + k;

    let mut vertices = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(n as f64, 0.0, 0.0),
        Point3::new(n as f64, 1.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    ];
    vertices.extend((0..=n).map(|k| Point3::new(k as f64, 0.0, 1.0)));
    vertices.extend((0..=n).map(|k| Point3::new(k as f64, 1.0, 1.0)));

    let mut faces = vec![vec![0, 3, 2, 1]];
    faces.extend((0..n).map(|k| vec![front(k), front(k + 1), back(k + 1), back(k)]));
    faces.push([0, 1].into_iter().chain((0..=n).rev().map(front)).collect());
    faces.push(vec![1, 2, back(n), front(n)]);
    faces.push([2, 3].into_iter().chain((0..=n).map(back)).collect());
    faces.push(vec![3, 0, front(0), back(0)]);

    Block::new(vertices, faces).unwrap()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A brick resting on another touches it in exactly their footprint overlap.
    #[test]
    fn stacked_bricks_touch_in_footprint_overlap(
        lower in arb_size(),
        upper in arb_size(),
        (dx, dy) in arb_offset(),
    ) {
        let a = brick(Point3::origin(), lower);
        let b = brick(Point3::new(dx, dy, lower.2), upper);
        let expected = rect_overlap(
            [0.0, 0.0, lower.0, lower.1],
            [dx, dy, dx + upper.0, dy + upper.1],
        );
        prop_assume!((expected - AMIN).abs() > 1e-6);

        let found = block_block_interfaces(&a, &b, TMAX, AMIN);
        if expected < AMIN {
            prop_assert!(found.is_empty());
        } else {
            prop_assert_eq!(found.len(), 1);
            prop_assert!((found[0].size - expected).abs() < 1e-9);
        }
    }

    /// Swapping the base block yields the same contact area and location.
    #[test]
    fn pair_order_does_not_matter(
        lower in arb_size(),
        upper in arb_size(),
        (dx, dy) in arb_offset(),
    ) {
        let a = brick(Point3::origin(), lower);
        let b = brick(Point3::new(dx, dy, lower.2), upper);

        let ab = block_block_interfaces(&a, &b, TMAX, AMIN);
        let ba = block_block_interfaces(&b, &a, TMAX, AMIN);
        prop_assert_eq!(ab.len(), ba.len());
        for (x, y) in ab.iter().zip(&ba) {
            prop_assert!((x.size - y.size).abs() < 1e-9);
            prop_assert!((x.centroid() - y.centroid()).norm() < 1e-9);
        }
    }

    /// Detected interfaces are planar, self-consistent and above threshold,
    /// however the assembly is oriented.
    #[test]
    fn interfaces_satisfy_invariants(
        offsets in prop::collection::vec(arb_offset(), 2..6),
        (rx, ry, rz) in (-3.0..3.0f64, -3.0..3.0f64, -3.0..3.0f64),
    ) {
        let mut assembly = Assembly::new();
        for (i, (dx, dy)) in offsets.iter().enumerate() {
            assembly.add_block(brick(Point3::new(*dx, *dy, i as f64), (1.0, 1.0, 1.0)), i == 0);
        }
        let rotation = Rotation3::from_euler_angles(rx, ry, rz);
        assembly.transform(&rotation.to_homogeneous());

        let params = InterfaceParams::new(4, TMAX, AMIN);
        assembly.detect_interfaces(&params).unwrap();

        for (_, edge) in assembly.edges() {
            prop_assert!(!edge.interfaces.is_empty());
            for interface in &edge.interfaces {
                let area = polygon_area(&interface.points);
                prop_assert!((area - interface.size).abs() <= 1e-9 * interface.size);
                prop_assert!(max_plane_deviation(&interface.points) <= TMAX);
                prop_assert!(interface.size >= AMIN);
            }
        }
    }

    /// Split contact patches under one bar merge into a single interface
    /// with the same total area.
    #[test]
    fn merge_preserves_total_area(splits in 2u32..6, (dx, dy) in (-0.4..0.4f64, -0.4..0.4f64)) {
        let mut assembly = Assembly::new();
        let base = assembly.add_block(split_top_bar(splits), true);
        let bar = assembly.add_block(
            Block::cuboid(
                Point3::new(dx, dy, 1.0),
                Point3::new(dx + splits as f64, dy + 1.0, 2.0),
            ),
            false,
        );
        assembly.detect_interfaces(&InterfaceParams::new(4, TMAX, AMIN)).unwrap();

        let before = assembly.interfaces(base, bar);
        prop_assert_eq!(before.len(), splits as usize);
        let total_before: f64 = before.iter().map(|i| i.size).sum();
        let expected = (splits as f64 - dx.abs()) * (1.0 - dy.abs());
        prop_assert!((total_before - expected).abs() < 1e-9);

        let stats = assembly.merge_coplanar_interfaces(&MergeParams::default()).unwrap();
        prop_assert_eq!(stats.edges_merged, 1);
        prop_assert_eq!(stats.edges_inconsistent, 0);

        let after = assembly.interfaces(base, bar);
        prop_assert_eq!(after.len(), 1);
        prop_assert!((after[0].size - expected).abs() < 1e-9);
        prop_assert!((after[0].area() - after[0].size).abs() <= 1e-9 * after[0].size);
    }
}
