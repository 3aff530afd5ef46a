//! 3D convex hull of point sets and assemblies.
//!
//! Incremental beneath-beyond construction: start from a tetrahedron of
//! extreme points, then insert the remaining points one at a time, replacing
//! the faces each point can see by a fan from the point to the horizon.

use hashbrown::HashSet;
use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::assembly::{Assembly, NodeId};
use crate::error::{AssemblyError, AssemblyResult};
use crate::polymesh::PolyMesh;
use crate::winding::unify_cycles;

/// Relative tolerance of the visibility test.
const HULL_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
struct HullFace {
    v: [usize; 3],
    normal: Vector3<f64>,
    offset: f64,
}

impl HullFace {
    fn new(points: &[Point3<f64>], v: [usize; 3]) -> Self {
        let (a, b, c) = (points[v[0]], points[v[1]], points[v[2]]);
        let normal = (b - a)
            .cross(&(c - a))
            .try_normalize(f64::MIN_POSITIVE)
            .unwrap_or_else(Vector3::zeros);
        Self {
            v,
            normal,
            offset: normal.dot(&a.coords),
        }
    }

    /// Signed distance of a point above the face plane.
    #[inline]
    fn distance(&self, p: &Point3<f64>) -> f64 {
        self.normal.dot(&p.coords) - self.offset
    }

    fn flipped(&self, points: &[Point3<f64>]) -> Self {
        Self::new(points, [self.v[0], self.v[2], self.v[1]])
    }
}

/// Convex hull of a point set as a triangle mesh with outward winding.
///
/// Only points on the hull are kept, in their input order. Points lying on a
/// hull face (within a tolerance relative to the point spread) are usually
/// treated as interior.
///
/// # Errors
/// [`AssemblyError::GeometricDegeneracy`] for fewer than four points,
/// non-finite points, or points that are all coincident, collinear or coplanar.
pub fn convex_hull(points: &[Point3<f64>]) -> AssemblyResult<PolyMesh> {
    if points.len() < 4 {
        return Err(AssemblyError::degenerate(format!(
            "convex hull needs at least 4 points, got {}",
            points.len()
        )));
    }
    if points
        .iter()
        .any(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()))
    {
        return Err(AssemblyError::degenerate(
            "convex hull input contains non-finite points",
        ));
    }

    let (min, max) = points
        .iter()
        .fold((points[0], points[0]), |(lo, hi), p| (lo.inf(p), hi.sup(p)));
    let scale = (max - min).norm();
    let eps = HULL_EPSILON * scale.max(f64::MIN_POSITIVE);

    let simplex = initial_simplex(points, eps)?;
    let center = simplex_center(points, simplex);
    let mut faces = simplex_faces(points, simplex, &center);
    let mut alive = vec![true; faces.len()];

    // Far points first, so points on the hull surface are met after the
    // faces that contain them
    let mut order: Vec<(f64, usize)> = (0..points.len())
        .filter(|i| !simplex.contains(i))
        .map(|i| ((points[i] - center).norm_squared(), i))
        .collect();
    order.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

    for (_, idx) in order {
        let p = &points[idx];

        let visible: Vec<usize> = (0..faces.len())
            .filter(|&f| alive[f] && faces[f].distance(p) > eps)
            .collect();
        if visible.is_empty() {
            continue;
        }

        let visible_edges: HashSet<(usize, usize)> = visible
            .iter()
            .flat_map(|&f| {
                let [a, b, c] = faces[f].v;
                [(a, b), (b, c), (c, a)]
            })
            .collect();

        let mut horizon: Vec<(usize, usize)> = visible_edges
            .iter()
            .copied()
            .filter(|&(a, b)| !visible_edges.contains(&(b, a)))
            .collect();
        horizon.sort_unstable();

        for &f in &visible {
            alive[f] = false;
        }
        for (a, b) in horizon {
            faces.push(HullFace::new(points, [a, b, idx]));
            alive.push(true);
        }
    }

    // Keep only vertices referenced by live faces, in input order
    let mut used = vec![false; points.len()];
    for (face, _) in faces.iter().zip(&alive).filter(|(_, &a)| a) {
        for &v in &face.v {
            used[v] = true;
        }
    }
    let mut remap = vec![u32::MAX; points.len()];
    let mut vertices = Vec::new();
    for (i, p) in points.iter().enumerate() {
        if used[i] {
            remap[i] = vertices.len() as u32;
            vertices.push(*p);
        }
    }
    let faces: Vec<Vec<u32>> = faces
        .iter()
        .zip(&alive)
        .filter(|(_, &a)| a)
        .map(|(face, _)| face.v.iter().map(|&v| remap[v]).collect())
        .collect();

    debug!(
        "Convex hull: {} of {} points on hull, {} faces",
        vertices.len(),
        points.len(),
        faces.len()
    );

    Ok(PolyMesh { vertices, faces })
}

/// Four affinely independent extreme points.
fn initial_simplex(points: &[Point3<f64>], eps: f64) -> AssemblyResult<[usize; 4]> {
    let farthest = |score: &dyn Fn(&Point3<f64>) -> f64| -> (usize, f64) {
        points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, score(p)))
            .fold((0, f64::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            })
    };

    let (i0, _) = farthest(&|p: &Point3<f64>| -p.x);
    let p0 = points[i0];

    let (i1, d1) = farthest(&|p: &Point3<f64>| (p - p0).norm());
    if d1 <= eps {
        return Err(AssemblyError::degenerate("convex hull input points coincide"));
    }
    let axis = (points[i1] - p0) / d1;

    let (i2, d2) = farthest(&|p: &Point3<f64>| {
        let d = p - p0;
        (d - axis * d.dot(&axis)).norm()
    });
    if d2 <= eps {
        return Err(AssemblyError::degenerate("convex hull input points are collinear"));
    }

    let normal = (points[i1] - p0).cross(&(points[i2] - p0)).normalize();
    let (i3, d3) = farthest(&|p: &Point3<f64>| (p - p0).dot(&normal).abs());
    if d3 <= eps {
        return Err(AssemblyError::degenerate("convex hull input points are coplanar"));
    }

    Ok([i0, i1, i2, i3])
}

fn simplex_center(points: &[Point3<f64>], simplex: [usize; 4]) -> Point3<f64> {
    let sum = simplex
        .iter()
        .fold(Vector3::zeros(), |acc, &i| acc + points[i].coords);
    Point3::from(sum / 4.0)
}

/// Faces of the initial tetrahedron, wound outward.
fn simplex_faces(
    points: &[Point3<f64>],
    [a, b, c, d]: [usize; 4],
    center: &Point3<f64>,
) -> Vec<HullFace> {
    [[a, b, c], [a, b, d], [b, c, d], [c, a, d]]
        .into_iter()
        .map(|v| {
            let face = HullFace::new(points, v);
            if face.distance(center) > 0.0 {
                face.flipped(points)
            } else {
                face
            }
        })
        .collect()
}

/// Convex hull of the vertices of some or all blocks of an assembly.
///
/// With `unify`, face winding is propagated across the hull and oriented so
/// that the enclosed volume is positive.
///
/// # Errors
/// [`AssemblyError::Consistency`] for an unknown node id, or
/// [`AssemblyError::GeometricDegeneracy`] for degenerate input.
pub fn assembly_hull(
    assembly: &Assembly,
    keys: Option<&[NodeId]>,
    unify: bool,
) -> AssemblyResult<PolyMesh> {
    let mut points = Vec::new();
    match keys {
        Some(keys) => {
            for &id in keys {
                let block = assembly.block(id).ok_or_else(|| {
                    AssemblyError::consistency(format!("node {} does not exist", id))
                })?;
                points.extend_from_slice(&block.vertices);
            }
        }
        None => {
            for (_, block) in assembly.blocks() {
                points.extend_from_slice(&block.vertices);
            }
        }
    }

    let mut hull = convex_hull(&points)?;
    if unify {
        unify_cycles(&mut hull.faces)?;
        if hull.signed_volume() < 0.0 {
            hull.flip();
        }
    }
    Ok(hull)
}
