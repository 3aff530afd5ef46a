//! Planar polygon geometry.
//!
//! Two groups of helpers live here:
//!
//! - **2D**: polygons expressed in a local face frame, used by interface
//!   detection. Boolean intersection is delegated to [`geo`]'s overlay engine;
//!   inputs are checked for simplicity first so that invalid polygons are
//!   reported as [`AssemblyError::GeometricDegeneracy`] instead of producing
//!   garbage.
//! - **3D**: area, normal, centroid and best-fit plane of (nearly) planar
//!   point loops, used for interfaces and merging.

use geo::{Area, BooleanOps, Coord, Intersects, LineString, Polygon};
use nalgebra::{Matrix3, Point2, Point3, SymmetricEigen, Vector3};

use crate::error::{AssemblyError, AssemblyResult};

/// Relative tolerance for 2D orientation tests.
const ORIENT_EPSILON: f64 = 1e-12;

// ============================================================================
// 2D polygons
// ============================================================================

/// Signed area of a 2D polygon (positive for counter-clockwise loops).
pub fn signed_area_2d(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        twice += a.x * b.y - b.x * a.y;
    }
    twice * 0.5
}

/// Unsigned area of a 2D polygon.
#[inline]
pub fn polygon_area_2d(points: &[Point2<f64>]) -> f64 {
    signed_area_2d(points).abs()
}

/// Check that a 2D polygon is simple: finite coordinates, at least three
/// distinct vertices, and no two non-adjacent edges touching.
pub fn is_simple(points: &[Point2<f64>]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return false;
    }

    let scale = points
        .iter()
        .fold(0.0_f64, |acc, p| acc.max(p.x.abs()).max(p.y.abs()))
        .max(1.0);
    let eps = ORIENT_EPSILON * scale * scale;

    for i in 0..n {
        if (points[(i + 1) % n] - points[i]).norm_squared() <= eps {
            return false;
        }
    }

    for i in 0..n {
        let a0 = points[i];
        let a1 = points[(i + 1) % n];
        for j in (i + 1)..n {
            // Adjacent edges share a vertex by construction
            if j == i + 1 || (i == 0 && j == n - 1) {
                continue;
            }
            let b0 = points[j];
            let b1 = points[(j + 1) % n];
            if segments_touch(&a0, &a1, &b0, &b1, eps) {
                return false;
            }
        }
    }

    true
}

fn orient(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn within_box(a: &Point2<f64>, b: &Point2<f64>, p: &Point2<f64>) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Whether closed segments `a0-a1` and `b0-b1` share at least one point.
fn segments_touch(
    a0: &Point2<f64>,
    a1: &Point2<f64>,
    b0: &Point2<f64>,
    b1: &Point2<f64>,
    eps: f64,
) -> bool {
    let o1 = orient(a0, a1, b0);
    let o2 = orient(a0, a1, b1);
    let o3 = orient(b0, b1, a0);
    let o4 = orient(b0, b1, a1);

    if ((o1 > eps && o2 < -eps) || (o1 < -eps && o2 > eps))
        && ((o3 > eps && o4 < -eps) || (o3 < -eps && o4 > eps))
    {
        return true;
    }

    (o1.abs() <= eps && within_box(a0, a1, b0))
        || (o2.abs() <= eps && within_box(a0, a1, b1))
        || (o3.abs() <= eps && within_box(b0, b1, a0))
        || (o4.abs() <= eps && within_box(b0, b1, a1))
}

fn to_geo(points: &[Point2<f64>]) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = points.iter().map(|p| Coord { x: p.x, y: p.y }).collect();
    Polygon::new(LineString::new(coords), Vec::new())
}

/// Boolean intersection of two simple 2D polygons.
///
/// Returns the boundary loops of the intersection region, without a repeated
/// closing vertex. The result is empty when the polygons do not intersect or
/// only touch along edges/vertices. The intersection of two simple polygons
/// never has holes, so each loop is a complete region.
///
/// # Errors
/// [`AssemblyError::GeometricDegeneracy`] if either input is not a simple polygon.
pub fn intersect(a: &[Point2<f64>], b: &[Point2<f64>]) -> AssemblyResult<Vec<Vec<Point2<f64>>>> {
    if !is_simple(a) {
        return Err(AssemblyError::degenerate(format!(
            "base polygon with {} vertices is not simple",
            a.len()
        )));
    }
    if !is_simple(b) {
        return Err(AssemblyError::degenerate(format!(
            "test polygon with {} vertices is not simple",
            b.len()
        )));
    }

    let pa = to_geo(a);
    let pb = to_geo(b);

    if !pa.intersects(&pb) {
        return Ok(Vec::new());
    }

    let result = pa.intersection(&pb);

    let loops = result
        .0
        .iter()
        .filter(|polygon| polygon.unsigned_area() > 0.0)
        .map(|polygon| {
            let mut ring: Vec<Point2<f64>> = polygon
                .exterior()
                .coords()
                .map(|c| Point2::new(c.x, c.y))
                .collect();
            if ring.len() > 1 && ring.first() == ring.last() {
                ring.pop();
            }
            ring
        })
        .filter(|ring| ring.len() >= 3)
        .collect();

    Ok(loops)
}

// ============================================================================
// 3D polygons
// ============================================================================

/// Newell normal of a polygon loop. Its length is twice the polygon area.
pub fn newell_normal(points: &[Point3<f64>]) -> Vector3<f64> {
    let n = points.len();
    let mut normal = Vector3::zeros();
    for i in 0..n {
        let a = &points[i];
        let b = &points[(i + 1) % n];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    normal
}

/// Unit normal of a polygon loop, or `None` for degenerate loops.
pub fn polygon_normal(points: &[Point3<f64>]) -> Option<Vector3<f64>> {
    let normal = newell_normal(points);
    let len_sq = normal.norm_squared();
    if len_sq > f64::EPSILON * f64::EPSILON {
        Some(normal / len_sq.sqrt())
    } else {
        None
    }
}

/// Area of a planar polygon loop.
#[inline]
pub fn polygon_area(points: &[Point3<f64>]) -> f64 {
    newell_normal(points).norm() * 0.5
}

/// Arithmetic mean of a set of points.
pub fn centroid_points(points: &[Point3<f64>]) -> Point3<f64> {
    if points.is_empty() {
        return Point3::origin();
    }
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum / points.len() as f64)
}

/// Area-weighted centroid of a planar polygon loop.
///
/// Falls back to the vertex average for degenerate loops.
pub fn polygon_centroid(points: &[Point3<f64>]) -> Point3<f64> {
    let center = centroid_points(points);
    let Some(normal) = polygon_normal(points) else {
        return center;
    };

    let n = points.len();
    let mut weighted = Vector3::zeros();
    let mut total = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        let area = 0.5 * (a - center).cross(&(b - center)).dot(&normal);
        weighted += (center.coords + a.coords + b.coords) / 3.0 * area;
        total += area;
    }

    if total.abs() > f64::EPSILON {
        Point3::from(weighted / total)
    } else {
        center
    }
}

/// Whether `b` lies on the segment `a-c`, within `tol`.
pub fn is_point_on_segment(b: &Point3<f64>, a: &Point3<f64>, c: &Point3<f64>, tol: f64) -> bool {
    let ac = c - a;
    let len_sq = ac.norm_squared();
    if len_sq <= tol * tol {
        return (b - a).norm() <= tol;
    }
    let t = (b - a).dot(&ac) / len_sq;
    if t < 0.0 || t > 1.0 {
        return false;
    }
    let foot = a + ac * t;
    (b - foot).norm() <= tol
}

/// Drop boundary points that lie on the segment between their two neighbours.
pub fn remove_collinear(points: &[Point3<f64>], tol: f64) -> Vec<Point3<f64>> {
    let mut loop_points = points.to_vec();
    loop {
        let n = loop_points.len();
        if n < 3 {
            return loop_points;
        }
        let redundant = (0..n).find(|&i| {
            let prev = &loop_points[(i + n - 1) % n];
            let next = &loop_points[(i + 1) % n];
            is_point_on_segment(&loop_points[i], prev, next, tol)
        });
        match redundant {
            Some(i) => {
                loop_points.remove(i);
            }
            None => return loop_points,
        }
    }
}

/// Best-fit plane through a point set as `(centroid, unit normal)`.
///
/// The normal is the eigenvector of the covariance matrix with the smallest
/// eigenvalue. Returns `None` for fewer than three points.
pub fn bestfit_plane(points: &[Point3<f64>]) -> Option<(Point3<f64>, Vector3<f64>)> {
    if points.len() < 3 {
        return None;
    }
    let center = centroid_points(points);
    let mut covariance = Matrix3::zeros();
    for p in points {
        let d = p - center;
        covariance += d * d.transpose();
    }

    let eigen = SymmetricEigen::new(covariance);
    let (min_idx, _) = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let normal = eigen.eigenvectors.column(min_idx).into_owned();
    let len = normal.norm();
    if len > f64::EPSILON {
        Some((center, normal / len))
    } else {
        None
    }
}

/// Largest distance of any point to the best-fit plane of the set.
pub fn max_plane_deviation(points: &[Point3<f64>]) -> f64 {
    match bestfit_plane(points) {
        Some((center, normal)) => points
            .iter()
            .map(|p| (p - center).dot(&normal).abs())
            .fold(0.0, f64::max),
        None => 0.0,
    }
}

/// Whether all points lie within `tol` of a common plane.
#[inline]
pub fn is_coplanar(points: &[Point3<f64>], tol: f64) -> bool {
    max_plane_deviation(points) <= tol
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Point2<f64>> {
        vec![
            Point2::new(x0, y0),
            Point2::new(x0 + size, y0),
            Point2::new(x0 + size, y0 + size),
            Point2::new(x0, y0 + size),
        ]
    }

    #[test]
    fn test_signed_area_orientation() {
        let ccw = square(0.0, 0.0, 2.0);
        let mut cw = ccw.clone();
        cw.reverse();
        assert_relative_eq!(signed_area_2d(&ccw), 4.0);
        assert_relative_eq!(signed_area_2d(&cw), -4.0);
        assert_relative_eq!(polygon_area_2d(&cw), 4.0);
    }

    #[test]
    fn test_bowtie_is_not_simple() {
        let bowtie = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        ];
        assert!(!is_simple(&bowtie));
        assert!(is_simple(&square(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_repeated_vertex_is_not_simple() {
        let mut points = square(0.0, 0.0, 1.0);
        points.insert(1, Point2::new(0.0, 0.0));
        assert!(!is_simple(&points));
    }

    #[test]
    fn test_collinear_vertex_is_simple() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        assert!(is_simple(&points));
    }

    #[test]
    fn test_intersect_overlapping_squares() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(0.5, 0.5, 1.0);
        let loops = intersect(&a, &b).unwrap();
        assert_eq!(loops.len(), 1);
        assert_relative_eq!(polygon_area_2d(&loops[0]), 0.25, epsilon = 1e-12);
        assert_ne!(loops[0].first(), loops[0].last());
    }

    #[test]
    fn test_intersect_disjoint_and_touching() {
        let a = square(0.0, 0.0, 1.0);
        assert!(intersect(&a, &square(5.0, 5.0, 1.0)).unwrap().is_empty());
        // Shared edge only
        assert!(intersect(&a, &square(1.0, 0.0, 1.0)).unwrap().is_empty());
    }

    #[test]
    fn test_intersect_clockwise_input() {
        let a = square(0.0, 0.0, 2.0);
        let mut b = square(1.0, 0.0, 2.0);
        b.reverse();
        let loops = intersect(&a, &b).unwrap();
        assert_eq!(loops.len(), 1);
        assert_relative_eq!(polygon_area_2d(&loops[0]), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_intersect_non_convex() {
        // U shape: the crossbar square overlaps both arms but not the notch
        let u = vec![
            Point2::new(0.0, 0.0),
            Point2::new(3.0, 0.0),
            Point2::new(3.0, 3.0),
            Point2::new(2.0, 3.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 3.0),
            Point2::new(0.0, 3.0),
        ];
        let bar = vec![
            Point2::new(-1.0, 2.0),
            Point2::new(4.0, 2.0),
            Point2::new(4.0, 2.5),
            Point2::new(-1.0, 2.5),
        ];
        let loops = intersect(&u, &bar).unwrap();
        assert_eq!(loops.len(), 2);
        let total: f64 = loops.iter().map(|l| polygon_area_2d(l)).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_intersect_rejects_invalid_input() {
        let bowtie = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        ];
        let err = intersect(&bowtie, &square(0.0, 0.0, 1.0)).unwrap_err();
        assert!(matches!(err, AssemblyError::GeometricDegeneracy { .. }));

        let nan = vec![
            Point2::new(0.0, 0.0),
            Point2::new(f64::NAN, 0.0),
            Point2::new(0.0, 1.0),
        ];
        assert!(intersect(&square(0.0, 0.0, 1.0), &nan).is_err());
    }

    #[test]
    fn test_polygon_area_and_normal() {
        let points = vec![
            Point3::new(0.0, 0.0, 2.0),
            Point3::new(2.0, 0.0, 2.0),
            Point3::new(2.0, 3.0, 2.0),
            Point3::new(0.0, 3.0, 2.0),
        ];
        assert_relative_eq!(polygon_area(&points), 6.0);
        let n = polygon_normal(&points).unwrap();
        assert_relative_eq!(n, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_polygon_centroid_is_area_weighted() {
        // Extra vertices crowded on one side must not pull the centroid
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.5, 0.0, 0.0),
            Point3::new(0.6, 0.0, 0.0),
            Point3::new(0.7, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ];
        let c = polygon_centroid(&points);
        assert_relative_eq!(c, Point3::new(1.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_remove_collinear() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let cleaned = remove_collinear(&points, 1e-9);
        assert_eq!(cleaned.len(), 4);
        assert_relative_eq!(polygon_area(&cleaned), 2.0);
    }

    #[test]
    fn test_coplanarity() {
        let mut points = vec![
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        ];
        assert!(is_coplanar(&points, 1e-9));
        points.push(Point3::new(0.5, 0.5, 1.1));
        assert!(!is_coplanar(&points, 1e-3));
        assert!(is_coplanar(&points, 0.1));
    }
}
