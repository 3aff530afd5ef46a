//! Small indexed polygon meshes.
//!
//! Used as the working structure for merging coplanar interfaces and as the
//! output of the convex hull.

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adjacency::{edge_key, face_edges};
use crate::error::{AssemblyError, AssemblyResult};
use crate::polygon::{newell_normal, polygon_area, polygon_centroid, polygon_normal};

/// An indexed mesh of polygonal faces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolyMesh {
    pub vertices: Vec<Point3<f64>>,

    /// Faces as loops of vertex indices.
    pub faces: Vec<Vec<u32>>,
}

fn pos_to_cell(p: &Point3<f64>, cell_size: f64) -> (i64, i64, i64) {
    (
        (p.x / cell_size).floor() as i64,
        (p.y / cell_size).floor() as i64,
        (p.z / cell_size).floor() as i64,
    )
}

impl PolyMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mesh with one face per polygon, welding corners closer than
    /// `weld_tolerance` into shared vertices.
    ///
    /// Vertices keep the position of the first corner that created them.
    /// Repeated consecutive indices produced by welding are collapsed.
    ///
    /// # Errors
    /// [`AssemblyError::GeometricDegeneracy`] if a polygon collapses to fewer
    /// than three distinct vertices, or if a corner is not finite.
    pub fn from_polygons(
        polygons: &[Vec<Point3<f64>>],
        weld_tolerance: f64,
    ) -> AssemblyResult<Self> {
        let cell_size = (weld_tolerance * 2.0).max(f64::MIN_POSITIVE);
        let mut spatial_hash: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
        let mut mesh = Self::new();
        let mut welded = 0usize;

        for (poly_idx, polygon) in polygons.iter().enumerate() {
            let mut face: Vec<u32> = Vec::with_capacity(polygon.len());

            for p in polygon {
                if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
                    return Err(AssemblyError::degenerate(format!(
                        "polygon {} has a non-finite corner",
                        poly_idx
                    )));
                }

                let cell = pos_to_cell(p, cell_size);
                let mut found = None;
                'search: for dx in -1..=1 {
                    for dy in -1..=1 {
                        for dz in -1..=1 {
                            let neighbor_cell = (cell.0 + dx, cell.1 + dy, cell.2 + dz);
                            if let Some(candidates) = spatial_hash.get(&neighbor_cell) {
                                for &idx in candidates {
                                    if (mesh.vertices[idx as usize] - p).norm() <= weld_tolerance {
                                        found = Some(idx);
                                        break 'search;
                                    }
                                }
                            }
                        }
                    }
                }

                let idx = match found {
                    Some(idx) => {
                        welded += 1;
                        idx
                    }
                    None => {
                        let idx = mesh.vertices.len() as u32;
                        mesh.vertices.push(*p);
                        spatial_hash.entry(cell).or_default().push(idx);
                        idx
                    }
                };

                if face.last() != Some(&idx) {
                    face.push(idx);
                }
            }

            while face.len() > 1 && face.first() == face.last() {
                face.pop();
            }

            let mut distinct = face.clone();
            distinct.sort_unstable();
            distinct.dedup();
            if distinct.len() < 3 {
                return Err(AssemblyError::degenerate(format!(
                    "polygon {} collapses to {} vertices after welding",
                    poly_idx,
                    distinct.len()
                )));
            }

            mesh.faces.push(face);
        }

        debug!(
            "Built polygon mesh: {} faces, {} vertices ({} corners welded)",
            mesh.faces.len(),
            mesh.vertices.len(),
            welded
        );

        Ok(mesh)
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn face_coordinates(&self, face: usize) -> Vec<Point3<f64>> {
        self.faces
            .get(face)
            .map(|f| f.iter().map(|&v| self.vertices[v as usize]).collect())
            .unwrap_or_default()
    }

    /// Unit normal of a face, `None` if it is degenerate.
    pub fn face_normal(&self, face: usize) -> Option<Vector3<f64>> {
        polygon_normal(&self.face_coordinates(face))
    }

    pub fn face_area(&self, face: usize) -> f64 {
        polygon_area(&self.face_coordinates(face))
    }

    /// Area centroid of a face.
    pub fn face_centroid(&self, face: usize) -> Point3<f64> {
        polygon_centroid(&self.face_coordinates(face))
    }

    /// Merge face `g` into face `f` across their shared edges.
    ///
    /// Both faces must be wound consistently, so that shared edges run in
    /// opposite directions. The union boundary replaces `f` and `g` is removed,
    /// shifting the indices of later faces down by one.
    ///
    /// Returns `false` and leaves the mesh unchanged when the faces share no
    /// edge or when the union would not be a single simple loop (a hole or a
    /// pinch vertex).
    pub fn merge_faces(&mut self, f: usize, g: usize) -> bool {
        if f == g || f >= self.faces.len() || g >= self.faces.len() {
            return false;
        }

        let f_edges: Vec<(u32, u32)> = face_edges(&self.faces[f]).collect();
        let g_edges: Vec<(u32, u32)> = face_edges(&self.faces[g]).collect();

        let mut shared = 0usize;
        let mut remaining: Vec<(u32, u32)> = Vec::with_capacity(f_edges.len() + g_edges.len());
        for &(a, b) in &f_edges {
            if g_edges.contains(&(b, a)) {
                shared += 1;
            } else {
                remaining.push((a, b));
            }
        }
        for &(a, b) in &g_edges {
            if !f_edges.contains(&(b, a)) {
                remaining.push((a, b));
            }
        }

        if shared == 0 || remaining.len() < 3 {
            return false;
        }

        let mut successor: HashMap<u32, u32> = HashMap::with_capacity(remaining.len());
        for &(a, b) in &remaining {
            if successor.insert(a, b).is_some() {
                // Two outgoing edges: the union pinches at `a`
                return false;
            }
        }

        let start = remaining[0].0;
        let mut merged = Vec::with_capacity(remaining.len());
        let mut current = start;
        loop {
            merged.push(current);
            let Some(&next) = successor.get(&current) else {
                return false;
            };
            current = next;
            if current == start || merged.len() > remaining.len() {
                break;
            }
        }

        if current != start || merged.len() != remaining.len() {
            return false;
        }

        self.faces[f] = merged;
        self.faces.remove(g);
        true
    }

    /// Signed volume enclosed by the faces; positive for outward winding.
    pub fn signed_volume(&self) -> f64 {
        let mut six_v = 0.0;
        for face in self.faces.iter().filter(|f| f.len() >= 3) {
            let p0 = self.vertices[face[0] as usize].coords;
            for i in 1..face.len() - 1 {
                let p1 = self.vertices[face[i] as usize].coords;
                let p2 = self.vertices[face[i + 1] as usize].coords;
                six_v += p0.dot(&p1.cross(&p2));
            }
        }
        six_v / 6.0
    }

    /// Reverse the loop of every face.
    pub fn flip(&mut self) {
        for face in &mut self.faces {
            face.reverse();
        }
    }

    /// Sum of the area vectors of all faces (zero for a closed mesh).
    pub fn total_area_vector(&self) -> Vector3<f64> {
        (0..self.faces.len())
            .map(|f| newell_normal(&self.face_coordinates(f)) * 0.5)
            .sum()
    }

    /// Number of distinct undirected edges.
    pub fn edge_count(&self) -> usize {
        let mut edges: Vec<(u32, u32)> = self
            .faces
            .iter()
            .flat_map(|f| face_edges(f).map(|(a, b)| edge_key(a, b)))
            .collect();
        edges.sort_unstable();
        edges.dedup();
        edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(x0: f64, y0: f64) -> Vec<Point3<f64>> {
        vec![
            Point3::new(x0, y0, 0.0),
            Point3::new(x0 + 1.0, y0, 0.0),
            Point3::new(x0 + 1.0, y0 + 1.0, 0.0),
            Point3::new(x0, y0 + 1.0, 0.0),
        ]
    }

    #[test]
    fn test_from_polygons_welds_shared_corners() {
        let mut b = square(1.0, 0.0);
        b[0].x += 1e-9;
        let mesh = PolyMesh::from_polygons(&[square(0.0, 0.0), b], 1e-6).unwrap();
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.edge_count(), 7);
    }

    #[test]
    fn test_from_polygons_rejects_collapsed() {
        let sliver = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1e-9, 0.0),
        ];
        assert!(matches!(
            PolyMesh::from_polygons(&[sliver], 1e-6),
            Err(AssemblyError::GeometricDegeneracy { .. })
        ));
    }

    #[test]
    fn test_merge_two_squares() {
        let mut mesh = PolyMesh::from_polygons(&[square(0.0, 0.0), square(1.0, 0.0)], 1e-6).unwrap();
        assert!(mesh.merge_faces(0, 1));
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.faces[0].len(), 6);
        assert_relative_eq!(mesh.face_area(0), 2.0, epsilon = 1e-12);
        assert_relative_eq!(mesh.face_centroid(0), Point3::new(1.0, 0.5, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_merge_requires_shared_edge() {
        let mut mesh = PolyMesh::from_polygons(&[square(0.0, 0.0), square(1.0, 1.0)], 1e-6).unwrap();
        // Touching at a single corner only
        assert!(!mesh.merge_faces(0, 1));
        assert_eq!(mesh.face_count(), 2);
    }

    #[test]
    fn test_merge_refuses_hole() {
        // Ring of four squares around the unit square at (1, 1), merged into
        // a U first; closing the ring would enclose a hole
        let polygons = vec![
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(3.0, 0.0, 0.0),
                Point3::new(3.0, 1.0, 0.0),
                Point3::new(2.0, 1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![
                Point3::new(2.0, 1.0, 0.0),
                Point3::new(3.0, 1.0, 0.0),
                Point3::new(3.0, 3.0, 0.0),
                Point3::new(2.0, 3.0, 0.0),
                Point3::new(2.0, 2.0, 0.0),
            ],
            vec![
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(1.0, 2.0, 0.0),
                Point3::new(2.0, 2.0, 0.0),
                Point3::new(2.0, 3.0, 0.0),
                Point3::new(0.0, 3.0, 0.0),
            ],
        ];
        let mut mesh = PolyMesh::from_polygons(&polygons, 1e-6).unwrap();
        assert!(mesh.merge_faces(0, 1));
        assert_eq!(mesh.face_count(), 2);
        assert!(!mesh.merge_faces(0, 1));
        assert_eq!(mesh.face_count(), 2);
    }

    #[test]
    fn test_signed_volume_and_flip() {
        let cube = crate::Block::cuboid(Point3::origin(), Point3::new(1.0, 2.0, 3.0));
        let mut mesh = PolyMesh {
            vertices: cube.vertices.clone(),
            faces: cube.faces.clone(),
        };
        assert_relative_eq!(mesh.signed_volume(), 6.0, epsilon = 1e-12);
        assert_relative_eq!(mesh.total_area_vector().norm(), 0.0, epsilon = 1e-12);
        mesh.flip();
        assert_relative_eq!(mesh.signed_volume(), -6.0, epsilon = 1e-12);
    }
}
