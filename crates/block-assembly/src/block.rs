//! Polyhedral blocks.

use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{AssemblyError, AssemblyResult};
use crate::frame::Frame;
use crate::polygon::{centroid_points, newell_normal, polygon_area};

/// A rigid closed polyhedron.
///
/// Each face is an ordered loop of vertex indices wound counter-clockwise when
/// seen from outside, so its Newell normal points out of the block.
/// All derived quantities are computed from the current vertex positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBlock")]
pub struct Block {
    /// Vertex positions.
    pub vertices: Vec<Point3<f64>>,

    /// Polygonal faces as loops of vertex indices.
    pub faces: Vec<Vec<u32>>,
}

/// Unchecked serialized form of a [`Block`].
#[derive(Deserialize)]
struct RawBlock {
    vertices: Vec<Point3<f64>>,
    faces: Vec<Vec<u32>>,
}

impl TryFrom<RawBlock> for Block {
    type Error = AssemblyError;

    fn try_from(raw: RawBlock) -> AssemblyResult<Self> {
        Block::new(raw.vertices, raw.faces)
    }
}

impl Block {
    /// Create a block, checking that every face references at least three
    /// existing vertices.
    pub fn new(vertices: Vec<Point3<f64>>, faces: Vec<Vec<u32>>) -> AssemblyResult<Self> {
        if faces.is_empty() {
            return Err(AssemblyError::InvalidBlock {
                details: "block has no faces".to_string(),
            });
        }
        for (f, face) in faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(AssemblyError::InvalidBlock {
                    details: format!("face {} has {} vertices", f, face.len()),
                });
            }
            if let Some(&bad) = face.iter().find(|&&v| v as usize >= vertices.len()) {
                return Err(AssemblyError::InvalidBlock {
                    details: format!(
                        "face {} references vertex {} but block has {} vertices",
                        f,
                        bad,
                        vertices.len()
                    ),
                });
            }
        }
        Ok(Self { vertices, faces })
    }

    /// Axis-aligned box between two corners, with six outward quads.
    ///
    /// Faces are ordered bottom, top, front (-Y), right (+X), back (+Y), left (-X).
    pub fn cuboid(min: Point3<f64>, max: Point3<f64>) -> Self {
        let vertices = vec![
            Point3::new(min.x, min.y, min.z),
            Point3::new(max.x, min.y, min.z),
            Point3::new(max.x, max.y, min.z),
            Point3::new(min.x, max.y, min.z),
            Point3::new(min.x, min.y, max.z),
            Point3::new(max.x, min.y, max.z),
            Point3::new(max.x, max.y, max.z),
            Point3::new(min.x, max.y, max.z),
        ];
        let faces = vec![
            vec![0, 3, 2, 1],
            vec![4, 5, 6, 7],
            vec![0, 1, 5, 4],
            vec![1, 2, 6, 5],
            vec![2, 3, 7, 6],
            vec![3, 0, 4, 7],
        ];
        Self { vertices, faces }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Vertex indices of a face.
    pub fn face_vertices(&self, face: usize) -> AssemblyResult<&[u32]> {
        self.faces
            .get(face)
            .map(|f| f.as_slice())
            .ok_or_else(|| AssemblyError::InvalidBlock {
                details: format!("face {} out of range ({} faces)", face, self.faces.len()),
            })
    }

    /// Vertex positions of a face, in loop order.
    pub fn face_coordinates(&self, face: usize) -> AssemblyResult<Vec<Point3<f64>>> {
        self.face_vertices(face)?
            .iter()
            .map(|&v| {
                self.vertices
                    .get(v as usize)
                    .copied()
                    .ok_or_else(|| AssemblyError::InvalidBlock {
                        details: format!("face {} references missing vertex {}", face, v),
                    })
            })
            .collect()
    }

    /// Outward unit normal of a face.
    ///
    /// # Errors
    /// [`AssemblyError::GeometricDegeneracy`] if the face has zero area.
    pub fn face_normal(&self, face: usize) -> AssemblyResult<Vector3<f64>> {
        let coords = self.face_coordinates(face)?;
        newell_normal(&coords)
            .try_normalize(f64::EPSILON)
            .ok_or_else(|| AssemblyError::degenerate(format!("face {} has a zero normal", face)))
    }

    /// Average of the face vertices.
    pub fn face_center(&self, face: usize) -> AssemblyResult<Point3<f64>> {
        Ok(centroid_points(&self.face_coordinates(face)?))
    }

    pub fn face_area(&self, face: usize) -> AssemblyResult<f64> {
        Ok(polygon_area(&self.face_coordinates(face)?))
    }

    /// Local frame of a face.
    ///
    /// The origin is the face center, the z-axis the outward normal and the
    /// x-axis the direction of the first face edge projected into the face plane.
    ///
    /// # Errors
    /// [`AssemblyError::GeometricDegeneracy`] for a zero-area face or when the
    /// first edge has no in-plane component.
    pub fn frame(&self, face: usize) -> AssemblyResult<Frame> {
        let coords = self.face_coordinates(face)?;
        if coords.len() < 3 {
            return Err(AssemblyError::degenerate(format!(
                "face {} has only {} vertices",
                face,
                coords.len()
            )));
        }
        let w = newell_normal(&coords)
            .try_normalize(f64::EPSILON)
            .ok_or_else(|| AssemblyError::degenerate(format!("face {} has a zero normal", face)))?;

        let edge = coords[1] - coords[0];
        let u = (edge - w * edge.dot(&w))
            .try_normalize(f64::EPSILON)
            .ok_or_else(|| {
                AssemblyError::degenerate(format!("face {} has a degenerate first edge", face))
            })?;

        Ok(Frame {
            point: centroid_points(&coords),
            xaxis: u,
            yaxis: w.cross(&u),
        })
    }

    /// Frames of all non-degenerate faces, with their face index.
    pub fn frames(&self) -> Vec<(usize, Frame)> {
        (0..self.faces.len())
            .filter_map(|f| self.frame(f).ok().map(|frame| (f, frame)))
            .collect()
    }

    /// Index of the face whose normal points most upward, the last one on ties.
    pub fn top(&self) -> Option<usize> {
        (0..self.faces.len())
            .filter_map(|f| self.face_normal(f).ok().map(|n| (f, n.z)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(f, _)| f)
    }

    /// Average of the vertex positions.
    pub fn centroid(&self) -> Point3<f64> {
        centroid_points(&self.vertices)
    }

    /// Enclosed volume, positive for outward winding.
    pub fn volume(&self) -> f64 {
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

    /// Center of mass of the solid, assuming uniform density.
    ///
    /// Falls back to [`Block::centroid`] when the volume vanishes.
    pub fn center(&self) -> Point3<f64> {
        let mut six_v = 0.0;
        let mut weighted = Vector3::zeros();
        for face in self.faces.iter().filter(|f| f.len() >= 3) {
            let p0 = self.vertices[face[0] as usize].coords;
            for i in 1..face.len() - 1 {
                let p1 = self.vertices[face[i] as usize].coords;
                let p2 = self.vertices[face[i + 1] as usize].coords;
                let v = p0.dot(&p1.cross(&p2));
                six_v += v;
                weighted += (p0 + p1 + p2) * v;
            }
        }
        if six_v.abs() > f64::EPSILON {
            Point3::from(weighted / (4.0 * six_v))
        } else {
            self.centroid()
        }
    }

    /// Axis-aligned bounding box as `(min, max)`, or `None` for an empty block.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = *self.vertices.first()?;
        let mut min = first;
        let mut max = first;
        for p in &self.vertices[1..] {
            min = min.inf(p);
            max = max.sup(p);
        }
        Some((min, max))
    }

    /// Apply a homogeneous transformation to every vertex.
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        for p in &mut self.vertices {
            *p = matrix.transform_point(p);
        }
    }

    /// Transformed copy of the block.
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> Self {
        let mut block = self.clone();
        block.transform(matrix);
        block
    }

    pub fn translate(&mut self, offset: Vector3<f64>) {
        for p in &mut self.vertices {
            *p += offset;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_cube() -> Block {
        Block::cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_new_rejects_bad_faces() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        assert!(matches!(
            Block::new(vertices.clone(), vec![vec![0, 1]]),
            Err(AssemblyError::InvalidBlock { .. })
        ));
        assert!(matches!(
            Block::new(vertices.clone(), vec![vec![0, 1, 7]]),
            Err(AssemblyError::InvalidBlock { .. })
        ));
        assert!(Block::new(vertices, vec![vec![0, 1, 2]]).is_ok());
    }

    #[test]
    fn test_cuboid_normals_point_outward() {
        let cube = unit_cube();
        let expected = [
            Vector3::new(0.0, 0.0, -1.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, -1.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(-1.0, 0.0, 0.0),
        ];
        for (f, n) in expected.iter().enumerate() {
            assert_relative_eq!(cube.face_normal(f).unwrap(), *n, epsilon = 1e-12);
            assert_relative_eq!(cube.face_area(f).unwrap(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_volume_and_center() {
        let block = Block::cuboid(Point3::new(1.0, 0.0, 0.0), Point3::new(3.0, 1.0, 3.0));
        assert_relative_eq!(block.volume(), 6.0, epsilon = 1e-12);
        assert_relative_eq!(block.center(), Point3::new(2.0, 0.5, 1.5), epsilon = 1e-12);
        assert_relative_eq!(block.centroid(), Point3::new(2.0, 0.5, 1.5), epsilon = 1e-12);
    }

    #[test]
    fn test_frame_is_orthonormal_and_outward() {
        let cube = unit_cube();
        let frame = cube.frame(1).unwrap();
        assert_relative_eq!(frame.point, Point3::new(0.5, 0.5, 1.0), epsilon = 1e-12);
        assert_relative_eq!(frame.zaxis(), Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(frame.xaxis, Vector3::x(), epsilon = 1e-12);
        assert_relative_eq!(frame.xaxis.dot(&frame.yaxis), 0.0, epsilon = 1e-12);
        assert_eq!(cube.frames().len(), 6);
    }

    #[test]
    fn test_degenerate_face_frame() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        let block = Block::new(vertices, vec![vec![0, 1, 2]]).unwrap();
        assert!(matches!(
            block.frame(0),
            Err(AssemblyError::GeometricDegeneracy { .. })
        ));
        assert!(block.frames().is_empty());
    }

    #[test]
    fn test_top_face() {
        assert_eq!(unit_cube().top(), Some(1));
    }

    #[test]
    fn test_top_face_tie_takes_last() {
        // Top split into two triangles
        let mut cube = unit_cube();
        cube.faces[1] = vec![4, 5, 6];
        cube.faces.push(vec![4, 6, 7]);
        assert_eq!(cube.top(), Some(6));
    }

    #[test]
    fn test_translate() {
        let mut cube = unit_cube();
        cube.translate(Vector3::new(1.0, -2.0, 0.5));
        assert_relative_eq!(cube.center(), Point3::new(1.5, -1.5, 1.0), epsilon = 1e-12);
        assert_eq!(cube.top(), Some(1));
    }

    #[test]
    fn test_transform_moves_derived_values() {
        let mut cube = unit_cube();
        let m = Matrix4::new_translation(&Vector3::new(0.0, 0.0, 5.0));
        cube.transform(&m);
        assert_relative_eq!(cube.centroid(), Point3::new(0.5, 0.5, 5.5), epsilon = 1e-12);
        let (min, max) = cube.bounds().unwrap();
        assert_relative_eq!(min.z, 5.0);
        assert_relative_eq!(max.z, 6.0);
    }
}
