//! Edge adjacency of polygon meshes.

use hashbrown::HashMap;

/// Canonical (smaller, larger) key for an undirected edge.
#[inline]
pub fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Directed edges of a face loop, including the closing edge.
pub fn face_edges(face: &[u32]) -> impl Iterator<Item = (u32, u32)> + '_ {
    let n = face.len();
    (0..n).map(move |i| (face[i], face[(i + 1) % n]))
}

/// Edge-to-face incidence of a polygon mesh.
///
/// Faces may have any number of vertices. Edges are keyed by their
/// [`edge_key`], so both traversal directions map to the same entry.
#[derive(Debug, Clone, Default)]
pub struct FaceAdjacency {
    /// Faces using each undirected edge, in ascending face order.
    pub edge_to_faces: HashMap<(u32, u32), Vec<u32>>,
}

impl FaceAdjacency {
    pub fn build<F: AsRef<[u32]>>(faces: &[F]) -> Self {
        let mut edge_to_faces: HashMap<(u32, u32), Vec<u32>> = HashMap::new();

        for (face_idx, face) in faces.iter().enumerate() {
            let face_idx = face_idx as u32;
            // Zero-length edges from repeated indices carry no adjacency
            for (a, b) in face_edges(face.as_ref()).filter(|(a, b)| a != b) {
                let shared = edge_to_faces.entry(edge_key(a, b)).or_default();
                if shared.last() != Some(&face_idx) {
                    shared.push(face_idx);
                }
            }
        }

        Self { edge_to_faces }
    }

    fn edges_where<'a>(
        &'a self,
        keep: impl Fn(usize) -> bool + 'a,
    ) -> impl Iterator<Item = (u32, u32)> + 'a {
        self.edge_to_faces
            .iter()
            .filter(move |(_, shared)| keep(shared.len()))
            .map(|(&edge, _)| edge)
    }

    /// Edges used by a single face.
    pub fn boundary_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.edges_where(|n| n == 1)
    }

    /// Edges used by more than two faces.
    pub fn non_manifold_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.edges_where(|n| n > 2)
    }

    pub fn boundary_edge_count(&self) -> usize {
        self.boundary_edges().count()
    }

    pub fn non_manifold_edge_count(&self) -> usize {
        self.non_manifold_edges().count()
    }

    pub fn is_manifold(&self) -> bool {
        self.non_manifold_edges().next().is_none()
    }

    /// Every edge is shared by at least two faces.
    pub fn is_watertight(&self) -> bool {
        self.boundary_edges().next().is_none()
    }

    /// Faces using edge `{v0, v1}`, in either direction.
    pub fn faces_for_edge(&self, v0: u32, v1: u32) -> Option<&[u32]> {
        self.edge_to_faces
            .get(&edge_key(v0, v1))
            .map(Vec::as_slice)
    }

    /// Faces sharing at least one edge with `face_idx`, sorted and deduplicated.
    pub fn face_neighbors<F: AsRef<[u32]>>(&self, faces: &[F], face_idx: u32) -> Vec<u32> {
        let Some(face) = faces.get(face_idx as usize) else {
            return Vec::new();
        };
        let mut neighbors: Vec<u32> = face_edges(face.as_ref())
            .filter_map(|(a, b)| self.faces_for_edge(a, b))
            .flatten()
            .copied()
            .filter(|&f| f != face_idx)
            .collect();
        neighbors.sort_unstable();
        neighbors.dedup();
        neighbors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetrahedron() -> Vec<Vec<u32>> {
        vec![vec![0, 1, 2], vec![0, 2, 3], vec![0, 3, 1], vec![1, 3, 2]]
    }

    fn two_quads() -> Vec<Vec<u32>> {
        // Strip of two squares sharing edge 1-4
        vec![vec![0, 1, 4, 3], vec![1, 2, 5, 4]]
    }

    #[test]
    fn test_closed_tetrahedron() {
        let faces = tetrahedron();
        let adj = FaceAdjacency::build(&faces);
        assert!(adj.is_watertight() && adj.is_manifold());
        assert_eq!(adj.edge_to_faces.len(), 6);
        assert_eq!(adj.face_neighbors(&faces, 3), vec![0, 1, 2]);
    }

    #[test]
    fn test_quads_share_one_edge() {
        let faces = two_quads();
        let adj = FaceAdjacency::build(&faces);
        assert_eq!(adj.faces_for_edge(4, 1), Some(&[0, 1][..]));
        assert_eq!(adj.boundary_edge_count(), 6);
        assert_eq!(adj.face_neighbors(&faces, 0), vec![1]);
        assert!(!adj.is_watertight());
    }

    #[test]
    fn test_non_manifold_fan() {
        let faces = vec![vec![0, 1, 2], vec![1, 0, 3], vec![0, 1, 4]];
        let adj = FaceAdjacency::build(&faces);
        assert!(!adj.is_manifold());
        assert_eq!(adj.non_manifold_edges().collect::<Vec<_>>(), vec![(0, 1)]);
    }
}
