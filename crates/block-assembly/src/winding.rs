//! Consistent face winding for polygon meshes.

use std::collections::VecDeque;
use tracing::{debug, info};

use crate::adjacency::{face_edges, FaceAdjacency};
use crate::error::{AssemblyError, AssemblyResult};

/// Make the winding of every connected component consistent.
///
/// Flood-fills each component from its lowest face index, which keeps its
/// orientation. Neighbours that traverse a shared edge in the same direction
/// as an already oriented face are reversed.
///
/// Returns the number of reversed faces.
///
/// # Errors
/// [`AssemblyError::MergeInconsistency`] if no consistent orientation exists
/// (non-orientable or non-manifold connectivity). `faces` is left untouched.
pub fn unify_cycles(faces: &mut [Vec<u32>]) -> AssemblyResult<usize> {
    if faces.is_empty() {
        return Ok(0);
    }

    let adjacency = FaceAdjacency::build(&*faces);
    if let Some((a, b)) = adjacency.non_manifold_edges().next() {
        return Err(AssemblyError::MergeInconsistency {
            details: format!("edge ({}, {}) is shared by more than two faces", a, b),
        });
    }

    // None = unvisited, Some(flip) = orientation decided
    let mut state: Vec<Option<bool>> = vec![None; faces.len()];
    let mut queue: VecDeque<usize> = VecDeque::new();
    let mut components = 0usize;

    for seed in 0..faces.len() {
        if state[seed].is_some() {
            continue;
        }
        components += 1;
        state[seed] = Some(false);
        queue.push_back(seed);

        while let Some(face_idx) = queue.pop_front() {
            let flipped = state[face_idx].unwrap_or(false);

            for (a, b) in face_edges(&faces[face_idx]) {
                // Direction of this edge after the pending flip is applied
                let (a, b) = if flipped { (b, a) } else { (a, b) };

                let Some(neighbors) = adjacency.faces_for_edge(a, b) else {
                    continue;
                };

                for &neighbor in neighbors {
                    let neighbor = neighbor as usize;
                    if neighbor == face_idx {
                        continue;
                    }
                    let Some(same_dir) = edge_direction_in_face(&faces[neighbor], a, b) else {
                        continue;
                    };

                    match state[neighbor] {
                        None => {
                            state[neighbor] = Some(same_dir);
                            queue.push_back(neighbor);
                        }
                        Some(neighbor_flip) if neighbor_flip != same_dir => {
                            return Err(AssemblyError::MergeInconsistency {
                                details: format!(
                                    "faces {} and {} cannot be oriented consistently",
                                    face_idx, neighbor
                                ),
                            });
                        }
                        Some(_) => {}
                    }
                }
            }
        }
    }

    let mut flipped_count = 0;
    for (face, flip) in faces.iter_mut().zip(&state) {
        if *flip == Some(true) {
            face.reverse();
            flipped_count += 1;
        }
    }

    if flipped_count > 0 {
        info!(
            "Unified winding: reversed {} of {} faces ({} components)",
            flipped_count,
            faces.len(),
            components
        );
    } else {
        debug!("Winding already consistent ({} components)", components);
    }

    Ok(flipped_count)
}

/// Direction of edge (a, b) in a face loop.
///
/// `Some(true)` if the face traverses a -> b, `Some(false)` for b -> a, `None`
/// if the edge is not part of the face.
pub fn edge_direction_in_face(face: &[u32], a: u32, b: u32) -> Option<bool> {
    for (v0, v1) in face_edges(face) {
        if v0 == a && v1 == b {
            return Some(true);
        }
        if v0 == b && v1 == a {
            return Some(false);
        }
    }
    None
}

/// Whether every shared edge is traversed in opposite directions.
pub fn is_consistently_wound(faces: &[Vec<u32>]) -> bool {
    let adjacency = FaceAdjacency::build(faces);
    adjacency.edge_to_faces.iter().all(|(&(a, b), shared)| {
        if shared.len() != 2 {
            return true;
        }
        let d0 = edge_direction_in_face(&faces[shared[0] as usize], a, b);
        let d1 = edge_direction_in_face(&faces[shared[1] as usize], a, b);
        d0.is_some() && d1.is_some() && d0 != d1
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_consistent() {
        let mut faces = vec![vec![0, 1, 2], vec![0, 3, 1], vec![1, 3, 2], vec![2, 3, 0]];
        let before = faces.clone();
        assert_eq!(unify_cycles(&mut faces).unwrap(), 0);
        assert_eq!(faces, before);
    }

    #[test]
    fn test_fix_inconsistent_quads() {
        let mut faces = vec![vec![0, 1, 4, 3], vec![1, 4, 5, 2], vec![5, 2, 7, 6]];
        assert!(!is_consistently_wound(&faces));
        let flipped = unify_cycles(&mut faces).unwrap();
        assert_eq!(flipped, 1);
        assert!(is_consistently_wound(&faces));
        // The seed face keeps its orientation
        assert_eq!(faces[0], vec![0, 1, 4, 3]);
    }

    #[test]
    fn test_flip_propagates_through_chain() {
        // Every face after the first is reversed relative to its predecessor
        let mut faces = vec![vec![0, 1, 5, 4], vec![1, 5, 6, 2], vec![2, 3, 7, 6]];
        unify_cycles(&mut faces).unwrap();
        assert!(is_consistently_wound(&faces));
    }

    #[test]
    fn test_disconnected_components() {
        let mut faces = vec![vec![0, 1, 2], vec![3, 4, 5]];
        assert_eq!(unify_cycles(&mut faces).unwrap(), 0);
    }

    #[test]
    fn test_mobius_strip_is_inconsistent() {
        // Strip of quads closed with a half twist
        let mut faces = vec![
            vec![0, 1, 4, 3],
            vec![1, 2, 5, 4],
            vec![2, 3, 0, 5],
        ];
        let before = faces.clone();
        let err = unify_cycles(&mut faces).unwrap_err();
        assert!(matches!(err, AssemblyError::MergeInconsistency { .. }));
        assert_eq!(faces, before);
    }

    #[test]
    fn test_non_manifold_is_inconsistent() {
        let mut faces = vec![vec![0, 1, 2], vec![1, 0, 3], vec![0, 1, 4]];
        assert!(unify_cycles(&mut faces).is_err());
    }
}
