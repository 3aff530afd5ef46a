//! Building sequences and placing frames for wall-like assemblies.

use std::collections::VecDeque;

use block_assembly::{Assembly, Frame, NodeId};
use hashbrown::HashSet;
use tracing::debug;

use crate::courses::{contact_neighbors, course_of};
use crate::error::{SequenceError, SequenceResult};

/// Blocks that have to be placed, in order, before `node` can be placed.
///
/// The walk starts at `node` and descends one course at a time through
/// contacts, so the sequence holds `node` and every block below it that it
/// rests on, directly or indirectly. The lowest courses come first and `node`
/// is last.
///
/// Each block is visited once. A block first reached from a course that is
/// not directly above it is not revisited from a lower one.
///
/// # Errors
/// [`SequenceError::NodeNotFound`] for an unknown block, or
/// [`SequenceError::CoursesNotIdentified`] if `node` has no course; see
/// [`assign_courses`](crate::courses::assign_courses).
pub fn building_sequence(assembly: &Assembly, node: NodeId) -> SequenceResult<Vec<NodeId>> {
    if !assembly.contains_node(node) {
        return Err(SequenceError::NodeNotFound { node });
    }
    let course = course_of(assembly, node).ok_or(SequenceError::CoursesNotIdentified { node })?;

    let mut sequence = Vec::new();
    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut to_visit: VecDeque<(NodeId, usize)> = VecDeque::from([(node, course + 1)]);

    while let Some((id, course_above)) = to_visit.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        // Blocks without a course are not connected to a support
        let Some(course) = course_of(assembly, id) else {
            continue;
        };
        if course + 1 != course_above {
            continue;
        }

        sequence.push(id);
        for nbr in contact_neighbors(assembly, id) {
            if !seen.contains(&nbr) {
                to_visit.push_back((nbr, course));
            }
        }
    }

    sequence.reverse();
    debug!("Building sequence for block {}: {:?}", node, sequence);
    Ok(sequence)
}

/// Frame for placing a block: the frame of its top face, with the origin at
/// the face center.
pub fn placing_frame(assembly: &Assembly, node: NodeId) -> SequenceResult<Frame> {
    let block = assembly
        .block(node)
        .ok_or(SequenceError::NodeNotFound { node })?;
    let top = block.top().ok_or(SequenceError::NoTopFace { node })?;

    let mut frame = block.frame(top)?;
    frame.point = block.face_center(top)?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::courses::assign_courses;
    use approx::assert_relative_eq;
    use block_assembly::{Block, InterfaceParams};
    use nalgebra::{Point3, Vector3};

    fn brick(x: f64, z: f64) -> Block {
        Block::cuboid(Point3::new(x, 0.0, z), Point3::new(x + 2.0, 1.0, z + 1.0))
    }

    /// Running bond wall, four courses:
    ///
    /// ```text
    ///         [ 9 ]
    ///      [ 7 ][ 8 ]
    ///   [ 4 ][ 5 ][ 6 ]
    /// [ 0 ][ 1 ][ 2 ][ 3 ]
    /// ```
    fn pyramid_wall() -> Assembly {
        let mut assembly = Assembly::new();
        for row in 0..4 {
            for i in 0..(4 - row) {
                let x = row as f64 + 2.0 * i as f64;
                assembly.add_block(brick(x, row as f64), row == 0);
            }
        }
        assembly
            .detect_interfaces(&InterfaceParams::new(8, 1e-6, 0.01))
            .unwrap();
        assign_courses(&mut assembly);
        assembly
    }

    #[test]
    fn test_sequence_of_top_block() {
        let assembly = pyramid_wall();
        let sequence = building_sequence(&assembly, 9).unwrap();

        assert_eq!(sequence.last(), Some(&9));
        let mut sorted = sequence.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..10).collect::<Vec<_>>());

        // Lower courses first
        let courses: Vec<usize> = sequence
            .iter()
            .map(|&id| course_of(&assembly, id).unwrap())
            .collect();
        assert!(courses.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_sequence_skips_blocks_not_below() {
        let assembly = pyramid_wall();
        let sequence = building_sequence(&assembly, 7).unwrap();

        assert_eq!(sequence.last(), Some(&7));
        let mut sorted = sequence.clone();
        sorted.sort_unstable();
        // 3 and 6 carry only the right half of the wall
        assert_eq!(sorted, vec![0, 1, 2, 4, 5, 7]);
    }

    #[test]
    fn test_sequence_of_support_is_itself() {
        let assembly = pyramid_wall();
        assert_eq!(building_sequence(&assembly, 3).unwrap(), vec![3]);
    }

    #[test]
    fn test_sequence_requires_courses() {
        let mut assembly = Assembly::new();
        let a = assembly.add_block(brick(0.0, 0.0), true);
        assert!(matches!(
            building_sequence(&assembly, a),
            Err(SequenceError::CoursesNotIdentified { node }) if node == a
        ));
        assert!(matches!(
            building_sequence(&assembly, 42),
            Err(SequenceError::NodeNotFound { node: 42 })
        ));
    }

    #[test]
    fn test_placing_frame() {
        let assembly = pyramid_wall();
        let frame = placing_frame(&assembly, 9).unwrap();

        assert_relative_eq!(frame.point, Point3::new(4.0, 0.5, 4.0), epsilon = 1e-12);
        assert_relative_eq!(frame.zaxis(), Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(frame.xaxis.dot(&frame.yaxis), 0.0, epsilon = 1e-12);

        assert!(matches!(
            placing_frame(&assembly, 99),
            Err(SequenceError::NodeNotFound { node: 99 })
        ));
    }
}
