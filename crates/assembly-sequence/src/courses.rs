//! Course identification.
//!
//! A course is a layer of blocks at the same contact distance from the
//! supports: course 0 holds the supports, course `k + 1` the blocks touching
//! course `k` that are not in an earlier course.

use block_assembly::{Assembly, NodeId};
use hashbrown::HashSet;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Node attribute holding the course index.
pub const COURSE_ATTRIBUTE: &str = "course";

/// Blocks in contact with `id`, in ascending order.
///
/// Only edges that carry at least one interface count as contact.
pub fn contact_neighbors(assembly: &Assembly, id: NodeId) -> Vec<NodeId> {
    assembly
        .neighbors(id)
        .into_iter()
        .filter(|&nbr| !assembly.interfaces(id, nbr).is_empty())
        .collect()
}

/// Group the blocks of an assembly into courses, supports first.
///
/// Each course is sorted by node id. Blocks that cannot be reached from a
/// support through contacts are left out. An assembly without supports has
/// no courses.
pub fn assembly_courses(assembly: &Assembly) -> Vec<Vec<NodeId>> {
    let base = assembly.supports();
    if base.is_empty() {
        debug!("No supports, no courses");
        return Vec::new();
    }

    let mut seen: HashSet<NodeId> = base.iter().copied().collect();
    let mut courses = vec![base];

    loop {
        let mut course: Vec<NodeId> = courses[courses.len() - 1]
            .iter()
            .flat_map(|&id| contact_neighbors(assembly, id))
            .filter(|nbr| !seen.contains(nbr))
            .collect();
        course.sort_unstable();
        course.dedup();

        if course.is_empty() {
            break;
        }
        seen.extend(course.iter().copied());
        courses.push(course);
    }

    let unreachable = assembly.node_count() - seen.len();
    if unreachable > 0 {
        warn!(
            "{} blocks are not connected to a support and have no course",
            unreachable
        );
    }

    courses
}

/// Identify courses and store each block's course index in its
/// [`COURSE_ATTRIBUTE`]. Returns the number of courses.
///
/// Blocks without a course lose any stale course attribute.
pub fn assign_courses(assembly: &mut Assembly) -> usize {
    let courses = assembly_courses(assembly);

    let ids: Vec<NodeId> = assembly.node_ids().collect();
    for id in ids {
        if let Some(node) = assembly.node_mut(id) {
            node.attributes.remove(COURSE_ATTRIBUTE);
        }
    }

    for (index, course) in courses.iter().enumerate() {
        for &id in course {
            if let Some(node) = assembly.node_mut(id) {
                node.attributes
                    .insert(COURSE_ATTRIBUTE.to_string(), Value::from(index));
            }
        }
    }

    info!(
        "Identified {} courses over {} blocks",
        courses.len(),
        courses.iter().map(Vec::len).sum::<usize>()
    );
    courses.len()
}

/// Course index stored on a block, if any.
pub fn course_of(assembly: &Assembly, id: NodeId) -> Option<usize> {
    assembly
        .attribute(id, COURSE_ATTRIBUTE)
        .and_then(Value::as_u64)
        .and_then(|c| usize::try_from(c).ok())
}
