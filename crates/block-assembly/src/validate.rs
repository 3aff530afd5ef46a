//! Block and assembly validation and reporting.

use nalgebra::Point3;
use tracing::{debug, info, warn};

use crate::adjacency::FaceAdjacency;
use crate::assembly::{Assembly, NodeId};
use crate::block::Block;
use crate::polygon::max_plane_deviation;
use crate::winding::is_consistently_wound;

/// Relative tolerance between an interface's `size` and its recomputed area.
pub const AREA_RELATIVE_TOLERANCE: f64 = 1e-9;

/// Validation report for a single block.
#[derive(Debug, Clone)]
pub struct BlockReport {
    /// Whether the block has no boundary edges.
    pub is_watertight: bool,

    /// Whether all edges have at most 2 adjacent faces.
    pub is_manifold: bool,

    /// Whether every shared edge is traversed in opposite directions.
    pub is_consistently_wound: bool,

    pub boundary_edge_count: usize,
    pub non_manifold_edge_count: usize,

    /// Faces with zero area.
    pub degenerate_face_count: usize,

    pub vertex_count: usize,
    pub face_count: usize,

    /// Enclosed volume; negative when faces point inward.
    pub volume: f64,

    /// Bounding box as (min_corner, max_corner).
    pub bounds: Option<(Point3<f64>, Point3<f64>)>,
}

impl BlockReport {
    /// Closed and manifold.
    pub fn is_closed(&self) -> bool {
        self.is_watertight && self.is_manifold
    }

    /// Closed, consistently wound outward, and free of degenerate faces.
    pub fn is_valid(&self) -> bool {
        self.is_closed()
            && self.is_consistently_wound
            && self.degenerate_face_count == 0
            && self.volume > 0.0
    }
}

impl std::fmt::Display for BlockReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flag = |ok: bool| if ok { "ok" } else { "FAILED" };

        writeln!(
            f,
            "Block: {} vertices, {} faces, volume {:.6}",
            self.vertex_count, self.face_count, self.volume
        )?;
        if let Some((lo, hi)) = &self.bounds {
            let extent = hi - lo;
            writeln!(
                f,
                "  Extent: {:.3} x {:.3} x {:.3} from ({:.3}, {:.3}, {:.3})",
                extent.x, extent.y, extent.z, lo.x, lo.y, lo.z
            )?;
        }
        writeln!(
            f,
            "  Closed: {} ({} open edges)",
            flag(self.is_watertight),
            self.boundary_edge_count
        )?;
        writeln!(
            f,
            "  Two faces per edge: {} ({} overused edges)",
            flag(self.is_manifold),
            self.non_manifold_edge_count
        )?;
        writeln!(f, "  Orientation: {}", flag(self.is_consistently_wound))?;
        if self.degenerate_face_count > 0 {
            writeln!(f, "  Degenerate faces: {}", self.degenerate_face_count)?;
        }

        Ok(())
    }
}

/// Validate a block and return a report.
pub fn validate_block(block: &Block) -> BlockReport {
    let adjacency = FaceAdjacency::build(&block.faces);

    let boundary_edge_count = adjacency.boundary_edge_count();
    let non_manifold_edge_count = adjacency.non_manifold_edge_count();
    let degenerate_face_count = (0..block.face_count())
        .filter(|&f| block.face_normal(f).is_err())
        .count();

    let report = BlockReport {
        is_watertight: boundary_edge_count == 0,
        is_manifold: non_manifold_edge_count == 0,
        is_consistently_wound: is_consistently_wound(&block.faces),
        boundary_edge_count,
        non_manifold_edge_count,
        degenerate_face_count,
        vertex_count: block.vertex_count(),
        face_count: block.face_count(),
        volume: block.volume(),
        bounds: block.bounds(),
    };

    debug!("{}", report);
    report
}

/// Location of an interface in an assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceLocation {
    /// Edge key, smaller node id first.
    pub edge: (NodeId, NodeId),

    /// Position in the edge's interface list.
    pub index: usize,
}

impl std::fmt::Display for InterfaceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})#{}", self.edge.0, self.edge.1, self.index)
    }
}

/// Validation report for an assembly and its interfaces.
#[derive(Debug, Clone, Default)]
pub struct AssemblyReport {
    pub block_count: usize,
    pub edge_count: usize,
    pub interface_count: usize,

    /// Blocks that are not closed manifolds.
    pub open_blocks: Vec<NodeId>,

    /// Interfaces whose points deviate more than `tmax` from their best-fit plane.
    pub non_planar: Vec<InterfaceLocation>,

    /// Interfaces whose `size` disagrees with the area of their points.
    pub area_mismatches: Vec<InterfaceLocation>,

    /// Interfaces smaller than `amin`.
    pub below_min_area: Vec<InterfaceLocation>,

    /// Largest plane deviation over all interfaces.
    pub max_plane_deviation: f64,
}

impl AssemblyReport {
    /// Whether all interfaces are planar, self-consistent and large enough.
    pub fn interfaces_valid(&self) -> bool {
        self.non_planar.is_empty()
            && self.area_mismatches.is_empty()
            && self.below_min_area.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.interfaces_valid() && self.open_blocks.is_empty()
    }
}

impl std::fmt::Display for AssemblyReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Assembly Report:")?;
        writeln!(f, "  Blocks: {}", self.block_count)?;
        writeln!(f, "  Edges: {}", self.edge_count)?;
        writeln!(f, "  Interfaces: {}", self.interface_count)?;
        writeln!(f, "  Max plane deviation: {:.3e}", self.max_plane_deviation)?;

        let list = |items: &[InterfaceLocation]| {
            items
                .iter()
                .map(|l| l.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };

        if !self.open_blocks.is_empty() {
            writeln!(f, "  Open blocks: {:?}", self.open_blocks)?;
        }
        if !self.non_planar.is_empty() {
            writeln!(f, "  Non-planar interfaces: {}", list(&self.non_planar))?;
        }
        if !self.area_mismatches.is_empty() {
            writeln!(f, "  Area mismatches: {}", list(&self.area_mismatches))?;
        }
        if !self.below_min_area.is_empty() {
            writeln!(f, "  Below minimum area: {}", list(&self.below_min_area))?;
        }
        writeln!(
            f,
            "  Valid: {}",
            if self.is_valid() { "yes" } else { "NO" }
        )?;

        Ok(())
    }
}

/// Validate the blocks and interfaces of an assembly against the detection
/// thresholds.
pub fn validate_assembly(assembly: &Assembly, tmax: f64, amin: f64) -> AssemblyReport {
    let mut report = AssemblyReport {
        block_count: assembly.node_count(),
        edge_count: assembly.edge_count(),
        interface_count: assembly.interface_count(),
        ..Default::default()
    };

    for (id, block) in assembly.blocks() {
        if !validate_block(block).is_closed() {
            report.open_blocks.push(id);
        }
    }

    for (edge, data) in assembly.edges() {
        for (index, interface) in data.interfaces.iter().enumerate() {
            let location = InterfaceLocation { edge, index };

            let deviation = max_plane_deviation(&interface.points);
            report.max_plane_deviation = report.max_plane_deviation.max(deviation);
            if deviation > tmax {
                report.non_planar.push(location);
            }

            let area = interface.area();
            let scale = interface.size.abs().max(f64::EPSILON);
            if (area - interface.size).abs() > AREA_RELATIVE_TOLERANCE * scale {
                report.area_mismatches.push(location);
            }

            if interface.size < amin {
                report.below_min_area.push(location);
            }
        }
    }

    if !report.open_blocks.is_empty() {
        warn!(
            "{} blocks are not closed manifolds",
            report.open_blocks.len()
        );
    }
    debug!("{}", report);

    report
}

/// Log a summary of assembly validation.
pub fn log_validation(report: &AssemblyReport) {
    info!(
        "Assembly: {} blocks, {} edges, {} interfaces",
        report.block_count, report.edge_count, report.interface_count
    );

    if report.is_valid() {
        info!("All interfaces are planar and consistent");
    } else {
        if !report.open_blocks.is_empty() {
            warn!("Open blocks: {:?}", report.open_blocks);
        }
        if !report.non_planar.is_empty() {
            warn!("{} non-planar interfaces", report.non_planar.len());
        }
        if !report.area_mismatches.is_empty() {
            warn!(
                "{} interfaces with inconsistent size",
                report.area_mismatches.len()
            );
        }
        if !report.below_min_area.is_empty() {
            warn!(
                "{} interfaces below minimum area",
                report.below_min_area.len()
            );
        }
    }
}
