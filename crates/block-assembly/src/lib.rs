//! Contact interface detection for assemblies of rigid polyhedral blocks.
//!
//! This crate finds where the blocks of a masonry-like assembly (arches,
//! domes, walls, stacks) touch, and records each contact as a planar polygon
//! on the edge between the two blocks:
//!
//! - **Model**: [`Block`], [`Frame`], [`Interface`] and the [`Assembly`] graph
//! - **Detection**: nearest-neighbour candidate search and exact face-face
//!   polygon intersection
//! - **Merging**: union of coplanar contact patches per block pair
//! - **Analysis**: convex hull, validation reports, JSON persistence
//!
//! # Example
//!
//! ```no_run
//! use block_assembly::{Assembly, Block, InterfaceParams, MergeParams};
//! use nalgebra::Point3;
//!
//! let mut assembly = Assembly::new();
//! assembly.add_block(Block::cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0)), true);
//! assembly.add_block(
//!     Block::cuboid(Point3::new(0.0, 0.0, 1.0), Point3::new(1.0, 1.0, 2.0)),
//!     false,
//! );
//!
//! // Find contacts between neighbouring blocks
//! let stats = assembly.detect_interfaces(&InterfaceParams::default()).unwrap();
//! println!("{} interfaces", stats.interfaces);
//!
//! // Consolidate split contact patches
//! assembly.merge_coplanar_interfaces(&MergeParams::default()).unwrap();
//!
//! // Check the result
//! println!("{}", assembly.validate(1e-6, 0.1));
//! ```

mod error;

pub mod adjacency;
pub mod assembly;
pub mod block;
pub mod config;
pub mod detection;
pub mod frame;
pub mod hull;
pub mod interface;
pub mod io;
pub mod merge;
pub mod nnbrs;
pub mod polygon;
pub mod polymesh;
pub mod validate;
pub mod winding;

// Re-export core types at crate root
pub use assembly::{Assembly, AssemblyData, Attributes, Edge, Node, NodeId};
pub use block::Block;
pub use error::{AssemblyError, AssemblyResult};
pub use frame::Frame;
pub use interface::{Interface, InterfaceForce, InterfaceKind};
pub use polymesh::PolyMesh;

// Re-export commonly used functions
pub use adjacency::FaceAdjacency;
pub use config::{PipelineConfig, PipelineReport};
pub use detection::{block_block_interfaces, detect_interfaces, DetectionStats, InterfaceParams};
pub use hull::{assembly_hull, convex_hull};
pub use io::{from_json_str, load_assembly, save_assembly, to_json_string};
pub use merge::{merge_coplanar_interfaces, merge_interfaces, MergeParams, MergeStats};
pub use nnbrs::{find_nearest_neighbours, NearestNeighbors, Neighbor};
pub use validate::{validate_assembly, validate_block, AssemblyReport, BlockReport};
pub use winding::unify_cycles;

// Convenience methods on Assembly
impl Assembly {
    /// Load an assembly from a JSON file.
    pub fn load(path: impl AsRef<std::path::Path>) -> AssemblyResult<Self> {
        io::load_assembly(path.as_ref())
    }

    /// Save the assembly to a JSON file.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> AssemblyResult<()> {
        io::save_assembly(self, path.as_ref())
    }

    /// Detect face-face interfaces between neighbouring blocks.
    pub fn detect_interfaces(&mut self, params: &InterfaceParams) -> AssemblyResult<DetectionStats> {
        detection::detect_interfaces(self, params)
    }

    /// Merge coplanar interfaces on every edge.
    pub fn merge_coplanar_interfaces(&mut self, params: &MergeParams) -> AssemblyResult<MergeStats> {
        merge::merge_coplanar_interfaces(self, params)
    }

    /// Validate blocks and interfaces against the detection thresholds.
    pub fn validate(&self, tmax: f64, amin: f64) -> AssemblyReport {
        validate::validate_assembly(self, tmax, amin)
    }

    /// Convex hull of all block vertices, wound outward.
    pub fn hull(&self) -> AssemblyResult<PolyMesh> {
        hull::assembly_hull(self, None, true)
    }
}

// Convenience methods on Block
impl Block {
    /// Validate the block and return a report.
    pub fn validate(&self) -> BlockReport {
        validate::validate_block(self)
    }
}
