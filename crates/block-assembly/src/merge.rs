//! Merging of coplanar interfaces.
//!
//! One physical contact between two blocks may be detected as several
//! adjacent patches, for example when one block presents a split face. Per
//! edge, the patches are welded into a small polygon mesh, wound
//! consistently, and neighbouring faces whose corners are coplanar are
//! unioned until no merge remains.

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::adjacency::FaceAdjacency;
use crate::assembly::{Assembly, NodeId};
use crate::error::{AssemblyError, AssemblyResult};
use crate::frame::Frame;
use crate::interface::Interface;
use crate::polygon::{is_coplanar, polygon_area, polygon_centroid, remove_collinear};
use crate::polymesh::PolyMesh;
use crate::winding::unify_cycles;

/// Parameters for merging coplanar interfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeParams {
    /// Tolerance for collinear point removal and for the coplanarity test.
    pub tol: f64,

    /// Distance below which interface corners are treated as the same vertex.
    pub weld_tolerance: f64,

    /// Merge edges in parallel.
    pub parallel: bool,
}

impl Default for MergeParams {
    fn default() -> Self {
        Self {
            tol: 1e-6,
            weld_tolerance: 1e-6,
            parallel: true,
        }
    }
}

impl MergeParams {
    /// Parameters using one tolerance for both welding and coplanarity.
    pub fn with_tolerance(tol: f64) -> Self {
        Self {
            tol,
            weld_tolerance: tol,
            ..Default::default()
        }
    }

    /// # Errors
    /// [`AssemblyError::Configuration`] for a non-positive or non-finite tolerance.
    pub fn validate(&self) -> AssemblyResult<()> {
        if !(self.tol.is_finite() && self.tol > 0.0) {
            return Err(AssemblyError::configuration(format!(
                "merge tolerance must be positive, got {}",
                self.tol
            )));
        }
        if !(self.weld_tolerance.is_finite() && self.weld_tolerance > 0.0) {
            return Err(AssemblyError::configuration(format!(
                "weld tolerance must be positive, got {}",
                self.weld_tolerance
            )));
        }
        Ok(())
    }
}

/// Statistics from a merge pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Edges with at least one interface.
    pub edges_visited: usize,

    /// Edges whose interfaces were replaced by merged ones.
    pub edges_merged: usize,

    /// Edges left unchanged because their interfaces could not be wound consistently.
    pub edges_inconsistent: usize,

    /// Interfaces on visited edges before the pass.
    pub interfaces_before: usize,

    /// Interfaces on visited edges after the pass.
    pub interfaces_after: usize,
}

/// Merge coplanar interfaces on every edge of the assembly.
///
/// Edges where nothing can be merged keep their interfaces untouched. Edges
/// that fail with a merge inconsistency are logged, counted and kept as well.
///
/// # Errors
/// [`AssemblyError::Configuration`] if `params` are invalid.
pub fn merge_coplanar_interfaces(
    assembly: &mut Assembly,
    params: &MergeParams,
) -> AssemblyResult<MergeStats> {
    params.validate()?;

    let keys: Vec<(NodeId, NodeId)> = assembly
        .edges()
        .filter(|(_, edge)| !edge.interfaces.is_empty())
        .map(|(key, _)| key)
        .collect();

    let outcomes: Vec<AssemblyResult<Option<Vec<Interface>>>> = {
        let graph: &Assembly = assembly;
        let merge = |&(a, b): &(NodeId, NodeId)| merge_interfaces(graph.interfaces(a, b), params);
        if params.parallel {
            keys.par_iter().map(merge).collect()
        } else {
            keys.iter().map(merge).collect()
        }
    };

    let mut stats = MergeStats::default();
    for (&(a, b), outcome) in keys.iter().zip(outcomes) {
        let before = assembly.interfaces(a, b).len();
        stats.edges_visited += 1;
        stats.interfaces_before += before;

        match outcome {
            Ok(Some(merged)) => {
                debug!(
                    "Edge ({}, {}): merged {} interfaces into {}",
                    a,
                    b,
                    before,
                    merged.len()
                );
                stats.edges_merged += 1;
                stats.interfaces_after += merged.len();
                assembly.replace_interfaces(a, b, merged)?;
            }
            Ok(None) => {
                stats.interfaces_after += before;
            }
            Err(e) if e.is_recoverable() => {
                warn!("Edge ({}, {}) kept unmerged: {}", a, b, e);
                stats.edges_inconsistent += 1;
                stats.interfaces_after += before;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        "Merged interfaces on {} of {} edges: {} -> {} interfaces",
        stats.edges_merged, stats.edges_visited, stats.interfaces_before, stats.interfaces_after
    );
    if stats.edges_inconsistent > 0 {
        warn!(
            "{} edges could not be merged consistently",
            stats.edges_inconsistent
        );
    }

    Ok(stats)
}

/// Merge the coplanar interfaces of one edge.
///
/// Returns `Ok(None)` when no two interfaces can be merged, and the rebuilt
/// interface list otherwise. Merged interfaces face the same way as the
/// first input interface.
///
/// # Errors
/// [`AssemblyError::MergeInconsistency`] if an interface degenerates after
/// cleaning or the patches cannot be wound consistently.
pub fn merge_interfaces(
    interfaces: &[Interface],
    params: &MergeParams,
) -> AssemblyResult<Option<Vec<Interface>>> {
    let Some(first) = interfaces.first() else {
        return Ok(None);
    };
    if interfaces.len() < 2 {
        return Ok(None);
    }
    let reference = first.normal();

    let polygons: Vec<Vec<Point3<f64>>> = interfaces
        .iter()
        .map(|i| remove_collinear(&i.points, params.tol))
        .collect();
    if let Some(idx) = polygons.iter().position(|p| p.len() < 3) {
        return Err(AssemblyError::MergeInconsistency {
            details: format!("interface {} has fewer than 3 corners after cleaning", idx),
        });
    }

    let mut mesh = PolyMesh::from_polygons(&polygons, params.weld_tolerance).map_err(|e| {
        AssemblyError::MergeInconsistency {
            details: e.to_string(),
        }
    })?;
    unify_cycles(&mut mesh.faces)?;

    if !merge_coplanar_faces(&mut mesh, params.tol) {
        return Ok(None);
    }

    let mut merged = Vec::with_capacity(mesh.face_count());
    for f in 0..mesh.face_count() {
        let mut points = mesh.face_coordinates(f);
        let normal = mesh
            .face_normal(f)
            .ok_or_else(|| AssemblyError::MergeInconsistency {
                details: format!("merged face {} is degenerate", f),
            })?;
        let normal = if normal.dot(&reference) < 0.0 {
            points.reverse();
            -normal
        } else {
            normal
        };
        merged.push(rebuild_interface(points, normal)?);
    }

    Ok(Some(merged))
}

/// Union neighbouring coplanar faces until none remain. Returns whether
/// anything was merged.
fn merge_coplanar_faces(mesh: &mut PolyMesh, tol: f64) -> bool {
    let mut merged_any = false;

    'scan: loop {
        let adjacency = FaceAdjacency::build(&mesh.faces);
        for f in 0..mesh.face_count() {
            for g in adjacency.face_neighbors(&mesh.faces, f as u32) {
                let g = g as usize;
                if g < f {
                    continue;
                }
                let mut corners = mesh.face_coordinates(f);
                corners.extend(mesh.face_coordinates(g));
                if !is_coplanar(&corners, tol) {
                    continue;
                }
                if mesh.merge_faces(f, g) {
                    merged_any = true;
                    continue 'scan;
                }
            }
        }
        break;
    }

    merged_any
}

fn rebuild_interface(points: Vec<Point3<f64>>, normal: Vector3<f64>) -> AssemblyResult<Interface> {
    let centroid = polygon_centroid(&points);
    let frame =
        Frame::from_plane(centroid, normal).ok_or_else(|| AssemblyError::MergeInconsistency {
            details: "merged face has no usable normal".to_string(),
        })?;
    let size = polygon_area(&points);
    Ok(Interface::face_face(points, size, frame))
}
