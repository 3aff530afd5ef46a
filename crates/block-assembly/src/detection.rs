//! Face-face interface detection.
//!
//! Finds where blocks touch by testing every face of a block against every
//! face of its nearest neighbours:
//!
//! 1. Candidate block pairs come from a k-nearest-neighbour query over block
//!    centroids. Each unordered pair is tested once.
//! 2. For a pair `{A, B}` (A being the lower node id), each face of A defines
//!    a local frame. The faces of B are expressed in that frame; faces that are
//!    not flat against A's face (height above `tmax`) or too small (area below
//!    `amin`) are rejected.
//! 3. The surviving faces are intersected with A's face in 2D. Each overlap of
//!    at least `amin` is lifted back to 3D and becomes an [`Interface`].
//!
//! Per-pair work runs in parallel with rayon; results are attached to the
//! assembly afterwards, in ascending pair order.
//!
//! # Limitations
//!
//! `nmax` bounds the search. Blocks whose centroids are not among each
//! other's `nmax` nearest neighbours are never tested, even if they touch.

use hashbrown::HashSet;
use nalgebra::{Point2, Point3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::assembly::{edge_key, Assembly, NodeId};
use crate::block::Block;
use crate::error::{AssemblyError, AssemblyResult};
use crate::frame::Frame;
use crate::interface::Interface;
use crate::nnbrs::NearestNeighbors;
use crate::polygon::{intersect, polygon_area_2d, polygon_centroid};

/// Parameters for interface detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceParams {
    /// Number of nearest neighbours tested per block, not counting the block
    /// itself.
    pub nmax: usize,

    /// Maximum distance of a neighbour face's vertices from the base face plane.
    pub tmax: f64,

    /// Minimum contact area.
    pub amin: f64,

    /// Dimension of the centroid neighbour search: 3, or 2 to ignore Z.
    pub nnbrs_dims: usize,

    /// Skip pairs where both blocks are supports.
    pub skip_support_pairs: bool,

    /// Test block pairs in parallel.
    pub parallel: bool,
}

impl Default for InterfaceParams {
    fn default() -> Self {
        Self {
            nmax: 10,
            tmax: 1e-6,
            amin: 0.1,
            nnbrs_dims: 3,
            skip_support_pairs: false,
            parallel: true,
        }
    }
}

impl InterfaceParams {
    /// Parameters with the given search size and thresholds.
    pub fn new(nmax: usize, tmax: f64, amin: f64) -> Self {
        Self {
            nmax,
            tmax,
            amin,
            ..Default::default()
        }
    }

    /// Parameters for walls and courses laid out in plan, searching neighbours
    /// by their XY position only.
    pub fn for_planar_layout() -> Self {
        Self {
            nnbrs_dims: 2,
            ..Default::default()
        }
    }

    /// Check the parameters before any geometry work.
    ///
    /// # Errors
    /// [`AssemblyError::Configuration`] for `nmax < 1`, a non-positive or
    /// non-finite `tmax`/`amin`, or a search dimension other than 2 or 3.
    pub fn validate(&self) -> AssemblyResult<()> {
        if self.nmax < 1 {
            return Err(AssemblyError::configuration(format!(
                "nmax must be at least 1, got {}",
                self.nmax
            )));
        }
        if !(self.tmax.is_finite() && self.tmax > 0.0) {
            return Err(AssemblyError::configuration(format!(
                "tmax must be positive, got {}",
                self.tmax
            )));
        }
        if !(self.amin.is_finite() && self.amin > 0.0) {
            return Err(AssemblyError::configuration(format!(
                "amin must be positive, got {}",
                self.amin
            )));
        }
        if self.nnbrs_dims != 2 && self.nnbrs_dims != 3 {
            return Err(AssemblyError::configuration(format!(
                "nnbrs_dims must be 2 or 3, got {}",
                self.nnbrs_dims
            )));
        }
        Ok(())
    }
}

/// Statistics from a detection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionStats {
    /// Unordered block pairs tested.
    pub candidate_pairs: usize,

    /// Face pairs examined across all block pairs.
    pub face_pairs_tested: usize,

    /// Face pairs skipped because of degenerate geometry.
    pub degenerate_face_pairs: usize,

    /// Interfaces attached to the assembly.
    pub interfaces: usize,

    /// New edges created.
    pub edges_created: usize,
}

/// Outcome of testing one block pair.
#[derive(Debug, Default)]
struct PairOutcome {
    interfaces: Vec<Interface>,
    face_pairs_tested: usize,
    degenerate_face_pairs: usize,
}

/// Detect face-face interfaces between neighbouring blocks and attach them
/// to the assembly.
///
/// Pairs that already have an edge are left alone, so running detection
/// twice adds nothing; call [`Assembly::clear_interfaces`] first to redo it.
///
/// # Errors
/// [`AssemblyError::Configuration`] if `params` are invalid. Degenerate face
/// pairs are skipped and counted, never returned as errors.
pub fn detect_interfaces(
    assembly: &mut Assembly,
    params: &InterfaceParams,
) -> AssemblyResult<DetectionStats> {
    params.validate()?;

    let pairs = candidate_pairs(assembly, params)?;
    let mut stats = DetectionStats {
        candidate_pairs: pairs.len(),
        ..Default::default()
    };

    if pairs.is_empty() {
        debug!("No candidate block pairs");
        return Ok(stats);
    }

    let outcomes: Vec<PairOutcome> = {
        let graph: &Assembly = assembly;
        let evaluate = |&(a, b): &(NodeId, NodeId)| match (graph.block(a), graph.block(b)) {
            (Some(block_a), Some(block_b)) => {
                evaluate_pair(block_a, block_b, params.tmax, params.amin)
            }
            _ => PairOutcome::default(),
        };
        if params.parallel {
            pairs.par_iter().map(evaluate).collect()
        } else {
            pairs.iter().map(evaluate).collect()
        }
    };

    for (&(a, b), outcome) in pairs.iter().zip(outcomes) {
        stats.face_pairs_tested += outcome.face_pairs_tested;
        stats.degenerate_face_pairs += outcome.degenerate_face_pairs;

        if outcome.interfaces.is_empty() {
            continue;
        }

        debug!(
            "Blocks {} and {}: {} interfaces",
            a,
            b,
            outcome.interfaces.len()
        );
        stats.interfaces += outcome.interfaces.len();
        stats.edges_created += 1;
        assembly.attach_interfaces(a, b, outcome.interfaces)?;
    }

    info!(
        "Interface detection: {} block pairs, {} face pairs tested, {} interfaces on {} edges",
        stats.candidate_pairs, stats.face_pairs_tested, stats.interfaces, stats.edges_created
    );
    if stats.degenerate_face_pairs > 0 {
        debug!(
            "Skipped {} degenerate face pairs",
            stats.degenerate_face_pairs
        );
    }

    Ok(stats)
}

/// Unordered block pairs to test, as `(lower id, higher id)` in ascending order.
fn candidate_pairs(
    assembly: &Assembly,
    params: &InterfaceParams,
) -> AssemblyResult<Vec<(NodeId, NodeId)>> {
    let centroids = assembly.centroids();
    if centroids.len() < 2 {
        return Ok(Vec::new());
    }

    let ids: Vec<NodeId> = centroids.iter().map(|(id, _)| *id).collect();
    let points: Vec<Point3<f64>> = centroids.iter().map(|(_, p)| *p).collect();
    let index = NearestNeighbors::build(&points, params.nnbrs_dims)?;

    let mut seen: HashSet<(NodeId, NodeId)> = HashSet::new();
    let mut pairs = Vec::new();

    // The query includes the block itself
    let fan_out = params.nmax.saturating_add(1);

    for (i, &a) in ids.iter().enumerate() {
        for neighbor in index.query(i, fan_out) {
            if neighbor.index == i {
                continue;
            }
            let b = ids[neighbor.index];
            let key = edge_key(a, b);
            if !seen.insert(key) {
                continue;
            }
            if assembly.has_edge(a, b) {
                continue;
            }
            if params.skip_support_pairs && assembly.is_support(a) && assembly.is_support(b) {
                debug!("Skipping support pair ({}, {})", key.0, key.1);
                continue;
            }
            pairs.push(key);
        }
    }

    pairs.sort_unstable();
    Ok(pairs)
}

/// Interfaces between two blocks, using the faces of `a` as base frames.
///
/// Face pairs are visited in ascending order, faces of `a` first. Degenerate
/// faces are skipped.
pub fn block_block_interfaces(a: &Block, b: &Block, tmax: f64, amin: f64) -> Vec<Interface> {
    evaluate_pair(a, b, tmax, amin).interfaces
}

fn evaluate_pair(a: &Block, b: &Block, tmax: f64, amin: f64) -> PairOutcome {
    let mut outcome = PairOutcome::default();

    let faces_b: Vec<Option<Vec<Point3<f64>>>> = (0..b.face_count())
        .map(|f| b.face_coordinates(f).ok())
        .collect();

    for f0 in 0..a.face_count() {
        let base = a
            .frame(f0)
            .and_then(|frame| a.face_coordinates(f0).map(|coords| (frame, coords)));
        let (frame, coords0) = match base {
            Ok(base) => base,
            Err(e) => {
                debug!("Skipping face {} of base block: {}", f0, e);
                outcome.face_pairs_tested += faces_b.len();
                outcome.degenerate_face_pairs += faces_b.len();
                continue;
            }
        };

        let p0: Vec<Point2<f64>> = coords0.iter().map(|p| project(&frame, p).0).collect();

        for (f1, coords1) in faces_b.iter().enumerate() {
            outcome.face_pairs_tested += 1;
            let Some(coords1) = coords1 else {
                outcome.degenerate_face_pairs += 1;
                continue;
            };

            match face_face_interfaces(&frame, &p0, coords1, tmax, amin) {
                Ok(found) => outcome.interfaces.extend(found),
                Err(e) => {
                    debug!("Skipping face pair ({}, {}): {}", f0, f1, e);
                    outcome.degenerate_face_pairs += 1;
                }
            }
        }
    }

    outcome
}

/// Local in-plane coordinates and height of a point in a frame.
#[inline]
fn project(frame: &Frame, p: &Point3<f64>) -> (Point2<f64>, f64) {
    let local = frame.to_local(p);
    (Point2::new(local.x, local.y), local.z)
}

/// Interfaces between one base face (already in its own frame) and one
/// neighbour face.
fn face_face_interfaces(
    frame: &Frame,
    p0: &[Point2<f64>],
    coords1: &[Point3<f64>],
    tmax: f64,
    amin: f64,
) -> AssemblyResult<Vec<Interface>> {
    let mut p1 = Vec::with_capacity(coords1.len());
    for p in coords1 {
        let (xy, height) = project(frame, p);
        if !(height.abs() <= tmax) {
            return Ok(Vec::new());
        }
        p1.push(xy);
    }

    if polygon_area_2d(&p1) < amin {
        return Ok(Vec::new());
    }

    let parts = intersect(p0, &p1)?;

    let interfaces = parts
        .into_iter()
        .filter_map(|part| {
            let size = polygon_area_2d(&part);
            if size < amin {
                return None;
            }
            let points: Vec<Point3<f64>> = part.iter().map(|p| frame.lift(p)).collect();
            let interface_frame = Frame {
                point: polygon_centroid(&points),
                xaxis: frame.xaxis,
                yaxis: frame.yaxis,
            };
            Some(Interface::face_face(points, size, interface_frame))
        })
        .collect();

    Ok(interfaces)
}
