//! k-nearest-neighbour queries over point sets.
//!
//! Backed by an R-tree built once with bulk loading and read-only afterwards.
//! Results are fully deterministic: neighbours are ordered by distance, ties
//! by index, and a query point always reports itself first.

use nalgebra::Point3;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::error::{AssemblyError, AssemblyResult};

/// A point stored in the R-tree, tagged with its input index.
#[derive(Debug, Clone, Copy)]
struct SpatialEntry {
    coords: [f64; 3],
    index: usize,
}

impl RTreeObject for SpatialEntry {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.coords)
    }
}

impl PointDistance for SpatialEntry {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let dx = self.coords[0] - point[0];
        let dy = self.coords[1] - point[1];
        let dz = self.coords[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// One neighbour of a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index of the neighbour in the input point list.
    pub index: usize,
    /// Euclidean distance to the query point.
    pub distance: f64,
}

/// Spatial index answering k-nearest-neighbour queries by point index.
#[derive(Debug)]
pub struct NearestNeighbors {
    tree: RTree<SpatialEntry>,
    points: Vec<[f64; 3]>,
    finite: Vec<bool>,
}

impl NearestNeighbors {
    /// Build the index.
    ///
    /// With `dims == 2` the Z coordinate is ignored. Points with non-finite
    /// coordinates are kept out of the tree.
    ///
    /// # Errors
    /// [`AssemblyError::Configuration`] if `dims` is not 2 or 3.
    pub fn build(points: &[Point3<f64>], dims: usize) -> AssemblyResult<Self> {
        if dims != 2 && dims != 3 {
            return Err(AssemblyError::configuration(format!(
                "nearest neighbour dimension must be 2 or 3, got {}",
                dims
            )));
        }

        let points: Vec<[f64; 3]> = points
            .iter()
            .map(|p| [p.x, p.y, if dims == 2 { 0.0 } else { p.z }])
            .collect();
        let finite: Vec<bool> = points
            .iter()
            .map(|c| c.iter().all(|v| v.is_finite()))
            .collect();

        let entries: Vec<SpatialEntry> = points
            .iter()
            .enumerate()
            .filter(|(i, _)| finite[*i])
            .map(|(index, &coords)| SpatialEntry { coords, index })
            .collect();

        Ok(Self {
            tree: RTree::bulk_load(entries),
            points,
            finite,
        })
    }

    /// Number of indexed points (including non-finite ones).
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Up to `nmax` nearest neighbours of point `index`, the point itself included.
    ///
    /// `nmax` is clamped to the number of points. Points that share the cutoff
    /// distance are ranked by index, with the query point ahead of any other.
    /// A non-finite point only reports itself. An out-of-range index or
    /// `nmax == 0` yields an empty list.
    pub fn query(&self, index: usize, nmax: usize) -> Vec<Neighbor> {
        let Some(&query) = self.points.get(index) else {
            return Vec::new();
        };
        let nmax = nmax.min(self.points.len());
        if nmax == 0 {
            return Vec::new();
        }
        if !self.finite[index] {
            return vec![Neighbor {
                index,
                distance: 0.0,
            }];
        }

        // Collect past nmax while the distance is still tied so the cut is
        // independent of the tree's internal order.
        let mut candidates: Vec<(f64, usize)> = Vec::with_capacity(nmax + 1);
        for (entry, d2) in self.tree.nearest_neighbor_iter_with_distance_2(&query) {
            if candidates.len() >= nmax {
                if let Some(&(last, _)) = candidates.last() {
                    if d2 > last {
                        break;
                    }
                }
            }
            candidates.push((d2, entry.index));
        }

        candidates.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then_with(|| (a.1 != index).cmp(&(b.1 != index)))
                .then_with(|| a.1.cmp(&b.1))
        });
        candidates.truncate(nmax);

        candidates
            .into_iter()
            .map(|(d2, i)| Neighbor {
                index: i,
                distance: d2.sqrt(),
            })
            .collect()
    }
}

/// Nearest neighbours of every point, as index lists.
pub fn find_nearest_neighbours(
    points: &[Point3<f64>],
    nmax: usize,
    dims: usize,
) -> AssemblyResult<Vec<Vec<usize>>> {
    let index = NearestNeighbors::build(points, dims)?;
    Ok((0..points.len())
        .map(|i| index.query(i, nmax).into_iter().map(|n| n.index).collect())
        .collect())
}
