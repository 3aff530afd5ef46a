//! Local orthonormal coordinate frames.

use nalgebra::{Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// An origin with two orthonormal in-plane axes.
///
/// The third axis is derived as `xaxis × yaxis`, so every frame is right-handed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Origin of the frame.
    pub point: Point3<f64>,

    /// First unit axis.
    pub xaxis: Vector3<f64>,

    /// Second unit axis, orthogonal to `xaxis`.
    pub yaxis: Vector3<f64>,
}

impl Frame {
    /// The world XY frame at the origin.
    pub fn world_xy() -> Self {
        Self {
            point: Point3::origin(),
            xaxis: Vector3::x(),
            yaxis: Vector3::y(),
        }
    }

    /// Build a frame from an origin and two (not necessarily orthonormal) axes.
    ///
    /// `yaxis` is orthogonalized against `xaxis`. Returns `None` if the axes are
    /// zero-length or parallel.
    pub fn from_axes(point: Point3<f64>, xaxis: Vector3<f64>, yaxis: Vector3<f64>) -> Option<Self> {
        let x = xaxis.try_normalize(f64::EPSILON)?;
        let y = (yaxis - x * yaxis.dot(&x)).try_normalize(f64::EPSILON)?;
        Some(Self {
            point,
            xaxis: x,
            yaxis: y,
        })
    }

    /// Build a frame on a plane given by a point and a normal.
    ///
    /// The in-plane axes are chosen deterministically from the normal alone.
    /// Returns `None` for a zero normal.
    pub fn from_plane(point: Point3<f64>, normal: Vector3<f64>) -> Option<Self> {
        let n = normal.try_normalize(f64::EPSILON)?;
        let helper = if n.z.abs() < 0.9 {
            Vector3::z()
        } else {
            Vector3::x()
        };
        let x = helper.cross(&n).try_normalize(f64::EPSILON)?;
        let y = n.cross(&x);
        Some(Self {
            point,
            xaxis: x,
            yaxis: y,
        })
    }

    /// Unit normal of the frame plane.
    #[inline]
    pub fn zaxis(&self) -> Vector3<f64> {
        self.xaxis.cross(&self.yaxis)
    }

    /// Express a world point in frame coordinates.
    pub fn to_local(&self, p: &Point3<f64>) -> Point3<f64> {
        let d = p - self.point;
        Point3::new(d.dot(&self.xaxis), d.dot(&self.yaxis), d.dot(&self.zaxis()))
    }

    /// Map frame coordinates back to world space.
    pub fn to_world(&self, p: &Point3<f64>) -> Point3<f64> {
        self.point + self.xaxis * p.x + self.yaxis * p.y + self.zaxis() * p.z
    }

    /// Map in-plane frame coordinates (z = 0) back to world space.
    #[inline]
    pub fn lift(&self, p: &Point2<f64>) -> Point3<f64> {
        self.point + self.xaxis * p.x + self.yaxis * p.y
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::world_xy()
    }
}
