//! Contact interfaces between blocks.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::polygon::{polygon_area, polygon_centroid, polygon_normal};

/// Kind of contact an interface represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceKind {
    /// Planar overlap of two block faces.
    #[default]
    FaceFace,
}

/// Contact force components at one interface point.
///
/// Filled in by an equilibrium solver; detection and merging never set it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InterfaceForce {
    /// Compressive normal component.
    pub c_np: f64,
    /// Tensile normal component.
    pub c_nn: f64,
    /// Friction component along the frame x-axis.
    pub c_u: f64,
    /// Friction component along the frame y-axis.
    pub c_v: f64,
}

/// A planar polygonal contact region between two blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    #[serde(rename = "type", default)]
    pub kind: InterfaceKind,

    /// Corner points of the contact polygon. The loop is implicitly closed.
    pub points: Vec<Point3<f64>>,

    /// Area of the contact polygon.
    pub size: f64,

    /// Local frame; its z-axis is the contact normal.
    pub frame: Frame,

    /// Per-point forces, one entry per corner point once solved.
    #[serde(default)]
    pub forces: Option<Vec<InterfaceForce>>,
}

impl Interface {
    /// Create a face-face interface with no forces.
    pub fn face_face(points: Vec<Point3<f64>>, size: f64, frame: Frame) -> Self {
        Self {
            kind: InterfaceKind::FaceFace,
            points,
            size,
            frame,
            forces: None,
        }
    }

    /// Area recomputed from `points`.
    #[inline]
    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    /// Area centroid of the contact polygon.
    #[inline]
    pub fn centroid(&self) -> Point3<f64> {
        polygon_centroid(&self.points)
    }

    /// Contact normal (the frame z-axis).
    #[inline]
    pub fn normal(&self) -> Vector3<f64> {
        self.frame.zaxis()
    }

    /// Normal implied by the winding of `points`, if the polygon is not degenerate.
    pub fn winding_normal(&self) -> Option<Vector3<f64>> {
        polygon_normal(&self.points)
    }

    #[inline]
    pub fn point_count(&self) -> usize {
        self.points.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_square() -> Interface {
        Interface::face_face(
            vec![
                Point3::new(0.0, 0.0, 1.0),
                Point3::new(1.0, 0.0, 1.0),
                Point3::new(1.0, 1.0, 1.0),
                Point3::new(0.0, 1.0, 1.0),
            ],
            1.0,
            Frame {
                point: Point3::new(0.5, 0.5, 1.0),
                xaxis: Vector3::x(),
                yaxis: Vector3::y(),
            },
        )
    }

    #[test]
    fn test_derived_values() {
        let i = unit_square();
        assert_relative_eq!(i.area(), 1.0);
        assert_relative_eq!(i.centroid(), Point3::new(0.5, 0.5, 1.0), epsilon = 1e-12);
        assert_relative_eq!(i.normal(), Vector3::z());
        assert_eq!(i.point_count(), 4);
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(unit_square()).unwrap();
        assert_eq!(json["type"], "face_face");
        assert!(json["forces"].is_null());
        assert_eq!(json["size"], 1.0);
    }

    #[test]
    fn test_forces_roundtrip() {
        let mut i = unit_square();
        i.forces = Some(vec![
            InterfaceForce {
                c_np: 1.5,
                ..Default::default()
            };
            4
        ]);
        let text = serde_json::to_string(&i).unwrap();
        let back: Interface = serde_json::from_str(&text).unwrap();
        assert_eq!(back, i);
    }
}
