use nalgebra::{UnitQuaternion, Vector3};
use serde::{Serialize, Deserialize};

/// Requires the origin of a segment to stay at `target` along the constrained axes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PositionConstraint {
    pub segment_name: String,
    pub target: Vector3<f64>,
    #[serde(default = "all_axes")]
    pub constrained_axes: [bool; 3],
    #[serde(default = "unit_weight")]
    pub weight: f64
}
impl PositionConstraint {
    pub fn new(segment_name: &str, target: Vector3<f64>) -> Self {
        Self {
            segment_name: segment_name.to_string(),
            target,
            constrained_axes: all_axes(),
            weight: unit_weight()
        }
    }
    pub fn with_constrained_axes(mut self, constrained_axes: [bool; 3]) -> Self {
        self.constrained_axes = constrained_axes;
        self
    }
}

/// Requires the orientation of a segment to stay at `target`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OrientationConstraint {
    pub segment_name: String,
    pub target: UnitQuaternion<f64>,
    #[serde(default = "unit_weight")]
    pub weight: f64
}
impl OrientationConstraint {
    pub fn new(segment_name: &str, target: UnitQuaternion<f64>) -> Self {
        Self {
            segment_name: segment_name.to_string(),
            target,
            weight: unit_weight()
        }
    }
}

/// Constraints that hold along the whole interior of the trajectory.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PathConstraints {
    #[serde(default)]
    pub position_constraints: Vec<PositionConstraint>,
    #[serde(default)]
    pub orientation_constraints: Vec<OrientationConstraint>
}
impl PathConstraints {
    pub fn new_empty() -> Self {
        Self::default()
    }
    pub fn is_empty(&self) -> bool {
        self.position_constraints.is_empty() && self.orientation_constraints.is_empty()
    }
}

fn all_axes() -> [bool; 3] { [true, true, true] }
fn unit_weight() -> f64 { 1.0 }
