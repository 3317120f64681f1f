use nalgebra::{DMatrix, DVector, Isometry3, Vector3, Vector4};
use serde::{Serialize, Deserialize};
use crate::optimization::cost_accumulator::NUM_WAYPOINT_COST_COMPONENTS;

/// The kind of decision variable a derivative probe perturbs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DerivativeVariableType {
    Position,
    Velocity,
    Contact
}

/// Committed per-waypoint state of the last full evaluation.
///
/// Per-segment quantities are indexed `[point][segment]`, contact quantities
/// `[contact][point]`, and the cost matrix has one row per waypoint and one column per
/// per-waypoint cost component.
#[derive(Clone, Debug)]
pub struct EvaluationData {
    pub(crate) segment_frames: Vec<Vec<Isometry3<f64>>>,
    pub(crate) link_positions: Vec<Vec<Vector3<f64>>>,
    pub(crate) link_velocities: Vec<Vec<Vector3<f64>>>,
    pub(crate) link_angular_velocities: Vec<Vec<Vector3<f64>>>,
    pub(crate) com_positions: Vec<Vector3<f64>>,
    pub(crate) com_velocities: Vec<Vector3<f64>>,
    pub(crate) com_accelerations: Vec<Vector3<f64>>,
    pub(crate) angular_momentums: Vec<Vector3<f64>>,
    pub(crate) torques: Vec<Vector3<f64>>,
    pub(crate) contact_violation_vectors: Vec<Vec<Vector4<f64>>>,
    pub(crate) contact_point_velocities: Vec<Vec<Vector3<f64>>>,
    pub(crate) state_costs: DMatrix<f64>,
    pub(crate) point_validity: Vec<bool>,
    pub(crate) smoothness_cost: f64,
    pub(crate) trajectory_cost: f64
}
impl EvaluationData {
    pub fn new(num_points: usize, num_segments: usize, num_contacts: usize) -> Self {
        Self {
            segment_frames: vec![vec![Isometry3::identity(); num_segments]; num_points],
            link_positions: vec![vec![Vector3::zeros(); num_segments]; num_points],
            link_velocities: vec![vec![Vector3::zeros(); num_segments]; num_points],
            link_angular_velocities: vec![vec![Vector3::zeros(); num_segments]; num_points],
            com_positions: vec![Vector3::zeros(); num_points],
            com_velocities: vec![Vector3::zeros(); num_points],
            com_accelerations: vec![Vector3::zeros(); num_points],
            angular_momentums: vec![Vector3::zeros(); num_points],
            torques: vec![Vector3::zeros(); num_points],
            contact_violation_vectors: vec![vec![Vector4::zeros(); num_points]; num_contacts],
            contact_point_velocities: vec![vec![Vector3::zeros(); num_points]; num_contacts],
            state_costs: DMatrix::zeros(num_points, NUM_WAYPOINT_COST_COMPONENTS),
            point_validity: vec![true; num_points],
            smoothness_cost: 0.0,
            trajectory_cost: 0.0
        }
    }
    pub fn num_points(&self) -> usize {
        self.point_validity.len()
    }
    pub fn segment_frames(&self) -> &Vec<Vec<Isometry3<f64>>> {
        &self.segment_frames
    }
    pub fn com_positions(&self) -> &Vec<Vector3<f64>> {
        &self.com_positions
    }
    pub fn com_accelerations(&self) -> &Vec<Vector3<f64>> {
        &self.com_accelerations
    }
    pub fn angular_momentums(&self) -> &Vec<Vector3<f64>> {
        &self.angular_momentums
    }
    pub fn torques(&self) -> &Vec<Vector3<f64>> {
        &self.torques
    }
    pub fn contact_violation_vectors(&self) -> &Vec<Vec<Vector4<f64>>> {
        &self.contact_violation_vectors
    }
    pub fn state_costs(&self) -> &DMatrix<f64> {
        &self.state_costs
    }
    pub fn state_costs_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.state_costs
    }
    pub fn point_validity(&self) -> &Vec<bool> {
        &self.point_validity
    }
    pub fn point_validity_mut(&mut self) -> &mut Vec<bool> {
        &mut self.point_validity
    }
    pub fn smoothness_cost(&self) -> f64 {
        self.smoothness_cost
    }
    pub fn set_smoothness_cost(&mut self, smoothness_cost: f64) {
        self.smoothness_cost = smoothness_cost;
    }
    pub fn trajectory_cost(&self) -> f64 {
        self.trajectory_cost
    }
}

/// Scratch copy of every windowed field of `EvaluationData`, plus the value of the perturbed
/// variable, taken right before a derivative probe overwrites them.
#[derive(Clone, Debug)]
pub struct EvaluationBackup {
    pub(crate) window_start: usize,
    pub(crate) window_end: usize,
    pub(crate) variable: Option<(DerivativeVariableType, usize, usize)>,
    pub(crate) old_value: f64,
    pub(crate) old_trajectory_row: DVector<f64>,
    segment_frames: Vec<Vec<Isometry3<f64>>>,
    link_positions: Vec<Vec<Vector3<f64>>>,
    link_velocities: Vec<Vec<Vector3<f64>>>,
    link_angular_velocities: Vec<Vec<Vector3<f64>>>,
    com_positions: Vec<Vector3<f64>>,
    com_velocities: Vec<Vector3<f64>>,
    com_accelerations: Vec<Vector3<f64>>,
    angular_momentums: Vec<Vector3<f64>>,
    torques: Vec<Vector3<f64>>,
    contact_violation_vectors: Vec<Vec<Vector4<f64>>>,
    contact_point_velocities: Vec<Vec<Vector3<f64>>>,
    pub(crate) state_costs: DMatrix<f64>,
    point_validity: Vec<bool>,
    pub(crate) smoothness_cost: f64,
    pub(crate) trajectory_cost: f64
}
impl EvaluationBackup {
    pub fn new() -> Self {
        Self {
            window_start: 0,
            window_end: 0,
            variable: None,
            old_value: 0.0,
            old_trajectory_row: DVector::zeros(0),
            segment_frames: vec![],
            link_positions: vec![],
            link_velocities: vec![],
            link_angular_velocities: vec![],
            com_positions: vec![],
            com_velocities: vec![],
            com_accelerations: vec![],
            angular_momentums: vec![],
            torques: vec![],
            contact_violation_vectors: vec![],
            contact_point_velocities: vec![],
            state_costs: DMatrix::zeros(0, NUM_WAYPOINT_COST_COMPONENTS),
            point_validity: vec![],
            smoothness_cost: 0.0,
            trajectory_cost: 0.0
        }
    }
    pub fn is_active(&self) -> bool {
        self.variable.is_some()
    }
    /// Copies waypoints `start..=end` of `data` together with its committed scalars.
    pub fn capture(&mut self, data: &EvaluationData, start: usize, end: usize) {
        self.window_start = start;
        self.window_end = end;

        copy_window(&mut self.segment_frames, &data.segment_frames, start, end);
        copy_window(&mut self.link_positions, &data.link_positions, start, end);
        copy_window(&mut self.link_velocities, &data.link_velocities, start, end);
        copy_window(&mut self.link_angular_velocities, &data.link_angular_velocities, start, end);
        copy_window(&mut self.com_positions, &data.com_positions, start, end);
        copy_window(&mut self.com_velocities, &data.com_velocities, start, end);
        copy_window(&mut self.com_accelerations, &data.com_accelerations, start, end);
        copy_window(&mut self.angular_momentums, &data.angular_momentums, start, end);
        copy_window(&mut self.torques, &data.torques, start, end);
        copy_window(&mut self.point_validity, &data.point_validity, start, end);

        self.contact_violation_vectors.resize(data.contact_violation_vectors.len(), vec![]);
        for (dst, src) in self.contact_violation_vectors.iter_mut().zip(data.contact_violation_vectors.iter()) {
            copy_window(dst, src, start, end);
        }
        self.contact_point_velocities.resize(data.contact_point_velocities.len(), vec![]);
        for (dst, src) in self.contact_point_velocities.iter_mut().zip(data.contact_point_velocities.iter()) {
            copy_window(dst, src, start, end);
        }

        self.state_costs = data.state_costs.rows(start, end - start + 1).into_owned();
        self.smoothness_cost = data.smoothness_cost;
        self.trajectory_cost = data.trajectory_cost;
    }
    /// Writes the captured window and scalars back into `data`.
    pub fn restore_into(&self, data: &mut EvaluationData) {
        let start = self.window_start;

        restore_window(&mut data.segment_frames, &self.segment_frames, start);
        restore_window(&mut data.link_positions, &self.link_positions, start);
        restore_window(&mut data.link_velocities, &self.link_velocities, start);
        restore_window(&mut data.link_angular_velocities, &self.link_angular_velocities, start);
        restore_window(&mut data.com_positions, &self.com_positions, start);
        restore_window(&mut data.com_velocities, &self.com_velocities, start);
        restore_window(&mut data.com_accelerations, &self.com_accelerations, start);
        restore_window(&mut data.angular_momentums, &self.angular_momentums, start);
        restore_window(&mut data.torques, &self.torques, start);
        restore_window(&mut data.point_validity, &self.point_validity, start);
        for (dst, src) in data.contact_violation_vectors.iter_mut().zip(self.contact_violation_vectors.iter()) {
            restore_window(dst, src, start);
        }
        for (dst, src) in data.contact_point_velocities.iter_mut().zip(self.contact_point_velocities.iter()) {
            restore_window(dst, src, start);
        }

        data.state_costs.rows_mut(start, self.state_costs.nrows()).copy_from(&self.state_costs);
        data.smoothness_cost = self.smoothness_cost;
        data.trajectory_cost = self.trajectory_cost;
    }
}

fn copy_window<T: Clone>(dst: &mut Vec<T>, src: &[T], start: usize, end: usize) {
    dst.clear();
    dst.extend_from_slice(&src[start..=end]);
}

fn restore_window<T: Clone>(dst: &mut [T], src: &[T], start: usize) {
    dst[start..start + src.len()].clone_from_slice(src);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_then_restore_recovers_window() {
        let mut data = EvaluationData::new(6, 2, 1);
        data.com_positions[3] = Vector3::new(1.0, 2.0, 3.0);
        data.state_costs[(3, 0)] = 4.0;
        data.contact_violation_vectors[0][2] = Vector4::new(1.0, 0.0, 0.0, 0.5);
        data.trajectory_cost = 7.0;
        let reference = data.clone();

        let mut backup = EvaluationBackup::new();
        backup.capture(&data, 2, 4);

        data.com_positions[3] = Vector3::zeros();
        data.state_costs[(3, 0)] = -1.0;
        data.contact_violation_vectors[0][2] = Vector4::zeros();
        data.point_validity[4] = false;
        data.trajectory_cost = 0.0;

        backup.restore_into(&mut data);
        assert_eq!(data.com_positions, reference.com_positions);
        assert_eq!(data.state_costs, reference.state_costs);
        assert_eq!(data.contact_violation_vectors, reference.contact_violation_vectors);
        assert_eq!(data.point_validity, reference.point_validity);
        assert_eq!(data.trajectory_cost, 7.0);
    }
}
