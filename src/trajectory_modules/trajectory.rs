use std::ops::Range;
use nalgebra::{DMatrix, DVector};
use serde::{Serialize, Deserialize};
use crate::robot_modules::robot_kinematics_module::PlanningGroup;
use crate::trajectory_modules::path_constraints::PathConstraints;
use crate::trajectory_modules::trajectory_seed_module::CartesianPathResolver;
use crate::utils::utils_errors::PlannerError;
use crate::utils::utils_math::interpolation::MinJerkCurve;

/// Joint positions over uniformly discretized time, plus a coarser matrix of contact
/// activations with one row per contact phase boundary.
///
/// Waypoint 0 and waypoint `num_points - 1` are the fixed start and goal.  Contact rows 0 and
/// `num_contact_phases` are fixed as well; everything in between is free for optimization.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Trajectory {
    duration: f64,
    discretization: f64,
    phase_duration: f64,
    num_points: usize,
    num_joints: usize,
    num_contacts: usize,
    num_contact_phases: usize,
    num_points_per_phase: usize,
    trajectory: DMatrix<f64>,
    velocities: DMatrix<f64>,
    contact_trajectory: DMatrix<f64>
}
impl Trajectory {
    pub fn new(num_joints: usize, duration: f64, discretization: f64, num_contacts: usize, phase_duration: f64) -> Result<Self, PlannerError> {
        if !(discretization > 0.0) {
            return Err(PlannerError::new_invalid_configuration_error("trajectory_discretization", "Must be positive.", file!(), line!()));
        }
        if !(duration > 0.0) {
            return Err(PlannerError::new_invalid_configuration_error("trajectory_duration", "Must be positive.", file!(), line!()));
        }
        if phase_duration < discretization {
            return Err(PlannerError::new_invalid_configuration_error("phase_duration", "Must be at least one discretization step.", file!(), line!()));
        }

        let num_points = (duration / discretization).round() as usize + 1;
        if num_points < 2 {
            return Err(PlannerError::new_invalid_configuration_error("trajectory_duration", "Must span at least one discretization step.", file!(), line!()));
        }
        let num_points_per_phase = ((phase_duration / discretization).round() as usize).max(1);
        let num_contact_phases = (num_points - 1 + num_points_per_phase - 1) / num_points_per_phase;

        Ok(Self {
            duration,
            discretization,
            phase_duration,
            num_points,
            num_joints,
            num_contacts,
            num_contact_phases,
            num_points_per_phase,
            trajectory: DMatrix::zeros(num_points, num_joints),
            velocities: DMatrix::zeros(num_points, num_joints),
            contact_trajectory: DMatrix::zeros(num_contact_phases + 1, num_contacts)
        })
    }
    pub fn duration(&self) -> f64 { self.duration }
    pub fn discretization(&self) -> f64 { self.discretization }
    pub fn phase_duration(&self) -> f64 { self.phase_duration }
    pub fn num_points(&self) -> usize { self.num_points }
    pub fn num_joints(&self) -> usize { self.num_joints }
    pub fn num_contacts(&self) -> usize { self.num_contacts }
    pub fn num_contact_phases(&self) -> usize { self.num_contact_phases }
    pub fn num_points_per_phase(&self) -> usize { self.num_points_per_phase }
    /// First free waypoint.
    pub fn start_idx(&self) -> usize { 1 }
    /// Last free waypoint.
    pub fn end_idx(&self) -> usize { self.num_points.saturating_sub(2) }
    pub fn free_points(&self) -> Range<usize> { 1..self.num_points - 1 }
    pub fn free_contact_rows(&self) -> Range<usize> { 1..self.num_contact_phases }
    /// The contact row that governs a waypoint.  The goal waypoint alone uses the last row.
    pub fn contact_phase_idx(&self, point: usize) -> usize {
        if point + 1 >= self.num_points { return self.num_contact_phases; }
        (point / self.num_points_per_phase).min(self.num_contact_phases)
    }
    /// Inclusive range of waypoints governed by a contact row.
    pub fn contact_phase_point_range(&self, row: usize) -> (usize, usize) {
        if row >= self.num_contact_phases { return (self.num_points - 1, self.num_points - 1); }
        let start = row * self.num_points_per_phase;
        let end = ((row + 1) * self.num_points_per_phase - 1).min(self.num_points - 2);
        (start, end)
    }
    pub fn position(&self, point: usize, joint: usize) -> f64 { self.trajectory[(point, joint)] }
    pub fn set_position(&mut self, point: usize, joint: usize, value: f64) { self.trajectory[(point, joint)] = value; }
    pub fn velocity(&self, point: usize, joint: usize) -> f64 { self.velocities[(point, joint)] }
    pub fn set_velocity(&mut self, point: usize, joint: usize, value: f64) { self.velocities[(point, joint)] = value; }
    pub fn contact_value(&self, row: usize, contact: usize) -> f64 { self.contact_trajectory[(row, contact)] }
    pub fn set_contact_value(&mut self, row: usize, contact: usize, value: f64) { self.contact_trajectory[(row, contact)] = value; }
    /// Activation of a contact at a waypoint, read from the contact row of its phase.
    pub fn activation(&self, point: usize, contact: usize) -> f64 {
        self.contact_trajectory[(self.contact_phase_idx(point), contact)]
    }
    pub fn trajectory_point(&self, point: usize) -> DVector<f64> {
        self.trajectory.row(point).transpose()
    }
    pub fn set_trajectory_point(&mut self, point: usize, state: &DVector<f64>) -> Result<(), PlannerError> {
        PlannerError::new_check_for_idx_out_of_bound_error(point, self.num_points, file!(), line!())?;
        if state.len() != self.num_joints {
            return Err(PlannerError::new_vec_wrong_size_error("set_trajectory_point", state.len(), self.num_joints, file!(), line!()));
        }
        self.trajectory.set_row(point, &state.transpose());
        Ok(())
    }
    pub fn velocity_point(&self, point: usize) -> DVector<f64> {
        self.velocities.row(point).transpose()
    }
    pub fn contact_trajectory_point(&self, row: usize) -> DVector<f64> {
        self.contact_trajectory.row(row).transpose()
    }
    pub fn set_contact_trajectory_point(&mut self, row: usize, values: &[f64]) -> Result<(), PlannerError> {
        PlannerError::new_check_for_idx_out_of_bound_error(row, self.num_contact_phases + 1, file!(), line!())?;
        if values.len() != self.num_contacts {
            return Err(PlannerError::new_vec_wrong_size_error("set_contact_trajectory_point", values.len(), self.num_contacts, file!(), line!()));
        }
        for (c, v) in values.iter().enumerate() { self.contact_trajectory[(row, c)] = *v; }
        Ok(())
    }
    pub fn trajectory_matrix(&self) -> &DMatrix<f64> { &self.trajectory }
    pub fn velocity_matrix(&self) -> &DMatrix<f64> { &self.velocities }
    pub fn contact_matrix(&self) -> &DMatrix<f64> { &self.contact_trajectory }
    /// Sets every waypoint to `state` and clears all velocities.
    pub fn fill_all_points(&mut self, state: &DVector<f64>) -> Result<(), PlannerError> {
        if state.len() != self.num_joints {
            return Err(PlannerError::new_vec_wrong_size_error("fill_all_points", state.len(), self.num_joints, file!(), line!()));
        }
        for point in 0..self.num_points { self.trajectory.set_row(point, &state.transpose()); }
        self.velocities.fill(0.0);
        Ok(())
    }
    /// First contact row takes `initial_values`, the last takes `goal_values` and the interior
    /// rows start from `initial_values`.
    pub fn set_contact_boundary_values(&mut self, initial_values: &[f64], goal_values: &[f64]) -> Result<(), PlannerError> {
        for row in 0..self.num_contact_phases {
            self.set_contact_trajectory_point(row, initial_values)?;
        }
        self.set_contact_trajectory_point(self.num_contact_phases, goal_values)
    }

    /// Fills the free waypoints of the group joints with a rest-to-rest minimum-jerk profile
    /// from the start waypoint to the goal waypoint.
    pub fn fill_in_min_jerk(&mut self, group_joints: &[usize], start_vel: &DVector<f64>, start_acc: &DVector<f64>) -> Result<(), PlannerError> {
        self.fill_in_min_jerk_via_points(group_joints, &[], start_vel, start_acc)
    }
    /// Fills the group joints from a precomputed path.  The seed is picked by trial index and its
    /// interior milestones become via points.  With no seeds this is `fill_in_min_jerk`.
    pub fn fill_in_min_jerk_with_seed(&mut self, trial_idx: usize, group_joints: &[usize], seeds: &[Vec<DVector<f64>>], start_vel: &DVector<f64>, start_acc: &DVector<f64>) -> Result<(), PlannerError> {
        if seeds.is_empty() {
            return self.fill_in_min_jerk(group_joints, start_vel, start_acc);
        }
        let seed = &seeds[trial_idx % seeds.len()];
        let interior: &[DVector<f64>] = if seed.len() > 2 { &seed[1..seed.len() - 1] } else { &[] };
        let via_points = self.subsample_via_points(interior);
        self.fill_in_min_jerk_via_points(group_joints, &via_points, start_vel, start_acc)
    }
    /// Fills the group joints through configurations that a resolver derived from the path
    /// constraints.  An unresolvable path is a `MalformedSeed` error.
    pub fn fill_in_min_jerk_cartesian(&mut self,
                                      group: &PlanningGroup,
                                      start_vel: &DVector<f64>,
                                      start_acc: &DVector<f64>,
                                      path_constraints: &PathConstraints,
                                      resolver: Option<&dyn CartesianPathResolver>) -> Result<(), PlannerError> {
        let resolver = match resolver {
            None => {
                return Err(PlannerError::new_malformed_seed_error(&format!("No Cartesian path resolver is available for group {}.", group.name()), file!(), line!()));
            }
            Some(r) => { r }
        };
        let start_state = self.trajectory_point(0);
        let goal_state = self.trajectory_point(self.num_points - 1);
        let path = match resolver.resolve_path(group, path_constraints, &start_state, &goal_state) {
            None => {
                return Err(PlannerError::new_malformed_seed_error(&format!("Cartesian path of group {} could not be resolved.", group.name()), file!(), line!()));
            }
            Some(path) => { path }
        };
        let via_points = self.subsample_via_points(&path);
        self.fill_in_min_jerk_via_points(group.joint_idxs(), &via_points, start_vel, start_acc)
    }
    /// Piecewise quintic fill through evenly spaced via points.  Interior knots get the central
    /// difference velocity of their neighbors and zero acceleration, so the result is C2.
    pub fn fill_in_min_jerk_via_points(&mut self, group_joints: &[usize], via_points: &[DVector<f64>], start_vel: &DVector<f64>, start_acc: &DVector<f64>) -> Result<(), PlannerError> {
        let n = self.num_points;
        for j in group_joints {
            PlannerError::new_check_for_idx_out_of_bound_error(*j, self.num_joints, file!(), line!())?;
        }
        if start_vel.len() != self.num_joints {
            return Err(PlannerError::new_vec_wrong_size_error("fill_in_min_jerk", start_vel.len(), self.num_joints, file!(), line!()));
        }
        if start_acc.len() != self.num_joints {
            return Err(PlannerError::new_vec_wrong_size_error("fill_in_min_jerk", start_acc.len(), self.num_joints, file!(), line!()));
        }
        if via_points.len() + 2 > n {
            return Err(PlannerError::new_malformed_seed_error(&format!("{} via points do not fit between the boundaries of {} waypoints.", via_points.len(), n), file!(), line!()));
        }
        for via_point in via_points {
            if via_point.len() != self.num_joints {
                return Err(PlannerError::new_malformed_seed_error(&format!("Via point has {} values instead of {}.", via_point.len(), self.num_joints), file!(), line!()));
            }
            if via_point.iter().any(|v| !v.is_finite()) {
                return Err(PlannerError::new_malformed_seed_error("Via point contains a non-finite value.", file!(), line!()));
            }
        }

        let m = via_points.len();
        let spacing = (n - 1) as f64 / (m + 1) as f64;
        let mut knot_idxs = vec![0];
        for k in 1..=m { knot_idxs.push((k as f64 * spacing).round() as usize); }
        knot_idxs.push(n - 1);
        let knot_times: Vec<f64> = knot_idxs.iter().map(|i| *i as f64 * self.discretization).collect();

        for j in group_joints {
            let j = *j;
            let mut positions = vec![self.trajectory[(0, j)]];
            for via_point in via_points { positions.push(via_point[j]); }
            positions.push(self.trajectory[(n - 1, j)]);

            let num_knots = positions.len();
            let mut velocities = vec![0.0; num_knots];
            let mut accelerations = vec![0.0; num_knots];
            velocities[0] = start_vel[j];
            accelerations[0] = start_acc[j];
            for k in 1..num_knots - 1 {
                velocities[k] = (positions[k + 1] - positions[k - 1]) / (knot_times[k + 1] - knot_times[k - 1]);
            }

            for k in 0..num_knots - 1 {
                let curve = MinJerkCurve::new(positions[k], velocities[k], accelerations[k],
                                              positions[k + 1], velocities[k + 1], accelerations[k + 1],
                                              knot_times[k + 1] - knot_times[k]);
                for i in knot_idxs[k]..=knot_idxs[k + 1] {
                    let t = (i - knot_idxs[k]) as f64 * self.discretization;
                    if i > 0 && i < n - 1 {
                        self.trajectory[(i, j)] = curve.position(t);
                    }
                    self.velocities[(i, j)] = curve.velocity(t);
                }
            }
            self.velocities[(0, j)] = start_vel[j];
            self.velocities[(n - 1, j)] = 0.0;
        }

        Ok(())
    }
    fn subsample_via_points(&self, via_points: &[DVector<f64>]) -> Vec<DVector<f64>> {
        let max_via_points = self.num_points.saturating_sub(2);
        if via_points.len() <= max_via_points { return via_points.to_vec(); }
        (0..max_via_points).map(|k| via_points[k * via_points.len() / max_via_points].clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::trajectory_modules::trajectory_seed_module::CartesianPathResolver;

    fn one_joint_trajectory() -> Trajectory {
        let mut t = Trajectory::new(1, 1.0, 0.05, 0, 0.25).unwrap();
        t.set_position(t.num_points() - 1, 0, 1.0);
        t
    }

    #[test]
    fn sizing_follows_discretization() {
        let t = Trajectory::new(2, 1.0, 0.05, 2, 0.25).unwrap();
        assert_eq!(t.num_points(), 21);
        assert_eq!(t.num_points_per_phase(), 5);
        assert_eq!(t.num_contact_phases(), 4);
        assert_eq!(t.contact_matrix().nrows(), 5);
        assert_eq!(t.free_points(), 1..20);
        assert_eq!(t.free_contact_rows(), 1..4);
    }

    #[test]
    fn contact_rows_partition_waypoints() {
        let t = Trajectory::new(1, 1.0, 0.1, 1, 0.3).unwrap();
        assert_eq!(t.num_points(), 11);
        assert_eq!(t.num_contact_phases(), 4);
        let mut covered = vec![0; t.num_points()];
        for row in 0..=t.num_contact_phases() {
            let (s, e) = t.contact_phase_point_range(row);
            for p in s..=e {
                covered[p] += 1;
                assert_eq!(t.contact_phase_idx(p), row);
            }
        }
        assert!(covered.iter().all(|c| *c == 1));
    }

    #[test]
    fn invalid_sizes_are_rejected() {
        assert!(Trajectory::new(1, 1.0, 0.0, 0, 0.25).is_err());
        assert!(Trajectory::new(1, 1.0, 0.1, 0, 0.05).is_err());
        assert!(Trajectory::new(1, -1.0, 0.1, 0, 0.25).is_err());
    }

    #[test]
    fn min_jerk_fill_is_monotone_and_keeps_boundaries() {
        let mut t = one_joint_trajectory();
        let zeros = DVector::zeros(1);
        t.fill_in_min_jerk(&[0], &zeros, &zeros).unwrap();
        assert_eq!(t.position(0, 0), 0.0);
        assert_eq!(t.position(20, 0), 1.0);
        assert_abs_diff_eq!(t.position(10, 0), 0.5, epsilon = 1e-9);
        for i in 1..21 { assert!(t.position(i, 0) >= t.position(i - 1, 0)); }
        assert_abs_diff_eq!(t.velocity(10, 0), 1.875, epsilon = 1e-9);
    }

    #[test]
    fn fill_leaves_non_group_joints_alone() {
        let mut t = Trajectory::new(2, 1.0, 0.1, 0, 0.2).unwrap();
        t.fill_all_points(&DVector::from_vec(vec![0.0, 0.3])).unwrap();
        t.set_position(10, 0, 1.0);
        t.set_position(10, 1, -0.3);
        let zeros = DVector::zeros(2);
        t.fill_in_min_jerk(&[0], &zeros, &zeros).unwrap();
        for i in 0..10 { assert_eq!(t.position(i, 1), 0.3); }
    }

    #[test]
    fn seeded_fill_passes_through_milestone() {
        let mut t = one_joint_trajectory();
        let zeros = DVector::zeros(1);
        let seed = vec![DVector::from_vec(vec![0.0]), DVector::from_vec(vec![2.0]), DVector::from_vec(vec![1.0])];
        t.fill_in_min_jerk_with_seed(3, &[0], &[seed], &zeros, &zeros).unwrap();
        assert_abs_diff_eq!(t.position(10, 0), 2.0, epsilon = 1e-9);
        assert_eq!(t.position(20, 0), 1.0);
    }

    #[test]
    fn seeded_fill_without_seeds_is_plain_min_jerk() {
        let mut a = one_joint_trajectory();
        let mut b = one_joint_trajectory();
        let zeros = DVector::zeros(1);
        a.fill_in_min_jerk(&[0], &zeros, &zeros).unwrap();
        b.fill_in_min_jerk_with_seed(1, &[0], &[], &zeros, &zeros).unwrap();
        assert_eq!(a, b);
    }

    struct FailingResolver;
    impl CartesianPathResolver for FailingResolver {
        fn resolve_path(&self, _group: &PlanningGroup, _path_constraints: &PathConstraints, _start_state: &DVector<f64>, _goal_state: &DVector<f64>) -> Option<Vec<DVector<f64>>> {
            None
        }
    }

    #[test]
    fn unresolvable_cartesian_path_is_malformed_seed() {
        let mut t = one_joint_trajectory();
        let zeros = DVector::zeros(1);
        let group = PlanningGroup::new("arm", vec!["j".to_string()], vec![], None);
        let res = t.fill_in_min_jerk_cartesian(&group, &zeros, &zeros, &PathConstraints::new_empty(), Some(&FailingResolver));
        assert!(res.unwrap_err().is_malformed_seed());
    }

    #[test]
    fn too_many_via_points_is_malformed_seed() {
        let mut t = Trajectory::new(1, 0.2, 0.1, 0, 0.1).unwrap();
        let zeros = DVector::zeros(1);
        let via = vec![DVector::zeros(1); 2];
        assert!(t.fill_in_min_jerk_via_points(&[0], &via, &zeros, &zeros).unwrap_err().is_malformed_seed());
    }
}
