use std::sync::Arc;
use nalgebra::{DVector, Isometry3, Point3, Vector3};
use crate::optimization::cost_accumulator::{CostAccumulator, CostComponent, NUM_WAYPOINT_COST_COMPONENTS};
use crate::optimization::evaluation_data::{DerivativeVariableType, EvaluationBackup, EvaluationData};
use crate::optimization::smoothness_cost::SmoothnessCost;
use crate::planner::planning_parameters::PlannerParameters;
use crate::robot_modules::contact_point_module::ContactPointModel;
use crate::robot_modules::robot_kinematics_module::{KinematicModel, PlanningGroup};
use crate::scenes::collision_scene::CollisionOracle;
use crate::trajectory_modules::path_constraints::{OrientationConstraint, PathConstraints, PositionConstraint};
use crate::trajectory_modules::trajectory::Trajectory;
use crate::utils::utils_console::{trajopt_print, PrintColor, PrintMode};
use crate::utils::utils_errors::PlannerError;
use itertools::izip;
use strum::IntoEnumIterator;

const JACOBIAN_EPSILON: f64 = 1e-9;

/// Evaluates the cost of a trajectory it owns, either in full or incrementally around one
/// perturbed decision variable.
///
/// Every per-waypoint quantity at waypoint `k` depends only on the states of waypoints
/// `k - 1..=k + 1`.  A perturbation therefore only needs its window recomputed:
/// `[i - 1, i + 1]` for a position at waypoint `i`, `[i, i]` for a velocity and the waypoints
/// of phase `r` for the contact variable of row `r`.
pub struct EvaluationManager {
    trajectory: Trajectory,
    robot_model: Arc<dyn KinematicModel>,
    collision_oracle: Arc<dyn CollisionOracle>,
    planning_group: PlanningGroup,
    group_joint_idxs: Vec<usize>,
    contact_points: Vec<ContactPointModel>,
    position_constraints: Vec<(usize, PositionConstraint)>,
    orientation_constraints: Vec<(usize, OrientationConstraint)>,
    end_effector_segment_idx: Option<usize>,
    cost_accumulator: CostAccumulator,
    smoothness_cost: SmoothnessCost,
    data: EvaluationData,
    backup: EvaluationBackup,
    segment_masses: Vec<f64>,
    segment_com_offsets: Vec<Vector3<f64>>,
    total_mass: f64,
    gravity: Vector3<f64>,
    settings: EvaluationSettings,
    full_vars_start: usize,
    full_vars_end: usize,
    is_evaluated: bool,
    last_trajectory_feasible: bool
}
impl EvaluationManager {
    pub fn new(trajectory: Trajectory,
               robot_model: Arc<dyn KinematicModel>,
               collision_oracle: Arc<dyn CollisionOracle>,
               planning_group: &PlanningGroup,
               params: &PlannerParameters,
               path_constraints: &PathConstraints) -> Result<Self, PlannerError> {
        if trajectory.num_joints() != robot_model.num_joints() {
            return Err(PlannerError::new_invalid_configuration_error("trajectory", &format!("Trajectory has {} joints but the model has {}.", trajectory.num_joints(), robot_model.num_joints()), file!(), line!()));
        }

        let mut planning_group = planning_group.clone();
        planning_group.resolve_joint_idxs(robot_model.as_ref())?;
        let group_joint_idxs = planning_group.joint_idxs().clone();

        let mut contact_points = vec![];
        for link_name in planning_group.contact_link_names() {
            contact_points.push(ContactPointModel::new(link_name, robot_model.as_ref())?);
        }
        if !contact_points.is_empty() && contact_points.len() != trajectory.num_contacts() {
            return Err(PlannerError::new_invalid_configuration_error("num_contacts", &format!("Group {} has {} contact links but the trajectory has {} contact columns.", planning_group.name(), contact_points.len(), trajectory.num_contacts()), file!(), line!()));
        }

        let end_effector_segment_idx = match planning_group.end_effector_segment_name() {
            None => { None }
            Some(name) => { robot_model.segment_idx_from_name(name) }
        };

        let mut position_constraints = vec![];
        for c in &path_constraints.position_constraints {
            position_constraints.push((Self::constrained_segment_idx(robot_model.as_ref(), &c.segment_name)?, c.clone()));
        }
        let mut orientation_constraints = vec![];
        for c in &path_constraints.orientation_constraints {
            orientation_constraints.push((Self::constrained_segment_idx(robot_model.as_ref(), &c.segment_name)?, c.clone()));
        }

        let smoothness_cost = SmoothnessCost::new(trajectory.num_points(),
                                                  trajectory.discretization(),
                                                  params.smoothness_velocity_weight,
                                                  params.smoothness_acceleration_weight,
                                                  params.smoothness_jerk_weight)?;

        let segment_masses = robot_model.segment_masses();
        let segment_com_offsets = robot_model.segment_com_offsets();
        let total_mass = segment_masses.iter().sum();
        let gravity = robot_model.gravity();

        let data = EvaluationData::new(trajectory.num_points(), robot_model.num_segments(), contact_points.len());
        let cost_accumulator = CostAccumulator::new(params.cost_weights.clone(), params.physics_violation_tolerance, !contact_points.is_empty());
        let full_vars_end = trajectory.num_points() - 1;

        Ok(Self {
            trajectory,
            robot_model,
            collision_oracle,
            planning_group,
            group_joint_idxs,
            contact_points,
            position_constraints,
            orientation_constraints,
            end_effector_segment_idx,
            cost_accumulator,
            smoothness_cost,
            data,
            backup: EvaluationBackup::new(),
            segment_masses,
            segment_com_offsets,
            total_mass,
            gravity,
            settings: EvaluationSettings::new(params),
            full_vars_start: 0,
            full_vars_end,
            is_evaluated: false,
            last_trajectory_feasible: false
        })
    }
    fn constrained_segment_idx(robot_model: &dyn KinematicModel, segment_name: &str) -> Result<usize, PlannerError> {
        match robot_model.segment_idx_from_name(segment_name) {
            None => { Err(PlannerError::new_invalid_request_error(&format!("Path constraint names unknown segment {}.", segment_name), file!(), line!())) }
            Some(idx) => { Ok(idx) }
        }
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }
    /// Mutable access to the owned trajectory.  The committed evaluation becomes stale.
    pub fn trajectory_mut(&mut self) -> &mut Trajectory {
        self.assert_no_probe_active();
        self.is_evaluated = false;
        &mut self.trajectory
    }
    pub fn set_trajectory(&mut self, trajectory: Trajectory) -> Result<(), PlannerError> {
        if trajectory.num_points() != self.trajectory.num_points() || trajectory.num_joints() != self.trajectory.num_joints() || trajectory.num_contacts() != self.trajectory.num_contacts() {
            return Err(PlannerError::new_generic_error_str("Replacement trajectory has different dimensions.", file!(), line!()));
        }
        *self.trajectory_mut() = trajectory;
        Ok(())
    }
    pub fn into_trajectory(self) -> Trajectory {
        self.trajectory
    }
    pub fn default_data(&self) -> &EvaluationData {
        &self.data
    }
    pub fn planning_group(&self) -> &PlanningGroup {
        &self.planning_group
    }
    pub fn group_joint_idxs(&self) -> &Vec<usize> {
        &self.group_joint_idxs
    }
    pub fn num_contacts_modeled(&self) -> usize {
        self.contact_points.len()
    }
    pub fn is_evaluated(&self) -> bool {
        self.is_evaluated
    }
    pub fn is_last_trajectory_feasible(&self) -> bool {
        self.last_trajectory_feasible
    }
    pub fn cost_accumulator(&self) -> &CostAccumulator {
        &self.cost_accumulator
    }
    /// Inclusive waypoint window touched by the current derivative probe, or the whole
    /// trajectory outside of a probe.
    pub fn full_vars_range(&self) -> (usize, usize) {
        (self.full_vars_start, self.full_vars_end)
    }

    /// Runs the whole pipeline over every waypoint and commits the result.
    pub fn evaluate(&mut self) -> f64 {
        self.assert_no_probe_active();
        let end = self.trajectory.num_points() - 1;
        self.full_vars_start = 0;
        self.full_vars_end = end;

        self.apply_mimic_joints(0, end);
        self.perform_forward_kinematics(0, end);
        self.compute_link_positions(0, end);
        self.compute_link_derivatives(0, end);
        self.update_contact_violations(0, end);
        self.compute_waypoint_costs(0, end);
        self.data.smoothness_cost = self.full_smoothness_cost();

        self.cost_accumulator.accumulate(&self.data);
        self.data.trajectory_cost = self.cost_accumulator.trajectory_cost();
        self.last_trajectory_feasible = self.cost_accumulator.is_feasible();
        self.is_evaluated = true;

        self.data.trajectory_cost
    }
    /// Same as `evaluate`, and also returns the unweighted total of every component.
    pub fn evaluate_with_costs(&mut self) -> (f64, Vec<(CostComponent, f64)>) {
        let cost = self.evaluate();
        let components = CostComponent::iter().map(|c| (c, self.cost_accumulator.component_cost(c))).collect();
        (cost, components)
    }
    /// Cost of the trajectory with one variable set to `value`.  The committed state is left
    /// exactly as it was.
    pub fn evaluate_derivatives(&mut self, value: f64, variable_type: DerivativeVariableType, point_idx: usize, joint_idx: usize) -> f64 {
        let cost = self.backup_and_set_variables(value, variable_type, point_idx, joint_idx);
        self.restore_variable();
        cost
    }
    /// Snapshots the window of the variable, overwrites the variable and recomputes only that
    /// window.  Returns the resulting total cost.  For contact variables `point_idx` is the
    /// contact row and `joint_idx` the contact index.
    ///
    /// Panics when no full evaluation was committed first or a probe is already active.
    pub fn backup_and_set_variables(&mut self, value: f64, variable_type: DerivativeVariableType, point_idx: usize, joint_idx: usize) -> f64 {
        assert!(self.is_evaluated, "backup_and_set_variables() requires a committed full evaluation");
        self.assert_no_probe_active();

        let n = self.trajectory.num_points();
        let (start, end) = match variable_type {
            DerivativeVariableType::Position => {
                assert!(point_idx < n && joint_idx < self.trajectory.num_joints(), "position variable ({}, {}) out of range", point_idx, joint_idx);
                (point_idx.saturating_sub(1), (point_idx + 1).min(n - 1))
            }
            DerivativeVariableType::Velocity => {
                assert!(point_idx < n && joint_idx < self.trajectory.num_joints(), "velocity variable ({}, {}) out of range", point_idx, joint_idx);
                (point_idx, point_idx)
            }
            DerivativeVariableType::Contact => {
                assert!(point_idx <= self.trajectory.num_contact_phases() && joint_idx < self.trajectory.num_contacts(), "contact variable ({}, {}) out of range", point_idx, joint_idx);
                self.trajectory.contact_phase_point_range(point_idx)
            }
        };
        self.full_vars_start = start;
        self.full_vars_end = end;

        self.backup.capture(&self.data, start, end);
        self.backup.variable = Some((variable_type, point_idx, joint_idx));

        let mut new_smoothness_cost = self.backup.smoothness_cost;
        match variable_type {
            DerivativeVariableType::Position => {
                let old_row = self.trajectory.trajectory_point(point_idx);
                let mut new_row = old_row.clone();
                new_row[joint_idx] = value;
                self.robot_model.apply_mimic_joints(&mut new_row);
                let old_row_finite = self.group_joint_idxs.iter().all(|j| old_row[*j].is_finite());
                let mut smoothness_delta = 0.0;
                if old_row_finite {
                    for j in &self.group_joint_idxs {
                        if new_row[*j] != old_row[*j] {
                            smoothness_delta += self.smoothness_cost.cost_delta(&self.trajectory, *j, point_idx, new_row[*j]);
                        }
                    }
                }
                self.backup.old_value = old_row[joint_idx];
                self.backup.old_trajectory_row = old_row;
                for (j, v) in new_row.iter().enumerate() { self.trajectory.set_position(point_idx, j, *v); }

                // Deltas are only meaningful between finite columns.
                new_smoothness_cost = if old_row_finite && self.group_positions_finite() {
                    self.guard_smoothness_cost(self.backup.smoothness_cost + smoothness_delta)
                } else {
                    self.full_smoothness_cost()
                };

                self.perform_forward_kinematics(point_idx, point_idx);
                self.compute_link_positions(start, end);
                self.compute_link_derivatives(start, end);
                self.update_contact_violations(start, end);
            }
            DerivativeVariableType::Velocity => {
                self.backup.old_value = self.trajectory.velocity(point_idx, joint_idx);
                self.trajectory.set_velocity(point_idx, joint_idx, value);
            }
            DerivativeVariableType::Contact => {
                self.backup.old_value = self.trajectory.contact_value(point_idx, joint_idx);
                self.trajectory.set_contact_value(point_idx, joint_idx, value);
            }
        }
        self.compute_waypoint_costs(start, end);

        let old_window_cost: f64 = (0..self.backup.state_costs.nrows()).map(|r| self.cost_accumulator.waypoint_cost(&self.backup.state_costs, r)).sum();
        let new_window_cost: f64 = (start..=end).map(|k| self.cost_accumulator.waypoint_cost(&self.data.state_costs, k)).sum();
        self.data.smoothness_cost = new_smoothness_cost;
        self.data.trajectory_cost = self.backup.trajectory_cost - old_window_cost + new_window_cost
            + self.cost_accumulator.weights().smoothness * (new_smoothness_cost - self.backup.smoothness_cost);

        self.data.trajectory_cost
    }
    /// Undoes the last `backup_and_set_variables`, restoring the variable and the committed
    /// state bit for bit.
    pub fn restore_variable(&mut self) {
        let (variable_type, point_idx, joint_idx) = match self.backup.variable.take() {
            None => { panic!("restore_variable() called without an active derivative probe"); }
            Some(v) => { v }
        };
        match variable_type {
            DerivativeVariableType::Position => {
                for (j, v) in self.backup.old_trajectory_row.iter().enumerate() { self.trajectory.set_position(point_idx, j, *v); }
            }
            DerivativeVariableType::Velocity => {
                self.trajectory.set_velocity(point_idx, joint_idx, self.backup.old_value);
            }
            DerivativeVariableType::Contact => {
                self.trajectory.set_contact_value(point_idx, joint_idx, self.backup.old_value);
            }
        }
        self.backup.restore_into(&mut self.data);
        self.full_vars_start = 0;
        self.full_vars_end = self.trajectory.num_points() - 1;
    }
    /// Clamps the free waypoints of the group joints into their limits and the free contact
    /// rows into `[0, 1]`.  Returns whether anything moved.
    pub fn handle_joint_limits(&mut self) -> bool {
        self.assert_no_probe_active();
        let mut changed = false;
        for j in self.group_joint_idxs.clone() {
            let (lower, upper) = self.robot_model.joint_limits(j);
            for point in self.trajectory.free_points() {
                let v = self.trajectory.position(point, j);
                let clamped = v.max(lower).min(upper);
                if clamped != v {
                    self.trajectory.set_position(point, j, clamped);
                    changed = true;
                }
            }
        }
        for row in self.trajectory.free_contact_rows() {
            for c in 0..self.trajectory.num_contacts() {
                let v = self.trajectory.contact_value(row, c);
                let clamped = v.max(0.0).min(1.0);
                if clamped != v {
                    self.trajectory.set_contact_value(row, c, clamped);
                    changed = true;
                }
            }
        }
        if changed { self.is_evaluated = false; }
        changed
    }
    /// Re-derives dependent joints of every waypoint from the group joints.
    pub fn update_full_trajectory(&mut self) {
        self.assert_no_probe_active();
        let end = self.trajectory.num_points() - 1;
        self.apply_mimic_joints(0, end);
        self.is_evaluated = false;
    }
    pub fn get_trajectory_cost(&self, verbose: bool) -> f64 {
        if verbose { self.cost_accumulator.print_costs(); }
        self.data.trajectory_cost
    }
    pub fn print_debug_info(&self) {
        trajopt_print(&format!("Trajectory cost of group {}:", self.planning_group.name()), PrintMode::Println, PrintColor::Blue, true);
        self.cost_accumulator.print_costs();
        let invalid: Vec<usize> = self.data.point_validity.iter().enumerate().filter(|(_, v)| !**v).map(|(i, _)| i).collect();
        if !invalid.is_empty() {
            trajopt_print(&format!("  invalid waypoints: {:?}", invalid), PrintMode::Println, PrintColor::Red, false);
        }
    }
    /// Captures the owned trajectory together with its committed evaluation.
    pub fn snapshot(&self) -> EvaluationSnapshot {
        self.assert_no_probe_active();
        EvaluationSnapshot {
            trajectory: self.trajectory.clone(),
            data: self.data.clone(),
            cost_accumulator: self.cost_accumulator.clone(),
            is_evaluated: self.is_evaluated,
            last_trajectory_feasible: self.last_trajectory_feasible
        }
    }
    pub fn restore_snapshot(&mut self, snapshot: EvaluationSnapshot) {
        self.assert_no_probe_active();
        self.trajectory = snapshot.trajectory;
        self.data = snapshot.data;
        self.cost_accumulator = snapshot.cost_accumulator;
        self.is_evaluated = snapshot.is_evaluated;
        self.last_trajectory_feasible = snapshot.last_trajectory_feasible;
    }
    /// Smoothness of the group joints, or `worst_case_cost` when any group joint position is
    /// not finite.
    fn full_smoothness_cost(&self) -> f64 {
        if !self.group_positions_finite() { return self.settings.worst_case_cost; }
        self.guard_smoothness_cost(self.smoothness_cost.cost(&self.trajectory, &self.group_joint_idxs))
    }
    fn group_positions_finite(&self) -> bool {
        let positions = self.trajectory.trajectory_matrix();
        self.group_joint_idxs.iter().all(|j| positions.column(*j).iter().all(|v| v.is_finite()))
    }
    fn guard_smoothness_cost(&self, smoothness_cost: f64) -> f64 {
        if smoothness_cost.is_finite() { smoothness_cost } else { self.settings.worst_case_cost }
    }
    fn assert_no_probe_active(&self) {
        assert!(!self.backup.is_active(), "a derivative probe is active; call restore_variable() first");
    }

    fn apply_mimic_joints(&mut self, start: usize, end: usize) {
        for point in start..=end {
            let mut row = self.trajectory.trajectory_point(point);
            self.robot_model.apply_mimic_joints(&mut row);
            for (j, v) in row.iter().enumerate() { self.trajectory.set_position(point, j, *v); }
        }
    }
    fn perform_forward_kinematics(&mut self, start: usize, end: usize) {
        let num_segments = self.robot_model.num_segments();
        for point in start..=end {
            let state = self.trajectory.trajectory_point(point);
            let frames = &mut self.data.segment_frames[point];
            match self.robot_model.compute_fk_into(&state, frames) {
                Ok(()) => { self.data.point_validity[point] = true; }
                Err(_) => {
                    frames.clear();
                    frames.resize(num_segments, Isometry3::identity());
                    self.data.point_validity[point] = false;
                }
            }
        }
    }
    fn compute_link_positions(&mut self, start: usize, end: usize) {
        for point in start..=end {
            let mut com = Vector3::zeros();
            for (s, (frame, mass, offset)) in izip!(self.data.segment_frames[point].iter(), self.segment_masses.iter(), self.segment_com_offsets.iter()).enumerate() {
                let p = (frame * Point3::from(*offset)).coords;
                self.data.link_positions[point][s] = p;
                com += p * *mass;
            }
            self.data.com_positions[point] = if self.total_mass > 0.0 { com / self.total_mass } else { Vector3::zeros() };
        }
    }
    fn compute_link_derivatives(&mut self, start: usize, end: usize) {
        let n = self.trajectory.num_points();
        let dt = self.trajectory.discretization();
        let num_segments = self.segment_masses.len();
        let d = &mut self.data;

        for point in start..=end {
            let prev = point.saturating_sub(1);
            let next = (point + 1).min(n - 1);
            let span = (next - prev) as f64 * dt;
            let interior = point > 0 && point + 1 < n;

            let com = d.com_positions[point];
            let com_vel = if next > prev { (d.com_positions[next] - d.com_positions[prev]) / span } else { Vector3::zeros() };
            d.com_velocities[point] = com_vel;
            d.com_accelerations[point] = if interior {
                (d.com_positions[next] - d.com_positions[point] * 2.0 + d.com_positions[prev]) / (dt * dt)
            } else {
                Vector3::zeros()
            };

            let mut angular_momentum = Vector3::zeros();
            let mut torque = Vector3::zeros();
            for s in 0..num_segments {
                let p = d.link_positions[point][s];
                let vel = if next > prev { (d.link_positions[next][s] - d.link_positions[prev][s]) / span } else { Vector3::zeros() };
                let ang_vel = if next > prev {
                    (d.segment_frames[next][s].rotation * d.segment_frames[prev][s].rotation.inverse()).scaled_axis() / span
                } else {
                    Vector3::zeros()
                };
                d.link_velocities[point][s] = vel;
                d.link_angular_velocities[point][s] = ang_vel;

                let mass = self.segment_masses[s];
                if mass == 0.0 { continue; }
                let r = p - com;
                angular_momentum += r.cross(&(vel - com_vel)) * mass;
                if interior {
                    let acc = (d.link_positions[next][s] - p * 2.0 + d.link_positions[prev][s]) / (dt * dt);
                    torque += r.cross(&acc) * mass;
                }
            }
            d.angular_momentums[point] = angular_momentum;
            d.torques[point] = torque;
        }
    }
    fn update_contact_violations(&mut self, start: usize, end: usize) {
        let dt = self.trajectory.discretization();
        for (c, contact_point) in self.contact_points.iter().enumerate() {
            contact_point.update_contact_violation_vector(start,
                                                          end,
                                                          dt,
                                                          &mut self.data.contact_violation_vectors[c],
                                                          &mut self.data.contact_point_velocities[c],
                                                          &self.data.segment_frames,
                                                          self.collision_oracle.as_ref());
        }
    }
    fn compute_waypoint_costs(&mut self, start: usize, end: usize) {
        for point in start..=end {
            let costs = self.compute_state_costs(point);
            for (col, v) in costs.iter().enumerate() { self.data.state_costs[(point, col)] = *v; }
        }

        let n = self.trajectory.num_points();
        let worst_case_cost = self.settings.worst_case_cost;
        for point in start..=end {
            let lo = point.saturating_sub(1);
            let hi = (point + 1).min(n - 1);
            let degenerate = (lo..=hi).any(|p| !self.data.point_validity[p]);
            for col in 0..NUM_WAYPOINT_COST_COMPONENTS {
                let v = self.data.state_costs[(point, col)];
                if degenerate || !v.is_finite() { self.data.state_costs[(point, col)] = worst_case_cost; }
            }
        }
    }
    fn compute_state_costs(&self, point: usize) -> [f64; NUM_WAYPOINT_COST_COMPONENTS] {
        let mut out = [0.0; NUM_WAYPOINT_COST_COMPONENTS];
        let n = self.trajectory.num_points();
        let interior = point > 0 && point + 1 < n;
        let frames = &self.data.segment_frames[point];
        let weights = self.cost_accumulator.weights();

        let state = self.trajectory.trajectory_point(point);
        if interior {
            out[CostComponent::Collision as usize] = self.collision_oracle.penetration_depth(&state, frames);
        }

        let mut contact_invariant = 0.0;
        for c in 0..self.contact_points.len() {
            let activation = self.trajectory.activation(point, c).max(0.0);
            contact_invariant += activation * self.data.contact_violation_vectors[c][point].norm_squared();
        }
        out[CostComponent::ContactInvariant as usize] = contact_invariant;
        out[CostComponent::PhysicsViolation as usize] = self.physics_violation_cost(point);

        if interior {
            if let Some(ee) = self.end_effector_segment_idx {
                if weights.ftr > 0.0 || weights.singularity > 0.0 {
                    let jacobian = self.robot_model.compute_translational_jacobian(&state, frames, ee, &self.group_joint_idxs);
                    if weights.ftr > 0.0 {
                        let projected = jacobian.transpose() * self.settings.ftr_direction;
                        out[CostComponent::Ftr as usize] = (1.0 / (projected.norm() + JACOBIAN_EPSILON)).min(self.settings.max_ftr_cost);
                    }
                    if weights.singularity > 0.0 {
                        let singular_values = jacobian.svd(false, false).singular_values;
                        let sigma_min = singular_values.iter().fold(f64::INFINITY, |acc, s| acc.min(*s));
                        let sigma_min = if sigma_min.is_finite() { sigma_min } else { 0.0 };
                        let cost = 1.0 / (sigma_min + JACOBIAN_EPSILON) - 1.0 / self.settings.singularity_threshold;
                        out[CostComponent::Singularity as usize] = cost.max(0.0).min(self.settings.max_singularity_cost);
                    }
                }
            }

            let mut cartesian = 0.0;
            for (segment_idx, c) in &self.position_constraints {
                let error = frames[*segment_idx].translation.vector - c.target;
                for axis in 0..3 {
                    if c.constrained_axes[axis] { cartesian += c.weight * error[axis] * error[axis]; }
                }
            }
            for (segment_idx, c) in &self.orientation_constraints {
                let angle = frames[*segment_idx].rotation.angle_to(&c.target);
                cartesian += c.weight * angle * angle;
            }
            out[CostComponent::Cartesian as usize] = cartesian;
        }

        out
    }
    fn physics_violation_cost(&self, point: usize) -> f64 {
        let mut out = 0.0;

        if !self.contact_points.is_empty() && self.total_mass > 0.0 {
            let weight = self.total_mass * self.gravity.norm();
            let normalizer = if weight > 0.0 { weight * weight } else { self.total_mass * self.total_mass };

            let required_force = (self.data.com_accelerations[point] - self.gravity) * self.total_mass;
            let support: f64 = (0..self.contact_points.len()).map(|c| self.trajectory.activation(point, c).max(0.0)).sum();
            let support = support.min(1.0);

            let mut unsupported_force = required_force * (1.0 - support);
            // Contacts push, they cannot pull.
            if required_force.z < 0.0 { unsupported_force.z += support * required_force.z; }

            out += unsupported_force.norm_squared() / normalizer;
            out += (1.0 - support) * self.data.torques[point].norm_squared() / normalizer;
        }

        if self.settings.optimize_velocities && point > 0 {
            let dt = self.trajectory.discretization();
            for j in &self.group_joint_idxs {
                let finite_difference = (self.trajectory.position(point, *j) - self.trajectory.position(point - 1, *j)) / dt;
                let residual = self.trajectory.velocity(point, *j) - finite_difference;
                out += residual * residual;
            }
        }

        out
    }
}

/// A trajectory together with its committed evaluation, used to undo rejected steps.
#[derive(Clone, Debug)]
pub struct EvaluationSnapshot {
    trajectory: Trajectory,
    data: EvaluationData,
    cost_accumulator: CostAccumulator,
    is_evaluated: bool,
    last_trajectory_feasible: bool
}
impl EvaluationSnapshot {
    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }
    pub fn trajectory_cost(&self) -> f64 {
        self.data.trajectory_cost
    }
}

#[derive(Clone, Debug)]
struct EvaluationSettings {
    optimize_velocities: bool,
    worst_case_cost: f64,
    ftr_direction: Vector3<f64>,
    max_ftr_cost: f64,
    singularity_threshold: f64,
    max_singularity_cost: f64
}
impl EvaluationSettings {
    fn new(params: &PlannerParameters) -> Self {
        let direction = Vector3::new(params.ftr_direction[0], params.ftr_direction[1], params.ftr_direction[2]);
        let ftr_direction = if direction.norm() > 0.0 { direction.normalize() } else { Vector3::z() };
        Self {
            optimize_velocities: params.optimize_velocities,
            worst_case_cost: params.worst_case_cost,
            ftr_direction,
            max_ftr_cost: params.max_ftr_cost,
            singularity_threshold: params.singularity_threshold,
            max_singularity_cost: params.max_singularity_cost
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::robot_modules::robot_chain_module::{ChainJoint, SerialChainModel};
    use crate::scenes::collision_scene::{GeometricShapeScene, ObstacleShape};

    fn planar_arm() -> Arc<SerialChainModel> {
        let mut model = SerialChainModel::new("planar");
        model.add_segment("link1", "base", Isometry3::identity(), Some(ChainJoint::new_revolute("j1", Vector3::z(), -3.0, 3.0)), 1.0, Vector3::new(0.5, 0.0, 0.0)).unwrap();
        model.add_segment("link2", "link1", Isometry3::translation(1.0, 0.0, 0.0), Some(ChainJoint::new_revolute("j2", Vector3::z(), -3.0, 3.0)), 1.0, Vector3::new(0.5, 0.0, 0.0)).unwrap();
        model.add_segment("tip", "link2", Isometry3::translation(1.0, 0.0, 0.0), None, 0.0, Vector3::zeros()).unwrap();
        model.add_planning_group(PlanningGroup::new("arm", vec!["j1".to_string(), "j2".to_string()], vec![], Some("tip".to_string()))).unwrap();
        Arc::new(model)
    }

    fn manager_with_obstacle() -> EvaluationManager {
        let model = planar_arm();
        let mut scene = GeometricShapeScene::new(-10.0);
        scene.add_segment_sphere(model.as_ref(), "tip", 0.1, Vector3::zeros()).unwrap();
        scene.add_obstacle("ball", ObstacleShape::Ball { radius: 0.3 }, Isometry3::translation(0.0, 2.0, 0.0)).unwrap();

        let mut params = PlannerParameters::default();
        params.cost_weights.ftr = 0.1;
        params.cost_weights.singularity = 0.1;
        let mut trajectory = Trajectory::new(2, 1.0, 0.1, 0, 0.2).unwrap();
        trajectory.set_trajectory_point(10, &DVector::from_vec(vec![3.0, 0.0])).unwrap();
        trajectory.fill_in_min_jerk(&[0, 1], &DVector::zeros(2), &DVector::zeros(2)).unwrap();

        let group = model.planning_group("arm").unwrap().clone();
        EvaluationManager::new(trajectory, model, Arc::new(scene), &group, &params, &PathConstraints::new_empty()).unwrap()
    }

    #[test]
    fn probe_then_restore_is_bit_identical() {
        let mut m = manager_with_obstacle();
        let before = m.evaluate();
        let data_before = m.default_data().state_costs().clone();
        m.backup_and_set_variables(1.0, DerivativeVariableType::Position, 5, 0);
        m.restore_variable();
        assert_eq!(m.default_data().state_costs(), &data_before);
        assert_eq!(m.default_data().trajectory_cost(), before);
        assert_eq!(m.evaluate(), before);
    }

    #[test]
    fn windowed_cost_matches_full_evaluation() {
        let mut m = manager_with_obstacle();
        m.evaluate();
        let probed = m.evaluate_derivatives(1.2, DerivativeVariableType::Position, 5, 0);

        let mut fresh = manager_with_obstacle();
        fresh.trajectory_mut().set_position(5, 0, 1.2);
        let full = fresh.evaluate();
        assert_relative_eq!(probed, full, epsilon = 1e-9, max_relative = 1e-9);
    }

    #[test]
    #[should_panic]
    fn probe_without_evaluation_panics() {
        let mut m = manager_with_obstacle();
        m.evaluate_derivatives(0.0, DerivativeVariableType::Position, 3, 0);
    }

    #[test]
    fn joint_limits_only_touch_free_points() {
        let mut m = manager_with_obstacle();
        m.trajectory_mut().set_position(0, 0, 5.0);
        m.trajectory_mut().set_position(4, 0, 5.0);
        assert!(m.handle_joint_limits());
        assert_eq!(m.trajectory().position(0, 0), 5.0);
        assert_eq!(m.trajectory().position(4, 0), 3.0);
        assert!(!m.is_evaluated());
    }

    #[test]
    fn unknown_constraint_segment_is_rejected() {
        let model = planar_arm();
        let group = model.planning_group("arm").unwrap().clone();
        let mut constraints = PathConstraints::new_empty();
        constraints.position_constraints.push(PositionConstraint::new("missing", Vector3::zeros()));
        let res = EvaluationManager::new(Trajectory::new(2, 1.0, 0.1, 0, 0.2).unwrap(), model, Arc::new(GeometricShapeScene::new(0.0)), &group, &PlannerParameters::default(), &constraints);
        assert!(matches!(res, Err(PlannerError::InvalidRequest(_))));
    }
}
