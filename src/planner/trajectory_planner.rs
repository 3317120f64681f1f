use std::sync::Arc;
use instant::Instant;
use nalgebra::DVector;
use rayon::prelude::*;
use crate::optimization::best_cost_registry::BestCostRegistry;
use crate::optimization::trajectory_optimizer::{OptimizerState, TrajectoryOptimizer};
use crate::planner::planning_info::{PlanningInfo, PlanningInfoTable};
use crate::planner::planning_parameters::PlannerParameters;
use crate::planner::planning_request::{Goal, GoalResolver, PlanningRequest, PlanningResponse, TrajectoryWaypoint};
use crate::robot_modules::robot_kinematics_module::{KinematicModel, PlanningGroup};
use crate::scenes::collision_scene::CollisionOracle;
use crate::trajectory_modules::trajectory::Trajectory;
use crate::trajectory_modules::trajectory_seed_module::{CartesianPathResolver, NoSeedTrajectoryProvider, SeedTrajectoryProvider};
use crate::utils::utils_console::{trajopt_print, trajopt_print_warning, PrintColor, PrintMode};
use crate::utils::utils_errors::PlannerError;

/// Entry point of the planner.  Owns the parameters and the handles of every collaborator,
/// and runs one fork-join batch of trial optimizers per planning group.
pub struct TrajectoryPlanner {
    robot_model: Arc<dyn KinematicModel>,
    collision_oracle: Arc<dyn CollisionOracle>,
    seed_provider: Box<dyn SeedTrajectoryProvider>,
    goal_resolver: Option<Arc<dyn GoalResolver>>,
    cartesian_path_resolver: Option<Arc<dyn CartesianPathResolver>>,
    params: PlannerParameters,
    base_trajectory: Option<Trajectory>,
    registry: Arc<BestCostRegistry>,
    planning_info: PlanningInfoTable,
    planning_count: usize
}
impl TrajectoryPlanner {
    pub fn new(robot_model: Arc<dyn KinematicModel>, collision_oracle: Arc<dyn CollisionOracle>, params: PlannerParameters) -> Result<Self, PlannerError> {
        params.validate()?;
        let registry = Arc::new(BestCostRegistry::new(params.num_trajectories));
        Ok(Self {
            robot_model,
            collision_oracle,
            seed_provider: Box::new(NoSeedTrajectoryProvider),
            goal_resolver: None,
            cartesian_path_resolver: None,
            params,
            base_trajectory: None,
            registry,
            planning_info: PlanningInfoTable::new(),
            planning_count: 0
        })
    }
    pub fn set_seed_provider(&mut self, seed_provider: Box<dyn SeedTrajectoryProvider>) {
        self.seed_provider = seed_provider;
    }
    pub fn set_goal_resolver(&mut self, goal_resolver: Arc<dyn GoalResolver>) {
        self.goal_resolver = Some(goal_resolver);
    }
    pub fn set_cartesian_path_resolver(&mut self, resolver: Arc<dyn CartesianPathResolver>) {
        self.cartesian_path_resolver = Some(resolver);
    }
    pub fn set_params(&mut self, params: PlannerParameters) -> Result<(), PlannerError> {
        params.validate()?;
        self.params = params;
        Ok(())
    }
    pub fn params(&self) -> &PlannerParameters {
        &self.params
    }
    pub fn planning_info(&self) -> &PlanningInfoTable {
        &self.planning_info
    }
    /// Total number of planning trials run by this planner so far.
    pub fn planning_count(&self) -> usize {
        self.planning_count
    }

    /// Plans a trajectory for the request.
    ///
    /// The whole procedure runs `num_trials` times.  Each time the base trajectory is reset to
    /// the start state and every group of the decomposition is optimized in turn, the winning
    /// trajectory of one group seeding the next.  The response reflects the last run.  A goal
    /// no trial could reach feasibly is not an error: the response has `success == false`
    /// and carries the lowest-cost trajectory.
    pub fn plan(&mut self, request: &PlanningRequest) -> Result<PlanningResponse, PlannerError> {
        let start_time = Instant::now();
        let debug = self.params.debug;
        if debug.prints_summary() {
            trajopt_print(&format!("Received planning request for group {}.", request.group_name), PrintMode::Println, PrintColor::Blue, true);
            trajopt_print(&format!("Trajectory duration: {}", self.params.trajectory_duration), PrintMode::Println, PrintColor::None, false);
        }

        let group_names = self.params.planning_groups(&request.group_name);
        let mut groups = vec![];
        for group_name in &group_names {
            match self.robot_model.planning_group(group_name) {
                None => { return Err(PlannerError::new_invalid_request_error(&format!("Unknown planning group {}.", group_name), file!(), line!())); }
                Some(group) => { groups.push(group.clone()); }
            }
        }
        let (start_positions, start_velocities, start_accelerations) = request.start_state.to_full_state_vectors(self.robot_model.as_ref())?;

        self.planning_info.reset(self.params.num_trials, groups.len());
        let mut last_outcomes: Vec<GroupOutcome> = vec![];
        for trial in 0..self.params.num_trials {
            if debug.prints_summary() {
                trajopt_print(&format!("Trial [{}]", self.planning_count + trial), PrintMode::Println, PrintColor::Cyan, true);
            }
            self.seed_provider.reset();
            self.init_trajectory(&start_positions, &start_velocities)?;
            self.seed_provider.add_start_state(&start_positions);

            last_outcomes.clear();
            for (component, group) in groups.iter().enumerate() {
                let outcome = self.trajectory_optimization(group, request, &start_velocities, &start_accelerations)?;
                self.planning_info.write(trial, component, outcome.info);
                self.base_trajectory = Some(outcome.trajectory.clone());
                last_outcomes.push(outcome);
            }
        }
        self.planning_count += self.params.num_trials;

        if debug.prints_summary() { self.planning_info.print_summary(); }

        self.fill_in_result(&group_names, last_outcomes, start_time.elapsed().as_secs_f64())
    }

    /// Resets the base trajectory to the start state.  A new trajectory is only allocated when
    /// the configured timing changed.
    fn init_trajectory(&mut self, start_positions: &DVector<f64>, start_velocities: &DVector<f64>) -> Result<(), PlannerError> {
        let needs_new = match &self.base_trajectory {
            None => { true }
            Some(t) => {
                t.duration() != self.params.trajectory_duration
                    || t.discretization() != self.params.trajectory_discretization
                    || t.phase_duration() != self.params.phase_duration
                    || t.num_contacts() != self.params.num_contacts
            }
        };
        if needs_new {
            self.base_trajectory = Some(Trajectory::new(self.robot_model.num_joints(),
                                                        self.params.trajectory_duration,
                                                        self.params.trajectory_discretization,
                                                        self.params.num_contacts,
                                                        self.params.phase_duration)?);
        }

        let trajectory = match &mut self.base_trajectory {
            None => { return Err(PlannerError::new_generic_error_str("Base trajectory was not created.", file!(), line!())); }
            Some(t) => { t }
        };
        trajectory.fill_all_points(start_positions)?;
        for (j, v) in start_velocities.iter().enumerate() { trajectory.set_velocity(0, j, *v); }
        trajectory.set_contact_boundary_values(&self.params.contact_variable_initial_values, &self.params.contact_variable_goal_values)?;
        Ok(())
    }

    /// Writes the goal into the last waypoint of `trajectory` and hands the goal states to the
    /// seed provider.
    fn apply_goal(&mut self, group: &PlanningGroup, goal: &Goal, trajectory: &mut Trajectory) -> Result<(), PlannerError> {
        let goal_idx = trajectory.num_points() - 1;
        match goal {
            Goal::Joint(goal_values) => {
                for (name, value) in goal_values {
                    let idx = match self.robot_model.joint_idx_from_name(name) {
                        None => { return Err(PlannerError::new_invalid_request_error(&format!("Goal names unknown joint {}.", name), file!(), line!())); }
                        Some(idx) => { idx }
                    };
                    if !value.is_finite() {
                        return Err(PlannerError::new_invalid_request_error(&format!("Goal value of joint {} is not finite.", name), file!(), line!()));
                    }
                    if group.contains_joint(idx) { trajectory.set_position(goal_idx, idx, *value); }
                }
                let goal_state = trajectory.trajectory_point(goal_idx);
                self.seed_provider.add_goal_states(&[goal_state]);
            }
            Goal::Cartesian { link_name, pose } => {
                let resolver = match &self.goal_resolver {
                    None => { return Err(PlannerError::new_invalid_request_error("Cartesian goals need a goal resolver.", file!(), line!())); }
                    Some(r) => { r.clone() }
                };
                let seed_state = trajectory.trajectory_point(goal_idx);
                let goal_states = resolver.resolve_goal(group, link_name, pose, &seed_state);
                let first = match goal_states.first() {
                    None => { return Err(PlannerError::new_invalid_request_error(&format!("No configuration of group {} reaches the goal pose of {}.", group.name(), link_name), file!(), line!())); }
                    Some(s) => { s }
                };
                if first.len() != trajectory.num_joints() {
                    return Err(PlannerError::new_vec_wrong_size_error("resolve_goal", first.len(), trajectory.num_joints(), file!(), line!()));
                }
                for idx in group.joint_idxs() { trajectory.set_position(goal_idx, *idx, first[*idx]); }
                self.seed_provider.add_goal_states(&goal_states);
            }
        }
        Ok(())
    }

    fn trajectory_optimization(&mut self, group: &PlanningGroup, request: &PlanningRequest, start_velocities: &DVector<f64>, start_accelerations: &DVector<f64>) -> Result<GroupOutcome, PlannerError> {
        let mut base = match &self.base_trajectory {
            None => { return Err(PlannerError::new_generic_error_str("Base trajectory was not initialized.", file!(), line!())); }
            Some(t) => { t.clone() }
        };
        self.apply_goal(group, &request.goal, &mut base)?;
        let seeds = self.seed_provider.extract_initial_trajectories(group);

        let num_trajectories = self.params.num_trajectories;
        self.registry.reset(num_trajectories);
        let mut optimizers = Vec::with_capacity(num_trajectories);
        for i in 0..num_trajectories {
            let mut trajectory = base.clone();
            self.fill_group_joint_trajectory(i, group, request, &seeds, start_velocities, start_accelerations, &mut trajectory)?;
            optimizers.push(TrajectoryOptimizer::new(i,
                                                     trajectory,
                                                     self.robot_model.clone(),
                                                     self.collision_oracle.clone(),
                                                     group,
                                                     &self.params,
                                                     &request.path_constraints,
                                                     self.registry.clone())?);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_trajectories)
            .build()
            .map_err(|e| PlannerError::ThreadPoolError(format!("ERROR: Could not build worker pool ({}) -- File: {}, Line: {}", e, file!(), line!())))?;

        let timer = Instant::now();
        let states: Vec<Result<OptimizerState, PlannerError>> = pool.install(|| {
            optimizers.par_iter_mut().map(|o| o.optimize()).collect()
        });
        let elapsed = timer.elapsed().as_secs_f64();
        for state in states { state?; }

        if self.params.debug.prints_summary() {
            trajopt_print(&format!("Optimization of group {} took {:.6} sec", group.name(), elapsed), PrintMode::Println, PrintColor::None, false);
        }

        let best_idx = match self.registry.get_best_trajectory_index() {
            None => { return Err(PlannerError::new_generic_error_str("No trial reported a candidate.", file!(), line!())); }
            Some(idx) => { idx }
        };
        let winner = optimizers.swap_remove(best_idx);
        let info = PlanningInfo {
            time: elapsed,
            iterations: winner.last_iteration() + 1,
            cost: winner.best_cost(),
            success: winner.is_succeeded()
        };
        if self.params.debug.prints_summary() {
            let color = if info.success { PrintColor::Green } else { PrintColor::Yellow };
            trajopt_print(&format!("Group {}: trial {} won with cost {:.6e} ({:?})", group.name(), best_idx, info.cost, winner.state()), PrintMode::Println, color, false);
        }

        Ok(GroupOutcome {
            best_trial_idx: best_idx,
            info,
            trajectory: winner.into_best_trajectory()
        })
    }
    /// Initial guess of one trial: a roadmap seed when the provider has any, a plain min-jerk
    /// fill without path constraints, a Cartesian fill otherwise.
    fn fill_group_joint_trajectory(&self,
                                   trial_idx: usize,
                                   group: &PlanningGroup,
                                   request: &PlanningRequest,
                                   seeds: &[Vec<DVector<f64>>],
                                   start_velocities: &DVector<f64>,
                                   start_accelerations: &DVector<f64>,
                                   trajectory: &mut Trajectory) -> Result<(), PlannerError> {
        let group_joints = group.joint_idxs();
        if !seeds.is_empty() {
            return trajectory.fill_in_min_jerk_with_seed(trial_idx, group_joints, seeds, start_velocities, start_accelerations);
        }
        if request.path_constraints.position_constraints.is_empty() {
            return trajectory.fill_in_min_jerk(group_joints, start_velocities, start_accelerations);
        }

        let resolver = self.cartesian_path_resolver.as_deref();
        match trajectory.fill_in_min_jerk_cartesian(group, start_velocities, start_accelerations, &request.path_constraints, resolver) {
            Ok(()) => { Ok(()) }
            Err(e) if e.is_malformed_seed() && self.params.cartesian_fill_fallback => {
                trajopt_print_warning(&format!("{} Falling back to an unconstrained fill.", e), self.params.debug);
                trajectory.fill_in_min_jerk(group_joints, start_velocities, start_accelerations)
            }
            Err(e) => { Err(e) }
        }
    }
    fn fill_in_result(&self, group_names: &[String], outcomes: Vec<GroupOutcome>, planning_time: f64) -> Result<PlanningResponse, PlannerError> {
        let success = outcomes.iter().all(|o| o.info.success);
        let group_infos: Vec<PlanningInfo> = outcomes.iter().map(|o| o.info).collect();
        let last = match outcomes.into_iter().last() {
            None => { return Err(PlannerError::new_generic_error_str("No planning group was optimized.", file!(), line!())); }
            Some(o) => { o }
        };

        let trajectory = last.trajectory;
        let dt = trajectory.discretization();
        let waypoints: Vec<TrajectoryWaypoint> = (0..trajectory.num_points()).map(|i| TrajectoryWaypoint {
            time_from_start: i as f64 * dt,
            positions: trajectory.trajectory_point(i).iter().copied().collect(),
            velocities: trajectory.velocity_point(i).iter().copied().collect(),
            contact_activations: (0..trajectory.num_contacts()).map(|c| trajectory.activation(i, c)).collect()
        }).collect();
        let joint_names = self.robot_model.joint_names();

        if self.params.print_planning_info {
            trajopt_print(&joint_names.join(" "), PrintMode::Println, PrintColor::None, true);
            for w in &waypoints {
                let row: Vec<String> = w.positions.iter().map(|p| format!("{:.6}", p)).collect();
                trajopt_print(&row.join(" "), PrintMode::Println, PrintColor::None, false);
            }
        }

        Ok(PlanningResponse {
            success,
            best_trial_idx: last.best_trial_idx,
            cost: last.info.cost,
            joint_names,
            waypoints,
            trajectory,
            group_names: group_names.to_vec(),
            group_infos,
            planning_time
        })
    }
}

struct GroupOutcome {
    best_trial_idx: usize,
    info: PlanningInfo,
    trajectory: Trajectory
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Isometry3, Vector3};
    use crate::planner::planning_request::JointState;
    use crate::robot_modules::robot_chain_module::{ChainJoint, SerialChainModel};
    use crate::scenes::collision_scene::GeometricShapeScene;
    use crate::utils::utils_console::TrajoptDebug;

    fn planner(params: PlannerParameters) -> TrajectoryPlanner {
        let mut model = SerialChainModel::new("one_dof");
        model.add_segment("link", "base", Isometry3::identity(), Some(ChainJoint::new_revolute("j", Vector3::z(), -2.0, 2.0)), 1.0, Vector3::new(0.5, 0.0, 0.0)).unwrap();
        model.add_planning_group(PlanningGroup::new("arm", vec!["j".to_string()], vec![], None)).unwrap();
        TrajectoryPlanner::new(Arc::new(model), Arc::new(GeometricShapeScene::new(-10.0)), params).unwrap()
    }

    fn quiet_params() -> PlannerParameters {
        let mut params = PlannerParameters::default();
        params.debug = TrajoptDebug::Silent;
        params.num_trajectories = 2;
        params.max_iterations = 5;
        params.trajectory_discretization = 0.1;
        params.phase_duration = 0.2;
        params
    }

    #[test]
    fn unknown_group_is_invalid_request() {
        let mut p = planner(quiet_params());
        let request = PlanningRequest::new("legs", JointState::new(vec!["j".to_string()], vec![0.0]), Goal::Joint(vec![("j".to_string(), 1.0)]));
        assert!(matches!(p.plan(&request), Err(PlannerError::InvalidRequest(_))));
    }

    #[test]
    fn cartesian_goal_without_resolver_is_invalid_request() {
        let mut p = planner(quiet_params());
        let request = PlanningRequest::new("arm", JointState::new(vec!["j".to_string()], vec![0.0]), Goal::Cartesian { link_name: "link".to_string(), pose: Isometry3::identity() });
        assert!(matches!(p.plan(&request), Err(PlannerError::InvalidRequest(_))));
    }

    #[test]
    fn response_spans_the_whole_duration() {
        let mut params = quiet_params();
        params.num_trials = 2;
        let mut p = planner(params);
        let request = PlanningRequest::new("arm", JointState::new(vec!["j".to_string()], vec![0.0]), Goal::Joint(vec![("j".to_string(), 1.0)]));
        let response = p.plan(&request).unwrap();
        assert_eq!(response.num_waypoints(), 11);
        assert_eq!(response.waypoints[0].positions, vec![0.0]);
        assert_eq!(response.waypoints[10].positions, vec![1.0]);
        assert!((response.waypoints[10].time_from_start - 1.0).abs() < 1e-12);
        assert_eq!(p.planning_info().num_trials(), 2);
        assert_eq!(p.planning_count(), 2);
    }
}
