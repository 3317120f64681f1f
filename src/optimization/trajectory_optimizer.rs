use std::f64::consts::PI;
use std::sync::Arc;
use rand_chacha::ChaCha8Rng;
use serde::{Serialize, Deserialize};
use crate::optimization::best_cost_registry::BestCostRegistry;
use crate::optimization::evaluation_data::DerivativeVariableType;
use crate::optimization::evaluation_manager::EvaluationManager;
use crate::planner::planning_parameters::PlannerParameters;
use crate::robot_modules::robot_kinematics_module::{KinematicModel, PlanningGroup};
use crate::scenes::collision_scene::CollisionOracle;
use crate::trajectory_modules::path_constraints::PathConstraints;
use crate::trajectory_modules::trajectory::Trajectory;
use crate::utils::utils_console::{trajopt_print, PrintColor, PrintMode};
use crate::utils::utils_errors::PlannerError;
use crate::utils::utils_sampling::SimpleSamplers;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerState {
    Initialized,
    Iterating,
    Converged,
    Exhausted,
    InfeasibleAfterBudget
}
impl OptimizerState {
    pub fn is_terminal(&self) -> bool {
        match self {
            OptimizerState::Initialized | OptimizerState::Iterating => { false }
            _ => { true }
        }
    }
}

/// One free decision variable: its kind, its waypoint (or contact row) and its joint (or
/// contact) index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct DecisionVariable {
    variable_type: DerivativeVariableType,
    point_idx: usize,
    joint_idx: usize
}
impl DecisionVariable {
    fn value(&self, trajectory: &Trajectory) -> f64 {
        match self.variable_type {
            DerivativeVariableType::Position => { trajectory.position(self.point_idx, self.joint_idx) }
            DerivativeVariableType::Velocity => { trajectory.velocity(self.point_idx, self.joint_idx) }
            DerivativeVariableType::Contact => { trajectory.contact_value(self.point_idx, self.joint_idx) }
        }
    }
    fn set_value(&self, trajectory: &mut Trajectory, value: f64) {
        match self.variable_type {
            DerivativeVariableType::Position => { trajectory.set_position(self.point_idx, self.joint_idx, value) }
            DerivativeVariableType::Velocity => { trajectory.set_velocity(self.point_idx, self.joint_idx, value) }
            DerivativeVariableType::Contact => { trajectory.set_contact_value(self.point_idx, self.joint_idx, value) }
        }
    }
}

/// Local search of one trial.
///
/// Each iteration estimates the gradient of the trajectory cost with forward differences,
/// where every probe goes through the incremental evaluation of the manager, then takes a
/// normalized step with a backtracking step size.  Accepted steps are projected onto the
/// joint limits and dependent joints are re-derived.  Only the free waypoints and the free
/// contact rows are ever written.
pub struct TrajectoryOptimizer {
    trial_idx: usize,
    manager: EvaluationManager,
    params: PlannerParameters,
    registry: Arc<BestCostRegistry>,
    rng: ChaCha8Rng,
    variables: Vec<DecisionVariable>,
    state: OptimizerState,
    step_size: f64,
    last_iteration: usize,
    best_iteration: usize,
    best_cost: f64,
    best_feasible: bool,
    best_trajectory: Trajectory,
    best_cost_history: Vec<f64>,
    pruned: bool
}
impl TrajectoryOptimizer {
    pub fn new(trial_idx: usize,
               trajectory: Trajectory,
               robot_model: Arc<dyn KinematicModel>,
               collision_oracle: Arc<dyn CollisionOracle>,
               planning_group: &PlanningGroup,
               params: &PlannerParameters,
               path_constraints: &PathConstraints,
               registry: Arc<BestCostRegistry>) -> Result<Self, PlannerError> {
        let best_trajectory = trajectory.clone();
        let manager = EvaluationManager::new(trajectory, robot_model, collision_oracle, planning_group, params, path_constraints)?;
        let variables = Self::collect_variables(&manager, params);

        Ok(Self {
            trial_idx,
            manager,
            params: params.clone(),
            registry,
            rng: SimpleSamplers::seeded_rng(params.random_seed, trial_idx as u64),
            variables,
            state: OptimizerState::Initialized,
            step_size: params.initial_step_size,
            last_iteration: 0,
            best_iteration: 0,
            best_cost: f64::INFINITY,
            best_feasible: false,
            best_trajectory,
            best_cost_history: vec![],
            pruned: false
        })
    }
    fn collect_variables(manager: &EvaluationManager, params: &PlannerParameters) -> Vec<DecisionVariable> {
        let trajectory = manager.trajectory();
        let mut out = vec![];
        for point_idx in trajectory.free_points() {
            for joint_idx in manager.group_joint_idxs() {
                out.push(DecisionVariable { variable_type: DerivativeVariableType::Position, point_idx, joint_idx: *joint_idx });
            }
        }
        if params.optimize_velocities {
            for point_idx in trajectory.free_points() {
                for joint_idx in manager.group_joint_idxs() {
                    out.push(DecisionVariable { variable_type: DerivativeVariableType::Velocity, point_idx, joint_idx: *joint_idx });
                }
            }
        }
        if params.optimize_contact_variables && manager.num_contacts_modeled() > 0 {
            for point_idx in trajectory.free_contact_rows() {
                for joint_idx in 0..trajectory.num_contacts() {
                    out.push(DecisionVariable { variable_type: DerivativeVariableType::Contact, point_idx, joint_idx });
                }
            }
        }
        out
    }

    /// Runs the trial to one of its terminal states.
    pub fn optimize(&mut self) -> Result<OptimizerState, PlannerError> {
        if self.state != OptimizerState::Initialized {
            return Err(PlannerError::new_unsupported_operation_error("optimize", "A trial can only be optimized once.", file!(), line!()));
        }
        self.state = OptimizerState::Iterating;

        if self.trial_idx > 0 { self.perturb_initial_trajectory()?; }
        self.manager.handle_joint_limits();
        self.manager.update_full_trajectory();
        let mut cost = self.manager.evaluate();
        self.update_best(cost, 0);
        self.best_cost_history.push(self.best_cost);
        self.registry.report_candidate(self.trial_idx, self.best_cost, self.best_feasible);

        let mut converged = false;
        for iteration in 1..=self.params.max_iterations {
            self.last_iteration = iteration;

            match self.take_step(cost) {
                None => {
                    converged = true;
                    break;
                }
                Some(new_cost) => { cost = new_cost; }
            }

            self.update_best(cost, iteration);
            self.best_cost_history.push(self.best_cost);
            self.registry.report_candidate(self.trial_idx, self.best_cost, self.best_feasible);

            if self.params.debug.prints_iterations() {
                trajopt_print(&format!("trial {} iteration {}: cost {:.6e}, step {:.3e}, feasible {}", self.trial_idx, iteration, cost, self.step_size, self.manager.is_last_trajectory_feasible()), PrintMode::Println, PrintColor::None, false);
            }

            if self.window_improvement_below_threshold() {
                converged = true;
                break;
            }
            if self.params.enable_pruning && iteration >= self.params.pruning_min_iterations && self.registry.is_in_worst_fraction(self.trial_idx, self.params.pruning_ratio) {
                self.pruned = true;
                break;
            }
        }

        self.state = if converged {
            OptimizerState::Converged
        } else if self.best_feasible {
            OptimizerState::Exhausted
        } else {
            OptimizerState::InfeasibleAfterBudget
        };

        if self.params.debug.prints_iterations() {
            trajopt_print(&format!("trial {} finished as {:?} after {} iterations (best cost {:.6e} at iteration {})", self.trial_idx, self.state, self.last_iteration, self.best_cost, self.best_iteration), PrintMode::Println, PrintColor::Blue, false);
        }

        Ok(self.state)
    }
    /// Forward-difference gradient over every decision variable at the committed state.
    fn compute_gradient(&mut self, cost: f64) -> Vec<f64> {
        let h = self.params.finite_difference_perturbation;
        let mut out = Vec::with_capacity(self.variables.len());
        for v in &self.variables {
            let value = v.value(self.manager.trajectory());
            let probed = self.manager.evaluate_derivatives(value + h, v.variable_type, v.point_idx, v.joint_idx);
            out.push((probed - cost) / h);
        }
        out
    }
    /// Backtracking line search along the normalized negative gradient.  Returns the new
    /// committed cost, or `None` when no decreasing step exists above the minimum step size.
    fn take_step(&mut self, cost: f64) -> Option<f64> {
        let gradient = self.compute_gradient(cost);
        let norm = gradient.iter().map(|g| g * g).sum::<f64>().sqrt();
        if !(norm > 0.0) || !norm.is_finite() { return None; }

        let snapshot = self.manager.snapshot();
        while self.step_size >= self.params.min_step_size {
            let trajectory = self.manager.trajectory_mut();
            for (v, g) in self.variables.iter().zip(gradient.iter()) {
                let value = v.value(trajectory);
                v.set_value(trajectory, value - self.step_size * g / norm);
            }
            self.manager.handle_joint_limits();
            self.manager.update_full_trajectory();
            let new_cost = self.manager.evaluate();

            if new_cost < cost {
                self.step_size = (self.step_size * self.params.step_size_growth).min(self.params.max_step_size);
                return Some(new_cost);
            }
            self.manager.restore_snapshot(snapshot.clone());
            self.step_size *= 0.5;
        }
        None
    }
    fn update_best(&mut self, cost: f64, iteration: usize) {
        if cost < self.best_cost {
            self.best_cost = cost;
            self.best_iteration = iteration;
            self.best_feasible = self.manager.is_last_trajectory_feasible();
            self.best_trajectory = self.manager.trajectory().clone();
        }
    }
    fn window_improvement_below_threshold(&self) -> bool {
        let window = self.params.convergence_window;
        let len = self.best_cost_history.len();
        if len <= window { return false; }
        self.best_cost_history[len - 1 - window] - self.best_cost_history[len - 1] < self.params.convergence_threshold
    }
    /// Random restart for trials other than the first.  The noise envelope vanishes at both
    /// ends so the boundary waypoints stay untouched.
    fn perturb_initial_trajectory(&mut self) -> Result<(), PlannerError> {
        let std = self.params.initial_noise_std;
        if std == 0.0 { return Ok(()); }

        let n = self.manager.trajectory().num_points();
        let free_points: Vec<usize> = self.manager.trajectory().free_points().collect();
        let group_joint_idxs = self.manager.group_joint_idxs().clone();
        for j in group_joint_idxs {
            let samples = SimpleSamplers::normal_samples_seeded(&mut self.rng, &vec![(0.0, std); free_points.len()])?;
            let trajectory = self.manager.trajectory_mut();
            for (point, sample) in free_points.iter().zip(samples.iter()) {
                let envelope = (PI * *point as f64 / (n - 1) as f64).sin();
                let value = trajectory.position(*point, j);
                trajectory.set_position(*point, j, value + envelope * sample);
            }
        }
        Ok(())
    }

    pub fn trial_idx(&self) -> usize {
        self.trial_idx
    }
    pub fn state(&self) -> OptimizerState {
        self.state
    }
    pub fn best_cost(&self) -> f64 {
        self.best_cost
    }
    pub fn best_iteration(&self) -> usize {
        self.best_iteration
    }
    pub fn last_iteration(&self) -> usize {
        self.last_iteration
    }
    /// Whether the best trajectory found is feasible.
    pub fn is_succeeded(&self) -> bool {
        self.best_feasible
    }
    pub fn was_pruned(&self) -> bool {
        self.pruned
    }
    pub fn best_cost_history(&self) -> &Vec<f64> {
        &self.best_cost_history
    }
    pub fn best_trajectory(&self) -> &Trajectory {
        &self.best_trajectory
    }
    pub fn into_best_trajectory(self) -> Trajectory {
        self.best_trajectory
    }
    pub fn evaluation_manager(&self) -> &EvaluationManager {
        &self.manager
    }
}
