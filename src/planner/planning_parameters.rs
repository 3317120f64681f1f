use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use crate::optimization::cost_accumulator::CostWeights;
use crate::utils::utils_console::TrajoptDebug;
use crate::utils::utils_errors::PlannerError;
use crate::utils::utils_traits::load_object_from_toml_string;

/// Every tunable of the planner.  Missing fields take their default when loaded from
/// JSON, RON or TOML.
///
/// # Example
/// ```
/// use cio_trajopt::planner::planning_parameters::PlannerParameters;
/// let params = PlannerParameters::load_from_toml_string("num_trajectories = 2\ntrajectory_duration = 2.0").unwrap();
/// assert_eq!(params.num_trajectories, 2);
/// assert_eq!(params.trajectory_discretization, 0.05);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlannerParameters {
    pub trajectory_duration: f64,
    pub trajectory_discretization: f64,
    pub phase_duration: f64,
    pub num_contacts: usize,
    pub contact_variable_initial_values: Vec<f64>,
    pub contact_variable_goal_values: Vec<f64>,
    /// Number of concurrent trials, which is also the worker pool size.
    pub num_trajectories: usize,
    /// Number of times a whole planning call is repeated for benchmarking.
    pub num_trials: usize,
    pub max_iterations: usize,
    pub convergence_window: usize,
    pub convergence_threshold: f64,
    pub finite_difference_perturbation: f64,
    pub initial_step_size: f64,
    pub min_step_size: f64,
    pub max_step_size: f64,
    pub step_size_growth: f64,
    pub random_seed: u64,
    pub initial_noise_std: f64,
    pub optimize_velocities: bool,
    pub optimize_contact_variables: bool,
    pub cost_weights: CostWeights,
    pub physics_violation_tolerance: f64,
    pub worst_case_cost: f64,
    pub ftr_direction: [f64; 3],
    pub max_ftr_cost: f64,
    pub singularity_threshold: f64,
    pub max_singularity_cost: f64,
    pub smoothness_velocity_weight: f64,
    pub smoothness_acceleration_weight: f64,
    pub smoothness_jerk_weight: f64,
    pub enable_pruning: bool,
    pub pruning_ratio: f64,
    pub pruning_min_iterations: usize,
    pub cartesian_fill_fallback: bool,
    pub group_decompositions: BTreeMap<String, Vec<String>>,
    pub print_planning_info: bool,
    pub debug: TrajoptDebug
}
impl Default for PlannerParameters {
    fn default() -> Self {
        Self {
            trajectory_duration: 1.0,
            trajectory_discretization: 0.05,
            phase_duration: 0.25,
            num_contacts: 0,
            contact_variable_initial_values: vec![],
            contact_variable_goal_values: vec![],
            num_trajectories: 4,
            num_trials: 1,
            max_iterations: 100,
            convergence_window: 10,
            convergence_threshold: 1e-6,
            finite_difference_perturbation: 1e-6,
            initial_step_size: 0.02,
            min_step_size: 1e-6,
            max_step_size: 0.2,
            step_size_growth: 1.5,
            random_seed: 0,
            initial_noise_std: 0.05,
            optimize_velocities: false,
            optimize_contact_variables: true,
            cost_weights: CostWeights::default(),
            physics_violation_tolerance: 1e-2,
            worst_case_cost: 1e6,
            ftr_direction: [0.0, 0.0, 1.0],
            max_ftr_cost: 100.0,
            singularity_threshold: 0.05,
            max_singularity_cost: 100.0,
            smoothness_velocity_weight: 0.0,
            smoothness_acceleration_weight: 0.0,
            smoothness_jerk_weight: 1.0,
            enable_pruning: false,
            pruning_ratio: 0.5,
            pruning_min_iterations: 20,
            cartesian_fill_fallback: false,
            group_decompositions: BTreeMap::new(),
            print_planning_info: false,
            debug: TrajoptDebug::default()
        }
    }
}
impl PlannerParameters {
    pub fn load_from_toml_string(toml_str: &str) -> Result<Self, PlannerError> {
        load_object_from_toml_string(toml_str)
    }
    pub fn validate(&self) -> Result<(), PlannerError> {
        if !(self.trajectory_duration > 0.0) {
            return Err(PlannerError::new_invalid_configuration_error("trajectory_duration", "Must be positive.", file!(), line!()));
        }
        if !(self.trajectory_discretization > 0.0) {
            return Err(PlannerError::new_invalid_configuration_error("trajectory_discretization", "Must be positive.", file!(), line!()));
        }
        if self.phase_duration < self.trajectory_discretization {
            return Err(PlannerError::new_invalid_configuration_error("phase_duration", "Must be at least trajectory_discretization.", file!(), line!()));
        }
        if self.contact_variable_initial_values.len() != self.num_contacts {
            return Err(PlannerError::new_invalid_configuration_error("contact_variable_initial_values", &format!("Has {} values but num_contacts is {}.", self.contact_variable_initial_values.len(), self.num_contacts), file!(), line!()));
        }
        if self.contact_variable_goal_values.len() != self.num_contacts {
            return Err(PlannerError::new_invalid_configuration_error("contact_variable_goal_values", &format!("Has {} values but num_contacts is {}.", self.contact_variable_goal_values.len(), self.num_contacts), file!(), line!()));
        }
        if self.num_trajectories == 0 {
            return Err(PlannerError::new_invalid_configuration_error("num_trajectories", "Must be at least 1.", file!(), line!()));
        }
        if self.num_trials == 0 {
            return Err(PlannerError::new_invalid_configuration_error("num_trials", "Must be at least 1.", file!(), line!()));
        }
        if self.convergence_window == 0 {
            return Err(PlannerError::new_invalid_configuration_error("convergence_window", "Must be at least 1.", file!(), line!()));
        }
        if !(self.finite_difference_perturbation > 0.0) {
            return Err(PlannerError::new_invalid_configuration_error("finite_difference_perturbation", "Must be positive.", file!(), line!()));
        }
        if !(self.min_step_size > 0.0 && self.min_step_size <= self.initial_step_size && self.initial_step_size <= self.max_step_size) {
            return Err(PlannerError::new_invalid_configuration_error("initial_step_size", "Step sizes must satisfy 0 < min <= initial <= max.", file!(), line!()));
        }
        if !(self.step_size_growth >= 1.0) {
            return Err(PlannerError::new_invalid_configuration_error("step_size_growth", "Must be at least 1.", file!(), line!()));
        }
        if self.initial_noise_std < 0.0 {
            return Err(PlannerError::new_invalid_configuration_error("initial_noise_std", "Must be non-negative.", file!(), line!()));
        }
        if !(self.worst_case_cost > 0.0) {
            return Err(PlannerError::new_invalid_configuration_error("worst_case_cost", "Must be positive.", file!(), line!()));
        }
        if !(self.singularity_threshold > 0.0) {
            return Err(PlannerError::new_invalid_configuration_error("singularity_threshold", "Must be positive.", file!(), line!()));
        }
        if self.smoothness_velocity_weight < 0.0 || self.smoothness_acceleration_weight < 0.0 || self.smoothness_jerk_weight < 0.0 {
            return Err(PlannerError::new_invalid_configuration_error("smoothness_jerk_weight", "Smoothness weights must be non-negative.", file!(), line!()));
        }
        if !(self.pruning_ratio > 0.0 && self.pruning_ratio <= 1.0) {
            return Err(PlannerError::new_invalid_configuration_error("pruning_ratio", "Must be in (0, 1].", file!(), line!()));
        }
        self.cost_weights.validate()?;

        Ok(())
    }
    /// The sub-groups a requested group is optimized as, in order.
    pub fn planning_groups(&self, group_name: &str) -> Vec<String> {
        match self.group_decompositions.get(group_name) {
            None => { vec![group_name.to_string()] }
            Some(groups) => { groups.clone() }
        }
    }
}
