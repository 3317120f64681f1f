use nalgebra::DVector;
use crate::robot_modules::robot_kinematics_module::PlanningGroup;
use crate::trajectory_modules::path_constraints::PathConstraints;

/// Source of precomputed alternative paths (for instance a roadmap) used to seed trials.
///
/// A seed is a sequence of full states from the start configuration to a goal configuration.
/// The planner resets the provider at the beginning of every planning trial and hands it the
/// start and goal states before asking for seeds.
pub trait SeedTrajectoryProvider: Send {
    fn reset(&mut self) { }
    fn add_start_state(&mut self, _start_state: &DVector<f64>) { }
    fn add_goal_states(&mut self, _goal_states: &[DVector<f64>]) { }
    fn extract_initial_trajectories(&self, group: &PlanningGroup) -> Vec<Vec<DVector<f64>>>;
}

/// Provider that never offers seeds, so every trial starts from a plain min-jerk fill.
#[derive(Clone, Debug, Default)]
pub struct NoSeedTrajectoryProvider;
impl SeedTrajectoryProvider for NoSeedTrajectoryProvider {
    fn extract_initial_trajectories(&self, _group: &PlanningGroup) -> Vec<Vec<DVector<f64>>> {
        vec![]
    }
}

/// Provider backed by a fixed list of paths.  Each path's endpoints are replaced by the start
/// and first goal state of the current trial.
#[derive(Clone, Debug, Default)]
pub struct StaticSeedTrajectoryProvider {
    paths: Vec<Vec<DVector<f64>>>,
    start_state: Option<DVector<f64>>,
    goal_states: Vec<DVector<f64>>
}
impl StaticSeedTrajectoryProvider {
    pub fn new(paths: Vec<Vec<DVector<f64>>>) -> Self {
        Self {
            paths,
            start_state: None,
            goal_states: vec![]
        }
    }
}
impl SeedTrajectoryProvider for StaticSeedTrajectoryProvider {
    fn reset(&mut self) {
        self.start_state = None;
        self.goal_states.clear();
    }
    fn add_start_state(&mut self, start_state: &DVector<f64>) {
        self.start_state = Some(start_state.clone());
    }
    fn add_goal_states(&mut self, goal_states: &[DVector<f64>]) {
        self.goal_states.extend_from_slice(goal_states);
    }
    fn extract_initial_trajectories(&self, _group: &PlanningGroup) -> Vec<Vec<DVector<f64>>> {
        self.paths.iter().map(|path| {
            let mut out = path.clone();
            if let (Some(first), Some(start)) = (out.first_mut(), &self.start_state) {
                if first.len() == start.len() { *first = start.clone(); }
            }
            if let (Some(last), Some(goal)) = (out.last_mut(), self.goal_states.first()) {
                if last.len() == goal.len() { *last = goal.clone(); }
            }
            out
        }).collect()
    }
}

/// Turns path constraints into intermediate configurations between a start and a goal state.
/// Returns `None` when no such sequence exists.
pub trait CartesianPathResolver: Send + Sync {
    fn resolve_path(&self, group: &PlanningGroup, path_constraints: &PathConstraints, start_state: &DVector<f64>, goal_state: &DVector<f64>) -> Option<Vec<DVector<f64>>>;
}
