use nalgebra::{DVector, Isometry3};
use serde::{Serialize, Deserialize};
use crate::planner::planning_info::PlanningInfo;
use crate::robot_modules::robot_kinematics_module::{KinematicModel, PlanningGroup};
use crate::trajectory_modules::path_constraints::PathConstraints;
use crate::trajectory_modules::trajectory::Trajectory;
use crate::utils::utils_errors::PlannerError;

/// Named joint values.  Empty `velocities` or `accelerations` mean the robot is at rest.
/// Joints that are not named keep zero.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct JointState {
    pub names: Vec<String>,
    pub positions: Vec<f64>,
    #[serde(default)]
    pub velocities: Vec<f64>,
    #[serde(default)]
    pub accelerations: Vec<f64>
}
impl JointState {
    pub fn new(names: Vec<String>, positions: Vec<f64>) -> Self {
        Self {
            names,
            positions,
            velocities: vec![],
            accelerations: vec![]
        }
    }
    pub fn with_velocities(mut self, velocities: Vec<f64>) -> Self {
        self.velocities = velocities;
        self
    }
    pub fn with_accelerations(mut self, accelerations: Vec<f64>) -> Self {
        self.accelerations = accelerations;
        self
    }
    /// Scatters the named values into full-length position, velocity and acceleration vectors.
    pub fn to_full_state_vectors(&self, robot_model: &dyn KinematicModel) -> Result<(DVector<f64>, DVector<f64>, DVector<f64>), PlannerError> {
        let n = self.names.len();
        if self.positions.len() != n {
            return Err(PlannerError::new_invalid_request_error(&format!("Joint state names {} joints but carries {} positions.", n, self.positions.len()), file!(), line!()));
        }
        if !self.velocities.is_empty() && self.velocities.len() != n {
            return Err(PlannerError::new_invalid_request_error(&format!("Joint state names {} joints but carries {} velocities.", n, self.velocities.len()), file!(), line!()));
        }
        if !self.accelerations.is_empty() && self.accelerations.len() != n {
            return Err(PlannerError::new_invalid_request_error(&format!("Joint state names {} joints but carries {} accelerations.", n, self.accelerations.len()), file!(), line!()));
        }

        let num_joints = robot_model.num_joints();
        let mut positions = DVector::zeros(num_joints);
        let mut velocities = DVector::zeros(num_joints);
        let mut accelerations = DVector::zeros(num_joints);
        for (i, name) in self.names.iter().enumerate() {
            let idx = match robot_model.joint_idx_from_name(name) {
                None => { return Err(PlannerError::new_invalid_request_error(&format!("Joint state names unknown joint {}.", name), file!(), line!())); }
                Some(idx) => { idx }
            };
            positions[idx] = self.positions[i];
            if !self.velocities.is_empty() { velocities[idx] = self.velocities[i]; }
            if !self.accelerations.is_empty() { accelerations[idx] = self.accelerations[i]; }
        }

        if positions.iter().chain(velocities.iter()).chain(accelerations.iter()).any(|v| !v.is_finite()) {
            return Err(PlannerError::new_invalid_request_error("Joint state contains non-finite values.", file!(), line!()));
        }
        Ok((positions, velocities, accelerations))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum Goal {
    /// Target values of named joints.
    Joint(Vec<(String, f64)>),
    /// Target pose of a link, turned into configurations by a `GoalResolver`.
    Cartesian { link_name: String, pose: Isometry3<f64> }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlanningRequest {
    pub group_name: String,
    pub start_state: JointState,
    pub goal: Goal,
    #[serde(default)]
    pub path_constraints: PathConstraints
}
impl PlanningRequest {
    pub fn new(group_name: &str, start_state: JointState, goal: Goal) -> Self {
        Self {
            group_name: group_name.to_string(),
            start_state,
            goal,
            path_constraints: PathConstraints::new_empty()
        }
    }
    pub fn with_path_constraints(mut self, path_constraints: PathConstraints) -> Self {
        self.path_constraints = path_constraints;
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrajectoryWaypoint {
    pub time_from_start: f64,
    pub positions: Vec<f64>,
    pub velocities: Vec<f64>,
    pub contact_activations: Vec<f64>
}

/// Outcome of a planning call.  An infeasible result still carries the lowest-cost trajectory
/// that was found.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanningResponse {
    pub success: bool,
    pub best_trial_idx: usize,
    pub cost: f64,
    pub joint_names: Vec<String>,
    pub waypoints: Vec<TrajectoryWaypoint>,
    pub trajectory: Trajectory,
    pub group_names: Vec<String>,
    /// Statistics of every optimized group of the last planning trial.
    pub group_infos: Vec<PlanningInfo>,
    pub planning_time: f64
}
impl PlanningResponse {
    pub fn num_waypoints(&self) -> usize {
        self.waypoints.len()
    }
}

/// Turns a Cartesian goal into one or more goal configurations.  Every returned vector is a
/// full joint state.  An empty result means the goal is unreachable.
pub trait GoalResolver: Send + Sync {
    fn resolve_goal(&self, group: &PlanningGroup, link_name: &str, pose: &Isometry3<f64>, seed_state: &DVector<f64>) -> Vec<DVector<f64>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use crate::robot_modules::robot_chain_module::{ChainJoint, SerialChainModel};
    use crate::utils::utils_traits::ToAndFromJsonString;

    fn two_joint_model() -> SerialChainModel {
        let mut model = SerialChainModel::new("two");
        model.add_segment("a", "base", Isometry3::identity(), Some(ChainJoint::new_revolute("ja", Vector3::z(), -1.0, 1.0)), 1.0, Vector3::zeros()).unwrap();
        model.add_segment("b", "a", Isometry3::identity(), Some(ChainJoint::new_revolute("jb", Vector3::z(), -1.0, 1.0)), 1.0, Vector3::zeros()).unwrap();
        model
    }

    #[test]
    fn joint_state_scatters_by_name() {
        let model = two_joint_model();
        let state = JointState::new(vec!["jb".to_string()], vec![0.4]).with_velocities(vec![0.1]);
        let (p, v, a) = state.to_full_state_vectors(&model).unwrap();
        assert_eq!(p.as_slice(), &[0.0, 0.4]);
        assert_eq!(v.as_slice(), &[0.0, 0.1]);
        assert_eq!(a.as_slice(), &[0.0, 0.0]);
    }

    #[test]
    fn unknown_joint_is_invalid_request() {
        let model = two_joint_model();
        let state = JointState::new(vec!["elbow".to_string()], vec![0.4]);
        assert!(matches!(state.to_full_state_vectors(&model), Err(PlannerError::InvalidRequest(_))));
    }

    #[test]
    fn request_loads_from_json() {
        let json = "{\"group_name\": \"arm\", \"start_state\": {\"names\": [\"ja\"], \"positions\": [0.0]}, \"goal\": {\"Joint\": [[\"ja\", 0.5]]}}";
        let request = PlanningRequest::load_from_json_string(json).unwrap();
        assert_eq!(request.goal, Goal::Joint(vec![("ja".to_string(), 0.5)]));
        assert!(request.path_constraints.is_empty());
    }
}
