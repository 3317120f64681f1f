#![allow(dead_code)]

use std::sync::Arc;
use nalgebra::{DVector, Isometry3, Vector3};
use cio_trajopt::optimization::evaluation_manager::EvaluationManager;
use cio_trajopt::planner::planning_parameters::PlannerParameters;
use cio_trajopt::robot_modules::robot_chain_module::{ChainJoint, SerialChainModel};
use cio_trajopt::robot_modules::robot_kinematics_module::{KinematicModel, PlanningGroup};
use cio_trajopt::scenes::collision_scene::{GeometricShapeScene, ObstacleShape};
use cio_trajopt::trajectory_modules::path_constraints::PathConstraints;
use cio_trajopt::trajectory_modules::trajectory::Trajectory;
use cio_trajopt::utils::utils_console::TrajoptDebug;

/// One revolute joint about z driving a unit link.  Group "arm".
pub fn one_dof_arm() -> SerialChainModel {
    let mut model = SerialChainModel::new("one_dof_arm");
    model.add_segment("link", "base", Isometry3::identity(), Some(ChainJoint::new_revolute("joint", Vector3::z(), -3.0, 3.0)), 1.0, Vector3::new(0.5, 0.0, 0.0)).unwrap();
    model.add_segment("tip", "link", Isometry3::translation(1.0, 0.0, 0.0), None, 0.0, Vector3::zeros()).unwrap();
    model.add_planning_group(PlanningGroup::new("arm", vec!["joint".to_string()], vec![], Some("tip".to_string()))).unwrap();
    model
}

/// Two prismatic joints moving a tool in the xy plane.  Group "planar".
pub fn xy_gantry() -> SerialChainModel {
    let mut model = SerialChainModel::new("xy_gantry");
    model.add_segment("carriage", "base", Isometry3::identity(), Some(ChainJoint::new_prismatic("x", Vector3::x(), -5.0, 5.0)), 1.0, Vector3::zeros()).unwrap();
    model.add_segment("tool", "carriage", Isometry3::identity(), Some(ChainJoint::new_prismatic("y", Vector3::y(), -5.0, 5.0)), 1.0, Vector3::zeros()).unwrap();
    model.add_planning_group(PlanningGroup::new("planar", vec!["x".to_string(), "y".to_string()], vec![], Some("tool".to_string()))).unwrap();
    model
}

/// A pelvis on a vertical slider one meter above the ground, a hip and a one meter thigh
/// whose foot touches the ground at the zero configuration.  Group "leg" with contact "foot".
pub fn single_leg() -> SerialChainModel {
    let mut model = SerialChainModel::new("single_leg");
    model.add_segment("pelvis", "base", Isometry3::translation(0.0, 0.0, 1.0), Some(ChainJoint::new_prismatic("pelvis_z", Vector3::z(), -0.5, 0.5)), 5.0, Vector3::zeros()).unwrap();
    model.add_segment("thigh", "pelvis", Isometry3::identity(), Some(ChainJoint::new_revolute("hip", Vector3::y(), -1.5, 1.5)), 1.0, Vector3::new(0.0, 0.0, -0.5)).unwrap();
    model.add_segment("foot", "thigh", Isometry3::translation(0.0, 0.0, -1.0), None, 0.0, Vector3::zeros()).unwrap();
    model.add_planning_group(PlanningGroup::new("leg", vec!["pelvis_z".to_string(), "hip".to_string()], vec!["foot".to_string()], None)).unwrap();
    model
}

pub fn empty_scene() -> GeometricShapeScene {
    GeometricShapeScene::new(-10.0)
}

pub fn ground_scene() -> GeometricShapeScene {
    GeometricShapeScene::new(0.0)
}

/// Gantry tool sphere plus a ball obstacle centered on the straight line from (0, 0) to (2, 0).
pub fn gantry_scene_with_obstacle(model: &SerialChainModel) -> GeometricShapeScene {
    let mut scene = GeometricShapeScene::new(-10.0);
    scene.add_segment_sphere(model, "tool", 0.1, Vector3::zeros()).unwrap();
    scene.add_obstacle("ball", ObstacleShape::Ball { radius: 0.3 }, Isometry3::translation(1.0, 0.0, 0.0)).unwrap();
    scene
}

pub fn quiet_params() -> PlannerParameters {
    let mut params = PlannerParameters::default();
    params.debug = TrajoptDebug::Silent;
    params
}

pub fn leg_params() -> PlannerParameters {
    let mut params = quiet_params();
    params.num_contacts = 1;
    params.contact_variable_initial_values = vec![1.0];
    params.contact_variable_goal_values = vec![1.0];
    params
}

/// Trajectory resting at `start` with `goal` as its last waypoint and the group joints filled
/// with a min-jerk profile.
pub fn min_jerk_trajectory(model: &dyn KinematicModel, group: &PlanningGroup, params: &PlannerParameters, start: &[f64], goal: &[f64]) -> Trajectory {
    let mut trajectory = Trajectory::new(model.num_joints(), params.trajectory_duration, params.trajectory_discretization, params.num_contacts, params.phase_duration).unwrap();
    trajectory.fill_all_points(&DVector::from_row_slice(start)).unwrap();
    trajectory.set_trajectory_point(trajectory.num_points() - 1, &DVector::from_row_slice(goal)).unwrap();
    trajectory.set_contact_boundary_values(&params.contact_variable_initial_values, &params.contact_variable_goal_values).unwrap();
    let zeros = DVector::zeros(model.num_joints());
    trajectory.fill_in_min_jerk(group.joint_idxs(), &zeros, &zeros).unwrap();
    trajectory
}

pub fn manager(model: Arc<SerialChainModel>, scene: GeometricShapeScene, group_name: &str, params: &PlannerParameters, trajectory: Trajectory) -> EvaluationManager {
    let group = model.planning_group(group_name).unwrap().clone();
    EvaluationManager::new(trajectory, model, Arc::new(scene), &group, params, &PathConstraints::new_empty()).unwrap()
}

/// Leg trajectory that crouches through the middle of the motion and lifts the foot slightly
/// during the third contact phase.
pub fn crouching_leg_manager(params: &PlannerParameters) -> EvaluationManager {
    let model = Arc::new(single_leg());
    let group = model.planning_group("leg").unwrap().clone();
    let mut trajectory = min_jerk_trajectory(model.as_ref(), &group, params, &[0.0, 0.0], &[0.0, 0.3]);
    let n = trajectory.num_points();
    for i in 1..n - 1 {
        let s = (std::f64::consts::PI * i as f64 / (n - 1) as f64).sin();
        trajectory.set_position(i, 0, -0.1 * s);
    }
    let (start, end) = trajectory.contact_phase_point_range(2);
    for i in start..=end { trajectory.set_position(i, 0, 0.05); }
    for i in 1..n - 1 { trajectory.set_velocity(i, 1, 0.2); }
    trajectory.set_contact_value(1, 0, 0.6);
    trajectory.set_contact_value(2, 0, 0.0);
    manager(model, ground_scene(), "leg", params, trajectory)
}
