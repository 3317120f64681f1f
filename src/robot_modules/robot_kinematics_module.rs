use nalgebra::{DMatrix, DVector, Isometry3, Vector3};
use serde::{Serialize, Deserialize};
use crate::utils::utils_errors::PlannerError;

/// The read-only kinematic collaborator used by every evaluation.
///
/// A full state is a vector with one value per joint, indexed by joint index.  Frames are
/// indexed by segment index and expressed in the world frame.  Implementations must be safe to
/// call concurrently from all optimization workers.
pub trait KinematicModel: Send + Sync {
    fn num_joints(&self) -> usize;
    fn num_segments(&self) -> usize;
    fn joint_names(&self) -> Vec<String>;
    fn joint_idx_from_name(&self, joint_name: &str) -> Option<usize>;
    fn segment_idx_from_name(&self, segment_name: &str) -> Option<usize>;
    fn segment_name(&self, segment_idx: usize) -> Option<String>;
    /// Lower and upper bound of the given joint.
    fn joint_limits(&self, joint_idx: usize) -> (f64, f64);
    /// Computes the world frame of every segment.  Returns a `KinematicFailure` error when the
    /// input or the resulting frames are not finite.
    fn compute_fk(&self, full_state: &DVector<f64>) -> Result<Vec<Isometry3<f64>>, PlannerError>;
    /// Same as `compute_fk`, but writes into a preallocated buffer.
    fn compute_fk_into(&self, full_state: &DVector<f64>, out_frames: &mut Vec<Isometry3<f64>>) -> Result<(), PlannerError> {
        let frames = self.compute_fk(full_state)?;
        out_frames.clear();
        out_frames.extend(frames);
        Ok(())
    }
    fn segment_masses(&self) -> Vec<f64>;
    /// Center of mass of each segment, expressed in the segment's own frame.
    fn segment_com_offsets(&self) -> Vec<Vector3<f64>>;
    /// The 3 x `joint_idxs.len()` translational jacobian of the origin of `segment_idx`, computed
    /// from frames that were produced by `compute_fk` on `full_state`.
    fn compute_translational_jacobian(&self, full_state: &DVector<f64>, frames: &[Isometry3<f64>], segment_idx: usize, joint_idxs: &[usize]) -> DMatrix<f64>;
    /// Re-derives every joint whose value depends on another joint.
    fn apply_mimic_joints(&self, _full_state: &mut DVector<f64>) { }
    fn planning_group(&self, group_name: &str) -> Option<&PlanningGroup>;
    fn gravity(&self) -> Vector3<f64> { Vector3::new(0.0, 0.0, -9.81) }
}

/// A named subset of the robot's joints that is optimized together, along with the links that
/// may touch the environment and an optional end effector.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlanningGroup {
    name: String,
    joint_names: Vec<String>,
    #[serde(default)]
    contact_link_names: Vec<String>,
    #[serde(default)]
    end_effector_segment_name: Option<String>,
    #[serde(skip)]
    joint_idxs: Vec<usize>
}
impl PlanningGroup {
    pub fn new(name: &str, joint_names: Vec<String>, contact_link_names: Vec<String>, end_effector_segment_name: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            joint_names,
            contact_link_names,
            end_effector_segment_name,
            joint_idxs: vec![]
        }
    }
    /// Resolves the joint names of the group against the joints of a model.
    pub fn resolve_joint_idxs(&mut self, model: &dyn KinematicModel) -> Result<(), PlannerError> {
        let mut joint_idxs = vec![];
        for joint_name in &self.joint_names {
            match model.joint_idx_from_name(joint_name) {
                None => {
                    return Err(PlannerError::new_invalid_configuration_error("planning_group", &format!("Group {} names unknown joint {}.", self.name, joint_name), file!(), line!()));
                }
                Some(idx) => { joint_idxs.push(idx); }
            }
        }
        for contact_link_name in &self.contact_link_names {
            if model.segment_idx_from_name(contact_link_name).is_none() {
                return Err(PlannerError::new_invalid_configuration_error("planning_group", &format!("Group {} names unknown contact link {}.", self.name, contact_link_name), file!(), line!()));
            }
        }
        if let Some(ee) = &self.end_effector_segment_name {
            if model.segment_idx_from_name(ee).is_none() {
                return Err(PlannerError::new_invalid_configuration_error("planning_group", &format!("Group {} names unknown end effector {}.", self.name, ee), file!(), line!()));
            }
        }
        self.joint_idxs = joint_idxs;
        Ok(())
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn joint_names(&self) -> &Vec<String> {
        &self.joint_names
    }
    pub fn joint_idxs(&self) -> &Vec<usize> {
        &self.joint_idxs
    }
    pub fn contact_link_names(&self) -> &Vec<String> {
        &self.contact_link_names
    }
    pub fn end_effector_segment_name(&self) -> &Option<String> {
        &self.end_effector_segment_name
    }
    pub fn contains_joint(&self, joint_idx: usize) -> bool {
        self.joint_idxs.contains(&joint_idx)
    }
}
