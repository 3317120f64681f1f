use nalgebra::{DMatrix, DVector, Isometry3, Translation3, Unit, UnitQuaternion, Vector3};
use serde::{Serialize, Deserialize};
use crate::robot_modules::robot_kinematics_module::{KinematicModel, PlanningGroup};
use crate::utils::utils_errors::PlannerError;

/// Specifies the transform type of a joint.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum JointAxisPrimitiveType {
    Rotation,
    Translation
}

/// A joint that copies the value of another joint: `value = multiplier * source + offset`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct JointMimic {
    pub source_joint_name: String,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default)]
    pub offset: f64
}
fn default_multiplier() -> f64 { 1.0 }
fn default_com_offset() -> Vector3<f64> { Vector3::zeros() }

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChainJoint {
    pub name: String,
    pub axis: Vector3<f64>,
    pub axis_primitive_type: JointAxisPrimitiveType,
    pub lower_limit: f64,
    pub upper_limit: f64,
    #[serde(default)]
    pub mimic: Option<JointMimic>
}
impl ChainJoint {
    pub fn new_revolute(name: &str, axis: Vector3<f64>, lower_limit: f64, upper_limit: f64) -> Self {
        Self {
            name: name.to_string(),
            axis,
            axis_primitive_type: JointAxisPrimitiveType::Rotation,
            lower_limit,
            upper_limit,
            mimic: None
        }
    }
    pub fn new_prismatic(name: &str, axis: Vector3<f64>, lower_limit: f64, upper_limit: f64) -> Self {
        Self {
            name: name.to_string(),
            axis,
            axis_primitive_type: JointAxisPrimitiveType::Translation,
            lower_limit,
            upper_limit,
            mimic: None
        }
    }
    pub fn with_mimic(mut self, source_joint_name: &str, multiplier: f64, offset: f64) -> Self {
        self.mimic = Some(JointMimic { source_joint_name: source_joint_name.to_string(), multiplier, offset });
        self
    }
    fn motion(&self, value: f64) -> Isometry3<f64> {
        match self.axis_primitive_type {
            JointAxisPrimitiveType::Rotation => {
                let axis = Unit::new_normalize(self.axis.clone());
                Isometry3::from_parts(Translation3::identity(), UnitQuaternion::from_axis_angle(&axis, value))
            }
            JointAxisPrimitiveType::Translation => {
                Isometry3::from_parts(Translation3::from(self.axis.normalize() * value), UnitQuaternion::identity())
            }
        }
    }
}

/// A rigid body of the chain.  A segment without a joint is rigidly fixed to its parent, which
/// is how foot tips and end-effector points are described.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChainSegment {
    pub name: String,
    pub parent_segment_name: Option<String>,
    pub origin_offset: Isometry3<f64>,
    #[serde(default)]
    pub joint: Option<ChainJoint>,
    #[serde(default)]
    pub mass: f64,
    #[serde(default = "default_com_offset")]
    pub com_offset: Vector3<f64>
}
impl ChainSegment {
    pub fn new(name: &str, parent_segment_name: &str, origin_offset: Isometry3<f64>, joint: Option<ChainJoint>, mass: f64, com_offset: Vector3<f64>) -> Self {
        Self {
            name: name.to_string(),
            parent_segment_name: Some(parent_segment_name.to_string()),
            origin_offset,
            joint,
            mass,
            com_offset
        }
    }
}

/// Serializable description of a `SerialChainModel`.  Segments are listed parents first.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SerialChainModelDescriptor {
    pub name: String,
    pub segments: Vec<ChainSegment>,
    #[serde(default)]
    pub planning_groups: Vec<PlanningGroup>,
    #[serde(default = "default_gravity")]
    pub gravity: Vector3<f64>
}
fn default_gravity() -> Vector3<f64> { Vector3::new(0.0, 0.0, -9.81) }

/// A kinematic tree of revolute and prismatic joints.  Each joint contributes exactly one value
/// to the full state, in the order the jointed segments appear.
///
/// # Example
/// ```
/// use nalgebra::{DVector, Isometry3, Vector3};
/// use cio_trajopt::robot_modules::robot_chain_module::{SerialChainModel, ChainJoint};
/// use cio_trajopt::robot_modules::robot_kinematics_module::KinematicModel;
///
/// let mut model = SerialChainModel::new("arm");
/// model.add_segment("link1", "base", Isometry3::identity(), Some(ChainJoint::new_revolute("j1", Vector3::z(), -3.0, 3.0)), 1.0, Vector3::zeros()).unwrap();
/// model.add_segment("tip", "link1", Isometry3::translation(1.0, 0.0, 0.0), None, 0.0, Vector3::zeros()).unwrap();
/// let frames = model.compute_fk(&DVector::from_vec(vec![std::f64::consts::FRAC_PI_2])).unwrap();
/// assert!((frames[2].translation.vector.y - 1.0).abs() < 1e-9);
/// ```
#[derive(Clone, Debug)]
pub struct SerialChainModel {
    name: String,
    segments: Vec<ChainSegment>,
    segment_parent_idxs: Vec<Option<usize>>,
    segment_joint_idxs: Vec<Option<usize>>,
    joint_segment_idxs: Vec<usize>,
    mimic_sources: Vec<Option<(usize, f64, f64)>>,
    planning_groups: Vec<PlanningGroup>,
    gravity: Vector3<f64>
}
impl SerialChainModel {
    /// Creates a model that only holds the fixed world segment named `base`.
    pub fn new(name: &str) -> Self {
        let base = ChainSegment {
            name: "base".to_string(),
            parent_segment_name: None,
            origin_offset: Isometry3::identity(),
            joint: None,
            mass: 0.0,
            com_offset: Vector3::zeros()
        };
        Self {
            name: name.to_string(),
            segments: vec![base],
            segment_parent_idxs: vec![None],
            segment_joint_idxs: vec![None],
            joint_segment_idxs: vec![],
            mimic_sources: vec![],
            planning_groups: vec![],
            gravity: default_gravity()
        }
    }
    pub fn new_from_descriptor(descriptor: &SerialChainModelDescriptor) -> Result<Self, PlannerError> {
        let mut out_self = Self {
            name: descriptor.name.clone(),
            segments: vec![],
            segment_parent_idxs: vec![],
            segment_joint_idxs: vec![],
            joint_segment_idxs: vec![],
            mimic_sources: vec![],
            planning_groups: vec![],
            gravity: descriptor.gravity
        };
        for segment in &descriptor.segments {
            out_self.push_segment(segment.clone())?;
        }
        for group in &descriptor.planning_groups {
            out_self.add_planning_group(group.clone())?;
        }
        Ok(out_self)
    }
    pub fn descriptor(&self) -> SerialChainModelDescriptor {
        SerialChainModelDescriptor {
            name: self.name.clone(),
            segments: self.segments.clone(),
            planning_groups: self.planning_groups.clone(),
            gravity: self.gravity
        }
    }
    /// Appends a segment to the tree and returns its segment index.
    pub fn add_segment(&mut self, name: &str, parent_segment_name: &str, origin_offset: Isometry3<f64>, joint: Option<ChainJoint>, mass: f64, com_offset: Vector3<f64>) -> Result<usize, PlannerError> {
        self.push_segment(ChainSegment::new(name, parent_segment_name, origin_offset, joint, mass, com_offset))
    }
    pub fn add_planning_group(&mut self, mut group: PlanningGroup) -> Result<(), PlannerError> {
        if self.planning_groups.iter().any(|g| g.name() == group.name()) {
            return Err(PlannerError::new_invalid_configuration_error("planning_groups", &format!("Group {} is defined twice.", group.name()), file!(), line!()));
        }
        group.resolve_joint_idxs(&*self)?;
        self.planning_groups.push(group);
        Ok(())
    }
    pub fn set_gravity(&mut self, gravity: Vector3<f64>) {
        self.gravity = gravity;
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn segments(&self) -> &Vec<ChainSegment> {
        &self.segments
    }
    pub fn planning_groups(&self) -> &Vec<PlanningGroup> {
        &self.planning_groups
    }
    fn push_segment(&mut self, segment: ChainSegment) -> Result<usize, PlannerError> {
        if self.segment_idx_from_name(&segment.name).is_some() {
            return Err(PlannerError::new_invalid_configuration_error("segments", &format!("Segment {} is defined twice.", segment.name), file!(), line!()));
        }

        let parent_idx = match &segment.parent_segment_name {
            None => {
                if !self.segments.is_empty() {
                    return Err(PlannerError::new_invalid_configuration_error("segments", &format!("Only the first segment may be a root, but {} has no parent.", segment.name), file!(), line!()));
                }
                None
            }
            Some(parent_name) => {
                match self.segment_idx_from_name(parent_name) {
                    None => {
                        return Err(PlannerError::new_invalid_configuration_error("segments", &format!("Parent {} of segment {} must be defined before it.", parent_name, segment.name), file!(), line!()));
                    }
                    Some(idx) => { Some(idx) }
                }
            }
        };

        let joint_idx = match &segment.joint {
            None => { None }
            Some(joint) => {
                if self.joint_idx_from_name(&joint.name).is_some() {
                    return Err(PlannerError::new_invalid_configuration_error("segments", &format!("Joint {} is defined twice.", joint.name), file!(), line!()));
                }
                if joint.axis.norm() == 0.0 {
                    return Err(PlannerError::new_invalid_configuration_error("segments", &format!("Joint {} has a zero axis.", joint.name), file!(), line!()));
                }
                if joint.lower_limit > joint.upper_limit {
                    return Err(PlannerError::new_invalid_configuration_error("segments", &format!("Joint {} has a lower limit above its upper limit.", joint.name), file!(), line!()));
                }
                let mimic_source = match &joint.mimic {
                    None => { None }
                    Some(mimic) => {
                        match self.joint_idx_from_name(&mimic.source_joint_name) {
                            None => {
                                return Err(PlannerError::new_invalid_configuration_error("segments", &format!("Mimic source {} of joint {} must be defined before it.", mimic.source_joint_name, joint.name), file!(), line!()));
                            }
                            Some(source_idx) => { Some((source_idx, mimic.multiplier, mimic.offset)) }
                        }
                    }
                };
                self.joint_segment_idxs.push(self.segments.len());
                self.mimic_sources.push(mimic_source);
                Some(self.joint_segment_idxs.len() - 1)
            }
        };

        self.segments.push(segment);
        self.segment_parent_idxs.push(parent_idx);
        self.segment_joint_idxs.push(joint_idx);

        Ok(self.segments.len() - 1)
    }
    fn is_ancestor_or_self(&self, ancestor_idx: usize, segment_idx: usize) -> bool {
        let mut curr = Some(segment_idx);
        while let Some(idx) = curr {
            if idx == ancestor_idx { return true; }
            curr = self.segment_parent_idxs[idx];
        }
        false
    }
}
impl KinematicModel for SerialChainModel {
    fn num_joints(&self) -> usize {
        self.joint_segment_idxs.len()
    }
    fn num_segments(&self) -> usize {
        self.segments.len()
    }
    fn joint_names(&self) -> Vec<String> {
        self.joint_segment_idxs.iter().filter_map(|s| self.segments[*s].joint.as_ref().map(|j| j.name.clone())).collect()
    }
    fn joint_idx_from_name(&self, joint_name: &str) -> Option<usize> {
        self.joint_segment_idxs.iter().position(|s| {
            match &self.segments[*s].joint {
                None => { false }
                Some(j) => { j.name == joint_name }
            }
        })
    }
    fn segment_idx_from_name(&self, segment_name: &str) -> Option<usize> {
        self.segments.iter().position(|s| s.name == segment_name)
    }
    fn segment_name(&self, segment_idx: usize) -> Option<String> {
        self.segments.get(segment_idx).map(|s| s.name.clone())
    }
    fn joint_limits(&self, joint_idx: usize) -> (f64, f64) {
        match self.joint_segment_idxs.get(joint_idx).and_then(|s| self.segments[*s].joint.as_ref()) {
            None => { (f64::NEG_INFINITY, f64::INFINITY) }
            Some(j) => { (j.lower_limit, j.upper_limit) }
        }
    }
    fn compute_fk(&self, full_state: &DVector<f64>) -> Result<Vec<Isometry3<f64>>, PlannerError> {
        let mut out = Vec::with_capacity(self.segments.len());
        self.compute_fk_into(full_state, &mut out)?;
        Ok(out)
    }
    fn compute_fk_into(&self, full_state: &DVector<f64>, out_frames: &mut Vec<Isometry3<f64>>) -> Result<(), PlannerError> {
        if full_state.len() != self.num_joints() {
            return Err(PlannerError::new_vec_wrong_size_error("compute_fk", full_state.len(), self.num_joints(), file!(), line!()));
        }
        if full_state.iter().any(|v| !v.is_finite()) {
            return Err(PlannerError::new_kinematic_failure_error("Full state contains a non-finite value.", file!(), line!()));
        }

        out_frames.clear();
        for (segment_idx, segment) in self.segments.iter().enumerate() {
            let mut frame = match self.segment_parent_idxs[segment_idx] {
                None => { segment.origin_offset.clone() }
                Some(parent_idx) => { out_frames[parent_idx] * segment.origin_offset }
            };
            if let (Some(joint), Some(joint_idx)) = (&segment.joint, self.segment_joint_idxs[segment_idx]) {
                frame = frame * joint.motion(full_state[joint_idx]);
            }
            out_frames.push(frame);
        }

        let finite = out_frames.iter().all(|f| {
            f.translation.vector.iter().all(|v| v.is_finite()) && f.rotation.coords.iter().all(|v| v.is_finite())
        });
        if !finite {
            return Err(PlannerError::new_kinematic_failure_error("Forward kinematics produced a non-finite frame.", file!(), line!()));
        }

        Ok(())
    }
    fn segment_masses(&self) -> Vec<f64> {
        self.segments.iter().map(|s| s.mass).collect()
    }
    fn segment_com_offsets(&self) -> Vec<Vector3<f64>> {
        self.segments.iter().map(|s| s.com_offset).collect()
    }
    fn compute_translational_jacobian(&self, _full_state: &DVector<f64>, frames: &[Isometry3<f64>], segment_idx: usize, joint_idxs: &[usize]) -> DMatrix<f64> {
        let mut jacobian = DMatrix::zeros(3, joint_idxs.len());
        if segment_idx >= frames.len() { return jacobian; }
        let end_point = frames[segment_idx].translation.vector;

        for (col, joint_idx) in joint_idxs.iter().enumerate() {
            let joint_segment_idx = match self.joint_segment_idxs.get(*joint_idx) {
                None => { continue; }
                Some(s) => { *s }
            };
            if !self.is_ancestor_or_self(joint_segment_idx, segment_idx) { continue; }
            let joint = match &self.segments[joint_segment_idx].joint {
                None => { continue; }
                Some(j) => { j }
            };

            let pose = &frames[joint_segment_idx];
            let rotated_axis = pose.rotation * joint.axis.normalize();
            let column = match joint.axis_primitive_type {
                JointAxisPrimitiveType::Rotation => {
                    let connector_vec = end_point - pose.translation.vector;
                    rotated_axis.cross(&connector_vec)
                }
                JointAxisPrimitiveType::Translation => { rotated_axis }
            };
            jacobian[(0, col)] = column.x; jacobian[(1, col)] = column.y; jacobian[(2, col)] = column.z;
        }

        jacobian
    }
    fn apply_mimic_joints(&self, full_state: &mut DVector<f64>) {
        for (joint_idx, mimic) in self.mimic_sources.iter().enumerate() {
            if let Some((source_idx, multiplier, offset)) = mimic {
                full_state[joint_idx] = multiplier * full_state[*source_idx] + offset;
            }
        }
    }
    fn planning_group(&self, group_name: &str) -> Option<&PlanningGroup> {
        self.planning_groups.iter().find(|g| g.name() == group_name)
    }
    fn gravity(&self) -> Vector3<f64> {
        self.gravity
    }
}
