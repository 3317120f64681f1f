use nalgebra::{Isometry3, Vector3, Vector4};
use crate::robot_modules::robot_kinematics_module::KinematicModel;
use crate::scenes::collision_scene::CollisionOracle;
use crate::utils::utils_errors::PlannerError;

/// A link of the robot that may touch the support surface.  All queries read cached segment
/// frames indexed as `segment_frames[point][segment]` and never mutate shared state.
#[derive(Clone, Debug)]
pub struct ContactPointModel {
    link_name: String,
    link_segment_idx: usize
}
impl ContactPointModel {
    pub fn new(link_name: &str, model: &dyn KinematicModel) -> Result<Self, PlannerError> {
        let link_segment_idx = match model.segment_idx_from_name(link_name) {
            None => {
                return Err(PlannerError::new_invalid_configuration_error("contact_link_names", &format!("Contact link {} is not a segment of the model.", link_name), file!(), line!()));
            }
            Some(idx) => { idx }
        };
        Ok(Self {
            link_name: link_name.to_string(),
            link_segment_idx
        })
    }
    pub fn link_name(&self) -> &str {
        &self.link_name
    }
    pub fn link_segment_idx(&self) -> usize {
        self.link_segment_idx
    }
    pub fn frame(&self, point: usize, segment_frames: &[Vec<Isometry3<f64>>]) -> Isometry3<f64> {
        segment_frames[point][self.link_segment_idx]
    }
    pub fn position(&self, point: usize, segment_frames: &[Vec<Isometry3<f64>>]) -> Vector3<f64> {
        segment_frames[point][self.link_segment_idx].translation.vector
    }
    /// Recomputes the violation vector and the contact velocity of waypoints `start..=end`.
    ///
    /// Components 0 to 2 of the violation are the contact displacement over one time step and
    /// component 3 is the signed distance to the support surface.  The velocity is the central
    /// difference of the contact position, one-sided at the ends of the trajectory.
    pub fn update_contact_violation_vector(&self,
                                           start: usize,
                                           end: usize,
                                           discretization: f64,
                                           contact_violation_vector: &mut [Vector4<f64>],
                                           contact_point_vel_vector: &mut [Vector3<f64>],
                                           segment_frames: &[Vec<Isometry3<f64>>],
                                           oracle: &dyn CollisionOracle) {
        let num_points = segment_frames.len();
        if num_points == 0 { return; }
        let end = end.min(num_points - 1);

        for point in start..=end {
            let prev = if point > 0 { point - 1 } else { point };
            let next = if point + 1 < num_points { point + 1 } else { point };

            let vel = if next > prev {
                (self.position(next, segment_frames) - self.position(prev, segment_frames)) / ((next - prev) as f64 * discretization)
            } else {
                Vector3::zeros()
            };
            let distance = self.distance_to_ground(point, segment_frames, oracle);

            let displacement = vel * discretization;
            contact_violation_vector[point] = Vector4::new(displacement.x, displacement.y, displacement.z, distance);
            contact_point_vel_vector[point] = vel;
        }
    }
    pub fn distance_to_ground(&self, point: usize, segment_frames: &[Vec<Isometry3<f64>>], oracle: &dyn CollisionOracle) -> f64 {
        oracle.surface_distance(&self.position(point, segment_frames))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::DVector;
    use crate::robot_modules::robot_chain_module::{ChainJoint, SerialChainModel};
    use crate::scenes::collision_scene::GeometricShapeScene;

    fn vertical_slider() -> SerialChainModel {
        let mut model = SerialChainModel::new("leg");
        model.add_segment("hip", "base", Isometry3::translation(0.0, 0.0, 1.0), Some(ChainJoint::new_prismatic("z", Vector3::z(), -1.0, 1.0)), 1.0, Vector3::zeros()).unwrap();
        model.add_segment("foot", "hip", Isometry3::translation(0.0, 0.0, -1.0), None, 0.0, Vector3::zeros()).unwrap();
        model
    }

    #[test]
    fn violation_tracks_motion_and_height() {
        let model = vertical_slider();
        let scene = GeometricShapeScene::new(0.0);
        let contact = ContactPointModel::new("foot", &model).unwrap();
        let dt = 0.1;
        let heights = vec![0.0, 0.1, 0.2];
        let frames: Vec<Vec<Isometry3<f64>>> = heights.iter().map(|h| model.compute_fk(&DVector::from_vec(vec![*h])).unwrap()).collect();

        let mut violation = vec![Vector4::zeros(); 3];
        let mut vel = vec![Vector3::zeros(); 3];
        contact.update_contact_violation_vector(0, 2, dt, &mut violation, &mut vel, &frames, &scene);

        assert_abs_diff_eq!(vel[1].z, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(violation[1][2], 0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(violation[1][3], 0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(violation[0][3], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(vel[2].z, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn unknown_link_is_rejected() {
        let model = vertical_slider();
        assert!(ContactPointModel::new("hand", &model).is_err());
    }
}
