use nalgebra::{DVector, Isometry3, Point3, Vector3};
use parry3d_f64::query::Contact;
use parry3d_f64::shape::{Ball, Cuboid};
use serde::{Serialize, Deserialize};
use crate::robot_modules::robot_kinematics_module::KinematicModel;
use crate::utils::utils_errors::PlannerError;

/// The read-only environment collaborator.  All queries take the segment frames of a single
/// waypoint, as produced by `KinematicModel::compute_fk`.
pub trait CollisionOracle: Send + Sync {
    fn is_valid(&self, full_state: &DVector<f64>, segment_frames: &[Isometry3<f64>]) -> bool;
    /// Non-negative penetration measure of the robot into the environment at one waypoint.
    fn penetration_depth(&self, full_state: &DVector<f64>, segment_frames: &[Isometry3<f64>]) -> f64 {
        if self.is_valid(full_state, segment_frames) { 0.0 } else { 1.0 }
    }
    /// Signed distance from a world point to the support surface.  Negative below it.
    fn surface_distance(&self, world_point: &Vector3<f64>) -> f64;
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum ObstacleShape {
    Ball { radius: f64 },
    Cuboid { half_extents: Vector3<f64> }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SceneObstacle {
    pub name: String,
    pub shape: ObstacleShape,
    pub pose: Isometry3<f64>
}

/// A sphere rigidly attached to a robot segment, used to approximate that segment's volume.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SegmentCollisionSphere {
    pub segment_idx: usize,
    pub radius: f64,
    pub local_offset: Vector3<f64>
}

/// Reference environment made of a horizontal ground plane plus ball and cuboid obstacles.
/// The robot is approximated by spheres attached to its segments.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GeometricShapeScene {
    ground_height: f64,
    #[serde(default)]
    ground_collision: bool,
    #[serde(default)]
    obstacles: Vec<SceneObstacle>,
    #[serde(default)]
    segment_spheres: Vec<SegmentCollisionSphere>
}
impl GeometricShapeScene {
    pub fn new(ground_height: f64) -> Self {
        Self {
            ground_height,
            ground_collision: false,
            obstacles: vec![],
            segment_spheres: vec![]
        }
    }
    /// When set, segment spheres that dip below the ground plane count as penetration.
    pub fn set_ground_collision(&mut self, ground_collision: bool) {
        self.ground_collision = ground_collision;
    }
    pub fn add_obstacle(&mut self, name: &str, shape: ObstacleShape, pose: Isometry3<f64>) -> Result<usize, PlannerError> {
        let valid = match &shape {
            ObstacleShape::Ball { radius } => { *radius > 0.0 }
            ObstacleShape::Cuboid { half_extents } => { half_extents.iter().all(|h| *h > 0.0) }
        };
        if !valid {
            return Err(PlannerError::new_invalid_configuration_error("obstacles", &format!("Obstacle {} must have positive dimensions.", name), file!(), line!()));
        }
        self.obstacles.push(SceneObstacle { name: name.to_string(), shape, pose });
        Ok(self.obstacles.len() - 1)
    }
    pub fn add_segment_sphere(&mut self, model: &dyn KinematicModel, segment_name: &str, radius: f64, local_offset: Vector3<f64>) -> Result<(), PlannerError> {
        let segment_idx = match model.segment_idx_from_name(segment_name) {
            None => {
                return Err(PlannerError::new_invalid_configuration_error("segment_spheres", &format!("Unknown segment {}.", segment_name), file!(), line!()));
            }
            Some(idx) => { idx }
        };
        if radius <= 0.0 {
            return Err(PlannerError::new_invalid_configuration_error("segment_spheres", &format!("Sphere on {} must have a positive radius.", segment_name), file!(), line!()));
        }
        self.segment_spheres.push(SegmentCollisionSphere { segment_idx, radius, local_offset });
        Ok(())
    }
    pub fn ground_height(&self) -> f64 {
        self.ground_height
    }
    pub fn obstacles(&self) -> &Vec<SceneObstacle> {
        &self.obstacles
    }
    fn sphere_contact(sphere_pose: &Isometry3<f64>, radius: f64, obstacle: &SceneObstacle) -> Option<Contact> {
        let ball = Ball::new(radius);
        let res = match &obstacle.shape {
            ObstacleShape::Ball { radius } => {
                parry3d_f64::query::contact(sphere_pose, &ball, &obstacle.pose, &Ball::new(*radius), 0.0)
            }
            ObstacleShape::Cuboid { half_extents } => {
                parry3d_f64::query::contact(sphere_pose, &ball, &obstacle.pose, &Cuboid::new(*half_extents), 0.0)
            }
        };
        res.ok().flatten()
    }
}
impl CollisionOracle for GeometricShapeScene {
    fn is_valid(&self, full_state: &DVector<f64>, segment_frames: &[Isometry3<f64>]) -> bool {
        self.penetration_depth(full_state, segment_frames) <= 0.0
    }
    fn penetration_depth(&self, _full_state: &DVector<f64>, segment_frames: &[Isometry3<f64>]) -> f64 {
        let mut out = 0.0;
        for sphere in &self.segment_spheres {
            let frame = match segment_frames.get(sphere.segment_idx) {
                None => { continue; }
                Some(f) => { f }
            };
            let center = frame * Point3::from(sphere.local_offset);
            let sphere_pose = Isometry3::translation(center.x, center.y, center.z);

            for obstacle in &self.obstacles {
                if let Some(contact) = Self::sphere_contact(&sphere_pose, sphere.radius, obstacle) {
                    if contact.dist < 0.0 { out += -contact.dist; }
                }
            }

            if self.ground_collision {
                let clearance = center.z - self.ground_height;
                if clearance < sphere.radius { out += sphere.radius - clearance; }
            }
        }
        out
    }
    fn surface_distance(&self, world_point: &Vector3<f64>) -> f64 {
        world_point.z - self.ground_height
    }
}
