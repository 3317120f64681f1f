//! A contact-invariant trajectory optimizer for articulated robots.
//!
//! Given a start configuration, a joint-space or end-effector goal and a static environment,
//! the planner produces a smooth, collision free and dynamically plausible joint trajectory,
//! together with per-phase activations of the robot's contact points.  Several independently
//! initialized trials are optimized in parallel and a shared registry picks the winner.
//!
//! The kinematic model and the collision environment are collaborators behind the
//! `KinematicModel` and `CollisionOracle` traits.  `SerialChainModel` and
//! `GeometricShapeScene` are reference implementations of both.

pub mod optimization;
pub mod planner;
pub mod robot_modules;
pub mod scenes;
pub mod trajectory_modules;
pub mod utils;
