pub mod robot_kinematics_module;
pub mod robot_chain_module;
pub mod contact_point_module;
