pub mod path_constraints;
pub mod trajectory;
pub mod trajectory_seed_module;
