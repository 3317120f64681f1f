pub mod planning_info;
pub mod planning_parameters;
pub mod planning_request;
pub mod trajectory_planner;
