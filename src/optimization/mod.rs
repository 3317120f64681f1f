pub mod best_cost_registry;
pub mod cost_accumulator;
pub mod evaluation_data;
pub mod evaluation_manager;
pub mod smoothness_cost;
pub mod trajectory_optimizer;
