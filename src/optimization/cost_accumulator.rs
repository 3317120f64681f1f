use nalgebra::DMatrix;
use serde::{Serialize, Deserialize};
use strum::{EnumCount, IntoEnumIterator};
use strum_macros::{Display, EnumCount, EnumIter};
use crate::optimization::evaluation_data::EvaluationData;
use crate::utils::utils_console::{trajopt_print, PrintColor, PrintMode};
use crate::utils::utils_errors::PlannerError;

/// The terms that make up the scalar trajectory cost.  All but `Smoothness` are evaluated per
/// waypoint and stored as columns of the per-waypoint cost matrix, in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumCount, Display)]
pub enum CostComponent {
    Collision,
    ContactInvariant,
    PhysicsViolation,
    Ftr,
    Cartesian,
    Singularity,
    Smoothness
}
impl CostComponent {
    pub fn waypoint_column(&self) -> Option<usize> {
        match self {
            CostComponent::Smoothness => { None }
            _ => { Some(*self as usize) }
        }
    }
    pub fn waypoint_components() -> Vec<CostComponent> {
        CostComponent::iter().filter(|c| c.waypoint_column().is_some()).collect()
    }
}

pub const NUM_WAYPOINT_COST_COMPONENTS: usize = CostComponent::COUNT - 1;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CostWeights {
    pub collision: f64,
    pub contact_invariant: f64,
    pub physics_violation: f64,
    pub ftr: f64,
    pub cartesian: f64,
    pub singularity: f64,
    pub smoothness: f64
}
impl Default for CostWeights {
    fn default() -> Self {
        Self {
            collision: 100.0,
            contact_invariant: 10.0,
            physics_violation: 1.0,
            ftr: 0.0,
            cartesian: 10.0,
            singularity: 0.0,
            smoothness: 1e-4
        }
    }
}
impl CostWeights {
    pub fn weight(&self, component: CostComponent) -> f64 {
        match component {
            CostComponent::Collision => { self.collision }
            CostComponent::ContactInvariant => { self.contact_invariant }
            CostComponent::PhysicsViolation => { self.physics_violation }
            CostComponent::Ftr => { self.ftr }
            CostComponent::Cartesian => { self.cartesian }
            CostComponent::Singularity => { self.singularity }
            CostComponent::Smoothness => { self.smoothness }
        }
    }
    pub fn validate(&self) -> Result<(), PlannerError> {
        for component in CostComponent::iter() {
            let w = self.weight(component);
            if !(w >= 0.0 && w.is_finite()) {
                return Err(PlannerError::new_invalid_configuration_error("cost_weights", &format!("Weight of {} must be finite and non-negative, got {}.", component, w), file!(), line!()));
            }
        }
        Ok(())
    }
}

/// Folds the per-waypoint costs and the smoothness cost of an evaluation into one weighted
/// scalar, and separately decides whether the trajectory is feasible.
#[derive(Clone, Debug)]
pub struct CostAccumulator {
    weights: CostWeights,
    physics_violation_tolerance: f64,
    contacts_modeled: bool,
    component_costs: [f64; CostComponent::COUNT],
    max_physics_violation: f64,
    trajectory_valid: bool,
    trajectory_cost: f64
}
impl CostAccumulator {
    pub fn new(weights: CostWeights, physics_violation_tolerance: f64, contacts_modeled: bool) -> Self {
        Self {
            weights,
            physics_violation_tolerance,
            contacts_modeled,
            component_costs: [0.0; CostComponent::COUNT],
            max_physics_violation: 0.0,
            trajectory_valid: true,
            trajectory_cost: 0.0
        }
    }
    pub fn weights(&self) -> &CostWeights {
        &self.weights
    }
    /// Weighted sum of the per-waypoint components of one row of the cost matrix.
    pub fn waypoint_cost(&self, state_costs: &DMatrix<f64>, point: usize) -> f64 {
        let mut out = 0.0;
        for component in CostComponent::iter() {
            if let Some(col) = component.waypoint_column() {
                out += self.weights.weight(component) * state_costs[(point, col)];
            }
        }
        out
    }
    pub fn accumulate(&mut self, data: &EvaluationData) {
        let state_costs = data.state_costs();
        self.component_costs = [0.0; CostComponent::COUNT];
        for component in CostComponent::iter() {
            self.component_costs[component as usize] = match component.waypoint_column() {
                None => { data.smoothness_cost() }
                Some(col) => { state_costs.column(col).sum() }
            };
        }

        let physics_col = CostComponent::PhysicsViolation as usize;
        self.max_physics_violation = state_costs.column(physics_col).iter().fold(0.0, |acc: f64, v| acc.max(*v));
        self.trajectory_valid = data.point_validity().iter().all(|v| *v);

        self.trajectory_cost = (0..state_costs.nrows()).map(|k| self.waypoint_cost(state_costs, k)).sum::<f64>()
            + self.weights.smoothness * data.smoothness_cost();
    }
    pub fn trajectory_cost(&self) -> f64 {
        self.trajectory_cost
    }
    /// Unweighted total of one component over the whole trajectory.
    pub fn component_cost(&self, component: CostComponent) -> f64 {
        self.component_costs[component as usize]
    }
    pub fn max_physics_violation(&self) -> f64 {
        self.max_physics_violation
    }
    /// Feasible means collision free, kinematically valid everywhere and, when contacts are
    /// modeled, physically plausible at every waypoint.
    pub fn is_feasible(&self) -> bool {
        if self.component_cost(CostComponent::Collision) != 0.0 { return false; }
        if !self.trajectory_valid { return false; }
        if self.contacts_modeled && !(self.max_physics_violation < self.physics_violation_tolerance) { return false; }
        true
    }
    pub fn print_costs(&self) {
        for component in CostComponent::iter() {
            let raw = self.component_cost(component);
            let weighted = raw * self.weights.weight(component);
            trajopt_print(&format!("  {:<18} raw {:>14.6e}   weighted {:>14.6e}", component.to_string(), raw, weighted), PrintMode::Println, PrintColor::None, false);
        }
        let color = if self.is_feasible() { PrintColor::Green } else { PrintColor::Red };
        trajopt_print(&format!("  total {:.6e} (feasible: {})", self.trajectory_cost, self.is_feasible()), PrintMode::Println, color, true);
    }
}
