mod common;

use approx::assert_relative_eq;
use cio_trajopt::optimization::cost_accumulator::CostComponent;
use cio_trajopt::optimization::evaluation_data::DerivativeVariableType;
use common::*;

fn velocity_params() -> cio_trajopt::planner::planning_parameters::PlannerParameters {
    let mut params = leg_params();
    params.optimize_velocities = true;
    params
}

#[test]
fn restore_is_idempotent_for_every_variable_kind() {
    let params = velocity_params();
    let mut m = crouching_leg_manager(&params);
    let cost = m.evaluate();
    let costs = m.default_data().state_costs().clone();
    let com = m.default_data().com_positions().clone();

    let probes = [
        (0.2, DerivativeVariableType::Position, 7, 0),
        (-0.4, DerivativeVariableType::Position, 1, 1),
        (3.0, DerivativeVariableType::Velocity, 12, 1),
        (0.0, DerivativeVariableType::Contact, 1, 0),
        (0.5, DerivativeVariableType::Contact, 4, 0)
    ];
    for (value, variable_type, point, joint) in probes {
        m.backup_and_set_variables(value, variable_type, point, joint);
        m.restore_variable();
        assert_eq!(m.default_data().state_costs(), &costs);
        assert_eq!(m.default_data().com_positions(), &com);
        assert_eq!(m.default_data().trajectory_cost(), cost);
    }
    assert_eq!(m.evaluate(), cost);
    assert_eq!(m.default_data().state_costs(), &costs);
}

#[test]
fn windowed_probe_matches_full_evaluation() {
    let params = velocity_params();
    let probes = [
        (0.07, DerivativeVariableType::Position, 9, 0),
        (0.5, DerivativeVariableType::Position, 10, 1),
        (0.1, DerivativeVariableType::Position, 1, 0),
        (0.25, DerivativeVariableType::Position, 19, 1),
        (-1.0, DerivativeVariableType::Velocity, 5, 1),
        (0.3, DerivativeVariableType::Contact, 2, 0),
        (0.9, DerivativeVariableType::Contact, 3, 0)
    ];
    for (value, variable_type, point, joint) in probes {
        let mut probed = crouching_leg_manager(&params);
        probed.evaluate();
        let windowed = probed.evaluate_derivatives(value, variable_type, point, joint);

        let mut fresh = crouching_leg_manager(&params);
        {
            let t = fresh.trajectory_mut();
            match variable_type {
                DerivativeVariableType::Position => { t.set_position(point, joint, value); }
                DerivativeVariableType::Velocity => { t.set_velocity(point, joint, value); }
                DerivativeVariableType::Contact => { t.set_contact_value(point, joint, value); }
            }
        }
        let full = fresh.evaluate();
        assert_relative_eq!(windowed, full, epsilon = 1e-8, max_relative = 1e-9);
    }
}

#[test]
fn probe_window_follows_variable_kind() {
    let params = leg_params();
    let mut m = crouching_leg_manager(&params);
    m.evaluate();
    let n = m.trajectory().num_points();

    m.backup_and_set_variables(0.1, DerivativeVariableType::Position, 6, 0);
    assert_eq!(m.full_vars_range(), (5, 7));
    m.restore_variable();

    m.backup_and_set_variables(0.1, DerivativeVariableType::Velocity, 6, 0);
    assert_eq!(m.full_vars_range(), (6, 6));
    m.restore_variable();

    let phase = m.trajectory().contact_phase_point_range(1);
    m.backup_and_set_variables(0.1, DerivativeVariableType::Contact, 1, 0);
    assert_eq!(m.full_vars_range(), phase);
    m.restore_variable();

    assert_eq!(m.full_vars_range(), (0, n - 1));
}

#[test]
fn released_contact_ignores_clearance() {
    let params = leg_params();
    let mut m = crouching_leg_manager(&params);
    m.evaluate();
    let (start, end) = m.trajectory().contact_phase_point_range(2);
    let costs = m.default_data().state_costs();
    for point in start..=end {
        assert_eq!(costs[(point, CostComponent::ContactInvariant as usize)], 0.0);
    }
    // The foot is lifted during that phase, so keeping it active costs clearance.
    m.backup_and_set_variables(1.0, DerivativeVariableType::Contact, 2, 0);
    let costs = m.default_data().state_costs();
    for point in start..=end {
        assert!(costs[(point, CostComponent::ContactInvariant as usize)] > 0.0);
    }
    m.restore_variable();
}

#[test]
#[should_panic]
fn nested_probe_is_a_contract_violation() {
    let params = leg_params();
    let mut m = crouching_leg_manager(&params);
    m.evaluate();
    m.backup_and_set_variables(0.1, DerivativeVariableType::Position, 3, 0);
    m.backup_and_set_variables(0.1, DerivativeVariableType::Position, 4, 0);
}

#[test]
fn non_finite_joint_costs_worst_case_around_the_waypoint() {
    let params = leg_params();
    let mut m = crouching_leg_manager(&params);
    m.trajectory_mut().set_position(5, 1, f64::NAN);
    let cost = m.evaluate();

    assert!(cost.is_finite());
    assert!(cost >= params.worst_case_cost);
    assert!(!m.is_last_trajectory_feasible());
    assert!(!m.default_data().point_validity()[5]);
    assert_eq!(m.default_data().smoothness_cost(), params.worst_case_cost);
    let costs = m.default_data().state_costs();
    for point in 4..=6 {
        for col in 0..costs.ncols() {
            assert_eq!(costs[(point, col)], params.worst_case_cost);
        }
    }
    for point in [3, 7] {
        assert!(costs[(point, CostComponent::Collision as usize)] < params.worst_case_cost);
    }
}

#[test]
fn failing_perturbation_is_finite_and_restores_exactly() {
    let params = leg_params();
    let mut m = crouching_leg_manager(&params);
    let cost = m.evaluate();
    let costs = m.default_data().state_costs().clone();
    let validity = m.default_data().point_validity().clone();
    let smoothness = m.default_data().smoothness_cost();
    let trajectory = m.trajectory().clone();

    for value in [f64::NAN, f64::INFINITY] {
        let probed = m.backup_and_set_variables(value, DerivativeVariableType::Position, 5, 1);
        assert!(probed.is_finite());
        assert!(probed >= params.worst_case_cost);
        assert!(!m.default_data().point_validity()[5]);
        m.restore_variable();

        assert_eq!(m.default_data().state_costs(), &costs);
        assert_eq!(m.default_data().point_validity(), &validity);
        assert_eq!(m.default_data().smoothness_cost(), smoothness);
        assert_eq!(m.default_data().trajectory_cost(), cost);
        assert_eq!(m.trajectory(), &trajectory);
    }
    assert_eq!(m.evaluate(), cost);
}

#[test]
fn failing_perturbation_matches_full_evaluation() {
    let params = leg_params();
    let mut probed = crouching_leg_manager(&params);
    probed.evaluate();
    let windowed = probed.evaluate_derivatives(f64::NAN, DerivativeVariableType::Position, 5, 1);

    let mut fresh = crouching_leg_manager(&params);
    fresh.trajectory_mut().set_position(5, 1, f64::NAN);
    let full = fresh.evaluate();
    assert_relative_eq!(windowed, full, epsilon = 1e-6, max_relative = 1e-9);
}

#[test]
fn repairing_a_failing_waypoint_matches_full_evaluation() {
    let params = leg_params();
    let mut probed = crouching_leg_manager(&params);
    probed.trajectory_mut().set_position(5, 1, f64::NAN);
    probed.evaluate();
    let windowed = probed.evaluate_derivatives(0.3, DerivativeVariableType::Position, 5, 1);

    let mut fresh = crouching_leg_manager(&params);
    fresh.trajectory_mut().set_position(5, 1, 0.3);
    let full = fresh.evaluate();
    assert!(full < params.worst_case_cost);
    assert_relative_eq!(windowed, full, epsilon = 1e-6, max_relative = 1e-9);
}
