use nalgebra::DMatrix;
use crate::trajectory_modules::trajectory::Trajectory;
use crate::utils::utils_errors::PlannerError;
use crate::utils::utils_math::finite_difference::FiniteDifferenceUtils;

const PADDING: usize = 2;

/// Integrated squared velocity, acceleration and jerk of each joint column, expressed as a
/// fixed quadratic form `xᵀ A x` over the waypoints.
///
/// The column is padded on both sides with copies of its boundary values before the finite
/// difference stencils are applied, which amounts to assuming the robot rests before the start
/// and after the goal.
#[derive(Clone, Debug)]
pub struct SmoothnessCost {
    quadratic_form: DMatrix<f64>,
    bandwidth: usize
}
impl SmoothnessCost {
    pub fn new(num_points: usize, discretization: f64, velocity_weight: f64, acceleration_weight: f64, jerk_weight: f64) -> Result<Self, PlannerError> {
        let padded_len = num_points + 2 * PADDING;
        let mut padding = DMatrix::zeros(padded_len, num_points);
        for r in 0..padded_len {
            let c = (r as isize - PADDING as isize).clamp(0, num_points as isize - 1) as usize;
            padding[(r, c)] = 1.0;
        }

        let mut quadratic_form = DMatrix::zeros(num_points, num_points);
        let terms = [(velocity_weight, 1, 1), (acceleration_weight, 2, 1), (jerk_weight, 3, 2)];
        for (weight, derivative_order, half_width) in terms {
            if weight == 0.0 { continue; }
            let diff = FiniteDifferenceUtils::get_central_difference_matrix(padded_len, discretization, derivative_order, half_width)? * &padding;
            quadratic_form += (diff.transpose() * &diff) * (weight * discretization);
        }

        let mut bandwidth = 0;
        for r in 0..num_points {
            for c in r..num_points {
                if quadratic_form[(r, c)] != 0.0 { bandwidth = bandwidth.max(c - r); }
            }
        }

        Ok(Self { quadratic_form, bandwidth })
    }
    pub fn quadratic_form(&self) -> &DMatrix<f64> {
        &self.quadratic_form
    }
    /// Largest `|r - c|` with a non-zero entry in the quadratic form.
    pub fn bandwidth(&self) -> usize {
        self.bandwidth
    }
    /// Sum of `xᵀ A x` over the position columns of the given joints.
    pub fn cost(&self, trajectory: &Trajectory, joint_idxs: &[usize]) -> f64 {
        let mut out = 0.0;
        for j in joint_idxs {
            let x = trajectory.trajectory_matrix().column(*j);
            out += x.dot(&(&self.quadratic_form * x));
        }
        out
    }
    /// Change of the cost of one joint column when waypoint `point` moves to `new_value`.
    /// Only the waypoints within `bandwidth` of `point` are read.
    pub fn cost_delta(&self, trajectory: &Trajectory, joint_idx: usize, point: usize, new_value: f64) -> f64 {
        let x = trajectory.trajectory_matrix().column(joint_idx);
        let delta = new_value - x[point];
        let lo = point.saturating_sub(self.bandwidth);
        let hi = (point + self.bandwidth).min(x.len() - 1);
        let ax_point: f64 = (lo..=hi).map(|c| self.quadratic_form[(point, c)] * x[c]).sum();
        2.0 * delta * ax_point + delta * delta * self.quadratic_form[(point, point)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    fn ramp_trajectory() -> Trajectory {
        let mut t = Trajectory::new(1, 1.0, 0.1, 0, 0.2).unwrap();
        for i in 0..t.num_points() { t.set_position(i, 0, (i as f64 * 0.1).powi(2)); }
        t
    }

    #[test]
    fn constant_trajectory_costs_nothing() {
        let mut t = Trajectory::new(1, 1.0, 0.1, 0, 0.2).unwrap();
        t.fill_all_points(&DVector::from_vec(vec![0.7])).unwrap();
        let s = SmoothnessCost::new(t.num_points(), 0.1, 1.0, 1.0, 1.0).unwrap();
        assert_relative_eq!(s.cost(&t, &[0]), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn delta_matches_recomputed_cost() {
        let mut t = ramp_trajectory();
        let s = SmoothnessCost::new(t.num_points(), 0.1, 0.5, 1.0, 1.0).unwrap();
        let before = s.cost(&t, &[0]);
        let delta = s.cost_delta(&t, 0, 4, 0.3);
        t.set_position(4, 0, 0.3);
        let after = s.cost(&t, &[0]);
        assert_relative_eq!(after - before, delta, epsilon = 1e-6, max_relative = 1e-9);
    }

    #[test]
    fn jerk_form_is_banded() {
        let s = SmoothnessCost::new(21, 0.05, 0.0, 0.0, 1.0).unwrap();
        assert_eq!(s.bandwidth(), 4);
        assert_eq!(s.quadratic_form()[(10, 15)], 0.0);
        assert!(s.quadratic_form()[(10, 14)] != 0.0);
    }

    #[test]
    fn delta_ignores_waypoints_outside_the_band() {
        let mut t = ramp_trajectory();
        let s = SmoothnessCost::new(t.num_points(), 0.1, 0.0, 0.0, 1.0).unwrap();
        let delta = s.cost_delta(&t, 0, 2, 0.5);
        t.set_position(9, 0, f64::NAN);
        assert_eq!(s.cost_delta(&t, 0, 2, 0.5), delta);
    }

    #[test]
    fn min_jerk_fill_beats_linear_interpolation() {
        let mut smooth = Trajectory::new(1, 1.0, 0.05, 0, 0.25).unwrap();
        smooth.set_position(smooth.num_points() - 1, 0, 1.0);
        let mut linear = smooth.clone();
        smooth.fill_in_min_jerk(&[0], &DVector::zeros(1), &DVector::zeros(1)).unwrap();
        let n = linear.num_points();
        for i in 1..n - 1 { linear.set_position(i, 0, i as f64 / (n - 1) as f64); }

        let s = SmoothnessCost::new(n, 0.05, 0.0, 0.0, 1.0).unwrap();
        assert!(s.cost(&smooth, &[0]) < s.cost(&linear, &[0]));
    }
}
