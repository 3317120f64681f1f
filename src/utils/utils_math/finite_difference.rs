use nalgebra::{DMatrix, DVector};
use factorial::Factorial;
use crate::utils::utils_errors::PlannerError;

pub struct FiniteDifferenceUtils;
impl FiniteDifferenceUtils {
    /// Time stencils should be with respect to the current time (i.e., current time should be 0.0,
    /// a time 1 second ago should be -1.0, etc.)
    pub fn get_fd_coefficients(time_stencils: &Vec<f64>, derivative_order: usize) -> Result<Vec<f64>, PlannerError> {
        let n = time_stencils.len();
        if derivative_order >= n {
            return Err(PlannerError::new_generic_error_str(&format!("Derivative order {} needs more than {} stencil points.", derivative_order, n), file!(), line!()));
        }

        let mut m = DMatrix::<f64>::zeros(n, n);
        let mut v = DVector::<f64>::zeros(n);

        v[derivative_order] = derivative_order.factorial() as f64;

        for i in 0..n {
            for j in 0..n {
                m[(i,j)] = time_stencils[j].powi(i as i32);
            }
        }

        let m_inv = m.pseudo_inverse(0.00001).map_err(|e| PlannerError::new_generic_error_str(e, file!(), line!()))?;
        let res = m_inv * v;

        return Ok(res.data.as_slice().to_vec());
    }
    /// Returns the `(num_samples - 2 * half_width) x num_samples` matrix that maps a column of
    /// samples spaced by `discretization` to its central-difference derivative of the given order
    /// at every sample where the `2 * half_width + 1` point stencil fits.
    pub fn get_central_difference_matrix(num_samples: usize, discretization: f64, derivative_order: usize, half_width: usize) -> Result<DMatrix<f64>, PlannerError> {
        let stencil_len = 2 * half_width + 1;
        if num_samples < stencil_len {
            return Ok(DMatrix::zeros(0, num_samples));
        }
        // Solved on a unit-spaced stencil, then rescaled.
        let stencil: Vec<f64> = (0..stencil_len).map(|k| k as f64 - half_width as f64).collect();
        let scale = discretization.powi(derivative_order as i32);
        let coefficients: Vec<f64> = Self::get_fd_coefficients(&stencil, derivative_order)?.iter().map(|c| c / scale).collect();

        let num_rows = num_samples - 2 * half_width;
        let mut out = DMatrix::zeros(num_rows, num_samples);
        for row in 0..num_rows {
            for (k, c) in coefficients.iter().enumerate() {
                out[(row, row + k)] = *c;
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn central_stencil_coefficients() {
        let c1 = FiniteDifferenceUtils::get_fd_coefficients(&vec![-1.0, 0.0, 1.0], 1).unwrap();
        assert_abs_diff_eq!(c1[0], -0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(c1[1], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(c1[2], 0.5, epsilon = 1e-6);

        let c2 = FiniteDifferenceUtils::get_fd_coefficients(&vec![-1.0, 0.0, 1.0], 2).unwrap();
        assert_abs_diff_eq!(c2[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(c2[1], -2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(c2[2], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn difference_matrix_differentiates_quadratic() {
        let dt = 0.1;
        let m = FiniteDifferenceUtils::get_central_difference_matrix(6, dt, 2, 1).unwrap();
        let x = DVector::from_iterator(6, (0..6).map(|i| { let t = i as f64 * dt; t * t }));
        let acc = m * x;
        for a in acc.iter() { assert_abs_diff_eq!(*a, 2.0, epsilon = 1e-4); }
    }

    #[test]
    fn five_point_stencil_differentiates_cubic() {
        let dt = 0.05;
        let m = FiniteDifferenceUtils::get_central_difference_matrix(9, dt, 3, 2).unwrap();
        assert_eq!(m.nrows(), 5);
        let x = DVector::from_iterator(9, (0..9).map(|i| { let t = i as f64 * dt; t * t * t }));
        let jerk = m * x;
        for j in jerk.iter() { assert_abs_diff_eq!(*j, 6.0, epsilon = 1e-3); }
    }

    #[test]
    fn derivative_order_must_fit_stencil() {
        assert!(FiniteDifferenceUtils::get_fd_coefficients(&vec![0.0, 1.0], 2).is_err());
    }
}
