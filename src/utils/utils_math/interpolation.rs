/// A fifth-order (minimum-jerk) polynomial between two boundary states, each given as
/// position, velocity and acceleration, over a segment of length `duration`.
#[derive(Clone, Debug)]
pub struct MinJerkCurve {
    coefficients: [f64; 6],
    duration: f64
}
impl MinJerkCurve {
    pub fn new(x0: f64, v0: f64, a0: f64, x1: f64, v1: f64, a1: f64, duration: f64) -> Self {
        if duration <= 0.0 {
            return Self { coefficients: [x1, 0.0, 0.0, 0.0, 0.0, 0.0], duration: 0.0 };
        }
        let t = duration;
        let t2 = t * t;
        let t3 = t2 * t;
        let t4 = t3 * t;
        let t5 = t4 * t;

        let c0 = x0;
        let c1 = v0;
        let c2 = 0.5 * a0;
        let c3 = (20.0 * (x1 - x0) - (8.0 * v1 + 12.0 * v0) * t - (3.0 * a0 - a1) * t2) / (2.0 * t3);
        let c4 = (30.0 * (x0 - x1) + (14.0 * v1 + 16.0 * v0) * t + (3.0 * a0 - 2.0 * a1) * t2) / (2.0 * t4);
        let c5 = (12.0 * (x1 - x0) - 6.0 * (v1 + v0) * t - (a0 - a1) * t2) / (2.0 * t5);

        Self {
            coefficients: [c0, c1, c2, c3, c4, c5],
            duration
        }
    }
    /// Rest-to-rest curve.
    pub fn new_rest_to_rest(x0: f64, x1: f64, duration: f64) -> Self {
        Self::new(x0, 0.0, 0.0, x1, 0.0, 0.0, duration)
    }
    #[inline]
    pub fn position(&self, t: f64) -> f64 {
        let t = self.clamp_time(t);
        let c = &self.coefficients;
        c[0] + t * (c[1] + t * (c[2] + t * (c[3] + t * (c[4] + t * c[5]))))
    }
    #[inline]
    pub fn velocity(&self, t: f64) -> f64 {
        let t = self.clamp_time(t);
        let c = &self.coefficients;
        c[1] + t * (2.0 * c[2] + t * (3.0 * c[3] + t * (4.0 * c[4] + t * 5.0 * c[5])))
    }
    #[inline]
    pub fn acceleration(&self, t: f64) -> f64 {
        let t = self.clamp_time(t);
        let c = &self.coefficients;
        2.0 * c[2] + t * (6.0 * c[3] + t * (12.0 * c[4] + t * 20.0 * c[5]))
    }
    pub fn duration(&self) -> f64 {
        self.duration
    }
    fn clamp_time(&self, t: f64) -> f64 {
        t.max(0.0).min(self.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn boundary_conditions_hold() {
        let c = MinJerkCurve::new(0.2, 0.5, -1.0, 1.5, 0.1, 0.3, 2.0);
        assert_abs_diff_eq!(c.position(0.0), 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(c.velocity(0.0), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(c.acceleration(0.0), -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c.position(2.0), 1.5, epsilon = 1e-9);
        assert_abs_diff_eq!(c.velocity(2.0), 0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(c.acceleration(2.0), 0.3, epsilon = 1e-9);
    }

    #[test]
    fn rest_to_rest_matches_quintic_time_scaling() {
        let tf = 2.0;
        let c = MinJerkCurve::new_rest_to_rest(0.0, 1.0, tf);
        let t: f64 = 0.6;
        let s = 10.0 * (t / tf).powi(3) - 15.0 * (t / tf).powi(4) + 6.0 * (t / tf).powi(5);
        assert_abs_diff_eq!(c.position(t), s, epsilon = 1e-12);
        assert_abs_diff_eq!(c.position(1.0), 0.5, epsilon = 1e-12);
    }
}
