use rand_chacha::ChaCha8Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_distr::{Normal, Distribution};
use crate::utils::utils_errors::PlannerError;

pub struct SimpleSamplers;
impl SimpleSamplers {
    /// Returns the deterministic generator used by a trial.  Two trials with the same
    /// `(seed, stream)` pair draw identical samples.
    pub fn seeded_rng(seed: u64, stream: u64) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(stream);
        rng
    }
    pub fn normal_samples_seeded(rng: &mut ChaCha8Rng, means_and_standard_deviations: &Vec<(f64, f64)>) -> Result<Vec<f64>, PlannerError> {
        let mut out_vec = vec![];
        for (mean, standard_deviation) in means_and_standard_deviations {
            if *standard_deviation == 0.0 { out_vec.push(*mean); continue; }
            let distribution = Normal::new(*mean, *standard_deviation)
                .map_err(|e| PlannerError::new_generic_error_str(&format!("Invalid normal distribution ({}).", e), file!(), line!()))?;
            out_vec.push(distribution.sample(rng));
        }
        Ok(out_vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_samples() {
        let mut a = SimpleSamplers::seeded_rng(7, 3);
        let mut b = SimpleSamplers::seeded_rng(7, 3);
        let n = vec![(0.0, 1.0); 4];
        assert_eq!(SimpleSamplers::normal_samples_seeded(&mut a, &n).unwrap(), SimpleSamplers::normal_samples_seeded(&mut b, &n).unwrap());

        let mut c = SimpleSamplers::seeded_rng(7, 4);
        let mut d = SimpleSamplers::seeded_rng(7, 3);
        assert_ne!(SimpleSamplers::normal_samples_seeded(&mut c, &n).unwrap(), SimpleSamplers::normal_samples_seeded(&mut d, &n).unwrap());
    }

    #[test]
    fn zero_deviation_returns_mean() {
        let mut rng = SimpleSamplers::seeded_rng(1, 0);
        let s = SimpleSamplers::normal_samples_seeded(&mut rng, &vec![(2.5, 0.0)]).unwrap();
        assert_eq!(s, vec![2.5]);
    }
}
