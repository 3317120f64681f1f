use std::sync::Arc;
use std::thread;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use cio_trajopt::optimization::best_cost_registry::BestCostRegistry;

fn expected_best(costs: &[(f64, bool)]) -> usize {
    let feasible: Vec<usize> = (0..costs.len()).filter(|i| costs[*i].1).collect();
    let candidates: Vec<usize> = if feasible.is_empty() { (0..costs.len()).collect() } else { feasible };
    let mut best = candidates[0];
    for i in candidates {
        if costs[i].0 < costs[best].0 { best = i; }
    }
    best
}

#[test]
fn concurrent_reports_select_feasible_minimum() {
    let scenarios: Vec<Vec<(f64, bool)>> = vec![
        vec![(3.0, true), (1.0, false), (2.0, true), (2.0, true)],
        vec![(5.0, false), (4.0, false), (4.0, false), (6.0, false)],
        vec![(1.0, true), (1.0, true), (0.5, false), (1.0, true)],
        vec![(9.0, false), (8.0, true), (7.0, false), (8.0, true), (10.0, true), (0.1, false)]
    ];

    for (scenario_idx, costs) in scenarios.iter().enumerate() {
        for shuffle_seed in 0..8u64 {
            let registry = Arc::new(BestCostRegistry::new(costs.len()));
            let mut order: Vec<usize> = (0..costs.len()).collect();
            order.shuffle(&mut ChaCha8Rng::seed_from_u64(shuffle_seed));

            let handles: Vec<_> = order.into_iter().map(|trial| {
                let registry = registry.clone();
                let (cost, feasible) = costs[trial];
                thread::spawn(move || {
                    // Trials report a worse candidate first, then their final best.
                    registry.report_candidate(trial, cost + 10.0, false);
                    registry.report_candidate(trial, cost, feasible);
                })
            }).collect();
            for h in handles { h.join().unwrap(); }

            assert_eq!(registry.get_best_trajectory_index(), Some(expected_best(costs)), "scenario {}", scenario_idx);
        }
    }
}
