use std::sync::{Mutex, MutexGuard};
use ordered_float::OrderedFloat;
use serde::{Serialize, Deserialize};

/// The latest candidate one trial has reported.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrialReport {
    pub trial_idx: usize,
    pub cost: f64,
    pub feasible: bool
}
impl TrialReport {
    /// Feasible candidates first, then lower cost, then lower trial index.
    fn ranking_key(&self) -> (bool, OrderedFloat<f64>, usize) {
        (!self.feasible, OrderedFloat(self.cost), self.trial_idx)
    }
}

/// Scoreboard shared by all trials of one planning-group optimization.
///
/// Trials call `report_candidate` from their own worker threads.  The winning index is only
/// meaningful once every trial has been joined.
///
/// # Example
/// ```
/// use cio_trajopt::optimization::best_cost_registry::BestCostRegistry;
/// let registry = BestCostRegistry::new(3);
/// registry.report_candidate(0, 1.0, false);
/// registry.report_candidate(1, 5.0, true);
/// registry.report_candidate(2, 2.0, true);
/// assert_eq!(registry.get_best_trajectory_index(), Some(2));
/// ```
#[derive(Debug)]
pub struct BestCostRegistry {
    reports: Mutex<Vec<Option<TrialReport>>>
}
impl BestCostRegistry {
    pub fn new(num_trials: usize) -> Self {
        Self { reports: Mutex::new(vec![None; num_trials]) }
    }
    /// Clears every report and resizes the board, at the start of a new group optimization.
    pub fn reset(&self, num_trials: usize) {
        let mut reports = self.lock();
        reports.clear();
        reports.resize(num_trials, None);
    }
    /// Records the current candidate of a trial, replacing its previous report.
    pub fn report_candidate(&self, trial_idx: usize, cost: f64, feasible: bool) {
        let mut reports = self.lock();
        if trial_idx >= reports.len() { reports.resize(trial_idx + 1, None); }
        reports[trial_idx] = Some(TrialReport { trial_idx, cost, feasible });
    }
    pub fn get_best_trajectory_index(&self) -> Option<usize> {
        self.best_report().map(|r| r.trial_idx)
    }
    pub fn best_report(&self) -> Option<TrialReport> {
        let reports = self.lock();
        reports.iter().flatten().min_by_key(|r| r.ranking_key()).copied()
    }
    /// Lowest cost reported by a feasible trial so far.
    pub fn best_feasible_cost(&self) -> Option<f64> {
        let reports = self.lock();
        reports.iter().flatten().filter(|r| r.feasible).map(|r| OrderedFloat(r.cost)).min().map(|c| c.0)
    }
    pub fn report(&self, trial_idx: usize) -> Option<TrialReport> {
        let reports = self.lock();
        reports.get(trial_idx).copied().flatten()
    }
    pub fn num_reported(&self) -> usize {
        self.lock().iter().flatten().count()
    }
    /// Whether a trial sits in the worst `ratio` fraction of the reported trials.  The
    /// current best is never in that fraction.
    pub fn is_in_worst_fraction(&self, trial_idx: usize, ratio: f64) -> bool {
        let reports = self.lock();
        let mut ranked: Vec<&TrialReport> = reports.iter().flatten().collect();
        if ranked.len() < 2 { return false; }
        ranked.sort_by_key(|r| r.ranking_key());

        let position = match ranked.iter().position(|r| r.trial_idx == trial_idx) {
            None => { return false; }
            Some(p) => { p }
        };
        let num_kept = ((ranked.len() as f64 * (1.0 - ratio)).ceil() as usize).max(1);
        position >= num_kept
    }
    fn lock(&self) -> MutexGuard<Vec<Option<TrialReport>>> {
        // A trial that panicked leaves its last complete report behind.
        match self.reports.lock() {
            Ok(guard) => { guard }
            Err(poisoned) => { poisoned.into_inner() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feasible_beats_cheaper_infeasible() {
        let registry = BestCostRegistry::new(2);
        registry.report_candidate(0, 0.5, false);
        registry.report_candidate(1, 9.0, true);
        assert_eq!(registry.get_best_trajectory_index(), Some(1));
        assert_eq!(registry.best_feasible_cost(), Some(9.0));
    }

    #[test]
    fn falls_back_to_global_minimum_and_breaks_ties_low() {
        let registry = BestCostRegistry::new(3);
        registry.report_candidate(2, 1.0, false);
        registry.report_candidate(1, 1.0, false);
        registry.report_candidate(0, 3.0, false);
        assert_eq!(registry.get_best_trajectory_index(), Some(1));
        assert_eq!(registry.best_feasible_cost(), None);
    }

    #[test]
    fn later_reports_replace_earlier_ones() {
        let registry = BestCostRegistry::new(2);
        registry.report_candidate(0, 1.0, true);
        registry.report_candidate(1, 2.0, true);
        registry.report_candidate(0, 3.0, true);
        assert_eq!(registry.get_best_trajectory_index(), Some(1));
    }

    #[test]
    fn reset_clears_reports() {
        let registry = BestCostRegistry::new(2);
        registry.report_candidate(0, 1.0, true);
        registry.reset(4);
        assert_eq!(registry.get_best_trajectory_index(), None);
        assert_eq!(registry.num_reported(), 0);
    }

    #[test]
    fn worst_fraction_never_contains_best() {
        let registry = BestCostRegistry::new(4);
        for (i, c) in [4.0, 1.0, 3.0, 2.0].iter().enumerate() { registry.report_candidate(i, *c, true); }
        assert!(!registry.is_in_worst_fraction(1, 0.5));
        assert!(!registry.is_in_worst_fraction(3, 0.5));
        assert!(registry.is_in_worst_fraction(2, 0.5));
        assert!(registry.is_in_worst_fraction(0, 0.5));
        assert!(!registry.is_in_worst_fraction(1, 1.0));
    }
}
