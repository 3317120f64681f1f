use serde::{Serialize, Deserialize};
use crate::utils::utils_console::{trajopt_print, PrintColor, PrintMode};

/// Statistics of one group optimization, taken from the winning trial.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningInfo {
    pub time: f64,
    pub iterations: usize,
    pub cost: f64,
    pub success: bool
}

/// Averages of one column of the planning info table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningInfoAverage {
    pub iterations: f64,
    pub time: f64,
    pub cost: f64,
    pub success_rate: f64
}

/// Planning statistics indexed `[planning trial][group component]`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlanningInfoTable {
    infos: Vec<Vec<PlanningInfo>>
}
impl PlanningInfoTable {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn reset(&mut self, num_trials: usize, num_components: usize) {
        self.infos = vec![vec![PlanningInfo::default(); num_components]; num_trials];
    }
    pub fn write(&mut self, trial: usize, component: usize, info: PlanningInfo) {
        if trial >= self.infos.len() {
            let num_components = self.num_components().max(component + 1);
            self.infos.resize(trial + 1, vec![PlanningInfo::default(); num_components]);
        }
        let row = &mut self.infos[trial];
        if component >= row.len() { row.resize(component + 1, PlanningInfo::default()); }
        row[component] = info;
    }
    pub fn get(&self, trial: usize, component: usize) -> Option<&PlanningInfo> {
        self.infos.get(trial).and_then(|row| row.get(component))
    }
    pub fn num_trials(&self) -> usize {
        self.infos.len()
    }
    pub fn num_components(&self) -> usize {
        self.infos.first().map(|row| row.len()).unwrap_or(0)
    }
    pub fn component_averages(&self) -> Vec<PlanningInfoAverage> {
        let num_trials = self.num_trials();
        if num_trials == 0 { return vec![]; }
        let denom = num_trials as f64;
        (0..self.num_components()).map(|c| {
            let mut out = PlanningInfoAverage::default();
            for row in &self.infos {
                let info = row[c];
                out.iterations += info.iterations as f64 / denom;
                out.time += info.time / denom;
                out.cost += info.cost / denom;
                if info.success { out.success_rate += 1.0 / denom; }
            }
            out
        }).collect()
    }
    /// Fraction of planning trials in which every component succeeded.
    pub fn overall_success_rate(&self) -> f64 {
        if self.infos.is_empty() { return 0.0; }
        let num_success = self.infos.iter().filter(|row| row.iter().all(|info| info.success)).count();
        num_success as f64 / self.infos.len() as f64
    }
    /// Iterations, time and cost of each planning trial summed over its components.
    pub fn trial_sums(&self) -> Vec<(f64, f64, f64)> {
        self.infos.iter().map(|row| {
            row.iter().fold((0.0, 0.0, 0.0), |acc, info| (acc.0 + info.iterations as f64, acc.1 + info.time, acc.2 + info.cost))
        }).collect()
    }
    pub fn print_summary(&self) {
        let averages = self.component_averages();
        trajopt_print(&format!("{} Trials, {} components", self.num_trials(), self.num_components()), PrintMode::Println, PrintColor::Blue, true);
        trajopt_print("Component Iterations Time Cost SuccessRate", PrintMode::Println, PrintColor::None, true);
        for (c, a) in averages.iter().enumerate() {
            trajopt_print(&format!("{} {:.6} {:.6} {:.6} {:.6}", c, a.iterations, a.time, a.cost, a.success_rate), PrintMode::Println, PrintColor::None, false);
        }
        let total = averages.iter().fold(PlanningInfoAverage::default(), |acc, a| PlanningInfoAverage {
            iterations: acc.iterations + a.iterations,
            time: acc.time + a.time,
            cost: acc.cost + a.cost,
            success_rate: 0.0
        });
        let color = if self.overall_success_rate() == 1.0 { PrintColor::Green } else { PrintColor::Yellow };
        trajopt_print(&format!("Sum {:.6} {:.6} {:.6} {:.6}", total.iterations, total.time, total.cost, self.overall_success_rate()), PrintMode::Println, color, false);

        trajopt_print("plannings info", PrintMode::Println, PrintColor::Blue, true);
        for (i, (iterations, time, cost)) in self.trial_sums().iter().enumerate() {
            trajopt_print(&format!("[{}] {:.6} {:.6} {:.6}", i, iterations, time, cost), PrintMode::Println, PrintColor::None, false);
        }
    }
}
