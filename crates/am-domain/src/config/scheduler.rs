use serde::{Deserialize, Serialize};

/// Bounds the Schedule Manager's `results`/`errors` channel capacities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "d_results_capacity")]
    pub results_capacity: usize,
    #[serde(default = "d_errors_capacity")]
    pub errors_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            results_capacity: d_results_capacity(),
            errors_capacity: d_errors_capacity(),
        }
    }
}

fn d_results_capacity() -> usize {
    1024
}

fn d_errors_capacity() -> usize {
    128
}
