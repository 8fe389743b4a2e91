use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Descriptive statistics over a set of samples (seconds or ratios)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// sample standard deviation, `0` for fewer than two samples
    pub std_dev: f64,
}

impl TimingStats {
    /// computes the statistics of `samples`, `None` when there are no samples
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let std_dev = if samples.len() > 1 {
            samples.iter().std_dev()
        } else {
            0.0
        };
        Some(Self {
            mean: samples.iter().mean(),
            min: Statistics::min(samples.iter()),
            max: Statistics::max(samples.iter()),
            std_dev,
        })
    }
}
