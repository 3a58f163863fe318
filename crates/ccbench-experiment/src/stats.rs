use serde::Serialize;

/// Mean and population standard deviation of a sample set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Summary {
    pub mean: f64,
    pub std_dev: f64,
}

impl Summary {
    /// An empty slice yields zero for both values: no successful runs is not an error.
    pub fn of(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        // Second pass over the deviations keeps large offsets from cancelling out.
        let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std_dev: variance.sqrt(),
        }
    }
}

/// Throughput (Mbps) and flow-completion time (seconds) of one experiment slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AggregatedStats {
    pub throughput: Summary,
    pub fct: Summary,
}
