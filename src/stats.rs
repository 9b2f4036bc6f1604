//! Reduction of per-operation timings into summary figures.

use std::{fmt, time::Duration};

use conv::ValueFrom;

/// Mean and population standard deviation of a sample set.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Summary {
    pub mean: f64,
    pub std_dev: f64,
}

impl Summary {
    /// Summarizes `samples`. An empty set yields zeros.
    #[must_use]
    pub fn of(samples: &[f64]) -> Summary {
        if samples.is_empty() {
            return Summary::default();
        }
        let k = f64::value_from(samples.len()).unwrap_or(f64::MAX);
        let mean = samples.iter().sum::<f64>() / k;
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / k;
        Summary {
            mean,
            std_dev: variance.sqrt(),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mean: {} Standard Deviation: {}", self.mean, self.std_dev)
    }
}

/// Operations per second over a phase, with the mean result size.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Throughput {
    pub ops_per_sec: f64,
    pub avg_result_size: f64,
}

impl Throughput {
    #[must_use]
    pub fn new(operations: usize, elapsed: Duration, total_results: usize) -> Throughput {
        let ops = f64::value_from(operations).unwrap_or(f64::MAX);
        let secs = elapsed.as_secs_f64();
        let results = f64::value_from(total_results).unwrap_or(f64::MAX);
        Throughput {
            ops_per_sec: if secs > 0.0 { ops / secs } else { 0.0 },
            avg_result_size: if operations > 0 { results / ops } else { 0.0 },
        }
    }
}

/// Elapsed time in microseconds.
#[must_use]
pub fn micros(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1e6
}

/// Elapsed time in milliseconds.
#[must_use]
pub fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1e3
}
