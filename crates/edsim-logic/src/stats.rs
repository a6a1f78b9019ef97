//! Summary statistics over sample lists.

use serde::{Deserialize, Serialize};

/// Mean, median, population standard deviation, extremes and count.
///
/// An empty sample yields all zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WaitStats {
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl WaitStats {
    pub fn of(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Self {
            mean,
            median,
            std: variance.sqrt(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            count: samples.len(),
        }
    }
}

/// Linear-interpolated percentile, `p` in [0, 100]. Empty samples yield 0.
pub fn percentile(samples: &[f64], p: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = p.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

/// Time-weighted mean of a step series of (time, value) samples over
/// [first sample, end]. Falls back to the plain mean when no time elapses.
pub fn time_weighted_mean(series: &[(f64, f64)], end: f64) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let start = series[0].0;
    let span = end - start;
    if span <= 0.0 {
        return series.iter().map(|&(_, v)| v).sum::<f64>() / series.len() as f64;
    }
    let mut area = 0.0;
    for (i, &(t, v)) in series.iter().enumerate() {
        let next = series.get(i + 1).map_or(end, |&(t2, _)| t2.min(end));
        if next > t {
            area += v * (next - t);
        }
    }
    area / span
}
