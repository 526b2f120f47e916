//! Immutable, percentile-queryable views of a reservoir.
//!
//! A snapshot is a point-in-time copy; it never changes after the reservoir
//! hands it out. Quantiles are clamped to `[0, 1]` (NaN reads as 0) and an
//! empty snapshot reports 0 for every statistic.

use std::fmt::Debug;

/// Statistical view over sampled values
pub trait Snapshot: Send + Sync + Debug {
    /// Value at the given quantile in `[0, 1]`
    fn value(&self, quantile: f64) -> f64;

    /// Sampled values in ascending order
    fn values(&self) -> Vec<i64>;

    /// Number of values the snapshot describes
    fn size(&self) -> usize;

    fn max(&self) -> i64;

    fn min(&self) -> i64;

    fn mean(&self) -> f64;

    fn std_dev(&self) -> f64;

    fn median(&self) -> f64 {
        self.value(0.5)
    }

    fn p75(&self) -> f64 {
        self.value(0.75)
    }

    fn p95(&self) -> f64 {
        self.value(0.95)
    }

    fn p98(&self) -> f64 {
        self.value(0.98)
    }

    fn p99(&self) -> f64 {
        self.value(0.99)
    }

    fn p999(&self) -> f64 {
        self.value(0.999)
    }
}

#[inline]
fn clamp_quantile(quantile: f64) -> f64 {
    if quantile.is_nan() {
        0.0
    } else {
        quantile.clamp(0.0, 1.0)
    }
}

/// Snapshot over equally weighted samples
#[derive(Debug, Clone, Default)]
pub struct UniformSnapshot {
    values: Vec<i64>,
}

impl UniformSnapshot {
    /// Sorts the given samples
    pub fn new(mut values: Vec<i64>) -> Self {
        values.sort_unstable();
        Self { values }
    }
}

impl Snapshot for UniformSnapshot {
    fn value(&self, quantile: f64) -> f64 {
        let n = self.values.len();
        if n == 0 {
            return 0.0;
        }

        let pos = clamp_quantile(quantile) * (n - 1) as f64;
        let lower = pos.floor() as usize;
        let upper = pos.ceil() as usize;
        let low = self.values[lower] as f64;
        if lower == upper {
            return low;
        }
        let high = self.values[upper] as f64;
        low + (high - low) * (pos - lower as f64)
    }

    fn values(&self) -> Vec<i64> {
        self.values.clone()
    }

    fn size(&self) -> usize {
        self.values.len()
    }

    fn max(&self) -> i64 {
        self.values.last().copied().unwrap_or(0)
    }

    fn min(&self) -> i64 {
        self.values.first().copied().unwrap_or(0)
    }

    fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().map(|&v| v as f64).sum::<f64>() / self.values.len() as f64
    }

    fn std_dev(&self) -> f64 {
        let n = self.values.len();
        if n <= 1 {
            return 0.0;
        }
        let mean = self.mean();
        let sum = self
            .values
            .iter()
            .map(|&v| {
                let diff = v as f64 - mean;
                diff * diff
            })
            .sum::<f64>();
        (sum / (n - 1) as f64).sqrt()
    }
}

/// A sample retained by a decaying reservoir
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedSample {
    pub value: i64,
    pub weight: f64,
}

/// Snapshot over samples with decay weights
#[derive(Debug, Clone, Default)]
pub struct WeightedSnapshot {
    values: Vec<i64>,
    norm_weights: Vec<f64>,
    /// Cumulative normalized weight preceding each value
    quantiles: Vec<f64>,
}

impl WeightedSnapshot {
    pub fn new(mut samples: Vec<WeightedSample>) -> Self {
        samples.sort_unstable_by_key(|s| s.value);

        let total: f64 = samples.iter().map(|s| s.weight).sum();
        let mut values = Vec::with_capacity(samples.len());
        let mut norm_weights = Vec::with_capacity(samples.len());
        let mut quantiles = Vec::with_capacity(samples.len());

        let mut cumulative = 0.0;
        for sample in &samples {
            let weight = if total > 0.0 { sample.weight / total } else { 0.0 };
            values.push(sample.value);
            norm_weights.push(weight);
            quantiles.push(cumulative);
            cumulative += weight;
        }

        Self {
            values,
            norm_weights,
            quantiles,
        }
    }
}

impl Snapshot for WeightedSnapshot {
    fn value(&self, quantile: f64) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let quantile = clamp_quantile(quantile);

        // Last position whose cumulative weight does not exceed the quantile
        let pos = self.quantiles.partition_point(|&q| q <= quantile);
        let index = pos.saturating_sub(1).min(self.values.len() - 1);
        self.values[index] as f64
    }

    fn values(&self) -> Vec<i64> {
        self.values.clone()
    }

    fn size(&self) -> usize {
        self.values.len()
    }

    fn max(&self) -> i64 {
        self.values.last().copied().unwrap_or(0)
    }

    fn min(&self) -> i64 {
        self.values.first().copied().unwrap_or(0)
    }

    fn mean(&self) -> f64 {
        self.values
            .iter()
            .zip(&self.norm_weights)
            .map(|(&v, &w)| v as f64 * w)
            .sum()
    }

    fn std_dev(&self) -> f64 {
        if self.values.len() <= 1 {
            return 0.0;
        }
        let mean = self.mean();
        let variance: f64 = self
            .values
            .iter()
            .zip(&self.norm_weights)
            .map(|(&v, &w)| {
                let diff = v as f64 - mean;
                w * diff * diff
            })
            .sum();
        variance.sqrt()
    }
}

/// Snapshot over bucketed counts.
///
/// Each value is represented by the upper boundary of its bucket, so
/// percentiles are accurate to bucket resolution. The overflow bucket reports
/// the largest finite boundary.
#[derive(Debug, Clone, Default)]
pub struct BucketSnapshot {
    /// Upper boundaries, ascending, overflow bucket already capped
    boundaries: Vec<i64>,
    counts: Vec<u64>,
    count: u64,
    sum: u64,
}

impl BucketSnapshot {
    pub fn new(boundaries: Vec<i64>, counts: Vec<u64>, sum: u64) -> Self {
        debug_assert_eq!(boundaries.len(), counts.len());
        let finite_max = boundaries
            .iter()
            .copied()
            .filter(|&b| b != i64::MAX)
            .max()
            .unwrap_or(0);
        let boundaries = boundaries
            .into_iter()
            .map(|b| if b == i64::MAX { finite_max } else { b })
            .collect();
        let count = counts.iter().sum();
        Self {
            boundaries,
            counts,
            count,
            sum,
        }
    }

    /// Count per (capped) upper boundary
    pub fn bucket_counts(&self) -> impl Iterator<Item = (i64, u64)> + '_ {
        self.boundaries.iter().copied().zip(self.counts.iter().copied())
    }

    fn nonempty(&self) -> impl Iterator<Item = (usize, i64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .map(move |(i, _)| (i, self.boundaries[i]))
    }
}

impl Snapshot for BucketSnapshot {
    fn value(&self, quantile: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let rank = (clamp_quantile(quantile) * (self.count - 1) as f64).floor() as u64;

        let mut cumulative = 0u64;
        for (boundary, count) in self.bucket_counts() {
            cumulative += count;
            if cumulative > rank {
                return boundary as f64;
            }
        }
        self.max() as f64
    }

    fn values(&self) -> Vec<i64> {
        self.nonempty().map(|(_, b)| b).collect()
    }

    fn size(&self) -> usize {
        self.count as usize
    }

    fn max(&self) -> i64 {
        self.nonempty().last().map(|(_, b)| b).unwrap_or(0)
    }

    fn min(&self) -> i64 {
        match self.nonempty().next() {
            Some((0, _)) | None => 0,
            Some((i, _)) => self.boundaries[i - 1],
        }
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum as f64 / self.count as f64
    }

    fn std_dev(&self) -> f64 {
        if self.count <= 1 {
            return 0.0;
        }
        let mean = self.mean();
        let variance: f64 = self
            .bucket_counts()
            .map(|(b, c)| {
                let diff = b as f64 - mean;
                c as f64 * diff * diff
            })
            .sum::<f64>()
            / (self.count - 1) as f64;
        variance.sqrt()
    }
}
