//! Ring buffer holding the most recent `size` values.

use super::Reservoir;
use crate::core::{MetricsError, Result};
use crate::metrics::snapshot::{Snapshot, UniformSnapshot};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Keeps the last `size` offered values
pub struct SlidingWindowReservoir {
    measurements: Box<[AtomicI64]>,
    count: AtomicU64,
}

impl SlidingWindowReservoir {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(MetricsError::invalid_parameter("size", "must be greater than 0"));
        }
        Ok(Self {
            measurements: (0..size).map(|_| AtomicI64::new(0)).collect(),
            count: AtomicU64::new(0),
        })
    }
}

impl Reservoir for SlidingWindowReservoir {
    fn size(&self) -> usize {
        (self.count.load(Ordering::Relaxed) as usize).min(self.measurements.len())
    }

    #[inline]
    fn update(&self, value: i64) {
        let n = self.count.fetch_add(1, Ordering::Relaxed);
        let index = (n % self.measurements.len() as u64) as usize;
        self.measurements[index].store(value, Ordering::Relaxed);
    }

    fn snapshot(&self) -> Box<dyn Snapshot> {
        let size = self.size();
        let copy = self.measurements[..size]
            .iter()
            .map(|v| v.load(Ordering::Relaxed))
            .collect();
        Box::new(UniformSnapshot::new(copy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_window() {
        let reservoir = SlidingWindowReservoir::new(4).unwrap();
        reservoir.update(7);
        reservoir.update(3);
        assert_eq!(reservoir.snapshot().values(), vec![3, 7]);
    }

    #[test]
    fn test_keeps_only_latest() {
        let reservoir = SlidingWindowReservoir::new(3).unwrap();
        for v in 1..=10 {
            reservoir.update(v);
        }
        assert_eq!(reservoir.size(), 3);
        assert_eq!(reservoir.snapshot().values(), vec![8, 9, 10]);
    }
}
