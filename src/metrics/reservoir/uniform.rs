//! Fixed-size uniform sample (Vitter's Algorithm R).

use super::Reservoir;
use crate::core::{MetricsError, Result};
use crate::metrics::snapshot::{Snapshot, UniformSnapshot};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Every offered value has the same chance of being retained
pub struct UniformReservoir {
    values: Box<[AtomicI64]>,
    count: AtomicU64,
}

impl UniformReservoir {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(MetricsError::invalid_parameter("size", "must be greater than 0"));
        }
        Ok(Self {
            values: (0..size).map(|_| AtomicI64::new(0)).collect(),
            count: AtomicU64::new(0),
        })
    }
}

impl Reservoir for UniformReservoir {
    fn size(&self) -> usize {
        (self.count.load(Ordering::Relaxed) as usize).min(self.values.len())
    }

    #[inline]
    fn update(&self, value: i64) {
        let seen = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        let capacity = self.values.len() as u64;
        if seen <= capacity {
            self.values[(seen - 1) as usize].store(value, Ordering::Relaxed);
        } else {
            let r = fastrand::u64(0..seen);
            if r < capacity {
                self.values[r as usize].store(value, Ordering::Relaxed);
            }
        }
    }

    fn snapshot(&self) -> Box<dyn Snapshot> {
        let size = self.size();
        let copy = self.values[..size]
            .iter()
            .map(|v| v.load(Ordering::Relaxed))
            .collect();
        Box::new(UniformSnapshot::new(copy))
    }
}
