//! Every value observed within the last `window`.
//!
//! Writes land in a lock-free staging queue. Every `TRIM_THRESHOLD` writes the
//! writer tries (without blocking) to fold the queue into the ordered store and
//! drop expired measurements; snapshots always fold and trim first.

use super::Reservoir;
use crate::core::{Clock, MetricsError, Result};
use crate::metrics::snapshot::{Snapshot, UniformSnapshot};
use crossbeam::queue::SegQueue;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const TRIM_THRESHOLD: u64 = 256;

#[derive(Debug, Clone, Copy)]
struct Measurement {
    tick: u64,
    value: i64,
}

/// Retains all values from a trailing time window
pub struct SlidingTimeWindowReservoir {
    staged: SegQueue<Measurement>,
    measurements: Mutex<VecDeque<Measurement>>,
    window_nanos: u64,
    writes: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl SlidingTimeWindowReservoir {
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Result<Self> {
        if window.is_zero() {
            return Err(MetricsError::invalid_parameter("window", "must be greater than 0"));
        }
        Ok(Self {
            staged: SegQueue::new(),
            measurements: Mutex::new(VecDeque::new()),
            window_nanos: window.as_nanos().min(u64::MAX as u128) as u64,
            writes: AtomicU64::new(0),
            clock,
        })
    }

    fn fold_and_trim(&self, measurements: &mut VecDeque<Measurement>) {
        while let Some(m) = self.staged.pop() {
            measurements.push_back(m);
        }
        let cutoff = self.clock.tick().saturating_sub(self.window_nanos);
        while measurements.front().is_some_and(|m| m.tick < cutoff) {
            measurements.pop_front();
        }
    }
}

impl Reservoir for SlidingTimeWindowReservoir {
    fn size(&self) -> usize {
        let mut measurements = self.measurements.lock();
        self.fold_and_trim(&mut measurements);
        measurements.len()
    }

    fn update(&self, value: i64) {
        self.staged.push(Measurement {
            tick: self.clock.tick(),
            value,
        });

        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % TRIM_THRESHOLD == 0 {
            if let Some(mut measurements) = self.measurements.try_lock() {
                self.fold_and_trim(&mut measurements);
            }
        }
    }

    fn snapshot(&self) -> Box<dyn Snapshot> {
        let copy: Vec<i64> = {
            let mut measurements = self.measurements.lock();
            self.fold_and_trim(&mut measurements);
            // Writers on other threads may have staged slightly out of order
            let cutoff = self.clock.tick().saturating_sub(self.window_nanos);
            measurements
                .iter()
                .filter(|m| m.tick >= cutoff)
                .map(|m| m.value)
                .collect()
        };
        Box::new(UniformSnapshot::new(copy))
    }
}
