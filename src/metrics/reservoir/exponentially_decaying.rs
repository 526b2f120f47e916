//! Forward-decaying priority sample biased towards recent values.
//!
//! Each value gets weight `exp(alpha * (t - landmark))` and priority
//! `weight / u` for a uniform `u`; the `size` highest priorities are kept.
//! Weights grow with time, so once an hour the landmark moves forward and all
//! retained weights and priorities are rescaled.
//!
//! Offered values are staged in a lock-free queue and priced when folded into
//! the ordered store, so a rescale never mixes landmarks.

use super::Reservoir;
use crate::core::{Clock, MetricsError, Result};
use crate::metrics::snapshot::{Snapshot, WeightedSample, WeightedSnapshot};
use crossbeam::queue::SegQueue;
use parking_lot::Mutex;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::sync::Arc;

const RESCALE_THRESHOLD_SECS: u64 = 60 * 60;
const NANOS_PER_SEC: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy)]
struct Priority(f64);

impl PartialEq for Priority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    value: i64,
    secs: u64,
}

struct State {
    samples: BTreeMap<Priority, WeightedSample>,
    landmark_secs: u64,
    next_rescale_secs: u64,
}

/// Sample of `size` values, weighted towards the last few minutes
pub struct ExponentiallyDecayingReservoir {
    pending: SegQueue<Pending>,
    state: Mutex<State>,
    size: usize,
    alpha: f64,
    clock: Arc<dyn Clock>,
}

impl ExponentiallyDecayingReservoir {
    /// `alpha` of 0.015 with 1028 samples roughly represents the last five
    /// minutes of data
    pub fn new(size: usize, alpha: f64, clock: Arc<dyn Clock>) -> Result<Self> {
        if size == 0 {
            return Err(MetricsError::invalid_parameter("size", "must be greater than 0"));
        }
        if !(alpha > 0.0 && alpha.is_finite()) {
            return Err(MetricsError::invalid_parameter(
                "alpha",
                format!("must be a positive number, got {}", alpha),
            ));
        }

        let now = clock.tick() / NANOS_PER_SEC;
        Ok(Self {
            pending: SegQueue::new(),
            state: Mutex::new(State {
                samples: BTreeMap::new(),
                landmark_secs: now,
                next_rescale_secs: now + RESCALE_THRESHOLD_SECS,
            }),
            size,
            alpha,
            clock,
        })
    }

    fn now_secs(&self) -> u64 {
        self.clock.tick() / NANOS_PER_SEC
    }

    fn fold(&self, state: &mut State) {
        let now = self.now_secs();
        if now >= state.next_rescale_secs {
            self.rescale(state, now);
        }

        while let Some(pending) = self.pending.pop() {
            let age = pending.secs.saturating_sub(state.landmark_secs) as f64;
            let weight = (self.alpha * age).exp();
            // (0, 1] so the priority stays finite
            let u = 1.0 - fastrand::f64();
            let priority = Priority(weight / u);

            if state.samples.len() < self.size {
                state.samples.entry(priority).or_insert(WeightedSample {
                    value: pending.value,
                    weight,
                });
            } else if state
                .samples
                .first_key_value()
                .is_some_and(|(lowest, _)| *lowest < priority)
                && !state.samples.contains_key(&priority)
            {
                state.samples.insert(
                    priority,
                    WeightedSample {
                        value: pending.value,
                        weight,
                    },
                );
                state.samples.pop_first();
            }
        }
    }

    fn rescale(&self, state: &mut State, now: u64) {
        let old_landmark = state.landmark_secs;
        state.landmark_secs = now;
        state.next_rescale_secs = now + RESCALE_THRESHOLD_SECS;

        let factor = (-self.alpha * now.saturating_sub(old_landmark) as f64).exp();
        if factor == 0.0 {
            state.samples.clear();
            return;
        }

        state.samples = std::mem::take(&mut state.samples)
            .into_iter()
            .map(|(priority, sample)| {
                (
                    Priority(priority.0 * factor),
                    WeightedSample {
                        value: sample.value,
                        weight: sample.weight * factor,
                    },
                )
            })
            .collect();
    }
}

impl Reservoir for ExponentiallyDecayingReservoir {
    fn size(&self) -> usize {
        let mut state = self.state.lock();
        self.fold(&mut state);
        state.samples.len()
    }

    fn update(&self, value: i64) {
        self.pending.push(Pending {
            value,
            secs: self.now_secs(),
        });
        if let Some(mut state) = self.state.try_lock() {
            self.fold(&mut state);
        }
    }

    fn snapshot(&self) -> Box<dyn Snapshot> {
        let samples: Vec<WeightedSample> = {
            let mut state = self.state.lock();
            self.fold(&mut state);
            state.samples.values().copied().collect()
        };
        Box::new(WeightedSnapshot::new(samples))
    }
}
