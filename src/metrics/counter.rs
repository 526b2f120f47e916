//! Plain up/down counter.

use std::sync::atomic::{AtomicI64, Ordering};

/// Incrementing and decrementing counter
pub trait Counter: Send + Sync {
    fn inc(&self) {
        self.inc_by(1);
    }

    fn inc_by(&self, n: i64);

    fn dec(&self) {
        self.dec_by(1);
    }

    fn dec_by(&self, n: i64) {
        self.inc_by(n.wrapping_neg());
    }

    fn count(&self) -> i64;
}

/// [`Counter`] backed by a single atomic
#[derive(Debug, Default)]
pub struct AtomicCounter {
    count: AtomicI64,
}

impl AtomicCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Counter for AtomicCounter {
    #[inline(always)]
    fn inc_by(&self, n: i64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inc_dec() {
        let counter = AtomicCounter::new();
        counter.inc();
        counter.inc_by(10);
        counter.dec();
        counter.dec_by(3);
        assert_eq!(counter.count(), 7);
    }

    #[test]
    fn test_can_go_negative() {
        let counter = AtomicCounter::new();
        counter.dec_by(5);
        assert_eq!(counter.count(), -5);
    }
}
