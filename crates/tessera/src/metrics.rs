//! In-process counters for operational alerting.
//!
//! Every counter is a relaxed atomic; `snapshot()` copies the current values
//! into a plain struct that a host application can export however it likes.

use portable_atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct UlidMetrics {
    generated: AtomicU64,
    rollback: AtomicU64,
    rollback_last_ms: AtomicU64,
    rollback_max_ms: AtomicU64,
    wait: AtomicU64,
    exhausted: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UlidMetricsSnapshot {
    pub generated: u64,
    pub rollback: u64,
    pub rollback_last_ms: u64,
    pub rollback_max_ms: u64,
    pub wait: u64,
    pub exhausted: u64,
}

impl UlidMetrics {
    #[inline]
    pub(crate) fn record_generated(&self) {
        self.generated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self, magnitude_ms: u64) {
        self.rollback.fetch_add(1, Ordering::Relaxed);
        self.rollback_last_ms.store(magnitude_ms, Ordering::Relaxed);
        self.rollback_max_ms.fetch_max(magnitude_ms, Ordering::Relaxed);
    }

    pub(crate) fn record_wait(&self) {
        self.wait.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UlidMetricsSnapshot {
        UlidMetricsSnapshot {
            generated: self.generated.load(Ordering::Relaxed),
            rollback: self.rollback.load(Ordering::Relaxed),
            rollback_last_ms: self.rollback_last_ms.load(Ordering::Relaxed),
            rollback_max_ms: self.rollback_max_ms.load(Ordering::Relaxed),
            wait: self.wait.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default)]
pub struct SegmentMetrics {
    refresh: AtomicU64,
    refresh_failed: AtomicU64,
    invalid_range: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SegmentMetricsSnapshot {
    pub refresh: u64,
    pub refresh_failed: u64,
    pub invalid_range: u64,
}

impl SegmentMetrics {
    pub(crate) fn record_refresh(&self) {
        self.refresh.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_refresh_failed(&self) {
        self.refresh_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalid_range(&self) {
        self.invalid_range.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SegmentMetricsSnapshot {
        SegmentMetricsSnapshot {
            refresh: self.refresh.load(Ordering::Relaxed),
            refresh_failed: self.refresh_failed.load(Ordering::Relaxed),
            invalid_range: self.invalid_range.load(Ordering::Relaxed),
        }
    }
}

/// Per-outcome resolver counters, named after the tier that answered.
#[derive(Debug, Default)]
pub struct ResolveMetrics {
    hit_l1: AtomicU64,
    hit_l2: AtomicU64,
    hit_db: AtomicU64,
    miss: AtomicU64,
    invalid: AtomicU64,
    l2_error: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolveMetricsSnapshot {
    pub hit_l1: u64,
    pub hit_l2: u64,
    pub hit_db: u64,
    pub miss: u64,
    pub invalid: u64,
    pub l2_error: u64,
}

impl ResolveMetrics {
    pub(crate) fn record_hit_l1(&self) {
        self.hit_l1.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hit_l2(&self) {
        self.hit_l2.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hit_db(&self) {
        self.hit_db.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.miss.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalid(&self) {
        self.invalid.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_l2_error(&self) {
        self.l2_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ResolveMetricsSnapshot {
        ResolveMetricsSnapshot {
            hit_l1: self.hit_l1.load(Ordering::Relaxed),
            hit_l2: self.hit_l2.load(Ordering::Relaxed),
            hit_db: self.hit_db.load(Ordering::Relaxed),
            miss: self.miss.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            l2_error: self.l2_error.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_tracks_last_and_max() {
        let metrics = UlidMetrics::default();
        metrics.record_rollback(5);
        metrics.record_rollback(40);
        metrics.record_rollback(3);
        let snap = metrics.snapshot();
        assert_eq!(snap.rollback, 3);
        assert_eq!(snap.rollback_last_ms, 3);
        assert_eq!(snap.rollback_max_ms, 40);
    }
}
