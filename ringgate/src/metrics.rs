//! Lightweight, always-on counters for the claim/publish/consume path.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters tracking sequencer and processor activity.
///
/// Cheap enough to stay compiled in unconditionally; callers who don't care
/// simply never call [`Metrics::snapshot`].
#[derive(Default)]
pub struct Metrics {
    claimed: AtomicU64,
    published: AtomicU64,
    batches_processed: AtomicU64,
    wait_parks: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_claimed(&self, n: u64) {
        self.claimed.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_published(&self, n: u64) {
        self.published.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_batch_processed(&self) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_wait_park(&self) {
        self.wait_parks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            claimed: self.claimed.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            batches_processed: self.batches_processed.load(Ordering::Relaxed),
            wait_parks: self.wait_parks.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`Metrics`], safe to print or compare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub claimed: u64,
    pub published: u64,
    pub batches_processed: u64,
    pub wait_parks: u64,
}
