//! Single-producer sequence claiming and publication.

use crate::barrier::SequenceBarrier;
use crate::diagnostics;
use crate::error::{Result, RingGateError};
use crate::invariants::debug_assert_bounded_claim;
use crate::metrics::Metrics;
use crate::padding::CacheAligned;
use crate::sequence::{self, Sequence};
use crate::wait_strategy::WaitStrategy;
use parking_lot::RwLock;
use std::cell::UnsafeCell;
use std::sync::Arc;
use std::time::Duration;

/// Owns the producer cursor and the buffer-size/gating-set bookkeeping that
/// decides when the producer may claim the next slot.
///
/// `next_value` and `cached_gating` are private to the single producer
/// thread: the contract for every claiming method (`next`, `try_next`,
/// `claim`) is that at most one thread calls them at a time, so these two
/// fields need no atomics, only the cache-line padding that keeps them off
/// the cursor's line.
pub struct Sequencer {
    buffer_size: i64,
    wait_strategy: Arc<dyn WaitStrategy>,
    cursor: Arc<Sequence>,
    next_value: CacheAligned<UnsafeCell<i64>>,
    cached_gating: CacheAligned<UnsafeCell<i64>>,
    gating_sequences: RwLock<Vec<Arc<Sequence>>>,
    metrics: Metrics,
}

// SAFETY: `next_value` and `cached_gating` are only ever touched by the
// single producer thread, which is a contract of `next`/`try_next`/`claim`,
// not something the type system enforces here.
unsafe impl Sync for Sequencer {}

impl Sequencer {
    /// Creates a sequencer for a ring of `buffer_size` slots.
    ///
    /// Fails with [`RingGateError::IllegalArgument`] if `buffer_size` is not
    /// a positive power of two.
    pub fn new(buffer_size: usize, wait_strategy: Arc<dyn WaitStrategy>) -> Result<Self> {
        if buffer_size == 0 || !buffer_size.is_power_of_two() {
            return Err(RingGateError::IllegalArgument {
                message: "buffer_size must be a positive power of two",
            });
        }
        Ok(Self {
            buffer_size: buffer_size as i64,
            wait_strategy,
            cursor: Arc::new(Sequence::default()),
            next_value: CacheAligned::new(UnsafeCell::new(sequence::INITIAL_VALUE)),
            cached_gating: CacheAligned::new(UnsafeCell::new(sequence::INITIAL_VALUE)),
            gating_sequences: RwLock::new(Vec::new()),
            metrics: Metrics::new(),
        })
    }

    pub fn cursor(&self) -> Arc<Sequence> {
        Arc::clone(&self.cursor)
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Claims the next sequence number. Equivalent to `next_n(1)`.
    pub fn next(&self) -> i64 {
        self.claim_n(1)
    }

    /// Claims `n` contiguous sequence numbers, parking briefly while the
    /// slowest gating consumer catches up if the claim would overwrite
    /// unconsumed slots.
    pub fn next_n(&self, n: i64) -> Result<i64> {
        if n < 1 {
            return Err(RingGateError::IllegalArgument {
                message: "n must be >= 1",
            });
        }
        Ok(self.claim_n(n))
    }

    /// Unchecked claim of `n` contiguous sequence numbers. Callers must have
    /// already validated `n >= 1`; `next`/`next_n` are the public entry
    /// points for that.
    fn claim_n(&self, n: i64) -> i64 {
        // SAFETY: single-producer contract (see struct docs).
        let next_value = unsafe { *self.next_value.get() };
        let target = next_value + n;
        let wrap_point = target - self.buffer_size;
        let cached_gating = unsafe { *self.cached_gating.get() };

        // The `cached_gating > next_value` arm is the open question noted
        // in the spec: it guards against a cache poisoned by `claim()`
        // rewinding `next_value` backwards. Kept defensively; nothing in
        // this implementation depends on it for correctness.
        if wrap_point > cached_gating || cached_gating > next_value {
            let mut min_gating = self.min_gating_sequence(next_value);
            while wrap_point > min_gating {
                self.metrics.add_wait_park();
                std::thread::sleep(Duration::from_nanos(1));
                min_gating = self.min_gating_sequence(next_value);
            }
            unsafe { *self.cached_gating.get() = min_gating };
        }
        debug_assert_bounded_claim!(wrap_point, unsafe { *self.cached_gating.get() });

        unsafe { *self.next_value.get() = target };
        self.metrics.add_claimed(n as u64);
        target
    }

    /// Non-blocking form of `next_n`. Fails with
    /// [`RingGateError::InsufficientCapacity`] rather than parking.
    pub fn try_next_n(&self, n: i64) -> Result<i64> {
        if n < 1 {
            return Err(RingGateError::IllegalArgument {
                message: "n must be >= 1",
            });
        }

        // SAFETY: single-producer contract (see struct docs).
        let next_value = unsafe { *self.next_value.get() };
        let target = next_value + n;
        let wrap_point = target - self.buffer_size;
        let min_gating = self.min_gating_sequence(next_value);
        unsafe { *self.cached_gating.get() = min_gating };

        if wrap_point > min_gating {
            return Err(RingGateError::InsufficientCapacity);
        }

        unsafe { *self.next_value.get() = target };
        self.metrics.add_claimed(n as u64);
        Ok(target)
    }

    pub fn try_next(&self) -> Result<i64> {
        self.try_next_n(1)
    }

    fn min_gating_sequence(&self, fallback: i64) -> i64 {
        let gating = self.gating_sequences.read();
        gating.iter().map(|s| s.get()).min().unwrap_or(fallback)
    }

    /// `bufferSize - (nextValue - min(gatingSequences))`.
    pub fn remaining_capacity(&self) -> i64 {
        // SAFETY: single-producer contract (see struct docs).
        let next_value = unsafe { *self.next_value.get() };
        let consumed = self.min_gating_sequence(next_value);
        self.buffer_size - (next_value - consumed)
    }

    /// Same predicate as `next_n`'s wrap check, without advancing.
    pub fn has_available_capacity(&self, n: i64) -> bool {
        // SAFETY: single-producer contract (see struct docs).
        let next_value = unsafe { *self.next_value.get() };
        let wrap_point = next_value + n - self.buffer_size;
        let cached_gating = unsafe { *self.cached_gating.get() };

        if wrap_point > cached_gating || cached_gating > next_value {
            let min_gating = self.min_gating_sequence(next_value);
            unsafe { *self.cached_gating.get() = min_gating };
            wrap_point <= min_gating
        } else {
            true
        }
    }

    /// Release-stores `sequence` into the cursor and wakes waiters.
    pub fn publish(&self, sequence: i64) {
        self.cursor.set(sequence);
        self.metrics.add_published(1);
        self.wait_strategy.signal_all_when_blocking();
    }

    /// Degenerates to `publish(high)`: the single-producer invariant means
    /// everything up to `high` was already written contiguously.
    pub fn publish_range(&self, _low: i64, high: i64) {
        self.publish(high);
    }

    pub fn is_available(&self, sequence: i64) -> bool {
        sequence <= self.cursor.get()
    }

    /// For the single-producer sequencer this is always `high`: publication
    /// is contiguous by construction, so there is no gap to scan for.
    pub fn get_highest_published_sequence(&self, _low: i64, high: i64) -> i64 {
        high
    }

    /// Sets `next_value` directly. For initialization only — MUST NOT be
    /// called concurrently with `next`/`try_next`.
    pub fn claim(&self, sequence: i64) {
        unsafe { *self.next_value.get() = sequence };
    }

    pub fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) {
        let mut gating = self.gating_sequences.write();
        gating.extend(sequences.iter().cloned());
        diagnostics::record_gating_sequences_changed(gating.len());
    }

    /// Removes the first gating sequence pointer-equal to `sequence`.
    /// Returns whether one was found.
    pub fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool {
        let mut gating = self.gating_sequences.write();
        let before = gating.len();
        gating.retain(|s| !Arc::ptr_eq(s, sequence));
        diagnostics::record_gating_sequences_changed(gating.len());
        gating.len() != before
    }

    /// Builds a barrier gated on this sequencer's cursor and `dependents`.
    pub fn new_barrier(self: &Arc<Self>, dependents: Vec<Arc<Sequence>>) -> SequenceBarrier {
        SequenceBarrier::new(
            Arc::clone(self),
            Arc::clone(&self.wait_strategy),
            self.cursor(),
            dependents,
        )
    }
}
