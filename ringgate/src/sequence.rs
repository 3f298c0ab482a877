//! The padded monotonic counter shared between producer and consumers.

use crate::invariants::debug_assert_monotonic;
use crate::padding::CacheAligned;
use std::sync::atomic::{AtomicI64, Ordering};

/// Value a `Sequence` holds before anything has been published or consumed.
pub const INITIAL_VALUE: i64 = -1;

/// A cache-line isolated, atomically updated counter identifying a logical
/// position in the stream.
///
/// The producer cursor, each consumer's own progress marker, and the
/// gating-sequence set are all instances of this type. Reads that gate slot
/// access use acquire semantics so they pair with the release store that
/// published the value.
pub struct Sequence {
    value: CacheAligned<AtomicI64>,
}

impl Sequence {
    pub fn new(initial: i64) -> Self {
        Self {
            value: CacheAligned::new(AtomicI64::new(initial)),
        }
    }

    /// Acquire load. Use whenever the result gates access to ring slots.
    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Relaxed load, for single-writer-private reads of this sequence.
    #[inline]
    pub fn get_relaxed(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Release store.
    #[inline]
    pub fn set(&self, value: i64) {
        debug_assert_monotonic!("sequence", self.get_relaxed(), value);
        self.value.store(value, Ordering::Release);
    }

    /// Sequentially consistent store, for the rare case a caller needs a
    /// total order across sequences rather than just a release/acquire pair.
    #[inline]
    pub fn set_volatile(&self, value: i64) {
        self.value.store(value, Ordering::SeqCst);
    }

    #[inline]
    pub fn compare_and_set(&self, current: i64, next: i64) -> bool {
        self.value
            .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub fn increment_and_get(&self) -> i64 {
        self.value.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(INITIAL_VALUE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_minus_one() {
        assert_eq!(Sequence::default().get(), INITIAL_VALUE);
    }

    #[test]
    fn compare_and_set_only_succeeds_on_match() {
        let seq = Sequence::new(5);
        assert!(!seq.compare_and_set(4, 6));
        assert_eq!(seq.get(), 5);
        assert!(seq.compare_and_set(5, 6));
        assert_eq!(seq.get(), 6);
    }

    #[test]
    fn increment_and_get_returns_new_value() {
        let seq = Sequence::new(0);
        assert_eq!(seq.increment_and_get(), 1);
        assert_eq!(seq.increment_and_get(), 2);
    }

    #[test]
    fn padded_to_a_full_cache_line() {
        assert!(std::mem::size_of::<Sequence>() >= 128);
    }
}
