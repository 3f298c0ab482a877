//! Index-to-slot accessor over the ring's backing storage.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

/// Maps a logical sequence to the slot it lives in.
///
/// Implementations only need to support reads; the producer writes through
/// [`RingBuffer::write`] directly, since only it is allowed to mutate a slot
/// before publication.
pub trait DataProvider<T> {
    fn get(&self, sequence: i64) -> &T;
}

/// Fixed-size backing array for a [`crate::sequencer::Sequencer`].
///
/// Slot `s` lives at index `s & mask`. Producer writes and consumer reads
/// are never concurrent for the same slot: the sequencer's wrap-point check
/// keeps the producer from touching a slot until every gating consumer has
/// passed it, and a consumer never reads past what the barrier reported
/// available.
///
/// `occupied` tracks which slots currently hold a live `T`, so a write that
/// lands on a previously-written slot (wraparound) drops the prior occupant
/// instead of leaking it, and `Drop` can find exactly the still-initialized
/// slots to drain at teardown.
pub struct RingBuffer<T> {
    mask: i64,
    entries: Box<[UnsafeCell<MaybeUninit<T>>]>,
    occupied: Box<[AtomicBool]>,
}

// SAFETY: access discipline is enforced by the sequencer/barrier protocol,
// not by the type system; see module docs.
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    /// Creates storage for `buffer_size` slots.
    ///
    /// # Panics
    ///
    /// Panics if `buffer_size` is not a positive power of two — callers
    /// should size this to match the `Sequencer` it backs, which already
    /// validates the same constraint.
    pub fn new(buffer_size: usize) -> Self {
        assert!(
            buffer_size > 0 && buffer_size.is_power_of_two(),
            "buffer_size must be a positive power of two"
        );
        let mut entries = Vec::with_capacity(buffer_size);
        entries.resize_with(buffer_size, || UnsafeCell::new(MaybeUninit::uninit()));
        let mut occupied = Vec::with_capacity(buffer_size);
        occupied.resize_with(buffer_size, || AtomicBool::new(false));
        Self {
            mask: (buffer_size - 1) as i64,
            entries: entries.into_boxed_slice(),
            occupied: occupied.into_boxed_slice(),
        }
    }

    #[inline]
    fn index(&self, sequence: i64) -> usize {
        (sequence & self.mask) as usize
    }

    /// Writes `value` into the slot for `sequence`, dropping whatever
    /// occupied that slot on a previous lap around the ring.
    ///
    /// # Safety
    ///
    /// The caller must be the sole producer and must only write a slot that
    /// no consumer can currently be reading — i.e. one the sequencer's
    /// wrap-point check has cleared for reuse.
    pub unsafe fn write(&self, sequence: i64, value: T) {
        let idx = self.index(sequence);
        let slot = self.entries[idx].get();
        if self.occupied[idx].load(Ordering::Relaxed) {
            ptr::drop_in_place((*slot).as_mut_ptr());
        }
        (*slot).write(value);
        self.occupied[idx].store(true, Ordering::Relaxed);
    }

    /// Reads the slot for `sequence` without taking ownership.
    ///
    /// # Safety
    ///
    /// The caller must only call this for a sequence the barrier has
    /// reported available, so the slot is guaranteed initialized.
    pub fn read(&self, sequence: i64) -> &T {
        let idx = self.index(sequence);
        // SAFETY: see doc comment; the barrier/sequencer protocol keeps
        // `sequence` within the initialized range.
        unsafe { (*self.entries[idx].get()).assume_init_ref() }
    }
}

impl<T> DataProvider<T> for RingBuffer<T> {
    fn get(&self, sequence: i64) -> &T {
        self.read(sequence)
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        for (slot, occupied) in self.entries.iter().zip(self.occupied.iter_mut()) {
            if *occupied.get_mut() {
                // SAFETY: `occupied` is only set once a value has been
                // written and not yet dropped, so the slot holds a live `T`.
                unsafe { ptr::drop_in_place((*slot.get()).as_mut_ptr()) };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn write_then_read_round_trips() {
        let ring = RingBuffer::<u64>::new(8);
        unsafe { ring.write(0, 42) };
        unsafe { ring.write(9, 99) }; // wraps to the same slot as 1
        assert_eq!(*ring.read(0), 42);
        assert_eq!(*ring.read(9), 99);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn rejects_non_power_of_two_size() {
        RingBuffer::<u64>::new(3);
    }

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn overwriting_a_slot_on_wraparound_drops_the_prior_occupant() {
        let drops = Arc::new(AtomicUsize::new(0));
        let ring = RingBuffer::<DropCounter>::new(2);
        unsafe { ring.write(0, DropCounter(Arc::clone(&drops))) };
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        unsafe { ring.write(2, DropCounter(Arc::clone(&drops))) }; // same slot as 0
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_the_ring_drops_every_still_initialized_slot() {
        let drops = Arc::new(AtomicUsize::new(0));
        {
            let ring = RingBuffer::<DropCounter>::new(4);
            unsafe { ring.write(0, DropCounter(Arc::clone(&drops))) };
            unsafe { ring.write(1, DropCounter(Arc::clone(&drops))) };
            // slot 2 and 3 are left uninitialized and must not be touched.
        }
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }
}
