//! Gates a consumer on the producer cursor and zero or more upstream sequences.

use crate::diagnostics;
use crate::error::Result;
use crate::sequence::Sequence;
use crate::sequencer::Sequencer;
use crate::wait_strategy::{dependent_value, AlertFlag, WaitStrategy};
use std::sync::Arc;

/// Combines a [`WaitStrategy`] with the producer cursor and an optional
/// fixed group of upstream consumer sequences.
///
/// If `dependents` is empty, the barrier's dependent view is the producer
/// cursor itself; otherwise it is the minimum across the group, so a
/// downstream processor never runs ahead of the slowest thing it depends on.
pub struct SequenceBarrier {
    sequencer: Arc<Sequencer>,
    wait_strategy: Arc<dyn WaitStrategy>,
    cursor: Arc<Sequence>,
    dependents: Vec<Arc<Sequence>>,
    alert: AlertFlag,
}

impl SequenceBarrier {
    pub(crate) fn new(
        sequencer: Arc<Sequencer>,
        wait_strategy: Arc<dyn WaitStrategy>,
        cursor: Arc<Sequence>,
        dependents: Vec<Arc<Sequence>>,
    ) -> Self {
        Self {
            sequencer,
            wait_strategy,
            cursor,
            dependents,
            alert: AlertFlag::new(),
        }
    }

    /// Waits until `sequence` is consumable, returning the highest
    /// contiguously available sequence (which may be greater than
    /// `sequence` if a producer batch published several slots at once).
    pub fn wait_for(&self, sequence: i64) -> Result<i64> {
        self.alert.check()?;
        let available = self
            .wait_strategy
            .wait_for(sequence, &self.cursor, &self.dependents, &self.alert)?;

        if available < sequence {
            return Ok(available);
        }
        Ok(self.sequencer.get_highest_published_sequence(sequence, available))
    }

    /// The dependent view this barrier currently observes, without waiting.
    pub fn get_cursor(&self) -> i64 {
        dependent_value(&self.cursor, &self.dependents)
    }

    pub fn is_alerted(&self) -> bool {
        self.alert.is_set()
    }

    pub fn alert(&self) {
        self.alert.set();
        self.wait_strategy.signal_all_when_blocking();
        diagnostics::record_barrier_alert();
    }

    pub fn clear_alert(&self) {
        self.alert.clear();
        diagnostics::record_barrier_clear();
    }

    pub fn check_alert(&self) -> Result<()> {
        self.alert.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait_strategy::BusySpinWaitStrategy;

    fn make_sequencer() -> Arc<Sequencer> {
        Arc::new(Sequencer::new(8, Arc::new(BusySpinWaitStrategy)).unwrap())
    }

    #[test]
    fn empty_dependents_tracks_cursor() {
        let sequencer = make_sequencer();
        let barrier = sequencer.new_barrier(vec![]);
        sequencer.publish(3);
        assert_eq!(barrier.get_cursor(), 3);
    }

    #[test]
    fn non_empty_dependents_track_their_minimum() {
        let sequencer = make_sequencer();
        let a = Arc::new(Sequence::new(5));
        let b = Arc::new(Sequence::new(2));
        let barrier = sequencer.new_barrier(vec![a, b]);
        assert_eq!(barrier.get_cursor(), 2);
    }

    #[test]
    fn alert_is_observed_by_wait_for() {
        let sequencer = make_sequencer();
        let barrier = sequencer.new_barrier(vec![]);
        barrier.alert();
        assert!(barrier.is_alerted());
        let err = barrier.wait_for(0).unwrap_err();
        assert!(matches!(err, crate::error::RingGateError::Alert));
        barrier.clear_alert();
        assert!(!barrier.is_alerted());
    }
}
