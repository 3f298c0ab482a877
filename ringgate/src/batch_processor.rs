//! Long-running worker draining a barrier-gated batch through a handler.

use crate::barrier::SequenceBarrier;
use crate::data_provider::RingBuffer;
use crate::diagnostics;
use crate::error::{Result, RingGateError};
use crate::invariants::debug_assert_initialized_read;
use crate::metrics::Metrics;
use crate::sequence::Sequence;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The application callback a [`BatchEventProcessor`] drives.
///
/// Optional capabilities — lifecycle notification, timeout handling,
/// mid-batch sequence reporting — are default (no-op) methods rather than
/// a separate set of capability traits the processor has to probe for at
/// runtime: a handler overrides only the ones it needs.
pub trait EventHandler<T>: Send {
    /// Handles one event. `end_of_batch` is true for the last sequence in
    /// the current drain, useful for batching downstream I/O.
    fn on_event(&mut self, event: &T, sequence: i64, end_of_batch: bool) -> Result<()>;

    /// Called once, before the processor enters its wait loop.
    fn on_start(&mut self) {}

    /// Called once, after the processor has stopped running.
    fn on_shutdown(&mut self) {}

    /// Called when the barrier's wait strategy reports a timeout rather
    /// than newly available sequences.
    fn on_timeout(&mut self, _sequence: i64) {}

    /// Called after each event, letting a handler that batches internally
    /// report progress before the whole drain completes.
    fn on_sequence_report(&mut self, _sequence: i64) {}
}

type ExceptionHook<T> = dyn FnMut(&RingGateError, i64, Option<&T>) + Send;

/// Drains the contiguous range of newly available slots through an
/// [`EventHandler`], advancing its own sequence only after every slot up to
/// that value has been handed to the handler.
pub struct BatchEventProcessor<T, H: EventHandler<T>> {
    data_provider: Arc<RingBuffer<T>>,
    barrier: SequenceBarrier,
    handler: Mutex<H>,
    sequence: Arc<Sequence>,
    running: AtomicBool,
    exception_hook: Mutex<Option<Box<ExceptionHook<T>>>>,
    metrics: Metrics,
}

impl<T, H: EventHandler<T>> BatchEventProcessor<T, H> {
    pub fn new(data_provider: Arc<RingBuffer<T>>, barrier: SequenceBarrier, handler: H) -> Self {
        Self {
            data_provider,
            barrier,
            handler: Mutex::new(handler),
            sequence: Arc::new(Sequence::default()),
            running: AtomicBool::new(false),
            exception_hook: Mutex::new(None),
            metrics: Metrics::new(),
        }
    }

    /// This processor's own progress sequence. Share it as a gating or
    /// dependent sequence for upstream/downstream processors.
    pub fn sequence(&self) -> Arc<Sequence> {
        Arc::clone(&self.sequence)
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn set_exception_handler<F>(&self, hook: F)
    where
        F: FnMut(&RingGateError, i64, Option<&T>) + Send + 'static,
    {
        *self.exception_hook.lock() = Some(Box::new(hook));
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clears the running flag and alerts the barrier so a blocked `run`
    /// wakes up and exits its loop.
    pub fn halt(&self) {
        self.running.store(false, Ordering::Release);
        self.barrier.alert();
    }

    /// Runs until `halt` is called. Fails with
    /// [`RingGateError::IllegalState`] if already running.
    pub fn run(&self) -> Result<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RingGateError::IllegalState {
                message: "processor is already running",
            });
        }

        self.barrier.clear_alert();
        self.handler.lock().on_start();
        diagnostics::record_processor_start();

        let mut next = self.sequence.get() + 1;

        loop {
            match self.barrier.wait_for(next) {
                Ok(available) => {
                    self.drain_batch(next, available);
                    self.sequence.set(available);
                    next = available + 1;
                }
                Err(RingGateError::Timeout) => {
                    self.handler.lock().on_timeout(next - 1);
                }
                Err(RingGateError::Alert) => {
                    if !self.is_running() {
                        break;
                    }
                }
                Err(other) => {
                    self.report_exception(&other, next, None);
                    self.sequence.set(next);
                    next += 1;
                }
            }
        }

        self.handler.lock().on_shutdown();
        diagnostics::record_processor_halt();
        self.running.store(false, Ordering::Release);
        Ok(())
    }

    fn drain_batch(&self, from: i64, available: i64) {
        self.metrics.add_batch_processed();
        let mut seq = from;
        while seq <= available {
            debug_assert_initialized_read!(seq, available);
            let event = self.data_provider.read(seq);
            let end_of_batch = seq == available;
            let outcome = self.handler.lock().on_event(event, seq, end_of_batch);
            if let Err(err) = outcome {
                self.report_exception(&err, seq, Some(event));
            }
            self.handler.lock().on_sequence_report(seq);
            seq += 1;
        }
    }

    fn report_exception(&self, err: &RingGateError, sequence: i64, event: Option<&T>) {
        diagnostics::record_handler_exception(sequence);
        if let Some(hook) = self.exception_hook.lock().as_mut() {
            hook(err, sequence, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::Sequencer;
    use crate::wait_strategy::BusySpinWaitStrategy;
    use std::sync::Mutex as StdMutex;

    struct RecordingHandler {
        received: Arc<StdMutex<Vec<i64>>>,
        fail_on: Option<i64>,
    }

    impl EventHandler<u64> for RecordingHandler {
        fn on_event(&mut self, event: &u64, sequence: i64, _end_of_batch: bool) -> Result<()> {
            if self.fail_on == Some(sequence) {
                return Err(RingGateError::IllegalState {
                    message: "handler asked to fail",
                });
            }
            self.received.lock().unwrap().push(*event as i64);
            Ok(())
        }
    }

    #[test]
    fn drains_published_range_in_order() {
        let sequencer = Arc::new(Sequencer::new(16, Arc::new(BusySpinWaitStrategy)).unwrap());
        let ring = Arc::new(RingBuffer::<u64>::new(16));
        let barrier = sequencer.new_barrier(vec![]);

        for i in 0..16u64 {
            let seq = sequencer.next();
            unsafe { ring.write(seq, i) };
            sequencer.publish(seq);
        }

        let received = Arc::new(StdMutex::new(Vec::new()));
        let processor = Arc::new(BatchEventProcessor::new(
            Arc::clone(&ring),
            barrier,
            RecordingHandler {
                received: Arc::clone(&received),
                fail_on: None,
            },
        ));

        let p = Arc::clone(&processor);
        let thread = std::thread::spawn(move || p.run());
        while processor.sequence().get() < 15 {
            std::hint::spin_loop();
        }
        processor.halt();
        thread.join().unwrap().unwrap();

        assert_eq!(*received.lock().unwrap(), (0..16).collect::<Vec<_>>());
        assert_eq!(processor.sequence().get(), 15);
        assert!(processor.metrics().snapshot().batches_processed >= 1);
    }

    #[test]
    fn handler_exception_does_not_stall_the_sequence() {
        let sequencer = Arc::new(Sequencer::new(16, Arc::new(BusySpinWaitStrategy)).unwrap());
        let ring = Arc::new(RingBuffer::<u64>::new(16));
        let barrier = sequencer.new_barrier(vec![]);

        for i in 0..10u64 {
            let seq = sequencer.next();
            unsafe { ring.write(seq, i) };
            sequencer.publish(seq);
        }

        let received = Arc::new(StdMutex::new(Vec::new()));
        let exceptions = Arc::new(StdMutex::new(Vec::new()));
        let processor = Arc::new(BatchEventProcessor::new(
            Arc::clone(&ring),
            barrier,
            RecordingHandler {
                received: Arc::clone(&received),
                fail_on: Some(5),
            },
        ));
        let exceptions_for_hook = Arc::clone(&exceptions);
        processor.set_exception_handler(move |_err, seq, _event| {
            exceptions_for_hook.lock().unwrap().push(seq);
        });

        let p = Arc::clone(&processor);
        let thread = std::thread::spawn(move || p.run());
        while processor.sequence().get() < 9 {
            std::hint::spin_loop();
        }
        processor.halt();
        thread.join().unwrap().unwrap();

        assert_eq!(*exceptions.lock().unwrap(), vec![5]);
        assert_eq!(processor.sequence().get(), 9);
        assert_eq!(received.lock().unwrap().len(), 9);
    }
}
