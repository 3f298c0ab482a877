//! Sequenced ring buffer coordination and a cancellable one-shot result cell.
//!
//! Two independent pieces live in this crate:
//!
//! - A single-producer ring coordination layer ([`Sequencer`], [`Sequence`],
//!   [`SequenceBarrier`], [`WaitStrategy`], [`BatchEventProcessor`]) for
//!   handing batches of events between threads without locking the hot path.
//! - [`ResultCell`], a FutureTask-style holder for the outcome of a
//!   computation that runs at most once and can be cancelled cooperatively.
//!
//! ```
//! use ringgate::{BatchEventProcessor, EventHandler, RingBuffer, Sequencer, Result};
//! use ringgate::wait_strategy::BusySpinWaitStrategy;
//! use std::sync::Arc;
//!
//! struct Printer;
//! impl EventHandler<u64> for Printer {
//!     fn on_event(&mut self, event: &u64, _sequence: i64, _end_of_batch: bool) -> Result<()> {
//!         println!("{event}");
//!         Ok(())
//!     }
//! }
//!
//! let sequencer = Arc::new(Sequencer::new(1024, Arc::new(BusySpinWaitStrategy)).unwrap());
//! let ring = Arc::new(RingBuffer::<u64>::new(1024));
//! let barrier = sequencer.new_barrier(vec![]);
//! let processor = BatchEventProcessor::new(Arc::clone(&ring), barrier, Printer);
//! sequencer.add_gating_sequences(&[processor.sequence()]);
//!
//! let seq = sequencer.next();
//! unsafe { ring.write(seq, 42) };
//! sequencer.publish(seq);
//! ```

mod invariants;

pub mod barrier;
pub mod batch_processor;
pub mod config;
pub mod data_provider;
pub mod diagnostics;
pub mod error;
pub mod metrics;
pub mod padding;
pub mod result_cell;
pub mod sequence;
pub mod sequencer;
pub mod wait_strategy;

pub use barrier::SequenceBarrier;
pub use batch_processor::{BatchEventProcessor, EventHandler};
pub use config::Config;
pub use data_provider::{DataProvider, RingBuffer};
pub use error::{Result, RingGateError};
pub use metrics::{Metrics, MetricsSnapshot};
pub use padding::CacheAligned;
pub use result_cell::{CancellationToken, ResultCell};
pub use sequence::Sequence;
pub use sequencer::Sequencer;
pub use wait_strategy::{
    AlertFlag, BlockingWaitStrategy, BusySpinWaitStrategy, TimeoutBlockingWaitStrategy,
    WaitStrategy, YieldingWaitStrategy,
};
