//! Throughput of a producer feeding a `BatchEventProcessor` running on its
//! own thread, single-producer single-consumer.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use ringgate::wait_strategy::BusySpinWaitStrategy;
use ringgate::{BatchEventProcessor, EventHandler, Result, RingBuffer, Sequencer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const MSG_COUNT: u64 = 2_000_000;
const RING_SIZE: usize = 1 << 14;

struct CountingHandler {
    count: Arc<AtomicU64>,
}

impl EventHandler<u64> for CountingHandler {
    fn on_event(&mut self, event: &u64, _sequence: i64, _end_of_batch: bool) -> Result<()> {
        self.count.fetch_add(*event, Ordering::Relaxed);
        Ok(())
    }
}

fn bench_spsc_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_processor");
    group.throughput(Throughput::Elements(MSG_COUNT));
    group.sample_size(10);

    group.bench_function("spsc_drain", |b| {
        b.iter(|| {
            let sequencer = Arc::new(Sequencer::new(RING_SIZE, Arc::new(BusySpinWaitStrategy)).unwrap());
            let ring = Arc::new(RingBuffer::<u64>::new(RING_SIZE));
            let barrier = sequencer.new_barrier(vec![]);
            let count = Arc::new(AtomicU64::new(0));
            let processor = Arc::new(BatchEventProcessor::new(
                Arc::clone(&ring),
                barrier,
                CountingHandler {
                    count: Arc::clone(&count),
                },
            ));
            sequencer.add_gating_sequences(&[processor.sequence()]);

            let p = Arc::clone(&processor);
            let worker = std::thread::spawn(move || p.run());

            for i in 0..MSG_COUNT {
                let seq = sequencer.next();
                unsafe { ring.write(seq, i) };
                sequencer.publish(seq);
            }

            while processor.sequence().get() < (MSG_COUNT as i64) - 1 {
                std::hint::spin_loop();
            }
            processor.halt();
            worker.join().unwrap().unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_spsc_drain);
criterion_main!(benches);
