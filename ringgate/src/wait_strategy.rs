//! Waiting policies for a [`crate::barrier::SequenceBarrier`].

use crate::error::{Result, RingGateError};
use crate::sequence::Sequence;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cooperative shutdown flag shared between a barrier and its wait strategy.
pub struct AlertFlag(AtomicBool);

impl AlertFlag {
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_set() {
            Err(RingGateError::Alert)
        } else {
            Ok(())
        }
    }
}

impl Default for AlertFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the minimum of the dependent sequences, or the cursor itself when
/// there are no dependents — the barrier's "dependent view" from the spec.
pub(crate) fn dependent_value(cursor: &Sequence, dependents: &[Arc<Sequence>]) -> i64 {
    if dependents.is_empty() {
        cursor.get()
    } else {
        dependents.iter().map(|s| s.get()).min().unwrap_or_else(|| cursor.get())
    }
}

/// A policy for how a waiter stalls until a target sequence becomes
/// consumable.
///
/// `wait_for` returns once the dependent view has reached `target`, or fails
/// with [`RingGateError::Alert`] / [`RingGateError::Timeout`]. Every
/// implementation MUST check the alert flag at least once per loop
/// iteration so a halted processor does not spin or block forever.
pub trait WaitStrategy: Send + Sync {
    fn wait_for(
        &self,
        target: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AlertFlag,
    ) -> Result<i64>;

    /// Wakes every waiter blocked in `wait_for`. Called after a publish.
    fn signal_all_when_blocking(&self);
}

/// Tight spin loop; lowest latency, burns a full core while waiting.
#[derive(Default)]
pub struct BusySpinWaitStrategy;

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_for(
        &self,
        target: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AlertFlag,
    ) -> Result<i64> {
        loop {
            alert.check()?;
            let available = dependent_value(cursor, dependents);
            if available >= target {
                return Ok(available);
            }
            std::hint::spin_loop();
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Spins for a bounded number of iterations, then falls back to yielding the
/// OS thread. Trades a little latency for not pinning a core indefinitely.
pub struct YieldingWaitStrategy {
    spin_tries: u32,
}

impl YieldingWaitStrategy {
    const DEFAULT_SPIN_TRIES: u32 = 100;

    pub fn new(spin_tries: u32) -> Self {
        Self { spin_tries }
    }
}

impl Default for YieldingWaitStrategy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SPIN_TRIES)
    }
}

impl WaitStrategy for YieldingWaitStrategy {
    fn wait_for(
        &self,
        target: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AlertFlag,
    ) -> Result<i64> {
        let mut remaining_spins = self.spin_tries;
        loop {
            alert.check()?;
            let available = dependent_value(cursor, dependents);
            if available >= target {
                return Ok(available);
            }
            if remaining_spins == 0 {
                std::thread::yield_now();
            } else {
                remaining_spins -= 1;
                std::hint::spin_loop();
            }
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Parks on a condition variable, woken by `signal_all_when_blocking`.
/// Lowest CPU usage, highest wake-up latency of the four strategies.
pub struct BlockingWaitStrategy {
    lock: Mutex<()>,
    condvar: Condvar,
}

impl BlockingWaitStrategy {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }
}

impl Default for BlockingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_for(
        &self,
        target: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AlertFlag,
    ) -> Result<i64> {
        alert.check()?;
        let mut available = dependent_value(cursor, dependents);
        if available >= target {
            return Ok(available);
        }

        let mut guard = self.lock.lock();
        loop {
            alert.check()?;
            available = dependent_value(cursor, dependents);
            if available >= target {
                return Ok(available);
            }
            self.condvar.wait(&mut guard);
        }
    }

    fn signal_all_when_blocking(&self) {
        let _guard = self.lock.lock();
        self.condvar.notify_all();
    }
}

/// As [`BlockingWaitStrategy`], but gives up after a deadline.
pub struct TimeoutBlockingWaitStrategy {
    lock: Mutex<()>,
    condvar: Condvar,
    timeout: Duration,
}

impl TimeoutBlockingWaitStrategy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            lock: Mutex::new(()),
            condvar: Condvar::new(),
            timeout,
        }
    }
}

impl WaitStrategy for TimeoutBlockingWaitStrategy {
    fn wait_for(
        &self,
        target: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AlertFlag,
    ) -> Result<i64> {
        alert.check()?;
        let mut available = dependent_value(cursor, dependents);
        if available >= target {
            return Ok(available);
        }

        let deadline = Instant::now() + self.timeout;
        let mut guard = self.lock.lock();
        loop {
            alert.check()?;
            available = dependent_value(cursor, dependents);
            if available >= target {
                return Ok(available);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(RingGateError::Timeout);
            }
            self.condvar.wait_for(&mut guard, deadline - now);
        }
    }

    fn signal_all_when_blocking(&self) {
        let _guard = self.lock.lock();
        self.condvar.notify_all();
    }
}
