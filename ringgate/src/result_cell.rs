//! One-shot, cancellable holder for the outcome of a computation.

use crate::diagnostics;
use crate::error::{Result, RingGateError};
use crate::invariants::debug_assert_terminal_once;
use parking_lot::{Condvar, Mutex};
use std::cell::UnsafeCell;
use std::error::Error as StdError;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::{Duration, Instant};

const READY: u8 = 0;
const RUNNING: u8 = 1;
const RAN: u8 = 2;
const CANCELLED: u8 = 3;

type Failure = Arc<dyn StdError + Send + Sync>;
type Task<T> = dyn Fn(&CancellationToken) -> std::result::Result<T, Box<dyn StdError + Send + Sync>>
    + Send
    + Sync;

/// Lets a running task observe a cooperative cancellation request.
///
/// There is no forcible thread interruption in this design — `cancel(true)`
/// sets the flag this token reads; an uninterruptible computation simply
/// runs to completion and has its result discarded.
#[derive(Clone)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// A latch that opens exactly once, giving every thread that waits on it a
/// happens-before edge to whatever was written before it opened.
///
/// The mutex unlock inside `open` is the release; a waiter's matching lock
/// inside `wait`/`wait_timeout` is the acquire — this is what lets
/// `ResultCell::get` observe the worker's value/failure write safely.
struct TerminalGate {
    opened: Mutex<bool>,
    condvar: Condvar,
}

impl TerminalGate {
    fn new() -> Self {
        Self {
            opened: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn open(&self) {
        let mut opened = self.opened.lock();
        *opened = true;
        self.condvar.notify_all();
    }

    fn wait(&self) {
        let mut opened = self.opened.lock();
        while !*opened {
            self.condvar.wait(&mut opened);
        }
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut opened = self.opened.lock();
        while !*opened {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.condvar.wait_for(&mut opened, deadline - now);
        }
        true
    }
}

/// A synchronized holder of the outcome of a computation executed at most
/// once, with blocking/timed retrieval and cooperative cancellation.
///
/// States form the DAG: `READY -> RUNNING -> RAN`, `READY -> CANCELLED`,
/// `RUNNING -> CANCELLED`, `RUNNING -> RAN`, `RUNNING -> READY` (only via
/// [`ResultCell::run_and_reset`]).
pub struct ResultCell<T> {
    state: AtomicU8,
    task: Box<Task<T>>,
    value: UnsafeCell<Option<T>>,
    failure: UnsafeCell<Option<Failure>>,
    worker: Mutex<Option<ThreadId>>,
    interrupt: Arc<AtomicBool>,
    gate: TerminalGate,
    done_hook: Mutex<Option<Box<dyn FnMut() + Send>>>,
    done_called: AtomicBool,
}

// SAFETY: `value`/`failure` are written by exactly one thread per terminal
// transition (guarded by the `state` CAS) before the gate opens, and only
// read after the gate has been observed open — see `complete` and
// `read_outcome`.
unsafe impl<T: Send> Send for ResultCell<T> {}
unsafe impl<T: Send> Sync for ResultCell<T> {}

impl<T> ResultCell<T> {
    /// Builds a cell around a computation. The task is invoked by whichever
    /// thread calls `run`/`run_and_reset`; it is passed a
    /// [`CancellationToken`] to poll cooperatively.
    pub fn new<F>(task: F) -> Self
    where
        F: Fn(&CancellationToken) -> std::result::Result<T, Box<dyn StdError + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            state: AtomicU8::new(READY),
            task: Box::new(task),
            value: UnsafeCell::new(None),
            failure: UnsafeCell::new(None),
            worker: Mutex::new(None),
            interrupt: Arc::new(AtomicBool::new(false)),
            gate: TerminalGate::new(),
            done_hook: Mutex::new(None),
            done_called: AtomicBool::new(false),
        }
    }

    /// Registers the post-completion callback. Invoked exactly once, on
    /// whichever terminal transition happens first.
    pub fn set_done_hook<F>(&self, hook: F)
    where
        F: FnMut() + Send + 'static,
    {
        *self.done_hook.lock() = Some(Box::new(hook));
    }

    /// Attempts `READY -> RUNNING`, runs the task, and transitions to `RAN`
    /// storing the value or failure. A no-op if the cell is not `READY`.
    pub fn run(&self) {
        if !self.begin_running() {
            return;
        }
        let outcome = (self.task)(&self.token());
        self.complete(outcome);
    }

    /// Like `run`, but on success transitions back to `READY` and discards
    /// the value, so the same cell can be run again later (e.g. a
    /// recurring task). Returns whether a full successful cycle occurred.
    pub fn run_and_reset(&self) -> bool {
        if !self.begin_running() {
            return false;
        }
        match (self.task)(&self.token()) {
            Ok(_) => {
                *self.worker.lock() = None;
                if self
                    .state
                    .compare_exchange(RUNNING, READY, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    true
                } else {
                    // Raced with a concurrent cancel(); let its terminal
                    // transition stand and report no successful cycle.
                    false
                }
            }
            Err(err) => {
                self.complete(Err(err));
                false
            }
        }
    }

    /// While the cell is non-terminal, attempts `-> CANCELLED`. Returns
    /// `false` if a terminal transition already happened.
    pub fn cancel(&self, interrupt_if_running: bool) -> bool {
        loop {
            let current = self.state.load(Ordering::Acquire);
            if current == RAN || current == CANCELLED {
                return false;
            }
            if self
                .state
                .compare_exchange(current, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break;
            }
        }
        if interrupt_if_running {
            self.interrupt.store(true, Ordering::Release);
        }
        *self.worker.lock() = None;
        self.gate.open();
        self.fire_done_hook(true);
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    /// True once a terminal transition (`RAN` or `CANCELLED`) has been
    /// fully published — i.e. the terminal gate has opened.
    pub fn is_done(&self) -> bool {
        let state = self.state.load(Ordering::Acquire);
        (state == RAN || state == CANCELLED) && self.done_called.load(Ordering::Acquire)
    }

    fn token(&self) -> CancellationToken {
        CancellationToken {
            flag: Arc::clone(&self.interrupt),
        }
    }

    fn begin_running(&self) -> bool {
        if self
            .state
            .compare_exchange(READY, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        *self.worker.lock() = Some(std::thread::current().id());

        // A racing cancel() may have moved us to CANCELLED between the CAS
        // above and this check; if so there is nothing left to run.
        if self.state.load(Ordering::Acquire) != RUNNING {
            return false;
        }
        true
    }

    fn complete(&self, outcome: std::result::Result<T, Box<dyn StdError + Send + Sync>>) {
        let cas_ok = self
            .state
            .compare_exchange(RUNNING, RAN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if cas_ok {
            // SAFETY: the CAS above is the sole path that reaches this
            // branch for a given cell, so this is the only writer, and the
            // write happens-before `gate.open()`'s mutex unlock below.
            unsafe {
                match outcome {
                    Ok(value) => *self.value.get() = Some(value),
                    Err(err) => *self.failure.get() = Some(Arc::from(err)),
                }
            }
        }
        // If the CAS failed we were concurrently cancelled; cancel() already
        // performed its own terminal transition. Opening the gate and firing
        // the hook here are both idempotent, so calling them unconditionally
        // is a safe no-op in that case rather than a second real completion.
        *self.worker.lock() = None;
        self.gate.open();
        self.fire_done_hook(false);
    }

    fn fire_done_hook(&self, cancelled: bool) {
        let already_called = self.done_called.load(Ordering::Acquire);
        if self
            .done_called
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            debug_assert_terminal_once!(already_called);
            diagnostics::record_result_cell_terminal(cancelled);
            if let Some(hook) = self.done_hook.lock().as_mut() {
                hook();
            }
        }
    }
}

impl<T: Clone> ResultCell<T> {
    /// Blocks until the terminal gate opens, then returns the stored value,
    /// or fails with [`RingGateError::Cancelled`] / `Execution`.
    pub fn get(&self) -> Result<T> {
        self.gate.wait();
        self.read_outcome()
    }

    /// As `get`, but fails with [`RingGateError::Timeout`] if the gate does
    /// not open within `timeout`.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T> {
        if !self.gate.wait_timeout(timeout) {
            return Err(RingGateError::Timeout);
        }
        self.read_outcome()
    }

    fn read_outcome(&self) -> Result<T> {
        if self.state.load(Ordering::Acquire) == CANCELLED {
            return Err(RingGateError::Cancelled);
        }
        // SAFETY: the gate has opened, so the mutex unlock in `complete`'s
        // call to `gate.open()` happened-before our lock in `gate.wait()`,
        // which makes the worker's write to `value`/`failure` visible here.
        unsafe {
            if let Some(failure) = &*self.failure.get() {
                return Err(RingGateError::Execution {
                    cause: failure.to_string(),
                });
            }
            if let Some(value) = &*self.value.get() {
                return Ok(value.clone());
            }
        }
        Err(RingGateError::IllegalState {
            message: "result cell reached a terminal state with no stored outcome",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn success_is_visible_to_waiters_started_before_run() {
        let cell = Arc::new(ResultCell::new(|_| Ok(42)));
        let done_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&done_calls);
        cell.set_done_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let waiters: Vec<_> = (0..2)
            .map(|_| {
                let c = Arc::clone(&cell);
                std::thread::spawn(move || c.get())
            })
            .collect();

        std::thread::sleep(Duration::from_millis(10));
        cell.run();

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap().unwrap(), 42);
        }
        assert_eq!(done_calls.load(Ordering::SeqCst), 1);
        assert!(cell.is_done());
        assert!(!cell.is_cancelled());
    }

    #[test]
    fn cancel_before_run_prevents_execution() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_flag = Arc::clone(&ran);
        let cell = ResultCell::new(move |_| {
            ran_flag.store(true, Ordering::SeqCst);
            Ok(1)
        });

        assert!(cell.cancel(false));
        cell.run();

        assert!(!ran.load(Ordering::SeqCst));
        assert!(matches!(cell.get(), Err(RingGateError::Cancelled)));
        assert!(cell.is_cancelled());
        assert!(cell.is_done());
    }

    #[test]
    fn cancel_race_while_running_is_observed_by_the_task() {
        let cell = Arc::new(ResultCell::new(|token| {
            for _ in 0..200 {
                if token.is_cancelled() {
                    return Err("observed cancellation".into());
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            Ok(7)
        }));

        let c = Arc::clone(&cell);
        let worker = std::thread::spawn(move || c.run());
        std::thread::sleep(Duration::from_millis(10));
        assert!(cell.cancel(true));
        worker.join().unwrap();

        assert!(matches!(cell.get(), Err(RingGateError::Cancelled)));
        assert!(cell.is_cancelled());
        assert!(cell.is_done());
    }

    #[test]
    fn execution_failure_is_reported_as_execution_error() {
        let cell = ResultCell::<i32>::new(|_| Err("boom".into()));
        cell.run();
        assert!(matches!(cell.get(), Err(RingGateError::Execution { .. })));
    }

    #[test]
    fn run_and_reset_discards_value_and_returns_to_ready() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cell = ResultCell::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        });

        assert!(cell.run_and_reset());
        assert!(!cell.is_done());
        assert!(cell.run_and_reset());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn duplicate_terminal_calls_are_no_ops() {
        let done_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&done_calls);
        let cell = ResultCell::new(|_| Ok(0));
        cell.set_done_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        cell.run();
        assert!(!cell.cancel(true));
        assert!(!cell.cancel(false));
        assert_eq!(done_calls.load(Ordering::SeqCst), 1);
    }
}
