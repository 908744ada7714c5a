//! Cooperative pause/resume and shutdown surface shared by every worker.
//!
//! Workers never get suspended from the outside. They call [`WorkerControl::checkpoint`] at safe
//! points (loop top, between packets, after a timed pop expires) where they hold no packet; while
//! the router is paused the checkpoint parks the calling thread on a condition variable. The
//! statistics reporter drives [`pause_all`](WorkerControl::pause_all) and
//! [`resume_all`](WorkerControl::resume_all); both are idempotent.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Default)]
struct ControlState {
    paused: bool,
    /// Workers currently parked inside `checkpoint`.
    parked: usize,
    /// Completed pause/resume cycles, for diagnostics.
    cycles: u64,
}

#[derive(Debug)]
pub struct WorkerControl {
    state: Mutex<ControlState>,
    changed: Condvar,
    /// Mirror of `state.paused` so unpaused checkpoints skip the lock.
    pause_requested: AtomicBool,
    running: AtomicBool,
}

impl Default for WorkerControl {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerControl {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ControlState::default()),
            changed: Condvar::new(),
            pause_requested: AtomicBool::new(false),
            running: AtomicBool::new(true),
        }
    }

    /// Ask every worker to park at its next checkpoint. Calling it while paused is a no-op.
    pub fn pause_all(&self) {
        let mut state = self.state.lock();
        if !state.paused {
            state.paused = true;
            self.pause_requested.store(true, Ordering::Release);
            debug!("pausing all workers");
        }
    }

    /// Release every parked worker. Calling it while running is a no-op.
    pub fn resume_all(&self) {
        let mut state = self.state.lock();
        if state.paused {
            state.paused = false;
            self.pause_requested.store(false, Ordering::Release);
            state.cycles += 1;
            debug!(cycles = state.cycles, "resuming all workers");
        }
        drop(state);
        self.changed.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Number of workers currently parked at a checkpoint.
    pub fn parked_workers(&self) -> usize {
        self.state.lock().parked
    }

    /// Completed pause/resume cycles.
    pub fn cycles(&self) -> u64 {
        self.state.lock().cycles
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the router: wakes parked and sleeping workers so they can exit their loops.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        // Take the lock so a worker between its running check and its wait cannot miss the wakeup.
        drop(self.state.lock());
        self.changed.notify_all();
    }

    /// Safe suspension point. Blocks while a pause is in effect.
    ///
    /// # Returns
    /// `true` if the worker should keep going, `false` once shutdown was requested (including a
    /// shutdown that arrives while parked).
    pub fn checkpoint(&self) -> bool {
        if !self.pause_requested.load(Ordering::Acquire) {
            return self.is_running();
        }
        let mut state = self.state.lock();
        if state.paused && self.is_running() {
            state.parked += 1;
            while state.paused && self.is_running() {
                self.changed.wait(&mut state);
            }
            state.parked -= 1;
        }
        self.is_running()
    }

    /// Sleep for `duration`, waking early on shutdown. Returns `false` if shutdown was requested.
    ///
    /// Pausing does not interrupt the sleep: a worker sleeping through a pause parks at its next
    /// checkpoint.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut state = self.state.lock();
        while self.is_running() {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        self.is_running()
    }

    /// Wait until at least `count` workers are parked, or `timeout` elapses.
    pub fn wait_for_parked(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.parked < count {
            if !self.is_running() {
                return false;
            }
            // Parked workers do not notify; poll on a short timeout instead.
            let slice = (Instant::now() + Duration::from_millis(1)).min(deadline);
            self.changed.wait_until(&mut state, slice);
            if Instant::now() >= deadline {
                return state.parked >= count;
            }
        }
        true
    }
}
