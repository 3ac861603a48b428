//! Bounded-wait counting semaphore used for worker signalling and
//! completion events (§4.9, §5 "suspension points").
//!
//! Not present verbatim in the teacher (which signals via `AtomicBool` +
//! `thread::park`-style polling in `masscore::MassCoreEngine`'s watchdog);
//! grounded on the same `parking_lot::Mutex`-guarded-state idiom, widened to
//! a `Condvar`-backed counting semaphore so workers genuinely block instead
//! of spin-polling between ticks.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

pub struct Semaphore {
    count: Mutex<u32>,
    condvar: Condvar,
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}

impl Semaphore {
    pub fn new() -> Self {
        Self { count: Mutex::new(0), condvar: Condvar::new() }
    }

    pub fn signal(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.condvar.notify_one();
    }

    /// Waits up to `timeout` for a pending signal; returns whether one was
    /// consumed. A missed deadline (returns `false`) is the caller's cue to
    /// record an underrun (§4.9).
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut count = self.count.lock();
        if *count > 0 {
            *count -= 1;
            return true;
        }
        self.condvar.wait_for(&mut count, timeout);
        if *count > 0 {
            *count -= 1;
            true
        } else {
            false
        }
    }
}
