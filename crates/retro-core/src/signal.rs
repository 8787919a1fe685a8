//! Thread-safe set/clear/wait event

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A boolean event that other threads can wait on
///
/// Used for the scanner's pause gate and stop request, and for thread
/// completion notices. Never read a plain shared `bool` across threads.
#[derive(Debug, Default)]
pub struct Signal {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    pub fn new(initially_set: bool) -> Self {
        Self {
            flag: Mutex::new(initially_set),
            cond: Condvar::new(),
        }
    }

    /// Set the event and wake every waiter
    pub fn set(&self) {
        let mut flag = self.flag.lock();
        *flag = true;
        self.cond.notify_all();
    }

    pub fn clear(&self) {
        *self.flag.lock() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.flag.lock()
    }

    /// Block until the event is set
    pub fn wait(&self) {
        let mut flag = self.flag.lock();
        while !*flag {
            self.cond.wait(&mut flag);
        }
    }

    /// Block until the event is set or `timeout` elapses
    ///
    /// Returns whether the event was set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut flag = self.flag.lock();
        while !*flag {
            if self.cond.wait_until(&mut flag, deadline).timed_out() {
                break;
            }
        }
        *flag
    }
}
