use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Single-slot wake-up signal, reset automatically once observed.
///
/// Any number of `notify` calls before the worker waits collapse into one
/// wake-up.
#[derive(Default)]
pub struct WakeSignal {
    set: Mutex<bool>,
    cond: Condvar,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        *self.set.lock() = true;
        self.cond.notify_one();
    }

    /// Wait until notified or `timeout` elapses. Returns whether the signal
    /// was set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut set = self.set.lock();
        if !*set {
            self.cond.wait_for(&mut set, timeout);
        }
        std::mem::replace(&mut *set, false)
    }
}
