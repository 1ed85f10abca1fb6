//! Cross-thread pause/stop coordination for the processing loop.
//!
//! Two booleans behind one mutex plus a condvar: `pause` blocks the worker
//! at the top of its next iteration, `resume` wakes exactly one waiter,
//! `stop` is honored at iteration boundaries only.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
struct Flags {
    paused: bool,
    stop: bool,
}

pub struct PipelineControl {
    flags: Mutex<Flags>,
    cond: Condvar,
}

impl PipelineControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            flags: Mutex::new(Flags::default()),
            cond: Condvar::new(),
        })
    }

    /// Ask the worker to block before its next read.
    pub fn pause(&self) {
        self.flags.lock().paused = true;
    }

    /// Clear the pause flag and wake one blocked iteration.
    pub fn resume(&self) {
        let mut flags = self.flags.lock();
        flags.paused = false;
        self.cond.notify_one();
    }

    /// Request cooperative cancellation. Also wakes a paused worker so the
    /// stop flag can be observed.
    pub fn request_stop(&self) {
        let mut flags = self.flags.lock();
        flags.stop = true;
        self.cond.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.flags.lock().paused
    }

    pub fn stop_requested(&self) -> bool {
        self.flags.lock().stop
    }

    /// Worker-side gate at the top of each iteration: blocks while paused,
    /// returns true when the session should cancel.
    pub(crate) fn wait_if_paused(&self) -> bool {
        let mut flags = self.flags.lock();
        while flags.paused && !flags.stop {
            self.cond.wait(&mut flags);
        }
        flags.stop
    }
}
