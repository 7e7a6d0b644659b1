//! One-shot delayed tasks, used by the FTP handler to fire its welcome
//! banner ~100ms after a handshake completes without turning the handler
//! into a stateful TCP endpoint.
//!
//! There's no general-purpose thread pool here: task volume is bounded by
//! concurrent FTP sessions, which on a simulated device is small, so a
//! thread-per-task model is simple and cheap enough. `Stop` flips a shared
//! flag so tasks that haven't fired yet become no-ops, then joins every
//! spawned thread so a caller can rely on nothing running after `stop`
//! returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Default)]
pub struct Scheduler {
    stopped: Arc<AtomicBool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            stopped: Arc::new(AtomicBool::new(false)),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Runs `task` on its own thread after `delay`, unless [`Scheduler::stop`]
    /// is called first. Does not guarantee cancellation of a task already
    /// mid-sleep when `stop` is called -- only that `stop` won't return until
    /// that sleep (and any task it triggers) has finished.
    pub fn schedule_after<F>(&self, delay: Duration, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let stopped = Arc::clone(&self.stopped);
        let handle = thread::spawn(move || {
            thread::sleep(delay);
            if !stopped.load(Ordering::Acquire) {
                task();
            }
        });

        let mut handles = self.handles.lock().unwrap();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Marks the scheduler stopped and joins every outstanding task thread.
    /// Idempotent: calling it twice just joins an empty list the second time.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        let handles = std::mem::take(&mut *self.handles.lock().unwrap());
        for handle in handles {
            let _ = handle.join();
        }
    }
}
