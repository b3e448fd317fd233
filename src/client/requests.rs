//! Background requests and stale-response tracking
//!
//! Blocking work runs on a spawned thread and drops its result into a shared
//! slot; the render loop polls the slot each frame and never waits on it.
//!
//! Requests are not cancelled. Instead every catalog load takes a generation
//! number from [`RequestTracker`]; when a result arrives whose generation is
//! not the latest issued, it is discarded rather than overwriting newer state.

use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Default)]
pub struct RequestTracker {
    latest: u64,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next generation; every older one becomes stale
    pub fn next(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    pub fn latest(&self) -> u64 {
        self.latest
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.latest
    }
}

/// Result slot filled by a background thread
pub struct PendingRequest<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T: Send + 'static> PendingRequest<T> {
    pub fn spawn<F>(work: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let slot = Arc::new(Mutex::new(None));
        let result_arc = slot.clone();
        thread::spawn(move || {
            let result = work();
            if let Ok(mut guard) = result_arc.lock() {
                *guard = Some(result);
            }
        });
        Self { slot }
    }

    /// Already resolved request, for work that needs no thread
    pub fn ready(value: T) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(value))),
        }
    }

    /// Take the result if it has arrived
    pub fn try_take(&self) -> Option<T> {
        self.slot.lock().ok().and_then(|mut guard| guard.take())
    }
}

/// Poll every pending request, returning finished results and keeping the rest
pub fn drain_finished<T: Send + 'static>(pending: &mut Vec<PendingRequest<T>>) -> Vec<T> {
    let mut done = Vec::new();
    pending.retain(|req| match req.try_take() {
        Some(result) => {
            done.push(result);
            false
        }
        None => true,
    });
    done
}
