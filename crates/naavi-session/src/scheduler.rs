//! Debounced scheduling
//!
//! A [`Debouncer`] holds at most one pending task. Scheduling again within the
//! window cancels the pending task and restarts the window, so only the last
//! trigger of a burst runs (trailing edge). A task whose window has already
//! passed is never interrupted.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};

const WAITING: u8 = 0;
const RUNNING: u8 = 1;
const CANCELLED: u8 = 2;

/// Handle to a scheduled task
#[derive(Debug, Clone)]
pub struct PendingTask {
    handle: AbortHandle,
    state: Arc<AtomicU8>,
}

impl PendingTask {
    /// Cancel the task if it is still waiting out its window
    ///
    /// Returns `false` once the task has started or finished.
    pub fn cancel(&self) -> bool {
        let cancelled = self
            .state
            .compare_exchange(WAITING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if cancelled {
            self.handle.abort();
        }
        cancelled
    }

    /// Task ran to completion or was cancelled
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Single-slot trailing-edge debouncer
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    slot: Mutex<Option<(JoinHandle<()>, PendingTask)>>,
}

impl Debouncer {
    /// Debouncer with a quiet window
    #[inline]
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            slot: Mutex::new(None),
        }
    }

    /// Quiet window
    #[inline]
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Run `task` once the window passes without another call
    ///
    /// Must be called within a Tokio runtime.
    pub fn schedule<F>(&self, task: F) -> PendingTask
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let window = self.window;
        let mut slot = self.slot.lock();
        if let Some((_, previous)) = slot.take() {
            previous.cancel();
        }

        let state = Arc::new(AtomicU8::new(WAITING));
        let gate = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if gate
                .compare_exchange(WAITING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                task.await;
            }
        });
        let pending = PendingTask {
            handle: handle.abort_handle(),
            state,
        };
        *slot = Some((handle, pending.clone()));
        pending
    }

    /// Cancel the task still waiting out its window, if any
    pub fn cancel(&self) -> bool {
        self.slot
            .lock()
            .take()
            .is_some_and(|(_, pending)| pending.cancel())
    }

    /// A task is waiting or running
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|(handle, _)| !handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some((_, pending)) = self.slot.get_mut().take() {
            pending.cancel();
        }
    }
}
