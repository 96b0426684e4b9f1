//! Marshaling work from any thread onto the owner thread.
//!
//! Tasks stay in a Rust-side FIFO. The native wake only asks the owner
//! thread to drain the queue, so no task data ever crosses the C boundary.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use webview_sys::{Result, SurfaceOps, SurfaceWaker};

type TaskFn = Box<dyn FnOnce(&dyn SurfaceOps) -> Result<()> + Send>;

/// One unit of work for the owner thread, owning everything it needs.
pub struct DispatchTask {
    label: &'static str,
    op: TaskFn,
}

impl DispatchTask {
    pub fn new(
        label: &'static str,
        op: impl FnOnce(&dyn SurfaceOps) -> Result<()> + Send + 'static,
    ) -> Self {
        Self {
            label,
            op: Box::new(op),
        }
    }

    fn run(self, ops: &dyn SurfaceOps) -> Result<()> {
        (self.op)(ops)
    }
}

impl std::fmt::Debug for DispatchTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTask")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct QueueInner {
    waker: Option<Arc<dyn SurfaceWaker>>,
    tasks: VecDeque<DispatchTask>,
}

/// FIFO of [`DispatchTask`]s bound to one live surface at a time.
#[derive(Default)]
pub struct DispatchQueue {
    inner: Mutex<QueueInner>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the queue to the live surface woken by `waker`.
    pub fn open(&self, waker: Arc<dyn SurfaceWaker>) {
        self.inner.lock().waker = Some(waker);
    }

    /// Queue `task` and wake the owner thread.
    ///
    /// Returns false when the task was dropped unexecuted because the queue
    /// is closed or the surface could not be woken.
    pub fn submit(&self, task: DispatchTask) -> bool {
        let mut inner = self.inner.lock();
        let Some(waker) = inner.waker.clone() else {
            drop(inner);
            log::debug!(target: "webview::dispatch", "queue closed, dropping {}", task.label);
            return false;
        };
        inner.tasks.push_back(task);
        // Wake under the lock so `close` cannot slip in between.
        if let Err(e) = waker.wake() {
            let task = inner.tasks.pop_back();
            drop(inner);
            if let Some(task) = task {
                log::warn!(target: "webview::dispatch", "wake failed, dropping {}: {}", task.label, e);
            }
            return false;
        }
        true
    }

    /// Run every queued task on the calling (owner) thread.
    ///
    /// Tasks submitted while draining run in the same pass. A panicking task
    /// is logged and does not stop the drain. Returns the number of tasks run.
    pub fn drain(&self, ops: &dyn SurfaceOps) -> usize {
        let mut ran = 0;
        loop {
            let Some(task) = self.inner.lock().tasks.pop_front() else {
                break;
            };
            let label = task.label;
            ran += 1;
            match panic::catch_unwind(AssertUnwindSafe(|| task.run(ops))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::warn!(target: "webview::dispatch", "{} failed: {}", label, e);
                }
                Err(_) => {
                    log::error!(target: "webview::dispatch", "{} panicked", label);
                }
            }
        }
        ran
    }

    /// Make the surface's run-loop return. No-op when the queue is closed.
    pub fn terminate(&self) -> bool {
        let waker = self.inner.lock().waker.clone();
        match waker {
            Some(waker) => match waker.terminate() {
                Ok(()) => true,
                Err(e) => {
                    log::debug!(target: "webview::dispatch", "terminate: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    /// Unbind from the surface and release every undrained task.
    /// Returns how many were dropped.
    pub fn close(&self) -> usize {
        let tasks = {
            let mut inner = self.inner.lock();
            inner.waker = None;
            std::mem::take(&mut inner.tasks)
        };
        let dropped = tasks.len();
        if dropped > 0 {
            log::debug!(target: "webview::dispatch", "closing queue, dropping {} task(s)", dropped);
        }
        dropped
    }
}
