//! Lifecycle state shared between the caller thread and the owner thread.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::content::PendingContent;
use crate::dispatch::DispatchQueue;

/// Where a node is in its surface lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// No session has started yet.
    #[default]
    Uninitialized,
    /// The owner thread is creating the native surface.
    Starting,
    /// The surface exists and accepts commands.
    Ready,
    /// Teardown was requested; the owner thread is winding down.
    ShuttingDown,
    /// The session is over and the surface is gone.
    Closed,
}

impl LifecycleState {
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }

    /// Starting or Ready: a session is in progress and not winding down.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Ready)
    }

    /// Content requests in these states are kept for the next Ready.
    pub fn buffers_content(self) -> bool {
        matches!(self, Self::Uninitialized | Self::Starting)
    }

    /// No transition is in flight.
    pub fn is_settled(self) -> bool {
        !matches!(self, Self::Starting | Self::ShuttingDown)
    }

    /// Whether `self -> to` is a legal transition.
    pub fn can_transition_to(self, to: Self) -> bool {
        use LifecycleState::*;
        matches!(
            (self, to),
            (Uninitialized, Starting)
                | (Uninitialized, Closed)
                | (Closed, Starting)
                | (Starting, Ready)
                | (Starting, ShuttingDown)
                | (Starting, Closed)
                | (Ready, ShuttingDown)
                | (ShuttingDown, Closed)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::ShuttingDown => "shutting-down",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// State guarded by the session lock.
///
/// `state` and `pending` live under one mutex so that publishing Ready and
/// taking the pending content happen in one critical section.
#[derive(Debug, Default)]
pub(crate) struct Session {
    pub state: LifecycleState,
    pub pending: Option<PendingContent>,
    pub handle_live: bool,
    /// Incremented each time a session starts.
    pub generation: u64,
}

/// Everything the caller thread and the owner thread share.
pub(crate) struct Shared {
    session: Mutex<Session>,
    changed: Condvar,
    stop: AtomicBool,
    last_error: Mutex<Option<String>>,
    pub queue: DispatchQueue,
}

impl Shared {
    pub fn new() -> Self {
        Self {
            session: Mutex::new(Session::default()),
            changed: Condvar::new(),
            stop: AtomicBool::new(false),
            last_error: Mutex::new(None),
            queue: DispatchQueue::new(),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock()
    }

    pub fn state(&self) -> LifecycleState {
        self.session.lock().state
    }

    /// Move the session to `to`, waking anyone waiting on a state change.
    ///
    /// Re-entering the current state is a no-op. Illegal transitions are
    /// logged and refused.
    pub fn transition(&self, session: &mut Session, to: LifecycleState) -> bool {
        let from = session.state;
        if from == to {
            return true;
        }
        if !from.can_transition_to(to) {
            log::warn!(
                target: "webview::lifecycle",
                "refusing transition {} -> {}",
                from,
                to
            );
            return false;
        }
        session.state = to;
        log::info!(
            target: "webview::lifecycle",
            "session {}: {} -> {}",
            session.generation,
            from,
            to
        );
        self.changed.notify_all();
        true
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn clear_stop(&self) {
        self.stop.store(false, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Record a failure for later inspection and log it.
    pub fn report_error(&self, message: impl Into<String>) {
        let message = message.into();
        log::error!(target: "webview::lifecycle", "{}", message);
        *self.last_error.lock() = Some(message);
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn clear_error(&self) {
        self.last_error.lock().take();
    }

    /// Leave Ready and release every task that has not run yet.
    pub fn begin_shutdown(&self) -> usize {
        {
            let mut session = self.lock();
            if session.state == LifecycleState::Ready {
                self.transition(&mut session, LifecycleState::ShuttingDown);
            }
        }
        self.queue.close()
    }

    /// The handle is gone; the session is over.
    pub fn publish_closed(&self) {
        let mut session = self.lock();
        session.handle_live = false;
        if session.state == LifecycleState::Ready {
            self.transition(&mut session, LifecycleState::ShuttingDown);
        }
        self.transition(&mut session, LifecycleState::Closed);
    }

    /// Wait until `pred` holds for the current state or `timeout` passes.
    /// Returns the state observed last. A timeout too large to represent
    /// waits without a deadline.
    pub fn wait_for(
        &self,
        timeout: Duration,
        pred: impl Fn(LifecycleState) -> bool,
    ) -> LifecycleState {
        let deadline = Instant::now().checked_add(timeout);
        let mut session = self.session.lock();
        while !pred(session.state) {
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut session, deadline).timed_out() {
                        break;
                    }
                }
                None => self.changed.wait(&mut session),
            }
        }
        session.state
    }
}
