//! The thread that owns one native surface for one session.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use webview_sys::{NativeSurface, Pump, SizeHint, SurfaceBackend, SurfaceOps, SurfaceOptions};

use crate::content::PendingContent;
use crate::host::{EventSink, WebViewEvent};
use crate::lifecycle::{LifecycleState, Shared};

/// Everything the owner thread needs to build and configure one surface.
pub(crate) struct SessionPlan {
    pub backend: Arc<dyn SurfaceBackend>,
    pub options: SurfaceOptions,
    /// Applied when nothing was requested before Ready.
    pub fallback: PendingContent,
    pub title: String,
    pub size: (i32, i32),
    pub events: Arc<dyn EventSink>,
}

pub(crate) struct OwnerThread {
    handle: JoinHandle<()>,
}

impl OwnerThread {
    pub fn spawn(shared: Arc<Shared>, plan: SessionPlan) -> io::Result<Self> {
        let handle = thread::Builder::new()
            .name("webview-owner".to_string())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| run_session(&shared, plan)));
                if outcome.is_err() {
                    shared.report_error("owner thread panicked");
                    shared.begin_shutdown();
                    shared.publish_closed();
                }
            })?;
        Ok(Self { handle })
    }

    pub fn id(&self) -> ThreadId {
        self.handle.thread().id()
    }

    /// Block until the thread has left. Joining from the thread itself is
    /// refused and the thread is left to finish on its own.
    pub fn join(self) {
        if self.id() == thread::current().id() {
            log::warn!(
                target: "webview::owner",
                "teardown requested from the owner thread; not joining"
            );
            return;
        }
        if self.handle.join().is_err() {
            log::error!(target: "webview::owner", "owner thread terminated abnormally");
        }
    }
}

fn run_session(shared: &Arc<Shared>, plan: SessionPlan) {
    let SessionPlan {
        backend,
        options,
        fallback,
        title,
        size,
        events,
    } = plan;

    let pump_shared = Arc::clone(shared);
    let pump: Pump = Arc::new(move |ops: &dyn SurfaceOps| {
        pump_shared.queue.drain(ops);
    });

    log::debug!(
        target: "webview::owner",
        "creating {} surface (debug: {})",
        backend.name(),
        options.debug
    );
    let mut surface = match backend.create(&options, pump) {
        Ok(surface) => surface,
        Err(e) => {
            shared.report_error(e.to_string());
            shared.publish_closed();
            return;
        }
    };

    let pending = {
        let mut session = shared.lock();
        session.handle_live = true;
        if shared.stop_requested() || session.state != LifecycleState::Starting {
            None
        } else {
            shared.transition(&mut session, LifecycleState::Ready);
            shared.queue.open(surface.waker());
            Some(session.pending.take())
        }
    };

    let Some(pending) = pending else {
        log::info!(target: "webview::owner", "stop requested during creation");
        finish(shared, surface);
        return;
    };

    let content = pending.unwrap_or(fallback);
    apply_content(shared, surface.ops(), &content, events.as_ref());

    if let Err(e) = surface.set_title(&title) {
        log::warn!(target: "webview::owner", "applying title failed: {}", e);
    }
    let (width, height) = size;
    if let Err(e) = surface.set_size(width, height, SizeHint::None) {
        log::warn!(target: "webview::owner", "applying size failed: {}", e);
    }

    if shared.stop_requested() {
        log::debug!(target: "webview::owner", "stop already requested, skipping run-loop");
    } else {
        match surface.run() {
            Ok(()) => log::debug!(target: "webview::owner", "run-loop returned"),
            Err(e) => shared.report_error(format!("run-loop failed: {e}")),
        }
    }

    finish(shared, surface);
}

fn apply_content(
    shared: &Shared,
    ops: &dyn SurfaceOps,
    content: &PendingContent,
    events: &dyn EventSink,
) {
    log::debug!(target: "webview::owner", "applying initial {}", content.describe());
    match (content.apply(ops), content) {
        (Ok(()), PendingContent::Url(url)) => events.emit(WebViewEvent::PageLoaded { url: url.clone() }),
        (Ok(()), PendingContent::Html(_)) => {}
        (Err(e), PendingContent::Url(url)) => {
            shared.report_error(format!("navigate to {url} failed: {e}"));
            events.emit(WebViewEvent::PageLoadFailed {
                url: url.clone(),
                error: e.to_string(),
            });
        }
        (Err(e), PendingContent::Html(_)) => {
            shared.report_error(format!("loading initial html failed: {e}"));
        }
    }
}

fn finish(shared: &Shared, mut surface: Box<dyn NativeSurface>) {
    let dropped = shared.begin_shutdown();
    if dropped > 0 {
        log::info!(target: "webview::owner", "released {} undrained task(s)", dropped);
    }
    surface.destroy();
    drop(surface);
    shared.publish_closed();
}
