#![allow(dead_code)]

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use webview_node::{
    DeferredCall, EventSink, HeadlessBackend, HostContext, RecordedCall, SurfaceCall,
    WebViewEvent, WebViewNode, WebViewNodeBuilder,
};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Host whose tree membership and editor mode can be flipped by the test.
#[derive(Default)]
pub struct TestHost {
    pub detached: AtomicBool,
    pub editor: AtomicBool,
    pub deferred: Mutex<Vec<DeferredCall>>,
}

impl TestHost {
    pub fn attached() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn detached() -> Arc<Self> {
        let host = Self::default();
        host.detached.store(true, Ordering::SeqCst);
        Arc::new(host)
    }

    pub fn editor() -> Arc<Self> {
        let host = Self::default();
        host.editor.store(true, Ordering::SeqCst);
        Arc::new(host)
    }

    pub fn attach(&self) {
        self.detached.store(false, Ordering::SeqCst);
    }

    pub fn deferred_calls(&self) -> Vec<DeferredCall> {
        self.deferred.lock().clone()
    }
}

impl HostContext for TestHost {
    fn is_inside_tree(&self) -> bool {
        !self.detached.load(Ordering::SeqCst)
    }

    fn is_editor_hint(&self) -> bool {
        self.editor.load(Ordering::SeqCst)
    }

    fn call_deferred(&self, call: DeferredCall) {
        self.deferred.lock().push(call);
    }
}

/// Collects emitted events and lets tests wait for them.
#[derive(Clone, Default)]
pub struct RecordingSink {
    inner: Arc<(Mutex<Vec<WebViewEvent>>, Condvar)>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<WebViewEvent> {
        self.inner.0.lock().clone()
    }

    pub fn wait_until(&self, pred: impl Fn(&[WebViewEvent]) -> bool) -> bool {
        let (events, changed) = &*self.inner;
        let deadline = Instant::now() + TIMEOUT;
        let mut guard = events.lock();
        while !pred(&guard) {
            if changed.wait_until(&mut guard, deadline).timed_out() {
                return pred(&guard);
            }
        }
        true
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: WebViewEvent) {
        let (events, changed) = &*self.inner;
        events.lock().push(event);
        changed.notify_all();
    }
}

pub fn page_loaded(url: &str) -> WebViewEvent {
    WebViewEvent::PageLoaded {
        url: url.to_string(),
    }
}

pub fn count_events(events: &[WebViewEvent], wanted: &WebViewEvent) -> usize {
    events.iter().filter(|e| *e == wanted).count()
}

pub fn node_builder(
    backend: &Arc<HeadlessBackend>,
    host: &Arc<TestHost>,
    sink: &RecordingSink,
) -> WebViewNodeBuilder {
    WebViewNode::builder(backend.clone(), host.clone()).events(Arc::new(sink.clone()))
}

/// Block until the surface has entered its run-loop.
pub fn wait_for_run(backend: &HeadlessBackend, runs: usize) -> bool {
    backend.log().wait_until(TIMEOUT, |calls| {
        calls.iter().filter(|r| r.call == SurfaceCall::Run).count() >= runs
    })
}

pub fn wait_for_call(backend: &HeadlessBackend, call: SurfaceCall) -> bool {
    backend
        .log()
        .wait_until(TIMEOUT, |calls| calls.iter().any(|r| r.call == call))
}

pub fn navigations(records: &[RecordedCall]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| match &r.call {
            SurfaceCall::Navigate(url) => Some(url.clone()),
            _ => None,
        })
        .collect()
}
