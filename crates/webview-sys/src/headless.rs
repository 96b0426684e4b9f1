//! In-process surface with no window.
//!
//! The run-loop is a channel: wakes run the pump, terminate and close make
//! `run` return. Every operation is recorded together with the thread that
//! performed it, which makes the backend useful for tests and for hosts that
//! want to drive the lifecycle without a display.

use crate::error::{Result, WebViewError};
use crate::surface::{
    NativeSurface, Pump, SizeHint, SurfaceBackend, SurfaceOps, SurfaceOptions, SurfaceWaker,
};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// A call made against a headless surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    Create { debug: bool },
    Navigate(String),
    SetHtml(String),
    Eval(String),
    SetTitle(String),
    SetSize { width: i32, height: i32, hint: SizeHint },
    Run,
    Destroy,
}

/// A recorded call and the thread it ran on.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub surface: usize,
    pub call: SurfaceCall,
    pub thread: ThreadId,
}

/// Shared, waitable record of surface calls.
#[derive(Clone, Default)]
pub struct CallLog {
    inner: Arc<(Mutex<Vec<RecordedCall>>, Condvar)>,
}

impl CallLog {
    fn push(&self, surface: usize, call: SurfaceCall) {
        let (calls, changed) = &*self.inner;
        calls.lock().push(RecordedCall {
            surface,
            call,
            thread: thread::current().id(),
        });
        changed.notify_all();
    }

    /// Snapshot of every recorded call.
    pub fn records(&self) -> Vec<RecordedCall> {
        self.inner.0.lock().clone()
    }

    /// Snapshot of the calls alone.
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.inner.0.lock().iter().map(|r| r.call.clone()).collect()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&SurfaceCall) -> bool) -> usize {
        self.inner.0.lock().iter().filter(|r| pred(&r.call)).count()
    }

    /// Block until `pred` holds for the recorded calls, or the timeout passes.
    pub fn wait_until(&self, timeout: Duration, pred: impl Fn(&[RecordedCall]) -> bool) -> bool {
        let (calls, changed) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut guard = calls.lock();
        while !pred(&guard) {
            if changed.wait_until(&mut guard, deadline).timed_out() {
                return pred(&guard);
            }
        }
        true
    }
}

/// Holds `create` open until released.
#[derive(Clone, Default)]
pub struct CreateGate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CreateGate {
    /// Let pending and future `create` calls proceed.
    pub fn release(&self) {
        let (open, changed) = &*self.inner;
        *open.lock() = true;
        changed.notify_all();
    }

    fn wait(&self) {
        let (open, changed) = &*self.inner;
        let mut guard = open.lock();
        while !*guard {
            changed.wait(&mut guard);
        }
    }
}

enum Signal {
    Wake,
    Terminate,
    Close,
}

/// Handle to the run-loop of one headless surface, usable from any thread.
#[derive(Clone)]
pub struct SurfaceControl {
    id: usize,
    sender: Arc<Mutex<Option<Sender<Signal>>>>,
}

impl SurfaceControl {
    /// Identifier matching [`RecordedCall::surface`].
    pub fn id(&self) -> usize {
        self.id
    }

    /// Simulate the user closing the window.
    pub fn close(&self) -> bool {
        self.send(Signal::Close).is_ok()
    }

    fn send(&self, signal: Signal) -> Result<()> {
        let sender = self.sender.lock();
        let sender = sender.as_ref().ok_or(WebViewError::Destroyed)?;
        sender.send(signal).map_err(|_| WebViewError::Destroyed)
    }
}

impl SurfaceWaker for SurfaceControl {
    fn wake(&self) -> Result<()> {
        self.send(Signal::Wake)
    }

    fn terminate(&self) -> Result<()> {
        self.send(Signal::Terminate)
    }
}

/// Backend producing [`HeadlessSurface`]s.
#[derive(Default)]
pub struct HeadlessBackend {
    log: CallLog,
    fail_create: AtomicBool,
    fail_navigate: Mutex<Option<String>>,
    gate: Option<CreateGate>,
    created: AtomicUsize,
    live: Arc<AtomicUsize>,
    controls: Mutex<Vec<SurfaceControl>>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose `create` blocks until the returned gate is released.
    pub fn gated() -> (Self, CreateGate) {
        let gate = CreateGate::default();
        let backend = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (backend, gate)
    }

    /// Make every subsequent `create` fail as if the native call returned null.
    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Make `navigate` fail for URLs containing `pattern`.
    pub fn fail_navigate_matching(&self, pattern: impl Into<String>) {
        *self.fail_navigate.lock() = Some(pattern.into());
    }

    /// Calls recorded across every surface of this backend.
    pub fn log(&self) -> &CallLog {
        &self.log
    }

    /// Number of surfaces successfully created.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Number of surfaces created and not yet destroyed.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Control of the most recently created surface.
    pub fn last_surface(&self) -> Option<SurfaceControl> {
        self.controls.lock().last().cloned()
    }
}

impl SurfaceBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn create(&self, options: &SurfaceOptions, pump: Pump) -> Result<Box<dyn NativeSurface>> {
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(WebViewError::CreateFailed(
                "headless create disabled".to_string(),
            ));
        }

        let id = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        self.live.fetch_add(1, Ordering::SeqCst);
        self.log.push(id, SurfaceCall::Create { debug: options.debug });

        let (sender, receiver) = mpsc::channel();
        let control = SurfaceControl {
            id,
            sender: Arc::new(Mutex::new(Some(sender))),
        };
        self.controls.lock().push(control.clone());

        Ok(Box::new(HeadlessSurface {
            id,
            log: self.log.clone(),
            fail_navigate: self.fail_navigate.lock().clone(),
            control,
            receiver,
            pump,
            live: Arc::clone(&self.live),
            destroyed: false,
        }))
    }
}

/// A surface without a window.
pub struct HeadlessSurface {
    id: usize,
    log: CallLog,
    fail_navigate: Option<String>,
    control: SurfaceControl,
    receiver: Receiver<Signal>,
    pump: Pump,
    live: Arc<AtomicUsize>,
    destroyed: bool,
}

impl HeadlessSurface {
    fn record(&self, call: SurfaceCall) -> Result<()> {
        if self.destroyed {
            return Err(WebViewError::Destroyed);
        }
        self.log.push(self.id, call);
        Ok(())
    }
}

impl SurfaceOps for HeadlessSurface {
    fn navigate(&self, url: &str) -> Result<()> {
        if self
            .fail_navigate
            .as_deref()
            .is_some_and(|pattern| url.contains(pattern))
        {
            return Err(WebViewError::NativeCall {
                call: "webview_navigate",
                code: -1,
            });
        }
        self.record(SurfaceCall::Navigate(url.to_string()))
    }

    fn set_html(&self, html: &str) -> Result<()> {
        self.record(SurfaceCall::SetHtml(html.to_string()))
    }

    fn eval(&self, script: &str) -> Result<()> {
        self.record(SurfaceCall::Eval(script.to_string()))
    }

    fn set_title(&self, title: &str) -> Result<()> {
        self.record(SurfaceCall::SetTitle(title.to_string()))
    }

    fn set_size(&self, width: i32, height: i32, hint: SizeHint) -> Result<()> {
        self.record(SurfaceCall::SetSize { width, height, hint })
    }
}

impl NativeSurface for HeadlessSurface {
    fn waker(&self) -> Arc<dyn SurfaceWaker> {
        Arc::new(self.control.clone())
    }

    fn run(&mut self) -> Result<()> {
        self.record(SurfaceCall::Run)?;
        while let Ok(signal) = self.receiver.recv() {
            match signal {
                Signal::Wake => {
                    let ops: &dyn SurfaceOps = &*self;
                    (self.pump)(ops)
                }
                Signal::Terminate | Signal::Close => break,
            }
        }
        Ok(())
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.control.sender.lock().take();
        self.log.push(self.id, SurfaceCall::Destroy);
        self.destroyed = true;
        self.live.fetch_sub(1, Ordering::SeqCst);
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn ops(&self) -> &dyn SurfaceOps {
        self
    }
}

impl Drop for HeadlessSurface {
    fn drop(&mut self) {
        self.destroy();
    }
}
