//! The node facade: what the host and scripts call.

use std::sync::Arc;
use std::time::Duration;

use webview_config::WebViewConfig;
use webview_sys::{SizeHint, SurfaceBackend, SurfaceOptions, WebViewError};

use crate::content::PendingContent;
use crate::dispatch::DispatchTask;
use crate::host::{DeferredCall, EventSink, HostContext, LifecycleHooks, NullSink, WebViewEvent};
use crate::lifecycle::{LifecycleState, Shared};
use crate::owner::{OwnerThread, SessionPlan};

/// Per-node defaults, usually taken from [`WebViewConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSettings {
    pub title: String,
    pub width: i32,
    pub height: i32,
    pub min_width: i32,
    pub min_height: i32,
    pub initial_url: Option<String>,
    pub default_html: String,
    pub debug: bool,
}

impl From<&WebViewConfig> for NodeSettings {
    fn from(config: &WebViewConfig) -> Self {
        Self {
            title: config.window.title.clone(),
            width: config.window.width,
            height: config.window.height,
            min_width: config.window.min_width,
            min_height: config.window.min_height,
            initial_url: config.content.initial_url.clone(),
            default_html: config.content.default_html.clone(),
            debug: config.native.debug,
        }
    }
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self::from(&WebViewConfig::default())
    }
}

/// Builder for [`WebViewNode`].
pub struct WebViewNodeBuilder {
    backend: Arc<dyn SurfaceBackend>,
    host: Arc<dyn HostContext>,
    events: Arc<dyn EventSink>,
    settings: NodeSettings,
}

impl WebViewNodeBuilder {
    pub fn config(mut self, config: &WebViewConfig) -> Self {
        self.settings = NodeSettings::from(config);
        self
    }

    pub fn settings(mut self, settings: NodeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn events(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.settings.initial_url = Some(url.into());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.settings.debug = debug;
        self
    }

    pub fn build(self) -> WebViewNode {
        let settings = self.settings;
        WebViewNode {
            shared: Arc::new(Shared::new()),
            backend: self.backend,
            host: self.host,
            events: self.events,
            url: settings.initial_url.clone().unwrap_or_default(),
            debug: settings.debug,
            size: (settings.width, settings.height),
            settings,
            owner: None,
            activation_deferred: false,
        }
    }
}

/// A host-tree node owning one embedded webview at a time.
///
/// Every method is meant to be called from the host's thread. The native
/// surface lives on a dedicated owner thread; commands reach it through the
/// dispatch queue once the node is Ready, and content requested earlier is
/// kept until then.
pub struct WebViewNode {
    shared: Arc<Shared>,
    backend: Arc<dyn SurfaceBackend>,
    host: Arc<dyn HostContext>,
    events: Arc<dyn EventSink>,
    settings: NodeSettings,
    url: String,
    debug: bool,
    size: (i32, i32),
    owner: Option<OwnerThread>,
    activation_deferred: bool,
}

impl WebViewNode {
    pub fn builder(
        backend: Arc<dyn SurfaceBackend>,
        host: Arc<dyn HostContext>,
    ) -> WebViewNodeBuilder {
        WebViewNodeBuilder {
            backend,
            host,
            events: Arc::new(NullSink),
            settings: NodeSettings::default(),
        }
    }

    pub fn new(backend: Arc<dyn SurfaceBackend>, host: Arc<dyn HostContext>) -> Self {
        Self::builder(backend, host).build()
    }

    // ---- lifecycle -------------------------------------------------------

    /// Start a session unless one is already starting or running.
    ///
    /// Skipped in editor mode. When the node is not yet in the host tree the
    /// activation is retried once through the host's deferred-call queue.
    pub fn activate(&mut self) {
        if self.host.is_editor_hint() {
            log::debug!(target: "webview::lifecycle", "editor mode, not creating a surface");
            return;
        }
        if !self.host.is_inside_tree() {
            if !self.activation_deferred {
                log::debug!(target: "webview::lifecycle", "not in tree yet, deferring activation");
                self.activation_deferred = true;
                self.host.call_deferred(DeferredCall::Activate);
            }
            return;
        }
        self.activation_deferred = false;
        self.start_session();
    }

    fn start_session(&mut self) {
        let state = self.shared.state();
        if state.is_active() {
            return;
        }
        if state == LifecycleState::ShuttingDown {
            log::warn!(target: "webview::lifecycle", "activation ignored while shutting down");
            return;
        }

        // A previous session that ended on its own still has a thread to reap.
        if let Some(owner) = self.owner.take() {
            owner.join();
        }

        {
            let mut session = self.shared.lock();
            if !matches!(
                session.state,
                LifecycleState::Uninitialized | LifecycleState::Closed
            ) {
                return;
            }
            self.shared.clear_stop();
            self.shared.clear_error();
            session.generation += 1;
            self.shared.transition(&mut session, LifecycleState::Starting);
        }

        let fallback = if self.url.is_empty() {
            PendingContent::Html(self.settings.default_html.clone())
        } else {
            PendingContent::Url(self.url.clone())
        };
        let plan = SessionPlan {
            backend: Arc::clone(&self.backend),
            options: SurfaceOptions { debug: self.debug },
            fallback,
            title: self.settings.title.clone(),
            size: self.size,
            events: Arc::clone(&self.events),
        };

        match OwnerThread::spawn(Arc::clone(&self.shared), plan) {
            Ok(owner) => {
                log::debug!(target: "webview::owner", "owner thread {:?} started", owner.id());
                self.owner = Some(owner);
            }
            Err(e) => {
                self.shared
                    .report_error(format!("failed to spawn owner thread: {e}"));
                self.shared.publish_closed();
            }
        }
    }

    /// End the current session and wait for the owner thread to leave.
    ///
    /// Idempotent. The node ends up Closed with no handle; a later
    /// [`activate`](Self::activate) starts a fresh session.
    pub fn teardown(&mut self) {
        self.activation_deferred = false;
        let owner = self.owner.take();
        {
            let mut session = self.shared.lock();
            let state = session.state;
            match state {
                LifecycleState::Starting | LifecycleState::Ready => {
                    self.shared
                        .transition(&mut session, LifecycleState::ShuttingDown);
                }
                LifecycleState::Uninitialized => {
                    self.shared.transition(&mut session, LifecycleState::Closed);
                }
                LifecycleState::ShuttingDown | LifecycleState::Closed => {}
            }
        }

        self.shared.request_stop();
        self.shared.queue.terminate();
        if let Some(owner) = owner {
            owner.join();
        }
        self.shared.queue.close();

        let mut session = self.shared.lock();
        session.pending = None;
        if session.state != LifecycleState::Closed && !session.handle_live {
            self.shared.transition(&mut session, LifecycleState::Closed);
        }
    }

    // ---- content ---------------------------------------------------------

    /// Navigate to `url`, or keep it for the next Ready.
    pub fn load_url(&mut self, url: &str) {
        self.url = url.to_string();

        let mut session = self.shared.lock();
        if session.state.buffers_content() {
            session.pending = Some(PendingContent::Url(url.to_string()));
            return;
        }
        if !session.state.is_ready() {
            return;
        }
        if url.contains('\0') {
            drop(session);
            self.events.emit(WebViewEvent::PageLoadFailed {
                url: url.to_string(),
                error: WebViewError::InvalidString("url").to_string(),
            });
            return;
        }
        let submitted = self.shared.queue.submit(self.navigate_task(url));
        drop(session);
        if submitted {
            self.events.emit(WebViewEvent::PageLoaded {
                url: url.to_string(),
            });
        }
    }

    pub fn navigate(&mut self, url: &str) {
        self.load_url(url);
    }

    pub fn set_url(&mut self, url: &str) {
        self.load_url(url);
    }

    /// The most recently requested URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn navigate_task(&self, url: &str) -> DispatchTask {
        let url = url.to_string();
        let shared = Arc::clone(&self.shared);
        let events = Arc::clone(&self.events);
        DispatchTask::new("navigate", move |ops| {
            if let Err(e) = ops.navigate(&url) {
                shared.report_error(format!("navigate to {url} failed: {e}"));
                events.emit(WebViewEvent::PageLoadFailed {
                    url,
                    error: e.to_string(),
                });
            }
            Ok(())
        })
    }

    /// Replace the page with `html`, or keep it for the next Ready.
    pub fn load_html(&mut self, html: &str) {
        let mut session = self.shared.lock();
        if session.state.buffers_content() {
            session.pending = Some(PendingContent::Html(html.to_string()));
        } else if session.state.is_ready() {
            let html = html.to_string();
            self.shared
                .queue
                .submit(DispatchTask::new("set_html", move |ops| ops.set_html(&html)));
        }
    }

    // ---- script ----------------------------------------------------------

    /// Evaluate `script` in the page. Dropped unless Ready.
    pub fn eval_javascript(&self, script: &str) {
        let session = self.shared.lock();
        if session.state.is_ready() {
            let script = script.to_string();
            self.shared
                .queue
                .submit(DispatchTask::new("eval", move |ops| ops.eval(&script)));
        }
    }

    pub fn go_back(&self) {
        self.eval_javascript("history.back()");
    }

    pub fn go_forward(&self) {
        self.eval_javascript("history.forward()");
    }

    pub fn reload(&self) {
        self.eval_javascript("location.reload()");
    }

    pub fn stop(&self) {
        self.eval_javascript("window.stop()");
    }

    /// Script-to-host bindings are not supported; the call is only logged.
    pub fn bind_function(&self, name: &str) {
        if self.shared.state().is_ready() {
            log::info!(
                target: "webview::lifecycle",
                "bind_function({}) has no effect: bindings are not supported",
                name
            );
        }
    }

    // ---- window ----------------------------------------------------------

    /// Set the native window title and emit `title_changed`. Dropped unless Ready.
    pub fn set_title(&mut self, title: &str) {
        let session = self.shared.lock();
        if !session.state.is_ready() {
            return;
        }
        let owned = title.to_string();
        let submitted = self
            .shared
            .queue
            .submit(DispatchTask::new("set_title", move |ops| ops.set_title(&owned)));
        drop(session);
        if submitted {
            self.events.emit(WebViewEvent::TitleChanged {
                title: title.to_string(),
            });
        }
    }

    /// The native title is never read back.
    pub fn title(&self) -> &str {
        ""
    }

    /// Record the host size and resize the surface when Ready.
    pub fn set_webview_size(&mut self, width: i32, height: i32) {
        self.size = (width, height);
        let session = self.shared.lock();
        if session.state.is_ready() {
            self.shared.queue.submit(DispatchTask::new("set_size", move |ops| {
                ops.set_size(width, height, SizeHint::None)
            }));
        }
    }

    /// The last size known from the host.
    pub fn webview_size(&self) -> (i32, i32) {
        self.size
    }

    pub fn minimum_size(&self) -> (i32, i32) {
        (self.settings.min_width, self.settings.min_height)
    }

    /// Takes effect at the next surface creation.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    // ---- observation -----------------------------------------------------

    pub fn state(&self) -> LifecycleState {
        self.shared.state()
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Whether a native handle currently exists.
    pub fn has_handle(&self) -> bool {
        self.shared.lock().handle_live
    }

    /// The last failure reported by the current or previous session.
    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error()
    }

    /// Wait until no transition is in flight.
    pub fn wait_until_settled(&self, timeout: Duration) -> LifecycleState {
        self.shared.wait_for(timeout, LifecycleState::is_settled)
    }

    pub fn wait_for_state(
        &self,
        timeout: Duration,
        pred: impl Fn(LifecycleState) -> bool,
    ) -> LifecycleState {
        self.shared.wait_for(timeout, pred)
    }
}

impl LifecycleHooks for WebViewNode {
    fn on_ready(&mut self) {
        self.activate();
    }

    fn on_attach(&mut self) {
        self.activate();
    }

    fn on_detach(&mut self) {
        self.teardown();
    }

    fn on_resize(&mut self, width: i32, height: i32) {
        self.set_webview_size(width, height);
    }

    fn on_deferred(&mut self, call: DeferredCall) {
        match call {
            DeferredCall::Activate => {
                // Teardown since the deferral was queued cancels it.
                if !std::mem::take(&mut self.activation_deferred) {
                    log::debug!(target: "webview::lifecycle", "deferred activation was cancelled");
                    return;
                }
                if self.host.is_inside_tree() {
                    self.activate();
                } else {
                    log::warn!(
                        target: "webview::lifecycle",
                        "still not in tree after deferral, activation abandoned"
                    );
                }
            }
        }
    }
}

impl Drop for WebViewNode {
    fn drop(&mut self) {
        self.teardown();
    }
}
