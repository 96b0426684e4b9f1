//! Cross-thread lifecycle and dispatch for an embedded webview.
//!
//! A [`WebViewNode`] is driven by its host framework through
//! [`LifecycleHooks`]. On activation it starts an owner thread that creates
//! the native surface, publishes [`LifecycleState::Ready`], applies the
//! initial content and blocks in the surface's run-loop. Facade calls made
//! from the host thread are either marshaled to the owner thread through a
//! Rust-side dispatch queue or, before Ready, kept as [`PendingContent`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use webview_node::{DeferredCall, HeadlessBackend, HostContext, WebViewNode};
//!
//! struct Attached;
//!
//! impl HostContext for Attached {
//!     fn is_inside_tree(&self) -> bool {
//!         true
//!     }
//!     fn call_deferred(&self, _call: DeferredCall) {}
//! }
//!
//! let mut node = WebViewNode::new(Arc::new(HeadlessBackend::new()), Arc::new(Attached));
//! node.load_url("https://example.com");
//! node.activate();
//! node.teardown();
//! ```

mod content;
mod dispatch;
mod host;
mod lifecycle;
mod node;
mod owner;

pub use content::PendingContent;
pub use host::{
    DeferredCall, EventSink, HostContext, LifecycleHooks, NullSink, WebViewEvent,
};
pub use lifecycle::LifecycleState;
pub use node::{NodeSettings, WebViewNode, WebViewNodeBuilder};

pub use webview_sys::{
    CallLog, CreateGate, HeadlessBackend, NativeSurface, Pump, RecordedCall, SizeHint,
    SurfaceBackend, SurfaceCall, SurfaceControl, SurfaceOps, SurfaceOptions, SurfaceWaker,
    WebViewError,
};

#[cfg(feature = "native")]
pub use webview_sys::NativeBackend;
