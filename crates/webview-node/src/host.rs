//! The contract between a node and the framework that hosts it.

use std::fmt;

/// Queries and services the node needs from its host.
pub trait HostContext: Send + Sync {
    /// Whether the node is currently part of the host's tree.
    fn is_inside_tree(&self) -> bool;

    /// Whether the host is running its editor rather than the application.
    fn is_editor_hint(&self) -> bool {
        false
    }

    /// Ask the host to call back into the node at a later point on its own
    /// thread, through [`LifecycleHooks::on_deferred`].
    fn call_deferred(&self, call: DeferredCall);
}

/// Work the node asks its host to schedule later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredCall {
    /// Retry activation once the node is attached.
    Activate,
}

/// Notifications emitted to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebViewEvent {
    PageLoaded { url: String },
    PageLoadFailed { url: String, error: String },
    TitleChanged { title: String },
}

impl fmt::Display for WebViewEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageLoaded { url } => write!(f, "page_loaded({url})"),
            Self::PageLoadFailed { url, error } => write!(f, "page_load_failed({url}, {error})"),
            Self::TitleChanged { title } => write!(f, "title_changed({title})"),
        }
    }
}

/// Receiver of [`WebViewEvent`]s. Called from the caller thread or the owner
/// thread, never while the node holds a lock.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: WebViewEvent);
}

impl<F> EventSink for F
where
    F: Fn(WebViewEvent) + Send + Sync,
{
    fn emit(&self, event: WebViewEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: WebViewEvent) {}
}

/// Entry points the host calls as the node moves through its tree.
pub trait LifecycleHooks {
    /// The node entered the tree and is ready.
    fn on_ready(&mut self);

    /// The node was attached to a new parent surface.
    fn on_attach(&mut self);

    /// The node is leaving the tree.
    fn on_detach(&mut self);

    /// The host resized the node.
    fn on_resize(&mut self, width: i32, height: i32);

    /// A call scheduled through [`HostContext::call_deferred`] is due.
    fn on_deferred(&mut self, call: DeferredCall);
}
