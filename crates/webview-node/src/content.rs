//! Initial page content requested before the surface exists.

use webview_sys::{Result, SurfaceOps};

/// The most recent URL or HTML payload requested before Ready.
///
/// Held in a single slot: a newer request replaces the older one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingContent {
    Url(String),
    Html(String),
}

impl PendingContent {
    /// Load this content into a live surface.
    pub fn apply(&self, ops: &dyn SurfaceOps) -> Result<()> {
        match self {
            Self::Url(url) => ops.navigate(url),
            Self::Html(html) => ops.set_html(html),
        }
    }

    /// Short form for log lines; HTML bodies are not logged.
    pub fn describe(&self) -> String {
        match self {
            Self::Url(url) => format!("url {url}"),
            Self::Html(html) => format!("html ({} bytes)", html.len()),
        }
    }
}
