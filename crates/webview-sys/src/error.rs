//! Error types for the native surface layer.

use thiserror::Error;

/// Result type for surface operations.
pub type Result<T> = std::result::Result<T, WebViewError>;

/// Errors that can occur while driving a native surface.
#[derive(Error, Debug)]
pub enum WebViewError {
    /// The webview library failed to load.
    #[error("failed to load webview library: {0}")]
    LibraryLoad(String),

    /// Symbol lookup failed.
    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    /// The native create call returned no handle.
    #[error("webview creation failed: {0}")]
    CreateFailed(String),

    /// A native call reported a non-zero status.
    #[error("{call} failed with code {code}")]
    NativeCall { call: &'static str, code: i32 },

    /// A string argument could not be passed across the C boundary.
    #[error("invalid {0}: contains an interior NUL byte")]
    InvalidString(&'static str),

    /// The surface has already been destroyed.
    #[error("surface has been destroyed")]
    Destroyed,
}
