//! Native webview surface handle.
//!
//! This crate wraps an embedded webview library behind a small, fixed
//! operation set (create, destroy, navigate, set-html, eval, set-title,
//! set-size, dispatch, run) so the lifecycle layer above it never touches
//! raw handles.
//!
//! # Backends
//!
//! - `native` (default feature): the webview C library, loaded at runtime
//!   via `libloading`. Set `WEBVIEW_LIB_PATH` to the library file or its
//!   directory when it is not on the system search path.
//! - headless: an in-process surface without a window, always available.

mod error;
mod headless;
mod surface;

#[cfg(feature = "native")]
mod ffi;

#[cfg(feature = "native")]
mod native;

pub use error::{Result, WebViewError};
pub use headless::{
    CallLog, CreateGate, HeadlessBackend, HeadlessSurface, RecordedCall, SurfaceCall,
    SurfaceControl,
};
pub use surface::{
    NativeSurface, Pump, SizeHint, SurfaceBackend, SurfaceOps, SurfaceOptions, SurfaceWaker,
};

#[cfg(feature = "native")]
pub use native::{NativeBackend, WebviewWindow};
