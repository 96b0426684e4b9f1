//! The operation set every native webview surface exposes.
//!
//! A surface is split along thread-safety lines:
//!
//! - [`SurfaceOps`] and [`NativeSurface`] may only be used on the thread that
//!   created the surface (its owner thread).
//! - [`SurfaceWaker`] is `Send + Sync` and is the only piece that other
//!   threads may touch. It carries no data: it asks the owner thread to run
//!   the surface's [`Pump`] at the next loop turn, or to leave its run-loop.

use std::sync::Arc;

use crate::error::Result;

/// Size constraint passed along with `set_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum SizeHint {
    /// Width and height are the default size.
    #[default]
    None = 0,
    /// Width and height are the minimum bounds.
    Min = 1,
    /// Width and height are the maximum bounds.
    Max = 2,
    /// The window cannot be resized by the user.
    Fixed = 3,
}

/// Options fixed at creation time for one surface instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceOptions {
    /// Enable developer tools in the native view.
    pub debug: bool,
}

/// Content and window operations. Owner thread only.
pub trait SurfaceOps {
    /// Navigate to a URL.
    fn navigate(&self, url: &str) -> Result<()>;

    /// Replace the page with inline HTML.
    fn set_html(&self, html: &str) -> Result<()>;

    /// Evaluate JavaScript in the current page. The result is discarded.
    fn eval(&self, script: &str) -> Result<()>;

    /// Set the native window title.
    fn set_title(&self, title: &str) -> Result<()>;

    /// Resize the native window.
    fn set_size(&self, width: i32, height: i32, hint: SizeHint) -> Result<()>;
}

/// Callback run on the owner thread every time the surface is woken.
pub type Pump = Arc<dyn Fn(&dyn SurfaceOps) + Send + Sync>;

/// Thread-safe signals into a surface's run-loop.
pub trait SurfaceWaker: Send + Sync {
    /// Schedule one invocation of the surface's pump on the owner thread.
    fn wake(&self) -> Result<()>;

    /// Make a blocking [`NativeSurface::run`] return.
    fn terminate(&self) -> Result<()>;
}

/// A live native surface, owned by the thread that created it.
pub trait NativeSurface: SurfaceOps {
    /// Cross-thread signalling handle for this surface.
    fn waker(&self) -> Arc<dyn SurfaceWaker>;

    /// Block in the native event loop until the surface closes or is terminated.
    fn run(&mut self) -> Result<()>;

    /// Release the native handle. Idempotent.
    fn destroy(&mut self);

    /// True once [`destroy`](Self::destroy) has run.
    fn is_destroyed(&self) -> bool;

    /// The content operations of this surface.
    fn ops(&self) -> &dyn SurfaceOps;
}

/// Factory for native surfaces.
///
/// `create` is called on the thread that will own the surface. The `pump`
/// is invoked on that thread whenever a [`SurfaceWaker::wake`] is delivered.
pub trait SurfaceBackend: Send + Sync {
    /// Short backend name for diagnostics.
    fn name(&self) -> &str;

    /// Create a new surface.
    fn create(&self, options: &SurfaceOptions, pump: Pump) -> Result<Box<dyn NativeSurface>>;
}
