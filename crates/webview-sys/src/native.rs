//! Surface backed by the dynamically loaded webview C library.

use crate::error::{Result, WebViewError};
use crate::ffi::{self, webview_t, WebviewLibrary};
use crate::surface::{
    NativeSurface, Pump, SizeHint, SurfaceBackend, SurfaceOps, SurfaceOptions, SurfaceWaker,
};
use parking_lot::RwLock;
use std::ffi::{c_void, CString};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::ptr;
use std::sync::Arc;

/// Raw handle that may be moved to the waker.
///
/// The C library documents `webview_dispatch` and `webview_terminate` as
/// callable from any thread; every other call stays on the owner thread.
#[derive(Debug, Clone, Copy)]
struct RawWebview(webview_t);

unsafe impl Send for RawWebview {}
unsafe impl Sync for RawWebview {}

/// Shared slot holding the handle while it is alive.
type HandleSlot = Arc<RwLock<Option<RawWebview>>>;

fn c_string(what: &'static str, value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| WebViewError::InvalidString(what))
}

/// Backend creating windows through the webview C library.
#[derive(Debug, Clone, Default)]
pub struct NativeBackend {
    library_path: Option<PathBuf>,
}

impl NativeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the library from an explicit file or directory.
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }
}

impl SurfaceBackend for NativeBackend {
    fn name(&self) -> &str {
        "native"
    }

    fn create(&self, options: &SurfaceOptions, pump: Pump) -> Result<Box<dyn NativeSurface>> {
        let library = ffi::get_webview_library(self.library_path.as_deref())?;
        let window = WebviewWindow::create(library, options, pump)?;
        Ok(Box::new(window))
    }
}

/// Borrowed view of a live handle, used inside dispatch callbacks.
struct WebviewRef<'a> {
    library: &'a WebviewLibrary,
    raw: webview_t,
}

impl SurfaceOps for WebviewRef<'_> {
    fn navigate(&self, url: &str) -> Result<()> {
        let url_c = c_string("url", url)?;
        ffi::check("webview_navigate", unsafe {
            (self.library.webview_navigate)(self.raw, url_c.as_ptr())
        })
    }

    fn set_html(&self, html: &str) -> Result<()> {
        let html_c = c_string("html", html)?;
        ffi::check("webview_set_html", unsafe {
            (self.library.webview_set_html)(self.raw, html_c.as_ptr())
        })
    }

    fn eval(&self, script: &str) -> Result<()> {
        let script_c = c_string("script", script)?;
        ffi::check("webview_eval", unsafe {
            (self.library.webview_eval)(self.raw, script_c.as_ptr())
        })
    }

    fn set_title(&self, title: &str) -> Result<()> {
        let title_c = c_string("title", title)?;
        ffi::check("webview_set_title", unsafe {
            (self.library.webview_set_title)(self.raw, title_c.as_ptr())
        })
    }

    fn set_size(&self, width: i32, height: i32, hint: SizeHint) -> Result<()> {
        ffi::check("webview_set_size", unsafe {
            (self.library.webview_set_size)(self.raw, width, height, hint as i32)
        })
    }
}

/// Context handed to `webview_dispatch` as its `arg`.
///
/// Boxed by the window so its address is stable for the window's lifetime;
/// callbacks only run inside `webview_run`, which the window outlives.
struct PumpContext {
    library: Arc<WebviewLibrary>,
    pump: Pump,
}

unsafe extern "C" fn pump_trampoline(raw: webview_t, arg: *mut c_void) {
    if arg.is_null() || raw.is_null() {
        return;
    }
    let context = unsafe { &*(arg as *const PumpContext) };
    let view = WebviewRef {
        library: &context.library,
        raw,
    };
    let ops: &dyn SurfaceOps = &view;
    // Unwinding across the C frame would abort the process.
    if panic::catch_unwind(AssertUnwindSafe(|| (context.pump)(ops))).is_err() {
        log::error!(target: "webview::native", "dispatch pump panicked");
    }
}

/// One native webview window.
pub struct WebviewWindow {
    library: Arc<WebviewLibrary>,
    handle: HandleSlot,
    context: Box<PumpContext>,
}

impl WebviewWindow {
    fn create(library: Arc<WebviewLibrary>, options: &SurfaceOptions, pump: Pump) -> Result<Self> {
        let raw = unsafe { (library.webview_create)(options.debug as i32, ptr::null_mut()) };
        if raw.is_null() {
            return Err(WebViewError::CreateFailed(
                "webview_create returned null".to_string(),
            ));
        }
        log::debug!(target: "webview::native", "webview_create -> {:p}", raw);

        Ok(Self {
            context: Box::new(PumpContext {
                library: Arc::clone(&library),
                pump,
            }),
            library,
            handle: Arc::new(RwLock::new(Some(RawWebview(raw)))),
        })
    }

    fn with_ref<T>(&self, f: impl FnOnce(&WebviewRef<'_>) -> Result<T>) -> Result<T> {
        let raw = (*self.handle.read()).ok_or(WebViewError::Destroyed)?;
        f(&WebviewRef {
            library: &self.library,
            raw: raw.0,
        })
    }
}

impl SurfaceOps for WebviewWindow {
    fn navigate(&self, url: &str) -> Result<()> {
        self.with_ref(|view| view.navigate(url))
    }

    fn set_html(&self, html: &str) -> Result<()> {
        self.with_ref(|view| view.set_html(html))
    }

    fn eval(&self, script: &str) -> Result<()> {
        self.with_ref(|view| view.eval(script))
    }

    fn set_title(&self, title: &str) -> Result<()> {
        self.with_ref(|view| view.set_title(title))
    }

    fn set_size(&self, width: i32, height: i32, hint: SizeHint) -> Result<()> {
        self.with_ref(|view| view.set_size(width, height, hint))
    }
}

impl NativeSurface for WebviewWindow {
    fn waker(&self) -> Arc<dyn SurfaceWaker> {
        Arc::new(WebviewWaker {
            library: Arc::clone(&self.library),
            handle: Arc::clone(&self.handle),
            context: &*self.context as *const PumpContext as usize,
        })
    }

    fn run(&mut self) -> Result<()> {
        let raw = (*self.handle.read()).ok_or(WebViewError::Destroyed)?;
        ffi::check("webview_run", unsafe { (self.library.webview_run)(raw.0) })
    }

    fn destroy(&mut self) {
        // Taking the write lock waits out any waker call in flight.
        let Some(raw) = self.handle.write().take() else {
            return;
        };
        let code = unsafe { (self.library.webview_destroy)(raw.0) };
        if let Err(e) = ffi::check("webview_destroy", code) {
            log::warn!(target: "webview::native", "{}", e);
        }
    }

    fn is_destroyed(&self) -> bool {
        self.handle.read().is_none()
    }

    fn ops(&self) -> &dyn SurfaceOps {
        self
    }
}

impl Drop for WebviewWindow {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Cross-thread signalling for a [`WebviewWindow`].
struct WebviewWaker {
    library: Arc<WebviewLibrary>,
    handle: HandleSlot,
    /// Address of the window's boxed `PumpContext`.
    context: usize,
}

impl SurfaceWaker for WebviewWaker {
    fn wake(&self) -> Result<()> {
        let guard = self.handle.read();
        let raw = (*guard).ok_or(WebViewError::Destroyed)?;
        ffi::check("webview_dispatch", unsafe {
            (self.library.webview_dispatch)(raw.0, pump_trampoline, self.context as *mut c_void)
        })
    }

    fn terminate(&self) -> Result<()> {
        let guard = self.handle.read();
        let raw = (*guard).ok_or(WebViewError::Destroyed)?;
        ffi::check("webview_terminate", unsafe {
            (self.library.webview_terminate)(raw.0)
        })
    }
}
