//! FFI bindings to the webview C library (`webview/api.h`).
//!
//! The library is expected to be provided as a dynamic library
//! (`libwebview.so`, `libwebview.dylib` or `webview.dll`) and is loaded
//! at runtime, so nothing links against it at build time.

use crate::error::{Result, WebViewError};
use libloading::{Library, Symbol};
use std::ffi::{c_char, c_int, c_void};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

#[allow(non_camel_case_types)]
pub type webview_t = *mut c_void;

/// Callback signature accepted by `webview_dispatch`.
pub type WebviewDispatchCallback = unsafe extern "C" fn(webview_t, *mut c_void);

/// `WEBVIEW_ERROR_OK`
pub const WEBVIEW_ERROR_OK: c_int = 0;

type WebviewCreateFn = unsafe extern "C" fn(c_int, *mut c_void) -> webview_t;
type WebviewDestroyFn = unsafe extern "C" fn(webview_t) -> c_int;
type WebviewRunFn = unsafe extern "C" fn(webview_t) -> c_int;
type WebviewTerminateFn = unsafe extern "C" fn(webview_t) -> c_int;
type WebviewDispatchFn =
    unsafe extern "C" fn(webview_t, WebviewDispatchCallback, *mut c_void) -> c_int;
type WebviewSetTitleFn = unsafe extern "C" fn(webview_t, *const c_char) -> c_int;
type WebviewSetSizeFn = unsafe extern "C" fn(webview_t, c_int, c_int, c_int) -> c_int;
type WebviewNavigateFn = unsafe extern "C" fn(webview_t, *const c_char) -> c_int;
type WebviewSetHtmlFn = unsafe extern "C" fn(webview_t, *const c_char) -> c_int;
type WebviewEvalFn = unsafe extern "C" fn(webview_t, *const c_char) -> c_int;

/// Dynamically loaded webview library.
pub(crate) struct WebviewLibrary {
    #[allow(dead_code)]
    lib: Library,
    /// Where the library was loaded from.
    path: PathBuf,
    pub webview_create: WebviewCreateFn,
    pub webview_destroy: WebviewDestroyFn,
    pub webview_run: WebviewRunFn,
    pub webview_terminate: WebviewTerminateFn,
    pub webview_dispatch: WebviewDispatchFn,
    pub webview_set_title: WebviewSetTitleFn,
    pub webview_set_size: WebviewSetSizeFn,
    pub webview_navigate: WebviewNavigateFn,
    pub webview_set_html: WebviewSetHtmlFn,
    pub webview_eval: WebviewEvalFn,
}

macro_rules! load_symbol {
    ($lib:expr, $ty:ty, $name:literal) => {{
        let sym: Symbol<$ty> = $lib
            .get(concat!($name, "\0").as_bytes())
            .map_err(|e| WebViewError::SymbolNotFound(format!("{}: {}", $name, e)))?;
        *sym
    }};
}

impl WebviewLibrary {
    fn load(path: Option<&Path>) -> Result<Self> {
        let lib_path = Self::resolve_path(path);
        log::info!(
            target: "webview::native",
            "loading webview library from {}",
            lib_path.display()
        );

        let lib = unsafe { Library::new(&lib_path) }
            .map_err(|e| WebViewError::LibraryLoad(format!("{}: {}", lib_path.display(), e)))?;

        let library = unsafe {
            let webview_create = load_symbol!(lib, WebviewCreateFn, "webview_create");
            let webview_destroy = load_symbol!(lib, WebviewDestroyFn, "webview_destroy");
            let webview_run = load_symbol!(lib, WebviewRunFn, "webview_run");
            let webview_terminate = load_symbol!(lib, WebviewTerminateFn, "webview_terminate");
            let webview_dispatch = load_symbol!(lib, WebviewDispatchFn, "webview_dispatch");
            let webview_set_title = load_symbol!(lib, WebviewSetTitleFn, "webview_set_title");
            let webview_set_size = load_symbol!(lib, WebviewSetSizeFn, "webview_set_size");
            let webview_navigate = load_symbol!(lib, WebviewNavigateFn, "webview_navigate");
            let webview_set_html = load_symbol!(lib, WebviewSetHtmlFn, "webview_set_html");
            let webview_eval = load_symbol!(lib, WebviewEvalFn, "webview_eval");

            Self {
                webview_create,
                webview_destroy,
                webview_run,
                webview_terminate,
                webview_dispatch,
                webview_set_title,
                webview_set_size,
                webview_navigate,
                webview_set_html,
                webview_eval,
                lib,
                path: lib_path,
            }
        };

        Ok(library)
    }

    /// Explicit path first, then `WEBVIEW_LIB_PATH`, then the system search path.
    fn resolve_path(path: Option<&Path>) -> PathBuf {
        let configured = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("WEBVIEW_LIB_PATH").map(PathBuf::from));

        match configured {
            Some(p) if p.is_dir() => p.join(Self::library_name()),
            Some(p) => p,
            None => PathBuf::from(Self::library_name()),
        }
    }

    #[cfg(target_os = "windows")]
    fn library_name() -> &'static str {
        "webview.dll"
    }

    #[cfg(target_os = "macos")]
    fn library_name() -> &'static str {
        "libwebview.dylib"
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    fn library_name() -> &'static str {
        "libwebview.so"
    }
}

static WEBVIEW_LIBRARY: OnceLock<Arc<WebviewLibrary>> = OnceLock::new();

/// Get the process-wide library instance, loading it on first use.
///
/// Only the first successful load decides the path; later calls reuse it.
pub(crate) fn get_webview_library(path: Option<&Path>) -> Result<Arc<WebviewLibrary>> {
    if let Some(lib) = WEBVIEW_LIBRARY.get() {
        if let Some(requested) = ignored_path(&lib.path, path) {
            log::warn!(
                target: "webview::native",
                "webview library already loaded from {}; ignoring {}",
                lib.path.display(),
                requested.display()
            );
        }
        return Ok(Arc::clone(lib));
    }

    let lib = WebviewLibrary::load(path).map(Arc::new)?;
    if WEBVIEW_LIBRARY.set(Arc::clone(&lib)).is_err() {
        if let Some(existing) = WEBVIEW_LIBRARY.get() {
            return Ok(Arc::clone(existing));
        }
    }
    Ok(lib)
}

/// The explicitly requested library path, when it differs from the loaded one.
fn ignored_path(loaded: &Path, requested: Option<&Path>) -> Option<PathBuf> {
    let requested = WebviewLibrary::resolve_path(Some(requested?));
    (requested != loaded).then_some(requested)
}

/// Map a `webview_error_t` status to a `Result`.
pub(crate) fn check(call: &'static str, code: c_int) -> Result<()> {
    if code == WEBVIEW_ERROR_OK {
        Ok(())
    } else {
        Err(WebViewError::NativeCall { call, code })
    }
}
