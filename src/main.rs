use anyhow::{Context, Result, bail};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use webview_config::WebViewConfig;
use webview_node::{
    DeferredCall, HeadlessBackend, HostContext, LifecycleHooks, LifecycleState, NativeBackend,
    SurfaceBackend, SurfaceCall, WebViewEvent, WebViewNode,
};

const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct Args {
    url: Option<String>,
    config: Option<String>,
    headless: bool,
}

impl Args {
    fn parse(args: impl Iterator<Item = String>) -> Result<Self> {
        let mut parsed = Self::default();
        for arg in args {
            if let Some(url) = arg.strip_prefix("--url=") {
                parsed.url = Some(url.to_string());
            } else if let Some(path) = arg.strip_prefix("--config=") {
                parsed.config = Some(path.to_string());
            } else if arg == "--headless" {
                parsed.headless = true;
            } else {
                bail!("unknown argument: {arg} (expected --url=, --config= or --headless)");
            }
        }
        Ok(parsed)
    }
}

/// A host that is always attached and queues deferred calls for `main`.
#[derive(Default)]
struct DemoHost {
    deferred: Mutex<Vec<DeferredCall>>,
}

impl DemoHost {
    fn take_deferred(&self) -> Vec<DeferredCall> {
        std::mem::take(&mut *self.deferred.lock())
    }
}

impl HostContext for DemoHost {
    fn is_inside_tree(&self) -> bool {
        true
    }

    fn call_deferred(&self, call: DeferredCall) {
        self.deferred.lock().push(call);
    }
}

fn main() -> Result<()> {
    let args = Args::parse(std::env::args().skip(1))?;

    let mut config = match &args.config {
        Some(path) => WebViewConfig::load_from_file(path)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("loading {path}"))?,
        None => WebViewConfig::load_or_default(),
    };
    config.merge_with_env();
    if let Some(url) = args.url {
        config.content.initial_url = Some(url);
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.filter.as_str()),
    )
    .init();

    let headless = args.headless.then(|| Arc::new(HeadlessBackend::new()));
    let backend: Arc<dyn SurfaceBackend> = if let Some(headless) = &headless {
        headless.clone()
    } else {
        let mut native = NativeBackend::new();
        if let Some(path) = &config.native.library_path {
            native = native.with_library_path(path);
        }
        Arc::new(native)
    };
    log::info!("using {} backend", backend.name());

    let host = Arc::new(DemoHost::default());
    let mut node = WebViewNode::builder(backend, host.clone())
        .config(&config)
        .events(Arc::new(|event: WebViewEvent| log::info!("event: {event}")))
        .build();

    node.on_ready();
    for call in host.take_deferred() {
        node.on_deferred(call);
    }

    let state = node.wait_until_settled(STARTUP_TIMEOUT);
    if state != LifecycleState::Ready {
        let reason = node
            .last_error()
            .unwrap_or_else(|| format!("node settled in state {state}"));
        node.on_detach();
        bail!("webview did not start: {reason}");
    }

    if let Some(headless) = &headless {
        node.set_title("webview-host (headless)");
        node.eval_javascript("document.title");
        node.load_html("<h1>Headless session</h1>");
        let drained = headless.log().wait_until(STARTUP_TIMEOUT, |calls| {
            calls
                .iter()
                .any(|r| matches!(&r.call, SurfaceCall::SetHtml(html) if html.contains("Headless session")))
        });
        if !drained {
            log::warn!("headless surface did not process the queued calls");
        }
        node.on_detach();
        for call in headless.log().calls() {
            log::info!("surface call: {call:?}");
        }
    } else {
        // Runs until the user closes the native window.
        node.wait_for_state(Duration::MAX, |s| s == LifecycleState::Closed);
        node.on_detach();
    }

    log::info!("session finished in state {}", node.state());
    Ok(())
}
