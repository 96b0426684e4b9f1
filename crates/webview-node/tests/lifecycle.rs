mod common;

use anyhow::Result;
use common::*;
use parking_lot::Mutex;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;
use webview_node::{
    DeferredCall, HeadlessBackend, LifecycleHooks, LifecycleState, NativeSurface, NodeSettings,
    Pump, SizeHint, SurfaceBackend, SurfaceCall, SurfaceOps, SurfaceOptions, SurfaceWaker,
    WebViewError, WebViewNode,
};

type SurfaceResult<T> = std::result::Result<T, WebViewError>;

#[test]
fn activation_reaches_ready_and_applies_defaults() -> Result<()> {
    init_logging();
    let backend = Arc::new(HeadlessBackend::new());
    let host = TestHost::attached();
    let sink = RecordingSink::default();
    let mut node = node_builder(&backend, &host, &sink).build();

    assert_eq!(node.state(), LifecycleState::Uninitialized);
    assert!(!node.has_handle());

    node.on_ready();
    assert_eq!(
        node.wait_for_state(TIMEOUT, |s| s == LifecycleState::Ready),
        LifecycleState::Ready
    );
    assert!(wait_for_run(&backend, 1));
    assert!(node.has_handle());

    let calls = backend.log().calls();
    let default_html = NodeSettings::default().default_html;
    assert_eq!(
        calls,
        vec![
            SurfaceCall::Create { debug: false },
            SurfaceCall::SetHtml(default_html),
            SurfaceCall::SetTitle("WebView".into()),
            SurfaceCall::SetSize {
                width: 1024,
                height: 768,
                hint: SizeHint::None
            },
            SurfaceCall::Run,
        ]
    );

    node.teardown();
    Ok(())
}

#[test]
fn only_last_content_before_ready_is_applied() -> Result<()> {
    init_logging();
    let (backend, gate) = HeadlessBackend::gated();
    let backend = Arc::new(backend);
    let host = TestHost::attached();
    let sink = RecordingSink::default();
    let mut node = node_builder(&backend, &host, &sink).build();

    node.activate();
    assert_eq!(node.state(), LifecycleState::Starting);

    node.load_url("https://a");
    node.load_url("https://b");
    assert!(sink.events().is_empty());

    gate.release();
    assert!(wait_for_run(&backend, 1));

    let records = backend.log().records();
    assert_eq!(navigations(&records), vec!["https://b".to_string()]);
    assert!(!records.iter().any(|r| matches!(r.call, SurfaceCall::SetHtml(_))));

    assert!(sink.wait_until(|events| events.contains(&page_loaded("https://b"))));
    let events = sink.events();
    assert_eq!(count_events(&events, &page_loaded("https://a")), 0);
    assert_eq!(count_events(&events, &page_loaded("https://b")), 1);
    assert_eq!(node.url(), "https://b");

    node.teardown();
    Ok(())
}

#[test]
fn html_requested_last_wins_over_url() -> Result<()> {
    init_logging();
    let backend = Arc::new(HeadlessBackend::new());
    let host = TestHost::attached();
    let sink = RecordingSink::default();
    let mut node = node_builder(&backend, &host, &sink).build();

    node.load_url("https://ignored");
    node.load_html("<p>hello</p>");
    node.activate();
    assert!(wait_for_run(&backend, 1));

    let records = backend.log().records();
    assert!(navigations(&records).is_empty());
    assert_eq!(
        backend
            .log()
            .count(|c| *c == SurfaceCall::SetHtml("<p>hello</p>".into())),
        1
    );
    // The URL property still remembers the request.
    assert_eq!(node.url(), "https://ignored");

    node.teardown();
    Ok(())
}

#[test]
fn double_activation_creates_one_surface() -> Result<()> {
    init_logging();
    let (backend, gate) = HeadlessBackend::gated();
    let backend = Arc::new(backend);
    let host = TestHost::attached();
    let sink = RecordingSink::default();
    let mut node = node_builder(&backend, &host, &sink).build();

    node.activate();
    node.activate();
    gate.release();
    node.wait_for_state(TIMEOUT, LifecycleState::is_ready);
    node.on_attach();
    assert!(wait_for_run(&backend, 1));

    assert_eq!(backend.created(), 1);
    let owners: Vec<_> = backend.log().records().iter().map(|r| r.thread).collect();
    assert!(owners.windows(2).all(|w| w[0] == w[1]));

    node.teardown();
    assert_eq!(backend.live(), 0);
    Ok(())
}

#[test]
fn teardown_is_idempotent_and_terminal() -> Result<()> {
    init_logging();
    let backend = Arc::new(HeadlessBackend::new());
    let host = TestHost::attached();
    let sink = RecordingSink::default();
    let mut node = node_builder(&backend, &host, &sink).build();

    node.activate();
    assert!(wait_for_run(&backend, 1));

    node.teardown();
    assert_eq!(node.state(), LifecycleState::Closed);
    assert!(!node.has_handle());
    assert_eq!(backend.live(), 0);
    let after_first = backend.log().calls();
    assert_eq!(after_first.last(), Some(&SurfaceCall::Destroy));

    node.teardown();
    node.on_detach();
    assert_eq!(node.state(), LifecycleState::Closed);

    node.load_url("https://later");
    node.load_html("<p>later</p>");
    node.eval_javascript("1");
    node.set_title("later");
    node.set_webview_size(10, 10);

    assert_eq!(backend.log().calls(), after_first);
    assert_eq!(node.url(), "https://later");
    assert_eq!(node.webview_size(), (10, 10));
    assert!(!sink.events().iter().any(|e| e == &page_loaded("https://later")));
    Ok(())
}

#[test]
fn teardown_before_activation_closes() {
    init_logging();
    let backend = Arc::new(HeadlessBackend::new());
    let host = TestHost::attached();
    let sink = RecordingSink::default();
    let mut node = node_builder(&backend, &host, &sink).build();

    node.load_url("https://never");
    node.teardown();
    assert_eq!(node.state(), LifecycleState::Closed);
    assert_eq!(backend.created(), 0);
}

#[test]
fn teardown_right_after_ready_exits_run_loop() -> Result<()> {
    init_logging();
    let backend = Arc::new(HeadlessBackend::new());
    let host = TestHost::attached();
    let sink = RecordingSink::default();
    let mut node = node_builder(&backend, &host, &sink).build();

    node.activate();
    node.wait_for_state(TIMEOUT, LifecycleState::is_ready);
    node.teardown();

    // Joined: nothing is left running and the handle is gone.
    assert_eq!(node.state(), LifecycleState::Closed);
    assert!(!node.has_handle());
    assert_eq!(backend.live(), 0);
    assert_eq!(backend.log().count(|c| *c == SurfaceCall::Destroy), 1);
    Ok(())
}

#[test]
fn teardown_while_starting_destroys_without_running() -> Result<()> {
    init_logging();
    let (backend, gate) = HeadlessBackend::gated();
    let backend = Arc::new(backend);
    let host = TestHost::attached();
    let sink = RecordingSink::default();
    let mut node = node_builder(&backend, &host, &sink).build();

    node.activate();
    node.load_url("https://pending");
    assert_eq!(node.state(), LifecycleState::Starting);

    let opener = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        gate.release();
    });
    node.teardown();
    opener.join().expect("gate thread panicked");

    assert_eq!(node.state(), LifecycleState::Closed);
    assert_eq!(
        backend.log().calls(),
        vec![SurfaceCall::Create { debug: false }, SurfaceCall::Destroy]
    );
    assert!(sink.events().is_empty());
    Ok(())
}

#[test]
fn failed_creation_closes_with_diagnostic() -> Result<()> {
    init_logging();
    let backend = Arc::new(HeadlessBackend::new());
    backend.fail_create(true);
    let host = TestHost::attached();
    let sink = RecordingSink::default();
    let mut node = node_builder(&backend, &host, &sink).build();

    node.activate();
    assert_eq!(node.wait_until_settled(TIMEOUT), LifecycleState::Closed);
    assert!(!node.has_handle());
    let error = node.last_error().expect("creation failure is recorded");
    assert!(error.contains("creation failed"), "{error}");

    node.eval_javascript("never()");
    node.set_title("never");
    assert!(backend.log().calls().is_empty());
    assert!(sink.events().is_empty());

    // Not retried on its own.
    thread::sleep(Duration::from_millis(20));
    assert_eq!(node.state(), LifecycleState::Closed);
    assert!(backend.log().calls().is_empty());

    node.teardown();
    Ok(())
}

#[test]
fn user_close_ends_session_and_reattach_starts_fresh() -> Result<()> {
    init_logging();
    let backend = Arc::new(HeadlessBackend::new());
    let host = TestHost::attached();
    let sink = RecordingSink::default();
    let mut node = node_builder(&backend, &host, &sink)
        .url("https://first")
        .build();

    node.activate();
    assert!(wait_for_run(&backend, 1));
    let first = backend.last_surface().expect("surface created");
    assert!(first.close());

    assert_eq!(
        node.wait_for_state(TIMEOUT, |s| s == LifecycleState::Closed),
        LifecycleState::Closed
    );
    assert!(!node.has_handle());
    assert_eq!(backend.live(), 0);

    // Closed: only the URL property moves.
    node.load_url("https://second");
    assert_eq!(navigations(&backend.log().records()), vec!["https://first"]);

    node.on_attach();
    assert!(wait_for_run(&backend, 2));
    assert_eq!(backend.created(), 2);
    let second = backend.last_surface().expect("second surface");
    assert_ne!(first.id(), second.id());

    let navigated_on_second: Vec<_> = backend
        .log()
        .records()
        .into_iter()
        .filter(|r| r.surface == second.id())
        .filter_map(|r| match r.call {
            SurfaceCall::Navigate(url) => Some(url),
            _ => None,
        })
        .collect();
    assert_eq!(navigated_on_second, vec!["https://second".to_string()]);

    node.teardown();
    assert_eq!(backend.live(), 0);
    Ok(())
}

#[test]
fn editor_mode_never_creates_a_surface() {
    init_logging();
    let backend = Arc::new(HeadlessBackend::new());
    let host = TestHost::editor();
    let sink = RecordingSink::default();
    let mut node = node_builder(&backend, &host, &sink).build();

    node.on_ready();
    assert_eq!(node.state(), LifecycleState::Uninitialized);
    assert_eq!(backend.created(), 0);
}

#[test]
fn activation_outside_tree_is_deferred_once() -> Result<()> {
    init_logging();
    let backend = Arc::new(HeadlessBackend::new());
    let host = TestHost::detached();
    let sink = RecordingSink::default();
    let mut node = node_builder(&backend, &host, &sink).build();

    node.on_ready();
    node.on_ready();
    assert_eq!(host.deferred_calls(), vec![DeferredCall::Activate]);
    assert_eq!(node.state(), LifecycleState::Uninitialized);

    host.attach();
    node.on_deferred(DeferredCall::Activate);
    assert_eq!(
        node.wait_for_state(TIMEOUT, LifecycleState::is_ready),
        LifecycleState::Ready
    );
    assert_eq!(backend.created(), 1);

    node.teardown();
    Ok(())
}

#[test]
fn deferred_activation_gives_up_when_still_detached() {
    init_logging();
    let backend = Arc::new(HeadlessBackend::new());
    let host = TestHost::detached();
    let sink = RecordingSink::default();
    let mut node = node_builder(&backend, &host, &sink).build();

    node.activate();
    node.on_deferred(DeferredCall::Activate);
    assert_eq!(node.state(), LifecycleState::Uninitialized);
    assert_eq!(host.deferred_calls().len(), 1);
    assert_eq!(backend.created(), 0);
}

#[test]
fn detach_cancels_pending_deferred_activation() -> Result<()> {
    init_logging();
    let backend = Arc::new(HeadlessBackend::new());
    let host = TestHost::detached();
    let sink = RecordingSink::default();
    let mut node = node_builder(&backend, &host, &sink).build();

    node.on_ready();
    assert_eq!(host.deferred_calls(), vec![DeferredCall::Activate]);
    node.on_detach();
    assert_eq!(node.state(), LifecycleState::Closed);

    // The host delivers the stale deferral after the node is back in the tree.
    host.attach();
    node.on_deferred(DeferredCall::Activate);
    assert_eq!(node.state(), LifecycleState::Closed);
    assert_eq!(backend.created(), 0);

    node.on_attach();
    assert_eq!(
        node.wait_for_state(TIMEOUT, LifecycleState::is_ready),
        LifecycleState::Ready
    );
    assert_eq!(backend.created(), 1);

    node.teardown();
    Ok(())
}

#[test]
fn debug_flag_applies_to_next_creation_only() -> Result<()> {
    init_logging();
    let backend = Arc::new(HeadlessBackend::new());
    let host = TestHost::attached();
    let sink = RecordingSink::default();
    let mut node = node_builder(&backend, &host, &sink).build();

    node.activate();
    assert!(wait_for_run(&backend, 1));
    node.set_debug(true);
    assert!(node.is_debug());
    node.teardown();

    node.activate();
    assert!(wait_for_run(&backend, 2));
    node.teardown();

    let creates: Vec<_> = backend
        .log()
        .calls()
        .into_iter()
        .filter(|c| matches!(c, SurfaceCall::Create { .. }))
        .collect();
    assert_eq!(
        creates,
        vec![
            SurfaceCall::Create { debug: false },
            SurfaceCall::Create { debug: true }
        ]
    );
    Ok(())
}

struct IdleWaker;

impl SurfaceWaker for IdleWaker {
    fn wake(&self) -> SurfaceResult<()> {
        Ok(())
    }

    fn terminate(&self) -> SurfaceResult<()> {
        Ok(())
    }
}

/// Never drains its queue; its run-loop panics once `crash` fires.
struct CrashingSurface {
    crash: Option<mpsc::Receiver<()>>,
    navigated: Arc<Mutex<Vec<String>>>,
}

impl SurfaceOps for CrashingSurface {
    fn navigate(&self, url: &str) -> SurfaceResult<()> {
        self.navigated.lock().push(url.to_string());
        Ok(())
    }

    fn set_html(&self, _html: &str) -> SurfaceResult<()> {
        Ok(())
    }

    fn eval(&self, _script: &str) -> SurfaceResult<()> {
        Ok(())
    }

    fn set_title(&self, _title: &str) -> SurfaceResult<()> {
        Ok(())
    }

    fn set_size(&self, _width: i32, _height: i32, _hint: SizeHint) -> SurfaceResult<()> {
        Ok(())
    }
}

impl NativeSurface for CrashingSurface {
    fn waker(&self) -> Arc<dyn SurfaceWaker> {
        Arc::new(IdleWaker)
    }

    fn run(&mut self) -> SurfaceResult<()> {
        if let Some(crash) = self.crash.take() {
            let _ = crash.recv();
        }
        panic!("run-loop crashed");
    }

    fn destroy(&mut self) {}

    fn is_destroyed(&self) -> bool {
        false
    }

    fn ops(&self) -> &dyn SurfaceOps {
        self
    }
}

struct CrashingBackend {
    crash: Mutex<Option<mpsc::Receiver<()>>>,
    navigated: Arc<Mutex<Vec<String>>>,
}

impl SurfaceBackend for CrashingBackend {
    fn name(&self) -> &str {
        "crashing"
    }

    fn create(
        &self,
        _options: &SurfaceOptions,
        _pump: Pump,
    ) -> SurfaceResult<Box<dyn NativeSurface>> {
        Ok(Box::new(CrashingSurface {
            crash: self.crash.lock().take(),
            navigated: Arc::clone(&self.navigated),
        }))
    }
}

#[test]
fn owner_thread_panic_closes_and_releases_queued_tasks() -> Result<()> {
    init_logging();
    let (crash, crash_rx) = mpsc::channel();
    let navigated = Arc::new(Mutex::new(Vec::new()));
    let backend = Arc::new(CrashingBackend {
        crash: Mutex::new(Some(crash_rx)),
        navigated: Arc::clone(&navigated),
    });
    let host = TestHost::attached();
    let sink = Arc::new(RecordingSink::default());
    let mut node = WebViewNode::builder(backend, host)
        .events(sink.clone())
        .build();

    node.activate();
    assert_eq!(
        node.wait_for_state(TIMEOUT, LifecycleState::is_ready),
        LifecycleState::Ready
    );

    // Each queued navigation holds its own handle on the sink.
    let before = Arc::strong_count(&sink);
    node.load_url("https://queued-a");
    node.load_url("https://queued-b");
    assert_eq!(Arc::strong_count(&sink), before + 2);

    crash.send(())?;
    assert_eq!(
        node.wait_for_state(TIMEOUT, |s| s == LifecycleState::Closed),
        LifecycleState::Closed
    );
    assert!(!node.has_handle());
    assert_eq!(node.last_error().as_deref(), Some("owner thread panicked"));

    // Only this test and the node still hold the sink: the queued tasks and
    // the session's own handle were released without running.
    assert_eq!(Arc::strong_count(&sink), 2);
    assert!(navigated.lock().is_empty());

    node.teardown();
    assert_eq!(node.state(), LifecycleState::Closed);
    assert_eq!(Arc::strong_count(&sink), 2);
    Ok(())
}

#[test]
fn dropping_node_joins_owner_thread() {
    init_logging();
    let backend = Arc::new(HeadlessBackend::new());
    let host = TestHost::attached();
    let sink = RecordingSink::default();
    {
        let mut node = node_builder(&backend, &host, &sink).build();
        node.activate();
        assert!(wait_for_run(&backend, 1));
    }
    assert_eq!(backend.live(), 0);
    assert_eq!(backend.log().calls().last(), Some(&SurfaceCall::Destroy));
}

#[cfg(feature = "native")]
#[test]
fn missing_native_library_fails_creation() {
    use webview_node::{NativeBackend, WebViewNode};

    init_logging();
    let backend = Arc::new(NativeBackend::new().with_library_path("/nonexistent/libwebview.so"));
    let mut node = WebViewNode::new(backend, TestHost::attached());

    node.activate();
    assert_eq!(node.wait_until_settled(TIMEOUT), LifecycleState::Closed);
    assert!(!node.has_handle());
    let error = node.last_error().expect("load failure is recorded");
    assert!(error.contains("failed to load webview library"), "{error}");
    node.teardown();
}
