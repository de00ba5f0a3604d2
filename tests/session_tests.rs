//! End-to-end session tests over the mock backend.
//!
//! Host calls and engine events share one queue per session, so awaiting a
//! host-facing event that a fired engine event produces proves every
//! earlier command has been processed.

use std::sync::Arc;
use std::time::Duration;

use overlay_renderer::backend::{EngineEvent, MockBackend, MockEngineController, RecordedCall};
use overlay_renderer::prelude::*;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

fn test_runtime() -> Arc<EngineRuntime> {
    let dir = std::env::temp_dir().join(format!("overlay-renderer-it-{}", Uuid::new_v4()));
    EngineRuntime::initialize(RuntimeConfig::new(dir)).unwrap()
}

fn spawn_session() -> (
    BrowserSession,
    UnboundedReceiver<BrowserEvent>,
    MockEngineController,
) {
    let (backend, controller) = MockBackend::new();
    let (session, events) = BrowserSession::spawn(
        test_runtime(),
        SessionConfig::new("test-overlay"),
        Box::new(backend),
    );
    (session, events, controller)
}

async fn next_event(events: &mut UnboundedReceiver<BrowserEvent>) -> BrowserEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for browser event")
        .expect("session closed its event channel")
}

fn navigations(controller: &MockEngineController) -> Vec<String> {
    controller
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            RecordedCall::Navigate(url) => Some(url),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_deferred_navigation_resolves_exactly_once() {
    let (session, mut events, controller) = spawn_session();

    session.begin_render(640, 480, "https://overlay.example/a");
    controller.wait_for_browser().await;
    session.load("https://overlay.example/b");

    controller.fire(EngineEvent::Created);
    controller.fire(EngineEvent::LoadEnd {
        url: "about:blank".into(),
        http_status: 200,
    });
    match next_event(&mut events).await {
        BrowserEvent::Load { http_status, .. } => assert_eq!(http_status, 200),
        other => panic!("expected load event, got {other:?}"),
    }

    // The first load-end consumed the deferred target.
    controller
        .wait_for_call(|c| matches!(c, RecordedCall::Navigate(url) if url == "https://overlay.example/b"))
        .await;

    controller.fire(EngineEvent::LoadEnd {
        url: "https://overlay.example/b".into(),
        http_status: 200,
    });
    next_event(&mut events).await;

    assert_eq!(navigations(&controller), vec!["https://overlay.example/b"]);
}

#[tokio::test]
async fn test_scripts_flush_in_order_after_init() {
    let (session, mut events, controller) = spawn_session();

    // Queued before any page context exists.
    session.execute_script("console.log('a')");
    session.execute_script("console.log('b')");

    session.begin_render(320, 240, "about:blank");
    controller.wait_for_browser().await;
    controller.fire(EngineEvent::LoadStart {
        url: "about:blank".into(),
    });

    match next_event(&mut events).await {
        BrowserEvent::StartLoading { status, url } => {
            assert_eq!(status, 0);
            assert_eq!(url, "about:blank");
        }
        other => panic!("expected start-loading event, got {other:?}"),
    }

    let scripts: Vec<(String, String)> = controller
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            RecordedCall::ExecuteScript { script, origin } => Some((script, origin)),
            _ => None,
        })
        .collect();
    assert_eq!(scripts.len(), 3);
    assert_eq!(scripts[0].1, "init");
    assert!(scripts[0].0.contains("window.__bindOverlayApi"));
    assert_eq!(scripts[1], ("console.log('a')".into(), "injectOnLoad".into()));
    assert_eq!(scripts[2], ("console.log('b')".into(), "injectOnLoad".into()));
}

#[tokio::test]
async fn test_resize_before_create_sets_initial_viewport() {
    let (session, _events, controller) = spawn_session();

    session.resize(800, 600);
    session.begin_render(300, 200, "about:blank");

    controller
        .wait_for_call(|c| {
            matches!(
                c,
                RecordedCall::Create {
                    width: 800,
                    height: 600,
                    ..
                }
            )
        })
        .await;
}

#[tokio::test]
async fn test_reload_before_create_is_noop() {
    let (session, mut events, controller) = spawn_session();

    session.reload();
    session.begin_render(100, 100, "about:blank");
    controller.wait_for_browser().await;
    controller.fire(EngineEvent::LoadStart {
        url: "about:blank".into(),
    });
    next_event(&mut events).await;

    assert_eq!(
        controller.count_calls(|c| matches!(c, RecordedCall::Reload)),
        0
    );
}

#[tokio::test]
async fn test_dispose_releases_browser_exactly_once() {
    let (session, _events, controller) = spawn_session();

    session.begin_render(100, 100, "about:blank");
    controller.wait_for_browser().await;

    session.dispose();
    session.dispose();
    drop(session);

    controller
        .wait_for_call(|c| matches!(c, RecordedCall::Close))
        .await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        controller.count_calls(|c| matches!(c, RecordedCall::Close)),
        1
    );
}

#[tokio::test]
async fn test_begin_render_twice_closes_previous_browser() {
    let (session, _events, controller) = spawn_session();

    session.begin_render(100, 100, "about:blank");
    controller.wait_for_browser().await;
    session.end_render();
    session.begin_render(100, 100, "about:blank");

    controller
        .wait_for_call(|c| matches!(c, RecordedCall::Close))
        .await;
    let calls = controller.calls();
    let creates = calls
        .iter()
        .filter(|c| matches!(c, RecordedCall::Create { .. }))
        .count();
    assert_eq!(creates, 2);
}

#[tokio::test]
async fn test_events_arrive_in_engine_order() {
    let (session, mut events, controller) = spawn_session();

    session.begin_render(100, 100, "https://overlay.example");
    controller.wait_for_browser().await;

    controller.fire(EngineEvent::Created);
    controller.fire(EngineEvent::LoadStart {
        url: "https://overlay.example".into(),
    });
    controller.fire(EngineEvent::LoadEnd {
        url: "https://overlay.example".into(),
        http_status: 200,
    });
    controller.fire(EngineEvent::ConsoleMessage {
        message: "ready".into(),
        source: "app.js".into(),
        line: 12,
    });

    assert!(matches!(
        next_event(&mut events).await,
        BrowserEvent::StartLoading { .. }
    ));
    assert!(matches!(next_event(&mut events).await, BrowserEvent::Load { .. }));
    match next_event(&mut events).await {
        BrowserEvent::ConsoleLog { message, line, .. } => {
            assert_eq!(message, "ready");
            assert_eq!(line, 12);
        }
        other => panic!("expected console event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_pointer_clicks_build_multi_click_counts() {
    let (session, mut events, controller) = spawn_session();

    session.begin_render(100, 100, "about:blank");
    controller.wait_for_browser().await;
    controller.fire(EngineEvent::Created);
    controller.fire(EngineEvent::LoadStart {
        url: "about:blank".into(),
    });
    // Created is processed before anything posted after this event arrives.
    next_event(&mut events).await;

    session.pointer_button(10, 10, MouseButton::Left, false);
    session.pointer_button(10, 10, MouseButton::Left, true);
    session.pointer_button(10, 10, MouseButton::Left, false);

    controller
        .wait_for_call(|c| matches!(c, RecordedCall::MouseClick { click_count: 2, .. }))
        .await;
    let counts: Vec<(bool, i32)> = controller
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            RecordedCall::MouseClick {
                is_release,
                click_count,
                ..
            } => Some((is_release, click_count)),
            _ => None,
        })
        .collect();
    assert_eq!(counts, vec![(false, 1), (true, 1), (false, 2)]);
}

#[tokio::test]
async fn test_key_events_pass_before_creation_completes() {
    let (session, _events, controller) = spawn_session();

    session.begin_render(100, 100, "about:blank");
    controller.wait_for_browser().await;

    // No Created event fired: the browser exists but is not ready.
    session.pointer_move(5, 5, None);
    session.key(KeyEvent::new(KeyEventKind::KeyDown, 0x0D));

    controller
        .wait_for_call(|c| matches!(c, RecordedCall::Key(_)))
        .await;
    assert_eq!(
        controller.count_calls(|c| matches!(c, RecordedCall::MouseMove { .. })),
        0
    );
}

#[tokio::test]
async fn test_shutdown_refuses_while_session_alive() {
    let runtime = test_runtime();
    let (backend, controller) = MockBackend::new();
    let (session, _events) = BrowserSession::spawn(
        runtime.clone(),
        SessionConfig::new("test-overlay"),
        Box::new(backend),
    );

    match runtime.shutdown() {
        Err(Error::SessionsStillAlive(n)) => assert_eq!(n, 1),
        other => panic!("expected sessions-alive error, got {other:?}"),
    }

    // The session still pins the runtime; reclaim a handle from it before
    // disposing, then retry.
    let runtime = session.runtime().clone();
    session.dispose();
    drop(session);
    drop(controller);
    runtime.shutdown().unwrap();
}

#[tokio::test]
async fn test_paint_frames_reach_the_host() {
    let (session, mut events, controller) = spawn_session();

    session.begin_render(2, 2, "about:blank");
    controller.wait_for_browser().await;

    let frame = PaintFrame::full(vec![0u8; 2 * 2 * 4], 2, 2);
    controller.fire(EngineEvent::Paint(frame));

    match next_event(&mut events).await {
        BrowserEvent::Paint(frame) => {
            assert_eq!((frame.width, frame.height), (2, 2));
            assert!(frame.is_complete());
        }
        other => panic!("expected paint event, got {other:?}"),
    }
}
