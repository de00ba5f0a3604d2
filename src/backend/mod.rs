//! Engine backend abstraction.
//!
//! The session core drives an embedded browser through two object-safe
//! traits: [`EngineBackend`] creates windowless browsers, [`EngineHandle`]
//! operates one live browser. Engine-owned threads report back through an
//! [`EngineEventSender`], which feeds the owning session's message queue so
//! that callbacks and host calls are serialized through a single consumer.
//!
//! [`MockBackend`] is the test double: it records every handle call and
//! hands the test a [`MockEngineController`] for firing engine events, the
//! same role the mock engine plays in-tree for the real engine.
//!
//! # Submodules
//!
//! - [`cef`] - CEF-backed implementation (requires the `cef-backend` feature)

#[cfg(feature = "cef-backend")]
pub mod cef;

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::input::{EventFlags, KeyEvent, MouseButton};
use crate::render::PaintFrame;
use crate::session::SessionMessage;

/// Parameters for creating a windowless (off-screen) browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDescriptor {
    /// Viewport width in pixels.
    pub width: u32,
    /// Viewport height in pixels.
    pub height: u32,
    /// Target windowless frame rate (1..=60).
    pub frame_rate: i32,
}

impl WindowDescriptor {
    /// Creates a descriptor.
    pub fn new(width: u32, height: u32, frame_rate: i32) -> Self {
        Self {
            width,
            height,
            frame_rate,
        }
    }
}

/// Events produced by engine-owned threads for one browser.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The native browser finished asynchronous creation and is ready for
    /// navigation, script execution and input.
    Created,
    /// A main-frame navigation started (fires for every navigation,
    /// including reloads).
    LoadStart {
        /// URL being loaded.
        url: String,
    },
    /// A main-frame navigation finished.
    LoadEnd {
        /// URL that finished loading.
        url: String,
        /// HTTP status code of the response.
        http_status: i32,
    },
    /// A main-frame navigation failed.
    LoadError {
        /// Engine error code.
        error_code: i32,
        /// Engine error description.
        error_text: String,
        /// URL that failed to load.
        failed_url: String,
    },
    /// A console message was emitted by page script.
    ConsoleMessage {
        /// Message text.
        message: String,
        /// Script source (URL or tag).
        source: String,
        /// Source line number.
        line: i32,
    },
    /// The engine painted a new frame.
    Paint(PaintFrame),
}

/// Delivery channel from engine-owned threads into a session's queue.
///
/// Cloneable and cheap; the backend hands one clone to every callback that
/// needs to report. Sends after session disposal are silently dropped.
#[derive(Debug, Clone)]
pub struct EngineEventSender {
    inner: mpsc::UnboundedSender<SessionMessage>,
}

impl EngineEventSender {
    pub(crate) fn new(inner: mpsc::UnboundedSender<SessionMessage>) -> Self {
        Self { inner }
    }

    /// Creates a sender with no session behind it; every event is dropped.
    /// Lets tests drive a backend directly without spawning a session.
    pub fn detached() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { inner: tx }
    }

    /// Posts an engine event into the owning session's queue.
    pub fn send(&self, event: EngineEvent) {
        let _ = self.inner.send(SessionMessage::Engine(event));
    }
}

/// Creates windowless browsers for one session.
pub trait EngineBackend: Send + 'static {
    /// Creates a new off-screen browser. Engine callbacks must report
    /// through `events`; the returned handle is owned exclusively by the
    /// caller and destroyed via [`EngineHandle::close`].
    fn create_windowless(
        &mut self,
        window: &WindowDescriptor,
        events: EngineEventSender,
    ) -> Result<Box<dyn EngineHandle>>;
}

/// Operations on one live browser. All calls are fire-and-forget; results
/// and failures come back asynchronously as [`EngineEvent`]s.
pub trait EngineHandle: Send {
    /// Navigates the main frame to `url`.
    fn navigate(&mut self, url: &str);
    /// Re-navigates the current document.
    fn reload(&mut self);
    /// Updates the viewport size.
    fn resize(&mut self, width: u32, height: u32);
    /// Updates the windowless frame rate.
    fn set_frame_rate(&mut self, fps: i32);
    /// Executes `script` against the main document frame. `origin` labels
    /// the script in console/error output.
    fn execute_script(&mut self, script: &str, origin: &str);
    /// Sends a pointer move with the given modifier flags.
    fn send_mouse_move(&mut self, x: i32, y: i32, modifiers: EventFlags);
    /// Sends a button press or release with an explicit click count.
    fn send_mouse_click(
        &mut self,
        x: i32,
        y: i32,
        button: MouseButton,
        is_release: bool,
        click_count: i32,
    );
    /// Sends a wheel event with per-axis deltas.
    fn send_mouse_wheel(&mut self, x: i32, y: i32, delta_v: i32, delta_h: i32);
    /// Sends a key event.
    fn send_key(&mut self, event: KeyEvent);
    /// Notifies the engine that the hosting window started moving or
    /// resizing, so popups and focus follow the overlay.
    fn notify_move_started(&mut self);
    /// Opens a debugging view anchored to this browser's native window.
    fn show_dev_tools(&mut self);
    /// Releases the native browser. Called at most once per handle.
    fn close(&mut self);
}

// ============================================================================
// Mock backend
// ============================================================================

/// One recorded handle or backend call, for assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    /// `create_windowless` was invoked.
    Create {
        /// Requested viewport width.
        width: u32,
        /// Requested viewport height.
        height: u32,
        /// Requested frame rate.
        frame_rate: i32,
    },
    /// `navigate` was invoked.
    Navigate(String),
    /// `reload` was invoked.
    Reload,
    /// `resize` was invoked.
    Resize(u32, u32),
    /// `set_frame_rate` was invoked.
    SetFrameRate(i32),
    /// `execute_script` was invoked.
    ExecuteScript {
        /// The script text.
        script: String,
        /// The origin label.
        origin: String,
    },
    /// `send_mouse_move` was invoked.
    MouseMove {
        /// X coordinate.
        x: i32,
        /// Y coordinate.
        y: i32,
        /// Modifier flags.
        modifiers: EventFlags,
    },
    /// `send_mouse_click` was invoked.
    MouseClick {
        /// X coordinate.
        x: i32,
        /// Y coordinate.
        y: i32,
        /// Button identity.
        button: MouseButton,
        /// Whether this was a release.
        is_release: bool,
        /// Forwarded click count.
        click_count: i32,
    },
    /// `send_mouse_wheel` was invoked.
    MouseWheel {
        /// X coordinate.
        x: i32,
        /// Y coordinate.
        y: i32,
        /// Vertical delta.
        delta_v: i32,
        /// Horizontal delta.
        delta_h: i32,
    },
    /// `send_key` was invoked.
    Key(KeyEvent),
    /// `notify_move_started` was invoked.
    NotifyMoveStarted,
    /// `show_dev_tools` was invoked.
    ShowDevTools,
    /// `close` was invoked.
    Close,
}

#[derive(Debug, Default)]
struct MockShared {
    calls: Mutex<Vec<RecordedCall>>,
    sender: Mutex<Option<EngineEventSender>>,
    fail_create: Mutex<bool>,
}

/// In-memory backend that records calls instead of driving an engine.
#[derive(Debug)]
pub struct MockBackend {
    shared: Arc<MockShared>,
}

impl MockBackend {
    /// Creates a backend/controller pair.
    pub fn new() -> (Self, MockEngineController) {
        let shared = Arc::new(MockShared::default());
        (
            Self {
                shared: shared.clone(),
            },
            MockEngineController { shared },
        )
    }
}

impl EngineBackend for MockBackend {
    fn create_windowless(
        &mut self,
        window: &WindowDescriptor,
        events: EngineEventSender,
    ) -> Result<Box<dyn EngineHandle>> {
        {
            let mut fail = self.shared.fail_create.lock();
            if *fail {
                *fail = false;
                return Err(Error::BrowserCreate("mock create failure".into()));
            }
        }

        self.shared.calls.lock().push(RecordedCall::Create {
            width: window.width,
            height: window.height,
            frame_rate: window.frame_rate,
        });
        *self.shared.sender.lock() = Some(events);

        debug!(width = window.width, height = window.height, "mock browser created");
        Ok(Box::new(MockHandle {
            shared: self.shared.clone(),
        }))
    }
}

struct MockHandle {
    shared: Arc<MockShared>,
}

impl MockHandle {
    fn record(&self, call: RecordedCall) {
        self.shared.calls.lock().push(call);
    }
}

impl EngineHandle for MockHandle {
    fn navigate(&mut self, url: &str) {
        self.record(RecordedCall::Navigate(url.to_string()));
    }

    fn reload(&mut self) {
        self.record(RecordedCall::Reload);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.record(RecordedCall::Resize(width, height));
    }

    fn set_frame_rate(&mut self, fps: i32) {
        self.record(RecordedCall::SetFrameRate(fps));
    }

    fn execute_script(&mut self, script: &str, origin: &str) {
        self.record(RecordedCall::ExecuteScript {
            script: script.to_string(),
            origin: origin.to_string(),
        });
    }

    fn send_mouse_move(&mut self, x: i32, y: i32, modifiers: EventFlags) {
        self.record(RecordedCall::MouseMove { x, y, modifiers });
    }

    fn send_mouse_click(
        &mut self,
        x: i32,
        y: i32,
        button: MouseButton,
        is_release: bool,
        click_count: i32,
    ) {
        self.record(RecordedCall::MouseClick {
            x,
            y,
            button,
            is_release,
            click_count,
        });
    }

    fn send_mouse_wheel(&mut self, x: i32, y: i32, delta_v: i32, delta_h: i32) {
        self.record(RecordedCall::MouseWheel {
            x,
            y,
            delta_v,
            delta_h,
        });
    }

    fn send_key(&mut self, event: KeyEvent) {
        self.record(RecordedCall::Key(event));
    }

    fn notify_move_started(&mut self) {
        self.record(RecordedCall::NotifyMoveStarted);
    }

    fn show_dev_tools(&mut self) {
        self.record(RecordedCall::ShowDevTools);
    }

    fn close(&mut self) {
        self.record(RecordedCall::Close);
    }
}

/// Test-side view of a [`MockBackend`]: inspects recorded calls and plays
/// the role of the engine's threads by firing events at the session.
#[derive(Debug, Clone)]
pub struct MockEngineController {
    shared: Arc<MockShared>,
}

impl MockEngineController {
    /// Snapshot of all recorded calls so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.shared.calls.lock().clone()
    }

    /// Number of calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&RecordedCall) -> bool) -> usize {
        self.shared.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    /// Whether a browser has been created (an event sender is wired up).
    pub fn browser_created(&self) -> bool {
        self.shared.sender.lock().is_some()
    }

    /// Makes the next `create_windowless` call fail.
    pub fn fail_next_create(&self) {
        *self.shared.fail_create.lock() = true;
    }

    /// Fires an engine event at the owning session. Returns `false` when no
    /// browser has been created yet or the session is gone.
    pub fn fire(&self, event: EngineEvent) -> bool {
        match self.shared.sender.lock().as_ref() {
            Some(sender) => {
                sender.send(event);
                true
            }
            None => false,
        }
    }

    /// Polls until the session has processed a `create_windowless` call.
    pub async fn wait_for_browser(&self) {
        while !self.browser_created() {
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
    }

    /// Polls until `predicate` matches some recorded call, panicking after
    /// a generous timeout. Test helper.
    pub async fn wait_for_call(&self, predicate: impl Fn(&RecordedCall) -> bool) {
        for _ in 0..500 {
            if self.count_calls(&predicate) > 0 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        panic!("timed out waiting for recorded call");
    }
}
