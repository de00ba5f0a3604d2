//! Browser sessions.
//!
//! A [`BrowserSession`] owns exactly one embedded off-screen browser and is
//! the surface the host calls. Internally every host call and every engine
//! callback becomes a [`SessionMessage`] on one unbounded queue, consumed by
//! a single actor task that owns all mutable session state. That single
//! consumer is what makes the pending-URL slot, the script queue and the
//! click state safe without locks: engine threads and host threads only
//! ever touch the queue.
//!
//! Host calls are fire-and-forget. Results and failures come back on the
//! event receiver returned by [`BrowserSession::spawn`], FIFO per session.
//!
//! # Submodules
//!
//! - [`lifecycle`] - creation/navigation state machine
//! - [`scripts`] - script injection queue and callback helper
//! - [`events`] - host-facing event enum

pub mod events;
pub mod lifecycle;
pub mod scripts;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::{EngineBackend, EngineEvent, EngineEventSender, EngineHandle, WindowDescriptor};
use crate::input::{InputForwarder, KeyEvent, MouseButton, DEFAULT_DOUBLE_CLICK_INTERVAL};
use crate::runtime::EngineRuntime;

pub use events::BrowserEvent;
pub use lifecycle::{FrameLifecycleTracker, LifecyclePhase};
pub use scripts::{build_init_script, execute_callback, ScriptCallback, ScriptInjectionQueue};

/// Default windowless frame rate when the host does not specify one.
pub const DEFAULT_FRAME_RATE: i32 = 30;

/// Per-session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Overlay name recorded on the bound API object.
    pub overlay_name: String,
    /// JavaScript name under which the host API object is bound.
    pub api_object_name: String,
    /// Gesture window for multi-click detection.
    pub double_click_interval: Duration,
}

impl SessionConfig {
    /// Creates a configuration for the named overlay with defaults.
    pub fn new(overlay_name: impl Into<String>) -> Self {
        Self {
            overlay_name: overlay_name.into(),
            api_object_name: "OverlayApi".into(),
            double_click_interval: DEFAULT_DOUBLE_CLICK_INTERVAL,
        }
    }

    /// Sets the API object name.
    pub fn with_api_object(mut self, name: impl Into<String>) -> Self {
        self.api_object_name = name.into();
        self
    }

    /// Sets the double-click interval.
    pub fn with_double_click_interval(mut self, interval: Duration) -> Self {
        self.double_click_interval = interval;
        self
    }
}

/// Messages consumed by a session's actor task.
///
/// Host operations and engine callbacks share this one queue; processing
/// order is queue order.
#[derive(Debug)]
pub(crate) enum SessionMessage {
    BeginRender {
        width: u32,
        height: u32,
        url: String,
        max_frame_rate: i32,
    },
    EndRender,
    Load {
        url: String,
    },
    Reload,
    Resize {
        width: u32,
        height: u32,
    },
    SetMaxFramerate {
        fps: i32,
    },
    SetVisible {
        visible: bool,
    },
    PointerMove {
        x: i32,
        y: i32,
        button: Option<MouseButton>,
    },
    PointerButton {
        x: i32,
        y: i32,
        button: MouseButton,
        is_release: bool,
        at: Instant,
    },
    Wheel {
        x: i32,
        y: i32,
        delta: i32,
        is_vertical: bool,
    },
    Key {
        event: KeyEvent,
    },
    NotifyMoveStarted,
    ShowDevTools {
        first_window: bool,
    },
    ExecuteScript {
        script: String,
    },
    Dispose,
    Engine(EngineEvent),
}

/// Handle to one off-screen browser session.
///
/// Cheap to call from any thread; every method posts a message and returns
/// immediately. Dropping the handle disposes the session.
#[derive(Debug)]
pub struct BrowserSession {
    id: Uuid,
    tx: mpsc::UnboundedSender<SessionMessage>,
    runtime: Arc<EngineRuntime>,
}

impl BrowserSession {
    /// Spawns a session actor over `backend` and returns the host handle
    /// plus the event receiver.
    ///
    /// Holding `runtime` ties the session's lifetime to the engine runtime:
    /// [`EngineRuntime::shutdown`] refuses to run while sessions are alive.
    pub fn spawn(
        runtime: Arc<EngineRuntime>,
        config: SessionConfig,
        backend: Box<dyn EngineBackend>,
    ) -> (Self, mpsc::UnboundedReceiver<BrowserEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let core = SessionCore::new(id, config, backend, tx.clone(), event_tx);
        tokio::spawn(run_session(core, rx));

        info!(session = %id, "browser session spawned");
        (Self { id, tx, runtime }, event_rx)
    }

    /// This session's identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The runtime this session was created against.
    pub fn runtime(&self) -> &Arc<EngineRuntime> {
        &self.runtime
    }

    fn post(&self, message: SessionMessage) {
        // A closed channel means the session is disposed; calls after
        // disposal are defined no-ops.
        let _ = self.tx.send(message);
    }

    /// Creates the off-screen browser at the default frame rate and defers
    /// navigation to `url` until the handle can accept it.
    pub fn begin_render(&self, width: u32, height: u32, url: impl Into<String>) {
        self.begin_render_with_frame_rate(width, height, url, DEFAULT_FRAME_RATE);
    }

    /// Creates the off-screen browser with an explicit frame rate. Any
    /// previous browser is released first.
    pub fn begin_render_with_frame_rate(
        &self,
        width: u32,
        height: u32,
        url: impl Into<String>,
        max_frame_rate: i32,
    ) {
        self.post(SessionMessage::BeginRender {
            width,
            height,
            url: url.into(),
            max_frame_rate,
        });
    }

    /// Releases the native browser without disposing the session.
    pub fn end_render(&self) {
        self.post(SessionMessage::EndRender);
    }

    /// Navigates to `url`, deferring until the next load-end if the browser
    /// is not ready yet. The most recent deferred request wins.
    pub fn load(&self, url: impl Into<String>) {
        self.post(SessionMessage::Load { url: url.into() });
    }

    /// Re-navigates the current document. No-op before the browser exists.
    pub fn reload(&self) {
        self.post(SessionMessage::Reload);
    }

    /// Updates the viewport size. Recorded even before the browser exists
    /// and applied at creation.
    pub fn resize(&self, width: u32, height: u32) {
        self.post(SessionMessage::Resize { width, height });
    }

    /// Updates the windowless frame rate. Only effective once the browser
    /// is created.
    pub fn set_max_framerate(&self, fps: i32) {
        self.post(SessionMessage::SetMaxFramerate { fps });
    }

    /// Visibility hint. Currently inert beyond the handle check; see the
    /// session core for why.
    pub fn set_visible(&self, visible: bool) {
        self.post(SessionMessage::SetVisible { visible });
    }

    /// Forwards a pointer move with the held button as modifier.
    pub fn pointer_move(&self, x: i32, y: i32, button: Option<MouseButton>) {
        self.post(SessionMessage::PointerMove { x, y, button });
    }

    /// Forwards a button press (`is_release = false`) or release, with
    /// multi-click detection.
    pub fn pointer_button(&self, x: i32, y: i32, button: MouseButton, is_release: bool) {
        self.post(SessionMessage::PointerButton {
            x,
            y,
            button,
            is_release,
            at: Instant::now(),
        });
    }

    /// Forwards a wheel event.
    pub fn wheel(&self, x: i32, y: i32, delta: i32, is_vertical: bool) {
        self.post(SessionMessage::Wheel {
            x,
            y,
            delta,
            is_vertical,
        });
    }

    /// Forwards a key event. Gated only on handle presence, not readiness.
    pub fn key(&self, event: KeyEvent) {
        self.post(SessionMessage::Key { event });
    }

    /// Tells the engine the overlay window started moving or resizing, so
    /// it can dismiss popups and reposition widgets. Only effective once the
    /// browser is created.
    pub fn notify_move_started(&self) {
        self.post(SessionMessage::NotifyMoveStarted);
    }

    /// Opens the engine's debugging view for this browser.
    ///
    /// `first_window` mirrors the anchor-window choice windowed hosts make;
    /// off-screen browsers have no native anchor, so the flag carries no
    /// behavior here.
    pub fn show_dev_tools(&self, first_window: bool) {
        self.post(SessionMessage::ShowDevTools { first_window });
    }

    /// Executes `script` against the main frame, or queues it until the
    /// next load start when no page context exists yet.
    pub fn execute_script(&self, script: impl Into<String>) {
        self.post(SessionMessage::ExecuteScript {
            script: script.into(),
        });
    }

    /// Disposes the session, releasing the native browser exactly once.
    /// Safe to call repeatedly; also invoked on drop.
    pub fn dispose(&self) {
        self.post(SessionMessage::Dispose);
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        let _ = self.tx.send(SessionMessage::Dispose);
    }
}

async fn run_session(mut core: SessionCore, mut rx: mpsc::UnboundedReceiver<SessionMessage>) {
    while let Some(message) = rx.recv().await {
        if !core.handle_message(message) {
            break;
        }
    }
    core.dispose();
}

/// Owns all mutable state of one session. Only ever touched by the actor
/// task, which is the single-writer guarantee the state relies on.
struct SessionCore {
    id: Uuid,
    config: SessionConfig,
    backend: Box<dyn EngineBackend>,
    handle: Option<Box<dyn EngineHandle>>,
    lifecycle: FrameLifecycleTracker,
    scripts: ScriptInjectionQueue,
    input: InputForwarder,
    /// Recorded viewport; set by `resize` and preserved across browser
    /// re-creation. Wins over `begin_render`'s own dimensions.
    viewport: Option<(u32, u32)>,
    engine_tx: mpsc::UnboundedSender<SessionMessage>,
    events: mpsc::UnboundedSender<BrowserEvent>,
    disposed: bool,
}

impl SessionCore {
    fn new(
        id: Uuid,
        config: SessionConfig,
        backend: Box<dyn EngineBackend>,
        engine_tx: mpsc::UnboundedSender<SessionMessage>,
        events: mpsc::UnboundedSender<BrowserEvent>,
    ) -> Self {
        let input = InputForwarder::with_double_click_interval(config.double_click_interval);
        Self {
            id,
            config,
            backend,
            handle: None,
            lifecycle: FrameLifecycleTracker::new(),
            scripts: ScriptInjectionQueue::new(),
            input,
            viewport: None,
            engine_tx,
            events,
            disposed: false,
        }
    }

    /// Processes one message; returns `false` when the actor should stop.
    fn handle_message(&mut self, message: SessionMessage) -> bool {
        match message {
            SessionMessage::BeginRender {
                width,
                height,
                url,
                max_frame_rate,
            } => self.begin_render(width, height, url, max_frame_rate),
            SessionMessage::EndRender => self.release_handle(),
            SessionMessage::Load { url } => self.load(url),
            SessionMessage::Reload => {
                if let Some(handle) = self.ready_handle() {
                    handle.reload();
                }
            }
            SessionMessage::Resize { width, height } => {
                self.viewport = Some((width, height));
                if let Some(handle) = self.handle.as_deref_mut() {
                    handle.resize(width, height);
                }
            }
            SessionMessage::SetMaxFramerate { fps } => {
                if let Some(handle) = self.ready_handle() {
                    handle.set_frame_rate(fps.clamp(1, 60));
                }
            }
            SessionMessage::SetVisible { visible } => {
                // Hiding the browser makes the engine stop emitting paint
                // callbacks and they do not always resume on unhide, so the
                // hint stays inert beyond the handle check.
                if self.ready_handle().is_some() {
                    debug!(session = %self.id, visible, "visibility hint ignored");
                }
            }
            SessionMessage::PointerMove { x, y, button } => {
                let input = &mut self.input;
                if self.lifecycle.is_ready() {
                    if let Some(handle) = self.handle.as_deref_mut() {
                        input.pointer_move(handle, x, y, button);
                    }
                }
            }
            SessionMessage::PointerButton {
                x,
                y,
                button,
                is_release,
                at,
            } => {
                let input = &mut self.input;
                if self.lifecycle.is_ready() {
                    if let Some(handle) = self.handle.as_deref_mut() {
                        input.pointer_button(handle, x, y, button, is_release, at);
                    }
                }
            }
            SessionMessage::Wheel {
                x,
                y,
                delta,
                is_vertical,
            } => {
                let input = &mut self.input;
                if self.lifecycle.is_ready() {
                    if let Some(handle) = self.handle.as_deref_mut() {
                        input.wheel(handle, x, y, delta, is_vertical);
                    }
                }
            }
            SessionMessage::Key { event } => {
                // Key events skip the readiness check; handle presence is
                // the only gate.
                let input = &mut self.input;
                if let Some(handle) = self.handle.as_deref_mut() {
                    input.key(handle, event);
                }
            }
            SessionMessage::NotifyMoveStarted => {
                if let Some(handle) = self.ready_handle() {
                    handle.notify_move_started();
                }
            }
            SessionMessage::ShowDevTools { first_window: _ } => {
                if let Some(handle) = self.handle.as_deref_mut() {
                    handle.show_dev_tools();
                }
            }
            SessionMessage::ExecuteScript { script } => self.execute_script(script),
            SessionMessage::Dispose => {
                self.dispose();
                return false;
            }
            SessionMessage::Engine(event) => self.handle_engine_event(event),
        }
        true
    }

    fn begin_render(&mut self, width: u32, height: u32, url: String, max_frame_rate: i32) {
        // Release any previous browser before allocating the next one;
        // exactly one native handle is alive per session.
        self.release_handle();

        let (width, height) = self.viewport.unwrap_or((width, height));
        self.viewport = Some((width, height));

        let descriptor = WindowDescriptor::new(width, height, max_frame_rate.clamp(1, 60));
        let events = EngineEventSender::new(self.engine_tx.clone());

        match self.backend.create_windowless(&descriptor, events) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.lifecycle.begin_render(&url);
                info!(session = %self.id, width, height, url = %url, "off-screen browser requested");
            }
            Err(e) => {
                // Not retried; the session stays alive but will not produce
                // frames until the host asks again.
                error!(session = %self.id, error = %e, "browser creation failed");
            }
        }
    }

    fn release_handle(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
            debug!(session = %self.id, "native browser released");
        }
        self.lifecycle.reset();
    }

    fn load(&mut self, url: String) {
        if self.lifecycle.is_ready() {
            if let Some(handle) = self.handle.as_deref_mut() {
                debug!(session = %self.id, url = %url, "navigating");
                handle.navigate(&url);
                return;
            }
        }
        debug!(session = %self.id, url = %url, "navigation deferred until next load end");
        self.lifecycle.defer_navigation(url);
    }

    fn execute_script(&mut self, script: String) {
        if self.lifecycle.is_ready() {
            if let Some(handle) = self.handle.as_deref_mut() {
                handle.execute_script(&script, "injected");
                return;
            }
        }
        self.scripts.enqueue(script);
    }

    fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Created => {
                debug!(session = %self.id, "browser created");
                self.lifecycle.mark_created();
            }
            EngineEvent::LoadStart { url } => {
                if let Some(handle) = self.handle.as_deref_mut() {
                    let init = build_init_script(
                        &self.config.api_object_name,
                        &self.config.overlay_name,
                    );
                    self.scripts.flush(handle, &init);
                }
                self.lifecycle.on_load_start();
                self.emit(BrowserEvent::StartLoading { status: 0, url });
            }
            EngineEvent::LoadEnd { url, http_status } => {
                if let Some(pending) = self.lifecycle.on_load_end() {
                    if let Some(handle) = self.handle.as_deref_mut() {
                        debug!(session = %self.id, url = %pending, "resolving deferred navigation");
                        handle.navigate(&pending);
                    }
                }
                self.emit(BrowserEvent::Load { http_status, url });
            }
            EngineEvent::LoadError {
                error_code,
                error_text,
                failed_url,
            } => {
                warn!(session = %self.id, error_code, url = %failed_url, "load error");
                self.lifecycle.on_load_error();
                self.emit(BrowserEvent::Error {
                    error_code,
                    error_text,
                    failed_url,
                });
            }
            EngineEvent::ConsoleMessage {
                message,
                source,
                line,
            } => {
                self.emit(BrowserEvent::ConsoleLog {
                    message,
                    source,
                    line,
                });
            }
            EngineEvent::Paint(frame) => {
                self.emit(BrowserEvent::Paint(frame));
            }
        }
    }

    fn emit(&self, event: BrowserEvent) {
        // The host may have dropped its receiver; that only mutes events.
        let _ = self.events.send(event);
    }

    fn ready_handle(&mut self) -> Option<&mut (dyn EngineHandle + 'static)> {
        if self.lifecycle.is_ready() {
            self.handle.as_deref_mut()
        } else {
            None
        }
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
        self.lifecycle.reset();
        info!(session = %self.id, "session disposed");
    }
}
