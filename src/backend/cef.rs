//! CEF-backed engine implementation.
//!
//! Drives Chromium Embedded Framework in off-screen mode. CEF requires its
//! message loop to be pumped from one thread, so this module runs a
//! dedicated loop thread owning every `Browser`; [`CefBackend`] and
//! [`CefHandle`] only post [`EngineCommand`]s to it. Paint, load and console
//! callbacks report back through the session's [`EngineEventSender`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, OnceLock};

use cef::{
    App, AppCallbacks, Browser, BrowserSettings, CefString, Client, ClientCallbacks,
    DisplayHandler, DisplayHandlerCallbacks, ErrorCode, Frame, LifeSpanHandler,
    LifeSpanHandlerCallbacks, LoadHandler, LoadHandlerCallbacks, LogSeverity, PaintElementType,
    Rect, RenderHandler, RenderHandlerCallbacks, ScreenInfo, Settings, TransitionType,
    WindowInfo,
};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::backend::{
    EngineBackend, EngineEvent, EngineEventSender, EngineHandle, WindowDescriptor,
};
use crate::error::{Error, Result};
use crate::input::{EventFlags, KeyEvent, KeyEventKind, MouseButton};
use crate::render::{DirtyRect, PaintFrame};
use crate::runtime::EngineSettings;

// ============================================================================
// Constants
// ============================================================================

const MESSAGE_LOOP_DELAY_MS: u64 = 10;

// ============================================================================
// Command plumbing
// ============================================================================

/// Commands executed on the CEF message loop thread.
enum EngineCommand {
    Create {
        slot: i32,
        descriptor: WindowDescriptor,
        events: EngineEventSender,
    },
    Browser {
        slot: i32,
        op: BrowserOp,
    },
    Shutdown,
}

/// Per-browser operations, mirroring [`EngineHandle`].
enum BrowserOp {
    Navigate(String),
    Reload,
    Resize(u32, u32),
    SetFrameRate(i32),
    ExecuteScript { script: String, origin: String },
    MouseMove { x: i32, y: i32, modifiers: EventFlags },
    MouseClick {
        x: i32,
        y: i32,
        button: MouseButton,
        is_release: bool,
        click_count: i32,
    },
    MouseWheel { x: i32, y: i32, delta_v: i32, delta_h: i32 },
    Key(KeyEvent),
    NotifyMoveStarted,
    ShowDevTools,
    Close,
}

static COMMAND_TX: OnceLock<mpsc::UnboundedSender<EngineCommand>> = OnceLock::new();
static SLOT_COUNTER: AtomicI32 = AtomicI32::new(1);

/// Starts the CEF loop thread and initializes the engine on it. Called once
/// by the runtime; a second call fails.
pub(crate) fn initialize_engine(settings: &EngineSettings) -> Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    COMMAND_TX
        .set(tx)
        .map_err(|_| Error::EngineInit("engine already initialized".into()))?;

    let settings = settings.clone();
    let (ready_tx, ready_rx) = std::sync::mpsc::channel();

    std::thread::Builder::new()
        .name("cef-loop".into())
        .spawn(move || {
            if let Err(e) = run_message_loop(settings, rx, ready_tx) {
                error!(error = %e, "engine loop terminated");
            }
        })
        .map_err(|e| Error::EngineInit(format!("could not spawn engine thread: {e}")))?;

    ready_rx
        .recv_timeout(std::time::Duration::from_secs(30))
        .map_err(|_| Error::EngineInit("engine did not report readiness".into()))?
}

/// Stops the loop thread. The runtime guarantees no sessions are alive.
pub(crate) fn shutdown_engine() {
    if let Some(tx) = COMMAND_TX.get() {
        let _ = tx.send(EngineCommand::Shutdown);
    }
}

// ============================================================================
// Backend and handle
// ============================================================================

/// [`EngineBackend`] over the process-wide CEF loop.
#[derive(Debug, Default)]
pub struct CefBackend;

impl CefBackend {
    /// Creates a backend. The engine runtime must already be initialized.
    pub fn new() -> Self {
        Self
    }
}

impl EngineBackend for CefBackend {
    fn create_windowless(
        &mut self,
        window: &WindowDescriptor,
        events: EngineEventSender,
    ) -> Result<Box<dyn EngineHandle>> {
        let tx = COMMAND_TX
            .get()
            .ok_or_else(|| Error::BrowserCreate("engine not initialized".into()))?
            .clone();

        let slot = SLOT_COUNTER.fetch_add(1, Ordering::SeqCst);
        tx.send(EngineCommand::Create {
            slot,
            descriptor: *window,
            events,
        })
        .map_err(|_| Error::BrowserCreate("engine loop is gone".into()))?;

        Ok(Box::new(CefHandle { slot, tx }))
    }
}

/// Handle posting per-browser operations to the loop thread.
struct CefHandle {
    slot: i32,
    tx: mpsc::UnboundedSender<EngineCommand>,
}

impl CefHandle {
    fn post(&self, op: BrowserOp) {
        // The loop thread only disappears at engine shutdown, after every
        // session is disposed.
        let _ = self.tx.send(EngineCommand::Browser {
            slot: self.slot,
            op,
        });
    }
}

impl EngineHandle for CefHandle {
    fn navigate(&mut self, url: &str) {
        self.post(BrowserOp::Navigate(url.to_string()));
    }

    fn reload(&mut self) {
        self.post(BrowserOp::Reload);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.post(BrowserOp::Resize(width, height));
    }

    fn set_frame_rate(&mut self, fps: i32) {
        self.post(BrowserOp::SetFrameRate(fps));
    }

    fn execute_script(&mut self, script: &str, origin: &str) {
        self.post(BrowserOp::ExecuteScript {
            script: script.to_string(),
            origin: origin.to_string(),
        });
    }

    fn send_mouse_move(&mut self, x: i32, y: i32, modifiers: EventFlags) {
        self.post(BrowserOp::MouseMove { x, y, modifiers });
    }

    fn send_mouse_click(
        &mut self,
        x: i32,
        y: i32,
        button: MouseButton,
        is_release: bool,
        click_count: i32,
    ) {
        self.post(BrowserOp::MouseClick {
            x,
            y,
            button,
            is_release,
            click_count,
        });
    }

    fn send_mouse_wheel(&mut self, x: i32, y: i32, delta_v: i32, delta_h: i32) {
        self.post(BrowserOp::MouseWheel {
            x,
            y,
            delta_v,
            delta_h,
        });
    }

    fn send_key(&mut self, event: KeyEvent) {
        self.post(BrowserOp::Key(event));
    }

    fn notify_move_started(&mut self) {
        self.post(BrowserOp::NotifyMoveStarted);
    }

    fn show_dev_tools(&mut self) {
        self.post(BrowserOp::ShowDevTools);
    }

    fn close(&mut self) {
        self.post(BrowserOp::Close);
    }
}

// ============================================================================
// Message loop
// ============================================================================

struct BrowserSlot {
    browser: Browser,
    viewport: Arc<RwLock<(u32, u32)>>,
}

fn run_message_loop(
    settings: EngineSettings,
    mut command_rx: mpsc::UnboundedReceiver<EngineCommand>,
    ready_tx: std::sync::mpsc::Sender<Result<()>>,
) -> Result<()> {
    let mut cef_settings = Settings::default();
    cef_settings.windowless_rendering_enabled = settings.windowless_rendering;
    cef_settings.no_sandbox = true;
    cef_settings.multi_threaded_message_loop = false;
    cef_settings.external_message_pump = true;
    cef_settings.locale = CefString::new(&settings.locale);
    cef_settings.cache_path = CefString::new(&settings.cache_path.to_string_lossy());
    cef_settings.browser_subprocess_path =
        CefString::new(&settings.subprocess_path.to_string_lossy());
    cef_settings.log_severity = LogSeverity::WARNING;

    let app = App::new(OverlayAppCallbacks {
        command_line_args: settings.command_line_args.clone(),
    });

    let context = match cef::CefContext::initialize(cef_settings, Some(app), None) {
        Ok(context) => {
            let _ = ready_tx.send(Ok(()));
            context
        }
        Err(e) => {
            let _ = ready_tx.send(Err(Error::EngineInit(format!(
                "engine initialization failed: {e}"
            ))));
            return Ok(());
        }
    };
    info!(locale = %settings.locale, "engine loop started");

    let mut slots: HashMap<i32, BrowserSlot> = HashMap::new();

    loop {
        cef::do_message_loop_work();

        match command_rx.try_recv() {
            Ok(EngineCommand::Create {
                slot,
                descriptor,
                events,
            }) => match create_browser(&descriptor, events) {
                Ok(browser_slot) => {
                    slots.insert(slot, browser_slot);
                }
                Err(e) => error!(slot, error = %e, "browser creation failed"),
            },
            Ok(EngineCommand::Browser { slot, op }) => {
                let closed = matches!(op, BrowserOp::Close);
                if let Some(browser_slot) = slots.get(&slot) {
                    apply_browser_op(browser_slot, op);
                } else {
                    debug!(slot, "operation for unknown browser dropped");
                }
                if closed {
                    slots.remove(&slot);
                }
            }
            Ok(EngineCommand::Shutdown) => break,
            Err(mpsc::error::TryRecvError::Empty) => {}
            Err(mpsc::error::TryRecvError::Disconnected) => {
                warn!("command channel disconnected");
                break;
            }
        }

        std::thread::sleep(std::time::Duration::from_millis(MESSAGE_LOOP_DELAY_MS));
    }

    for (_, slot) in slots.drain() {
        if let Some(host) = slot.browser.get_host() {
            host.close_browser(true);
        }
    }
    drop(context);
    cef::shutdown();
    info!("engine loop stopped");
    Ok(())
}

fn create_browser(descriptor: &WindowDescriptor, events: EngineEventSender) -> Result<BrowserSlot> {
    let viewport = Arc::new(RwLock::new((descriptor.width, descriptor.height)));

    let render_handler = RenderHandler::new(OverlayRenderHandler {
        viewport: viewport.clone(),
        events: events.clone(),
    });
    let life_span_handler = LifeSpanHandler::new(OverlayLifeSpanHandler {
        events: events.clone(),
    });
    let load_handler = LoadHandler::new(OverlayLoadHandler {
        events: events.clone(),
    });
    let display_handler = DisplayHandler::new(OverlayDisplayHandler { events });

    let client = Client::new(OverlayClientCallbacks {
        render_handler,
        life_span_handler,
        load_handler,
        display_handler,
    });

    let mut browser_settings = BrowserSettings::default();
    browser_settings.windowless_frame_rate = descriptor.frame_rate;

    let window_info = WindowInfo {
        bounds: Rect {
            x: 0,
            y: 0,
            width: descriptor.width as i32,
            height: descriptor.height as i32,
        },
        ..WindowInfo::default()
    }
    .set_as_windowless(0);

    // Navigation happens later through the handle; the initial document is
    // blank so load events line up with the deferred URL.
    let browser = Browser::create(
        &window_info,
        &client,
        &CefString::new("about:blank"),
        &browser_settings,
        None,
        None,
    )
    .map_err(|e| Error::BrowserCreate(format!("{e}")))?;

    Ok(BrowserSlot { browser, viewport })
}

fn apply_browser_op(slot: &BrowserSlot, op: BrowserOp) {
    let browser = &slot.browser;
    match op {
        BrowserOp::Navigate(url) => {
            if let Some(frame) = browser.get_main_frame() {
                frame.load_url(&CefString::new(&url));
            }
        }
        BrowserOp::Reload => browser.reload(),
        BrowserOp::Resize(width, height) => {
            *slot.viewport.write() = (width, height);
            if let Some(host) = browser.get_host() {
                host.was_resized();
            }
        }
        BrowserOp::SetFrameRate(fps) => {
            if let Some(host) = browser.get_host() {
                host.set_windowless_frame_rate(fps);
            }
        }
        BrowserOp::ExecuteScript { script, origin } => {
            if let Some(frame) = browser.get_main_frame() {
                frame.execute_java_script(&CefString::new(&script), &origin, 0);
            }
        }
        BrowserOp::MouseMove { x, y, modifiers } => {
            if let Some(host) = browser.get_host() {
                host.send_mouse_move_event(
                    &cef::MouseEvent { x, y, modifiers },
                    false,
                );
            }
        }
        BrowserOp::MouseClick {
            x,
            y,
            button,
            is_release,
            click_count,
        } => {
            if let Some(host) = browser.get_host() {
                host.send_mouse_click_event(
                    &cef::MouseEvent { x, y, modifiers: 0 },
                    button_type(button),
                    is_release,
                    click_count,
                );
            }
        }
        BrowserOp::MouseWheel {
            x,
            y,
            delta_v,
            delta_h,
        } => {
            if let Some(host) = browser.get_host() {
                host.send_mouse_wheel_event(
                    &cef::MouseEvent { x, y, modifiers: 0 },
                    delta_h,
                    delta_v,
                );
            }
        }
        BrowserOp::Key(event) => {
            if let Some(host) = browser.get_host() {
                host.send_key_event(&key_event(&event));
            }
        }
        BrowserOp::NotifyMoveStarted => {
            if let Some(host) = browser.get_host() {
                host.notify_move_or_resize_started();
            }
        }
        BrowserOp::ShowDevTools => {
            if let Some(host) = browser.get_host() {
                host.show_dev_tools(None, None, None, None);
            }
        }
        BrowserOp::Close => {
            if let Some(host) = browser.get_host() {
                host.close_browser(true);
            }
        }
    }
}

fn button_type(button: MouseButton) -> cef::MouseButtonType {
    match button {
        MouseButton::Left => cef::MouseButtonType::Left,
        MouseButton::Middle => cef::MouseButtonType::Middle,
        MouseButton::Right => cef::MouseButtonType::Right,
    }
}

fn key_event(event: &KeyEvent) -> cef::KeyEvent {
    cef::KeyEvent {
        event_type: match event.kind {
            KeyEventKind::RawKeyDown => cef::KeyEventType::RawKeyDown,
            KeyEventKind::KeyDown => cef::KeyEventType::KeyDown,
            KeyEventKind::KeyUp => cef::KeyEventType::KeyUp,
            KeyEventKind::Char => cef::KeyEventType::Char,
        },
        modifiers: event.modifiers,
        windows_key_code: event.key_code,
        native_key_code: event.native_key_code,
        is_system_key: event.is_system_key,
        character: event.key_code as u16,
        unmodified_character: event.key_code as u16,
        focus_on_editable_field: false,
    }
}

// ============================================================================
// CEF callbacks
// ============================================================================

struct OverlayAppCallbacks {
    command_line_args: Vec<(String, String)>,
}

impl AppCallbacks for OverlayAppCallbacks {
    fn on_before_command_line_processing(
        &self,
        _process_type: &CefString,
        command_line: &mut cef::command_line::CommandLine,
    ) {
        for (name, value) in &self.command_line_args {
            command_line.append_switch(name, value);
        }
    }
}

struct OverlayClientCallbacks {
    render_handler: RenderHandler,
    life_span_handler: LifeSpanHandler,
    load_handler: LoadHandler,
    display_handler: DisplayHandler,
}

impl ClientCallbacks for OverlayClientCallbacks {
    fn get_render_handler(&self) -> Option<RenderHandler> {
        Some(self.render_handler.clone())
    }

    fn get_life_span_handler(&self) -> Option<LifeSpanHandler> {
        Some(self.life_span_handler.clone())
    }

    fn get_load_handler(&self) -> Option<LoadHandler> {
        Some(self.load_handler.clone())
    }

    fn get_display_handler(&self) -> Option<DisplayHandler> {
        Some(self.display_handler.clone())
    }
}

struct OverlayRenderHandler {
    viewport: Arc<RwLock<(u32, u32)>>,
    events: EngineEventSender,
}

impl RenderHandlerCallbacks for OverlayRenderHandler {
    fn get_view_rect(&self, _browser: &Browser) -> Rect {
        let (width, height) = *self.viewport.read();
        Rect {
            x: 0,
            y: 0,
            width: width as i32,
            height: height as i32,
        }
    }

    fn get_screen_info(&self, _browser: &Browser) -> Option<ScreenInfo> {
        let (width, height) = *self.viewport.read();
        let rect = Rect {
            x: 0,
            y: 0,
            width: width as i32,
            height: height as i32,
        };
        Some(ScreenInfo {
            device_scale_factor: 1.0,
            depth: 32,
            depth_per_component: 8,
            is_monochrome: false,
            rect,
            available_rect: rect,
        })
    }

    fn on_paint(
        &self,
        _browser: &Browser,
        element_type: PaintElementType,
        dirty_rects: &[Rect],
        buffer: &[u8],
        width: i32,
        height: i32,
    ) {
        if element_type != PaintElementType::View {
            return;
        }

        // The engine may report several dirty rects per paint; the host
        // model carries one, so they are folded into their bounding box.
        let dirty = dirty_rects
            .iter()
            .map(|r| DirtyRect::new(r.x, r.y, r.width, r.height))
            .reduce(|a, b| a.union(&b))
            .unwrap_or_else(|| DirtyRect::full(width, height));

        self.events.send(EngineEvent::Paint(PaintFrame {
            buffer: buffer.to_vec(),
            dirty,
            width: width as u32,
            height: height as u32,
        }));
    }
}

struct OverlayLifeSpanHandler {
    events: EngineEventSender,
}

impl LifeSpanHandlerCallbacks for OverlayLifeSpanHandler {
    fn on_after_created(&self, _browser: &Browser) {
        self.events.send(EngineEvent::Created);
    }

    fn on_before_close(&self, _browser: &Browser) {
        debug!("browser closed");
    }

    fn do_close(&self, _browser: &Browser) -> bool {
        false
    }
}

struct OverlayLoadHandler {
    events: EngineEventSender,
}

impl LoadHandlerCallbacks for OverlayLoadHandler {
    fn on_load_start(&self, _browser: &Browser, frame: &Frame, _transition: TransitionType) {
        if frame.is_main() {
            self.events.send(EngineEvent::LoadStart {
                url: frame.get_url().to_string(),
            });
        }
    }

    fn on_load_end(&self, _browser: &Browser, frame: &Frame, http_status_code: i32) {
        if frame.is_main() {
            self.events.send(EngineEvent::LoadEnd {
                url: frame.get_url().to_string(),
                http_status: http_status_code,
            });
        }
    }

    fn on_load_error(
        &self,
        _browser: &Browser,
        frame: &Frame,
        error_code: ErrorCode,
        error_text: &CefString,
        failed_url: &CefString,
    ) {
        if frame.is_main() {
            self.events.send(EngineEvent::LoadError {
                error_code: error_code as i32,
                error_text: error_text.to_string(),
                failed_url: failed_url.to_string(),
            });
        }
    }
}

struct OverlayDisplayHandler {
    events: EngineEventSender,
}

impl DisplayHandlerCallbacks for OverlayDisplayHandler {
    fn on_console_message(
        &self,
        _browser: &Browser,
        _level: LogSeverity,
        message: &CefString,
        source: &CefString,
        line: i32,
    ) -> bool {
        self.events.send(EngineEvent::ConsoleMessage {
            message: message.to_string(),
            source: source.to_string(),
            line,
        });
        false
    }
}
