//! Host input translation.
//!
//! Overlay windows receive pointer and keyboard input from the host window
//! system, not from the engine. [`InputForwarder`] translates those events
//! into the engine's event model: pointer moves carry the held button as a
//! modifier flag, click events carry a reconstructed multi-click count (the
//! engine has no native gesture detection off-screen), wheel deltas are
//! split by axis, and key events pass through untouched.
//!
//! # Submodules
//!
//! - [`click`] - multi-click continuity tracking

pub mod click;

use std::time::Instant;

use crate::backend::EngineHandle;

pub use click::{ClickTracker, DEFAULT_DOUBLE_CLICK_INTERVAL};

/// Bitmask of engine event flags.
pub type EventFlags = u32;

/// No modifier flags set.
pub const EVENTFLAG_NONE: EventFlags = 0;
/// Left mouse button held.
pub const EVENTFLAG_LEFT_MOUSE_BUTTON: EventFlags = 1 << 4;
/// Middle mouse button held.
pub const EVENTFLAG_MIDDLE_MOUSE_BUTTON: EventFlags = 1 << 5;
/// Right mouse button held.
pub const EVENTFLAG_RIGHT_MOUSE_BUTTON: EventFlags = 1 << 6;

/// Mouse button identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Left mouse button (primary click).
    Left,
    /// Middle mouse button (wheel click).
    Middle,
    /// Right mouse button (context menu).
    Right,
}

impl MouseButton {
    /// Returns the event flag signalling this button is held.
    pub fn held_flag(&self) -> EventFlags {
        match self {
            MouseButton::Left => EVENTFLAG_LEFT_MOUSE_BUTTON,
            MouseButton::Middle => EVENTFLAG_MIDDLE_MOUSE_BUTTON,
            MouseButton::Right => EVENTFLAG_RIGHT_MOUSE_BUTTON,
        }
    }
}

impl std::fmt::Display for MouseButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MouseButton::Left => write!(f, "left"),
            MouseButton::Middle => write!(f, "middle"),
            MouseButton::Right => write!(f, "right"),
        }
    }
}

/// Key event direction/kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    /// Untranslated key press.
    RawKeyDown,
    /// Translated key press.
    KeyDown,
    /// Key release.
    KeyUp,
    /// Character input.
    Char,
}

/// Host-supplied key event record, forwarded to the engine verbatim.
///
/// No translation is performed here; the host is responsible for producing
/// key codes in whatever scheme its window system uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// The kind of key event.
    pub kind: KeyEventKind,
    /// Virtual key code.
    pub key_code: i32,
    /// Platform-specific key code.
    pub native_key_code: i32,
    /// Combination of `EVENTFLAG_*` constants.
    pub modifiers: EventFlags,
    /// Whether this is a system key (Alt combinations on Windows).
    pub is_system_key: bool,
}

impl KeyEvent {
    /// Creates a key event with no modifiers.
    pub fn new(kind: KeyEventKind, key_code: i32) -> Self {
        Self {
            kind,
            key_code,
            native_key_code: 0,
            modifiers: EVENTFLAG_NONE,
            is_system_key: false,
        }
    }

    /// Sets the native key code.
    pub fn with_native_key_code(mut self, code: i32) -> Self {
        self.native_key_code = code;
        self
    }

    /// Adds a modifier flag.
    pub fn with_modifier(mut self, flag: EventFlags) -> Self {
        self.modifiers |= flag;
        self
    }

    /// Marks this as a system key event.
    pub fn as_system_key(mut self) -> Self {
        self.is_system_key = true;
        self
    }
}

/// Translates host input events into engine events for one session.
///
/// The forwarder never checks handle presence itself; the owning session
/// only calls it once the gating rules are satisfied (see the session
/// documentation for which operations require a created browser).
#[derive(Debug, Default)]
pub struct InputForwarder {
    clicks: ClickTracker,
}

impl InputForwarder {
    /// Creates a forwarder with the default double-click interval.
    pub fn new() -> Self {
        Self {
            clicks: ClickTracker::new(),
        }
    }

    /// Creates a forwarder with a custom double-click interval.
    pub fn with_double_click_interval(interval: std::time::Duration) -> Self {
        Self {
            clicks: ClickTracker::with_interval(interval),
        }
    }

    /// Forwards a pointer move. The held button (if any) becomes the sole
    /// modifier flag; click state is untouched.
    pub fn pointer_move(
        &mut self,
        handle: &mut dyn EngineHandle,
        x: i32,
        y: i32,
        button: Option<MouseButton>,
    ) {
        let modifiers = button.map_or(EVENTFLAG_NONE, |b| b.held_flag());
        handle.send_mouse_move(x, y, modifiers);
    }

    /// Forwards a button press or release with the reconstructed click count.
    ///
    /// Presses recompute continuity; releases reuse the previous count. Both
    /// directions update the recorded click state afterwards. The event
    /// itself carries no modifier flags.
    pub fn pointer_button(
        &mut self,
        handle: &mut dyn EngineHandle,
        x: i32,
        y: i32,
        button: MouseButton,
        is_release: bool,
        now: Instant,
    ) {
        let click_count = if is_release {
            self.clicks.register_release(x, y, button, now)
        } else {
            self.clicks.register_press(x, y, button, now)
        };

        handle.send_mouse_click(x, y, button, is_release, click_count);
    }

    /// Forwards a wheel event, splitting the delta by axis.
    pub fn wheel(
        &mut self,
        handle: &mut dyn EngineHandle,
        x: i32,
        y: i32,
        delta: i32,
        is_vertical: bool,
    ) {
        let (delta_v, delta_h) = if is_vertical { (delta, 0) } else { (0, delta) };
        handle.send_mouse_wheel(x, y, delta_v, delta_h);
    }

    /// Forwards a key event verbatim.
    pub fn key(&mut self, handle: &mut dyn EngineHandle, event: KeyEvent) {
        handle.send_key(event);
    }
}
