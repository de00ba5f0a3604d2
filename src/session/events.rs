//! Host-facing session events.

use crate::render::PaintFrame;

/// Events delivered to the host on the receiver returned by
/// [`BrowserSession::spawn`](crate::session::BrowserSession::spawn).
///
/// Delivery is FIFO per session; no ordering is guaranteed across sessions.
/// Events originate on engine-owned threads and are serialized through the
/// session's message queue before reaching the host.
#[derive(Debug, Clone)]
pub enum BrowserEvent {
    /// A main-frame navigation started. `status` is always 0 at this point.
    StartLoading {
        /// Placeholder status code (0).
        status: i32,
        /// URL being loaded.
        url: String,
    },
    /// A main-frame navigation finished.
    Load {
        /// HTTP status code of the response.
        http_status: i32,
        /// URL that finished loading.
        url: String,
    },
    /// A main-frame navigation failed. Non-fatal; the session retries only
    /// if the host issues another `load`.
    Error {
        /// Engine error code.
        error_code: i32,
        /// Engine error description.
        error_text: String,
        /// URL that failed to load.
        failed_url: String,
    },
    /// Page script wrote to the console.
    ConsoleLog {
        /// Message text.
        message: String,
        /// Script source (URL or tag).
        source: String,
        /// Source line number.
        line: i32,
    },
    /// The engine painted a new frame (32-bit BGRA, premultiplied alpha).
    Paint(PaintFrame),
}
