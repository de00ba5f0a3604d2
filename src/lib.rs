//! # overlay-renderer
//!
//! Off-screen browser rendering for in-game overlays. Each overlay window is
//! backed by an embedded browser painted into a pixel buffer; this crate
//! owns the browser lifecycle, bridges host input into the page, injects
//! host API scripts at the right moment and streams paint frames back to
//! the host compositor.
//!
//! ## Architecture
//!
//! - [`runtime`] - explicit engine runtime, initialized once per process
//! - [`session`] - one actor-backed [`BrowserSession`](session::BrowserSession) per overlay
//! - [`backend`] - engine abstraction, with a mock for tests and a CEF
//!   implementation behind the `cef-backend` feature
//! - [`input`] - host input translation, including multi-click detection
//! - [`render`] - paint frame and dirty rect types
//! - [`config`] - file/env configuration layer
//!
//! ## Example
//!
//! ```rust,no_run
//! use overlay_renderer::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> overlay_renderer::Result<()> {
//!     let runtime = EngineRuntime::initialize(RuntimeConfig::new("/opt/overlay"))?;
//!
//!     let (backend, _controller) = MockBackend::new();
//!     let (session, mut events) = BrowserSession::spawn(
//!         runtime.clone(),
//!         SessionConfig::new("mini-parse"),
//!         Box::new(backend),
//!     );
//!
//!     session.begin_render(400, 300, "https://overlay.example/mini-parse");
//!     while let Some(event) = events.recv().await {
//!         if let BrowserEvent::Paint(frame) = event {
//!             println!("frame {}x{}", frame.width, frame.height);
//!             break;
//!         }
//!     }
//!
//!     session.dispose();
//!     drop(session);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod input;
pub mod render;
pub mod runtime;
pub mod session;

pub use error::{Error, Result};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Common imports for hosts embedding the renderer.
pub mod prelude {
    pub use crate::backend::{EngineBackend, EngineHandle, MockBackend, WindowDescriptor};
    pub use crate::config::RendererSettings;
    pub use crate::error::{Error, Result};
    pub use crate::input::{KeyEvent, KeyEventKind, MouseButton};
    pub use crate::render::{DirtyRect, PaintFrame};
    pub use crate::runtime::{EngineRuntime, RuntimeConfig};
    pub use crate::session::{BrowserEvent, BrowserSession, SessionConfig};

    #[cfg(feature = "cef-backend")]
    pub use crate::backend::cef::CefBackend;
}
