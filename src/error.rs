//! Crate-wide error type.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the renderer core.
///
/// Navigation failures are not errors in this sense: they arrive
/// asynchronously as [`BrowserEvent::Error`](crate::session::BrowserEvent)
/// and leave the session usable. The variants below cover initialization,
/// configuration and programmer-error failures that abort the call path.
#[derive(Debug, Error)]
pub enum Error {
    /// The embedded engine failed to initialize. Not retried; the host
    /// should treat rendering capability as absent.
    #[error("engine initialization failed: {0}")]
    EngineInit(String),

    /// Failed to read a settings file.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML settings.
    #[error("failed to parse TOML settings: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A settings value failed validation.
    #[error("invalid configuration: {0}")]
    Validation(String),

    /// `shutdown` was called while sessions still hold the runtime.
    #[error("cannot shut down: {0} session(s) still hold the runtime")]
    SessionsStillAlive(usize),

    /// The native browser handle could not be created.
    #[error("browser creation failed: {0}")]
    BrowserCreate(String),

    /// A value that is not a [`ScriptCallback`](crate::session::ScriptCallback)
    /// was passed to the callback-execution helper.
    #[error("invalid parameter passed for callback")]
    InvalidCallback,
}
