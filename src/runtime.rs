//! Engine runtime lifecycle.
//!
//! The embedded engine is a process-wide singleton underneath, but callers
//! interact with it through an explicit [`EngineRuntime`] value instead of a
//! hidden global flag. Sessions hold an `Arc` of the runtime, which makes
//! the lifetime relationship checkable: [`EngineRuntime::shutdown`] consumes
//! the last handle and refuses to run while any session is still alive.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{Error, Result};

/// Locale the engine falls back to when no localized resources exist.
pub const FALLBACK_LOCALE: &str = "en-US";

/// Host-level configuration for engine initialization.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Directory holding engine binaries and resources. Locale packs and
    /// the render subprocess live under its `x64`/`x86` subdirectory.
    pub plugin_directory: PathBuf,
    /// Explicit locale, skipping environment detection.
    pub locale_override: Option<String>,
    /// Browser cache location. Defaults to `<plugin_directory>/Cache`.
    pub cache_directory: Option<PathBuf>,
    /// Whether pages may produce sound.
    pub enable_audio: bool,
}

impl RuntimeConfig {
    /// Creates a configuration rooted at `plugin_directory` with audio on.
    pub fn new(plugin_directory: impl Into<PathBuf>) -> Self {
        Self {
            plugin_directory: plugin_directory.into(),
            locale_override: None,
            cache_directory: None,
            enable_audio: true,
        }
    }

    /// Forces a specific locale.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale_override = Some(locale.into());
        self
    }

    /// Overrides the cache directory.
    pub fn with_cache_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_directory = Some(dir.into());
        self
    }

    /// Enables or disables page audio.
    pub fn with_audio(mut self, enable: bool) -> Self {
        self.enable_audio = enable;
        self
    }
}

/// Fully resolved settings handed to the engine at initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Resolved UI locale, guaranteed to have resources on disk (or the
    /// fallback).
    pub locale: String,
    /// Browser cache directory.
    pub cache_path: PathBuf,
    /// Render subprocess binary, picked by pointer width.
    pub subprocess_path: PathBuf,
    /// Extra command line switches appended to every engine process.
    pub command_line_args: Vec<(String, String)>,
    /// Off-screen rendering. Always true for this crate.
    pub windowless_rendering: bool,
    /// Message loop is pumped on a thread the renderer owns, never the
    /// host's calling thread.
    pub dedicated_message_loop: bool,
}

impl EngineSettings {
    fn from_config(config: &RuntimeConfig) -> Self {
        let locale = resolve_locale(&config.plugin_directory, config.locale_override.as_deref());
        let cache_path = config
            .cache_directory
            .clone()
            .unwrap_or_else(|| config.plugin_directory.join("Cache"));

        let subprocess_path = config
            .plugin_directory
            .join(arch_directory())
            .join(subprocess_binary_name());

        // Off-screen rendering only paints on begin-frame ticks; without
        // this switch some engine versions never tick when no window is
        // attached. Media playback must not wait for a user gesture the
        // windowless browser can never receive.
        let mut command_line_args = vec![
            ("enable-begin-frame-scheduling".into(), "1".into()),
            ("autoplay-policy".into(), "no-user-gesture-required".into()),
            // Software compositing is faster than GPU readback for
            // off-screen surfaces.
            ("disable-gpu".into(), "1".into()),
            ("disable-gpu-compositing".into(), "1".into()),
        ];
        if !config.enable_audio {
            command_line_args.push(("mute-audio".into(), "1".into()));
        }

        Self {
            locale,
            cache_path,
            subprocess_path,
            command_line_args,
            windowless_rendering: true,
            dedicated_message_loop: true,
        }
    }
}

/// Engine binaries ship per bitness; the running process picks its own.
fn arch_directory() -> &'static str {
    if cfg!(target_pointer_width = "64") {
        "x64"
    } else {
        "x86"
    }
}

fn subprocess_binary_name() -> &'static str {
    if cfg!(windows) {
        "renderer-subprocess.exe"
    } else {
        "renderer-subprocess"
    }
}

/// Resolves the engine UI locale against the resources actually on disk.
///
/// Packs ship next to the engine binaries, under the bitness subdirectory.
/// Tries the requested locale (override or environment), then its bare
/// language part, then [`FALLBACK_LOCALE`]. A locale without a matching
/// `<x64|x86>/locales/<name>.pak` would crash the engine at startup.
fn resolve_locale(plugin_directory: &Path, locale_override: Option<&str>) -> String {
    let requested = locale_override
        .map(str::to_string)
        .or_else(locale_from_environment);

    let locales_dir = plugin_directory.join(arch_directory()).join("locales");
    if let Some(requested) = requested {
        if locale_pak_exists(&locales_dir, &requested) {
            return requested;
        }
        if let Some((language, _)) = requested.split_once('-') {
            if locale_pak_exists(&locales_dir, language) {
                return language.to_string();
            }
        }
        warn!(
            locale = %requested,
            "no resources for requested locale, falling back to {FALLBACK_LOCALE}"
        );
    }
    FALLBACK_LOCALE.to_string()
}

/// Reads the locale from `LC_ALL`, `LC_MESSAGES` or `LANG` and normalizes
/// POSIX form (`ja_JP.UTF-8`) to engine form (`ja-JP`).
fn locale_from_environment() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty() && value != "C" && value != "POSIX")
        .map(|value| {
            let base = value.split('.').next().unwrap_or(&value);
            base.replace('_', "-")
        })
}

fn locale_pak_exists(locales_dir: &Path, locale: &str) -> bool {
    locales_dir.join(format!("{locale}.pak")).is_file()
}

/// A live engine runtime.
///
/// Obtained from [`EngineRuntime::initialize`]; every session clones the
/// `Arc` and thereby keeps the runtime alive. At most one runtime should
/// exist per process.
#[derive(Debug)]
pub struct EngineRuntime {
    settings: EngineSettings,
}

impl EngineRuntime {
    /// Initializes the engine and returns the runtime handle.
    ///
    /// Resolves the locale against the resources on disk and creates the
    /// cache directory. A missing cache directory is logged, not fatal; the
    /// engine falls back to in-memory caching.
    pub fn initialize(config: RuntimeConfig) -> Result<Arc<Self>> {
        let settings = EngineSettings::from_config(&config);

        if let Err(e) = std::fs::create_dir_all(&settings.cache_path) {
            warn!(
                path = %settings.cache_path.display(),
                error = %e,
                "could not create cache directory, caching in memory"
            );
        }

        #[cfg(feature = "cef-backend")]
        crate::backend::cef::initialize_engine(&settings)?;

        info!(
            locale = %settings.locale,
            cache = %settings.cache_path.display(),
            "engine runtime initialized"
        );
        Ok(Arc::new(Self { settings }))
    }

    /// The resolved settings the engine was initialized with.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Shuts the engine down.
    ///
    /// Fails with [`Error::SessionsStillAlive`] when any session still holds
    /// the runtime; callers must dispose sessions (and drop their handles)
    /// first, then retry through one of the remaining handles.
    pub fn shutdown(self: Arc<Self>) -> Result<()> {
        let live_sessions = Arc::strong_count(&self) - 1;
        let runtime = Arc::try_unwrap(self).map_err(|_| Error::SessionsStillAlive(live_sessions))?;

        #[cfg(feature = "cef-backend")]
        crate::backend::cef::shutdown_engine();

        info!(locale = %runtime.settings.locale, "engine runtime shut down");
        Ok(())
    }
}
