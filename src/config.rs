//! Renderer configuration.
//!
//! Host-level settings for the engine runtime and per-session defaults,
//! loadable from a TOML file with environment variable overrides. Later
//! sources win: defaults, then file, then `OVERLAY_RENDERER_*` variables.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::runtime::RuntimeConfig;
use crate::session::SessionConfig;

/// Renderer-wide settings.
///
/// # Example
///
/// ```rust
/// use overlay_renderer::config::RendererSettings;
///
/// let settings = RendererSettings::default()
///     .with_plugin_directory("/opt/overlay")
///     .with_frame_rate(45);
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererSettings {
    /// Directory holding engine binaries and resources.
    #[serde(default = "default_plugin_directory")]
    pub plugin_directory: PathBuf,

    /// Explicit UI locale. Detected from the environment when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// Browser cache directory. Defaults to `<plugin_directory>/Cache`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_directory: Option<PathBuf>,

    /// Whether pages may produce sound.
    #[serde(default = "default_enable_audio")]
    pub enable_audio: bool,

    /// Default windowless frame rate for new sessions (1..=60).
    #[serde(default = "default_frame_rate")]
    pub default_frame_rate: i32,

    /// JavaScript name the host API object is bound under.
    #[serde(default = "default_api_object_name")]
    pub api_object_name: String,

    /// Multi-click gesture window in milliseconds.
    #[serde(default = "default_double_click_interval_ms")]
    pub double_click_interval_ms: u64,
}

// Default value functions for serde
fn default_plugin_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_enable_audio() -> bool {
    true
}

fn default_frame_rate() -> i32 {
    crate::session::DEFAULT_FRAME_RATE
}

fn default_api_object_name() -> String {
    "OverlayApi".to_string()
}

fn default_double_click_interval_ms() -> u64 {
    500
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            plugin_directory: default_plugin_directory(),
            locale: None,
            cache_directory: None,
            enable_audio: default_enable_audio(),
            default_frame_rate: default_frame_rate(),
            api_object_name: default_api_object_name(),
            double_click_interval_ms: default_double_click_interval_ms(),
        }
    }
}

impl RendererSettings {
    /// Creates settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&content)?)
    }

    /// Applies `OVERLAY_RENDERER_*` environment variable overrides:
    ///
    /// - `OVERLAY_RENDERER_PLUGIN_DIRECTORY`
    /// - `OVERLAY_RENDERER_LOCALE`
    /// - `OVERLAY_RENDERER_CACHE_DIRECTORY`
    /// - `OVERLAY_RENDERER_ENABLE_AUDIO`
    /// - `OVERLAY_RENDERER_FRAME_RATE`
    /// - `OVERLAY_RENDERER_API_OBJECT`
    /// - `OVERLAY_RENDERER_DOUBLE_CLICK_MS`
    pub fn merge_with_env(mut self) -> Self {
        if let Ok(val) = env::var("OVERLAY_RENDERER_PLUGIN_DIRECTORY") {
            self.plugin_directory = PathBuf::from(val);
        }
        if let Ok(val) = env::var("OVERLAY_RENDERER_LOCALE") {
            self.locale = Some(val);
        }
        if let Ok(val) = env::var("OVERLAY_RENDERER_CACHE_DIRECTORY") {
            self.cache_directory = Some(PathBuf::from(val));
        }
        if let Ok(val) = env::var("OVERLAY_RENDERER_ENABLE_AUDIO") {
            self.enable_audio = val.to_lowercase() == "true" || val == "1";
        }
        if let Ok(val) = env::var("OVERLAY_RENDERER_FRAME_RATE") {
            if let Ok(fps) = val.parse() {
                self.default_frame_rate = fps;
            }
        }
        if let Ok(val) = env::var("OVERLAY_RENDERER_API_OBJECT") {
            self.api_object_name = val;
        }
        if let Ok(val) = env::var("OVERLAY_RENDERER_DOUBLE_CLICK_MS") {
            if let Ok(ms) = val.parse() {
                self.double_click_interval_ms = ms;
            }
        }
        self
    }

    /// Validates all settings.
    pub fn validate(&self) -> Result<()> {
        if !(1..=60).contains(&self.default_frame_rate) {
            return Err(Error::Validation(format!(
                "default_frame_rate must be within 1..=60, got {}",
                self.default_frame_rate
            )));
        }
        if self.api_object_name.is_empty() {
            return Err(Error::Validation(
                "api_object_name cannot be empty".to_string(),
            ));
        }
        if self.double_click_interval_ms == 0 {
            return Err(Error::Validation(
                "double_click_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Runtime configuration derived from these settings.
    pub fn runtime_config(&self) -> RuntimeConfig {
        let mut config =
            RuntimeConfig::new(&self.plugin_directory).with_audio(self.enable_audio);
        if let Some(ref locale) = self.locale {
            config = config.with_locale(locale.clone());
        }
        if let Some(ref cache) = self.cache_directory {
            config = config.with_cache_directory(cache.clone());
        }
        config
    }

    /// Session configuration for an overlay named `overlay_name`.
    pub fn session_config(&self, overlay_name: impl Into<String>) -> SessionConfig {
        SessionConfig::new(overlay_name)
            .with_api_object(self.api_object_name.clone())
            .with_double_click_interval(Duration::from_millis(self.double_click_interval_ms))
    }

    // Builder-style methods for convenient configuration

    /// Sets the plugin directory.
    pub fn with_plugin_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugin_directory = dir.into();
        self
    }

    /// Sets an explicit locale.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Sets the cache directory.
    pub fn with_cache_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_directory = Some(dir.into());
        self
    }

    /// Enables or disables page audio.
    pub fn with_audio(mut self, enable: bool) -> Self {
        self.enable_audio = enable;
        self
    }

    /// Sets the default frame rate.
    pub fn with_frame_rate(mut self, fps: i32) -> Self {
        self.default_frame_rate = fps;
        self
    }

    /// Sets the API object name.
    pub fn with_api_object(mut self, name: impl Into<String>) -> Self {
        self.api_object_name = name.into();
        self
    }
}
