//! Navigation and creation lifecycle tracking.
//!
//! The engine creates browsers and loads pages asynchronously on its own
//! threads, while the host issues navigation requests whenever it likes.
//! [`FrameLifecycleTracker`] reconciles the two: it remembers the one
//! navigation the handle could not yet accept (`pending_url`) and resolves
//! it at the next load-end, and it records when the browser becomes usable
//! for immediate navigation, scripts and input.

/// Where a session is in its creation/navigation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// No browser requested yet, or torn down.
    Idle,
    /// Browser creation requested, no navigation observed yet.
    Creating,
    /// A main-frame navigation is in flight.
    Loading,
    /// The last main-frame navigation completed.
    Loaded,
    /// The last main-frame navigation failed; retry requires a new `load`.
    Failed,
}

/// State machine over creation and main-frame load events.
#[derive(Debug)]
pub struct FrameLifecycleTracker {
    phase: LifecyclePhase,
    pending_url: Option<String>,
    browser_ready: bool,
}

impl FrameLifecycleTracker {
    /// Creates an idle tracker.
    pub fn new() -> Self {
        Self {
            phase: LifecyclePhase::Idle,
            pending_url: None,
            browser_ready: false,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// Whether the browser finished asynchronous creation and can accept
    /// immediate navigation, script execution and pointer input.
    pub fn is_ready(&self) -> bool {
        self.browser_ready
    }

    /// The deferred navigation target, if any.
    pub fn pending_url(&self) -> Option<&str> {
        self.pending_url.as_deref()
    }

    /// A new browser was requested. The target URL is deferred because the
    /// handle cannot accept navigation during creation.
    pub fn begin_render(&mut self, url: impl Into<String>) {
        self.phase = LifecyclePhase::Creating;
        self.pending_url = Some(url.into());
        self.browser_ready = false;
    }

    /// The engine reported browser creation complete.
    pub fn mark_created(&mut self) {
        self.browser_ready = true;
    }

    /// Stores a navigation to be issued at the next load-end. Overwrites any
    /// previous deferred target; the most recent request wins.
    pub fn defer_navigation(&mut self, url: impl Into<String>) {
        self.pending_url = Some(url.into());
    }

    /// A main-frame load started.
    pub fn on_load_start(&mut self) {
        self.phase = LifecyclePhase::Loading;
    }

    /// A main-frame load finished. Returns the deferred navigation target,
    /// clearing it so a later load-end does not re-navigate.
    pub fn on_load_end(&mut self) -> Option<String> {
        self.phase = LifecyclePhase::Loaded;
        self.pending_url.take()
    }

    /// A main-frame load failed. The machine stays retryable: a new `load`
    /// call is the only recovery path.
    pub fn on_load_error(&mut self) {
        self.phase = LifecyclePhase::Failed;
    }

    /// Tears down all tracking state, e.g. when the handle is released.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for FrameLifecycleTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_render_defers_navigation() {
        let mut tracker = FrameLifecycleTracker::new();
        assert_eq!(tracker.phase(), LifecyclePhase::Idle);

        tracker.begin_render("https://a.example");
        assert_eq!(tracker.phase(), LifecyclePhase::Creating);
        assert!(!tracker.is_ready());
        assert_eq!(tracker.pending_url(), Some("https://a.example"));

        tracker.mark_created();
        assert!(tracker.is_ready());

        tracker.on_load_start();
        assert_eq!(tracker.phase(), LifecyclePhase::Loading);

        assert_eq!(tracker.on_load_end(), Some("https://a.example".into()));
        assert_eq!(tracker.phase(), LifecyclePhase::Loaded);
        // A second load-end must not re-navigate.
        assert_eq!(tracker.on_load_end(), None);
    }

    #[test]
    fn test_last_deferred_navigation_wins() {
        let mut tracker = FrameLifecycleTracker::new();
        tracker.begin_render("https://a.example");
        tracker.defer_navigation("https://b.example");
        assert_eq!(tracker.on_load_end(), Some("https://b.example".into()));
    }

    #[test]
    fn test_error_leaves_machine_retryable() {
        let mut tracker = FrameLifecycleTracker::new();
        tracker.begin_render("https://a.example");
        tracker.mark_created();
        tracker.on_load_start();
        tracker.on_load_error();
        assert_eq!(tracker.phase(), LifecyclePhase::Failed);
        // Browser is still created; an immediate navigation is allowed.
        assert!(tracker.is_ready());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut tracker = FrameLifecycleTracker::new();
        tracker.begin_render("https://a.example");
        tracker.mark_created();
        tracker.reset();
        assert_eq!(tracker.phase(), LifecyclePhase::Idle);
        assert!(!tracker.is_ready());
        assert_eq!(tracker.pending_url(), None);
    }
}
