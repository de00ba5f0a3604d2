//! Multi-click detection.
//!
//! The engine's click events carry an explicit click count; the host's
//! pointer events do not. [`ClickTracker`] reconstructs double/triple-click
//! gestures from raw press/release pairs: a press continues the running
//! gesture only when it lands on the same position, with the same button,
//! within the double-click interval of the most recent recorded click event.
//!
//! The last position, button and timestamp are overwritten by presses *and*
//! releases, so the interval for the next press is measured from whichever
//! event came last. This mirrors the reference behavior exactly; see
//! [`ClickTracker::register_release`].

use std::time::{Duration, Instant};

use crate::input::MouseButton;

/// Default gesture window between consecutive clicks.
///
/// The reference implementation read the platform double-click interval;
/// 500 ms is the common platform default.
pub const DEFAULT_DOUBLE_CLICK_INTERVAL: Duration = Duration::from_millis(500);

/// Per-session click continuity state.
#[derive(Debug, Clone)]
pub struct ClickTracker {
    interval: Duration,
    last_position: (i32, i32),
    last_button: MouseButton,
    last_event: Option<Instant>,
    consecutive: i32,
}

impl ClickTracker {
    /// Creates a tracker using [`DEFAULT_DOUBLE_CLICK_INTERVAL`].
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_DOUBLE_CLICK_INTERVAL)
    }

    /// Creates a tracker with a custom double-click interval.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            last_position: (0, 0),
            last_button: MouseButton::Left,
            last_event: None,
            consecutive: 1,
        }
    }

    /// Current consecutive click count. Always >= 1.
    pub fn consecutive_count(&self) -> i32 {
        self.consecutive
    }

    /// Registers a button press and returns the click count to forward.
    ///
    /// Continuity bumps the count; any break (position, button, or elapsed
    /// time since the most recent recorded event) resets it to 1.
    pub fn register_press(&mut self, x: i32, y: i32, button: MouseButton, now: Instant) -> i32 {
        if self.is_continuous(x, y, button, now) {
            self.consecutive += 1;
        } else {
            self.consecutive = 1;
        }
        self.record(x, y, button, now);
        self.consecutive
    }

    /// Registers a button release and returns the click count to forward.
    ///
    /// The count is not recomputed on release; the previous value is reused.
    /// Position, button and timestamp are still overwritten, so a release
    /// participates in the continuity computation of the next press.
    pub fn register_release(&mut self, x: i32, y: i32, button: MouseButton, now: Instant) -> i32 {
        self.record(x, y, button, now);
        self.consecutive
    }

    fn is_continuous(&self, x: i32, y: i32, button: MouseButton, now: Instant) -> bool {
        let last = match self.last_event {
            Some(t) => t,
            None => return false,
        };

        if now.saturating_duration_since(last) > self.interval {
            return false;
        }

        self.last_position == (x, y) && self.last_button == button
    }

    fn record(&mut self, x: i32, y: i32, button: MouseButton, now: Instant) {
        self.last_position = (x, y);
        self.last_button = button;
        self.last_event = Some(now);
    }
}

impl Default for ClickTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_and_triple_click() {
        let mut tracker = ClickTracker::new();
        let start = Instant::now();

        assert_eq!(tracker.register_press(10, 10, MouseButton::Left, start), 1);
        tracker.register_release(10, 10, MouseButton::Left, start + Duration::from_millis(20));
        assert_eq!(
            tracker.register_press(
                10,
                10,
                MouseButton::Left,
                start + Duration::from_millis(100)
            ),
            2
        );
        tracker.register_release(10, 10, MouseButton::Left, start + Duration::from_millis(120));
        assert_eq!(
            tracker.register_press(
                10,
                10,
                MouseButton::Left,
                start + Duration::from_millis(200)
            ),
            3
        );
    }

    #[test]
    fn test_spatial_reset() {
        let mut tracker = ClickTracker::new();
        let start = Instant::now();

        tracker.register_press(10, 10, MouseButton::Left, start);
        tracker.register_release(10, 10, MouseButton::Left, start + Duration::from_millis(10));
        assert_eq!(
            tracker.register_press(50, 50, MouseButton::Left, start + Duration::from_millis(50)),
            1
        );
    }

    #[test]
    fn test_temporal_reset() {
        let mut tracker = ClickTracker::new();
        let start = Instant::now();

        tracker.register_press(10, 10, MouseButton::Left, start);
        tracker.register_release(10, 10, MouseButton::Left, start + Duration::from_millis(10));
        assert_eq!(
            tracker.register_press(
                10,
                10,
                MouseButton::Left,
                start + Duration::from_millis(600)
            ),
            1
        );
    }

    #[test]
    fn test_button_change_resets() {
        let mut tracker = ClickTracker::new();
        let start = Instant::now();

        tracker.register_press(10, 10, MouseButton::Left, start);
        tracker.register_release(10, 10, MouseButton::Left, start + Duration::from_millis(10));
        assert_eq!(
            tracker.register_press(
                10,
                10,
                MouseButton::Right,
                start + Duration::from_millis(50)
            ),
            1
        );
    }

    #[test]
    fn test_release_extends_gesture_window() {
        // The interval is measured from the most recent recorded event, so
        // a late release keeps the gesture alive for the following press.
        let mut tracker = ClickTracker::with_interval(Duration::from_millis(100));
        let start = Instant::now();

        tracker.register_press(10, 10, MouseButton::Left, start);
        tracker.register_release(10, 10, MouseButton::Left, start + Duration::from_millis(90));
        // 170 ms after the press, but only 80 ms after the release.
        assert_eq!(
            tracker.register_press(
                10,
                10,
                MouseButton::Left,
                start + Duration::from_millis(170)
            ),
            2
        );
    }

    #[test]
    fn test_release_reuses_previous_count() {
        let mut tracker = ClickTracker::new();
        let start = Instant::now();

        assert_eq!(tracker.register_press(10, 10, MouseButton::Left, start), 1);
        assert_eq!(
            tracker.register_release(
                50,
                50,
                MouseButton::Left,
                start + Duration::from_millis(10)
            ),
            1
        );
        // The release moved the recorded position, so the next press at the
        // original location is not continuous.
        assert_eq!(
            tracker.register_press(10, 10, MouseButton::Left, start + Duration::from_millis(50)),
            1
        );
    }
}
