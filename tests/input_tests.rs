//! Input translation tests: multi-click reconstruction and event forwarding.

use std::time::{Duration, Instant};

use overlay_renderer::backend::{
    EngineBackend, EngineEventSender, MockBackend, MockEngineController, RecordedCall,
    WindowDescriptor,
};
use overlay_renderer::input::click::ClickTracker;
use overlay_renderer::input::{
    InputForwarder, MouseButton, EVENTFLAG_LEFT_MOUSE_BUTTON, EVENTFLAG_NONE,
};

fn mock_handle() -> (
    Box<dyn overlay_renderer::backend::EngineHandle>,
    MockEngineController,
) {
    let (mut backend, controller) = MockBackend::new();
    let handle = backend
        .create_windowless(
            &WindowDescriptor::new(640, 480, 30),
            EngineEventSender::detached(),
        )
        .unwrap();
    (handle, controller)
}

#[test]
fn test_rapid_clicks_escalate_count() {
    let mut tracker = ClickTracker::new();
    let t = Instant::now();

    assert_eq!(tracker.register_press(5, 5, MouseButton::Left, t), 1);
    assert_eq!(
        tracker.register_press(5, 5, MouseButton::Left, t + Duration::from_millis(100)),
        2
    );
    assert_eq!(
        tracker.register_press(5, 5, MouseButton::Left, t + Duration::from_millis(200)),
        3
    );
}

#[test]
fn test_slow_second_click_starts_over() {
    let mut tracker = ClickTracker::new();
    let t = Instant::now();

    tracker.register_press(5, 5, MouseButton::Left, t);
    assert_eq!(
        tracker.register_press(5, 5, MouseButton::Left, t + Duration::from_millis(600)),
        1
    );
}

#[test]
fn test_button_change_starts_over() {
    let mut tracker = ClickTracker::new();
    let t = Instant::now();

    tracker.register_press(5, 5, MouseButton::Left, t);
    assert_eq!(
        tracker.register_press(5, 5, MouseButton::Right, t + Duration::from_millis(50)),
        1
    );
}

#[test]
fn test_position_change_starts_over() {
    let mut tracker = ClickTracker::new();
    let t = Instant::now();

    tracker.register_press(5, 5, MouseButton::Left, t);
    assert_eq!(
        tracker.register_press(6, 5, MouseButton::Left, t + Duration::from_millis(50)),
        1
    );
}

#[test]
fn test_release_extends_the_gesture_window() {
    let mut tracker = ClickTracker::with_interval(Duration::from_millis(100));
    let t = Instant::now();

    tracker.register_press(5, 5, MouseButton::Left, t);
    // The release at t+80 refreshes the recorded timestamp, so a press at
    // t+150 still lands inside the window measured from the release.
    assert_eq!(
        tracker.register_release(5, 5, MouseButton::Left, t + Duration::from_millis(80)),
        1
    );
    assert_eq!(
        tracker.register_press(5, 5, MouseButton::Left, t + Duration::from_millis(150)),
        2
    );
}

#[test]
fn test_custom_interval_is_respected() {
    let mut tracker = ClickTracker::with_interval(Duration::from_millis(50));
    let t = Instant::now();

    tracker.register_press(5, 5, MouseButton::Left, t);
    assert_eq!(
        tracker.register_press(5, 5, MouseButton::Left, t + Duration::from_millis(80)),
        1
    );
}

#[test]
fn test_move_carries_held_button_as_modifier() {
    let (mut handle, controller) = mock_handle();
    let mut input = InputForwarder::new();

    input.pointer_move(handle.as_mut(), 10, 20, Some(MouseButton::Left));
    input.pointer_move(handle.as_mut(), 11, 21, None);

    let calls = controller.calls();
    assert!(calls.contains(&RecordedCall::MouseMove {
        x: 10,
        y: 20,
        modifiers: EVENTFLAG_LEFT_MOUSE_BUTTON,
    }));
    assert!(calls.contains(&RecordedCall::MouseMove {
        x: 11,
        y: 21,
        modifiers: EVENTFLAG_NONE,
    }));
}

#[test]
fn test_wheel_delta_lands_on_one_axis() {
    let (mut handle, controller) = mock_handle();
    let mut input = InputForwarder::new();

    input.wheel(handle.as_mut(), 0, 0, 120, true);
    input.wheel(handle.as_mut(), 0, 0, -40, false);

    let wheels: Vec<(i32, i32)> = controller
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            RecordedCall::MouseWheel { delta_v, delta_h, .. } => Some((delta_v, delta_h)),
            _ => None,
        })
        .collect();
    assert_eq!(wheels, vec![(120, 0), (0, -40)]);
}
