//! Script injection ordering.
//!
//! Scripts handed to a session before any page context exists are queued
//! and replayed at the next main-frame load start. The flush always runs
//! the fixed initialization script first: it binds the host API object into
//! the page and flips its `ready` flag, so queued user scripts may assume
//! the object exists. This ordering is load-bearing for overlay pages.
//!
//! Also home to [`execute_callback`], the helper hosts use to invoke script
//! callback handles they received as opaque values.

use std::any::Any;
use std::sync::Arc;

use tracing::trace;

use crate::backend::EngineHandle;
use crate::error::{Error, Result};

/// Origin label attached to the init script.
const ORIGIN_INIT: &str = "init";
/// Origin label attached to scripts replayed from the queue.
const ORIGIN_INJECT_ON_LOAD: &str = "injectOnLoad";

/// Name of the binding bootstrap installed in every page by the render
/// process; awaiting it makes the host API object available.
pub const BIND_FUNCTION: &str = "window.__bindOverlayApi";

/// FIFO of scripts awaiting a page context.
#[derive(Debug, Default)]
pub struct ScriptInjectionQueue {
    pending: Vec<String>,
}

impl ScriptInjectionQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a script; insertion order is execution order.
    pub fn enqueue(&mut self, script: impl Into<String>) {
        self.pending.push(script.into());
    }

    /// Number of queued scripts.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Dispatches the init script, then drains the queue in insertion
    /// order. Called exactly once per load-start transition.
    pub fn flush(&mut self, handle: &mut dyn EngineHandle, init_script: &str) {
        handle.execute_script(init_script, ORIGIN_INIT);

        trace!(queued = self.pending.len(), "flushing script queue");
        for script in self.pending.drain(..) {
            handle.execute_script(&script, ORIGIN_INJECT_ON_LOAD);
        }
    }
}

/// Builds the page initialization script: binds the host API object under
/// `api_object`, records the overlay name on it and flips its ready flag.
pub fn build_init_script(api_object: &str, overlay_name: &str) -> String {
    // serde_json produces valid JS string literals for arbitrary names.
    let quoted_object = serde_json::to_string(api_object).unwrap_or_else(|_| "\"\"".into());
    let quoted_name = serde_json::to_string(overlay_name).unwrap_or_else(|_| "\"\"".into());

    format!(
        "(async () => {{\n\
         \x20   await {bind}({object});\n\
         \x20   window[{object}].overlayName = {name};\n\
         \x20   window[{object}].ready = true;\n\
         }})();",
        bind = BIND_FUNCTION,
        object = quoted_object,
        name = quoted_name,
    )
}

/// A callback handle bound from page script, invocable from the host side.
pub trait ScriptCallback: Send + Sync {
    /// Whether the underlying page context still accepts the invocation.
    fn can_execute(&self) -> bool;
    /// Invokes the callback with a JSON payload. Fire-and-forget.
    fn invoke(&self, param: serde_json::Value);
}

/// Invokes a script callback received as an opaque value.
///
/// Callback handles cross host boundaries as `&dyn Any`; this helper is the
/// one place that downgrades them back to [`ScriptCallback`]. Passing any
/// other type is a programmer error and fails hard, aborting the call path.
/// A valid callback whose context is gone is silently dropped.
pub fn execute_callback(callback: &dyn Any, param: serde_json::Value) -> Result<()> {
    let callback = callback
        .downcast_ref::<Arc<dyn ScriptCallback>>()
        .ok_or(Error::InvalidCallback)?;

    if callback.can_execute() {
        callback.invoke(param);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        EngineBackend, EngineEventSender, MockBackend, RecordedCall, WindowDescriptor,
    };
    use parking_lot::Mutex;

    fn mock_handle() -> (Box<dyn EngineHandle>, crate::backend::MockEngineController) {
        let (mut backend, controller) = MockBackend::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = backend
            .create_windowless(&WindowDescriptor::new(64, 64, 30), EngineEventSender::new(tx))
            .unwrap();
        (handle, controller)
    }

    fn executed_scripts(controller: &crate::backend::MockEngineController) -> Vec<(String, String)> {
        controller
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                RecordedCall::ExecuteScript { script, origin } => Some((script, origin)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_flush_runs_init_first_then_fifo() {
        let (mut handle, controller) = mock_handle();
        let mut queue = ScriptInjectionQueue::new();
        queue.enqueue("a");
        queue.enqueue("b");

        queue.flush(handle.as_mut(), "INIT");

        let scripts = executed_scripts(&controller);
        assert_eq!(
            scripts,
            vec![
                ("INIT".into(), "init".into()),
                ("a".into(), "injectOnLoad".into()),
                ("b".into(), "injectOnLoad".into()),
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_second_flush_runs_init_only() {
        let (mut handle, controller) = mock_handle();
        let mut queue = ScriptInjectionQueue::new();
        queue.enqueue("a");

        queue.flush(handle.as_mut(), "INIT");
        queue.flush(handle.as_mut(), "INIT");

        let scripts = executed_scripts(&controller);
        assert_eq!(scripts.len(), 3);
        assert_eq!(scripts[2], ("INIT".into(), "init".into()));
    }

    #[test]
    fn test_init_script_quotes_names() {
        let script = build_init_script("OverlayApi", "mini \"parse\"");
        assert!(script.contains("window.__bindOverlayApi(\"OverlayApi\")"));
        assert!(script.contains("overlayName = \"mini \\\"parse\\\"\""));
        assert!(script.contains(".ready = true"));
    }

    struct CountingCallback {
        executable: bool,
        invocations: Mutex<Vec<serde_json::Value>>,
    }

    impl ScriptCallback for CountingCallback {
        fn can_execute(&self) -> bool {
            self.executable
        }
        fn invoke(&self, param: serde_json::Value) {
            self.invocations.lock().push(param);
        }
    }

    #[test]
    fn test_execute_callback_invokes_valid_callback() {
        let inner = Arc::new(CountingCallback {
            executable: true,
            invocations: Mutex::new(Vec::new()),
        });
        let callback: Arc<dyn ScriptCallback> = inner.clone();

        execute_callback(&callback, serde_json::json!({ "ok": true })).unwrap();
        assert_eq!(inner.invocations.lock().len(), 1);
    }

    #[test]
    fn test_execute_callback_skips_dead_context() {
        let inner = Arc::new(CountingCallback {
            executable: false,
            invocations: Mutex::new(Vec::new()),
        });
        let callback: Arc<dyn ScriptCallback> = inner.clone();

        execute_callback(&callback, serde_json::Value::Null).unwrap();
        assert!(inner.invocations.lock().is_empty());
    }

    #[test]
    fn test_execute_callback_rejects_foreign_type() {
        let not_a_callback = String::from("not a callback");
        let result = execute_callback(&not_a_callback, serde_json::Value::Null);
        assert!(matches!(result, Err(Error::InvalidCallback)));
    }
}
