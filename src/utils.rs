//! Panic isolation for listener delivery.
//!
//! Event handlers and state listeners are user code running inside a
//! notification pass. A panic in one of them must not stop delivery to the
//! rest, so every invocation goes through [`run_isolated`].

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Run `f`, catching and logging a panic instead of unwinding into the caller.
///
/// Returns `false` when `f` panicked.
pub(crate) fn run_isolated(kind: &'static str, event: &str, f: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            tracing::error!(
                kind,
                event,
                panic = %panic_message(payload.as_ref()),
                "listener panicked; continuing delivery"
            );
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
