//! Core types for spark-ui.
//!
//! These types are shared by every layer: the dynamic [`Record`] used for
//! untyped state and route props, the [`Merge`] trait that gives `set_state`
//! and `set_props` their shallow-merge semantics, and the [`Unsubscribe`]
//! handle returned by every subscription API.

use std::cell::RefCell;
use std::fmt;

use serde_json::{Map, Value};

// =============================================================================
// Record
// =============================================================================

/// A structured, dynamically typed record.
///
/// Equality is structural and order-independent, which is what selector
/// subscriptions compare with.
pub type Record = Map<String, Value>;

/// Build a [`Record`] from a `serde_json::json!` object literal.
///
/// Non-object values produce an empty record.
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

// =============================================================================
// Merge
// =============================================================================

/// Shallow merge of a partial value into a full one.
///
/// `set_state` and `set_props` are defined in terms of this trait. For a
/// [`Record`] the partial is another record whose keys overwrite the target's
/// keys; typed states usually pair with a struct of `Option` fields.
///
/// ```ignore
/// #[derive(Clone, PartialEq)]
/// struct Counter { count: i64, label: String }
///
/// #[derive(Default)]
/// struct CounterPatch { count: Option<i64>, label: Option<String> }
///
/// impl Merge for Counter {
///     type Partial = CounterPatch;
///     fn merge(&mut self, patch: CounterPatch) {
///         if let Some(count) = patch.count { self.count = count; }
///         if let Some(label) = patch.label { self.label = label; }
///     }
/// }
/// ```
pub trait Merge {
    /// The shape of a partial update.
    type Partial;

    /// Apply `partial` on top of `self`, leaving unmentioned fields intact.
    fn merge(&mut self, partial: Self::Partial);
}

impl Merge for Record {
    type Partial = Record;

    fn merge(&mut self, partial: Record) {
        for (key, value) in partial {
            self.insert(key, value);
        }
    }
}

impl Merge for () {
    type Partial = ();

    fn merge(&mut self, _partial: ()) {}
}

// =============================================================================
// Unsubscribe
// =============================================================================

/// Handle that removes exactly one registration when invoked.
///
/// Calling [`unsubscribe`](Self::unsubscribe) more than once is a no-op.
/// Dropping the handle does NOT unsubscribe; registrations live until they are
/// removed explicitly or their owner is torn down.
pub struct Unsubscribe {
    cancel: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Unsubscribe {
    pub(crate) fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: RefCell::new(Some(Box::new(cancel))),
        }
    }

    /// Remove the registration this handle was created for.
    pub fn unsubscribe(&self) {
        let cancel = self.cancel.borrow_mut().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    /// True until [`unsubscribe`](Self::unsubscribe) has been called.
    pub fn is_active(&self) -> bool {
        self.cancel.borrow().is_some()
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("active", &self.is_active())
            .finish()
    }
}
