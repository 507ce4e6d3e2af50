//! Reactive State - A change-notifying value container.
//!
//! [`ReactiveState`] wraps a plain value and gates every mutation through a
//! small surface so each mutation produces exactly one notification pass:
//!
//! - `set_state(partial)` / `set_state_with(|s| partial)` - shallow merge via [`Merge`]
//! - `update(|s| ...)` - direct field mutation
//! - `set(field, value)` / `set_nested(field, key, value)` - field assignment on [`Record`] states
//! - `reset(value)` - wholesale replacement
//!
//! Two listener kinds are notified, in registration order within each kind:
//!
//! - full listeners (`subscribe`) receive `(new, old)` on every mutation
//! - selector listeners (`select`) receive `(new_selected, old_selected)` only
//!   when the selected projection is not equal (`PartialEq`) before and after
//!
//! Both kinds see snapshots taken immediately before and after the mutation.
//! Notification is synchronous: it has completed when the mutating call
//! returns.
//!
//! # Example
//!
//! ```ignore
//! use spark_ui::{record, ReactiveState};
//! use serde_json::json;
//!
//! let state = ReactiveState::new(record(json!({ "count": 0, "name": "a" })));
//!
//! let sub = state.select(|s| s.get("count").cloned(), |new, _old| {
//!     println!("count is now {new:?}");
//! });
//!
//! state.set("name", "b");   // selector does not fire
//! state.set("count", 1);    // selector fires
//! sub.unsubscribe();
//! ```
//!
//! # Failure Modes
//!
//! - **Listener panics**: logged and skipped; remaining listeners still run and
//!   the stored value is the post-mutation value.
//! - **Mutation closure panics**: the panic reaches the caller and no
//!   notification pass runs.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::types::{Merge, Record, Unsubscribe};
use crate::utils::run_isolated;

type FullListener<S> = Rc<dyn Fn(&S, &S)>;

/// Selector listeners are stored pre-composed: `(new, old, forced)`.
type SelectorListener<S> = Rc<dyn Fn(&S, &S, bool)>;

struct StateInner<S> {
    current: S,
    full: Vec<(usize, FullListener<S>)>,
    selectors: Vec<(usize, SelectorListener<S>)>,
    next_id: usize,
}

impl<S> StateInner<S> {
    fn next_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// A value container that notifies listeners on every mutation.
///
/// Cloning produces another handle to the same value and listener sets.
pub struct ReactiveState<S> {
    inner: Rc<RefCell<StateInner<S>>>,
}

impl<S> Clone for ReactiveState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for ReactiveState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ReactiveState")
            .field("current", &inner.current)
            .field("full_listeners", &inner.full.len())
            .field("selector_listeners", &inner.selectors.len())
            .finish()
    }
}

impl<S: Default + Clone + 'static> Default for ReactiveState<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: Clone + 'static> ReactiveState<S> {
    pub fn new(initial: S) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StateInner {
                current: initial,
                full: Vec::new(),
                selectors: Vec::new(),
                next_id: 0,
            })),
        }
    }

    // -------------------------------------------------------------------------
    // Reading
    // -------------------------------------------------------------------------

    /// Snapshot of the current value.
    pub fn value(&self) -> S {
        self.inner.borrow().current.clone()
    }

    /// Borrow the current value without cloning.
    ///
    /// Mutating this state from inside `f` panics.
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.inner.borrow().current)
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Shallow-merge `partial` into the value, then notify.
    pub fn set_state(&self, partial: S::Partial)
    where
        S: Merge,
    {
        self.mutate(false, |current| current.merge(partial));
    }

    /// Compute a partial from the current value, merge it, then notify.
    pub fn set_state_with(&self, f: impl FnOnce(&S) -> S::Partial)
    where
        S: Merge,
    {
        let partial = self.with(f);
        self.set_state(partial);
    }

    /// Mutate the value in place, then notify.
    ///
    /// This is the field-assignment path: any change made through it is
    /// observed exactly like a `set_state`.
    pub fn update(&self, f: impl FnOnce(&mut S)) {
        self.mutate(false, f);
    }

    /// Replace the whole value and notify every selector listener,
    /// regardless of whether its projection changed.
    pub fn reset(&self, value: S) {
        self.mutate(true, move |current| *current = value);
    }

    // -------------------------------------------------------------------------
    // Subscription
    // -------------------------------------------------------------------------

    /// Listen to every mutation. The listener receives `(new, old)`.
    pub fn subscribe(&self, listener: impl Fn(&S, &S) + 'static) -> Unsubscribe {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id();
            inner.full.push((id, Rc::new(listener)));
            id
        };

        let weak = Rc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().full.retain(|(listener_id, _)| *listener_id != id);
            }
        })
    }

    /// Listen to changes of a derived projection.
    ///
    /// `listener` receives `(new_selected, old_selected)` and fires only when
    /// the two are not equal. Equality is structural, so selecting a large
    /// sub-tree costs a full comparison per notification; prefer selecting
    /// small or primitive fields.
    pub fn select<R, Sel, L>(&self, selector: Sel, listener: L) -> Unsubscribe
    where
        R: PartialEq + 'static,
        Sel: Fn(&S) -> R + 'static,
        L: Fn(&R, &R) + 'static,
    {
        let composed: SelectorListener<S> = Rc::new(move |new: &S, old: &S, forced: bool| {
            let next = selector(new);
            let previous = selector(old);
            if forced || next != previous {
                listener(&next, &previous);
            }
        });

        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id();
            inner.selectors.push((id, composed));
            id
        };

        let weak = Rc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .borrow_mut()
                    .selectors
                    .retain(|(listener_id, _)| *listener_id != id);
            }
        })
    }

    /// Total number of registered listeners of both kinds.
    pub fn listener_count(&self) -> usize {
        let inner = self.inner.borrow();
        inner.full.len() + inner.selectors.len()
    }

    // -------------------------------------------------------------------------
    // Notification pipeline
    // -------------------------------------------------------------------------

    /// Every mutation path funnels through here: snapshot, mutate, snapshot,
    /// then one notification pass with no borrow held.
    fn mutate(&self, forced: bool, apply: impl FnOnce(&mut S)) {
        let (old, new, full, selectors) = {
            let mut inner = self.inner.borrow_mut();
            let old = inner.current.clone();
            apply(&mut inner.current);
            let new = inner.current.clone();
            let full: Vec<FullListener<S>> =
                inner.full.iter().map(|(_, l)| Rc::clone(l)).collect();
            let selectors: Vec<SelectorListener<S>> =
                inner.selectors.iter().map(|(_, l)| Rc::clone(l)).collect();
            (old, new, full, selectors)
        };

        for listener in &full {
            run_isolated("state listener", "change", || listener(&new, &old));
        }
        for listener in &selectors {
            run_isolated("state selector", "change", || listener(&new, &old, forced));
        }
    }
}

// =============================================================================
// Record field access
// =============================================================================

impl ReactiveState<Record> {
    /// Read one field.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.with(|record| record.get(field).cloned())
    }

    /// Assign one field. Always notifies, even if the value is unchanged.
    pub fn set(&self, field: &str, value: impl Into<Value>) {
        let value = value.into();
        self.update(|record| {
            record.insert(field.to_string(), value);
        });
    }

    /// Assign a key inside a nested record stored at `field`.
    ///
    /// This is one level of nested interception: the change is observed as a
    /// mutation of the outer state. If `field` does not hold an object it is
    /// replaced by one containing only `key`.
    pub fn set_nested(&self, field: &str, key: &str, value: impl Into<Value>) {
        let value = value.into();
        self.update(|record| {
            let slot = record
                .entry(field.to_string())
                .or_insert_with(|| Value::Object(Record::new()));
            if !slot.is_object() {
                *slot = Value::Object(Record::new());
            }
            if let Value::Object(nested) = slot {
                nested.insert(key.to_string(), value);
            }
        });
    }

    /// Delete one field, returning its previous value. Notifies only if the
    /// field existed.
    pub fn remove(&self, field: &str) -> Option<Value> {
        if !self.with(|record| record.contains_key(field)) {
            return None;
        }
        let mut removed = None;
        self.update(|record| removed = record.remove(field));
        removed
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::record;
    use serde_json::json;
    use std::cell::Cell;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        count: i64,
        label: String,
    }

    #[derive(Default)]
    struct CounterPatch {
        count: Option<i64>,
        label: Option<String>,
    }

    impl Merge for Counter {
        type Partial = CounterPatch;

        fn merge(&mut self, patch: CounterPatch) {
            if let Some(count) = patch.count {
                self.count = count;
            }
            if let Some(label) = patch.label {
                self.label = label;
            }
        }
    }

    fn counter() -> ReactiveState<Counter> {
        ReactiveState::new(Counter {
            count: 0,
            label: "start".to_string(),
        })
    }

    fn tally() -> (Rc<Cell<usize>>, impl Fn() + 'static) {
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        (count, move || count_clone.set(count_clone.get() + 1))
    }

    #[test]
    fn test_counter_scenario() {
        let state = ReactiveState::new(record(json!({ "count": 0 })));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();

        let _sub = state.subscribe(move |new, _old| {
            seen_clone.borrow_mut().push(new["count"].clone());
        });

        for _ in 0..2 {
            state.set_state_with(|s| {
                let next = s["count"].as_i64().unwrap_or(0) + 1;
                record(json!({ "count": next }))
            });
        }

        assert_eq!(*seen.borrow(), vec![json!(1), json!(2)]);
        assert_eq!(state.get("count"), Some(json!(2)));
    }

    #[test]
    fn test_set_state_is_sequential_shallow_merge() {
        let state = counter();
        let (notifications, bump) = tally();
        let _sub = state.subscribe(move |_, _| bump());

        state.set_state(CounterPatch {
            count: Some(3),
            ..Default::default()
        });
        state.set_state(CounterPatch {
            label: Some("mid".to_string()),
            ..Default::default()
        });
        state.set_state(CounterPatch {
            count: Some(5),
            ..Default::default()
        });

        assert_eq!(
            state.value(),
            Counter {
                count: 5,
                label: "mid".to_string()
            }
        );
        assert_eq!(notifications.get(), 3);
    }

    #[test]
    fn test_full_listener_receives_old_and_new() {
        let state = counter();
        let pairs = Rc::new(RefCell::new(Vec::new()));
        let pairs_clone = pairs.clone();
        let _sub = state.subscribe(move |new, old| {
            pairs_clone.borrow_mut().push((old.count, new.count));
        });

        state.update(|s| s.count = 10);
        state.update(|s| s.count += 1);

        assert_eq!(*pairs.borrow(), vec![(0, 10), (10, 11)]);
    }

    #[test]
    fn test_selector_ignores_unrelated_fields() {
        let state = counter();
        let (fired, bump) = tally();
        let _sub = state.select(|s| s.count, move |_, _| bump());

        state.update(|s| s.label = "other".to_string());
        assert_eq!(fired.get(), 0);

        state.update(|s| s.count = 1);
        assert_eq!(fired.get(), 1);

        // Same value again: no change, no fire
        state.update(|s| s.count = 1);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_selector_uses_deep_equality() {
        let state = ReactiveState::new(record(json!({
            "filters": { "a": 1, "b": [1, 2] },
            "page": 1
        })));
        let changes = Rc::new(RefCell::new(Vec::new()));
        let changes_clone = changes.clone();
        let _sub = state.select(
            |s| s.get("filters").cloned(),
            move |new, old| changes_clone.borrow_mut().push((old.clone(), new.clone())),
        );

        // Structurally equal replacement, different key order
        state.set("filters", json!({ "b": [1, 2], "a": 1 }));
        assert!(changes.borrow().is_empty());

        state.set("page", 2);
        assert!(changes.borrow().is_empty());

        state.set_nested("filters", "a", 2);
        assert_eq!(changes.borrow().len(), 1);
        assert_eq!(changes.borrow()[0].1, Some(json!({ "a": 2, "b": [1, 2] })));
    }

    #[test]
    fn test_direct_field_assignment_notifies_once() {
        let state = ReactiveState::new(record(json!({ "a": 1 })));
        let (count, bump) = tally();
        let _sub = state.subscribe(move |_, _| bump());

        state.set("a", 2);
        state.set("b", "new");
        state.set_nested("meta", "seen", true);

        assert_eq!(count.get(), 3);
        assert_eq!(state.get("meta"), Some(json!({ "seen": true })));
    }

    #[test]
    fn test_set_nested_replaces_non_object() {
        let state = ReactiveState::new(record(json!({ "meta": 5 })));
        state.set_nested("meta", "k", "v");
        assert_eq!(state.get("meta"), Some(json!({ "k": "v" })));
    }

    #[test]
    fn test_remove_field() {
        let state = ReactiveState::new(record(json!({ "a": 1 })));
        let (count, bump) = tally();
        let _sub = state.subscribe(move |_, _| bump());

        assert_eq!(state.remove("missing"), None);
        assert_eq!(count.get(), 0);

        assert_eq!(state.remove("a"), Some(json!(1)));
        assert_eq!(count.get(), 1);
        assert_eq!(state.get("a"), None);
    }

    #[test]
    fn test_reset_forces_selectors() {
        let state = counter();
        let (selected, bump) = tally();
        let (full, bump_full) = tally();
        let _sel = state.select(|s| s.count, move |_, _| bump());
        let _all = state.subscribe(move |_, _| bump_full());

        // Same count, but reset notifies as a full change
        state.reset(Counter {
            count: 0,
            label: "fresh".to_string(),
        });

        assert_eq!(selected.get(), 1);
        assert_eq!(full.get(), 1);
        assert_eq!(state.value().label, "fresh");
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let state = counter();
        let (count, bump) = tally();

        let _bad = state.subscribe(|_, _| panic!("listener failure"));
        let _bad_selector = state.select(|s| s.count, |_, _| panic!("selector failure"));
        let _good = state.subscribe(move |_, _| bump());

        state.update(|s| s.count = 7);

        assert_eq!(count.get(), 1);
        assert_eq!(state.value().count, 7);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let state = counter();
        let (count, bump) = tally();
        let sub = state.subscribe(move |_, _| bump());

        state.update(|s| s.count = 1);
        sub.unsubscribe();
        sub.unsubscribe();
        state.update(|s| s.count = 2);

        assert_eq!(count.get(), 1);
        assert_eq!(state.listener_count(), 0);
    }

    #[test]
    fn test_listener_may_mutate_state() {
        let state = counter();
        let state_clone = state.clone();
        let _sub = state.select(
            |s| s.count,
            move |new, _| {
                if *new < 3 {
                    state_clone.update(|s| s.count += 1);
                }
            },
        );

        state.update(|s| s.count = 1);
        assert_eq!(state.value().count, 3);
    }
}
