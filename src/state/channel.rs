//! Event Channel - Named-event publish/subscribe.
//!
//! The foundation for cross-component signaling. Components expose one for
//! upward communication, the router publishes its navigation lifecycle on one,
//! and [`AppContext`](crate::AppContext) carries a shared bus.
//!
//! # API
//!
//! - `on(event, fn)` - Subscribe; returns an [`Unsubscribe`] for this registration
//! - `once(event, fn)` - Subscribe for the first emission only
//! - `off(event, &handler)` - Remove a shared [`Handler`] by identity
//! - `emit(event, &payload)` - Deliver to every handler registered when the call starts
//! - `remove_all_listeners(event)` - Clear one event, or everything with `None`
//!
//! # Example
//!
//! ```ignore
//! use spark_ui::EventChannel;
//!
//! let channel: EventChannel<String> = EventChannel::new();
//!
//! let sub = channel.on("saved", |name| println!("saved {name}"));
//! channel.emit("saved", &"draft.txt".to_string());
//!
//! sub.unsubscribe();
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::types::Unsubscribe;
use crate::utils::run_isolated;

// =============================================================================
// TYPES
// =============================================================================

/// A shareable event handler. Registering the same `Handler` lets it be
/// removed again with [`EventChannel::off`].
pub type Handler<T> = Rc<dyn Fn(&T)>;

struct Registration<T> {
    id: usize,
    handler: Handler<T>,
}

struct ChannelRegistry<T> {
    handlers: HashMap<String, Vec<Registration<T>>>,
    next_id: usize,
}

impl<T> ChannelRegistry<T> {
    fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            next_id: 0,
        }
    }

    fn next_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn insert(&mut self, event: &str, id: usize, handler: Handler<T>) {
        self.handlers
            .entry(event.to_string())
            .or_default()
            .push(Registration { id, handler });
    }

    /// Remove matching registrations; drops the event entry once it is empty.
    fn remove_where(&mut self, event: &str, matches: impl Fn(&Registration<T>) -> bool) {
        if let Some(registrations) = self.handlers.get_mut(event) {
            registrations.retain(|registration| !matches(registration));
            if registrations.is_empty() {
                self.handlers.remove(event);
            }
        }
    }
}

// =============================================================================
// EVENT CHANNEL
// =============================================================================

/// Named-event publish/subscribe channel.
///
/// Cloning produces another handle to the same registry.
pub struct EventChannel<T> {
    registry: Rc<RefCell<ChannelRegistry<T>>>,
}

impl<T> Clone for EventChannel<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
        }
    }
}

impl<T: 'static> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.borrow();
        let mut events: Vec<(&str, usize)> = registry
            .handlers
            .iter()
            .map(|(name, handlers)| (name.as_str(), handlers.len()))
            .collect();
        events.sort_unstable();
        f.debug_struct("EventChannel").field("events", &events).finish()
    }
}

impl<T: 'static> EventChannel<T> {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(ChannelRegistry::new())),
        }
    }

    /// Subscribe to `event`.
    ///
    /// Registering the same closure twice yields two independent
    /// registrations that both fire.
    pub fn on(&self, event: &str, handler: impl Fn(&T) + 'static) -> Unsubscribe {
        self.add_handler(event, Rc::new(handler))
    }

    /// Subscribe a shared [`Handler`], which can later be passed to [`off`](Self::off).
    pub fn add_handler(&self, event: &str, handler: Handler<T>) -> Unsubscribe {
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.next_id();
            registry.insert(event, id, handler);
            id
        };
        self.unsubscriber(event, id)
    }

    /// Subscribe for a single delivery.
    ///
    /// The registration is removed before the handler runs, so emissions made
    /// from inside the handler do not reach it again.
    pub fn once(&self, event: &str, handler: impl Fn(&T) + 'static) -> Unsubscribe {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id();

        let weak = Rc::downgrade(&self.registry);
        let name = event.to_string();
        let fired = Cell::new(false);
        let wrapper: Handler<T> = Rc::new(move |payload: &T| {
            if fired.replace(true) {
                return;
            }
            remove_registration(&weak, &name, id);
            handler(payload);
        });

        registry.insert(event, id, wrapper);
        drop(registry);
        self.unsubscriber(event, id)
    }

    /// Remove every registration of `handler` for `event`. No-op if absent.
    pub fn off(&self, event: &str, handler: &Handler<T>) {
        self.registry
            .borrow_mut()
            .remove_where(event, |registration| Rc::ptr_eq(&registration.handler, handler));
    }

    /// Deliver `payload` to the handlers registered for `event`.
    ///
    /// Handlers run in insertion order against a snapshot taken at the start
    /// of the call; handlers added during delivery wait for the next emit. A
    /// panicking handler is logged and skipped. Returns the number of
    /// handlers invoked.
    pub fn emit(&self, event: &str, payload: &T) -> usize {
        let snapshot: Vec<Handler<T>> = {
            let registry = self.registry.borrow();
            match registry.handlers.get(event) {
                Some(registrations) => registrations
                    .iter()
                    .map(|registration| Rc::clone(&registration.handler))
                    .collect(),
                None => return 0,
            }
        };

        tracing::trace!(event, handlers = snapshot.len(), "emit");
        for handler in &snapshot {
            run_isolated("event handler", event, || handler(payload));
        }
        snapshot.len()
    }

    /// Clear the handlers for one event, or for every event when `None`.
    pub fn remove_all_listeners(&self, event: Option<&str>) {
        let mut registry = self.registry.borrow_mut();
        match event {
            Some(event) => {
                registry.handlers.remove(event);
            }
            None => registry.handlers.clear(),
        }
    }

    /// Number of registrations for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.registry
            .borrow()
            .handlers
            .get(event)
            .map_or(0, Vec::len)
    }

    /// True if any handler is registered for `event`.
    pub fn has_listeners(&self, event: &str) -> bool {
        self.registry.borrow().handlers.contains_key(event)
    }

    /// Names of events that currently have handlers, sorted.
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.borrow().handlers.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    fn unsubscriber(&self, event: &str, id: usize) -> Unsubscribe {
        let weak = Rc::downgrade(&self.registry);
        let event = event.to_string();
        Unsubscribe::new(move || remove_registration(&weak, &event, id))
    }
}

fn remove_registration<T>(registry: &Weak<RefCell<ChannelRegistry<T>>>, event: &str, id: usize) {
    if let Some(registry) = registry.upgrade() {
        registry
            .borrow_mut()
            .remove_where(event, |registration| registration.id == id);
    }
}

// =============================================================================
// TESTS
// =============================================================================
