//! The component contract.
//!
//! A component supplies markup from its props and state, and optionally binds
//! host listeners and lifecycle hooks. Everything else (mounting, re-rendering
//! on state change, child ownership) is done by
//! [`ComponentEngine`](super::ComponentEngine).
//!
//! # Example
//!
//! ```ignore
//! use spark_ui::{record, Binder, Component, Record, Result};
//! use serde_json::json;
//!
//! struct Counter;
//!
//! impl Component for Counter {
//!     type Props = Record;
//!     type State = Record;
//!
//!     fn initial_state(&self, _props: &Record) -> Record {
//!         record(json!({ "count": 0 }))
//!     }
//!
//!     fn template(&self, _props: &Record, state: &Record) -> String {
//!         format!("<button>{}</button>", state["count"])
//!     }
//!
//!     fn bind_events(&self, binder: &mut Binder<'_, Self>) -> Result<()> {
//!         let state = binder.state().clone();
//!         binder.on_root("click", move |_| {
//!             let next = state.get("count").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
//!             state.set("count", next);
//!         })?;
//!         Ok(())
//!     }
//! }
//! ```

use std::rc::Rc;

use serde_json::Value;

use crate::context::AppContext;
use crate::error::Result;
use crate::host::{Document, HostEvent, ListenerId, NodeId};
use crate::state::{EventChannel, ReactiveState};
use crate::types::Merge;

// =============================================================================
// Component
// =============================================================================

/// A renderable unit with props, local state and lifecycle hooks.
///
/// Hooks return `Result`; an error aborts the lifecycle operation that ran the
/// hook and reaches its caller.
pub trait Component: Sized + 'static {
    /// Externally supplied configuration. `set_props` merges into it.
    type Props: Clone + PartialEq + Merge + 'static;

    /// Local state, held in a [`ReactiveState`] owned by the engine.
    type State: Clone + 'static;

    fn initial_state(&self, props: &Self::Props) -> Self::State;

    /// Markup with a single root element. Must not have side effects.
    fn template(&self, props: &Self::Props, state: &Self::State) -> String;

    /// Attach host listeners to the freshly rendered root.
    ///
    /// Runs after every render against a new root, so it must be safe to call
    /// repeatedly.
    fn bind_events(&self, _binder: &mut Binder<'_, Self>) -> Result<()> {
        Ok(())
    }

    /// Whether a props change re-renders. Defaults to structural inequality.
    fn should_update(&self, new_props: &Self::Props, old_props: &Self::Props) -> bool {
        new_props != old_props
    }

    fn before_mount(&mut self, _cx: &HookContext<'_, Self>) -> Result<()> {
        Ok(())
    }

    fn after_mount(&mut self, _cx: &HookContext<'_, Self>) -> Result<()> {
        Ok(())
    }

    fn before_update(&mut self, _cx: &HookContext<'_, Self>) -> Result<()> {
        Ok(())
    }

    fn after_update(&mut self, _cx: &HookContext<'_, Self>) -> Result<()> {
        Ok(())
    }

    fn before_unmount(&mut self, _cx: &HookContext<'_, Self>) -> Result<()> {
        Ok(())
    }

    fn after_unmount(&mut self, _cx: &HookContext<'_, Self>) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// HookContext
// =============================================================================

/// What a lifecycle hook can see.
///
/// State changes made from a hook are deferred: the engine re-renders once the
/// running lifecycle operation has finished.
pub struct HookContext<'a, C: Component> {
    pub(crate) props: &'a C::Props,
    pub(crate) state: &'a ReactiveState<C::State>,
    pub(crate) events: &'a EventChannel<Value>,
    pub(crate) context: &'a AppContext,
    pub(crate) root: Option<NodeId>,
}

impl<'a, C: Component> HookContext<'a, C> {
    pub fn props(&self) -> &'a C::Props {
        self.props
    }

    pub fn state(&self) -> &'a ReactiveState<C::State> {
        self.state
    }

    /// The component's own event channel.
    pub fn events(&self) -> &'a EventChannel<Value> {
        self.events
    }

    pub fn context(&self) -> &'a AppContext {
        self.context
    }

    /// Current root node; `None` before the first render and after removal.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }
}

// =============================================================================
// Binder
// =============================================================================

/// Attaches host listeners for one render of a component.
///
/// Every listener registered here is removed before the next render and on
/// unmount.
pub struct Binder<'a, C: Component> {
    pub(crate) root: NodeId,
    pub(crate) props: &'a C::Props,
    pub(crate) state: &'a ReactiveState<C::State>,
    pub(crate) events: &'a EventChannel<Value>,
    pub(crate) context: &'a AppContext,
    pub(crate) listeners: Vec<ListenerId>,
}

impl<'a, C: Component> Binder<'a, C> {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn document(&self) -> &'a Document {
        self.context.document()
    }

    pub fn props(&self) -> &'a C::Props {
        self.props
    }

    /// Clone this into handlers that mutate state.
    pub fn state(&self) -> &'a ReactiveState<C::State> {
        self.state
    }

    /// Clone this into handlers that emit component events.
    pub fn events(&self) -> &'a EventChannel<Value> {
        self.events
    }

    pub fn context(&self) -> &'a AppContext {
        self.context
    }

    /// Listen for `kind` events reaching `node`.
    pub fn on(
        &mut self,
        node: NodeId,
        kind: &str,
        handler: impl Fn(&HostEvent) + 'static,
    ) -> Result<ListenerId> {
        let id = self.document().add_event_listener(node, kind, handler)?;
        self.listeners.push(id);
        Ok(id)
    }

    /// Listen for `kind` events reaching the root, including bubbled ones.
    pub fn on_root(&mut self, kind: &str, handler: impl Fn(&HostEvent) + 'static) -> Result<ListenerId> {
        self.on(self.root, kind, handler)
    }

    /// Listen on every element under the root whose `attribute` equals `value`.
    ///
    /// Returns how many elements were bound.
    pub fn on_attribute(
        &mut self,
        attribute: &str,
        value: &str,
        kind: &str,
        handler: impl Fn(&HostEvent) + 'static,
    ) -> Result<usize> {
        let handler: Rc<dyn Fn(&HostEvent)> = Rc::new(handler);
        let nodes = self.document().find_all_by_attribute(self.root, attribute, value);
        for &node in &nodes {
            let handler = Rc::clone(&handler);
            self.on(node, kind, move |event| handler(event))?;
        }
        Ok(nodes.len())
    }

    /// First element under the root whose `attribute` equals `value`.
    pub fn find(&self, attribute: &str, value: &str) -> Option<NodeId> {
        self.document().find_by_attribute(self.root, attribute, value)
    }
}
