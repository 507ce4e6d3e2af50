//! ComponentEngine - Mounts, re-renders and tears down one component.
//!
//! The engine owns the component value, its props, a [`ReactiveState`] for its
//! local state, an [`EventChannel`] for its outward events, and its children.
//!
//! # Rendering
//!
//! Every render materializes the whole template and swaps it in for the
//! previous root. Mounted children are unlinked from the old root first, then
//! put into the placeholders of the new one, so their own state and listeners
//! survive a parent re-render.
//!
//! # Deferred updates
//!
//! A state change made while the engine is running a lifecycle operation (from
//! a hook, or from a child event the parent reacts to) only marks an update as
//! pending. The update runs once the operation finishes. Updates triggered by
//! state changes have no caller, so their errors are logged.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde_json::Value;

use super::component::{Binder, Component, HookContext};
use super::lifecycle::{Container, Mountable, Phase};
use crate::context::AppContext;
use crate::error::{ComponentError, Result};
use crate::host::{ListenerId, NodeId};
use crate::state::{EventChannel, ReactiveState};
use crate::types::{Merge, Unsubscribe};

// =============================================================================
// Internals
// =============================================================================

struct ChildEntry {
    target_slot: String,
    handle: Rc<dyn Mountable>,
}

struct EngineInner<C: Component> {
    props: C::Props,
    phase: Phase,
    root: Option<NodeId>,
    container: Option<NodeId>,
    children: IndexMap<String, ChildEntry>,
    state_subscription: Option<Unsubscribe>,
    listeners: Vec<ListenerId>,
}

struct EngineShared<C: Component> {
    component: RefCell<C>,
    inner: RefCell<EngineInner<C>>,
    state: ReactiveState<C::State>,
    events: EventChannel<Value>,
    context: AppContext,
    busy: Cell<bool>,
    pending: Cell<bool>,
}

#[derive(Clone, Copy)]
enum Hook {
    BeforeMount,
    AfterMount,
    BeforeUpdate,
    AfterUpdate,
    BeforeUnmount,
    AfterUnmount,
}

// =============================================================================
// ComponentEngine
// =============================================================================

/// Handle to a component instance. Cloning shares the instance.
pub struct ComponentEngine<C: Component> {
    shared: Rc<EngineShared<C>>,
}

impl<C: Component> Clone for ComponentEngine<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<C: Component> fmt::Debug for ComponentEngine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.borrow();
        f.debug_struct("ComponentEngine")
            .field("component", &std::any::type_name::<C>())
            .field("phase", &inner.phase)
            .field("root", &inner.root)
            .field("children", &inner.children.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<C: Component> ComponentEngine<C> {
    /// Create an unmounted instance. The initial state comes from
    /// [`Component::initial_state`].
    pub fn new(component: C, props: C::Props, context: &AppContext) -> Self {
        let state = ReactiveState::new(component.initial_state(&props));
        Self {
            shared: Rc::new(EngineShared {
                component: RefCell::new(component),
                inner: RefCell::new(EngineInner {
                    props,
                    phase: Phase::Unmounted,
                    root: None,
                    container: None,
                    children: IndexMap::new(),
                    state_subscription: None,
                    listeners: Vec::new(),
                }),
                state,
                events: EventChannel::new(),
                context: context.clone(),
                busy: Cell::new(false),
                pending: Cell::new(false),
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn props(&self) -> C::Props {
        self.shared.inner.borrow().props.clone()
    }

    pub fn state(&self) -> &ReactiveState<C::State> {
        &self.shared.state
    }

    /// The component's outward event channel.
    pub fn events(&self) -> &EventChannel<Value> {
        &self.shared.events
    }

    pub fn context(&self) -> &AppContext {
        &self.shared.context
    }

    pub fn phase(&self) -> Phase {
        self.shared.inner.borrow().phase
    }

    pub fn is_mounted(&self) -> bool {
        self.phase().is_mounted()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.shared.inner.borrow().root
    }

    pub fn container(&self) -> Option<NodeId> {
        self.shared.inner.borrow().container
    }

    /// Borrow the component value.
    pub fn with_component<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.shared.component.borrow())
    }

    /// Host listeners bound by the current render.
    pub fn listener_count(&self) -> usize {
        self.shared.inner.borrow().listeners.len()
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Subscribe to one of this component's events.
    pub fn on(&self, event: &str, handler: impl Fn(&Value) + 'static) -> Unsubscribe {
        self.shared.events.on(event, handler)
    }

    /// Emit an event to whoever subscribed on this component.
    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        self.shared.events.emit(event, payload)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Render into `container`, bind events, mount children and start
    /// reacting to state changes.
    pub fn mount(&self, container: impl Into<Container>) -> Result<()> {
        let container = container.into();
        self.run(|engine| engine.run_mount(&container))
    }

    /// Tear the component down and restore the container. No-op when not
    /// mounted.
    pub fn unmount(&self) -> Result<()> {
        self.run(Self::run_unmount)
    }

    /// Re-render now. Deferred if a lifecycle operation is running; no-op
    /// when not mounted.
    pub fn update(&self) -> Result<()> {
        if self.shared.busy.get() {
            self.shared.pending.set(true);
            return Ok(());
        }
        if !self.is_mounted() {
            return Ok(());
        }
        self.run(Self::run_update)
    }

    /// Shallow-merge `partial` into the props. Re-renders when mounted and
    /// [`Component::should_update`] agrees. Returns whether the props change
    /// was accepted as an update.
    pub fn set_props(&self, partial: <C::Props as Merge>::Partial) -> Result<bool> {
        let (old, new) = {
            let mut inner = self.shared.inner.borrow_mut();
            let old = inner.props.clone();
            inner.props.merge(partial);
            (old, inner.props.clone())
        };

        let changed = self.shared.component.borrow().should_update(&new, &old);
        if changed && self.is_mounted() {
            self.update()?;
        }
        Ok(changed)
    }

    // -------------------------------------------------------------------------
    // Children
    // -------------------------------------------------------------------------

    /// Own `component` under `key`, replacing (and disposing) any previous
    /// occupant. When this component is mounted, the child mounts at once
    /// into the placeholder whose slot attribute equals `target_slot`.
    ///
    /// The returned handle lets the caller subscribe to the child's events.
    pub fn add_child<K: Component>(
        &self,
        key: &str,
        component: K,
        props: K::Props,
        target_slot: &str,
    ) -> Result<ComponentEngine<K>> {
        self.remove_child(key)?;

        let child = ComponentEngine::new(component, props, &self.shared.context);
        if let Some(root) = self.root().filter(|_| self.is_mounted()) {
            let slot = self
                .find_slot(root, target_slot)
                .ok_or_else(|| ComponentError::SlotNotFound {
                    slot: target_slot.to_string(),
                })?;
            child.mount(slot)?;
        }

        tracing::debug!(key, slot = target_slot, child = std::any::type_name::<K>(), "child added");
        self.shared.inner.borrow_mut().children.insert(
            key.to_string(),
            ChildEntry {
                target_slot: target_slot.to_string(),
                handle: Rc::new(child.clone()),
            },
        );
        Ok(child)
    }

    /// Dispose the child under `key`. Returns false if there was none.
    ///
    /// A child whose teardown fails stays registered under `key`.
    pub fn remove_child(&self, key: &str) -> Result<bool> {
        let Some(handle) = self.child(key) else {
            return Ok(false);
        };
        handle.dispose()?;
        self.shared.inner.borrow_mut().children.shift_remove(key);
        tracing::debug!(key, "child removed");
        Ok(true)
    }

    pub fn has_child(&self, key: &str) -> bool {
        self.shared.inner.borrow().children.contains_key(key)
    }

    /// Child keys in insertion order.
    pub fn child_keys(&self) -> Vec<String> {
        self.shared.inner.borrow().children.keys().cloned().collect()
    }

    pub fn child(&self, key: &str) -> Option<Rc<dyn Mountable>> {
        self.shared
            .inner
            .borrow()
            .children
            .get(key)
            .map(|entry| Rc::clone(&entry.handle))
    }

    // =========================================================================
    // Operation driver
    // =========================================================================

    /// Run a lifecycle operation with the busy flag held, then flush any
    /// update it deferred.
    fn run<T>(&self, op: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let result = self.exclusive(op);
        self.flush_pending();
        result
    }

    fn exclusive<T>(&self, op: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let was_busy = self.shared.busy.replace(true);
        let result = op(self);
        if result.is_err() {
            self.settle_phase();
        }
        self.shared.busy.set(was_busy);
        result
    }

    /// After a failed operation, leave the phase consistent with the root.
    fn settle_phase(&self) {
        let mut inner = self.shared.inner.borrow_mut();
        inner.phase = if inner.root.is_some() && inner.container.is_some() {
            Phase::Mounted
        } else {
            Phase::Unmounted
        };
    }

    fn schedule_update(&self) {
        if !self.is_mounted() {
            return;
        }
        self.shared.pending.set(true);
        self.flush_pending();
    }

    fn flush_pending(&self) {
        while !self.shared.busy.get() && self.shared.pending.replace(false) {
            if !self.is_mounted() {
                continue;
            }
            if let Err(error) = self.exclusive(Self::run_update) {
                tracing::error!(
                    component = std::any::type_name::<C>(),
                    %error,
                    "state-triggered update failed"
                );
            }
        }
    }

    fn set_phase(&self, phase: Phase) {
        self.shared.inner.borrow_mut().phase = phase;
    }

    fn downgrade(&self) -> WeakEngine<C> {
        WeakEngine {
            shared: Rc::downgrade(&self.shared),
        }
    }

    // =========================================================================
    // Steps
    // =========================================================================

    fn run_mount(&self, container: &Container) -> Result<()> {
        let container = container.resolve(self.shared.context.document())?;

        self.set_phase(Phase::Mounting);
        self.call_hook(Hook::BeforeMount)?;

        // Subscribe before rendering: a render that inserts the root and then
        // fails still leaves a mounted component that must react to state.
        let needs_subscription = self.shared.inner.borrow().state_subscription.is_none();
        if needs_subscription {
            let weak = self.downgrade();
            let subscription = self.shared.state.subscribe(move |_, _| {
                if let Some(engine) = weak.upgrade() {
                    engine.schedule_update();
                }
            });
            self.shared.inner.borrow_mut().state_subscription = Some(subscription);
        }
        self.render_into(container)?;

        self.set_phase(Phase::Mounted);
        tracing::debug!(
            component = std::any::type_name::<C>(),
            container = %container,
            "mounted"
        );
        self.call_hook(Hook::AfterMount)
    }

    fn run_update(&self) -> Result<()> {
        let Some(container) = self.container() else {
            return Ok(());
        };

        self.set_phase(Phase::Updating);
        self.call_hook(Hook::BeforeUpdate)?;
        self.render_into(container)?;
        self.set_phase(Phase::Mounted);
        tracing::debug!(component = std::any::type_name::<C>(), "updated");
        self.call_hook(Hook::AfterUpdate)
    }

    fn run_unmount(&self) -> Result<()> {
        if self.root().is_none() {
            return Ok(());
        }

        self.set_phase(Phase::Unmounting);
        self.call_hook(Hook::BeforeUnmount)?;

        // Each child leaves the map only once it is torn down, so a failure
        // keeps it and the ones after it owned.
        for (key, _, child) in self.child_handles() {
            tracing::trace!(key = %key, "disposing child");
            child.dispose()?;
            self.shared.inner.borrow_mut().children.shift_remove(&key);
        }

        let (subscription, listeners, root) = {
            let mut inner = self.shared.inner.borrow_mut();
            let subscription = inner.state_subscription.take();
            let listeners = std::mem::take(&mut inner.listeners);
            let root = inner.root.take();
            inner.container = None;
            inner.phase = Phase::Unmounted;
            (subscription, listeners, root)
        };
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        let document = self.shared.context.document();
        for id in listeners {
            document.remove_event_listener(id);
        }
        if let Some(root) = root {
            document.remove_node(root);
        }

        tracing::debug!(component = std::any::type_name::<C>(), "unmounted");
        self.call_hook(Hook::AfterUnmount)
    }

    /// Materialize the template and put it in `container`, in place of the
    /// previous root if there is one. Then bind events and place children.
    fn render_into(&self, container: NodeId) -> Result<()> {
        let document = self.shared.context.document();
        let props = self.props();

        let markup = self.shared.state.with(|state| {
            self.shared.component.borrow().template(&props, state)
        });
        let new_root = document
            .materialize(&markup)?
            .ok_or(ComponentError::EmptyTemplate)?;

        let children = self.child_handles();
        for (_, _, child) in &children {
            child.detach();
        }

        let old_root = self.root();
        let inserted = match old_root {
            Some(old) if document.parent(old) == Some(container) => {
                document.replace_child(container, new_root, old)
            }
            _ => document.append_child(container, new_root),
        };
        if let Err(error) = inserted {
            document.remove_node(new_root);
            self.restore_children(old_root, children);
            return Err(error.into());
        }

        let old_listeners = {
            let mut inner = self.shared.inner.borrow_mut();
            inner.root = Some(new_root);
            inner.container = Some(container);
            std::mem::take(&mut inner.listeners)
        };
        for id in old_listeners {
            document.remove_event_listener(id);
        }
        if let Some(old) = old_root {
            document.remove_node(old);
        }

        let bound = self.bind_events(new_root, &props);
        self.place_children(new_root, children)?;
        bound
    }

    fn bind_events(&self, root: NodeId, props: &C::Props) -> Result<()> {
        let mut binder = Binder {
            root,
            props,
            state: &self.shared.state,
            events: &self.shared.events,
            context: &self.shared.context,
            listeners: Vec::new(),
        };
        let result = self.shared.component.borrow().bind_events(&mut binder);
        // Keep whatever was bound, even on error, so it is removed later.
        self.shared.inner.borrow_mut().listeners = binder.listeners;
        result
    }

    /// Put each child into its slot under `root`. A child whose slot is gone
    /// from the new markup is unmounted and stays registered, so it comes
    /// back if a later render has the slot again.
    fn place_children(
        &self,
        root: NodeId,
        children: Vec<(String, String, Rc<dyn Mountable>)>,
    ) -> Result<()> {
        for (key, target_slot, child) in children {
            match self.find_slot(root, &target_slot) {
                Some(slot) => child.relocate(slot)?,
                None => {
                    tracing::warn!(key = %key, slot = %target_slot, "slot placeholder missing after render");
                    child.unmount()?;
                }
            }
        }
        Ok(())
    }

    /// Undo the detach of a render that could not insert its new root: put
    /// the children back under the old root, or unmount the ones that no
    /// longer have a slot there.
    fn restore_children(
        &self,
        old_root: Option<NodeId>,
        children: Vec<(String, String, Rc<dyn Mountable>)>,
    ) {
        let result = match old_root {
            Some(old) => self.place_children(old, children),
            None => children.iter().try_for_each(|(_, _, child)| child.unmount()),
        };
        if let Err(error) = result {
            tracing::warn!(
                component = std::any::type_name::<C>(),
                %error,
                "could not restore children after a failed render"
            );
        }
    }

    fn find_slot(&self, root: NodeId, slot: &str) -> Option<NodeId> {
        let attribute = &self.shared.context.config().slot_attribute;
        self.shared
            .context
            .document()
            .find_by_attribute(root, attribute, slot)
    }

    fn child_handles(&self) -> Vec<(String, String, Rc<dyn Mountable>)> {
        self.shared
            .inner
            .borrow()
            .children
            .iter()
            .map(|(key, entry)| (key.clone(), entry.target_slot.clone(), Rc::clone(&entry.handle)))
            .collect()
    }

    fn call_hook(&self, hook: Hook) -> Result<()> {
        let (props, root) = {
            let inner = self.shared.inner.borrow();
            (inner.props.clone(), inner.root)
        };
        let cx = HookContext {
            props: &props,
            state: &self.shared.state,
            events: &self.shared.events,
            context: &self.shared.context,
            root,
        };

        let mut component = self.shared.component.borrow_mut();
        match hook {
            Hook::BeforeMount => component.before_mount(&cx),
            Hook::AfterMount => component.after_mount(&cx),
            Hook::BeforeUpdate => component.before_update(&cx),
            Hook::AfterUpdate => component.after_update(&cx),
            Hook::BeforeUnmount => component.before_unmount(&cx),
            Hook::AfterUnmount => component.after_unmount(&cx),
        }
    }
}

// =============================================================================
// Mountable
// =============================================================================

impl<C: Component> Mountable for ComponentEngine<C> {
    fn mount(&self, container: Container) -> Result<()> {
        ComponentEngine::mount(self, container)
    }

    fn unmount(&self) -> Result<()> {
        ComponentEngine::unmount(self)
    }

    fn dispose(&self) -> Result<()> {
        ComponentEngine::unmount(self)?;
        self.shared.events.remove_all_listeners(None);
        Ok(())
    }

    fn detach(&self) {
        let Some(root) = self.root() else {
            return;
        };
        self.shared.context.document().detach(root);
    }

    fn relocate(&self, container: NodeId) -> Result<()> {
        let Some(root) = self.root().filter(|_| self.is_mounted()) else {
            return ComponentEngine::mount(self, container);
        };
        let document = self.shared.context.document();
        document.append_child(container, root)?;
        self.shared.inner.borrow_mut().container = Some(container);
        Ok(())
    }

    fn phase(&self) -> Phase {
        ComponentEngine::phase(self)
    }

    fn root(&self) -> Option<NodeId> {
        ComponentEngine::root(self)
    }
}

// =============================================================================
// Weak handle
// =============================================================================

struct WeakEngine<C: Component> {
    shared: Weak<EngineShared<C>>,
}

impl<C: Component> WeakEngine<C> {
    fn upgrade(&self) -> Option<ComponentEngine<C>> {
        self.shared.upgrade().map(|shared| ComponentEngine { shared })
    }
}

// =============================================================================
// TESTS
// =============================================================================
