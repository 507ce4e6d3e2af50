//! Host events - what `Document::dispatch_event` delivers to listeners.

use std::cell::Cell;

use serde_json::Value;

use super::NodeId;

bitflags::bitflags! {
    /// Dispatch behavior and outcome flags for a [`HostEvent`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EventFlags: u8 {
        const NONE = 0;
        /// Propagate from the target up through its ancestors.
        const BUBBLES = 1 << 0;
        /// `prevent_default` has an effect.
        const CANCELABLE = 1 << 1;
        const DEFAULT_PREVENTED = 1 << 2;
        const PROPAGATION_STOPPED = 1 << 3;
    }
}

/// An event travelling through the host tree.
#[derive(Debug, Clone)]
pub struct HostEvent {
    kind: String,
    target: NodeId,
    current_target: Cell<NodeId>,
    flags: Cell<EventFlags>,
    detail: Value,
}

impl HostEvent {
    /// A non-bubbling, non-cancelable event.
    pub fn new(kind: impl Into<String>, target: NodeId) -> Self {
        Self::with_flags(kind, target, EventFlags::NONE)
    }

    pub fn with_flags(kind: impl Into<String>, target: NodeId, flags: EventFlags) -> Self {
        Self {
            kind: kind.into(),
            target,
            current_target: Cell::new(target),
            flags: Cell::new(flags),
            detail: Value::Null,
        }
    }

    /// A bubbling, cancelable click.
    pub fn click(target: NodeId) -> Self {
        Self::with_flags("click", target, EventFlags::BUBBLES | EventFlags::CANCELABLE)
    }

    /// Attach an arbitrary payload, e.g. an input value.
    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The node the event was dispatched at.
    pub fn target(&self) -> NodeId {
        self.target
    }

    /// The node whose listener is currently running.
    pub fn current_target(&self) -> NodeId {
        self.current_target.get()
    }

    pub fn detail(&self) -> &Value {
        &self.detail
    }

    pub fn flags(&self) -> EventFlags {
        self.flags.get()
    }

    /// Suppress the default action. Ignored unless the event is cancelable.
    pub fn prevent_default(&self) {
        if self.flags().contains(EventFlags::CANCELABLE) {
            self.insert_flag(EventFlags::DEFAULT_PREVENTED);
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.flags().contains(EventFlags::DEFAULT_PREVENTED)
    }

    /// Stop after the listeners of the current node have run.
    pub fn stop_propagation(&self) {
        self.insert_flag(EventFlags::PROPAGATION_STOPPED);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.flags().contains(EventFlags::PROPAGATION_STOPPED)
    }

    pub(crate) fn set_current_target(&self, node: NodeId) {
        self.current_target.set(node);
    }

    fn insert_flag(&self, flag: EventFlags) {
        self.flags.set(self.flags.get() | flag);
    }
}
