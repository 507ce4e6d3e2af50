//! Lifecycle vocabulary shared by components and the router.
//!
//! - [`Phase`]: where a component is in its mount/update/unmount cycle
//! - [`Container`]: where to mount, by node or by lookup key
//! - [`Mountable`]: the type-erased handle parents and routers own

use std::fmt;

use crate::error::{ComponentError, Result};
use crate::host::{Document, NodeId};

// =============================================================================
// Phase
// =============================================================================

/// Lifecycle phase of a component.
///
/// ```text
/// Unmounted -> Mounting -> Mounted <-> Updating
///                             |
///                        Unmounting -> Unmounted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Unmounted,
    Mounting,
    Mounted,
    Updating,
    Unmounting,
}

impl Phase {
    /// True while the component owns a root in the host tree.
    pub fn is_mounted(self) -> bool {
        matches!(self, Phase::Mounted | Phase::Updating)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Unmounted => "unmounted",
            Phase::Mounting => "mounting",
            Phase::Mounted => "mounted",
            Phase::Updating => "updating",
            Phase::Unmounting => "unmounting",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Container
// =============================================================================

/// Mount target: a node, or the `id` of an element attached to the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    Node(NodeId),
    /// Element id, with or without a leading `#`.
    Key(String),
}

impl From<NodeId> for Container {
    fn from(node: NodeId) -> Self {
        Container::Node(node)
    }
}

impl From<&str> for Container {
    fn from(key: &str) -> Self {
        Container::Key(key.to_string())
    }
}

impl From<String> for Container {
    fn from(key: String) -> Self {
        Container::Key(key)
    }
}

impl Container {
    /// Find the node this container refers to.
    pub fn resolve(&self, document: &Document) -> Result<NodeId> {
        match self {
            Container::Node(node) if document.contains(*node) => Ok(*node),
            Container::Node(node) => Err(ComponentError::ContainerNotFound {
                key: node.to_string(),
            }),
            Container::Key(key) => {
                let id = key.strip_prefix('#').unwrap_or(key);
                document
                    .get_element_by_id(id)
                    .ok_or_else(|| ComponentError::ContainerNotFound { key: key.clone() })
            }
        }
    }
}

// =============================================================================
// Mountable
// =============================================================================

/// Type-erased component handle.
///
/// Parents own their children and the router owns its current page through
/// this trait, without knowing their props or state types.
pub trait Mountable {
    /// Render into `container` and attach. Mounting an already mounted
    /// component re-renders it there, replacing its prior root.
    fn mount(&self, container: Container) -> Result<()>;

    /// Tear down: children, subscriptions, listeners and the root node.
    /// No-op when not mounted.
    fn unmount(&self) -> Result<()>;

    /// Unmount, then drop everything registered on the component's own event
    /// channel. Used when the owner discards the component. If unmounting
    /// fails the channel is left as it was.
    fn dispose(&self) -> Result<()>;

    /// Unlink the root from the host tree without freeing it, so a parent can
    /// re-render around a mounted child.
    fn detach(&self);

    /// Put a detached root under `container`, or mount if not mounted.
    fn relocate(&self, container: NodeId) -> Result<()>;

    fn phase(&self) -> Phase;

    fn root(&self) -> Option<NodeId>;

    fn is_mounted(&self) -> bool {
        self.phase().is_mounted()
    }
}
