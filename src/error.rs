//! Error types.
//!
//! Only fatal conditions are errors. Listener panics are isolated and logged,
//! and the routing outcomes "not found" and "guard rejected" are ordinary
//! [`Resolution`](crate::router::Resolution) values.

use thiserror::Error;

use crate::host::NodeId;

pub type Result<T> = std::result::Result<T, ComponentError>;

/// Failure while turning markup into host nodes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    #[error("unexpected end of markup at byte {offset}")]
    UnexpectedEnd { offset: usize },

    #[error("closing tag </{found}> does not match <{expected}> at byte {offset}")]
    MismatchedTag {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("stray closing tag </{found}> at byte {offset}")]
    UnexpectedClose { found: String, offset: usize },

    #[error("element <{tag}> opened at byte {offset} is never closed")]
    UnclosedTag { tag: String, offset: usize },

    #[error("unterminated comment starting at byte {offset}")]
    UnterminatedComment { offset: usize },

    #[error("expected a tag name at byte {offset}")]
    MissingTagName { offset: usize },
}

/// Failure of a host-tree operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("host node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("host node {0} is not an element")]
    NotAnElement(NodeId),

    #[error("host node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("inserting {child} under {parent} would create a cycle")]
    HierarchyCycle { parent: NodeId, child: NodeId },
}

/// Failure of a component lifecycle operation.
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("mount container not found: {key}")]
    ContainerNotFound { key: String },

    #[error("template produced no root node")]
    EmptyTemplate,

    #[error("invalid template markup: {0}")]
    Markup(#[from] MarkupError),

    #[error("slot placeholder not found: {slot}")]
    SlotNotFound { slot: String },

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("lifecycle hook failed: {message}")]
    Hook { message: String },
}

impl ComponentError {
    /// Error for lifecycle hooks to return.
    #[must_use]
    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook {
            message: message.into(),
        }
    }
}

/// Failure of a router operation.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("router has not been started; call start() with a container first")]
    NotStarted,

    #[error(transparent)]
    Component(#[from] ComponentError),

    #[error(transparent)]
    Host(#[from] HostError),
}
