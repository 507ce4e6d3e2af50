//! Host tree - The node tree components render into.
//!
//! - [`Document`]: node arena, queries, listeners and event dispatch
//! - [`HostEvent`]: what listeners receive, with [`EventFlags`]
//! - [`markup`]: the template parser and escaping helpers

mod document;
mod event;
pub mod markup;

pub use document::{Document, EventListener, ListenerId, NodeId, NodeKind};
pub use event::{EventFlags, HostEvent};
pub use markup::{MarkupNode, escape_attribute, escape_text};
