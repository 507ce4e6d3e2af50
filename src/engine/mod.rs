//! Component Engine - Lifecycle and rendering for components.
//!
//! - [`Component`]: what a component implements (template, events, hooks)
//! - [`ComponentEngine`]: the instance that mounts, re-renders and unmounts it
//! - [`Mountable`]: type-erased handle used for child and route ownership
//!
//! # Lifecycle
//!
//! ```text
//! mount:   before_mount -> template -> insert root -> bind_events -> children -> after_mount
//! update:  before_update -> template -> replace root -> bind_events -> children -> after_update
//! unmount: before_unmount -> dispose children -> drop listeners -> remove root -> after_unmount
//! ```
//!
//! Ownership only points downward: a parent owns its children by key, and a
//! child talks back through its own event channel.

mod component;
mod instance;
mod lifecycle;

pub use component::{Binder, Component, HookContext};
pub use instance::ComponentEngine;
pub use lifecycle::{Container, Mountable, Phase};
