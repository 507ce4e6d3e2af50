//! State Module - Signaling and reactive value primitives
//!
//! The two leaf systems everything else is built on:
//!
//! - **Channel** - Named-event publish/subscribe with panic-isolated delivery
//! - **Reactive** - Value container with full-state and selector subscriptions

mod channel;
mod reactive;

pub use channel::*;
pub use reactive::ReactiveState;
