//! # spark-ui
//!
//! Reactive UI components and client-side routing for Rust.
//!
//! Components render markup into a host node tree, re-render when their
//! reactive state changes, own named child components, and talk upward through
//! their own event channels. A router maps locations to components, with
//! `:name` path captures, nested routes and async guards.
//!
//! ## Architecture
//!
//! ```text
//! Router ──resolve──> ComponentEngine ──template──> Document
//!                          │  ▲
//!            ReactiveState ┘  └ EventChannel (upward events)
//! ```
//!
//! Everything is single-threaded and handle based: `Document`, `ReactiveState`,
//! `EventChannel`, `ComponentEngine` and `Router` are cheap `Rc` clones of one
//! shared instance. Ownership points downward only.
//!
//! ## Modules
//!
//! - [`state`] - Event channel and reactive state container
//! - [`host`] - Node tree, markup parser, event dispatch
//! - [`engine`] - Component trait and lifecycle engine
//! - [`router`] - Route table, path patterns, history, navigation
//! - [`context`] - The explicit application context
//! - [`config`] - Reserved attribute names, base path, fallback text
//!
//! Logging goes through `tracing`; install a subscriber to see it.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod host;
pub mod router;
pub mod state;
pub mod types;

mod utils;

pub use config::Config;
pub use context::AppContext;
pub use error::{ComponentError, HostError, MarkupError, Result, RouterError};
pub use types::*;

pub use engine::{Binder, Component, ComponentEngine, Container, HookContext, Mountable, Phase};

pub use host::{Document, EventFlags, HostEvent, ListenerId, NodeId, NodeKind};

pub use router::{
    AFTER_CHANGE, BEFORE_CHANGE, GUARD_REJECTED, Guard, History, NOT_FOUND, Navigation, Params,
    PathPattern, Resolution, Route, RouteMatch, RouteProps, Router,
};

pub use state::{EventChannel, Handler, ReactiveState};
