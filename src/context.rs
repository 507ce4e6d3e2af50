//! Application context - The environment components and routers run in.
//!
//! Bundles the host [`Document`], the session [`History`], an application-wide
//! event bus and the [`Config`]. It is constructed explicitly and handed to
//! every component and router, so tests build isolated instances.

use std::rc::Rc;

use serde_json::Value;

use crate::config::Config;
use crate::host::Document;
use crate::router::History;
use crate::state::EventChannel;

/// Shared environment. Cloning shares every part.
#[derive(Clone, Debug)]
pub struct AppContext {
    document: Document,
    history: History,
    bus: EventChannel<Value>,
    config: Rc<Config>,
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AppContext {
    /// Fresh document and history with the default config.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Fresh document, with the history starting at the base path root.
    pub fn with_config(config: Config) -> Self {
        let history = History::new(config.apply_base("/"));
        Self::from_parts(Document::new(), history, config)
    }

    pub fn from_parts(document: Document, history: History, config: Config) -> Self {
        Self {
            document,
            history,
            bus: EventChannel::new(),
            config: Rc::new(config),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Application-wide event bus for cross-component signaling.
    pub fn bus(&self) -> &EventChannel<Value> {
        &self.bus
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn test_clones_share_parts() {
        let context = AppContext::new();
        let other = context.clone();

        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        other.bus().on("ping", move |_| hits_clone.set(hits_clone.get() + 1));
        context.bus().emit("ping", &json!(null));

        let node = context.document().create_element("div");
        assert!(other.document().contains(node));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_contexts_are_isolated() {
        let a = AppContext::new();
        let b = AppContext::new();
        a.history().push("/elsewhere");
        assert_eq!(b.history().location(), "/");
    }

    #[test]
    fn test_history_starts_at_base() {
        let context = AppContext::with_config(Config::new().with_base_path("/app"));
        assert_eq!(context.history().location(), "/app/");
        assert_eq!(context.config().base_path, "/app");
    }
}
