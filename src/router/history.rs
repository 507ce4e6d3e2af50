//! Navigation history - An in-process session history stack.
//!
//! Mirrors the browser history model the router is written against:
//!
//! - `push` / `replace` change the current entry silently
//! - `back` / `forward` / `go` move through the stack and emit `popstate`
//!
//! A push discards every entry ahead of the current one.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::state::EventChannel;
use crate::types::Unsubscribe;

/// Event emitted on the history channel when the current entry moves.
pub const POPSTATE: &str = "popstate";

struct HistoryInner {
    entries: Vec<String>,
    index: usize,
}

/// Shared handle to a session history. Cloning shares the stack.
#[derive(Clone)]
pub struct History {
    inner: Rc<RefCell<HistoryInner>>,
    channel: EventChannel<String>,
}

impl Default for History {
    fn default() -> Self {
        Self::new("/")
    }
}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("History")
            .field("entries", &inner.entries)
            .field("index", &inner.index)
            .finish()
    }
}

impl History {
    /// A history with one entry at `location`.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(HistoryInner {
                entries: vec![location.into()],
                index: 0,
            })),
            channel: EventChannel::new(),
        }
    }

    /// Location of the current entry, including any query string.
    pub fn location(&self) -> String {
        let inner = self.inner.borrow();
        inner.entries[inner.index].clone()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Always false: a history holds at least its initial entry.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn index(&self) -> usize {
        self.inner.borrow().index
    }

    pub fn can_go_back(&self) -> bool {
        self.index() > 0
    }

    pub fn can_go_forward(&self) -> bool {
        let inner = self.inner.borrow();
        inner.index + 1 < inner.entries.len()
    }

    /// Add an entry after the current one, dropping any forward entries.
    pub fn push(&self, location: impl Into<String>) {
        let mut inner = self.inner.borrow_mut();
        let keep = inner.index + 1;
        inner.entries.truncate(keep);
        inner.entries.push(location.into());
        inner.index = keep;
    }

    /// Overwrite the current entry.
    pub fn replace(&self, location: impl Into<String>) {
        let mut inner = self.inner.borrow_mut();
        let index = inner.index;
        inner.entries[index] = location.into();
    }

    pub fn back(&self) -> bool {
        self.go(-1)
    }

    pub fn forward(&self) -> bool {
        self.go(1)
    }

    /// Move `delta` entries. Out-of-range moves do nothing and return false;
    /// successful moves emit `popstate` with the new location.
    pub fn go(&self, delta: isize) -> bool {
        let location = {
            let mut inner = self.inner.borrow_mut();
            let Some(target) = inner.index.checked_add_signed(delta) else {
                return false;
            };
            if delta == 0 || target >= inner.entries.len() {
                return false;
            }
            inner.index = target;
            inner.entries[target].clone()
        };

        tracing::debug!(location = %location, "popstate");
        self.channel.emit(POPSTATE, &location);
        true
    }

    /// Listen for entry moves caused by `back`, `forward` or `go`.
    pub fn on_popstate(&self, handler: impl Fn(&String) + 'static) -> Unsubscribe {
        self.channel.on(POPSTATE, handler)
    }

    pub fn popstate_listener_count(&self) -> usize {
        self.channel.listener_count(POPSTATE)
    }
}
