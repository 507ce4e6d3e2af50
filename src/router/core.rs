//! Router - Resolves locations to components and mounts them.
//!
//! Per navigation:
//!
//! ```text
//! idle -> matching -> guarding -> rejected
//!                              -> transitioning -> idle
//! ```
//!
//! Lifecycle events on the router's channel (payload: [`Navigation`]):
//!
//! - `notFound` - no route matched; a fallback is rendered
//! - `guardRejected` - a guard said no; the current page stays
//! - `beforeChange` / `afterChange` - around the page swap
//!
//! # Stale resolutions
//!
//! Every resolution takes a new generation number. After each guard it checks
//! that no newer resolution has started; if one has, it stops with
//! [`Resolution::Superseded`] without touching the page. The most recently
//! requested navigation is therefore the one that commits.
//!
//! # Background resolutions
//!
//! Link clicks and history moves resolve on the router's local task pool. The
//! pool is driven right away, so navigations with synchronous guards complete
//! before the click or `back()` returns. Guards that are still waiting finish
//! on a later [`Router::pump`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use serde::Serialize;
use spark_signals::{Signal, signal};

use super::pattern::{Params, split_path};
use super::route::{ComponentFactory, Route, RouteMatch, RouteProps, find_route};
use crate::context::AppContext;
use crate::engine::{Component, ComponentEngine, Container, Mountable};
use crate::error::RouterError;
use crate::host::{HostEvent, ListenerId, NodeId};
use crate::state::EventChannel;
use crate::types::{Record, Unsubscribe};

pub type Result<T> = std::result::Result<T, RouterError>;

// =============================================================================
// Events and outcomes
// =============================================================================

pub const NOT_FOUND: &str = "notFound";
pub const GUARD_REJECTED: &str = "guardRejected";
pub const BEFORE_CHANGE: &str = "beforeChange";
pub const AFTER_CHANGE: &str = "afterChange";

/// Payload of every router event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Navigation {
    /// Path being resolved, without base path or query.
    pub path: String,
    pub query: Params,
    /// Match of the page mounted when the navigation started.
    pub from: Option<RouteMatch>,
    /// The attempted or committed match; `None` when nothing matched.
    pub to: Option<RouteMatch>,
}

/// How a resolution ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The matched page is mounted.
    Navigated(RouteMatch),
    /// Nothing matched; the not-found page or text is shown.
    NotFound { path: String },
    /// A guard refused; the previous page is still mounted.
    Rejected(RouteMatch),
    /// A newer resolution started while this one waited on a guard.
    Superseded,
}

// =============================================================================
// Router
// =============================================================================

enum Occupant {
    Page(Box<dyn Mountable>),
    Fallback(NodeId),
}

struct RouterInner {
    routes: Vec<Route>,
    not_found: Option<ComponentFactory>,
    container: Option<NodeId>,
    occupant: Option<Occupant>,
    current: Option<RouteMatch>,
    click_listener: Option<ListenerId>,
    popstate: Option<Unsubscribe>,
}

struct RouterShared {
    context: AppContext,
    events: EventChannel<Navigation>,
    inner: RefCell<RouterInner>,
    generation: Cell<u64>,
    current_path: Signal<String>,
    params: Signal<Params>,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

/// Client-side router. Cloning shares the router.
#[derive(Clone)]
pub struct Router {
    shared: Rc<RouterShared>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.borrow();
        f.debug_struct("Router")
            .field("routes", &inner.routes)
            .field("container", &inner.container)
            .field("current", &inner.current)
            .field("generation", &self.shared.generation.get())
            .finish()
    }
}

impl Router {
    pub fn new(context: &AppContext) -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            shared: Rc::new(RouterShared {
                context: context.clone(),
                events: EventChannel::new(),
                inner: RefCell::new(RouterInner {
                    routes: Vec::new(),
                    not_found: None,
                    container: None,
                    occupant: None,
                    current: None,
                    click_listener: None,
                    popstate: None,
                }),
                generation: Cell::new(0),
                current_path: signal(String::new()),
                params: signal(Params::new()),
                pool: RefCell::new(pool),
                spawner,
            }),
        }
    }

    pub fn with_routes(context: &AppContext, routes: impl IntoIterator<Item = Route>) -> Self {
        let router = Self::new(context);
        for route in routes {
            router.add_route(route);
        }
        router
    }

    // -------------------------------------------------------------------------
    // Route table
    // -------------------------------------------------------------------------

    /// Append a route. Takes effect on the next resolution.
    pub fn add_route(&self, route: Route) {
        self.shared.inner.borrow_mut().routes.push(route);
    }

    /// Remove top-level routes declared with `path`. Returns whether any was
    /// removed. The mounted page is left alone.
    pub fn remove_route(&self, path: &str) -> bool {
        let target = split_path(path);
        let mut inner = self.shared.inner.borrow_mut();
        let before = inner.routes.len();
        inner.routes.retain(|route| split_path(route.path()) != target);
        inner.routes.len() != before
    }

    pub fn route_count(&self) -> usize {
        self.shared.inner.borrow().routes.len()
    }

    /// Page to mount when nothing matches, instead of the fallback text.
    pub fn not_found(
        &self,
        factory: impl Fn(&AppContext, RouteProps) -> Box<dyn Mountable> + 'static,
    ) {
        self.shared.inner.borrow_mut().not_found = Some(Rc::new(factory));
    }

    pub fn not_found_component<C>(&self)
    where
        C: Component<Props = RouteProps> + Default,
    {
        self.not_found(|context: &AppContext, props: RouteProps| -> Box<dyn Mountable> {
            Box::new(ComponentEngine::new(C::default(), props, context))
        });
    }

    // -------------------------------------------------------------------------
    // Observation
    // -------------------------------------------------------------------------

    pub fn on(&self, event: &str, handler: impl Fn(&Navigation) + 'static) -> Unsubscribe {
        self.shared.events.on(event, handler)
    }

    pub fn events(&self) -> &EventChannel<Navigation> {
        &self.shared.events
    }

    pub fn context(&self) -> &AppContext {
        &self.shared.context
    }

    /// Match of the mounted page; `None` before the first match and while the
    /// not-found page is shown.
    pub fn current_match(&self) -> Option<RouteMatch> {
        self.shared.inner.borrow().current.clone()
    }

    /// Root node of whatever occupies the container.
    pub fn current_root(&self) -> Option<NodeId> {
        match self.shared.inner.borrow().occupant.as_ref()? {
            Occupant::Page(page) => page.root(),
            Occupant::Fallback(node) => Some(*node),
        }
    }

    pub fn container(&self) -> Option<NodeId> {
        self.shared.inner.borrow().container
    }

    pub fn is_started(&self) -> bool {
        self.container().is_some()
    }

    /// Path of the last resolved location.
    pub fn current_path_signal(&self) -> Signal<String> {
        self.shared.current_path.clone()
    }

    /// Params of the mounted page; empty when nothing matched.
    pub fn params_signal(&self) -> Signal<Params> {
        self.shared.params.clone()
    }

    // -------------------------------------------------------------------------
    // Start / stop
    // -------------------------------------------------------------------------

    /// Take over `container`, start intercepting links and history moves, and
    /// resolve the current location.
    pub async fn start(&self, container: impl Into<Container>) -> Result<Resolution> {
        let context = &self.shared.context;
        let container = container.into().resolve(context.document())?;
        self.shared.inner.borrow_mut().container = Some(container);
        self.attach_listeners()?;

        tracing::debug!(container = %container, "router started");
        self.resolve().await
    }

    /// Detach listeners, unmount the current page and release the container.
    /// Resolutions still waiting on guards end as superseded.
    pub fn stop(&self) -> Result<()> {
        self.next_generation();
        let (click, popstate) = {
            let mut inner = self.shared.inner.borrow_mut();
            (inner.click_listener.take(), inner.popstate.take())
        };
        if let Some(id) = click {
            self.shared.context.document().remove_event_listener(id);
        }
        if let Some(popstate) = popstate {
            popstate.unsubscribe();
        }

        // A page that refuses to unmount keeps the container; calling stop
        // again retries.
        self.clear_occupant()?;
        self.shared.inner.borrow_mut().container = None;

        tracing::debug!("router stopped");
        Ok(())
    }

    fn attach_listeners(&self) -> Result<()> {
        let context = &self.shared.context;
        let mut inner = self.shared.inner.borrow_mut();

        if inner.click_listener.is_none() {
            let weak = self.downgrade();
            let body = context.document().body();
            let id = context.document().add_event_listener(body, "click", move |event| {
                if let Some(router) = weak.upgrade() {
                    router.handle_click(event);
                }
            })?;
            inner.click_listener = Some(id);
        }

        if inner.popstate.is_none() {
            let weak = self.downgrade();
            let subscription = context.history().on_popstate(move |location| {
                if let Some(router) = weak.upgrade() {
                    router.spawn_resolution(location.clone());
                }
            });
            inner.popstate = Some(subscription);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    /// Record `path` in history (pushing, or replacing the current entry) and
    /// resolve it. `path` is relative to the base path and may carry a query.
    pub async fn navigate(&self, path: &str, replace: bool) -> Result<Resolution> {
        if !self.is_started() {
            return Err(RouterError::NotStarted);
        }

        let location = self.shared.context.config().apply_base(path);
        let history = self.shared.context.history();
        if replace {
            history.replace(location.clone());
        } else {
            history.push(location.clone());
        }
        self.resolve_location(location).await
    }

    /// Go back one history entry. The resulting resolution runs on the pool.
    pub fn back(&self) -> bool {
        self.shared.context.history().back()
    }

    pub fn forward(&self) -> bool {
        self.shared.context.history().forward()
    }

    /// Run background resolutions until they are all finished or waiting.
    /// Returns false when called from inside a background resolution.
    pub fn pump(&self) -> bool {
        match self.shared.pool.try_borrow_mut() {
            Ok(mut pool) => {
                pool.run_until_stalled();
                true
            }
            Err(_) => false,
        }
    }

    /// Resolve the current history location.
    pub async fn resolve(&self) -> Result<Resolution> {
        let location = self.shared.context.history().location();
        self.resolve_location(location).await
    }

    fn handle_click(&self, event: &HostEvent) {
        if event.default_prevented() {
            return;
        }
        let context = &self.shared.context;
        let document = context.document();
        let Some(link) = document.closest_with_attribute(event.target(), &context.config().link_attribute)
        else {
            return;
        };
        let Some(href) = document.attribute(link, "href") else {
            return;
        };

        event.prevent_default();
        let location = context.config().apply_base(&href);
        tracing::debug!(href = %href, "intercepted link");
        context.history().push(location.clone());
        self.spawn_resolution(location);
    }

    fn spawn_resolution(&self, location: String) {
        let router = self.clone();
        let task = async move {
            if let Err(error) = router.resolve_location(location).await {
                tracing::error!(%error, "background route resolution failed");
            }
        };
        if let Err(error) = self.shared.spawner.spawn_local(task) {
            tracing::error!(%error, "could not schedule route resolution");
            return;
        }
        self.pump();
    }

    // -------------------------------------------------------------------------
    // Resolution
    // -------------------------------------------------------------------------

    async fn resolve_location(&self, location: String) -> Result<Resolution> {
        let generation = self.next_generation();
        let container = self.container().ok_or(RouterError::NotStarted)?;
        let context = &self.shared.context;
        let (path, query) = split_location(context.config().strip_base(&location));

        tracing::debug!(path = %path, generation, "resolving route");
        let found = {
            let inner = self.shared.inner.borrow();
            find_route(&inner.routes, &split_path(&path))
        };
        let from = self.current_match();

        let Some(found) = found else {
            let navigation = Navigation {
                path: path.clone(),
                query: query.clone(),
                from,
                to: None,
            };
            tracing::debug!(path = %path, "no route matched");
            self.shared.events.emit(NOT_FOUND, &navigation);
            self.show_not_found(container, &path, query)?;
            return Ok(Resolution::NotFound { path });
        };

        let route_match = RouteMatch {
            path: path.clone(),
            pattern: found.pattern.source().to_string(),
            params: found.params,
            query: query.clone(),
        };

        for guard in &found.guards {
            let allowed = guard.check(&route_match).await;
            if self.shared.generation.get() != generation {
                tracing::warn!(path = %path, "navigation superseded while guarding");
                return Ok(Resolution::Superseded);
            }
            if !allowed {
                tracing::debug!(path = %path, "guard rejected navigation");
                let navigation = Navigation {
                    path,
                    query,
                    from,
                    to: Some(route_match.clone()),
                };
                self.shared.events.emit(GUARD_REJECTED, &navigation);
                return Ok(Resolution::Rejected(route_match));
            }
        }

        let navigation = Navigation {
            path: path.clone(),
            query,
            from,
            to: Some(route_match.clone()),
        };
        self.shared.events.emit(BEFORE_CHANGE, &navigation);

        self.clear_occupant()?;
        let page = found.route.build(context, route_match.clone());
        if let Err(error) = page.mount(Container::Node(container)) {
            self.discard_failed(page);
            return Err(error.into());
        }
        {
            let mut inner = self.shared.inner.borrow_mut();
            inner.occupant = Some(Occupant::Page(page));
            inner.current = Some(route_match.clone());
        }
        self.shared.current_path.set(path);
        self.shared.params.set(route_match.params.clone());

        tracing::debug!(pattern = %route_match.pattern, "route mounted");
        self.shared.events.emit(AFTER_CHANGE, &navigation);
        Ok(Resolution::Navigated(route_match))
    }

    fn show_not_found(&self, container: NodeId, path: &str, query: Params) -> Result<()> {
        self.clear_occupant()?;
        let context = &self.shared.context;
        let factory = self.shared.inner.borrow().not_found.clone();

        let occupant = match factory {
            Some(factory) => {
                let props = RouteProps {
                    props: Record::new(),
                    route: RouteMatch {
                        path: path.to_string(),
                        pattern: String::new(),
                        params: Params::new(),
                        query,
                    },
                };
                let page = factory(context, props);
                if let Err(error) = page.mount(Container::Node(container)) {
                    self.discard_failed(page);
                    return Err(error.into());
                }
                Occupant::Page(page)
            }
            None => {
                let document = context.document();
                let node = document.create_text(&context.config().not_found_text);
                document.append_child(container, node)?;
                Occupant::Fallback(node)
            }
        };

        {
            let mut inner = self.shared.inner.borrow_mut();
            inner.occupant = Some(occupant);
            inner.current = None;
        }
        self.shared.current_path.set(path.to_string());
        self.shared.params.set(Params::new());
        Ok(())
    }

    /// Unmount whatever is in the container. A page that fails to unmount
    /// stays the occupant, and the current match is kept with it.
    fn clear_occupant(&self) -> Result<()> {
        let occupant = self.shared.inner.borrow_mut().occupant.take();
        match occupant {
            Some(Occupant::Page(page)) => {
                if let Err(error) = page.dispose() {
                    self.shared.inner.borrow_mut().occupant = Some(Occupant::Page(page));
                    return Err(error.into());
                }
            }
            Some(Occupant::Fallback(node)) => {
                self.shared.context.document().remove_node(node);
            }
            None => {}
        }
        self.shared.inner.borrow_mut().current = None;
        Ok(())
    }

    /// Tear down a page whose mount failed part way. If even that fails the
    /// page is kept as the occupant so the next resolution retries.
    fn discard_failed(&self, page: Box<dyn Mountable>) {
        if let Err(error) = page.dispose() {
            tracing::warn!(%error, "could not tear down a page that failed to mount");
            self.shared.inner.borrow_mut().occupant = Some(Occupant::Page(page));
        }
    }

    fn next_generation(&self) -> u64 {
        let generation = self.shared.generation.get() + 1;
        self.shared.generation.set(generation);
        generation
    }

    fn downgrade(&self) -> WeakRouter {
        WeakRouter {
            shared: Rc::downgrade(&self.shared),
        }
    }
}

/// Split a location into its path and parsed query, dropping any fragment.
fn split_location(location: &str) -> (String, Params) {
    let location = location.split_once('#').map_or(location, |(before, _)| before);
    let (path, query) = location.split_once('?').unwrap_or((location, ""));

    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    let query = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    (path, query)
}

struct WeakRouter {
    shared: Weak<RouterShared>,
}

impl WeakRouter {
    fn upgrade(&self) -> Option<Router> {
        self.shared.upgrade().map(|shared| Router { shared })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_location() {
        let (path, query) = split_location("/search?q=rust+lang&page=2#top");
        assert_eq!(path, "/search");
        assert_eq!(query.get("q").map(String::as_str), Some("rust lang"));
        assert_eq!(query.get("page").map(String::as_str), Some("2"));

        let (path, query) = split_location("?tab=1");
        assert_eq!(path, "/");
        assert_eq!(query.len(), 1);

        let (path, query) = split_location("");
        assert_eq!(path, "/");
        assert!(query.is_empty());
    }

    #[test]
    fn test_split_location_decodes_query() {
        let (_, query) = split_location("/x?name=a%20b&empty=");
        assert_eq!(query.get("name").map(String::as_str), Some("a b"));
        assert_eq!(query.get("empty").map(String::as_str), Some(""));
    }

    #[test]
    fn test_navigate_before_start() {
        let context = AppContext::new();
        let router = Router::new(&context);
        let result = futures::executor::block_on(router.navigate("/", false));
        assert!(matches!(result, Err(RouterError::NotStarted)));
        assert_eq!(context.history().len(), 1);
    }

    #[test]
    fn test_remove_route_by_path() {
        let context = AppContext::new();
        let router = Router::new(&context);
        router.add_route(Route::new("/a", |_, _| unreachable!()));
        router.add_route(Route::new("/b/:id", |_, _| unreachable!()));

        assert!(router.remove_route("/b/:id/"));
        assert!(!router.remove_route("/c"));
        assert_eq!(router.route_count(), 1);
    }
}
