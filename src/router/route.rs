//! Route definitions - Pattern, component factory, props, guards, children.
//!
//! # Example
//!
//! ```ignore
//! let routes = vec![
//!     Route::component::<Home>("/"),
//!     Route::component::<UserPage>("/user/:id")
//!         .prop("tab", "overview")
//!         .guard(|m| m.param("id") != Some("0"))
//!         .child(Route::component::<PostPage>("posts/:postId")),
//! ];
//! ```
//!
//! Child paths are relative to their parent's match. A leading `/` on a child
//! path is ignored.

use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::pattern::{Params, PathPattern};
use crate::context::AppContext;
use crate::engine::{Component, ComponentEngine, Mountable};
use crate::types::{Merge, Record};

/// Builds the component a route mounts.
pub type ComponentFactory = Rc<dyn Fn(&AppContext, RouteProps) -> Box<dyn Mountable>>;

// =============================================================================
// RouteMatch / RouteProps
// =============================================================================

/// A successful match of a location against the route table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouteMatch {
    /// The matched path, without base path or query.
    pub path: String,
    /// Full pattern of the matched route, parents included.
    pub pattern: String,
    pub params: Params,
    pub query: Params,
}

impl RouteMatch {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

/// Props handed to a routed component: the route's declared props plus the match.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouteProps {
    pub props: Record,
    pub route: RouteMatch,
}

impl Merge for RouteProps {
    type Partial = Record;

    fn merge(&mut self, partial: Record) {
        self.props.merge(partial);
    }
}

// =============================================================================
// Guard
// =============================================================================

/// Predicate that can block a transition. May be asynchronous.
#[derive(Clone)]
pub struct Guard {
    check: Rc<dyn Fn(&RouteMatch) -> LocalBoxFuture<'static, bool>>,
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Guard")
    }
}

impl Guard {
    pub fn new(predicate: impl Fn(&RouteMatch) -> bool + 'static) -> Self {
        Self {
            check: Rc::new(move |route| future::ready(predicate(route)).boxed_local()),
        }
    }

    /// A guard whose answer arrives later, e.g. after an auth lookup.
    pub fn from_future<F, Fut>(predicate: F) -> Self
    where
        F: Fn(&RouteMatch) -> Fut + 'static,
        Fut: Future<Output = bool> + 'static,
    {
        Self {
            check: Rc::new(move |route| predicate(route).boxed_local()),
        }
    }

    pub fn check(&self, route: &RouteMatch) -> LocalBoxFuture<'static, bool> {
        (self.check)(route)
    }
}

// =============================================================================
// Route
// =============================================================================

/// One entry of the route table.
#[derive(Clone)]
pub struct Route {
    pattern: PathPattern,
    factory: ComponentFactory,
    props: Record,
    guards: Vec<Guard>,
    children: Vec<Route>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.pattern.source())
            .field("props", &self.props)
            .field("guards", &self.guards.len())
            .field("children", &self.children)
            .finish()
    }
}

impl Route {
    pub fn new(
        path: &str,
        factory: impl Fn(&AppContext, RouteProps) -> Box<dyn Mountable> + 'static,
    ) -> Self {
        Self {
            pattern: PathPattern::parse(path),
            factory: Rc::new(factory),
            props: Record::new(),
            guards: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Route to a component type built with `Default`.
    pub fn component<C>(path: &str) -> Self
    where
        C: Component<Props = RouteProps> + Default,
    {
        Self::new(path, |context: &AppContext, props: RouteProps| -> Box<dyn Mountable> {
            Box::new(ComponentEngine::new(C::default(), props, context))
        })
    }

    /// Replace the declared props.
    #[must_use]
    pub fn props(mut self, props: Record) -> Self {
        self.props = props;
        self
    }

    #[must_use]
    pub fn prop(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.props.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn guard(self, predicate: impl Fn(&RouteMatch) -> bool + 'static) -> Self {
        self.with_guard(Guard::new(predicate))
    }

    #[must_use]
    pub fn guard_async<F, Fut>(self, predicate: F) -> Self
    where
        F: Fn(&RouteMatch) -> Fut + 'static,
        Fut: Future<Output = bool> + 'static,
    {
        self.with_guard(Guard::from_future(predicate))
    }

    #[must_use]
    pub fn with_guard(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    /// Add a nested route, matched against the path left after this one.
    #[must_use]
    pub fn child(mut self, route: Route) -> Self {
        self.children.push(route);
        self
    }

    pub fn path(&self) -> &str {
        self.pattern.source()
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn children(&self) -> &[Route] {
        &self.children
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    pub fn declared_props(&self) -> &Record {
        &self.props
    }

    pub(crate) fn build(&self, context: &AppContext, route: RouteMatch) -> Box<dyn Mountable> {
        (self.factory)(
            context,
            RouteProps {
                props: self.props.clone(),
                route,
            },
        )
    }
}

// =============================================================================
// Lookup
// =============================================================================

/// A route found for a path, before guards have run.
pub(crate) struct Found {
    pub(crate) route: Route,
    pub(crate) pattern: PathPattern,
    pub(crate) params: Params,
    /// Ancestors' guards first, then the route's own.
    pub(crate) guards: Vec<Guard>,
}

/// Depth-first search of `routes` for `segments`. First match wins; a route's
/// children are tried before the route itself.
pub(crate) fn find_route(routes: &[Route], segments: &[&str]) -> Option<Found> {
    find_in(routes, segments, &PathPattern::parse("/"), &Params::new(), &[])
}

fn find_in(
    routes: &[Route],
    segments: &[&str],
    prefix: &PathPattern,
    inherited_params: &Params,
    inherited_guards: &[Guard],
) -> Option<Found> {
    for route in routes {
        let Some((params, consumed)) = route.pattern.match_prefix(segments) else {
            continue;
        };

        let pattern = prefix.join(&route.pattern);
        let mut all_params = inherited_params.clone();
        all_params.extend(params);
        let mut guards = inherited_guards.to_vec();
        guards.extend(route.guards.iter().cloned());

        if !route.children.is_empty() {
            let rest = &segments[consumed..];
            if let Some(found) = find_in(&route.children, rest, &pattern, &all_params, &guards) {
                return Some(found);
            }
        }

        if consumed == segments.len() {
            return Some(Found {
                route: route.clone(),
                pattern,
                params: all_params,
                guards,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::pattern::split_path;
    use futures::executor::block_on;

    #[derive(Default)]
    struct Page;

    impl Component for Page {
        type Props = RouteProps;
        type State = ();

        fn initial_state(&self, _props: &RouteProps) {}

        fn template(&self, props: &RouteProps, _state: &()) -> String {
            format!("<main>{}</main>", props.route.pattern)
        }
    }

    fn table() -> Vec<Route> {
        vec![
            Route::component::<Page>("/"),
            Route::component::<Page>("/user/:id")
                .child(Route::component::<Page>("posts/:postId"))
                .child(Route::component::<Page>("/settings")),
            Route::component::<Page>("/about"),
        ]
    }

    fn find(path: &str) -> Option<Found> {
        find_route(&table(), &split_path(path))
    }

    #[test]
    fn test_parent_match() {
        let found = find("/user/42").unwrap();
        assert_eq!(found.pattern.source(), "/user/:id");
        assert_eq!(found.params.get("id").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_nested_match_preferred() {
        let found = find("/user/42/posts/7").unwrap();
        assert_eq!(found.pattern.source(), "/user/:id/posts/:postId");
        assert_eq!(found.params.len(), 2);
        assert_eq!(found.params.get("postId").map(String::as_str), Some("7"));

        let found = find("/user/1/settings").unwrap();
        assert_eq!(found.pattern.source(), "/user/:id/settings");
    }

    #[test]
    fn test_no_match() {
        assert!(find("/user").is_none());
        assert!(find("/user/42/posts").is_none());
        assert!(find("/nope").is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let routes = vec![
            Route::component::<Page>("/a/:x").prop("which", 1),
            Route::component::<Page>("/a/b").prop("which", 2),
        ];
        let found = find_route(&routes, &split_path("/a/b")).unwrap();
        assert_eq!(found.route.declared_props().get("which"), Some(&Value::from(1)));
    }

    #[test]
    fn test_guards_inherited_in_order() {
        let routes = vec![
            Route::component::<Page>("/admin")
                .guard(|_| true)
                .child(Route::component::<Page>("users").guard(|_| false)),
        ];
        let found = find_route(&routes, &split_path("/admin/users")).unwrap();
        assert_eq!(found.guards.len(), 2);

        let route = RouteMatch::default();
        let results: Vec<bool> = found
            .guards
            .iter()
            .map(|guard| block_on(guard.check(&route)))
            .collect();
        assert_eq!(results, vec![true, false]);
    }

    #[test]
    fn test_async_guard() {
        let guard = Guard::from_future(|route: &RouteMatch| {
            let allowed = route.param("id") == Some("1");
            async move { allowed }
        });
        let mut route = RouteMatch::default();
        route.params.insert("id".into(), "1".into());
        assert!(block_on(guard.check(&route)));
    }

    #[test]
    fn test_route_props_merge() {
        let mut props = RouteProps::default();
        props.props.insert("a".into(), Value::from(1));
        props.merge(crate::types::record(serde_json::json!({ "b": 2 })));
        assert_eq!(props.props.len(), 2);
    }

    #[test]
    fn test_route_match_serializes() {
        let mut route = RouteMatch {
            path: "/user/42".into(),
            pattern: "/user/:id".into(),
            ..Default::default()
        };
        route.params.insert("id".into(), "42".into());
        let json = serde_json::to_value(&route).unwrap();
        assert_eq!(json["params"]["id"], "42");
        let back: RouteMatch = serde_json::from_value(json).unwrap();
        assert_eq!(back, route);
    }
}
