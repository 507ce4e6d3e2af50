//! Client-side routing.
//!
//! - [`Router`]: route table, location resolution, page mounting
//! - [`Route`]: pattern + component factory + props + guards + nested routes
//! - [`PathPattern`]: tokenized path with `:name` captures
//! - [`History`]: session history with `popstate` notifications
//!
//! # Example
//!
//! ```ignore
//! use futures::executor::block_on;
//! use spark_ui::{AppContext, Route, Router};
//!
//! let context = AppContext::new();
//! let router = Router::with_routes(&context, [
//!     Route::component::<Home>("/"),
//!     Route::component::<User>("/user/:id")
//!         .child(Route::component::<Post>("posts/:postId")),
//! ]);
//!
//! block_on(router.start("#app"))?;
//! block_on(router.navigate("/user/42/posts/7", false))?;
//! ```

mod core;
pub mod history;
mod pattern;
mod route;

pub use core::{
    AFTER_CHANGE, BEFORE_CHANGE, GUARD_REJECTED, NOT_FOUND, Navigation, Resolution, Router,
};
pub use history::History;
pub use pattern::{Params, PathPattern, Segment, split_path};
pub use route::{ComponentFactory, Guard, Route, RouteMatch, RouteProps};
