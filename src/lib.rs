#![warn(missing_docs)]
//! # Waypoint
//!
//! A request routing and dispatch engine with a composable middleware
//! pipeline.
//!
//! ## Overview
//!
//! Waypoint routes requests from any kind of client — web, API, console,
//! desktop — through a single declarative routing table:
//!
//! - **Pattern language** with `{named}` placeholders, bare `{}` wildcards,
//!   and trailing `[/{optional}]` segments
//! - **Route collector** with fluent registration and shared-attribute
//!   inheritance (prefix, controller, client types, scopes, middleware)
//! - **Commands** that register alongside routes and can expose HTTP duals
//! - **Per-scope dispatchers**, filled lazily and exactly once
//! - **Compile/replay snapshots**: serialize the whole routing table and
//!   answer every query in a later process without re-running registration
//! - **Named middleware pipeline** with producer/decorator semantics and
//!   relative (`before`/`after`) ordering
//! - **Structured errors** with stable string codes
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use waypoint::prelude::*;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(RouteRegistry::new());
//! registry.register(|routes| {
//!     routes.get("users", "UserController@index").name("users.index");
//!     routes.get("users/{id}", "UserController@show").name("users.show");
//!     routes.post("users", "UserController@create").client_type(ClientType::Api);
//! });
//!
//! let mut handlers = HandlerRegistry::new();
//! handlers.register("UserController@show", |params| Ok(params));
//!
//! let router = Router::new(registry, Arc::new(handlers), RouterConfig::default());
//! let handle = router.route(&RouteRequest::new(Method::Get, "users/42"))?;
//! let response = handle.invoke()?;
//! ```
//!
//! ## Compiled Routing Tables
//!
//! For production, compile the registry once and replay the snapshot in
//! every subsequent process; registration callbacks never run again:
//!
//! ```rust,ignore
//! let router = CompilableRouter::new(registry, handlers, config);
//! let snapshot = router.compile();
//! std::fs::write("routes.json", serde_json::to_vec(&snapshot)?)?;
//!
//! // later process
//! let snapshot: CompiledRoutes = serde_json::from_slice(&bytes)?;
//! router.set_compiled_data(snapshot);
//! ```
//!
//! ## Middleware
//!
//! ```rust,ignore
//! let mut pipeline = MiddlewarePipeline::new();
//! pipeline.add("auth", from_fn(|req, _params, next| next.run(req)));
//! pipeline.add("handler", from_fn(|_req, _params, _next| Ok(Some(json!({"ok": true})))));
//! pipeline.add("rate-limit", from_fn(rate_limit)).before("handler");
//! let response = pipeline.run(json!({ "path": "users" }))?;
//! ```
//!
//! ## Module Structure
//!
//! - [`Router`] / [`CompilableRouter`] - routing facades
//! - [`RouteRegistry`] - aggregate, queryable route store
//! - [`Dispatcher`] - per-scope matching engine
//! - [`RouteCollector`] - fluent registration surface
//! - [`Route`] / [`Command`] - the declared units
//! - [`MiddlewarePipeline`] - named, orderable middleware
//! - [`CompiledRoutes`] - serializable snapshot
//! - [`RouterError`] - error types and codes
//!
//! ## Prelude
//!
//! ```rust,ignore
//! use waypoint::prelude::*;
//! ```

mod collector;
mod command;
mod config;
mod dispatcher;
mod error;
mod handler;
pub mod pattern;
pub mod pipeline;
mod registry;
mod route;
mod router;
mod snapshot;

#[cfg(test)]
mod tests;

// Public API
pub use collector::{RouteCollector, SharedAttributes};
pub use command::{Argument, Command, CommandOption, ValueType};
pub use config::RouterConfig;
pub use dispatcher::{Dispatcher, RouteMatch};
pub use error::{RouterError, RouterErrorCode, RouterResult};
pub use handler::{BoundHandler, CALLABLE_DESCRIPTOR, HandlerRef, HandlerRegistry, HandlerResolver, bound};
pub use pattern::{PatternMatch, PatternValues};
pub use pipeline::{Middleware, MiddlewarePipeline, MiddlewareResolver, Next, from_fn};
pub use registry::{Entity, RouteRegistry};
pub use route::{ClientType, EntityBinding, Method, MiddlewareSpec, Route};
pub use router::{CompilableRouter, Routable, RouteRequest, RouteSource, RoutedHandle, Router};
pub use snapshot::CompiledRoutes;

/// Import everything you need with a single statement.
pub mod prelude {
    pub use crate::collector::{RouteCollector, SharedAttributes};
    pub use crate::command::Command;
    pub use crate::config::RouterConfig;
    pub use crate::dispatcher::{Dispatcher, RouteMatch};
    pub use crate::error::{RouterError, RouterErrorCode, RouterResult};
    pub use crate::handler::{HandlerRef, HandlerRegistry, HandlerResolver, bound};
    pub use crate::pipeline::{Middleware, MiddlewarePipeline, MiddlewareResolver, Next, from_fn};
    pub use crate::registry::{Entity, RouteRegistry};
    pub use crate::route::{ClientType, Method, MiddlewareSpec, Route};
    pub use crate::router::{
        CompilableRouter, Routable, RouteRequest, RouteSource, RoutedHandle, Router,
    };
    pub use crate::snapshot::CompiledRoutes;
}
