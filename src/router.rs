//! Router facade: per-scope dispatch over a shared route source
//!
//! A [`Router`] binds three things together: a [`RouteSource`] (live registry
//! or replayed snapshot), a [`HandlerResolver`], and a [`RouterConfig`]. For
//! each scope it lazily fills one [`Dispatcher`] with that scope's routes and
//! caches it; concurrent requests for the same scope fill it exactly once.
//!
//! [`CompilableRouter`] wraps a router pair around a [`RouteRegistry`]: the
//! live side runs registration callbacks on demand, and once a valid
//! [`CompiledRoutes`] snapshot is adopted every call is answered by a replay
//! side that never runs the callbacks at all. The query contract is identical
//! either way.

use crate::collector::{RouteCollector, SharedAttributes};
use crate::config::RouterConfig;
use crate::dispatcher::Dispatcher;
use crate::handler::{BoundHandler, HandlerResolver};
use crate::registry::RouteRegistry;
use crate::route::{ClientType, Method, Route};
use crate::snapshot::CompiledRoutes;
use crate::RouterResult;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Capability a router needs from its routing table.
///
/// Implemented by [`RouteRegistry`] for both live and replay modes, so the
/// router never knows which one it is talking to.
pub trait RouteSource: Send + Sync {
    /// Routes eligible for the given scope, in registration order.
    fn routes_for_scope(&self, scope: &str) -> Vec<Arc<Route>>;

    /// Exact name-index lookup.
    fn get_by_name(&self, name: &str) -> RouterResult<Arc<Route>>;

    /// All routes with the given literal pattern, optionally method-filtered.
    fn get_by_pattern(&self, pattern: &str, method: Option<Method>) -> Vec<Arc<Route>>;

    /// Every client type any route was registered for.
    fn client_types(&self) -> Vec<ClientType>;
}

impl RouteSource for RouteRegistry {
    fn routes_for_scope(&self, scope: &str) -> Vec<Arc<Route>> {
        self.routes()
            .into_iter()
            .filter(|route| route.accepts_scope(scope))
            .collect()
    }

    fn get_by_name(&self, name: &str) -> RouterResult<Arc<Route>> {
        RouteRegistry::get_by_name(self, name)
    }

    fn get_by_pattern(&self, pattern: &str, method: Option<Method>) -> Vec<Arc<Route>> {
        RouteRegistry::get_by_pattern(self, pattern, method)
    }

    fn client_types(&self) -> Vec<ClientType> {
        RouteRegistry::client_types(self)
    }
}

/// Anything that can be routed: a request shape reduced to the four
/// coordinates dispatch cares about.
pub trait Routable {
    /// Request method.
    fn method(&self) -> Method;

    /// Request path, without leading slash.
    fn path(&self) -> &str;

    /// Client type of the caller, if known.
    fn client_type(&self) -> Option<ClientType> {
        None
    }

    /// Scope the request targets, if any.
    fn scope(&self) -> Option<&str> {
        None
    }
}

/// Minimal concrete [`Routable`] for hosts without their own request type.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    method: Method,
    path: String,
    client_type: Option<ClientType>,
    scope: Option<String>,
}

impl RouteRequest {
    /// Create a request for the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            client_type: None,
            scope: None,
        }
    }

    /// Set the caller's client type.
    pub fn with_client_type(mut self, client_type: ClientType) -> Self {
        self.client_type = Some(client_type);
        self
    }

    /// Set the target scope.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

impl Routable for RouteRequest {
    fn method(&self) -> Method {
        self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn client_type(&self) -> Option<ClientType> {
        self.client_type
    }

    fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

/// A routed request: the matched route, its extracted parameters, and the
/// resolved handler, ready to invoke.
#[derive(Clone)]
pub struct RoutedHandle {
    /// The route that matched
    pub route: Arc<Route>,
    /// Extracted path parameters with defaults merged
    pub params: Map<String, Value>,
    /// Method the request was routed with
    pub method: Method,
    /// Client type filter that was applied, if any
    pub client_type: Option<ClientType>,
    /// Scope the dispatch ran in
    pub scope: String,
    handler: BoundHandler,
}

impl RoutedHandle {
    /// Invoke the resolved handler with the extracted parameters.
    pub fn invoke(&self) -> RouterResult<Value> {
        (self.handler)(Value::Object(self.params.clone()))
    }
}

impl std::fmt::Debug for RoutedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutedHandle")
            .field("route", &self.route)
            .field("params", &self.params)
            .field("method", &self.method)
            .field("client_type", &self.client_type)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Routing facade over a [`RouteSource`], one cached dispatcher per scope.
pub struct Router {
    source: Arc<dyn RouteSource>,
    resolver: Arc<dyn HandlerResolver>,
    config: RouterConfig,
    dispatchers: DashMap<String, Arc<Dispatcher>>,
    fill_count: AtomicUsize,
}

impl Router {
    /// Create a router over a route source.
    pub fn new(
        source: Arc<dyn RouteSource>,
        resolver: Arc<dyn HandlerResolver>,
        config: RouterConfig,
    ) -> Self {
        Self {
            source,
            resolver,
            config,
            dispatchers: DashMap::new(),
            fill_count: AtomicUsize::new(0),
        }
    }

    /// The dispatcher for a scope, filled from the source on first access.
    pub fn dispatcher_for(&self, scope: &str) -> Arc<Dispatcher> {
        match self.dispatchers.entry(scope.to_string()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let mut dispatcher = Dispatcher::new();
                dispatcher.add_shared_routes(self.source.routes_for_scope(scope));
                self.fill_count.fetch_add(1, Ordering::SeqCst);
                debug!(scope, routes = dispatcher.routes().len(), "filled scope dispatcher");
                entry.insert(Arc::new(dispatcher)).clone()
            }
        }
    }

    /// How many scope dispatchers have been filled so far.
    pub fn fill_count(&self) -> usize {
        self.fill_count.load(Ordering::SeqCst)
    }

    /// Route a request: dispatch within its scope, then resolve the matched
    /// route's handler.
    ///
    /// A request without a scope uses the configured default scope; a request
    /// without a client type uses the configured default filter (which may be
    /// none, matching all).
    pub fn route(&self, request: &dyn Routable) -> RouterResult<RoutedHandle> {
        let scope = request
            .scope()
            .unwrap_or(&self.config.default_scope)
            .to_string();
        let client_type = request.client_type().or(self.config.default_client_type);

        let dispatcher = self.dispatcher_for(&scope);
        let matched = dispatcher.dispatch(
            request.method(),
            request.path(),
            client_type,
            Some(&scope),
        )?;
        let handler = self.resolver.resolve(matched.route.handler_ref())?;

        Ok(RoutedHandle {
            route: matched.route,
            params: matched.params,
            method: matched.method,
            client_type: matched.client_type,
            scope,
            handler,
        })
    }

    /// Exact name-index lookup on the underlying source.
    pub fn get_by_name(&self, name: &str) -> RouterResult<Arc<Route>> {
        self.source.get_by_name(name)
    }

    /// Literal-pattern lookup on the underlying source.
    pub fn get_by_pattern(&self, pattern: &str, method: Option<Method>) -> Vec<Arc<Route>> {
        self.source.get_by_pattern(pattern, method)
    }

    /// Every client type any route was registered for.
    pub fn client_types(&self) -> Vec<ClientType> {
        self.source.client_types()
    }

    /// Generate a path for a named route from parameter values.
    pub fn path_for(&self, name: &str, values: &Map<String, Value>) -> RouterResult<String> {
        Ok(self.get_by_name(name)?.path_for(values))
    }
}

/// Router pair over a [`RouteRegistry`]: live registration until a valid
/// snapshot is adopted, pure replay afterwards.
pub struct CompilableRouter {
    registry: Arc<RouteRegistry>,
    resolver: Arc<dyn HandlerResolver>,
    config: RouterConfig,
    live: Router,
    replay: RwLock<Option<Arc<Router>>>,
}

impl CompilableRouter {
    /// Create a compilable router over a registry.
    pub fn new(
        registry: Arc<RouteRegistry>,
        resolver: Arc<dyn HandlerResolver>,
        config: RouterConfig,
    ) -> Self {
        let live = Router::new(registry.clone(), resolver.clone(), config.clone());
        Self {
            registry,
            resolver,
            config,
            live,
            replay: RwLock::new(None),
        }
    }

    /// Queue a registration callback on the underlying registry.
    pub fn register<F>(&self, callback: F)
    where
        F: Fn(&mut RouteCollector) + Send + Sync + 'static,
    {
        self.registry.register(callback);
    }

    /// Queue a registration callback with shared attributes.
    pub fn register_with<F>(&self, callback: F, shared: SharedAttributes)
    where
        F: Fn(&mut RouteCollector) + Send + Sync + 'static,
    {
        self.registry.register_with(callback, shared);
    }

    /// Compile the registry into a snapshot. When the snapshot is valid it is
    /// adopted immediately, switching every subsequent call to replay.
    pub fn compile(&self) -> CompiledRoutes {
        let snapshot = self.registry.compile();
        if snapshot.is_valid() {
            self.set_compiled_data(snapshot.clone());
        }
        snapshot
    }

    /// Adopt a previously compiled snapshot. Returns false (and leaves the
    /// live side active) when the snapshot is not valid.
    pub fn set_compiled_data(&self, snapshot: CompiledRoutes) -> bool {
        if !snapshot.is_valid() {
            debug!("rejected invalid snapshot; staying on live registration");
            return false;
        }
        let registry: Arc<RouteRegistry> = Arc::new(RouteRegistry::from_compiled(snapshot));
        let router = Router::new(registry, self.resolver.clone(), self.config.clone());
        *self
            .replay
            .write()
            .expect("replay lock poisoned") = Some(Arc::new(router));
        true
    }

    /// True once a snapshot has been adopted.
    pub fn is_compiled(&self) -> bool {
        self.replay
            .read()
            .expect("replay lock poisoned")
            .is_some()
    }

    fn active(&self) -> Option<Arc<Router>> {
        self.replay.read().expect("replay lock poisoned").clone()
    }

    /// Route a request through the replay side when compiled, the live side
    /// otherwise. The contract is identical either way.
    pub fn route(&self, request: &dyn Routable) -> RouterResult<RoutedHandle> {
        match self.active() {
            Some(router) => router.route(request),
            None => self.live.route(request),
        }
    }

    /// Exact name-index lookup.
    pub fn get_by_name(&self, name: &str) -> RouterResult<Arc<Route>> {
        match self.active() {
            Some(router) => router.get_by_name(name),
            None => self.live.get_by_name(name),
        }
    }

    /// Literal-pattern lookup.
    pub fn get_by_pattern(&self, pattern: &str, method: Option<Method>) -> Vec<Arc<Route>> {
        match self.active() {
            Some(router) => router.get_by_pattern(pattern, method),
            None => self.live.get_by_pattern(pattern, method),
        }
    }

    /// Every client type any route was registered for.
    pub fn client_types(&self) -> Vec<ClientType> {
        match self.active() {
            Some(router) => router.client_types(),
            None => self.live.client_types(),
        }
    }

    /// Generate a path for a named route from parameter values.
    pub fn path_for(&self, name: &str, values: &Map<String, Value>) -> RouterResult<String> {
        Ok(self.get_by_name(name)?.path_for(values))
    }

    /// The registry backing the live side.
    pub fn registry(&self) -> &Arc<RouteRegistry> {
        &self.registry
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("config", &self.config)
            .field("scopes_filled", &self.fill_count())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for CompilableRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilableRouter")
            .field("config", &self.config)
            .field("compiled", &self.is_compiled())
            .finish_non_exhaustive()
    }
}
