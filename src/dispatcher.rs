//! Dispatcher: the matching engine for one registration group of routes
//!
//! A dispatcher owns the compiled routes of a single scope and answers
//! `dispatch` calls by filtering candidates in a fixed order: structural
//! pattern match first, then method, client type, and scope. The first route
//! that survives all four filters wins; an empty result is a
//! `ROUTE_NOT_FOUND` error.
//!
//! Dispatchers start *unfilled* and become *filled* the first time routes are
//! registered or replayed into them; the router owns the fill-once guard.

use crate::collector::{RouteCollector, SharedAttributes};
use crate::pattern;
use crate::route::{ClientType, Method, Route};
use crate::{RouterError, RouterResult};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, trace};

/// Successful dispatch result: the matched route, extracted parameters, and
/// the request coordinates as resolved.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The route that won
    pub route: Arc<Route>,
    /// Captured path parameters, numeric captures coerced to integers,
    /// defaults merged for short-form optional segments
    pub params: Map<String, Value>,
    /// Method the dispatch was made with
    pub method: Method,
    /// Client type filter that was applied, if any
    pub client_type: Option<ClientType>,
    /// Scope filter that was applied, if any
    pub scope: Option<String>,
}

/// Matching engine for one registration group.
#[derive(Default)]
pub struct Dispatcher {
    routes: Vec<Arc<Route>>,
    filled: bool,
}

impl Dispatcher {
    /// Create an unfilled dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// True once routes have been registered or replayed.
    pub fn is_filled(&self) -> bool {
        self.filled
    }

    /// Run a registration callback against a fresh collector and store every
    /// produced route.
    pub fn register<F>(&mut self, callback: F)
    where
        F: FnOnce(&mut RouteCollector),
    {
        self.register_with(callback, &SharedAttributes::default());
    }

    /// Like [`register`](Self::register), with shared attributes merged into
    /// every produced route.
    pub fn register_with<F>(&mut self, callback: F, shared: &SharedAttributes)
    where
        F: FnOnce(&mut RouteCollector),
    {
        let mut collector = RouteCollector::new();
        callback(&mut collector);
        let (routes, _commands) = collector.finish(shared);
        self.add_routes(routes);
    }

    /// Store pre-built routes (used by replay and by the registry fill).
    pub fn add_routes(&mut self, routes: impl IntoIterator<Item = Route>) {
        self.routes.extend(routes.into_iter().map(Arc::new));
        self.filled = true;
    }

    /// Store routes already shared with a registry.
    pub fn add_shared_routes(&mut self, routes: impl IntoIterator<Item = Arc<Route>>) {
        self.routes.extend(routes);
        self.filled = true;
    }

    /// All routes known to this dispatcher.
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    /// Match a request against the route set.
    ///
    /// Filters are applied in order: structural pattern match, method,
    /// client type, scope. An absent client type or scope filter matches
    /// all routes. Fails with `ROUTE_NOT_FOUND` when nothing survives.
    pub fn dispatch(
        &self,
        method: Method,
        path: &str,
        client_type: Option<ClientType>,
        scope: Option<&str>,
    ) -> RouterResult<RouteMatch> {
        let mut structural = 0usize;
        for route in &self.routes {
            let Some(matched) = pattern::match_path(route.pattern(), path) else {
                continue;
            };
            structural += 1;

            if !route.accepts_method(method) {
                trace!(pattern = route.pattern(), %method, "structural match rejected by method");
                continue;
            }
            if let Some(client_type) = client_type {
                if !route.accepts_client_type(client_type) {
                    trace!(pattern = route.pattern(), %client_type, "rejected by client type");
                    continue;
                }
            }
            if let Some(scope) = scope {
                if !route.accepts_scope(scope) {
                    trace!(pattern = route.pattern(), scope, "rejected by scope");
                    continue;
                }
            }

            let mut params = matched.params;
            for name in &matched.missing {
                if let Some(default) = route.default_values().get(name) {
                    params.insert(name.clone(), default.clone());
                }
            }

            debug!(pattern = route.pattern(), %method, path, "route matched");
            return Ok(RouteMatch {
                route: route.clone(),
                params,
                method,
                client_type,
                scope: scope.map(str::to_string),
            });
        }

        debug!(%method, path, structural, "no route satisfied all filters");
        Err(RouterError::route_not_found(format!(
            "no route for {method} {path}"
        ))
        .with_details(serde_json::json!({ "structural_matches": structural })))
    }

    /// All routes whose literal pattern string equals `pattern`, optionally
    /// filtered by method. Used for introspection; an empty result is not an
    /// error.
    pub fn get_by_pattern(&self, pattern: &str, method: Option<Method>) -> Vec<Arc<Route>> {
        self.routes
            .iter()
            .filter(|route| route.pattern() == pattern)
            .filter(|route| method.is_none_or(|m| route.accepts_method(m)))
            .cloned()
            .collect()
    }

    /// Exact name-index lookup, failing with `NAME_NOT_FOUND` when absent.
    pub fn get_by_name(&self, name: &str) -> RouterResult<Arc<Route>> {
        self.routes
            .iter()
            .find(|route| route.route_name() == Some(name))
            .cloned()
            .ok_or_else(|| RouterError::name_not_found(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RouterErrorCode;
    use serde_json::json;

    fn sample_dispatcher() -> Dispatcher {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(|routes| {
            routes
                .get("users/{user_id}/addresses/{address_id}/edit", "Address@edit")
                .name("address.edit");
            routes
                .get("addresses", "Address@index")
                .name("address.index")
                .client_type(ClientType::Web);
            routes.post("addresses", "Address@create").name("address.create");
            routes
                .get("delivery-addresses[/{type}]", "Address@delivery")
                .name("address.delivery")
                .default_value("type", "shipping");
        });
        dispatcher
    }

    #[test]
    fn test_dispatch_extracts_and_coerces_params() {
        let dispatcher = sample_dispatcher();
        let matched = dispatcher
            .dispatch(Method::Get, "users/1785/addresses/3/edit", None, None)
            .unwrap();
        assert_eq!(matched.route.route_name(), Some("address.edit"));
        assert_eq!(matched.params["user_id"], json!(1785));
        assert_eq!(matched.params["address_id"], json!(3));
    }

    #[test]
    fn test_dispatch_selects_by_method() {
        let dispatcher = sample_dispatcher();

        let get = dispatcher.dispatch(Method::Get, "addresses", None, None).unwrap();
        assert_eq!(get.route.route_name(), Some("address.index"));

        let post = dispatcher
            .dispatch(Method::Post, "addresses", None, None)
            .unwrap();
        assert_eq!(post.route.route_name(), Some("address.create"));

        let err = dispatcher
            .dispatch(Method::Delete, "addresses", None, None)
            .unwrap_err();
        assert_eq!(err.code, RouterErrorCode::RouteNotFound);
    }

    #[test]
    fn test_dispatch_filters_by_client_type() {
        let dispatcher = sample_dispatcher();

        // Omitting the filter matches any.
        assert!(dispatcher.dispatch(Method::Get, "addresses", None, None).is_ok());

        // `addresses` is registered for web only.
        let err = dispatcher
            .dispatch(Method::Get, "addresses", Some(ClientType::Api), None)
            .unwrap_err();
        assert_eq!(err.code, RouterErrorCode::RouteNotFound);
    }

    #[test]
    fn test_dispatch_filters_by_scope() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(|routes| {
            routes.get("admin", "Admin@index").scope("backoffice");
        });

        assert!(dispatcher
            .dispatch(Method::Get, "admin", None, Some("backoffice"))
            .is_ok());
        let err = dispatcher
            .dispatch(Method::Get, "admin", None, Some("frontend"))
            .unwrap_err();
        assert_eq!(err.code, RouterErrorCode::RouteNotFound);
    }

    #[test]
    fn test_optional_segment_short_and_long_forms() {
        let dispatcher = sample_dispatcher();

        let long = dispatcher
            .dispatch(Method::Get, "delivery-addresses/billing", None, None)
            .unwrap();
        let short = dispatcher
            .dispatch(Method::Get, "delivery-addresses", None, None)
            .unwrap();

        // Same route either way; only the parameter source differs.
        assert_eq!(long.route.route_name(), short.route.route_name());
        assert_eq!(
            long.route.handler_ref().descriptor(),
            short.route.handler_ref().descriptor()
        );
        assert_eq!(long.params["type"], json!("billing"));
        assert_eq!(short.params["type"], json!("shipping"));
    }

    #[test]
    fn test_get_by_pattern_is_not_an_error_when_empty() {
        let dispatcher = sample_dispatcher();
        assert!(dispatcher.get_by_pattern("nope", None).is_empty());

        let both = dispatcher.get_by_pattern("addresses", None);
        assert_eq!(both.len(), 2);
        let only_post = dispatcher.get_by_pattern("addresses", Some(Method::Post));
        assert_eq!(only_post.len(), 1);
        assert_eq!(only_post[0].route_name(), Some("address.create"));
    }

    #[test]
    fn test_get_by_name() {
        let dispatcher = sample_dispatcher();
        assert_eq!(
            dispatcher.get_by_name("address.index").unwrap().pattern(),
            "addresses"
        );
        let err = dispatcher.get_by_name("missing").unwrap_err();
        assert_eq!(err.code, RouterErrorCode::NameNotFound);
    }

    #[test]
    fn test_filled_state() {
        let mut dispatcher = Dispatcher::new();
        assert!(!dispatcher.is_filled());
        dispatcher.register(|routes| {
            routes.get("users", "User@index");
        });
        assert!(dispatcher.is_filled());
    }
}
