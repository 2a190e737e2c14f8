//! Route collector: builder-scoped registration facade
//!
//! A [`RouteCollector`] is handed to each registration callback. The callback
//! declares routes through one method per verb (and [`command`] for console
//! commands), chaining fluent attribute setters on the returned `&mut Route`.
//! Once the callback returns, the collector merges the registration group's
//! [`SharedAttributes`] into every produced route and hands the finished set
//! to its owner (dispatcher or registry).
//!
//! [`command`]: RouteCollector::command

use crate::command::Command;
use crate::handler::HandlerRef;
use crate::route::{ClientType, Method, MiddlewareSpec, Route};

/// Attributes shared by every route produced inside one registration
/// callback.
///
/// Merge rules (applied when the callback returns):
/// - client types / scopes: an explicit per-route value wins in full,
///   otherwise the shared value is inherited verbatim
/// - middleware: shared names are prepended; a per-route spec with the same
///   name overrides only that entry's params; per-route new names follow
/// - prefix: concatenated onto each pattern with `/`
/// - controller: bare function handlers are rebound as instance methods on
///   the shared controller class
#[derive(Debug, Clone, Default)]
pub struct SharedAttributes {
    /// Pattern prefix for every HTTP-style route in the group
    pub prefix: Option<String>,
    /// Controller class bare handler names are bound to
    pub controller: Option<String>,
    /// Client types inherited by routes without explicit ones
    pub client_types: Vec<ClientType>,
    /// Scopes inherited by routes without explicit ones
    pub scopes: Vec<String>,
    /// Middleware prepended to every route in the group
    pub middleware: Vec<MiddlewareSpec>,
}

impl SharedAttributes {
    /// Create an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pattern prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set the shared controller class.
    pub fn with_controller(mut self, controller: impl Into<String>) -> Self {
        self.controller = Some(controller.into());
        self
    }

    /// Add a shared client type.
    pub fn with_client_type(mut self, client_type: ClientType) -> Self {
        self.client_types.push(client_type);
        self
    }

    /// Add a shared scope.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    /// Add a shared middleware spec.
    pub fn with_middleware(mut self, spec: impl Into<MiddlewareSpec>) -> Self {
        self.middleware.push(spec.into());
        self
    }
}

/// Builder-scoped facade collecting the routes and commands one registration
/// callback declares.
#[derive(Default)]
pub struct RouteCollector {
    routes: Vec<Route>,
    commands: Vec<Command>,
}

impl RouteCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a route for an explicit verb set.
    pub fn route(
        &mut self,
        methods: impl IntoIterator<Item = Method>,
        pattern: impl Into<String>,
        handler: impl Into<HandlerRef>,
    ) -> &mut Route {
        self.routes.push(Route::new(pattern, methods, handler));
        self.routes.last_mut().expect("route was just pushed")
    }

    /// Declare a GET route.
    pub fn get(
        &mut self,
        pattern: impl Into<String>,
        handler: impl Into<HandlerRef>,
    ) -> &mut Route {
        self.route([Method::Get], pattern, handler)
    }

    /// Declare a POST route.
    pub fn post(
        &mut self,
        pattern: impl Into<String>,
        handler: impl Into<HandlerRef>,
    ) -> &mut Route {
        self.route([Method::Post], pattern, handler)
    }

    /// Declare a PUT route.
    pub fn put(
        &mut self,
        pattern: impl Into<String>,
        handler: impl Into<HandlerRef>,
    ) -> &mut Route {
        self.route([Method::Put], pattern, handler)
    }

    /// Declare a PATCH route.
    pub fn patch(
        &mut self,
        pattern: impl Into<String>,
        handler: impl Into<HandlerRef>,
    ) -> &mut Route {
        self.route([Method::Patch], pattern, handler)
    }

    /// Declare a DELETE route.
    pub fn delete(
        &mut self,
        pattern: impl Into<String>,
        handler: impl Into<HandlerRef>,
    ) -> &mut Route {
        self.route([Method::Delete], pattern, handler)
    }

    /// Declare a HEAD route.
    pub fn head(
        &mut self,
        pattern: impl Into<String>,
        handler: impl Into<HandlerRef>,
    ) -> &mut Route {
        self.route([Method::Head], pattern, handler)
    }

    /// Declare an OPTIONS route.
    pub fn options(
        &mut self,
        pattern: impl Into<String>,
        handler: impl Into<HandlerRef>,
    ) -> &mut Route {
        self.route([Method::Options], pattern, handler)
    }

    /// Declare a route answering every HTTP verb.
    pub fn any(
        &mut self,
        pattern: impl Into<String>,
        handler: impl Into<HandlerRef>,
    ) -> &mut Route {
        self.route(Method::HTTP, pattern, handler)
    }

    /// Declare a console command. The collector dual-registers a console
    /// route (pattern = command name, verb `console`) for it once the
    /// callback returns.
    pub fn command(
        &mut self,
        name: impl Into<String>,
        handler: impl Into<HandlerRef>,
        description: impl Into<String>,
    ) -> &mut Command {
        self.commands
            .push(Command::new_attached(name, handler, description));
        self.commands.last_mut().expect("command was just pushed")
    }

    /// Routes declared so far (pre-merge), for introspection in tests.
    pub fn declared_routes(&self) -> &[Route] {
        &self.routes
    }

    /// Materialize the collected set: dual-register command routes, apply
    /// shared attributes, and fill in context-derived client type defaults.
    pub(crate) fn finish(mut self, shared: &SharedAttributes) -> (Vec<Route>, Vec<Command>) {
        for command in &mut self.commands {
            command.set_route_name(command.command_name().to_string());
            let attachments = command.take_http_attachments();

            let mut console_route = Route::new(
                command.command_name().to_string(),
                [Method::Console],
                command.handler_ref().clone(),
            );
            console_route
                .name(command.command_name().to_string())
                .client_type(ClientType::Console)
                .attach_command(command.clone());
            self.routes.push(console_route);

            for (method, pattern) in attachments {
                let mut http_route =
                    Route::new(pattern, [method], command.handler_ref().clone());
                http_route.attach_command(command.clone());
                self.routes.push(http_route);
            }
        }

        for route in &mut self.routes {
            apply_shared(route, shared);
            apply_client_type_default(route);
        }

        (self.routes, self.commands)
    }
}

fn is_console_only(route: &Route) -> bool {
    route.methods() == [Method::Console]
}

fn apply_shared(route: &mut Route, shared: &SharedAttributes) {
    // CLIENT: explicit per-route value wins in full, otherwise inherit.
    if !route.client_types_explicit() && !shared.client_types.is_empty() {
        route.set_client_types(shared.client_types.clone());
    }

    // SCOPE: same rule.
    if !route.scopes_explicit() && !shared.scopes.is_empty() {
        route.set_scopes(shared.scopes.clone());
    }

    // MIDDLEWARE: shared names first; a per-route spec of the same name only
    // overrides that entry's params; per-route new names follow.
    if !shared.middleware.is_empty() {
        let own = route.middleware_specs().to_vec();
        let mut merged = Vec::with_capacity(shared.middleware.len() + own.len());
        for spec in &shared.middleware {
            match own.iter().find(|candidate| candidate.name == spec.name) {
                Some(override_spec) => merged.push(override_spec.clone()),
                None => merged.push(spec.clone()),
            }
        }
        for spec in own {
            if !shared.middleware.iter().any(|s| s.name == spec.name) {
                merged.push(spec);
            }
        }
        route.set_middleware(merged);
    }

    // PREFIX / CONTROLLER apply to HTTP-style patterns and handlers only;
    // command names are not path-like.
    if is_console_only(route) {
        return;
    }

    if let Some(prefix) = &shared.prefix {
        let prefix = prefix.trim_matches('/');
        if !prefix.is_empty() {
            let pattern = route.pattern().trim_start_matches('/');
            let joined = if pattern.is_empty() {
                prefix.to_string()
            } else {
                format!("{prefix}/{pattern}")
            };
            route.set_pattern(joined);
        }
    }

    if let Some(controller) = &shared.controller {
        if let HandlerRef::Function(method) = route.handler_ref() {
            route.set_handler(HandlerRef::InstanceMethod {
                class: controller.clone(),
                method: method.clone(),
            });
        }
    }
}

/// A route that neither set a client type nor inherited one defaults to the
/// type its registration context implies.
fn apply_client_type_default(route: &mut Route) {
    if !route.client_types().is_empty() {
        return;
    }
    let default = if is_console_only(route) {
        ClientType::Console
    } else {
        ClientType::Web
    };
    route.set_client_types(vec![default]);
}
