//! Route model: patterns, verbs, client types, and fluent builders
//!
//! A [`Route`] is an immutable-after-build description of one routable unit:
//! a pattern plus at least one method and client type, a handler reference,
//! and the cross-cutting attributes (name, scopes, middleware, defaults,
//! entity binding) the dispatcher and registry select on.
//!
//! Routes are built fluently inside a registration callback:
//!
//! ```rust,ignore
//! collector
//!     .get("users/{user_id}/addresses[/{type}]", "AddressController@show")
//!     .name("address.show")
//!     .client_type(ClientType::Web)
//!     .middleware("auth")
//!     .default_value("type", "shipping");
//! ```

use crate::command::Command;
use crate::handler::HandlerRef;
use crate::pattern::{self, PatternValues};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Request verb a route answers to. `Console` marks command-style routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP PATCH
    Patch,
    /// HTTP DELETE
    Delete,
    /// HTTP HEAD
    Head,
    /// HTTP OPTIONS
    Options,
    /// Console invocation
    Console,
}

impl Method {
    /// All HTTP-style verbs, used by `any()` registrations.
    pub const HTTP: [Method; 7] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Patch,
        Method::Delete,
        Method::Head,
        Method::Options,
    ];

    /// Lowercase name of the verb.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::Head => "head",
            Self::Options => "options",
            Self::Console => "console",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "post" => Ok(Self::Post),
            "put" => Ok(Self::Put),
            "patch" => Ok(Self::Patch),
            "delete" => Ok(Self::Delete),
            "head" => Ok(Self::Head),
            "options" => Ok(Self::Options),
            "console" => Ok(Self::Console),
            other => Err(format!("unknown method '{other}'")),
        }
    }
}

/// Channel a request arrives through.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ClientType {
    /// Browser-facing pages
    Web,
    /// Machine-facing JSON endpoints
    Api,
    /// Command-line invocations
    Console,
    /// Partial-page XHR requests
    Ajax,
    /// Desktop shell clients
    Desktop,
}

impl ClientType {
    /// Lowercase name of the client type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Api => "api",
            Self::Console => "console",
            Self::Ajax => "ajax",
            Self::Desktop => "desktop",
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "web" => Ok(Self::Web),
            "api" => Ok(Self::Api),
            "console" => Ok(Self::Console),
            "ajax" => Ok(Self::Ajax),
            "desktop" => Ok(Self::Desktop),
            other => Err(format!("unknown client type '{other}'")),
        }
    }
}

/// One named middleware entry on a route, parsed from `"name"` or
/// `"name:a,b"` and serialized back to the same string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiddlewareSpec {
    /// Middleware name as known to the pipeline/resolver
    pub name: String,
    /// Positional parameters passed to the middleware
    pub params: Vec<String>,
}

impl MiddlewareSpec {
    /// Parse a `name[:param,param]` spec string.
    pub fn parse(spec: &str) -> Self {
        match spec.split_once(':') {
            Some((name, params)) => Self {
                name: name.to_string(),
                params: params.split(',').map(|p| p.trim().to_string()).collect(),
            },
            None => Self {
                name: spec.to_string(),
                params: Vec::new(),
            },
        }
    }
}

impl fmt::Display for MiddlewareSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}:{}", self.name, self.params.join(","))
        }
    }
}

impl From<&str> for MiddlewareSpec {
    fn from(spec: &str) -> Self {
        Self::parse(spec)
    }
}

impl Serialize for MiddlewareSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MiddlewareSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let spec = String::deserialize(deserializer)?;
        if spec.is_empty() {
            return Err(D::Error::custom("empty middleware spec"));
        }
        Ok(Self::parse(&spec))
    }
}

/// Binding of a route to a target entity type and action name, used for
/// reverse lookups (`get_by_entity_action`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityBinding {
    /// Entity type name
    pub entity: String,
    /// Action name on the entity's controller
    pub action: String,
}

/// A declarative binding of a pattern and verb set to a handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pattern: String,
    methods: Vec<Method>,
    handler: HandlerRef,
    name: Option<String>,
    client_types: Vec<ClientType>,
    scopes: Vec<String>,
    middleware: Vec<MiddlewareSpec>,
    defaults: BTreeMap<String, Value>,
    entity: Option<EntityBinding>,
    command: Option<Command>,
    /// True once `client_type()` was called explicitly; explicit values win
    /// in full over shared attributes.
    #[serde(default)]
    client_types_explicit: bool,
    /// True once `scope()` was called explicitly.
    #[serde(default)]
    scopes_explicit: bool,
}

impl Route {
    /// Create a route for the given pattern, verbs, and handler.
    pub fn new(
        pattern: impl Into<String>,
        methods: impl IntoIterator<Item = Method>,
        handler: impl Into<HandlerRef>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            methods: methods.into_iter().collect(),
            handler: handler.into(),
            name: None,
            client_types: Vec::new(),
            scopes: Vec::new(),
            middleware: Vec::new(),
            defaults: BTreeMap::new(),
            entity: None,
            command: None,
            client_types_explicit: false,
            scopes_explicit: false,
        }
    }

    // Fluent attribute setters (chainable inside a registration callback)

    /// Set the route's unique name.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Restrict the route to a scope. Explicit scopes win in full over shared
    /// attributes.
    pub fn scope(&mut self, scope: impl Into<String>) -> &mut Self {
        self.scopes_explicit = true;
        let scope = scope.into();
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
        self
    }

    /// Restrict the route to a client type. Explicit client types win in full
    /// over shared attributes.
    pub fn client_type(&mut self, client_type: ClientType) -> &mut Self {
        self.client_types_explicit = true;
        if !self.client_types.contains(&client_type) {
            self.client_types.push(client_type);
        }
        self
    }

    /// Append a middleware spec (`"auth"` or `"throttle:60"`).
    pub fn middleware(&mut self, spec: impl Into<MiddlewareSpec>) -> &mut Self {
        self.middleware.push(spec.into());
        self
    }

    /// Set a default value for an optional segment parameter.
    pub fn default_value(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    /// Merge a map of default values.
    pub fn defaults(&mut self, defaults: impl IntoIterator<Item = (String, Value)>) -> &mut Self {
        self.defaults.extend(defaults);
        self
    }

    /// Bind the route to an entity type and action for reverse lookups.
    pub fn entity(&mut self, entity: impl Into<String>, action: impl Into<String>) -> &mut Self {
        self.entity = Some(EntityBinding {
            entity: entity.into(),
            action: action.into(),
        });
        self
    }

    pub(crate) fn attach_command(&mut self, command: Command) -> &mut Self {
        self.command = Some(command);
        self
    }

    // Accessors

    /// Pattern template string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Verbs this route answers to.
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Handler reference.
    pub fn handler_ref(&self) -> &HandlerRef {
        &self.handler
    }

    /// Unique name, if one was set.
    pub fn route_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Client types this route is restricted to; empty means all.
    pub fn client_types(&self) -> &[ClientType] {
        &self.client_types
    }

    /// Scopes this route is restricted to; empty means all.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Ordered middleware specs.
    pub fn middleware_specs(&self) -> &[MiddlewareSpec] {
        &self.middleware
    }

    /// Defaults for optional segment parameters.
    pub fn default_values(&self) -> &BTreeMap<String, Value> {
        &self.defaults
    }

    /// Entity binding, if one was set.
    pub fn entity_binding(&self) -> Option<&EntityBinding> {
        self.entity.as_ref()
    }

    /// Console command attached by dual registration, if any.
    pub fn attached_command(&self) -> Option<&Command> {
        self.command.as_ref()
    }

    pub(crate) fn client_types_explicit(&self) -> bool {
        self.client_types_explicit
    }

    pub(crate) fn scopes_explicit(&self) -> bool {
        self.scopes_explicit
    }

    pub(crate) fn set_pattern(&mut self, pattern: String) {
        self.pattern = pattern;
    }

    pub(crate) fn set_handler(&mut self, handler: HandlerRef) {
        self.handler = handler;
    }

    pub(crate) fn set_client_types(&mut self, client_types: Vec<ClientType>) {
        self.client_types = client_types;
    }

    pub(crate) fn set_scopes(&mut self, scopes: Vec<String>) {
        self.scopes = scopes;
    }

    pub(crate) fn set_middleware(&mut self, middleware: Vec<MiddlewareSpec>) {
        self.middleware = middleware;
    }

    /// Does the route answer to the given verb?
    pub fn accepts_method(&self, method: Method) -> bool {
        self.methods.contains(&method)
    }

    /// Does the route accept the given client type? Absence of restrictions
    /// matches all.
    pub fn accepts_client_type(&self, client_type: ClientType) -> bool {
        self.client_types.is_empty() || self.client_types.contains(&client_type)
    }

    /// Does the route accept the given scope? Absence of restrictions matches
    /// all.
    pub fn accepts_scope(&self, scope: &str) -> bool {
        self.scopes.is_empty() || self.scopes.iter().any(|s| s == scope)
    }

    /// Build a concrete path from this route's pattern and the given values,
    /// expanding the optional group when its placeholders are covered by the
    /// values or the route defaults.
    pub fn path_for(&self, values: &Map<String, Value>) -> String {
        let (stem, long) = pattern::split_optional(&self.pattern);

        let mut merged = Map::new();
        for (key, value) in &self.defaults {
            merged.insert(key.clone(), value.clone());
        }
        for (key, value) in values {
            merged.insert(key.clone(), value.clone());
        }

        let template = match long {
            Some(long)
                if pattern::token_names(&long)
                    .iter()
                    .all(|name| merged.contains_key(name)) =>
            {
                long
            }
            _ => stem,
        };
        pattern::compile(&template, &PatternValues::Named(merged))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods: Vec<&str> = self.methods.iter().map(Method::as_str).collect();
        write!(f, "{} {}", methods.join("|"), self.pattern)
    }
}
