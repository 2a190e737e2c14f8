//! Route registry: the aggregate, queryable store of all declared routes
//!
//! The registry collects registration callbacks (with their shared
//! attributes), executes them lazily at most once, and indexes every produced
//! route by name, pattern, and entity/action. It is the single owner of the
//! routing table; dispatchers hold filtered views populated through the
//! [`RouteSource`](crate::router::RouteSource) capability.
//!
//! `compile()` turns the live table into a serializable
//! [`CompiledRoutes`] snapshot; `set_compiled_data()` switches the registry
//! into replay mode, where every query answers purely from the snapshot and
//! the original registration callbacks never run (observable through
//! [`registrars_called`](RouteRegistry::registrars_called)).

use crate::collector::{RouteCollector, SharedAttributes};
use crate::command::Command;
use crate::route::{ClientType, Method, Route};
use crate::snapshot::CompiledRoutes;
use crate::{RouterError, RouterResult};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

/// Capability for entity-bound route lookups with inheritance.
///
/// `entity_chain` lists type names most-derived first; the registry walks the
/// chain until it finds a registered entity binding, so querying with a
/// subtype resolves to the routes registered for its ancestor.
pub trait Entity {
    /// The concrete type name of this entity.
    fn entity_type(&self) -> &'static str;

    /// Type names from most-derived to root. Defaults to just the concrete
    /// type.
    fn entity_chain(&self) -> Vec<&'static str> {
        vec![self.entity_type()]
    }
}

type Registrar = Box<dyn Fn(&mut RouteCollector) + Send + Sync>;

#[derive(Default)]
struct RegistryInner {
    loaded: bool,
    replay: bool,
    routes: Vec<Arc<Route>>,
    commands: Vec<Command>,
    name_index: HashMap<String, usize>,
    entity_index: HashMap<String, HashMap<String, usize>>,
    client_types: BTreeSet<ClientType>,
}

impl RegistryInner {
    fn index_route(&mut self, index: usize, route: &Route) {
        if let Some(name) = route.route_name() {
            self.name_index.insert(name.to_string(), index);
        }
        if let Some(binding) = route.entity_binding() {
            self.entity_index
                .entry(binding.entity.clone())
                .or_default()
                .insert(binding.action.clone(), index);
        }
        self.client_types.extend(route.client_types().iter().copied());
    }
}

/// Aggregate store of every declared route and command.
#[derive(Default)]
pub struct RouteRegistry {
    inner: RwLock<RegistryInner>,
    registrars: Mutex<Vec<(Registrar, SharedAttributes)>>,
    registrars_called: AtomicBool,
}

impl RouteRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry in replay mode, answering every query from the
    /// snapshot and never executing registration callbacks.
    pub fn from_compiled(snapshot: CompiledRoutes) -> Self {
        let registry = Self::new();
        registry.set_compiled_data(snapshot);
        registry
    }

    /// Queue a registration callback. Callbacks run at most once, on first
    /// query, unless replay mode is active.
    pub fn register<F>(&self, callback: F)
    where
        F: Fn(&mut RouteCollector) + Send + Sync + 'static,
    {
        self.register_with(callback, SharedAttributes::default());
    }

    /// Queue a registration callback with shared attributes merged into every
    /// route it produces.
    pub fn register_with<F>(&self, callback: F, shared: SharedAttributes)
    where
        F: Fn(&mut RouteCollector) + Send + Sync + 'static,
    {
        self.registrars
            .lock()
            .expect("registrar lock poisoned")
            .push((Box::new(callback), shared));
    }

    /// True once the registration callbacks have been executed. Stays false
    /// forever in replay mode.
    pub fn registrars_called(&self) -> bool {
        self.registrars_called.load(Ordering::SeqCst)
    }

    fn ensure_loaded(&self) {
        {
            let inner = self.inner.read().expect("registry lock poisoned");
            if inner.loaded {
                return;
            }
        }

        let mut inner = self.inner.write().expect("registry lock poisoned");
        if inner.loaded {
            return;
        }
        if inner.replay {
            inner.loaded = true;
            return;
        }

        let registrars = self
            .registrars
            .lock()
            .expect("registrar lock poisoned");
        debug!(count = registrars.len(), "running registration callbacks");
        for (callback, shared) in registrars.iter() {
            let mut collector = RouteCollector::new();
            callback(&mut collector);
            let (routes, commands) = collector.finish(shared);
            for route in routes {
                let index = inner.routes.len();
                inner.index_route(index, &route);
                inner.routes.push(Arc::new(route));
            }
            inner.commands.extend(commands);
        }
        self.registrars_called.store(true, Ordering::SeqCst);
        inner.loaded = true;
    }

    /// All routes, in registration order.
    pub fn routes(&self) -> Vec<Arc<Route>> {
        self.ensure_loaded();
        self.inner
            .read()
            .expect("registry lock poisoned")
            .routes
            .clone()
    }

    /// All declared commands.
    pub fn commands(&self) -> Vec<Command> {
        self.ensure_loaded();
        self.inner
            .read()
            .expect("registry lock poisoned")
            .commands
            .clone()
    }

    /// Look up a command by its colon-namespaced name.
    pub fn command(&self, name: &str) -> Option<Command> {
        self.commands()
            .into_iter()
            .find(|command| command.command_name() == name)
    }

    /// Every client type any route was registered for.
    pub fn client_types(&self) -> Vec<ClientType> {
        self.ensure_loaded();
        self.inner
            .read()
            .expect("registry lock poisoned")
            .client_types
            .iter()
            .copied()
            .collect()
    }

    /// Exact name-index lookup, failing with `NAME_NOT_FOUND` when absent.
    pub fn get_by_name(&self, name: &str) -> RouterResult<Arc<Route>> {
        self.ensure_loaded();
        let inner = self.inner.read().expect("registry lock poisoned");
        inner
            .name_index
            .get(name)
            .map(|&index| inner.routes[index].clone())
            .ok_or_else(|| RouterError::name_not_found(name))
    }

    /// All routes whose literal pattern equals `pattern`, optionally filtered
    /// by method. Empty result is not an error.
    pub fn get_by_pattern(&self, pattern: &str, method: Option<Method>) -> Vec<Arc<Route>> {
        self.ensure_loaded();
        let inner = self.inner.read().expect("registry lock poisoned");
        inner
            .routes
            .iter()
            .filter(|route| route.pattern() == pattern)
            .filter(|route| method.is_none_or(|m| route.accepts_method(m)))
            .cloned()
            .collect()
    }

    /// Resolve an entity type name (no inheritance walk) to a bound route.
    ///
    /// An omitted action is a documented convenience: it resolves only when
    /// exactly one action is registered for the entity; otherwise the call is
    /// ambiguous and must be made explicit.
    pub fn get_by_entity_action(
        &self,
        entity: &str,
        action: Option<&str>,
    ) -> RouterResult<Arc<Route>> {
        self.ensure_loaded();
        let inner = self.inner.read().expect("registry lock poisoned");
        let actions = inner
            .entity_index
            .get(entity)
            .ok_or_else(|| RouterError::entity_not_found(entity))?;
        Self::resolve_action(&inner, entity, actions, action)
    }

    /// Resolve an entity instance to a bound route, walking its type chain
    /// most-derived first until a registered binding is found.
    pub fn get_by_entity(
        &self,
        entity: &dyn Entity,
        action: Option<&str>,
    ) -> RouterResult<Arc<Route>> {
        self.ensure_loaded();
        let inner = self.inner.read().expect("registry lock poisoned");
        for name in entity.entity_chain() {
            if let Some(actions) = inner.entity_index.get(name) {
                return Self::resolve_action(&inner, name, actions, action);
            }
        }
        Err(RouterError::entity_not_found(entity.entity_type()))
    }

    fn resolve_action(
        inner: &RegistryInner,
        entity: &str,
        actions: &HashMap<String, usize>,
        action: Option<&str>,
    ) -> RouterResult<Arc<Route>> {
        let index = match action {
            Some(action) => *actions
                .get(action)
                .ok_or_else(|| RouterError::action_not_found(entity, action))?,
            None => {
                if actions.len() == 1 {
                    *actions.values().next().expect("single action present")
                } else {
                    return Err(RouterError::ambiguous_action(entity));
                }
            }
        };
        Ok(inner.routes[index].clone())
    }

    /// Produce the serializable snapshot by walking every known route once.
    pub fn compile(&self) -> CompiledRoutes {
        let routes = self.routes();
        let snapshot = CompiledRoutes::build(&routes);
        debug!(
            routes = snapshot.routes().len(),
            valid = snapshot.is_valid(),
            "compiled routing snapshot"
        );
        snapshot
    }

    /// Switch into replay mode: every query now answers purely from the
    /// snapshot and queued registration callbacks never execute.
    pub fn set_compiled_data(&self, snapshot: CompiledRoutes) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let mut replaced = RegistryInner {
            loaded: true,
            replay: true,
            ..RegistryInner::default()
        };

        for route in snapshot.routes() {
            let index = replaced.routes.len();
            replaced.index_route(index, route);
            if let Some(command) = route.attached_command() {
                replaced.commands.push(command.clone());
            }
            replaced.routes.push(Arc::new(route.clone()));
        }
        *inner = replaced;
        debug!(routes = inner.routes.len(), "registry switched to replay mode");
    }

    /// True when queries are served from a replayed snapshot.
    pub fn is_replaying(&self) -> bool {
        self.inner.read().expect("registry lock poisoned").replay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RouterErrorCode;

    struct User;
    struct AdminUser;

    impl Entity for User {
        fn entity_type(&self) -> &'static str {
            "User"
        }
    }

    // AdminUser extends User.
    impl Entity for AdminUser {
        fn entity_type(&self) -> &'static str {
            "AdminUser"
        }

        fn entity_chain(&self) -> Vec<&'static str> {
            vec!["AdminUser", "User"]
        }
    }

    fn sample_registry() -> RouteRegistry {
        let registry = RouteRegistry::new();
        registry.register(|routes| {
            routes
                .get("users", "UserController@index")
                .name("users.index")
                .entity("User", "index");
            routes
                .get("users/{id}", "UserController@show")
                .name("users.show")
                .entity("User", "show");
            routes
                .get("posts", "PostController@index")
                .name("posts.index")
                .entity("Post", "index")
                .client_type(ClientType::Api);
        });
        registry
    }

    #[test]
    fn test_registrars_run_lazily_once() {
        let registry = sample_registry();
        assert!(!registry.registrars_called());
        assert_eq!(registry.routes().len(), 3);
        assert!(registry.registrars_called());
        // Second query does not duplicate.
        assert_eq!(registry.routes().len(), 3);
    }

    #[test]
    fn test_get_by_name_and_pattern() {
        let registry = sample_registry();
        assert_eq!(
            registry.get_by_name("users.show").unwrap().pattern(),
            "users/{id}"
        );
        assert_eq!(
            registry.get_by_name("nope").unwrap_err().code,
            RouterErrorCode::NameNotFound
        );
        assert_eq!(registry.get_by_pattern("users", None).len(), 1);
        assert!(registry.get_by_pattern("nope", None).is_empty());
    }

    #[test]
    fn test_entity_action_lookup() {
        let registry = sample_registry();
        let route = registry.get_by_entity_action("User", Some("show")).unwrap();
        assert_eq!(route.route_name(), Some("users.show"));

        // Exactly one action registered for Post: the omitted form resolves.
        let route = registry.get_by_entity_action("Post", None).unwrap();
        assert_eq!(route.route_name(), Some("posts.index"));

        // Two actions for User: omitted action is ambiguous.
        assert_eq!(
            registry.get_by_entity_action("User", None).unwrap_err().code,
            RouterErrorCode::AmbiguousAction
        );
        assert_eq!(
            registry
                .get_by_entity_action("User", Some("destroy"))
                .unwrap_err()
                .code,
            RouterErrorCode::ActionNotFound
        );
        assert_eq!(
            registry.get_by_entity_action("Ghost", None).unwrap_err().code,
            RouterErrorCode::EntityNotFound
        );
    }

    #[test]
    fn test_entity_chain_resolves_subclass_to_parent_binding() {
        let registry = sample_registry();
        let via_parent = registry.get_by_entity(&User, Some("show")).unwrap();
        let via_subclass = registry.get_by_entity(&AdminUser, Some("show")).unwrap();
        assert_eq!(via_parent.route_name(), via_subclass.route_name());
    }

    #[test]
    fn test_client_types_aggregation() {
        let registry = sample_registry();
        let types = registry.client_types();
        assert!(types.contains(&ClientType::Web));
        assert!(types.contains(&ClientType::Api));
    }

    #[test]
    fn test_replay_mode_answers_from_snapshot_without_registrars() {
        let live = sample_registry();
        let snapshot = live.compile();
        assert!(snapshot.is_valid());

        let replayed = RouteRegistry::from_compiled(snapshot);
        // Queue a registrar that must never run.
        replayed.register(|routes| {
            routes.get("should-not-exist", "Nope@never");
        });

        assert_eq!(replayed.routes().len(), 3);
        assert!(replayed.get_by_pattern("should-not-exist", None).is_empty());
        assert!(!replayed.registrars_called());
        assert!(replayed.is_replaying());
    }
}
