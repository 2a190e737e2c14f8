//! Compiled routing snapshot
//!
//! A [`CompiledRoutes`] value is the serializable form of a whole routing
//! table: the full route list plus the name, pattern, and entity-action
//! indexes and the set of known client types. It round-trips through serde
//! (process-independent), so a host can compile at build time, write the
//! snapshot to disk, and replay it in a later process without ever running
//! the registration callbacks again.
//!
//! The validity flag is part of the contract: it is true only when the
//! snapshot is self-consistent (no duplicate route names, no closure handlers
//! that cannot be serialized). Hosts use it to decide whether to fall back to
//! live registration.

use crate::route::{ClientType, Route};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::warn;

/// Serializable aggregate of a registry's routing table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompiledRoutes {
    valid: bool,
    routes: Vec<Route>,
    name_index: HashMap<String, usize>,
    pattern_index: HashMap<String, Vec<usize>>,
    entity_index: HashMap<String, HashMap<String, usize>>,
    client_types: BTreeSet<ClientType>,
}

impl CompiledRoutes {
    /// Build a snapshot by walking every known route once.
    pub(crate) fn build(routes: &[Arc<Route>]) -> Self {
        let mut snapshot = Self {
            valid: true,
            routes: routes.iter().map(|route| (**route).clone()).collect(),
            ..Self::default()
        };

        for (index, route) in snapshot.routes.iter().enumerate() {
            if let Some(name) = route.route_name() {
                if snapshot.name_index.insert(name.to_string(), index).is_some() {
                    warn!(name, "duplicate route name; snapshot marked invalid");
                    snapshot.valid = false;
                }
            }

            snapshot
                .pattern_index
                .entry(route.pattern().to_string())
                .or_default()
                .push(index);

            if let Some(binding) = route.entity_binding() {
                snapshot
                    .entity_index
                    .entry(binding.entity.clone())
                    .or_default()
                    .insert(binding.action.clone(), index);
            }

            snapshot.client_types.extend(route.client_types().iter().copied());

            if !route.handler_ref().is_serializable() {
                warn!(
                    pattern = route.pattern(),
                    "closure handler has no serializable form; snapshot marked invalid"
                );
                snapshot.valid = false;
            }
            if let Some(command) = route.attached_command() {
                if !command.handler_ref().is_serializable() {
                    snapshot.valid = false;
                }
            }
        }

        snapshot
    }

    /// True when the snapshot is self-consistent and safe to replay.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The full route list.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Name → route index.
    pub fn name_index(&self) -> &HashMap<String, usize> {
        &self.name_index
    }

    /// Literal pattern → route indexes.
    pub fn pattern_index(&self) -> &HashMap<String, Vec<usize>> {
        &self.pattern_index
    }

    /// Entity → action → route index.
    pub fn entity_index(&self) -> &HashMap<String, HashMap<String, usize>> {
        &self.entity_index
    }

    /// Every client type any route was registered for.
    pub fn client_types(&self) -> &BTreeSet<ClientType> {
        &self.client_types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerRef, bound};
    use crate::route::Method;

    fn arc_routes(routes: Vec<Route>) -> Vec<Arc<Route>> {
        routes.into_iter().map(Arc::new).collect()
    }

    #[test]
    fn test_build_indexes() {
        let mut users = Route::new("users", [Method::Get], "User@index");
        users.name("users.index").entity("User", "index");
        let mut show = Route::new("users/{id}", [Method::Get], "User@show");
        show.name("users.show").entity("User", "show");

        let snapshot = CompiledRoutes::build(&arc_routes(vec![users, show]));
        assert!(snapshot.is_valid());
        assert_eq!(snapshot.name_index()["users.show"], 1);
        assert_eq!(snapshot.pattern_index()["users"], vec![0]);
        assert_eq!(snapshot.entity_index()["User"]["index"], 0);
    }

    #[test]
    fn test_duplicate_names_invalidate() {
        let mut a = Route::new("users", [Method::Get], "User@index");
        a.name("users");
        let mut b = Route::new("people", [Method::Get], "User@index");
        b.name("users");

        let snapshot = CompiledRoutes::build(&arc_routes(vec![a, b]));
        assert!(!snapshot.is_valid());
    }

    #[test]
    fn test_callable_handlers_invalidate() {
        let route = Route::new(
            "users",
            [Method::Get],
            HandlerRef::Callable(bound(|input| Ok(input))),
        );
        let snapshot = CompiledRoutes::build(&arc_routes(vec![route]));
        assert!(!snapshot.is_valid());
    }

    #[test]
    fn test_serde_round_trip() {
        let mut route = Route::new("users/{id}", [Method::Get], "User@show");
        route.name("users.show").client_type(crate::route::ClientType::Api);
        let snapshot = CompiledRoutes::build(&arc_routes(vec![route]));

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: CompiledRoutes = serde_json::from_str(&json).unwrap();

        assert!(back.is_valid());
        assert_eq!(back.routes().len(), 1);
        assert_eq!(back.name_index()["users.show"], 0);
        assert_eq!(back.routes()[0].pattern(), "users/{id}");
    }
}
