//! Named, orderable middleware pipeline
//!
//! A pipeline is an ordered list of named entries. Each entry wraps a
//! [`Middleware`]: a producer returns a response without calling `next`, a
//! decorator calls `next` and transforms what comes back, and a pass-through
//! returns `None` to leave the response untouched.
//!
//! Execution runs in two phases. The *descent* phase is a classic onion: each
//! entry may call `next` to hand the request to the entry after it. The first
//! entry that produces a response without calling `next` ends the descent;
//! entries above it see the response on the way back up and may decorate it.
//! The *tail* phase then runs every entry the descent never reached, in list
//! order, with `next` yielding the response produced so far. A tail entry
//! that produces without calling `next` is a competing producer and is
//! discarded; the first producer always wins. A pipeline that ends with no
//! response at all fails with `HANDLER_NOT_FOUND`.
//!
//! Entries are keyed by name: adding an existing name replaces the entry in
//! place, and entries can be repositioned relative to another entry with
//! `before`/`after`.

use crate::route::MiddlewareSpec;
use crate::{RouterError, RouterResult};
use serde_json::Value;
use std::cell::Cell;
use std::sync::Arc;
use tracing::{debug, trace};

/// Continuation handing the request to the rest of the pipeline.
pub struct Next<'a> {
    inner: &'a dyn Fn(Value) -> RouterResult<Option<Value>>,
    called: &'a Cell<bool>,
}

impl Next<'_> {
    /// Run the remainder of the pipeline with the given request.
    pub fn run(self, request: Value) -> RouterResult<Option<Value>> {
        self.called.set(true);
        (self.inner)(request)
    }
}

/// A single middleware stage.
pub trait Middleware: Send + Sync {
    /// Handle a request. Return `Some(response)` to produce or decorate,
    /// `None` to pass through whatever the rest of the pipeline yields.
    fn handle(&self, request: Value, params: &[String], next: Next<'_>)
    -> RouterResult<Option<Value>>;
}

struct FnMiddleware<F>(F);

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(Value, &[String], Next<'_>) -> RouterResult<Option<Value>> + Send + Sync,
{
    fn handle(
        &self,
        request: Value,
        params: &[String],
        next: Next<'_>,
    ) -> RouterResult<Option<Value>> {
        (self.0)(request, params, next)
    }
}

/// Wrap a closure as a [`Middleware`].
pub fn from_fn<F>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(Value, &[String], Next<'_>) -> RouterResult<Option<Value>> + Send + Sync + 'static,
{
    Arc::new(FnMiddleware(f))
}

/// Resolves a middleware name from a route's
/// [`MiddlewareSpec`](crate::route::MiddlewareSpec) to an implementation.
pub trait MiddlewareResolver: Send + Sync {
    /// Resolve a middleware by name, failing with `HANDLER_NOT_FOUND` when
    /// the name is unknown.
    fn resolve(&self, name: &str) -> RouterResult<Arc<dyn Middleware>>;
}

#[derive(Debug, Clone, PartialEq)]
enum Placement {
    Before(String),
    After(String),
}

struct Entry {
    name: String,
    middleware: Arc<dyn Middleware>,
    params: Vec<String>,
    placement: Option<Placement>,
}

/// Ordered, name-keyed middleware list with two-phase execution.
#[derive(Default)]
pub struct MiddlewarePipeline {
    entries: Vec<Entry>,
}

/// Positioning handle returned by [`MiddlewarePipeline::add`].
pub struct EntryPosition<'a> {
    pipeline: &'a mut MiddlewarePipeline,
    index: usize,
}

impl EntryPosition<'_> {
    /// Attach parameters passed to the middleware on every run.
    pub fn params<I, S>(self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pipeline.entries[self.index].params = params.into_iter().map(Into::into).collect();
        self
    }

    /// Position this entry immediately before the named entry.
    pub fn before(self, target: impl Into<String>) {
        self.pipeline.entries[self.index].placement = Some(Placement::Before(target.into()));
    }

    /// Position this entry immediately after the named entry.
    pub fn after(self, target: impl Into<String>) {
        self.pipeline.entries[self.index].placement = Some(Placement::After(target.into()));
    }
}

impl MiddlewarePipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named entry at the end of the list. Adding an existing name
    /// replaces that entry in place and clears its positioning directive.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        middleware: Arc<dyn Middleware>,
    ) -> EntryPosition<'_> {
        let name = name.into();
        let index = match self.entries.iter().position(|entry| entry.name == name) {
            Some(index) => {
                self.entries[index] = Entry {
                    name,
                    middleware,
                    params: Vec::new(),
                    placement: None,
                };
                index
            }
            None => {
                self.entries.push(Entry {
                    name,
                    middleware,
                    params: Vec::new(),
                    placement: None,
                });
                self.entries.len() - 1
            }
        };
        EntryPosition { pipeline: self, index }
    }

    /// Add an entry from a route's middleware spec, resolving the
    /// implementation by name.
    pub fn add_spec(
        &mut self,
        spec: &MiddlewareSpec,
        resolver: &dyn MiddlewareResolver,
    ) -> RouterResult<()> {
        let middleware = resolver.resolve(&spec.name)?;
        self.add(spec.name.clone(), middleware)
            .params(spec.params.clone());
        Ok(())
    }

    /// Remove an entry by name. Positioning directives targeting the removed
    /// name are cleared so the placed entries fall back to insertion order.
    pub fn remove(&mut self, name: &str) -> bool {
        let Some(index) = self.entries.iter().position(|entry| entry.name == name) else {
            return false;
        };
        self.entries.remove(index);
        for entry in &mut self.entries {
            let targets_removed = matches!(
                &entry.placement,
                Some(Placement::Before(target) | Placement::After(target)) if target == name
            );
            if targets_removed {
                entry.placement = None;
            }
        }
        true
    }

    /// True when an entry with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the pipeline has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry names in effective execution order.
    pub fn names(&self) -> Vec<&str> {
        self.effective_order()
            .into_iter()
            .map(|index| self.entries[index].name.as_str())
            .collect()
    }

    /// Insertion order adjusted by positioning directives: each placed entry
    /// moves adjacent to its target, processed in insertion order. A
    /// directive naming an absent target is ignored.
    fn effective_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.entries.len()).collect();

        for (index, entry) in self.entries.iter().enumerate() {
            let Some(placement) = &entry.placement else {
                continue;
            };
            let target_name = match placement {
                Placement::Before(target) | Placement::After(target) => target,
            };
            let Some(target_index) = self
                .entries
                .iter()
                .position(|candidate| &candidate.name == target_name)
            else {
                continue;
            };

            let from = order
                .iter()
                .position(|&i| i == index)
                .unwrap_or_default();
            order.remove(from);
            let target_pos = order
                .iter()
                .position(|&i| i == target_index)
                .unwrap_or_default();
            let to = match placement {
                Placement::Before(_) => target_pos,
                Placement::After(_) => target_pos + 1,
            };
            order.insert(to, index);
        }

        order
    }

    /// Execute the pipeline. Fails with `HANDLER_NOT_FOUND` when no entry
    /// produces a response.
    pub fn run(&self, request: Value) -> RouterResult<Value> {
        let order = self.effective_order();
        if order.is_empty() {
            return Err(RouterError::handler_not_found(
                "middleware pipeline is empty",
            ));
        }
        let chain: Vec<&Entry> = order.iter().map(|&index| &self.entries[index]).collect();

        let deepest = Cell::new(0usize);
        let mut response = self.descend(&chain, 0, request.clone(), &deepest)?;

        // Entries the descent never entered still see the pipeline input and
        // run against the produced response; a competing producer among them
        // is discarded.
        for entry in &chain[(deepest.get() + 1).min(chain.len())..] {
            let called = Cell::new(false);
            let current = response.clone();
            let tail_next = move |_request: Value| Ok(current.clone());
            let next = Next {
                inner: &tail_next,
                called: &called,
            };
            trace!(name = entry.name, "running tail middleware");
            match entry.middleware.handle(request.clone(), &entry.params, next)? {
                Some(produced) if called.get() || response.is_none() => {
                    response = Some(produced);
                }
                Some(_) => {
                    debug!(name = entry.name, "discarding competing producer");
                }
                None => {}
            }
        }

        response.ok_or_else(|| {
            RouterError::handler_not_found("no middleware produced a response")
        })
    }

    fn descend(
        &self,
        chain: &[&Entry],
        index: usize,
        request: Value,
        deepest: &Cell<usize>,
    ) -> RouterResult<Option<Value>> {
        let Some(entry) = chain.get(index) else {
            return Ok(None);
        };
        deepest.set(deepest.get().max(index));
        trace!(name = entry.name, depth = index, "entering middleware");

        let called = Cell::new(false);
        let inner = move |request: Value| self.descend(chain, index + 1, request, deepest);
        let next = Next {
            inner: &inner,
            called: &called,
        };
        entry.middleware.handle(request, &entry.params, next)
    }
}

impl std::fmt::Debug for MiddlewarePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewarePipeline")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RouterErrorCode;
    use serde_json::json;

    fn producer(tag: &str) -> Arc<dyn Middleware> {
        let tag = tag.to_string();
        from_fn(move |_request, _params, _next| Ok(Some(json!({ "produced_by": tag }))))
    }

    fn tagger(tag: &str) -> Arc<dyn Middleware> {
        // Decorates the downstream response with its own tag.
        let tag = tag.to_string();
        from_fn(move |request, _params, next| {
            let response = next.run(request)?;
            Ok(response.map(|mut value| {
                if let Some(object) = value.as_object_mut() {
                    let seen = object
                        .entry("seen")
                        .or_insert_with(|| json!([]));
                    if let Some(list) = seen.as_array_mut() {
                        list.push(json!(tag));
                    }
                }
                value
            }))
        })
    }

    fn pass_through() -> Arc<dyn Middleware> {
        from_fn(|request, _params, next| next.run(request))
    }

    #[test]
    fn test_empty_pipeline_is_handler_not_found() {
        let pipeline = MiddlewarePipeline::new();
        let err = pipeline.run(json!({})).unwrap_err();
        assert_eq!(err.code, RouterErrorCode::HandlerNotFound);
    }

    #[test]
    fn test_no_producer_is_handler_not_found() {
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.add("a", pass_through());
        pipeline.add("b", pass_through());
        let err = pipeline.run(json!({})).unwrap_err();
        assert_eq!(err.code, RouterErrorCode::HandlerNotFound);
    }

    #[test]
    fn test_decorators_wrap_producer_on_unwind() {
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.add("outer", tagger("outer"));
        pipeline.add("inner", tagger("inner"));
        pipeline.add("handler", producer("handler"));

        let response = pipeline.run(json!({})).unwrap();
        assert_eq!(response["produced_by"], json!("handler"));
        // Unwind order: inner decorates first, outer last.
        assert_eq!(response["seen"], json!(["inner", "outer"]));
    }

    #[test]
    fn test_tail_entries_decorate_produced_response() {
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.add("handler", producer("handler"));
        // Listed after the producer, so the descent never reaches it.
        pipeline.add("audit", tagger("audit"));

        let response = pipeline.run(json!({})).unwrap();
        assert_eq!(response["produced_by"], json!("handler"));
        assert_eq!(response["seen"], json!(["audit"]));
    }

    #[test]
    fn test_tail_entries_receive_the_pipeline_input() {
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.add("handler", producer("handler"));
        // Runs in the tail phase; copies a field of the request into the
        // produced response.
        pipeline.add(
            "audit",
            from_fn(|request, _params, next| {
                let response = next.run(request.clone())?;
                Ok(response.map(|mut value| {
                    if let Some(object) = value.as_object_mut() {
                        object.insert("request_path".to_string(), request["path"].clone());
                    }
                    value
                }))
            }),
        );

        let response = pipeline.run(json!({ "path": "users" })).unwrap();
        assert_eq!(response["produced_by"], json!("handler"));
        assert_eq!(response["request_path"], json!("users"));
    }

    #[test]
    fn test_first_producer_wins() {
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.add("first", producer("first"));
        pipeline.add("second", producer("second"));

        let response = pipeline.run(json!({})).unwrap();
        assert_eq!(response["produced_by"], json!("first"));
    }

    #[test]
    fn test_before_and_after_positioning() {
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.add("auth", pass_through());
        pipeline.add("handler", pass_through());
        pipeline.add("rate-limit", pass_through()).before("handler");
        pipeline.add("log", pass_through()).after("auth");

        assert_eq!(pipeline.names(), vec!["auth", "log", "rate-limit", "handler"]);
    }

    #[test]
    fn test_add_same_name_replaces_and_clears_directive() {
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.add("a", pass_through());
        pipeline.add("b", pass_through());
        pipeline.add("c", pass_through()).before("a");
        assert_eq!(pipeline.names(), vec!["c", "a", "b"]);

        // Re-adding c drops the directive; back to insertion order.
        pipeline.add("c", pass_through());
        assert_eq!(pipeline.names(), vec!["a", "b", "c"]);
        assert_eq!(pipeline.len(), 3);
    }

    #[test]
    fn test_remove_clears_directives_targeting_the_name() {
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.add("a", pass_through());
        pipeline.add("b", pass_through());
        pipeline.add("c", pass_through()).before("a");

        assert!(pipeline.remove("a"));
        assert!(!pipeline.remove("a"));
        assert_eq!(pipeline.names(), vec!["b", "c"]);
    }

    #[test]
    fn test_directive_with_absent_target_is_ignored() {
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.add("a", pass_through());
        pipeline.add("b", pass_through()).before("ghost");
        assert_eq!(pipeline.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_params_are_passed_to_the_middleware() {
        let mut pipeline = MiddlewarePipeline::new();
        pipeline
            .add(
                "echo-params",
                from_fn(|_request, params, _next| Ok(Some(json!(params)))),
            )
            .params(["admin", "editor"]);

        let response = pipeline.run(json!({})).unwrap();
        assert_eq!(response, json!(["admin", "editor"]));
    }

    #[test]
    fn test_producer_short_circuits_descent() {
        // The pass-through after the producer in descent order never sees the
        // request during descent; it runs in the tail phase against the
        // produced response.
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.add("guard", producer("guard"));
        pipeline.add("late-producer", producer("late"));
        pipeline.add("audit", tagger("audit"));

        let response = pipeline.run(json!({})).unwrap();
        assert_eq!(response["produced_by"], json!("guard"));
        assert_eq!(response["seen"], json!(["audit"]));
    }
}
