//! Pipeline tests - property-based checks of ordering and producer semantics
//!
//! The in-module tests pin individual behaviors; these properties check that
//! ordering and first-producer-wins hold for arbitrary pipeline shapes.

use proptest::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::pipeline::{Middleware, MiddlewarePipeline, from_fn};
use crate::RouterErrorCode;

fn producer(tag: usize) -> Arc<dyn Middleware> {
    from_fn(move |_request, _params, _next| Ok(Some(json!({ "produced_by": tag }))))
}

fn pass_through() -> Arc<dyn Middleware> {
    from_fn(|request, _params, next| next.run(request))
}

fn counting_decorator() -> Arc<dyn Middleware> {
    from_fn(|request, _params, next| {
        let response = next.run(request)?;
        Ok(response.map(|mut value| {
            if let Some(object) = value.as_object_mut() {
                let count = object
                    .get("decorations")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                object.insert("decorations".to_string(), json!(count + 1));
            }
            value
        }))
    })
}

// =============================================================================
// Property-Based Tests
// =============================================================================

proptest! {
    /// **Property: Names are unique and order-stable**
    /// *For any* sequence of adds (with repeats), the pipeline holds each
    /// name exactly once and, without directives, in first-insertion order
    /// with re-adds staying in place.
    #[test]
    fn prop_names_stay_unique(
        adds in proptest::collection::vec("[a-e]", 1..20)
    ) {
        let mut pipeline = MiddlewarePipeline::new();
        let mut expected: Vec<String> = Vec::new();
        for name in &adds {
            pipeline.add(name.clone(), pass_through());
            if !expected.contains(name) {
                expected.push(name.clone());
            }
        }

        let names: Vec<String> = pipeline.names().iter().map(|s| s.to_string()).collect();
        prop_assert_eq!(names, expected);
    }

    /// **Property: First producer wins**
    /// *For any* pipeline of pass-throughs with producers at arbitrary
    /// positions, the response comes from the earliest producer.
    #[test]
    fn prop_first_producer_wins(
        slots in proptest::collection::vec(any::<bool>(), 1..12)
    ) {
        let mut pipeline = MiddlewarePipeline::new();
        for (index, is_producer) in slots.iter().enumerate() {
            let middleware = if *is_producer {
                producer(index)
            } else {
                pass_through()
            };
            pipeline.add(format!("mw-{index}"), middleware);
        }

        let first = slots.iter().position(|&p| p);
        match pipeline.run(json!({})) {
            Ok(response) => {
                let winner = first.expect("a response needs a producer");
                prop_assert_eq!(&response["produced_by"], &json!(winner));
            }
            Err(err) => {
                prop_assert!(first.is_none());
                prop_assert_eq!(err.code, RouterErrorCode::HandlerNotFound);
            }
        }
    }

    /// **Property: Every decorator runs exactly once**
    /// *For any* number of decorators around a single producer, the response
    /// carries one decoration per decorator, whether the decorator sat before
    /// the producer (unwind) or after it (tail).
    #[test]
    fn prop_decorators_each_run_once(
        before in 0usize..6,
        after in 0usize..6,
    ) {
        let mut pipeline = MiddlewarePipeline::new();
        for i in 0..before {
            pipeline.add(format!("pre-{i}"), counting_decorator());
        }
        pipeline.add("handler", producer(0));
        for i in 0..after {
            pipeline.add(format!("post-{i}"), counting_decorator());
        }

        let response = pipeline.run(json!({})).unwrap();
        let decorations = response
            .get("decorations")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        prop_assert_eq!(decorations as usize, before + after);
    }

    /// **Property: Positioning respects the target**
    /// *For any* pipeline and any pair of distinct entries, repositioning one
    /// before the other puts it immediately ahead of the target.
    #[test]
    fn prop_before_lands_adjacent(
        count in 2usize..8,
        seed in any::<u64>(),
    ) {
        let mut pipeline = MiddlewarePipeline::new();
        for i in 0..count {
            pipeline.add(format!("mw-{i}"), pass_through());
        }
        let moved = format!("mw-{}", (seed as usize) % count);
        let target = format!("mw-{}", (seed as usize / count) % count);
        prop_assume!(moved != target);

        pipeline.add(moved.clone(), pass_through()).before(target.clone());

        let names = pipeline.names();
        let moved_pos = names.iter().position(|n| *n == moved).unwrap();
        let target_pos = names.iter().position(|n| *n == target).unwrap();
        prop_assert_eq!(moved_pos + 1, target_pos);
    }
}
