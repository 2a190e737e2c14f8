//! Handler references and resolution
//!
//! A route or middleware entry names its handler with a [`HandlerRef`]: a
//! string descriptor (`Class::method`, `Class->method`, `Class@method`, or a
//! bare function name) or an inline callable. Descriptors are parsed once and
//! the parsed form is cached keyed by the raw string, so dispatch never
//! re-parses per request.
//!
//! Turning a reference into something invokable is the job of an injected
//! [`HandlerResolver`] capability (a DI container, a service locator, or the
//! in-crate [`HandlerRegistry`]).

use crate::{RouterError, RouterResult};
use lru::LruCache;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, LazyLock, Mutex};

/// An invokable handler bound to its receiver: takes the routed input payload
/// and produces a response value.
pub type BoundHandler = Arc<dyn Fn(Value) -> RouterResult<Value> + Send + Sync>;

/// Wrap a closure as a [`BoundHandler`].
pub fn bound<F>(f: F) -> BoundHandler
where
    F: Fn(Value) -> RouterResult<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Placeholder descriptor recorded in snapshots for closure handlers, which
/// have no process-independent form.
pub const CALLABLE_DESCRIPTOR: &str = "<callable>";

/// Parse-cache capacity. Descriptors repeat heavily across a routing table,
/// so a small cache covers the working set.
const DESCRIPTOR_CACHE_SIZE: usize = 256;

static DESCRIPTOR_CACHE: LazyLock<Mutex<LruCache<String, HandlerRef>>> = LazyLock::new(|| {
    Mutex::new(LruCache::new(
        NonZeroUsize::new(DESCRIPTOR_CACHE_SIZE).expect("cache size is non-zero"),
    ))
});

/// Opaque reference to a route or middleware handler.
///
/// The string descriptor forms are resolved once at bind time, not re-parsed
/// per request; see [`HandlerRef::parse`].
#[derive(Clone)]
pub enum HandlerRef {
    /// A free function, referenced by name
    Function(String),
    /// A static method, written `Class::method`
    StaticMethod {
        /// Class (or module) owning the method
        class: String,
        /// Method name
        method: String,
    },
    /// An instance method, written `Class->method` or `Class@method`
    InstanceMethod {
        /// Class to instantiate through the resolver
        class: String,
        /// Method name
        method: String,
    },
    /// An inline callable; never serializable
    Callable(BoundHandler),
}

impl HandlerRef {
    /// Parse a descriptor string into its tagged form, consulting the
    /// process-wide parse cache first.
    pub fn parse(descriptor: &str) -> Self {
        if let Ok(mut cache) = DESCRIPTOR_CACHE.lock() {
            if let Some(parsed) = cache.get(descriptor) {
                return parsed.clone();
            }
        }

        let parsed = Self::parse_uncached(descriptor);

        if let Ok(mut cache) = DESCRIPTOR_CACHE.lock() {
            cache.put(descriptor.to_string(), parsed.clone());
        }
        parsed
    }

    fn parse_uncached(descriptor: &str) -> Self {
        if let Some((class, method)) = descriptor.split_once("::") {
            return Self::StaticMethod {
                class: class.to_string(),
                method: method.to_string(),
            };
        }
        if let Some((class, method)) = descriptor.split_once("->") {
            return Self::InstanceMethod {
                class: class.to_string(),
                method: method.to_string(),
            };
        }
        if let Some((class, method)) = descriptor.split_once('@') {
            return Self::InstanceMethod {
                class: class.to_string(),
                method: method.to_string(),
            };
        }
        Self::Function(descriptor.to_string())
    }

    /// The canonical descriptor string, or [`CALLABLE_DESCRIPTOR`] for
    /// inline callables.
    pub fn descriptor(&self) -> String {
        match self {
            Self::Function(name) => name.clone(),
            Self::StaticMethod { class, method } => format!("{class}::{method}"),
            Self::InstanceMethod { class, method } => format!("{class}@{method}"),
            Self::Callable(_) => CALLABLE_DESCRIPTOR.to_string(),
        }
    }

    /// True when this reference can be written to a compiled snapshot.
    pub fn is_serializable(&self) -> bool {
        !matches!(self, Self::Callable(_))
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callable(_) => f.write_str("HandlerRef::Callable"),
            other => write!(f, "HandlerRef({})", other.descriptor()),
        }
    }
}

impl PartialEq for HandlerRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Callable(a), Self::Callable(b)) => Arc::ptr_eq(a, b),
            (a, b) => {
                a.is_serializable() && b.is_serializable() && a.descriptor() == b.descriptor()
            }
        }
    }
}

impl From<&str> for HandlerRef {
    fn from(descriptor: &str) -> Self {
        Self::parse(descriptor)
    }
}

impl From<String> for HandlerRef {
    fn from(descriptor: String) -> Self {
        Self::parse(&descriptor)
    }
}

impl From<BoundHandler> for HandlerRef {
    fn from(handler: BoundHandler) -> Self {
        Self::Callable(handler)
    }
}

impl Serialize for HandlerRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.descriptor())
    }
}

impl<'de> Deserialize<'de> for HandlerRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let descriptor = String::deserialize(deserializer)?;
        if descriptor.is_empty() {
            return Err(D::Error::custom("empty handler descriptor"));
        }
        Ok(Self::parse(&descriptor))
    }
}

/// Capability for turning a [`HandlerRef`] into an invokable bound instance.
///
/// Used by the router for route handlers and by the middleware pipeline for
/// named middleware.
pub trait HandlerResolver: Send + Sync {
    /// Resolve a handler reference, failing with `HANDLER_NOT_FOUND` when the
    /// reference is unknown.
    fn resolve(&self, handler: &HandlerRef) -> RouterResult<BoundHandler>;
}

/// In-crate resolver backed by a descriptor → handler map.
///
/// Hosts with a DI container implement [`HandlerResolver`] themselves; this
/// registry covers tests and simple embeddings.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, BoundHandler>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its descriptor string.
    pub fn register<F>(&mut self, descriptor: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Value) -> RouterResult<Value> + Send + Sync + 'static,
    {
        self.handlers.insert(descriptor.into(), Arc::new(handler));
        self
    }
}

impl HandlerResolver for HandlerRegistry {
    fn resolve(&self, handler: &HandlerRef) -> RouterResult<BoundHandler> {
        if let HandlerRef::Callable(callable) = handler {
            return Ok(callable.clone());
        }
        let descriptor = handler.descriptor();
        self.handlers.get(&descriptor).cloned().ok_or_else(|| {
            RouterError::handler_not_found(format!("no handler registered for '{descriptor}'"))
        })
    }
}
