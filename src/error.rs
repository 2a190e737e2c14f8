//! Error types for routing and dispatch operations
//!
//! This module provides type-safe error handling for the routing engine.
//!
//! # Error Codes
//!
//! Error codes are represented by the [`RouterErrorCode`] enum, which keeps
//! the different "not found" families distinctly matchable: a dispatch miss
//! (`RouteNotFound`) can be mapped to a 404 by the host, while a name-index
//! miss (`NameNotFound`) or an entity/action miss usually indicates a
//! programmer error. When serialized, codes are converted to
//! SCREAMING_SNAKE_CASE strings.
//!
//! # Example
//! ```rust,ignore
//! use waypoint::{RouterError, RouterErrorCode};
//!
//! let error = RouterError::new(RouterErrorCode::RouteNotFound, "no route for GET users/9");
//! let error = RouterError::name_not_found("home"); // Convenience method
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Type-safe error codes for routing operations.
///
/// When serialized to JSON, codes are converted to SCREAMING_SNAKE_CASE
/// (e.g., `RouteNotFound` becomes `"ROUTE_NOT_FOUND"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum RouterErrorCode {
    // Dispatch misses
    /// No route satisfied method + pattern + client type + scope
    RouteNotFound,
    /// A name-index lookup missed
    NameNotFound,

    // Entity/action lookup misses (out-of-bounds family)
    /// No route is bound to the requested entity
    EntityNotFound,
    /// The entity is known but the requested action is not
    ActionNotFound,
    /// The action was omitted and more than one is registered for the entity
    AmbiguousAction,

    // Build-time misuse
    /// A configuration error detected while declaring routes or commands
    Logic,

    // Pipeline / handler resolution
    /// The middleware pipeline exhausted without producing a response, or a
    /// handler reference could not be resolved to an invokable
    HandlerNotFound,

    // Infrastructure
    /// Serialization or deserialization of a compiled snapshot failed
    SerializationError,
    /// An unexpected internal error occurred
    InternalError,
}

impl RouterErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RouteNotFound => "ROUTE_NOT_FOUND",
            Self::NameNotFound => "NAME_NOT_FOUND",
            Self::EntityNotFound => "ENTITY_NOT_FOUND",
            Self::ActionNotFound => "ACTION_NOT_FOUND",
            Self::AmbiguousAction => "AMBIGUOUS_ACTION",
            Self::Logic => "LOGIC",
            Self::HandlerNotFound => "HANDLER_NOT_FOUND",
            Self::SerializationError => "SERIALIZATION_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Returns true if this is a dispatch-time miss the host may map to an
    /// HTTP status (404/405) rather than abort on.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RouteNotFound | Self::NameNotFound)
    }

    /// Returns true if this is an entity/action lookup miss.
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(
            self,
            Self::EntityNotFound | Self::ActionNotFound | Self::AmbiguousAction
        )
    }
}

impl fmt::Display for RouterErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Routing error with type-safe code and message.
///
/// # Example
/// ```rust,ignore
/// use waypoint::{RouterError, RouterErrorCode};
///
/// // Create with code and message
/// let error = RouterError::new(RouterErrorCode::EntityNotFound, "no routes for entity");
///
/// // Add optional details
/// let error = error.with_details(serde_json::json!({"entity": "User"}));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("[{code}] {message}")]
pub struct RouterError {
    /// Type-safe error code
    pub code: RouterErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (JSON value)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl RouterError {
    /// Create a new error with code and message.
    pub fn new(code: RouterErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Serialize) -> Self {
        self.details = serde_json::to_value(details).ok();
        self
    }

    // Convenience constructors

    /// Create a ROUTE_NOT_FOUND error for a dispatch miss.
    pub fn route_not_found(message: impl Into<String>) -> Self {
        Self::new(RouterErrorCode::RouteNotFound, message)
    }

    /// Create a NAME_NOT_FOUND error for a name-index miss.
    pub fn name_not_found(name: &str) -> Self {
        Self::new(
            RouterErrorCode::NameNotFound,
            format!("no route named '{name}'"),
        )
    }

    /// Create an ENTITY_NOT_FOUND error.
    pub fn entity_not_found(entity: &str) -> Self {
        Self::new(
            RouterErrorCode::EntityNotFound,
            format!("no routes bound to entity '{entity}'"),
        )
    }

    /// Create an ACTION_NOT_FOUND error.
    pub fn action_not_found(entity: &str, action: &str) -> Self {
        Self::new(
            RouterErrorCode::ActionNotFound,
            format!("entity '{entity}' has no action '{action}'"),
        )
    }

    /// Create an AMBIGUOUS_ACTION error.
    pub fn ambiguous_action(entity: &str) -> Self {
        Self::new(
            RouterErrorCode::AmbiguousAction,
            format!("entity '{entity}' has multiple actions, pass one explicitly"),
        )
    }

    /// Create a LOGIC error for build-time misuse.
    pub fn logic(message: impl Into<String>) -> Self {
        Self::new(RouterErrorCode::Logic, message)
    }

    /// Create a HANDLER_NOT_FOUND error.
    pub fn handler_not_found(message: impl Into<String>) -> Self {
        Self::new(RouterErrorCode::HandlerNotFound, message)
    }

    /// Create a SERIALIZATION_ERROR error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(RouterErrorCode::SerializationError, message)
    }

    /// Create an INTERNAL_ERROR error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RouterErrorCode::InternalError, message)
    }
}

impl From<serde_json::Error> for RouterError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {err}"))
    }
}

/// Result type alias for routing operations.
pub type RouterResult<T> = Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RouterError::name_not_found("home");
        assert_eq!(err.to_string(), "[NAME_NOT_FOUND] no route named 'home'");
    }

    #[test]
    fn test_code_serialization() {
        let json = serde_json::to_string(&RouterErrorCode::RouteNotFound).unwrap();
        assert_eq!(json, "\"ROUTE_NOT_FOUND\"");
    }

    #[test]
    fn test_code_families() {
        assert!(RouterErrorCode::RouteNotFound.is_not_found());
        assert!(RouterErrorCode::NameNotFound.is_not_found());
        assert!(!RouterErrorCode::EntityNotFound.is_not_found());
        assert!(RouterErrorCode::EntityNotFound.is_out_of_bounds());
        assert!(RouterErrorCode::AmbiguousAction.is_out_of_bounds());
        assert!(!RouterErrorCode::Logic.is_out_of_bounds());
    }

    #[test]
    fn test_details_round_trip() {
        let err = RouterError::route_not_found("miss")
            .with_details(serde_json::json!({"path": "users/9"}));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "ROUTE_NOT_FOUND");
        assert_eq!(json["details"]["path"], "users/9");
    }
}
