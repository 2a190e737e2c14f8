//! Router configuration

use crate::route::ClientType;
use serde::{Deserialize, Serialize};

/// Configuration applied to every request a router receives.
///
/// All fields have sensible defaults; use the `with_*` builders to override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Scope used when a request carries none.
    pub default_scope: String,
    /// Client type filter applied when a request carries none. `None` means
    /// no filter: any client type matches.
    pub default_client_type: Option<ClientType>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_scope: "default".to_string(),
            default_client_type: None,
        }
    }
}

impl RouterConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scope used for requests that carry none.
    pub fn with_default_scope(mut self, scope: impl Into<String>) -> Self {
        self.default_scope = scope.into();
        self
    }

    /// Set the client type filter applied to requests that carry none.
    pub fn with_default_client_type(mut self, client_type: ClientType) -> Self {
        self.default_client_type = Some(client_type);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RouterConfig::default();
        assert_eq!(config.default_scope, "default");
        assert!(config.default_client_type.is_none());
    }

    #[test]
    fn test_builders() {
        let config = RouterConfig::new()
            .with_default_scope("admin")
            .with_default_client_type(ClientType::Api);
        assert_eq!(config.default_scope, "admin");
        assert_eq!(config.default_client_type, Some(ClientType::Api));
    }

    #[test]
    fn test_serde_round_trip() {
        let config = RouterConfig::new().with_default_client_type(ClientType::Web);
        let json = serde_json::to_string(&config).unwrap();
        let back: RouterConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.default_scope, config.default_scope);
        assert_eq!(back.default_client_type, config.default_client_type);
    }
}
