//! Configuration types

use crate::error::ConfigError;
use std::time::Duration;

/// Process-local memory tier TTL (5 minutes).
pub const DEFAULT_MEMORY_TTL_SECS: u64 = 300;
/// Edge tier TTL (1 hour).
pub const DEFAULT_EDGE_TTL_SECS: u64 = 3600;
/// How often the pinned global default is refreshed (1 hour).
pub const DEFAULT_GLOBAL_DEFAULT_REFRESH_SECS: u64 = 3600;
/// Bound on bound parameters per relational query.
pub const DEFAULT_MAX_QUERY_PARAMS: usize = 100;
/// Attempts `ensure_owned` makes before giving up on a contended repoint.
pub const DEFAULT_CLONE_RETRY_LIMIT: u32 = 3;
/// Key namespace of the scaling cache in the shared edge store.
pub const DEFAULT_EDGE_NAMESPACE: &str = "scaling";

/// Tuning knobs of the scaling engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingConfig {
    /// TTL for entries in the process-local memory tier.
    pub memory_ttl: Duration,
    /// TTL for entries written to the edge tier.
    pub edge_ttl: Duration,
    /// Age after which the pinned global default is refreshed opportunistically.
    pub global_default_refresh: Duration,
    /// Maximum parameters a single `IN (...)` lookup may bind.
    pub max_query_params: usize,
    /// Attempts at the clone-and-repoint sequence under contention.
    pub clone_retry_limit: u32,
    /// Prefix of every edge key written by the scaling cache.
    pub edge_namespace: String,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            memory_ttl: Duration::from_secs(DEFAULT_MEMORY_TTL_SECS),
            edge_ttl: Duration::from_secs(DEFAULT_EDGE_TTL_SECS),
            global_default_refresh: Duration::from_secs(DEFAULT_GLOBAL_DEFAULT_REFRESH_SECS),
            max_query_params: DEFAULT_MAX_QUERY_PARAMS,
            clone_retry_limit: DEFAULT_CLONE_RETRY_LIMIT,
            edge_namespace: DEFAULT_EDGE_NAMESPACE.to_string(),
        }
    }
}

impl ScalingConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `WODSMITH_SCALING_MEMORY_TTL_SECS` (default: 300)
    /// - `WODSMITH_SCALING_EDGE_TTL_SECS` (default: 3600)
    /// - `WODSMITH_SCALING_GLOBAL_REFRESH_SECS` (default: 3600)
    /// - `WODSMITH_SCALING_MAX_QUERY_PARAMS` (default: 100)
    /// - `WODSMITH_SCALING_CLONE_RETRIES` (default: 3)
    /// - `WODSMITH_SCALING_EDGE_NAMESPACE` (default: "scaling")
    ///
    /// Unparseable values fall back to the default; call [`validate`](Self::validate)
    /// before use.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let secs = |name: &str, fallback: Duration| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };

        let max_query_params = std::env::var("WODSMITH_SCALING_MAX_QUERY_PARAMS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.max_query_params);

        let clone_retry_limit = std::env::var("WODSMITH_SCALING_CLONE_RETRIES")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.clone_retry_limit);

        let edge_namespace = std::env::var("WODSMITH_SCALING_EDGE_NAMESPACE")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.edge_namespace);

        Self {
            memory_ttl: secs("WODSMITH_SCALING_MEMORY_TTL_SECS", defaults.memory_ttl),
            edge_ttl: secs("WODSMITH_SCALING_EDGE_TTL_SECS", defaults.edge_ttl),
            global_default_refresh: secs(
                "WODSMITH_SCALING_GLOBAL_REFRESH_SECS",
                defaults.global_default_refresh,
            ),
            max_query_params,
            clone_retry_limit,
            edge_namespace,
        }
    }

    /// Set the memory tier TTL.
    pub fn with_memory_ttl(mut self, ttl: Duration) -> Self {
        self.memory_ttl = ttl;
        self
    }

    /// Set the edge tier TTL.
    pub fn with_edge_ttl(mut self, ttl: Duration) -> Self {
        self.edge_ttl = ttl;
        self
    }

    /// Set the refresh interval of the pinned global default.
    pub fn with_global_default_refresh(mut self, interval: Duration) -> Self {
        self.global_default_refresh = interval;
        self
    }

    /// Set the per-query parameter bound.
    pub fn with_max_query_params(mut self, max: usize) -> Self {
        self.max_query_params = max;
        self
    }

    /// Set the clone retry limit.
    pub fn with_clone_retry_limit(mut self, limit: u32) -> Self {
        self.clone_retry_limit = limit;
        self
    }

    /// Set the edge key namespace.
    pub fn with_edge_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.edge_namespace = namespace.into();
        self
    }

    /// Check the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_ttl.is_zero() {
            return Err(invalid("memory_ttl", "0s", "must be positive"));
        }
        if self.edge_ttl.is_zero() {
            return Err(invalid("edge_ttl", "0s", "must be positive"));
        }
        if self.edge_ttl < self.memory_ttl {
            return Err(ConfigError::IncompatibleOptions {
                option_a: format!("edge_ttl={:?}", self.edge_ttl),
                option_b: format!("memory_ttl={:?}", self.memory_ttl),
            });
        }
        if self.global_default_refresh.is_zero() {
            return Err(invalid("global_default_refresh", "0s", "must be positive"));
        }
        // One slot is always taken by a non-list predicate.
        if self.max_query_params < 2 {
            return Err(invalid(
                "max_query_params",
                &self.max_query_params.to_string(),
                "must be at least 2",
            ));
        }
        if self.clone_retry_limit == 0 {
            return Err(invalid("clone_retry_limit", "0", "must be at least 1"));
        }
        if self.edge_namespace.is_empty() || self.edge_namespace.contains(':') {
            return Err(invalid(
                "edge_namespace",
                &self.edge_namespace,
                "must be non-empty and contain no ':'",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ScalingConfig::default();
        assert_eq!(config.memory_ttl, Duration::from_secs(300));
        assert_eq!(config.edge_ttl, Duration::from_secs(3600));
        assert_eq!(config.max_query_params, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ScalingConfig::new()
            .with_memory_ttl(Duration::from_secs(10))
            .with_edge_ttl(Duration::from_secs(20))
            .with_global_default_refresh(Duration::from_secs(30))
            .with_max_query_params(50)
            .with_clone_retry_limit(5)
            .with_edge_namespace("levels");

        assert_eq!(config.memory_ttl, Duration::from_secs(10));
        assert_eq!(config.edge_ttl, Duration::from_secs(20));
        assert_eq!(config.global_default_refresh, Duration::from_secs(30));
        assert_eq!(config.max_query_params, 50);
        assert_eq!(config.clone_retry_limit, 5);
        assert_eq!(config.edge_namespace, "levels");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ScalingConfig::new()
            .with_memory_ttl(Duration::ZERO)
            .validate()
            .is_err());
        assert!(matches!(
            ScalingConfig::new()
                .with_memory_ttl(Duration::from_secs(600))
                .with_edge_ttl(Duration::from_secs(60))
                .validate(),
            Err(ConfigError::IncompatibleOptions { .. })
        ));
        assert!(ScalingConfig::new().with_max_query_params(1).validate().is_err());
        assert!(ScalingConfig::new().with_clone_retry_limit(0).validate().is_err());
        assert!(ScalingConfig::new().with_edge_namespace("a:b").validate().is_err());
    }
}
