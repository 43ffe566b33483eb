use std::env;

use crate::utils::{CircuitBreakerConfig, RetryConfig};

// ============================================================================
// Configuration
// ============================================================================
//
// Environment variables:
// - EVENT_BUS_NAME   logical bus name, defines the transport channel
// - REDIS_URL        redis://host:port (default redis://127.0.0.1:6379)
// - REDIS_PASSWORD   optional, merged into the connection URL
// - METRICS_PORT     port of the /metrics endpoint (demo binary only)
//
// ============================================================================

pub const DEFAULT_BUS_NAME: &str = "default";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_METRICS_PORT: u16 = 9090;

#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Bus instances sharing a name share the transport channel
    pub name: String,
    pub redis_url: String,
    pub password: Option<String>,
    pub connect_retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl BusConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            password: None,
            connect_retry: RetryConfig::conservative(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }

    pub fn from_env() -> Self {
        let name = env::var("EVENT_BUS_NAME").unwrap_or_else(|_| DEFAULT_BUS_NAME.to_string());
        let mut config = Self::new(name);
        if let Ok(url) = env::var("REDIS_URL") {
            config.redis_url = url;
        }
        config.password = env::var("REDIS_PASSWORD").ok().filter(|p| !p.is_empty());
        config
    }

    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = url.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_connect_retry(mut self, retry: RetryConfig) -> Self {
        self.connect_retry = retry;
        self
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    /// Transport channel for this bus
    pub fn channel(&self) -> String {
        format!("{}:events", self.name)
    }

    /// Redis URL with the password merged in, if one is configured
    pub fn redis_connection_url(&self) -> String {
        let url = if self.redis_url.contains("://") {
            self.redis_url.clone()
        } else {
            format!("redis://{}", self.redis_url)
        };

        match &self.password {
            Some(password) if !url.contains('@') => match url.split_once("://") {
                Some((scheme, rest)) => format!("{scheme}://:{password}@{rest}"),
                None => url,
            },
            _ => url,
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_NAME)
    }
}

/// Settings for the demo binary
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bus: BusConfig,
    pub metrics_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let metrics_port = env::var("METRICS_PORT")
            .ok()
            .and_then(|port| port.parse().ok())
            .unwrap_or(DEFAULT_METRICS_PORT);

        Self {
            bus: BusConfig::from_env(),
            metrics_port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_is_scoped_to_bus_name() {
        assert_eq!(BusConfig::new("orders").channel(), "orders:events");
    }

    #[test]
    fn test_connection_url_merges_password() {
        let config = BusConfig::new("test")
            .with_redis_url("redis://cache:6380/0")
            .with_password("s3cret");
        assert_eq!(config.redis_connection_url(), "redis://:s3cret@cache:6380/0");
    }

    #[test]
    fn test_connection_url_adds_scheme() {
        let config = BusConfig::new("test").with_redis_url("localhost:6379");
        assert_eq!(config.redis_connection_url(), "redis://localhost:6379");
    }

    #[test]
    fn test_connection_url_keeps_existing_credentials() {
        let config = BusConfig::new("test")
            .with_redis_url("redis://user:pw@cache:6379")
            .with_password("ignored");
        assert_eq!(config.redis_connection_url(), "redis://user:pw@cache:6379");
    }
}
