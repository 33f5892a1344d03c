//! Configuration management for the Fieldops runtime.
//!
//! Loads configuration from environment variables with sensible defaults.

use fieldops_core::lifecycle::LifecyclePolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Live backend connection
    pub backend: BackendConfig,
    /// Provider routing
    pub provider: ProviderConfig,
    /// Notification dispatch
    pub notifications: NotificationConfig,
    /// Lifecycle rules
    pub lifecycle: LifecyclePolicy,
    /// Logging and metrics
    pub telemetry: TelemetryConfig,
}

/// Live backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the REST backend
    pub url: Option<String>,
    /// API key sent with every request
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl BackendConfig {
    /// Whether both URL and API key are present.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.url.is_some() && self.api_key.is_some()
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            request_timeout_secs: 10,
        }
    }
}

/// Provider routing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Whether sessions start with the live provider enabled
    pub initially_available: bool,
    /// Fall back to the mock when the live provider fails
    pub mock_fallback: bool,
    /// Load demo fixtures into the mock provider
    pub seed_mock_data: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            initially_available: true,
            mock_fallback: true,
            seed_mock_data: true,
        }
    }
}

/// Notification dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Capacity of the outbound queue
    pub queue_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { queue_capacity: 256 }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Prometheus endpoint address; metrics are not exported when unset
    pub metrics_addr: Option<SocketAddr>,
    /// Default log filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_addr: None,
            log_filter: "info,fieldops_runtime=debug".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Unparseable values fall back to their defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            backend: BackendConfig {
                url: lookup("FIELDOPS_BACKEND_URL").filter(|s| !s.trim().is_empty()),
                api_key: lookup("FIELDOPS_BACKEND_API_KEY").filter(|s| !s.trim().is_empty()),
                request_timeout_secs: lookup("FIELDOPS_REQUEST_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.backend.request_timeout_secs),
            },
            provider: ProviderConfig {
                initially_available: lookup("FIELDOPS_PROVIDER_AVAILABLE")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.provider.initially_available),
                mock_fallback: lookup("FIELDOPS_MOCK_FALLBACK")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.provider.mock_fallback),
                seed_mock_data: lookup("FIELDOPS_SEED_MOCK_DATA")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.provider.seed_mock_data),
            },
            notifications: NotificationConfig {
                queue_capacity: lookup("FIELDOPS_NOTIFICATION_QUEUE")
                    .and_then(|s| s.parse().ok())
                    .filter(|capacity: &usize| *capacity > 0)
                    .unwrap_or(defaults.notifications.queue_capacity),
            },
            lifecycle: LifecyclePolicy {
                allow_self_verification: lookup("FIELDOPS_ALLOW_SELF_VERIFICATION")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.lifecycle.allow_self_verification),
            },
            telemetry: TelemetryConfig {
                metrics_addr: lookup("FIELDOPS_METRICS_ADDR").and_then(|s| s.parse().ok()),
                log_filter: defaults.telemetry.log_filter,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config(&[]);

        assert!(!config.backend.is_configured());
        assert_eq!(config.backend.request_timeout(), Duration::from_secs(10));
        assert!(config.provider.initially_available);
        assert!(config.provider.mock_fallback);
        assert!(config.provider.seed_mock_data);
        assert_eq!(config.notifications.queue_capacity, 256);
        assert!(!config.lifecycle.allow_self_verification);
        assert!(config.telemetry.metrics_addr.is_none());
    }

    #[test]
    fn reads_every_variable() {
        let config = config(&[
            ("FIELDOPS_BACKEND_URL", "https://api.example.com"),
            ("FIELDOPS_BACKEND_API_KEY", "secret"),
            ("FIELDOPS_REQUEST_TIMEOUT_SECS", "3"),
            ("FIELDOPS_PROVIDER_AVAILABLE", "false"),
            ("FIELDOPS_MOCK_FALLBACK", "false"),
            ("FIELDOPS_SEED_MOCK_DATA", "false"),
            ("FIELDOPS_NOTIFICATION_QUEUE", "8"),
            ("FIELDOPS_ALLOW_SELF_VERIFICATION", "true"),
            ("FIELDOPS_METRICS_ADDR", "127.0.0.1:9100"),
        ]);

        assert!(config.backend.is_configured());
        assert_eq!(config.backend.request_timeout_secs, 3);
        assert!(!config.provider.initially_available);
        assert!(!config.provider.mock_fallback);
        assert!(!config.provider.seed_mock_data);
        assert_eq!(config.notifications.queue_capacity, 8);
        assert!(config.lifecycle.allow_self_verification);
        assert_eq!(
            config.telemetry.metrics_addr,
            Some(SocketAddr::from(([127, 0, 0, 1], 9100)))
        );
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = config(&[
            ("FIELDOPS_BACKEND_URL", "  "),
            ("FIELDOPS_NOTIFICATION_QUEUE", "0"),
            ("FIELDOPS_MOCK_FALLBACK", "maybe"),
        ]);

        assert!(config.backend.url.is_none());
        assert_eq!(config.notifications.queue_capacity, 256);
        assert!(config.provider.mock_fallback);
    }
}
