//! Configuration model for the Dockling runtime.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::types::Platform;

/// Root configuration for a Dockling run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocklingConfig {
    /// Registry endpoints and HTTP behavior.
    pub registry: RegistryConfig,
    /// Parent directory for layer staging. `None` uses the system temp dir.
    pub staging_dir: Option<PathBuf>,
    /// Platform selected from multi-platform manifest lists.
    pub platform: Platform,
}

/// Endpoints of the registry images are pulled from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Token endpoint (queried without credentials).
    pub auth_url: String,
    /// Value of the `service` query parameter on token requests.
    pub auth_service: String,
    /// Base URL of the registry's `/v2/` API.
    pub registry_url: String,
    /// Per-request timeout in seconds. `None` waits indefinitely.
    pub request_timeout_secs: Option<u64>,
}

impl RegistryConfig {
    /// Returns the per-request timeout, if one is configured.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Returns the registry base URL without a trailing slash.
    #[must_use]
    pub fn registry_base(&self) -> &str {
        self.registry_url.trim_end_matches('/')
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            auth_url: constants::DEFAULT_AUTH_URL.to_string(),
            auth_service: constants::DEFAULT_AUTH_SERVICE.to_string(),
            registry_url: constants::DEFAULT_REGISTRY_URL.to_string(),
            request_timeout_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_docker_hub() {
        let config = DocklingConfig::default();
        assert_eq!(config.registry.auth_url, "https://auth.docker.io/token");
        assert_eq!(config.registry.auth_service, "registry.docker.io");
        assert!(config.registry.request_timeout().is_none());
        assert!(config.staging_dir.is_none());
    }

    #[test]
    fn registry_base_strips_trailing_slash() {
        let registry = RegistryConfig {
            registry_url: "http://127.0.0.1:5000/".into(),
            ..RegistryConfig::default()
        };
        assert_eq!(registry.registry_base(), "http://127.0.0.1:5000");
    }

    #[test]
    fn config_survives_json() {
        let config = DocklingConfig {
            staging_dir: Some(PathBuf::from("/var/tmp")),
            platform: Platform::new("linux", "arm64"),
            ..DocklingConfig::default()
        };
        let json = serde_json::to_string(&config).expect("serialize");
        let back: DocklingConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, config);
    }
}
