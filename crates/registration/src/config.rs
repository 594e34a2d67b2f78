//! Registration configuration.

use crate::{Error, Result};

use std::fmt::{self, Debug};
use std::time::Duration;

use serde::Deserialize;

/// Default registry address.
pub const DEFAULT_REGISTRY_ADDRESS: &str = "http://localhost:8500";

/// Directory-side options: where to register and what the health check looks like.
#[derive(Clone, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct RegistryOptions {
    /// Registry server address.
    pub address: String,

    /// Service name to register. Required.
    pub service_name: String,

    /// Explicit instance id. Synthesized from name, host and pid when unset.
    pub service_id: Option<String>,

    /// Tags to register with.
    pub tags: Vec<String>,

    /// Port the service listens on.
    pub port: u16,

    /// Address the service is reachable on.
    pub service_address: String,

    /// Path of the health endpoint polled by the registry.
    pub health_check_path: String,

    /// Seconds between registry health polls.
    pub health_check_interval_seconds: u64,

    /// Seconds before a registry health poll times out.
    pub health_check_timeout_seconds: u64,

    /// Seconds an instance may stay critical before the registry removes it.
    pub deregister_after_seconds: u64,

    /// Master switch for registration and deregistration.
    pub enabled: bool,

    /// Registry datacenter.
    pub datacenter: Option<String>,

    /// Registry ACL token.
    pub token: Option<String>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            address: DEFAULT_REGISTRY_ADDRESS.to_string(),
            service_name: String::new(),
            service_id: None,
            tags: Vec::new(),
            port: 0,
            service_address: "localhost".to_string(),
            health_check_path: "/health".to_string(),
            health_check_interval_seconds: 10,
            health_check_timeout_seconds: 5,
            deregister_after_seconds: 30,
            enabled: true,
            datacenter: None,
            token: None,
        }
    }
}

// Hand written so the token never ends up in logs.
impl Debug for RegistryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryOptions")
            .field("address", &self.address)
            .field("service_name", &self.service_name)
            .field("service_id", &self.service_id)
            .field("tags", &self.tags)
            .field("port", &self.port)
            .field("service_address", &self.service_address)
            .field("health_check_path", &self.health_check_path)
            .field(
                "health_check_interval_seconds",
                &self.health_check_interval_seconds,
            )
            .field(
                "health_check_timeout_seconds",
                &self.health_check_timeout_seconds,
            )
            .field("deregister_after_seconds", &self.deregister_after_seconds)
            .field("enabled", &self.enabled)
            .field("datacenter", &self.datacenter)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Lifecycle-side options: when and how persistently to register.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct RegistrationOptions {
    /// Register when the process starts.
    pub auto_register: bool,

    /// Deregister when the process stops.
    pub auto_deregister: bool,

    /// One-time pause before the first registration attempt.
    pub registration_delay_seconds: u64,

    /// Total registration attempts, first one included.
    pub max_retry_attempts: u32,

    /// Fixed pause between attempts.
    pub retry_delay_seconds: u64,
}

impl Default for RegistrationOptions {
    fn default() -> Self {
        Self {
            auto_register: true,
            auto_deregister: true,
            registration_delay_seconds: 0,
            max_retry_attempts: 3,
            retry_delay_seconds: 5,
        }
    }
}

impl RegistrationOptions {
    /// Pause before the first attempt.
    #[must_use]
    pub const fn registration_delay(&self) -> Duration {
        Duration::from_secs(self.registration_delay_seconds)
    }

    /// Pause between attempts.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }
}

/// Read-only configuration snapshot handed to the coordinator.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Directory-side options.
    pub registry: RegistryOptions,

    /// Lifecycle-side options.
    pub registration: RegistrationOptions,
}

impl RegistrationConfig {
    /// Check invariants the rest of the crate relies on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] describing the first violated invariant.
    pub fn validate(&self) -> Result<()> {
        if self.registry.service_name.trim().is_empty() {
            return Err(Error::Configuration(
                "service name is required for registration".to_string(),
            ));
        }

        if self.registry.port == 0 {
            return Err(Error::Configuration(
                "service port must be between 1 and 65535".to_string(),
            ));
        }

        if !self.registry.health_check_path.starts_with('/') {
            return Err(Error::Configuration(format!(
                "health check path must start with '/': {}",
                self.registry.health_check_path
            )));
        }

        if self.registration.max_retry_attempts == 0 {
            return Err(Error::Configuration(
                "max retry attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RegistrationConfig {
        RegistrationConfig {
            registry: RegistryOptions {
                service_name: "orders".to_string(),
                port: 8080,
                ..RegistryOptions::default()
            },
            registration: RegistrationOptions::default(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = RegistrationConfig::default();

        assert_eq!(config.registry.address, "http://localhost:8500");
        assert_eq!(config.registry.health_check_path, "/health");
        assert_eq!(config.registry.health_check_interval_seconds, 10);
        assert_eq!(config.registry.health_check_timeout_seconds, 5);
        assert_eq!(config.registry.deregister_after_seconds, 30);
        assert!(config.registry.enabled);

        assert!(config.registration.auto_register);
        assert!(config.registration.auto_deregister);
        assert_eq!(config.registration.registration_delay_seconds, 0);
        assert_eq!(config.registration.max_retry_attempts, 3);
        assert_eq!(config.registration.retry_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_validate() {
        assert!(valid().validate().is_ok());

        let mut config = valid();
        config.registry.service_name = "  ".to_string();
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let mut config = valid();
        config.registry.port = 0;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let mut config = valid();
        config.registry.health_check_path = "health".to_string();
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let mut config = valid();
        config.registration.max_retry_attempts = 0;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: RegistrationConfig = serde_json::from_str(
            r#"{
                "registry": { "service_name": "orders", "port": 9000, "token": "s3cret" },
                "registration": { "max_retry_attempts": 1 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.registry.service_name, "orders");
        assert_eq!(config.registry.health_check_path, "/health");
        assert_eq!(config.registration.max_retry_attempts, 1);
        assert_eq!(config.registration.retry_delay_seconds, 5);
        assert!(!format!("{:?}", config.registry).contains("s3cret"));
    }
}
