//! Resolution of this instance's identity and health check.

use crate::config::RegistryOptions;
use crate::{Error, Result};

use std::time::Duration;

use roster_registry::{HealthCheckDefinition, ServiceIdentity};

/// Facts about the host and process, supplied by the caller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HostFacts {
    /// Machine host name.
    pub hostname: String,

    /// Operating system process id.
    pub process_id: u32,
}

/// Derive the identity this instance registers under.
///
/// An explicit, non-empty `service_id` is used verbatim. Otherwise the id is
/// `{service_name}-{hostname}-{process_id}`.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the service name is empty.
pub fn resolve_identity(options: &RegistryOptions, host: &HostFacts) -> Result<ServiceIdentity> {
    if options.service_name.trim().is_empty() {
        return Err(Error::Configuration(
            "service name is required for registration".to_string(),
        ));
    }

    let service_id = match options.service_id.as_deref() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => format!(
            "{}-{}-{}",
            options.service_name, host.hostname, host.process_id
        ),
    };

    Ok(ServiceIdentity {
        service_name: options.service_name.clone(),
        service_id,
        tags: options.tags.clone(),
        address: options.service_address.clone(),
        port: options.port,
    })
}

/// Build the HTTP check the registry will poll for `identity`.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the resulting URL is not valid.
pub fn health_check_for(
    identity: &ServiceIdentity,
    options: &RegistryOptions,
) -> Result<HealthCheckDefinition> {
    let http = format!(
        "http://{}:{}{}",
        identity.address, identity.port, options.health_check_path
    );

    url::Url::parse(&http)
        .map_err(|e| Error::Configuration(format!("invalid health check url '{http}': {e}")))?;

    Ok(HealthCheckDefinition {
        http,
        interval: Duration::from_secs(options.health_check_interval_seconds),
        timeout: Duration::from_secs(options.health_check_timeout_seconds),
        deregister_critical_service_after: Duration::from_secs(options.deregister_after_seconds),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> HostFacts {
        HostFacts {
            hostname: "host1".to_string(),
            process_id: 42,
        }
    }

    fn options(service_id: Option<&str>) -> RegistryOptions {
        RegistryOptions {
            service_name: "orders".to_string(),
            service_id: service_id.map(ToString::to_string),
            tags: vec!["api".to_string(), "v2".to_string()],
            port: 8080,
            service_address: "10.1.2.3".to_string(),
            ..RegistryOptions::default()
        }
    }

    #[test]
    fn test_synthesized_id() {
        let identity = resolve_identity(&options(None), &host()).unwrap();

        assert_eq!(identity.service_id, "orders-host1-42");
        assert_eq!(identity.service_name, "orders");
        assert_eq!(identity.tags, vec!["api".to_string(), "v2".to_string()]);
        assert_eq!(identity.address, "10.1.2.3");
        assert_eq!(identity.port, 8080);
    }

    #[test]
    fn test_explicit_id_is_verbatim() {
        let identity = resolve_identity(&options(Some("orders-7")), &host()).unwrap();
        assert_eq!(identity.service_id, "orders-7");

        let identity = resolve_identity(&options(Some("")), &host()).unwrap();
        assert_eq!(identity.service_id, "orders-host1-42");
    }

    #[test]
    fn test_empty_name_is_configuration_error() {
        let mut options = options(None);
        options.service_name = String::new();

        assert!(matches!(
            resolve_identity(&options, &host()),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_health_check() {
        let options = options(None);
        let identity = resolve_identity(&options, &host()).unwrap();

        let check = health_check_for(&identity, &options).unwrap();

        assert_eq!(check.http, "http://10.1.2.3:8080/health");
        assert_eq!(check.interval, Duration::from_secs(10));
        assert_eq!(check.timeout, Duration::from_secs(5));
        assert_eq!(
            check.deregister_critical_service_after,
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_health_check_rejects_bad_address() {
        let mut options = options(None);
        options.service_address = "bad host".to_string();
        let identity = resolve_identity(&options, &host()).unwrap();

        assert!(matches!(
            health_check_for(&identity, &options),
            Err(Error::Configuration(_))
        ));
    }
}
