//! Abstract interface for registering with, and discovering peers from, a service directory.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::error::Error;
use std::fmt::{self, Debug, Display};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity under which a single process instance is known to the directory.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    /// Logical service name shared by all instances.
    pub service_name: String,

    /// Unique id of this instance.
    pub service_id: String,

    /// Tags, in registration order.
    pub tags: Vec<String>,

    /// Host the instance is reachable on.
    pub address: String,

    /// Port the instance is reachable on.
    pub port: u16,
}

/// The HTTP health check the directory should run against a registered instance.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckDefinition {
    /// URL polled by the directory.
    pub http: String,

    /// Time between polls.
    pub interval: Duration,

    /// Per-poll timeout.
    pub timeout: Duration,

    /// How long an instance may stay critical before the directory drops it.
    pub deregister_critical_service_after: Duration,
}

/// Health of a discovered instance as reported by the directory.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum HealthState {
    /// All checks passing.
    Passing,

    /// At least one check warning, none critical.
    Warning,

    /// At least one check critical.
    Critical,
}

/// A discovered instance of some service.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Instance id.
    pub service_id: String,

    /// Service name.
    pub service_name: String,

    /// Instance address.
    pub address: String,

    /// Instance port.
    pub port: u16,

    /// Instance tags.
    pub tags: Vec<String>,

    /// Aggregate check status.
    pub health: HealthState,
}

/// The kind of registry error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RegistryErrorKind {
    /// Network failure, timeout or server-side error. Worth retrying.
    Transient,

    /// Malformed request, authorization failure or similar. Retrying will not help.
    Terminal,
}

impl Display for RegistryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Marker trait for `Registry` errors
pub trait RegistryError: Debug + Error + Send + Sync + 'static {
    /// Returns the kind of this error
    fn kind(&self) -> RegistryErrorKind;

    /// Shorthand for `self.kind() == RegistryErrorKind::Transient`.
    fn is_transient(&self) -> bool {
        self.kind() == RegistryErrorKind::Transient
    }
}

/// Abstract interface to a service directory backend.
///
/// Implementations are not expected to observe cancellation themselves: callers
/// race every future against their own cancellation signal and drop it when
/// the signal fires.
#[async_trait]
pub trait Registry
where
    Self: Send + Sync + 'static,
{
    /// The error type for this backend.
    type Error: RegistryError;

    /// Register (or re-register) an instance together with its health check.
    async fn register(
        &self,
        identity: &ServiceIdentity,
        check: &HealthCheckDefinition,
    ) -> Result<(), Self::Error>;

    /// Remove an instance by id.
    async fn deregister(&self, service_id: &str) -> Result<(), Self::Error>;

    /// List instances of a service, optionally only those whose checks pass.
    async fn discover(
        &self,
        service_name: &str,
        passing_only: bool,
    ) -> Result<Vec<ServiceDescriptor>, Self::Error>;

    /// Whether the backend itself is reachable and has a leader.
    async fn is_live(&self) -> bool;
}
