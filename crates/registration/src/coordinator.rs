//! Registration state machine.

use crate::config::RegistrationConfig;
use crate::identity::{HostFacts, health_check_for, resolve_identity};
use crate::policy::{self, AttemptOutcome, RegistrationAttempt, RetryDecision};
use crate::{Error, Result};

use std::fmt::{self, Display};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use roster_registry::{
    HealthCheckDefinition, Registry, RegistryError, ServiceDescriptor, ServiceIdentity,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Where the coordinator is in the registration lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RegistrationState {
    /// Nothing attempted yet, or cancelled before the first attempt.
    Idle,

    /// Waiting out the pre-registration delay.
    Delaying,

    /// A registration call is in flight, or a retry is pending.
    Attempting,

    /// The registry accepted the registration.
    Registered,

    /// A deregistration call is in flight.
    Deregistering,

    /// Deregistration finished, successfully or not.
    Deregistered,

    /// Registration gave up.
    Failed,
}

impl Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Result of a deregistration. Failures are reported here, never raised.
#[derive(Debug)]
pub enum DeregistrationReport {
    /// Nothing to do: disabled, or not registered.
    Skipped,

    /// The registry removed the instance.
    Deregistered,

    /// The registry call failed or was cancelled.
    Failed(Error),
}

impl DeregistrationReport {
    /// Whether the call failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Drives registration, deregistration and discovery against a [`Registry`].
///
/// `register` and `deregister` are serialized. A `deregister` cancels the
/// registration in progress and every `register` already queued behind it.
/// Discovery runs independently of both.
pub struct RegistrationCoordinator<R>
where
    R: Registry,
{
    registry: Arc<R>,
    config: RegistrationConfig,
    identity: ServiceIdentity,
    check: HealthCheckDefinition,
    state: RwLock<RegistrationState>,
    transition: tokio::sync::Mutex<()>,
    in_flight: Mutex<Option<CancellationToken>>,
    deregistrations: AtomicU64,
    discovery_failures: AtomicU64,
    last_discovery_failure: Mutex<Option<String>>,
}

impl<R> RegistrationCoordinator<R>
where
    R: Registry,
{
    /// Validate `config` and resolve this instance's identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the configuration is invalid.
    pub fn new(registry: Arc<R>, config: RegistrationConfig, host: &HostFacts) -> Result<Self> {
        config.validate()?;

        let identity = resolve_identity(&config.registry, host)?;
        let check = health_check_for(&identity, &config.registry)?;

        debug!(
            "Created service registration: {} at {}:{}",
            identity.service_id, identity.address, identity.port
        );

        Ok(Self {
            registry,
            config,
            identity,
            check,
            state: RwLock::new(RegistrationState::Idle),
            transition: tokio::sync::Mutex::new(()),
            in_flight: Mutex::new(None),
            deregistrations: AtomicU64::new(0),
            discovery_failures: AtomicU64::new(0),
            last_discovery_failure: Mutex::new(None),
        })
    }

    /// The identity registered under.
    pub const fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    /// The health check sent with every registration.
    pub const fn health_check(&self) -> &HealthCheckDefinition {
        &self.check
    }

    /// The configuration snapshot.
    pub const fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> RegistrationState {
        *self.state.read()
    }

    /// Number of discovery calls that degraded to an empty result.
    pub fn discovery_failures(&self) -> u64 {
        self.discovery_failures.load(Ordering::Relaxed)
    }

    /// Cause of the most recent discovery failure.
    pub fn last_discovery_failure(&self) -> Option<String> {
        self.last_discovery_failure.lock().clone()
    }

    fn set_state(&self, state: RegistrationState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!(
                "Registration state for {}: {} -> {}",
                self.identity.service_id, previous, state
            );
        }
    }

    /// Register with the registry, retrying transient failures per the configured policy.
    ///
    /// A no-op when registration is disabled.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if `cancel` fires before registration completes
    /// - [`Error::TerminalRegistry`] if the registry rejects the registration
    /// - [`Error::ExhaustedRegistration`] if every attempt failed transiently
    pub async fn register(&self, cancel: &CancellationToken) -> Result<()> {
        if !self.config.registry.enabled {
            info!("Service registration is disabled");
            return Ok(());
        }

        let generation = self.deregistrations.load(Ordering::SeqCst);
        let token = cancel.child_token();

        let _transition = tokio::select! {
            guard = self.transition.lock() => guard,
            () = token.cancelled() => return Err(Error::Cancelled),
        };

        {
            let mut in_flight = self.in_flight.lock();
            if self.deregistrations.load(Ordering::SeqCst) != generation {
                info!(
                    "Registration of {} superseded by deregistration",
                    self.identity.service_id
                );
                return Err(Error::Cancelled);
            }
            *in_flight = Some(token.clone());
        }

        let _in_flight = InFlightGuard { coordinator: self };

        self.run_registration(&token).await
    }

    async fn run_registration(&self, token: &CancellationToken) -> Result<()> {
        let options = &self.config.registration;
        let max_attempts = options.max_retry_attempts;
        let mut attempt = 1;

        loop {
            if let Some(delay) = policy::pre_registration_delay(attempt, options) {
                self.set_state(RegistrationState::Delaying);
                info!("Waiting {:?} before registration", delay);

                if !sleep_or_cancel(delay, token).await {
                    self.set_state(RegistrationState::Idle);
                    info!(
                        "Registration of {} cancelled during initial delay",
                        self.identity.service_id
                    );
                    return Err(Error::Cancelled);
                }
            }

            if token.is_cancelled() {
                self.set_state(if attempt == 1 {
                    RegistrationState::Idle
                } else {
                    RegistrationState::Failed
                });
                return Err(Error::Cancelled);
            }

            self.set_state(RegistrationState::Attempting);
            info!(
                "Registering service {} (attempt {}/{})",
                self.identity.service_id, attempt, max_attempts
            );

            let outcome = tokio::select! {
                biased;
                result = self.registry.register(&self.identity, &self.check) => match result {
                    Ok(()) => AttemptOutcome::Success,
                    Err(e) if e.is_transient() => AttemptOutcome::TransientFailure(e.to_string()),
                    Err(e) => AttemptOutcome::TerminalFailure(e.to_string()),
                },
                () = token.cancelled() => {
                    self.set_state(RegistrationState::Failed);
                    warn!(
                        "Registration of {} cancelled while the request was in flight",
                        self.identity.service_id
                    );
                    return Err(Error::Cancelled);
                }
            };

            let record = RegistrationAttempt { attempt, outcome };

            match policy::decide(&record, options) {
                RetryDecision::Done => {
                    self.set_state(RegistrationState::Registered);
                    info!(
                        "Service {} registered successfully",
                        self.identity.service_id
                    );
                    return Ok(());
                }
                RetryDecision::RetryAfter(delay) => {
                    if let AttemptOutcome::TransientFailure(cause) = &record.outcome {
                        warn!(
                            "Failed to register service {} (attempt {}/{}): {}",
                            self.identity.service_id, attempt, max_attempts, cause
                        );
                    }

                    if !sleep_or_cancel(delay, token).await {
                        self.set_state(RegistrationState::Failed);
                        info!(
                            "Registration of {} cancelled while waiting to retry",
                            self.identity.service_id
                        );
                        return Err(Error::Cancelled);
                    }

                    attempt += 1;
                }
                RetryDecision::Exhausted { last_cause } => {
                    self.set_state(RegistrationState::Failed);
                    error!(
                        "Failed to register service {} after {} attempts: {}",
                        self.identity.service_id, attempt, last_cause
                    );
                    return Err(Error::ExhaustedRegistration {
                        attempts: attempt,
                        last_cause,
                    });
                }
                RetryDecision::Abort { cause } => {
                    self.set_state(RegistrationState::Failed);
                    error!(
                        "Registry rejected service {}: {}",
                        self.identity.service_id, cause
                    );
                    return Err(Error::TerminalRegistry { attempt, cause });
                }
            }
        }
    }

    /// Remove the registration. Called once, never retried.
    ///
    /// Cancels an in-progress `register`, and any queued behind it, first. Only a
    /// registered instance is deregistered; in every other state this is a no-op.
    /// If `cancel` fires while waiting for a running transition the report is
    /// `Failed(Error::Cancelled)` and the state is left alone.
    pub async fn deregister(&self, cancel: &CancellationToken) -> DeregistrationReport {
        if !self.config.registry.enabled {
            info!("Service deregistration is disabled");
            return DeregistrationReport::Skipped;
        }

        self.deregistrations.fetch_add(1, Ordering::SeqCst);

        let in_flight = self.in_flight.lock().clone();
        if let Some(token) = in_flight {
            debug!(
                "Cancelling in-progress registration of {}",
                self.identity.service_id
            );
            token.cancel();
        }

        let _transition = tokio::select! {
            guard = self.transition.lock() => guard,
            () = cancel.cancelled() => {
                error!(
                    "Deregistration of {} cancelled while waiting for another transition",
                    self.identity.service_id
                );
                return DeregistrationReport::Failed(Error::Cancelled);
            }
        };

        if self.state() != RegistrationState::Registered {
            debug!(
                "Service {} is not registered ({}), nothing to deregister",
                self.identity.service_id,
                self.state()
            );
            return DeregistrationReport::Skipped;
        }

        self.set_state(RegistrationState::Deregistering);

        let result = tokio::select! {
            biased;
            result = self.registry.deregister(&self.identity.service_id) => {
                result.map_err(|e| Error::Deregistration(e.to_string()))
            }
            () = cancel.cancelled() => Err(Error::Cancelled),
        };

        self.set_state(RegistrationState::Deregistered);

        match result {
            Ok(()) => {
                info!(
                    "Service {} deregistered successfully",
                    self.identity.service_id
                );
                DeregistrationReport::Deregistered
            }
            Err(e) => {
                error!(
                    "Failed to deregister service {}: {}",
                    self.identity.service_id, e
                );
                DeregistrationReport::Failed(e)
            }
        }
    }

    /// Healthy instances of `service_name`. Failures degrade to an empty list.
    pub async fn discover(
        &self,
        service_name: &str,
        cancel: &CancellationToken,
    ) -> Vec<ServiceDescriptor> {
        self.discover_filtered(service_name, true, cancel).await
    }

    /// All instances of `service_name`, whatever their health. Failures degrade to an empty list.
    pub async fn discover_all(
        &self,
        service_name: &str,
        cancel: &CancellationToken,
    ) -> Vec<ServiceDescriptor> {
        self.discover_filtered(service_name, false, cancel).await
    }

    async fn discover_filtered(
        &self,
        service_name: &str,
        passing_only: bool,
        cancel: &CancellationToken,
    ) -> Vec<ServiceDescriptor> {
        debug!(
            "Discovering {} instances of service {}",
            if passing_only { "healthy" } else { "all" },
            service_name
        );

        let result = tokio::select! {
            biased;
            result = self.registry.discover(service_name, passing_only) => {
                result.map_err(|e| e.to_string())
            }
            () = cancel.cancelled() => Err("discovery cancelled".to_string()),
        };

        match result {
            Ok(services) => {
                debug!(
                    "Found {} instances of service {}",
                    services.len(),
                    service_name
                );
                services
            }
            Err(cause) => {
                error!("Failed to discover services for {}: {}", service_name, cause);
                self.discovery_failures.fetch_add(1, Ordering::Relaxed);
                *self.last_discovery_failure.lock() = Some(cause);
                Vec::new()
            }
        }
    }

    /// Whether the registry backend is reachable. `false` if `cancel` fires first.
    pub async fn registry_is_live(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            live = self.registry.is_live() => live,
            () = cancel.cancelled() => false,
        }
    }
}

/// Releases the in-flight token when a registration ends, including when its
/// future is dropped mid-flight. A registration dropped while delaying goes back
/// to `Idle`; one dropped while attempting is `Failed`.
struct InFlightGuard<'a, R>
where
    R: Registry,
{
    coordinator: &'a RegistrationCoordinator<R>,
}

impl<R> Drop for InFlightGuard<'_, R>
where
    R: Registry,
{
    fn drop(&mut self) {
        self.coordinator.in_flight.lock().take();

        let settled = match self.coordinator.state() {
            RegistrationState::Delaying => RegistrationState::Idle,
            RegistrationState::Attempting => RegistrationState::Failed,
            _ => return,
        };

        warn!(
            "Registration of {} abandoned before completing",
            self.coordinator.identity.service_id
        );
        self.coordinator.set_state(settled);
    }
}

async fn sleep_or_cancel(duration: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        () = tokio::time::sleep(duration) => true,
        () = token.cancelled() => false,
    }
}
