//! Binds registration and health to process start and stop.

use crate::coordinator::{DeregistrationReport, RegistrationCoordinator};
use crate::{Error, Result};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use roster_bootable::{Bootable, Phase, PhaseCell};
use roster_health::{HealthAggregator, HealthSnapshot, ProcessVitals, Vitals};
use roster_registry::{Registry, ServiceDescriptor};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Default bound on how long shutdown waits for the registry to acknowledge deregistration.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Drives registration on process start and deregistration on process stop.
///
/// Startup registration failures are fatal and returned from `start`. Shutdown
/// always completes; deregistration failures are only logged.
pub struct LifecycleController<R, V = ProcessVitals>
where
    R: Registry,
    V: Vitals,
{
    coordinator: Arc<RegistrationCoordinator<R>>,
    health: Arc<HealthAggregator<V>>,
    phase: PhaseCell,
    shutdown_timeout: Duration,
    startup_token: CancellationToken,
    stopped: CancellationToken,
}

impl<R, V> LifecycleController<R, V>
where
    R: Registry,
    V: Vitals,
{
    /// Creates a controller in [`Phase::NotStarted`].
    pub fn new(
        coordinator: Arc<RegistrationCoordinator<R>>,
        health: Arc<HealthAggregator<V>>,
    ) -> Self {
        Self {
            coordinator,
            health,
            phase: PhaseCell::new(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            startup_token: CancellationToken::new(),
            stopped: CancellationToken::new(),
        }
    }

    /// Bound on how long shutdown waits for deregistration.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    /// The coordinator this controller drives.
    pub const fn coordinator(&self) -> &Arc<RegistrationCoordinator<R>> {
        &self.coordinator
    }

    /// Register outside the start hook.
    ///
    /// # Errors
    ///
    /// See [`RegistrationCoordinator::register`].
    pub async fn register(&self, cancel: &CancellationToken) -> Result<()> {
        info!(
            "Manually registering service {}",
            self.coordinator.identity().service_id
        );
        self.coordinator.register(cancel).await
    }

    /// Deregister outside the stop hook.
    pub async fn deregister(&self, cancel: &CancellationToken) -> DeregistrationReport {
        info!(
            "Manually deregistering service {}",
            self.coordinator.identity().service_id
        );
        self.coordinator.deregister(cancel).await
    }

    /// Current health of this process.
    pub fn health(&self) -> HealthSnapshot {
        debug!(
            "Getting health status for service {}",
            self.coordinator.identity().service_id
        );
        self.health.snapshot()
    }

    /// Healthy instances of `service_name`.
    pub async fn discover(
        &self,
        service_name: &str,
        cancel: &CancellationToken,
    ) -> Vec<ServiceDescriptor> {
        self.coordinator.discover(service_name, cancel).await
    }

    /// All instances of `service_name`.
    pub async fn discover_all(
        &self,
        service_name: &str,
        cancel: &CancellationToken,
    ) -> Vec<ServiceDescriptor> {
        self.coordinator.discover_all(service_name, cancel).await
    }

    fn auto_register(&self) -> bool {
        let config = self.coordinator.config();
        config.registration.auto_register && config.registry.enabled
    }

    fn auto_deregister(&self) -> bool {
        let config = self.coordinator.config();
        config.registration.auto_deregister && config.registry.enabled
    }

    async fn deregister_within_timeout(&self) -> DeregistrationReport {
        let deadline = CancellationToken::new();
        let timer = tokio::spawn({
            let deadline = deadline.clone();
            let timeout = self.shutdown_timeout;
            async move {
                tokio::time::sleep(timeout).await;
                deadline.cancel();
            }
        });

        let report = self.coordinator.deregister(&deadline).await;
        timer.abort();

        report
    }
}

#[async_trait]
impl<R, V> Bootable for LifecycleController<R, V>
where
    R: Registry,
    V: Vitals,
{
    type Error = Error;

    fn bootable_name(&self) -> &str {
        &self.coordinator.identity().service_name
    }

    async fn start(&self) -> Result<()> {
        if !self.phase.advance(Phase::NotStarted, Phase::Starting) {
            return Err(Error::AlreadyStarted);
        }

        let identity = self.coordinator.identity();
        info!("Starting lifecycle for {}", identity.service_name);

        if self.auto_register() {
            info!("Auto-registering service {}", identity.service_id);

            if let Err(e) = self.coordinator.register(&self.startup_token).await {
                error!("Failed to start lifecycle for {}: {}", identity.service_name, e);

                // A concurrent shutdown owns the remaining transitions.
                if self.phase.advance(Phase::Starting, Phase::Stopped) {
                    self.stopped.cancel();
                }
                return Err(e);
            }
        }

        let snapshot = self.health.snapshot();
        info!(
            "Initial health check: {}",
            if snapshot.healthy {
                "Healthy"
            } else {
                "Unhealthy"
            }
        );

        if self.coordinator.config().registry.enabled {
            let live = self.coordinator.registry_is_live(&self.startup_token).await;
            info!("Registry backend live: {}", live);
        }

        if !self.phase.advance(Phase::Starting, Phase::Running) {
            info!("Shutdown requested while starting {}", identity.service_name);
            return Err(Error::Cancelled);
        }

        info!("Lifecycle for {} started", identity.service_name);

        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.startup_token.cancel();

        let Some(previous) = self.phase.advance_to(Phase::Stopping) else {
            debug!("Lifecycle already stopping or stopped");
            return Ok(());
        };

        let identity = self.coordinator.identity();
        info!("Stopping lifecycle for {}", identity.service_name);

        if previous != Phase::NotStarted && self.auto_deregister() {
            info!("Auto-deregistering service {}", identity.service_id);

            match self.deregister_within_timeout().await {
                DeregistrationReport::Deregistered => {}
                DeregistrationReport::Skipped => {
                    debug!("Nothing to deregister for {}", identity.service_id);
                }
                DeregistrationReport::Failed(e) => {
                    error!("Error during lifecycle shutdown: {}", e);
                }
            }
        }

        self.phase.advance_to(Phase::Stopped);
        self.stopped.cancel();
        info!("Lifecycle for {} stopped", identity.service_name);

        Ok(())
    }

    async fn wait(&self) {
        self.stopped.cancelled().await;
    }
}
