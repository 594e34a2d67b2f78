//! End-to-end lifecycle tests against the in-memory registry.

use std::sync::Arc;
use std::time::Duration;

use roster_bootable::{Bootable, Phase};
use roster_health::{HealthAggregator, VitalSigns, Vitals, VitalsError};
use roster_registration::{
    Error, HostFacts, LifecycleController, RegistrationConfig, RegistrationCoordinator,
    RegistrationOptions, RegistrationState, RegistryOptions,
};
use roster_registry_memory::{Error as MemoryError, MemoryRegistry, Operation};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const SERVICE_ID: &str = "orders-host1-42";

struct StaticVitals {
    healthy: bool,
}

impl Vitals for StaticVitals {
    fn collect(&self) -> Result<VitalSigns, VitalsError> {
        if self.healthy {
            Ok(VitalSigns {
                memory_usage_mb: 64,
                thread_count: Some(4),
                processor_time_ms: 10,
            })
        } else {
            Err(VitalsError::Other("vitals unavailable".to_string()))
        }
    }
}

fn config() -> RegistrationConfig {
    RegistrationConfig {
        registry: RegistryOptions {
            service_name: "orders".to_string(),
            port: 8080,
            tags: vec!["api".to_string()],
            ..RegistryOptions::default()
        },
        registration: RegistrationOptions::default(),
    }
}

fn build(
    registry: &MemoryRegistry,
    config: RegistrationConfig,
    healthy: bool,
) -> LifecycleController<MemoryRegistry, StaticVitals> {
    let host = HostFacts {
        hostname: "host1".to_string(),
        process_id: 42,
    };
    let coordinator =
        Arc::new(RegistrationCoordinator::new(Arc::new(registry.clone()), config, &host).unwrap());
    let health = Arc::new(HealthAggregator::with_vitals(
        StaticVitals { healthy },
        Some("0.1.0".to_string()),
    ));

    LifecycleController::new(coordinator, health)
}

fn controller(
    registry: &MemoryRegistry,
    config: RegistrationConfig,
) -> Arc<LifecycleController<MemoryRegistry, StaticVitals>> {
    Arc::new(build(registry, config, true))
}

#[tokio::test]
async fn test_start_registers_and_shutdown_deregisters() {
    let registry = MemoryRegistry::new();
    let controller = controller(&registry, config());
    assert_eq!(controller.phase(), Phase::NotStarted);
    assert_eq!(controller.bootable_name(), "orders");

    controller.start().await.unwrap();

    assert_eq!(controller.phase(), Phase::Running);
    assert!(registry.contains(SERVICE_ID).await);
    assert_eq!(registry.liveness_calls(), 1);
    assert_eq!(
        controller.coordinator().state(),
        RegistrationState::Registered
    );

    controller.shutdown().await.unwrap();

    assert_eq!(controller.phase(), Phase::Stopped);
    assert!(registry.is_empty().await);
    assert_eq!(registry.calls(Operation::Deregister), 1);

    tokio::time::timeout(Duration::from_secs(1), controller.wait())
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_registration_aborts_startup() {
    let registry = MemoryRegistry::new();
    registry.fail_always(
        Operation::Register,
        MemoryError::Unavailable("connection refused".to_string()),
    );
    let controller = controller(&registry, config());

    let result = controller.start().await;

    assert!(matches!(
        result,
        Err(Error::ExhaustedRegistration { attempts: 3, .. })
    ));
    assert_eq!(registry.calls(Operation::Register), 3);
    assert_eq!(controller.phase(), Phase::Stopped);

    // Nothing was registered, so shutdown has nothing to undo.
    controller.shutdown().await.unwrap();
    assert_eq!(registry.calls(Operation::Deregister), 0);
}

#[tokio::test]
async fn test_terminal_registration_aborts_startup() {
    let registry = MemoryRegistry::new();
    registry.fail_always(
        Operation::Register,
        MemoryError::Rejected("invalid check".to_string()),
    );
    let controller = controller(&registry, config());

    let result = controller.start().await;

    assert!(matches!(result, Err(Error::TerminalRegistry { .. })));
    assert_eq!(registry.calls(Operation::Register), 1);
}

#[tokio::test]
async fn test_auto_register_off() {
    let registry = MemoryRegistry::new();
    let mut config = config();
    config.registration.auto_register = false;
    config.registration.auto_deregister = false;
    let controller = controller(&registry, config);

    controller.start().await.unwrap();
    assert_eq!(controller.phase(), Phase::Running);
    assert_eq!(registry.calls(Operation::Register), 0);

    // Manual registration is still possible and does not move the phase.
    controller.register(&CancellationToken::new()).await.unwrap();
    assert!(registry.contains(SERVICE_ID).await);
    assert_eq!(controller.phase(), Phase::Running);

    controller.shutdown().await.unwrap();
    assert_eq!(registry.calls(Operation::Deregister), 0);
    assert!(registry.contains(SERVICE_ID).await);
}

#[tokio::test]
async fn test_disabled_registry_is_never_contacted() {
    let registry = MemoryRegistry::new();
    let mut config = config();
    config.registry.enabled = false;
    let controller = controller(&registry, config);

    controller.start().await.unwrap();
    controller.shutdown().await.unwrap();

    assert_eq!(controller.phase(), Phase::Stopped);
    assert_eq!(registry.calls(Operation::Register), 0);
    assert_eq!(registry.calls(Operation::Deregister), 0);
    assert_eq!(registry.liveness_calls(), 0);
}

#[tokio::test]
async fn test_deregistration_failure_does_not_fail_shutdown() {
    let registry = MemoryRegistry::new();
    let controller = controller(&registry, config());
    controller.start().await.unwrap();
    registry.fail_always(Operation::Deregister, MemoryError::Timeout);

    controller.shutdown().await.unwrap();

    assert_eq!(controller.phase(), Phase::Stopped);
    assert_eq!(registry.calls(Operation::Deregister), 1);
    assert_eq!(
        controller.coordinator().state(),
        RegistrationState::Deregistered
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_deregistration_is_bounded() {
    let registry = MemoryRegistry::new();
    let controller =
        build(&registry, config(), true).with_shutdown_timeout(Duration::from_secs(1));
    controller.start().await.unwrap();
    registry.set_latency(Some(Duration::from_secs(60)));

    let started = Instant::now();
    controller.shutdown().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(controller.phase(), Phase::Stopped);
    assert_eq!(
        controller.coordinator().state(),
        RegistrationState::Deregistered
    );
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let registry = MemoryRegistry::new();
    let controller = controller(&registry, config());

    controller.start().await.unwrap();

    assert!(matches!(controller.start().await, Err(Error::AlreadyStarted)));
    assert_eq!(registry.calls(Operation::Register), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_startup_retries_cancels_registration() {
    let registry = MemoryRegistry::new();
    registry.fail_always(Operation::Register, MemoryError::Timeout);
    let mut config = config();
    config.registration.max_retry_attempts = 10;
    config.registration.retry_delay_seconds = 30;
    let controller = controller(&registry, config);

    let starting = tokio::spawn({
        let controller = controller.clone();
        async move { controller.start().await }
    });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(controller.phase(), Phase::Starting);

    controller.shutdown().await.unwrap();

    assert!(matches!(starting.await.unwrap(), Err(Error::Cancelled)));
    assert_eq!(controller.phase(), Phase::Stopped);
    assert_eq!(registry.calls(Operation::Register), 1);
    assert_eq!(registry.calls(Operation::Deregister), 0);
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_unhealthy_vitals_do_not_block_startup() {
    let registry = MemoryRegistry::new();
    let controller = build(&registry, config(), false);

    controller.start().await.unwrap();

    assert_eq!(controller.phase(), Phase::Running);
    let snapshot = controller.health();
    assert!(!snapshot.healthy);
    assert!(snapshot.details.contains_key("error"));
}

#[tokio::test]
async fn test_manual_operations_leave_phase_alone() {
    let registry = MemoryRegistry::new();
    let controller = controller(&registry, config());
    let cancel = CancellationToken::new();

    let peers = controller.discover("orders", &cancel).await;
    assert!(peers.is_empty());
    assert_eq!(controller.phase(), Phase::NotStarted);

    controller.start().await.unwrap();

    let peers = controller.discover("orders", &cancel).await;
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].service_id, SERVICE_ID);
    assert_eq!(peers[0].tags, vec!["api".to_string()]);
    assert_eq!(controller.discover_all("orders", &cancel).await.len(), 1);

    let snapshot = controller.health();
    assert!(snapshot.healthy);
    assert_eq!(snapshot.version.as_deref(), Some("0.1.0"));

    let report = controller.deregister(&cancel).await;
    assert!(!report.is_failed());
    assert!(registry.is_empty().await);
    assert_eq!(controller.phase(), Phase::Running);

    // Already deregistered, so the stop hook has nothing left to do.
    controller.shutdown().await.unwrap();
    assert_eq!(registry.calls(Operation::Deregister), 1);
}
