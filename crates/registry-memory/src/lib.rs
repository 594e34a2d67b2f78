//! In-memory implementation of the registry interface, with scripted failures for testing.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use roster_registry::{
    HealthCheckDefinition, HealthState, Registry, ServiceDescriptor, ServiceIdentity,
};
use tokio::sync::RwLock;
use tracing::debug;

/// Operations whose outcome can be scripted.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Operation {
    /// `Registry::register`
    Register,

    /// `Registry::deregister`
    Deregister,

    /// `Registry::discover`
    Discover,
}

/// How many upcoming calls of an operation should fail, and with what.
#[derive(Clone, Debug)]
struct FailurePlan {
    error: Error,
    /// `None` means every call fails until cleared.
    remaining: Option<usize>,
}

#[derive(Default)]
struct Counters {
    register: AtomicUsize,
    deregister: AtomicUsize,
    discover: AtomicUsize,
    liveness: AtomicUsize,
}

impl Counters {
    const fn for_operation(&self, operation: Operation) -> &AtomicUsize {
        match operation {
            Operation::Register => &self.register,
            Operation::Deregister => &self.deregister,
            Operation::Discover => &self.discover,
        }
    }
}

/// In-memory service catalog.
///
/// Cloning is cheap and clones share the same catalog, counters and scripted failures.
#[derive(Clone)]
pub struct MemoryRegistry {
    catalog: Arc<RwLock<HashMap<String, ServiceDescriptor>>>,
    counters: Arc<Counters>,
    failures: Arc<Mutex<HashMap<Operation, FailurePlan>>>,
    latency: Arc<Mutex<Option<Duration>>>,
    live: Arc<AtomicBool>,
}

impl MemoryRegistry {
    /// Create an empty, live registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            catalog: Arc::new(RwLock::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
            failures: Arc::new(Mutex::new(HashMap::new())),
            latency: Arc::new(Mutex::new(None)),
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Make the next `count` calls of `operation` fail with `error`.
    pub fn fail_next(&self, operation: Operation, count: usize, error: Error) {
        self.failures.lock().insert(
            operation,
            FailurePlan {
                error,
                remaining: Some(count),
            },
        );
    }

    /// Make every call of `operation` fail with `error` until [`Self::clear_failures`].
    pub fn fail_always(&self, operation: Operation, error: Error) {
        self.failures.lock().insert(
            operation,
            FailurePlan {
                error,
                remaining: None,
            },
        );
    }

    /// Remove all scripted failures.
    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    /// Delay every call by `latency` before it takes effect.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Set what `is_live` reports.
    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::SeqCst);
    }

    /// Override the check status of a registered instance.
    pub async fn set_health(&self, service_id: &str, health: HealthState) -> bool {
        self.catalog
            .write()
            .await
            .get_mut(service_id)
            .map(|descriptor| descriptor.health = health)
            .is_some()
    }

    /// Number of times `operation` has been invoked, failed calls included.
    #[must_use]
    pub fn calls(&self, operation: Operation) -> usize {
        self.counters
            .for_operation(operation)
            .load(Ordering::SeqCst)
    }

    /// Number of times `is_live` has been invoked.
    #[must_use]
    pub fn liveness_calls(&self) -> usize {
        self.counters.liveness.load(Ordering::SeqCst)
    }

    /// Whether an instance with this id is currently in the catalog.
    pub async fn contains(&self, service_id: &str) -> bool {
        self.catalog.read().await.contains_key(service_id)
    }

    /// Number of instances in the catalog.
    pub async fn len(&self) -> usize {
        self.catalog.read().await.len()
    }

    /// Whether the catalog is empty.
    pub async fn is_empty(&self) -> bool {
        self.catalog.read().await.is_empty()
    }

    async fn begin(&self, operation: Operation) -> Result<(), Error> {
        self.counters
            .for_operation(operation)
            .fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut failures = self.failures.lock();
        let Some(plan) = failures.get_mut(&operation) else {
            return Ok(());
        };

        let error = plan.error.clone();
        match plan.remaining.as_mut() {
            None => Err(error),
            Some(0) => {
                failures.remove(&operation);
                Ok(())
            }
            Some(remaining) => {
                *remaining -= 1;
                if *remaining == 0 {
                    failures.remove(&operation);
                }
                Err(error)
            }
        }
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    type Error = Error;

    async fn register(
        &self,
        identity: &ServiceIdentity,
        check: &HealthCheckDefinition,
    ) -> Result<(), Self::Error> {
        self.begin(Operation::Register).await?;

        if identity.service_name.is_empty() {
            return Err(Error::Rejected("service name is empty".to_string()));
        }

        debug!(
            "Registering {} ({}) with check {}",
            identity.service_id, identity.service_name, check.http
        );

        let mut catalog = self.catalog.write().await;
        let health = catalog
            .get(&identity.service_id)
            .map_or(HealthState::Passing, |existing| existing.health);

        catalog.insert(
            identity.service_id.clone(),
            ServiceDescriptor {
                service_id: identity.service_id.clone(),
                service_name: identity.service_name.clone(),
                address: identity.address.clone(),
                port: identity.port,
                tags: identity.tags.clone(),
                health,
            },
        );

        Ok(())
    }

    async fn deregister(&self, service_id: &str) -> Result<(), Self::Error> {
        self.begin(Operation::Deregister).await?;

        debug!("Deregistering {}", service_id);

        self.catalog
            .write()
            .await
            .remove(service_id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(service_id.to_string()))
    }

    async fn discover(
        &self,
        service_name: &str,
        passing_only: bool,
    ) -> Result<Vec<ServiceDescriptor>, Self::Error> {
        self.begin(Operation::Discover).await?;

        let mut found: Vec<ServiceDescriptor> = self
            .catalog
            .read()
            .await
            .values()
            .filter(|descriptor| descriptor.service_name == service_name)
            .filter(|descriptor| !passing_only || descriptor.health == HealthState::Passing)
            .cloned()
            .collect();

        found.sort_by(|a, b| a.service_id.cmp(&b.service_id));

        Ok(found)
    }

    async fn is_live(&self) -> bool {
        self.counters.liveness.fetch_add(1, Ordering::SeqCst);
        self.live.load(Ordering::SeqCst)
    }
}
