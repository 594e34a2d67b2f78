use crate::snapshot::HealthSnapshot;
use crate::vitals::{ProcessVitals, Vitals};

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, error};

const HEALTHY_MESSAGE: &str = "Service is healthy";

/// Collects process-local vitals into [`HealthSnapshot`]s.
///
/// Snapshots are recomputed on every call and never cached.
pub struct HealthAggregator<V = ProcessVitals>
where
    V: Vitals,
{
    started: Instant,
    started_at: DateTime<Utc>,
    version: Option<String>,
    vitals: V,
}

impl HealthAggregator<ProcessVitals> {
    /// Create an aggregator reading the current process.
    #[must_use]
    pub fn new(version: Option<String>) -> Self {
        Self::with_vitals(ProcessVitals::new(), version)
    }
}

impl<V> HealthAggregator<V>
where
    V: Vitals,
{
    /// Create an aggregator over a custom vitals source.
    pub fn with_vitals(vitals: V, version: Option<String>) -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            version,
            vitals,
        }
    }

    /// When the aggregator was created.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Time since the aggregator was created.
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Version reported in every snapshot.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Take a snapshot. Never fails: collection faults yield an unhealthy snapshot.
    pub fn snapshot(&self) -> HealthSnapshot {
        let mut details = BTreeMap::new();

        let (healthy, message) = match self.vitals.collect() {
            Ok(signs) => {
                details.insert(
                    "memory_usage_mb".to_string(),
                    Value::from(signs.memory_usage_mb),
                );
                if let Some(threads) = signs.thread_count {
                    details.insert("thread_count".to_string(), Value::from(threads));
                }
                details.insert(
                    "processor_time".to_string(),
                    Value::from(signs.processor_time_ms),
                );

                debug!("Health check completed successfully");
                (true, HEALTHY_MESSAGE.to_string())
            }
            Err(e) => {
                error!("Health check failed: {}", e);
                details.insert("error".to_string(), Value::from(e.to_string()));
                (false, format!("Health check failed: {e}"))
            }
        };

        HealthSnapshot {
            healthy,
            message,
            timestamp_utc: Utc::now(),
            uptime: self.uptime(),
            version: self.version.clone(),
            details,
        }
    }

    /// Just the verdict of a fresh snapshot.
    pub fn is_healthy(&self) -> bool {
        self.snapshot().healthy
    }
}
