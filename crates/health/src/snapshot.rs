use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Point-in-time health of this process.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    /// Overall verdict.
    #[serde(rename = "isHealthy")]
    pub healthy: bool,

    /// Human readable summary.
    pub message: String,

    /// When the snapshot was taken.
    pub timestamp_utc: DateTime<Utc>,

    /// Time since the aggregator was created.
    #[serde(rename = "uptimeDuration", serialize_with = "serialize_uptime")]
    pub uptime: Duration,

    /// Version of the running software, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Individual vitals, or `error` when collection failed.
    pub details: BTreeMap<String, Value>,
}

fn serialize_uptime<S>(uptime: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_uptime(*uptime))
}

/// Formats a duration as `[d.]hh:mm:ss.fff`.
#[must_use]
pub fn format_uptime(uptime: Duration) -> String {
    let total_secs = uptime.as_secs();
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;
    let millis = uptime.subsec_millis();

    if days > 0 {
        format!("{days}.{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
    }
}
