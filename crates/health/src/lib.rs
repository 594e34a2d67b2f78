//! Process-local health aggregation and the HTTP surface that exposes it.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod aggregator;
mod error;
mod router;
mod snapshot;
mod vitals;

pub use aggregator::HealthAggregator;
pub use error::VitalsError;
pub use router::health_router;
pub use snapshot::{HealthSnapshot, format_uptime};
pub use vitals::{ProcessVitals, VitalSigns, Vitals};
