//! Registration lifecycle for a service instance: identity, retry policy,
//! the registration state machine, and the start/stop controller around it.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

pub mod config;
pub mod coordinator;
mod error;
pub mod identity;
pub mod lifecycle;
pub mod policy;

pub use config::{RegistrationConfig, RegistrationOptions, RegistryOptions};
pub use coordinator::{DeregistrationReport, RegistrationCoordinator, RegistrationState};
pub use error::{Error, Result};
pub use identity::{HostFacts, health_check_for, resolve_identity};
pub use lifecycle::LifecycleController;
pub use policy::{AttemptOutcome, RegistrationAttempt, RetryDecision};
