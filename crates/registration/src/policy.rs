//! Retry decisions for registration, expressed as data.

use crate::config::RegistrationOptions;

use std::time::Duration;

/// What happened on one registration attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AttemptOutcome {
    /// The registry accepted the registration.
    Success,

    /// Retryable failure.
    TransientFailure(String),

    /// Non-retryable failure.
    TerminalFailure(String),
}

/// One registration attempt. Attempts are numbered from 1.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegistrationAttempt {
    /// Attempt number.
    pub attempt: u32,

    /// Result of the attempt.
    pub outcome: AttemptOutcome,
}

/// What the coordinator should do after an attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RetryDecision {
    /// Registered, stop.
    Done,

    /// Wait, then try again with the next attempt number.
    RetryAfter(Duration),

    /// Attempt budget used up.
    Exhausted {
        /// Cause of the final failure.
        last_cause: String,
    },

    /// Stop without retrying.
    Abort {
        /// Why the registry refused.
        cause: String,
    },
}

/// One-time pause before `attempt`. Only the first attempt ever waits.
#[must_use]
pub const fn pre_registration_delay(attempt: u32, options: &RegistrationOptions) -> Option<Duration> {
    if attempt == 1 && options.registration_delay_seconds > 0 {
        Some(options.registration_delay())
    } else {
        None
    }
}

/// Fixed wait after failed `attempt`, or `None` once the budget is spent.
#[must_use]
pub const fn next_delay(attempt: u32, options: &RegistrationOptions) -> Option<Duration> {
    if attempt < options.max_retry_attempts {
        Some(options.retry_delay())
    } else {
        None
    }
}

/// Decide what follows `attempt`.
#[must_use]
pub fn decide(attempt: &RegistrationAttempt, options: &RegistrationOptions) -> RetryDecision {
    match &attempt.outcome {
        AttemptOutcome::Success => RetryDecision::Done,
        AttemptOutcome::TerminalFailure(cause) => RetryDecision::Abort {
            cause: cause.clone(),
        },
        AttemptOutcome::TransientFailure(cause) => match next_delay(attempt.attempt, options) {
            Some(delay) => RetryDecision::RetryAfter(delay),
            None => RetryDecision::Exhausted {
                last_cause: cause.clone(),
            },
        },
    }
}
