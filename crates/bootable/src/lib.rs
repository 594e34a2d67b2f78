//! Abstract interface for bootable services and the lifecycle phase they move through.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::error::Error;
use std::fmt::{self, Debug, Display};
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;

/// Marker trait for errors returned by bootable services.
pub trait BootableError: Debug + Error + Send + Sync + 'static {}

/// Trait for bootable services.
#[async_trait]
pub trait Bootable
where
    Self: Send + Sync + 'static,
{
    /// The error type returned when starting or stopping fails.
    type Error: BootableError;

    /// Get the name of the bootable service.
    fn bootable_name(&self) -> &str;

    /// Start the bootable service.
    async fn start(&self) -> Result<(), Self::Error>;

    /// Shutdown the bootable service.
    async fn shutdown(&self) -> Result<(), Self::Error>;

    /// Wait for the bootable service to exit.
    async fn wait(&self);
}

/// Phase of a bootable service. Phases only ever move forward.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u8)]
pub enum Phase {
    /// Constructed, `start` not yet called.
    NotStarted = 0,

    /// `start` is in progress.
    Starting = 1,

    /// Started successfully.
    Running = 2,

    /// `shutdown` is in progress.
    Stopping = 3,

    /// Terminal.
    Stopped = 4,
}

impl Phase {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NotStarted,
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Shared, lock-free holder for a [`Phase`] that refuses backwards transitions.
#[derive(Debug)]
pub struct PhaseCell(AtomicU8);

impl PhaseCell {
    /// Create a cell in [`Phase::NotStarted`].
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU8::new(Phase::NotStarted as u8))
    }

    /// Current phase.
    #[must_use]
    pub fn get(&self) -> Phase {
        Phase::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move from exactly `from` to `to`.
    ///
    /// Returns `false` (and leaves the phase untouched) if the current phase is
    /// not `from` or if `to` would not be a forward move.
    pub fn advance(&self, from: Phase, to: Phase) -> bool {
        if to <= from {
            return false;
        }

        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Move forward to `to` from whatever phase is current, provided it lies before `to`.
    ///
    /// Returns the phase that was replaced, or `None` if the cell was already at or past `to`.
    pub fn advance_to(&self, to: Phase) -> Option<Phase> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < to as u8).then_some(to as u8)
            })
            .ok()
            .map(Phase::from_u8)
    }
}

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_only_moves_forward() {
        let cell = PhaseCell::new();
        assert_eq!(cell.get(), Phase::NotStarted);

        assert!(cell.advance(Phase::NotStarted, Phase::Starting));
        assert!(!cell.advance(Phase::NotStarted, Phase::Starting));
        assert!(!cell.advance(Phase::Starting, Phase::NotStarted));
        assert_eq!(cell.get(), Phase::Starting);

        assert!(cell.advance(Phase::Starting, Phase::Running));
        assert_eq!(cell.get(), Phase::Running);
    }

    #[test]
    fn test_advance_to_skips_phases_but_never_rewinds() {
        let cell = PhaseCell::new();

        assert_eq!(cell.advance_to(Phase::Stopped), Some(Phase::NotStarted));
        assert!(cell.get().is_terminal());

        assert_eq!(cell.advance_to(Phase::Stopping), None);
        assert_eq!(cell.get(), Phase::Stopped);
    }

    #[tokio::test]
    async fn test_concurrent_advance_has_single_winner() {
        let cell = std::sync::Arc::new(PhaseCell::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cell = cell.clone();
            handles.push(tokio::spawn(async move {
                cell.advance(Phase::NotStarted, Phase::Starting)
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
    }
}
