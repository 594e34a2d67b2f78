//! Process-local vital signs.

use crate::VitalsError;

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// A single reading of process vitals.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VitalSigns {
    /// Resident memory in megabytes.
    pub memory_usage_mb: u64,

    /// Number of threads, where the platform reports it.
    pub thread_count: Option<usize>,

    /// Total CPU time consumed so far, in milliseconds.
    pub processor_time_ms: u64,
}

/// Source of process vitals.
pub trait Vitals: Send + Sync + 'static {
    /// Take a reading.
    ///
    /// # Errors
    ///
    /// Returns an error if any vital could not be gathered.
    fn collect(&self) -> Result<VitalSigns, VitalsError>;
}

/// Reads vitals of the current process from the operating system.
pub struct ProcessVitals {
    pid: Result<Pid, &'static str>,
    system: Mutex<System>,
}

impl ProcessVitals {
    /// Create a reader for the current process.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pid: sysinfo::get_current_pid(),
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for ProcessVitals {
    fn default() -> Self {
        Self::new()
    }
}

impl Vitals for ProcessVitals {
    fn collect(&self) -> Result<VitalSigns, VitalsError> {
        let pid = self.pid.map_err(VitalsError::ProcessUnknown)?;

        let mut system = self.system.lock();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::everything(),
        );

        let process = system
            .process(pid)
            .ok_or_else(|| VitalsError::ProcessMissing(pid.as_u32()))?;

        Ok(VitalSigns {
            memory_usage_mb: process.memory() / BYTES_PER_MB,
            thread_count: process.tasks().map(|tasks| tasks.len().max(1)),
            processor_time_ms: process.accumulated_cpu_time(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_current_process() {
        let vitals = ProcessVitals::new();

        // Two readings in a row must both succeed.
        vitals.collect().unwrap();
        let signs = vitals.collect().unwrap();

        if let Some(threads) = signs.thread_count {
            assert!(threads >= 1);
        }
    }
}
