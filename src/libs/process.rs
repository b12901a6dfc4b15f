//! Process table lookups with a bounded cache.
//!
//! Refreshing the process list is expensive on Windows, and liveness checks
//! tend to come in bursts (status polling, stop-then-verify). The snapshot
//! is reused for `ttl` and dropped on [`ProcessLookup::invalidate`] or after
//! any kill.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

struct Snapshot {
    system: System,
    refreshed_at: Option<Instant>,
}

pub struct ProcessLookup {
    ttl: Duration,
    snapshot: Mutex<Snapshot>,
}

impl ProcessLookup {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            snapshot: Mutex::new(Snapshot {
                system: System::new(),
                refreshed_at: None,
            }),
        }
    }

    pub fn invalidate(&self) {
        self.snapshot.lock().refreshed_at = None;
    }

    /// Pids of processes whose executable name matches `name`
    /// case-insensitively.
    pub fn find(&self, name: &str) -> Vec<u32> {
        let mut snapshot = self.snapshot.lock();
        Self::refresh_if_stale(&mut snapshot, self.ttl);
        snapshot
            .system
            .processes()
            .iter()
            .filter(|(_, process)| process.name().to_string_lossy().eq_ignore_ascii_case(name))
            .map(|(pid, _)| pid.as_u32())
            .collect()
    }

    pub fn is_running(&self, name: &str) -> bool {
        !self.find(name).is_empty()
    }

    /// Kills every process named `name`; returns how many accepted the
    /// signal.
    pub fn kill_all(&self, name: &str) -> usize {
        let mut snapshot = self.snapshot.lock();
        Self::refresh_if_stale(&mut snapshot, Duration::ZERO);

        let own_pid = std::process::id();
        let killed = snapshot
            .system
            .processes()
            .iter()
            .filter(|(pid, process)| pid.as_u32() != own_pid && process.name().to_string_lossy().eq_ignore_ascii_case(name))
            .filter(|(_, process)| process.kill())
            .count();

        snapshot.refreshed_at = None;
        tracing::debug!(name, killed, "kill by name");
        killed
    }

    fn refresh_if_stale(snapshot: &mut Snapshot, ttl: Duration) {
        let fresh = snapshot.refreshed_at.is_some_and(|at| at.elapsed() < ttl);
        if !fresh {
            snapshot
                .system
                .refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::nothing());
            snapshot.refreshed_at = Some(Instant::now());
        }
    }
}

/// Stops the external bypass binary before shared files are replaced.
pub struct BinaryStopper<'a> {
    lookup: &'a ProcessLookup,
    process_name: String,
    grace: Duration,
}

impl<'a> BinaryStopper<'a> {
    pub fn new(lookup: &'a ProcessLookup, process_name: &str) -> Self {
        Self {
            lookup,
            process_name: process_name.to_string(),
            grace: Duration::from_secs(1),
        }
    }

    /// Kills the process and waits up to the grace period for it to go away.
    /// Returns whether it is gone.
    pub async fn stop(&self) -> bool {
        let killed = self.lookup.kill_all(&self.process_name);
        if killed == 0 {
            return !self.lookup.is_running(&self.process_name);
        }

        let deadline = Instant::now() + self.grace;
        loop {
            self.lookup.invalidate();
            if !self.lookup.is_running(&self.process_name) {
                return true;
            }
            if Instant::now() >= deadline {
                tracing::warn!(process = %self.process_name, "process still running after stop");
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_process_is_not_running() {
        let lookup = ProcessLookup::new(Duration::from_millis(500));
        assert!(!lookup.is_running("definitely-not-a-real-process-name.exe"));
        assert_eq!(lookup.kill_all("definitely-not-a-real-process-name.exe"), 0);
        assert!(BinaryStopper::new(&lookup, "definitely-not-a-real-process-name.exe").stop().await);
    }
}
