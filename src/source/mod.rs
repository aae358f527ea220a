// Metric source adapter: the OS-facing side of the sampler.

mod battery;
mod gpu;
mod system;

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::{BatteryReading, RawProcess};
use crate::rate::NetCounters;

pub use self::gpu::{GpuBackend, parse_ioreg_utilization, parse_nvidia_smi_utilization};
pub use self::battery::{parse_pmset, parse_sysfs_battery};
pub use self::system::SysinfoSource;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("{0} unavailable")]
    Unavailable(&'static str),
    #[error("{what} timed out after {after:?}")]
    Timeout { what: &'static str, after: Duration },
    #[error("mount {0} is not monitored")]
    MountNotFound(String),
    #[error("{0} is still busy with a previous query")]
    Busy(String),
    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),
    #[error("blocking task failed: {0}")]
    Join(String),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskStats {
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub total_bytes: u64,
    pub pct: f64,
}

/// Pull-based access to host metrics. Every call can fail on its own; the
/// "not present on this machine" cases (battery, GPU) are `None`, not errors.
pub trait MetricSource: Send + Sync {
    /// Primes the CPU and per-process deltas so the first tick has a window to measure.
    fn warm_up(&self) -> impl Future<Output = Result<(), SourceError>> + Send;

    /// Global CPU % since the previous call.
    fn cpu_percent(&self) -> impl Future<Output = Result<f64, SourceError>> + Send;

    fn memory_stats(&self) -> impl Future<Output = Result<MemoryStats, SourceError>> + Send;

    fn battery_status(&self) -> impl Future<Output = Option<BatteryReading>> + Send;

    /// Expensive and timeboxed; callers rate-limit it.
    fn gpu_utilization(&self) -> impl Future<Output = Option<f64>> + Send;

    /// One enumeration of all processes. Per-process CPU is a delta since the previous
    /// enumeration, so call this at most once per tick.
    fn process_snapshot(&self)
    -> impl Future<Output = Result<Vec<RawProcess>, SourceError>> + Send;

    fn disk_usage(&self, mount: &str)
    -> impl Future<Output = Result<DiskStats, SourceError>> + Send;

    /// Cumulative byte counters over all interfaces.
    fn network_counters(&self) -> impl Future<Output = Result<NetCounters, SourceError>> + Send;

    /// Root plus external volumes; called once at startup.
    fn list_mount_points(&self) -> impl Future<Output = Vec<String>> + Send;

    /// Sends SIGTERM. `false` when the pid is gone or the signal was refused.
    fn terminate(&self, pid: u32) -> impl Future<Output = bool> + Send;
}

/// Picks `/` and mounts under one of `prefixes`, in the given order, without
/// duplicates, capped at `max`.
pub fn select_mount_points<I, S>(candidates: I, prefixes: &[String], max: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for mount in candidates {
        let mount = mount.as_ref();
        let wanted = mount == "/" || prefixes.iter().any(|p| mount.starts_with(p.as_str()));
        if wanted && !out.iter().any(|m| m == mount) {
            out.push(mount.to_string());
        }
        if out.len() >= max {
            break;
        }
    }
    out
}
