// Host metrics via sysinfo, plus the helper-process queries (GPU, macOS battery).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

use sysinfo::{Disk, DiskRefreshKind, Disks, Networks, Pid, ProcessesToUpdate, Signal, System};
use tracing::instrument;

use super::gpu::GpuBackend;
use super::{DiskStats, MemoryStats, MetricSource, SourceError, battery, select_mount_points};
use crate::config::AppConfig;
use crate::models::{BatteryReading, RawProcess};
use crate::rate::NetCounters;

pub struct SysinfoSource {
    sys: Arc<Mutex<System>>,
    /// One lock per mount, so a hung volume only ever blocks its own queries.
    disks: HashMap<String, Arc<Mutex<Disk>>>,
    /// Mount points in enumeration order.
    disk_order: Vec<String>,
    networks: Arc<Mutex<Networks>>,
    gpu: GpuBackend,
    helper_timeout: Duration,
    mount_prefixes: Vec<String>,
    max_mounts: usize,
}

impl SysinfoSource {
    /// Fails when process enumeration yields nothing: without it the monitor cannot work.
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_usage();
        sys.refresh_processes(ProcessesToUpdate::All, true);
        anyhow::ensure!(
            !sys.processes().is_empty(),
            "process enumeration returned no processes"
        );
        let mut disk_order = Vec::new();
        let mut disks = HashMap::new();
        for disk in Vec::<Disk>::from(Disks::new_with_refreshed_list()) {
            let mount = disk.mount_point().to_string_lossy().into_owned();
            if !disks.contains_key(&mount) {
                disk_order.push(mount.clone());
                disks.insert(mount, Arc::new(Mutex::new(disk)));
            }
        }
        let networks = Networks::new_with_refreshed_list();
        Ok(Self {
            sys: Arc::new(Mutex::new(sys)),
            disks,
            disk_order,
            networks: Arc::new(Mutex::new(networks)),
            gpu: GpuBackend::from_config(config.gpu.backend),
            helper_timeout: Duration::from_millis(config.gpu.timeout_ms),
            mount_prefixes: config.disks.external_prefixes.clone(),
            max_mounts: config.disks.max_mounts,
        })
    }
}

/// Runs `f` on the blocking pool with the guarded value locked.
async fn blocking<T, R, F>(
    target: Arc<Mutex<T>>,
    what: &'static str,
    f: F,
) -> Result<R, SourceError>
where
    T: Send + 'static,
    R: Send + 'static,
    F: FnOnce(&mut T) -> R + Send + 'static,
{
    tokio::task::spawn_blocking(move || -> Result<R, SourceError> {
        let mut guard = target.lock().map_err(|_| SourceError::LockPoisoned(what))?;
        Ok(f(&mut guard))
    })
    .await
    .map_err(|e| SourceError::Join(e.to_string()))?
}

/// Like `blocking`, but fails with `Busy` instead of queueing behind a call that still
/// holds the lock (a statvfs stuck on a dead volume, say).
async fn try_blocking<T, R, F>(
    target: Arc<Mutex<T>>,
    what: String,
    f: F,
) -> Result<R, SourceError>
where
    T: Send + 'static,
    R: Send + 'static,
    F: FnOnce(&mut T) -> Result<R, SourceError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || -> Result<R, SourceError> {
        let mut guard = match target.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(SourceError::Busy(what)),
            Err(TryLockError::Poisoned(_)) => return Err(SourceError::LockPoisoned("disk")),
        };
        f(&mut guard)
    })
    .await
    .map_err(|e| SourceError::Join(e.to_string()))?
}

fn percent(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

#[cfg(target_os = "linux")]
async fn read_battery(_limit: Duration) -> Option<BatteryReading> {
    tokio::task::spawn_blocking(|| {
        battery::read_sysfs(std::path::Path::new(battery::SYSFS_POWER_SUPPLY))
    })
    .await
    .ok()
    .flatten()
}

#[cfg(target_os = "macos")]
async fn read_battery(limit: Duration) -> Option<BatteryReading> {
    match super::gpu::run_helper("pmset", &["-g", "batt"], limit, "battery query").await {
        Ok(out) => battery::parse_pmset(&out),
        Err(e) => {
            tracing::debug!(error = %e, operation = "battery_status", "pmset failed");
            None
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
async fn read_battery(_limit: Duration) -> Option<BatteryReading> {
    None
}

impl MetricSource for SysinfoSource {
    #[instrument(skip(self), fields(source = "sysinfo", operation = "warm_up"))]
    async fn warm_up(&self) -> Result<(), SourceError> {
        blocking(self.sys.clone(), "sysinfo", |sys| {
            sys.refresh_cpu_usage();
            sys.refresh_processes(ProcessesToUpdate::All, true);
        })
        .await?;
        // CPU deltas need at least this much wall time between refreshes.
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        Ok(())
    }

    #[instrument(skip(self), fields(source = "sysinfo", operation = "cpu_percent"))]
    async fn cpu_percent(&self) -> Result<f64, SourceError> {
        blocking(self.sys.clone(), "sysinfo", |sys| {
            sys.refresh_cpu_usage();
            (sys.global_cpu_usage() as f64).clamp(0.0, 100.0)
        })
        .await
    }

    #[instrument(skip(self), fields(source = "sysinfo", operation = "memory_stats"))]
    async fn memory_stats(&self) -> Result<MemoryStats, SourceError> {
        blocking(self.sys.clone(), "sysinfo", |sys| {
            sys.refresh_memory();
            let total = sys.total_memory();
            let used = total.saturating_sub(sys.available_memory());
            MemoryStats {
                used_bytes: used,
                total_bytes: total,
                pct: percent(used, total),
            }
        })
        .await
    }

    #[instrument(skip(self), fields(source = "sysinfo", operation = "battery_status"))]
    async fn battery_status(&self) -> Option<BatteryReading> {
        read_battery(self.helper_timeout).await
    }

    #[instrument(skip(self), fields(source = "sysinfo", operation = "gpu_utilization"))]
    async fn gpu_utilization(&self) -> Option<f64> {
        self.gpu.query(self.helper_timeout).await
    }

    #[instrument(skip(self), fields(source = "sysinfo", operation = "process_snapshot"))]
    async fn process_snapshot(&self) -> Result<Vec<RawProcess>, SourceError> {
        blocking(self.sys.clone(), "sysinfo", |sys| {
            sys.refresh_processes(ProcessesToUpdate::All, true);
            sys.processes()
                .iter()
                .map(|(pid, p)| RawProcess {
                    pid: pid.as_u32(),
                    name: p.name().to_string_lossy().into_owned(),
                    cpu_pct: p.cpu_usage() as f64,
                })
                .collect()
        })
        .await
    }

    #[instrument(skip(self), fields(source = "sysinfo", operation = "disk_usage"))]
    async fn disk_usage(&self, mount: &str) -> Result<DiskStats, SourceError> {
        let disk = self
            .disks
            .get(mount)
            .cloned()
            .ok_or_else(|| SourceError::MountNotFound(mount.to_string()))?;
        try_blocking(disk, mount.to_string(), |disk| {
            // Only this volume is touched; unmounted volumes fail the refresh.
            if !disk.refresh_specifics(DiskRefreshKind::nothing().with_storage()) {
                return Err(SourceError::Unavailable("disk usage"));
            }
            let total = disk.total_space();
            let free = disk.available_space();
            let used = total.saturating_sub(free);
            Ok(DiskStats {
                used_bytes: used,
                free_bytes: free,
                total_bytes: total,
                pct: percent(used, total),
            })
        })
        .await
    }

    #[instrument(skip(self), fields(source = "sysinfo", operation = "network_counters"))]
    async fn network_counters(&self) -> Result<NetCounters, SourceError> {
        blocking(self.networks.clone(), "sysinfo networks", |networks| {
            networks.refresh(true);
            networks
                .list()
                .values()
                .fold(NetCounters::default(), |acc, data| NetCounters {
                    bytes_recv: acc.bytes_recv.saturating_add(data.total_received()),
                    bytes_sent: acc.bytes_sent.saturating_add(data.total_transmitted()),
                })
        })
        .await
    }

    #[instrument(skip(self), fields(source = "sysinfo", operation = "list_mount_points"))]
    async fn list_mount_points(&self) -> Vec<String> {
        select_mount_points(&self.disk_order, &self.mount_prefixes, self.max_mounts)
    }

    #[instrument(skip(self), fields(source = "sysinfo", operation = "terminate"))]
    async fn terminate(&self, pid: u32) -> bool {
        let sent = blocking(self.sys.clone(), "sysinfo", move |sys| {
            // Only pids seen by the last enumeration are signalled.
            sys.process(Pid::from_u32(pid))
                .and_then(|p| p.kill_with(Signal::Term))
                .unwrap_or(false)
        })
        .await;
        match sent {
            Ok(sent) => sent,
            Err(e) => {
                tracing::debug!(error = %e, pid, "terminate failed");
                false
            }
        }
    }
}
