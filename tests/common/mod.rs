// Shared test helpers: a scripted metric source

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use hostpanel::config::AppConfig;
use hostpanel::models::{BatteryReading, RawProcess};
use hostpanel::rate::NetCounters;
use hostpanel::scheduler::TickSettings;
use hostpanel::source::{DiskStats, MemoryStats, MetricSource, SourceError};
use tokio::time::Instant;

/// What the fake reports on the next call. Tests mutate it between ticks.
#[derive(Debug, Clone)]
pub struct Script {
    /// `None` makes `cpu_percent` fail.
    pub cpu: Option<f64>,
    pub memory: MemoryStats,
    pub battery: Option<BatteryReading>,
    pub gpu: Option<f64>,
    /// How long a GPU query takes.
    pub gpu_delay: Option<Duration>,
    pub processes: Vec<RawProcess>,
    /// `None` makes `network_counters` fail.
    pub net: Option<NetCounters>,
    /// When set, received bytes grow at this rate from construction, overriding `net`.
    pub net_per_sec: Option<u64>,
    /// Mount → stats; `None` (or absent) makes `disk_usage` fail for that mount.
    pub disks: HashMap<String, Option<DiskStats>>,
    /// Mount → how long its query takes.
    pub disk_delay: HashMap<String, Duration>,
    pub mounts: Vec<String>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            cpu: Some(10.0),
            memory: MemoryStats {
                used_bytes: 4 * 1_073_741_824,
                total_bytes: 16 * 1_073_741_824,
                pct: 25.0,
            },
            battery: None,
            gpu: None,
            gpu_delay: None,
            processes: Vec::new(),
            net: Some(NetCounters::default()),
            net_per_sec: None,
            disks: HashMap::new(),
            disk_delay: HashMap::new(),
            mounts: vec!["/".to_string()],
        }
    }
}

pub struct FakeSource {
    started: Instant,
    script: Mutex<Script>,
    /// Pids that still exist; `terminate` removes them.
    alive: Mutex<BTreeSet<u32>>,
    signalled: Mutex<Vec<u32>>,
    gpu_calls: Mutex<usize>,
}

impl FakeSource {
    pub fn new(script: Script) -> Self {
        let alive = script.processes.iter().map(|p| p.pid).collect();
        Self {
            started: Instant::now(),
            script: Mutex::new(script),
            alive: Mutex::new(alive),
            signalled: Mutex::new(Vec::new()),
            gpu_calls: Mutex::new(0),
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.script.lock().unwrap());
        let pids: Vec<u32> = self.script.lock().unwrap().processes.iter().map(|p| p.pid).collect();
        self.alive.lock().unwrap().extend(pids);
    }

    /// Simulates a process exiting on its own.
    pub fn exit(&self, pid: u32) {
        self.alive.lock().unwrap().remove(&pid);
    }

    pub fn signalled(&self) -> Vec<u32> {
        self.signalled.lock().unwrap().clone()
    }

    pub fn gpu_calls(&self) -> usize {
        *self.gpu_calls.lock().unwrap()
    }
}

impl MetricSource for FakeSource {
    async fn warm_up(&self) -> Result<(), SourceError> {
        Ok(())
    }

    async fn cpu_percent(&self) -> Result<f64, SourceError> {
        self.script
            .lock()
            .unwrap()
            .cpu
            .ok_or(SourceError::Unavailable("cpu"))
    }

    async fn memory_stats(&self) -> Result<MemoryStats, SourceError> {
        Ok(self.script.lock().unwrap().memory)
    }

    async fn battery_status(&self) -> Option<BatteryReading> {
        self.script.lock().unwrap().battery.clone()
    }

    async fn gpu_utilization(&self) -> Option<f64> {
        *self.gpu_calls.lock().unwrap() += 1;
        let delay = self.script.lock().unwrap().gpu_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.script.lock().unwrap().gpu
    }

    async fn process_snapshot(&self) -> Result<Vec<RawProcess>, SourceError> {
        Ok(self.script.lock().unwrap().processes.clone())
    }

    async fn disk_usage(&self, mount: &str) -> Result<DiskStats, SourceError> {
        let delay = self.script.lock().unwrap().disk_delay.get(mount).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .unwrap()
            .disks
            .get(mount)
            .copied()
            .flatten()
            .ok_or_else(|| SourceError::MountNotFound(mount.to_string()))
    }

    async fn network_counters(&self) -> Result<NetCounters, SourceError> {
        let script = self.script.lock().unwrap();
        if let Some(rate) = script.net_per_sec {
            let elapsed = self.started.elapsed().as_secs_f64();
            return Ok(NetCounters {
                bytes_recv: (elapsed * rate as f64) as u64,
                bytes_sent: 0,
            });
        }
        script.net.ok_or(SourceError::Unavailable("network"))
    }

    async fn list_mount_points(&self) -> Vec<String> {
        self.script.lock().unwrap().mounts.clone()
    }

    async fn terminate(&self, pid: u32) -> bool {
        if self.alive.lock().unwrap().remove(&pid) {
            self.signalled.lock().unwrap().push(pid);
            true
        } else {
            false
        }
    }
}

pub fn disk(used_gb: u64, total_gb: u64) -> DiskStats {
    let gb = 1_073_741_824;
    DiskStats {
        used_bytes: used_gb * gb,
        free_bytes: (total_gb - used_gb) * gb,
        total_bytes: total_gb * gb,
        pct: used_gb as f64 / total_gb as f64 * 100.0,
    }
}

pub fn default_settings() -> TickSettings {
    TickSettings::from(&AppConfig::default())
}
