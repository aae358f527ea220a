use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub history: HistoryConfig,
    pub processes: ProcessConfig,
    pub disks: DiskConfig,
    pub gpu: GpuConfig,
    pub panel: PanelConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Period between tick starts.
    pub tick_interval_ms: u64,
    /// GPU is queried on every Nth tick; the cached value is reused in between.
    pub gpu_poll_every: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 2000,
            gpu_poll_every: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 30 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Entries in the energy-impact breakdown.
    pub top_n: usize,
    /// Rows in the process table (and valid kill indices).
    pub max_rows: usize,
    /// Groups at or below this summed CPU % are left out of the process table.
    pub min_cpu_percent: f64,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            max_rows: 30,
            min_cpu_percent: 0.05,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiskConfig {
    pub max_mounts: usize,
    /// Mount points under these prefixes are monitored next to `/`.
    pub external_prefixes: Vec<String>,
    pub timeout_ms: u64,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            max_mounts: 6,
            external_prefixes: vec![
                "/Volumes/".into(),
                "/media/".into(),
                "/run/media/".into(),
            ],
            timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GpuBackendKind {
    Auto,
    Ioreg,
    NvidiaSmi,
    Off,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    pub backend: GpuBackendKind,
    /// Upper bound for the external query (also used for the battery helper on macOS).
    pub timeout_ms: u64,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            backend: GpuBackendKind::Auto,
            timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Max number of samples buffered per /ws/panel client (slow clients may lag).
    pub broadcast_capacity: usize,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".into(),
            port: 8765,
            broadcast_capacity: 16,
        }
    }
}

impl AppConfig {
    /// Reads `CONFIG_FILE` (or `config.toml`). Without an explicit path, a missing
    /// `config.toml` yields the built-in defaults.
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var("CONFIG_FILE") {
            Ok(path) => {
                let s = std::fs::read_to_string(&path)
                    .map_err(|e| anyhow::anyhow!("reading {}: {}", path, e))?;
                Self::load_from_str(&s)
            }
            Err(_) => match std::fs::read_to_string("config.toml") {
                Ok(s) => Self::load_from_str(&s),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    let config = Self::default();
                    config.validate()?;
                    Ok(config)
                }
                Err(e) => Err(anyhow::anyhow!("reading config.toml: {}", e)),
            },
        }
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.scheduler.tick_interval_ms > 0,
            "scheduler.tick_interval_ms must be > 0, got {}",
            self.scheduler.tick_interval_ms
        );
        anyhow::ensure!(
            self.scheduler.gpu_poll_every > 0,
            "scheduler.gpu_poll_every must be > 0, got {}",
            self.scheduler.gpu_poll_every
        );
        anyhow::ensure!(
            self.history.capacity > 0,
            "history.capacity must be > 0, got {}",
            self.history.capacity
        );
        anyhow::ensure!(
            self.processes.top_n > 0,
            "processes.top_n must be > 0, got {}",
            self.processes.top_n
        );
        anyhow::ensure!(
            self.processes.max_rows > 0,
            "processes.max_rows must be > 0, got {}",
            self.processes.max_rows
        );
        anyhow::ensure!(
            self.processes.min_cpu_percent >= 0.0,
            "processes.min_cpu_percent must be >= 0, got {}",
            self.processes.min_cpu_percent
        );
        anyhow::ensure!(
            self.disks.max_mounts > 0,
            "disks.max_mounts must be > 0, got {}",
            self.disks.max_mounts
        );
        anyhow::ensure!(
            self.disks.timeout_ms > 0,
            "disks.timeout_ms must be > 0, got {}",
            self.disks.timeout_ms
        );
        anyhow::ensure!(
            self.gpu.timeout_ms > 0 && self.gpu.timeout_ms <= 2000,
            "gpu.timeout_ms must be between 1 and 2000, got {}",
            self.gpu.timeout_ms
        );
        if self.panel.enabled {
            anyhow::ensure!(
                self.panel.port > 0,
                "panel.port must be between 1 and 65535, got {}",
                self.panel.port
            );
            anyhow::ensure!(!self.panel.host.is_empty(), "panel.host must be non-empty");
        }
        anyhow::ensure!(
            self.panel.broadcast_capacity > 0,
            "panel.broadcast_capacity must be > 0, got {}",
            self.panel.broadcast_capacity
        );
        Ok(())
    }
}
