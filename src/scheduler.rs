// Tick driver: owns all monitor state and runs the sampling cycle serially.
// Kill commands from the panel are executed on the same task, between ticks.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Duration, Instant, MissedTickBehavior, interval};
use tracing::Instrument;

use crate::aggregate::ProcessTable;
use crate::config::AppConfig;
use crate::history::History;
use crate::models::{BYTES_PER_GB, DiskReading, DiskUsage, ProcessAgg, Sample};
use crate::rate::{NetCounterState, NetRates};
use crate::sink::{ChannelSink, PresentationSink};
use crate::source::MetricSource;

/// Pending kill requests beyond this are rejected rather than queued.
const COMMAND_CAPACITY: usize = 16;

/// Outcome of one kill request. Pids that were already gone or refused the signal
/// count as skipped; that is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillReport {
    pub name: String,
    pub signalled: usize,
    pub skipped: usize,
}

/// Per-tick knobs taken from the config.
#[derive(Debug, Clone)]
pub struct TickSettings {
    pub gpu_poll_every: u64,
    pub top_n: usize,
    pub max_rows: usize,
    pub min_cpu_percent: f64,
    /// Bound on each mount's query; a hung mount reads as unavailable.
    pub disk_timeout: Duration,
}

impl From<&AppConfig> for TickSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            gpu_poll_every: config.scheduler.gpu_poll_every.max(1),
            top_n: config.processes.top_n,
            max_rows: config.processes.max_rows,
            min_cpu_percent: config.processes.min_cpu_percent,
            disk_timeout: Duration::from_millis(config.disks.timeout_ms),
        }
    }
}

/// Everything that survives between ticks.
pub struct MonitorState {
    settings: TickSettings,
    tick: u64,
    history: History,
    net: NetCounterState,
    gpu_cache: Option<f64>,
    mounts: Vec<String>,
    /// The list most recently handed to the sinks; kill indices refer to it.
    processes: Vec<ProcessAgg>,
}

impl MonitorState {
    pub fn new(settings: TickSettings, history_capacity: usize, mounts: Vec<String>) -> Self {
        Self {
            settings,
            tick: 0,
            history: History::new(history_capacity),
            net: NetCounterState::new(),
            gpu_cache: None,
            mounts,
            processes: Vec::new(),
        }
    }

    pub fn processes(&self) -> &[ProcessAgg] {
        &self.processes
    }

    /// Runs one sampling cycle. Optional metrics degrade to `None`; a CPU or RAM
    /// failure drops the whole tick (`None`) and leaves the history untouched.
    pub async fn tick<S: MetricSource>(&mut self, source: &S, timestamp_ms: u64) -> Option<Sample> {
        self.tick += 1;

        let battery = source.battery_status().await;

        // One enumeration feeds both the energy-impact view and the process table.
        let raw = match source.process_snapshot().await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, operation = "process_snapshot", "process scan failed");
                Vec::new()
            }
        };
        let table = ProcessTable::from_raw(&raw);
        let top_processes = table.top(self.settings.top_n);
        let processes = table.process_list(self.settings.min_cpu_percent, self.settings.max_rows);

        let cpu_pct = match source.cpu_percent().await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, operation = "cpu_percent", "CPU stats failed");
                return None;
            }
        };
        let mem = match source.memory_stats().await {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, operation = "memory_stats", "RAM stats failed");
                return None;
            }
        };
        self.history.record_cpu(cpu_pct);
        self.history.record_ram(mem.pct);

        if self.tick % self.settings.gpu_poll_every == 0 {
            self.gpu_cache = source.gpu_utilization().await;
        }
        let gpu_pct = self.gpu_cache;
        if let Some(g) = gpu_pct {
            self.history.record_gpu(g);
        }

        let rates = match source.network_counters().await {
            // Rates are over the time between reads, not between tick starts.
            Ok(counters) => self.net.update(counters, Instant::now().into_std()),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    operation = "network_counters",
                    "network counters failed"
                );
                NetRates::default()
            }
        };
        self.history.record_net_down(rates.down_bps);

        let mut disks = Vec::with_capacity(self.mounts.len());
        for mount in &self.mounts {
            let query = tokio::time::timeout(self.settings.disk_timeout, source.disk_usage(mount));
            let usage = match query.await {
                Ok(Ok(d)) => {
                    self.history.record_disk(mount, d.pct);
                    Some(DiskUsage::from_bytes(d.used_bytes, d.free_bytes, d.total_bytes, d.pct))
                }
                Ok(Err(e)) => {
                    tracing::debug!(
                        error = %e,
                        mount = %mount,
                        operation = "disk_usage",
                        "disk unavailable"
                    );
                    None
                }
                Err(_) => {
                    tracing::warn!(
                        mount = %mount,
                        timeout_ms = self.settings.disk_timeout.as_millis() as u64,
                        operation = "disk_usage",
                        "disk query timed out"
                    );
                    None
                }
            };
            disks.push(DiskReading::new(mount, usage));
        }

        self.processes = processes.clone();
        Some(Sample {
            timestamp_ms,
            tick: self.tick,
            cpu_pct,
            ram_pct: mem.pct,
            ram_used_gb: mem.used_bytes as f64 / BYTES_PER_GB,
            ram_total_gb: mem.total_bytes as f64 / BYTES_PER_GB,
            gpu_pct,
            battery,
            net_down_bps: rates.down_bps,
            net_up_bps: rates.up_bps,
            disks,
            top_processes,
            processes,
            history: self.history.snapshot(),
        })
    }

    /// Sends SIGTERM to every pid of the group at `index` in the last presented list.
    /// `None` when the index is out of range. Per-pid failures are skipped.
    pub async fn kill_process_group<S: MetricSource>(
        &self,
        source: &S,
        index: usize,
    ) -> Option<KillReport> {
        let group = self.processes.get(index)?;
        let mut report = KillReport {
            name: group.name.clone(),
            signalled: 0,
            skipped: 0,
        };
        for &pid in &group.pids {
            if source.terminate(pid).await {
                report.signalled += 1;
            } else {
                tracing::debug!(pid, name = %group.name, "pid not signalled");
                report.skipped += 1;
            }
        }
        tracing::info!(
            name = %report.name,
            signalled = report.signalled,
            skipped = report.skipped,
            operation = "kill_process_group",
            "process group terminated"
        );
        Some(report)
    }
}

enum Command {
    Kill {
        index: usize,
        reply: oneshot::Sender<Option<KillReport>>,
    },
}

/// Panel-facing handle: read the latest sample, stream samples, request kills.
///
/// Holds only receiving ends, so once the scheduler task ends every waiter sees the
/// channels close.
pub struct MonitorHandle {
    commands: mpsc::Sender<Command>,
    latest: watch::Receiver<Option<Arc<Sample>>>,
    stream: broadcast::Receiver<Arc<Sample>>,
}

impl Clone for MonitorHandle {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            latest: self.latest.clone(),
            stream: self.stream.resubscribe(),
        }
    }
}

impl MonitorHandle {
    pub fn latest(&self) -> Option<Arc<Sample>> {
        self.latest.borrow().clone()
    }

    /// The process list of the latest sample (the one kill indices refer to).
    pub fn current_processes(&self) -> Vec<ProcessAgg> {
        self.latest
            .borrow()
            .as_ref()
            .map(|s| s.processes.clone())
            .unwrap_or_default()
    }

    /// Samples published after this call. Yields `Closed` once the scheduler stops.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Sample>> {
        self.stream.resubscribe()
    }

    /// Waits until a sample newer than the current one is published.
    pub async fn changed(&mut self) -> anyhow::Result<()> {
        self.latest
            .changed()
            .await
            .map_err(|_| anyhow::anyhow!("scheduler stopped"))
    }

    /// Runs on the scheduler task, so it never overlaps a tick. Errors only when the
    /// scheduler is gone.
    pub async fn kill_process_group(&self, index: usize) -> anyhow::Result<Option<KillReport>> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Kill { index, reply })
            .await
            .map_err(|_| anyhow::anyhow!("scheduler stopped"))?;
        rx.await.map_err(|_| anyhow::anyhow!("scheduler stopped"))
    }
}

pub struct SchedulerDeps<S> {
    pub source: Arc<S>,
    /// Sinks besides the built-in channel sink behind `MonitorHandle`.
    pub sinks: Vec<Box<dyn PresentationSink>>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

pub struct SchedulerConfig {
    pub tick_interval: Duration,
    pub history_capacity: usize,
    pub stream_capacity: usize,
    pub settings: TickSettings,
}

impl From<&AppConfig> for SchedulerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            tick_interval: Duration::from_millis(config.scheduler.tick_interval_ms),
            history_capacity: config.history.capacity,
            stream_capacity: config.panel.broadcast_capacity,
            settings: TickSettings::from(config),
        }
    }
}

fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_timestamp", "system time error");
            0
        })
}

/// Spawns the scheduler task. It warms the source up, enumerates mounts once, then
/// ticks immediately and every `tick_interval` until shutdown.
pub fn spawn<S>(
    deps: SchedulerDeps<S>,
    config: SchedulerConfig,
) -> (MonitorHandle, tokio::task::JoinHandle<()>)
where
    S: MetricSource + 'static,
{
    let SchedulerDeps {
        source,
        mut sinks,
        mut shutdown_rx,
    } = deps;
    let SchedulerConfig {
        tick_interval,
        history_capacity,
        stream_capacity,
        settings,
    } = config;

    let channel = ChannelSink::new(stream_capacity);
    let (commands_tx, mut commands_rx) = mpsc::channel(COMMAND_CAPACITY);
    let handle = MonitorHandle {
        commands: commands_tx,
        latest: channel.watch(),
        stream: channel.subscribe(),
    };
    sinks.insert(0, Box::new(channel));

    let scheduler_span = tracing::span!(
        tracing::Level::DEBUG,
        "scheduler",
        tick_interval_ms = tick_interval.as_millis() as u64
    );
    let join = tokio::spawn(
        async move {
            if let Err(e) = source.warm_up().await {
                tracing::warn!(error = %e, operation = "warm_up", "warm-up failed");
            }
            let mounts = source.list_mount_points().await;
            tracing::info!(mounts = ?mounts, "monitoring mounts");
            let mut state = MonitorState::new(settings, history_capacity, mounts);

            let mut tick = interval(tick_interval);
            // A tick runs inline, so an overrunning tick delays the next instead of overlapping it.
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    started = tick.tick() => {
                        if let Some(sample) = state.tick(source.as_ref(), unix_millis()).await {
                            let sample = Arc::new(sample);
                            for sink in &sinks {
                                sink.present(&sample);
                            }
                        }
                        let elapsed = started.elapsed();
                        if elapsed > tick_interval {
                            tracing::warn!(
                                elapsed_ms = elapsed.as_millis() as u64,
                                "tick overran its period"
                            );
                        }
                    }
                    Some(command) = commands_rx.recv() => {
                        match command {
                            Command::Kill { index, reply } => {
                                let report = state.kill_process_group(source.as_ref(), index).await;
                                let _ = reply.send(report);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Scheduler shutting down");
                        break;
                    }
                }
            }
        }
        .instrument(scheduler_span),
    );

    (handle, join)
}
