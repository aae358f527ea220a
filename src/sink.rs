// Presentation sinks: where finished samples go.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use crate::aggregate::energy_shares;
use crate::classify::{battery_tier, classify};
use crate::models::Sample;
use crate::rate::format_rate;

/// Receives every successfully assembled sample, in tick order, on the scheduler task.
/// Implementations must return quickly; rendering happens elsewhere.
pub trait PresentationSink: Send + Sync {
    fn present(&self, sample: &Arc<Sample>);
}

/// Publishes the latest sample (for point reads) and a stream of samples (for live panels).
#[derive(Clone)]
pub struct ChannelSink {
    latest: watch::Sender<Option<Arc<Sample>>>,
    stream: broadcast::Sender<Arc<Sample>>,
}

impl ChannelSink {
    pub fn new(stream_capacity: usize) -> Self {
        let (latest, _) = watch::channel(None);
        let (stream, _) = broadcast::channel(stream_capacity.max(1));
        Self { latest, stream }
    }

    pub fn latest(&self) -> Option<Arc<Sample>> {
        self.latest.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<Arc<Sample>>> {
        self.latest.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Sample>> {
        self.stream.subscribe()
    }
}

impl PresentationSink for ChannelSink {
    fn present(&self, sample: &Arc<Sample>) {
        self.latest.send_replace(Some(sample.clone()));
        // No live subscribers is the normal idle state.
        let _ = self.stream.send(sample.clone());
    }
}

/// One structured log line per tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl PresentationSink for LogSink {
    fn present(&self, sample: &Arc<Sample>) {
        let top = sample.top_processes.first().map(|p| p.name.as_str()).unwrap_or("-");
        let battery = sample
            .battery
            .as_ref()
            .map(|b| b.status_label())
            .unwrap_or_else(|| "N/A".into());
        let top_share = energy_shares(&sample.top_processes).first().copied().unwrap_or(0.0);
        let disks_unavailable = sample.disks.iter().filter(|d| d.usage.is_none()).count();
        tracing::debug!(
            tick = sample.tick,
            cpu_pct = sample.cpu_pct,
            cpu_tier = ?classify(sample.cpu_pct),
            ram_pct = sample.ram_pct,
            ram_tier = ?classify(sample.ram_pct),
            gpu_pct = ?sample.gpu_pct,
            battery_pct = ?sample.battery.as_ref().map(|b| b.pct),
            battery_tier = ?sample.battery.as_ref().map(|b| battery_tier(b.pct)),
            battery = %battery,
            down = %format_rate(sample.net_down_bps),
            up = %format_rate(sample.net_up_bps),
            processes = sample.processes.len(),
            top_process = top,
            top_share,
            disks_unavailable,
            "sample"
        );
    }
}
